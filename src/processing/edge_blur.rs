use crate::error::FilterError;
use crate::processing::gpu::{
    GpuContext, PipelineBundle, create_pipeline_bundle, f32s_as_bytes, tex_storage_uniform_entries,
};
use crate::processing::{TextureSet, WORKGROUP_SIZE};

/// Largest supported blur radius; the tap table must fit one uniform of
/// eight vec4s (weights[0..=radius]).
pub const MAX_BLUR_RADIUS: u32 = 31;

/// Compound filter: Sobel edge detection into the intermediate texture,
/// then a separable Gaussian blur (sigma = FilterParameter) into the output.
pub struct EdgeBlurPass {
    sobel: PipelineBundle,
    blur_h: PipelineBundle,
    blur_v: PipelineBundle,
    /// Horizontal-pass target, reallocated when the input dimensions change.
    scratch: Option<Scratch>,
}

struct Scratch {
    texture: wgpu::Texture,
    width: u32,
    height: u32,
}

impl EdgeBlurPass {
    pub fn new(gpu: &GpuContext) -> Self {
        let entries = tex_storage_uniform_entries();
        EdgeBlurPass {
            sobel: create_pipeline_bundle(&gpu.device, "edge_sobel", SOBEL_SHADER_SRC, &entries),
            blur_h: create_pipeline_bundle(&gpu.device, "edge_blur_h", BLUR_H_SHADER_SRC, &entries),
            blur_v: create_pipeline_bundle(&gpu.device, "edge_blur_v", BLUR_V_SHADER_SRC, &entries),
            scratch: None,
        }
    }

    pub fn run(
        &mut self,
        gpu: &GpuContext,
        textures: &TextureSet,
        parameter: u32,
    ) -> Result<(), FilterError> {
        let Some(intermediate) = textures.intermediate.as_ref() else {
            return Err(FilterError::setup(
                "edge-blur requires an intermediate texture",
            ));
        };

        let width = textures.width;
        let height = textures.height;
        let scratch = self.ensure_scratch(gpu, width, height);

        let sigma = parameter.max(1) as f32;
        let radius = blur_radius(sigma);
        let weights = gaussian_weights(sigma, radius);

        let sobel_params: [f32; 4] = [width as f32, height as f32, 0.0, 0.0];
        let sobel_params_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("edge_sobel_params"),
            size: std::mem::size_of_val(&sobel_params) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        gpu.queue
            .write_buffer(&sobel_params_buffer, 0, f32s_as_bytes(&sobel_params));

        // Header [width, height, radius, pad] followed by weights[0..=31],
        // matching the shader's vec4-packed uniform layout.
        let mut blur_params: [f32; 36] = [0.0; 36];
        blur_params[0] = width as f32;
        blur_params[1] = height as f32;
        blur_params[2] = radius as f32;
        blur_params[4..].copy_from_slice(&weights);
        let blur_params_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("edge_blur_params"),
            size: std::mem::size_of_val(&blur_params) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        gpu.queue
            .write_buffer(&blur_params_buffer, 0, f32s_as_bytes(&blur_params));

        let input_view = textures
            .input
            .create_view(&wgpu::TextureViewDescriptor::default());
        let intermediate_view = intermediate.create_view(&wgpu::TextureViewDescriptor::default());
        let scratch_view = scratch.create_view(&wgpu::TextureViewDescriptor::default());
        let output_view = textures
            .output
            .create_view(&wgpu::TextureViewDescriptor::default());

        let sobel_bg = bind_io(
            gpu,
            "edge_sobel_bg",
            &self.sobel.bgl,
            &input_view,
            &intermediate_view,
            &sobel_params_buffer,
        );
        let blur_h_bg = bind_io(
            gpu,
            "edge_blur_h_bg",
            &self.blur_h.bgl,
            &intermediate_view,
            &scratch_view,
            &blur_params_buffer,
        );
        let blur_v_bg = bind_io(
            gpu,
            "edge_blur_v_bg",
            &self.blur_v.bgl,
            &scratch_view,
            &output_view,
            &blur_params_buffer,
        );

        // Full-extent coverage for all three stages; the pass order on one
        // encoder is the edge-then-blur ordering dependency.
        let groups_x = width.div_ceil(WORKGROUP_SIZE);
        let groups_y = height.div_ceil(WORKGROUP_SIZE);

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("edge_blur_encoder"),
            });
        for (label, bundle, bg) in [
            ("edge_sobel_pass", &self.sobel, &sobel_bg),
            ("edge_blur_h_pass", &self.blur_h, &blur_h_bg),
            ("edge_blur_v_pass", &self.blur_v, &blur_v_bg),
        ] {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            pass.set_pipeline(&bundle.pipeline);
            pass.set_bind_group(0, bg, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }
        gpu.queue.submit([encoder.finish()]);
        let _ = gpu.device.poll(wgpu::Maintain::wait());
        Ok(())
    }

    fn ensure_scratch(&mut self, gpu: &GpuContext, width: u32, height: u32) -> &wgpu::Texture {
        let stale = !matches!(
            self.scratch,
            Some(ref s) if s.width == width && s.height == height
        );
        if stale {
            let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("edge_blur_scratch"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            self.scratch = Some(Scratch {
                texture,
                width,
                height,
            });
        }
        &self
            .scratch
            .as_ref()
            .expect("scratch allocated above")
            .texture
    }
}

fn bind_io(
    gpu: &GpuContext,
    label: &str,
    bgl: &wgpu::BindGroupLayout,
    src: &wgpu::TextureView,
    dst: &wgpu::TextureView,
    params: &wgpu::Buffer,
) -> wgpu::BindGroup {
    gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout: bgl,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(src),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(dst),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: params.as_entire_binding(),
            },
        ],
    })
}

/// Kernel radius for a given sigma, capped so the taps fit the uniform.
pub fn blur_radius(sigma: f32) -> u32 {
    ((sigma * 3.0).ceil() as u32).clamp(1, MAX_BLUR_RADIUS)
}

/// One-sided Gaussian taps weights[0..=radius], normalized so the full
/// mirrored kernel sums to one. Entries past the radius stay zero.
pub fn gaussian_weights(sigma: f32, radius: u32) -> [f32; 32] {
    let mut weights = [0.0_f32; 32];
    let two_sigma_sq = 2.0 * sigma * sigma;
    for (i, w) in weights.iter_mut().enumerate().take(radius as usize + 1) {
        let d = i as f32;
        *w = (-d * d / two_sigma_sq).exp();
    }
    let norm: f32 = weights[0] + 2.0 * weights[1..=radius as usize].iter().sum::<f32>();
    for w in &mut weights {
        *w /= norm;
    }
    weights
}

// Sobel luma-gradient magnitude, written as grayscale. Border taps clamp.
const SOBEL_SHADER_SRC: &str = r#"
struct SobelParams {
    width: f32,
    height: f32,
    _pad0: f32,
    _pad1: f32,
};

@group(0) @binding(0)
var src_tex: texture_2d<f32>;
@group(0) @binding(1)
var dst_tex: texture_storage_2d<rgba8unorm, write>;
@group(0) @binding(2)
var<uniform> params: SobelParams;

fn luma_at(x: i32, y: i32, w: i32, h: i32) -> f32 {
    let sx = clamp(x, 0, w - 1);
    let sy = clamp(y, 0, h - 1);
    let px = textureLoad(src_tex, vec2<i32>(sx, sy), 0);
    return dot(px.rgb, vec3<f32>(0.2126, 0.7152, 0.0722));
}

@compute @workgroup_size(16, 16, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let w = i32(params.width + 0.5);
    let h = i32(params.height + 0.5);
    if (i32(gid.x) >= w || i32(gid.y) >= h) {
        return;
    }

    let x = i32(gid.x);
    let y = i32(gid.y);
    let tl = luma_at(x - 1, y - 1, w, h);
    let t = luma_at(x, y - 1, w, h);
    let tr = luma_at(x + 1, y - 1, w, h);
    let l = luma_at(x - 1, y, w, h);
    let r = luma_at(x + 1, y, w, h);
    let bl = luma_at(x - 1, y + 1, w, h);
    let b = luma_at(x, y + 1, w, h);
    let br = luma_at(x + 1, y + 1, w, h);

    let gx = (tr + 2.0 * r + br) - (tl + 2.0 * l + bl);
    let gy = (bl + 2.0 * b + br) - (tl + 2.0 * t + tr);
    let mag = clamp(sqrt(gx * gx + gy * gy), 0.0, 1.0);

    textureStore(dst_tex, vec2<i32>(x, y), vec4<f32>(mag, mag, mag, 1.0));
}
"#;

// Separable Gaussian, horizontal pass. Taps come from the uniform weight
// table; radius is runtime-chosen, so the loop stays a loop here.
const BLUR_H_SHADER_SRC: &str = r#"
struct BlurParams {
    width: f32,
    height: f32,
    radius: f32,
    _pad: f32,
    weights: array<vec4<f32>, 8>,
};

@group(0) @binding(0)
var src_tex: texture_2d<f32>;
@group(0) @binding(1)
var dst_tex: texture_storage_2d<rgba8unorm, write>;
@group(0) @binding(2)
var<uniform> params: BlurParams;

fn sample_h(cx: i32, y: i32, offset: i32, w: i32) -> vec4<f32> {
    let sx = clamp(cx + offset, 0, w - 1);
    return textureLoad(src_tex, vec2<i32>(sx, y), 0);
}

fn weight_at(i: u32) -> f32 {
    return params.weights[i / 4u][i % 4u];
}

@compute @workgroup_size(16, 16, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let w = i32(params.width + 0.5);
    let h = i32(params.height + 0.5);
    if (i32(gid.x) >= w || i32(gid.y) >= h) {
        return;
    }

    let radius = i32(params.radius + 0.5);
    let cx = i32(gid.x);
    let y = i32(gid.y);
    var acc = sample_h(cx, y, 0, w) * weight_at(0u);
    var i = 1;
    loop {
        if (i > radius) {
            break;
        }
        let wt = weight_at(u32(i));
        acc = acc + (sample_h(cx, y, -i, w) + sample_h(cx, y, i, w)) * wt;
        i = i + 1;
    }
    textureStore(dst_tex, vec2<i32>(cx, y), acc);
}
"#;

// Separable Gaussian, vertical pass.
const BLUR_V_SHADER_SRC: &str = r#"
struct BlurParams {
    width: f32,
    height: f32,
    radius: f32,
    _pad: f32,
    weights: array<vec4<f32>, 8>,
};

@group(0) @binding(0)
var src_tex: texture_2d<f32>;
@group(0) @binding(1)
var dst_tex: texture_storage_2d<rgba8unorm, write>;
@group(0) @binding(2)
var<uniform> params: BlurParams;

fn sample_v(x: i32, cy: i32, offset: i32, h: i32) -> vec4<f32> {
    let sy = clamp(cy + offset, 0, h - 1);
    return textureLoad(src_tex, vec2<i32>(x, sy), 0);
}

fn weight_at(i: u32) -> f32 {
    return params.weights[i / 4u][i % 4u];
}

@compute @workgroup_size(16, 16, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let w = i32(params.width + 0.5);
    let h = i32(params.height + 0.5);
    if (i32(gid.x) >= w || i32(gid.y) >= h) {
        return;
    }

    let radius = i32(params.radius + 0.5);
    let x = i32(gid.x);
    let cy = i32(gid.y);
    var acc = sample_v(x, cy, 0, h) * weight_at(0u);
    var i = 1;
    loop {
        if (i > radius) {
            break;
        }
        let wt = weight_at(u32(i));
        acc = acc + (sample_v(x, cy, -i, h) + sample_v(x, cy, i, h)) * wt;
        i = i + 1;
    }
    textureStore(dst_tex, vec2<i32>(x, cy), acc);
}
"#;

#[cfg(test)]
mod tests {
    use super::{MAX_BLUR_RADIUS, blur_radius, gaussian_weights};

    #[test]
    fn radius_tracks_sigma_and_caps_at_table_size() {
        assert_eq!(blur_radius(1.0), 3);
        assert_eq!(blur_radius(5.0), 15);
        assert_eq!(blur_radius(100.0), MAX_BLUR_RADIUS);
        assert!(blur_radius(0.1) >= 1);
    }

    #[test]
    fn weights_normalize_over_the_full_mirrored_kernel() {
        for sigma in [1.0_f32, 5.0, 60.0] {
            let radius = blur_radius(sigma);
            let w = gaussian_weights(sigma, radius);
            let total = w[0] + 2.0 * w[1..=radius as usize].iter().sum::<f32>();
            assert!(
                (total - 1.0).abs() < 1e-4,
                "sigma {} kernel sums to {}",
                sigma,
                total
            );
        }
    }

    #[test]
    fn weights_decrease_away_from_center_and_stop_at_radius() {
        let radius = blur_radius(2.0);
        let w = gaussian_weights(2.0, radius);
        for i in 1..=radius as usize {
            assert!(w[i] <= w[i - 1]);
            assert!(w[i] > 0.0);
        }
        for &tail in &w[radius as usize + 1..] {
            assert_eq!(tail, 0.0);
        }
    }
}
