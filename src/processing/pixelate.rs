use crate::error::FilterError;
use crate::processing::gpu::{
    GpuContext, PipelineBundle, create_pipeline_bundle, tex_storage_uniform_entries, u32s_as_bytes,
};
use crate::processing::{TextureSet, WORKGROUP_SIZE};

/// Single-pass pixelation: every texel takes the color of its block anchor.
pub struct PixelatePass {
    bundle: PipelineBundle,
}

impl PixelatePass {
    pub fn new(gpu: &GpuContext) -> Self {
        let entries = tex_storage_uniform_entries();
        PixelatePass {
            bundle: create_pipeline_bundle(&gpu.device, "pixelate", PIXELATE_SHADER_SRC, &entries),
        }
    }

    pub fn run(
        &self,
        gpu: &GpuContext,
        textures: &TextureSet,
        parameter: u32,
    ) -> Result<(), FilterError> {
        // One-element scalar parameter, padded to a 16-byte uniform.
        let params: [u32; 4] = [parameter, 0, 0, 0];
        let params_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pixelate_params"),
            size: std::mem::size_of_val(&params) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        gpu.queue
            .write_buffer(&params_buffer, 0, u32s_as_bytes(&params));

        let input_view = textures
            .input
            .create_view(&wgpu::TextureViewDescriptor::default());
        let output_view = textures
            .output
            .create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pixelate_bg"),
            layout: &self.bundle.bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&input_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&output_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        let (groups_x, groups_y) = dispatch_groups(textures.width, textures.height);
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("pixelate_encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("pixelate_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.bundle.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }
        gpu.queue.submit([encoder.finish()]);
        let _ = gpu.device.poll(wgpu::Maintain::wait());
        Ok(())
    }
}

/// Workgroup counts for the pixelate dispatch.
///
/// Truncating division: when a dimension is not a multiple of 16, the
/// bottom/right border strip is never dispatched and those output texels
/// keep their allocation default. Inherited tiling behavior, kept as-is.
pub fn dispatch_groups(width: u32, height: u32) -> (u32, u32) {
    (width / WORKGROUP_SIZE, height / WORKGROUP_SIZE)
}

// The kernel reads the top-left texel of the block the invocation falls in.
// The anchor never exceeds the invocation's own coordinate, so the truncated
// grid needs no bounds check.
const PIXELATE_SHADER_SRC: &str = r#"
struct PixelateParams {
    size: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
};

@group(0) @binding(0)
var src_tex: texture_2d<f32>;
@group(0) @binding(1)
var dst_tex: texture_storage_2d<rgba8unorm, write>;
@group(0) @binding(2)
var<uniform> params: PixelateParams;

@compute @workgroup_size(16, 16, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let size = max(params.size, 1u);
    let anchor = (gid.xy / size) * size;
    let color = textureLoad(src_tex, vec2<i32>(anchor), 0);
    textureStore(dst_tex, vec2<i32>(gid.xy), color);
}
"#;

#[cfg(test)]
mod tests {
    use super::dispatch_groups;

    #[test]
    fn exact_multiples_cover_the_full_texture() {
        assert_eq!(dispatch_groups(256, 256), (16, 16));
        assert_eq!(dispatch_groups(512, 384), (32, 24));
    }

    #[test]
    fn non_multiples_truncate_and_leave_a_border_strip() {
        let (gx, gy) = dispatch_groups(250, 250);
        assert_eq!((gx, gy), (15, 15));
        // Covered region ends at 240; texels in [240, 250) are never written.
        assert_eq!(gx * 16, 240);
    }

    #[test]
    fn dimensions_below_one_tile_dispatch_nothing() {
        assert_eq!(dispatch_groups(15, 100), (0, 6));
        assert_eq!(dispatch_groups(8, 8), (0, 0));
    }
}
