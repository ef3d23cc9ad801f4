use crate::error::FilterError;

/// GPU device, queue and adapter diagnostics, acquired once at startup and
/// owned by whichever thread runs the filter work. Components that need the
/// device receive `&GpuContext`; there is no global fallback copy.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    adapter_name: String,
    adapter_backend: String,
    adapter_driver: String,
}

impl GpuContext {
    pub fn new() -> Result<Self, FilterError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: None,
        }))
        .ok_or_else(|| FilterError::setup("no compatible GPU adapter found"))?;

        let adapter_info = adapter.get_info();
        let adapter_name = adapter_info.name;
        let adapter_backend = adapter_info.backend.to_string();
        let adapter_driver = if adapter_info.driver.trim().is_empty() {
            "unknown".to_string()
        } else {
            adapter_info.driver
        };

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("filterview_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .map_err(|err| FilterError::setup(format!("device request failed: {}", err)))?;

        Ok(GpuContext {
            device,
            queue,
            adapter_name,
            adapter_backend,
            adapter_driver,
        })
    }

    /// Human-readable adapter line for startup diagnostics and the status bar.
    pub fn adapter_summary(&self) -> String {
        format!(
            "{} ({}, driver {})",
            self.adapter_name, self.adapter_backend, self.adapter_driver
        )
    }

    /// The device's maximum 2D texture dimension.
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}

pub struct PipelineBundle {
    pub pipeline: wgpu::ComputePipeline,
    pub bgl: wgpu::BindGroupLayout,
}

pub fn create_pipeline_bundle(
    device: &wgpu::Device,
    label: &str,
    shader_src: &str,
    bgl_entries: &[wgpu::BindGroupLayoutEntry],
) -> PipelineBundle {
    let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: bgl_entries,
    });
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(shader_src.into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[&bgl],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        module: &shader,
        entry_point: Some("main"),
        cache: None,
        compilation_options: wgpu::PipelineCompilationOptions::default(),
    });
    PipelineBundle { pipeline, bgl }
}

/// Standard bind group layout entries: texture_2d input + storage_texture output + uniform buffer.
pub fn tex_storage_uniform_entries() -> [wgpu::BindGroupLayoutEntry; 3] {
    [
        wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: wgpu::TextureFormat::Rgba8Unorm,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 2,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        },
    ]
}

pub fn f32s_as_bytes(values: &[f32]) -> &[u8] {
    // f32 has no invalid bit patterns; reinterpreting as bytes is safe.
    unsafe {
        std::slice::from_raw_parts(values.as_ptr().cast::<u8>(), std::mem::size_of_val(values))
    }
}

pub fn u32s_as_bytes(values: &[u32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(values.as_ptr().cast::<u8>(), std::mem::size_of_val(values))
    }
}

#[cfg(test)]
mod tests {
    use super::{f32s_as_bytes, u32s_as_bytes};

    #[test]
    fn byte_casts_preserve_length_and_layout() {
        let floats = [1.0_f32, 0.0, -1.0];
        assert_eq!(f32s_as_bytes(&floats).len(), 12);
        assert_eq!(&f32s_as_bytes(&floats)[..4], &1.0_f32.to_ne_bytes());

        let ints = [60_u32, 0, 0, 0];
        let bytes = u32s_as_bytes(&ints);
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[..4], &60_u32.to_ne_bytes());
    }
}
