use std::sync::mpsc;

use image::RgbaImage;

use crate::error::FilterError;
use crate::processing::gpu::GpuContext;

const BYTES_PER_PIXEL: u32 = 4;

/// The GPU-resident textures for one imported image: the immutable input,
/// an intermediate target for the compound filter's first pass, and the
/// output the readback reads from. All share dimensions and Rgba8Unorm.
pub struct TextureSet {
    pub input: wgpu::Texture,
    pub intermediate: Option<wgpu::Texture>,
    pub output: wgpu::Texture,
    pub width: u32,
    pub height: u32,
}

impl TextureSet {
    /// Upload a decoded image and allocate the companion render targets.
    ///
    /// Replaces nothing by itself; the caller drops any previous set, which
    /// releases the old GPU allocations.
    pub fn upload(
        gpu: &GpuContext,
        source: &RgbaImage,
        with_intermediate: bool,
    ) -> Result<Self, FilterError> {
        let width = source.width();
        let height = source.height();
        if width == 0 || height == 0 {
            return Err(FilterError::asset("source image has zero extent"));
        }
        let max_dim = gpu.max_texture_dimension();
        if width > max_dim || height > max_dim {
            return Err(FilterError::asset(format!(
                "source image {}x{} exceeds device texture limit {}",
                width, height, max_dim
            )));
        }

        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let input = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("filterview_input"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        gpu.queue.write_texture(
            input.as_image_copy(),
            source.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width.saturating_mul(BYTES_PER_PIXEL)),
                rows_per_image: Some(height),
            },
            extent,
        );

        let intermediate = with_intermediate.then(|| {
            gpu.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("filterview_intermediate"),
                size: extent,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
        });

        let output = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("filterview_output"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        Ok(TextureSet {
            input,
            intermediate,
            output,
            width,
            height,
        })
    }

    /// Copy the output texture back to host memory and re-encode it as a
    /// displayable bitmap.
    ///
    /// The returned image is vertically mirrored relative to the raw texture
    /// readback order. The display path depends on this orientation; do not
    /// remove the flip.
    pub fn read_back(&self, gpu: &GpuContext) -> Result<RgbaImage, FilterError> {
        let unpadded_bytes_per_row = self.width.saturating_mul(BYTES_PER_PIXEL);
        let padded_bytes_per_row = pad_bytes_per_row(unpadded_bytes_per_row);
        let readback_size = padded_bytes_per_row as u64 * self.height as u64;

        let readback = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("filterview_readback"),
            size: readback_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("filterview_readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            self.output.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        gpu.queue.submit([encoder.finish()]);

        let slice = readback.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = gpu.device.poll(wgpu::Maintain::wait());
        let map_result = rx
            .recv()
            .map_err(|_| FilterError::codec("readback map callback never fired"))?;
        if let Err(err) = map_result {
            return Err(FilterError::codec(format!("readback map failed: {}", err)));
        }

        let mapped = slice.get_mapped_range();
        let pixels = repack_rows_mirrored(
            &mapped,
            self.width,
            self.height,
            padded_bytes_per_row as usize,
        );
        drop(mapped);
        readback.unmap();

        RgbaImage::from_raw(self.width, self.height, pixels)
            .ok_or_else(|| FilterError::codec("readback bytes did not form an image"))
    }
}

/// Round a row stride up to wgpu's buffer-copy alignment.
pub fn pad_bytes_per_row(unpadded: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Strip per-row padding and reverse row order in one pass.
///
/// Row reversal produces the vertically mirrored bitmap the display surface
/// expects (texture rows run top-down, the presented image bottom-up).
pub fn repack_rows_mirrored(mapped: &[u8], width: u32, height: u32, padded: usize) -> Vec<u8> {
    let unpadded = (width * BYTES_PER_PIXEL) as usize;
    let height = height as usize;
    let mut out = vec![0_u8; unpadded * height];
    for row in 0..height {
        let src_offset = row * padded;
        let dst_offset = (height - 1 - row) * unpadded;
        out[dst_offset..dst_offset + unpadded]
            .copy_from_slice(&mapped[src_offset..src_offset + unpadded]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{pad_bytes_per_row, repack_rows_mirrored};

    #[test]
    fn row_padding_rounds_up_to_copy_alignment() {
        // 256-wide RGBA rows are already aligned; 250-wide rows are not.
        assert_eq!(pad_bytes_per_row(256 * 4), 1024);
        assert_eq!(pad_bytes_per_row(250 * 4), 1024);
        assert_eq!(pad_bytes_per_row(1), wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
    }

    #[test]
    fn repack_strips_padding_and_mirrors_rows() {
        // 2x3 texture with a 256-byte padded stride; each row tagged by value.
        let width = 2_u32;
        let height = 3_u32;
        let padded = 256_usize;
        let mut mapped = vec![0xAA_u8; padded * height as usize];
        for row in 0..height as usize {
            for b in 0..8 {
                mapped[row * padded + b] = row as u8;
            }
        }

        let out = repack_rows_mirrored(&mapped, width, height, padded);
        assert_eq!(out.len(), (width * height * 4) as usize);
        // First output row is the last texture row; no padding bytes survive.
        assert!(out[..8].iter().all(|&b| b == 2));
        assert!(out[8..16].iter().all(|&b| b == 1));
        assert!(out[16..].iter().all(|&b| b == 0));
    }

    #[test]
    fn output_byte_budget_matches_dimensions() {
        let (w, h) = (256_u32, 256_u32);
        assert_eq!((w * h * 4) as usize, 262144);
    }
}
