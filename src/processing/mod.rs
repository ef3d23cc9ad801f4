pub mod edge_blur;
pub mod gpu;
pub mod pixelate;
pub mod textures;

use crate::error::FilterError;
use edge_blur::EdgeBlurPass;
use gpu::GpuContext;
use pixelate::PixelatePass;
pub use textures::TextureSet;

/// Compute workgroup edge length shared by every kernel in this crate.
pub const WORKGROUP_SIZE: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Which filter the application was configured to run.
pub enum FilterKind {
    Pixelate,
    EdgeBlur,
}

impl FilterKind {
    pub fn label(self) -> &'static str {
        match self {
            FilterKind::Pixelate => "pixelate",
            FilterKind::EdgeBlur => "edge-blur",
        }
    }

    /// What the slider means for this filter.
    pub fn parameter_label(self) -> &'static str {
        match self {
            FilterKind::Pixelate => "block size",
            FilterKind::EdgeBlur => "blur sigma",
        }
    }
}

/// The filter slot: one of two mutually exclusive pipelines, chosen at
/// construction time. Pipeline-state creation happens here, up front;
/// invalid WGSL aborts through wgpu's error handler before any UI exists.
pub enum FilterStrategy {
    Pixelate(PixelatePass),
    EdgeBlur(EdgeBlurPass),
}

impl FilterStrategy {
    pub fn new(gpu: &GpuContext, kind: FilterKind) -> Self {
        match kind {
            FilterKind::Pixelate => FilterStrategy::Pixelate(PixelatePass::new(gpu)),
            FilterKind::EdgeBlur => FilterStrategy::EdgeBlur(EdgeBlurPass::new(gpu)),
        }
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            FilterStrategy::Pixelate(_) => FilterKind::Pixelate,
            FilterStrategy::EdgeBlur(_) => FilterKind::EdgeBlur,
        }
    }

    /// The compound filter needs the intermediate texture allocated at upload.
    pub fn needs_intermediate(&self) -> bool {
        matches!(self, FilterStrategy::EdgeBlur(_))
    }

    /// Run the filter over the texture set at the given parameter value.
    ///
    /// Blocks the calling thread until the GPU has finished all encoded
    /// work; the output texture holds the result when this returns.
    pub fn run(
        &mut self,
        gpu: &GpuContext,
        textures: &TextureSet,
        parameter: u32,
    ) -> Result<(), FilterError> {
        match self {
            FilterStrategy::Pixelate(pass) => pass.run(gpu, textures, parameter),
            FilterStrategy::EdgeBlur(pass) => pass.run(gpu, textures, parameter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FilterKind;

    #[test]
    fn labels_are_stable_config_values() {
        assert_eq!(FilterKind::Pixelate.label(), "pixelate");
        assert_eq!(FilterKind::EdgeBlur.label(), "edge-blur");
    }
}
