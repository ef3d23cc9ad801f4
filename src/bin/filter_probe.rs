use std::fs;
use std::io::BufWriter;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use image::codecs::png::PngEncoder;

#[path = "../asset.rs"]
mod asset;
#[path = "../error.rs"]
mod error;
#[path = "../processing/mod.rs"]
mod processing;

use processing::gpu::GpuContext;
use processing::{FilterKind, FilterStrategy, TextureSet};

const PARAMETER_SWEEP: [u32; 4] = [10, 30, 60, 90];

fn median_ms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) * 0.5
    } else {
        sorted[mid]
    }
}

fn probe_kind(gpu: &GpuContext, kind: FilterKind, out_dir: &Path) -> Result<f64> {
    let source = asset::load_bundled()?;
    let mut strategy = FilterStrategy::new(gpu, kind);
    let textures = TextureSet::upload(gpu, &source, strategy.needs_intermediate())?;

    let mut samples = Vec::with_capacity(PARAMETER_SWEEP.len());
    let mut last_frame = None;
    for parameter in PARAMETER_SWEEP {
        let t0 = Instant::now();
        strategy.run(gpu, &textures, parameter)?;
        let frame = textures.read_back(gpu)?;
        samples.push(t0.elapsed().as_secs_f64() * 1000.0);
        last_frame = Some((parameter, frame));
    }

    if let Some((parameter, frame)) = last_frame {
        let output = out_dir.join(format!("{}-{}.png", kind.label(), parameter));
        let file = fs::File::create(&output)
            .with_context(|| format!("create output failed {}", output.display()))?;
        let writer = BufWriter::new(file);
        let encoder = PngEncoder::new(writer);
        image::DynamicImage::ImageRgba8(frame)
            .write_with_encoder(encoder)
            .with_context(|| format!("png encode failed {}", output.display()))?;
        println!("METRIC {}_out={}", kind.label(), output.display());
    }

    Ok(median_ms(&samples))
}

fn main() -> Result<()> {
    let out_dir = std::env::temp_dir().join(format!(
        "filterview-probe-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    ));
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("create_dir_all {}", out_dir.display()))?;

    let gpu = GpuContext::new().context("GPU context init failed")?;
    eprintln!("Using {}", gpu.adapter_summary());

    for kind in [FilterKind::Pixelate, FilterKind::EdgeBlur] {
        let median = probe_kind(&gpu, kind, &out_dir)
            .with_context(|| format!("probe failed for {}", kind.label()))?;
        println!("METRIC {}_run_ms_median={:.2}", kind.label(), median);
    }
    println!("METRIC out_dir={}", out_dir.display());

    Ok(())
}
