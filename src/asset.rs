use image::RgbaImage;

use crate::error::FilterError;

/// The one image this application knows how to display.
pub const BUNDLED_IMAGE: &[u8] = include_bytes!("../assets/sample.png");

/// Decode the bundled image into an RGBA8 pixel buffer.
///
/// There is deliberately no path-based loading here: the app's contract is a
/// single compiled-in asset, and a broken one is a packaging defect.
pub fn load_bundled() -> Result<RgbaImage, FilterError> {
    let decoded = image::load_from_memory_with_format(BUNDLED_IMAGE, image::ImageFormat::Png)
        .map_err(|err| FilterError::asset(format!("bundled image did not decode: {}", err)))?;
    let rgba = decoded.into_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(FilterError::asset("bundled image has zero extent"));
    }
    Ok(rgba)
}

#[cfg(test)]
mod tests {
    use super::load_bundled;

    #[test]
    fn bundled_image_decodes_with_expected_dimensions() {
        let img = load_bundled().expect("bundled sample should decode");
        assert_eq!(img.width(), 512);
        assert_eq!(img.height(), 384);
        assert_eq!(
            img.as_raw().len(),
            (img.width() * img.height() * 4) as usize
        );
    }
}
