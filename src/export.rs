//! Writing composites to disk.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::error::{Error, Result};

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Check if a file can be used as the base image (PNG or JPEG).
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    matches!(extension(path).as_deref(), Some("png" | "jpg" | "jpeg"))
}

/// Check if a file can be used as a watermark (PNG only).
#[must_use]
pub fn is_supported_watermark(path: &Path) -> bool {
    extension(path).as_deref() == Some("png")
}

/// Output path for `input` inside `output_dir`: the directory joined with the
/// input's base name.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] if `input` has no file name.
pub fn output_path(input: &Path, output_dir: &Path) -> Result<PathBuf> {
    let name = input
        .file_name()
        .ok_or_else(|| Error::UnsupportedFormat(format!("no file name in {}", input.display())))?;
    Ok(output_dir.join(name))
}

/// Save a composite, flattening alpha for JPEG targets.
///
/// The target format follows the extension of `path`. An existing file is
/// overwritten.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_composite(img: &RgbaImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    match format {
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(img.clone()).to_rgb8();
            let file = std::fs::File::create(path)?;
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 95);
            encoder.encode_image(&rgb)?;
        }
        ImageFormat::Png => {
            img.save_with_format(path, ImageFormat::Png)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    log::debug!("wrote {} ({:?})", path.display(), format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_supported_image_accepts_png_and_jpeg() {
        assert!(is_supported_image(Path::new("photo.jpg")));
        assert!(is_supported_image(Path::new("photo.JPEG")));
        assert!(is_supported_image(Path::new("photo.png")));
    }

    #[test]
    fn is_supported_image_rejects_other_formats() {
        assert!(!is_supported_image(Path::new("photo.webp")));
        assert!(!is_supported_image(Path::new("photo.gif")));
        assert!(!is_supported_image(Path::new("photo")));
    }

    #[test]
    fn watermark_must_be_png() {
        assert!(is_supported_watermark(Path::new("logo.PNG")));
        assert!(!is_supported_watermark(Path::new("logo.jpg")));
    }

    #[test]
    fn output_path_uses_base_name() {
        let p = output_path(Path::new("/home/me/photos/cat.jpg"), Path::new("out")).unwrap();
        assert_eq!(p, PathBuf::from("out/cat.jpg"));
    }
}
