//! Downscaled preview of a composite.

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};

use crate::compositor::{self, Anchor, Opacity};

/// Edge of the square box a preview must fit in.
pub const PREVIEW_BOX: u32 = 300;

/// Dimensions that fit `width` x `height` inside a `max` x `max` box.
///
/// Aspect ratio is preserved and images already inside the box keep their
/// size.
#[must_use]
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }

    let (w, h, max) = (u64::from(width), u64::from(height), u64::from(max));
    let (nw, nh) = if w >= h {
        (max, (h * max + w / 2) / w)
    } else {
        ((w * max + h / 2) / h, max)
    };

    let clamp = |v: u64| u32::try_from(v.max(1)).unwrap_or(u32::MAX);
    (clamp(nw), clamp(nh))
}

/// Composite and shrink the result to fit the preview box.
#[must_use]
pub fn render(
    base: &DynamicImage,
    watermark: &DynamicImage,
    opacity: Opacity,
    anchor: Anchor,
) -> RgbaImage {
    let full = compositor::composite(base, watermark, opacity, anchor);
    let (w, h) = fit_within(full.width(), full.height(), PREVIEW_BOX);
    if (w, h) == full.dimensions() {
        return full;
    }
    imageops::resize(&full, w, h, FilterType::CatmullRom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn fit_within_preserves_aspect_ratio() {
        assert_eq!(fit_within(1200, 600, 300), (300, 150));
        assert_eq!(fit_within(600, 1200, 300), (150, 300));
        assert_eq!(fit_within(900, 900, 300), (300, 300));
        assert_eq!(fit_within(1000, 333, 300), (300, 100));
    }

    #[test]
    fn fit_within_never_enlarges() {
        assert_eq!(fit_within(120, 80, 300), (120, 80));
        assert_eq!(fit_within(300, 300, 300), (300, 300));
    }

    #[test]
    fn fit_within_keeps_at_least_one_pixel() {
        assert_eq!(fit_within(10_000, 1, 300), (300, 1));
    }

    #[test]
    fn render_fits_preview_box() {
        let base = DynamicImage::ImageRgba8(RgbaImage::from_pixel(800, 400, Rgba([0, 0, 0, 255])));
        let wm = DynamicImage::ImageRgba8(RgbaImage::from_pixel(64, 64, Rgba([255, 255, 255, 255])));
        let preview = render(&base, &wm, Opacity::OPAQUE, Anchor::TopLeft);
        assert_eq!(preview.dimensions(), (300, 150));
    }

    #[test]
    fn render_downscales_with_bicubic_filter() {
        let mut photo = RgbaImage::new(600, 600);
        for (x, y, px) in photo.enumerate_pixels_mut() {
            let v = if (x / 3 + y / 3) % 2 == 0 { 0 } else { 255 };
            *px = Rgba([v, v, v, 255]);
        }
        let base = DynamicImage::ImageRgba8(photo);
        let wm = DynamicImage::ImageRgba8(RgbaImage::from_pixel(100, 100, Rgba([255, 0, 0, 255])));

        let full = compositor::composite(&base, &wm, Opacity::OPAQUE, Anchor::BottomLeft);
        let expected = imageops::resize(&full, 300, 300, FilterType::CatmullRom);
        assert_eq!(render(&base, &wm, Opacity::OPAQUE, Anchor::BottomLeft), expected);
    }
}
