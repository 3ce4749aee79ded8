//! Watermark compositing.
//!
//! The watermark is scaled to a fixed 100x100 tile, its alpha channel is
//! collapsed to a single opacity level, and the tile is pasted into one of the
//! four corners of the base image with a 10px margin:
//!
//! `out = (wm * a + base * (255 - a)) / 255`, where `a` is the tile's alpha.

use std::fmt;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};

use crate::error::{Error, Result};

/// Edge length of the square watermark tile in pixels.
pub const WATERMARK_SIZE: u32 = 100;

/// Distance between the watermark tile and the image edges.
pub const MARGIN: u32 = 10;

/// Alpha level applied to every visible watermark pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opacity(u8);

impl Opacity {
    /// Fully opaque watermark.
    pub const OPAQUE: Self = Self(u8::MAX);

    /// Build from a raw alpha level in `0..=255`.
    #[must_use]
    pub const fn new(level: u8) -> Self {
        Self(level)
    }

    /// Build from a percentage in `0..=100`, scaled with `percent * 255 / 100`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OpacityOutOfRange`] if `percent` exceeds 100.
    pub fn from_percent(percent: u8) -> Result<Self> {
        if percent > 100 {
            return Err(Error::OpacityOutOfRange(percent));
        }
        let level = u16::from(percent) * 255 / 100;
        Ok(Self(u8::try_from(level).unwrap_or(u8::MAX)))
    }

    /// The alpha level in `0..=255`.
    #[must_use]
    pub const fn level(self) -> u8 {
        self.0
    }
}

/// Corner of the base image the watermark is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Anchor {
    /// Upper left corner.
    #[default]
    TopLeft,
    /// Upper right corner.
    TopRight,
    /// Lower left corner.
    BottomLeft,
    /// Lower right corner.
    BottomRight,
}

impl Anchor {
    /// All anchors, in display order.
    pub const ALL: [Self; 4] = [
        Self::TopLeft,
        Self::TopRight,
        Self::BottomLeft,
        Self::BottomRight,
    ];

    /// Canonical name, e.g. `Top-Left`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TopLeft => "Top-Left",
            Self::TopRight => "Top-Right",
            Self::BottomLeft => "Bottom-Left",
            Self::BottomRight => "Bottom-Right",
        }
    }

    /// Top-left corner of the watermark tile on a `width` x `height` canvas.
    ///
    /// Offsets are not clamped: on canvases narrower or shorter than
    /// `WATERMARK_SIZE + MARGIN` the far-side anchors go negative.
    #[must_use]
    pub fn offset(self, width: u32, height: u32) -> (i64, i64) {
        let near = i64::from(MARGIN);
        let far_x = i64::from(width) - i64::from(WATERMARK_SIZE + MARGIN);
        let far_y = i64::from(height) - i64::from(WATERMARK_SIZE + MARGIN);
        match self {
            Self::TopLeft => (near, near),
            Self::TopRight => (far_x, near),
            Self::BottomLeft => (near, far_y),
            Self::BottomRight => (far_x, far_y),
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when an anchor name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown anchor '{0}' (expected Top-Left, Top-Right, Bottom-Left or Bottom-Right)")]
pub struct ParseAnchorError(String);

impl FromStr for Anchor {
    type Err = ParseAnchorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "top-left" => Ok(Self::TopLeft),
            "top-right" => Ok(Self::TopRight),
            "bottom-left" => Ok(Self::BottomLeft),
            "bottom-right" => Ok(Self::BottomRight),
            _ => Err(ParseAnchorError(s.to_string())),
        }
    }
}

/// Collapse the alpha channel to a single level.
///
/// Pixels with any alpha become `opacity`; fully transparent pixels stay at 0.
#[must_use]
pub fn apply_opacity(mut watermark: RgbaImage, opacity: Opacity) -> RgbaImage {
    for px in watermark.pixels_mut() {
        if px[3] > 0 {
            px[3] = opacity.level();
        }
    }
    watermark
}

fn premultiply(img: &mut RgbaImage) {
    for px in img.pixels_mut() {
        let a = u32::from(px[3]);
        for ch in 0..3 {
            let v = (u32::from(px[ch]) * a + 127) / 255;
            px[ch] = u8::try_from(v).unwrap_or(u8::MAX);
        }
    }
}

fn unpremultiply(img: &mut RgbaImage) {
    for px in img.pixels_mut() {
        let a = u32::from(px[3]);
        if a == 0 {
            px.0 = [0; 4];
            continue;
        }
        for ch in 0..3 {
            let v = (u32::from(px[ch]) * 255 + a / 2) / a;
            px[ch] = u8::try_from(v).unwrap_or(u8::MAX);
        }
    }
}

/// Scale the watermark to the fixed tile size and apply `opacity`.
///
/// Resampling runs on premultiplied color so transparent pixels do not bleed
/// into the edges of the logo.
#[must_use]
pub fn prepare_watermark(watermark: &DynamicImage, opacity: Opacity) -> RgbaImage {
    let mut source = watermark.to_rgba8();
    premultiply(&mut source);
    let mut tile = imageops::resize(
        &source,
        WATERMARK_SIZE,
        WATERMARK_SIZE,
        FilterType::CatmullRom,
    );
    unpremultiply(&mut tile);
    apply_opacity(tile, opacity)
}

/// Blend one channel of `src` over `dst` with mask value `mask`.
fn blend(src: u8, dst: u8, mask: u8) -> u8 {
    let m = u32::from(mask);
    let tmp = u32::from(src) * m + u32::from(dst) * (255 - m) + 128;
    u8::try_from((tmp + (tmp >> 8)) >> 8).unwrap_or(u8::MAX)
}

/// Paste `tile` onto `canvas` at (`x`, `y`), masked by the tile's own alpha.
///
/// Every channel, alpha included, is blended by the mask, so a
/// half-transparent watermark also lowers the canvas alpha under it. Tile
/// pixels outside the canvas are clipped.
pub fn paste_masked(canvas: &mut RgbaImage, tile: &RgbaImage, x: i64, y: i64) {
    let canvas_w = i64::from(canvas.width());
    let canvas_h = i64::from(canvas.height());

    for (dx, dy, src) in tile.enumerate_pixels() {
        let mask = src[3];
        if mask == 0 {
            continue;
        }

        let cx = x + i64::from(dx);
        let cy = y + i64::from(dy);
        if cx < 0 || cy < 0 || cx >= canvas_w || cy >= canvas_h {
            continue;
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let dst = canvas.get_pixel_mut(cx as u32, cy as u32);
        for ch in 0..4 {
            dst[ch] = blend(src[ch], dst[ch], mask);
        }
    }
}

/// Composite `watermark` onto `base` at `anchor` with `opacity`.
///
/// The result has the base image's dimensions and always carries an alpha
/// channel; flattening for formats without transparency happens at export.
#[must_use]
pub fn composite(
    base: &DynamicImage,
    watermark: &DynamicImage,
    opacity: Opacity,
    anchor: Anchor,
) -> RgbaImage {
    let mut canvas = RgbaImage::new(base.width(), base.height());
    imageops::replace(&mut canvas, &base.to_rgba8(), 0, 0);

    let tile = prepare_watermark(watermark, opacity);
    let (x, y) = anchor.offset(canvas.width(), canvas.height());
    log::debug!(
        "compositing {}x{} watermark at ({x}, {y}) on {}x{} canvas, alpha {}",
        tile.width(),
        tile.height(),
        canvas.width(),
        canvas.height(),
        opacity.level()
    );
    paste_masked(&mut canvas, &tile, x, y);
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)))
    }

    #[test]
    fn opacity_masking_is_binary() {
        let mut wm = RgbaImage::new(4, 1);
        for (x, alpha) in (0u32..).zip([0u8, 1, 128, 255]) {
            wm.put_pixel(x, 0, Rgba([10, 20, 30, alpha]));
        }

        let out = apply_opacity(wm, Opacity::new(77));
        let alphas: Vec<u8> = out.pixels().map(|p| p[3]).collect();
        assert_eq!(alphas, vec![0, 77, 77, 77]);
        assert_eq!(out.get_pixel(2, 0).0[..3], [10, 20, 30]);
    }

    #[test]
    fn percent_opacity_scales_to_alpha_level() {
        assert_eq!(Opacity::from_percent(0).unwrap().level(), 0);
        assert_eq!(Opacity::from_percent(50).unwrap().level(), 127);
        assert_eq!(Opacity::from_percent(100).unwrap().level(), 255);
        assert!(matches!(
            Opacity::from_percent(101),
            Err(Error::OpacityOutOfRange(101))
        ));
    }

    #[test]
    fn anchor_offsets_follow_margin_rule() {
        assert_eq!(Anchor::TopLeft.offset(640, 480), (10, 10));
        assert_eq!(Anchor::TopRight.offset(640, 480), (530, 10));
        assert_eq!(Anchor::BottomLeft.offset(640, 480), (10, 370));
        assert_eq!(Anchor::BottomRight.offset(640, 480), (530, 370));
    }

    #[test]
    fn anchor_offsets_go_negative_on_small_images() {
        assert_eq!(Anchor::BottomRight.offset(50, 60), (-60, -50));
    }

    #[test]
    fn anchor_parses_canonical_and_loose_names() {
        assert_eq!("Top-Left".parse::<Anchor>().unwrap(), Anchor::TopLeft);
        assert_eq!("bottom_right".parse::<Anchor>().unwrap(), Anchor::BottomRight);
        assert_eq!("top right".parse::<Anchor>().unwrap(), Anchor::TopRight);
        assert!("middle".parse::<Anchor>().is_err());
        for anchor in Anchor::ALL {
            assert_eq!(anchor.to_string().parse::<Anchor>().unwrap(), anchor);
        }
    }

    #[test]
    fn blend_extremes() {
        assert_eq!(blend(200, 40, 255), 200);
        assert_eq!(blend(200, 40, 0), 40);
        assert_eq!(blend(255, 0, 128), 128);
    }

    #[test]
    fn bottom_right_watermark_lands_at_expected_corner() {
        let base = solid(300, 200, [0, 0, 0, 255]);
        let wm = solid(100, 100, [255, 255, 255, 255]);
        let out = composite(&base, &wm, Opacity::OPAQUE, Anchor::BottomRight);

        assert_eq!(out.dimensions(), (300, 200));
        assert_eq!(out.get_pixel(190, 90), &Rgba([255, 255, 255, 255]));
        assert_eq!(out.get_pixel(289, 189), &Rgba([255, 255, 255, 255]));
        assert_eq!(out.get_pixel(189, 90), &Rgba([0, 0, 0, 255]));
        assert_eq!(out.get_pixel(190, 89), &Rgba([0, 0, 0, 255]));
        assert_eq!(out.get_pixel(290, 190), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn transparent_watermark_leaves_base_untouched() {
        let base = solid(150, 150, [12, 34, 56, 255]);
        let wm = solid(100, 100, [255, 0, 0, 0]);
        let out = composite(&base, &wm, Opacity::OPAQUE, Anchor::TopLeft);
        assert_eq!(out, base.to_rgba8());
    }

    #[test]
    fn zero_opacity_leaves_base_untouched() {
        let base = solid(150, 150, [12, 34, 56, 255]);
        let wm = solid(100, 100, [255, 0, 0, 255]);
        let out = composite(&base, &wm, Opacity::new(0), Anchor::TopLeft);
        assert_eq!(out, base.to_rgba8());
    }

    #[test]
    fn partial_opacity_blends_over_base() {
        let base = solid(150, 150, [0, 0, 0, 255]);
        let wm = solid(100, 100, [255, 255, 255, 255]);
        let out = composite(&base, &wm, Opacity::new(128), Anchor::TopLeft);
        let px = out.get_pixel(50, 50);
        assert_eq!(px[0], 128);
        // alpha is blended like a color: (128 * 128 + 255 * 127) / 255
        assert_eq!(px[3], 191);
        assert_eq!(out.get_pixel(5, 5), &Rgba([0, 0, 0, 255]));

        let clear = solid(150, 150, [0, 0, 0, 0]);
        let out = composite(&clear, &wm, Opacity::new(128), Anchor::TopLeft);
        assert_eq!(out.get_pixel(50, 50)[3], 64);
        assert_eq!(out.get_pixel(5, 5)[3], 0);
    }

    #[test]
    fn resized_logo_has_no_dark_fringe() {
        let mut logo = RgbaImage::new(200, 200);
        for (x, _, px) in logo.enumerate_pixels_mut() {
            if x >= 100 {
                *px = Rgba([255, 255, 255, 255]);
            }
        }

        let tile = prepare_watermark(&DynamicImage::ImageRgba8(logo), Opacity::OPAQUE);
        let visible: Vec<&Rgba<u8>> = tile.pixels().filter(|p| p[3] > 0).collect();
        assert!(!visible.is_empty());
        for px in visible {
            assert_eq!(px.0, [255, 255, 255, 255]);
        }
        assert_eq!(tile.get_pixel(10, 50)[3], 0);
    }

    #[test]
    fn small_canvas_clips_instead_of_panicking() {
        let base = solid(30, 30, [0, 0, 0, 255]);
        let wm = solid(100, 100, [255, 255, 255, 255]);
        let out = composite(&base, &wm, Opacity::OPAQUE, Anchor::BottomRight);

        // tile spans (-80..20, -80..20)
        assert_eq!(out.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(out.get_pixel(19, 19), &Rgba([255, 255, 255, 255]));
        assert_eq!(out.get_pixel(20, 20), &Rgba([0, 0, 0, 255]));
    }
}
