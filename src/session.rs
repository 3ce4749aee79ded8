//! Interactive session state and the handlers that drive the compositor and
//! the history store.

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::compositor::{self, Anchor, Opacity};
use crate::error::{Error, Result, Selection};
use crate::export;
use crate::history::{DeleteReport, HistoryStore, RecordId};
use crate::preview;

/// Result of a successful export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    /// Where the watermarked image was written.
    pub output_path: PathBuf,
    /// History row created for it.
    pub record_id: RecordId,
}

/// Current selections and controls of one user session.
#[derive(Debug, Clone)]
pub struct Session {
    image: Option<PathBuf>,
    watermark: Option<PathBuf>,
    opacity: Opacity,
    anchor: Anchor,
    preview: Option<RgbaImage>,
}

impl Session {
    /// Start with nothing selected.
    #[must_use]
    pub fn new(opacity: Opacity, anchor: Anchor) -> Self {
        Self {
            image: None,
            watermark: None,
            opacity,
            anchor,
            preview: None,
        }
    }

    /// Select the base image. Only PNG and JPEG files are accepted.
    ///
    /// The path must be valid UTF-8 because its base name becomes the
    /// history entry of the export.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for other extensions and for
    /// non-UTF-8 paths.
    pub fn select_image(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        if !export::is_supported_image(&path) {
            return Err(Error::UnsupportedFormat(format!(
                "{} (expected PNG or JPEG)",
                path.display()
            )));
        }
        if path.to_str().is_none() {
            return Err(Error::UnsupportedFormat(format!(
                "{} (path is not valid UTF-8)",
                path.display()
            )));
        }
        self.image = Some(path);
        Ok(())
    }

    /// Select the watermark. Only PNG files are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for other extensions.
    pub fn select_watermark(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        if !export::is_supported_watermark(&path) {
            return Err(Error::UnsupportedFormat(format!(
                "{} (watermark must be PNG)",
                path.display()
            )));
        }
        self.watermark = Some(path);
        Ok(())
    }

    /// Selected base image, if any.
    #[must_use]
    pub fn image(&self) -> Option<&Path> {
        self.image.as_deref()
    }

    /// Selected watermark, if any.
    #[must_use]
    pub fn watermark(&self) -> Option<&Path> {
        self.watermark.as_deref()
    }

    /// Change the watermark opacity.
    pub fn set_opacity(&mut self, opacity: Opacity) {
        self.opacity = opacity;
    }

    /// Current watermark opacity.
    #[must_use]
    pub fn opacity(&self) -> Opacity {
        self.opacity
    }

    /// Change the corner the watermark is pinned to.
    pub fn set_anchor(&mut self, anchor: Anchor) {
        self.anchor = anchor;
    }

    /// Current anchor.
    #[must_use]
    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    /// Last successfully rendered preview.
    #[must_use]
    pub fn preview(&self) -> Option<&RgbaImage> {
        self.preview.as_ref()
    }

    fn selection(&self) -> Result<(&Path, &Path)> {
        let image = self
            .image()
            .ok_or(Error::MissingSelection(Selection::Image))?;
        let watermark = self
            .watermark()
            .ok_or(Error::MissingSelection(Selection::Watermark))?;
        Ok((image, watermark))
    }

    /// Re-render the preview from the current selections and controls.
    ///
    /// Returns `Ok(false)` without touching the preview while either
    /// selection is missing. On error the previous preview is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if either image cannot be decoded.
    pub fn refresh_preview(&mut self) -> Result<bool> {
        let Ok((image_path, watermark_path)) = self.selection() else {
            return Ok(false);
        };

        let base = image::open(image_path)?;
        let mark = image::open(watermark_path)?;
        self.preview = Some(preview::render(&base, &mark, self.opacity, self.anchor));
        Ok(true)
    }

    /// Composite the selections, write the result into `output_dir` and
    /// record it in `store`.
    ///
    /// The output keeps the base image's file name, replacing any earlier
    /// export of the same name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingSelection`] before touching the disk if either
    /// selection is missing, and any decode, write or database error after.
    pub fn export(&self, store: &HistoryStore, output_dir: &Path) -> Result<ExportOutcome> {
        let (image_path, watermark_path) = self.selection()?;

        let base = image::open(image_path)?;
        let mark = image::open(watermark_path)?;
        let composite = compositor::composite(&base, &mark, self.opacity, self.anchor);

        let output_path = export::output_path(image_path, output_dir)?;
        let file_name = output_path.to_str().ok_or_else(|| {
            Error::UnsupportedFormat(format!(
                "{} (path is not valid UTF-8)",
                output_path.display()
            ))
        })?;
        if !output_dir.exists() {
            fs::create_dir_all(output_dir)?;
        }
        export::save_composite(&composite, &output_path)?;

        let record_id = store.record(file_name)?;
        log::info!(
            "watermarked {} -> {} ({}, alpha {})",
            image_path.display(),
            output_path.display(),
            self.anchor,
            self.opacity.level()
        );

        Ok(ExportOutcome {
            output_path,
            record_id,
        })
    }
}

/// Delete `file_name` from disk and history once `confirm` agrees.
///
/// Returns `Ok(None)` if the user declined.
///
/// # Errors
///
/// Returns an error if the history table cannot be written.
pub fn delete_confirmed<F>(
    store: &HistoryStore,
    file_name: &str,
    confirm: F,
) -> Result<Option<DeleteReport>>
where
    F: FnOnce(&str) -> bool,
{
    if !confirm(file_name) {
        log::debug!("deletion of {file_name} cancelled");
        return Ok(None);
    }
    store.delete(file_name).map(Some)
}
