//! Error types for the photo-watermark crate.

/// Which selection was missing when an export was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// No base image has been selected.
    Image,
    /// No watermark image has been selected.
    Watermark,
}

impl std::fmt::Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => f.write_str("image"),
            Self::Watermark => f.write_str("watermark"),
        }
    }
}

/// Errors that can occur while compositing, exporting or recording history.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An image or watermark must be selected before exporting.
    #[error("no {0} selected: please select an image and a watermark")]
    MissingSelection(Selection),

    /// Opacity percentage outside `0..=100`.
    #[error("opacity {0}% is out of range (0-100)")]
    OpacityOutOfRange(u8),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred during image processing (load, save, encode).
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// The history database could not be read or written.
    #[error("history database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The configuration file could not be parsed.
    #[error("invalid configuration file: {0}")]
    Config(#[from] toml::de::Error),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let db_err = Error::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(db_err.to_string().starts_with("history database error"));

        let toml_err = toml::from_str::<toml::Table>("opacity = ").unwrap_err();
        let config_err = Error::from(toml_err);
        assert!(matches!(config_err, Error::Config(_)));
        assert!(config_err.to_string().starts_with("invalid configuration file"));

        let missing = Error::MissingSelection(Selection::Watermark);
        assert!(missing.to_string().starts_with("no watermark selected"));

        assert!(Error::OpacityOutOfRange(140).to_string().contains("140%"));
    }
}
