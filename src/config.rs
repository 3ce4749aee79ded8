//! Settings loaded from `photo-watermark.toml`.
//!
//! Every field is optional in the file; missing fields fall back to the
//! defaults below and command-line flags override both.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::compositor::{Anchor, Opacity};
use crate::error::{Error, Result};

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "photo-watermark.toml";

/// Directory exported images are written to.
pub const DEFAULT_OUTPUT_DIR: &str = "output images";

/// History database file.
pub const DEFAULT_DB_FILE: &str = "history.db";

/// Opacity used when neither the file nor the command line sets one.
pub const DEFAULT_OPACITY_PERCENT: u8 = 50;

/// Resolved settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Where exported images go.
    pub output_dir: PathBuf,
    /// History database file.
    pub db_path: PathBuf,
    /// Watermark opacity in percent, `0..=100`.
    pub opacity: u8,
    /// Corner the watermark is pinned to.
    #[serde(deserialize_with = "deserialize_anchor")]
    pub anchor: Anchor,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            db_path: PathBuf::from(DEFAULT_DB_FILE),
            opacity: DEFAULT_OPACITY_PERCENT,
            anchor: Anchor::default(),
        }
    }
}

fn deserialize_anchor<'de, D>(deserializer: D) -> std::result::Result<Anchor, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    name.parse().map_err(serde::de::Error::custom)
}

impl Config {
    /// Parse settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on malformed TOML or unknown keys, and
    /// [`Error::OpacityOutOfRange`] if `opacity` exceeds 100.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.opacity()?;
        Ok(config)
    }

    /// Load settings from `path`, or from [`DEFAULT_CONFIG_FILE`] if it exists.
    ///
    /// An explicit `path` must exist; the default file is optional.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if !required && !path.exists() {
            log::debug!("no {} found, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = fs::read_to_string(&path)?;
        log::debug!("loaded settings from {}", path.display());
        Self::from_toml(&text)
    }

    /// Configured opacity as an alpha level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OpacityOutOfRange`] if `opacity` exceeds 100.
    pub fn opacity(&self) -> Result<Opacity> {
        Opacity::from_percent(self.opacity)
    }
}
