use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::locator;

/// Default cap on simultaneous in-flight transfers.
pub const DEFAULT_MAX_PARALLEL_DOWNLOADS: usize = 32;

fn default_max_parallel_downloads() -> usize {
    DEFAULT_MAX_PARALLEL_DOWNLOADS
}

/// Loader configuration, loaded from `~/.config/lode/config.toml` or built
/// explicitly. URL-fragment fields are normalized to end with `/` when the
/// loader consumes them; the file may store them either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Prefix prepended to every relative locator (e.g. a CDN root).
    #[serde(default)]
    pub base_url: String,
    /// Secondary prefix appended after `base_url` (e.g. an asset subfolder).
    #[serde(default)]
    pub path: String,
    /// Key prefix label. No effect on scheduling.
    #[serde(default)]
    pub prefix: String,
    /// Batch label for grouping registered files. No effect on scheduling.
    #[serde(default)]
    pub file_group: String,
    /// Maximum simultaneous in-flight transfers (minimum 1 is enforced at start).
    #[serde(default = "default_max_parallel_downloads")]
    pub max_parallel_downloads: usize,
    /// Cross-origin policy value, passed through to the transport untouched.
    #[serde(default)]
    pub cross_origin: Option<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            path: String::new(),
            prefix: String::new(),
            file_group: String::new(),
            max_parallel_downloads: DEFAULT_MAX_PARALLEL_DOWNLOADS,
            cross_origin: None,
        }
    }
}

impl LoaderConfig {
    /// Returns a copy with `base_url` and `path` trailing-slash normalized.
    pub fn normalized(mut self) -> Self {
        self.base_url = locator::ensure_trailing_slash(&self.base_url);
        self.path = locator::ensure_trailing_slash(&self.path);
        self
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("lode")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<LoaderConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = LoaderConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: LoaderConfig = toml::from_str(&data)?;
    Ok(cfg)
}
