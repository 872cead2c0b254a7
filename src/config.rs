//! Client configuration.
//!
//! Layers, lowest to highest precedence:
//! 1. built-in defaults
//! 2. `config.toml` in the platform config dir (or `--config <path>`)
//! 3. `SUBSEARCH_*` environment variables (a `.env` file is honoured)
//! 4. command-line flags, applied by the caller
//!
//! ```toml
//! server_url = "http://127.0.0.1:31337/"
//! request_timeout_ms = 30000
//! default_archive = "Maldavius Figtree"
//!
//! [clip]
//! downloader = "yt-dlp"
//! format = "134+140"
//! lead_seconds = -5
//! trail_seconds = 15
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::extract::ClipSpec;
use crate::service::ServiceClientConfig;

/// Width of the `HH:MM:SS` column, subtracted from the terminal width to get
/// the requested segment width.
pub const TIMESTAMP_WIDTH: u32 = "00:00:00".len() as u32;

/// Segment width used when nothing better is known.
pub const DEFAULT_SEGMENT_WIDTH: u32 = 120;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    ParseToml(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Endpoint every request is posted to.
    pub server_url: String,
    pub request_timeout_ms: u64,
    /// Requested width of returned text segments; derived from the terminal
    /// width when unset.
    pub segment_width: Option<u32>,
    /// Archive selected on start-up instead of the first one listed.
    pub default_archive: Option<String>,
    /// Directory export documents are written to.
    pub export_dir: Option<PathBuf>,
    pub clip: ClipSpec,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: ServiceClientConfig::default().base_url,
            request_timeout_ms: 30_000,
            segment_width: None,
            default_archive: None,
            export_dir: None,
            clip: ClipSpec::default(),
        }
    }
}

impl ClientConfig {
    /// Load defaults, then the config file, then the environment.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `SUBSEARCH_*` overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = dotenvy::var("SUBSEARCH_SERVER_URL") {
            self.server_url = url;
        }
        if let Some(ms) = parse_env::<u64>("SUBSEARCH_REQUEST_TIMEOUT_MS")? {
            self.request_timeout_ms = ms;
        }
        if let Some(width) = parse_env::<u32>("SUBSEARCH_SEGMENT_WIDTH")? {
            self.segment_width = Some(width);
        }
        if let Ok(archive) = dotenvy::var("SUBSEARCH_ARCHIVE") {
            self.default_archive = Some(archive);
        }
        if let Ok(dir) = dotenvy::var("SUBSEARCH_EXPORT_DIR") {
            self.export_dir = Some(PathBuf::from(dir));
        }
        if let Ok(downloader) = dotenvy::var("SUBSEARCH_DOWNLOADER") {
            self.clip.downloader = downloader;
        }
        if let Ok(format) = dotenvy::var("SUBSEARCH_CLIP_FORMAT") {
            self.clip.format = format;
        }
        if let Some(lead) = parse_env::<f64>("SUBSEARCH_CLIP_LEAD_SECS")? {
            self.clip.lead_seconds = lead;
        }
        if let Some(trail) = parse_env::<f64>("SUBSEARCH_CLIP_TRAIL_SECS")? {
            self.clip.trail_seconds = trail;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.server_url)
            .map_err(|e| ConfigError::Validation(format!("server_url '{}': {e}", self.server_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "server_url must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "request_timeout_ms must be positive".into(),
            ));
        }
        if !self.clip.trail_seconds.is_finite() || self.clip.trail_seconds < 0.0 {
            return Err(ConfigError::Validation(
                "clip.trail_seconds must be a non-negative number".into(),
            ));
        }
        if !self.clip.lead_seconds.is_finite() {
            return Err(ConfigError::Validation(
                "clip.lead_seconds must be a number".into(),
            ));
        }
        if self.clip.format.trim().is_empty() || self.clip.downloader.trim().is_empty() {
            return Err(ConfigError::Validation(
                "clip.format and clip.downloader must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn service_config(&self) -> ServiceClientConfig {
        ServiceClientConfig {
            base_url: self.server_url.clone(),
            request_timeout: self.request_timeout(),
        }
    }

    /// Segment width for a terminal `columns` wide, unless configured.
    pub fn segment_width_for(&self, columns: Option<u16>) -> u32 {
        self.segment_width.unwrap_or_else(|| match columns {
            Some(cols) => u32::from(cols).saturating_sub(TIMESTAMP_WIDTH).max(1),
            None => DEFAULT_SEGMENT_WIDTH,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match dotenvy::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { key, value }),
        Err(_) => Ok(None),
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "subsearch", "subsearch")
}

/// `config.toml` in the platform config dir.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Platform data dir, used for logs and exports.
pub fn default_data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || PathBuf::from(".subsearch"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}
