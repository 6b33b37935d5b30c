//! Service configuration.
//!
//! Handles loading and validating `config.toml`. Config files are sparse —
//! every field has a stock default, and a missing file means "all defaults".
//! Unknown keys are rejected to catch typos early.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [source]
//! base_url = "https://www.googleapis.com/drive/v3"
//! timeout_secs = 30            # Upstream fetch timeout
//! max_asset_bytes = 67108864   # Per-asset in-memory ceiling (64 MiB)
//! token_env = "DRIVE_ACCESS_TOKEN"  # Env var holding the API bearer token
//!
//! [transform]
//! default_quality = 90         # JPEG quality when the caller gives none
//! thumbnail_width = 400        # Reduction width for thumbnail fallback
//!
//! [cache]
//! thumbnail_max_age_secs = 2592000   # 30 days
//! full_max_age_secs = 31536000       # 1 year
//! ```
//!
//! The API token deliberately never lives in the file: it is read from the
//! environment variable named by `source.token_env`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("missing API token: environment variable {0} is not set")]
    MissingToken(String),
}

/// Service configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Listen address for the HTTP server.
    pub server: ServerConfig,
    /// Upstream source-system settings.
    pub source: SourceConfig,
    /// Defaults for the resize/recompress stage.
    pub transform: TransformConfig,
    /// Cache lifetimes emitted on image responses.
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Load from `path` if it exists, stock defaults otherwise.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let raw = fs::read_to_string(path)?;
            toml::from_str(&raw)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.transform.default_quality) {
            return Err(ConfigError::Validation(
                "transform.default_quality must be 1-100".into(),
            ));
        }
        if self.transform.thumbnail_width == 0 {
            return Err(ConfigError::Validation(
                "transform.thumbnail_width must be non-zero".into(),
            ));
        }
        if self.source.base_url.is_empty() {
            return Err(ConfigError::Validation(
                "source.base_url must not be empty".into(),
            ));
        }
        if self.source.max_asset_bytes == 0 {
            return Err(ConfigError::Validation(
                "source.max_asset_bytes must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Upstream source-system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Base URL of the asset API.
    pub base_url: String,
    /// Upstream fetch timeout, in seconds.
    pub timeout_secs: u64,
    /// Ceiling on bytes buffered per asset. Fetches beyond this abort
    /// instead of exhausting memory on an oversized upload.
    pub max_asset_bytes: u64,
    /// Name of the environment variable holding the API bearer token.
    pub token_env: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.googleapis.com/drive/v3".to_string(),
            timeout_secs: 30,
            max_asset_bytes: 64 * 1024 * 1024,
            token_env: "DRIVE_ACCESS_TOKEN".to_string(),
        }
    }
}

impl SourceConfig {
    /// Read the API token from the configured environment variable.
    pub fn load_token(&self) -> Result<String, ConfigError> {
        std::env::var(&self.token_env)
            .map_err(|_| ConfigError::MissingToken(self.token_env.clone()))
    }
}

/// Defaults for the resize/recompress stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformConfig {
    /// JPEG quality applied when the caller supplies none (or an
    /// out-of-range value).
    pub default_quality: u32,
    /// Width used to reduce a full asset when the provider's ready-made
    /// thumbnail is unavailable and the caller gave no width.
    pub thumbnail_width: u32,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            default_quality: 90,
            thumbnail_width: 400,
        }
    }
}

/// Cache lifetimes for the two response variants. Thumbnails churn when
/// covers change, so they get the shorter lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub thumbnail_max_age_secs: u64,
    pub full_max_age_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            thumbnail_max_age_secs: 30 * 24 * 60 * 60,
            full_max_age_secs: 365 * 24 * 60 * 60,
        }
    }
}

/// Stock `config.toml` with all options documented, for `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r#"# darkroom configuration. Every option is optional; the values below
# are the stock defaults.

[server]
host = "0.0.0.0"
port = 8080

[source]
# Base URL of the asset API.
base_url = "https://www.googleapis.com/drive/v3"
# Upstream fetch timeout, in seconds. Surfaced to clients as a source
# system failure when exceeded.
timeout_secs = 30
# Ceiling on bytes buffered per asset (64 MiB).
max_asset_bytes = 67108864
# Environment variable holding the API bearer token. The token itself
# never belongs in this file.
token_env = "DRIVE_ACCESS_TOKEN"

[transform]
# JPEG quality (1-100) when the request does not specify one.
default_quality = 90
# Reduction width for thumbnails when the provider has no ready-made one.
thumbnail_width = 400

[cache]
# Thumbnails: 30 days. Full images: 1 year.
thumbnail_max_age_secs = 2592000
full_max_age_secs = 31536000
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let parsed: AppConfig = toml::from_str(stock_config_toml()).unwrap();
        parsed.validate().unwrap();
        assert_eq!(parsed.server.port, 8080);
        assert_eq!(parsed.cache.thumbnail_max_age_secs, 2_592_000);
        assert_eq!(parsed.cache.full_max_age_secs, 31_536_000);
    }

    #[test]
    fn sparse_config_keeps_other_defaults() {
        let parsed: AppConfig = toml::from_str("[server]\nport = 9000\n").unwrap();
        assert_eq!(parsed.server.port, 9000);
        assert_eq!(parsed.server.host, "0.0.0.0");
        assert_eq!(parsed.transform.default_quality, 90);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = toml::from_str::<AppConfig>("[server]\nhots = \"typo\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn out_of_range_quality_fails_validation() {
        let mut config = AppConfig::default();
        config.transform.default_quality = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }
}
