//! # Configuration Management
//!
//! Configuration is assembled from several sources, highest priority last:
//! 1. Default values (the `Default` impl below)
//! 2. An optional TOML file (`config.toml` unless `--config` says otherwise)
//! 3. Namespaced environment variables: `SOUNDPATCH_APP__NAME`, `SOUNDPATCH_REDIS__POOL_SIZE`, ...
//! 4. The flat deployment variables: `APP_NAME`, `DEBUG`, `API_PREFIX`, `PORT`, `REDIS_URL`, ...
//!
//! Command line flags are applied afterwards by the runner (see `cli.rs`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Flat environment variables and the config key each one overrides.
///
/// `DEBUG` is absent: it carries its own parsing rule (see [`parse_flag`]).
const FLAT_ENV_OVERRIDES: &[(&str, &str)] = &[
    ("APP_NAME", "app.name"),
    ("APP_DESCRIPTION", "app.description"),
    ("APP_VERSION", "app.version"),
    ("API_PREFIX", "app.api_prefix"),
    ("HOST", "server.host"),
    ("PORT", "server.port"),
    ("REDIS_URL", "redis.url"),
    ("REDIS_POOL_SIZE", "redis.pool_size"),
    ("UPLOAD_DIR", "storage.upload_dir"),
    ("MAX_UPLOAD_SIZE", "storage.max_upload_size"),
    ("LOG_FORMAT", "logging.format"),
];

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub app: AppInfoConfig,
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Application metadata, exposed through the welcome and info endpoints.
///
/// ## Fields:
/// - `debug`: raises the default log level to `debug`
/// - `api_prefix`: path segment prepended to every versioned route (`/api/v1`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppInfoConfig {
    pub name: String,
    pub description: String,
    pub version: String,
    pub debug: bool,
    pub api_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Connection settings for the cache service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub pool_size: usize,
}

/// Upload volume settings.
///
/// `max_upload_size` is in bytes and also caps JSON request bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub max_upload_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable console lines
    Pretty,
    /// One JSON object per event
    Json,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppInfoConfig {
                name: "SoundPatch AI".to_string(),
                description: "AI-powered audio processing service".to_string(),
                version: "1.0.0".to_string(),
                debug: false,
                api_prefix: "/api/v1".to_string(),
            },
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379/0".to_string(),
                pool_size: 8,
            },
            storage: StorageConfig {
                upload_dir: PathBuf::from("uploads"),
                max_upload_size: 10 * 1024 * 1024,
            },
            logging: LoggingConfig {
                format: LogFormat::Pretty,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration using the process environment.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_env(path, |key| env::var(key).ok())
    }

    /// Load configuration, reading the flat variables through `lookup`.
    ///
    /// The file at `path` is optional; a missing file simply contributes
    /// nothing. A present but unparsable file is an error.
    pub fn load_with_env<F>(path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("SOUNDPATCH")
                    .prefix_separator("_")
                    .separator("__"),
            );

        for (var, key) in FLAT_ENV_OVERRIDES {
            if let Some(value) = lookup(var) {
                settings = settings.set_override(*key, value)?;
            }
        }

        if let Some(value) = lookup("DEBUG") {
            settings = settings.set_override("app.debug", parse_flag(&value))?;
        }

        let mut config: AppConfig = settings
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?
            .try_deserialize()
            .context("Configuration has invalid values")?;

        config.app.api_prefix = normalize_prefix(&config.app.api_prefix);
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    pub fn validate(&self) -> Result<()> {
        if self.app.name.trim().is_empty() {
            return Err(anyhow::anyhow!("Application name cannot be empty"));
        }

        let prefix = &self.app.api_prefix;
        if !prefix.starts_with('/') || prefix == "/" || prefix.ends_with('/') {
            return Err(anyhow::anyhow!(
                "API prefix must look like /segment, got {:?}",
                prefix
            ));
        }

        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.redis.pool_size == 0 {
            return Err(anyhow::anyhow!("Redis pool size must be greater than 0"));
        }

        if self.storage.max_upload_size == 0 {
            return Err(anyhow::anyhow!("Max upload size must be greater than 0"));
        }

        Ok(())
    }
}

/// `DEBUG` is on only when it reads `true`, ignoring case.
pub fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// Trim whitespace, add a missing leading slash and drop trailing ones.
pub fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn missing_file() -> PathBuf {
        PathBuf::from("definitely-not-here/config.toml")
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.app.name, "SoundPatch AI");
        assert_eq!(config.app.api_prefix, "/api/v1");
        assert!(!config.app.debug);
        assert_eq!(config.server.port, 8000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let config = AppConfig::load_with_env(&missing_file(), env_from(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_flat_env_overrides() {
        let env = env_from(&[
            ("APP_NAME", "Patchbay"),
            ("APP_VERSION", "2.3.4"),
            ("API_PREFIX", "api/v2/"),
            ("PORT", "9000"),
            ("DEBUG", "TRUE"),
            ("LOG_FORMAT", "json"),
        ]);
        let config = AppConfig::load_with_env(&missing_file(), env).unwrap();

        assert_eq!(config.app.name, "Patchbay");
        assert_eq!(config.app.version, "2.3.4");
        assert_eq!(config.app.api_prefix, "/api/v2");
        assert_eq!(config.server.port, 9000);
        assert!(config.app.debug);
        assert_eq!(config.logging.format, LogFormat::Json);
        // Untouched values keep their defaults
        assert_eq!(config.app.description, "AI-powered audio processing service");
    }

    #[test]
    fn test_debug_only_true_enables() {
        for value in ["false", "1", "yes", ""] {
            let config =
                AppConfig::load_with_env(&missing_file(), env_from(&[("DEBUG", value)])).unwrap();
            assert!(!config.app.debug, "DEBUG={:?} should be off", value);
        }
    }

    #[test]
    fn test_file_then_env_priority() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[app]
name = "From File"
description = "file description"

[server]
port = 8100
"#
        )
        .unwrap();

        let config =
            AppConfig::load_with_env(file.path(), env_from(&[("APP_NAME", "From Env")])).unwrap();
        assert_eq!(config.app.name, "From Env");
        assert_eq!(config.app.description, "file description");
        assert_eq!(config.server.port, 8100);
    }

    #[test]
    fn test_invalid_port_value_is_rejected() {
        let result = AppConfig::load_with_env(&missing_file(), env_from(&[("PORT", "not-a-port")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.app.api_prefix = "/".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.redis.pool_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("/api/v1"), "/api/v1");
        assert_eq!(normalize_prefix(" api/v1/ "), "/api/v1");
        assert_eq!(normalize_prefix("/"), "/");
    }
}
