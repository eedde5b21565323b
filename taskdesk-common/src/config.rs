//! Configuration loading and resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument or `TASKDESK_*` environment variable (handled by the binary's clap args)
//! 2. TOML config file
//! 3. OS-dependent compiled default (fallback)
//!
//! A missing TOML file is not an error: the service starts on defaults and logs a warning.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5000;

/// Default bind address
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Default upload size limit (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Default upload processing timeout
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 120;

/// Bootstrap configuration loaded from TOML file
///
/// Every key is optional; absent keys fall through to compiled defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub bind_address: Option<String>,

    /// Path to SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Directory holding uploaded files while they are processed
    #[serde(default)]
    pub upload_dir: Option<PathBuf>,

    /// HS256 signing secret for admin bearer tokens
    #[serde(default)]
    pub jwt_secret: Option<String>,

    #[serde(default)]
    pub max_upload_bytes: Option<usize>,

    #[serde(default)]
    pub upload_timeout_secs: Option<u64>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// OS-dependent defaults used when neither CLI/ENV nor TOML supply a value
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub data_folder: PathBuf,
    pub database_path: PathBuf,
    pub upload_dir: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let data_folder = dirs::data_local_dir()
            .map(|d| d.join("taskdesk"))
            .unwrap_or_else(|| PathBuf::from("./taskdesk_data"));

        Self {
            database_path: data_folder.join("taskdesk.db"),
            upload_dir: data_folder.join("uploads"),
            data_folder,
            log_level: default_log_level(),
        }
    }
}

/// Values supplied on the command line or through `TASKDESK_*` environment variables
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub bind_address: Option<String>,
    pub database_path: Option<PathBuf>,
    pub upload_dir: Option<PathBuf>,
    pub jwt_secret: Option<String>,
    pub max_upload_bytes: Option<usize>,
    pub upload_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub bind_address: String,
    pub database_path: PathBuf,
    pub upload_dir: PathBuf,
    pub jwt_secret: String,
    pub max_upload_bytes: usize,
    pub upload_timeout_secs: u64,
    pub log_level: String,
}

impl ServerConfig {
    /// Merge overrides, TOML and compiled defaults
    ///
    /// Fails when no non-empty `jwt_secret` is available from any source, or
    /// when the upload size limit or timeout is zero.
    pub fn resolve(overrides: ConfigOverrides, toml_config: TomlConfig) -> Result<Self> {
        let defaults = CompiledDefaults::for_current_platform();

        let jwt_secret = overrides
            .jwt_secret
            .or(toml_config.jwt_secret)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(
                    "jwt_secret not configured. Set TASKDESK_JWT_SECRET, pass --jwt-secret, \
                     or add jwt_secret to the TOML config"
                        .to_string(),
                )
            })?;

        let max_upload_bytes = overrides
            .max_upload_bytes
            .or(toml_config.max_upload_bytes)
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        if max_upload_bytes == 0 {
            return Err(Error::Config("max_upload_bytes must be greater than 0".to_string()));
        }

        let upload_timeout_secs = overrides
            .upload_timeout_secs
            .or(toml_config.upload_timeout_secs)
            .unwrap_or(DEFAULT_UPLOAD_TIMEOUT_SECS);
        if upload_timeout_secs == 0 {
            return Err(Error::Config("upload_timeout_secs must be greater than 0".to_string()));
        }

        Ok(Self {
            port: overrides.port.or(toml_config.port).unwrap_or(DEFAULT_PORT),
            bind_address: overrides
                .bind_address
                .or(toml_config.bind_address)
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            database_path: overrides
                .database_path
                .or(toml_config.database_path)
                .unwrap_or(defaults.database_path),
            upload_dir: overrides
                .upload_dir
                .or(toml_config.upload_dir)
                .unwrap_or(defaults.upload_dir),
            jwt_secret,
            max_upload_bytes,
            upload_timeout_secs,
            log_level: overrides.log_level.unwrap_or(toml_config.logging.level),
        })
    }
}

/// Default configuration file path (`<config_dir>/taskdesk/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("taskdesk").join("config.toml"))
}

/// Load TOML configuration
///
/// An explicit path that does not exist is an error. When no path is given the
/// default location is tried, and its absence yields `TomlConfig::default()`.
pub fn load_toml_config(explicit_path: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit_path {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => {
                warn!("No config file found, using defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    info!("Loaded config file: {}", path.display());
    Ok(config)
}
