//! Service configuration: `filedrop.toml` plus `FILEDROP_*` overrides.

use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_PATH_VAR: &str = "FILEDROP_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "filedrop.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Per-endpoint request quotas. A limit of `0` turns limiting off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub upload: u32,
    pub list: u32,
    pub fetch: u32,
    pub delete_all: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            upload: 5,
            list: 10,
            fetch: 20,
            delete_all: 2,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen: String,
    pub upload_dir: PathBuf,
    pub metadata_file: PathBuf,
    pub expiry_secs: u64,
    pub rate_limits: RateLimitConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".to_string(),
            upload_dir: PathBuf::from("uploads"),
            metadata_file: PathBuf::from("file_meta.json"),
            expiry_secs: 5,
            rate_limits: RateLimitConfig::default(),
        }
    }
}

impl Config {
    /// Read a config file. A missing file is not an error: defaults are used.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Load from `$FILEDROP_CONFIG` (or `filedrop.toml`), apply environment
    /// overrides and validate.
    pub fn from_env_config() -> Result<Self, ConfigError> {
        let path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut cfg = Self::load(Path::new(&path))?;
        cfg.apply_overrides(|key| env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `FILEDROP_*` overrides using `lookup` to resolve variables.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("FILEDROP_LISTEN") {
            self.listen = v;
        }
        if let Some(v) = lookup("FILEDROP_UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FILEDROP_METADATA_FILE") {
            self.metadata_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("FILEDROP_EXPIRY_SECS") {
            self.expiry_secs = v.trim().parse().map_err(|e| ConfigError::Invalid {
                key: "FILEDROP_EXPIRY_SECS",
                reason: format!("{e}"),
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;
        if self.rate_limits.window_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "rate_limits.window_secs",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen.parse().map_err(|e| ConfigError::Invalid {
            key: "listen",
            reason: format!("{e}"),
        })
    }

    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_secs)
    }
}
