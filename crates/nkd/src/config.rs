//! Daemon configuration.
//!
//! Values are layered, lowest to highest precedence:
//! built-in defaults, a TOML file, the `NKD_LISTEN` environment variable,
//! and finally command-line flags (applied by the `nkd` binary).
//!
//! ```toml
//! listen = "127.0.0.1:8123"
//! max_line_bytes = 65536
//! log_filter = "nkd=debug"
//! ```

use std::fs;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Default listen address (all interfaces, port 8123)
pub const DEFAULT_LISTEN: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 8123));

/// Default maximum request line length (1 MB)
pub const DEFAULT_MAX_LINE_BYTES: usize = 1_048_576;

/// Environment variable overriding the listen address
pub const LISTEN_ENV: &str = "NKD_LISTEN";

/// Settings for one daemon process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// TCP address to accept connections on
    pub listen: SocketAddr,

    /// Longest accepted request line, terminator excluded
    pub max_line_bytes: usize,

    /// `tracing` filter directives; `RUST_LOG` wins over this
    pub log_filter: Option<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            log_filter: None,
        }
    }
}

impl DaemonConfig {
    /// Parses a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: None,
            error: e.to_string(),
        })
    }

    /// Reads and parses a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            error: e.to_string(),
        })
    }

    /// `<config dir>/nodekeeper/nkd.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("nodekeeper").join("nkd.toml"))
    }

    /// Builds the file-and-environment layers.
    ///
    /// An explicit `path` must exist. Without one, the default path is read
    /// only if present; otherwise defaults are used.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => match Self::default_path() {
                Some(default) if default.is_file() => Self::load(&default)?,
                _ => Self::default(),
            },
        };

        config.apply_env()?;
        Ok(config)
    }

    /// Applies `NKD_LISTEN` from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applies environment overrides read through `lookup`.
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(LISTEN_ENV) {
            self.listen = value.parse().map_err(|_| ConfigError::InvalidEnv {
                name: LISTEN_ENV,
                value: value.clone(),
            })?;
            debug!(listen = %self.listen, "Listen address taken from environment");
        }
        Ok(())
    }
}

/// Errors raised while building a [`DaemonConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {error}", .path.display())]
    Read { path: PathBuf, error: String },

    #[error("Invalid config{}: {error}", source_suffix(.path))]
    Parse {
        path: Option<PathBuf>,
        error: String,
    },

    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },
}

fn source_suffix(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" in {}", p.display()))
        .unwrap_or_default()
}
