//! Loads `config.toml` (§6). Missing file or missing keys fall back to
//! defaults exactly the way the reference implementation's `tomllib`
//! loader does.

use crate::error::Error;
use serde::Deserialize;
use std::path::Path;

const DEFAULT_LOCATION: &str = "/tmp/kedung/";
const DEFAULT_LOGGING: &str = "INFO";
const DEFAULT_CACHE_DURATION_MINUTES: u64 = 10;
const DEFAULT_PREFIX_WIDTH: usize = 7;

fn default_location() -> String {
    DEFAULT_LOCATION.to_string()
}

fn default_logging() -> String {
    DEFAULT_LOGGING.to_string()
}

fn default_cache_duration() -> u64 {
    DEFAULT_CACHE_DURATION_MINUTES
}

fn default_prefix_width() -> usize {
    DEFAULT_PREFIX_WIDTH
}

#[derive(Debug, Deserialize)]
struct RawFile {
    #[serde(default)]
    kedung: RawKedung,
}

#[derive(Debug, Deserialize, Default)]
struct RawKedung {
    #[serde(default)]
    location: RawLocation,
    #[serde(default)]
    runtime: RawRuntime,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    #[serde(default = "default_location")]
    socket: String,
    #[serde(default = "default_location")]
    log: String,
}

impl Default for RawLocation {
    fn default() -> Self {
        Self {
            socket: default_location(),
            log: default_location(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRuntime {
    #[serde(default = "default_logging")]
    logging: String,
    #[serde(default = "default_cache_duration")]
    cache_duration: u64,
    #[serde(default = "default_prefix_width")]
    preallocate_space: usize,
}

impl Default for RawRuntime {
    fn default() -> Self {
        Self {
            logging: default_logging(),
            cache_duration: default_cache_duration(),
            preallocate_space: default_prefix_width(),
        }
    }
}

/// Process-wide configuration, read once at startup (§9: "changes
/// require restart").
#[derive(Debug, Clone)]
pub struct Config {
    pub socket_location: String,
    pub log_location: String,
    pub logging: String,
    pub cache_duration_minutes: u64,
    pub prefix_width: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_location: default_location(),
            log_location: default_location(),
            logging: default_logging(),
            cache_duration_minutes: default_cache_duration(),
            prefix_width: default_prefix_width(),
        }
    }
}

impl Config {
    /// Load configuration from `config.toml` at `path`. A missing file
    /// yields all defaults, matching the reference implementation's
    /// behavior on `FileNotFoundError`.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let raw = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default())
            }
            Err(err) => return Err(err.into()),
        };

        let parsed: RawFile = toml::from_str(&raw)?;
        Ok(Self {
            socket_location: parsed.kedung.location.socket,
            log_location: parsed.kedung.location.log,
            logging: parsed.kedung.runtime.logging,
            cache_duration_minutes: parsed.kedung.runtime.cache_duration,
            prefix_width: parsed.kedung.runtime.preallocate_space,
        })
    }

    /// Load from the process's current working directory, the way the
    /// reference implementation always does (`Path("config.toml")`
    /// relative to CWD, never an explicit path argument).
    pub fn load_from_cwd() -> Result<Self, Error> {
        Self::load(Path::new("config.toml"))
    }

    /// The full path to the Unix socket file, honoring the configured
    /// directory and the `<dir>/kedung.sock` naming convention (§6).
    pub fn socket_path(&self) -> std::path::PathBuf {
        Path::new(&self.socket_location).join("kedung.sock")
    }

    /// The full path to the log file, mirroring `socket_path`.
    pub fn log_path(&self) -> std::path::PathBuf {
        Path::new(&self.log_location).join("kedung.log")
    }
}
