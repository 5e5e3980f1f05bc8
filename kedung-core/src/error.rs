//! Error types shared by the wire codec, command dispatcher, and config
//! loader. Kept as a single hand-written enum rather than a `thiserror`
//! derive, matching how this codebase already reports protocol errors.

use std::error::Error as StdError;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// An error raised while framing, dispatching, or configuring the cache.
#[derive(Debug)]
pub enum Error {
    /// The length prefix of a frame could not be parsed, or claimed a
    /// length larger than the configured prefix can represent.
    Prefix(PrefixError),
    /// The command envelope was malformed, missing a `command` key, or
    /// named a verb this server does not implement.
    Command(CommandError),
    /// A JSON payload failed to decode.
    Json(serde_json::Error),
    /// An I/O error while reading or writing the configuration file.
    Io(std::io::Error),
    /// The configuration file could not be parsed as TOML.
    Config(toml::de::Error),
}

/// Raised when a length-prefix frame cannot be parsed.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum PrefixError {
    /// `len(payload) >= 10^prefix_width`; the payload would not fit in
    /// the configured number of decimal digits.
    Overflow { len: usize, prefix_width: usize },
}

/// Raised by the command dispatcher when it cannot route an envelope.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum CommandError {
    /// The envelope had no `command` key, or it was not a string.
    MissingCommand,
    /// `command` did not match any known verb.
    Unknown(String),
}

impl CommandError {
    /// The error message the wire protocol expects for this failure,
    /// verbatim from the reference implementation (Indonesian-language
    /// text is part of the wire format, not a translation choice).
    pub fn wire_message(&self) -> String {
        match self {
            CommandError::MissingCommand => "Tidak dapat menemukan key `command`!".to_string(),
            CommandError::Unknown(cmd) => format!("Perintah `{}` tidak dikenali!", cmd),
        }
    }
}

impl From<PrefixError> for Error {
    fn from(err: PrefixError) -> Self {
        Error::Prefix(err)
    }
}

impl From<CommandError> for Error {
    fn from(err: CommandError) -> Self {
        Error::Command(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Error::Prefix(err) => write!(f, "PrefixError: {}", err),
            Error::Command(err) => write!(f, "CommandError: {}", err),
            Error::Json(err) => write!(f, "JsonError: {}", err),
            Error::Io(err) => write!(f, "IoError: {}", err),
            Error::Config(err) => write!(f, "ConfigError: {}", err),
        }
    }
}

impl Display for PrefixError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PrefixError::Overflow { len, prefix_width } => write!(
                f,
                "payload of {} bytes does not fit in a {}-digit length prefix",
                len, prefix_width
            ),
        }
    }
}

impl Display for CommandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.wire_message())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Prefix(err) => Some(err),
            Error::Command(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Config(err) => Some(err),
        }
    }
}

impl StdError for PrefixError {}
impl StdError for CommandError {}
