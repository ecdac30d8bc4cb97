//! Error types for the wg-roadwarrior-core crate

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Structural error: {0}")]
    Structural(String),

    #[error("Peer already exists: {0}")]
    DuplicateKey(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No free address left in {0}")]
    AllocationExhausted(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Line index {index} out of range (document has {len} lines)")]
    Index { index: usize, len: usize },

    #[error("Invalid key material: {0}")]
    Key(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("Command execution failed: {cmd} - {message}")]
    Command { cmd: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn parse(line: usize, msg: impl Into<String>) -> Self {
        Error::Parse {
            line,
            message: msg.into(),
        }
    }

    pub fn structural(msg: impl Into<String>) -> Self {
        Error::Structural(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn key(msg: impl Into<String>) -> Self {
        Error::Key(msg.into())
    }
}
