//! Error types for treecrypt

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Process exit codes shared by the scheduler and the worker
pub mod exit_code {
    /// Every file was transformed
    pub const SUCCESS: i32 = 0;
    /// Startup-fatal configuration or input error (scheduler)
    pub const FATAL: i32 = 1;
    /// One or more files failed after all tasks were attempted (scheduler)
    pub const FILES_FAILED: i32 = 2;
    /// The run was interrupted (scheduler)
    pub const CANCELLED: i32 = 130;
    /// Bad invocation arguments (worker)
    pub const USAGE: i32 = 64;
    /// The target file could not be opened (worker)
    pub const OPEN_FAILED: i32 = 66;
    /// Read or write failure mid-transform (worker)
    pub const IO_FAILED: i32 = 74;
}

/// Main error type for treecrypt
#[derive(Error, Debug)]
pub enum Error {
    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Input errors
    #[error("Invalid action '{0}': expected 'encrypt' or 'decrypt'")]
    InvalidAction(String),

    #[error("Invalid path {}: {reason}", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    // Per-file errors
    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Transform of {} failed: {source}", path.display())]
    Transform {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to spawn worker for {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Exit code a process should terminate with when this error ends it
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidAction(_) => exit_code::USAGE,
            Error::Open { .. } => exit_code::OPEN_FAILED,
            Error::Transform { .. } | Error::Io(_) => exit_code::IO_FAILED,
            _ => exit_code::FATAL,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Config(e.to_string())
    }
}
