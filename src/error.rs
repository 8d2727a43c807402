use std::path::PathBuf;

use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Mode file {path}: {reason}")]
    ModeFile { path: PathBuf, reason: String },

    #[error("Signal relay error: {0}")]
    Signal(String),

    #[error("Event loop error: {0}")]
    EventLoop(String),

    #[error("System call failed: {0}")]
    Sys(#[from] nix::errno::Errno),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
