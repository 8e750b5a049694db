use serde_json::Value;
use thiserror::Error;

/// Everything that can go wrong while converting a single notebook file.
///
/// The walker never stops on one of these: it reports the file and moves on.
#[derive(Error, Debug)]
pub enum NotebookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported nbformat version {0} (expected 3 or 4)")]
    UnsupportedVersion(Value),
}

pub type Result<T> = std::result::Result<T, NotebookError>;
