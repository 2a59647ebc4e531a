use crate::common::process::ProcessError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that end an invocation in an error state.
#[derive(Error, Debug)]
pub enum ResizeError {
    #[error("Failed to resize filesystem (cmd={command}): {source}")]
    Resize {
        command: String,
        #[source]
        source: ProcessError,
    },

    #[error("Failed to stat device '{path}': {source}")]
    Stat {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory {}: {source}", .path.display())]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start background resize: {0}")]
    Detach(#[source] std::io::Error),
}
