//! Unified error handling for Stageforge
//!
//! This module provides the error type shared by the scene model, the
//! exporter, and the CLI frontend.
//!
//! A collision node referencing a mesh that is absent from the model table is
//! deliberately NOT an error: the exporter skips that node's triangles, logs a
//! warning, and carries on. Everything in this enum aborts the export.

use thiserror::Error;

/// Unified error type for all Stageforge operations
#[derive(Error, Debug)]
pub enum Error {
    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Export requested for a format generation with no writer
    #[error("Unsupported format version: {version} (supported: 1, 2)")]
    UnsupportedVersion { version: String },

    /// The scene graph has no start node
    #[error("Malformed stage: no start node found among the root node's children")]
    MissingStartNode,

    /// The scene graph violates a structural requirement
    #[error("Malformed stage: {message}")]
    InvalidStage { message: String },

    /// Internal invariant violation (should never happen)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Result type using the unified Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Create a malformed-stage error
    pub fn invalid_stage(message: impl Into<String>) -> Self {
        Error::InvalidStage {
            message: message.into(),
        }
    }

    /// Check if this error is user-facing (as opposed to an internal defect)
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Error::Internal { .. })
    }
}
