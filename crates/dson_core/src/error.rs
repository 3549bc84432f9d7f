//! Error types shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a document load or a morph application.
///
/// Recoverable conditions (unresolved formula operands, degenerate bones,
/// malformed faces, unknown joints) are reported as
/// [`Diagnostic`](crate::diagnostics::Diagnostic)s instead.
#[derive(Error, Debug)]
pub enum DsonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URI scheme: {0}")]
    InvalidUri(String),

    #[error("Reference not found: {0}")]
    ReferenceNotFound(String),

    #[error("Content root directory does not exist: {0}")]
    ContentRootMissing(PathBuf),

    #[error("Morph formula cycle through '{0}'")]
    FormulaCycle(String),

    #[error("Armature is not in edit mode")]
    NotInEditMode,

    #[error("Unknown object: {0}")]
    UnknownObject(String),

    #[error("Unknown morph: {0}")]
    UnknownMorph(String),
}

impl DsonError {
    /// True for the kinds that mean an asset could not be located at all.
    pub fn is_unresolved_reference(&self) -> bool {
        matches!(
            self,
            DsonError::ReferenceNotFound(_) | DsonError::ContentRootMissing(_)
        )
    }
}

/// Result type for DSON operations.
pub type DsonResult<T> = Result<T, DsonError>;
