//! Error types for the Slate engine.

use crate::ElementId;
use thiserror::Error;

/// All possible errors from the Slate engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Store errors
    #[error("element not found: {0}")]
    ElementNotFound(ElementId),

    #[error("element already exists: {0}")]
    ElementAlreadyExists(ElementId),

    #[error("operation on deleted element: {0}")]
    ElementDeleted(ElementId),

    // Broadcast errors
    #[error("INIT broadcasts must sync the full scene")]
    InitRequiresFullSync,

    // Wire errors
    #[error("malformed sync message: {0}")]
    MalformedMessage(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
