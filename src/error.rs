//! Graphics error types.

use thiserror::Error;

/// Errors that can occur in the graphics system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// Failed to initialize the graphics system.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// An operation was attempted in the wrong state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// A requested feature is not supported.
    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),
    /// The GPU device was lost.
    #[error("GPU device lost")]
    DeviceLost,
}

/// Convenience alias for graphics results.
pub type GraphicsResult<T> = Result<T, GraphicsError>;
