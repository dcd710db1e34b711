//! Backend error types.

use thiserror::Error;

/// Errors that can occur in backend operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    #[error("out of GPU memory")]
    OutOfMemory,
    #[error("GPU device lost")]
    DeviceLost,
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(BackendError::OutOfMemory.to_string(), "out of GPU memory");
        assert_eq!(
            BackendError::ResourceCreationFailed("zero extent".into()).to_string(),
            "resource creation failed: zero extent"
        );
    }
}
