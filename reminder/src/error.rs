//! Error types for the reminder application
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized for observers and the CLI.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid recurrence: {0}")]
    InvalidRecurrence(String),

    #[error("Scheduling error: {0}")]
    Scheduling(String),

    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// True for failures raised by the persistent task store.
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Io(_)
                | AppError::Serialization(_)
                | AppError::TaskNotFound(_)
        )
    }

    /// True for input rejected before any write happened.
    pub fn is_validation_error(&self) -> bool {
        matches!(self, AppError::Validation(_) | AppError::InvalidRecurrence(_))
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(AppError::TaskNotFound("x".into()).is_store_error());
        assert!(AppError::Validation("x".into()).is_validation_error());
        assert!(AppError::InvalidRecurrence("x".into()).is_validation_error());
        assert!(!AppError::Scheduling("x".into()).is_store_error());
        assert!(!AppError::Scheduling("x".into()).is_validation_error());
    }

    #[test]
    fn test_error_serializes_as_message() {
        let json = serde_json::to_string(&AppError::TaskNotFound("abc".into())).unwrap();
        assert_eq!(json, "\"Task not found: abc\"");
    }
}
