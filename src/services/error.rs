use thiserror::Error;

use crate::db::DbError;

/// Errors from the admin services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("{0} not found")]
    NotFound(String),

    /// The request is well-formed but the provider cannot serve it.
    #[error("{0}")]
    Unsupported(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
