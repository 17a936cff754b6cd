pub mod entity;
pub mod models;
pub mod money;
pub mod notify;
pub mod password;
pub mod payment;
pub mod query;
pub mod repository;
pub mod webhook;

pub use entity::Entity;
pub use models::{Booking, Difficulty, Review, Role, Tour, User};
pub use query::ListQuery;
pub use repository::Repository;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Webhook signature invalid: {0}")]
    SignatureInvalid(String),
    #[error("Payment provider error: {0}")]
    UpstreamError(String),
    #[error("Duplicate {entity}: {key} already exists")]
    Conflict { entity: &'static str, key: String },
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
