use sea_orm::error::DbErr;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Persisted state violates an order invariant (negative totals,
    /// duplicate active orders for one billing profile and cart).
    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    pub fn order_not_found(id: Uuid) -> Self {
        ServiceError::NotFound(format!("Order {} not found", id))
    }

    pub fn cart_not_found(id: Uuid) -> Self {
        ServiceError::NotFound(format!("Cart {} not found", id))
    }

    pub fn billing_profile_not_found(id: Uuid) -> Self {
        ServiceError::NotFound(format!("Billing profile {} not found", id))
    }

    pub fn address_not_found(id: Uuid) -> Self {
        ServiceError::NotFound(format!("Address {} not found", id))
    }

    /// True when the error reflects corrupted persisted state rather than a
    /// bad request or an infrastructure failure.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, ServiceError::DataIntegrity(_))
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(errors.to_string())
    }
}

pub type AppError = ServiceError;
