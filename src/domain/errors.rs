use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Order not found")]
    NotFound,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Payment gateway error: {0}")]
    Gateway(String),
    #[error("Internal error: {0}")]
    Internal(String),
}
