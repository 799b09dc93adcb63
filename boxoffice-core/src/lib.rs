pub mod identity;
pub mod render;
pub mod repository;

use uuid::Uuid;

/// Failures raised by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Timed out waiting for a row lock")]
    LockTimeout,
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Conflicting write: {0}")]
    Conflict(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::LockTimeout | StoreError::Unavailable(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Business outcomes of the ticketing core.
///
/// Input, not-found and capacity errors are deterministic and never worth retrying.
/// `LockTimeout` and `Unavailable` are transient; see [`TicketingError::is_retryable`].
#[derive(Debug, thiserror::Error)]
pub enum TicketingError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("User with ID {0} was not found")]
    UserNotFound(Uuid),
    #[error("Ticket type with ID {0} was not found")]
    TicketTypeNotFound(Uuid),
    #[error("Tickets sold out: requested {requested}, remaining {remaining}")]
    TicketsSoldOut { requested: i32, remaining: i64 },
    #[error("Ticket not found")]
    TicketNotFound,
    #[error("No remaining scans for ticket {0}")]
    NoRemainingScans(Uuid),
    #[error("Ticket {0} has been cancelled")]
    TicketCancelled(Uuid),
    #[error("Ticket {0} has already been admitted and cannot be cancelled")]
    AlreadyRedeemed(Uuid),
    #[error("Ticket {0} does not belong to the caller")]
    Forbidden(Uuid),
    #[error("Redemption code for ticket {0} is not available yet")]
    CodePending(Uuid),
    #[error("Capacity of ticket type {0} cannot change after sales have started")]
    CapacityLocked(Uuid),
    #[error("Timed out waiting for inventory lock")]
    LockTimeout,
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Render(#[from] render::RenderError),
}

impl TicketingError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, TicketingError::LockTimeout | TicketingError::Unavailable(_))
    }
}

impl From<StoreError> for TicketingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LockTimeout => TicketingError::LockTimeout,
            StoreError::Unavailable(msg) => TicketingError::Unavailable(msg),
            StoreError::Conflict(msg) | StoreError::Backend(msg) => TicketingError::Storage(msg),
        }
    }
}

pub type TicketingResult<T> = Result<T, TicketingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_errors_are_retryable() {
        assert!(TicketingError::from(StoreError::LockTimeout).is_retryable());
        assert!(TicketingError::from(StoreError::Unavailable("pool".into())).is_retryable());
        assert!(!TicketingError::from(StoreError::Conflict("dup".into())).is_retryable());
        assert!(!TicketingError::TicketsSoldOut { requested: 1, remaining: 0 }.is_retryable());
        assert!(!TicketingError::InvalidArgument("quantity".into()).is_retryable());
    }
}
