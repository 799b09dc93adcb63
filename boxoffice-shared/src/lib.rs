pub mod models;
pub mod pii;

pub use models::{
    CancelRefusal, CodeStatus, Page, PageRequest, RedemptionCode, Role, Ticket, TicketStatus, TicketType,
    TicketValidation, User, ValidationMethod, ValidationStatus,
};

/// Raised when a persisted or wire value does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
