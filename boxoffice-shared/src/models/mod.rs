pub mod events;
pub mod page;
pub mod ticket;
pub mod ticket_type;
pub mod user;

pub use page::{Page, PageRequest};
pub use ticket::{
    CancelRefusal, CodeStatus, RedemptionCode, Ticket, TicketStatus, TicketValidation, ValidationMethod,
    ValidationStatus,
};
pub use ticket_type::TicketType;
pub use user::{Role, User};
