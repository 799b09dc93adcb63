pub mod inventory;
pub mod ticket_type;

pub use inventory::{check_capacity, reserve, Availability, InventoryService};
pub use ticket_type::{NewTicketType, TicketTypeChanges};
