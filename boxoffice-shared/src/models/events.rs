use uuid::Uuid;

use super::ticket::Ticket;

/// Emitted after a purchase commits; drives redemption code generation.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct TicketPurchasedEvent {
    pub ticket_id: Uuid,
    pub ticket_type_id: Uuid,
    pub purchaser_id: Uuid,
    pub quantity: i32,
    pub purchased_at: i64,
}

impl From<&Ticket> for TicketPurchasedEvent {
    fn from(ticket: &Ticket) -> Self {
        Self {
            ticket_id: ticket.id,
            ticket_type_id: ticket.ticket_type_id,
            purchaser_id: ticket.purchaser_id,
            quantity: ticket.quantity,
            purchased_at: ticket.created_at.timestamp(),
        }
    }
}
