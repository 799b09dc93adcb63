use std::sync::Arc;

use boxoffice_core::repository::TicketRepository;
use boxoffice_core::{TicketingError, TicketingResult};
use boxoffice_shared::{Page, PageRequest, Ticket};
use uuid::Uuid;

/// Read side of a purchaser's tickets
pub struct TicketService {
    tickets: Arc<dyn TicketRepository>,
}

impl TicketService {
    pub fn new(tickets: Arc<dyn TicketRepository>) -> Self {
        Self { tickets }
    }

    pub async fn list_for_user(&self, user_id: Uuid, page: PageRequest) -> TicketingResult<Page<Ticket>> {
        Ok(self.tickets.list_for_purchaser(user_id, page).await?)
    }

    /// Someone else's ticket is reported as missing.
    pub async fn get_for_user(&self, user_id: Uuid, ticket_id: Uuid) -> TicketingResult<Ticket> {
        self.tickets
            .get_for_purchaser(user_id, ticket_id)
            .await?
            .ok_or(TicketingError::TicketNotFound)
    }
}
