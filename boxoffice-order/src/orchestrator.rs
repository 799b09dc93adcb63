use std::sync::Arc;

use boxoffice_catalog::reserve;
use boxoffice_core::repository::{InventoryLedger, UserDirectory};
use boxoffice_core::{TicketingError, TicketingResult};
use boxoffice_shared::models::events::TicketPurchasedEvent;
use boxoffice_shared::Ticket;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::artifacts::ArtifactDispatcher;
use crate::retry::RetryPolicy;

/// Runs the purchase transaction: lock the ticket type, check capacity,
/// write the ticket, commit, then hand off code generation.
pub struct PurchaseOrchestrator {
    users: Arc<dyn UserDirectory>,
    ledger: Arc<dyn InventoryLedger>,
    dispatcher: Arc<dyn ArtifactDispatcher>,
    retry: RetryPolicy,
}

impl PurchaseOrchestrator {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        ledger: Arc<dyn InventoryLedger>,
        dispatcher: Arc<dyn ArtifactDispatcher>,
    ) -> Self {
        Self {
            users,
            ledger,
            dispatcher,
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn purchase(&self, user_id: Uuid, ticket_type_id: Uuid, quantity: i32) -> TicketingResult<Ticket> {
        self.purchase_scoped(user_id, None, ticket_type_id, quantity).await
    }

    /// Like [`purchase`](Self::purchase), but the ticket type must be listed under `event_id`.
    pub async fn purchase_for_event(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        ticket_type_id: Uuid,
        quantity: i32,
    ) -> TicketingResult<Ticket> {
        self.purchase_scoped(user_id, Some(event_id), ticket_type_id, quantity).await
    }

    async fn purchase_scoped(
        &self,
        user_id: Uuid,
        event_id: Option<Uuid>,
        ticket_type_id: Uuid,
        quantity: i32,
    ) -> TicketingResult<Ticket> {
        if quantity < 1 {
            return Err(TicketingError::InvalidArgument(format!(
                "quantity must be at least 1, got {}",
                quantity
            )));
        }

        let mut tx = self.ledger.begin().await?;

        if self.users.find_user(user_id).await?.is_none() {
            tx.rollback().await?;
            return Err(TicketingError::UserNotFound(user_id));
        }

        // Holds the ticket type's row lock from here until commit or rollback
        let reserved = reserve(tx.as_mut(), event_id, ticket_type_id, quantity).await;
        if let Err(err) = reserved {
            match &err {
                TicketingError::TicketsSoldOut { remaining, .. } => {
                    info!(%ticket_type_id, quantity, remaining, "Purchase rejected: sold out");
                }
                TicketingError::LockTimeout => {
                    warn!(%ticket_type_id, "Purchase timed out waiting for inventory lock");
                }
                _ => {}
            }
            tx.rollback().await?;
            return Err(err);
        }

        let ticket = Ticket::purchased(ticket_type_id, user_id, quantity);
        tx.insert_ticket(&ticket).await?;
        tx.commit().await?;

        info!(ticket_id = %ticket.id, %ticket_type_id, %user_id, quantity, "Ticket purchased");

        // Committed; from here nothing may fail the purchase
        if let Err(err) = self.dispatcher.dispatch(&TicketPurchasedEvent::from(&ticket)).await {
            error!(ticket_id = %ticket.id, "Redemption code hand-off failed: {}", err);
        }

        Ok(ticket)
    }

    /// [`purchase_for_event`](Self::purchase_for_event) with transient failures retried per the configured policy.
    pub async fn purchase_with_retry(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        ticket_type_id: Uuid,
        quantity: i32,
    ) -> TicketingResult<Ticket> {
        self.retry
            .run("purchase", move || {
                self.purchase_for_event(user_id, event_id, ticket_type_id, quantity)
            })
            .await
    }
}
