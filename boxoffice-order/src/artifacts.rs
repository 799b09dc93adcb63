use std::sync::Arc;

use async_trait::async_trait;
use boxoffice_core::render::CodeRenderer;
use boxoffice_core::repository::{RedemptionCodeRepository, TicketRepository};
use boxoffice_core::{StoreError, TicketingError, TicketingResult};
use boxoffice_shared::models::events::TicketPurchasedEvent;
use boxoffice_shared::{RedemptionCode, TicketStatus};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::retry::RetryPolicy;

pub const CODE_PREFIX: &str = "BOX-";

/// Fresh values collide only on a v4 clash, so a couple of redraws is plenty.
const VALUE_DRAWS: u32 = 3;

/// `BOX-` followed by 32 uppercase hex digits.
pub fn generate_code_value() -> String {
    format!("{}{}", CODE_PREFIX, Uuid::new_v4().simple().to_string().to_ascii_uppercase())
}

/// Encoded door-scan image ready to hand to a client
#[derive(Debug, Clone)]
pub struct RenderedCode {
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Issues and serves redemption codes for committed tickets.
pub struct ArtifactService {
    tickets: Arc<dyn TicketRepository>,
    codes: Arc<dyn RedemptionCodeRepository>,
    renderer: Arc<dyn CodeRenderer>,
}

impl ArtifactService {
    pub fn new(
        tickets: Arc<dyn TicketRepository>,
        codes: Arc<dyn RedemptionCodeRepository>,
        renderer: Arc<dyn CodeRenderer>,
    ) -> Self {
        Self { tickets, codes, renderer }
    }

    /// Give the ticket its redemption code. Repeated calls return the stored code.
    pub async fn issue_code(&self, ticket_id: Uuid) -> TicketingResult<RedemptionCode> {
        if let Some(existing) = self.codes.find_by_ticket(ticket_id).await? {
            return Ok(existing);
        }

        let mut draw = 1;
        loop {
            let candidate = RedemptionCode::new(ticket_id, generate_code_value());
            match self.codes.insert_if_absent(&candidate).await {
                Ok(stored) => {
                    if stored.id == candidate.id {
                        info!(%ticket_id, "Redemption code issued");
                    }
                    return Ok(stored);
                }
                Err(StoreError::Conflict(msg)) if draw < VALUE_DRAWS => {
                    warn!(%ticket_id, "Code value collision, drawing again: {}", msg);
                    draw += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Render the caller's code for `ticket_id`, issuing it first if the
    /// post-purchase step never ran.
    pub async fn code_image_for(&self, user_id: Uuid, ticket_id: Uuid) -> TicketingResult<RenderedCode> {
        let ticket = self
            .tickets
            .get_ticket(ticket_id)
            .await?
            .ok_or(TicketingError::TicketNotFound)?;
        if ticket.purchaser_id != user_id {
            return Err(TicketingError::Forbidden(ticket_id));
        }
        if ticket.status == TicketStatus::Cancelled {
            return Err(TicketingError::TicketCancelled(ticket_id));
        }

        let code = match self.codes.find_by_ticket(ticket_id).await? {
            Some(code) => code,
            None => self.issue_code(ticket_id).await.map_err(|err| {
                warn!(%ticket_id, "On-demand code issue failed: {}", err);
                TicketingError::CodePending(ticket_id)
            })?,
        };

        let bytes = self.renderer.render(&code.value)?;
        Ok(RenderedCode {
            content_type: self.renderer.content_type(),
            bytes,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Artifact queue is full")]
    QueueFull,
    #[error("Artifact queue is closed")]
    QueueClosed,
    #[error(transparent)]
    Issue(#[from] TicketingError),
}

/// Hands a committed purchase to code generation.
#[async_trait]
pub trait ArtifactDispatcher: Send + Sync {
    async fn dispatch(&self, event: &TicketPurchasedEvent) -> Result<(), DispatchError>;
}

/// Issues the code on the purchasing task.
pub struct InlineDispatcher {
    service: Arc<ArtifactService>,
}

impl InlineDispatcher {
    pub fn new(service: Arc<ArtifactService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ArtifactDispatcher for InlineDispatcher {
    async fn dispatch(&self, event: &TicketPurchasedEvent) -> Result<(), DispatchError> {
        self.service.issue_code(event.ticket_id).await?;
        Ok(())
    }
}

/// Pushes onto a bounded queue drained by [`run_artifact_worker`]. Never waits.
#[derive(Clone)]
pub struct QueuedDispatcher {
    sender: mpsc::Sender<TicketPurchasedEvent>,
}

impl QueuedDispatcher {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TicketPurchasedEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl ArtifactDispatcher for QueuedDispatcher {
    async fn dispatch(&self, event: &TicketPurchasedEvent) -> Result<(), DispatchError> {
        self.sender.try_send(event.clone()).map_err(|err| match err {
            TrySendError::Full(_) => DispatchError::QueueFull,
            TrySendError::Closed(_) => DispatchError::QueueClosed,
        })
    }
}

/// Drain purchase events until every sender is gone.
pub async fn run_artifact_worker(
    service: Arc<ArtifactService>,
    mut events: mpsc::Receiver<TicketPurchasedEvent>,
    retry: RetryPolicy,
) {
    info!("Artifact worker started");

    while let Some(event) = events.recv().await {
        let mut attempt = 1;
        loop {
            match service.issue_code(event.ticket_id).await {
                Ok(_) => break,
                Err(err) if attempt < retry.max_attempts => {
                    warn!(ticket_id = %event.ticket_id, attempt, "Code issue failed, retrying: {}", err);
                    tokio::time::sleep(retry.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(err) => {
                    // The ticket stays valid; the code is issued on first retrieval instead.
                    error!(ticket_id = %event.ticket_id, "Giving up on redemption code after {} attempts: {}", attempt, err);
                    break;
                }
            }
        }
    }

    info!("Artifact worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxoffice_core::render::RenderError;
    use boxoffice_core::repository::InventoryLedger;
    use boxoffice_shared::{Ticket, TicketType};
    use boxoffice_store::MemoryStore;
    use rust_decimal::Decimal;
    use std::time::Duration;

    struct PlainRenderer;

    impl CodeRenderer for PlainRenderer {
        fn content_type(&self) -> &'static str {
            "text/plain"
        }

        fn render(&self, payload: &str) -> Result<Vec<u8>, RenderError> {
            Ok(payload.as_bytes().to_vec())
        }
    }

    fn service(store: &MemoryStore) -> Arc<ArtifactService> {
        Arc::new(ArtifactService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(PlainRenderer),
        ))
    }

    async fn committed_ticket(store: &MemoryStore, purchaser_id: Uuid) -> Ticket {
        let tt = TicketType::new(Uuid::new_v4(), "General".into(), None, Decimal::ZERO, 10);
        let ticket = Ticket::purchased(tt.id, purchaser_id, 1);
        let mut tx = store.begin().await.unwrap();
        tx.insert_ticket_type(&tt).await.unwrap();
        tx.insert_ticket(&ticket).await.unwrap();
        tx.commit().await.unwrap();
        ticket
    }

    #[test]
    fn test_code_value_format() {
        let value = generate_code_value();
        assert_eq!(value.len(), CODE_PREFIX.len() + 32);
        assert!(value.starts_with(CODE_PREFIX));
        assert!(value[CODE_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[tokio::test]
    async fn test_issue_is_idempotent() {
        let store = MemoryStore::new();
        let ticket = committed_ticket(&store, Uuid::new_v4()).await;
        let service = service(&store);

        let first = service.issue_code(ticket.id).await.unwrap();
        let second = service.issue_code(ticket.id).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.value, second.value);
    }

    #[tokio::test]
    async fn test_image_only_for_owner_and_issued_on_demand() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let ticket = committed_ticket(&store, owner).await;
        let service = service(&store);

        let stranger = service.code_image_for(Uuid::new_v4(), ticket.id).await;
        assert!(matches!(stranger, Err(TicketingError::Forbidden(id)) if id == ticket.id));

        let missing = service.code_image_for(owner, Uuid::new_v4()).await;
        assert!(matches!(missing, Err(TicketingError::TicketNotFound)));

        // No code was issued at purchase time; retrieval heals it
        let image = service.code_image_for(owner, ticket.id).await.unwrap();
        let stored = store.find_by_ticket(ticket.id).await.unwrap().unwrap();
        assert_eq!(image.bytes, stored.value.as_bytes());
        assert_eq!(image.content_type, "text/plain");
    }

    #[tokio::test]
    async fn test_cancelled_ticket_gets_no_image() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let mut ticket = committed_ticket(&store, owner).await;

        ticket.cancel().unwrap();
        let mut tx = store.begin_redemption().await.unwrap();
        tx.lock_ticket(ticket.id).await.unwrap();
        tx.save_ticket(&ticket).await.unwrap();
        tx.commit().await.unwrap();

        let image = service(&store).code_image_for(owner, ticket.id).await;
        assert!(matches!(image, Err(TicketingError::TicketCancelled(id)) if id == ticket.id));
        assert!(store.find_by_ticket(ticket.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_queued_dispatch_is_drained_by_worker() {
        let store = MemoryStore::new();
        let ticket = committed_ticket(&store, Uuid::new_v4()).await;
        let service = service(&store);

        let (dispatcher, receiver) = QueuedDispatcher::channel(4);
        let worker = tokio::spawn(run_artifact_worker(
            service.clone(),
            receiver,
            RetryPolicy::new(3, Duration::from_millis(1)),
        ));

        dispatcher.dispatch(&TicketPurchasedEvent::from(&ticket)).await.unwrap();
        drop(dispatcher);
        worker.await.unwrap();

        assert!(store.find_by_ticket(ticket.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_full_queue_is_a_dispatch_failure() {
        let (dispatcher, _receiver) = QueuedDispatcher::channel(1);
        let ticket = Ticket::purchased(Uuid::new_v4(), Uuid::new_v4(), 1);
        let event = TicketPurchasedEvent::from(&ticket);

        dispatcher.dispatch(&event).await.unwrap();
        assert!(matches!(dispatcher.dispatch(&event).await, Err(DispatchError::QueueFull)));
    }
}
