use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use boxoffice_core::render::{CodeRenderer, RenderError};
use boxoffice_core::repository::{InventoryLedger, RedemptionCodeRepository, TicketRepository, UserDirectory};
use boxoffice_core::TicketingError;
use boxoffice_order::{
    ArtifactDispatcher, ArtifactService, DispatchError, InlineDispatcher, PurchaseOrchestrator, RetryPolicy,
};
use boxoffice_shared::models::events::TicketPurchasedEvent;
use boxoffice_shared::{PageRequest, Role, TicketType, User};
use boxoffice_store::MemoryStore;
use rust_decimal::Decimal;
use uuid::Uuid;

struct PlainRenderer;

impl CodeRenderer for PlainRenderer {
    fn content_type(&self) -> &'static str {
        "text/plain"
    }

    fn render(&self, payload: &str) -> Result<Vec<u8>, RenderError> {
        Ok(payload.as_bytes().to_vec())
    }
}

struct FailingDispatcher;

#[async_trait]
impl ArtifactDispatcher for FailingDispatcher {
    async fn dispatch(&self, _event: &TicketPurchasedEvent) -> Result<(), DispatchError> {
        Err(DispatchError::QueueClosed)
    }
}

fn artifacts(store: &MemoryStore) -> Arc<ArtifactService> {
    Arc::new(ArtifactService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(PlainRenderer),
    ))
}

fn orchestrator(store: &MemoryStore) -> Arc<PurchaseOrchestrator> {
    let dispatcher = Arc::new(InlineDispatcher::new(artifacts(store)));
    Arc::new(PurchaseOrchestrator::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        dispatcher,
    ))
}

async fn seed_ticket_type(store: &MemoryStore, total_available: i32) -> TicketType {
    let tt = TicketType::new(Uuid::new_v4(), "General".into(), None, Decimal::new(1000, 2), total_available);
    let mut tx = store.begin().await.unwrap();
    tx.insert_ticket_type(&tt).await.unwrap();
    tx.commit().await.unwrap();
    tt
}

async fn seed_user(store: &MemoryStore) -> Uuid {
    let user = User::new(Uuid::new_v4(), Some("attendee".into()), None, Role::Attendee);
    store.save_user(&user).await.unwrap().id
}

#[tokio::test]
async fn test_exact_sellout() {
    let store = MemoryStore::new();
    let tt = seed_ticket_type(&store, 2).await;
    let user = seed_user(&store).await;
    let orchestrator = orchestrator(&store);

    orchestrator.purchase(user, tt.id, 1).await.unwrap();
    orchestrator.purchase(user, tt.id, 1).await.unwrap();

    let third = orchestrator.purchase(user, tt.id, 1).await;
    assert!(matches!(
        third,
        Err(TicketingError::TicketsSoldOut { requested: 1, remaining: 0 })
    ));
    assert_eq!(store.sold_count(tt.id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_overshoot_in_one_call_fails_whole_request() {
    let store = MemoryStore::new();
    let tt = seed_ticket_type(&store, 5).await;
    let user = seed_user(&store).await;
    let orchestrator = orchestrator(&store);

    let result = orchestrator.purchase(user, tt.id, 6).await;
    assert!(matches!(
        result,
        Err(TicketingError::TicketsSoldOut { requested: 6, remaining: 5 })
    ));
    assert_eq!(store.sold_count(tt.id).await.unwrap(), 0);

    let ticket = orchestrator.purchase(user, tt.id, 5).await.unwrap();
    assert_eq!(ticket.quantity, 5);
    assert_eq!(ticket.remaining_scans, 5);
    assert_eq!(store.sold_count(tt.id).await.unwrap(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_two_racers_for_the_last_ticket() {
    let store = MemoryStore::new();
    let tt = seed_ticket_type(&store, 1).await;
    let alice = seed_user(&store).await;
    let bob = seed_user(&store).await;
    let orchestrator = orchestrator(&store);

    let (a, b) = tokio::join!(
        orchestrator.purchase(alice, tt.id, 1),
        orchestrator.purchase(bob, tt.id, 1)
    );

    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    assert_eq!(store.sold_count(tt.id).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_oversell_under_contention() {
    const CAPACITY: i32 = 10;
    const BUYERS: usize = 50;

    let store = MemoryStore::new();
    let tt = seed_ticket_type(&store, CAPACITY).await;
    let orchestrator = orchestrator(&store);

    let mut handles = Vec::with_capacity(BUYERS);
    for _ in 0..BUYERS {
        let user = seed_user(&store).await;
        let orchestrator = orchestrator.clone();
        let ticket_type_id = tt.id;
        handles.push(tokio::spawn(async move {
            orchestrator.purchase(user, ticket_type_id, 1).await
        }));
    }

    let mut sold = 0;
    let mut sold_out = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => sold += 1,
            Err(TicketingError::TicketsSoldOut { .. }) => sold_out += 1,
            Err(other) => panic!("unexpected purchase failure: {other}"),
        }
    }

    assert_eq!(sold, CAPACITY as usize);
    assert_eq!(sold_out, BUYERS - CAPACITY as usize);
    assert_eq!(store.sold_count(tt.id).await.unwrap(), i64::from(CAPACITY));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_ticket_types_do_not_block_each_other() {
    let store = MemoryStore::with_lock_timeout(Duration::from_millis(200));
    let busy = seed_ticket_type(&store, 5).await;
    let free = seed_ticket_type(&store, 5).await;
    let user = seed_user(&store).await;
    let orchestrator = orchestrator(&store);

    let mut holder = store.begin().await.unwrap();
    holder.acquire_for_update(busy.id).await.unwrap();

    orchestrator.purchase(user, free.id, 1).await.unwrap();
    holder.rollback().await.unwrap();
}

#[tokio::test]
async fn test_failed_purchases_leave_no_trace() {
    let store = MemoryStore::new();
    let tt = seed_ticket_type(&store, 3).await;
    let user = seed_user(&store).await;
    let orchestrator = orchestrator(&store);

    assert!(matches!(
        orchestrator.purchase(user, tt.id, 0).await,
        Err(TicketingError::InvalidArgument(_))
    ));
    assert!(matches!(
        orchestrator.purchase(user, tt.id, -2).await,
        Err(TicketingError::InvalidArgument(_))
    ));

    let stranger = Uuid::new_v4();
    assert!(matches!(
        orchestrator.purchase(stranger, tt.id, 1).await,
        Err(TicketingError::UserNotFound(id)) if id == stranger
    ));

    let missing = Uuid::new_v4();
    assert!(matches!(
        orchestrator.purchase(user, missing, 1).await,
        Err(TicketingError::TicketTypeNotFound(id)) if id == missing
    ));

    assert!(matches!(
        orchestrator.purchase(user, tt.id, 4).await,
        Err(TicketingError::TicketsSoldOut { .. })
    ));

    assert_eq!(store.sold_count(tt.id).await.unwrap(), 0);
    let page = store.list_for_purchaser(user, PageRequest::default()).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_lock_timeout_is_retryable_and_clean() {
    let store = MemoryStore::with_lock_timeout(Duration::from_millis(50));
    let tt = seed_ticket_type(&store, 3).await;
    let user = seed_user(&store).await;
    let orchestrator = orchestrator(&store);

    let mut holder = store.begin().await.unwrap();
    holder.acquire_for_update(tt.id).await.unwrap();

    let result = orchestrator.purchase(user, tt.id, 1).await;
    match result {
        Err(err) => {
            assert!(matches!(err, TicketingError::LockTimeout));
            assert!(err.is_retryable());
        }
        Ok(_) => panic!("purchase should not get past a held lock"),
    }

    holder.rollback().await.unwrap();
    assert_eq!(store.sold_count(tt.id).await.unwrap(), 0);
    orchestrator.purchase(user, tt.id, 1).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_retry_outlasts_a_short_lock_hold() {
    let store = MemoryStore::with_lock_timeout(Duration::from_millis(40));
    let tt = seed_ticket_type(&store, 3).await;
    let user = seed_user(&store).await;
    let dispatcher = Arc::new(InlineDispatcher::new(artifacts(&store)));
    let orchestrator = PurchaseOrchestrator::new(Arc::new(store.clone()), Arc::new(store.clone()), dispatcher)
        .with_retry(RetryPolicy::new(5, Duration::from_millis(20)));

    let mut holder = store.begin().await.unwrap();
    holder.acquire_for_update(tt.id).await.unwrap();
    let release = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        holder.rollback().await.unwrap();
    });

    let ticket = orchestrator.purchase_with_retry(user, tt.event_id, tt.id, 2).await.unwrap();
    release.await.unwrap();

    assert_eq!(ticket.quantity, 2);
    assert_eq!(store.sold_count(tt.id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_inline_dispatch_issues_code() {
    let store = MemoryStore::new();
    let tt = seed_ticket_type(&store, 3).await;
    let user = seed_user(&store).await;

    let ticket = orchestrator(&store).purchase(user, tt.id, 1).await.unwrap();

    let code = store.find_by_ticket(ticket.id).await.unwrap().unwrap();
    assert!(code.value.starts_with("BOX-"));
}

#[tokio::test]
async fn test_artifact_failure_does_not_undo_purchase() {
    let store = MemoryStore::new();
    let tt = seed_ticket_type(&store, 3).await;
    let user = seed_user(&store).await;
    let orchestrator = PurchaseOrchestrator::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(FailingDispatcher),
    );

    let ticket = orchestrator.purchase(user, tt.id, 1).await.unwrap();

    assert!(store.get_ticket(ticket.id).await.unwrap().is_some());
    assert_eq!(store.sold_count(tt.id).await.unwrap(), 1);
    assert!(store.find_by_ticket(ticket.id).await.unwrap().is_none());

    // Retrieval issues the missing code
    let image = artifacts(&store).code_image_for(user, ticket.id).await.unwrap();
    assert!(!image.bytes.is_empty());
    assert!(store.find_by_ticket(ticket.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_purchase_under_another_event_is_not_found() {
    let store = MemoryStore::new();
    let tt = seed_ticket_type(&store, 3).await;
    let user = seed_user(&store).await;
    let orchestrator = orchestrator(&store);

    let elsewhere = orchestrator.purchase_for_event(user, Uuid::new_v4(), tt.id, 1).await;
    assert!(matches!(elsewhere, Err(TicketingError::TicketTypeNotFound(id)) if id == tt.id));
    assert_eq!(store.sold_count(tt.id).await.unwrap(), 0);

    let ticket = orchestrator.purchase_for_event(user, tt.event_id, tt.id, 1).await.unwrap();
    assert_eq!(ticket.ticket_type_id, tt.id);
}
