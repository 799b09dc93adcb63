use std::sync::Arc;

use boxoffice_catalog::{InventoryService, NewTicketType, TicketTypeChanges};
use boxoffice_core::repository::InventoryLedger;
use boxoffice_core::TicketingError;
use boxoffice_shared::Ticket;
use boxoffice_store::MemoryStore;
use rust_decimal::Decimal;
use uuid::Uuid;

fn new_ticket_type(event_id: Uuid, total_available: i32) -> NewTicketType {
    NewTicketType {
        event_id,
        name: "General Admission".into(),
        description: None,
        price: Decimal::new(2000, 2),
        total_available,
    }
}

async fn sell(store: &MemoryStore, ticket_type_id: Uuid, quantity: i32) {
    let mut tx = store.begin().await.unwrap();
    tx.insert_ticket(&Ticket::purchased(ticket_type_id, Uuid::new_v4(), quantity))
        .await
        .unwrap();
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn test_capacity_is_frozen_once_sales_start() {
    let store = MemoryStore::new();
    let service = InventoryService::new(Arc::new(store.clone()));
    let event_id = Uuid::new_v4();

    let tt = service.create_ticket_type(new_ticket_type(event_id, 10)).await.unwrap();

    // Before any sale capacity is editable
    let tt = service
        .update_ticket_type(event_id, tt.id, TicketTypeChanges {
            total_available: Some(20),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(tt.total_available, 20);

    sell(&store, tt.id, 2).await;

    let locked = service
        .update_ticket_type(event_id, tt.id, TicketTypeChanges {
            total_available: Some(5),
            ..Default::default()
        })
        .await;
    assert!(matches!(locked, Err(TicketingError::CapacityLocked(id)) if id == tt.id));

    // Price still editable
    let repriced = service
        .update_ticket_type(event_id, tt.id, TicketTypeChanges {
            price: Some(Decimal::new(1500, 2)),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(repriced.price, Decimal::new(1500, 2));
    assert_eq!(repriced.total_available, 20);
}

#[tokio::test]
async fn test_update_requires_matching_event() {
    let store = MemoryStore::new();
    let service = InventoryService::new(Arc::new(store));
    let tt = service
        .create_ticket_type(new_ticket_type(Uuid::new_v4(), 10))
        .await
        .unwrap();

    let result = service
        .update_ticket_type(Uuid::new_v4(), tt.id, TicketTypeChanges::default())
        .await;
    assert!(matches!(result, Err(TicketingError::TicketTypeNotFound(_))));
}

#[tokio::test]
async fn test_availability_reflects_sales() {
    let store = MemoryStore::new();
    let service = InventoryService::new(Arc::new(store.clone()));
    let tt = service
        .create_ticket_type(new_ticket_type(Uuid::new_v4(), 4))
        .await
        .unwrap();

    sell(&store, tt.id, 3).await;
    let availability = service.availability(tt.id).await.unwrap();
    assert_eq!(availability.sold, 3);
    assert_eq!(availability.remaining, 1);
    assert!(!availability.is_sold_out());

    assert!(matches!(
        service.availability(Uuid::new_v4()).await,
        Err(TicketingError::TicketTypeNotFound(_))
    ));
}

#[tokio::test]
async fn test_create_rejects_bad_input() {
    let service = InventoryService::new(Arc::new(MemoryStore::new()));
    let result = service.create_ticket_type(new_ticket_type(Uuid::new_v4(), -3)).await;
    assert!(matches!(result, Err(TicketingError::InvalidArgument(_))));
}
