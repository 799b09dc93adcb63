use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use boxoffice_catalog::{Availability, NewTicketType, TicketTypeChanges};
use boxoffice_core::TicketingError;
use boxoffice_shared::{Role, Ticket, TicketType};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::AppError, middleware::Caller, state::AppState};

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateTicketTypeRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub total_available: i32,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/events/{event_id}/ticket-types", post(create_ticket_type))
        .route(
            "/api/v1/events/{event_id}/ticket-types/{ticket_type_id}",
            patch(update_ticket_type),
        )
        .route(
            "/api/v1/events/{event_id}/ticket-types/{ticket_type_id}/availability",
            get(availability),
        )
        .route(
            "/api/v1/events/{event_id}/ticket-types/{ticket_type_id}/tickets",
            post(purchase_ticket),
        )
}

async fn create_ticket_type(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(event_id): Path<Uuid>,
    Json(req): Json<CreateTicketTypeRequest>,
) -> Result<(StatusCode, Json<TicketType>), AppError> {
    caller.require_any(&[Role::Organizer])?;

    let ticket_type = state
        .inventory
        .create_ticket_type(NewTicketType {
            event_id,
            name: req.name,
            description: req.description,
            price: req.price,
            total_available: req.total_available,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ticket_type)))
}

async fn update_ticket_type(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((event_id, ticket_type_id)): Path<(Uuid, Uuid)>,
    Json(changes): Json<TicketTypeChanges>,
) -> Result<Json<TicketType>, AppError> {
    caller.require_any(&[Role::Organizer])?;

    let ticket_type = state
        .inventory
        .update_ticket_type(event_id, ticket_type_id, changes)
        .await?;
    Ok(Json(ticket_type))
}

async fn availability(
    State(state): State<AppState>,
    Path((event_id, ticket_type_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Availability>, AppError> {
    let availability = state.inventory.availability(ticket_type_id).await?;
    if availability.event_id != event_id {
        return Err(TicketingError::TicketTypeNotFound(ticket_type_id).into());
    }
    Ok(Json(availability))
}

async fn purchase_ticket(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((event_id, ticket_type_id)): Path<(Uuid, Uuid)>,
    body: Option<Json<PurchaseRequest>>,
) -> Result<(StatusCode, Json<Ticket>), AppError> {
    let quantity = body.map(|Json(req)| req.quantity).unwrap_or_else(default_quantity);

    let ticket = state
        .purchases
        .purchase_with_retry(caller.user_id, event_id, ticket_type_id, quantity)
        .await?;

    Ok((StatusCode::CREATED, Json(ticket)))
}
