use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use boxoffice_order::TicketRef;
use boxoffice_shared::{Role, TicketValidation, ValidationMethod};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::AppError, middleware::Caller, state::AppState};

const DOOR_ROLES: [Role; 2] = [Role::Staff, Role::Organizer];

#[derive(Debug, Deserialize)]
pub struct ValidationRequest {
    /// Code value for QR scans, ticket id for manual entry
    pub id: String,
    pub method: ValidationMethod,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/ticket-validations", post(validate_ticket))
        .route("/api/v1/tickets/{ticket_id}/validations", get(list_validations))
}

async fn validate_ticket(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<ValidationRequest>,
) -> Result<Json<TicketValidation>, AppError> {
    caller.require_any(&DOOR_ROLES)?;

    if req.id.trim().is_empty() {
        return Err(AppError::ValidationError("id must not be empty".into()));
    }

    let reference = TicketRef::parse(&req.id, req.method);
    let validation = state.redemption.validate(reference, req.method).await?;
    Ok(Json(validation))
}

async fn list_validations(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<Vec<TicketValidation>>, AppError> {
    caller.require_any(&DOOR_ROLES)?;

    let history = state.redemption.list_validations(ticket_id).await?;
    Ok(Json(history))
}
