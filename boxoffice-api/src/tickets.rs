use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use boxoffice_shared::models::page::DEFAULT_PAGE_SIZE;
use boxoffice_shared::{Page, PageRequest, Ticket};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::AppError, middleware::Caller, state::AppState};

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl From<PageParams> for PageRequest {
    fn from(params: PageParams) -> Self {
        PageRequest::new(params.page.unwrap_or(0), params.size.unwrap_or(DEFAULT_PAGE_SIZE))
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/tickets", get(list_tickets))
        .route("/api/v1/tickets/{ticket_id}", get(get_ticket))
        .route("/api/v1/tickets/{ticket_id}/qr-codes", get(get_ticket_code))
        .route("/api/v1/tickets/{ticket_id}/cancel", post(cancel_ticket))
}

async fn list_tickets(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<Ticket>>, AppError> {
    let page = state.tickets.list_for_user(caller.user_id, params.into()).await?;
    Ok(Json(page))
}

async fn get_ticket(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<Ticket>, AppError> {
    let ticket = state.tickets.get_for_user(caller.user_id, ticket_id).await?;
    Ok(Json(ticket))
}

async fn get_ticket_code(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(ticket_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let image = state.artifacts.code_image_for(caller.user_id, ticket_id).await?;
    Ok(([(header::CONTENT_TYPE, image.content_type)], image.bytes).into_response())
}

async fn cancel_ticket(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<Ticket>, AppError> {
    let ticket = state.redemption.cancel(caller.user_id, ticket_id).await?;
    Ok(Json(ticket))
}
