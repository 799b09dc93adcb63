use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use boxoffice_core::TicketingError;
use serde_json::json;

/// Seconds a client should wait before retrying a transient failure.
const RETRY_AFTER_SECS: &str = "1";

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    Ticketing(TicketingError),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::AuthenticationError(_) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            AppError::AuthorizationError(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT"),
            AppError::NotFoundError(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Ticketing(err) => match err {
                TicketingError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT"),
                TicketingError::UserNotFound(_) => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
                TicketingError::TicketTypeNotFound(_) => (StatusCode::NOT_FOUND, "TICKET_TYPE_NOT_FOUND"),
                TicketingError::TicketNotFound => (StatusCode::NOT_FOUND, "TICKET_NOT_FOUND"),
                TicketingError::TicketsSoldOut { .. } => (StatusCode::CONFLICT, "TICKETS_SOLD_OUT"),
                TicketingError::NoRemainingScans(_) => (StatusCode::CONFLICT, "NO_REMAINING_SCANS"),
                TicketingError::TicketCancelled(_) => (StatusCode::CONFLICT, "TICKET_CANCELLED"),
                TicketingError::AlreadyRedeemed(_) => (StatusCode::CONFLICT, "TICKET_ALREADY_REDEEMED"),
                TicketingError::CapacityLocked(_) => (StatusCode::CONFLICT, "CAPACITY_LOCKED"),
                TicketingError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
                TicketingError::LockTimeout => (StatusCode::SERVICE_UNAVAILABLE, "LOCK_TIMEOUT"),
                TicketingError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
                TicketingError::CodePending(_) => (StatusCode::SERVICE_UNAVAILABLE, "CODE_PENDING"),
                TicketingError::Storage(_) | TicketingError::Render(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL")
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();

        let error_message = match self {
            AppError::AuthenticationError(msg)
            | AppError::AuthorizationError(msg)
            | AppError::ValidationError(msg)
            | AppError::NotFoundError(msg) => msg,
            AppError::Ticketing(err) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!("Internal Server Error: {}", err);
                "Internal Server Error".to_string()
            }
            AppError::Ticketing(err) => err.to_string(),
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        let mut response = (status, body).into_response();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }
        response
    }
}

impl From<TicketingError> for AppError {
    fn from(err: TicketingError) -> Self {
        Self::Ticketing(err)
    }
}
