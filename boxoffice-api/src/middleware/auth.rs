use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use boxoffice_core::identity::resolve_subject;
use boxoffice_core::TicketingError;
use boxoffice_shared::{Role, User};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    pub sub: String,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: usize,
}

impl AccessClaims {
    /// Unknown or absent roles fall back to ATTENDEE.
    pub fn role(&self) -> Role {
        self.role
            .as_deref()
            .and_then(|r| r.parse().ok())
            .unwrap_or(Role::Attendee)
    }
}

/// The authenticated, provisioned user behind a request
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn require_any(&self, roles: &[Role]) -> Result<(), AppError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::AuthorizationError(format!(
                "role {} may not perform this action",
                self.role.as_str()
            )))
        }
    }
}

// ============================================================================
// Authentication Middleware
// ============================================================================

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // 1. Extract token from Authorization header
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::AuthenticationError("missing bearer token".into()))?;

    // 2. Decode and validate JWT
    let claims = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::AuthenticationError(format!("invalid token: {}", e)))?
    .claims;

    // 3. Provision the user on first sight
    let user_id = resolve_subject(&claims.sub);
    let candidate = User::new(user_id, claims.preferred_username.clone(), claims.email.clone(), claims.role());
    let user = state
        .users
        .save_user(&candidate)
        .await
        .map_err(TicketingError::from)?;

    // 4. Inject the caller
    req.extensions_mut().insert(Caller {
        user_id: user.id,
        role: user.role,
    });

    Ok(next.run(req).await)
}
