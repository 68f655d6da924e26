use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use sudhaar_types::models::{Caller, TokenType};

use crate::auth::decode_token;
use crate::error::AppError;
use crate::state::{AppState, blocking};

const INVALID_TOKEN: &str = "Given token not valid for any token type";

/// Resolves a bearer access token to a [`Caller`] extension. Requests
/// without an Authorization header pass through anonymously; a header that
/// does not resolve to an active user is rejected.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .map(|v| v.to_str().map(str::to_owned));
    let Some(header_value) = header_value else {
        return Ok(next.run(req).await);
    };

    let token = header_value
        .ok()
        .and_then(|v| v.strip_prefix("Bearer ").map(str::to_owned))
        .ok_or_else(|| AppError::Unauthorized(INVALID_TOKEN.to_string()))?;

    let user_id = decode_token(&state.auth.jwt_secret, &token)
        .filter(|c| c.token_type == TokenType::Access)
        .map(|c| c.sub)
        .ok_or_else(|| AppError::Unauthorized(INVALID_TOKEN.to_string()))?;

    // The account may have been deleted or disabled since the token was issued.
    let user = blocking(&state, move |db| Ok(db.get_user_by_id(user_id)?))
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| {
            debug!("Token for missing or inactive user {}", user_id);
            AppError::Unauthorized("User not found".to_string())
        })?;

    req.extensions_mut().insert(Caller {
        id: user.id,
        email: user.email,
        username: user.username,
        role: user.role,
    });
    Ok(next.run(req).await)
}

/// Rejects requests that `authenticate` left anonymous.
pub async fn require_auth(req: Request, next: Next) -> Result<Response, AppError> {
    if req.extensions().get::<Caller>().is_none() {
        return Err(AppError::Unauthorized(
            "Authentication credentials were not provided.".to_string(),
        ));
    }
    Ok(next.run(req).await)
}

/// The caller on routes that also serve anonymous requests.
pub struct MaybeCaller(pub Option<Caller>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeCaller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeCaller(parts.extensions.get::<Caller>().cloned()))
    }
}
