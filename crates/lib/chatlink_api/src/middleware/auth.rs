//! Authentication middleware: resolves the host session to a host user.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use chatlink_core::host::HostUser;
use tracing::warn;

use crate::AppState;
use crate::error::AppError;

/// Host session cookie, used when no `Authorization` header is sent.
pub const HOST_SESSION_COOKIE: &str = "AuthToken";

/// The authenticated host user, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub HostUser);

fn session_token(request: &Request) -> Option<String> {
    if let Some(header) = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        return header.strip_prefix("Bearer ").map(str::to_string);
    }
    CookieJar::from_headers(request.headers())
        .get(HOST_SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Axum middleware: takes the host session token from `Authorization: Bearer`
/// or the host session cookie, resolves it through the host directory and
/// injects `AuthenticatedUser` into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(&request)
        .ok_or_else(|| AppError::Unauthorized("Missing host session".into()))?;

    let user = state
        .service
        .host()
        .authenticate(&token)
        .await
        .map_err(|e| {
            warn!(error = %e, "host session lookup failed");
            AppError::Internal(e.to_string())
        })?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired host session".into()))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}
