//! Host event hooks: `POST /api/hooks/{event}`.

use axum::Json;
use axum::extract::{Extension, State};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use super::rpc::RpcResponse;
use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::services::tokens::RequestTokens;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteUserRequest {
    pub user_id: i64,
}

/// `POST /api/hooks/before-delete-user`: remove the chat account first.
pub async fn before_delete_user_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Json(body): Json<DeleteUserRequest>,
) -> AppResult<Json<RpcResponse>> {
    let deleted = state.service.before_delete_user(&user, body.user_id).await?;
    Ok(Json(RpcResponse {
        result: deleted.into(),
    }))
}

/// `POST /api/hooks/after-logout`: forget the chat session.
pub async fn after_logout_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    jar: CookieJar,
) -> (CookieJar, Json<RpcResponse>) {
    let tokens = RequestTokens::new(&state, jar);
    state.service.after_logout(&user, tokens.store()).await;
    (
        tokens.into_jar(),
        Json(RpcResponse {
            result: true.into(),
        }),
    )
}

/// `POST /api/hooks/after-login`: make sure the chat account exists.
pub async fn after_login_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Json<RpcResponse> {
    let ready = state.service.after_login(&user).await;
    Json(RpcResponse {
        result: ready.into(),
    })
}
