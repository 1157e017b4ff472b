//! RPC-style module methods: `POST /api/rpc/{method}`.
//!
//! Arguments are a PascalCase JSON object (an empty body means no
//! arguments); the reply is `{"Result": ...}` where a negative outcome is
//! `false`.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Path, State};
use axum_extra::extract::cookie::CookieJar;
use chatlink_core::reconcile::ChangeSet;
use chatlink_core::service::SettingsUpdate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::services::tokens::RequestTokens;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RpcResponse {
    pub result: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TenantArgs {
    #[serde(default)]
    tenant_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EmailArgs {
    #[serde(default)]
    email: String,
}

fn args<T: DeserializeOwned + Default>(body: &Bytes) -> AppResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::Validation(format!("Invalid arguments: {e}")))
}

fn to_result<T: Serialize>(value: T) -> AppResult<Value> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.to_string()))
}

fn or_false<T: Serialize>(value: Option<T>) -> AppResult<Value> {
    match value {
        Some(v) => to_result(v),
        None => Ok(Value::Bool(false)),
    }
}

/// `POST /api/rpc/{method}`: dispatch one module method for the host user.
pub async fn rpc_handler(
    State(state): State<AppState>,
    Path(method): Path<String>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    jar: CookieJar,
    body: Bytes,
) -> AppResult<(CookieJar, Json<RpcResponse>)> {
    debug!(method = %method, user_id = user.id, "rpc call");
    let service = &state.service;
    let tokens = RequestTokens::new(&state, jar);

    let result = match method.as_str() {
        "GetSettings" => {
            let a: TenantArgs = args(&body)?;
            to_result(service.get_settings(&user, a.tenant_id).await?)?
        }
        "UpdateSettings" => {
            let update: SettingsUpdate = args(&body)?;
            Value::Bool(service.update_settings(&user, update).await?)
        }
        "GetRocketChatSettings" => {
            let a: TenantArgs = args(&body)?;
            or_false(service.get_rocketchat_settings(&user, a.tenant_id).await?)?
        }
        "ApplyRocketChatRequiredChanges" | "ApplyRocketChatTextChanges" | "ApplyRocketChatCssChanges" => {
            let set = match method.as_str() {
                "ApplyRocketChatRequiredChanges" => ChangeSet::Required,
                "ApplyRocketChatTextChanges" => ChangeSet::Text,
                _ => ChangeSet::Css,
            };
            let a: TenantArgs = args(&body)?;
            Value::Bool(service.apply_changes(&user, a.tenant_id, set).await?)
        }
        "TestConnection" => Value::Bool(service.test_connection()),
        "InitChat" => or_false(service.init_chat(&user, tokens.store()).await)?,
        "GetLoginForCurrentUser" => Value::String(service.login_for_current_user(&user).await),
        "GetLoginForEmail" => {
            let a: EmailArgs = args(&body)?;
            if a.email.trim().is_empty() {
                return Err(AppError::Validation("Email is required".into()));
            }
            or_false(service.login_for_email(&user, a.email.trim()).await)?
        }
        "GetUnreadCounter" => Value::from(service.unread_counter(&user, tokens.store()).await),
        other => return Err(AppError::NotFound(format!("Unknown method {other}"))),
    };

    Ok((tokens.into_jar(), Json(RpcResponse { result })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_means_default_args() {
        let a: TenantArgs = args(&Bytes::from_static(b"  ")).unwrap();
        assert!(a.tenant_id.is_none());
        let a: TenantArgs = args(&Bytes::from_static(br#"{"TenantId": 4}"#)).unwrap();
        assert_eq!(a.tenant_id, Some(4));
    }

    #[test]
    fn malformed_args_are_a_validation_error() {
        let r: AppResult<TenantArgs> = args(&Bytes::from_static(b"{nope"));
        assert!(matches!(r, Err(AppError::Validation(_))));
    }

    #[test]
    fn missing_value_is_false() {
        assert_eq!(or_false::<String>(None).unwrap(), Value::Bool(false));
        assert_eq!(or_false(Some("bob")).unwrap(), Value::String("bob".into()));
    }
}
