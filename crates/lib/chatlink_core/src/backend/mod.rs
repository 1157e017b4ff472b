//! Chat backend REST surface.
//!
//! [`ChatApi`] is the seam between Chatlink's flows and the chat backend; the
//! reqwest implementation lives in [`rest`]. Header-based auth: `X-Auth-Token`
//! and `X-User-Id`, plus `X-2fa-code`/`X-2fa-method` on admin calls.

pub mod models;
pub mod rest;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use models::{ChatUser, LoginData, Me, NewUser, sum_unread};
pub use rest::{RestChatApi, RestConnector};

/// Errors talking to the chat backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Invalid backend URL: {0}")]
    Url(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Backend timed out")]
    Timeout,

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response parse error: {0}")]
    Decode(String),
}

impl BackendError {
    /// 401/403: the session used for the call is no longer accepted.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, BackendError::Status { status: 401 | 403, .. })
    }

    /// The backend refused to create an account that already exists.
    pub fn is_duplicate(&self) -> bool {
        match self {
            BackendError::Status { status: 400, body } => {
                body.to_ascii_lowercase().contains("already in use")
            }
            _ => false,
        }
    }
}

/// End-user session headers.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthHeaders {
    pub token: String,
    pub user_id: String,
}

impl std::fmt::Debug for AuthHeaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthHeaders")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

/// Admin session headers, including the password-method 2FA code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminHeaders {
    pub auth: AuthHeaders,
    pub two_factor_code: String,
}

/// `X-2fa-code` value: hex SHA-256 of the admin password.
pub fn two_factor_code(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

/// Operations Chatlink needs from the chat backend.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// `POST login`
    async fn login(&self, user: &str, password: &str) -> Result<LoginData, BackendError>;

    /// `POST logout`
    async fn logout(&self, auth: &AuthHeaders) -> Result<(), BackendError>;

    /// `GET me`
    async fn me(&self, auth: &AuthHeaders) -> Result<Me, BackendError>;

    /// `POST users.setPreferences` with `{language}`.
    async fn set_language(&self, auth: &AuthHeaders, language: &str) -> Result<(), BackendError>;

    /// `GET subscriptions.get`, raw body.
    async fn subscriptions(&self, auth: &AuthHeaders) -> Result<serde_json::Value, BackendError>;

    /// `GET users.info?username=`
    async fn user_info(&self, admin: &AdminHeaders, username: &str)
    -> Result<ChatUser, BackendError>;

    /// `POST users.create`
    async fn create_user(
        &self,
        admin: &AdminHeaders,
        user: &NewUser,
    ) -> Result<ChatUser, BackendError>;

    /// `POST users.update` with `{userId, data: {password}}`.
    async fn update_password(
        &self,
        admin: &AdminHeaders,
        user_id: &str,
        password: &str,
    ) -> Result<(), BackendError>;

    /// `POST users.delete`, optionally bounded by `timeout`.
    async fn delete_user(
        &self,
        admin: &AdminHeaders,
        username: &str,
        timeout: Option<Duration>,
    ) -> Result<(), BackendError>;

    /// `GET settings/<id>`, returns the `value` field.
    async fn get_setting(
        &self,
        admin: &AdminHeaders,
        id: &str,
    ) -> Result<serde_json::Value, BackendError>;

    /// `POST settings/<id>` with `{value}`.
    async fn set_setting(
        &self,
        admin: &AdminHeaders,
        id: &str,
        value: &serde_json::Value,
    ) -> Result<(), BackendError>;
}

/// Builds a [`ChatApi`] bound to one backend base URL (`…/api/v1/`).
///
/// `log_traffic` turns on request/response debug lines for that client.
pub trait Connector: Send + Sync {
    fn connect(&self, api_base: &str, log_traffic: bool)
    -> Result<Arc<dyn ChatApi>, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_factor_code_is_sha256_hex() {
        assert_eq!(
            two_factor_code("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn duplicate_detection() {
        let dup = BackendError::Status {
            status: 400,
            body: r#"{"success":false,"error":"Username is already in use"}"#.into(),
        };
        assert!(dup.is_duplicate());
        let other = BackendError::Status {
            status: 400,
            body: "invalid email".into(),
        };
        assert!(!other.is_duplicate());
        assert!(!BackendError::Timeout.is_duplicate());
    }

    #[test]
    fn unauthorized_detection() {
        let e = BackendError::Status {
            status: 401,
            body: String::new(),
        };
        assert!(e.is_unauthorized());
        assert!(!BackendError::Transport("refused".into()).is_unauthorized());
    }

    #[test]
    fn auth_headers_debug_hides_token() {
        let h = AuthHeaders {
            token: "tok-secret".into(),
            user_id: "u1".into(),
        };
        assert!(!format!("{h:?}").contains("tok-secret"));
    }
}
