//! reqwest implementation of [`ChatApi`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;
use url::Url;

use super::models::{LoginResponse, UserResponse};
use super::{AdminHeaders, AuthHeaders, BackendError, ChatApi, ChatUser, Connector, LoginData, Me, NewUser};

/// Client bound to one backend base URL.
#[derive(Debug, Clone)]
pub struct RestChatApi {
    client: Client,
    base: Url,
    log_traffic: bool,
}

fn map_reqwest(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Transport(e.to_string())
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, BackendError> {
    serde_json::from_str(body).map_err(|e| BackendError::Decode(e.to_string()))
}

fn with_auth(req: RequestBuilder, auth: &AuthHeaders) -> RequestBuilder {
    req.header("X-Auth-Token", auth.token.as_str())
        .header("X-User-Id", auth.user_id.as_str())
}

fn with_admin(req: RequestBuilder, admin: &AdminHeaders) -> RequestBuilder {
    with_auth(req, &admin.auth)
        .header("X-2fa-code", admin.two_factor_code.as_str())
        .header("X-2fa-method", "password")
}

impl RestChatApi {
    /// `api_base` must end with `/` (e.g. `https://chat.example.com/api/v1/`).
    pub fn new(client: Client, api_base: &str, log_traffic: bool) -> Result<Self, BackendError> {
        let base = Url::parse(api_base).map_err(|e| BackendError::Url(e.to_string()))?;
        Ok(Self {
            client,
            base,
            log_traffic,
        })
    }

    fn url(&self, path: &str) -> Result<Url, BackendError> {
        self.base
            .join(path)
            .map_err(|e| BackendError::Url(e.to_string()))
    }

    fn get(&self, path: &str) -> Result<RequestBuilder, BackendError> {
        Ok(self.client.get(self.url(path)?))
    }

    fn post(&self, path: &str) -> Result<RequestBuilder, BackendError> {
        Ok(self.client.post(self.url(path)?))
    }

    /// Send `req`; anything but 200 is an error carrying the body.
    async fn send(&self, op: &str, req: RequestBuilder) -> Result<String, BackendError> {
        if self.log_traffic {
            debug!(op, base = %self.base, "REQUEST");
        }

        let resp = req.send().await.map_err(map_reqwest)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(map_reqwest)?;

        if self.log_traffic {
            debug!(op, status, body = %body, "RESPONSE");
        }

        if status != 200 {
            return Err(BackendError::Status { status, body });
        }
        Ok(body)
    }
}

#[async_trait]
impl ChatApi for RestChatApi {
    async fn login(&self, user: &str, password: &str) -> Result<LoginData, BackendError> {
        let req = self
            .post("login")?
            .form(&[("user", user), ("password", password)]);
        let body = self.send("login", req).await?;
        Ok(decode::<LoginResponse>(&body)?.data)
    }

    async fn logout(&self, auth: &AuthHeaders) -> Result<(), BackendError> {
        let req = with_auth(self.post("logout")?, auth);
        self.send("logout", req).await.map(|_| ())
    }

    async fn me(&self, auth: &AuthHeaders) -> Result<Me, BackendError> {
        let req = with_auth(self.get("me")?, auth);
        let body = self.send("me", req).await?;
        decode(&body)
    }

    async fn set_language(&self, auth: &AuthHeaders, language: &str) -> Result<(), BackendError> {
        let req = with_auth(self.post("users.setPreferences")?, auth).json(&json!({
            "userId": auth.user_id,
            "data": { "language": language },
        }));
        self.send("users.setPreferences", req).await.map(|_| ())
    }

    async fn subscriptions(&self, auth: &AuthHeaders) -> Result<serde_json::Value, BackendError> {
        let req = with_auth(self.get("subscriptions.get")?, auth);
        let body = self.send("subscriptions.get", req).await?;
        decode(&body)
    }

    async fn user_info(
        &self,
        admin: &AdminHeaders,
        username: &str,
    ) -> Result<ChatUser, BackendError> {
        let req = with_admin(self.get("users.info")?, admin).query(&[("username", username)]);
        let body = self.send("users.info", req).await?;
        Ok(decode::<UserResponse>(&body)?.user)
    }

    async fn create_user(
        &self,
        admin: &AdminHeaders,
        user: &NewUser,
    ) -> Result<ChatUser, BackendError> {
        let req = with_admin(self.post("users.create")?, admin).json(user);
        let body = self.send("users.create", req).await?;
        Ok(decode::<UserResponse>(&body)?.user)
    }

    async fn update_password(
        &self,
        admin: &AdminHeaders,
        user_id: &str,
        password: &str,
    ) -> Result<(), BackendError> {
        let req = with_admin(self.post("users.update")?, admin).json(&json!({
            "userId": user_id,
            "data": { "password": password },
        }));
        self.send("users.update", req).await.map(|_| ())
    }

    async fn delete_user(
        &self,
        admin: &AdminHeaders,
        username: &str,
        timeout: Option<Duration>,
    ) -> Result<(), BackendError> {
        let mut req =
            with_admin(self.post("users.delete")?, admin).json(&json!({ "username": username }));
        if let Some(t) = timeout {
            req = req.timeout(t);
        }
        self.send("users.delete", req).await.map(|_| ())
    }

    async fn get_setting(
        &self,
        admin: &AdminHeaders,
        id: &str,
    ) -> Result<serde_json::Value, BackendError> {
        let req = with_admin(self.get(&format!("settings/{id}"))?, admin);
        let body = self.send("settings.get", req).await?;
        let mut parsed: serde_json::Value = decode(&body)?;
        Ok(parsed
            .get_mut("value")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null))
    }

    async fn set_setting(
        &self,
        admin: &AdminHeaders,
        id: &str,
        value: &serde_json::Value,
    ) -> Result<(), BackendError> {
        let req =
            with_admin(self.post(&format!("settings/{id}"))?, admin).json(&json!({ "value": value }));
        self.send("settings.set", req).await.map(|_| ())
    }
}

/// Connector sharing one reqwest connection pool across backends.
#[derive(Debug, Clone)]
pub struct RestConnector {
    client: Client,
}

impl RestConnector {
    /// `timeout` bounds every request that does not set its own.
    pub fn new(timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(format!("client build failed: {e}")))?;
        Ok(Self { client })
    }
}

impl Connector for RestConnector {
    fn connect(
        &self,
        api_base: &str,
        log_traffic: bool,
    ) -> Result<Arc<dyn ChatApi>, BackendError> {
        Ok(Arc::new(RestChatApi::new(
            self.client.clone(),
            api_base,
            log_traffic,
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_urls_join_onto_base() {
        let api = RestChatApi::new(Client::new(), "https://chat.example.com/api/v1/", false).unwrap();
        assert_eq!(
            api.url("users.info").unwrap().as_str(),
            "https://chat.example.com/api/v1/users.info"
        );
        assert_eq!(
            api.url("settings/Iframe_Restrict_Access").unwrap().as_str(),
            "https://chat.example.com/api/v1/settings/Iframe_Restrict_Access"
        );
    }

    #[test]
    fn invalid_base_is_rejected() {
        assert!(matches!(
            RestChatApi::new(Client::new(), "not a url", false),
            Err(BackendError::Url(_))
        ));
    }
}
