//! Operations exposed to the host: settings, reconciliation, bootstrap and
//! event hooks.
//!
//! Role checks happen before any backend call. Backend trouble is logged and
//! reported as `None`/`false`; only access and local storage problems surface
//! as [`ChatError`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::Connector;
use crate::bootstrap::{Bootstrap, ChatSession};
use crate::crypto::SecretBox;
use crate::host::{HostDirectory, HostError, HostUser, Role, Tenant};
use crate::reconcile::{self, ChangeSet};
use crate::redact::Redactor;
use crate::session::{AdminScope, AdminSessionCache, Connection, TokenStore};
use crate::settings::{ModuleSettings, Settings, SettingsError, TenantSettings};
use crate::username::derive_username;

/// Upper bound for backend work done inside host event hooks.
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Access denied")]
    AccessDenied,

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Host error: {0}")]
    Host(#[from] HostError),
}

/// Fail with [`ChatError::AccessDenied`] unless `user` has at least `min`.
pub fn require_role(user: &HostUser, min: Role) -> Result<(), ChatError> {
    if user.role >= min {
        Ok(())
    } else {
        debug!(user_id = user.id, role = ?user.role, required = ?min, "role check failed");
        Err(ChatError::AccessDenied)
    }
}

/// `GetSettings` result. Fields a role may not see are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SettingsView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_add_meeting_link_to_event: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_link_url: Option<String>,
    #[serde(
        rename = "UnreadCounterIntervalInSeconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub unread_counter_interval_secs: Option<u32>,
}

/// `UpdateSettings` arguments.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SettingsUpdate {
    #[serde(default)]
    pub tenant_id: Option<i64>,
    #[serde(default)]
    pub chat_url: String,
    #[serde(default)]
    pub admin_username: String,
    /// Plaintext or already encrypted. Absent keeps the stored password.
    #[serde(default)]
    pub admin_password: Option<String>,
}

impl std::fmt::Debug for SettingsUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsUpdate")
            .field("tenant_id", &self.tenant_id)
            .field("chat_url", &self.chat_url)
            .field("admin_username", &self.admin_username)
            .finish_non_exhaustive()
    }
}

/// Values for the embedded chat page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPage {
    /// Empty when bootstrap failed; the page then shows the backend login.
    pub token: String,
    pub url: String,
}

/// Zero tenant ids mean "global".
fn tenant_arg(tenant_id: Option<i64>) -> Option<i64> {
    tenant_id.filter(|id| *id != 0)
}

#[derive(Clone)]
pub struct ChatService {
    settings: Settings,
    host: Arc<dyn HostDirectory>,
    connector: Arc<dyn Connector>,
    admin_cache: Arc<AdminSessionCache>,
    secrets: SecretBox,
    redactor: Redactor,
    hook_timeout: Duration,
}

impl ChatService {
    pub fn new(
        settings: Settings,
        host: Arc<dyn HostDirectory>,
        connector: Arc<dyn Connector>,
        secrets: SecretBox,
        redactor: Redactor,
    ) -> Self {
        Self {
            settings,
            host,
            connector,
            admin_cache: Arc::new(AdminSessionCache::new()),
            secrets,
            redactor,
            hook_timeout: DEFAULT_HOOK_TIMEOUT,
        }
    }

    pub fn with_hook_timeout(mut self, timeout: Duration) -> Self {
        self.hook_timeout = timeout;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn host(&self) -> &dyn HostDirectory {
        self.host.as_ref()
    }

    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    pub fn secrets(&self) -> &SecretBox {
        &self.secrets
    }

    /// Connect to the backend serving `tenant_id`, or the global one.
    ///
    /// `Ok(None)` when no backend is configured for that scope.
    async fn connection(&self, tenant_id: Option<i64>) -> Result<Option<Connection>, ChatError> {
        let settings = self.settings.snapshot().await;
        let tenant = match tenant_arg(tenant_id) {
            Some(id) => self.host.tenant_by_id(id).await?,
            None => None,
        };

        let backend = settings.backend_for(tenant.as_ref().map(|t| t.name.as_str()));
        if !backend.is_configured() {
            debug!(tenant = ?tenant_id, "chat backend not configured");
            return Ok(None);
        }

        let api = match self
            .connector
            .connect(&backend.api_base(), settings.enable_logging)
        {
            Ok(api) => api,
            Err(e) => {
                warn!(chat_url = %backend.chat_url, error = %e, "cannot build chat backend client");
                return Ok(None);
            }
        };

        let scope = match (&tenant, backend.tenant_scoped) {
            (Some(t), true) => AdminScope::Tenant(t.id),
            _ => AdminScope::Global,
        };

        Ok(Some(Connection::new(
            api,
            scope,
            backend,
            self.admin_cache.clone(),
            self.secrets.clone(),
            self.redactor.clone(),
        )))
    }

    /// Connection for flows that must not fail loudly.
    async fn user_connection(&self, user: &HostUser) -> Option<Connection> {
        match self.connection(Some(user.tenant_id)).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(user_id = user.id, error = %e, "cannot resolve chat backend");
                None
            }
        }
    }

    /// Tenant `tenant_id` if `user` may manage it.
    async fn managed_tenant(&self, user: &HostUser, tenant_id: i64) -> Result<Option<Tenant>, ChatError> {
        require_role(user, Role::TenantAdmin)?;
        let tenant = self.host.tenant_by_id(tenant_id).await?;
        Ok(tenant.filter(|t| user.is_super_admin() || user.tenant_id == t.id))
    }

    // ---- settings ----------------------------------------------------------

    pub async fn get_settings(
        &self,
        user: &HostUser,
        tenant_id: Option<i64>,
    ) -> Result<SettingsView, ChatError> {
        require_role(user, Role::NormalUser)?;
        let settings = self.settings.snapshot().await;

        let (chat_url, admin_username) = match tenant_arg(tenant_id) {
            Some(id) => match self.managed_tenant(user, id).await? {
                Some(tenant) => {
                    let backend = settings.backend_for(Some(&tenant.name));
                    (backend.chat_url, backend.admin_username)
                }
                None => (String::new(), String::new()),
            },
            None => (settings.chat_url.clone(), settings.admin_username.clone()),
        };

        let view = if user.role.is_normal_or_tenant() {
            SettingsView {
                chat_url: Some(chat_url),
                allow_add_meeting_link_to_event: Some(settings.allow_add_meeting_link_to_event),
                meeting_link_url: Some(settings.meeting_link_url.clone()),
                unread_counter_interval_secs: Some(settings.unread_counter_interval_secs),
                ..Default::default()
            }
        } else if user.is_super_admin() {
            SettingsView {
                chat_url: Some(chat_url),
                admin_username: Some(admin_username),
                ..Default::default()
            }
        } else {
            SettingsView::default()
        };
        Ok(view)
    }

    /// Save backend URL and admin credentials globally or for one tenant.
    ///
    /// Returns false when the tenant does not exist or is not managed by
    /// `user`.
    pub async fn update_settings(&self, user: &HostUser, update: SettingsUpdate) -> Result<bool, ChatError> {
        let password = match update.admin_password.as_deref().filter(|p| !p.is_empty()) {
            Some(p) => {
                self.redactor.add_secret(p);
                Some(
                    self.secrets
                        .ensure_encrypted(p)
                        .map_err(SettingsError::from)?,
                )
            }
            None => None,
        };

        match tenant_arg(update.tenant_id) {
            Some(id) => {
                let Some(tenant) = self.managed_tenant(user, id).await? else {
                    return Ok(false);
                };
                self.settings
                    .update(|s| {
                        let entry = s
                            .tenants
                            .entry(tenant.name.clone())
                            .or_insert_with(TenantSettings::default);
                        entry.chat_url = Some(update.chat_url.clone());
                        entry.admin_username = Some(update.admin_username.clone());
                        if let Some(p) = password {
                            entry.admin_password = Some(p);
                        }
                    })
                    .await?;
                self.admin_cache.invalidate(AdminScope::Tenant(tenant.id)).await;
                info!(tenant = %tenant.name, "tenant chat settings updated");
            }
            None => {
                require_role(user, Role::SuperAdmin)?;
                self.settings
                    .update(|s: &mut ModuleSettings| {
                        s.chat_url = update.chat_url.clone();
                        s.admin_username = update.admin_username.clone();
                        if let Some(p) = password {
                            s.admin_password = p;
                        }
                    })
                    .await?;
                // Tenants without their own URL share the global entry.
                self.admin_cache.clear().await;
                info!("global chat settings updated");
            }
        }
        Ok(true)
    }

    /// Current backend values of the required integration settings.
    pub async fn get_rocketchat_settings(
        &self,
        user: &HostUser,
        tenant_id: Option<i64>,
    ) -> Result<Option<Map<String, Value>>, ChatError> {
        require_role(user, Role::SuperAdmin)?;
        match self.connection(tenant_id).await? {
            Some(conn) => Ok(reconcile::read_required(&conn).await),
            None => Ok(None),
        }
    }

    pub async fn apply_changes(
        &self,
        user: &HostUser,
        tenant_id: Option<i64>,
        set: ChangeSet,
    ) -> Result<bool, ChatError> {
        require_role(user, Role::SuperAdmin)?;
        match self.connection(tenant_id).await? {
            Some(conn) => Ok(reconcile::apply(&conn, set).await),
            None => Ok(false),
        }
    }

    /// Not supported; always false.
    pub fn test_connection(&self) -> bool {
        false
    }

    // ---- bootstrap ---------------------------------------------------------

    pub async fn init_chat(&self, user: &HostUser, store: &dyn TokenStore) -> Option<ChatSession> {
        let conn = self.user_connection(user).await?;
        let settings = self.settings.snapshot().await;
        Bootstrap::new(&conn, self.host.as_ref(), settings.username_format)
            .init_chat(user, store, settings.token_ttl())
            .await
    }

    pub async fn unread_counter(&self, user: &HostUser, store: &dyn TokenStore) -> u64 {
        self.init_chat(user, store)
            .await
            .map(|s| s.unread_counter)
            .unwrap_or(0)
    }

    pub async fn login_for_current_user(&self, user: &HostUser) -> String {
        let format = self.settings.snapshot().await.username_format;
        derive_username(&user.public_id, format)
    }

    /// Backend username for `email` on `user`'s backend, creating the account
    /// when absent.
    pub async fn login_for_email(&self, user: &HostUser, email: &str) -> Option<String> {
        let conn = self.user_connection(user).await?;
        let format = self.settings.snapshot().await.username_format;
        Bootstrap::new(&conn, self.host.as_ref(), format)
            .login_for_email(email)
            .await
    }

    /// Page values for the full chat view, `path` relative to the chat URL.
    ///
    /// The token is empty when no chat session could be had, including when
    /// no backend is configured; the page then shows the backend's own login.
    pub async fn chat_page(
        &self,
        user: &HostUser,
        store: &dyn TokenStore,
        path: &str,
    ) -> Result<ChatPage, ChatError> {
        let settings = self.settings.snapshot().await;
        let tenant = self.host.tenant_by_id(user.tenant_id).await?;
        let backend = settings.backend_for(tenant.as_ref().map(|t| t.name.as_str()));

        let token = if backend.is_configured() {
            self.init_chat(user, store)
                .await
                .map(|s| s.auth_token)
                .unwrap_or_default()
        } else {
            String::new()
        };
        Ok(ChatPage {
            token,
            url: format!("{}/{}", backend.chat_url.trim_end_matches('/'), path),
        })
    }

    /// Backend username to open a direct chat with contact `contact_id`.
    pub async fn direct_chat_login(&self, user: &HostUser, contact_id: &str) -> Option<String> {
        let email = match self.host.contact_chat_email(contact_id, user).await {
            Ok(Some(email)) => email,
            Ok(None) => {
                debug!(contact_id, "contact has no chat address");
                return None;
            }
            Err(e) => {
                warn!(contact_id, error = %e, "cannot resolve contact");
                return None;
            }
        };
        self.login_for_email(user, &email).await
    }

    // ---- hooks -------------------------------------------------------------

    /// Delete the chat account of host user `user_id` before the host does.
    ///
    /// Bounded by the hook timeout; any backend failure yields `Ok(false)`.
    pub async fn before_delete_user(&self, caller: &HostUser, user_id: i64) -> Result<bool, ChatError> {
        let Some(target) = self.host.user_by_id(user_id).await? else {
            return Ok(false);
        };

        let own_account = caller.role.is_normal_or_tenant() && caller.id == target.id;
        let tenant_admin = caller.role == Role::TenantAdmin && caller.tenant_id == target.tenant_id;
        if !(own_account || tenant_admin || caller.is_super_admin()) {
            return Err(ChatError::AccessDenied);
        }

        let Some(conn) = self.connection(Some(target.tenant_id)).await? else {
            return Ok(false);
        };
        let format = self.settings.snapshot().await.username_format;
        let username = derive_username(&target.public_id, format);

        let attempt = async {
            let Some(admin) = conn.admin_headers().await else {
                return false;
            };
            let result = conn
                .api
                .delete_user(&admin, &username, Some(self.hook_timeout))
                .await;
            match conn.observe("users.delete", result).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(username = %username, error = %e, "cannot delete chat user");
                    false
                }
            }
        };

        match tokio::time::timeout(self.hook_timeout, attempt).await {
            Ok(deleted) => {
                if deleted {
                    info!(username = %username, "chat user deleted");
                }
                Ok(deleted)
            }
            Err(_) => {
                warn!(username = %username, timeout = ?self.hook_timeout, "chat user deletion timed out");
                Ok(false)
            }
        }
    }

    /// Drop the stored token and end the backend session if we can.
    pub async fn after_logout(&self, user: &HostUser, store: &dyn TokenStore) {
        if let Some(token) = store.get(&user.public_id).await
            && let Some(conn) = self.user_connection(user).await
        {
            let headers = token.headers();
            let logout = conn.api.logout(&headers);
            match tokio::time::timeout(self.hook_timeout, logout).await {
                Ok(Ok(())) => debug!(user_id = user.id, "chat session closed"),
                Ok(Err(e)) => debug!(user_id = user.id, error = %e, "chat logout failed"),
                Err(_) => debug!(user_id = user.id, "chat logout timed out"),
            }
        }
        store.clear(&user.public_id).await;
        self.redactor.forget_user(&user.public_id);
    }

    /// Make sure the chat account exists right after a host login. Never
    /// fails the login; returns whether the account is there.
    pub async fn after_login(&self, user: &HostUser) -> bool {
        let Some(conn) = self.user_connection(user).await else {
            return false;
        };
        let format = self.settings.snapshot().await.username_format;
        Bootstrap::new(&conn, self.host.as_ref(), format)
            .ensure_account(&user.public_id)
            .await
            .is_some()
    }
}
