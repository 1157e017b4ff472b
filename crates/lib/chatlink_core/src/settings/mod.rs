//! Module settings: chat backend URL, admin credentials, username format,
//! and the per-tenant override layer.

pub mod store;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::warn;

use crate::crypto::CryptoError;
use crate::username::UsernameFormat;

pub use store::{FileSettingsStore, MemorySettingsStore, SettingsStore};

/// Default number of days a stored session token is kept.
pub const DEFAULT_TOKEN_EXPIRE_DAYS: i64 = 30;

/// Default header badge polling interval.
pub const DEFAULT_UNREAD_COUNTER_INTERVAL_SECS: u32 = 15;

/// Settings errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Encryption error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Per-tenant overrides. Unset fields fall back to the global value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TenantSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_username: Option<String>,
    /// Encrypted at rest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,
}

/// Module configuration as persisted by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ModuleSettings {
    pub chat_url: String,
    pub admin_username: String,
    /// Encrypted at rest; may be a legacy plaintext value.
    pub admin_password: String,
    #[serde(rename = "ChatUsernameFormat")]
    pub username_format: UsernameFormat,
    pub enable_logging: bool,
    pub allow_add_meeting_link_to_event: bool,
    pub meeting_link_url: String,
    #[serde(rename = "UnreadCounterIntervalInSeconds")]
    pub unread_counter_interval_secs: u32,
    pub token_expire_days: i64,
    /// Overrides keyed by tenant name.
    pub tenants: HashMap<String, TenantSettings>,
}

impl Default for ModuleSettings {
    fn default() -> Self {
        Self {
            chat_url: String::new(),
            admin_username: String::new(),
            admin_password: String::new(),
            username_format: UsernameFormat::default(),
            enable_logging: false,
            allow_add_meeting_link_to_event: false,
            meeting_link_url: String::new(),
            unread_counter_interval_secs: DEFAULT_UNREAD_COUNTER_INTERVAL_SECS,
            token_expire_days: DEFAULT_TOKEN_EXPIRE_DAYS,
            tenants: HashMap::new(),
        }
    }
}

/// Backend connection values after tenant resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    pub chat_url: String,
    pub admin_username: String,
    /// As stored: usually encrypted.
    pub admin_password: String,
    /// True when the tenant overrides the chat URL.
    pub tenant_scoped: bool,
}

impl BackendSettings {
    /// A backend client is only built when both URL and admin user are set.
    pub fn is_configured(&self) -> bool {
        !self.chat_url.trim().is_empty() && !self.admin_username.trim().is_empty()
    }

    /// `<ChatUrl>/api/v1/`
    pub fn api_base(&self) -> String {
        format!("{}/api/v1/", self.chat_url.trim_end_matches('/'))
    }
}

impl ModuleSettings {
    /// Resolve backend values for `tenant`: tenant value first, global second.
    pub fn backend_for(&self, tenant: Option<&str>) -> BackendSettings {
        let overrides = tenant.and_then(|t| self.tenants.get(t));
        let pick = |over: Option<&String>, global: &String| {
            over.filter(|v| !v.is_empty()).unwrap_or(global).clone()
        };

        let tenant_url = overrides.and_then(|o| o.chat_url.as_ref());
        BackendSettings {
            chat_url: pick(tenant_url, &self.chat_url),
            admin_username: pick(
                overrides.and_then(|o| o.admin_username.as_ref()),
                &self.admin_username,
            ),
            admin_password: pick(
                overrides.and_then(|o| o.admin_password.as_ref()),
                &self.admin_password,
            ),
            tenant_scoped: tenant_url.is_some_and(|u| !u.is_empty()),
        }
    }

    /// Lifetime of a stored session token.
    ///
    /// Non-positive or unrepresentable `TokenExpireDays` fall back to
    /// [`DEFAULT_TOKEN_EXPIRE_DAYS`].
    pub fn token_ttl(&self) -> TimeDelta {
        let days = Some(self.token_expire_days).filter(|d| *d > 0);
        match days.and_then(TimeDelta::try_days) {
            Some(ttl) => ttl,
            None => {
                warn!(
                    token_expire_days = self.token_expire_days,
                    "TokenExpireDays out of range, using default"
                );
                TimeDelta::days(DEFAULT_TOKEN_EXPIRE_DAYS)
            }
        }
    }
}

/// Live settings shared across requests, written through to a store.
#[derive(Clone)]
pub struct Settings {
    current: Arc<RwLock<ModuleSettings>>,
    store: Arc<dyn SettingsStore>,
}

impl Settings {
    /// Load settings from `store`.
    pub async fn load(store: Arc<dyn SettingsStore>) -> Result<Self, SettingsError> {
        let initial = store.load().await?;
        Ok(Self {
            current: Arc::new(RwLock::new(initial)),
            store,
        })
    }

    /// Settings held only in memory.
    pub fn in_memory(initial: ModuleSettings) -> Self {
        Self {
            current: Arc::new(RwLock::new(initial.clone())),
            store: Arc::new(MemorySettingsStore::new(initial)),
        }
    }

    /// A copy of the current settings.
    pub async fn snapshot(&self) -> ModuleSettings {
        self.current.read().await.clone()
    }

    /// Apply `change` and persist the result. In-memory state is only
    /// replaced once the store accepted the new value.
    pub async fn update<F>(&self, change: F) -> Result<(), SettingsError>
    where
        F: FnOnce(&mut ModuleSettings),
    {
        let mut guard = self.current.write().await;
        let mut next = guard.clone();
        change(&mut next);
        self.store.save(&next).await?;
        *guard = next;
        Ok(())
    }
}
