//! Admin session acquisition and caching.
//!
//! An admin session, once obtained, is reused for the lifetime of the
//! process without a freshness check. Entries are dropped when an
//! admin-privileged call is answered with 401/403 or when the settings of
//! that scope change.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{AttemptError, first_success};
use crate::backend::{AdminHeaders, AuthHeaders, ChatApi, two_factor_code};
use crate::crypto::SecretBox;
use crate::redact::Redactor;

/// Cache key: which backend the admin session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminScope {
    Global,
    Tenant(i64),
}

#[derive(Debug, Clone)]
pub struct AdminSession {
    pub headers: AdminHeaders,
    pub acquired_at: DateTime<Utc>,
}

/// Which form of the stored admin password to try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminPassword {
    /// Stored value decrypted with the module key.
    Decrypted,
    /// Stored value as-is, for values that were never encrypted.
    Raw,
}

impl AdminPassword {
    /// Order in which stored-password forms are tried.
    pub const ORDER: [AdminPassword; 2] = [AdminPassword::Decrypted, AdminPassword::Raw];

    /// The password this strategy would log in with, if it applies.
    pub fn resolve(self, stored: &str, secrets: &SecretBox) -> Option<String> {
        let candidate = match self {
            AdminPassword::Decrypted => secrets.decrypt(stored).ok()?,
            AdminPassword::Raw => stored.to_string(),
        };
        Some(candidate).filter(|p| !p.is_empty())
    }
}

type Slot = Arc<Mutex<Option<AdminSession>>>;

/// Admin sessions keyed by [`AdminScope`].
///
/// Each scope has its own slot. A cold login holds only that slot's lock,
/// so concurrent callers of the same scope wait for one login while other
/// scopes are served independently.
#[derive(Debug, Default)]
pub struct AdminSessionCache {
    slots: Mutex<HashMap<AdminScope, Slot>>,
}

impl AdminSessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, scope: AdminScope) -> Slot {
        self.slots.lock().await.entry(scope).or_default().clone()
    }

    pub async fn get(&self, scope: AdminScope) -> Option<AdminSession> {
        let slot = self.slots.lock().await.get(&scope).cloned()?;
        slot.lock().await.clone()
    }

    pub async fn set(&self, scope: AdminScope, session: AdminSession) {
        let slot = self.slot(scope).await;
        *slot.lock().await = Some(session);
    }

    pub async fn invalidate(&self, scope: AdminScope) {
        let Some(slot) = self.slots.lock().await.remove(&scope) else {
            return;
        };
        if let Some(session) = slot.lock().await.take() {
            let age = Utc::now() - session.acquired_at;
            info!(?scope, age_secs = age.num_seconds(), "admin session invalidated");
        }
    }

    pub async fn clear(&self) {
        self.slots.lock().await.clear();
    }

    /// Return the cached session for `scope`, or log in as `username` trying
    /// each [`AdminPassword`] form in order and cache the first success.
    ///
    /// `None` means no admin session can be had until settings change; the
    /// next call tries again.
    pub async fn acquire(
        &self,
        scope: AdminScope,
        api: &dyn ChatApi,
        username: &str,
        stored_password: &str,
        secrets: &SecretBox,
        redactor: &Redactor,
    ) -> Option<AdminSession> {
        let slot = self.slot(scope).await;
        let mut entry = slot.lock().await;
        if let Some(session) = entry.as_ref() {
            return Some(session.clone());
        }

        let outcome = first_success(&AdminPassword::ORDER, |strategy| async move {
            let password = strategy
                .resolve(stored_password, secrets)
                .ok_or(AttemptError::Skipped)?;
            redactor.add_secret(&password);
            let data = api.login(username, &password).await?;
            redactor.add_secret(&data.auth_token);
            let code = two_factor_code(&password);
            redactor.add_secret(&code);
            Ok::<_, AttemptError>(AdminSession {
                headers: AdminHeaders {
                    auth: AuthHeaders {
                        token: data.auth_token,
                        user_id: data.user_id,
                    },
                    two_factor_code: code,
                },
                acquired_at: Utc::now(),
            })
        })
        .await;

        match outcome {
            Some((strategy, session)) => {
                info!(?scope, ?strategy, "admin session acquired");
                *entry = Some(session.clone());
                Some(session)
            }
            None => {
                warn!(?scope, admin = username, "admin login failed with every stored password form");
                None
            }
        }
    }
}
