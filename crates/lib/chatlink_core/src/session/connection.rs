//! A connected backend plus lazy access to its admin session.

use std::sync::Arc;

use tracing::warn;

use super::admin::{AdminScope, AdminSessionCache};
use crate::backend::{AdminHeaders, BackendError, ChatApi};
use crate::crypto::SecretBox;
use crate::redact::Redactor;
use crate::settings::BackendSettings;

#[derive(Clone)]
pub struct Connection {
    pub api: Arc<dyn ChatApi>,
    pub scope: AdminScope,
    backend: BackendSettings,
    cache: Arc<AdminSessionCache>,
    secrets: SecretBox,
    redactor: Redactor,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("scope", &self.scope)
            .field("chat_url", &self.backend.chat_url)
            .finish_non_exhaustive()
    }
}

impl Connection {
    pub fn new(
        api: Arc<dyn ChatApi>,
        scope: AdminScope,
        backend: BackendSettings,
        cache: Arc<AdminSessionCache>,
        secrets: SecretBox,
        redactor: Redactor,
    ) -> Self {
        Self {
            api,
            scope,
            backend,
            cache,
            secrets,
            redactor,
        }
    }

    pub fn chat_url(&self) -> &str {
        &self.backend.chat_url
    }

    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    /// Admin headers for this scope, logging in on a cold cache.
    pub async fn admin_headers(&self) -> Option<AdminHeaders> {
        self.cache
            .acquire(
                self.scope,
                self.api.as_ref(),
                &self.backend.admin_username,
                &self.backend.admin_password,
                &self.secrets,
                &self.redactor,
            )
            .await
            .map(|s| s.headers)
    }

    /// Pass an admin call's result through, dropping the cached admin
    /// session when the backend rejected it.
    pub async fn observe<T>(&self, op: &str, result: Result<T, BackendError>) -> Result<T, BackendError> {
        if let Err(e) = &result
            && e.is_unauthorized()
        {
            warn!(op, scope = ?self.scope, "admin call rejected, dropping cached admin session");
            self.cache.invalidate(self.scope).await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeChat;

    fn connection(fake: &FakeChat, cache: Arc<AdminSessionCache>) -> Connection {
        Connection::new(
            Arc::new(fake.clone()),
            AdminScope::Global,
            BackendSettings {
                chat_url: "https://chat.test".into(),
                admin_username: "admin".into(),
                admin_password: "pw".into(),
                tenant_scoped: false,
            },
            cache,
            SecretBox::new("k"),
            Redactor::new(),
        )
    }

    #[tokio::test]
    async fn rejected_admin_call_invalidates_and_next_call_logs_in_again() {
        let fake = FakeChat::new().with_account("admin", "a-id", "pw");
        let cache = Arc::new(AdminSessionCache::new());
        let conn = connection(&fake, cache.clone());

        let admin = conn.admin_headers().await.unwrap();
        fake.set_admin_unauthorized(true);
        let r = conn.observe("users.info", conn.api.user_info(&admin, "bob").await).await;
        assert!(r.unwrap_err().is_unauthorized());
        assert!(cache.get(AdminScope::Global).await.is_none());

        fake.set_admin_unauthorized(false);
        conn.admin_headers().await.unwrap();
        assert_eq!(fake.count("login"), 2);
    }

    #[tokio::test]
    async fn other_errors_keep_the_session() {
        let fake = FakeChat::new().with_account("admin", "a-id", "pw");
        let cache = Arc::new(AdminSessionCache::new());
        let conn = connection(&fake, cache.clone());

        let admin = conn.admin_headers().await.unwrap();
        let r = conn.observe("users.info", conn.api.user_info(&admin, "nobody").await).await;
        assert!(r.is_err());
        assert!(cache.get(AdminScope::Global).await.is_some());
    }
}
