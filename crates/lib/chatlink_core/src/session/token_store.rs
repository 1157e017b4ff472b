//! Long-lived end-user session token storage.
//!
//! The bootstrapper only sees [`TokenStore`]; whether the token lands in a
//! browser cookie or a server-side user attribute is the adapter's business.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::backend::AuthHeaders;

/// Token and backend user id, always plaintext in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredToken {
    pub token: String,
    pub user_id: String,
}

impl std::fmt::Debug for StoredToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredToken")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

impl StoredToken {
    pub fn headers(&self) -> AuthHeaders {
        AuthHeaders {
            token: self.token.clone(),
            user_id: self.user_id.clone(),
        }
    }
}

/// Get/set/clear capability keyed by the host user's public id.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, user_key: &str) -> Option<StoredToken>;
    async fn set(&self, user_key: &str, token: &StoredToken, ttl: Duration);
    async fn clear(&self, user_key: &str);
}

#[derive(Debug, Clone)]
struct Entry {
    token: StoredToken,
    expires_at: DateTime<Utc>,
}

/// Server-side user attribute store. Values are kept unencrypted; the host's
/// storage encryption policy covers them.
#[derive(Debug, Default)]
pub struct AttributeTokenStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl AttributeTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove expired entries.
    pub async fn cleanup(&self) {
        let now = Utc::now();
        self.entries.write().await.retain(|_, e| e.expires_at > now);
    }
}

#[async_trait]
impl TokenStore for AttributeTokenStore {
    async fn get(&self, user_key: &str) -> Option<StoredToken> {
        let entries = self.entries.read().await;
        entries
            .get(user_key)
            .filter(|e| Utc::now() < e.expires_at)
            .map(|e| e.token.clone())
    }

    async fn set(&self, user_key: &str, token: &StoredToken, ttl: Duration) {
        let entry = Entry {
            token: token.clone(),
            expires_at: Utc::now() + ttl,
        };
        self.entries.write().await.insert(user_key.to_string(), entry);
    }

    async fn clear(&self, user_key: &str) {
        self.entries.write().await.remove(user_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> StoredToken {
        StoredToken {
            token: "t1".into(),
            user_id: "u1".into(),
        }
    }

    #[tokio::test]
    async fn set_get_clear() {
        let store = AttributeTokenStore::new();
        assert!(store.get("bob@x").await.is_none());
        store.set("bob@x", &token(), Duration::days(1)).await;
        assert_eq!(store.get("bob@x").await, Some(token()));
        assert!(store.get("eve@x").await.is_none());
        store.clear("bob@x").await;
        assert!(store.get("bob@x").await.is_none());
    }

    #[tokio::test]
    async fn expired_entry_is_absent() {
        let store = AttributeTokenStore::new();
        store.set("bob@x", &token(), Duration::zero()).await;
        assert!(store.get("bob@x").await.is_none());
        store.cleanup().await;
        assert!(store.entries.read().await.is_empty());
    }
}
