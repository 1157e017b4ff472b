//! Cookie-backed chat token store.
//!
//! The token cookie is encrypted with the module key; the user id cookie is
//! plain. Both cookies belong to whoever sent the request, so the user key
//! passed by the bootstrapper is not part of the cookie name.

use std::sync::Mutex;

use async_trait::async_trait;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chatlink_core::crypto::SecretBox;
use chatlink_core::session::{StoredToken, TokenStore};
use tracing::debug;

/// Cookie name for the encrypted chat token.
pub const TOKEN_COOKIE: &str = "RocketChatAuthToken";
/// Cookie name for the chat user id.
pub const USER_ID_COOKIE: &str = "RocketChatUserId";

/// Cookie attributes shared by both chat cookies.
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub secure: bool,
    pub same_site: SameSite,
}

fn build(name: &'static str, value: String, policy: CookiePolicy, max_age: time::Duration) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(policy.secure)
        .same_site(policy.same_site)
        .path("/")
        .max_age(max_age)
        .build()
}

/// Request-scoped token store over the request's cookie jar. Changes are
/// collected in the jar, which the handler returns with its response.
pub struct CookieTokenStore {
    jar: Mutex<CookieJar>,
    secrets: SecretBox,
    policy: CookiePolicy,
}

impl CookieTokenStore {
    pub fn new(jar: CookieJar, secrets: SecretBox, policy: CookiePolicy) -> Self {
        Self {
            jar: Mutex::new(jar),
            secrets,
            policy,
        }
    }

    /// The jar with every cookie change made through this store.
    pub fn into_jar(self) -> CookieJar {
        self.jar
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_jar<R>(&self, f: impl FnOnce(&mut CookieJar) -> R) -> R {
        let mut jar = self.jar.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut jar)
    }
}

#[async_trait]
impl TokenStore for CookieTokenStore {
    async fn get(&self, _user_key: &str) -> Option<StoredToken> {
        let (encrypted, user_id) = self.with_jar(|jar| {
            (
                jar.get(TOKEN_COOKIE).map(|c| c.value().to_string()),
                jar.get(USER_ID_COOKIE).map(|c| c.value().to_string()),
            )
        });
        let (encrypted, user_id) = (encrypted?, user_id?);
        if encrypted.is_empty() || user_id.is_empty() {
            return None;
        }
        match self.secrets.decrypt(&encrypted) {
            Ok(token) => Some(StoredToken { token, user_id }),
            Err(e) => {
                debug!(error = %e, "ignoring undecryptable chat token cookie");
                None
            }
        }
    }

    async fn set(&self, _user_key: &str, token: &StoredToken, ttl: chrono::Duration) {
        let encrypted = match self.secrets.encrypt(&token.token) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "cannot encrypt chat token, cookie not set");
                return;
            }
        };
        let max_age = time::Duration::seconds(ttl.num_seconds());
        let policy = self.policy;
        self.with_jar(|jar| {
            *jar = jar
                .clone()
                .add(build(TOKEN_COOKIE, encrypted, policy, max_age))
                .add(build(USER_ID_COOKIE, token.user_id.clone(), policy, max_age));
        });
    }

    async fn clear(&self, _user_key: &str) {
        let policy = self.policy;
        self.with_jar(|jar| {
            *jar = jar
                .clone()
                .add(build(TOKEN_COOKIE, String::new(), policy, time::Duration::ZERO))
                .add(build(USER_ID_COOKIE, String::new(), policy, time::Duration::ZERO));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CookiePolicy {
        CookiePolicy {
            secure: true,
            same_site: SameSite::None,
        }
    }

    fn token() -> StoredToken {
        StoredToken {
            token: "chat-token".into(),
            user_id: "u1".into(),
        }
    }

    #[tokio::test]
    async fn token_cookie_is_encrypted_and_readable() {
        let store = CookieTokenStore::new(CookieJar::new(), SecretBox::new("k"), policy());
        store.set("bob", &token(), chrono::Duration::days(30)).await;
        assert_eq!(store.get("bob").await, Some(token()));

        let jar = store.into_jar();
        let cookie = jar.get(TOKEN_COOKIE).unwrap();
        assert_ne!(cookie.value(), "chat-token");
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(30)));
        assert_eq!(jar.get(USER_ID_COOKIE).unwrap().value(), "u1");
    }

    #[tokio::test]
    async fn cookie_from_another_key_is_ignored() {
        let other = SecretBox::new("other");
        let jar = CookieJar::new()
            .add(Cookie::new(TOKEN_COOKIE, other.encrypt("t").unwrap()))
            .add(Cookie::new(USER_ID_COOKIE, "u1"));
        let store = CookieTokenStore::new(jar, SecretBox::new("k"), policy());
        assert!(store.get("bob").await.is_none());
    }

    #[tokio::test]
    async fn clear_expires_both_cookies() {
        let store = CookieTokenStore::new(CookieJar::new(), SecretBox::new("k"), policy());
        store.set("bob", &token(), chrono::Duration::days(1)).await;
        store.clear("bob").await;
        assert!(store.get("bob").await.is_none());
        let jar = store.into_jar();
        assert_eq!(jar.get(TOKEN_COOKIE).unwrap().max_age(), Some(time::Duration::ZERO));
    }
}
