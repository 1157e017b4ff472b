//! Login-or-create bootstrap for a host user's chat session.
//!
//! A run starts from whatever the [`TokenStore`] holds. A stored token that
//! the backend still accepts is reused as is. Otherwise the chat account is
//! looked up by derived username, created when absent, and logged into with
//! the host account's current password, repairing a drifted password once
//! before giving up.
//!
//! Backend failures never escape: every step logs and collapses into `None`.

use chrono::Duration;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{AuthHeaders, ChatUser, LoginData, NewUser, sum_unread};
use crate::host::{HostAccount, HostDirectory, HostUser};
use crate::language;
use crate::session::{AttemptError, Connection, StoredToken, TokenStore, first_success};
use crate::username::{UsernameFormat, derive_username};

/// Password every demo account shares on the chat backend.
pub const DEMO_PASSWORD: &str = "demo";

/// Result of a successful bootstrap.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub auth_token: String,
    pub user_id: String,
    pub unread_counter: u64,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("user_id", &self.user_id)
            .field("unread_counter", &self.unread_counter)
            .finish_non_exhaustive()
    }
}

/// How to get an end user logged in once their account exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserLogin {
    /// Log in with the host account's current password.
    Direct,
    /// Force the backend password to the host's, then log in. Skipped for
    /// demo accounts.
    RepairPassword,
}

impl UserLogin {
    pub const ORDER: [UserLogin; 2] = [UserLogin::Direct, UserLogin::RepairPassword];
}

struct Credentials {
    /// Host public id the secrets are registered under.
    owner: String,
    account: HostAccount,
    password: String,
    demo: bool,
}

pub struct Bootstrap<'a> {
    conn: &'a Connection,
    host: &'a dyn HostDirectory,
    format: UsernameFormat,
}

impl<'a> Bootstrap<'a> {
    pub fn new(conn: &'a Connection, host: &'a dyn HostDirectory, format: UsernameFormat) -> Self {
        Self { conn, host, format }
    }

    /// Make sure `user` has a working chat session and return it.
    ///
    /// Safe to call on every page load: with a valid stored token the only
    /// backend calls are `me`, the optional language update and the unread
    /// counter.
    pub async fn init_chat(
        &self,
        user: &HostUser,
        store: &dyn TokenStore,
        ttl: Duration,
    ) -> Option<ChatSession> {
        let wanted_language = language::to_short_code(&user.language);

        let reusable = match store.get(&user.public_id).await {
            Some(stored) => {
                self.conn
                    .redactor()
                    .add_user_secret(&user.public_id, &stored.token);
                self.check_token(&stored, wanted_language)
                    .await
                    .then_some(stored)
            }
            None => None,
        };

        let token = match reusable {
            Some(token) => token,
            None => {
                let login = self.login_or_create(&user.public_id).await?;
                let current_language = login
                    .me
                    .as_ref()
                    .map(|me| me.language().to_string())
                    .unwrap_or_default();
                let token = StoredToken {
                    token: login.auth_token,
                    user_id: login.user_id,
                };
                store.set(&user.public_id, &token, ttl).await;
                self.sync_language(&token.headers(), &current_language, wanted_language)
                    .await;
                token
            }
        };

        let unread_counter = self.unread_counter(&token.headers()).await;
        Some(ChatSession {
            auth_token: token.token,
            user_id: token.user_id,
            unread_counter,
        })
    }

    /// Chat account for `email`, created when absent.
    pub async fn ensure_account(&self, email: &str) -> Option<ChatUser> {
        let username = derive_username(email, self.format);
        if let Some(user) = self.lookup(&username).await {
            return Some(user);
        }
        let creds = self.credentials(email).await?;
        self.create(&username, email, &creds).await
    }

    /// Backend username for `email`, creating the account when absent.
    pub async fn login_for_email(&self, email: &str) -> Option<String> {
        self.ensure_account(email).await.map(|u| u.username)
    }

    /// Sum of unread messages across the user's subscriptions; `0` on any
    /// failure.
    pub async fn unread_counter(&self, auth: &AuthHeaders) -> u64 {
        match self.conn.api.subscriptions(auth).await {
            Ok(body) => sum_unread(&body),
            Err(e) => {
                debug!(user_id = %auth.user_id, error = %e, "cannot read subscriptions");
                0
            }
        }
    }

    async fn check_token(&self, stored: &StoredToken, wanted_language: &str) -> bool {
        let headers = stored.headers();
        match self.conn.api.me(&headers).await {
            Ok(me) => {
                self.sync_language(&headers, me.language(), wanted_language)
                    .await;
                true
            }
            Err(e) => {
                debug!(user_id = %stored.user_id, error = %e, "stored chat token rejected");
                false
            }
        }
    }

    /// Best effort: a failed update is logged and does not affect the run.
    async fn sync_language(&self, auth: &AuthHeaders, current: &str, wanted: &str) {
        if current == wanted {
            return;
        }
        if let Err(e) = self.conn.api.set_language(auth, wanted).await {
            warn!(user_id = %auth.user_id, language = wanted, error = %e, "cannot update chat language");
        }
    }

    async fn login_or_create(&self, email: &str) -> Option<LoginData> {
        let username = derive_username(email, self.format);
        let creds = self.credentials(email).await?;
        let account = match self.lookup(&username).await {
            Some(account) => account,
            None => self.create(&username, email, &creds).await?,
        };
        self.login(&account, &creds).await
    }

    async fn credentials(&self, email: &str) -> Option<Credentials> {
        let account = match self.host.account_for(email).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                warn!(email, "no host account to authorize chat user");
                return None;
            }
            Err(e) => {
                warn!(email, error = %e, "cannot read host account");
                return None;
            }
        };
        let demo = self.host.is_demo_account(email).await;
        let password = if demo {
            DEMO_PASSWORD.to_string()
        } else {
            self.conn.redactor().add_user_secret(email, &account.password);
            account.password.clone()
        };
        if password.is_empty() {
            warn!(email, "host account has no password");
            return None;
        }
        Some(Credentials {
            owner: email.to_string(),
            account,
            password,
            demo,
        })
    }

    async fn lookup(&self, username: &str) -> Option<ChatUser> {
        let admin = self.conn.admin_headers().await?;
        let result = self.conn.api.user_info(&admin, username).await;
        match self.conn.observe("users.info", result).await {
            Ok(user) => Some(user),
            Err(e) => {
                debug!(username, error = %e, "chat user lookup failed");
                None
            }
        }
    }

    async fn create(&self, username: &str, email: &str, creds: &Credentials) -> Option<ChatUser> {
        let admin = self.conn.admin_headers().await?;
        let name = match creds.account.friendly_name.trim() {
            "" => username.to_string(),
            name => name.to_string(),
        };
        let new_user = NewUser {
            email: email.to_string(),
            name,
            password: creds.password.clone(),
            username: username.to_string(),
        };
        let result = self.conn.api.create_user(&admin, &new_user).await;
        match self.conn.observe("users.create", result).await {
            Ok(user) => {
                info!(username, "chat user created");
                Some(user)
            }
            Err(e) if e.is_duplicate() => {
                info!(username, "chat user created concurrently, falling back to login");
                self.lookup(username).await
            }
            Err(e) => {
                warn!(username, error = %e, "cannot create chat user");
                None
            }
        }
    }

    async fn login(&self, account: &ChatUser, creds: &Credentials) -> Option<LoginData> {
        let outcome = first_success(&UserLogin::ORDER, |strategy| async move {
            if strategy == UserLogin::RepairPassword {
                if creds.demo {
                    return Err(AttemptError::Skipped);
                }
                let admin = self
                    .conn
                    .admin_headers()
                    .await
                    .ok_or(AttemptError::Skipped)?;
                let result = self
                    .conn
                    .api
                    .update_password(&admin, &account.id, &creds.password)
                    .await;
                self.conn.observe("users.update", result).await?;
                info!(username = %account.username, "chat password re-synchronized");
            }
            Ok::<_, AttemptError>(self.conn.api.login(&account.username, &creds.password).await?)
        })
        .await;

        match outcome {
            Some((_, data)) => {
                self.conn
                    .redactor()
                    .add_user_secret(&creds.owner, &data.auth_token);
                Some(data)
            }
            None => {
                warn!(username = %account.username, "chat login failed");
                None
            }
        }
    }
}
