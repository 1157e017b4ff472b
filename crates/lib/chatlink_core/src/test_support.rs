//! Scripted in-memory chat backend for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::backend::{
    AdminHeaders, AuthHeaders, BackendError, ChatApi, ChatUser, Connector, LoginData, Me, NewUser,
};
use crate::backend::models::{Preferences, UserSettings};

#[derive(Debug, Clone)]
struct Account {
    id: String,
    password: String,
    language: String,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<String, Account>,
    /// token → user id
    sessions: HashMap<String, String>,
    settings: HashMap<String, Value>,
    calls: Vec<String>,
    issued: u32,
    subscriptions: Option<Value>,
    fail_create: bool,
    duplicate_on_create: bool,
    fail_update: bool,
    reject_setting: Option<String>,
    admin_unauthorized: bool,
    delete_delay: Option<Duration>,
    login_delays: HashMap<String, Duration>,
    rejected_logins: HashSet<String>,
    connects: Vec<String>,
}

fn status(status: u16, body: &str) -> BackendError {
    BackendError::Status {
        status,
        body: body.to_string(),
    }
}

/// Cloning shares state, so a test can keep a handle after handing one out.
#[derive(Debug, Clone, Default)]
pub struct FakeChat {
    state: Arc<Mutex<State>>,
}

impl FakeChat {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    fn record(&self, call: &str) {
        self.with(|s| s.calls.push(call.to_string()));
    }

    pub fn with_account(self, username: &str, id: &str, password: &str) -> Self {
        self.with(|s| {
            s.accounts.insert(
                username.to_string(),
                Account {
                    id: id.to_string(),
                    password: password.to_string(),
                    language: String::new(),
                },
            )
        });
        self
    }

    pub fn with_language(self, username: &str, language: &str) -> Self {
        self.with(|s| {
            if let Some(a) = s.accounts.get_mut(username) {
                a.language = language.to_string();
            }
        });
        self
    }

    /// Register a token the backend will accept for `user_id`.
    pub fn with_session(self, token: &str, user_id: &str) -> Self {
        self.with(|s| s.sessions.insert(token.to_string(), user_id.to_string()));
        self
    }

    pub fn with_subscriptions(self, body: Value) -> Self {
        self.with(|s| s.subscriptions = Some(body));
        self
    }

    pub fn failing_create(self) -> Self {
        self.with(|s| s.fail_create = true);
        self
    }

    /// `users.create` reports "already in use" after another request created it.
    pub fn duplicate_on_create(self) -> Self {
        self.with(|s| s.duplicate_on_create = true);
        self
    }

    pub fn failing_update(self) -> Self {
        self.with(|s| s.fail_update = true);
        self
    }

    pub fn rejecting_setting(self, id: &str) -> Self {
        self.with(|s| s.reject_setting = Some(id.to_string()));
        self
    }

    pub fn slow_delete(self, delay: Duration) -> Self {
        self.with(|s| s.delete_delay = Some(delay));
        self
    }

    pub fn slow_login(self, username: &str, delay: Duration) -> Self {
        self.with(|s| s.login_delays.insert(username.to_string(), delay));
        self
    }

    /// Reject every login for `username`, whatever password is sent.
    pub fn rejecting_login(self, username: &str) -> Self {
        self.with(|s| s.rejected_logins.insert(username.to_string()));
        self
    }

    /// Answer every admin-privileged call with 401.
    pub fn set_admin_unauthorized(&self, on: bool) {
        self.with(|s| s.admin_unauthorized = on);
    }

    pub fn set_setting_value(&self, id: &str, value: Value) {
        self.with(|s| s.settings.insert(id.to_string(), value));
    }

    pub fn setting(&self, id: &str) -> Option<Value> {
        self.with(|s| s.settings.get(id).cloned())
    }

    pub fn password_of(&self, username: &str) -> Option<String> {
        self.with(|s| s.accounts.get(username).map(|a| a.password.clone()))
    }

    pub fn language_of(&self, username: &str) -> Option<String> {
        self.with(|s| s.accounts.get(username).map(|a| a.language.clone()))
    }

    pub fn has_account(&self, username: &str) -> bool {
        self.with(|s| s.accounts.contains_key(username))
    }

    pub fn calls(&self) -> Vec<String> {
        self.with(|s| s.calls.clone())
    }

    pub fn count(&self, call: &str) -> usize {
        self.with(|s| s.calls.iter().filter(|c| *c == call).count())
    }

    pub fn connects(&self) -> Vec<String> {
        self.with(|s| s.connects.clone())
    }

    fn check_session(&self, auth: &AuthHeaders) -> Result<(), BackendError> {
        self.with(|s| match s.sessions.get(&auth.token) {
            Some(uid) if *uid == auth.user_id => Ok(()),
            _ => Err(status(401, r#"{"status":"error","message":"You must be logged in to do this."}"#)),
        })
    }

    fn check_admin(&self, admin: &AdminHeaders) -> Result<(), BackendError> {
        if self.with(|s| s.admin_unauthorized) {
            return Err(status(401, "unauthorized"));
        }
        self.check_session(&admin.auth)
    }

    fn username_by_id(&self, user_id: &str) -> Option<String> {
        self.with(|s| {
            s.accounts
                .iter()
                .find(|(_, a)| a.id == user_id)
                .map(|(u, _)| u.clone())
        })
    }
}

#[async_trait]
impl ChatApi for FakeChat {
    async fn login(&self, user: &str, password: &str) -> Result<LoginData, BackendError> {
        self.record("login");
        if let Some(delay) = self.with(|s| s.login_delays.get(user).copied()) {
            tokio::time::sleep(delay).await;
        }
        self.with(|s| {
            let rejected = s.rejected_logins.contains(user);
            let account = s
                .accounts
                .get(user)
                .filter(|a| !rejected && a.password == password)
                .cloned()
                .ok_or_else(|| status(401, r#"{"status":"error","error":"Unauthorized"}"#))?;
            s.issued += 1;
            let token = format!("tok-{user}-{}", s.issued);
            s.sessions.insert(token.clone(), account.id.clone());
            Ok(LoginData {
                auth_token: token,
                user_id: account.id.clone(),
                me: Some(Me {
                    id: Some(account.id),
                    settings: Some(UserSettings {
                        preferences: Preferences {
                            language: Some(account.language).filter(|l| !l.is_empty()),
                        },
                    }),
                }),
            })
        })
    }

    async fn logout(&self, auth: &AuthHeaders) -> Result<(), BackendError> {
        self.record("logout");
        self.check_session(auth)?;
        self.with(|s| s.sessions.remove(&auth.token));
        Ok(())
    }

    async fn me(&self, auth: &AuthHeaders) -> Result<Me, BackendError> {
        self.record("me");
        self.check_session(auth)?;
        let language = self
            .username_by_id(&auth.user_id)
            .and_then(|u| self.language_of(&u))
            .filter(|l| !l.is_empty());
        Ok(Me {
            id: Some(auth.user_id.clone()),
            settings: Some(UserSettings {
                preferences: Preferences { language },
            }),
        })
    }

    async fn set_language(&self, auth: &AuthHeaders, language: &str) -> Result<(), BackendError> {
        self.record("users.setPreferences");
        self.check_session(auth)?;
        if let Some(username) = self.username_by_id(&auth.user_id) {
            self.with(|s| {
                if let Some(a) = s.accounts.get_mut(&username) {
                    a.language = language.to_string();
                }
            });
        }
        Ok(())
    }

    async fn subscriptions(&self, auth: &AuthHeaders) -> Result<Value, BackendError> {
        self.record("subscriptions.get");
        self.check_session(auth)?;
        Ok(self
            .with(|s| s.subscriptions.clone())
            .unwrap_or_else(|| json!({"update": [], "remove": [], "success": true})))
    }

    async fn user_info(&self, admin: &AdminHeaders, username: &str) -> Result<ChatUser, BackendError> {
        self.record("users.info");
        self.check_admin(admin)?;
        self.with(|s| {
            s.accounts
                .get(username)
                .map(|a| ChatUser {
                    id: a.id.clone(),
                    username: username.to_string(),
                })
                .ok_or_else(|| status(400, r#"{"success":false,"error":"User not found."}"#))
        })
    }

    async fn create_user(&self, admin: &AdminHeaders, user: &NewUser) -> Result<ChatUser, BackendError> {
        self.record("users.create");
        self.check_admin(admin)?;
        self.with(|s| {
            if s.fail_create {
                return Err(status(500, "boom"));
            }
            let id = format!("id-{}", user.username);
            if s.duplicate_on_create || s.accounts.contains_key(&user.username) {
                s.accounts.entry(user.username.clone()).or_insert(Account {
                    id,
                    password: user.password.clone(),
                    language: String::new(),
                });
                return Err(status(
                    400,
                    &format!(r#"{{"success":false,"error":"{} is already in use :("}}"#, user.username),
                ));
            }
            s.accounts.insert(
                user.username.clone(),
                Account {
                    id: id.clone(),
                    password: user.password.clone(),
                    language: String::new(),
                },
            );
            Ok(ChatUser {
                id,
                username: user.username.clone(),
            })
        })
    }

    async fn update_password(
        &self,
        admin: &AdminHeaders,
        user_id: &str,
        password: &str,
    ) -> Result<(), BackendError> {
        self.record("users.update");
        self.check_admin(admin)?;
        self.with(|s| {
            if s.fail_update {
                return Err(status(400, "update failed"));
            }
            match s.accounts.values_mut().find(|a| a.id == user_id) {
                Some(a) => {
                    a.password = password.to_string();
                    Ok(())
                }
                None => Err(status(400, "no such user")),
            }
        })
    }

    async fn delete_user(
        &self,
        admin: &AdminHeaders,
        username: &str,
        _timeout: Option<Duration>,
    ) -> Result<(), BackendError> {
        self.record("users.delete");
        if let Some(delay) = self.with(|s| s.delete_delay) {
            tokio::time::sleep(delay).await;
        }
        self.check_admin(admin)?;
        self.with(|s| s.accounts.remove(username))
            .map(|_| ())
            .ok_or_else(|| status(400, "no such user"))
    }

    async fn get_setting(&self, admin: &AdminHeaders, id: &str) -> Result<Value, BackendError> {
        self.record("settings.get");
        self.check_admin(admin)?;
        self.with(|s| s.settings.get(id).cloned())
            .ok_or_else(|| status(400, "no such setting"))
    }

    async fn set_setting(&self, admin: &AdminHeaders, id: &str, value: &Value) -> Result<(), BackendError> {
        self.record("settings.set");
        self.check_admin(admin)?;
        self.with(|s| {
            if s.reject_setting.as_deref() == Some(id) {
                return Err(status(400, "setting rejected"));
            }
            s.settings.insert(id.to_string(), value.clone());
            Ok(())
        })
    }
}

impl Connector for FakeChat {
    fn connect(&self, api_base: &str, _log_traffic: bool) -> Result<Arc<dyn ChatApi>, BackendError> {
        self.with(|s| s.connects.push(api_base.to_string()));
        Ok(Arc::new(self.clone()))
    }
}
