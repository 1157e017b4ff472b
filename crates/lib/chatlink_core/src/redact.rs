//! Secret redaction for log output.
//!
//! Secrets (passwords, tokens, 2FA codes) are registered before the network
//! call that may log them. [`Redactor::scrub`] replaces every registered
//! secret and masks header-like and JSON-field-like credential text.
//!
//! Process secrets (admin credentials, module keys) stay registered for the
//! life of the process. End-user secrets are kept per user in a bounded
//! registry: the least recently active user is dropped first, and a user's
//! secrets go away on logout.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, LazyLock, RwLock};

use regex::Regex;

/// Replacement text for scrubbed material.
pub const MASK: &str = "*****";

/// Users whose secrets are kept at once.
pub const DEFAULT_USER_CAPACITY: usize = 512;

/// Secrets kept per user: the password and the latest session tokens.
const SECRETS_PER_USER: usize = 4;

static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)(X-Auth-Token|X-2fa-code):(.+?\s)",
        r#"(?i)("bcrypt"):(.*?\})"#,
        r#"(?i)("authToken"):(.*?,)"#,
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

#[derive(Debug, Default)]
struct Registry {
    process: BTreeSet<String>,
    users: HashMap<String, VecDeque<String>>,
    /// Least recently active user first.
    recency: VecDeque<String>,
    user_capacity: usize,
}

impl Registry {
    fn touch(&mut self, owner: &str) {
        if let Some(pos) = self.recency.iter().position(|o| o == owner) {
            self.recency.remove(pos);
        }
        self.recency.push_back(owner.to_string());
    }

    fn add_user_secret(&mut self, owner: &str, secret: &str) {
        if !self.users.contains_key(owner) {
            while self.users.len() >= self.user_capacity.max(1) {
                let Some(oldest) = self.recency.pop_front() else {
                    break;
                };
                self.users.remove(&oldest);
            }
        }
        self.touch(owner);

        let secrets = self.users.entry(owner.to_string()).or_default();
        if let Some(pos) = secrets.iter().position(|s| s == secret) {
            secrets.remove(pos);
        }
        secrets.push_back(secret.to_string());
        while secrets.len() > SECRETS_PER_USER {
            secrets.pop_front();
        }
    }

    fn forget_user(&mut self, owner: &str) {
        self.users.remove(owner);
        if let Some(pos) = self.recency.iter().position(|o| o == owner) {
            self.recency.remove(pos);
        }
    }

    fn len(&self) -> usize {
        self.process.len() + self.users.values().map(VecDeque::len).sum::<usize>()
    }
}

/// Shared registry of secret words. Cloning shares the registry.
#[derive(Debug, Clone)]
pub struct Redactor {
    registry: Arc<RwLock<Registry>>,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::with_user_capacity(DEFAULT_USER_CAPACITY)
    }
}

impl Redactor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_capacity(user_capacity: usize) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry {
                user_capacity,
                ..Default::default()
            })),
        }
    }

    /// Register a secret for the life of the process.
    pub fn add_secret(&self, secret: &str) {
        if secret.is_empty() {
            return;
        }
        if let Ok(mut registry) = self.registry.write() {
            registry.process.insert(secret.to_string());
        }
    }

    /// Register a secret belonging to one end user (keyed by host public id).
    pub fn add_user_secret(&self, owner: &str, secret: &str) {
        if secret.is_empty() {
            return;
        }
        if let Ok(mut registry) = self.registry.write() {
            registry.add_user_secret(owner, secret);
        }
    }

    /// Drop every secret registered for `owner`.
    pub fn forget_user(&self, owner: &str) {
        if let Ok(mut registry) = self.registry.write() {
            registry.forget_user(owner);
        }
    }

    /// Number of registered secrets.
    pub fn len(&self) -> usize {
        self.registry.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return `line` with registered secrets and credential fields masked.
    pub fn scrub(&self, line: &str) -> String {
        let mut out = line.to_string();

        if let Ok(registry) = self.registry.read() {
            // Longest first so a secret containing another is masked whole.
            let mut ordered: Vec<&String> = registry
                .process
                .iter()
                .chain(registry.users.values().flatten())
                .collect();
            ordered.sort_by_key(|s| std::cmp::Reverse(s.len()));
            for secret in ordered {
                if out.contains(secret.as_str()) {
                    out = out.replace(secret.as_str(), MASK);
                }
            }
        }

        for re in PATTERNS.iter() {
            out = re.replace_all(&out, format!("$1: {MASK} ")).into_owned();
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_secret_is_masked() {
        let r = Redactor::new();
        r.add_secret("hunter2");
        assert_eq!(r.scrub("login with hunter2 failed"), "login with ***** failed");
    }

    #[test]
    fn empty_secret_is_ignored() {
        let r = Redactor::new();
        r.add_secret("");
        assert!(r.is_empty());
        assert_eq!(r.scrub("nothing here"), "nothing here");
    }

    #[test]
    fn longer_secret_wins_over_prefix() {
        let r = Redactor::new();
        r.add_secret("abc");
        r.add_secret("abcdef");
        assert_eq!(r.scrub("x abcdef y"), "x ***** y");
    }

    #[test]
    fn header_values_are_masked() {
        let r = Redactor::new();
        let out = r.scrub("REQUEST: GET me X-Auth-Token:tok123 X-User-Id:u1");
        assert!(!out.contains("tok123"), "{out}");
        assert!(out.contains("X-User-Id:u1"));
    }

    #[test]
    fn json_auth_token_field_is_masked() {
        let r = Redactor::new();
        let out = r.scrub(r#"RESPONSE: 200 {"authToken":"abc","userId":"u1"}"#);
        assert!(!out.contains("abc"), "{out}");
        assert!(out.contains(r#""userId":"u1""#));
    }

    #[test]
    fn bcrypt_object_is_masked() {
        let r = Redactor::new();
        let out = r.scrub(r#"{"password":{"bcrypt":"$2b$10$xyz"}}"#);
        assert!(!out.contains("$2b$10$xyz"), "{out}");
    }

    #[test]
    fn user_secrets_are_masked_until_logout() {
        let r = Redactor::new();
        r.add_secret("adminpw");
        r.add_user_secret("bob@acme.test", "bobpw");
        r.add_user_secret("bob@acme.test", "tok-bob");
        assert_eq!(r.scrub("bobpw tok-bob adminpw"), "***** ***** *****");

        r.forget_user("bob@acme.test");
        assert_eq!(r.scrub("bobpw adminpw"), "bobpw *****");
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn user_registry_is_bounded() {
        let r = Redactor::with_user_capacity(3);
        r.add_secret("adminpw");
        for n in 0..200 {
            let owner = format!("user{n}@acme.test");
            r.add_user_secret(&owner, &format!("pw-{n}"));
            r.add_user_secret(&owner, &format!("tok-{n}"));
        }
        assert_eq!(r.len(), 1 + 3 * 2);
        assert_eq!(r.scrub("pw-199 tok-197"), "***** *****");
        assert_eq!(r.scrub("pw-0"), "pw-0");
    }

    #[test]
    fn active_user_survives_eviction() {
        let r = Redactor::with_user_capacity(2);
        r.add_user_secret("a", "secret-a");
        r.add_user_secret("b", "secret-b");
        r.add_user_secret("a", "token-a");
        r.add_user_secret("c", "secret-c");
        assert_eq!(r.scrub("secret-a"), MASK);
        assert_eq!(r.scrub("secret-b"), "secret-b");
    }

    #[test]
    fn per_user_tokens_are_capped() {
        let r = Redactor::new();
        for n in 0..10 {
            r.add_user_secret("bob", &format!("tok-{n}"));
        }
        assert_eq!(r.len(), SECRETS_PER_USER);
        assert_eq!(r.scrub("tok-9"), MASK);
        assert_eq!(r.scrub("tok-0"), "tok-0");
    }

    #[test]
    fn clones_share_registry() {
        let r = Redactor::new();
        let c = r.clone();
        c.add_secret("s3cret");
        assert_eq!(r.scrub("s3cret"), MASK);
    }
}
