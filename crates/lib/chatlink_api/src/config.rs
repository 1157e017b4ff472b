//! API server configuration.

use std::time::Duration;

use axum_extra::extract::cookie::SameSite;

/// Where end-user chat tokens are kept between requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenStoreKind {
    /// Encrypted browser cookies.
    Cookie,
    /// Server-side per-user attribute.
    Attribute,
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3200").
    pub bind_addr: String,
    /// YAML file holding the module settings.
    pub settings_path: String,
    /// YAML file describing host tenants, users and contacts.
    pub host_directory_path: String,
    /// Key for admin passwords at rest and token cookies.
    pub encryption_key: String,
    pub token_store: TokenStoreKind,
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
    /// Default timeout for chat backend requests.
    pub backend_timeout: Duration,
    /// Host header links inserted into the chat page.
    pub integrator_links: String,
}

fn parse_same_site(raw: &str) -> SameSite {
    match raw.to_ascii_lowercase().as_str() {
        "strict" => SameSite::Strict,
        "none" => SameSite::None,
        _ => SameSite::Lax,
    }
}

fn parse_token_store(raw: &str) -> TokenStoreKind {
    match raw.to_ascii_lowercase().as_str() {
        "attribute" => TokenStoreKind::Attribute,
        _ => TokenStoreKind::Cookie,
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                       | Default                          |
    /// |--------------------------------|----------------------------------|
    /// | `BIND_ADDR`                    | `127.0.0.1:3200`                 |
    /// | `CHATLINK_SETTINGS`            | `chatlink.yaml`                  |
    /// | `CHATLINK_HOST_DIRECTORY`      | `host-directory.yaml`            |
    /// | `CHATLINK_ENCRYPTION_KEY`      | development key                  |
    /// | `CHATLINK_TOKEN_STORE`         | `cookie` (`cookie`/`attribute`)  |
    /// | `CHATLINK_COOKIE_SECURE`       | `true`                           |
    /// | `CHATLINK_COOKIE_SAMESITE`     | `Lax` (`Strict`/`Lax`/`None`)    |
    /// | `CHATLINK_BACKEND_TIMEOUT_SECS`| `10`                             |
    /// | `CHATLINK_INTEGRATOR_LINKS`    | empty                            |
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or("BIND_ADDR", "127.0.0.1:3200"),
            settings_path: env_or("CHATLINK_SETTINGS", "chatlink.yaml"),
            host_directory_path: env_or("CHATLINK_HOST_DIRECTORY", "host-directory.yaml"),
            encryption_key: env_or(
                "CHATLINK_ENCRYPTION_KEY",
                "chatlink-default-dev-key-change-in-production",
            ),
            token_store: parse_token_store(&env_or("CHATLINK_TOKEN_STORE", "cookie")),
            cookie_secure: env_or("CHATLINK_COOKIE_SECURE", "true") != "false",
            cookie_same_site: parse_same_site(&env_or("CHATLINK_COOKIE_SAMESITE", "Lax")),
            backend_timeout: Duration::from_secs(
                env_or("CHATLINK_BACKEND_TIMEOUT_SECS", "10")
                    .parse()
                    .unwrap_or(10),
            ),
            integrator_links: env_or("CHATLINK_INTEGRATOR_LINKS", ""),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3200".into(),
            settings_path: "chatlink.yaml".into(),
            host_directory_path: "host-directory.yaml".into(),
            encryption_key: "chatlink-default-dev-key-change-in-production".into(),
            token_store: TokenStoreKind::Cookie,
            cookie_secure: true,
            cookie_same_site: SameSite::Lax,
            backend_timeout: Duration::from_secs(10),
            integrator_links: String::new(),
        }
    }
}
