//! Chat username derivation from a host user's public identifier.

use serde::{Deserialize, Serialize};

/// How the chat username is built from the host email.
///
/// Serialized as the integer the host settings file stores (0, 1, 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum UsernameFormat {
    /// `bob@sub.example.com` → `bob`
    #[default]
    Username,
    /// `bob@sub.example.com` → `bob.sub`
    UsernameAndDomain,
    /// `bob@sub.example.com` → `bob.sub.example.com`
    UsernameAndFullDomainName,
}

impl TryFrom<u8> for UsernameFormat {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Username),
            1 => Ok(Self::UsernameAndDomain),
            2 => Ok(Self::UsernameAndFullDomainName),
            other => Err(format!("unknown username format: {other}")),
        }
    }
}

impl From<UsernameFormat> for u8 {
    fn from(value: UsernameFormat) -> Self {
        match value {
            UsernameFormat::Username => 0,
            UsernameFormat::UsernameAndDomain => 1,
            UsernameFormat::UsernameAndFullDomainName => 2,
        }
    }
}

/// Derive the chat username for `email` under `format`.
///
/// Strings without `@` come back whole; no domain suffix is appended.
pub fn derive_username(email: &str, format: UsernameFormat) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return email.to_string();
    };

    match format {
        UsernameFormat::Username => local.to_string(),
        UsernameFormat::UsernameAndDomain => {
            let first_label = domain.split('.').next().unwrap_or(domain);
            format!("{local}.{first_label}")
        }
        UsernameFormat::UsernameAndFullDomainName => format!("{local}.{domain}"),
    }
}
