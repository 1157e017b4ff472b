//! Host platform collaborator: identities, tenants, accounts, contacts.
//!
//! The host owns all of this; Chatlink only reads it through [`HostDirectory`].

pub mod file;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use file::FileHostDirectory;

/// Host directory errors.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Host error: {0}")]
    Internal(String),
}

/// Host user roles, least privileged first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Anonymous,
    Customer,
    NormalUser,
    TenantAdmin,
    SuperAdmin,
}

impl Role {
    /// Normal users and tenant admins see the end-user settings view.
    pub fn is_normal_or_tenant(self) -> bool {
        matches!(self, Role::NormalUser | Role::TenantAdmin)
    }
}

/// Authenticated principal of the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostUser {
    pub id: i64,
    /// Email-shaped public identifier.
    pub public_id: String,
    #[serde(default)]
    pub name: String,
    /// Host language name, e.g. `"English"`.
    #[serde(default)]
    pub language: String,
    pub tenant_id: i64,
    pub role: Role,
}

impl HostUser {
    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: i64,
    pub name: String,
}

/// The account a user authenticated with, including its plaintext password.
#[derive(Clone, PartialEq, Eq)]
pub struct HostAccount {
    pub email: String,
    pub friendly_name: String,
    pub password: String,
}

impl std::fmt::Debug for HostAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostAccount")
            .field("email", &self.email)
            .field("friendly_name", &self.friendly_name)
            .finish_non_exhaustive()
    }
}

/// Read-only view of the host's user/tenant/contact model.
#[async_trait]
pub trait HostDirectory: Send + Sync {
    /// Resolve a host session token to its user.
    async fn authenticate(&self, session_token: &str) -> Result<Option<HostUser>, HostError>;

    async fn user_by_id(&self, id: i64) -> Result<Option<HostUser>, HostError>;

    async fn tenant_by_id(&self, id: i64) -> Result<Option<Tenant>, HostError>;

    /// The account used to authorize `email`, with its current password.
    async fn account_for(&self, email: &str) -> Result<Option<HostAccount>, HostError>;

    /// Email to open a direct chat with, for a contact visible to `viewer`.
    async fn contact_chat_email(
        &self,
        contact_id: &str,
        viewer: &HostUser,
    ) -> Result<Option<String>, HostError>;

    /// Demo accounts share a fixed, non-secret chat password.
    async fn is_demo_account(&self, email: &str) -> bool;
}
