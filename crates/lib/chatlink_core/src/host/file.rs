//! YAML-backed host directory for standalone deployments and tests.
//!
//! ```yaml
//! tenants:
//!   - { id: 1, name: acme }
//! users:
//!   - id: 7
//!     publicId: bob@acme.test
//!     name: Bob
//!     language: German
//!     tenantId: 1
//!     role: NormalUser
//!     password: secret
//!     sessions: [host-session-token]
//! contacts:
//!   - { uuid: c-1, storage: team, viewEmail: team@acme.test }
//! ```

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use super::{HostAccount, HostDirectory, HostError, HostUser, Role, Tenant};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserEntry {
    id: i64,
    public_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    language: String,
    tenant_id: i64,
    role: Role,
    #[serde(default)]
    password: String,
    #[serde(default)]
    demo: bool,
    #[serde(default)]
    sessions: Vec<String>,
}

impl UserEntry {
    fn to_user(&self) -> HostUser {
        HostUser {
            id: self.id,
            public_id: self.public_id.clone(),
            name: self.name.clone(),
            language: self.language.clone(),
            tenant_id: self.tenant_id,
            role: self.role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ContactStorage {
    Team,
    Personal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContactEntry {
    uuid: String,
    storage: ContactStorage,
    #[serde(default)]
    view_email: String,
    #[serde(default)]
    user_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    tenants: Vec<Tenant>,
    #[serde(default)]
    users: Vec<UserEntry>,
    #[serde(default)]
    contacts: Vec<ContactEntry>,
}

/// Host directory loaded once from a YAML document.
#[derive(Debug, Clone, Default)]
pub struct FileHostDirectory {
    data: DirectoryFile,
}

impl FileHostDirectory {
    pub fn from_yaml(raw: &str) -> Result<Self, HostError> {
        Ok(Self {
            data: serde_yaml::from_str(raw)?,
        })
    }

    pub fn load(path: &Path) -> Result<Self, HostError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    fn entry_by_id(&self, id: i64) -> Option<&UserEntry> {
        self.data.users.iter().find(|u| u.id == id)
    }

    fn entry_by_email(&self, email: &str) -> Option<&UserEntry> {
        self.data
            .users
            .iter()
            .find(|u| u.public_id.eq_ignore_ascii_case(email))
    }
}

#[async_trait]
impl HostDirectory for FileHostDirectory {
    async fn authenticate(&self, session_token: &str) -> Result<Option<HostUser>, HostError> {
        Ok(self
            .data
            .users
            .iter()
            .find(|u| u.sessions.iter().any(|s| s == session_token))
            .map(UserEntry::to_user))
    }

    async fn user_by_id(&self, id: i64) -> Result<Option<HostUser>, HostError> {
        Ok(self.entry_by_id(id).map(UserEntry::to_user))
    }

    async fn tenant_by_id(&self, id: i64) -> Result<Option<Tenant>, HostError> {
        Ok(self.data.tenants.iter().find(|t| t.id == id).cloned())
    }

    async fn account_for(&self, email: &str) -> Result<Option<HostAccount>, HostError> {
        Ok(self.entry_by_email(email).map(|u| HostAccount {
            email: u.public_id.clone(),
            friendly_name: u.name.clone(),
            password: u.password.clone(),
        }))
    }

    async fn contact_chat_email(
        &self,
        contact_id: &str,
        viewer: &HostUser,
    ) -> Result<Option<String>, HostError> {
        let Some(contact) = self.data.contacts.iter().find(|c| c.uuid == contact_id) else {
            return Ok(None);
        };

        let email = match contact.storage {
            ContactStorage::Team => Some(contact.view_email.clone()).filter(|e| !e.is_empty()),
            ContactStorage::Personal => contact
                .user_id
                .and_then(|id| self.entry_by_id(id))
                .filter(|u| u.tenant_id == viewer.tenant_id)
                .map(|u| u.public_id.clone()),
        };
        Ok(email)
    }

    async fn is_demo_account(&self, email: &str) -> bool {
        self.entry_by_email(email).is_some_and(|u| u.demo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIRECTORY: &str = r#"
tenants:
  - { id: 1, name: acme }
  - { id: 2, name: globex }
users:
  - id: 7
    publicId: bob@acme.test
    name: Bob
    language: German
    tenantId: 1
    role: NormalUser
    password: secret
    sessions: [tok-bob]
  - id: 8
    publicId: eve@globex.test
    tenantId: 2
    role: NormalUser
  - id: 9
    publicId: demo@acme.test
    tenantId: 1
    role: NormalUser
    demo: true
contacts:
  - { uuid: c-team, storage: team, viewEmail: team@acme.test }
  - { uuid: c-eve, storage: personal, userId: 8 }
  - { uuid: c-demo, storage: personal, userId: 9 }
"#;

    fn dir() -> FileHostDirectory {
        FileHostDirectory::from_yaml(DIRECTORY).unwrap()
    }

    #[tokio::test]
    async fn authenticate_by_session_token() {
        let user = dir().authenticate("tok-bob").await.unwrap().unwrap();
        assert_eq!(user.public_id, "bob@acme.test");
        assert_eq!(user.role, Role::NormalUser);
        assert!(dir().authenticate("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn account_carries_password() {
        let acct = dir().account_for("BOB@acme.test").await.unwrap().unwrap();
        assert_eq!(acct.password, "secret");
        assert_eq!(acct.friendly_name, "Bob");
    }

    #[tokio::test]
    async fn contact_resolution_respects_tenant() {
        let d = dir();
        let bob = d.user_by_id(7).await.unwrap().unwrap();
        assert_eq!(
            d.contact_chat_email("c-team", &bob).await.unwrap().as_deref(),
            Some("team@acme.test")
        );
        assert_eq!(
            d.contact_chat_email("c-demo", &bob).await.unwrap().as_deref(),
            Some("demo@acme.test")
        );
        assert!(d.contact_chat_email("c-eve", &bob).await.unwrap().is_none());
        assert!(d.contact_chat_email("missing", &bob).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn demo_flag() {
        assert!(dir().is_demo_account("demo@acme.test").await);
        assert!(!dir().is_demo_account("bob@acme.test").await);
    }
}
