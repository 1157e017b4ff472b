//! Backend settings the embedding depends on, pushed through the admin
//! settings endpoint.

use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::session::Connection;

const THEME_CSS: &str = include_str!("theme.css");

const HOME_BODY: &str = "<p>Select a conversation on the left or start a new one.</p>";

/// A group of backend settings applied together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSet {
    /// Security and iframe-embedding flags.
    Required,
    /// Home page and sidebar labels.
    Text,
    /// Custom theme stylesheet.
    Css,
}

impl ChangeSet {
    pub fn entries(self) -> Vec<(&'static str, Value)> {
        match self {
            ChangeSet::Required => vec![
                ("Accounts_PasswordReset", json!(false)),
                ("Iframe_Restrict_Access", json!(false)),
                ("Iframe_Integration_send_enable", json!(true)),
                ("Iframe_Integration_receive_enable", json!(true)),
                ("API_Enable_Rate_Limiter", json!(false)),
            ],
            ChangeSet::Text => vec![
                ("Layout_Home_Title", json!("Chat")),
                ("Layout_Home_Body", json!(HOME_BODY)),
                ("Layout_Sidenav_Footer", json!("")),
            ],
            ChangeSet::Css => vec![("theme-custom-css", json!(THEME_CSS))],
        }
    }
}

/// Push every entry of `set`. True only when the backend accepted all of
/// them; rejected keys are logged and the remaining ones still pushed.
pub async fn apply(conn: &Connection, set: ChangeSet) -> bool {
    let Some(admin) = conn.admin_headers().await else {
        warn!(?set, "no admin session, settings not applied");
        return false;
    };

    let mut all_ok = true;
    for (id, value) in set.entries() {
        let result = conn.api.set_setting(&admin, id, &value).await;
        if let Err(e) = conn.observe("settings.set", result).await {
            warn!(setting = id, error = %e, "backend rejected setting");
            all_ok = false;
        }
    }
    if all_ok {
        info!(?set, "backend settings applied");
    }
    all_ok
}

/// Current backend values of the [`ChangeSet::Required`] keys. Keys that
/// cannot be read are left out.
pub async fn read_required(conn: &Connection) -> Option<Map<String, Value>> {
    let admin = conn.admin_headers().await?;
    let mut values = Map::new();
    for (id, _) in ChangeSet::Required.entries() {
        let result = conn.api.get_setting(&admin, id).await;
        match conn.observe("settings.get", result).await {
            Ok(value) => {
                values.insert(id.to_string(), value);
            }
            Err(e) => warn!(setting = id, error = %e, "cannot read backend setting"),
        }
    }
    Some(values)
}
