//! Chat backend wire types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub preferences: Preferences,
}

/// `GET me` body, also embedded as `data.me` in the login response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Me {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub settings: Option<UserSettings>,
}

impl Me {
    /// Preferred language, empty when the backend reports none.
    pub fn language(&self) -> &str {
        self.settings
            .as_ref()
            .and_then(|s| s.preferences.language.as_deref())
            .unwrap_or("")
    }
}

/// `data` of a successful `POST login`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub auth_token: String,
    pub user_id: String,
    #[serde(default)]
    pub me: Option<Me>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LoginResponse {
    pub data: LoginData,
}

/// Chat account as returned by `users.info` / `users.create`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserResponse {
    pub user: ChatUser,
}

/// `users.create` request body.
#[derive(Clone, Serialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password: String,
    pub username: String,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Sum `unread` over the `update` array of a `subscriptions.get` body.
///
/// Missing or malformed data counts as zero.
pub fn sum_unread(body: &serde_json::Value) -> u64 {
    body.get("update")
        .and_then(|u| u.as_array())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| e.get("unread").and_then(|n| n.as_u64()))
                .sum()
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unread_is_summed() {
        let body = json!({"update": [{"unread": 2}, {"unread": 0}, {"unread": 5}]});
        assert_eq!(sum_unread(&body), 7);
    }

    #[test]
    fn unread_tolerates_bad_shapes() {
        assert_eq!(sum_unread(&json!({})), 0);
        assert_eq!(sum_unread(&json!({"update": []})), 0);
        assert_eq!(sum_unread(&json!({"update": "nope"})), 0);
        assert_eq!(sum_unread(&json!({"update": [{"unread": "x"}, {}, {"unread": 3}]})), 3);
        assert_eq!(sum_unread(&json!(null)), 0);
    }

    #[test]
    fn login_response_parses_language() {
        let body = json!({
            "status": "success",
            "data": {
                "authToken": "t",
                "userId": "u",
                "me": {"_id": "u", "settings": {"preferences": {"language": "de"}}}
            }
        });
        let resp: LoginResponse = serde_json::from_value(body).unwrap();
        assert_eq!(resp.data.auth_token, "t");
        assert_eq!(resp.data.me.unwrap().language(), "de");
    }

    #[test]
    fn me_without_settings_has_empty_language() {
        let me: Me = serde_json::from_value(json!({"_id": "u"})).unwrap();
        assert_eq!(me.language(), "");
    }
}
