use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const ANONYMOUS_IDENTITY: &str = "anonymous";
pub const USER_SETTINGS_PREFIX: &str = "userSettings:";

/// The signed-in user as persisted by the auth layer.
///
/// Only the fields used to scope preferences are modelled; anything else in
/// the stored record is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(
        default,
        deserialize_with = "deserialize_key_field",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(
        rename = "_id",
        default,
        deserialize_with = "deserialize_key_field",
        skip_serializing_if = "Option::is_none"
    )]
    pub legacy_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_key_field",
        skip_serializing_if = "Option::is_none"
    )]
    pub email: Option<String>,
}

impl UserIdentity {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn with_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }

    /// First non-blank of `id`, `_id`, `email`.
    pub fn key_part(&self) -> Option<&str> {
        [&self.id, &self.legacy_id, &self.email]
            .into_iter()
            .filter_map(|value| value.as_deref())
            .find(|value| !value.trim().is_empty())
    }
}

/// Storage slot holding the settings record for `identity`.
pub fn user_settings_key(identity: Option<&UserIdentity>) -> String {
    let key_part = identity
        .and_then(UserIdentity::key_part)
        .unwrap_or(ANONYMOUS_IDENTITY);
    format!("{USER_SETTINGS_PREFIX}{key_part}")
}

// Auth backends disagree on id types; numeric ids scope the same way as strings.
fn deserialize_key_field<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}
