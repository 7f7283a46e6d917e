//! User profile types
//!
//! Snapshot of the authenticated user as returned by the API and cached in
//! durable storage. Not an auth primitive.

use serde::{Deserialize, Serialize};

/// User profile returned by `/auth/login`, `/auth/verify-2fa` and
/// `/auth/profile`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_language: Option<Language>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<UserSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl User {
    /// Language code the user prefers, if the server sent one
    #[must_use]
    pub fn language_code(&self) -> Option<&str> {
        self.preferred_language.as_ref().map(|lang| lang.code.as_str())
    }
}

/// Preferred UI language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub id: i64,
    pub code: String,
    pub name: String,
}

/// Colour scheme preference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Per-user settings block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub id: i64,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub notification_enabled: bool,
    #[serde(default)]
    pub reminder_time: String,
    #[serde(default)]
    pub weekly_summary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<String>,
}

const fn default_active() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_from_api_payload() {
        let json = r#"{
            "id": 7,
            "email": "ana@example.com",
            "fullName": "Ana Pérez",
            "profilePicture": null,
            "isEmailVerified": true,
            "preferredLanguage": {"id": 1, "code": "es", "name": "Español"},
            "settings": {"id": 3, "theme": "dark", "notificationEnabled": true,
                         "reminderTime": "20:00", "weeklySummary": false}
        }"#;

        let user: User = serde_json::from_str(json).unwrap();

        assert_eq!(user.id, 7);
        assert_eq!(user.full_name, "Ana Pérez");
        assert!(user.profile_picture.is_none());
        assert!(user.is_active);
        assert_eq!(user.language_code(), Some("es"));
        assert_eq!(user.settings.map(|s| s.theme), Some(Theme::Dark));
    }

    #[test]
    fn test_minimal_user_payload() {
        let user: User = serde_json::from_str(r#"{"id": 1, "email": "a@b.c"}"#).unwrap();

        assert_eq!(user.full_name, "");
        assert!(!user.is_email_verified);
        assert!(user.language_code().is_none());
    }
}
