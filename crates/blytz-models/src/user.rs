//! User identity summary.

use serde::{Deserialize, Serialize};

/// Identity summary mirrored into the credential cache under `user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    /// Identity provider user ID
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl UserSummary {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Name shown to the backend: display name, else the email local part.
    pub fn preferred_name(&self, fallback_email: &str) -> String {
        if let Some(name) = self.display_name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        fallback_email
            .split('@')
            .next()
            .unwrap_or(fallback_email)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_json_uses_camel_case() {
        let user = UserSummary::new("u1")
            .with_email("a@b.com")
            .with_display_name("Ada");
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["uid"], "u1");
        assert_eq!(json["email"], "a@b.com");
        assert_eq!(json["displayName"], "Ada");
    }

    #[test]
    fn test_missing_fields_serialize_as_null() {
        let json = serde_json::to_value(UserSummary::new("u1")).unwrap();
        assert!(json["email"].is_null());
        assert!(json["displayName"].is_null());
    }

    #[test]
    fn test_preferred_name_falls_back_to_email_local_part() {
        let user = UserSummary::new("u1");
        assert_eq!(user.preferred_name("jane.doe@example.com"), "jane.doe");

        let named = UserSummary::new("u1").with_display_name("Jane");
        assert_eq!(named.preferred_name("jane.doe@example.com"), "Jane");
    }
}
