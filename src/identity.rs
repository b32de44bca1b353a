use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::LoginError;

const EXTERNAL_ID_NAMESPACE: &str = "OAuth2Client";

/// Which fields of the provider's profile payload carry the identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileMapping {
    pub id_field: String,
    pub name_field: String,
    pub email_field: String,
}

impl Default for ProfileMapping {
    fn default() -> Self {
        Self {
            id_field: "id".to_string(),
            name_field: "full_name".to_string(),
            email_field: "email".to_string(),
        }
    }
}

/// Profile of the visitor as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    provider_user_id: String,
    display_name: String,
    email: Option<String>,
}

impl ExternalIdentity {
    pub fn new(
        provider_user_id: impl Into<String>,
        display_name: impl Into<String>,
        email: Option<String>,
    ) -> Self {
        Self {
            provider_user_id: provider_user_id.into(),
            display_name: display_name.into(),
            email: email.filter(|email| !email.is_empty()),
        }
    }

    pub fn from_profile(profile: &Value, mapping: &ProfileMapping) -> Result<Self, LoginError> {
        let provider_user_id = scalar_field(profile, &mapping.id_field).ok_or_else(|| {
            LoginError::InvalidProfile(format!("missing `{}` field", mapping.id_field))
        })?;
        let display_name = scalar_field(profile, &mapping.name_field)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                LoginError::InvalidProfile(format!("missing `{}` field", mapping.name_field))
            })?;
        let email = scalar_field(profile, &mapping.email_field).map(|email| email.trim().to_string());

        Ok(Self::new(provider_user_id, display_name, email))
    }

    pub fn provider_user_id(&self) -> &str {
        &self.provider_user_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Key of the account link for this identity under `client_id`.
    pub fn external_id(&self, client_id: &str) -> String {
        format!(
            "{EXTERNAL_ID_NAMESPACE}.{client_id}.{}",
            self.provider_user_id
        )
    }
}

fn scalar_field(profile: &Value, field: &str) -> Option<String> {
    match profile.get(field)? {
        Value::String(value) if !value.is_empty() => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn builds_identity_from_default_fields() {
        let profile = json!({"id": 42, "full_name": " Jane Doe ", "email": "jane@example.com"});
        let identity = ExternalIdentity::from_profile(&profile, &ProfileMapping::default()).unwrap();

        assert_eq!(identity.provider_user_id(), "42");
        assert_eq!(identity.display_name(), "Jane Doe");
        assert_eq!(identity.email(), Some("jane@example.com"));
        assert_eq!(identity.external_id("wiki"), "OAuth2Client.wiki.42");
    }

    #[test]
    fn empty_email_is_absent() {
        let profile = json!({"id": "u1", "full_name": "Jane", "email": ""});
        let identity = ExternalIdentity::from_profile(&profile, &ProfileMapping::default()).unwrap();
        assert_eq!(identity.email(), None);
    }

    #[test]
    fn honours_custom_mapping() {
        let mapping = ProfileMapping {
            id_field: "sub".to_string(),
            name_field: "name".to_string(),
            email_field: "mail".to_string(),
        };
        let profile = json!({"sub": "abc", "name": "Ann", "mail": "ann@example.com"});
        let identity = ExternalIdentity::from_profile(&profile, &mapping).unwrap();
        assert_eq!(identity.provider_user_id(), "abc");
        assert_eq!(identity.email(), Some("ann@example.com"));
    }

    #[test]
    fn missing_id_is_invalid_profile() {
        let profile = json!({"full_name": "Jane"});
        let result = ExternalIdentity::from_profile(&profile, &ProfileMapping::default());
        assert!(matches!(result, Err(LoginError::InvalidProfile(_))));
    }
}
