use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use natours_shared::Masked;

use crate::entity::{Entity, UniqueKey};
use crate::password;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    #[default]
    User,
    Guide,
    LeadGuide,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Guide => "guide",
            Role::LeadGuide => "lead-guide",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "default_photo")]
    pub photo: String,
    #[serde(default = "default_active")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    // Credentials are stored with the document but never leave the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<Masked<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_changed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_expires: Option<DateTime<Utc>>,
}

fn default_photo() -> String {
    "default.jpg".to_string()
}

fn default_active() -> bool {
    true
}

impl User {
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }

    /// Accounts without a stored hash cannot log in with a password.
    pub fn password_matches(&self, candidate: &str) -> bool {
        match &self.password_hash {
            Some(Masked(hash)) => password::verify_password(candidate, hash),
            None => false,
        }
    }

    /// True when the password changed after a token issued at `issued_at` (unix seconds).
    pub fn changed_password_after(&self, issued_at: i64) -> bool {
        self.password_changed_at
            .map(|changed| changed.timestamp() > issued_at)
            .unwrap_or(false)
    }

    pub fn reset_token_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.password_reset_token.is_some() && self.password_reset_expires.is_some_and(|expires| expires > now)
    }
}

impl Entity for User {
    const COLLECTION: &'static str = "users";
    const NAME: &'static str = "User";
    const PRIVATE_FIELDS: &'static [&'static str] =
        &["passwordHash", "passwordChangedAt", "passwordResetToken", "passwordResetExpires"];

    fn id(&self) -> Uuid {
        self.id
    }

    fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
    }

    fn validate(&self) -> CoreResult<()> {
        if self.name.is_empty() {
            return Err(CoreError::validation("Please tell us your name"));
        }
        if !is_valid_email(&self.email) {
            return Err(CoreError::validation("Please provide a valid email"));
        }
        Ok(())
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new("email", self.email.clone())]
    }
}

fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.split('.').count() >= 2
                && domain.split('.').all(|label| !label.is_empty())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_shapes() {
        assert!(is_valid_email("laura@example.com"));
        assert!(!is_valid_email("laura@example"));
        assert!(!is_valid_email("laura example@x.io"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a@b@c.io"));
    }

    fn user() -> User {
        crate::entity::build(serde_json::json!({ "name": "Laura Wilson", "email": "laura@example.com" })).unwrap()
    }

    #[test]
    fn test_password_fields_are_private() {
        let mut user = user();
        user.password_hash = Some(Masked(password::hash_password("pass1234").unwrap()));
        assert!(user.password_matches("pass1234"));
        assert!(!user.password_matches("pass12345"));
        assert!(!format!("{:?}", user).contains("argon2"));

        let public = crate::entity::to_public_document(&user).unwrap();
        assert!(public.get("passwordHash").is_none());
        assert_eq!(public["email"], "laura@example.com");

        let stored = crate::entity::to_document(&user).unwrap();
        assert!(stored["passwordHash"].as_str().unwrap().starts_with("$argon2id$"));
    }

    #[test]
    fn test_changed_password_after() {
        let mut user = user();
        assert!(!user.changed_password_after(0));

        let changed = Utc::now();
        user.password_changed_at = Some(changed);
        assert!(user.changed_password_after(changed.timestamp() - 60));
        assert!(!user.changed_password_after(changed.timestamp()));
    }

    #[test]
    fn test_reset_token_expiry() {
        let mut user = user();
        let now = Utc::now();
        assert!(!user.reset_token_valid_at(now));

        user.password_reset_token = Some(password::digest_reset_token("token"));
        user.password_reset_expires = Some(now + chrono::Duration::minutes(password::RESET_TOKEN_TTL_MINUTES));
        assert!(user.reset_token_valid_at(now));
        assert!(!user.reset_token_valid_at(now + chrono::Duration::minutes(11)));
    }

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_value(Role::LeadGuide).unwrap(), "lead-guide");
        assert_eq!(Role::LeadGuide.as_str(), "lead-guide");
    }
}
