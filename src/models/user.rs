use chrono::{TimeZone, Utc};
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Returns a new ObjectId as a hex string. This is used as the default for the `id` field.
pub fn default_id() -> String {
    ObjectId::new().to_hex()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// A user document as stored in the `users` collection.
///
/// Note:
/// - The `_id` field is renamed to `id` here, stored as a `String` (hex representation of ObjectId).
/// - Pending verification and reset tokens are removed with `$unset` once used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserModel {
    #[serde(rename = "_id", default = "default_id")]
    pub id: String,

    pub username: String,

    /// Always stored lowercased.
    pub email: String,

    pub hashed_password: String,

    #[serde(default)]
    pub role: Role,

    #[serde(default)]
    pub email_verified: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_expires: Option<DateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_expires: Option<DateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime>,

    #[serde(default = "DateTime::now")]
    pub created_at: DateTime,

    #[serde(default = "DateTime::now")]
    pub updated_at: DateTime,
}

impl UserModel {
    pub fn new(username: String, email: String, hashed_password: String) -> Self {
        let now = DateTime::now();
        Self {
            id: default_id(),
            username,
            email: email.to_lowercase(),
            hashed_password,
            role: Role::User,
            email_verified: false,
            verification_token: None,
            verification_expires: None,
            reset_token: None,
            reset_expires: None,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_response(&self) -> UserResponse {
        UserResponse {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
            email_verified: self.email_verified,
            last_login: self.last_login.map(rfc3339),
            created_at: rfc3339(self.created_at),
            updated_at: rfc3339(self.updated_at),
        }
    }
}

/// The public view of a user. Never carries the password hash or pending tokens.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub email_verified: bool,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn rfc3339(dt: DateTime) -> String {
    Utc.timestamp_millis_opt(dt.timestamp_millis())
        .single()
        .map(|d| d.to_rfc3339())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_is_unverified_and_lowercased() {
        let user = UserModel::new("alice".into(), "Alice@Example.COM".into(), "hash".into());
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.role, Role::User);
        assert!(!user.email_verified);
        assert!(ObjectId::parse_str(&user.id).is_ok());
    }

    #[test]
    fn response_hides_secrets() {
        let mut user = UserModel::new("bob".into(), "bob@example.com".into(), "secret-hash".into());
        user.reset_token = Some("tok".into());
        let json = serde_json::to_value(user.to_response()).unwrap();
        assert!(json.get("hashed_password").is_none());
        assert!(json.get("reset_token").is_none());
        assert_eq!(json["role"], "user");
    }

    #[test]
    fn role_round_trips_as_lowercase() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("root"), None);
        assert_eq!(Role::Admin.as_str(), "admin");
    }
}
