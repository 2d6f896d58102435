use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

use super::user::default_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Opaque token exchanged for a new access token.
    Refresh,
    /// Access token invalidated by logout before its natural expiry.
    Revoked,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Refresh => "refresh",
            TokenKind::Revoked => "revoked",
        }
    }
}

/// A document in the `tokens` collection. Expired records are removed by the
/// admin cleanup endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    #[serde(rename = "_id", default = "default_id")]
    pub id: String,
    pub token: String,
    pub kind: TokenKind,
    pub user_id: String,
    pub expires_at: DateTime,
    #[serde(default = "DateTime::now")]
    pub created_at: DateTime,
}

impl TokenRecord {
    pub fn new(token: String, kind: TokenKind, user_id: String, expires_at: DateTime) -> Self {
        Self {
            id: default_id(),
            token,
            kind,
            user_id,
            expires_at,
            created_at: DateTime::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= DateTime::now()
    }
}
