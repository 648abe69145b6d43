//! Nonce domain types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// What a nonce verifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonceType {
    /// Confirms a new resource owner's email address.
    Welcome,
    /// Authorizes a password reset.
    ResetPassword,
}

impl NonceType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::ResetPassword => "reset_password",
        }
    }
}

impl fmt::Display for NonceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NonceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "welcome" => Ok(Self::Welcome),
            "reset_password" => Ok(Self::ResetPassword),
            other => Err(format!("unknown nonce type: {other}")),
        }
    }
}

/// A single-use secret scoped to a nonce type and a resource owner.
///
/// `issued -> spent` or `issued -> revoked`; both are terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nonce {
    pub id: Uuid,
    pub resource_owner_id: Uuid,
    pub nonce_type: NonceType,
    /// SHA-256 hash of the nonce value.
    pub nonce_hash: String,
    pub spent: bool,
    pub revoked: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl Nonce {
    /// Returns `true` if the nonce can still be spent.
    #[must_use]
    pub fn is_spendable(&self) -> bool {
        !self.spent && !self.revoked && OffsetDateTime::now_utc() <= self.expires_at
    }
}
