//! Token, refresh token and token chain domain types.
//!
//! # Security
//!
//! - Access and refresh tokens are stored as SHA-256 hashes, never plaintext
//! - The plaintext is handed to the caller exactly once, at issuance
//! - Records are never deleted; they are revoked and kept for audit

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::scope::{Scope, has_scope};

/// The grant that produced a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization code grant.
    Code,
    /// Refresh token grant.
    Refresh,
    /// Resource owner password credentials grant.
    Password,
    /// Implicit grant.
    Token,
}

impl GrantType {
    /// Returns the grant type as stored and logged.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Refresh => "refresh",
            Self::Password => "password",
            Self::Token => "token",
        }
    }

    /// Returns `true` if tokens of this grant type are paired with a refresh token.
    #[must_use]
    pub fn issues_refresh_token(&self) -> bool {
        !matches!(self, Self::Token)
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(Self::Code),
            "refresh" => Ok(Self::Refresh),
            "password" => Ok(Self::Password),
            "token" => Ok(Self::Token),
            other => Err(format!("unknown grant type: {other}")),
        }
    }
}

/// Whether OpenID Connect identity fields accompany a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extension {
    /// Plain OAuth 2.0 token.
    OAuth2,
    /// OpenID Connect token; an identity token is issued alongside.
    Identity,
}

impl Extension {
    /// Picks the extension implied by the granted scopes.
    #[must_use]
    pub fn from_scopes(scopes: &[Scope]) -> Self {
        if has_scope(scopes, "openid") {
            Self::Identity
        } else {
            Self::OAuth2
        }
    }

    /// Returns the extension as stored.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OAuth2 => "oauth2",
            Self::Identity => "identity",
        }
    }
}

impl FromStr for Extension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oauth2" => Ok(Self::OAuth2),
            "identity" => Ok(Self::Identity),
            other => Err(format!("unknown extension: {other}")),
        }
    }
}

/// An issued access token.
///
/// Immutable once created except for `revoked` and `expires_at`, and
/// `expires_at` only ever moves earlier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// Unique identifier.
    pub id: Uuid,

    /// SHA-256 hash of the access token value.
    pub token_hash: String,

    /// The grant that produced this token.
    pub grant_type: GrantType,

    /// Client the token was issued to.
    pub client_id: Uuid,

    /// Original code/password grant token at the root of a rotation chain.
    /// `None` for tokens that are themselves the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_token_id: Option<Uuid>,

    /// Granted scopes.
    pub scopes: Vec<Scope>,

    /// Client identifiers the token is intended for.
    pub audience: Vec<Uuid>,

    /// Whether identity fields accompany this token.
    pub extension: Extension,

    /// Lifetime in seconds at issuance.
    pub seconds_to_expiration: i64,

    /// When this token was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When this token expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Whether the token has been revoked.
    pub revoked: bool,
}

impl Token {
    /// Returns `true` if this token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }

    /// Returns `true` if this token is neither expired nor revoked.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_expired() && !self.revoked
    }
}

/// A single-use refresh token, paired 1:1 with a [`Token`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshToken {
    /// Unique identifier.
    pub id: Uuid,

    /// The access token this refresh token is paired with.
    pub token_id: Uuid,

    /// SHA-256 hash of the refresh token value.
    pub token_hash: String,

    /// When this refresh token was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When this refresh token expires, independent of its token's expiry.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Whether the refresh token has been revoked.
    pub revoked: bool,
}

impl RefreshToken {
    /// Returns `true` if this refresh token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }

    /// Returns `true` if this refresh token is neither expired nor revoked.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_expired() && !self.revoked
    }
}

/// A refresh token loaded together with the token it is paired with.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshTokenRecord {
    pub refresh_token: RefreshToken,
    pub token: Token,
}

/// One succession step: `refresh_token_id` was redeemed on `previous_token_id`
/// and produced `next_token_id`.
///
/// Append-only. A refresh token appears in at most one chain row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenChain {
    pub id: Uuid,
    pub next_token_id: Uuid,
    pub previous_token_id: Uuid,
    pub refresh_token_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn create_test_token(expires_at: OffsetDateTime, revoked: bool) -> Token {
        let now = OffsetDateTime::now_utc();
        Token {
            id: Uuid::new_v4(),
            token_hash: "hash".to_string(),
            grant_type: GrantType::Code,
            client_id: Uuid::new_v4(),
            lead_token_id: None,
            scopes: vec![Scope::new("profile")],
            audience: vec![],
            extension: Extension::OAuth2,
            seconds_to_expiration: 3600,
            created_at: now,
            expires_at,
            revoked,
        }
    }

    #[test]
    fn test_token_validity() {
        let now = OffsetDateTime::now_utc();

        assert!(create_test_token(now + Duration::hours(1), false).is_valid());
        assert!(!create_test_token(now + Duration::hours(1), true).is_valid());

        let expired = create_test_token(now - Duration::minutes(1), false);
        assert!(expired.is_expired());
        assert!(!expired.is_valid());
    }

    #[test]
    fn test_extension_from_scopes() {
        let oauth = vec![Scope::new("profile")];
        assert_eq!(Extension::from_scopes(&oauth), Extension::OAuth2);

        let openid = vec![Scope::new("openid"), Scope::new("email")];
        assert_eq!(Extension::from_scopes(&openid), Extension::Identity);
    }

    #[test]
    fn test_grant_type_round_trips_through_str() {
        for grant in [
            GrantType::Code,
            GrantType::Refresh,
            GrantType::Password,
            GrantType::Token,
        ] {
            assert_eq!(grant.as_str().parse::<GrantType>().unwrap(), grant);
        }
        assert!("client_credentials".parse::<GrantType>().is_err());
    }

    #[test]
    fn test_implicit_grant_has_no_refresh_token() {
        assert!(GrantType::Code.issues_refresh_token());
        assert!(GrantType::Refresh.issues_refresh_token());
        assert!(GrantType::Password.issues_refresh_token());
        assert!(!GrantType::Token.issues_refresh_token());
    }
}
