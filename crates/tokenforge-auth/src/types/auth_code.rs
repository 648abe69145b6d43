//! Authorization code and access request types.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

use super::scope::Scope;

/// The durable record of who asked for what during one authorization flow.
///
/// Referenced by exactly one [`AuthCode`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    pub id: Uuid,
    pub client_id: Uuid,
    pub resource_owner_id: Uuid,
    pub scopes: Vec<Scope>,
    /// Redirect URI supplied with the authorization request, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<Url>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl AccessRequest {
    /// Creates an access request with a fresh identifier.
    #[must_use]
    pub fn new(
        client_id: Uuid,
        resource_owner_id: Uuid,
        scopes: Vec<Scope>,
        redirect_uri: Option<Url>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            resource_owner_id,
            scopes,
            redirect_uri,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

/// A single-use authorization code.
///
/// Only the SHA-256 hash of the code is stored; the hash is unique across
/// all codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCode {
    pub id: Uuid,
    pub code_hash: String,
    pub access_request_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub revoked: bool,
}

impl AuthCode {
    /// Returns `true` if the code has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }

    /// Returns `true` if the code can still be redeemed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_expired() && !self.revoked
    }
}

/// An authorization code loaded together with its access request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthCodeRecord {
    pub auth_code: AuthCode,
    pub access_request: AccessRequest,
}

impl AuthCodeRecord {
    /// Returns `true` if `redirect_uri` matches the one given at authorization.
    ///
    /// Both absent, or both present and equal.
    #[must_use]
    pub fn redirect_uri_matches(&self, redirect_uri: Option<&Url>) -> bool {
        self.access_request.redirect_uri.as_ref() == redirect_uri
    }
}
