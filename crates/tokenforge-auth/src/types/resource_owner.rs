//! Resource owner, profile and address types.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use url::Url;
use uuid::Uuid;

/// The user on whose behalf clients act.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceOwner {
    pub id: Uuid,
    pub email: String,

    /// Argon2 PHC string. Never serialized.
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub email_verified: bool,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Identity claims source for a resource owner.
///
/// Every optional field maps to the OpenID Connect standard claim of the
/// same name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub resource_owner: ResourceOwner,
    pub name: Option<String>,
    pub middle_name: Option<String>,
    pub nick_name: Option<String>,
    pub preferred_user_name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<Date>,
    pub picture: Option<Url>,
    pub website: Option<Url>,
    pub phone_number: Option<String>,
    pub phone_number_verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,

    /// Ordered; only the first is ever released as a claim.
    #[serde(default)]
    pub addresses: Vec<Address>,
}

/// A postal address attached to a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: Uuid,
    pub street_address: String,
    pub street_address2: Option<String>,
    pub locality: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
}
