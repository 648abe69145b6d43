//! Identity claim assembly.
//!
//! Claims are released in groups, one per OpenID Connect scope:
//!
//! | scope     | claims |
//! |-----------|--------|
//! | `profile` | name, middle_name, nickname, preferred_username, given_name, family_name, gender, birthdate, picture, website, updated_at |
//! | `email`   | email, email_verified |
//! | `phone`   | phone_number, phone_number_verified |
//! | `address` | address (the profile's first address) |
//!
//! A group whose scope was not granted is absent from the serialized
//! claims. So is the `address` claim when the profile has no address.

use serde::{Deserialize, Serialize};

use crate::types::scope::has_scope;
use crate::types::{Address, Profile, Scope};

const PROFILE: &str = "profile";
const EMAIL: &str = "email";
const PHONE: &str = "phone";
const ADDRESS: &str = "address";

/// Scope-gated identity claims.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    #[serde(flatten)]
    pub profile: Option<ProfileClaims>,

    #[serde(flatten)]
    pub email: Option<EmailClaims>,

    #[serde(flatten)]
    pub phone: Option<PhoneClaims>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<AddressClaims>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileClaims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Unix seconds.
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailClaims {
    pub email: String,
    pub email_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneClaims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub phone_number_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressClaims {
    pub street_address: String,
    pub locality: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
}

impl From<&Address> for AddressClaims {
    fn from(address: &Address) -> Self {
        let street_address = match &address.street_address2 {
            Some(line2) => format!("{}\n{}", address.street_address, line2),
            None => address.street_address.clone(),
        };
        Self {
            street_address,
            locality: address.locality.clone(),
            region: address.region.clone(),
            postal_code: address.postal_code.clone(),
            country: address.country.clone(),
        }
    }
}

/// Builds the identity claims a token's scopes release from a profile.
#[must_use]
pub fn assemble(scopes: &[Scope], profile: &Profile) -> IdentityClaims {
    let mut claims = IdentityClaims::default();

    if has_scope(scopes, PROFILE) {
        claims.profile = Some(profile_claims(profile));
    }

    if has_scope(scopes, EMAIL) {
        claims.email = Some(EmailClaims {
            email: profile.resource_owner.email.clone(),
            email_verified: profile.resource_owner.email_verified,
        });
    }

    if has_scope(scopes, PHONE) {
        claims.phone = Some(PhoneClaims {
            phone_number: profile.phone_number.clone(),
            phone_number_verified: profile.phone_number_verified,
        });
    }

    if has_scope(scopes, ADDRESS) {
        claims.address = profile.addresses.first().map(AddressClaims::from);
    }

    claims
}

fn profile_claims(profile: &Profile) -> ProfileClaims {
    ProfileClaims {
        name: profile.name.clone(),
        middle_name: profile.middle_name.clone(),
        nickname: profile.nick_name.clone(),
        preferred_username: profile.preferred_user_name.clone(),
        given_name: profile.given_name.clone(),
        family_name: profile.family_name.clone(),
        gender: profile.gender.clone(),
        birthdate: profile.birth_date.map(|d| {
            format!("{:04}-{:02}-{:02}", d.year(), u8::from(d.month()), d.day())
        }),
        picture: profile.picture.as_ref().map(ToString::to_string),
        website: profile.website.as_ref().map(ToString::to_string),
        updated_at: profile.updated_at.unix_timestamp(),
    }
}
