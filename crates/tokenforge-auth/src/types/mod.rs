//! Domain types shared by the grant engine and storage backends.
//!
//! ## Domain Types
//!
//! - [`Scope`] - A named permission unit
//! - [`Client`] - A registered OAuth 2.0 client
//! - [`Token`], [`RefreshToken`], [`TokenChain`] - Issued credentials and their succession
//! - [`AuthCode`], [`AccessRequest`] - The authorization code grant records
//! - [`Nonce`] - One-time out-of-band verification secrets
//! - [`ResourceOwner`], [`Profile`], [`Address`] - The user and their identity claims
//! - [`Configuration`] - The shared, persisted issuance settings

pub mod auth_code;
pub mod client;
pub mod configuration;
pub mod nonce;
pub mod resource_owner;
pub mod scope;
pub mod token;

use std::time::Duration;

use time::OffsetDateTime;

use crate::AuthResult;
use crate::error::AuthError;

pub use auth_code::{AccessRequest, AuthCode, AuthCodeRecord};
pub use client::Client;
pub use configuration::Configuration;
pub use nonce::{Nonce, NonceType};
pub use resource_owner::{Address, Profile, ResourceOwner};
pub use scope::Scope;
pub use token::{Extension, GrantType, RefreshToken, RefreshTokenRecord, Token, TokenChain};

/// Expiry of a record created at `now` that lives for `lifetime`.
///
/// # Errors
///
/// Returns `AuthError::Configuration` if the expiry is not representable.
pub(crate) fn expires_after(now: OffsetDateTime, lifetime: Duration) -> AuthResult<OffsetDateTime> {
    time::Duration::try_from(lifetime)
        .ok()
        .and_then(|lifetime| now.checked_add(lifetime))
        .ok_or_else(|| AuthError::configuration(format!("lifetime out of range: {lifetime:?}")))
}
