//! OpenID Connect identity tokens.
//!
//! - [`claims`] - Scope-gated claim assembly from a resource owner's profile
//! - [`identity`] - Signing identity tokens and publishing the JWKS

pub mod claims;
pub mod identity;

pub use claims::{AddressClaims, EmailClaims, IdentityClaims, PhoneClaims, ProfileClaims, assemble};
pub use identity::{IdToken, IdentityTokenMaker};
