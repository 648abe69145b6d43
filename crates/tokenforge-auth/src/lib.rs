//! # tokenforge-auth
//!
//! Token lifecycle and grant-processing engine for an OAuth 2.0 / OpenID
//! Connect authorization server.
//!
//! This crate provides:
//! - Authorization code issuance with collision recovery
//! - Code, refresh, password and implicit grants
//! - Replay detection that revokes every credential derived from a reused
//!   code or refresh token
//! - Single-use nonces for email verification and password reset
//! - Signed identity tokens with scope-gated claims
//!
//! ## Overview
//!
//! The engine keeps no locks of its own. Every single-use guarantee is a
//! uniqueness constraint in the storage backend, so it holds across any
//! number of server processes sharing one store.
//!
//! ## Modules
//!
//! - [`config`] - Issuance, nonce and signing configuration
//! - [`error`] - The grant error taxonomy
//! - [`grant`] - Token endpoint grants and the grant dispatcher
//! - [`nonce`] - Nonce issuance and spending
//! - [`oauth`] - Authorization endpoint logic and scope matching
//! - [`openid`] - Identity claims and identity tokens
//! - [`secret`] - Secret generation and hashing
//! - [`storage`] - Storage traits and the in-memory backend
//! - [`token`] - Token graphs, token responses and JWT signing
//! - [`types`] - Domain types

pub mod config;
pub mod error;
pub mod grant;
pub mod nonce;
pub mod oauth;
pub mod openid;
pub mod secret;
pub mod storage;
pub mod token;
pub mod types;

pub use config::{AuthConfig, ConfigError};
pub use error::{AuthCodeInsertFailure, AuthError, ErrorCategory, ErrorCode};
pub use grant::{
    CodeGrant, CodeGrantRequest, GrantRequest, ImplicitGrant, PasswordGrant, RefreshGrant,
    RefreshGrantRequest, TokenGrantService,
};
pub use nonce::{ForgotPassword, NonceManager, PasswordReset, Welcome};
pub use oauth::{AuthCodeIssuer, AuthorizationResponse, AuthorizationService};
pub use openid::{IdentityClaims, IdentityTokenMaker};
pub use storage::{AuthStores, InMemoryAuthStorage, StorageError, StorageResult};
pub use token::{JwtService, SigningKeyPair, TokenResponse};
pub use types::{Client, Extension, GrantType, NonceType, Scope};

/// Type alias for grant engine results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use tokenforge_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::{AuthConfig, ConfigError};
    pub use crate::error::{AuthError, ErrorCategory, ErrorCode};
    pub use crate::grant::{GrantRequest, TokenGrantService};
    pub use crate::nonce::{ForgotPassword, NonceManager, PasswordReset, Welcome};
    pub use crate::oauth::AuthorizationService;
    pub use crate::storage::{
        AuthCodeStorage, AuthStores, ConfigurationStorage, InMemoryAuthStorage, NonceStorage,
        RefreshTokenStorage, ResourceOwnerStorage, StorageError, StorageResult,
        TokenChainStorage, TokenStorage,
    };
    pub use crate::token::{JwtService, SigningKeyPair, TokenResponse};
    pub use crate::types::{Client, Extension, GrantType, NonceType, Scope};
}
