//! Storage traits for grant engine data.
//!
//! This module defines storage interfaces for:
//!
//! - The shared issuance configuration row
//! - Access requests and authorization codes
//! - Access tokens, refresh tokens and the token chain
//! - Nonces
//! - Resource owners and profiles
//!
//! All correctness-critical concurrency control lives in the backends'
//! uniqueness constraints. Backends must report violations as
//! [`StorageError::Duplicate`] carrying one of the logical keys in [`keys`].
//!
//! # Implementations
//!
//! - [`memory::InMemoryAuthStorage`] - in-process backend
//! - `tokenforge-auth-postgres` - PostgreSQL backend

pub mod auth_code;
pub mod configuration;
pub mod error;
pub mod memory;
pub mod nonce;
pub mod resource_owner;
pub mod token;

use std::sync::Arc;

pub use auth_code::AuthCodeStorage;
pub use configuration::ConfigurationStorage;
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryAuthStorage;
pub use nonce::NonceStorage;
pub use resource_owner::ResourceOwnerStorage;
pub use token::{RefreshTokenStorage, TokenChainStorage, TokenStorage};

/// Logical uniqueness keys reported in [`StorageError::Duplicate`].
pub mod keys {
    /// Hashed authorization code value.
    pub const AUTH_CODE_HASH: &str = "code";
    /// One token per authorization code.
    pub const AUTH_CODE_TOKEN: &str = "auth_code_id";
    /// One token chain row per refresh token.
    pub const TOKEN_CHAIN_REFRESH_TOKEN: &str = "refresh_token_id";
    /// Resource owner email.
    pub const RESOURCE_OWNER_EMAIL: &str = "email";
}

/// The full set of stores the grant engine works against.
#[derive(Clone)]
pub struct AuthStores {
    pub configuration: Arc<dyn ConfigurationStorage>,
    pub auth_codes: Arc<dyn AuthCodeStorage>,
    pub tokens: Arc<dyn TokenStorage>,
    pub refresh_tokens: Arc<dyn RefreshTokenStorage>,
    pub token_chains: Arc<dyn TokenChainStorage>,
    pub nonces: Arc<dyn NonceStorage>,
    pub resource_owners: Arc<dyn ResourceOwnerStorage>,
}

impl AuthStores {
    /// Uses one backend for every store.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: ConfigurationStorage
            + AuthCodeStorage
            + TokenStorage
            + RefreshTokenStorage
            + TokenChainStorage
            + NonceStorage
            + ResourceOwnerStorage
            + 'static,
    {
        Self {
            configuration: backend.clone(),
            auth_codes: backend.clone(),
            tokens: backend.clone(),
            refresh_tokens: backend.clone(),
            token_chains: backend.clone(),
            nonces: backend.clone(),
            resource_owners: backend,
        }
    }
}
