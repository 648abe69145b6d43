//! Token storage traits.
//!
//! # Security Considerations
//!
//! - Token values are stored as SHA-256 hashes only
//! - Tokens are never deleted; revocation flips `revoked` and pulls
//!   `expires_at` forward to now
//! - A refresh token appears in at most one token chain row; a second row
//!   is reported on the `refresh_token_id` key and signals replay

use async_trait::async_trait;
use uuid::Uuid;

use super::StorageResult;
use crate::types::{RefreshToken, RefreshTokenRecord, Token, TokenChain};

/// Storage for access tokens and their associations.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Stores a token together with its scope and audience associations.
    async fn insert(&self, token: &Token) -> StorageResult<()>;

    /// Finds a token by its ID.
    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Token>>;

    /// Finds a token by the hash of its value.
    ///
    /// Returns tokens regardless of expiry or revocation.
    async fn find_by_hash(&self, token_hash: &str) -> StorageResult<Option<Token>>;

    /// Associates a token with the resource owner it was issued for.
    async fn link_resource_owner(&self, resource_owner_id: Uuid, token_id: Uuid)
    -> StorageResult<()>;

    /// Associates a token with the client it was issued to.
    async fn link_client(&self, client_id: Uuid, token_id: Uuid) -> StorageResult<()>;

    /// Returns the resource owner a token was issued for, if linked.
    async fn find_resource_owner_id(&self, token_id: Uuid) -> StorageResult<Option<Uuid>>;

    /// Revokes a token and its refresh token in one step.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no token has identifier `token_id`.
    async fn revoke_graph(&self, token_id: Uuid) -> StorageResult<()>;

    /// Revokes every token graph of a resource owner that still holds a
    /// usable access token or a usable refresh token.
    ///
    /// A graph whose access token has expired is still revoked while its
    /// refresh token can be redeemed.
    ///
    /// # Returns
    ///
    /// The number of token graphs revoked.
    async fn revoke_active_for_resource_owner(&self, resource_owner_id: Uuid)
    -> StorageResult<u64>;
}

/// Storage for refresh tokens.
#[async_trait]
pub trait RefreshTokenStorage: Send + Sync {
    /// Stores a refresh token.
    async fn insert(&self, refresh_token: &RefreshToken) -> StorageResult<()>;

    /// Finds a refresh token, with its paired token, by client and hash.
    ///
    /// Only matches when the paired token was issued to `client_id`.
    /// Returns records regardless of expiry or revocation.
    async fn find_by_client_and_hash(
        &self,
        client_id: Uuid,
        token_hash: &str,
    ) -> StorageResult<Option<RefreshTokenRecord>>;

    /// Finds the refresh token paired with a token.
    async fn find_by_token_id(&self, token_id: Uuid) -> StorageResult<Option<RefreshToken>>;
}

/// Storage for the append-only token chain.
#[async_trait]
pub trait TokenChainStorage: Send + Sync {
    /// Appends a chain row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Duplicate` with key `refresh_token_id` if the
    /// refresh token already produced a chain row. This must be enforced by
    /// a true uniqueness constraint so that, of two concurrent rotations of
    /// the same refresh token, exactly one succeeds.
    ///
    /// Returns `StorageError::NotFound` if the refresh token has been
    /// revoked. The check and the insert are atomic with respect to
    /// [`AuthCodeStorage::revoke_lineage`](super::AuthCodeStorage::revoke_lineage).
    async fn insert(&self, token_chain: &TokenChain) -> StorageResult<()>;

    /// Finds the chain row produced by a refresh token.
    async fn find_by_refresh_token(
        &self,
        refresh_token_id: Uuid,
    ) -> StorageResult<Option<TokenChain>>;
}
