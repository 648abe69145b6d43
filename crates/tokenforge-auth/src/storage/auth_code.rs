//! Authorization code storage trait.
//!
//! # Security Considerations
//!
//! - Codes are stored as SHA-256 hashes only
//! - The hash column is unique; a collision is reported on the `code` key
//! - A code is linked to at most one token; a second link is reported on
//!   the `auth_code_id` key and signals that the code was replayed

use async_trait::async_trait;
use uuid::Uuid;

use super::StorageResult;
use crate::types::{AccessRequest, AuthCode, AuthCodeRecord};

/// Storage for access requests, authorization codes and the code-to-token link.
#[async_trait]
pub trait AuthCodeStorage: Send + Sync {
    /// Stores an access request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be stored.
    async fn insert_access_request(&self, access_request: &AccessRequest) -> StorageResult<()>;

    /// Stores an authorization code.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Duplicate` with key `code` if another code
    /// already has the same hash. Any other violated constraint must be
    /// reported under its own key.
    async fn insert(&self, auth_code: &AuthCode) -> StorageResult<()>;

    /// Finds a code by the client it was issued to and its hash.
    ///
    /// Returns codes regardless of expiry or revocation; callers check
    /// `is_valid()`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_client_and_hash(
        &self,
        client_id: Uuid,
        code_hash: &str,
    ) -> StorageResult<Option<AuthCodeRecord>>;

    /// Finds a code by its ID.
    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<AuthCode>>;

    /// Links a token to the code it was exchanged for.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Duplicate` with key `auth_code_id` if the code
    /// already has a token linked. This must be enforced by a true
    /// uniqueness constraint, not a read-then-write check.
    async fn link_token(&self, auth_code_id: Uuid, token_id: Uuid) -> StorageResult<()>;

    /// Burns the credential lineage of a replayed code.
    ///
    /// In a single atomic step, revokes:
    /// - every token linked to the code, and their refresh tokens
    /// - every token rotated from those, found through its lead token
    ///   pointer, and their refresh tokens
    /// - the token `attempted_token_id` built by the replay, and its refresh token
    /// - the code itself
    ///
    /// Revoking also moves each token's `expires_at` to now.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails; nothing is revoked in that case.
    async fn revoke_lineage(&self, auth_code_id: Uuid, attempted_token_id: Uuid)
    -> StorageResult<()>;
}
