//! Nonce storage trait.

use async_trait::async_trait;
use uuid::Uuid;

use super::StorageResult;
use crate::types::{Nonce, NonceType};

/// Storage for welcome and password reset nonces.
#[async_trait]
pub trait NonceStorage: Send + Sync {
    /// Stores a nonce.
    async fn insert(&self, nonce: &Nonce) -> StorageResult<()>;

    /// Finds a nonce by type and hash.
    ///
    /// Returns nonces in any state; callers check `is_spendable()`.
    async fn find_by_type_and_hash(
        &self,
        nonce_type: NonceType,
        nonce_hash: &str,
    ) -> StorageResult<Option<Nonce>>;

    /// Finds a nonce by its ID.
    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Nonce>>;

    /// Marks a nonce spent if it is neither spent nor revoked.
    ///
    /// The check and the update are one atomic step.
    ///
    /// # Returns
    ///
    /// `true` if this call spent the nonce, `false` if it was already
    /// spent or revoked.
    async fn mark_spent(&self, id: Uuid) -> StorageResult<bool>;

    /// Revokes every unspent nonce of `nonce_type` for a resource owner,
    /// except `keep_id`.
    ///
    /// # Returns
    ///
    /// The number of nonces revoked.
    async fn revoke_unspent(
        &self,
        resource_owner_id: Uuid,
        nonce_type: NonceType,
        keep_id: Uuid,
    ) -> StorageResult<u64>;
}
