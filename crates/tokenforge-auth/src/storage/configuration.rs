//! Issuance configuration storage trait.

use async_trait::async_trait;
use uuid::Uuid;

use super::StorageResult;
use crate::types::Configuration;

/// Storage for the single shared configuration row.
///
/// The row is the only piece of state the grant engine shares across
/// requests. It is read and updated through the backend's own atomic row
/// update, never through process memory, so that concurrent server
/// instances agree on it.
#[async_trait]
pub trait ConfigurationStorage: Send + Sync {
    /// Loads the configuration row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the row was never seeded.
    async fn get(&self) -> StorageResult<Configuration>;

    /// Grows the authorization code size to at least `size`.
    ///
    /// Sets the size to `max(current, size)` and bumps the version in one
    /// atomic update. Two instances growing concurrently from the same
    /// starting size therefore grow it once, and it never shrinks.
    ///
    /// # Returns
    ///
    /// The row as it is after the update.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no row has identifier `id`.
    async fn grow_authorization_code_size(
        &self,
        id: Uuid,
        size: usize,
    ) -> StorageResult<Configuration>;
}
