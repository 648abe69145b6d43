//! Resource owner storage trait.

use async_trait::async_trait;
use uuid::Uuid;

use super::StorageResult;
use crate::types::{Profile, ResourceOwner};

/// Storage for resource owners and their profiles.
#[async_trait]
pub trait ResourceOwnerStorage: Send + Sync {
    /// Stores a resource owner.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Duplicate` with key `email` if the email is taken.
    async fn insert(&self, resource_owner: &ResourceOwner) -> StorageResult<()>;

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<ResourceOwner>>;

    async fn find_by_email(&self, email: &str) -> StorageResult<Option<ResourceOwner>>;

    /// Marks the owner's email verified.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no owner has identifier `id`.
    async fn set_email_verified(&self, id: Uuid) -> StorageResult<()>;

    /// Replaces the owner's password hash.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no owner has identifier `id`.
    async fn update_password(&self, id: Uuid, password_hash: &str) -> StorageResult<()>;

    /// Stores a profile with its addresses.
    async fn insert_profile(&self, profile: &Profile) -> StorageResult<()>;

    /// Loads the owner's profile, with the owner and addresses populated.
    async fn find_profile(&self, resource_owner_id: Uuid) -> StorageResult<Option<Profile>>;
}
