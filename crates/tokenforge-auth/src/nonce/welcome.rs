//! Email verification for new resource owners.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::{NonceManager, SpendEffect};
use crate::AuthResult;
use crate::error::{AuthError, ErrorCode};
use crate::storage::{ResourceOwnerStorage, StorageError};
use crate::types::NonceType;

pub struct Welcome {
    nonces: Arc<NonceManager>,
    resource_owners: Arc<dyn ResourceOwnerStorage>,
}

impl Welcome {
    #[must_use]
    pub fn new(nonces: Arc<NonceManager>, resource_owners: Arc<dyn ResourceOwnerStorage>) -> Self {
        Self {
            nonces,
            resource_owners,
        }
    }

    /// Issues a sealed welcome nonce to mail to a new resource owner.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` or `AuthError::Encoding` if the nonce
    /// cannot be stored or sealed.
    #[tracing::instrument(skip_all, fields(resource_owner_id = %resource_owner_id))]
    pub async fn issue(&self, resource_owner_id: Uuid) -> AuthResult<String> {
        self.nonces
            .issue_sealed(resource_owner_id, NonceType::Welcome)
            .await
    }

    /// Spends a welcome nonce and marks the owner's email verified.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidRequest` if `nonce` is blank
    /// - `AuthError::Malformed` if the nonce container cannot be decoded
    /// - `AuthError::NotFound` if the nonce is unknown or no longer spendable
    #[tracing::instrument(skip_all)]
    pub async fn confirm(&self, nonce: &str) -> AuthResult<Uuid> {
        if nonce.trim().is_empty() {
            return Err(AuthError::missing_field("nonce", "nonce is required"));
        }

        let effect = VerifyEmail {
            resource_owners: self.resource_owners.as_ref(),
        };
        self.nonces.spend(nonce, NonceType::Welcome, &effect).await
    }
}

struct VerifyEmail<'a> {
    resource_owners: &'a dyn ResourceOwnerStorage,
}

#[async_trait]
impl SpendEffect for VerifyEmail<'_> {
    async fn apply(&self, resource_owner_id: Uuid) -> AuthResult<()> {
        match self
            .resource_owners
            .set_email_verified(resource_owner_id)
            .await
        {
            Ok(()) => Ok(()),
            Err(StorageError::NotFound { .. }) => Err(AuthError::not_found(
                "resource owner was not found",
                ErrorCode::ResourceOwnerNotFound,
            )),
            Err(err) => Err(err.into()),
        }
    }
}
