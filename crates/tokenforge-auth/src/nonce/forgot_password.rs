//! Password reset.
//!
//! `send_message` issues a `reset_password` nonce for the owner of an email
//! address. Delivering it is up to the caller. `reset` spends the nonce,
//! stores the new password, and revokes every active token of the owner.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::{NonceManager, SpendEffect};
use crate::AuthResult;
use crate::error::{AuthError, ErrorCode};
use crate::secret;
use crate::storage::{ResourceOwnerStorage, StorageError, TokenStorage};
use crate::types::NonceType;

/// Fields of a password reset form.
#[derive(Debug, Clone, Default)]
pub struct PasswordReset {
    pub nonce: String,
    pub password: String,
    pub repeat_password: String,
}

impl PasswordReset {
    fn validate(&self) -> AuthResult<()> {
        if self.nonce.trim().is_empty() {
            return Err(AuthError::missing_field("nonce", "nonce is required"));
        }
        if self.password.is_empty() {
            return Err(AuthError::missing_field("password", "password is required"));
        }
        if self.repeat_password.is_empty() {
            return Err(AuthError::missing_field(
                "repeat_password",
                "repeat password is required",
            ));
        }
        if self.password != self.repeat_password {
            return Err(AuthError::invalid_request(
                "repeat_password",
                "passwords do not match",
                ErrorCode::PasswordMismatch,
            ));
        }
        Ok(())
    }
}

pub struct ForgotPassword {
    nonces: Arc<NonceManager>,
    resource_owners: Arc<dyn ResourceOwnerStorage>,
    tokens: Arc<dyn TokenStorage>,
}

impl ForgotPassword {
    #[must_use]
    pub fn new(
        nonces: Arc<NonceManager>,
        resource_owners: Arc<dyn ResourceOwnerStorage>,
        tokens: Arc<dyn TokenStorage>,
    ) -> Self {
        Self {
            nonces,
            resource_owners,
            tokens,
        }
    }

    /// Issues a sealed reset nonce for the owner of `email`.
    ///
    /// Returns `None` when no resource owner has that email, so callers can
    /// answer the same way whether or not the address is registered.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRequest` if `email` is blank.
    #[tracing::instrument(skip_all)]
    pub async fn send_message(&self, email: &str) -> AuthResult<Option<String>> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AuthError::missing_field("email", "email is required"));
        }

        let Some(owner) = self.resource_owners.find_by_email(email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(None);
        };

        let sealed = self
            .nonces
            .issue_sealed(owner.id, NonceType::ResetPassword)
            .await?;
        Ok(Some(sealed))
    }

    /// Resets a password with a reset nonce.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidRequest` if a field is blank or the passwords differ
    /// - `AuthError::Malformed` if the nonce container cannot be decoded
    /// - `AuthError::NotFound` if the nonce is unknown or no longer spendable
    #[tracing::instrument(skip_all)]
    pub async fn reset(&self, form: &PasswordReset) -> AuthResult<Uuid> {
        form.validate()?;

        let password_hash = secret::hash_password(&form.password).map_err(|e| {
            tracing::error!(error = %e, "Failed to hash password");
            AuthError::password_hash(e.to_string())
        })?;

        let effect = ReplacePassword {
            resource_owners: self.resource_owners.as_ref(),
            tokens: self.tokens.as_ref(),
            password_hash,
        };
        self.nonces
            .spend(&form.nonce, NonceType::ResetPassword, &effect)
            .await
    }
}

struct ReplacePassword<'a> {
    resource_owners: &'a dyn ResourceOwnerStorage,
    tokens: &'a dyn TokenStorage,
    password_hash: String,
}

#[async_trait]
impl SpendEffect for ReplacePassword<'_> {
    async fn apply(&self, resource_owner_id: Uuid) -> AuthResult<()> {
        match self
            .resource_owners
            .update_password(resource_owner_id, &self.password_hash)
            .await
        {
            Ok(()) => {}
            Err(StorageError::NotFound { .. }) => {
                return Err(AuthError::not_found(
                    "resource owner was not found",
                    ErrorCode::ResourceOwnerNotFound,
                ));
            }
            Err(err) => return Err(err.into()),
        }

        let revoked = self
            .tokens
            .revoke_active_for_resource_owner(resource_owner_id)
            .await?;
        tracing::info!(
            resource_owner_id = %resource_owner_id,
            revoked_tokens = revoked,
            "Password reset, active tokens revoked"
        );
        Ok(())
    }
}
