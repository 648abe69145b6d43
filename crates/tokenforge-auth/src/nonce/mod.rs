//! One-time nonces for out-of-band verification.
//!
//! A nonce is `issued`, then either `spent` or `revoked`. Both end states
//! are terminal. Spending a nonce revokes every other unspent nonce of the
//! same type for the same resource owner, so at most one verification link
//! of a kind is ever usable.
//!
//! Callers never see the raw nonce. [`NonceManager::seal`] wraps it in a
//! signed JWT and [`NonceManager::spend`] verifies and unwraps it again.
//!
//! - [`welcome`] - Email verification for new resource owners
//! - [`forgot_password`] - Password reset

pub mod forgot_password;
pub mod welcome;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::config::NonceConfig;
use crate::error::{AuthError, ErrorCode};
use crate::secret;
use crate::storage::NonceStorage;
use crate::token::JwtService;
use crate::types::{Nonce, NonceType, expires_after};

pub use forgot_password::{ForgotPassword, PasswordReset};
pub use welcome::Welcome;

/// Payload of the signed nonce container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceClaims {
    pub nonce: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Work applied to the resource owner once their nonce is spent.
#[async_trait]
pub trait SpendEffect: Send + Sync {
    async fn apply(&self, resource_owner_id: Uuid) -> AuthResult<()>;
}

/// Issues and spends nonces.
pub struct NonceManager {
    nonces: Arc<dyn NonceStorage>,
    jwt: Arc<JwtService>,
    config: NonceConfig,
}

impl NonceManager {
    #[must_use]
    pub fn new(nonces: Arc<dyn NonceStorage>, jwt: Arc<JwtService>, config: NonceConfig) -> Self {
        Self { nonces, jwt, config }
    }

    /// Issues a nonce for a resource owner and returns its plaintext value.
    ///
    /// Only the hash is stored.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the nonce cannot be stored and
    /// `AuthError::Configuration` if the lifetime is out of range.
    pub async fn issue(&self, resource_owner_id: Uuid, nonce_type: NonceType) -> AuthResult<String> {
        let plaintext = secret::generate(self.config.size);
        let now = OffsetDateTime::now_utc();
        let expires_at = expires_after(now, self.config.lifetime)?;

        let nonce = Nonce {
            id: Uuid::new_v4(),
            resource_owner_id,
            nonce_type,
            nonce_hash: secret::hash(&plaintext),
            spent: false,
            revoked: false,
            created_at: now,
            expires_at,
        };
        self.nonces.insert(&nonce).await?;

        tracing::debug!(
            nonce_id = %nonce.id,
            resource_owner_id = %resource_owner_id,
            nonce_type = %nonce_type,
            "Issued nonce"
        );
        Ok(plaintext)
    }

    /// Wraps a plaintext nonce in a signed container for delivery.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Encoding` if signing fails and
    /// `AuthError::Configuration` if the lifetime is out of range.
    pub fn seal(&self, plaintext: &str) -> AuthResult<String> {
        let now = OffsetDateTime::now_utc();
        let expires_at = expires_after(now, self.config.lifetime)?;
        let claims = NonceClaims {
            nonce: plaintext.to_string(),
            iss: self.jwt.issuer().to_string(),
            iat: now.unix_timestamp(),
            exp: expires_at.unix_timestamp(),
        };
        self.jwt.encode(&claims).map_err(|e| {
            tracing::error!(error = %e, "Failed to sign nonce container");
            AuthError::encoding(e.to_string())
        })
    }

    /// Issues a nonce and returns it sealed.
    ///
    /// # Errors
    ///
    /// See [`issue`](Self::issue) and [`seal`](Self::seal).
    pub async fn issue_sealed(
        &self,
        resource_owner_id: Uuid,
        nonce_type: NonceType,
    ) -> AuthResult<String> {
        let plaintext = self.issue(resource_owner_id, nonce_type).await?;
        self.seal(&plaintext)
    }

    /// Spends the nonce inside a sealed container.
    ///
    /// Marks the nonce spent, applies `effect` to its resource owner, then
    /// revokes the owner's other unspent nonces of the same type.
    ///
    /// Expiry is judged from the stored nonce, not from the container.
    ///
    /// # Errors
    ///
    /// - `AuthError::Malformed` if the container cannot be verified or decoded
    /// - `AuthError::NotFound` (`NonceNotFound`) if no spendable nonce of
    ///   `nonce_type` matches
    pub async fn spend(
        &self,
        encoded: &str,
        nonce_type: NonceType,
        effect: &dyn SpendEffect,
    ) -> AuthResult<Uuid> {
        let claims = self
            .jwt
            .decode_allow_expired::<NonceClaims>(encoded)
            .map_err(|source| AuthError::Malformed {
                field: "nonce".to_string(),
                source,
            })?
            .claims;

        let nonce = self
            .nonces
            .find_by_type_and_hash(nonce_type, &secret::hash(&claims.nonce))
            .await?
            .filter(Nonce::is_spendable)
            .ok_or_else(nonce_not_found)?;

        if !self.nonces.mark_spent(nonce.id).await? {
            return Err(nonce_not_found());
        }

        effect.apply(nonce.resource_owner_id).await?;

        let revoked = self
            .nonces
            .revoke_unspent(nonce.resource_owner_id, nonce_type, nonce.id)
            .await?;

        tracing::info!(
            nonce_id = %nonce.id,
            resource_owner_id = %nonce.resource_owner_id,
            nonce_type = %nonce_type,
            revoked_siblings = revoked,
            "Spent nonce"
        );
        Ok(nonce.resource_owner_id)
    }
}

fn nonce_not_found() -> AuthError {
    AuthError::not_found("nonce was not found", ErrorCode::NonceNotFound)
}
