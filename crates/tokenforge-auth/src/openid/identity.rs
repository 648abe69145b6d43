//! Identity token issuance.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::claims::{IdentityClaims, assemble};
use crate::AuthResult;
use crate::error::{AuthError, ErrorCode};
use crate::secret;
use crate::storage::{ResourceOwnerStorage, TokenStorage};
use crate::token::{Jwks, JwtService, TokenClaims};

/// Claims of a signed identity token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdToken {
    pub iss: String,
    pub sub: Uuid,
    pub aud: Vec<Uuid>,
    pub iat: i64,
    pub exp: i64,
    pub auth_time: i64,
    #[serde(flatten)]
    pub identity: IdentityClaims,
}

/// Signs identity tokens for access tokens issued with the `openid` scope.
pub struct IdentityTokenMaker {
    tokens: Arc<dyn TokenStorage>,
    resource_owners: Arc<dyn ResourceOwnerStorage>,
    jwt: Arc<JwtService>,
}

impl IdentityTokenMaker {
    #[must_use]
    pub fn new(
        tokens: Arc<dyn TokenStorage>,
        resource_owners: Arc<dyn ResourceOwnerStorage>,
        jwt: Arc<JwtService>,
    ) -> Self {
        Self {
            tokens,
            resource_owners,
            jwt,
        }
    }

    /// Builds and signs the identity token that accompanies an access token.
    ///
    /// Identity claims are drawn from the profile of the access token's
    /// resource owner and gated by the access token's scopes.
    ///
    /// # Errors
    ///
    /// - `AuthError::NotFound` (`ResourceOwnerNotFound`) if the access token
    ///   or its resource owner cannot be found
    /// - `AuthError::NotFound` (`ProfileNotFound`) if the owner has no profile
    /// - `AuthError::Encoding` if signing fails
    #[tracing::instrument(skip_all)]
    pub async fn make(&self, access_token: &str, claims: &TokenClaims) -> AuthResult<String> {
        let token = self
            .tokens
            .find_by_hash(&secret::hash(access_token))
            .await?
            .ok_or_else(|| {
                AuthError::not_found(
                    "access token for identity token was not found",
                    ErrorCode::ResourceOwnerNotFound,
                )
            })?;

        let resource_owner_id = self
            .tokens
            .find_resource_owner_id(token.id)
            .await?
            .ok_or_else(|| {
                AuthError::not_found(
                    "resource owner was not found",
                    ErrorCode::ResourceOwnerNotFound,
                )
            })?;

        let profile = self
            .resource_owners
            .find_profile(resource_owner_id)
            .await?
            .ok_or_else(|| {
                AuthError::not_found("profile was not found", ErrorCode::ProfileNotFound)
            })?;

        let id_token = IdToken {
            iss: claims.issuer.clone(),
            sub: resource_owner_id,
            aud: claims.audience.clone(),
            iat: claims.issued_at,
            exp: claims.expires_at,
            auth_time: claims.auth_time,
            identity: assemble(&token.scopes, &profile),
        };

        self.jwt.encode(&id_token).map_err(|e| {
            tracing::error!(
                error = %e,
                token_id = %token.id,
                "Failed to sign identity token"
            );
            AuthError::encoding(e.to_string())
        })
    }

    /// Public keys that verify identity tokens.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        self.jwt.jwks()
    }
}
