//! Authorization code issuance.
//!
//! [`AuthCodeIssuer`] stores a freshly generated code for an access request.
//! Codes are random alphanumeric strings whose width comes from the shared
//! configuration row. When a generated code collides with an existing one
//! the width is grown for everyone and the insert is retried, at most
//! [`MAX_INSERT_ATTEMPTS`] attempts in total.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

use crate::AuthResult;
use crate::error::{AuthCodeInsertFailure, AuthError};
use crate::oauth::scope::match_scopes;
use crate::secret;
use crate::storage::{AuthCodeStorage, ConfigurationStorage, StorageError, keys};
use crate::types::{AccessRequest, AuthCode, Client, expires_after};

/// Insert attempts before a code collision becomes fatal.
pub const MAX_INSERT_ATTEMPTS: u32 = 2;

/// Generates and stores authorization codes.
pub struct AuthCodeIssuer {
    configuration: Arc<dyn ConfigurationStorage>,
    auth_codes: Arc<dyn AuthCodeStorage>,
    lifetime: Duration,
}

impl AuthCodeIssuer {
    #[must_use]
    pub fn new(
        configuration: Arc<dyn ConfigurationStorage>,
        auth_codes: Arc<dyn AuthCodeStorage>,
        lifetime: Duration,
    ) -> Self {
        Self {
            configuration,
            auth_codes,
            lifetime,
        }
    }

    /// Stores a new code for `access_request` and returns its plaintext.
    ///
    /// Only the hash is persisted. The access request must already be stored.
    ///
    /// # Errors
    ///
    /// - `AuthError::AuthCodeInsert` with `KnownKeyExhausted` when every
    ///   attempt collided on the code hash
    /// - `AuthError::AuthCodeInsert` with `UnknownKey` when any other
    ///   uniqueness constraint was violated; this is never retried
    /// - `AuthError::Storage` for any other storage failure
    pub async fn issue(&self, access_request: &AccessRequest) -> AuthResult<String> {
        let mut configuration = self.configuration.get().await?;
        let mut code_size = configuration.authorization_code_size;
        let mut attempt = 1;

        loop {
            let plaintext = secret::generate(code_size);
            let auth_code = self.make_auth_code(access_request, &plaintext)?;

            let err = match self.auth_codes.insert(&auth_code).await {
                Ok(()) => {
                    tracing::debug!(
                        auth_code_id = %auth_code.id,
                        access_request_id = %access_request.id,
                        code_size,
                        "Issued authorization code"
                    );
                    return Ok(plaintext);
                }
                Err(err) => err,
            };

            if err.is_duplicate_on(keys::AUTH_CODE_HASH) {
                if attempt >= MAX_INSERT_ATTEMPTS {
                    tracing::error!(
                        attempt,
                        code_size,
                        error = %err,
                        "Failed to insert auth code, retries exhausted"
                    );
                    return Err(AuthError::AuthCodeInsert {
                        reason: AuthCodeInsertFailure::KnownKeyExhausted,
                        attempts: attempt,
                        code_size,
                    });
                }

                let next_code_size = code_size + 1;
                tracing::warn!(
                    attempt,
                    code_size,
                    next_code_size,
                    "Auth code collided, growing code size and retrying"
                );
                configuration = self
                    .configuration
                    .grow_authorization_code_size(configuration.id, next_code_size)
                    .await?;
                code_size = configuration.authorization_code_size;
                attempt += 1;
                continue;
            }

            return match err {
                StorageError::Duplicate { key, .. } => {
                    let key = key.unwrap_or_else(|| "unknown".to_string());
                    tracing::error!(
                        attempt,
                        code_size,
                        key = %key,
                        "Failed to insert auth code on an unexpected key, not retrying"
                    );
                    Err(AuthError::AuthCodeInsert {
                        reason: AuthCodeInsertFailure::UnknownKey { key },
                        attempts: attempt,
                        code_size,
                    })
                }
                other => Err(other.into()),
            };
        }
    }

    fn make_auth_code(
        &self,
        access_request: &AccessRequest,
        plaintext: &str,
    ) -> AuthResult<AuthCode> {
        let now = OffsetDateTime::now_utc();
        let expires_at = expires_after(now, self.lifetime)?;
        Ok(AuthCode {
            id: Uuid::new_v4(),
            code_hash: secret::hash(plaintext),
            access_request_id: access_request.id,
            created_at: now,
            expires_at,
            revoked: false,
        })
    }
}

/// The result of an authorization request.
#[derive(Debug, Clone)]
pub struct AuthorizationResponse {
    /// Plaintext authorization code, handed out exactly once.
    pub code: String,
    /// Redirect URI to send the code to.
    pub redirect_uri: Option<Url>,
    pub access_request_id: Uuid,
}

/// Records an authorization request and issues its code.
pub struct AuthorizationService {
    auth_codes: Arc<dyn AuthCodeStorage>,
    issuer: AuthCodeIssuer,
}

impl AuthorizationService {
    #[must_use]
    pub fn new(auth_codes: Arc<dyn AuthCodeStorage>, issuer: AuthCodeIssuer) -> Self {
        Self { auth_codes, issuer }
    }

    /// Handles an approved authorization request.
    ///
    /// The resource owner has already authenticated and the request
    /// parameters have already been validated.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidScope` if a requested scope is not one of the client's
    /// - any error from [`AuthCodeIssuer::issue`]
    #[tracing::instrument(skip_all, fields(client_id = %client.id, resource_owner_id = %resource_owner_id))]
    pub async fn request_code(
        &self,
        client: &Client,
        resource_owner_id: Uuid,
        requested_scopes: &[String],
        redirect_uri: Option<Url>,
    ) -> AuthResult<AuthorizationResponse> {
        let scopes = match_scopes(requested_scopes, &client.scopes)?;

        let access_request =
            AccessRequest::new(client.id, resource_owner_id, scopes, redirect_uri.clone());
        self.auth_codes
            .insert_access_request(&access_request)
            .await?;

        let code = self.issuer.issue(&access_request).await?;

        Ok(AuthorizationResponse {
            code,
            redirect_uri: redirect_uri.or_else(|| client.redirect_uri.clone()),
            access_request_id: access_request.id,
        })
    }
}
