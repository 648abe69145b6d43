//! Token endpoint grants.
//!
//! - [`code`] - Authorization code redemption with replay revocation
//! - [`refresh`] - Refresh token rotation with reuse detection
//! - [`password`] - Resource owner password credentials
//! - [`implicit`] - Access tokens without refresh tokens
//!
//! [`TokenGrantService`] is the single entry point of the token endpoint.
//! It routes a [`GrantRequest`] to its grant and attaches an identity token
//! when the granted scopes include `openid`.

pub mod code;
pub mod implicit;
pub mod password;
pub mod refresh;

use std::sync::Arc;

use uuid::Uuid;

pub use code::{CodeGrant, CodeGrantRequest};
pub use implicit::ImplicitGrant;
pub use password::PasswordGrant;
pub use refresh::{RefreshGrant, RefreshGrantRequest, Rotation, lead_token_id};

use crate::AuthResult;
use crate::config::AuthConfig;
use crate::openid::IdentityTokenMaker;
use crate::storage::AuthStores;
use crate::token::{JwtService, TokenGraphBuilder, TokenResponse, TokenSettings};
use crate::types::{Client, Extension};

/// A token request, already authenticated and parsed.
#[derive(Debug, Clone)]
pub enum GrantRequest {
    AuthorizationCode(CodeGrantRequest),
    Refresh(RefreshGrantRequest),
    /// The resource owner's credentials were verified by the caller.
    Password {
        resource_owner_id: Uuid,
        scopes: Vec<String>,
    },
}

impl GrantRequest {
    #[must_use]
    pub fn grant_type(&self) -> &'static str {
        match self {
            Self::AuthorizationCode(_) => "authorization_code",
            Self::Refresh(_) => "refresh_token",
            Self::Password { .. } => "password",
        }
    }
}

pub struct TokenGrantService {
    code: CodeGrant,
    refresh: RefreshGrant,
    password: PasswordGrant,
    identity: IdentityTokenMaker,
}

impl TokenGrantService {
    #[must_use]
    pub fn new(stores: &AuthStores, config: &AuthConfig, jwt: Arc<JwtService>) -> Self {
        let graph_builder = Arc::new(TokenGraphBuilder::new(
            stores.tokens.clone(),
            stores.refresh_tokens.clone(),
            TokenSettings::from(&config.oauth),
        ));

        Self {
            code: CodeGrant::new(
                stores.auth_codes.clone(),
                stores.tokens.clone(),
                graph_builder.clone(),
                config.issuer.clone(),
            ),
            refresh: RefreshGrant::new(
                stores.tokens.clone(),
                stores.refresh_tokens.clone(),
                stores.token_chains.clone(),
                graph_builder.clone(),
                config.issuer.clone(),
            ),
            password: PasswordGrant::new(
                stores.tokens.clone(),
                graph_builder,
                config.issuer.clone(),
            ),
            identity: IdentityTokenMaker::new(
                stores.tokens.clone(),
                stores.resource_owners.clone(),
                jwt,
            ),
        }
    }

    /// Runs a grant for an authenticated client.
    ///
    /// # Errors
    ///
    /// Returns whatever the routed grant returns, or the identity token
    /// maker's error when an identity token is due.
    #[tracing::instrument(skip_all, fields(client_id = %client.id, grant_type = request.grant_type()))]
    pub async fn grant(&self, client: &Client, request: GrantRequest) -> AuthResult<TokenResponse> {
        let result = match request {
            GrantRequest::AuthorizationCode(ref code) => self.code.request(client, code).await,
            GrantRequest::Refresh(ref refresh) => self.refresh.request(client, refresh).await,
            GrantRequest::Password {
                resource_owner_id,
                ref scopes,
            } => self.password.issue(client, resource_owner_id, scopes).await,
        };

        let mut response = result.inspect_err(|err| {
            tracing::warn!(
                category = %err.category(),
                error_code = %err.error_code(),
                error = %err,
                "Grant failed"
            );
        })?;

        if response.extension == Extension::Identity {
            let id_token = self
                .identity
                .make(&response.access_token, &response.token_claims)
                .await?;
            response.id_token = Some(id_token);
        }

        Ok(response)
    }

    /// The identity token maker, for publishing the JWKS.
    #[must_use]
    pub fn identity(&self) -> &IdentityTokenMaker {
        &self.identity
    }
}
