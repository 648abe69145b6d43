//! Authorization code grant.
//!
//! An authorization code is single use. Redemption links the new token to
//! the code; the link is unique per code, so a second redemption fails to
//! insert it. That failure means the code leaked, and the whole credential
//! lineage of the code is burned before the error is returned.

use std::sync::Arc;

use url::Url;
use uuid::Uuid;

use crate::AuthResult;
use crate::error::{AuthError, ErrorCode};
use crate::secret;
use crate::storage::{AuthCodeStorage, TokenStorage, keys};
use crate::token::{TokenGraphBuilder, TokenGraphRequest, TokenResponse};
use crate::types::{Client, Extension, GrantType, Scope};

/// Token request parameters for the code grant.
#[derive(Debug, Clone)]
pub struct CodeGrantRequest {
    pub code: String,
    pub redirect_uri: Option<Url>,
}

/// Redeems authorization codes.
pub struct CodeGrant {
    auth_codes: Arc<dyn AuthCodeStorage>,
    tokens: Arc<dyn TokenStorage>,
    graph_builder: Arc<TokenGraphBuilder>,
    issuer: String,
}

impl CodeGrant {
    #[must_use]
    pub fn new(
        auth_codes: Arc<dyn AuthCodeStorage>,
        tokens: Arc<dyn TokenStorage>,
        graph_builder: Arc<TokenGraphBuilder>,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            auth_codes,
            tokens,
            graph_builder,
            issuer: issuer.into(),
        }
    }

    /// Handles a token request carrying an authorization code.
    ///
    /// # Errors
    ///
    /// - `AuthError::NotFound` (`AuthCodeNotFound`) if the code is unknown
    ///   for this client, expired, or revoked
    /// - `AuthError::NotFound` (`RedirectUriMismatch`) if the redirect URI
    ///   differs from the one given at authorization
    /// - `AuthError::CompromisedCode` if the code was already redeemed
    #[tracing::instrument(skip_all, fields(client_id = %client.id))]
    pub async fn request(
        &self,
        client: &Client,
        request: &CodeGrantRequest,
    ) -> AuthResult<TokenResponse> {
        let code_hash = secret::hash(&request.code);
        let record = self
            .auth_codes
            .find_by_client_and_hash(client.id, &code_hash)
            .await?
            .ok_or_else(|| {
                AuthError::not_found("auth code was not found", ErrorCode::AuthCodeNotFound)
            })?;

        if !record.auth_code.is_valid() {
            tracing::debug!(
                auth_code_id = %record.auth_code.id,
                revoked = record.auth_code.revoked,
                "Auth code is expired or revoked"
            );
            return Err(AuthError::not_found(
                "auth code is expired or revoked",
                ErrorCode::AuthCodeNotFound,
            ));
        }

        if !record.redirect_uri_matches(request.redirect_uri.as_ref()) {
            return Err(AuthError::not_found(
                "redirect uri does not match the access request",
                ErrorCode::RedirectUriMismatch,
            ));
        }

        self.exchange(
            client.id,
            record.auth_code.id,
            record.access_request.resource_owner_id,
            record.access_request.scopes,
        )
        .await
    }

    /// Exchanges a verified authorization code for a token graph.
    ///
    /// The audience of the new token is the requesting client.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::CompromisedCode` if the code already has a token
    /// linked. Before returning it revokes every token and refresh token
    /// issued for the code, the graph built by this attempt, and the code.
    pub async fn exchange(
        &self,
        client_id: Uuid,
        auth_code_id: Uuid,
        resource_owner_id: Uuid,
        scopes: Vec<Scope>,
    ) -> AuthResult<TokenResponse> {
        let extension = Extension::from_scopes(&scopes);
        let graph = self
            .graph_builder
            .build(TokenGraphRequest {
                grant_type: GrantType::Code,
                client_id,
                scopes,
                audience: vec![client_id],
                extension,
                lead_token_id: None,
            })
            .await?;

        if let Err(err) = self.auth_codes.link_token(auth_code_id, graph.token.id).await {
            if !err.is_duplicate_on(keys::AUTH_CODE_TOKEN) {
                return Err(err.into());
            }
            tracing::warn!(
                auth_code_id = %auth_code_id,
                client_id = %client_id,
                "Auth code was redeemed twice, revoking its tokens"
            );
            self.auth_codes
                .revoke_lineage(auth_code_id, graph.token.id)
                .await?;
            return Err(AuthError::CompromisedCode { auth_code_id });
        }

        self.tokens
            .link_resource_owner(resource_owner_id, graph.token.id)
            .await?;
        self.tokens.link_client(client_id, graph.token.id).await?;

        let auth_time = graph.token.created_at;
        Ok(TokenResponse::new(graph, &self.issuer, auth_time))
    }
}
