//! Implicit grant.
//!
//! Tokens are returned from the authorization endpoint and are never
//! paired with a refresh token.

use std::sync::Arc;

use uuid::Uuid;

use super::password::issue_to_owner;
use crate::AuthResult;
use crate::storage::TokenStorage;
use crate::token::{TokenGraphBuilder, TokenResponse};
use crate::types::{Client, GrantType};

pub struct ImplicitGrant {
    tokens: Arc<dyn TokenStorage>,
    graph_builder: Arc<TokenGraphBuilder>,
    issuer: String,
}

impl ImplicitGrant {
    #[must_use]
    pub fn new(
        tokens: Arc<dyn TokenStorage>,
        graph_builder: Arc<TokenGraphBuilder>,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            tokens,
            graph_builder,
            issuer: issuer.into(),
        }
    }

    /// Issues an access token without a refresh token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidScope` if a requested scope is not one of
    /// the client's.
    #[tracing::instrument(skip_all, fields(client_id = %client.id, resource_owner_id = %resource_owner_id))]
    pub async fn issue(
        &self,
        client: &Client,
        resource_owner_id: Uuid,
        requested_scopes: &[String],
    ) -> AuthResult<TokenResponse> {
        issue_to_owner(
            &self.tokens,
            &self.graph_builder,
            &self.issuer,
            GrantType::Token,
            client,
            resource_owner_id,
            requested_scopes,
        )
        .await
    }
}
