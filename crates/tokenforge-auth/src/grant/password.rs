//! Resource owner password credentials grant.
//!
//! The resource owner's credentials are verified before this grant runs.

use std::sync::Arc;

use uuid::Uuid;

use crate::AuthResult;
use crate::oauth::scope::match_scopes;
use crate::storage::TokenStorage;
use crate::token::{TokenGraphBuilder, TokenGraphRequest, TokenResponse};
use crate::types::{Client, Extension, GrantType};

/// Issues tokens directly to an authenticated resource owner.
pub struct PasswordGrant {
    tokens: Arc<dyn TokenStorage>,
    graph_builder: Arc<TokenGraphBuilder>,
    issuer: String,
}

impl PasswordGrant {
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

    /// Issues a token graph with a refresh token.
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
            GrantType::Password,
            client,
            resource_owner_id,
            requested_scopes,
        )
        .await
    }
}

/// Shared path for grants that issue straight to a resource owner.
pub(crate) async fn issue_to_owner(
    tokens: &Arc<dyn TokenStorage>,
    graph_builder: &TokenGraphBuilder,
    issuer: &str,
    grant_type: GrantType,
    client: &Client,
    resource_owner_id: Uuid,
    requested_scopes: &[String],
) -> AuthResult<TokenResponse> {
    let scopes = match_scopes(requested_scopes, &client.scopes)?;
    let extension = Extension::from_scopes(&scopes);

    let graph = graph_builder
        .build(TokenGraphRequest {
            grant_type,
            client_id: client.id,
            scopes,
            audience: vec![client.id],
            extension,
            lead_token_id: None,
        })
        .await?;

    tokens
        .link_resource_owner(resource_owner_id, graph.token.id)
        .await?;
    tokens.link_client(client.id, graph.token.id).await?;

    let auth_time = graph.token.created_at;
    Ok(TokenResponse::new(graph, issuer, auth_time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OAuthConfig;
    use crate::secret;
    use crate::storage::{AuthStores, InMemoryAuthStorage};
    use crate::token::TokenSettings;
    use crate::types::Scope;

    #[tokio::test]
    async fn test_password_grant_issues_refreshable_token() {
        let stores = AuthStores::from_backend(Arc::new(InMemoryAuthStorage::new(8)));
        let builder = Arc::new(TokenGraphBuilder::new(
            stores.tokens.clone(),
            stores.refresh_tokens.clone(),
            TokenSettings::from(&OAuthConfig::default()),
        ));
        let grant = PasswordGrant::new(stores.tokens.clone(), builder, "https://auth.example.com");
        let client = Client {
            id: Uuid::new_v4(),
            name: "app".to_string(),
            redirect_uri: None,
            scopes: vec![Scope::new("openid"), Scope::new("profile")],
            confidential: true,
        };
        let owner = Uuid::new_v4();

        let response = grant
            .issue(&client, owner, &["openid".to_string()])
            .await
            .unwrap();
        assert!(response.refresh_token.is_some());
        assert_eq!(response.extension, Extension::Identity);

        let token = stores
            .tokens
            .find_by_hash(&secret::hash(&response.access_token))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(token.grant_type, GrantType::Password);
        assert_eq!(token.scopes.len(), 1);
        assert_eq!(
            stores.tokens.find_resource_owner_id(token.id).await.unwrap(),
            Some(owner)
        );

        let err = grant
            .issue(&client, owner, &["email".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_scope");
    }
}
