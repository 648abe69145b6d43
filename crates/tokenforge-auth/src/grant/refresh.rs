//! Refresh token grant.
//!
//! Each refresh token can be redeemed once. A successful redemption appends
//! one token chain row `(next, previous, refresh_token)`; the chain's
//! refresh token column is unique, so a replayed refresh token fails to
//! append and is reported as compromised.
//!
//! Every rotated token points at its lead token, the code or password
//! grant token that started the chain, so the origin of a credential line
//! is one lookup away at any depth.

use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::error::{AuthError, ErrorCode};
use crate::oauth::scope::match_scopes;
use crate::secret;
use crate::storage::{RefreshTokenStorage, StorageError, TokenChainStorage, TokenStorage, keys};
use crate::token::{TokenGraphBuilder, TokenGraphRequest, TokenResponse};
use crate::types::{Client, Extension, GrantType, Scope, Token, TokenChain};

/// Token request parameters for the refresh grant.
#[derive(Debug, Clone)]
pub struct RefreshGrantRequest {
    pub refresh_token: String,
    /// Requested scope names; empty keeps the original grant's scopes.
    pub scopes: Vec<String>,
}

/// What a rotation needs to know about the token being replaced.
#[derive(Debug, Clone)]
pub struct Rotation {
    pub client_id: Uuid,
    pub resource_owner_id: Uuid,
    pub previous_token_id: Uuid,
    pub refresh_token_id: Uuid,
    pub lead_token: Token,
    pub scopes: Vec<Scope>,
    pub audience: Vec<Uuid>,
}

/// Returns the id of the token at the root of `token`'s rotation chain.
///
/// A token issued by the refresh grant carries the pointer; any other token
/// is its own root.
#[must_use]
pub fn lead_token_id(token: &Token) -> Uuid {
    match token.grant_type {
        GrantType::Refresh => token.lead_token_id.unwrap_or(token.id),
        _ => token.id,
    }
}

/// Rotates refresh tokens.
pub struct RefreshGrant {
    tokens: Arc<dyn TokenStorage>,
    refresh_tokens: Arc<dyn RefreshTokenStorage>,
    token_chains: Arc<dyn TokenChainStorage>,
    graph_builder: Arc<TokenGraphBuilder>,
    issuer: String,
}

impl RefreshGrant {
    #[must_use]
    pub fn new(
        tokens: Arc<dyn TokenStorage>,
        refresh_tokens: Arc<dyn RefreshTokenStorage>,
        token_chains: Arc<dyn TokenChainStorage>,
        graph_builder: Arc<TokenGraphBuilder>,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            tokens,
            refresh_tokens,
            token_chains,
            graph_builder,
            issuer: issuer.into(),
        }
    }

    /// Handles a token request carrying a refresh token.
    ///
    /// # Errors
    ///
    /// - `AuthError::NotFound` (`RefreshTokenNotFound`) if the refresh token
    ///   is unknown for this client, expired, revoked, or has no resource
    ///   owner or lead token behind it
    /// - `AuthError::InvalidScope` if a requested scope was not in the
    ///   original grant
    /// - `AuthError::CompromisedRefreshToken` if it was already redeemed
    #[tracing::instrument(skip_all, fields(client_id = %client.id))]
    pub async fn request(
        &self,
        client: &Client,
        request: &RefreshGrantRequest,
    ) -> AuthResult<TokenResponse> {
        let token_hash = secret::hash(&request.refresh_token);
        let record = self
            .refresh_tokens
            .find_by_client_and_hash(client.id, &token_hash)
            .await?
            .ok_or_else(|| refresh_token_not_found("refresh token was not found"))?;

        if !record.refresh_token.is_valid() {
            return Err(refresh_token_not_found("refresh token is expired or revoked"));
        }

        let scopes = match_scopes(&request.scopes, &record.token.scopes)?;

        let resource_owner_id = self
            .tokens
            .find_resource_owner_id(record.token.id)
            .await?
            .ok_or_else(|| {
                refresh_token_not_found("no resource owner was associated to refresh token")
            })?;

        let lead_id = lead_token_id(&record.token);
        let lead_token = if lead_id == record.token.id {
            record.token.clone()
        } else {
            self.tokens
                .find_by_id(lead_id)
                .await?
                .ok_or_else(|| refresh_token_not_found("lead token was not found"))?
        };

        self.rotate(Rotation {
            client_id: client.id,
            resource_owner_id,
            previous_token_id: record.token.id,
            refresh_token_id: record.refresh_token.id,
            lead_token,
            audience: record.token.audience,
            scopes,
        })
        .await
    }

    /// Builds the successor graph and appends the chain row.
    ///
    /// `auth_time` of the response is the creation time of the lead token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::CompromisedRefreshToken` if the refresh token
    /// already produced a chain row. The graph built by this attempt is
    /// revoked first so no credential chain can reach it.
    ///
    /// Returns `AuthError::NotFound` (`RefreshTokenNotFound`) if the refresh
    /// token was revoked after it was looked up. The built graph is revoked
    /// as well.
    pub async fn rotate(&self, rotation: Rotation) -> AuthResult<TokenResponse> {
        let extension = Extension::from_scopes(&rotation.scopes);
        let graph = self
            .graph_builder
            .build(TokenGraphRequest {
                grant_type: GrantType::Refresh,
                client_id: rotation.client_id,
                scopes: rotation.scopes,
                audience: rotation.audience,
                extension,
                lead_token_id: Some(rotation.lead_token.id),
            })
            .await?;

        let chain = TokenChain {
            id: Uuid::new_v4(),
            next_token_id: graph.token.id,
            previous_token_id: rotation.previous_token_id,
            refresh_token_id: rotation.refresh_token_id,
            created_at: OffsetDateTime::now_utc(),
        };

        if let Err(err) = self.token_chains.insert(&chain).await {
            if matches!(err, StorageError::NotFound { .. }) {
                tracing::warn!(
                    refresh_token_id = %rotation.refresh_token_id,
                    client_id = %rotation.client_id,
                    "Refresh token was revoked during rotation"
                );
                self.tokens.revoke_graph(graph.token.id).await?;
                return Err(refresh_token_not_found("refresh token was revoked"));
            }
            if !err.is_duplicate_on(keys::TOKEN_CHAIN_REFRESH_TOKEN) {
                return Err(err.into());
            }
            tracing::warn!(
                refresh_token_id = %rotation.refresh_token_id,
                client_id = %rotation.client_id,
                "Refresh token was already used"
            );
            self.tokens.revoke_graph(graph.token.id).await?;
            return Err(AuthError::CompromisedRefreshToken {
                refresh_token_id: rotation.refresh_token_id,
            });
        }

        self.tokens
            .link_resource_owner(rotation.resource_owner_id, graph.token.id)
            .await?;
        self.tokens
            .link_client(rotation.client_id, graph.token.id)
            .await?;

        Ok(TokenResponse::new(
            graph,
            &self.issuer,
            rotation.lead_token.created_at,
        ))
    }
}

fn refresh_token_not_found(message: &str) -> AuthError {
    AuthError::not_found(message, ErrorCode::RefreshTokenNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OAuthConfig;
    use crate::storage::{AuthStores, InMemoryAuthStorage};
    use crate::token::{TokenGraph, TokenSettings};

    struct Fixture {
        stores: AuthStores,
        builder: Arc<TokenGraphBuilder>,
        grant: RefreshGrant,
        client: Client,
        resource_owner_id: Uuid,
    }

    fn fixture() -> Fixture {
        let stores = AuthStores::from_backend(Arc::new(InMemoryAuthStorage::new(16)));
        let builder = Arc::new(TokenGraphBuilder::new(
            stores.tokens.clone(),
            stores.refresh_tokens.clone(),
            TokenSettings::from(&OAuthConfig::default()),
        ));
        let grant = RefreshGrant::new(
            stores.tokens.clone(),
            stores.refresh_tokens.clone(),
            stores.token_chains.clone(),
            builder.clone(),
            "https://auth.example.com",
        );
        let client = Client {
            id: Uuid::new_v4(),
            name: "app".to_string(),
            redirect_uri: None,
            scopes: vec![Scope::new("openid"), Scope::new("profile"), Scope::new("email")],
            confidential: true,
        };
        Fixture {
            stores,
            builder,
            grant,
            client,
            resource_owner_id: Uuid::new_v4(),
        }
    }

    async fn original_grant(f: &Fixture) -> TokenGraph {
        let graph = f
            .builder
            .build(TokenGraphRequest {
                grant_type: GrantType::Password,
                client_id: f.client.id,
                scopes: f.client.scopes.clone(),
                audience: vec![f.client.id],
                extension: Extension::Identity,
                lead_token_id: None,
            })
            .await
            .unwrap();
        f.stores
            .tokens
            .link_resource_owner(f.resource_owner_id, graph.token.id)
            .await
            .unwrap();
        graph
    }

    fn refresh(plaintext: &str, scopes: &[&str]) -> RefreshGrantRequest {
        RefreshGrantRequest {
            refresh_token: plaintext.to_string(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_lead_token_id_resolution() {
        let original = Token {
            id: Uuid::new_v4(),
            token_hash: String::new(),
            grant_type: GrantType::Code,
            client_id: Uuid::new_v4(),
            lead_token_id: None,
            scopes: vec![],
            audience: vec![],
            extension: Extension::OAuth2,
            seconds_to_expiration: 0,
            created_at: OffsetDateTime::now_utc(),
            expires_at: OffsetDateTime::now_utc(),
            revoked: false,
        };
        assert_eq!(lead_token_id(&original), original.id);

        let rotated = Token {
            id: Uuid::new_v4(),
            grant_type: GrantType::Refresh,
            lead_token_id: Some(original.id),
            ..original.clone()
        };
        assert_eq!(lead_token_id(&rotated), original.id);
    }

    #[tokio::test]
    async fn test_rotation_appends_chain_row() {
        let f = fixture();
        let original = original_grant(&f).await;
        let plaintext = original.plaintext_refresh_token.clone().unwrap();

        let response = f
            .grant
            .request(&f.client, &refresh(&plaintext, &[]))
            .await
            .unwrap();
        assert_eq!(response.extension, Extension::Identity);
        assert_eq!(
            response.token_claims.auth_time,
            original.token.created_at.unix_timestamp()
        );

        let refresh_token_id = original.refresh_token.unwrap().id;
        let chain = f
            .stores
            .token_chains
            .find_by_refresh_token(refresh_token_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(chain.previous_token_id, original.token.id);

        let next = f
            .stores
            .tokens
            .find_by_id(chain.next_token_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.grant_type, GrantType::Refresh);
        assert_eq!(next.lead_token_id, Some(original.token.id));
        assert_eq!(next.scopes, original.token.scopes);
        assert_eq!(
            f.stores.tokens.find_resource_owner_id(next.id).await.unwrap(),
            Some(f.resource_owner_id)
        );
    }

    #[tokio::test]
    async fn test_unknown_refresh_token_is_invalid_grant() {
        let f = fixture();
        let err = f
            .grant
            .request(&f.client, &refresh("missing", &[]))
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
        assert_eq!(err.error_code(), ErrorCode::RefreshTokenNotFound);
    }

    #[tokio::test]
    async fn test_revoked_refresh_token_is_invalid_grant() {
        let f = fixture();
        let original = original_grant(&f).await;
        f.stores.tokens.revoke_graph(original.token.id).await.unwrap();

        let err = f
            .grant
            .request(
                &f.client,
                &refresh(original.plaintext_refresh_token.as_deref().unwrap(), &[]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::RefreshTokenNotFound);
    }

    #[tokio::test]
    async fn test_refresh_token_without_owner_is_not_found() {
        let f = fixture();
        let orphan = f
            .builder
            .build(TokenGraphRequest {
                grant_type: GrantType::Code,
                client_id: f.client.id,
                scopes: vec![],
                audience: vec![f.client.id],
                extension: Extension::OAuth2,
                lead_token_id: None,
            })
            .await
            .unwrap();

        let err = f
            .grant
            .request(
                &f.client,
                &refresh(orphan.plaintext_refresh_token.as_deref().unwrap(), &[]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::RefreshTokenNotFound);
    }

    #[tokio::test]
    async fn test_broadening_scope_is_rejected() {
        let f = fixture();
        let original = f
            .builder
            .build(TokenGraphRequest {
                grant_type: GrantType::Code,
                client_id: f.client.id,
                scopes: vec![Scope::new("profile")],
                audience: vec![f.client.id],
                extension: Extension::OAuth2,
                lead_token_id: None,
            })
            .await
            .unwrap();
        f.stores
            .tokens
            .link_resource_owner(f.resource_owner_id, original.token.id)
            .await
            .unwrap();

        let err = f
            .grant
            .request(
                &f.client,
                &refresh(
                    original.plaintext_refresh_token.as_deref().unwrap(),
                    &["profile", "email"],
                ),
            )
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_scope");

        // Rejected before anything was written; the refresh token is still usable.
        let ok = f
            .grant
            .request(
                &f.client,
                &refresh(original.plaintext_refresh_token.as_deref().unwrap(), &[]),
            )
            .await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn test_replayed_rotation_revokes_the_orphan_graph() {
        let f = fixture();
        let original = original_grant(&f).await;
        let plaintext = original.plaintext_refresh_token.clone().unwrap();

        f.grant
            .request(&f.client, &refresh(&plaintext, &[]))
            .await
            .unwrap();
        let err = f
            .grant
            .request(&f.client, &refresh(&plaintext, &[]))
            .await
            .unwrap_err();

        assert!(err.is_compromise());
        assert_eq!(err.error_code(), ErrorCode::CompromisedRefreshToken);
        assert_eq!(err.oauth_error_code(), "invalid_grant");
    }

    #[tokio::test]
    async fn test_rotation_of_refresh_token_revoked_mid_flight_fails() {
        let f = fixture();
        let original = original_grant(&f).await;
        let refresh_token_id = original.refresh_token.as_ref().unwrap().id;

        // Revoked after the grant looked it up but before the chain insert.
        f.stores.tokens.revoke_graph(original.token.id).await.unwrap();

        let err = f
            .grant
            .rotate(Rotation {
                client_id: f.client.id,
                resource_owner_id: f.resource_owner_id,
                previous_token_id: original.token.id,
                refresh_token_id,
                lead_token: original.token.clone(),
                scopes: original.token.scopes.clone(),
                audience: original.token.audience.clone(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::RefreshTokenNotFound);
        assert!(
            f.stores
                .token_chains
                .find_by_refresh_token(refresh_token_id)
                .await
                .unwrap()
                .is_none()
        );
    }
}
