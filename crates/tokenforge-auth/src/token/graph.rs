//! Token graph assembly.
//!
//! A token graph is everything one issuance persists: the access token with
//! its scope and audience associations and, for grants that rotate, a
//! refresh token. Every grant path builds its credentials here.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::config::OAuthConfig;
use crate::secret;
use crate::storage::{RefreshTokenStorage, TokenStorage};
use crate::types::{Extension, GrantType, RefreshToken, Scope, Token, expires_after};

/// Secret sizes and lifetimes used when building graphs.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub access_token_size: usize,
    pub access_token_lifetime: Duration,
    pub refresh_token_size: usize,
    pub refresh_token_lifetime: Duration,
}

impl From<&OAuthConfig> for TokenSettings {
    fn from(config: &OAuthConfig) -> Self {
        Self {
            access_token_size: config.access_token_size,
            access_token_lifetime: config.access_token_lifetime,
            refresh_token_size: config.refresh_token_size,
            refresh_token_lifetime: config.refresh_token_lifetime,
        }
    }
}

/// What to build.
#[derive(Debug, Clone)]
pub struct TokenGraphRequest {
    pub grant_type: GrantType,
    pub client_id: Uuid,
    pub scopes: Vec<Scope>,
    pub audience: Vec<Uuid>,
    pub extension: Extension,
    /// Root of the rotation chain, for refresh grants.
    pub lead_token_id: Option<Uuid>,
}

/// The records persisted by one issuance, with the plaintext secrets.
///
/// The plaintexts exist only here; storage holds their hashes.
#[derive(Debug, Clone)]
pub struct TokenGraph {
    pub token: Token,
    pub plaintext_token: String,
    pub refresh_token: Option<RefreshToken>,
    pub plaintext_refresh_token: Option<String>,
}

/// Builds and persists token graphs.
pub struct TokenGraphBuilder {
    tokens: Arc<dyn TokenStorage>,
    refresh_tokens: Arc<dyn RefreshTokenStorage>,
    settings: TokenSettings,
}

impl TokenGraphBuilder {
    #[must_use]
    pub fn new(
        tokens: Arc<dyn TokenStorage>,
        refresh_tokens: Arc<dyn RefreshTokenStorage>,
        settings: TokenSettings,
    ) -> Self {
        Self {
            tokens,
            refresh_tokens,
            settings,
        }
    }

    /// Persists a new token graph.
    ///
    /// A refresh token is created unless the grant type is implicit. The
    /// writes are not rolled back if a later one fails; an unlinked graph is
    /// inert and ages out through its own expiry.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if a write fails and
    /// `AuthError::Configuration` if a lifetime is out of range.
    pub async fn build(&self, request: TokenGraphRequest) -> AuthResult<TokenGraph> {
        let now = OffsetDateTime::now_utc();
        let expires_at = expires_after(now, self.settings.access_token_lifetime)?;

        let plaintext_token = secret::generate(self.settings.access_token_size);
        let token = Token {
            id: Uuid::new_v4(),
            token_hash: secret::hash(&plaintext_token),
            grant_type: request.grant_type,
            client_id: request.client_id,
            lead_token_id: request.lead_token_id,
            scopes: request.scopes,
            audience: request.audience,
            extension: request.extension,
            seconds_to_expiration: (expires_at - now).whole_seconds(),
            created_at: now,
            expires_at,
            revoked: false,
        };
        self.tokens.insert(&token).await?;

        let (refresh_token, plaintext_refresh_token) = if token.grant_type.issues_refresh_token()
        {
            let refresh_expires_at = expires_after(now, self.settings.refresh_token_lifetime)?;
            let plaintext = secret::generate(self.settings.refresh_token_size);
            let refresh_token = RefreshToken {
                id: Uuid::new_v4(),
                token_id: token.id,
                token_hash: secret::hash(&plaintext),
                created_at: now,
                expires_at: refresh_expires_at,
                revoked: false,
            };
            self.refresh_tokens.insert(&refresh_token).await?;
            (Some(refresh_token), Some(plaintext))
        } else {
            (None, None)
        };

        tracing::debug!(
            token_id = %token.id,
            grant_type = %token.grant_type,
            client_id = %token.client_id,
            refresh = refresh_token.is_some(),
            "Built token graph"
        );

        Ok(TokenGraph {
            token,
            plaintext_token,
            refresh_token,
            plaintext_refresh_token,
        })
    }
}
