//! Token endpoint response.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::graph::TokenGraph;
use crate::types::Extension;

/// Token type of every issued access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Bearer,
}

/// The claim set an identity token is built from.
///
/// Timestamps are Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub issuer: String,
    pub audience: Vec<Uuid>,
    pub issued_at: i64,
    pub expires_at: i64,
    /// When the resource owner authenticated. For rotated tokens this is
    /// the creation time of the lead token.
    pub auth_time: i64,
}

/// A successful grant.
///
/// The plaintext secrets are handed out here and nowhere else.
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    pub token_type: TokenType,

    /// Seconds until the access token expires.
    pub expires_in: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    #[serde(skip)]
    pub extension: Extension,

    #[serde(skip)]
    pub token_claims: TokenClaims,
}

impl TokenResponse {
    /// Builds the response for a freshly built graph.
    #[must_use]
    pub fn new(graph: TokenGraph, issuer: &str, auth_time: OffsetDateTime) -> Self {
        let token = graph.token;
        Self {
            access_token: graph.plaintext_token,
            refresh_token: graph.plaintext_refresh_token,
            token_type: TokenType::Bearer,
            expires_in: token.seconds_to_expiration,
            id_token: None,
            extension: token.extension,
            token_claims: TokenClaims {
                issuer: issuer.to_string(),
                audience: token.audience,
                issued_at: token.created_at.unix_timestamp(),
                expires_at: token.expires_at.unix_timestamp(),
                auth_time: auth_time.unix_timestamp(),
            },
        }
    }
}
