//! OAuth 2.0 client type.
//!
//! Client authentication happens before the grant engine is invoked; the
//! engine only reads the client's identity and its permitted scopes.

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use super::scope::Scope;

/// An authenticated OAuth 2.0 client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// Unique client identifier.
    pub id: Uuid,

    /// Human-readable client name.
    pub name: String,

    /// Registered redirect URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<Url>,

    /// Scopes this client may request.
    #[serde(default)]
    pub scopes: Vec<Scope>,

    /// Whether the client holds a secret (confidential) or not (public).
    pub confidential: bool,
}
