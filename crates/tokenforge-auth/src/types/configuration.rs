//! Persisted issuance configuration.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The single shared configuration row.
///
/// `authorization_code_size` is adaptive: the auth code issuer grows it when
/// generated codes collide. Every update bumps `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Row identifier.
    pub id: Uuid,
    /// Incremented on every update.
    pub version: i64,
    /// Number of characters in newly generated authorization codes.
    pub authorization_code_size: usize,
}
