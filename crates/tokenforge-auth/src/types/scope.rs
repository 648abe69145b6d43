//! Scope domain type.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named permission unit such as `profile`, `email` or `address`.
///
/// Clients and tokens each hold a many-to-many association to scopes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// Unique identifier of the scope.
    pub id: Uuid,
    /// The scope name as it appears in requests.
    pub name: String,
}

impl Scope {
    /// Creates a scope with a fresh identifier.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// Returns `true` if any scope in `scopes` is named `name`.
#[must_use]
pub fn has_scope(scopes: &[Scope], name: &str) -> bool {
    scopes.iter().any(|s| s.name == name)
}

/// Joins scope names into the space-separated form used on the wire.
#[must_use]
pub fn join_names(scopes: &[Scope]) -> String {
    scopes
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
