//! Scope matching.
//!
//! Reconciles the scopes a caller asked for with the scopes a client or
//! token actually holds.

use crate::error::AuthError;
use crate::types::Scope;

/// Resolves requested scope names against the available scopes.
///
/// - No requested names grants every available scope.
/// - Otherwise every requested name must resolve to an available scope.
///   An unresolved name fails the whole request; nothing is dropped
///   silently.
///
/// Requested names are de-duplicated and the result keeps request order.
///
/// # Errors
///
/// Returns `AuthError::InvalidScope` naming the first unresolved scope.
pub fn match_scopes(requested: &[String], available: &[Scope]) -> Result<Vec<Scope>, AuthError> {
    if requested.is_empty() {
        return Ok(available.to_vec());
    }

    let mut matched: Vec<Scope> = Vec::with_capacity(requested.len());
    for name in requested {
        if matched.iter().any(|s| &s.name == name) {
            continue;
        }
        let scope = available
            .iter()
            .find(|s| &s.name == name)
            .ok_or_else(|| AuthError::invalid_scope(format!("scope '{name}' is not available")))?;
        matched.push(scope.clone());
    }
    Ok(matched)
}

/// Splits a space-delimited `scope` parameter into names.
#[must_use]
pub fn parse_scope_param(scope: Option<&str>) -> Vec<String> {
    scope
        .map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}
