//! Error mapping between sqlx and the grant engine's storage errors.

use tokenforge_auth::storage::{StorageError, keys};

/// Errors raised while setting up the backend.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// A schema migration failed.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A storage-level check failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Maps a unique constraint name to the logical key it guards.
///
/// Constraints without a logical key are reported under their own name.
fn logical_key(constraint: &str) -> &str {
    match constraint {
        "auth_code_code_hash_key" => keys::AUTH_CODE_HASH,
        "auth_code_token_auth_code_id_key" => keys::AUTH_CODE_TOKEN,
        "token_chain_refresh_token_id_key" => keys::TOKEN_CHAIN_REFRESH_TOKEN,
        "resource_owner_email_key" => keys::RESOURCE_OWNER_EMAIL,
        other => other,
    }
}

/// Converts an sqlx error raised while writing `entity`.
///
/// Unique violations become [`StorageError::Duplicate`] with the logical key
/// of the violated constraint. A foreign key violation means the referenced
/// row is missing and becomes [`StorageError::NotFound`]. Everything else is
/// a backend error.
pub fn map_db_error(entity: &str, e: sqlx_core::Error) -> StorageError {
    if let sqlx_core::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return StorageError::Duplicate {
                entity: entity.to_string(),
                key: db_err.constraint().map(|c| logical_key(c).to_string()),
            };
        }
        if db_err.is_foreign_key_violation() {
            return StorageError::not_found(db_err.constraint().unwrap_or(entity));
        }
    }
    tracing::error!(entity, error = %e, "Database operation failed");
    StorageError::backend(e.to_string())
}
