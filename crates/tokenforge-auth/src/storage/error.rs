//! Storage error type.

/// Errors reported by storage backends.
///
/// Backends must report a uniqueness violation as [`StorageError::Duplicate`]
/// with the logical key that was violated, never as a generic backend error.
/// The grant engine relies on the key to tell a code collision apart from
/// credential reuse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The addressed record does not exist.
    #[error("{entity} not found")]
    NotFound {
        /// Entity name, e.g. `auth_code`.
        entity: String,
    },

    /// An insert violated a uniqueness constraint.
    #[error("duplicate {entity}, key: {}", key.as_deref().unwrap_or("unknown"))]
    Duplicate {
        /// Entity name, e.g. `token_chain`.
        entity: String,
        /// Logical key that was violated, when the backend can tell.
        key: Option<String>,
    },

    /// Any other backend failure.
    #[error("storage backend error: {message}")]
    Backend { message: String },
}

impl StorageError {
    #[must_use]
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
        }
    }

    #[must_use]
    pub fn duplicate(entity: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Duplicate {
            entity: entity.into(),
            key: Some(key.into()),
        }
    }

    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a uniqueness violation on `key`.
    #[must_use]
    pub fn is_duplicate_on(&self, key: &str) -> bool {
        matches!(self, Self::Duplicate { key: Some(k), .. } if k == key)
    }

    /// Returns `true` if this is any uniqueness violation.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
