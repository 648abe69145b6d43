//! PostgreSQL storage backend for tokenforge-auth
//!
//! Implements every storage trait of the grant engine over one connection
//! pool:
//!
//! - The shared issuance configuration row
//! - Access requests, authorization codes and the code-to-token link
//! - Access tokens, refresh tokens and the token chain
//! - Welcome and password reset nonces
//! - Resource owners, profiles and addresses
//!
//! Uniqueness is enforced by named constraints in the embedded schema. A
//! violation is reported as [`StorageError::Duplicate`] carrying the logical
//! key the constraint guards, see [`error`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tokenforge_auth::storage::AuthStores;
//! use tokenforge_auth_postgres::PostgresAuthStorage;
//!
//! let storage = PostgresAuthStorage::connect("postgres://localhost/tokenforge").await?;
//! storage.migrate().await?;
//! storage.ensure_configuration(32).await?;
//!
//! let stores = AuthStores::from_backend(Arc::new(storage));
//! ```

pub mod auth_code;
pub mod configuration;
pub mod error;
pub mod migrations;
pub mod nonce;
pub mod resource_owner;
pub mod token;

use std::sync::Arc;

use sqlx_core::pool::Pool;
use sqlx_postgres::Postgres;

pub use error::{PostgresError, map_db_error};
use tokenforge_auth::storage::StorageError;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

/// PostgreSQL storage backend for the grant engine.
#[derive(Debug, Clone)]
pub struct PostgresAuthStorage {
    pool: Arc<PgPool>,
}

impl PostgresAuthStorage {
    /// Create new storage with an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create new storage by connecting to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(database_url: &str) -> Result<Self, PostgresError> {
        use sqlx_core::pool::PoolOptions;
        let pool = PoolOptions::<Postgres>::new().connect(database_url).await?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails to execute.
    pub async fn migrate(&self) -> Result<(), PostgresError> {
        migrations::run(&self.pool).await
    }

    /// Seeds the configuration row if the table is empty.
    ///
    /// An existing row is left untouched, including a code size that has
    /// grown past `authorization_code_size`.
    ///
    /// # Errors
    ///
    /// Returns an error if the size does not fit the column or the insert fails.
    pub async fn ensure_configuration(
        &self,
        authorization_code_size: usize,
    ) -> Result<(), PostgresError> {
        let size = configuration::size_to_column(authorization_code_size)?;
        let inserted = sqlx_core::query::query(
            r#"
            INSERT INTO configuration (id, version, authorization_code_size)
            SELECT $1, 1, $2
            WHERE NOT EXISTS (SELECT 1 FROM configuration)
            "#,
        )
        .bind(uuid::Uuid::new_v4())
        .bind(size)
        .execute(self.pool())
        .await?
        .rows_affected();

        if inserted > 0 {
            tracing::info!(authorization_code_size, "Seeded issuance configuration");
        }
        Ok(())
    }
}

/// Shorthand for a backend failure outside of a uniqueness violation.
pub(crate) fn backend_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::backend(e.to_string())
}
