//! Welcome and password reset nonces.

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use tokenforge_auth::storage::{NonceStorage, StorageError, StorageResult};
use tokenforge_auth::types::{Nonce, NonceType};
use uuid::Uuid;

use crate::{PostgresAuthStorage, backend_error, map_db_error};

type NonceTuple = (
    Uuid,
    Uuid,
    String,
    String,
    bool,
    bool,
    OffsetDateTime,
    OffsetDateTime,
);

fn from_tuple(row: NonceTuple) -> StorageResult<Nonce> {
    Ok(Nonce {
        id: row.0,
        resource_owner_id: row.1,
        nonce_type: row.2.parse::<NonceType>().map_err(backend_error)?,
        nonce_hash: row.3,
        spent: row.4,
        revoked: row.5,
        created_at: row.6,
        expires_at: row.7,
    })
}

#[async_trait]
impl NonceStorage for PostgresAuthStorage {
    async fn insert(&self, nonce: &Nonce) -> StorageResult<()> {
        query(
            r#"
            INSERT INTO nonce (id, resource_owner_id, nonce_type, nonce_hash, spent, revoked, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(nonce.id)
        .bind(nonce.resource_owner_id)
        .bind(nonce.nonce_type.as_str())
        .bind(&nonce.nonce_hash)
        .bind(nonce.spent)
        .bind(nonce.revoked)
        .bind(nonce.created_at)
        .bind(nonce.expires_at)
        .execute(self.pool())
        .await
        .map_err(|e| map_db_error("nonce", e))?;
        Ok(())
    }

    async fn find_by_type_and_hash(
        &self,
        nonce_type: NonceType,
        nonce_hash: &str,
    ) -> StorageResult<Option<Nonce>> {
        let row: Option<NonceTuple> = query_as(
            r#"
            SELECT id, resource_owner_id, nonce_type, nonce_hash, spent, revoked, created_at, expires_at
            FROM nonce
            WHERE nonce_type = $1
              AND nonce_hash = $2
            "#,
        )
        .bind(nonce_type.as_str())
        .bind(nonce_hash)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_db_error("nonce", e))?;

        row.map(from_tuple).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Nonce>> {
        let row: Option<NonceTuple> = query_as(
            r#"
            SELECT id, resource_owner_id, nonce_type, nonce_hash, spent, revoked, created_at, expires_at
            FROM nonce
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_db_error("nonce", e))?;

        row.map(from_tuple).transpose()
    }

    async fn mark_spent(&self, id: Uuid) -> StorageResult<bool> {
        let spent = query(
            r#"
            UPDATE nonce
            SET spent = TRUE
            WHERE id = $1
              AND NOT spent
              AND NOT revoked
            "#,
        )
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(|e| map_db_error("nonce", e))?
        .rows_affected();

        if spent > 0 {
            return Ok(true);
        }

        // Nothing updated: either already used up or not there at all.
        let exists: Option<(Uuid,)> = query_as("SELECT id FROM nonce WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_db_error("nonce", e))?;
        match exists {
            Some(_) => Ok(false),
            None => Err(StorageError::not_found("nonce")),
        }
    }

    async fn revoke_unspent(
        &self,
        resource_owner_id: Uuid,
        nonce_type: NonceType,
        keep_id: Uuid,
    ) -> StorageResult<u64> {
        let revoked = query(
            r#"
            UPDATE nonce
            SET revoked = TRUE
            WHERE resource_owner_id = $1
              AND nonce_type = $2
              AND id <> $3
              AND NOT spent
              AND NOT revoked
            "#,
        )
        .bind(resource_owner_id)
        .bind(nonce_type.as_str())
        .bind(keep_id)
        .execute(self.pool())
        .await
        .map_err(|e| map_db_error("nonce", e))?
        .rows_affected();

        Ok(revoked)
    }
}
