//! Issuance configuration row.

use async_trait::async_trait;
use sqlx_core::query_as::query_as;
use tokenforge_auth::storage::{ConfigurationStorage, StorageError, StorageResult};
use tokenforge_auth::types::Configuration;
use uuid::Uuid;

use crate::{PostgresAuthStorage, backend_error, map_db_error};

type ConfigurationTuple = (Uuid, i64, i32);

fn from_tuple(row: ConfigurationTuple) -> StorageResult<Configuration> {
    Ok(Configuration {
        id: row.0,
        version: row.1,
        authorization_code_size: usize::try_from(row.2).map_err(backend_error)?,
    })
}

pub(crate) fn size_to_column(size: usize) -> StorageResult<i32> {
    i32::try_from(size).map_err(backend_error)
}

#[async_trait]
impl ConfigurationStorage for PostgresAuthStorage {
    async fn get(&self) -> StorageResult<Configuration> {
        let row: Option<ConfigurationTuple> = query_as(
            r#"
            SELECT id, version, authorization_code_size
            FROM configuration
            LIMIT 1
            "#,
        )
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_db_error("configuration", e))?;

        row.map(from_tuple)
            .transpose()?
            .ok_or_else(|| StorageError::not_found("configuration"))
    }

    async fn grow_authorization_code_size(
        &self,
        id: Uuid,
        size: usize,
    ) -> StorageResult<Configuration> {
        let row: Option<ConfigurationTuple> = query_as(
            r#"
            UPDATE configuration
            SET authorization_code_size = GREATEST(authorization_code_size, $2),
                version = version + 1
            WHERE id = $1
            RETURNING id, version, authorization_code_size
            "#,
        )
        .bind(id)
        .bind(size_to_column(size)?)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_db_error("configuration", e))?;

        let configuration = row
            .map(from_tuple)
            .transpose()?
            .ok_or_else(|| StorageError::not_found("configuration"))?;

        tracing::debug!(
            version = configuration.version,
            authorization_code_size = configuration.authorization_code_size,
            "Grew authorization code size"
        );
        Ok(configuration)
    }
}
