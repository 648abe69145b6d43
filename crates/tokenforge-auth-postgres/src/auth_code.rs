//! Access requests, authorization codes and the code-to-token link.

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::types::Json;
use time::OffsetDateTime;
use tokenforge_auth::storage::{AuthCodeStorage, StorageResult};
use tokenforge_auth::types::{AccessRequest, AuthCode, AuthCodeRecord, Scope};
use url::Url;
use uuid::Uuid;

use crate::token::revoke_token_graphs;
use crate::{PostgresAuthStorage, backend_error, map_db_error};

type AuthCodeTuple = (Uuid, String, Uuid, OffsetDateTime, OffsetDateTime, bool);

type AccessRequestTuple = (
    Uuid,
    Uuid,
    Uuid,
    Json<Vec<Scope>>,
    Option<String>,
    OffsetDateTime,
);

fn auth_code_from_tuple(row: AuthCodeTuple) -> AuthCode {
    AuthCode {
        id: row.0,
        code_hash: row.1,
        access_request_id: row.2,
        created_at: row.3,
        expires_at: row.4,
        revoked: row.5,
    }
}

fn access_request_from_tuple(row: AccessRequestTuple) -> StorageResult<AccessRequest> {
    let redirect_uri = row
        .4
        .as_deref()
        .map(Url::parse)
        .transpose()
        .map_err(backend_error)?;

    Ok(AccessRequest {
        id: row.0,
        client_id: row.1,
        resource_owner_id: row.2,
        scopes: row.3.0,
        redirect_uri,
        created_at: row.5,
    })
}

#[async_trait]
impl AuthCodeStorage for PostgresAuthStorage {
    async fn insert_access_request(&self, access_request: &AccessRequest) -> StorageResult<()> {
        query(
            r#"
            INSERT INTO access_request (id, client_id, resource_owner_id, scopes, redirect_uri, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(access_request.id)
        .bind(access_request.client_id)
        .bind(access_request.resource_owner_id)
        .bind(Json(&access_request.scopes))
        .bind(access_request.redirect_uri.as_ref().map(Url::as_str))
        .bind(access_request.created_at)
        .execute(self.pool())
        .await
        .map_err(|e| map_db_error("access_request", e))?;
        Ok(())
    }

    async fn insert(&self, auth_code: &AuthCode) -> StorageResult<()> {
        query(
            r#"
            INSERT INTO auth_code (id, code_hash, access_request_id, created_at, expires_at, revoked)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(auth_code.id)
        .bind(&auth_code.code_hash)
        .bind(auth_code.access_request_id)
        .bind(auth_code.created_at)
        .bind(auth_code.expires_at)
        .bind(auth_code.revoked)
        .execute(self.pool())
        .await
        .map_err(|e| map_db_error("auth_code", e))?;
        Ok(())
    }

    async fn find_by_client_and_hash(
        &self,
        client_id: Uuid,
        code_hash: &str,
    ) -> StorageResult<Option<AuthCodeRecord>> {
        #[allow(clippy::type_complexity)]
        let row: Option<(
            Uuid,
            String,
            Uuid,
            OffsetDateTime,
            OffsetDateTime,
            bool,
            Uuid,
            Uuid,
            Json<Vec<Scope>>,
            Option<String>,
            OffsetDateTime,
        )> = query_as(
            r#"
            SELECT c.id, c.code_hash, c.access_request_id, c.created_at, c.expires_at, c.revoked,
                   r.client_id, r.resource_owner_id, r.scopes, r.redirect_uri, r.created_at
            FROM auth_code c
            JOIN access_request r ON r.id = c.access_request_id
            WHERE c.code_hash = $1
              AND r.client_id = $2
            "#,
        )
        .bind(code_hash)
        .bind(client_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_db_error("auth_code", e))?;

        row.map(|r| {
            let auth_code = auth_code_from_tuple((r.0, r.1, r.2, r.3, r.4, r.5));
            let access_request = access_request_from_tuple((r.2, r.6, r.7, r.8, r.9, r.10))?;
            Ok(AuthCodeRecord {
                auth_code,
                access_request,
            })
        })
        .transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<AuthCode>> {
        let row: Option<AuthCodeTuple> = query_as(
            r#"
            SELECT id, code_hash, access_request_id, created_at, expires_at, revoked
            FROM auth_code
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_db_error("auth_code", e))?;

        Ok(row.map(auth_code_from_tuple))
    }

    async fn link_token(&self, auth_code_id: Uuid, token_id: Uuid) -> StorageResult<()> {
        query("INSERT INTO auth_code_token (auth_code_id, token_id) VALUES ($1, $2)")
            .bind(auth_code_id)
            .bind(token_id)
            .execute(self.pool())
            .await
            .map_err(|e| map_db_error("auth_code_token", e))?;
        Ok(())
    }

    async fn revoke_lineage(
        &self,
        auth_code_id: Uuid,
        attempted_token_id: Uuid,
    ) -> StorageResult<()> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| map_db_error("auth_code", e))?;

        // Lock the refresh tokens first so a rotation in flight either
        // finishes before the lineage is read or sees them revoked.
        query(
            r#"
            SELECT r.id
            FROM refresh_token r
            WHERE r.token_id IN (SELECT token_id FROM auth_code_token WHERE auth_code_id = $1)
               OR r.token_id IN (
                   SELECT id
                   FROM token
                   WHERE lead_token_id IN (SELECT token_id FROM auth_code_token WHERE auth_code_id = $1)
               )
            FOR UPDATE
            "#,
        )
        .bind(auth_code_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_db_error("refresh_token", e))?;

        let lineage: Vec<(Uuid,)> = query_as(
            r#"
            SELECT id
            FROM token
            WHERE id = $2
               OR id IN (SELECT token_id FROM auth_code_token WHERE auth_code_id = $1)
               OR lead_token_id IN (SELECT token_id FROM auth_code_token WHERE auth_code_id = $1)
            "#,
        )
        .bind(auth_code_id)
        .bind(attempted_token_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_db_error("token", e))?;

        let token_ids: Vec<Uuid> = lineage.into_iter().map(|(id,)| id).collect();
        revoke_token_graphs(&mut tx, &token_ids, OffsetDateTime::now_utc()).await?;

        query("UPDATE auth_code SET revoked = TRUE WHERE id = $1")
            .bind(auth_code_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error("auth_code", e))?;

        tx.commit()
            .await
            .map_err(|e| map_db_error("auth_code", e))?;

        tracing::warn!(
            auth_code_id = %auth_code_id,
            revoked_tokens = token_ids.len(),
            "Revoked authorization code lineage"
        );
        Ok(())
    }
}
