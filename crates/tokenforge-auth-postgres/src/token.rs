//! Access tokens, refresh tokens and the token chain.
//!
//! Tokens are never deleted. Revoking a token flips `revoked` on it and its
//! refresh token and pulls `expires_at` forward to the revocation time.

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::types::Json;
use sqlx_postgres::PgConnection;
use time::OffsetDateTime;
use tokenforge_auth::storage::{
    RefreshTokenStorage, StorageError, StorageResult, TokenChainStorage, TokenStorage,
};
use tokenforge_auth::types::{
    Extension, GrantType, RefreshToken, RefreshTokenRecord, Scope, Token, TokenChain,
};
use uuid::Uuid;

use crate::{PostgresAuthStorage, backend_error, map_db_error};

const TOKEN_COLUMNS: &str = "id, token_hash, grant_type, client_id, lead_token_id, scopes, \
     audience, extension, seconds_to_expiration, created_at, expires_at, revoked";

type TokenTuple = (
    Uuid,
    String,
    String,
    Uuid,
    Option<Uuid>,
    Json<Vec<Scope>>,
    Vec<Uuid>,
    String,
    i64,
    OffsetDateTime,
    OffsetDateTime,
    bool,
);

type RefreshTokenTuple = (Uuid, Uuid, String, OffsetDateTime, OffsetDateTime, bool);

type TokenChainTuple = (Uuid, Uuid, Uuid, Uuid, OffsetDateTime);

fn token_from_tuple(row: TokenTuple) -> StorageResult<Token> {
    Ok(Token {
        id: row.0,
        token_hash: row.1,
        grant_type: row.2.parse::<GrantType>().map_err(backend_error)?,
        client_id: row.3,
        lead_token_id: row.4,
        scopes: row.5.0,
        audience: row.6,
        extension: row.7.parse::<Extension>().map_err(backend_error)?,
        seconds_to_expiration: row.8,
        created_at: row.9,
        expires_at: row.10,
        revoked: row.11,
    })
}

fn refresh_token_from_tuple(row: RefreshTokenTuple) -> RefreshToken {
    RefreshToken {
        id: row.0,
        token_id: row.1,
        token_hash: row.2,
        created_at: row.3,
        expires_at: row.4,
        revoked: row.5,
    }
}

fn token_chain_from_tuple(row: TokenChainTuple) -> TokenChain {
    TokenChain {
        id: row.0,
        next_token_id: row.1,
        previous_token_id: row.2,
        refresh_token_id: row.3,
        created_at: row.4,
    }
}

/// Revokes tokens and their refresh tokens on an open connection.
///
/// Returns the number of token rows touched.
pub(crate) async fn revoke_token_graphs(
    conn: &mut PgConnection,
    token_ids: &[Uuid],
    now: OffsetDateTime,
) -> StorageResult<u64> {
    if token_ids.is_empty() {
        return Ok(0);
    }

    let revoked = query(
        r#"
        UPDATE token
        SET revoked = TRUE,
            expires_at = LEAST(expires_at, $2)
        WHERE id = ANY($1)
        "#,
    )
    .bind(token_ids)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_db_error("token", e))?
    .rows_affected();

    query("UPDATE refresh_token SET revoked = TRUE WHERE token_id = ANY($1)")
        .bind(token_ids)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_db_error("refresh_token", e))?;

    Ok(revoked)
}

impl PostgresAuthStorage {
    async fn find_token_where(
        &self,
        predicate: &str,
        bind: BindValue<'_>,
    ) -> StorageResult<Option<Token>> {
        let sql = format!("SELECT {TOKEN_COLUMNS} FROM token WHERE {predicate}");
        let q = query_as::<_, TokenTuple>(&sql);
        let q = match bind {
            BindValue::Id(id) => q.bind(id),
            BindValue::Hash(hash) => q.bind(hash),
        };
        let row = q
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_db_error("token", e))?;

        row.map(token_from_tuple).transpose()
    }
}

enum BindValue<'a> {
    Id(Uuid),
    Hash(&'a str),
}

#[async_trait]
impl TokenStorage for PostgresAuthStorage {
    async fn insert(&self, token: &Token) -> StorageResult<()> {
        let sql = format!(
            "INSERT INTO token ({TOKEN_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        );
        query(&sql)
            .bind(token.id)
            .bind(&token.token_hash)
            .bind(token.grant_type.as_str())
            .bind(token.client_id)
            .bind(token.lead_token_id)
            .bind(Json(&token.scopes))
            .bind(&token.audience)
            .bind(token.extension.as_str())
            .bind(token.seconds_to_expiration)
            .bind(token.created_at)
            .bind(token.expires_at)
            .bind(token.revoked)
            .execute(self.pool())
            .await
            .map_err(|e| map_db_error("token", e))?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Token>> {
        self.find_token_where("id = $1", BindValue::Id(id)).await
    }

    async fn find_by_hash(&self, token_hash: &str) -> StorageResult<Option<Token>> {
        self.find_token_where("token_hash = $1", BindValue::Hash(token_hash))
            .await
    }

    async fn link_resource_owner(
        &self,
        resource_owner_id: Uuid,
        token_id: Uuid,
    ) -> StorageResult<()> {
        query("INSERT INTO resource_owner_token (resource_owner_id, token_id) VALUES ($1, $2)")
            .bind(resource_owner_id)
            .bind(token_id)
            .execute(self.pool())
            .await
            .map_err(|e| map_db_error("resource_owner_token", e))?;
        Ok(())
    }

    async fn link_client(&self, client_id: Uuid, token_id: Uuid) -> StorageResult<()> {
        query("INSERT INTO client_token (client_id, token_id) VALUES ($1, $2)")
            .bind(client_id)
            .bind(token_id)
            .execute(self.pool())
            .await
            .map_err(|e| map_db_error("client_token", e))?;
        Ok(())
    }

    async fn find_resource_owner_id(&self, token_id: Uuid) -> StorageResult<Option<Uuid>> {
        let row: Option<(Uuid,)> =
            query_as("SELECT resource_owner_id FROM resource_owner_token WHERE token_id = $1")
                .bind(token_id)
                .fetch_optional(self.pool())
                .await
                .map_err(|e| map_db_error("resource_owner_token", e))?;
        Ok(row.map(|(id,)| id))
    }

    async fn revoke_graph(&self, token_id: Uuid) -> StorageResult<()> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| map_db_error("token", e))?;

        let revoked = revoke_token_graphs(&mut tx, &[token_id], OffsetDateTime::now_utc()).await?;
        if revoked == 0 {
            return Err(StorageError::not_found("token"));
        }

        tx.commit().await.map_err(|e| map_db_error("token", e))?;
        Ok(())
    }

    async fn revoke_active_for_resource_owner(
        &self,
        resource_owner_id: Uuid,
    ) -> StorageResult<u64> {
        let now = OffsetDateTime::now_utc();
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| map_db_error("token", e))?;

        let active: Vec<(Uuid,)> = query_as(
            r#"
            SELECT t.id
            FROM token t
            JOIN resource_owner_token o ON o.token_id = t.id
            WHERE o.resource_owner_id = $1
              AND (
                (NOT t.revoked AND t.expires_at >= $2)
                OR EXISTS (
                    SELECT 1
                    FROM refresh_token r
                    WHERE r.token_id = t.id
                      AND NOT r.revoked
                      AND r.expires_at >= $2
                )
              )
            FOR UPDATE OF t
            "#,
        )
        .bind(resource_owner_id)
        .bind(now)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_db_error("token", e))?;

        let token_ids: Vec<Uuid> = active.into_iter().map(|(id,)| id).collect();
        let revoked = revoke_token_graphs(&mut tx, &token_ids, now).await?;

        tx.commit().await.map_err(|e| map_db_error("token", e))?;
        Ok(revoked)
    }
}

#[async_trait]
impl RefreshTokenStorage for PostgresAuthStorage {
    async fn insert(&self, refresh_token: &RefreshToken) -> StorageResult<()> {
        query(
            r#"
            INSERT INTO refresh_token (id, token_id, token_hash, created_at, expires_at, revoked)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(refresh_token.id)
        .bind(refresh_token.token_id)
        .bind(&refresh_token.token_hash)
        .bind(refresh_token.created_at)
        .bind(refresh_token.expires_at)
        .bind(refresh_token.revoked)
        .execute(self.pool())
        .await
        .map_err(|e| map_db_error("refresh_token", e))?;
        Ok(())
    }

    async fn find_by_client_and_hash(
        &self,
        client_id: Uuid,
        token_hash: &str,
    ) -> StorageResult<Option<RefreshTokenRecord>> {
        let row: Option<RefreshTokenTuple> = query_as(
            r#"
            SELECT r.id, r.token_id, r.token_hash, r.created_at, r.expires_at, r.revoked
            FROM refresh_token r
            JOIN token t ON t.id = r.token_id
            WHERE r.token_hash = $1
              AND t.client_id = $2
            "#,
        )
        .bind(token_hash)
        .bind(client_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_db_error("refresh_token", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let refresh_token = refresh_token_from_tuple(row);
        let token = TokenStorage::find_by_id(self, refresh_token.token_id)
            .await?
            .ok_or_else(|| StorageError::not_found("token"))?;

        Ok(Some(RefreshTokenRecord {
            refresh_token,
            token,
        }))
    }

    async fn find_by_token_id(&self, token_id: Uuid) -> StorageResult<Option<RefreshToken>> {
        let row: Option<RefreshTokenTuple> = query_as(
            r#"
            SELECT id, token_id, token_hash, created_at, expires_at, revoked
            FROM refresh_token
            WHERE token_id = $1
            "#,
        )
        .bind(token_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_db_error("refresh_token", e))?;

        Ok(row.map(refresh_token_from_tuple))
    }
}

#[async_trait]
impl TokenChainStorage for PostgresAuthStorage {
    async fn insert(&self, token_chain: &TokenChain) -> StorageResult<()> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| map_db_error("token_chain", e))?;

        // Serializes against revoke_lineage, which locks the same row.
        let refresh: Option<(bool,)> =
            query_as("SELECT revoked FROM refresh_token WHERE id = $1 FOR UPDATE")
                .bind(token_chain.refresh_token_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_db_error("refresh_token", e))?;
        if !matches!(refresh, Some((false,))) {
            return Err(StorageError::not_found("refresh_token"));
        }

        query(
            r#"
            INSERT INTO token_chain (id, next_token_id, previous_token_id, refresh_token_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(token_chain.id)
        .bind(token_chain.next_token_id)
        .bind(token_chain.previous_token_id)
        .bind(token_chain.refresh_token_id)
        .bind(token_chain.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_db_error("token_chain", e))?;

        tx.commit()
            .await
            .map_err(|e| map_db_error("token_chain", e))?;
        Ok(())
    }

    async fn find_by_refresh_token(
        &self,
        refresh_token_id: Uuid,
    ) -> StorageResult<Option<TokenChain>> {
        let row: Option<TokenChainTuple> = query_as(
            r#"
            SELECT id, next_token_id, previous_token_id, refresh_token_id, created_at
            FROM token_chain
            WHERE refresh_token_id = $1
            "#,
        )
        .bind(refresh_token_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_db_error("token_chain", e))?;

        Ok(row.map(token_chain_from_tuple))
    }
}
