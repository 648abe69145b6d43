//! Authorization code width growth under forced hash collisions.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokenforge_auth::AuthCodeInsertFailure;
use tokenforge_auth::error::{AuthError, ErrorCategory, ErrorCode};
use tokenforge_auth::oauth::{AuthCodeIssuer, MAX_INSERT_ATTEMPTS};
use tokenforge_auth::secret;
use tokenforge_auth::storage::{
    AuthCodeStorage, ConfigurationStorage, InMemoryAuthStorage, StorageError, StorageResult, keys,
};
use tokenforge_auth::types::{AccessRequest, AuthCode, AuthCodeRecord};
use uuid::Uuid;

/// Rejects the first `collisions` code inserts with a duplicate on `key`.
struct CollidingAuthCodes {
    inner: Arc<InMemoryAuthStorage>,
    key: &'static str,
    collisions: AtomicU32,
    attempts: AtomicU32,
    stored: AtomicU32,
}

impl CollidingAuthCodes {
    fn new(inner: Arc<InMemoryAuthStorage>, key: &'static str, collisions: u32) -> Self {
        Self {
            inner,
            key,
            collisions: AtomicU32::new(collisions),
            attempts: AtomicU32::new(0),
            stored: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl AuthCodeStorage for CollidingAuthCodes {
    async fn insert_access_request(&self, access_request: &AccessRequest) -> StorageResult<()> {
        self.inner.insert_access_request(access_request).await
    }

    async fn insert(&self, auth_code: &AuthCode) -> StorageResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.collisions.load(Ordering::SeqCst);
        if remaining > 0 {
            self.collisions.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::duplicate("auth_code", self.key));
        }
        AuthCodeStorage::insert(self.inner.as_ref(), auth_code).await?;
        self.stored.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find_by_client_and_hash(
        &self,
        client_id: Uuid,
        code_hash: &str,
    ) -> StorageResult<Option<AuthCodeRecord>> {
        AuthCodeStorage::find_by_client_and_hash(self.inner.as_ref(), client_id, code_hash).await
    }

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<AuthCode>> {
        AuthCodeStorage::find_by_id(self.inner.as_ref(), id).await
    }

    async fn link_token(&self, auth_code_id: Uuid, token_id: Uuid) -> StorageResult<()> {
        self.inner.link_token(auth_code_id, token_id).await
    }

    async fn revoke_lineage(
        &self,
        auth_code_id: Uuid,
        attempted_token_id: Uuid,
    ) -> StorageResult<()> {
        self.inner
            .revoke_lineage(auth_code_id, attempted_token_id)
            .await
    }
}

struct Fixture {
    backend: Arc<InMemoryAuthStorage>,
    auth_codes: Arc<CollidingAuthCodes>,
    issuer: AuthCodeIssuer,
    access_request: AccessRequest,
}

async fn fixture(code_size: usize, key: &'static str, collisions: u32) -> Fixture {
    common::init_tracing();
    let backend = Arc::new(InMemoryAuthStorage::new(code_size));
    let auth_codes = Arc::new(CollidingAuthCodes::new(backend.clone(), key, collisions));
    let issuer = AuthCodeIssuer::new(
        backend.clone(),
        auth_codes.clone(),
        Duration::from_secs(600),
    );

    let access_request = AccessRequest::new(Uuid::new_v4(), Uuid::new_v4(), vec![], None);
    auth_codes
        .insert_access_request(&access_request)
        .await
        .unwrap();

    Fixture {
        backend,
        auth_codes,
        issuer,
        access_request,
    }
}

#[tokio::test]
async fn test_no_collision_keeps_code_size() {
    let f = fixture(8, keys::AUTH_CODE_HASH, 0).await;

    let code = f.issuer.issue(&f.access_request).await.unwrap();
    assert_eq!(code.len(), 8);

    let configuration = ConfigurationStorage::get(f.backend.as_ref()).await.unwrap();
    assert_eq!(configuration.authorization_code_size, 8);
    assert_eq!(configuration.version, 1);
}

#[tokio::test]
async fn test_one_collision_grows_code_size_and_succeeds() {
    let f = fixture(8, keys::AUTH_CODE_HASH, 1).await;

    let code = tokio_test::assert_ok!(f.issuer.issue(&f.access_request).await);
    assert_eq!(code.len(), 9);
    assert_eq!(f.auth_codes.attempts.load(Ordering::SeqCst), 2);
    assert_eq!(f.auth_codes.stored.load(Ordering::SeqCst), 1);

    let configuration = ConfigurationStorage::get(f.backend.as_ref()).await.unwrap();
    assert_eq!(configuration.authorization_code_size, 9);
    assert_eq!(configuration.version, 2);

    let record = f
        .auth_codes
        .find_by_client_and_hash(f.access_request.client_id, &secret::hash(&code))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.access_request.id, f.access_request.id);
}

#[tokio::test]
async fn test_grown_size_applies_to_later_codes() {
    let f = fixture(8, keys::AUTH_CODE_HASH, 1).await;
    f.issuer.issue(&f.access_request).await.unwrap();

    let next = f.issuer.issue(&f.access_request).await.unwrap();
    assert_eq!(next.len(), 9);
}

#[tokio::test]
async fn test_collisions_at_ceiling_exhaust_without_storing() {
    let f = fixture(8, keys::AUTH_CODE_HASH, MAX_INSERT_ATTEMPTS).await;

    let err = tokio_test::assert_err!(f.issuer.issue(&f.access_request).await);
    match &err {
        AuthError::AuthCodeInsert {
            reason,
            attempts,
            code_size,
        } => {
            assert_eq!(*reason, AuthCodeInsertFailure::KnownKeyExhausted);
            assert_eq!(*attempts, MAX_INSERT_ATTEMPTS);
            assert_eq!(*code_size, 9);
        }
        other => panic!("expected AuthCodeInsert, got {other:?}"),
    }
    assert_eq!(err.oauth_error_code(), "server_error");
    assert_eq!(err.error_code(), ErrorCode::AuthCodeInsertFailed);
    assert_eq!(err.category(), ErrorCategory::Exhaustion);
    assert_eq!(f.auth_codes.attempts.load(Ordering::SeqCst), MAX_INSERT_ATTEMPTS);
    assert_eq!(f.auth_codes.stored.load(Ordering::SeqCst), 0);

    let configuration = ConfigurationStorage::get(f.backend.as_ref()).await.unwrap();
    assert_eq!(configuration.authorization_code_size, 9);
}

#[tokio::test]
async fn test_unknown_key_is_not_retried() {
    let f = fixture(8, "access_request_id", 1).await;

    let err = f.issuer.issue(&f.access_request).await.unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::AuthCodeInsertUnknownKey);
    assert_eq!(err.category(), ErrorCategory::Infrastructure);
    assert_eq!(err.oauth_error_code(), "server_error");
    match err {
        AuthError::AuthCodeInsert {
            reason: AuthCodeInsertFailure::UnknownKey { key },
            attempts,
            code_size,
        } => {
            assert_eq!(key, "access_request_id");
            assert_eq!(attempts, 1);
            assert_eq!(code_size, 8);
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
    assert_eq!(f.auth_codes.attempts.load(Ordering::SeqCst), 1);

    let configuration = ConfigurationStorage::get(f.backend.as_ref()).await.unwrap();
    assert_eq!(configuration.authorization_code_size, 8);
    assert_eq!(configuration.version, 1);
}
