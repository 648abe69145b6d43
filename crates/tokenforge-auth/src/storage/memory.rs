//! In-memory storage backend.
//!
//! Implements every storage trait over a single `tokio::sync::RwLock`. Each
//! trait method takes the write lock once, so uniqueness checks and the
//! inserts they guard are atomic, and so is every compensating revocation.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tokenforge_auth::storage::{AuthStores, InMemoryAuthStorage};
//!
//! let stores = AuthStores::from_backend(Arc::new(InMemoryAuthStorage::new(32)));
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AuthCodeStorage, ConfigurationStorage, NonceStorage, RefreshTokenStorage,
    ResourceOwnerStorage, StorageError, StorageResult, TokenChainStorage, TokenStorage, keys,
};
use crate::types::{
    AccessRequest, AuthCode, AuthCodeRecord, Configuration, Nonce, NonceType, Profile,
    RefreshToken, RefreshTokenRecord, ResourceOwner, Token, TokenChain,
};

#[derive(Default)]
struct State {
    configuration: Option<Configuration>,
    access_requests: HashMap<Uuid, AccessRequest>,
    auth_codes: HashMap<Uuid, AuthCode>,
    auth_code_hashes: HashMap<String, Uuid>,
    /// auth code id -> token id
    auth_code_tokens: HashMap<Uuid, Uuid>,
    tokens: HashMap<Uuid, Token>,
    token_hashes: HashMap<String, Uuid>,
    /// token id -> resource owner id
    resource_owner_tokens: HashMap<Uuid, Uuid>,
    /// token id -> client id
    client_tokens: HashMap<Uuid, Uuid>,
    refresh_tokens: HashMap<Uuid, RefreshToken>,
    refresh_token_hashes: HashMap<String, Uuid>,
    /// refresh token id -> chain row
    token_chains: HashMap<Uuid, TokenChain>,
    nonces: HashMap<Uuid, Nonce>,
    resource_owners: HashMap<Uuid, ResourceOwner>,
    /// resource owner id -> profile
    profiles: HashMap<Uuid, Profile>,
}

impl State {
    fn revoke_token_graph(&mut self, token_id: Uuid, now: OffsetDateTime) -> bool {
        let Some(token) = self.tokens.get_mut(&token_id) else {
            return false;
        };
        token.revoked = true;
        if token.expires_at > now {
            token.expires_at = now;
        }
        for refresh_token in self
            .refresh_tokens
            .values_mut()
            .filter(|r| r.token_id == token_id)
        {
            refresh_token.revoked = true;
        }
        true
    }
}

/// In-process implementation of every storage trait.
#[derive(Default)]
pub struct InMemoryAuthStorage {
    state: RwLock<State>,
}

impl InMemoryAuthStorage {
    /// Creates a backend with the configuration row seeded.
    #[must_use]
    pub fn new(authorization_code_size: usize) -> Self {
        let state = State {
            configuration: Some(Configuration {
                id: Uuid::new_v4(),
                version: 1,
                authorization_code_size,
            }),
            ..Default::default()
        };
        Self {
            state: RwLock::new(state),
        }
    }
}

#[async_trait]
impl ConfigurationStorage for InMemoryAuthStorage {
    async fn get(&self) -> StorageResult<Configuration> {
        self.state
            .read()
            .await
            .configuration
            .clone()
            .ok_or_else(|| StorageError::not_found("configuration"))
    }

    async fn grow_authorization_code_size(
        &self,
        id: Uuid,
        size: usize,
    ) -> StorageResult<Configuration> {
        let mut state = self.state.write().await;
        let configuration = state
            .configuration
            .as_mut()
            .filter(|c| c.id == id)
            .ok_or_else(|| StorageError::not_found("configuration"))?;

        configuration.authorization_code_size = configuration.authorization_code_size.max(size);
        configuration.version += 1;
        Ok(configuration.clone())
    }
}

#[async_trait]
impl AuthCodeStorage for InMemoryAuthStorage {
    async fn insert_access_request(&self, access_request: &AccessRequest) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if state.access_requests.contains_key(&access_request.id) {
            return Err(StorageError::duplicate("access_request", "id"));
        }
        state
            .access_requests
            .insert(access_request.id, access_request.clone());
        Ok(())
    }

    async fn insert(&self, auth_code: &AuthCode) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if state.auth_code_hashes.contains_key(&auth_code.code_hash) {
            return Err(StorageError::duplicate("auth_code", keys::AUTH_CODE_HASH));
        }
        if state.auth_codes.contains_key(&auth_code.id) {
            return Err(StorageError::duplicate("auth_code", "id"));
        }
        if !state
            .access_requests
            .contains_key(&auth_code.access_request_id)
        {
            return Err(StorageError::not_found("access_request"));
        }
        state
            .auth_code_hashes
            .insert(auth_code.code_hash.clone(), auth_code.id);
        state.auth_codes.insert(auth_code.id, auth_code.clone());
        Ok(())
    }

    async fn find_by_client_and_hash(
        &self,
        client_id: Uuid,
        code_hash: &str,
    ) -> StorageResult<Option<AuthCodeRecord>> {
        let state = self.state.read().await;
        let record = state
            .auth_code_hashes
            .get(code_hash)
            .and_then(|id| state.auth_codes.get(id))
            .and_then(|auth_code| {
                state
                    .access_requests
                    .get(&auth_code.access_request_id)
                    .filter(|request| request.client_id == client_id)
                    .map(|request| AuthCodeRecord {
                        auth_code: auth_code.clone(),
                        access_request: request.clone(),
                    })
            });
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<AuthCode>> {
        Ok(self.state.read().await.auth_codes.get(&id).cloned())
    }

    async fn link_token(&self, auth_code_id: Uuid, token_id: Uuid) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if state.auth_code_tokens.contains_key(&auth_code_id) {
            return Err(StorageError::duplicate(
                "auth_code_token",
                keys::AUTH_CODE_TOKEN,
            ));
        }
        state.auth_code_tokens.insert(auth_code_id, token_id);
        Ok(())
    }

    async fn revoke_lineage(
        &self,
        auth_code_id: Uuid,
        attempted_token_id: Uuid,
    ) -> StorageResult<()> {
        let mut state = self.state.write().await;
        let now = OffsetDateTime::now_utc();

        if let Some(token_id) = state.auth_code_tokens.get(&auth_code_id).copied() {
            let rotated: Vec<Uuid> = state
                .tokens
                .values()
                .filter(|t| t.lead_token_id == Some(token_id))
                .map(|t| t.id)
                .collect();
            state.revoke_token_graph(token_id, now);
            for id in rotated {
                state.revoke_token_graph(id, now);
            }
        }
        state.revoke_token_graph(attempted_token_id, now);
        if let Some(auth_code) = state.auth_codes.get_mut(&auth_code_id) {
            auth_code.revoked = true;
        }
        Ok(())
    }
}

#[async_trait]
impl TokenStorage for InMemoryAuthStorage {
    async fn insert(&self, token: &Token) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if state.tokens.contains_key(&token.id) {
            return Err(StorageError::duplicate("token", "id"));
        }
        if state.token_hashes.contains_key(&token.token_hash) {
            return Err(StorageError::duplicate("token", "token_hash"));
        }
        state.token_hashes.insert(token.token_hash.clone(), token.id);
        state.tokens.insert(token.id, token.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Token>> {
        Ok(self.state.read().await.tokens.get(&id).cloned())
    }

    async fn find_by_hash(&self, token_hash: &str) -> StorageResult<Option<Token>> {
        let state = self.state.read().await;
        Ok(state
            .token_hashes
            .get(token_hash)
            .and_then(|id| state.tokens.get(id))
            .cloned())
    }

    async fn link_resource_owner(
        &self,
        resource_owner_id: Uuid,
        token_id: Uuid,
    ) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if !state.tokens.contains_key(&token_id) {
            return Err(StorageError::not_found("token"));
        }
        if state.resource_owner_tokens.contains_key(&token_id) {
            return Err(StorageError::duplicate("resource_owner_token", "token_id"));
        }
        state
            .resource_owner_tokens
            .insert(token_id, resource_owner_id);
        Ok(())
    }

    async fn link_client(&self, client_id: Uuid, token_id: Uuid) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if !state.tokens.contains_key(&token_id) {
            return Err(StorageError::not_found("token"));
        }
        if state.client_tokens.contains_key(&token_id) {
            return Err(StorageError::duplicate("client_token", "token_id"));
        }
        state.client_tokens.insert(token_id, client_id);
        Ok(())
    }

    async fn find_resource_owner_id(&self, token_id: Uuid) -> StorageResult<Option<Uuid>> {
        Ok(self
            .state
            .read()
            .await
            .resource_owner_tokens
            .get(&token_id)
            .copied())
    }

    async fn revoke_graph(&self, token_id: Uuid) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if state.revoke_token_graph(token_id, OffsetDateTime::now_utc()) {
            Ok(())
        } else {
            Err(StorageError::not_found("token"))
        }
    }

    async fn revoke_active_for_resource_owner(
        &self,
        resource_owner_id: Uuid,
    ) -> StorageResult<u64> {
        let mut state = self.state.write().await;
        let now = OffsetDateTime::now_utc();

        let active: Vec<Uuid> = state
            .resource_owner_tokens
            .iter()
            .filter(|(_, owner)| **owner == resource_owner_id)
            .map(|(token_id, _)| *token_id)
            .filter(|token_id| {
                state.tokens.get(token_id).is_some_and(Token::is_valid)
                    || state
                        .refresh_tokens
                        .values()
                        .any(|r| r.token_id == *token_id && r.is_valid())
            })
            .collect();

        for token_id in &active {
            state.revoke_token_graph(*token_id, now);
        }
        Ok(active.len() as u64)
    }
}

#[async_trait]
impl RefreshTokenStorage for InMemoryAuthStorage {
    async fn insert(&self, refresh_token: &RefreshToken) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if state.refresh_tokens.contains_key(&refresh_token.id) {
            return Err(StorageError::duplicate("refresh_token", "id"));
        }
        if state
            .refresh_token_hashes
            .contains_key(&refresh_token.token_hash)
        {
            return Err(StorageError::duplicate("refresh_token", "token_hash"));
        }
        if !state.tokens.contains_key(&refresh_token.token_id) {
            return Err(StorageError::not_found("token"));
        }
        state
            .refresh_token_hashes
            .insert(refresh_token.token_hash.clone(), refresh_token.id);
        state
            .refresh_tokens
            .insert(refresh_token.id, refresh_token.clone());
        Ok(())
    }

    async fn find_by_client_and_hash(
        &self,
        client_id: Uuid,
        token_hash: &str,
    ) -> StorageResult<Option<RefreshTokenRecord>> {
        let state = self.state.read().await;
        let record = state
            .refresh_token_hashes
            .get(token_hash)
            .and_then(|id| state.refresh_tokens.get(id))
            .and_then(|refresh_token| {
                state
                    .tokens
                    .get(&refresh_token.token_id)
                    .filter(|token| token.client_id == client_id)
                    .map(|token| RefreshTokenRecord {
                        refresh_token: refresh_token.clone(),
                        token: token.clone(),
                    })
            });
        Ok(record)
    }

    async fn find_by_token_id(&self, token_id: Uuid) -> StorageResult<Option<RefreshToken>> {
        Ok(self
            .state
            .read()
            .await
            .refresh_tokens
            .values()
            .find(|r| r.token_id == token_id)
            .cloned())
    }
}

#[async_trait]
impl TokenChainStorage for InMemoryAuthStorage {
    async fn insert(&self, token_chain: &TokenChain) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if state
            .token_chains
            .contains_key(&token_chain.refresh_token_id)
        {
            return Err(StorageError::duplicate(
                "token_chain",
                keys::TOKEN_CHAIN_REFRESH_TOKEN,
            ));
        }
        if state
            .refresh_tokens
            .get(&token_chain.refresh_token_id)
            .is_some_and(|r| r.revoked)
        {
            return Err(StorageError::not_found("refresh_token"));
        }
        state
            .token_chains
            .insert(token_chain.refresh_token_id, token_chain.clone());
        Ok(())
    }

    async fn find_by_refresh_token(
        &self,
        refresh_token_id: Uuid,
    ) -> StorageResult<Option<TokenChain>> {
        Ok(self
            .state
            .read()
            .await
            .token_chains
            .get(&refresh_token_id)
            .cloned())
    }
}

#[async_trait]
impl NonceStorage for InMemoryAuthStorage {
    async fn insert(&self, nonce: &Nonce) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if state.nonces.contains_key(&nonce.id) {
            return Err(StorageError::duplicate("nonce", "id"));
        }
        state.nonces.insert(nonce.id, nonce.clone());
        Ok(())
    }

    async fn find_by_type_and_hash(
        &self,
        nonce_type: NonceType,
        nonce_hash: &str,
    ) -> StorageResult<Option<Nonce>> {
        Ok(self
            .state
            .read()
            .await
            .nonces
            .values()
            .find(|n| n.nonce_type == nonce_type && n.nonce_hash == nonce_hash)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Nonce>> {
        Ok(self.state.read().await.nonces.get(&id).cloned())
    }

    async fn mark_spent(&self, id: Uuid) -> StorageResult<bool> {
        let mut state = self.state.write().await;
        let nonce = state
            .nonces
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("nonce"))?;
        if nonce.spent || nonce.revoked {
            return Ok(false);
        }
        nonce.spent = true;
        Ok(true)
    }

    async fn revoke_unspent(
        &self,
        resource_owner_id: Uuid,
        nonce_type: NonceType,
        keep_id: Uuid,
    ) -> StorageResult<u64> {
        let mut state = self.state.write().await;
        let mut revoked = 0;
        for nonce in state.nonces.values_mut().filter(|n| {
            n.resource_owner_id == resource_owner_id
                && n.nonce_type == nonce_type
                && n.id != keep_id
                && !n.spent
                && !n.revoked
        }) {
            nonce.revoked = true;
            revoked += 1;
        }
        Ok(revoked)
    }
}

#[async_trait]
impl ResourceOwnerStorage for InMemoryAuthStorage {
    async fn insert(&self, resource_owner: &ResourceOwner) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if state
            .resource_owners
            .values()
            .any(|o| o.email == resource_owner.email)
        {
            return Err(StorageError::duplicate(
                "resource_owner",
                keys::RESOURCE_OWNER_EMAIL,
            ));
        }
        state
            .resource_owners
            .insert(resource_owner.id, resource_owner.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<ResourceOwner>> {
        Ok(self.state.read().await.resource_owners.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StorageResult<Option<ResourceOwner>> {
        Ok(self
            .state
            .read()
            .await
            .resource_owners
            .values()
            .find(|o| o.email == email)
            .cloned())
    }

    async fn set_email_verified(&self, id: Uuid) -> StorageResult<()> {
        let mut state = self.state.write().await;
        let owner = state
            .resource_owners
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("resource_owner"))?;
        owner.email_verified = true;
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StorageResult<()> {
        let mut state = self.state.write().await;
        let owner = state
            .resource_owners
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("resource_owner"))?;
        owner.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn insert_profile(&self, profile: &Profile) -> StorageResult<()> {
        let mut state = self.state.write().await;
        let owner_id = profile.resource_owner.id;
        if !state.resource_owners.contains_key(&owner_id) {
            return Err(StorageError::not_found("resource_owner"));
        }
        if state.profiles.contains_key(&owner_id) {
            return Err(StorageError::duplicate("profile", "resource_owner_id"));
        }
        state.profiles.insert(owner_id, profile.clone());
        Ok(())
    }

    async fn find_profile(&self, resource_owner_id: Uuid) -> StorageResult<Option<Profile>> {
        let state = self.state.read().await;
        let profile = state.profiles.get(&resource_owner_id).map(|profile| {
            let mut profile = profile.clone();
            if let Some(owner) = state.resource_owners.get(&resource_owner_id) {
                profile.resource_owner = owner.clone();
            }
            profile
        });
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Extension, GrantType, Scope};
    use time::Duration;

    fn token(client_id: Uuid) -> Token {
        let now = OffsetDateTime::now_utc();
        Token {
            id: Uuid::new_v4(),
            token_hash: Uuid::new_v4().to_string(),
            grant_type: GrantType::Code,
            client_id,
            lead_token_id: None,
            scopes: vec![Scope::new("profile")],
            audience: vec![client_id],
            extension: Extension::OAuth2,
            seconds_to_expiration: 3600,
            created_at: now,
            expires_at: now + Duration::hours(1),
            revoked: false,
        }
    }

    fn refresh_token(token_id: Uuid) -> RefreshToken {
        let now = OffsetDateTime::now_utc();
        RefreshToken {
            id: Uuid::new_v4(),
            token_id,
            token_hash: Uuid::new_v4().to_string(),
            created_at: now,
            expires_at: now + Duration::days(1),
            revoked: false,
        }
    }

    #[tokio::test]
    async fn test_grow_code_size_takes_max_and_bumps_version() {
        let storage = InMemoryAuthStorage::new(8);
        let initial = ConfigurationStorage::get(&storage).await.unwrap();

        let grown = storage
            .grow_authorization_code_size(initial.id, 9)
            .await
            .unwrap();
        assert_eq!(grown.authorization_code_size, 9);
        assert_eq!(grown.version, initial.version + 1);

        // A stale grower asking for the old size + 1 does not double-grow.
        let again = storage
            .grow_authorization_code_size(initial.id, 9)
            .await
            .unwrap();
        assert_eq!(again.authorization_code_size, 9);

        let smaller = storage
            .grow_authorization_code_size(initial.id, 4)
            .await
            .unwrap();
        assert_eq!(smaller.authorization_code_size, 9);
    }

    #[tokio::test]
    async fn test_missing_configuration_is_not_found() {
        let storage = InMemoryAuthStorage::default();
        let err = ConfigurationStorage::get(&storage).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_auth_code_hash_is_unique() {
        let storage = InMemoryAuthStorage::new(8);
        let request = AccessRequest::new(Uuid::new_v4(), Uuid::new_v4(), vec![], None);
        storage.insert_access_request(&request).await.unwrap();

        let now = OffsetDateTime::now_utc();
        let code = AuthCode {
            id: Uuid::new_v4(),
            code_hash: "same".to_string(),
            access_request_id: request.id,
            created_at: now,
            expires_at: now + Duration::minutes(10),
            revoked: false,
        };
        AuthCodeStorage::insert(&storage, &code).await.unwrap();

        let collision = AuthCode {
            id: Uuid::new_v4(),
            ..code.clone()
        };
        let err = AuthCodeStorage::insert(&storage, &collision)
            .await
            .unwrap_err();
        assert!(err.is_duplicate_on(keys::AUTH_CODE_HASH));
    }

    #[tokio::test]
    async fn test_auth_code_lookup_is_scoped_to_client() {
        let storage = InMemoryAuthStorage::new(8);
        let client_id = Uuid::new_v4();
        let request = AccessRequest::new(client_id, Uuid::new_v4(), vec![], None);
        storage.insert_access_request(&request).await.unwrap();

        let now = OffsetDateTime::now_utc();
        let code = AuthCode {
            id: Uuid::new_v4(),
            code_hash: "hash".to_string(),
            access_request_id: request.id,
            created_at: now,
            expires_at: now + Duration::minutes(10),
            revoked: false,
        };
        AuthCodeStorage::insert(&storage, &code).await.unwrap();

        let found = AuthCodeStorage::find_by_client_and_hash(&storage, client_id, "hash")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.auth_code.id, code.id);
        assert_eq!(found.access_request.id, request.id);

        let other = AuthCodeStorage::find_by_client_and_hash(&storage, Uuid::new_v4(), "hash")
            .await
            .unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_second_link_is_duplicate() {
        let storage = InMemoryAuthStorage::new(8);
        let auth_code_id = Uuid::new_v4();

        storage.link_token(auth_code_id, Uuid::new_v4()).await.unwrap();
        let err = storage
            .link_token(auth_code_id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(err.is_duplicate_on(keys::AUTH_CODE_TOKEN));
    }

    #[tokio::test]
    async fn test_token_chain_refresh_token_is_unique() {
        let storage = InMemoryAuthStorage::new(8);
        let refresh_token_id = Uuid::new_v4();
        let row = TokenChain {
            id: Uuid::new_v4(),
            next_token_id: Uuid::new_v4(),
            previous_token_id: Uuid::new_v4(),
            refresh_token_id,
            created_at: OffsetDateTime::now_utc(),
        };
        TokenChainStorage::insert(&storage, &row).await.unwrap();

        let replay = TokenChain {
            id: Uuid::new_v4(),
            next_token_id: Uuid::new_v4(),
            ..row
        };
        let err = TokenChainStorage::insert(&storage, &replay)
            .await
            .unwrap_err();
        assert!(err.is_duplicate_on(keys::TOKEN_CHAIN_REFRESH_TOKEN));
    }

    #[tokio::test]
    async fn test_token_chain_rejects_revoked_refresh_token() {
        let storage = InMemoryAuthStorage::new(8);
        let t = token(Uuid::new_v4());
        TokenStorage::insert(&storage, &t).await.unwrap();
        let r = refresh_token(t.id);
        RefreshTokenStorage::insert(&storage, &r).await.unwrap();
        storage.revoke_graph(t.id).await.unwrap();

        let row = TokenChain {
            id: Uuid::new_v4(),
            next_token_id: Uuid::new_v4(),
            previous_token_id: t.id,
            refresh_token_id: r.id,
            created_at: OffsetDateTime::now_utc(),
        };
        let err = TokenChainStorage::insert(&storage, &row).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
        assert!(storage.find_by_refresh_token(r.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke_graph_revokes_refresh_token_and_expires() {
        let storage = InMemoryAuthStorage::new(8);
        let t = token(Uuid::new_v4());
        let r = refresh_token(t.id);
        TokenStorage::insert(&storage, &t).await.unwrap();
        RefreshTokenStorage::insert(&storage, &r).await.unwrap();

        storage.revoke_graph(t.id).await.unwrap();

        let revoked = TokenStorage::find_by_id(&storage, t.id)
            .await
            .unwrap()
            .unwrap();
        assert!(revoked.revoked);
        assert!(revoked.expires_at <= OffsetDateTime::now_utc());
        let revoked_refresh = storage.find_by_token_id(t.id).await.unwrap().unwrap();
        assert!(revoked_refresh.revoked);

        let err = storage.revoke_graph(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_revoke_active_for_resource_owner() {
        let storage = InMemoryAuthStorage::new(8);
        let owner = Uuid::new_v4();
        let client = Uuid::new_v4();

        let first = token(client);
        let second = token(client);
        let someone_else = token(client);
        for t in [&first, &second, &someone_else] {
            TokenStorage::insert(&storage, t).await.unwrap();
        }
        storage.link_resource_owner(owner, first.id).await.unwrap();
        storage.link_resource_owner(owner, second.id).await.unwrap();
        storage
            .link_resource_owner(Uuid::new_v4(), someone_else.id)
            .await
            .unwrap();

        assert_eq!(storage.revoke_active_for_resource_owner(owner).await.unwrap(), 2);
        assert_eq!(storage.revoke_active_for_resource_owner(owner).await.unwrap(), 0);

        let untouched = TokenStorage::find_by_id(&storage, someone_else.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!untouched.revoked);
    }

    #[tokio::test]
    async fn test_revoke_for_resource_owner_reaches_refresh_tokens_of_expired_tokens() {
        let storage = InMemoryAuthStorage::new(8);
        let owner = Uuid::new_v4();

        let mut expired = token(Uuid::new_v4());
        expired.expires_at = OffsetDateTime::now_utc() - Duration::minutes(1);
        TokenStorage::insert(&storage, &expired).await.unwrap();
        let refresh = refresh_token(expired.id);
        RefreshTokenStorage::insert(&storage, &refresh).await.unwrap();
        storage.link_resource_owner(owner, expired.id).await.unwrap();

        assert_eq!(storage.revoke_active_for_resource_owner(owner).await.unwrap(), 1);
        let stored = storage.find_by_token_id(expired.id).await.unwrap().unwrap();
        assert!(stored.revoked);
        assert_eq!(storage.revoke_active_for_resource_owner(owner).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_spent_is_one_shot() {
        let storage = InMemoryAuthStorage::new(8);
        let now = OffsetDateTime::now_utc();
        let nonce = Nonce {
            id: Uuid::new_v4(),
            resource_owner_id: Uuid::new_v4(),
            nonce_type: NonceType::Welcome,
            nonce_hash: "hash".to_string(),
            spent: false,
            revoked: false,
            created_at: now,
            expires_at: now + Duration::days(1),
        };
        NonceStorage::insert(&storage, &nonce).await.unwrap();

        assert!(storage.mark_spent(nonce.id).await.unwrap());
        assert!(!storage.mark_spent(nonce.id).await.unwrap());
    }
}
