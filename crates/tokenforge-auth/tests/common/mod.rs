#![allow(dead_code)]

use std::sync::Arc;

use time::OffsetDateTime;
use tokenforge_auth::config::{AuthConfig, OAuthConfig};
use tokenforge_auth::oauth::{AuthCodeIssuer, AuthorizationService};
use tokenforge_auth::storage::AuthStores;
use tokenforge_auth::token::{JwtService, SigningAlgorithm, SigningKeyPair};
use tokenforge_auth::types::{Client, Profile, ResourceOwner, Scope};
use tracing_subscriber::EnvFilter;
use url::Url;
use uuid::Uuid;

pub const ISSUER: &str = "https://auth.tokenforge.test";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn config(authorization_code_size: usize) -> AuthConfig {
    AuthConfig {
        issuer: ISSUER.to_string(),
        oauth: OAuthConfig {
            authorization_code_size,
            ..OAuthConfig::default()
        },
        ..AuthConfig::default()
    }
}

pub fn jwt() -> Arc<JwtService> {
    let key = SigningKeyPair::generate_rsa(SigningAlgorithm::RS256).expect("generate key");
    Arc::new(JwtService::new(key, ISSUER))
}

pub fn client(scopes: &[&str]) -> Client {
    Client {
        id: Uuid::new_v4(),
        name: "tokenforge-test-app".to_string(),
        redirect_uri: Some(Url::parse("https://app.tokenforge.test/callback").expect("url")),
        scopes: scopes.iter().map(|s| Scope::new(*s)).collect(),
        confidential: true,
    }
}

pub fn names(scopes: &[&str]) -> Vec<String> {
    scopes.iter().map(|s| s.to_string()).collect()
}

pub fn authorization_service(stores: &AuthStores, config: &AuthConfig) -> AuthorizationService {
    let issuer = AuthCodeIssuer::new(
        stores.configuration.clone(),
        stores.auth_codes.clone(),
        config.oauth.authorization_code_lifetime,
    );
    AuthorizationService::new(stores.auth_codes.clone(), issuer)
}

/// Stores a resource owner with a profile that has no address.
pub async fn resource_owner(stores: &AuthStores, email: &str) -> ResourceOwner {
    let now = OffsetDateTime::now_utc();
    let owner = ResourceOwner {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: String::new(),
        email_verified: true,
        created_at: now,
    };
    stores
        .resource_owners
        .insert(&owner)
        .await
        .expect("insert resource owner");
    stores
        .resource_owners
        .insert_profile(&Profile {
            id: Uuid::new_v4(),
            resource_owner: owner.clone(),
            name: Some("Padmé Amidala".to_string()),
            middle_name: None,
            nick_name: Some("Padmé".to_string()),
            preferred_user_name: Some("padme".to_string()),
            given_name: Some("Padmé".to_string()),
            family_name: Some("Amidala".to_string()),
            gender: None,
            birth_date: None,
            picture: None,
            website: None,
            phone_number: None,
            phone_number_verified: false,
            updated_at: now,
            addresses: vec![],
        })
        .await
        .expect("insert profile");
    owner
}
