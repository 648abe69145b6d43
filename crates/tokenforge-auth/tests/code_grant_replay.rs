//! Authorization code redemption and replay revocation.

mod common;

use std::sync::Arc;

use tokenforge_auth::error::{AuthError, ErrorCode};
use tokenforge_auth::grant::{
    CodeGrantRequest, GrantRequest, RefreshGrantRequest, TokenGrantService,
};
use tokenforge_auth::secret;
use tokenforge_auth::storage::{AuthStores, InMemoryAuthStorage};
use tokenforge_auth::token::TokenResponse;
use tokenforge_auth::types::{Client, Token};
use url::Url;

struct Fixture {
    stores: AuthStores,
    service: TokenGrantService,
    client: Client,
    code: String,
    redirect_uri: Option<Url>,
}

async fn fixture() -> Fixture {
    common::init_tracing();
    let config = common::config(16);
    let stores = AuthStores::from_backend(Arc::new(InMemoryAuthStorage::new(16)));
    let service = TokenGrantService::new(&stores, &config, common::jwt());
    let client = common::client(&["profile", "email"]);
    let owner = common::resource_owner(&stores, "padme@naboo.test").await;

    let redirect_uri = client.redirect_uri.clone();
    let authorization = common::authorization_service(&stores, &config)
        .request_code(&client, owner.id, &[], redirect_uri.clone())
        .await
        .unwrap();

    Fixture {
        stores,
        service,
        client,
        code: authorization.code,
        redirect_uri,
    }
}

fn code_request(f: &Fixture) -> GrantRequest {
    GrantRequest::AuthorizationCode(CodeGrantRequest {
        code: f.code.clone(),
        redirect_uri: f.redirect_uri.clone(),
    })
}

async fn token_of(stores: &AuthStores, access_token: &str) -> Token {
    stores
        .tokens
        .find_by_hash(&secret::hash(access_token))
        .await
        .unwrap()
        .unwrap()
}

async fn assert_graph_revoked(stores: &AuthStores, response: &TokenResponse) {
    let token = token_of(stores, &response.access_token).await;
    assert!(token.revoked, "token {} should be revoked", token.id);
    assert!(!token.is_valid());

    let refresh_token = stores
        .refresh_tokens
        .find_by_token_id(token.id)
        .await
        .unwrap()
        .unwrap();
    assert!(refresh_token.revoked);
}

#[tokio::test]
async fn test_code_exchange_then_refresh() {
    let f = fixture().await;

    let response = f.service.grant(&f.client, code_request(&f)).await.unwrap();
    assert!(response.id_token.is_none());
    assert_eq!(response.expires_in, 3600);

    let token = token_of(&f.stores, &response.access_token).await;
    assert_eq!(token.scopes.len(), 2);
    assert_eq!(token.audience, vec![f.client.id]);

    let refreshed = f
        .service
        .grant(
            &f.client,
            GrantRequest::Refresh(RefreshGrantRequest {
                refresh_token: response.refresh_token.clone().unwrap(),
                scopes: vec![],
            }),
        )
        .await
        .unwrap();
    assert_ne!(refreshed.access_token, response.access_token);
}

#[tokio::test]
async fn test_replay_burns_the_chain() {
    let f = fixture().await;

    let first = f.service.grant(&f.client, code_request(&f)).await.unwrap();
    assert!(!token_of(&f.stores, &first.access_token).await.revoked);

    let err = f
        .service
        .grant(&f.client, code_request(&f))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::CompromisedCode { .. }));
    assert_eq!(err.oauth_error_code(), "invalid_grant");
    assert_eq!(err.error_code(), ErrorCode::CompromisedAuthCode);

    assert_graph_revoked(&f.stores, &first).await;

    let record = f
        .stores
        .auth_codes
        .find_by_client_and_hash(f.client.id, &secret::hash(&f.code))
        .await
        .unwrap()
        .unwrap();
    assert!(record.auth_code.revoked);

    // The code itself is now dead.
    let err = f
        .service
        .grant(&f.client, code_request(&f))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::AuthCodeNotFound);
}

#[tokio::test]
async fn test_replay_revokes_tokens_rotated_from_the_first_exchange() {
    let f = fixture().await;

    let first = f.service.grant(&f.client, code_request(&f)).await.unwrap();
    let rotated = f
        .service
        .grant(
            &f.client,
            GrantRequest::Refresh(RefreshGrantRequest {
                refresh_token: first.refresh_token.clone().unwrap(),
                scopes: vec![],
            }),
        )
        .await
        .unwrap();

    let err = f
        .service
        .grant(&f.client, code_request(&f))
        .await
        .unwrap_err();
    assert!(err.is_compromise());

    assert_graph_revoked(&f.stores, &first).await;
    assert_graph_revoked(&f.stores, &rotated).await;

    let err = f
        .service
        .grant(
            &f.client,
            GrantRequest::Refresh(RefreshGrantRequest {
                refresh_token: rotated.refresh_token.clone().unwrap(),
                scopes: vec![],
            }),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::RefreshTokenNotFound);
}

#[tokio::test]
async fn test_concurrent_redemption_yields_one_token_then_burns_it() {
    let f = fixture().await;

    let (a, b) = tokio::join!(
        f.service.grant(&f.client, code_request(&f)),
        f.service.grant(&f.client, code_request(&f)),
    );

    let (winner, loser) = match (a, b) {
        (Ok(response), Err(err)) | (Err(err), Ok(response)) => (response, err),
        (a, b) => panic!("expected exactly one success, got {a:?} and {b:?}"),
    };
    assert!(matches!(loser, AuthError::CompromisedCode { .. }));
    assert_graph_revoked(&f.stores, &winner).await;
}

#[tokio::test]
async fn test_redirect_uri_mismatch_is_invalid_grant() {
    let f = fixture().await;

    let err = f
        .service
        .grant(
            &f.client,
            GrantRequest::AuthorizationCode(CodeGrantRequest {
                code: f.code.clone(),
                redirect_uri: None,
            }),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::RedirectUriMismatch);

    // A mismatched attempt does not consume the code.
    tokio_test::assert_ok!(f.service.grant(&f.client, code_request(&f)).await);
}
