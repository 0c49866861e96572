use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gdrive_core::{OAuthClient, OAuthError};

#[tokio::test]
async fn exchange_code_posts_authorization_grant() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code-1"))
        .and(body_string_contains("client_id=client-1"))
        .and(body_string_contains("redirect_uri="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token-1",
            "token_type": "Bearer",
            "expires_in": 3599,
            "refresh_token": "refresh-1",
            "scope": "https://www.googleapis.com/auth/drive"
        })))
        .mount(&server)
        .await;

    let client = OAuthClient::with_base_url(&server.uri(), "client-1", "secret-1").unwrap();
    let token = client
        .exchange_code("auth-code-1", "http://127.0.0.1:9999/callback")
        .await
        .unwrap();

    assert_eq!(token.access_token, "token-1");
    assert_eq!(token.refresh_token.as_deref(), Some("refresh-1"));
    assert_eq!(token.expires_in, Some(3599));
}

#[tokio::test]
async fn refresh_token_posts_refresh_grant() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token-2",
            "token_type": "Bearer",
            "expires_in": 3599
        })))
        .mount(&server)
        .await;

    let client = OAuthClient::with_base_url(&server.uri(), "client-1", "secret-1").unwrap();
    let token = client.refresh_token("refresh-1").await.unwrap();

    assert_eq!(token.access_token, "token-2");
    assert!(token.refresh_token.is_none());
}

#[tokio::test]
async fn token_errors_surface_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&server)
        .await;

    let client = OAuthClient::with_base_url(&server.uri(), "client-1", "secret-1").unwrap();
    let err = client
        .refresh_token("stale")
        .await
        .expect_err("expected invalid grant");

    assert!(matches!(err, OAuthError::Api { status, body } if status.as_u16() == 400 && body == "invalid_grant"));
}

#[test]
fn authorize_url_requests_offline_access() {
    let client = OAuthClient::new("client-1", "secret-1").unwrap();
    let url = client
        .authorize_url(
            "http://127.0.0.1:9999/callback",
            "https://www.googleapis.com/auth/drive",
        )
        .unwrap();

    let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
    assert_eq!(query.get("response_type"), Some(&"code".to_string()));
    assert_eq!(query.get("client_id"), Some(&"client-1".to_string()));
    assert_eq!(query.get("access_type"), Some(&"offline".to_string()));
    assert_eq!(
        query.get("redirect_uri"),
        Some(&"http://127.0.0.1:9999/callback".to_string())
    );
}
