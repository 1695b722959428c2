//! Integration tests for RestIdentityProvider sign-in flows

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use microaudit_core::ports::IIdentityProvider;
use microaudit_remote::RemoteError;

use crate::common;

#[tokio::test]
async fn test_password_sign_in_installs_session() {
    let (server, client, identity) = common::setup_identity().await;
    common::mount_password_grant(&server, "u1", "access-1").await;
    let mut session_rx = identity.on_session_change();

    let session = identity
        .sign_in_with_password("ada@example.com", "secret")
        .await
        .expect("sign-in failed");

    assert_eq!(session.user.id.as_str(), "u1");
    assert_eq!(session.refresh_token.as_deref(), Some("refresh-1"));
    assert_eq!(client.access_token().as_deref(), Some("access-1"));
    assert!(session_rx.has_changed().unwrap());
    assert_eq!(
        identity.current_user().await.unwrap().unwrap().email.as_deref(),
        Some("ada@example.com")
    );
}

#[tokio::test]
async fn test_wrong_password_is_bad_request() {
    let (server, client, identity) = common::setup_identity().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(body_json(json!({"email": "ada@example.com", "password": "nope"})))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        })))
        .mount(&server)
        .await;

    let err = identity
        .sign_in_with_password("ada@example.com", "nope")
        .await
        .unwrap_err();
    match err.downcast_ref::<RemoteError>() {
        Some(RemoteError::BadRequest(message)) => {
            assert_eq!(message, "Invalid login credentials")
        }
        other => panic!("expected BadRequest, got {other:?}"),
    }
    assert!(!client.has_session());
    assert!(identity.current_user().await.unwrap().is_none());
}

#[tokio::test]
async fn test_sign_in_with_token_fetches_user() {
    let (server, _client, identity) = common::setup_identity().await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("authorization", "Bearer stored-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "u7", "email": "grace@example.com"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user = identity.sign_in_with_token("stored-token").await.unwrap();
    assert_eq!(user.id.as_str(), "u7");
    assert!(identity.current_user().await.unwrap().is_some());
}

#[tokio::test]
async fn test_expired_token_leaves_provider_signed_out() {
    let (server, client, identity) = common::setup_identity().await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"msg": "JWT expired"})))
        .mount(&server)
        .await;

    let err = identity.sign_in_with_token("expired").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RemoteError>(),
        Some(RemoteError::Unauthorized(_))
    ));
    assert!(!client.has_session());
    assert!(identity.current_user().await.unwrap().is_none());
}

#[tokio::test]
async fn test_sign_out_clears_session() {
    let (server, client, identity) = common::setup_identity().await;
    common::mount_password_grant(&server, "u1", "access-1").await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    identity
        .sign_in_with_password("ada@example.com", "secret")
        .await
        .unwrap();
    identity.sign_out().await.unwrap();

    assert!(!client.has_session());
    assert!(identity.current_user().await.unwrap().is_none());
}

#[tokio::test]
async fn test_sign_up_with_pending_confirmation() {
    let (server, _client, identity) = common::setup_identity().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "u9", "email": "new@example.com", "confirmation_sent_at": "2024-05-01T10:00:00Z"
        })))
        .mount(&server)
        .await;

    let session = identity.sign_up("new@example.com", "secret").await.unwrap();
    assert!(session.is_none());
    assert!(identity.current_user().await.unwrap().is_none());
}

#[tokio::test]
async fn test_sign_up_with_immediate_session() {
    let (server, client, identity) = common::setup_identity().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "refresh_token": "r",
            "user": { "id": "u9", "email": "new@example.com" }
        })))
        .mount(&server)
        .await;

    let session = identity
        .sign_up("new@example.com", "secret")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.user.id.as_str(), "u9");
    assert_eq!(client.access_token().as_deref(), Some("fresh"));
}
