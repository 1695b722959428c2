//! Integration tests for RestRemoteStore request shapes and status mapping

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use microaudit_core::domain::{OwnerId, RecordId, Table};
use microaudit_core::ports::{IRemoteStore, Query};
use microaudit_remote::RemoteError;

use crate::common::{self, fields, ANON_KEY};

#[tokio::test]
async fn test_create_posts_row_and_returns_representation() {
    let (server, client, store) = common::setup_store().await;
    client.set_access_token(Some("user-token".into()));

    Mock::given(method("POST"))
        .and(path("/rest/v1/tasks"))
        .and(header("apikey", ANON_KEY))
        .and(header("authorization", "Bearer user-token"))
        .and(header("prefer", "return=representation"))
        .and(body_json(json!({"title": "Groceries", "done": false, "user_id": "u1"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": "t42", "title": "Groceries", "done": false, "user_id": "u1",
            "updated_at": "2024-05-01T10:00:00+00:00"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let row = store
        .create(
            Table::Tasks,
            fields(json!({"title": "Groceries", "done": false, "user_id": "u1"})),
        )
        .await
        .expect("create failed");
    assert_eq!(row["id"], json!("t42"));
}

#[tokio::test]
async fn test_anonymous_requests_use_anon_key_as_bearer() {
    let (server, _client, store) = common::setup_store().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/notes"))
        .and(header("authorization", format!("Bearer {ANON_KEY}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let rows = store.query(Table::Notes, &Query::new()).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_update_patches_by_id() {
    let (server, _client, store) = common::setup_store().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/tasks"))
        .and(query_param("id", "eq.t1"))
        .and(body_json(json!({"done": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "t1", "title": "Email", "done": true, "user_id": "u1"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let row = store
        .update(
            Table::Tasks,
            &RecordId::new("t1").unwrap(),
            fields(json!({"done": true})),
        )
        .await
        .unwrap();
    assert_eq!(row["done"], json!(true));
}

#[tokio::test]
async fn test_update_of_missing_row_is_not_found() {
    let (server, _client, store) = common::setup_store().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/notes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let err = store
        .update(Table::Notes, &RecordId::new("gone").unwrap(), fields(json!({})))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RemoteError>(),
        Some(RemoteError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_by_id() {
    let (server, _client, store) = common::setup_store().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/notes"))
        .and(query_param("id", "eq.n1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    store
        .delete(Table::Notes, &RecordId::new("n1").unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_query_sends_owner_filter_order_and_limit() {
    let (server, _client, store) = common::setup_store().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/notes"))
        .and(query_param("select", "*"))
        .and(query_param("user_id", "eq.u1"))
        .and(query_param("order", "updated_at.desc"))
        .and(query_param("limit", "500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "n2", "user_id": "u1", "title": "Newer"},
            {"id": "n1", "user_id": "u1", "title": "Older"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let owner = OwnerId::new("u1").unwrap();
    let rows = store
        .query(Table::Notes, &Query::owned_by(&owner, 500))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["title"], json!("Newer"));
}

#[tokio::test]
async fn test_policy_rejection_maps_to_forbidden() {
    let (server, _client, store) = common::setup_store().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/notes"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "code": "42501",
            "message": "new row violates row-level security policy"
        })))
        .mount(&server)
        .await;

    let err = store
        .create(Table::Notes, fields(json!({"title": "x"})))
        .await
        .unwrap_err();
    match err.downcast_ref::<RemoteError>() {
        Some(RemoteError::Forbidden(message)) => {
            assert!(message.contains("row-level security"))
        }
        other => panic!("expected Forbidden, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_is_reported() {
    let (server, _client, store) = common::setup_store().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/tasks"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = store.query(Table::Tasks, &Query::new()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RemoteError>(),
        Some(RemoteError::ServerError(_))
    ));
}
