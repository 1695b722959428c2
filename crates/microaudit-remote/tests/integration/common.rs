//! Shared test helpers for the REST adapter integration tests
//!
//! Each helper starts a mock server and returns adapters pointing at it.

use std::sync::Arc;

use serde_json::Value;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use microaudit_core::domain::Fields;
use microaudit_remote::{RestClient, RestIdentityProvider, RestRemoteStore};

pub const ANON_KEY: &str = "test-anon-key";

/// Starts a mock server and returns a client bound to it
pub async fn setup() -> (MockServer, Arc<RestClient>) {
    let server = MockServer::start().await;
    let client = Arc::new(RestClient::new(server.uri(), ANON_KEY));
    (server, client)
}

/// Starts a mock server and returns a store bound to it
pub async fn setup_store() -> (MockServer, Arc<RestClient>, RestRemoteStore) {
    let (server, client) = setup().await;
    let store = RestRemoteStore::new(Arc::clone(&client));
    (server, client, store)
}

/// Starts a mock server and returns an identity provider bound to it
pub async fn setup_identity() -> (MockServer, Arc<RestClient>, RestIdentityProvider) {
    let (server, client) = setup().await;
    let identity = RestIdentityProvider::new(Arc::clone(&client));
    (server, client, identity)
}

/// Mounts a successful password grant for `user_id`
pub async fn mount_password_grant(server: &MockServer, user_id: &str, token: &str) {
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": token,
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-1",
            "user": { "id": user_id, "email": "ada@example.com" }
        })))
        .mount(server)
        .await;
}

/// Converts a JSON object literal into a field map
pub fn fields(value: Value) -> Fields {
    value.as_object().cloned().expect("object literal")
}
