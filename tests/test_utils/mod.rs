//! Shared fixtures for the API-backed integration tests.
//!
//! Every helper points the client at a wiremock server mounted under
//! `/api/v1`, mirroring the production base path.

#![allow(dead_code)]

use std::sync::Arc;

use affiliate_console::{
    api::ApiClient,
    config::{AppConfig, CacheConfig},
    page::PageScope,
    session::{AuthTokens, Session},
};
use serde_json::{Value, json};
use wiremock::MockServer;

pub const ACCESS_TOKEN: &str = "access-1";
pub const REFRESH_TOKEN: &str = "refresh-1";

/// Config aimed at `server` with a small page size and a long cache TTL.
pub fn test_config(server: &MockServer) -> AppConfig {
    AppConfig {
        api_base_url: format!("{}/api/v1", server.uri()),
        request_timeout_ms: 5_000,
        page_size: 2,
        cache: CacheConfig {
            ttl_seconds: 300,
            capacity: 16,
        },
        ..AppConfig::default()
    }
}

pub fn signed_in_session() -> Arc<Session> {
    let session = Session::new();
    session.sign_in(
        AuthTokens {
            access_token: ACCESS_TOKEN.to_string(),
            refresh_token: Some(REFRESH_TOKEN.to_string()),
        },
        None,
    );
    Arc::new(session)
}

pub fn api_client(server: &MockServer, session: Arc<Session>) -> Arc<ApiClient> {
    Arc::new(ApiClient::new(&test_config(server), session).expect("client builds"))
}

/// A page scope with a signed-in session, plus the client behind it.
pub fn page_scope(server: &MockServer) -> (PageScope, Arc<ApiClient>) {
    let client = api_client(server, signed_in_session());
    let scope = PageScope::new(client.clone(), &test_config(server));
    (scope, client)
}

pub fn payment(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "userName": format!("user {id}"),
        "amount": 100.0,
        "currency": "USD",
        "status": status,
        "type": "withdrawal",
        "createdAt": "2024-03-01T10:00:00Z"
    })
}

pub fn list_body(items: Vec<Value>, has_more: bool, next_cursor: Option<&str>) -> Value {
    json!({
        "items": items,
        "total": 10,
        "hasMore": has_more,
        "nextCursor": next_cursor,
    })
}
