use std::sync::Arc;
use std::time::Duration;

use affiliate_console::{
    ClientError,
    api::CollectionApi,
    query::{Collection, ListQuery},
    session::Session,
    telemetry::{TraceContext, with_trace_context},
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path},
};

mod test_utils;
use test_utils::{ACCESS_TOKEN, REFRESH_TOKEN, api_client, list_body, payment, signed_in_session};

const PAYMENTS: &str = "/api/v1/admin/payments";
const REFRESH: &str = "/api/v1/auth/refresh-token";

fn payments_query() -> ListQuery {
    ListQuery::new(Collection::AdminPayments, 10)
}

async fn mount_expired_access_token(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(PAYMENTS))
        .and(header("authorization", format!("Bearer {ACCESS_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "jwt expired" })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn expired_token_is_refreshed_and_request_retried_once() {
    let server = MockServer::start().await;
    mount_expired_access_token(&server).await;

    Mock::given(method("POST"))
        .and(path(REFRESH))
        .and(body_json(json!({ "refreshToken": REFRESH_TOKEN })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "access-2" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(PAYMENTS))
        .and(header("authorization", "Bearer access-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body(
            vec![payment("p1", "pending")],
            false,
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let session = signed_in_session();
    let client = api_client(&server, Arc::clone(&session));

    let page = client.fetch_page(&payments_query()).await.expect("retried fetch");
    assert_eq!(page.items.len(), 1);
    assert_eq!(session.access_token().as_deref(), Some("access-2"));
    // The server did not rotate the refresh token.
    assert_eq!(session.refresh_token().as_deref(), Some(REFRESH_TOKEN));
}

#[tokio::test]
async fn concurrent_unauthorized_requests_share_one_refresh() {
    let server = MockServer::start().await;
    mount_expired_access_token(&server).await;

    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "accessToken": "access-2", "refreshToken": "refresh-2" }))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(PAYMENTS))
        .and(header("authorization", "Bearer access-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body(vec![], false, None)))
        .expect(2)
        .mount(&server)
        .await;

    let session = signed_in_session();
    let client = api_client(&server, Arc::clone(&session));
    let query = payments_query();

    let (a, b) = tokio::join!(client.fetch_page(&query), client.fetch_page(&query));
    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(session.refresh_token().as_deref(), Some("refresh-2"));
}

#[tokio::test]
async fn rejected_refresh_signs_the_user_out() {
    let server = MockServer::start().await;
    mount_expired_access_token(&server).await;

    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let session = signed_in_session();
    let client = api_client(&server, Arc::clone(&session));

    let err = client.fetch_page(&payments_query()).await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized { .. }));
    assert!(err.is_fatal());
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn second_unauthorized_after_refresh_signs_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(PAYMENTS))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "access-2" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = signed_in_session();
    let client = api_client(&server, Arc::clone(&session));

    let err = client.fetch_page(&payments_query()).await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized { .. }));
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn login_stores_tokens_and_profile() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .and(body_json(json!({ "email": "admin@example.com", "password": "hunter22" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "fresh-access",
            "refreshToken": "fresh-refresh",
            "user": {
                "id": "u1",
                "name": "Ada Admin",
                "email": "admin@example.com",
                "role": "admin"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = Arc::new(Session::new());
    let client = api_client(&server, Arc::clone(&session));

    let user = client
        .login("admin@example.com", "hunter22")
        .await
        .expect("login succeeds")
        .expect("profile returned");
    assert!(user.is_admin());
    assert_eq!(session.access_token().as_deref(), Some("fresh-access"));
    assert_eq!(session.refresh_token().as_deref(), Some("fresh-refresh"));
    assert_eq!(session.user().map(|u| u.id), Some("u1".to_string()));
}

#[tokio::test]
async fn bad_credentials_fail_without_a_refresh_attempt() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "message": "Invalid credentials" })),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let session = Arc::new(Session::new());
    let client = api_client(&server, Arc::clone(&session));

    let err = client.login("a@example.com", "wrong").await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Unauthorized { ref message } if message == "Invalid credentials"
    ));
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn logout_clears_session_even_when_server_call_fails() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let session = signed_in_session();
    let client = api_client(&server, Arc::clone(&session));

    client.logout().await;
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn requests_carry_the_active_trace_id() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/team/stats"))
        .and(header("x-request-id", "req-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "totalMembers": 3 })))
        .expect(1)
        .mount(&server)
        .await;

    let client = api_client(&server, signed_in_session());
    let stats = with_trace_context(
        TraceContext {
            trace_id: "req-42".to_string(),
        },
        client.fetch_stats(Collection::Team),
    )
    .await
    .expect("stats fetched");
    assert_eq!(stats["totalMembers"], 3);
}
