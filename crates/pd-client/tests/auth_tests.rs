//! Session lifecycle against a mock backend: login, refresh-and-retry
//! on expiry, and logout.

use pd_client::session::{MemorySessionStore, SessionStore};
use pd_client::{Client, Config, Error, Session};
use reqwest::{Method, StatusCode};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn user_json() -> serde_json::Value {
    json!({"userid": 7, "name": "Ava Chen", "email": "ava@pipedeck.io", "roleid": 5})
}

fn session(token: &str, refresh: Option<&str>) -> Session {
    serde_json::from_value(json!({
        "user": user_json(),
        "token": token,
        "refreshToken": refresh,
    }))
    .unwrap()
}

async fn mount_role_access(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/role-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;
}

async fn anonymous_client(server: &MockServer) -> (Client, Arc<MemorySessionStore>) {
    let store = Arc::new(MemorySessionStore::new());
    let client = Client::with_store(Config::new(server.uri()), store.clone())
        .await
        .unwrap();
    (client, store)
}

async fn restored_client(
    server: &MockServer,
    seed: Session,
) -> (Client, Arc<MemorySessionStore>) {
    let store = Arc::new(MemorySessionStore::new());
    store.save(&seed).await.unwrap();
    let client = Client::with_store(Config::new(server.uri()), store.clone())
        .await
        .unwrap();
    (client, store)
}

#[tokio::test]
async fn login_lowercases_email_and_persists_the_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({"email": "ava@pipedeck.io", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": user_json(),
            "token": "tok-1",
            "refreshToken": "ref-1"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_role_access(&server).await;

    let (client, store) = anonymous_client(&server).await;
    let session = client.login("Ava@Pipedeck.IO", "secret").await.unwrap();

    assert_eq!(session.access_token, "tok-1");
    assert_eq!(session.user.user_id, 7);
    assert!(client.is_authenticated());

    let persisted = store.load().await.expect("session should be persisted");
    assert_eq!(persisted.access_token, "tok-1");
    assert_eq!(persisted.refresh_token.as_deref(), Some("ref-1"));
}

#[tokio::test]
async fn rejected_credentials_surface_as_invalid_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store) = anonymous_client(&server).await;
    let err = client.login("ava@pipedeck.io", "wrong").await.unwrap_err();

    assert!(matches!(err, Error::InvalidCredentials));
    assert!(!client.is_authenticated());
    assert!(store.load().await.is_none());
}

#[tokio::test]
async fn disabled_account_is_rejected_without_persisting() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {
                "userid": 7,
                "name": "Ava Chen",
                "email": "ava@pipedeck.io",
                "roleid": 5,
                "status": "Disabled"
            },
            "token": "tok-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store) = anonymous_client(&server).await;
    let err = client.login("ava@pipedeck.io", "secret").await.unwrap_err();

    assert!(matches!(err, Error::AccountDisabled));
    assert!(!client.is_authenticated());
    assert!(store.load().await.is_none());
}

#[tokio::test]
async fn expired_token_is_refreshed_and_the_request_retried() {
    let server = MockServer::start().await;
    mount_role_access(&server).await;

    // The stale token is rejected exactly once.
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("Authorization", "Bearer tok-old"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/refresh"))
        .and(body_json(json!({"refreshToken": "ref-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok-new"})))
        .expect(1)
        .mount(&server)
        .await;
    // The retry must carry the freshly issued token.
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("Authorization", "Bearer tok-new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store) = restored_client(&server, session("tok-old", Some("ref-1"))).await;
    client.refresh_profile().await.unwrap();

    let live = client.session().unwrap();
    assert_eq!(live.access_token, "tok-new");
    // The server issued no new refresh token, so the old one stays.
    assert_eq!(live.refresh_token.as_deref(), Some("ref-1"));

    let persisted = store.load().await.unwrap();
    assert_eq!(persisted.access_token, "tok-new");
}

#[tokio::test]
async fn rotated_refresh_token_is_adopted() {
    let server = MockServer::start().await;
    mount_role_access(&server).await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("Authorization", "Bearer tok-old"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "tok-new",
            "refreshToken": "ref-2"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
        .mount(&server)
        .await;

    let (client, store) = restored_client(&server, session("tok-old", Some("ref-1"))).await;
    client.refresh_profile().await.unwrap();

    let persisted = store.load().await.unwrap();
    assert_eq!(persisted.access_token, "tok-new");
    assert_eq!(persisted.refresh_token.as_deref(), Some("ref-2"));
}

#[tokio::test]
async fn second_unauthorized_drops_the_session() {
    let server = MockServer::start().await;
    mount_role_access(&server).await;

    // Both the original attempt and the retry come back 401.
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok-new"})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store) = restored_client(&server, session("tok-old", Some("ref-1"))).await;
    client.refresh_profile().await.unwrap();

    assert!(!client.is_authenticated());
    assert!(store.load().await.is_none());
}

#[tokio::test]
async fn failed_refresh_drops_the_session_and_returns_the_original_response() {
    let server = MockServer::start().await;
    mount_role_access(&server).await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store) = restored_client(&server, session("tok-old", Some("ref-1"))).await;
    let auth = client.auth();
    let response = auth.send(auth.request(Method::GET, "/me")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(!client.is_authenticated());
    assert!(store.load().await.is_none());
}

#[tokio::test]
async fn missing_refresh_token_drops_the_session_without_a_refresh_call() {
    let server = MockServer::start().await;
    mount_role_access(&server).await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (client, store) = restored_client(&server, session("tok-old", None)).await;
    let auth = client.auth();
    let response = auth.send(auth.request(Method::GET, "/me")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(!client.is_authenticated());
    assert!(store.load().await.is_none());
}

#[tokio::test]
async fn forced_logout_after_failed_refresh_empties_the_access_map() {
    let server = MockServer::start().await;
    // Resolved once at construction; the forced logout clears the map
    // without another fetch.
    Mock::given(method("GET"))
        .and(path("/role-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dashboard": {"agent": true}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = restored_client(&server, session("tok-old", Some("ref-1"))).await;
    assert!(client.access().is_allowed("dashboard"));

    let auth = client.auth();
    let response = auth.send(auth.request(Method::GET, "/me")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(!client.is_authenticated());
    assert!(!client.access().is_allowed("dashboard"));
    assert!(client.access().snapshot().is_empty());
}

#[tokio::test]
async fn forced_logout_after_second_unauthorized_empties_the_access_map() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/role-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dashboard": {"agent": true}
        })))
        .expect(1)
        .mount(&server)
        .await;
    // Both the original attempt and the retry come back 401.
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok-new"})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = restored_client(&server, session("tok-old", Some("ref-1"))).await;
    assert!(client.access().is_allowed("dashboard"));

    client.refresh_profile().await.unwrap();

    assert!(!client.is_authenticated());
    assert!(!client.access().is_allowed("dashboard"));
    assert!(client.access().snapshot().is_empty());
}

#[tokio::test]
async fn refresh_profile_is_a_no_op_when_logged_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
        .expect(0)
        .mount(&server)
        .await;

    let (client, _) = anonymous_client(&server).await;
    client.refresh_profile().await.unwrap();
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn refresh_profile_adopts_the_server_copy_of_the_user() {
    let server = MockServer::start().await;
    mount_role_access(&server).await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "userid": 7,
            "name": "Ava Chen-Park",
            "email": "ava@pipedeck.io",
            "roleid": 5
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store) = restored_client(&server, session("tok-1", Some("ref-1"))).await;
    client.refresh_profile().await.unwrap();

    assert_eq!(client.current_user().unwrap().name, "Ava Chen-Park");
    assert_eq!(store.load().await.unwrap().user.name, "Ava Chen-Park");
}

#[tokio::test]
async fn logout_is_idempotent() {
    let server = MockServer::start().await;
    mount_role_access(&server).await;

    let (client, store) = restored_client(&server, session("tok-1", Some("ref-1"))).await;
    assert!(client.is_authenticated());

    client.logout().await;
    client.logout().await;

    assert!(!client.is_authenticated());
    assert!(store.load().await.is_none());
}
