#![cfg(feature = "server")]

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::json;
use tower::ServiceExt;
use url::Url;
use wiki_oauth_login::store::MemoryAccountStore;
use wiki_oauth_login::{ClientConfig, LoginServer, LoginService, ServerConfig};
use wiremock::matchers::{body_string_contains, header as header_matcher, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COOKIE: &str = "wiki_oauth2_session";

async fn provider() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=good-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok",
            "token_type": "bearer"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=bad-code"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/me"))
        .and(header_matcher("Authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1234,
            "full_name": "Jane Doe",
            "email": "a@b.com"
        })))
        .mount(&server)
        .await;
    server
}

fn app(provider: &MockServer, store: Arc<MemoryAccountStore>) -> Router {
    let base = provider.uri();
    let config = ClientConfig::new(
        "wiki-client",
        "s3cret",
        "https://wiki.example.org/oauth2/callback",
    )
    .with_endpoints(
        format!("{base}/authorize"),
        format!("{base}/token"),
        format!("{base}/api/me"),
    )
    .with_scope("profile");
    let service = LoginService::new(&config, store).unwrap();
    let server_config = ServerConfig::new(([127, 0, 0, 1], 0).into()).with_secure_cookie(false);
    LoginServer::new(service, server_config).router()
}

async fn get(app: &Router, uri: &str, session: Option<&str>) -> axum::response::Response {
    let mut request = Request::builder().uri(uri);
    if let Some(session) = session {
        request = request.header(header::COOKIE, format!("{COOKIE}={session}"));
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn location(response: &axum::response::Response) -> String {
    response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string()
}

fn session_cookie(response: &axum::response::Response) -> String {
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    let pair = set_cookie.split(';').next().unwrap();
    let (name, value) = pair.split_once('=').unwrap();
    assert_eq!(name, COOKIE);
    value.to_string()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Follow `/oauth2/redirect` and return the session cookie and state.
async fn start_login(app: &Router) -> (String, String) {
    let response = get(app, "/oauth2/redirect", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let session = session_cookie(&response);
    let target = Url::parse(&location(&response)).unwrap();
    let pairs: HashMap<_, _> = target.query_pairs().into_owned().collect();
    (session, pairs["state"].clone())
}

#[tokio::test]
async fn redirect_points_at_configured_provider() {
    let provider = provider().await;
    let app = app(&provider, Arc::new(MemoryAccountStore::new()));

    let response = get(&app, "/oauth2/redirect", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let target = Url::parse(&location(&response)).unwrap();
    let provider_url = Url::parse(&provider.uri()).unwrap();
    assert_eq!(target.host_str(), provider_url.host_str());
    assert_eq!(target.port(), provider_url.port());
    assert_eq!(target.path(), "/authorize");

    let pairs: HashMap<_, _> = target.query_pairs().into_owned().collect();
    assert_eq!(pairs["client_id"], "wiki-client");
    assert_eq!(pairs["scope"], "profile");
    assert_eq!(pairs["response_type"], "code");
}

#[tokio::test]
async fn full_login_creates_then_reuses_account() {
    let provider = provider().await;
    let store = Arc::new(MemoryAccountStore::new());
    let app = app(&provider, store.clone());

    let (session, state) = start_login(&app).await;
    let response = get(
        &app,
        &format!("/oauth2/callback?code=good-code&state={state}"),
        Some(&session),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/wiki/Special:Preferences");
    let logged_in = session_cookie(&response);
    assert_ne!(logged_in, session);

    let page = get(&app, "/oauth2", Some(&logged_in)).await;
    assert!(body_text(page).await.contains("already logged in"));

    let (session, state) = start_login(&app).await;
    let response = get(
        &app,
        &format!("/oauth2/callback?code=good-code&state={state}"),
        Some(&session),
    )
    .await;
    assert_eq!(location(&response), "/");
    assert_eq!(store.account_count().await, 1);
    assert_eq!(store.link_count().await, 1);
}

#[tokio::test]
async fn rejected_code_is_bad_request_without_account() {
    let provider = provider().await;
    let store = Arc::new(MemoryAccountStore::new());
    let app = app(&provider, store.clone());

    let (session, state) = start_login(&app).await;
    let response = get(
        &app,
        &format!("/oauth2/callback?code=bad-code&state={state}"),
        Some(&session),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("Invalid callback"));
    assert_eq!(store.account_count().await, 0);
}

#[tokio::test]
async fn forged_state_is_rejected() {
    let provider = provider().await;
    let store = Arc::new(MemoryAccountStore::new());
    let app = app(&provider, store.clone());

    let (session, _) = start_login(&app).await;
    let response = get(
        &app,
        "/oauth2/callback?code=good-code&state=forged",
        Some(&session),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.account_count().await, 0);
}

#[tokio::test]
async fn default_page_offers_login_link() {
    let provider = provider().await;
    let app = app(&provider, Arc::new(MemoryAccountStore::new()));

    let response = get(&app, "/oauth2", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains(r#"href="/oauth2/redirect""#));
}

#[tokio::test]
async fn unknown_action_is_not_found() {
    let provider = provider().await;
    let app = app(&provider, Arc::new(MemoryAccountStore::new()));

    let response = get(&app, "/oauth2/bogus", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
