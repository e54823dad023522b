//! Client tests against a mock auth server on an ephemeral port.

use super::*;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode as AxumStatus},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex, PoisonError,
};
use tokio::{net::TcpListener, task::JoinSet};

struct MockAuth {
    access: Mutex<String>,
    refresh: Mutex<String>,
    generation: AtomicUsize,
    refresh_calls: AtomicUsize,
    me_calls: AtomicUsize,
    refresh_delay: Duration,
}

impl MockAuth {
    fn new(refresh_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            access: Mutex::new("access-0".to_string()),
            refresh: Mutex::new("refresh-0".to_string()),
            generation: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            me_calls: AtomicUsize::new(0),
            refresh_delay,
        })
    }

    fn current_access(&self) -> String {
        self.access
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Invalidate the access token without touching the refresh token.
    fn expire_access(&self) {
        *self.access.lock().unwrap_or_else(PoisonError::into_inner) = "expired".to_string();
    }

    fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

fn unauthorized(detail: &str) -> axum::response::Response {
    (AxumStatus::UNAUTHORIZED, Json(json!({ "detail": detail }))).into_response()
}

fn user_json() -> Value {
    json!({
        "id": "01J00000000000000000000000",
        "email": "alice@example.com",
        "name": "Alice",
        "isActive": true,
        "createdAt": "2024-01-01T00:00:00Z",
        "tier": "free"
    })
}

async fn me(State(mock): State<Arc<MockAuth>>, headers: HeaderMap) -> axum::response::Response {
    mock.me_calls.fetch_add(1, Ordering::SeqCst);
    let expected = format!("Bearer {}", mock.current_access());
    let presented = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if presented == expected {
        Json(user_json()).into_response()
    } else {
        unauthorized("Token has expired")
    }
}

async fn refresh_handler(
    State(mock): State<Arc<MockAuth>>,
    Json(body): Json<Value>,
) -> axum::response::Response {
    mock.refresh_calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(mock.refresh_delay).await;

    let current = mock
        .refresh
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    if body["refreshToken"] != current.as_str() {
        return unauthorized("Token has been revoked");
    }

    let generation = mock.generation.fetch_add(1, Ordering::SeqCst) + 1;
    let access = format!("access-{generation}");
    let refresh = format!("refresh-{generation}");
    *mock.access.lock().unwrap_or_else(PoisonError::into_inner) = access.clone();
    *mock.refresh.lock().unwrap_or_else(PoisonError::into_inner) = refresh.clone();

    Json(json!({
        "accessToken": access,
        "refreshToken": refresh,
        "tokenType": "bearer",
        "expiresIn": 1800
    }))
    .into_response()
}

async fn spawn(mock: Arc<MockAuth>) -> String {
    let app = Router::new()
        .route("/api/v1/auth/me", get(me))
        .route("/api/v1/auth/refresh", post(refresh_handler))
        .route(
            "/api/v1/auth/login",
            post(|| async { unauthorized("Incorrect email or password") }),
        )
        .route(
            "/api/v1/auth/logout",
            post(|| async { AxumStatus::INTERNAL_SERVER_ERROR }),
        )
        .route("/always-401", get(|| async { unauthorized("nope") }))
        .with_state(mock);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("mock server address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn client(base: &str, store: Arc<dyn TokenStore>) -> AuthClient {
    AuthClient::new(base)
        .expect("valid base url")
        .with_token_store(store)
}

#[tokio::test]
async fn concurrent_401s_share_one_refresh() {
    let mock = MockAuth::new(Duration::from_millis(100));
    mock.expire_access();
    let base = spawn(mock.clone()).await;
    let store = Arc::new(MemoryTokenStore::with_tokens("access-0", "refresh-0"));
    let client = client(&base, store.clone());

    let mut requests = JoinSet::new();
    for _ in 0..8 {
        let client = client.clone();
        requests.spawn(async move { client.me().await });
    }

    let mut completed = 0;
    while let Some(result) = requests.join_next().await {
        let user = result.expect("task").expect("me succeeds after refresh");
        assert_eq!(user.email, "alice@example.com");
        completed += 1;
    }

    assert_eq!(completed, 8);
    assert_eq!(mock.refresh_calls(), 1);
    assert_eq!(store.access_token().as_deref(), Some("access-1"));
    assert_eq!(store.refresh_token().as_deref(), Some("refresh-1"));
    assert!(!client.refresh.in_flight());
}

#[tokio::test]
async fn failed_refresh_clears_tokens_and_expires_session() {
    let mock = MockAuth::new(Duration::from_millis(50));
    mock.expire_access();
    let base = spawn(mock.clone()).await;
    let store = Arc::new(MemoryTokenStore::with_tokens("access-0", "revoked"));
    let redirects = Arc::new(Mutex::new(Vec::new()));
    let seen = redirects.clone();
    let client = client(&base, store.clone())
        .with_login_path("/auth/sign-in")
        .with_session_expired_hook(move |path| {
            seen.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(path.to_string());
        });

    let mut requests = JoinSet::new();
    for _ in 0..4 {
        let client = client.clone();
        requests.spawn(async move { client.me().await });
    }
    while let Some(result) = requests.join_next().await {
        let err = result.expect("task").expect_err("session expired");
        assert!(
            matches!(&err, ClientError::SessionExpired { login_path } if login_path == "/auth/sign-in"),
            "{err}"
        );
    }

    assert_eq!(mock.refresh_calls(), 1);
    assert_eq!(store.access_token(), None);
    assert_eq!(store.refresh_token(), None);
    assert_eq!(
        redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_slice(),
        ["/auth/sign-in".to_string()]
    );

    // nothing is sent until the next login
    let me_calls = mock.me_calls.load(Ordering::SeqCst);
    assert!(matches!(
        client.me().await,
        Err(ClientError::SessionExpired { .. })
    ));
    assert_eq!(mock.me_calls.load(Ordering::SeqCst), me_calls);
    assert_eq!(mock.refresh_calls(), 1);
}

#[tokio::test]
async fn second_401_is_not_refreshed_again() {
    let mock = MockAuth::new(Duration::ZERO);
    let base = spawn(mock.clone()).await;
    let store = Arc::new(MemoryTokenStore::with_tokens("access-0", "refresh-0"));
    let client = client(&base, store);

    let response = client
        .send(client.request(Method::GET, "/always-401"))
        .await
        .expect("response is returned");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(mock.refresh_calls(), 1);
}

#[tokio::test]
async fn public_calls_never_refresh() {
    let mock = MockAuth::new(Duration::ZERO);
    let base = spawn(mock.clone()).await;
    let store = Arc::new(MemoryTokenStore::with_tokens("access-0", "refresh-0"));
    let client = client(&base, store.clone());

    let err = client
        .login(&UserLogin {
            email: "alice@example.com".to_string(),
            password: "Wrong123!".to_string(),
            recaptcha_token: None,
        })
        .await
        .expect_err("bad credentials");
    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    assert_eq!(err.to_string(), "Request failed (401 Unauthorized): Incorrect email or password");
    assert_eq!(mock.refresh_calls(), 0);
    assert_eq!(store.access_token().as_deref(), Some("access-0"));
}

/// Returns `first` on the first read of the access token, `then` afterwards,
/// as if another request rotated the tokens mid-flight.
struct RotatingStore {
    reads: AtomicUsize,
    first: String,
    then: String,
}

impl TokenStore for RotatingStore {
    fn access_token(&self) -> Option<String> {
        if self.reads.fetch_add(1, Ordering::SeqCst) == 0 {
            Some(self.first.clone())
        } else {
            Some(self.then.clone())
        }
    }

    fn refresh_token(&self) -> Option<String> {
        Some("refresh-0".to_string())
    }

    fn set_tokens(&self, _access: &str, _refresh: &str) -> Result<(), ClientError> {
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        Ok(())
    }
}

#[tokio::test]
async fn rotated_token_is_retried_without_refresh() {
    let mock = MockAuth::new(Duration::ZERO);
    let base = spawn(mock.clone()).await;
    let store = Arc::new(RotatingStore {
        reads: AtomicUsize::new(0),
        first: "outdated".to_string(),
        then: mock.current_access(),
    });
    let client = client(&base, store);

    let user = client.me().await.expect("retried with stored token");
    assert_eq!(user.name, "Alice");
    assert_eq!(mock.refresh_calls(), 0);
    assert_eq!(mock.me_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn dropped_refresh_rejects_waiters() {
    let mock = MockAuth::new(Duration::from_secs(30));
    mock.expire_access();
    let base = spawn(mock.clone()).await;
    let store = Arc::new(MemoryTokenStore::with_tokens("access-0", "refresh-0"));
    let client = client(&base, store);

    let leader = {
        let client = client.clone();
        tokio::spawn(async move { client.me().await })
    };
    while !client.refresh.in_flight() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let waiter = {
        let client = client.clone();
        tokio::spawn(async move { client.me().await })
    };
    while mock.me_calls.load(Ordering::SeqCst) < 2 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    // let the waiter park behind the leader
    tokio::time::sleep(Duration::from_millis(50)).await;

    leader.abort();
    let result = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("waiter settles")
        .expect("task");
    assert!(matches!(result, Err(ClientError::Cancelled)));
    assert!(!client.refresh.in_flight());
}

#[tokio::test]
async fn explicit_refresh_rotates_tokens() {
    let mock = MockAuth::new(Duration::ZERO);
    let base = spawn(mock.clone()).await;
    let store = Arc::new(MemoryTokenStore::with_tokens("access-0", "refresh-0"));
    let client = client(&base, store.clone());

    assert_eq!(client.refresh().await.expect("refresh"), "access-1");
    assert_eq!(store.refresh_token().as_deref(), Some("refresh-1"));
    assert_eq!(client.me().await.expect("me").id, "01J00000000000000000000000");
}

#[tokio::test]
async fn logout_always_clears_tokens() {
    let mock = MockAuth::new(Duration::ZERO);
    let base = spawn(mock.clone()).await;
    let store = Arc::new(MemoryTokenStore::with_tokens("access-0", "refresh-0"));
    let client = client(&base, store.clone());

    client.logout().await.expect("logout");
    assert_eq!(store.access_token(), None);
    assert_eq!(store.refresh_token(), None);
}

#[test]
fn urls_join_base_and_path() {
    let client = AuthClient::new("http://localhost:8080/").expect("valid");
    assert_eq!(
        client.url("/api/v1/auth/me"),
        "http://localhost:8080/api/v1/auth/me"
    );
    assert!(matches!(
        AuthClient::new("not a url"),
        Err(ClientError::Config(_))
    ));
}

#[test]
fn error_message_prefers_detail() {
    assert_eq!(error_message(r#"{"detail":"User not found"}"#), "User not found");
    assert_eq!(error_message("  plain text  "), "plain text");
    assert_eq!(error_message(&"x".repeat(500)).len(), MAX_ERROR_CHARS);
}

fn recording_hook(client: AuthClient) -> (AuthClient, Arc<Mutex<Vec<String>>>) {
    let redirects = Arc::new(Mutex::new(Vec::new()));
    let seen = redirects.clone();
    let client = client.with_session_expired_hook(move |path| {
        seen.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_string());
    });
    (client, redirects)
}

#[tokio::test]
async fn network_failure_during_refresh_rejects_queue() {
    // The refresh endpoint answers long after the client gives up.
    let mock = MockAuth::new(Duration::from_millis(500));
    mock.expire_access();
    let base = spawn(mock.clone()).await;
    let store = Arc::new(MemoryTokenStore::with_tokens("access-0", "refresh-0"));
    let http = Client::builder()
        .timeout(Duration::from_millis(150))
        .build()
        .expect("http client");
    let (client, redirects) = recording_hook(client(&base, store.clone()).with_http_client(http));

    let mut requests = JoinSet::new();
    for _ in 0..5 {
        let client = client.clone();
        requests.spawn(async move { client.me().await });
    }
    let mut rejected = 0;
    while let Some(result) = requests.join_next().await {
        let err = result.expect("task").expect_err("refresh timed out");
        assert!(matches!(err, ClientError::SessionExpired { .. }), "{err}");
        rejected += 1;
    }

    assert_eq!(rejected, 5);
    assert_eq!(mock.refresh_calls(), 1);
    assert_eq!(store.access_token(), None);
    assert_eq!(store.refresh_token(), None);
    assert_eq!(
        redirects.lock().unwrap_or_else(PoisonError::into_inner).len(),
        1
    );
    assert!(!client.refresh.in_flight());
}

#[tokio::test]
async fn missing_refresh_token_expires_session() {
    let mock = MockAuth::new(Duration::ZERO);
    mock.expire_access();
    let base = spawn(mock.clone()).await;
    let store = Arc::new(MemoryTokenStore::with_access_token("access-0"));
    let (client, redirects) = recording_hook(client(&base, store.clone()));

    let err = client.me().await.expect_err("no refresh token");
    assert!(matches!(err, ClientError::SessionExpired { .. }), "{err}");

    // Nothing to exchange, so the server never sees a refresh.
    assert_eq!(mock.refresh_calls(), 0);
    assert_eq!(mock.me_calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.access_token(), None);
    assert_eq!(
        redirects.lock().unwrap_or_else(PoisonError::into_inner).len(),
        1
    );

    let me_calls = mock.me_calls.load(Ordering::SeqCst);
    assert!(matches!(
        client.me().await,
        Err(ClientError::SessionExpired { .. })
    ));
    assert_eq!(mock.me_calls.load(Ordering::SeqCst), me_calls);
}
