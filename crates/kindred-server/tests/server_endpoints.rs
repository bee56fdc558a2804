mod common;

use std::sync::Arc;

use common::{GatewayMode, RecordingGateway, counter, path, user};
use kindred_db_memory::MemoryStore;
use kindred_server::{AppConfig, AppState, build_app};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

struct TestServer {
    base: String,
    store: Arc<MemoryStore>,
    gateway: Arc<RecordingGateway>,
    shutdown: tokio::sync::oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }
}

async fn start_server(allow_reset: bool) -> TestServer {
    let mut config = AppConfig::default();
    config.maintenance.allow_reset = allow_reset;
    let store = Arc::new(MemoryStore::new());
    let gateway = RecordingGateway::new();
    let app = build_app(AppState::new(config, store.clone(), gateway.clone()));

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    TestServer {
        base: format!("http://{addr}"),
        store,
        gateway,
        shutdown: tx,
        handle,
    }
}

#[tokio::test]
async fn health_endpoints_work() {
    let server = start_server(false).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{}/healthz", server.base)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    let resp = client.get(format!("{}/readyz", server.base)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ready");

    server.stop().await;
}

#[tokio::test]
async fn direct_dispatch_validates_and_reports_gateway_outcome() {
    let server = start_server(false).await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/notifications/send", server.base);

    // Missing token
    let resp = client
        .post(&url)
        .json(&json!({"title": "Hi", "body": "There"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(server.gateway.sent().is_empty());

    let resp = client
        .post(&url)
        .json(&json!({
            "token": "tok1",
            "title": "Hi",
            "body": "There",
            "data": {"screen": "inbox"}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["messageId"], "msg-1");
    assert_eq!(server.gateway.sent()[0].data["screen"], "inbox");

    server.gateway.set_mode(GatewayMode::Reject);
    let resp = client
        .post(&url)
        .json(&json!({"token": "stale", "title": "Hi", "body": "There"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "UNREGISTERED");

    server.stop().await;
}

#[tokio::test]
async fn trigger_endpoint_runs_handlers() {
    let server = start_server(false).await;
    user(&server.store, "alice", "Alice", Some("tok-alice")).await;
    user(&server.store, "bob", "Bob", Some("tok1")).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/triggers/interests/i1", server.base))
        .json(&json!({"fromUserId": "alice", "toUserId": "bob"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(counter(&server.store, "bob", "totalInterestsCount").await, Some(1));
    assert_eq!(server.gateway.sent()[0].token, "tok1");

    // Invalid payloads are acknowledged so they are not redelivered.
    let resp = client
        .post(format!("{}/api/triggers/interests/i2", server.base))
        .json(&json!({"fromUserId": "alice"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(counter(&server.store, "bob", "totalInterestsCount").await, Some(1));

    let resp = client
        .post(format!("{}/api/triggers/users/u1", server.base))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client
        .post(format!("{}/api/triggers/interests/i3", server.base))
        .json(&json!([1, 2, 3]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Store failures ask the runtime to retry.
    server.store.fail_writes_to(path("users", "bob"));
    let resp = client
        .post(format!("{}/api/triggers/friendships/f1", server.base))
        .json(&json!({"user1Id": "alice", "user2Id": "bob", "senderId": "alice"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    server.stop().await;
}

#[tokio::test]
async fn documents_can_be_created_and_read() {
    let server = start_server(false).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/documents/users", server.base))
        .json(&json!({"displayName": "Erin"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = resp.json().await.unwrap();
    let doc_path = created["path"].as_str().unwrap().to_string();
    assert!(doc_path.starts_with("users/"));

    let resp = client
        .get(format!("{}/api/documents/{doc_path}", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["fields"]["displayName"], "Erin");

    let resp = client
        .get(format!("{}/api/documents/users/nobody", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    server.stop().await;
}

#[tokio::test]
async fn counter_reset_is_forbidden_when_disabled() {
    let server = start_server(false).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!(
            "{}/api/maintenance/counters/totalInterestsCount/reset",
            server.base
        ))
        .json(&json!({"confirm": "reset totalInterestsCount"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    server.stop().await;
}

#[tokio::test]
async fn maintenance_endpoints_work() {
    let server = start_server(true).await;
    user(&server.store, "bob", "Bob", None).await;
    let client = reqwest::Client::new();
    let reset_url = format!(
        "{}/api/maintenance/counters/totalInterestsCount/reset",
        server.base
    );

    let resp = client
        .post(&reset_url)
        .json(&json!({"confirm": "yes"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .post(&reset_url)
        .json(&json!({"confirm": "reset totalInterestsCount"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["counter"], "totalInterestsCount");
    assert_eq!(body["usersUpdated"], 1);
    assert_eq!(counter(&server.store, "bob", "totalInterestsCount").await, Some(0));

    let resp = client
        .post(format!(
            "{}/api/maintenance/counters/totalFriendRequestsCount/recount",
            server.base
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["usersScanned"], 1);

    let resp = client
        .post(format!("{}/api/maintenance/counters/likes/recount", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client
        .post(format!("{}/api/maintenance/sweeps/interests", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["collection"], "interests");
    assert_eq!(body["deleted"], 0);

    let resp = client
        .post(format!("{}/api/maintenance/sweeps/users", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    server.stop().await;
}
