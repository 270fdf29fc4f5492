#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use lexdesk_api::config::AppConfig;
use lexdesk_api::database::MemoryStore;
use lexdesk_api::encryption::{AppKey, AttributeCodec, FieldCipher, KEY_SIZE};
use lexdesk_api::routes::{self, AppState};
use lexdesk_api::services::EntityService;

pub const SCAN_LIMIT: usize = 50;

/// Router over a fresh in-memory store with a fixed key. The store is
/// returned so tests can look at rows in storage form.
pub fn test_app() -> (Router, Arc<MemoryStore>) {
    test_app_with_scan_limit(SCAN_LIMIT)
}

pub fn test_app_with_scan_limit(max_scan_rows: usize) -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let codec = AttributeCodec::new(FieldCipher::new(&test_key())).with_fallback_logging(false);
    let service = EntityService::new(store.clone(), Arc::new(codec), max_scan_rows);
    let state = AppState::new(service, &AppConfig::development());
    (routes::app(state), store)
}

pub fn test_key() -> AppKey {
    AppKey::from_bytes([9u8; KEY_SIZE])
}

/// One request through the router; returns status and parsed JSON body
pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json)?)
        }
        None => Body::empty(),
    };
    let request = builder.body(body)?;

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).with_context(|| format!("non-JSON body from {}", uri))?
    };
    Ok((status, json))
}

pub async fn get(app: &Router, uri: &str) -> Result<(StatusCode, Value)> {
    send(app, Method::GET, uri, None).await
}

pub async fn post(app: &Router, uri: &str, body: Value) -> Result<(StatusCode, Value)> {
    send(app, Method::POST, uri, Some(body)).await
}

/// Create a record and return its id, failing the test on any non-201
pub async fn create(app: &Router, entity: &str, body: Value) -> Result<i64> {
    let (status, json) = post(app, &format!("/api/{}", entity), body).await?;
    anyhow::ensure!(status == StatusCode::CREATED, "create {} failed: {} {}", entity, status, json);
    json["data"]["id"].as_i64().context("created record has no id")
}

/// The server binary on its own port, in-memory storage, throwaway key
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    pub fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_lexdesk-api"));
        cmd.env("LEXDESK_API_PORT", port.to_string())
            .env("DATABASE_BACKEND", "memory")
            .env("APP_ENV", "development")
            .env("APP_KEY", AppKey::generate().to_config_string())
            .env_remove("APP_PREVIOUS_KEY")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;
        Ok(Self { port, base_url, child })
    }

    pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK
                    || resp.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE
                {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub async fn start_server() -> Result<TestServer> {
    let server = TestServer::spawn()?;
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}
