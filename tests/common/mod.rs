#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use profile_service::config::{AppConfig, StoreBackend};
use profile_service::database::DatabaseManager;
use profile_service::{router, AppState};

pub const SECRET: &str = "integration-test-secret";
pub const BOUNDARY: &str = "profile-service-test-boundary";

pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13, b'I', b'H', b'D', b'R'];
pub const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 16, b'J', b'F', b'I', b'F', 0];

// ---------------------------------------------------------------------------
// Spawned binary
// ---------------------------------------------------------------------------

/// A running `profile-service serve` process, killed when dropped.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub uploads: TempDir,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let uploads = tempfile::tempdir().context("failed to create uploads dir")?;

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_profile-service"));
        cmd.arg("serve")
            .env("PORT", port.to_string())
            .env("STORE_BACKEND", "memory")
            .env("UPLOADS_DIR", uploads.path())
            .env("AUTH_SECRET", SECRET)
            // All e2e requests share 127.0.0.1
            .env("LIMITER_BURST", "1000")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, uploads, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK {
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

/// Starts a fresh server for one test and waits until it answers.
pub async fn spawn_server() -> Result<TestServer> {
    let server = TestServer::spawn()?;
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Mints a token through the binary's `token` subcommand.
pub fn cli_token(subject: Uuid) -> Result<String> {
    let subject = subject.to_string();
    let output = Command::new(env!("CARGO_BIN_EXE_profile-service"))
        .args(["token", subject.as_str(), "--hours", "1"])
        .env("AUTH_SECRET", SECRET)
        .output()
        .context("failed to run token command")?;
    anyhow::ensure!(output.status.success(), "token command failed: {:?}", output);
    Ok(String::from_utf8(output.stdout)?.trim().to_string())
}

// ---------------------------------------------------------------------------
// In-process router
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub uploads: TempDir,
}

impl TestApp {
    /// Memory-backed app with the limiter off.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let uploads = tempfile::tempdir().expect("failed to create uploads dir");

        let mut config = AppConfig::development();
        config.server.uploads_dir = uploads.path().to_path_buf();
        config.database.backend = StoreBackend::Memory;
        config.rate_limit.enabled = false;
        config.security.jwt_secret = SECRET.to_string();
        adjust(&mut config);

        let stores = DatabaseManager::memory(Duration::from_millis(config.database.query_timeout_ms));
        let state = AppState::new(&config, stores);

        Self {
            router: router(state.clone()),
            state,
            uploads,
        }
    }

    pub fn token(&self, subject: Uuid) -> String {
        self.state
            .authenticator
            .issue(subject, chrono::Duration::hours(1))
            .expect("failed to issue token")
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.expect("router error");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub fn stored_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.uploads.path())
            .map(|dir| {
                dir.filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

// ---------------------------------------------------------------------------
// Request builders
// ---------------------------------------------------------------------------

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, bearer(token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, if_match: Option<i32>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, bearer(token));
    }
    if let Some(version) = if_match {
        builder = builder.header(header::IF_MATCH, format!("\"{}\"", version));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Builds a profile form with an optional name and an optional file part.
pub fn profile_form(name: Option<&str>, picture: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(name) = name {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"profile_name\"\r\n\r\n");
        body.extend_from_slice(name.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    if let Some((filename, content)) = picture {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"profile_picture\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_request(method: &str, uri: &str, token: Option<&str>, if_match: Option<i32>, form: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY));
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, bearer(token));
    }
    if let Some(version) = if_match {
        builder = builder.header(header::IF_MATCH, version.to_string());
    }
    builder.body(Body::from(form)).unwrap()
}
