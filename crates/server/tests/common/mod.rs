//! Common test utilities for in-process API testing.
//!
//! `TestFixture` builds the real router over a temp storage root, a file
//! backed catalog and the mock encoder, so uploads run the whole ingest
//! pipeline without ffmpeg.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use reelpipe_core::testing::MockEncoder;
use reelpipe_core::{
    create_authenticator, load_config_from_str, ApiKeyEntry, AuthMethod, IngestCoordinator,
    SqliteVideoCatalog, StorageLayout,
};
use reelpipe_server::api::{create_router, WsBroadcaster};
use reelpipe_server::state::AppState;

/// Re-export fixtures for test convenience
pub use reelpipe_core::testing::fixtures;

pub const BOUNDARY: &str = "reelpipe-test-boundary";

pub struct TestFixture {
    pub router: Router,
    pub encoder: Arc<MockEncoder>,
    pub catalog: Arc<SqliteVideoCatalog>,
    pub storage: StorageLayout,
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub body: Value,
}

impl TestResponse {
    /// Body parsed as newline-delimited JSON.
    pub fn lines(&self) -> Vec<Value> {
        String::from_utf8_lossy(&self.bytes)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).expect("invalid NDJSON line"))
            .collect()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// One multipart field.
pub struct Part {
    pub name: &'static str,
    pub filename: Option<&'static str>,
    pub data: Vec<u8>,
}

impl Part {
    pub fn text(name: &'static str, value: &str) -> Self {
        Self {
            name,
            filename: None,
            data: value.as_bytes().to_vec(),
        }
    }

    pub fn file(name: &'static str, filename: &'static str, data: &[u8]) -> Self {
        Self {
            name,
            filename: Some(filename),
            data: data.to_vec(),
        }
    }
}

pub fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        part.name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Configuration for test fixture.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    /// `(key, owner)` pairs; empty means auth disabled.
    pub api_keys: Vec<(String, String)>,
}

impl TestConfig {
    pub fn with_api_key(key: &str, owner: &str) -> Self {
        Self {
            api_keys: vec![(key.to_string(), owner.to_string())],
        }
    }
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let storage = StorageLayout::new(temp_dir.path().join("media"));
        storage.ensure().await.expect("Failed to prepare storage");

        let mut config = load_config_from_str("[auth]\nmethod = \"none\"\n").unwrap();
        config.server.host = std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);
        config.database.path = temp_dir.path().join("test.db");
        config.storage.root = storage.root().to_path_buf();
        config.ladder = fixtures::three_tier_ladder();
        if !test_config.api_keys.is_empty() {
            config.auth.method = AuthMethod::ApiKey;
            config.auth.api_keys = test_config
                .api_keys
                .iter()
                .map(|(key, owner)| ApiKeyEntry {
                    key: key.clone(),
                    owner: owner.clone(),
                })
                .collect();
        }

        let authenticator = Arc::from(create_authenticator(&config.auth).unwrap());
        let catalog = Arc::new(
            SqliteVideoCatalog::new(&config.database.path).expect("Failed to create catalog"),
        );
        let encoder = Arc::new(MockEncoder::new());
        let ws_broadcaster = WsBroadcaster::default();

        let coordinator = Arc::new(
            IngestCoordinator::new(
                encoder.clone(),
                catalog.clone(),
                storage.clone(),
                config.ladder.clone(),
                2,
            )
            .with_observer(ws_broadcaster.observer()),
        );

        let state = Arc::new(AppState::new(
            config,
            authenticator,
            catalog.clone(),
            coordinator,
            ws_broadcaster,
        ));

        Self {
            router: create_router(state),
            encoder,
            catalog,
            storage,
            temp_dir,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
    }

    pub async fn get_with_key(&self, path: &str, key: &str) -> TestResponse {
        self.send(
            Request::builder()
                .uri(path)
                .header(header::AUTHORIZATION, format!("Bearer {}", key))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// POST with a JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri(path)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
    }

    /// POST without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri(path)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Multipart upload to `/api/v1/videos`; waits for the whole progress stream.
    pub async fn upload(&self, parts: &[Part], api_key: Option<&str>) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/v1/videos")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(key) = api_key {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", key));
        }
        self.send(builder.body(Body::from(multipart_body(parts))).unwrap())
            .await
    }

    /// Uploads a small video and returns the record id from the final line.
    pub async fn upload_video(&self, title: &str, description: &str) -> String {
        let response = self
            .upload(
                &[
                    Part::file("video", "clip.mp4", b"not really a video"),
                    Part::text("title", title),
                    Part::text("description", description),
                ],
                None,
            )
            .await;
        let lines = response.lines();
        let last = lines.last().expect("empty progress stream");
        last["outcome"]["record_id"]
            .as_str()
            .expect("upload did not succeed")
            .to_string()
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes()
            .to_vec();

        let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            content_type,
            bytes,
            body,
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status,
            $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            $response.text()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
