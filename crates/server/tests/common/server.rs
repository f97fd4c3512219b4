//! Server test harness.

use crate::common::mocks::MockDrive;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use shardbox_core::config::AppConfig;
use shardbox_drive::DriveToken;
use shardbox_metadata::models::DriveAccountRow;
use shardbox_metadata::{MetadataStore, SqliteStore};
use shardbox_server::{create_router, AppState};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

pub const GIB: i64 = 1024 * 1024 * 1024;

/// A test server with all dependencies in a tempdir and a mock drive.
#[allow(dead_code)]
pub struct TestServer {
    pub router: Router,
    pub state: AppState,
    pub drive: Arc<MockDrive>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("failed to create temp directory");

        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(temp_dir.path().join("metadata.db"))
                .await
                .expect("failed to create metadata store"),
        );

        let drive = Arc::new(MockDrive::default());

        let mut config = AppConfig::for_testing();
        config.upload.temp_dir = temp_dir.path().join("uploads");
        config.download.temp_dir = temp_dir.path().join("downloads");
        modifier(&mut config);

        let state = AppState::new(config, metadata, drive.clone());
        let router = create_router(state.clone());

        Self {
            router,
            state,
            drive,
            _temp_dir: temp_dir,
        }
    }

    /// Sign up and log in a fresh user; returns (user_id, bearer token).
    pub async fn create_user(&self, email: &str) -> (Uuid, String) {
        let (status, _) = self
            .post_json(
                "/api/signup",
                None,
                serde_json::json!({ "email": email, "password": "hunter22" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self
            .post_json(
                "/api/login",
                None,
                serde_json::json!({ "email": email, "password": "hunter22" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().expect("login token").to_string();

        let user = self
            .state
            .metadata
            .get_user_by_email(email)
            .await
            .unwrap()
            .expect("user exists");
        (user.user_id, token)
    }

    /// Link a mock drive account with the given free space; returns its id.
    pub async fn link_drive(&self, user_id: Uuid, free_space: i64) -> Uuid {
        let token = DriveToken {
            access_token: "mock-access".to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: Some("mock-refresh".to_string()),
            expiry: None,
        };
        let sealed = self
            .state
            .cipher
            .seal(&token.to_json().unwrap())
            .expect("seal token");

        let account_id = Uuid::new_v4();
        self.state
            .metadata
            .add_drive_account(&DriveAccountRow {
                account_id,
                user_id,
                provider: "google".to_string(),
                display_name: "Google Drive".to_string(),
                encrypted_token: sealed,
                drive_id: None,
                created_at: OffsetDateTime::now_utc(),
            })
            .await
            .expect("link account");

        self.drive.set_quota(account_id, free_space, 0);
        account_id
    }

    pub async fn request(&self, request: Request<Body>) -> (StatusCode, bytes::Bytes) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed");
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("body collect")
            .to_bytes();
        (status, body)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let (status, body) = self
            .request(builder.body(Body::empty()).unwrap())
            .await;
        (status, parse_json(&body))
    }

    pub async fn get_raw(&self, uri: &str, token: Option<&str>) -> (StatusCode, bytes::Bytes) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(
        &self,
        uri: &str,
        token: Option<&str>,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let (status, body) = self
            .request(builder.body(Body::from(body.to_string())).unwrap())
            .await;
        (status, parse_json(&body))
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method("DELETE").uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let (status, body) = self
            .request(builder.body(Body::empty()).unwrap())
            .await;
        (status, parse_json(&body))
    }

    /// Send one upload chunk through the multipart endpoint.
    pub async fn send_chunk(
        &self,
        token: &str,
        session_id: &str,
        offset: i64,
        data: &[u8],
    ) -> (StatusCode, serde_json::Value) {
        let body = multipart_body(&[
            MultipartField::text("offset", &offset.to_string()),
            MultipartField::file("chunk", data),
        ]);
        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/files/upload/chunk?session_id={session_id}"))
            .header("authorization", format!("Bearer {token}"))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        let (status, body) = self.request(request).await;
        (status, parse_json(&body))
    }

    /// Submit a key file to the download initiate endpoint.
    pub async fn submit_key_file(
        &self,
        token: &str,
        key_file: &[u8],
    ) -> (StatusCode, serde_json::Value) {
        let body = multipart_body(&[MultipartField::file("key_file", key_file)]);
        let request = Request::builder()
            .method("POST")
            .uri("/api/files/download/initiate")
            .header("authorization", format!("Bearer {token}"))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        let (status, body) = self.request(request).await;
        (status, parse_json(&body))
    }

    /// Poll the upload status endpoint until the predicate holds.
    pub async fn wait_for_upload_status<F>(
        &self,
        token: &str,
        session_id: &str,
        predicate: F,
    ) -> serde_json::Value
    where
        F: Fn(&serde_json::Value) -> bool,
    {
        self.wait_for_status(
            &format!("/api/files/upload/status/{session_id}"),
            token,
            predicate,
        )
        .await
    }

    /// Poll the download status endpoint until the predicate holds.
    pub async fn wait_for_download_status<F>(
        &self,
        token: &str,
        session_id: &str,
        predicate: F,
    ) -> serde_json::Value
    where
        F: Fn(&serde_json::Value) -> bool,
    {
        self.wait_for_status(
            &format!("/api/files/download/status/{session_id}"),
            token,
            predicate,
        )
        .await
    }

    async fn wait_for_status<F>(&self, uri: &str, token: &str, predicate: F) -> serde_json::Value
    where
        F: Fn(&serde_json::Value) -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let (status, body) = self.get(uri, Some(token)).await;
            assert_eq!(status, StatusCode::OK, "status poll failed: {body}");
            if predicate(&body) {
                return body;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("timed out waiting for status, last snapshot: {body}");
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

fn parse_json(body: &[u8]) -> serde_json::Value {
    if body.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(body).unwrap_or(serde_json::Value::Null)
}

pub const MULTIPART_BOUNDARY: &str = "test-boundary-7f93a1";

pub enum MultipartField<'a> {
    Text { name: &'a str, value: String },
    File { name: &'a str, data: &'a [u8] },
}

impl<'a> MultipartField<'a> {
    pub fn text(name: &'a str, value: &str) -> Self {
        Self::Text {
            name,
            value: value.to_string(),
        }
    }

    pub fn file(name: &'a str, data: &'a [u8]) -> Self {
        Self::File { name, data }
    }
}

/// Build a multipart/form-data body.
pub fn multipart_body(fields: &[MultipartField<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for field in fields {
        body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
        match field {
            MultipartField::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            MultipartField::File { name, data } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"blob\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}
