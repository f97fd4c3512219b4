//! Drive gateway trait and Google Drive v3 implementation.

use crate::crypto::TokenCipher;
use crate::error::{DriveError, DriveResult};
use crate::token::{self, DriveToken};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use shardbox_metadata::MetadataStore;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Bodies below this size go up in a single multipart request; larger ones
/// use the two-step resumable protocol.
const MULTIPART_THRESHOLD: u64 = 5 * 1024 * 1024;

/// Boundary for hand-built multipart/related bodies.
const RELATED_BOUNDARY: &str = "shardbox_upload_boundary";

/// Storage quota and owner identity for one account.
#[derive(Clone, Debug, Default)]
pub struct DriveQuota {
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
    /// Bytes; 0 when the provider reports no limit.
    pub limit: i64,
    /// Bytes.
    pub usage: i64,
}

/// One cloud-storage account, addressed by its drive-account id.
#[async_trait]
pub trait DriveGateway: Send + Sync + 'static {
    /// Upload a local file under `name`; returns the provider-assigned id.
    async fn upload(&self, account_id: Uuid, path: &Path, name: &str) -> DriveResult<String>;

    /// Upload an in-memory blob under `name`; returns the provider id.
    async fn upload_bytes(
        &self,
        account_id: Uuid,
        name: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> DriveResult<String>;

    /// Fetch a small blob into memory.
    async fn read(&self, account_id: Uuid, drive_file_id: &str) -> DriveResult<Vec<u8>>;

    /// Overwrite a blob's content in place.
    async fn update(
        &self,
        account_id: Uuid,
        drive_file_id: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> DriveResult<()>;

    /// Stream a blob to a local path.
    async fn download(
        &self,
        account_id: Uuid,
        drive_file_id: &str,
        out_path: &Path,
    ) -> DriveResult<()>;

    /// Idempotent best-effort removal; deleting an absent blob succeeds.
    async fn delete(&self, account_id: Uuid, drive_file_id: &str) -> DriveResult<()>;

    /// Query storage quota and owner identity.
    async fn query_space(&self, account_id: Uuid) -> DriveResult<DriveQuota>;

    /// Locate a blob by exact name (used for the manifest).
    async fn find(&self, account_id: Uuid, name: &str) -> DriveResult<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct DriveFileResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFileResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AboutResponse {
    storage_quota: StorageQuota,
    #[serde(default)]
    user: Option<AboutUser>,
}

#[derive(Debug, Deserialize)]
struct StorageQuota {
    /// Absent for unlimited plans.
    #[serde(default, with = "string_i64_opt")]
    limit: Option<i64>,
    #[serde(default, with = "string_i64_opt")]
    usage: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AboutUser {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    email_address: Option<String>,
}

/// The Drive API serializes 64-bit quota figures as JSON strings.
mod string_i64_opt {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: Option<String> = Option::deserialize(deserializer)?;
        value
            .map(|s| s.parse().map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Google Drive v3 gateway.
///
/// Loads the account record, decrypts the stored credential with the
/// process-wide cipher and issues authenticated calls, refreshing the
/// credential once on 401.
pub struct GoogleDrive {
    http: reqwest::Client,
    metadata: Arc<dyn MetadataStore>,
    cipher: Arc<TokenCipher>,
    client_id: String,
    client_secret: String,
}

impl GoogleDrive {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        cipher: Arc<TokenCipher>,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            metadata,
            cipher,
            client_id,
            client_secret,
        }
    }

    async fn access_token(&self, account_id: Uuid) -> DriveResult<DriveToken> {
        let account = self
            .metadata
            .get_drive_account(account_id)
            .await?
            .ok_or_else(|| DriveError::NotFound(format!("drive account {account_id} not found")))?;
        let plain = self.cipher.open(&account.encrypted_token)?;
        DriveToken::from_json(&plain)
    }

    async fn refresh_and_store(
        &self,
        account_id: Uuid,
        current: &DriveToken,
    ) -> DriveResult<DriveToken> {
        let refreshed = token::refresh_access_token(
            &self.http,
            &self.client_id,
            &self.client_secret,
            current,
        )
        .await?;
        let sealed = self.cipher.seal(&refreshed.to_json()?)?;
        self.metadata
            .update_account_token(account_id, &sealed)
            .await?;
        tracing::info!(account_id = %account_id, "Refreshed drive credential");
        Ok(refreshed)
    }

    /// Send a request built against the account's access token, refreshing
    /// the credential and retrying once on 401.
    async fn send_authed<F>(&self, account_id: Uuid, build: F) -> DriveResult<reqwest::Response>
    where
        F: Fn(&str) -> reqwest::RequestBuilder,
    {
        let token = self.access_token(account_id).await?;
        let response = build(&token.access_token).send().await?;
        if response.status() != reqwest::StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let refreshed = self.refresh_and_store(account_id, &token).await?;
        Ok(build(&refreshed.access_token).send().await?)
    }

    async fn upload_resumable(
        &self,
        account_id: Uuid,
        path: &Path,
        name: &str,
        size: u64,
    ) -> DriveResult<String> {
        let init = self
            .send_authed(account_id, |tok| {
                self.http
                    .post(format!("{DRIVE_UPLOAD_BASE}/files?uploadType=resumable"))
                    .bearer_auth(tok)
                    .header("X-Upload-Content-Type", "application/octet-stream")
                    .header("X-Upload-Content-Length", size.to_string())
                    .json(&serde_json::json!({ "name": name }))
            })
            .await?;
        let init = expect_success(init).await?;

        let session_url = init
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                DriveError::Manifest("resumable session missing Location header".to_string())
            })?
            .to_string();

        let file = tokio::fs::File::open(path).await?;
        let stream = tokio_util::io::ReaderStream::new(file);
        let response = self
            .http
            .put(&session_url)
            .header(reqwest::header::CONTENT_LENGTH, size)
            .body(reqwest::Body::wrap_stream(stream))
            .send()
            .await?;
        let response = expect_success(response).await?;

        let meta: DriveFileResponse = response.json().await?;
        Ok(meta.id)
    }
}

async fn expect_success(response: reqwest::Response) -> DriveResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(DriveError::Provider {
        status: status.as_u16(),
        body,
    })
}

/// Hand-built `multipart/related` body: JSON metadata part then content.
fn multipart_related_body(name: &str, content: &[u8], content_type: &str) -> Vec<u8> {
    let metadata = serde_json::json!({ "name": name }).to_string();

    let mut body = Vec::with_capacity(content.len() + metadata.len() + 256);
    body.extend_from_slice(
        format!("--{RELATED_BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(metadata.as_bytes());
    body.extend_from_slice(
        format!("\r\n--{RELATED_BOUNDARY}\r\nContent-Type: {content_type}\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{RELATED_BOUNDARY}--").as_bytes());
    body
}

#[async_trait]
impl DriveGateway for GoogleDrive {
    #[tracing::instrument(skip(self, path), fields(account_id = %account_id, name))]
    async fn upload(&self, account_id: Uuid, path: &Path, name: &str) -> DriveResult<String> {
        let size = tokio::fs::metadata(path).await?.len();
        if size < MULTIPART_THRESHOLD {
            let content = tokio::fs::read(path).await?;
            return self
                .upload_bytes(account_id, name, content, "application/octet-stream")
                .await;
        }
        self.upload_resumable(account_id, path, name, size).await
    }

    async fn upload_bytes(
        &self,
        account_id: Uuid,
        name: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> DriveResult<String> {
        let body = multipart_related_body(name, &content, content_type);
        let response = self
            .send_authed(account_id, |tok| {
                self.http
                    .post(format!("{DRIVE_UPLOAD_BASE}/files?uploadType=multipart"))
                    .bearer_auth(tok)
                    .header(
                        reqwest::header::CONTENT_TYPE,
                        format!("multipart/related; boundary={RELATED_BOUNDARY}"),
                    )
                    .body(body.clone())
            })
            .await?;
        let response = expect_success(response).await?;

        let meta: DriveFileResponse = response.json().await?;
        Ok(meta.id)
    }

    async fn read(&self, account_id: Uuid, drive_file_id: &str) -> DriveResult<Vec<u8>> {
        let response = self
            .send_authed(account_id, |tok| {
                self.http
                    .get(format!("{DRIVE_API_BASE}/files/{drive_file_id}"))
                    .query(&[("alt", "media")])
                    .bearer_auth(tok)
            })
            .await?;
        let response = expect_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn update(
        &self,
        account_id: Uuid,
        drive_file_id: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> DriveResult<()> {
        let content_type = content_type.to_string();
        let response = self
            .send_authed(account_id, |tok| {
                self.http
                    .patch(format!(
                        "{DRIVE_UPLOAD_BASE}/files/{drive_file_id}?uploadType=media"
                    ))
                    .bearer_auth(tok)
                    .header(reqwest::header::CONTENT_TYPE, content_type.clone())
                    .body(content.clone())
            })
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, out_path), fields(account_id = %account_id, drive_file_id))]
    async fn download(
        &self,
        account_id: Uuid,
        drive_file_id: &str,
        out_path: &Path,
    ) -> DriveResult<()> {
        let response = self
            .send_authed(account_id, |tok| {
                self.http
                    .get(format!("{DRIVE_API_BASE}/files/{drive_file_id}"))
                    .query(&[("alt", "media")])
                    .bearer_auth(tok)
            })
            .await?;
        let response = expect_success(response).await?;

        let mut file = tokio::fs::File::create(out_path).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }

    async fn delete(&self, account_id: Uuid, drive_file_id: &str) -> DriveResult<()> {
        let response = self
            .send_authed(account_id, |tok| {
                self.http
                    .delete(format!("{DRIVE_API_BASE}/files/{drive_file_id}"))
                    .bearer_auth(tok)
            })
            .await?;

        // Already-gone blobs count as deleted.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        expect_success(response).await?;
        Ok(())
    }

    async fn query_space(&self, account_id: Uuid) -> DriveResult<DriveQuota> {
        let response = self
            .send_authed(account_id, |tok| {
                self.http
                    .get(format!("{DRIVE_API_BASE}/about"))
                    .query(&[("fields", "storageQuota,user")])
                    .bearer_auth(tok)
            })
            .await?;
        let response = expect_success(response).await?;

        let about: AboutResponse = response.json().await?;
        let (owner_name, owner_email) = about
            .user
            .map(|u| (u.display_name, u.email_address))
            .unwrap_or((None, None));

        Ok(DriveQuota {
            owner_name,
            owner_email,
            limit: about.storage_quota.limit.unwrap_or(0),
            usage: about.storage_quota.usage.unwrap_or(0),
        })
    }

    async fn find(&self, account_id: Uuid, name: &str) -> DriveResult<Option<String>> {
        // Escape single quotes per the Drive query grammar.
        let escaped = name.replace('\'', "\\'");
        let query = format!("name='{escaped}' and trashed=false");
        let response = self
            .send_authed(account_id, |tok| {
                self.http
                    .get(format!("{DRIVE_API_BASE}/files"))
                    .query(&[("q", query.as_str()), ("fields", "files(id,name)")])
                    .bearer_auth(tok)
            })
            .await?;
        let response = expect_success(response).await?;

        let listing: FileListResponse = response.json().await?;
        Ok(listing.files.into_iter().next().map(|f| f.id))
    }
}
