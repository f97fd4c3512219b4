//! Drive linking and account handlers.

use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::response::{Html, Redirect};
use axum::{Extension, Json};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use shardbox_drive::DriveToken;
use shardbox_metadata::models::{DriveAccountRow, OAuthStateRow};
use time::OffsetDateTime;
use uuid::Uuid;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scopes requested when linking a drive.
const DRIVE_SCOPES: &str =
    "https://www.googleapis.com/auth/drive.file https://www.googleapis.com/auth/userinfo.email";

/// GET /api/drive/link - begin the drive-link OAuth flow.
pub async fn drive_link(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<serde_json::Value>> {
    let oauth_state = random_state();
    state
        .metadata
        .insert_oauth_state(&OAuthStateRow {
            state: oauth_state.clone(),
            user_id: user.user_id,
            provider: "google".to_string(),
            created_at: OffsetDateTime::now_utc(),
        })
        .await?;

    let redirect_uri = format!("{}/oauth2/callback", state.config.server.normalized_base_url());
    let auth_url = format!(
        "{GOOGLE_AUTH_URL}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&access_type=offline&prompt=consent",
        urlencoding::encode(&state.config.oauth.client_id),
        urlencoding::encode(&redirect_uri),
        urlencoding::encode(DRIVE_SCOPES),
        urlencoding::encode(&oauth_state),
    );

    tracing::info!(user_id = %user.user_id, "Generated drive-link URL");
    Ok(Json(serde_json::json!({ "auth_url": auth_url })))
}

/// Random 16-byte hex state value.
fn random_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Code-exchange response from the provider token endpoint.
#[derive(Debug, Deserialize)]
struct CodeExchangeResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// GET /oauth2/callback - complete the drive-link OAuth flow.
///
/// Unauthenticated by design: the caller is identified through the stored
/// single-use state value.
pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> ApiResult<Redirect> {
    if let Some(error) = query.error {
        tracing::warn!(
            error = %error,
            description = query.error_description.as_deref().unwrap_or(""),
            "OAuth error from provider"
        );
        return Err(ApiError::BadRequest(format!("OAuth error: {error}")));
    }
    if query.state.is_empty() || query.code.is_empty() {
        return Err(ApiError::BadRequest("missing params".to_string()));
    }

    let stored = state
        .metadata
        .take_oauth_state(&query.state)
        .await?
        .ok_or_else(|| ApiError::BadRequest("invalid or expired state".to_string()))?;

    let redirect_uri = format!("{}/oauth2/callback", state.config.server.normalized_base_url());
    let response = state
        .http
        .post(GOOGLE_TOKEN_URL)
        .form(&[
            ("client_id", state.config.oauth.client_id.as_str()),
            ("client_secret", state.config.oauth.client_secret.as_str()),
            ("code", query.code.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri.as_str()),
        ])
        .send()
        .await
        .map_err(|e| ApiError::Internal(format!("token exchange failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = %status, "Token exchange rejected");
        return Err(ApiError::Internal(format!(
            "token exchange failed ({status}): {body}"
        )));
    }

    let exchanged: CodeExchangeResponse = response
        .json()
        .await
        .map_err(|e| ApiError::Internal(format!("invalid token response: {e}")))?;

    let token = DriveToken {
        access_token: exchanged.access_token,
        token_type: exchanged.token_type.unwrap_or_else(|| "Bearer".to_string()),
        refresh_token: exchanged.refresh_token,
        expiry: exchanged
            .expires_in
            .map(|secs| OffsetDateTime::now_utc() + time::Duration::seconds(secs)),
    };

    let sealed = state.cipher.seal(&token.to_json().map_err(ApiError::Drive)?)?;

    state
        .metadata
        .add_drive_account(&DriveAccountRow {
            account_id: Uuid::new_v4(),
            user_id: stored.user_id,
            provider: "google".to_string(),
            display_name: "Google Drive".to_string(),
            encrypted_token: sealed,
            drive_id: None,
            created_at: OffsetDateTime::now_utc(),
        })
        .await?;

    tracing::info!(user_id = %stored.user_id, "Drive account linked");
    Ok(Redirect::to(&format!(
        "{}/oauth/finished",
        state.config.server.normalized_base_url()
    )))
}

/// GET /oauth/finished - completion page shown after the redirect.
pub async fn oauth_finished() -> Html<&'static str> {
    Html("<h1>Drive linked</h1><p>You can close this window and return to the application.</p>")
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub provider: String,
    pub display_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// GET /api/drive/accounts - list linked drives.
pub async fn list_accounts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<Vec<AccountResponse>>> {
    let accounts = state.metadata.list_drive_accounts(user.user_id).await?;
    Ok(Json(
        accounts
            .into_iter()
            .map(|a| AccountResponse {
                id: a.account_id,
                provider: a.provider,
                display_name: a.display_name,
                created_at: a.created_at,
            })
            .collect(),
    ))
}

/// GET /api/drive/space - per-drive free space.
pub async fn drive_spaces(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<Vec<shardbox_core::plan::DriveSpace>>> {
    let spaces =
        shardbox_drive::list_drive_spaces(state.drive.as_ref(), state.metadata.as_ref(), user.user_id)
            .await?;
    Ok(Json(spaces))
}
