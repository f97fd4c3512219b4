//! Provider token model and refresh.

use crate::error::{DriveError, DriveResult};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Google token endpoint.
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// The provider credential stored (encrypted) per drive account.
///
/// Field names match the token JSON captured at link time, so tokens sealed
/// by the OAuth callback parse back without translation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriveToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expiry: Option<OffsetDateTime>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl DriveToken {
    /// Parse from the decrypted token JSON.
    pub fn from_json(data: &[u8]) -> DriveResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Serialize for sealing.
    pub fn to_json(&self) -> DriveResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Token endpoint response for the refresh-token grant.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
}

/// Exchange a refresh token for a fresh access token.
///
/// The refresh token itself is retained: Google only returns a new one on
/// the initial consent exchange.
pub async fn refresh_access_token(
    http: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
    token: &DriveToken,
) -> DriveResult<DriveToken> {
    let refresh_token = token
        .refresh_token
        .as_deref()
        .ok_or_else(|| DriveError::Credential("no refresh token stored".to_string()))?;

    let response = http
        .post(TOKEN_URL)
        .form(&[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DriveError::Provider {
            status: status.as_u16(),
            body: format!("token refresh failed: {body}"),
        });
    }

    let refreshed: RefreshResponse = response.json().await?;
    Ok(DriveToken {
        access_token: refreshed.access_token,
        token_type: refreshed.token_type.unwrap_or_else(default_token_type),
        refresh_token: token.refresh_token.clone(),
        expiry: refreshed
            .expires_in
            .map(|secs| OffsetDateTime::now_utc() + time::Duration::seconds(secs)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_json_roundtrip() {
        let token = DriveToken {
            access_token: "ya29.abc".to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: Some("1//def".to_string()),
            expiry: None,
        };
        let parsed = DriveToken::from_json(&token.to_json().unwrap()).unwrap();
        assert_eq!(parsed.access_token, "ya29.abc");
        assert_eq!(parsed.refresh_token.as_deref(), Some("1//def"));
    }

    #[test]
    fn test_parses_provider_token_shape() {
        // The shape the OAuth code-exchange endpoint returns.
        let json = br#"{
            "access_token": "ya29.abc",
            "token_type": "Bearer",
            "refresh_token": "1//def",
            "expiry": "2024-06-01T12:00:00Z"
        }"#;
        let token = DriveToken::from_json(json).unwrap();
        assert!(token.expiry.is_some());
    }

    #[test]
    fn test_minimal_token_defaults() {
        let token = DriveToken::from_json(br#"{"access_token": "t"}"#).unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert!(token.refresh_token.is_none());
        assert!(token.expiry.is_none());
    }
}
