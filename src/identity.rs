//! Identity API Client and Token Decoding
//!
//! One `IdentityClient` serves every tool in the kit: the engine's roster
//! resolution, account provisioning, and bulk login. Token responses vary by
//! identity-provider version, so extraction probes the known field names; the
//! bearer token itself is treated as an opaque three-segment JWT whose middle
//! segment carries the numeric subject claim.

use base64::{
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
    Engine as _,
};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::IdentityConfig;
use crate::credentials::Credential;
use crate::errors::{
    AuthError, AuthResult, FatalError, FatalResult, ProvisionError, TokenDecodeError,
};
use crate::models::UserRecord;

/// Token field names probed in response bodies, in order
const TOKEN_FIELDS: [&str; 3] = ["access_token", "accessToken", "token"];

/// Error detail bodies are capped at this length in messages
const DETAIL_LIMIT: usize = 300;

// ============================================================================
// Token decoding
// ============================================================================

/// Extract the access token from a token-endpoint response body.
///
/// Probes `access_token`, `accessToken`, `token`, then `data.access_token`.
pub fn extract_access_token(body: &Value) -> Option<String> {
    for field in TOKEN_FIELDS {
        if let Some(token) = body.get(field).and_then(Value::as_str) {
            return Some(token.to_string());
        }
    }
    body.get("data")
        .and_then(|data| data.get("access_token"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Decode the numeric user id from a bearer token's subject claim.
///
/// The token is never signature-verified here; only its payload is read. The
/// subject is accepted as a JSON number or a string of digits, and must be
/// positive.
pub fn decode_user_id(token: &str) -> Result<i64, TokenDecodeError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenDecodeError::MalformedToken);
    }

    // Providers differ on padding; accept both forms
    let payload = URL_SAFE_NO_PAD
        .decode(segments[1])
        .or_else(|_| URL_SAFE.decode(segments[1]))
        .map_err(|_| TokenDecodeError::PayloadEncoding)?;

    let claims: Value =
        serde_json::from_slice(&payload).map_err(|_| TokenDecodeError::PayloadJson)?;
    if !claims.is_object() {
        return Err(TokenDecodeError::PayloadJson);
    }

    let sub = claims.get("sub").ok_or(TokenDecodeError::SubjectMissing)?;
    let user_id = match sub {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| TokenDecodeError::SubjectInvalid(sub.to_string()))?,
        Value::String(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => s
            .parse()
            .map_err(|_| TokenDecodeError::SubjectInvalid(s.clone()))?,
        other => return Err(TokenDecodeError::SubjectInvalid(other.to_string())),
    };

    if user_id <= 0 {
        return Err(TokenDecodeError::SubjectInvalid(user_id.to_string()));
    }
    Ok(user_id)
}

// ============================================================================
// Identity client
// ============================================================================

/// Payload for the account-creation endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub entity_id: i64,
    pub title: String,
    pub roles_ids: Vec<String>,
    pub is_super_admin: bool,
}

/// Fields extracted from a successful account-creation response
#[derive(Debug, Clone)]
pub struct CreatedAccount {
    pub account_id: Option<String>,
    pub initial_password: String,
}

/// HTTP client for the platform identity API
#[derive(Debug, Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    config: IdentityConfig,
}

impl IdentityClient {
    pub fn new(config: IdentityConfig) -> FatalResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| {
                FatalError::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    /// Perform the credential grant and return the raw access token
    pub async fn request_token(&self, username: &str, password: &str) -> AuthResult<String> {
        self.request_token_as(username, password, None).await
    }

    /// Credential grant with an optional extra bearer header.
    ///
    /// Some deployments require the admin bearer on a fresh account's first
    /// login; others reject it. Callers fall back between the two forms.
    pub async fn request_token_as(
        &self,
        username: &str,
        password: &str,
        bearer: Option<&str>,
    ) -> AuthResult<String> {
        let mut request = self
            .http
            .post(self.config.token_url())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("grant_type", "username:password"),
                ("username", username),
                ("password", password),
            ]);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                detail: read_detail(response).await,
            });
        }

        let body: Value = response.json().await?;
        extract_access_token(&body).ok_or(AuthError::TokenMissing)
    }

    /// Authenticate one credential and decode its user id
    pub async fn resolve_user(&self, credential: &Credential) -> AuthResult<UserRecord> {
        let token = self
            .request_token(&credential.username, &credential.password)
            .await?;
        let user_id = decode_user_id(&token)?;
        Ok(UserRecord {
            username: credential.username.clone(),
            account_id: credential.account_id.clone(),
            user_id,
            token,
        })
    }

    /// Authenticate every credential, skipping failures.
    ///
    /// Each credential gets a single attempt; the returned roster preserves
    /// input order.
    pub async fn resolve_roster(&self, credentials: &[Credential]) -> Vec<UserRecord> {
        let mut roster = Vec::with_capacity(credentials.len());
        for credential in credentials {
            match self.resolve_user(credential).await {
                Ok(user) => {
                    debug!("Authenticated {} (user id {})", user.username, user.user_id);
                    roster.push(user);
                }
                Err(e) => warn!("Skipping {}: {}", credential.username, e),
            }
        }
        info!(
            "Authenticated {} of {} users",
            roster.len(),
            credentials.len()
        );
        roster
    }

    /// Create one account through the admin API
    pub async fn create_account(
        &self,
        admin_token: &str,
        request: &CreateAccountRequest,
    ) -> Result<CreatedAccount, ProvisionError> {
        let response = self
            .http
            .post(self.config.create_user_url())
            .bearer_auth(admin_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProvisionError::Rejected {
                status: status.as_u16(),
                detail: read_detail(response).await,
            });
        }

        let body: Value = response.json().await?;
        let account_id = ["accountId", "accountID"]
            .iter()
            .find_map(|field| body.get(*field).and_then(Value::as_str))
            .map(str::to_string);
        let initial_password = ["password", "initialPassword"]
            .iter()
            .find_map(|field| body.get(*field).and_then(Value::as_str))
            .map(str::to_string)
            .ok_or(ProvisionError::InitialPasswordMissing)?;

        Ok(CreatedAccount {
            account_id,
            initial_password,
        })
    }

    /// Change the calling user's password
    pub async fn change_password(
        &self,
        user_token: &str,
        new_password: &str,
    ) -> Result<(), ProvisionError> {
        let response = self
            .http
            .patch(self.config.change_password_url())
            .bearer_auth(user_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&serde_json::json!({ "newPassword": new_password }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProvisionError::PasswordChangeRejected {
                status: status.as_u16(),
                detail: read_detail(response).await,
            });
        }
        Ok(())
    }
}

async fn read_detail(response: reqwest::Response) -> String {
    let mut detail = response.text().await.unwrap_or_default();
    if detail.len() > DETAIL_LIMIT {
        detail.truncate(DETAIL_LIMIT);
        detail.push_str("...");
    }
    detail
}
