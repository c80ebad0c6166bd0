//! Device-Code Flow: RFC 8628 device authorization grant.
//!
//! A request/poll loop (start → poll-until-ready) driven through
//! [`OAuthHttp`] so tests never touch the network.

use std::time::Duration;

use serde_json::Value;
use tracing::{instrument, warn};

use crate::error::DeviceCodeAuthError;
use crate::mcp::auth::http::OAuthHttp;
use crate::mcp::auth::types::{AuthType, DeviceAuthorizationResponse, StoredToken};

#[derive(Debug, Clone)]
pub struct DeviceCodeConfig {
    pub client_id: String,
    pub device_authorization_url: String,
    pub token_url: String,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
    pub poll_interval_seconds: u64,
    pub timeout_seconds: u64,
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// POST the device authorization request.
#[instrument(skip(http, config), fields(url = %config.device_authorization_url))]
pub async fn request_authorization(
    http: &dyn OAuthHttp,
    config: &DeviceCodeConfig,
) -> Result<DeviceAuthorizationResponse, DeviceCodeAuthError> {
    let mut form = vec![("client_id", config.client_id.as_str())];
    if let Some(secret) = &config.client_secret {
        form.push(("client_secret", secret.as_str()));
    }
    if let Some(scope) = &config.scope {
        form.push(("scope", scope.as_str()));
    }

    let response = http
        .post_form(&config.device_authorization_url, &form)
        .await
        .map_err(DeviceCodeAuthError::Network)?;

    if !response.is_success() {
        return Err(DeviceCodeAuthError::Network(format!(
            "device authorization request returned status {}",
            response.status
        )));
    }

    serde_json::from_value(response.body)
        .map_err(|e| DeviceCodeAuthError::Network(format!("invalid device authorization response: {e}")))
}

/// Prompt the operator, then poll until granted, denied, expired, or the
/// deadline passes.
#[instrument(skip(http, config, auth, on_prompt), fields(user_code = %auth.user_code))]
pub async fn poll_for_token(
    http: &dyn OAuthHttp,
    config: &DeviceCodeConfig,
    auth: &DeviceAuthorizationResponse,
    on_prompt: impl FnOnce(&DeviceAuthorizationResponse),
) -> Result<StoredToken, DeviceCodeAuthError> {
    on_prompt(auth);

    let mut interval_ms = 1000 * auth.interval.unwrap_or(config.poll_interval_seconds);
    let timeout_secs = config.timeout_seconds.min(auth.expires_in);
    let deadline = now_ms() + 1000 * timeout_secs as i64;

    loop {
        if now_ms() >= deadline {
            return Err(DeviceCodeAuthError::Timeout);
        }

        tokio::time::sleep(Duration::from_millis(interval_ms)).await;

        if now_ms() >= deadline {
            return Err(DeviceCodeAuthError::Timeout);
        }

        let form = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
            ("device_code", auth.device_code.as_str()),
            ("client_id", config.client_id.as_str()),
        ];

        let response = match http.post_form(&config.token_url, &form).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "device-code poll request failed, retrying");
                continue;
            }
        };

        if response.is_success() {
            if let Some(token) = parse_granted_token(&response.body) {
                return Ok(token);
            }
            warn!("device-code poll returned 2xx without an access_token, retrying");
            continue;
        }

        match response.body.get("error").and_then(Value::as_str) {
            Some("authorization_pending") => continue,
            Some("slow_down") => {
                interval_ms += 5000;
                continue;
            }
            Some("expired_token") => return Err(DeviceCodeAuthError::Expired),
            Some("access_denied") => return Err(DeviceCodeAuthError::Denied),
            _ => continue,
        }
    }
}

fn parse_granted_token(body: &Value) -> Option<StoredToken> {
    let access_token = body.get("access_token")?.as_str()?.to_string();
    let expires_in = body.get("expires_in").and_then(Value::as_i64);
    Some(StoredToken {
        access_token,
        token_type: body
            .get("token_type")
            .and_then(Value::as_str)
            .unwrap_or("Bearer")
            .to_string(),
        obtained_at: now_ms(),
        auth_type: AuthType::DeviceCode,
        refresh_token: body
            .get("refresh_token")
            .and_then(Value::as_str)
            .map(str::to_string),
        scope: body.get("scope").and_then(Value::as_str).map(str::to_string),
        expires_at: expires_in.map(|secs| now_ms() + 1000 * secs),
    })
}

/// Full flow: request authorization, then poll for a token.
pub async fn run(
    http: &dyn OAuthHttp,
    config: &DeviceCodeConfig,
    on_prompt: impl FnOnce(&DeviceAuthorizationResponse),
) -> Result<StoredToken, DeviceCodeAuthError> {
    let auth = request_authorization(http, config).await?;
    poll_for_token(http, config, &auth, on_prompt).await
}
