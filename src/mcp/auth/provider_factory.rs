//! Provider Factory: routes an `AuthConfig` to the appropriate auth path
//! (cached / client-credentials / device-code / refresh) and produces the
//! transport auth options a caller attaches to its requests.

use std::time::Duration;

use tracing::warn;

use crate::error::DeviceCodeAuthError;
use crate::mcp::auth::device_code::{self, DeviceCodeConfig};
use crate::mcp::auth::http::OAuthHttp;
use crate::mcp::auth::token_store::TokenStore;
use crate::mcp::auth::types::{AuthConfig, AuthType, StoredToken, TransportAuthOptions};

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn bearer(token: &StoredToken) -> TransportAuthOptions {
    TransportAuthOptions::RequestInit {
        authorization_header: format!("{} {}", token.token_type, token.access_token),
    }
}

/// POST `grant_type=refresh_token`. If the server omits a new
/// `refresh_token`, the original value is preserved.
pub async fn refresh_token(
    http: &dyn OAuthHttp,
    token_url: &str,
    client_id: &str,
    client_secret: Option<&str>,
    auth_type: AuthType,
    refresh_value: &str,
) -> Result<StoredToken, String> {
    let mut form = vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_value),
        ("client_id", client_id),
    ];
    if let Some(secret) = client_secret {
        form.push(("client_secret", secret));
    }

    let response = http.post_form(token_url, &form).await?;
    if !response.is_success() {
        return Err(format!("refresh request returned status {}", response.status));
    }

    let access_token = response
        .body
        .get("access_token")
        .and_then(serde_json::Value::as_str)
        .ok_or("refresh response missing access_token")?
        .to_string();
    let expires_in = response.body.get("expires_in").and_then(serde_json::Value::as_i64);
    let new_refresh = response
        .body
        .get("refresh_token")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);

    Ok(StoredToken {
        access_token,
        token_type: response
            .body
            .get("token_type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("Bearer")
            .to_string(),
        obtained_at: now_ms(),
        auth_type,
        refresh_token: new_refresh.or_else(|| Some(refresh_value.to_string())),
        scope: response.body.get("scope").and_then(serde_json::Value::as_str).map(str::to_string),
        expires_at: expires_in.map(|secs| now_ms() + 1000 * secs),
    })
}

async fn fetch_client_credentials(
    http: &dyn OAuthHttp,
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    scope: Option<&str>,
) -> Result<StoredToken, String> {
    let mut form = vec![
        ("grant_type", "client_credentials"),
        ("client_id", client_id),
        ("client_secret", client_secret),
    ];
    if let Some(scope) = scope {
        form.push(("scope", scope));
    }

    let response = http.post_form(token_url, &form).await?;
    if !response.is_success() {
        return Err(format!("client_credentials request returned status {}", response.status));
    }

    let access_token = response
        .body
        .get("access_token")
        .and_then(serde_json::Value::as_str)
        .ok_or("client_credentials response missing access_token")?
        .to_string();
    let expires_in = response.body.get("expires_in").and_then(serde_json::Value::as_i64);

    Ok(StoredToken {
        access_token,
        token_type: response
            .body
            .get("token_type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("Bearer")
            .to_string(),
        obtained_at: now_ms(),
        auth_type: AuthType::ClientCredentials,
        refresh_token: None,
        scope: scope.map(str::to_string),
        expires_at: expires_in.map(|secs| now_ms() + 1000 * secs),
    })
}

/// Resolve the transport auth options for one MCP server, fetching or
/// refreshing a token as needed.
pub async fn resolve_transport_auth(
    http: &dyn OAuthHttp,
    store: &TokenStore,
    server_name: &str,
    config: Option<&AuthConfig>,
) -> Result<TransportAuthOptions, String> {
    let Some(config) = config else {
        return Ok(TransportAuthOptions::None);
    };

    match config {
        AuthConfig::ClientCredentials {
            client_id,
            client_secret,
            token_url: None,
            ..
        } => {
            let _ = (client_id, client_secret);
            Ok(TransportAuthOptions::AuthProvider {
                name: server_name.to_string(),
            })
        }
        AuthConfig::ClientCredentials {
            client_id,
            client_secret,
            token_url: Some(token_url),
            scope,
        } => {
            if let Some(cached) = store.load(server_name).await {
                if TokenStore::is_valid(&cached, now_ms()) {
                    return Ok(bearer(&cached));
                }
            }

            let token = match fetch_client_credentials(
                http,
                token_url,
                client_id,
                client_secret,
                scope.as_deref(),
            )
            .await
            {
                Ok(token) => token,
                Err(first_err) => {
                    warn!(error = %first_err, "client_credentials fetch failed, retrying once");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    fetch_client_credentials(http, token_url, client_id, client_secret, scope.as_deref())
                        .await?
                }
            };

            store.save(server_name, &token).await.map_err(|e| e.to_string())?;
            Ok(bearer(&token))
        }
        AuthConfig::DeviceCode {
            client_id,
            device_authorization_url,
            token_url,
            client_secret,
            scope,
            poll_interval_seconds,
            timeout_seconds,
        } => {
            if let Some(cached) = store.load(server_name).await {
                if TokenStore::is_valid(&cached, now_ms()) {
                    return Ok(bearer(&cached));
                }

                if let Some(refresh_value) = &cached.refresh_token {
                    match refresh_token(
                        http,
                        token_url,
                        client_id,
                        client_secret.as_deref(),
                        AuthType::DeviceCode,
                        refresh_value,
                    )
                    .await
                    {
                        Ok(refreshed) => {
                            store.save(server_name, &refreshed).await.map_err(|e| e.to_string())?;
                            return Ok(bearer(&refreshed));
                        }
                        Err(e) => warn!(error = %e, "refresh failed, falling back to device-code flow"),
                    }
                }
            }

            let device_config = DeviceCodeConfig {
                client_id: client_id.clone(),
                device_authorization_url: device_authorization_url.clone(),
                token_url: token_url.clone(),
                client_secret: client_secret.clone(),
                scope: scope.clone(),
                poll_interval_seconds: *poll_interval_seconds,
                timeout_seconds: *timeout_seconds,
            };

            let token = device_code::run(http, &device_config, |auth| {
                tracing::info!(
                    server = server_name,
                    verification_uri = %auth.verification_uri,
                    user_code = %auth.user_code,
                    "visit the verification URI and enter the user code to authorize"
                );
            })
            .await
            .map_err(|e: DeviceCodeAuthError| e.to_string())?;

            store.save(server_name, &token).await.map_err(|e| e.to_string())?;
            Ok(bearer(&token))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::auth::http::OAuthHttpResponse;
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedHttp(OAuthHttpResponse);

    #[async_trait]
    impl OAuthHttp for FixedHttp {
        async fn post_form(&self, _url: &str, _form: &[(&str, &str)]) -> Result<OAuthHttpResponse, String> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn no_config_resolves_to_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());
        let http = FixedHttp(OAuthHttpResponse { status: 200, body: json!({}) });

        let result = resolve_transport_auth(&http, &store, "srv", None).await.unwrap();
        assert!(matches!(result, TransportAuthOptions::None));
    }

    #[tokio::test]
    async fn client_credentials_without_token_url_delegates_to_auth_provider() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());
        let http = FixedHttp(OAuthHttpResponse { status: 200, body: json!({}) });

        let config = AuthConfig::ClientCredentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            token_url: None,
            scope: None,
        };

        let result = resolve_transport_auth(&http, &store, "srv", Some(&config)).await.unwrap();
        assert!(matches!(result, TransportAuthOptions::AuthProvider { .. }));
    }

    #[tokio::test]
    async fn client_credentials_with_token_url_fetches_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());
        let http = FixedHttp(OAuthHttpResponse {
            status: 200,
            body: json!({"access_token": "tok", "token_type": "Bearer", "expires_in": 3600}),
        });

        let config = AuthConfig::ClientCredentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            token_url: Some("https://example.test/token".to_string()),
            scope: None,
        };

        let result = resolve_transport_auth(&http, &store, "srv", Some(&config)).await.unwrap();
        assert!(matches!(result, TransportAuthOptions::RequestInit { authorization_header } if authorization_header == "Bearer tok"));
        assert!(store.load("srv").await.is_some());
    }

    #[tokio::test]
    async fn refresh_preserves_original_refresh_token_when_server_omits_one() {
        let http = FixedHttp(OAuthHttpResponse {
            status: 200,
            body: json!({"access_token": "new", "token_type": "Bearer"}),
        });

        let refreshed = refresh_token(&http, "https://example.test/token", "id", None, AuthType::DeviceCode, "orig-refresh")
            .await
            .unwrap();

        assert_eq!(refreshed.refresh_token.as_deref(), Some("orig-refresh"));
    }
}
