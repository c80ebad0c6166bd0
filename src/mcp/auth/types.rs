//! Data model for the MCP OAuth subsystem.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

fn default_bearer() -> String {
    "Bearer".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    ClientCredentials,
    DeviceCode,
}

/// A persisted OAuth token for one MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default = "default_bearer")]
    pub token_type: String,
    pub obtained_at: i64,
    pub auth_type: AuthType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl Drop for StoredToken {
    /// Scrub the secret material from memory once a token is replaced or
    /// goes out of scope (e.g. after a refresh swaps in a new one).
    fn drop(&mut self) {
        self.access_token.zeroize();
        if let Some(refresh) = &mut self.refresh_token {
            refresh.zeroize();
        }
    }
}

/// RFC 8628 device authorization response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceAuthorizationResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_uri_complete: Option<String>,
    pub expires_in: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_timeout_seconds() -> u64 {
    300
}

/// Tagged union of how a given MCP server's auth is configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    ClientCredentials {
        client_id: String,
        client_secret: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        token_url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        scope: Option<String>,
    },
    DeviceCode {
        client_id: String,
        device_authorization_url: String,
        token_url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        client_secret: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        scope: Option<String>,
        #[serde(default = "default_poll_interval")]
        poll_interval_seconds: u64,
        #[serde(default = "default_timeout_seconds")]
        timeout_seconds: u64,
    },
}

/// What a transport should do to authenticate its requests.
#[derive(Debug, Clone)]
pub enum TransportAuthOptions {
    None,
    AuthProvider { name: String },
    RequestInit { authorization_header: String },
}
