//! HTTP abstraction for the OAuth flows (device-code polling, client
//! credentials, refresh). Rather than mocking `reqwest` directly, the flows
//! depend on this trait, and tests inject a hand-written fake.

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct OAuthHttpResponse {
    pub status: u16,
    pub body: Value,
}

impl OAuthHttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait OAuthHttp: Send + Sync {
    /// POST a URL-encoded form, returning the parsed JSON body regardless of
    /// status code (callers inspect `status`/`body` themselves — OAuth error
    /// bodies are valid JSON on non-2xx responses).
    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<OAuthHttpResponse, String>;
}

/// Production [`OAuthHttp`] backed by `reqwest` (rustls-tls).
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestHttp {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OAuthHttp for ReqwestHttp {
    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<OAuthHttpResponse, String> {
        let response = self
            .client
            .post(url)
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status().as_u16();
        let body = response.json::<Value>().await.map_err(|e| e.to_string())?;
        Ok(OAuthHttpResponse { status, body })
    }
}
