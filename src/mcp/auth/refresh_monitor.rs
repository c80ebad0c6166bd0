//! Refresh Monitor: periodic proactive token refresh with event emission.
//!
//! Runs a `tokio::time::interval` loop that drives `check_once()` over every
//! tracked server, isolating each server's refresh attempt so one failure
//! never stops the others.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, instrument, warn};

use crate::event_bus::{EventBus, FabricEvent};
use crate::mcp::auth::provider_factory::refresh_token;
use crate::mcp::auth::http::OAuthHttp;
use crate::mcp::auth::token_store::TokenStore;
use crate::mcp::auth::types::AuthConfig;

/// 5-minute window before `expiresAt` during which the monitor attempts
/// proactive refresh.
const REFRESH_THRESHOLD_MS: i64 = 300_000;

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

pub struct RefreshMonitor {
    store: Arc<TokenStore>,
    http: Arc<dyn OAuthHttp>,
    bus: Arc<dyn EventBus>,
    tracked: Arc<DashMap<String, AuthConfig>>,
    check_interval: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshMonitor {
    pub fn new(store: Arc<TokenStore>, http: Arc<dyn OAuthHttp>, bus: Arc<dyn EventBus>, check_interval: Duration) -> Self {
        Self {
            store,
            http,
            bus,
            tracked: Arc::new(DashMap::new()),
            check_interval,
            handle: Mutex::new(None),
        }
    }

    pub fn track(&self, server_name: impl Into<String>, config: AuthConfig) {
        self.tracked.insert(server_name.into(), config);
    }

    pub fn untrack(&self, server_name: &str) {
        self.tracked.remove(server_name);
    }

    pub fn on_event(&self) -> tokio::sync::broadcast::Receiver<FabricEvent> {
        self.bus.subscribe()
    }

    /// Start the periodic loop. Idempotent: calling twice replaces the
    /// previous loop.
    pub fn start(self: &Arc<Self>) {
        let monitor = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(monitor.check_interval);
            loop {
                interval.tick().await;
                monitor.check_once().await;
            }
        });
        *self.handle.lock() = Some(handle);
    }

    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
    }

    /// Run one check cycle over all tracked servers. Exposed directly so
    /// tests don't need to wait on the timer.
    #[instrument(skip(self))]
    pub async fn check_once(&self) {
        let snapshot: HashMap<String, AuthConfig> = self
            .tracked
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        for (server_name, config) in snapshot {
            if let Err(e) = self.check_server(&server_name, &config).await {
                error!(server = %server_name, error = %e, "refresh monitor handler failed; continuing");
            }
        }
    }

    async fn check_server(&self, server_name: &str, config: &AuthConfig) -> Result<(), String> {
        let Some(token) = self.store.load(server_name).await else {
            return Ok(());
        };
        let Some(expires_at) = token.expires_at else {
            return Ok(());
        };

        let ms_left = expires_at - now_ms();

        if ms_left <= 0 {
            let _ = self.bus.publish(FabricEvent::AuthExpired {
                server: server_name.to_string(),
                message: format!("token for \"{server_name}\" expired {} ms ago", -ms_left),
            });
            return Ok(());
        }

        if ms_left > REFRESH_THRESHOLD_MS {
            return Ok(());
        }

        let Some(refresh_value) = &token.refresh_token else {
            let _ = self.bus.publish(FabricEvent::AuthExpiringSoon {
                server: server_name.to_string(),
                message: format!("token for \"{server_name}\" expires in {ms_left} ms with no refresh token"),
            });
            return Ok(());
        };

        let (token_url, client_id, client_secret) = match config {
            AuthConfig::ClientCredentials {
                token_url: Some(url),
                client_id,
                client_secret,
                ..
            } => (url.clone(), client_id.clone(), Some(client_secret.clone())),
            AuthConfig::DeviceCode {
                token_url,
                client_id,
                client_secret,
                ..
            } => (token_url.clone(), client_id.clone(), client_secret.clone()),
            _ => {
                warn!(server = %server_name, "no refreshable token_url configured; skipping");
                return Ok(());
            }
        };

        match refresh_token(
            self.http.as_ref(),
            &token_url,
            &client_id,
            client_secret.as_deref(),
            token.auth_type,
            refresh_value,
        )
        .await
        {
            Ok(refreshed) => {
                self.store
                    .save(server_name, &refreshed)
                    .await
                    .map_err(|e| e.to_string())?;
                let _ = self.bus.publish(FabricEvent::AuthRefreshed {
                    server: server_name.to_string(),
                    message: "proactive refresh succeeded".to_string(),
                });
                Ok(())
            }
            Err(e) => {
                let _ = self.bus.publish(FabricEvent::AuthRefreshFailed {
                    server: server_name.to_string(),
                    message: e.clone(),
                });
                Ok(())
            }
        }
    }
}
