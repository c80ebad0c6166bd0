mod device_code;
mod http;
mod provider_factory;
mod refresh_monitor;
mod token_store;
mod types;

pub use device_code::{DeviceCodeConfig, poll_for_token, request_authorization, run as run_device_code};
pub use http::{OAuthHttp, OAuthHttpResponse, ReqwestHttp};
pub use provider_factory::{refresh_token, resolve_transport_auth};
pub use refresh_monitor::RefreshMonitor;
pub use token_store::TokenStore;
pub use types::{AuthConfig, AuthType, DeviceAuthorizationResponse, StoredToken, TransportAuthOptions};
