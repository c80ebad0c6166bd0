//! Crate-wide error taxonomy.
//!
//! Each component gets its own small `thiserror` enum; `FabricError` is the
//! top-level union used at the edges where callers need one type.

use thiserror::Error;

/// Discriminated kind for a failed tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorKind {
    NotFound,
    Validation,
    Timeout,
    Permission,
    Unknown,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool \"{0}\" not found")]
    NotFound(String),

    #[error("Parameter validation failed: {0}")]
    Validation(String),

    #[error("Tool execution timed out after {0}ms")]
    Timeout(u64),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("{0}")]
    Unknown(String),
}

impl ToolError {
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            ToolError::NotFound(_) => ToolErrorKind::NotFound,
            ToolError::Validation(_) => ToolErrorKind::Validation,
            ToolError::Timeout(_) => ToolErrorKind::Timeout,
            ToolError::Permission(_) => ToolErrorKind::Permission,
            ToolError::Unknown(_) => ToolErrorKind::Unknown,
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// RFC 8628 device-code flow terminal states.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceCodeAuthError {
    #[error("device authorization request failed: {0}")]
    Network(String),

    #[error("authorization was denied by the user")]
    Denied,

    #[error("the device code expired before authorization completed")]
    Expired,

    #[error("polling deadline was reached before authorization completed")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum PumpError {
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("{0}")]
    Other(String),
}

/// Top-level union used at public API boundaries that can fail for more
/// than one component-specific reason.
#[derive(Debug, Error)]
pub enum FabricError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),

    #[error(transparent)]
    DeviceCode(#[from] DeviceCodeAuthError),

    #[error(transparent)]
    Pump(#[from] PumpError),

    #[error("configuration error: {0}")]
    Config(String),
}
