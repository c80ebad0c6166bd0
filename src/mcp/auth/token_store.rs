//! Token Store: filesystem-backed per-server token persistence with
//! restrictive permissions and name sanitization.
//!
//! Tokens live at `<authDir>/mcp/<sanitized-name>.json`, with the directory
//! created mode `0700` and each token file written mode `0600`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::TokenStoreError;
use crate::mcp::auth::types::StoredToken;

/// 60-second grace subtracted from `expiresAt` when validating a cached
/// token.
const EXPIRY_BUFFER_MS: i64 = 60_000;

pub struct TokenStore {
    base_dir: PathBuf,
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl TokenStore {
    /// `auth_dir` is the root configured via [`crate::config::FabricConfig`];
    /// tokens live under `<auth_dir>/mcp`.
    pub fn new(auth_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: auth_dir.into().join("mcp"),
        }
    }

    fn path_for(&self, server_name: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", sanitize(server_name)))
    }

    async fn ensure_dir(&self) -> Result<(), TokenStoreError> {
        fs::create_dir_all(&self.base_dir).await?;
        set_permissions(&self.base_dir, 0o700).await;
        Ok(())
    }

    /// Returns `None` if the file is absent, unreadable, invalid JSON, or
    /// fails schema validation — never surfaces an error to the caller.
    pub async fn load(&self, server_name: &str) -> Option<StoredToken> {
        let path = self.path_for(server_name);
        let bytes = fs::read(&path).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub async fn save(&self, server_name: &str, token: &StoredToken) -> Result<(), TokenStoreError> {
        self.ensure_dir().await?;
        let path = self.path_for(server_name);
        let body = serde_json::to_vec_pretty(token)?;

        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, &body).await?;
        set_permissions(&tmp_path, 0o600).await;
        fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    /// Idempotent: a no-op if the file is already absent.
    pub async fn delete(&self, server_name: &str) -> Result<(), TokenStoreError> {
        let path = self.path_for(server_name);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// `true` if `expiresAt` is absent, else `expiresAt - now > 60_000`.
    /// Exactly 60s remaining counts as invalid, not valid.
    pub fn is_valid(token: &StoredToken, now_ms: i64) -> bool {
        match token.expires_at {
            None => true,
            Some(expires_at) => expires_at - now_ms > EXPIRY_BUFFER_MS,
        }
    }

    /// Groups `names` by sanitized form; reports any group with ≥ 2 entries.
    pub fn check_name_collisions(names: &[String]) -> Vec<String> {
        let mut groups: HashMap<String, Vec<String>> = HashMap::new();
        for name in names {
            groups.entry(sanitize(name)).or_default().push(name.clone());
        }

        let mut messages: Vec<String> = groups
            .into_iter()
            .filter(|(_, members)| members.len() >= 2)
            .map(|(sanitized, members)| {
                format!(
                    "server names {:?} all sanitize to \"{}\" and would collide on disk",
                    members, sanitized
                )
            })
            .collect();
        messages.sort();
        messages
    }
}

#[cfg(unix)]
async fn set_permissions(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(metadata) = fs::metadata(path).await {
        let mut perms = metadata.permissions();
        perms.set_mode(mode);
        let _ = fs::set_permissions(path, perms).await;
    }
}

#[cfg(not(unix))]
async fn set_permissions(_path: &Path, _mode: u32) {}
