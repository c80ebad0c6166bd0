//! TOML configuration loading with env-var overrides.
//!
//! # Loading order
//! 1. Parse `<dir>/fabric.toml` (or the path in `FABRIC_CONFIG`).
//! 2. Apply `FABRIC_*` environment variable overrides.
//! 3. Fall back to [`FabricConfig::default()`] if the file is missing.

use std::{env, fs, path::Path, path::PathBuf};

use super::schema::FabricConfig;

/// Default config path: `~/.fabric/fabric.toml`.
pub fn default_config_path() -> Result<PathBuf, String> {
    directories::BaseDirs::new()
        .map(|b| b.home_dir().join(".fabric").join("fabric.toml"))
        .ok_or_else(|| "could not determine home directory".to_string())
}

pub fn load_config(path: &Path) -> Result<FabricConfig, String> {
    let mut config = match fs::read_to_string(path) {
        Ok(content) => toml::from_str::<FabricConfig>(&content)
            .map_err(|e| format!("failed to parse config at {path:?}: {e}"))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => FabricConfig::default(),
        Err(e) => return Err(format!("failed to read config at {path:?}: {e}")),
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

/// Load config from the default path (or `FABRIC_CONFIG`), never failing —
/// parse errors fall back to defaults just like a missing file.
pub fn load_default_config() -> FabricConfig {
    let path = env::var("FABRIC_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_config_path().unwrap_or_else(|_| PathBuf::from("fabric.toml")));

    load_config(&path).unwrap_or_default()
}

/// Apply `FABRIC_*` environment variable overrides to `config`.
///
/// - `FABRIC_TOOL_DEFAULT_TIMEOUT_MS` → `tools.default_timeout_ms`
/// - `FABRIC_TOOL_MAX_TIMEOUT_MS`     → `tools.max_timeout_ms`
/// - `FABRIC_BACKGROUND_CLEANUP_SECS` → `background.cleanup_age_secs`
/// - `FABRIC_AUTH_DIR`                → `token_store.auth_dir`
/// - `FABRIC_REFRESH_INTERVAL_SECS`   → `refresh_monitor.check_interval_secs`
fn env_override<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

fn apply_env_overrides(config: &mut FabricConfig) {
    if let Some(n) = env_override("FABRIC_TOOL_DEFAULT_TIMEOUT_MS") {
        config.tools.default_timeout_ms = n;
    }
    if let Some(n) = env_override("FABRIC_TOOL_MAX_TIMEOUT_MS") {
        config.tools.max_timeout_ms = n;
    }
    if let Some(n) = env_override("FABRIC_BACKGROUND_CLEANUP_SECS") {
        config.background.cleanup_age_secs = n;
    }
    if let Ok(v) = env::var("FABRIC_AUTH_DIR") {
        config.token_store.auth_dir = v;
    }
    if let Some(n) = env_override("FABRIC_REFRESH_INTERVAL_SECS") {
        config.refresh_monitor.check_interval_secs = n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_default() {
        let cfg = load_config(Path::new("/nonexistent/fabric.toml")).unwrap();
        assert_eq!(cfg, FabricConfig::default());
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fabric.toml");
        fs::write(&path, "[tools]\ndefault_timeout_ms = 5000\n").unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.tools.default_timeout_ms, 5000);
        assert_eq!(cfg.tools.max_timeout_ms, 600_000); // default preserved
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fabric.toml");
        fs::write(&path, "not valid = = toml").unwrap();

        assert!(load_config(&path).is_err());
    }
}
