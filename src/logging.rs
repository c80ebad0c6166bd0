//! Tracing setup for binaries built on top of `fabric_core`.
//!
//! The library itself never installs a global subscriber — only a binary
//! entrypoint should call [`init`]. `lib.rs` only emits `tracing` events;
//! `bin/` entrypoints own the `tracing_subscriber::fmt` setup.

use tracing_subscriber::{EnvFilter, fmt};

/// Install a process-wide `tracing` subscriber.
///
/// Honors `RUST_LOG` if set, otherwise defaults to `info` for this crate and
/// `warn` for dependencies.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,fabric_core=info,fabricd=info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
