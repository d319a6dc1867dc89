//! # Tracing Setup
//!
//! The engine logs with `tracing` and structured fields:
//!
//! - resource actors: `resource`, `id`, `size` on start, writes and shutdown;
//! - the action resolver: `target`, `action`, `outcome` per dispatch, plus
//!   blocked validations and degraded cascades;
//! - form state: `dependent`, `source`, `generation` when stale props are
//!   discarded.
//!
//! ```bash
//! RUST_LOG=info cargo run -p crudl-blog     # dispatch outcomes, writes
//! RUST_LOG=debug cargo run -p crudl-blog    # full request payloads
//! ```

use crate::config::EngineConfig;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over `config.log_filter`. Calling it again once a
/// subscriber is installed does nothing.
pub fn setup_tracing(config: &EngineConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}
