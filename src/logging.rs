//! Logging setup for the engine and CLI.
//!
//! Filter directives come from the `[logging]` configuration section unless
//! `RUST_LOG` is set, which wins outright. Output is compact with uptime
//! timestamps, tuned for interactive CLI runs:
//!
//! ```bash
//! RUST_LOG=quarry=debug quarry index .
//! RUST_LOG=quarry::dispatch=trace quarry search search-code "walker"
//! ```

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Dependencies whose info-level chatter would drown the engine's own logs.
const NOISE_FLOOR: &[&str] = &["tantivy=warn", "ignore=warn"];

/// Assemble the filter directive string for a configuration: default level
/// first, then the noise floor, then per-module overrides (sorted, so the
/// rendering is stable).
fn filter_directives(config: &LoggingConfig) -> String {
    let mut directives = vec![config.default.clone()];
    directives.extend(NOISE_FLOOR.iter().map(|d| d.to_string()));

    let mut overrides: Vec<(&String, &String)> = config.modules.iter().collect();
    overrides.sort();
    directives.extend(
        overrides
            .into_iter()
            .map(|(module, level)| format!("{module}={level}")),
    );
    directives.join(",")
}

/// Install the global subscriber. Later calls are no-ops (the first
/// installation wins), so library consumers and tests may call this freely.
pub fn init_with_config(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));

    let _ = tracing_subscriber::fmt()
        .compact()
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_target(false)
        .with_env_filter(filter)
        .try_init();
}

/// Install the global subscriber with default levels (`warn`, quiet).
pub fn init() {
    init_with_config(&LoggingConfig::default());
}
