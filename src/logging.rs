/// Structured logging setup using tracing
///
/// Writes to stderr ONLY: stdout carries the reconciled CSV.
/// Auto-detects format: human-readable with ANSI colors when stderr is a terminal,
/// structured JSON when piped/redirected.

use std::io::IsTerminal;
use tracing_subscriber::{
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};
use crate::config::Config;

/// Our own events at `level`; HTTP client internals only from warn up.
fn default_directives(level: &str) -> String {
    format!("warn,placerecon={}", level.trim())
}

/// Initialize tracing subscriber with stderr-only output
///
/// Log level from config.log_level (default: info)
/// RUST_LOG env var can override at runtime
pub fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)));

    let terminal = std::io::stderr().is_terminal();
    if terminal {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .json()
            )
            .init();
    }

    tracing::debug!(level = %config.log_level, json = !terminal, "Logging to stderr, reconciled CSV goes to stdout or --output");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_scope_level_to_this_crate() {
        assert_eq!(default_directives("debug"), "warn,placerecon=debug");
        assert_eq!(default_directives(" info "), "warn,placerecon=info");
    }
}
