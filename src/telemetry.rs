//! Tracing subscriber setup for binaries and benches.

use std::io::IsTerminal;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Install a formatted subscriber filtered by `RUST_LOG`, or by
/// `default_directive` when `RUST_LOG` is unset or invalid.
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);
    Registry::default().with(filter).with(fmt_layer).try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_refused() {
        let _ = init_tracing("warn");
        assert!(!init_tracing("debug"));
    }
}
