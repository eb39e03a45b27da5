//! `tracing` subscriber bootstrap.

use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` when the variable is unset or unparsable.
///
/// Returns `false` if a global subscriber was already installed (by an
/// earlier call or by the host application); the existing one stays active.
pub fn init_logging(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(default_filter).unwrap_or_else(|_| EnvFilter::new("info"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_reports_false() {
        // Another test may have installed it first.
        let _ = init_logging("warn");
        assert!(!init_logging("debug"));
    }

    #[test]
    fn bad_filter_falls_back() {
        let _ = init_logging("this is = not [a filter");
        tracing::info!("still logging");
    }
}
