//! Subscriber setup for the harness binary.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter directive used when `RUST_LOG` is unset.
#[must_use]
pub const fn default_directive(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

/// Builds the level filter, preferring `RUST_LOG` when it parses.
#[must_use]
pub fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

/// Installs a stderr fmt layer behind [`env_filter`].
///
/// Returns `false` when a global subscriber was already installed.
#[must_use]
pub fn init_logging(verbose: bool) -> bool {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(env_filter(verbose))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(false, "info")]
    #[case(true, "debug")]
    fn verbosity_selects_directive(#[case] verbose: bool, #[case] expected: &str) {
        assert_eq!(default_directive(verbose), expected);
    }

    #[rstest]
    fn second_install_is_reported() {
        let _first = init_logging(false);
        assert!(!init_logging(true));
    }
}
