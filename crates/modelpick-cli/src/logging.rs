use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Env var holding the log filter; `RUST_LOG` is consulted when unset.
pub const LOG_ENV: &str = "MODELPICK_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Log to stderr so stdout stays clean for listings and `--json`.
pub fn init(verbose: bool) {
    let fallback = if verbose {
        "info,modelpick_catalog=debug,modelpick_registry=debug"
    } else {
        DEFAULT_FILTER
    };
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(fallback));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .try_init();
}
