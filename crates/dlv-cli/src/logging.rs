use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `DLV_LOG` wins over `RUST_LOG`; without
/// either, the level is `info` (`debug` with `--verbose`).
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_tracing(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(std::io::stderr)
        .init();
}

pub fn env_filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_env("DLV_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(fallback))
}
