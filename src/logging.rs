use tracing_subscriber::EnvFilter;

/// Picks the log level to use when `RUST_LOG` isn't set.
pub fn default_directive(verbose: bool, silent: bool) -> &'static str {
    match (verbose, silent) {
        (true, _) => "debug",
        (false, true) => "warn",
        (false, false) => "info",
    }
}

/// Installs the global `tracing` subscriber. `RUST_LOG` takes precedence over the command line.
pub fn init_logging(verbose: bool, silent: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, silent)));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}
