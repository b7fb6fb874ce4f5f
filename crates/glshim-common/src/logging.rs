use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable consulted for the log filter.
pub const LOG_ENV: &str = "GLSHIM_LOG";

/// Initialize structured logging with environment filter.
/// Set GLSHIM_LOG=debug (or trace, info, warn, error) for verbosity control.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Same as [`init_logging`], but with a caller-chosen filter when GLSHIM_LOG is unset.
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_logging_with_default(default_filter: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();
}

/// Logging for test binaries: captured by the test harness, quiet unless GLSHIM_LOG is set.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
