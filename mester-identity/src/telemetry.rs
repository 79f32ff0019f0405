use tracing_subscriber::EnvFilter;

/// Initialize tracing for structured logging.
///
/// `RUST_LOG` wins when set; otherwise DEBUG in debug builds and INFO in
/// release builds. Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    #[cfg(debug_assertions)]
    let log_level = tracing::Level::DEBUG;
    #[cfg(not(debug_assertions))]
    let log_level = tracing::Level::INFO;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(log_level.into()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}
