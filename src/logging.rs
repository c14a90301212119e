use tracing_subscriber::EnvFilter;

/// Install the process-wide subscriber. `AIRCHECK_LOG` takes the usual
/// env-filter syntax; unset means `info`.
pub fn init() {
    let filter = EnvFilter::try_from_env("AIRCHECK_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
