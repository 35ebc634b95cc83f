use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "qrscan=info";

/// Installs the global fmt subscriber. `RUST_LOG` wins over `default_filter`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(default_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.unwrap_or(DEFAULT_FILTER).into());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}
