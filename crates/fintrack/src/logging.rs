//! Tracing setup: human-readable console output plus an optional rotating
//! JSON file.

use fintrack_config::FintrackConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const VERBOSE_FILTER: &str = "fintrack=debug,fintrack_session=debug,fintrack_cache=debug,fintrack_client=debug,fintrack_config=debug,info";
const DEFAULT_FILTER: &str = "fintrack=warn,fintrack_session=warn,fintrack_cache=warn,fintrack_client=warn,warn";
const FILE_FILTER: &str = "fintrack=trace,fintrack_session=trace,fintrack_cache=trace,fintrack_client=trace,fintrack_config=trace,info";

/// Install the global subscriber. The returned guard flushes the file
/// writer and must live until exit.
pub fn init(verbose: bool, config: &FintrackConfig) -> Option<WorkerGuard> {
    // RUST_LOG wins over --verbose.
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER }));

    // Console logs go to stderr so --json output stays parseable.
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let (file_layer, guard) = if config.logging.file_enabled() {
        let log_dir = config.logging.effective_dir(&config.storage);
        let appender = tracing_appender::rolling::daily(log_dir, "fintrack.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_filter(EnvFilter::new(FILE_FILTER));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}
