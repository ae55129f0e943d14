// ABOUTME: Tracing subscriber setup: stderr output plus a daily rolling log file
// ABOUTME: RUST_LOG overrides the default filter

use chatty_core::paths;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "chatty.log";

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// life of the process. `None` means file logging could not be set up and
/// only stderr is used.
pub fn init(verbose: bool) -> Option<WorkerGuard> {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let log_dir = paths::log_dir();
    let file_layer = match std::fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            Some((
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer),
                guard,
            ))
        }
        Err(e) => {
            eprintln!(
                "Could not create log directory {}: {} (logging to stderr only)",
                log_dir.display(),
                e
            );
            None
        }
    };

    let (file_layer, guard) = match file_layer {
        Some((layer, guard)) => (Some(layer), Some(guard)),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}
