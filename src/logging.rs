/// Tracing setup for the harvester.
///
/// Three layers share one `EnvFilter`:
/// - daily-rotated text log (`harvester.log`)
/// - daily-rotated JSON log (`harvester.json.log`)
/// - compact terminal output
use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const TEXT_LOG_FILE: &str = "harvester.log";
pub const JSON_LOG_FILE: &str = "harvester.json.log";

/// Filter from `RUST_LOG`, falling back to `info`.
pub fn env_filter() -> Result<EnvFilter, Box<dyn std::error::Error>> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new("info")?),
    }
}

/// Initialize the global subscriber, writing files under `log_dir`.
///
/// Fails if a global subscriber is already set.
pub fn init_logging<P: AsRef<Path>>(log_dir: P) -> Result<(), Box<dyn std::error::Error>> {
    let log_path = log_dir.as_ref();
    std::fs::create_dir_all(log_path)?;

    let filter = env_filter()?;

    let (text_writer, text_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_path, TEXT_LOG_FILE));
    let (json_writer, json_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_path, JSON_LOG_FILE));

    let text_layer = fmt::layer()
        .with_writer(text_writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_ansi(false)
        .compact()
        .with_filter(filter.clone());

    let json_layer = fmt::layer()
        .json()
        .with_writer(json_writer)
        .with_target(true)
        .with_line_number(true)
        .with_current_span(true)
        .with_span_list(true)
        .with_filter(filter.clone());

    let stdout_layer = fmt::layer()
        .with_target(false)
        .compact()
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(text_layer)
        .with(json_layer)
        .with(stdout_layer)
        .try_init()?;

    // Writers flush on guard drop; keep them for the process lifetime.
    Box::leak(Box::new(text_guard));
    Box::leak(Box::new(json_guard));

    tracing::debug!("Logs written to {}", log_path.display());
    Ok(())
}

/// Logs go to `<data_dir>/logs`.
pub fn init_logging_in_data_dir<P: AsRef<Path>>(
    data_dir: P,
) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(data_dir.as_ref().join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_log_dir_and_rejects_second_init() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("data");

        let first = init_logging_in_data_dir(&data_dir);
        assert!(data_dir.join("logs").exists());

        // Another test may have installed a global subscriber first; either way
        // a repeat init must fail instead of panicking.
        if first.is_ok() {
            assert!(init_logging_in_data_dir(&data_dir).is_err());
        }
    }
}
