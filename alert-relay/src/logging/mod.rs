//! Tracing subscriber set-up.
//!
//! Console output always; a daily-rolling file when a log directory is
//! configured. Timestamps use the server's local timezone.

use std::path::Path;

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log file prefix inside the log directory.
const LOG_FILE_NAME: &str = "alert-relay.log";

/// Timer printing local time instead of UTC.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Default filter for a `LOG_LEVEL` value such as `INFO` or `debug`.
pub fn default_filter(level: &str) -> String {
    let level = match level.trim().to_lowercase().as_str() {
        "critical" | "fatal" => "error".to_string(),
        "warning" => "warn".to_string(),
        other => other.to_string(),
    };
    format!("alert_relay={level},tower_http=info")
}

/// Installs the global subscriber. `RUST_LOG` wins over `level`.
///
/// Keep the returned guard alive for the lifetime of the process, otherwise
/// buffered file output is lost.
pub fn init_logging(level: &str, log_dir: Option<&Path>) -> crate::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(level)))
        .map_err(|e| crate::Error::config(format!("Invalid log filter: {e}")))?;

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .with(file_layer)
        .try_init()
        .map_err(|e| crate::Error::Other(format!("Failed to set global default subscriber: {e}")))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter("INFO"), "alert_relay=info,tower_http=info");
        assert_eq!(default_filter("WARNING"), "alert_relay=warn,tower_http=info");
        assert_eq!(default_filter("critical"), "alert_relay=error,tower_http=info");
        assert!(EnvFilter::try_new(default_filter("DEBUG")).is_ok());
    }
}
