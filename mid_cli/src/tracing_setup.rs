//! Tracing subscriber setup: pretty or JSON-lines console output, plus an
//! optional rolling file sink configured under `[logging]`.

use std::path::Path;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cli::FILE_GUARD;

/// Install the global tracing subscriber. `log_file`/`rotation` come from
/// `Config::logging`; when `log_file` is `None` only the console layer runs.
pub fn init_tracing(json: bool, log_level: &str, log_file: Option<&str>, rotation: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let console_layer = if json {
        fmt::layer().json().with_target(false).boxed()
    } else {
        fmt::layer().with_target(false).boxed()
    };
    let registry = tracing_subscriber::registry().with(filter).with(console_layer);

    match log_file {
        Some(path) => {
            let path = Path::new(path);
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
            let file_name = path.file_name().and_then(|f| f.to_str()).unwrap_or("mid.log");
            let appender = match rotation {
                Some("daily") => tracing_appender::rolling::daily(dir, file_name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, file_name),
                _ => tracing_appender::rolling::never(dir, file_name),
            };
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false).json();
            registry.with(file_layer).init();
        }
        None => registry.init(),
    }
}
