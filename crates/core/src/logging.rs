use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// `KILN_LOG_DIR` if set, otherwise `~/.kiln/logs`.
pub fn log_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("KILN_LOG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".kiln/logs")
}

pub fn init_logging(component: &str, to_stderr: bool) -> WorkerGuard {
    init_logging_in(&log_dir(), component, to_stderr)
}

/// Installs the global subscriber writing to `log_dir`. When one is already
/// installed, as in test binaries, the existing one is kept.
pub fn init_logging_in(log_dir: &Path, component: &str, to_stderr: bool) -> WorkerGuard {
    let _ = std::fs::create_dir_all(log_dir);

    // Roll daily, e.g. cli.log.2026-01-21
    let file_appender = tracing_appender::rolling::daily(log_dir, format!("{component}.log"));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    let installed = if to_stderr {
        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false);
        registry.with(stderr_layer).try_init()
    } else {
        registry.try_init()
    };
    if let Err(e) = installed {
        debug!("Keeping the existing subscriber: {}", e);
    }

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_keeps_first_subscriber() {
        let temp = tempfile::tempdir().unwrap();
        let _first = init_logging_in(temp.path(), "test", false);
        let _second = init_logging_in(temp.path(), "test", true);
        tracing::info!("still logging");
        assert!(temp.path().is_dir());
    }
}
