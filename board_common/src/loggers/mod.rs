//! # Logging Setup
//!
//! Installs the global `tracing` subscriber for the binaries: an `EnvFilter`
//! (from `RUST_LOG`, falling back to the configured level), a compact stdout
//! layer, and optionally a non-blocking file layer in `log_dir`.
//!
//! Each run writes a fresh timestamped `.log` file. Older files are pruned at
//! start-up so the directory keeps the previous run's log plus the new one.

use std::fs;
use std::path::Path;

pub use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::error::ClientError;

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the file writer.
///
/// # Errors
///
/// Returns [`ClientError::Config`] if the log directory cannot be prepared or
/// a global subscriber is already installed.
pub fn setup_logging(
    log_dir: Option<&Path>,
    log_level: &str,
    file_prefix: &str,
) -> Result<Option<WorkerGuard>, ClientError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| ClientError::Config(format!("log level '{log_level}': {e}")))?;

    let stdout_layer = fmt::layer().with_target(true).compact();

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .map_err(|e| ClientError::Config(format!("{}: {e}", dir.display())))?;
            cleanup_old_logs(dir, file_prefix)?;

            let file_name = format!(
                "{file_prefix}_{}.log",
                chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
            );
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ClientError::Config(format!("logging already initialised: {e}")))?;

    Ok(guard)
}

/// Delete every `<prefix>*.log` in `log_dir` except the most recent one.
fn cleanup_old_logs(log_dir: &Path, file_prefix: &str) -> Result<(), ClientError> {
    let entries = fs::read_dir(log_dir)
        .map_err(|e| ClientError::Config(format!("{}: {e}", log_dir.display())))?;

    let mut logs: Vec<_> = entries
        .filter_map(Result::ok)
        .filter(|e| {
            let path = e.path();
            path.extension().is_some_and(|ext| ext == "log")
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(file_prefix))
        })
        .filter_map(|e| {
            let modified = e.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, e.path()))
        })
        .collect();

    logs.sort_by(|a, b| b.0.cmp(&a.0));

    for (_, path) in logs.iter().skip(1) {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to delete old log file");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    fn touch(path: &Path, age_secs: u64) {
        let file = fs::File::create(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
    }

    #[test]
    fn cleanup_keeps_newest_matching_log() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("board_old.log"), 300);
        touch(&dir.path().join("board_older.log"), 600);
        touch(&dir.path().join("board_new.log"), 10);
        touch(&dir.path().join("other_app.log"), 900);
        touch(&dir.path().join("board_notes.txt"), 900);

        cleanup_old_logs(dir.path(), "board").unwrap();

        let mut left: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        left.sort();
        assert_eq!(left, ["board_new.log", "board_notes.txt", "other_app.log"]);
    }
}
