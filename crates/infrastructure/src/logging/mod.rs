//! Append-only file logs: one for successes, one for failures and
//! inconsistencies, and an app log gated by the instrumentation level.

use chrono::Local;
use dnsres_domain::{config, Level, ResolveError};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const SUCCESS_LOG: &str = "dnsres-success.log";
pub const ERROR_LOG: &str = "dnsres-error.log";
pub const APP_LOG: &str = "dnsres-app.log";

#[derive(Debug)]
pub struct FileLog {
    file: Mutex<File>,
}

impl FileLog {
    fn open(path: &Path) -> Result<Self, ResolveError> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|e| {
                ResolveError::LogSetup(format!("failed to open {}: {e}", path.display()))
            })?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Append one timestamped line. Write errors are swallowed; a log line
    /// must never fail a resolution.
    pub fn log(&self, message: &str) {
        if let Ok(mut file) = self.file.lock() {
            let stamp = Local::now().format("%Y/%m/%d %H:%M:%S");
            let _ = writeln!(file, "{stamp} {message}");
        }
    }
}

#[derive(Debug)]
pub struct ResolverLogs {
    success: FileLog,
    error: FileLog,
    app: FileLog,
    level: Level,
    dir: PathBuf,
    dir_was_fallback: bool,
}

impl ResolverLogs {
    /// Open the three log files under `log_dir`. An empty (or legacy
    /// "logs") directory resolves to the XDG state dir, falling back to
    /// `$HOME/logs`; the fallback is noted as the app log's first line.
    pub fn open(log_dir: &str, level: Level) -> Result<Self, ResolveError> {
        let (dir, dir_was_fallback) = if log_dir.is_empty() || log_dir == "logs" {
            config::ensure_state_dir().map_err(|e| ResolveError::LogSetup(e.to_string()))?
        } else {
            let dir = PathBuf::from(log_dir);
            std::fs::create_dir_all(&dir).map_err(|e| {
                ResolveError::LogSetup(format!(
                    "failed to create log directory {}: {e}",
                    dir.display()
                ))
            })?;
            (dir, false)
        };

        let logs = Self {
            success: FileLog::open(&dir.join(SUCCESS_LOG))?,
            error: FileLog::open(&dir.join(ERROR_LOG))?,
            app: FileLog::open(&dir.join(APP_LOG))?,
            level,
            dir,
            dir_was_fallback,
        };

        if logs.dir_was_fallback {
            logs.app.log(&format!(
                "log directory fell back to {} (XDG state directory unavailable)",
                logs.dir.display()
            ));
        }

        Ok(logs)
    }

    pub fn success(&self, message: &str) {
        self.success.log(message);
    }

    pub fn error(&self, message: &str) {
        self.error.log(message);
    }

    /// App-log line, emitted only when the configured instrumentation
    /// level is at least `min_level`.
    pub fn app(&self, min_level: Level, message: &str) {
        if self.level >= min_level {
            self.app.log(message);
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn dir_was_fallback(&self) -> bool {
        self.dir_was_fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(dir: &Path, name: &str) -> String {
        std::fs::read_to_string(dir.join(name)).unwrap_or_default()
    }

    #[test]
    fn success_and_error_lines_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let logs = ResolverLogs::open(dir.path().to_str().unwrap(), Level::None).unwrap();

        logs.success("Resolved example.com using 8.8.8.8:53 (state: closed)");
        logs.error("Failed to resolve example.com using 1.1.1.1:53: SERVFAIL");

        let success = read(dir.path(), SUCCESS_LOG);
        assert!(success.contains("Resolved example.com"));
        let error = read(dir.path(), ERROR_LOG);
        assert!(error.contains("SERVFAIL"));
    }

    #[test]
    fn app_log_is_gated_by_level() {
        let dir = tempfile::tempdir().unwrap();
        let logs = ResolverLogs::open(dir.path().to_str().unwrap(), Level::Low).unwrap();

        logs.app(Level::Low, "lifecycle line");
        logs.app(Level::High, "per-query line");

        let app = read(dir.path(), APP_LOG);
        assert!(app.contains("lifecycle line"));
        assert!(!app.contains("per-query line"));
    }

    #[test]
    fn lines_carry_a_timestamp_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let logs = ResolverLogs::open(dir.path().to_str().unwrap(), Level::None).unwrap();
        logs.success("stamped");

        let line = read(dir.path(), SUCCESS_LOG);
        // YYYY/MM/DD HH:MM:SS prefix
        assert!(line.len() > 20);
        assert_eq!(&line[4..5], "/");
        assert_eq!(&line[7..8], "/");
    }
}
