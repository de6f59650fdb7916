//! Process-wide logging for Boopkit.
//!
//! The core never writes to stderr or a file directly — it sends structured
//! entries to whatever sink the shell installed. When no sink is installed,
//! entries are dropped silently, so library code can log unconditionally.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use chrono::{SecondsFormat, Utc};

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Destination for log entries. Implementations must be thread-safe; `write`
/// is called from whichever thread is executing a script.
pub trait LogSink: Send + Sync {
    fn write(&self, level: LogLevel, script_name: &str, message: &str);
}

static SINK: OnceLock<Box<dyn LogSink>> = OnceLock::new();

/// Install the process-wide sink. The first call wins; later calls return
/// false and leave the existing sink in place.
pub fn set_sink(sink: Box<dyn LogSink>) -> bool {
    SINK.set(sink).is_ok()
}

/// Write a structured entry to the installed sink.
/// Safe to call from any thread. A no-op when no sink is installed.
pub fn log(level: LogLevel, script_name: &str, message: &str) {
    if let Some(sink) = SINK.get() {
        sink.write(level, script_name, message);
    }
}

/// Appending file sink. One line per entry:
/// `<rfc3339> [<LEVEL>] script="<name>" <message>`
pub struct FileSink {
    file: Mutex<File>,
    path: PathBuf,
}

impl FileSink {
    /// Open (or create) the log file in append mode.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().append(true).create(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Resolved path of the log file, for display in error messages.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileSink {
    fn write(&self, level: LogLevel, script_name: &str, message: &str) {
        let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let line = format!("{ts} [{level}] script={script_name:?} {message}\n");
        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(line.as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_without_sink_is_silent() {
        // Must not panic; nothing to assert beyond "did not crash".
        log(LogLevel::Info, "no-sink", "dropped");
    }

    #[test]
    fn test_level_display() {
        assert_eq!(LogLevel::Info.to_string(), "INFO");
        assert_eq!(LogLevel::Warn.to_string(), "WARN");
        assert_eq!(LogLevel::Error.to_string(), "ERROR");
    }

    #[test]
    fn test_file_sink_appends_lines() {
        let dir = std::env::temp_dir().join("boopkit_logging_test");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("boopkit.log");
        let _ = std::fs::remove_file(&path);

        let sink = FileSink::open(&path).unwrap();
        sink.write(LogLevel::Warn, "Trim", "skipping: bad header");
        sink.write(LogLevel::Info, "Trim", "done");

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[WARN]"));
        assert!(lines[0].contains("script=\"Trim\""));
        assert!(lines[0].ends_with("skipping: bad header"));
        assert!(lines[1].contains("[INFO]"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
