//! Logging infrastructure for mdeck
//!
//! The presenter owns the terminal, so diagnostics go to
//! `~/.mdeck/logs/` instead of stderr. Date-based files, old ones pruned.

use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

struct Logger {
    file: File,
}

impl Logger {
    fn new() -> Option<Self> {
        let log_dir = crate::config::mdeck_dir()?.join("logs");
        fs::create_dir_all(&log_dir).ok()?;

        let date = Local::now().format("%Y-%m-%d");
        let path = log_dir.join(format!("mdeck-{}.log", date));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .ok()?;
        Some(Self { file })
    }

    fn write(&mut self, level: &str, message: &str) {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let line = format!("[{}] [{}] {}\n", timestamp, level, message);
        let _ = self.file.write_all(line.as_bytes());
        let _ = self.file.flush();
    }
}

/// Initialize the logger (call once at startup)
pub fn init() {
    let mut guard = LOGGER.lock().unwrap();
    if guard.is_none() {
        *guard = Logger::new();
    }
}

fn write(level: &str, message: &str) {
    if let Ok(mut guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_mut() {
            logger.write(level, message);
        }
    }
}

pub fn info(message: &str) {
    write("INFO", message);
}

pub fn warn(message: &str) {
    write("WARN", message);
}

pub fn error(message: &str) {
    write("ERROR", message);
}

/// Debug messages are only written when MDECK_TRACE is set.
pub fn debug(message: &str) {
    if std::env::var("MDECK_TRACE").is_ok() {
        write("DEBUG", message);
    }
}

/// Clean up old logs (keep last 7 days)
pub fn cleanup_old_logs() {
    let Some(log_dir) = crate::config::mdeck_dir().map(|d| d.join("logs")) else {
        return;
    };
    let Ok(entries) = fs::read_dir(&log_dir) else {
        return;
    };
    let cutoff = Local::now() - chrono::Duration::days(7);
    for entry in entries.flatten() {
        if let Ok(metadata) = entry.metadata() {
            if let Ok(modified) = metadata.modified() {
                let modified: chrono::DateTime<Local> = modified.into();
                if modified < cutoff {
                    let _ = fs::remove_file(entry.path());
                }
            }
        }
    }
}

/// Path to today's log file, for surfacing in error messages.
pub fn log_path() -> Option<PathBuf> {
    let date = Local::now().format("%Y-%m-%d");
    crate::config::mdeck_dir().map(|d| d.join("logs").join(format!("mdeck-{}.log", date)))
}
