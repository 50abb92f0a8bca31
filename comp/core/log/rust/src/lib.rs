// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

//! Process-wide logger for the exporter binaries.
//!
//! Records are written one per line as `YYYY-MM-DD HH:MM:SS [LEVEL] message`
//! to an append-only log file, to stderr, or nowhere at all.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use std::sync::Mutex;

use log::{LevelFilter, Log, Metadata, Record};
use time::OffsetDateTime;
use time::macros::format_description;

pub const DEFAULT_LOG_PERMS: u32 = 0o644;

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// When false every record is dropped.
    pub enabled: bool,
    /// Destination file. `None` logs to stderr.
    pub file: Option<PathBuf>,
    /// Mode used when the log file has to be created.
    pub perms: u32,
    pub level: LevelFilter,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: None,
            perms: DEFAULT_LOG_PERMS,
            level: LevelFilter::Info,
        }
    }
}

/// Parse a level name. Unknown names fall back to `Info`.
pub fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" | "warning" => LevelFilter::Warn,
        "error" | "crit" | "critical" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

enum Sink {
    File(File),
    Stderr,
    Null,
}

pub struct Logger {
    level: LevelFilter,
    sink: Mutex<Sink>,
}

impl Logger {
    pub fn new(config: &LogConfig) -> io::Result<Self> {
        let sink = match (config.enabled, &config.file) {
            (false, _) => Sink::Null,
            (true, None) => Sink::Stderr,
            (true, Some(path)) => Sink::File(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .mode(config.perms)
                    .open(path)?,
            ),
        };

        let level = if config.enabled {
            config.level
        } else {
            LevelFilter::Off
        };

        Ok(Self {
            level,
            sink: Mutex::new(sink),
        })
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format_record(OffsetDateTime::now_utc(), record);
        let Ok(mut sink) = self.sink.lock() else {
            return;
        };

        // A logger has nowhere to report its own write failures.
        let _ = match &mut *sink {
            Sink::File(file) => file.write_all(line.as_bytes()),
            Sink::Stderr => io::stderr().write_all(line.as_bytes()),
            Sink::Null => Ok(()),
        };
    }

    fn flush(&self) {
        if let Ok(mut sink) = self.sink.lock() {
            let _ = match &mut *sink {
                Sink::File(file) => file.flush(),
                Sink::Stderr => io::stderr().flush(),
                Sink::Null => Ok(()),
            };
        }
    }
}

fn format_record(now: OffsetDateTime, record: &Record<'_>) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let timestamp = now
        .format(&format)
        .unwrap_or_else(|_| now.unix_timestamp().to_string());

    format!("{timestamp} [{}] {}\n", record.level(), record.args())
}

/// Install the process logger. Must be called at most once.
pub fn init(config: &LogConfig) -> io::Result<()> {
    let logger = Logger::new(config)?;
    let level = logger.level();

    log::set_boxed_logger(Box::new(logger)).map_err(io::Error::other)?;
    log::set_max_level(level);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use log::Level;
    use regex::Regex;

    fn record_line(logger: &Logger, level: Level, message: &str) {
        logger.log(
            &Record::builder()
                .level(level)
                .args(format_args!("{message}"))
                .build(),
        );
        logger.flush();
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level("WARNING"), LevelFilter::Warn);
        assert_eq!(parse_level("crit"), LevelFilter::Error);
        assert_eq!(parse_level("off"), LevelFilter::Off);
        assert_eq!(parse_level("bogus"), LevelFilter::Info);
    }

    #[test]
    fn test_file_sink_writes_formatted_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exporter.log");
        let logger = Logger::new(&LogConfig {
            file: Some(path.clone()),
            ..LogConfig::default()
        })
        .unwrap();

        record_line(&logger, Level::Info, "installed myapp");
        record_line(&logger, Level::Debug, "filtered out");

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);

        let re = Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2} \[INFO\] installed myapp$").unwrap();
        assert!(re.is_match(lines[0]), "unexpected line: {}", lines[0]);
    }

    #[test]
    fn test_file_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exporter.log");
        std::fs::write(&path, "previous line\n").unwrap();

        let logger = Logger::new(&LogConfig {
            file: Some(path.clone()),
            level: LevelFilter::Debug,
            ..LogConfig::default()
        })
        .unwrap();
        record_line(&logger, Level::Debug, "second");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("previous line\n"));
        assert!(contents.contains("[DEBUG] second"));
    }

    #[test]
    fn test_disabled_logger_drops_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.log");
        let logger = Logger::new(&LogConfig {
            enabled: false,
            file: Some(path.clone()),
            ..LogConfig::default()
        })
        .unwrap();

        assert_eq!(logger.level(), LevelFilter::Off);
        record_line(&logger, Level::Error, "dropped");
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_log_file_created_with_perms() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perms.log");
        let _logger = Logger::new(&LogConfig {
            file: Some(path.clone()),
            perms: 0o600,
            ..LogConfig::default()
        })
        .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_missing_directory_fails() {
        let result = Logger::new(&LogConfig {
            file: Some(PathBuf::from("/nonexistent/dir/exporter.log")),
            ..LogConfig::default()
        });
        assert!(result.is_err());
    }
}
