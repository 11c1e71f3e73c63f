use anyhow::{Context, Result};
use log::{LevelFilter, Log, Metadata, Record};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// Logger that writes to a rolling file and echoes important records to stderr
struct SizedqLogger {
    file_writer: Arc<Mutex<RollingFileAppender>>,
    file_level: LevelFilter,
    console_level: LevelFilter,
}

impl Log for SizedqLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.file_level || metadata.level() <= self.console_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let level = record.level();

        if level <= self.file_level
            && let Ok(mut writer) = self.file_writer.lock()
        {
            let _ = writeln!(
                writer,
                "{} [{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                level,
                record.target(),
                record.args()
            );
        }

        if level <= self.console_level {
            eprintln!("[{}] {}", level, record.args());
        }
    }

    fn flush(&self) {
        if let Ok(mut writer) = self.file_writer.lock() {
            let _ = writer.flush();
        }
    }
}

/// Parse log level string to LevelFilter
pub fn parse_level(level_str: &str) -> LevelFilter {
    match level_str.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info, // Default to info
    }
}

/// Initialize stderr logging through env_logger
/// RUST_LOG takes precedence over the configured level
pub fn init_stderr_logger(level: &str) {
    let default_filter = parse_level(level).to_string().to_lowercase();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

/// Initialize the file logger
pub fn init_file_logger(log_file_path: PathBuf, file_level: &str, console_level: &str) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = log_file_path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(3)
        .filename_prefix(
            log_file_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("sizedq"),
        )
        .filename_suffix(
            log_file_path
                .extension()
                .and_then(|s| s.to_str())
                .unwrap_or("log"),
        )
        .build(
            log_file_path
                .parent()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path"))?,
        )
        .context("Failed to create rotating file appender")?;

    let file_level = parse_level(file_level);
    let console_level = parse_level(console_level);

    let logger = SizedqLogger {
        file_writer: Arc::new(Mutex::new(file_appender)),
        file_level,
        console_level,
    };

    log::set_boxed_logger(Box::new(logger)).context("Failed to set global logger")?;
    log::set_max_level(file_level.max(console_level));

    Ok(())
}
