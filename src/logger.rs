//! Console logger for long batch runs.
//!
//! Every line carries the pipeline phase active when it was emitted, so
//! interleaved output from concurrent tasks can still be attributed.

use chrono::{DateTime, Utc};
use colored::*;
use log::{Level, LevelFilter, Metadata, Record};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

static PIPELINE_LOGGER: Lazy<PipelineLogger> = Lazy::new(PipelineLogger::new);

/// Installs the logger with default settings.
pub fn init() -> Result<(), String> {
    init_with_config(LoggerConfig::default())
}

pub fn init_with_config(config: LoggerConfig) -> Result<(), String> {
    let filter = LevelFilter::from(config.min_level);
    PIPELINE_LOGGER.apply(config)?;

    log::set_logger(&*PIPELINE_LOGGER).map_err(|e| format!("Failed to set logger: {:?}", e))?;
    log::set_max_level(filter);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn style(&self) -> (&'static str, &'static str, Color) {
        match self {
            LogLevel::Trace => ("TRACE", "🔍", Color::Cyan),
            LogLevel::Debug => ("DEBUG", "🐛", Color::Blue),
            LogLevel::Info => ("INFO", "🎨", Color::Green),
            LogLevel::Warn => ("WARN", "⚠️", Color::Yellow),
            LogLevel::Error => ("ERROR", "❌", Color::Red),
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.style().0
    }

    pub fn emoji(&self) -> &'static str {
        self.style().1
    }

    pub fn color(&self) -> Color {
        self.style().2
    }

    fn admits(&self, level: Level) -> bool {
        LogLevel::from(level) >= *self
    }
}

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Trace => LogLevel::Trace,
            Level::Debug => LogLevel::Debug,
            Level::Info => LogLevel::Info,
            Level::Warn => LogLevel::Warn,
            Level::Error => LogLevel::Error,
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
        }
    }
}

/// One emitted log line, serializable for JSON-lines output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    pub target: String,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            level,
            phase: None,
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn in_phase(mut self, phase: Option<String>) -> Self {
        self.phase = phase;
        self
    }
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub show_colors: bool,
    pub show_emojis: bool,
    pub show_target: bool,
    pub timestamp_format: String,
    pub output_json: bool,
    pub log_file: Option<PathBuf>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            show_colors: true,
            show_emojis: true,
            show_target: false,
            timestamp_format: "%H:%M:%S".to_string(),
            output_json: false,
            log_file: None,
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.show_colors = enabled;
        self
    }

    /// Appends every line, uncolored, to `path` as well.
    pub fn with_file_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn with_json_output(mut self, enabled: bool) -> Self {
        self.output_json = enabled;
        self
    }

    /// JSON lines into `spritegen.log`, for unattended runs.
    pub fn production() -> Self {
        Self {
            show_colors: false,
            show_emojis: false,
            output_json: true,
            log_file: Some(PathBuf::from("spritegen.log")),
            ..Default::default()
        }
    }

    pub fn development() -> Self {
        Self {
            min_level: LogLevel::Debug,
            show_target: true,
            timestamp_format: "%H:%M:%S%.3f".to_string(),
            ..Default::default()
        }
    }
}

pub struct PipelineLogger {
    config: Mutex<LoggerConfig>,
    sink: Mutex<Option<File>>,
    phase: Mutex<Option<String>>,
}

impl PipelineLogger {
    pub fn new() -> Self {
        Self {
            config: Mutex::new(LoggerConfig::default()),
            sink: Mutex::new(None),
            phase: Mutex::new(None),
        }
    }

    /// Replaces the active config, opening the log file first so a bad path
    /// leaves the previous config in place.
    pub fn apply(&self, config: LoggerConfig) -> Result<(), String> {
        let sink = match &config.log_file {
            Some(path) => Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| format!("Failed to open log file {}: {}", path.display(), e))?,
            ),
            None => None,
        };

        if let Ok(mut guard) = self.sink.lock() {
            *guard = sink;
        }
        if let Ok(mut guard) = self.config.lock() {
            *guard = config;
        }
        Ok(())
    }

    fn set_phase(&self, phase: Option<String>) {
        if let Ok(mut guard) = self.phase.lock() {
            *guard = phase;
        }
    }

    fn current_phase(&self) -> Option<String> {
        self.phase.lock().ok().and_then(|guard| guard.clone())
    }

    fn render(&self, entry: &LogEntry, config: &LoggerConfig) -> String {
        if config.output_json {
            return serde_json::to_string(entry).unwrap_or_default();
        }

        let paint = |text: String, color: Color| -> String {
            if config.show_colors {
                text.color(color).to_string()
            } else {
                text
            }
        };

        let mut parts = vec![paint(
            entry.timestamp.format(&config.timestamp_format).to_string(),
            Color::BrightBlack,
        )];

        let tag = if config.show_emojis {
            format!("{} {:<5}", entry.level.emoji(), entry.level.as_str())
        } else {
            format!("{:<5}", entry.level.as_str())
        };
        let tag = if config.show_colors {
            tag.color(entry.level.color()).bold().to_string()
        } else {
            tag
        };
        parts.push(tag);

        if let Some(phase) = &entry.phase {
            parts.push(paint(format!("[{}]", phase), Color::Magenta));
        }
        if config.show_target {
            parts.push(paint(entry.target.clone(), Color::BrightBlue));
        }
        parts.push(entry.message.clone());
        parts.join(" ")
    }
}

impl Default for PipelineLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl log::Log for PipelineLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        match self.config.lock() {
            Ok(config) => config.min_level.admits(metadata.level()),
            Err(_) => true,
        }
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let entry = LogEntry::new(
            record.level().into(),
            record.target(),
            record.args().to_string(),
        )
        .in_phase(self.current_phase());

        let Ok(config) = self.config.lock() else {
            return;
        };
        let line = self.render(&entry, &config);
        if entry.level >= LogLevel::Warn {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }

        if let Ok(mut guard) = self.sink.lock() {
            if let Some(file) = guard.as_mut() {
                let plain = if config.output_json || !config.show_colors {
                    line
                } else {
                    self.render(&entry, &config.clone().with_colors(false))
                };
                let _ = writeln!(file, "{}", plain);
            }
        }
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
        if let Ok(mut guard) = self.sink.lock() {
            if let Some(file) = guard.as_mut() {
                let _ = file.flush();
            }
        }
    }
}

/// Marks a pipeline phase: log lines emitted while it lives are tagged with
/// its name, and its duration is logged on drop. Phases run one at a time.
pub struct PhaseTimer {
    start: Instant,
    name: String,
}

impl PhaseTimer {
    pub fn new(name: &str) -> Self {
        log::info!("=== {} ===", name);
        PIPELINE_LOGGER.set_phase(Some(name.to_lowercase()));
        Self {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for PhaseTimer {
    fn drop(&mut self) {
        PIPELINE_LOGGER.set_phase(None);
        log::info!(
            "⏱️  {} finished in {:.1}s",
            self.name,
            self.elapsed().as_secs_f64()
        );
    }
}
