//! Asynchronous logging pipeline
//!
//! Producers on any thread hand [`LogEntry`] values to a FIFO queue; a single
//! writer thread drains it into the configured [`LogSink`]. The [`Logger`]
//! handle is cheap to clone and is passed explicitly to every component that
//! logs. [`PipelineLayer`] routes `tracing` events into the same queue.

pub mod layer;
pub mod pipeline;

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::thread;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

pub use layer::PipelineLayer;
pub use pipeline::Logger;

/// Severity, ordered DEBUG < INFO < WARN < ERROR
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
#[repr(u8)]
pub enum Level {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Level::Debug,
            1 => Level::Info,
            2 => Level::Warn,
            _ => Level::Error,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            other => Err(ChatError::config(format!("unknown log level '{}'", other))),
        }
    }
}

impl TryFrom<String> for Level {
    type Error = ChatError;

    fn try_from(value: String) -> Result<Self, ChatError> {
        value.parse()
    }
}

impl From<Level> for String {
    fn from(level: Level) -> Self {
        level.as_str().to_lowercase()
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => Level::Error,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::INFO => Level::Info,
            _ => Level::Debug,
        }
    }
}

/// One record travelling from a producer to the writer thread
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
    pub timestamp: DateTime<Local>,
    /// Numeric id of the producing thread
    pub thread: String,
}

impl LogEntry {
    /// Stamp a new entry with the current time and calling thread
    pub fn new(level: Level, message: String) -> Self {
        Self {
            level,
            message,
            timestamp: Local::now(),
            thread: current_thread_label(),
        }
    }

    /// `YYYY-MM-DD HH:MM:SS.mmm [LEVEL] [thread] message`
    pub fn render(&self) -> String {
        format!(
            "{} [{}] [{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.level,
            self.thread,
            self.message
        )
    }
}

fn current_thread_label() -> String {
    let id = format!("{:?}", thread::current().id());
    id.trim_start_matches("ThreadId(")
        .trim_end_matches(')')
        .to_string()
}

/// Destination for rendered log lines
pub enum LogSink {
    /// Console output
    Stdout,
    /// File opened in append mode
    File(PathBuf),
    /// Any writer, mostly for tests
    Writer(Box<dyn Write + Send>),
}

impl LogSink {
    /// `"stdout"` selects the console, anything else is a file path
    pub fn from_target(target: &str) -> Self {
        if target.eq_ignore_ascii_case("stdout") {
            LogSink::Stdout
        } else {
            LogSink::File(PathBuf::from(target))
        }
    }

    pub(crate) fn open(self) -> io::Result<Box<dyn Write + Send>> {
        match self {
            LogSink::Stdout => Ok(Box::new(io::stdout())),
            LogSink::File(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Ok(Box::new(BufWriter::new(file)))
            }
            LogSink::Writer(writer) => Ok(writer),
        }
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSink::Stdout => f.write_str("Stdout"),
            LogSink::File(path) => f.debug_tuple("File").field(path).finish(),
            LogSink::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}
