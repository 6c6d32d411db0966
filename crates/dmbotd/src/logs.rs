//! Log retrieval for the `getLogs` command.
//!
//! The daemon appends JSON records to its log file (see
//! [`crate::logging`]). [`JsonLogFile`] turns them back into one readable
//! line per record for the front-end.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Failure to read the log source.
#[derive(Debug, Error)]
#[error("{}: {source}", .path.display())]
pub struct LogError {
    path: PathBuf,
    #[source]
    source: io::Error,
}

/// Somewhere the daemon's logs can be read back from.
pub trait LogSource: Send + Sync {
    /// Return the logs rendered as text.
    fn read_logs(&self) -> Result<String, LogError>;
}

/// A JSON-lines log file written by `tracing-subscriber`.
#[derive(Debug, Clone)]
pub struct JsonLogFile {
    path: PathBuf,
}

impl JsonLogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LogSource for JsonLogFile {
    fn read_logs(&self) -> Result<String, LogError> {
        let text = fs::read_to_string(&self.path).map_err(|source| LogError {
            path: self.path.clone(),
            source,
        })?;
        let mut out = String::with_capacity(text.len());
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            out.push_str(&render_line(line));
            out.push('\n');
        }
        Ok(out)
    }
}

#[derive(Deserialize)]
struct Record {
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    level: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

/// Render one JSON record as `timestamp LEVEL message key=value...`.
///
/// Lines that are not JSON records are returned unchanged.
fn render_line(line: &str) -> String {
    let Ok(mut record) = serde_json::from_str::<Record>(line) else {
        return line.to_owned();
    };
    let message = match record.fields.remove("message") {
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let mut out = format!("{} {} {}", record.timestamp, record.level, message);
    for (key, value) in &record.fields {
        match value {
            Value::String(s) => {
                let _ = write!(out, " {key}={s}");
            }
            other => {
                let _ = write!(out, " {key}={other}");
            }
        }
    }
    out
}
