//! Optional append-only wire-level trace file, enabled by the
//! `LOG_ENABLE` environment variable (spec §6). Distinct from the `log`
//! crate facade used elsewhere: this sink's format is a hex dump of
//! exact wire bytes, a diagnostic artifact independent of log-level
//! filtering.

use std::fs::{File, OpenOptions};
use std::io::Write;

/// Append-mode file sink for wire-level tracing.
pub struct LogSink {
    file: File,
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink").finish()
    }
}

impl LogSink {
    /// Open the sink named by `LOG_ENABLE`, if the variable is present
    /// and nonempty. Returns `Ok(None)` when logging is not requested.
    pub fn from_env() -> std::io::Result<Option<Self>> {
        match std::env::var("LOG_ENABLE") {
            Ok(path) if !path.is_empty() && path != "0" => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Ok(Some(LogSink { file }))
            }
            _ => Ok(None),
        }
    }

    /// Write a plain text line.
    pub fn line(&mut self, text: &str) {
        let _ = writeln!(self.file, "{}", text);
    }

    /// Write a hex dump of `data`, space-separated, on one line prefixed
    /// by `label`.
    pub fn hex(&mut self, label: &str, data: &[u8]) {
        let mut out = String::with_capacity(label.len() + data.len() * 3);
        out.push_str(label);
        for b in data {
            out.push_str(&format!("{:02X} ", b));
        }
        let _ = writeln!(self.file, "{}", out);
    }
}
