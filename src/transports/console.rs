//! Console transport
//!
//! Direct, unbatched writer: trace through warn go to stdout, error goes
//! to stderr. Intended for development and as a last-resort sink.

use crate::core::{LogEntry, LogLevel, Result, Transport};
use colored::Colorize;
use std::io::Write;

pub struct ConsoleTransport {
    use_colors: bool,
}

impl ConsoleTransport {
    pub fn new() -> Self {
        Self { use_colors: true }
    }

    #[must_use]
    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.use_colors = enabled;
        self
    }

    fn format_entry(&self, entry: &LogEntry) -> String {
        let level = format!("{:5}", entry.level.to_str().to_uppercase());
        let level = if self.use_colors {
            level.color(entry.level.color_code()).to_string()
        } else {
            level
        };

        let mut line = format!(
            "[{}] [{}]",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            level
        );
        if let Some(namespace) = &entry.namespace {
            line.push_str(&format!(" [{}]", namespace));
        }
        if let Some(context) = &entry.context {
            line.push_str(&format!(" [req:{}]", context.request_id));
        }
        line.push(' ');
        line.push_str(&entry.message);
        if !entry.metadata.is_empty() {
            let fields = entry
                .metadata
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(" ");
            line.push_str(&format!(" | {}", fields));
        }
        if let Some(error) = &entry.error {
            line.push_str(&format!(" | error: {}: {}", error.name, error.message));
        }
        line
    }
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ConsoleTransport {
    fn name(&self) -> &str {
        "console"
    }

    fn log(&mut self, entry: &LogEntry) -> Result<()> {
        let line = self.format_entry(entry);
        if entry.level >= LogLevel::Error {
            writeln!(std::io::stderr(), "{}", line)?;
        } else {
            writeln!(std::io::stdout(), "{}", line)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }
}
