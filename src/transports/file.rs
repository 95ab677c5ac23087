//! File transport writing JSONL batches
//!
//! Each entry is written as a single-line JSON object, one line per entry,
//! compatible with log aggregation tools like ELK and Loki. Delivery goes
//! through the batch transport, so writes happen on the flush worker, not
//! on the logging caller.

use super::batch::{BatchConfig, BatchSender, BatchTransport};
use crate::core::{LogEntry, Result, Transport};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

struct FileSink {
    writer: BufWriter<File>,
}

impl BatchSender for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    fn send_batch(&mut self, entries: &[LogEntry]) -> Result<()> {
        for entry in entries {
            let json = serde_json::to_string(entry)?;
            writeln!(self.writer, "{}", json)?;
        }
        self.writer.flush()?;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Batched JSONL file transport
///
/// # Example
///
/// ```no_run
/// use obslog::transports::FileTransport;
///
/// let transport = FileTransport::new("/var/log/app.jsonl").unwrap();
/// ```
pub struct FileTransport {
    inner: BatchTransport,
}

impl FileTransport {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_config(path, BatchConfig::default())
    }

    pub fn with_config<P: AsRef<Path>>(path: P, config: BatchConfig) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let sink = FileSink {
            writer: BufWriter::new(file),
        };
        Ok(Self {
            inner: BatchTransport::new(Box::new(sink), config),
        })
    }
}

impl Transport for FileTransport {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn log(&mut self, entry: &LogEntry) -> Result<()> {
        self.inner.log(entry)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn destroy(&mut self) -> Result<()> {
        self.inner.destroy()
    }
}
