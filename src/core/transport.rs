//! Transport trait for log delivery sinks

use super::{error::Result, log_entry::LogEntry};

/// A delivery sink registered with the logger.
///
/// `log` hands an entry to the transport and must not block the caller on
/// delivery; buffered transports only enqueue here. `init` and `destroy`
/// bracket the transport's lifecycle; `destroy` must flush pending data
/// before stopping.
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    fn log(&mut self, entry: &LogEntry) -> Result<()>;

    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        Ok(())
    }
}
