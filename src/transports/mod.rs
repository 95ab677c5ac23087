//! Transport implementations

pub mod batch;
#[cfg(feature = "console")]
pub mod console;
pub mod file;
#[cfg(feature = "http")]
pub mod http;

pub use batch::{BatchConfig, BatchSender, BatchTransport, DEFAULT_SHUTDOWN_TIMEOUT};
#[cfg(feature = "console")]
pub use console::ConsoleTransport;
pub use file::FileTransport;
#[cfg(feature = "http")]
pub use http::{HttpConfig, HttpTransport};
