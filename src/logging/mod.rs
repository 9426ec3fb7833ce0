//! Logging Module
//!
//! Structured, leveled logging with pluggable outputs.
//!
//! # Outputs
//! - Console: human-readable lines, optionally colourised
//! - File: JSON lines with size-based rotation
//! - Remote: batched JSON over HTTP with retry
//! - Memory: most recent entries, for inspection

mod console;
mod entry;
mod file;
mod level;
mod logger;
mod output;
mod remote;

// Re-export public types
pub use console::{format_entry, ConsoleOutput};
pub use entry::{log_context, LogContext, LogEntry};
pub use file::{rotated_path, FileOutput};
pub use level::{LogLevel, ParseLogLevelError};
pub use logger::Logger;
pub use output::{LogOutput, MemoryOutput};
pub use remote::{
    HttpTransport, LogTransport, RemoteOutput, FLUSH_INTERVAL, MAX_BUFFERED_ENTRIES,
    MAX_RETAINED_ENTRIES,
};
