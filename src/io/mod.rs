//! I/O utilities for file processing and data handling.
//!
//! NDJSON reading for recorded sessions and the append-only gift log.

pub mod gift_log;
pub mod ndjson;

// Re-export commonly used types and functions
pub use gift_log::{GiftLog, GiftLogError};
pub use ndjson::{parse_ndjson_file, parse_ndjson_file_generic, NdjsonError};
