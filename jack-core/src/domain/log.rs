//! Log domain types

use serde::{Deserialize, Serialize};

/// One event of a build's console stream
///
/// A stream delivers any number of `Data` and `Error` events followed by
/// exactly one `End`. `Error` does not terminate the stream by itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogEvent {
    /// A chunk of console text, possibly spanning several lines
    Data(String),
    /// A transport-level error observed mid-stream
    Error(String),
    /// The console is exhausted
    End,
}
