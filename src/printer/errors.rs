use thiserror::Error;

/// Printer-side invariant violations. The printer only runs over resolved,
/// planned trees, so any of these indicates a compiler bug rather than bad
/// user input.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PrintError {
    #[error("Internal printer error: expression has no resolved type ({0})")]
    Unresolved(String),
    #[error("Internal printer error: {0}")]
    Internal(String),
}
