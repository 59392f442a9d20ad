use thiserror::Error;

/// A parse-phase failure, with a byte offset into the comment-stripped
/// source.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Syntax error at offset {offset}: {message}")]
pub struct SyntaxError {
    pub message: String,
    pub offset: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        SyntaxError {
            message: message.into(),
            offset,
        }
    }
}
