use thiserror::Error;

use crate::aql_parser::SyntaxError;
use crate::config::ConfigError;
use crate::printer::PrintError;
use crate::resolver::ResolveError;
use crate::schema::SchemaError;

/// Root error returned by the compile entry point. The first failure in
/// any stage aborts the compile; no recovery is attempted.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{0}")]
    Syntax(#[from] SyntaxError),
    #[error("{0}")]
    Resolve(#[from] ResolveError),
    #[error("{0}")]
    Schema(#[from] SchemaError),
    #[error("{0}")]
    Print(#[from] PrintError),
    #[error("{0}")]
    Config(#[from] ConfigError),
}
