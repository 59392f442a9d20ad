use thiserror::Error;

/// Configuration-class errors: the schema registry itself is inconsistent
/// with what a compile needs. User input alone must not be able to trigger
/// these; an unknown table named in AQL surfaces as a resolve error instead.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    #[error("Table '{0}' is not registered in the schema")]
    UnknownTable(String),
    #[error("Lazy join '{join}' on table '{table}' targets unregistered table '{target}'")]
    UnknownJoinTarget {
        table: String,
        join: String,
        target: String,
    },
    #[error("Column '{column}' required by join strategy is missing on table '{table}'")]
    MissingStrategyColumn { table: String, column: String },
}
