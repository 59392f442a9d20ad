use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolveError {
    #[error("Unable to resolve '{0}'")]
    NotFound(String),
    #[error("Name '{0}' is ambiguous (present on more than one table in scope)")]
    AmbiguousName(String),
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    #[error("Aggregate function '{function}' is not allowed in {clause}")]
    IllegalAggregate {
        function: String,
        clause: &'static str,
    },
    #[error("Selecting '*' is only supported inside count(*)")]
    IllegalWildcard,
    #[error("Queries nested deeper than {0} levels are not supported")]
    NestedTooDeep(usize),
    #[error("Cyclic lazy join detected while resolving '{0}'")]
    CyclicJoin(String),
    #[error("alias \"{alias}\" used before definition: SELECT aliases are not visible in {clause}")]
    AliasBeforeDefinition { alias: String, clause: &'static str },
    /// Invariant violation; user input must never trigger this.
    #[error("Internal resolver error: {0}")]
    Internal(String),
}
