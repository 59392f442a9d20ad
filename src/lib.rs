//! aqlc - AQL to ClickHouse SQL compiler
//!
//! This crate compiles AQL (a SQL-like analytics query language with
//! dotted JSON navigation and virtual table relations) into ClickHouse
//! SQL through:
//! - A nom-based parser with parse-time placeholder substitution
//! - A scope-aware resolver that types every node against a schema registry
//! - Catalog-driven property-type coercion
//! - Automatic materialization of lazy joins into argMax rollup subqueries
//! - Dual-dialect printing with mandatory tenant predicates

pub mod aql_parser;
pub mod compile;
pub mod config;
pub mod errors;
pub mod printer;
pub mod resolver;
pub mod schema;
pub mod transforms;

pub use compile::{CompiledQuery, Compiler, QueryOptions};
pub use config::CompilerConfig;
pub use errors::CompileError;
