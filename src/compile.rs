//! Compile entry point.
//!
//! One invocation is synchronous and feed-forward: parse (with placeholder
//! substitution), resolve, print the normalized AQL form, run the property
//! and join transforms, print backend SQL. The AQL dialect is printed
//! before the structural transforms so it reflects the query as written,
//! not the materialized join tree.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use log::debug;

use crate::aql_parser::ast::{ConstantValue, Expr};
use crate::aql_parser::parse_query;
use crate::config::CompilerConfig;
use crate::errors::CompileError;
use crate::printer::{print_query, Dialect};
use crate::resolver::resolve_query;
use crate::schema::database::default_registry;
use crate::schema::property_catalog::CachedPropertyLookup;
use crate::schema::{MemoryPropertyCatalog, PropertyCatalog, SchemaRegistry};
use crate::transforms::lazy_joins::plan_lazy_joins;
use crate::transforms::property_types::resolve_property_types;

/// Per-query inputs.
#[derive(Default)]
pub struct QueryOptions {
    pub tenant_id: u64,
    pub placeholders: HashMap<String, Expr>,
}

impl QueryOptions {
    pub fn for_tenant(tenant_id: u64) -> Self {
        QueryOptions {
            tenant_id,
            placeholders: HashMap::new(),
        }
    }

    pub fn with_placeholder(mut self, name: &str, expr: Expr) -> Self {
        self.placeholders.insert(name.to_string(), expr);
        self
    }
}

/// Result of a successful compile.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub backend_sql: String,
    pub aql_sql: String,
    /// Values for the `%(hogql_val_<i>)s` placeholders in `backend_sql`.
    pub bound_values: IndexMap<String, ConstantValue>,
}

/// A compiler instance: the read-only schema registry (built once from the
/// feature flags) plus the property catalog. Safe to share across threads;
/// each compile keeps its own state.
pub struct Compiler {
    config: CompilerConfig,
    registry: SchemaRegistry,
    catalog: Arc<dyn PropertyCatalog>,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Result<Self, CompileError> {
        let config = config.validated()?;
        let registry = default_registry(config.person_on_events);
        Ok(Compiler {
            config,
            registry,
            catalog: Arc::new(MemoryPropertyCatalog::new()),
        })
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn PropertyCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile one AQL statement into backend SQL and normalized AQL.
    pub fn compile(
        &self,
        source: &str,
        options: &QueryOptions,
    ) -> Result<CompiledQuery, CompileError> {
        let mut query = parse_query(source, &options.placeholders)?;

        let mut properties = CachedPropertyLookup::new(self.catalog.as_ref(), options.tenant_id);
        resolve_query(
            &mut query,
            &self.registry,
            &mut properties,
            self.config.max_query_depth,
        )?;
        debug!("resolved query for tenant {}", options.tenant_id);

        let (aql_sql, _) = print_query(
            &query,
            Dialect::Aql,
            options.tenant_id,
            self.config.default_limit,
        )?;

        resolve_property_types(&mut query, &mut properties);
        plan_lazy_joins(&mut query, &self.registry)?;

        let (backend_sql, bound_values) = print_query(
            &query,
            Dialect::Backend,
            options.tenant_id,
            self.config.default_limit,
        )?;
        debug!("emitted {} bound value(s)", bound_values.len());

        Ok(CompiledQuery {
            backend_sql,
            aql_sql,
            bound_values,
        })
    }
}
