//! Schema registry: the static declaration of physical tables, their
//! columns, JSON property bags, materialized property columns and virtual
//! relations, plus the strategies used to join across relations.
//!
//! The registry is built once per compiler instance from the feature flags
//! and is read-only afterwards, so it is safe to share across concurrent
//! compiles.

use indexmap::IndexMap;
use std::collections::HashMap;

pub mod database;
pub mod errors;
pub mod property_catalog;
pub mod types;

pub use errors::SchemaError;
pub use property_catalog::{MemoryPropertyCatalog, PropertyCatalog};
pub use types::{PropertyKind, PropertyOwner, ScalarType};

/// A scalar column with its backend name and type.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub backend_name: String,
    pub scalar: ScalarType,
}

/// A JSON property bag column. `materialized` maps property keys that are
/// additionally stored as physical columns to their backend column names.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyBag {
    pub backend_name: String,
    pub owner: PropertyOwner,
    pub materialized: IndexMap<String, String>,
}

/// How a lazy join is materialized into a subquery join.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinStrategy {
    /// Collapse versioned rows to their highest-version live instance:
    /// `SELECT argMax(col, version) ... GROUP BY key HAVING
    /// equals(argMax(deleted, version), 0)`, joined on
    /// `equals(source.source_key, target.key)`.
    ArgMaxRollup {
        key: String,
        source_key: String,
        version_column: String,
        deleted_column: String,
    },
}

impl JoinStrategy {
    pub fn key(&self) -> &str {
        match self {
            JoinStrategy::ArgMaxRollup { key, .. } => key,
        }
    }

    pub fn source_key(&self) -> &str {
        match self {
            JoinStrategy::ArgMaxRollup { source_key, .. } => source_key,
        }
    }
}

/// A named virtual relation targeting another table.
#[derive(Debug, Clone, PartialEq)]
pub struct LazyJoin {
    pub target: String,
    pub strategy: JoinStrategy,
}

/// One addressable field of a virtual table.
#[derive(Debug, Clone, PartialEq)]
pub enum VirtualColumn {
    Scalar(Column),
    Bag(PropertyBag),
}

/// A set of logically grouped columns denormalized onto the same physical
/// row, addressed through a prefix (`person.id` -> `events.person_id`).
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualTable {
    pub fields: IndexMap<String, VirtualColumn>,
}

/// What a name on a table can resolve to.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDef {
    Scalar(Column),
    Properties(PropertyBag),
    Join(LazyJoin),
    Virtual(VirtualTable),
    /// A name that expands to a dotted chain on the same table, e.g.
    /// `person` on `events` expanding to `pdi.person`.
    Expansion(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub backend_name: String,
    pub tenant_column: String,
    pub fields: IndexMap<String, FieldDef>,
}

impl Table {
    pub fn resolve_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// The scalar column registered under `name`, if any.
    pub fn scalar(&self, name: &str) -> Option<&Column> {
        match self.fields.get(name) {
            Some(FieldDef::Scalar(column)) => Some(column),
            _ => None,
        }
    }

    /// The property bag of this table, if it declares one.
    pub fn properties(&self) -> Option<&PropertyBag> {
        self.fields.values().find_map(|f| match f {
            FieldDef::Properties(bag) => Some(bag),
            _ => None,
        })
    }
}

/// Canonical source of truth for what tables exist and how to join them.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    tables: HashMap<String, Table>,
}

impl SchemaRegistry {
    pub fn new(tables: Vec<Table>) -> Self {
        let tables = tables.into_iter().map(|t| (t.name.clone(), t)).collect();
        SchemaRegistry { tables }
    }

    pub fn get_table(&self, name: &str) -> Result<&Table, SchemaError> {
        self.tables
            .get(name)
            .ok_or_else(|| SchemaError::UnknownTable(name.to_string()))
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }
}
