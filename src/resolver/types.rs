//! The structural type sum attached to resolved AST nodes.
//!
//! Types that must be shared between the AST, the scope stack and the join
//! planner are reference-counted. State that accumulates after creation
//! (the requested-column log of a lazy join, coercion marks) sits behind
//! `RefCell`/`Cell` interiors; everything else is immutable once built.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::schema::types::{PropertyKind, PropertyOwner, ScalarType};
use crate::schema::JoinStrategy;

use super::scope::SelectScope;

#[derive(Debug, Clone, PartialEq)]
pub enum ExprType {
    Scalar(ScalarType),
    Field(Rc<FieldRef>),
    Property(Rc<PropertyRef>),
    FieldAlias(Rc<FieldAliasRef>),
    Table(Rc<TableRef>),
    SelectQuery(Rc<SelectScope>),
    SubqueryAlias(Rc<SubqueryRef>),
    LazyJoin(Rc<LazyJoinRef>),
    VirtualTable(Rc<VirtualTableRef>),
    Asterisk,
}

impl ExprType {
    /// Effective scalar type for inference purposes. Property extractions
    /// are raw strings until the coercion transform retypes them.
    pub fn scalar(&self) -> ScalarType {
        match self {
            ExprType::Scalar(s) => *s,
            ExprType::Field(f) => f.scalar,
            ExprType::Property(_) => ScalarType::Unknown,
            ExprType::FieldAlias(a) => a.inner.scalar(),
            _ => ScalarType::Unknown,
        }
    }
}

/// A FROM/JOIN source a field can hang off.
#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    Physical(Rc<TableRef>),
    Subquery(Rc<SubqueryRef>),
    LazyJoin(Rc<LazyJoinRef>),
    Virtual(Rc<VirtualTableRef>),
}

impl TableSource {
    /// The alias this source is printed under in backend SQL. Anonymous
    /// subqueries have none; their columns print unqualified.
    pub fn print_alias(&self) -> Option<String> {
        match self {
            TableSource::Physical(t) => Some(t.alias.clone()),
            TableSource::Subquery(s) => s.alias.clone(),
            TableSource::LazyJoin(j) => Some(j.alias.clone()),
            TableSource::Virtual(v) => v.source.print_alias(),
        }
    }

    /// The registered logical table this source exposes fields of, if any.
    pub fn logical_table(&self) -> Option<&str> {
        match self {
            TableSource::Physical(t) => Some(&t.table),
            TableSource::Subquery(_) => None,
            TableSource::LazyJoin(j) => Some(&j.target_table),
            TableSource::Virtual(_) => None,
        }
    }
}

/// A physical table pulled into scope by FROM or an explicit JOIN.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    /// Logical (registry) name, e.g. `person_distinct_ids`.
    pub table: String,
    /// Backend table, e.g. `person_distinct_id2`.
    pub backend_table: String,
    /// Print alias: the explicit alias if one was written, else the backend
    /// table name.
    pub alias: String,
    pub explicit_alias: Option<String>,
    /// Tenant column the printer scopes this reference with.
    pub tenant_column: String,
}

/// A subquery in FROM position, possibly anonymous.
#[derive(Debug, Clone, PartialEq)]
pub struct SubqueryRef {
    pub alias: Option<String>,
    /// Output columns of the inner SELECT, in order.
    pub columns: Vec<(String, ExprType)>,
}

impl SubqueryRef {
    pub fn column(&self, name: &str) -> Option<&ExprType> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, ty)| ty)
    }
}

/// A column requested through a lazy join; becomes one output column of the
/// materialized rollup subquery.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestedColumn {
    Column {
        name: String,
        scalar: ScalarType,
    },
    Property {
        /// JSON key path inside the target table's property bag.
        chain: Vec<String>,
        /// Filled by the property-type transform; the coercion is applied
        /// inside the rollup's argMax.
        coercion: Option<PropertyKind>,
    },
}

/// A lazy join reachable from the current query, created on first traversal
/// of its chain and reused for every later access over the same path.
#[derive(Debug, PartialEq)]
pub struct LazyJoinRef {
    /// Anchor the join hangs off: a physical table or a previous hop.
    pub source: TableSource,
    pub join_name: String,
    /// Synthesized alias, `<anchor>__<join>`.
    pub alias: String,
    /// Logical name of the target table.
    pub target_table: String,
    pub strategy: JoinStrategy,
    /// Output columns needed outside the subquery, keyed by output name and
    /// ordered by first use.
    pub requested: RefCell<IndexMap<String, RequestedColumn>>,
}

impl LazyJoinRef {
    pub fn request_column(&self, name: &str, scalar: ScalarType) {
        self.requested
            .borrow_mut()
            .entry(name.to_string())
            .or_insert(RequestedColumn::Column {
                name: name.to_string(),
                scalar,
            });
    }

    pub fn request_property(&self, output: &str, chain: Vec<String>) {
        self.requested
            .borrow_mut()
            .entry(output.to_string())
            .or_insert(RequestedColumn::Property {
                chain,
                coercion: None,
            });
    }
}

/// A group of columns denormalized onto another row, addressed by prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualTableRef {
    pub name: String,
    /// The row actually providing the columns.
    pub source: TableSource,
    pub table: crate::schema::VirtualTable,
}

/// A scalar column access, fully qualified against its source.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    pub source: TableSource,
    pub name: String,
    pub backend_name: String,
    pub scalar: ScalarType,
}

/// Output column name of a property materialized through a rollup:
/// `properties___<key path>`.
pub fn rollup_property_output(chain: &[String]) -> String {
    format!("properties___{}", chain.join("___"))
}

/// A JSON property access.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRef {
    /// JSON key path below the bag column.
    pub chain: Vec<String>,
    pub source: TableSource,
    pub bag_column: String,
    pub owner: PropertyOwner,
    /// When the bag lives behind an argMax rollup, the access prints this
    /// pre-extracted output column of the subquery instead of a JSON
    /// extraction.
    pub rollup_output: Option<String>,
    /// Set once the property transform has wrapped this access, so reruns
    /// leave the tree unchanged.
    pub coerced: Cell<bool>,
}

/// A SELECT-list alias visible to HAVING/ORDER BY and sub-scopes.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldAliasRef {
    pub name: String,
    pub inner: ExprType,
}
