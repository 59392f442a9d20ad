//! Per-query scope frames.
//!
//! A scope is created when the resolver enters a SELECT and attached to the
//! query node on exit, so the join planner can consume the materialization
//! request log after resolution completes. Scope lookups are indexed by the
//! clause being resolved; SELECT aliases exist in the frame as soon as the
//! SELECT list is resolved but only become visible in HAVING/ORDER BY.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use super::types::{ExprType, LazyJoinRef, TableSource};

/// Which clause a name is being resolved in. Drives visibility rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseContext {
    FromJoin,
    Select,
    /// WHERE, PREWHERE and GROUP BY: SELECT aliases are not visible.
    WhereGroup,
    /// HAVING and ORDER BY: SELECT aliases are visible.
    HavingOrder,
}

impl ClauseContext {
    pub fn label(&self) -> &'static str {
        match self {
            ClauseContext::FromJoin => "FROM",
            ClauseContext::Select => "SELECT",
            ClauseContext::WhereGroup => "WHERE/GROUP BY",
            ClauseContext::HavingOrder => "HAVING/ORDER BY",
        }
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct SelectScope {
    /// FROM/JOIN sources visible in this query, keyed by the name they are
    /// addressable under (explicit alias or logical table name). Anonymous
    /// subqueries get an internal non-addressable key.
    pub tables: RefCell<IndexMap<String, TableSource>>,
    /// SELECT-list aliases declared in this query.
    pub aliases: RefCell<IndexMap<String, ExprType>>,
    /// Materialization request log: every distinct lazy-join path traversed
    /// while resolving this query, keyed by synthesized alias, in order of
    /// first appearance.
    pub lazy_joins: RefCell<IndexMap<String, Rc<LazyJoinRef>>>,
    /// Output columns of the SELECT list, in order, for subquery references.
    pub columns: RefCell<Vec<(String, ExprType)>>,
}

impl SelectScope {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn add_table(&self, key: String, source: TableSource) {
        self.tables.borrow_mut().insert(key, source);
    }

    pub fn table(&self, name: &str) -> Option<TableSource> {
        self.tables.borrow().get(name).cloned()
    }

    pub fn add_alias(&self, name: String, ty: ExprType) {
        self.aliases.borrow_mut().insert(name, ty);
    }

    pub fn alias(&self, name: &str) -> Option<ExprType> {
        self.aliases.borrow().get(name).cloned()
    }

    /// Register a lazy-join materialization request, returning the shared
    /// ref (an existing one if the same path was traversed before).
    pub fn request_lazy_join(&self, join: Rc<LazyJoinRef>) -> Rc<LazyJoinRef> {
        let mut joins = self.lazy_joins.borrow_mut();
        if let Some(existing) = joins.get(&join.alias) {
            return Rc::clone(existing);
        }
        joins.insert(join.alias.clone(), Rc::clone(&join));
        join
    }

    pub fn lazy_join(&self, alias: &str) -> Option<Rc<LazyJoinRef>> {
        self.lazy_joins.borrow().get(alias).cloned()
    }
}
