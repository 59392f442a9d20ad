//! Symbol and type resolution.
//!
//! The resolver walks the AST depth-first, attaching an [`ExprType`] to
//! every expression node and a [`SelectScope`] to every SELECT. Dotted
//! field chains are resolved segment by segment against the schema
//! registry; crossing a virtual relation creates (or reuses) a lazy-join
//! ref and records a materialization request on the enclosing query, which
//! the join planner consumes after resolution.
//!
//! Per-query lifecycle: enter query -> resolve FROM/JOIN left to right ->
//! resolve SELECT (registering aliases) -> resolve WHERE/PREWHERE/GROUP BY
//! (aliases invisible) -> resolve HAVING/ORDER BY (aliases visible) ->
//! exit query.

pub mod errors;
pub mod functions;
pub mod scope;
pub mod types;

pub use errors::ResolveError;

use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::aql_parser::ast::{
    ConstantValue, Expr, ExprKind, JoinExpr, JoinTarget, SelectQuery,
};
use crate::schema::property_catalog::CachedPropertyLookup;
use crate::schema::types::ScalarType;
use crate::schema::{FieldDef, PropertyBag, SchemaRegistry, VirtualColumn};

use functions::{is_aggregate, lookup_function};
use scope::{ClauseContext, SelectScope};
use types::{
    rollup_property_output, ExprType, FieldAliasRef, FieldRef, LazyJoinRef, PropertyRef,
    SubqueryRef, TableRef, TableSource, VirtualTableRef,
};

/// Resolve a parsed query in place.
pub fn resolve_query(
    query: &mut SelectQuery,
    registry: &SchemaRegistry,
    properties: &mut CachedPropertyLookup<'_>,
    max_query_depth: usize,
) -> Result<(), ResolveError> {
    let mut resolver = Resolver {
        registry,
        properties,
        max_query_depth,
        scopes: Vec::new(),
    };
    resolver.resolve_select(query)?;
    Ok(())
}

struct Resolver<'a, 'c> {
    registry: &'a SchemaRegistry,
    properties: &'a mut CachedPropertyLookup<'c>,
    max_query_depth: usize,
    scopes: Vec<Rc<SelectScope>>,
}

enum Step {
    Continue(TableSource),
    Terminal(ExprType),
}

impl Resolver<'_, '_> {
    fn resolve_select(&mut self, query: &mut SelectQuery) -> Result<Rc<SelectScope>, ResolveError> {
        if self.scopes.len() >= self.max_query_depth {
            return Err(ResolveError::NestedTooDeep(self.max_query_depth));
        }
        let scope = SelectScope::new();
        self.scopes.push(Rc::clone(&scope));
        let result = self.resolve_select_clauses(query, &scope);
        self.scopes.pop();
        result?;
        query.scope = Some(Rc::clone(&scope));
        Ok(scope)
    }

    fn resolve_select_clauses(
        &mut self,
        query: &mut SelectQuery,
        scope: &Rc<SelectScope>,
    ) -> Result<(), ResolveError> {
        // FROM and JOINs, left to right; each join sees prior aliases.
        let mut subquery_counter = 0usize;
        let mut current = query.select_from.as_mut();
        while let Some(join) = current {
            self.resolve_join(join, scope, &mut subquery_counter)?;
            current = join.next_join.as_deref_mut();
        }

        for item in &mut query.select {
            self.resolve_expr(item, ClauseContext::Select)?;
            if let Some((name, ty)) = output_column(item) {
                scope.columns.borrow_mut().push((name, ty));
            }
        }

        if let Some(where_clause) = query.where_clause.as_mut() {
            self.resolve_expr(where_clause, ClauseContext::WhereGroup)?;
            if let Some(function) = find_aggregate(where_clause) {
                return Err(ResolveError::IllegalAggregate {
                    function,
                    clause: "WHERE",
                });
            }
        }
        if let Some(prewhere) = query.prewhere.as_mut() {
            self.resolve_expr(prewhere, ClauseContext::WhereGroup)?;
            if let Some(function) = find_aggregate(prewhere) {
                return Err(ResolveError::IllegalAggregate {
                    function,
                    clause: "PREWHERE",
                });
            }
        }
        for expr in &mut query.group_by {
            self.resolve_expr(expr, ClauseContext::WhereGroup)?;
        }

        if let Some(having) = query.having.as_mut() {
            self.resolve_expr(having, ClauseContext::HavingOrder)?;
        }
        for order in &mut query.order_by {
            self.resolve_expr(&mut order.expr, ClauseContext::HavingOrder)?;
        }
        Ok(())
    }

    fn resolve_join(
        &mut self,
        join: &mut JoinExpr,
        scope: &Rc<SelectScope>,
        subquery_counter: &mut usize,
    ) -> Result<(), ResolveError> {
        match &mut join.target {
            JoinTarget::Table { chain } => {
                if chain.len() != 1 {
                    return Err(ResolveError::NotFound(format!(
                        "Unknown table '{}'",
                        chain.join(".")
                    )));
                }
                let name = chain[0].clone();
                let table = self
                    .registry
                    .get_table(&name)
                    .map_err(|_| ResolveError::NotFound(format!("Unknown table '{}'", name)))?;
                let table_ref = Rc::new(TableRef {
                    table: name.clone(),
                    backend_table: table.backend_name.clone(),
                    alias: join
                        .alias
                        .clone()
                        .unwrap_or_else(|| table.backend_name.clone()),
                    explicit_alias: join.alias.clone(),
                    tenant_column: table.tenant_column.clone(),
                });
                let key = join.alias.clone().unwrap_or(name);
                scope.add_table(key, TableSource::Physical(Rc::clone(&table_ref)));
                join.ty = Some(ExprType::Table(table_ref));
            }
            JoinTarget::Subquery(inner) => {
                let inner_scope = self.resolve_select(inner)?;
                let columns = inner_scope.columns.borrow().clone();
                let subquery_ref = Rc::new(SubqueryRef {
                    alias: join.alias.clone(),
                    columns,
                });
                let key = join.alias.clone().unwrap_or_else(|| {
                    *subquery_counter += 1;
                    // Internal key; anonymous subqueries are not addressable
                    // by name but still participate in bare-column lookup.
                    format!("$subquery:{}", subquery_counter)
                });
                scope.add_table(key, TableSource::Subquery(Rc::clone(&subquery_ref)));
                join.ty = Some(ExprType::SubqueryAlias(subquery_ref));
            }
        }
        if let Some(constraint) = join.constraint.as_mut() {
            self.resolve_expr(constraint, ClauseContext::FromJoin)?;
        }
        Ok(())
    }

    fn resolve_expr(&mut self, expr: &mut Expr, clause: ClauseContext) -> Result<(), ResolveError> {
        let ty = match &mut expr.kind {
            ExprKind::Constant(c) => ExprType::Scalar(constant_scalar(&c.value)),
            ExprKind::Field { chain } => {
                let chain = chain.clone();
                self.resolve_field_chain(&chain, clause)?
            }
            ExprKind::Asterisk => return Err(ResolveError::IllegalWildcard),
            ExprKind::Placeholder(name) => {
                return Err(ResolveError::Internal(format!(
                    "unsubstituted placeholder '{{{}}}'",
                    name
                )))
            }
            ExprKind::Alias { expr: inner, alias } => {
                self.resolve_expr(inner, clause)?;
                let inner_ty = inner.ty.clone().ok_or_else(|| {
                    ResolveError::Internal("aliased expression left untyped".to_string())
                })?;
                let alias_ty = ExprType::FieldAlias(Rc::new(FieldAliasRef {
                    name: alias.clone(),
                    inner: inner_ty,
                }));
                if clause == ClauseContext::Select {
                    if let Some(scope) = self.scopes.last() {
                        scope.add_alias(alias.clone(), alias_ty.clone());
                    }
                }
                alias_ty
            }
            ExprKind::Call(call) => {
                let spec = lookup_function(&call.name)
                    .ok_or_else(|| ResolveError::UnknownFunction(call.name.clone()))?;
                call.name = spec.name.to_string();
                let arity_ok = call.args.len() >= spec.min_args
                    && spec.max_args.map(|m| call.args.len() <= m).unwrap_or(true);
                if !arity_ok {
                    return Err(ResolveError::TypeMismatch(format!(
                        "function '{}' does not take {} argument(s)",
                        spec.name,
                        call.args.len()
                    )));
                }
                for arg in &mut call.args {
                    // `count(*)` is the one legal wildcard position.
                    if spec.name == "count" && matches!(arg.kind, ExprKind::Asterisk) {
                        arg.ty = Some(ExprType::Asterisk);
                        continue;
                    }
                    self.resolve_expr(arg, clause)?;
                }
                ExprType::Scalar(spec.returns)
            }
            ExprKind::ArithmeticOp { left, right, .. } => {
                self.resolve_expr(left, clause)?;
                self.resolve_expr(right, clause)?;
                ExprType::Scalar(expr_scalar(left).arithmetic_join(expr_scalar(right)))
            }
            ExprKind::CompareOp { left, right, .. } => {
                self.resolve_expr(left, clause)?;
                self.resolve_expr(right, clause)?;
                ExprType::Scalar(ScalarType::Boolean)
            }
            ExprKind::And(exprs) | ExprKind::Or(exprs) => {
                for e in exprs.iter_mut() {
                    self.resolve_expr(e, clause)?;
                }
                ExprType::Scalar(ScalarType::Boolean)
            }
            ExprKind::Not(inner) => {
                self.resolve_expr(inner, clause)?;
                ExprType::Scalar(ScalarType::Boolean)
            }
            ExprKind::Select(subquery) => {
                let scope = self.resolve_select(subquery)?;
                ExprType::SelectQuery(scope)
            }
            ExprKind::Tuple(exprs) => {
                for e in exprs.iter_mut() {
                    self.resolve_expr(e, clause)?;
                }
                ExprType::Scalar(ScalarType::Unknown)
            }
        };
        expr.ty = Some(ty);
        Ok(())
    }

    /// Resolve a dotted name chain to its terminal type.
    ///
    /// Lookup order for the first segment: (a) a SELECT alias of the current
    /// query (HAVING/ORDER BY only), (b) a FROM/JOIN source name, (c) a
    /// column of exactly one visible source, (d) a catalogued property of
    /// the single FROM table's bag. Outer scopes are searched after the
    /// current one, with SELECT aliases unconditionally visible there.
    fn resolve_field_chain(
        &mut self,
        chain: &[String],
        clause: ClauseContext,
    ) -> Result<ExprType, ResolveError> {
        let first = chain[0].as_str();
        let scopes: Vec<Rc<SelectScope>> = self.scopes.iter().rev().cloned().collect();

        for (idx, scope) in scopes.iter().enumerate() {
            let is_current = idx == 0;
            let aliases_visible = !is_current || clause == ClauseContext::HavingOrder;

            if aliases_visible {
                if let Some(ty) = scope.alias(first) {
                    if chain.len() == 1 {
                        return Ok(ty);
                    }
                    return Err(ResolveError::NotFound(format!(
                        "Cannot access '{}' on alias '{}'",
                        chain[1], first
                    )));
                }
            }

            if let Some(source) = scope.table(first) {
                return self.walk_chain(scope, source, &chain[1..], chain);
            }

            let sources: Vec<TableSource> = scope.tables.borrow().values().cloned().collect();
            let mut matches = sources
                .iter()
                .filter(|s| self.source_has_field(s, first))
                .cloned()
                .collect::<Vec<_>>();
            if matches.len() > 1 {
                return Err(ResolveError::AmbiguousName(first.to_string()));
            }
            if let Some(source) = matches.pop() {
                return self.walk_chain(scope, source, chain, chain);
            }

            if sources.len() == 1 {
                let source = &sources[0];
                if let Some(bag) = self.source_bag(source) {
                    if self.properties.has_definition(bag.owner, first) {
                        return self.finish_property(source.clone(), &bag, chain.to_vec());
                    }
                }
            }
        }

        if clause == ClauseContext::WhereGroup {
            if let Some(scope) = self.scopes.last() {
                if scope.alias(first).is_some() {
                    return Err(ResolveError::AliasBeforeDefinition {
                        alias: first.to_string(),
                        clause: clause.label(),
                    });
                }
            }
        }
        Err(ResolveError::NotFound(first.to_string()))
    }

    /// Walk the remaining chain segments starting from a table-like source.
    fn walk_chain(
        &mut self,
        scope: &Rc<SelectScope>,
        source: TableSource,
        remaining: &[String],
        full_chain: &[String],
    ) -> Result<ExprType, ResolveError> {
        let mut source = source;
        let mut pending: VecDeque<String> = remaining.iter().cloned().collect();
        let mut visited: HashSet<(String, String)> = HashSet::new();

        loop {
            let segment = match pending.pop_front() {
                Some(s) => s,
                None => return Ok(source_type(&source)),
            };
            match self.step(scope, &source, &segment, &mut pending, &mut visited, full_chain)? {
                Step::Continue(next) => source = next,
                Step::Terminal(ty) => {
                    if let Some(extra) = pending.pop_front() {
                        return Err(ResolveError::NotFound(format!(
                            "Cannot access '{}' on '{}'",
                            extra, segment
                        )));
                    }
                    return Ok(ty);
                }
            }
        }
    }

    fn step(
        &mut self,
        scope: &Rc<SelectScope>,
        source: &TableSource,
        segment: &str,
        pending: &mut VecDeque<String>,
        visited: &mut HashSet<(String, String)>,
        full_chain: &[String],
    ) -> Result<Step, ResolveError> {
        match source {
            TableSource::Subquery(subquery) => {
                let ty = subquery.column(segment).ok_or_else(|| {
                    ResolveError::NotFound(format!(
                        "Column '{}' not found in subquery",
                        segment
                    ))
                })?;
                Ok(Step::Terminal(ExprType::Field(Rc::new(FieldRef {
                    source: source.clone(),
                    name: segment.to_string(),
                    backend_name: segment.to_string(),
                    scalar: ty.scalar(),
                }))))
            }
            TableSource::Virtual(virtual_ref) => match virtual_ref.table.fields.get(segment) {
                Some(VirtualColumn::Scalar(column)) => {
                    Ok(Step::Terminal(ExprType::Field(Rc::new(FieldRef {
                        source: virtual_ref.source.clone(),
                        name: segment.to_string(),
                        backend_name: column.backend_name.clone(),
                        scalar: column.scalar,
                    }))))
                }
                Some(VirtualColumn::Bag(bag)) => {
                    let json_chain: Vec<String> = pending.drain(..).collect();
                    if json_chain.is_empty() {
                        Ok(Step::Terminal(ExprType::Field(Rc::new(FieldRef {
                            source: virtual_ref.source.clone(),
                            name: segment.to_string(),
                            backend_name: bag.backend_name.clone(),
                            scalar: ScalarType::String,
                        }))))
                    } else {
                        self.finish_property(virtual_ref.source.clone(), bag, json_chain)
                            .map(Step::Terminal)
                    }
                }
                None => Err(ResolveError::NotFound(format!(
                    "Field '{}' not found on '{}'",
                    segment, virtual_ref.name
                ))),
            },
            TableSource::Physical(_) | TableSource::LazyJoin(_) => {
                let table_name = source
                    .logical_table()
                    .ok_or_else(|| {
                        ResolveError::Internal("table source without logical table".to_string())
                    })?
                    .to_string();
                let table = self.registry.get_table(&table_name).map_err(|_| {
                    ResolveError::Internal(format!("table '{}' vanished from registry", table_name))
                })?;
                match table.resolve_field(segment) {
                    Some(FieldDef::Scalar(column)) => {
                        if let TableSource::LazyJoin(lazy) = source {
                            lazy.request_column(&column.backend_name, column.scalar);
                        }
                        Ok(Step::Terminal(ExprType::Field(Rc::new(FieldRef {
                            source: source.clone(),
                            name: segment.to_string(),
                            backend_name: column.backend_name.clone(),
                            scalar: column.scalar,
                        }))))
                    }
                    Some(FieldDef::Properties(bag)) => {
                        let json_chain: Vec<String> = pending.drain(..).collect();
                        if json_chain.is_empty() {
                            if let TableSource::LazyJoin(lazy) = source {
                                lazy.request_column(&bag.backend_name, ScalarType::String);
                            }
                            Ok(Step::Terminal(ExprType::Field(Rc::new(FieldRef {
                                source: source.clone(),
                                name: segment.to_string(),
                                backend_name: bag.backend_name.clone(),
                                scalar: ScalarType::String,
                            }))))
                        } else {
                            let bag = bag.clone();
                            self.finish_property(source.clone(), &bag, json_chain)
                                .map(Step::Terminal)
                        }
                    }
                    Some(FieldDef::Join(lazy_join)) => {
                        if !visited.insert((table.name.clone(), segment.to_string())) {
                            return Err(ResolveError::CyclicJoin(full_chain.join(".")));
                        }
                        self.registry.get_table(&lazy_join.target).map_err(|_| {
                            ResolveError::Internal(format!(
                                "lazy join target '{}' is not registered",
                                lazy_join.target
                            ))
                        })?;
                        // The join strategy reads its source key off the
                        // anchor; a chained hop must surface it through the
                        // previous rollup.
                        if let TableSource::LazyJoin(anchor) = source {
                            let anchor_table =
                                self.registry.get_table(&anchor.target_table).map_err(|_| {
                                    ResolveError::Internal(format!(
                                        "lazy join target '{}' is not registered",
                                        anchor.target_table
                                    ))
                                })?;
                            let source_key = lazy_join.strategy.source_key();
                            let scalar = anchor_table
                                .scalar(source_key)
                                .map(|c| c.scalar)
                                .unwrap_or(ScalarType::Unknown);
                            anchor.request_column(source_key, scalar);
                        }
                        let anchor_alias = source.print_alias().ok_or_else(|| {
                            ResolveError::Internal(
                                "lazy join anchored on anonymous source".to_string(),
                            )
                        })?;
                        let alias = format!("{}__{}", anchor_alias, segment);
                        let join_ref = match scope.lazy_join(&alias) {
                            Some(existing) => existing,
                            None => scope.request_lazy_join(Rc::new(LazyJoinRef {
                                source: source.clone(),
                                join_name: segment.to_string(),
                                alias,
                                target_table: lazy_join.target.clone(),
                                strategy: lazy_join.strategy.clone(),
                                requested: RefCell::new(IndexMap::new()),
                            })),
                        };
                        Ok(Step::Continue(TableSource::LazyJoin(join_ref)))
                    }
                    Some(FieldDef::Virtual(virtual_table)) => {
                        Ok(Step::Continue(TableSource::Virtual(Rc::new(
                            VirtualTableRef {
                                name: segment.to_string(),
                                source: source.clone(),
                                table: virtual_table.clone(),
                            },
                        ))))
                    }
                    Some(FieldDef::Expansion(expansion)) => {
                        if !visited.insert((table.name.clone(), segment.to_string())) {
                            return Err(ResolveError::CyclicJoin(full_chain.join(".")));
                        }
                        for part in expansion.iter().rev() {
                            pending.push_front(part.clone());
                        }
                        Ok(Step::Continue(source.clone()))
                    }
                    None => Err(ResolveError::NotFound(format!(
                        "Field '{}' not found on table '{}'",
                        segment, table.name
                    ))),
                }
            }
        }
    }

    /// Terminate a chain as a JSON property access, resolving materialized
    /// columns and recording rollup requests where applicable.
    fn finish_property(
        &mut self,
        source: TableSource,
        bag: &PropertyBag,
        json_chain: Vec<String>,
    ) -> Result<ExprType, ResolveError> {
        if json_chain.len() == 1 {
            if let Some(column) = bag.materialized.get(&json_chain[0]) {
                if let TableSource::LazyJoin(lazy) = &source {
                    lazy.request_column(column, ScalarType::String);
                }
                return Ok(ExprType::Field(Rc::new(FieldRef {
                    source,
                    name: json_chain[0].clone(),
                    backend_name: column.clone(),
                    scalar: ScalarType::String,
                })));
            }
        }
        let rollup_output = match &source {
            TableSource::LazyJoin(lazy) => {
                let output = rollup_property_output(&json_chain);
                lazy.request_property(&output, json_chain.clone());
                Some(output)
            }
            _ => None,
        };
        Ok(ExprType::Property(Rc::new(PropertyRef {
            chain: json_chain,
            source,
            bag_column: bag.backend_name.clone(),
            owner: bag.owner,
            rollup_output,
            coerced: Cell::new(false),
        })))
    }

    fn source_has_field(&self, source: &TableSource, name: &str) -> bool {
        match source {
            TableSource::Physical(_) | TableSource::LazyJoin(_) => source
                .logical_table()
                .and_then(|t| self.registry.get_table(t).ok())
                .map(|t| t.has_field(name))
                .unwrap_or(false),
            TableSource::Subquery(s) => s.column(name).is_some(),
            TableSource::Virtual(v) => v.table.fields.contains_key(name),
        }
    }

    fn source_bag(&self, source: &TableSource) -> Option<PropertyBag> {
        match source {
            TableSource::Physical(_) | TableSource::LazyJoin(_) => source
                .logical_table()
                .and_then(|t| self.registry.get_table(t).ok())
                .and_then(|t| t.properties().cloned()),
            TableSource::Virtual(v) => v.table.fields.values().find_map(|f| match f {
                VirtualColumn::Bag(bag) => Some(bag.clone()),
                _ => None,
            }),
            TableSource::Subquery(_) => None,
        }
    }
}

fn source_type(source: &TableSource) -> ExprType {
    match source {
        TableSource::Physical(rc) => ExprType::Table(Rc::clone(rc)),
        TableSource::Subquery(rc) => ExprType::SubqueryAlias(Rc::clone(rc)),
        TableSource::LazyJoin(rc) => ExprType::LazyJoin(Rc::clone(rc)),
        TableSource::Virtual(rc) => ExprType::VirtualTable(Rc::clone(rc)),
    }
}

fn constant_scalar(value: &ConstantValue) -> ScalarType {
    match value {
        ConstantValue::Integer(_) => ScalarType::Integer,
        ConstantValue::Float(_) => ScalarType::Float,
        ConstantValue::Bool(_) => ScalarType::Boolean,
        ConstantValue::String(_) => ScalarType::String,
        ConstantValue::DateTime(_) => ScalarType::DateTime,
        ConstantValue::Null => ScalarType::Unknown,
    }
}

fn expr_scalar(expr: &Expr) -> ScalarType {
    expr.ty
        .as_ref()
        .map(|t| t.scalar())
        .unwrap_or(ScalarType::Unknown)
}

/// Output column name of a SELECT item, for subquery references.
fn output_column(expr: &Expr) -> Option<(String, ExprType)> {
    let ty = expr.ty.clone()?;
    match &expr.kind {
        ExprKind::Alias { alias, .. } => Some((alias.clone(), ty)),
        ExprKind::Field { chain } => chain.last().map(|n| (n.clone(), ty)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aql_parser::parse_query;
    use crate::schema::database::default_registry;
    use crate::schema::MemoryPropertyCatalog;
    use std::collections::HashMap;

    fn resolve(source: &str) -> Result<SelectQuery, ResolveError> {
        let registry = default_registry(false);
        let catalog = MemoryPropertyCatalog::new();
        let mut properties = CachedPropertyLookup::new(&catalog, 1);
        let mut query = parse_query(source, &HashMap::new()).expect("parse");
        resolve_query(&mut query, &registry, &mut properties, 5)?;
        Ok(query)
    }

    #[test]
    fn attaches_types_to_every_select_item() {
        let query = resolve("select event, timestamp from events").unwrap();
        for item in &query.select {
            assert!(item.ty.is_some());
        }
    }

    #[test]
    fn unknown_table_fails() {
        assert!(matches!(
            resolve("select 1 from nonexistent"),
            Err(ResolveError::NotFound(_))
        ));
    }

    #[test]
    fn unknown_field_fails() {
        assert!(matches!(
            resolve("select nonexistent_column from events"),
            Err(ResolveError::NotFound(_))
        ));
    }

    #[test]
    fn unknown_function_fails() {
        assert!(matches!(
            resolve("select sleepEachRow(1) from events"),
            Err(ResolveError::UnknownFunction(_))
        ));
    }

    #[test]
    fn ambiguous_bare_column_fails() {
        let result = resolve(
            "select distinct_id from events e join person_distinct_ids pdi on pdi.distinct_id = e.distinct_id",
        );
        assert!(matches!(result, Err(ResolveError::AmbiguousName(_))));
    }

    #[test]
    fn aggregate_in_where_is_rejected() {
        assert!(matches!(
            resolve("select event from events where count() > 1"),
            Err(ResolveError::IllegalAggregate { .. })
        ));
    }

    #[test]
    fn bare_wildcard_is_rejected() {
        assert!(matches!(
            resolve("select * from events"),
            Err(ResolveError::IllegalWildcard)
        ));
        assert!(resolve("select count(*) from events").is_ok());
    }

    #[test]
    fn select_alias_is_invisible_in_where() {
        let result = resolve("select count() as c, event from events where c > 1 group by event");
        assert!(matches!(
            result,
            Err(ResolveError::AliasBeforeDefinition { .. })
        ));
    }

    #[test]
    fn select_alias_is_visible_in_having() {
        let query =
            resolve("select count() as c, event from events group by event having c > 1").unwrap();
        assert!(query.having.is_some());
    }

    #[test]
    fn nesting_past_the_cap_fails() {
        let source =
            "select 1 from (select 1 from (select 1 from (select 1 from (select 1 from (select 1 from events)))))";
        assert!(matches!(
            resolve(source),
            Err(ResolveError::NestedTooDeep(5))
        ));
    }

    #[test]
    fn lazy_chain_records_one_request_per_path() {
        let query =
            resolve("select pdi.distinct_id, pdi.person_id, pdi.person.id from events").unwrap();
        let scope = query.scope.as_ref().unwrap();
        let joins = scope.lazy_joins.borrow();
        let aliases: Vec<&String> = joins.keys().collect();
        assert_eq!(aliases, vec!["events__pdi", "events__pdi__person"]);
        // The chained hop surfaces its source key through the previous
        // rollup.
        let pdi = joins.get("events__pdi").unwrap();
        assert!(pdi.requested.borrow().contains_key("person_id"));
    }

    #[test]
    fn person_expands_through_pdi_without_the_flag() {
        let query = resolve("select person.id from events").unwrap();
        let scope = query.scope.as_ref().unwrap();
        let joins = scope.lazy_joins.borrow();
        assert!(joins.contains_key("events__pdi"));
        assert!(joins.contains_key("events__pdi__person"));
    }

    #[test]
    fn materialized_property_resolves_to_a_column() {
        let query = resolve("select properties.$session_id from events").unwrap();
        match query.select[0].ty.as_ref().unwrap() {
            ExprType::Field(field) => assert_eq!(field.backend_name, "$session_id"),
            other => panic!("expected field ref, got {:?}", other),
        }
    }

    #[test]
    fn cyclic_chain_expansions_are_detected() {
        use crate::schema::{Column, Table};

        let mut fields = IndexMap::new();
        fields.insert(
            "id".to_string(),
            FieldDef::Scalar(Column {
                backend_name: "id".to_string(),
                scalar: ScalarType::Integer,
            }),
        );
        fields.insert(
            "other".to_string(),
            FieldDef::Expansion(vec!["other".to_string(), "id".to_string()]),
        );
        let registry = crate::schema::SchemaRegistry::new(vec![Table {
            name: "looping".to_string(),
            backend_name: "looping".to_string(),
            tenant_column: "team_id".to_string(),
            fields,
        }]);

        let catalog = MemoryPropertyCatalog::new();
        let mut properties = CachedPropertyLookup::new(&catalog, 1);
        let mut query = parse_query("select other.id from looping", &HashMap::new()).unwrap();
        let result = resolve_query(&mut query, &registry, &mut properties, 5);
        assert!(matches!(result, Err(ResolveError::CyclicJoin(_))));
    }
}

/// First aggregate call in a subtree, not descending into subqueries.
fn find_aggregate(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Call(call) => {
            if is_aggregate(&call.name) {
                return Some(call.name.clone());
            }
            call.args.iter().find_map(find_aggregate)
        }
        ExprKind::Alias { expr, .. } | ExprKind::Not(expr) => find_aggregate(expr),
        ExprKind::ArithmeticOp { left, right, .. } | ExprKind::CompareOp { left, right, .. } => {
            find_aggregate(left).or_else(|| find_aggregate(right))
        }
        ExprKind::And(exprs) | ExprKind::Or(exprs) | ExprKind::Tuple(exprs) => {
            exprs.iter().find_map(find_aggregate)
        }
        _ => None,
    }
}
