//! Lazy-join materialization.
//!
//! Consumes the request log the resolver attached to each query scope and
//! appends one `INNER JOIN (subquery) AS alias ON ...` per distinct
//! materialization path, in order of first appearance. The synthesized
//! subquery is a fully resolved SELECT over the physical target table, so
//! tenant injection inside it falls out of the normal printer path.

use std::cell::Cell;
use std::rc::Rc;

use crate::aql_parser::ast::{
    CompareOperator, Constant, ConstantValue, Expr, ExprKind, FunctionCall, JoinExpr, JoinKind,
    JoinTarget, SelectQuery,
};
use crate::resolver::scope::SelectScope;
use crate::resolver::types::{
    ExprType, FieldAliasRef, FieldRef, LazyJoinRef, PropertyRef, RequestedColumn, TableRef,
    TableSource,
};
use crate::schema::types::ScalarType;
use crate::schema::{JoinStrategy, SchemaError, SchemaRegistry, Table};
use crate::transforms::property_types::coerce_access;

/// Materialize every lazy join recorded on `query` and its subqueries.
/// Idempotent: paths whose alias is already attached are skipped.
pub fn plan_lazy_joins(
    query: &mut SelectQuery,
    registry: &SchemaRegistry,
) -> Result<(), SchemaError> {
    // User-written subqueries first; their joins attach to the inner FROM.
    let mut join = query.select_from.as_mut();
    while let Some(current) = join {
        if let JoinTarget::Subquery(inner) = &mut current.target {
            plan_lazy_joins(inner, registry)?;
        }
        join = current.next_join.as_deref_mut();
    }
    for item in &mut query.select {
        plan_expr_subqueries(item, registry)?;
    }
    if let Some(where_clause) = query.where_clause.as_mut() {
        plan_expr_subqueries(where_clause, registry)?;
    }
    if let Some(prewhere) = query.prewhere.as_mut() {
        plan_expr_subqueries(prewhere, registry)?;
    }
    for expr in &mut query.group_by {
        plan_expr_subqueries(expr, registry)?;
    }
    if let Some(having) = query.having.as_mut() {
        plan_expr_subqueries(having, registry)?;
    }
    for order in &mut query.order_by {
        plan_expr_subqueries(&mut order.expr, registry)?;
    }

    let scope = match &query.scope {
        Some(scope) => Rc::clone(scope),
        None => return Ok(()),
    };
    let requests: Vec<Rc<LazyJoinRef>> = scope.lazy_joins.borrow().values().cloned().collect();
    if requests.is_empty() {
        return Ok(());
    }

    let attached: Vec<String> = query
        .select_from
        .iter()
        .flat_map(|from| from.iter())
        .filter_map(|j| j.alias.clone())
        .collect();

    for lazy in requests {
        if attached.iter().any(|a| a == &lazy.alias) {
            continue;
        }
        let join = materialize(&lazy, registry)?;
        match query.select_from.as_mut() {
            Some(from) => from.push(join),
            None => query.select_from = Some(join),
        }
    }
    Ok(())
}

fn plan_expr_subqueries(expr: &mut Expr, registry: &SchemaRegistry) -> Result<(), SchemaError> {
    match &mut expr.kind {
        ExprKind::Select(subquery) => plan_lazy_joins(subquery, registry),
        ExprKind::Alias { expr: inner, .. } | ExprKind::Not(inner) => {
            plan_expr_subqueries(inner, registry)
        }
        ExprKind::Call(call) => {
            for arg in &mut call.args {
                plan_expr_subqueries(arg, registry)?;
            }
            Ok(())
        }
        ExprKind::ArithmeticOp { left, right, .. } | ExprKind::CompareOp { left, right, .. } => {
            plan_expr_subqueries(left, registry)?;
            plan_expr_subqueries(right, registry)
        }
        ExprKind::And(exprs) | ExprKind::Or(exprs) | ExprKind::Tuple(exprs) => {
            for e in exprs.iter_mut() {
                plan_expr_subqueries(e, registry)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Build the INNER JOIN node for one materialization path.
fn materialize(
    lazy: &Rc<LazyJoinRef>,
    registry: &SchemaRegistry,
) -> Result<JoinExpr, SchemaError> {
    let target = registry.get_table(&lazy.target_table).map_err(|_| {
        SchemaError::UnknownJoinTarget {
            table: lazy
                .source
                .logical_table()
                .unwrap_or_default()
                .to_string(),
            join: lazy.join_name.clone(),
            target: lazy.target_table.clone(),
        }
    })?;
    let JoinStrategy::ArgMaxRollup {
        key,
        source_key,
        version_column,
        deleted_column,
    } = &lazy.strategy;

    // The anchor must expose the source key; for a physical anchor that is
    // a registry check, for a chained hop the resolver already surfaced it
    // through the previous rollup.
    if let TableSource::Physical(anchor) = &lazy.source {
        let anchor_table = registry.get_table(&anchor.table)?;
        if anchor_table.scalar(source_key).is_none() {
            return Err(SchemaError::MissingStrategyColumn {
                table: anchor.table.clone(),
                column: source_key.clone(),
            });
        }
    }

    let key_column = strategy_column(target, key)?;
    let version = strategy_column(target, version_column)?;
    let deleted = strategy_column(target, deleted_column)?;

    let inner_table = Rc::new(TableRef {
        table: target.name.clone(),
        backend_table: target.backend_name.clone(),
        alias: target.backend_name.clone(),
        explicit_alias: None,
        tenant_column: target.tenant_column.clone(),
    });
    let inner_source = TableSource::Physical(Rc::clone(&inner_table));

    let column_field = |name: &str, scalar: ScalarType| -> Expr {
        Expr::typed(
            ExprKind::Field {
                chain: vec![name.to_string()],
            },
            ExprType::Field(Rc::new(FieldRef {
                source: inner_source.clone(),
                name: name.to_string(),
                backend_name: name.to_string(),
                scalar,
            })),
        )
    };
    let arg_max = |value: Expr, scalar: ScalarType| -> Expr {
        Expr::typed(
            ExprKind::Call(FunctionCall {
                name: "argMax".to_string(),
                args: vec![value, column_field(&version.0, version.1)],
            }),
            ExprType::Scalar(scalar),
        )
    };
    let aliased = |value: Expr, name: &str| -> Expr {
        let inner_ty = value
            .ty
            .clone()
            .unwrap_or(ExprType::Scalar(ScalarType::Unknown));
        Expr::typed(
            ExprKind::Alias {
                expr: Box::new(value),
                alias: name.to_string(),
            },
            ExprType::FieldAlias(Rc::new(FieldAliasRef {
                name: name.to_string(),
                inner: inner_ty,
            })),
        )
    };

    // Non-key requests in first-use order, rolled up via argMax; the group
    // key comes last and stays bare.
    let mut select = Vec::new();
    for (output, request) in lazy.requested.borrow().iter() {
        match request {
            RequestedColumn::Column { name, scalar } => {
                if name == &key_column.0 {
                    continue;
                }
                select.push(aliased(arg_max(column_field(name, *scalar), *scalar), output));
            }
            RequestedColumn::Property { chain, coercion } => {
                let bag = target
                    .properties()
                    .ok_or_else(|| SchemaError::MissingStrategyColumn {
                        table: target.name.clone(),
                        column: "properties".to_string(),
                    })?;
                let mut access = Expr::typed(
                    ExprKind::Field {
                        chain: chain.clone(),
                    },
                    ExprType::Property(Rc::new(PropertyRef {
                        chain: chain.clone(),
                        source: inner_source.clone(),
                        bag_column: bag.backend_name.clone(),
                        owner: bag.owner,
                        rollup_output: None,
                        coerced: Cell::new(true),
                    })),
                );
                if let Some(kind) = coercion {
                    access = coerce_access(access, *kind);
                }
                let scalar = access
                    .ty
                    .as_ref()
                    .map(|t| t.scalar())
                    .unwrap_or(ScalarType::Unknown);
                select.push(aliased(arg_max(access, scalar), output));
            }
        }
    }
    select.push(column_field(&key_column.0, key_column.1));

    let having = Expr::typed(
        ExprKind::CompareOp {
            op: CompareOperator::Eq,
            left: Box::new(arg_max(
                column_field(&deleted.0, deleted.1),
                deleted.1,
            )),
            right: Box::new(Expr::typed(
                ExprKind::Constant(Constant {
                    value: ConstantValue::Integer(0),
                    synthetic: true,
                }),
                ExprType::Scalar(ScalarType::Integer),
            )),
        },
        ExprType::Scalar(ScalarType::Boolean),
    );

    let inner_scope = SelectScope::new();
    inner_scope.add_table(target.name.clone(), inner_source.clone());

    let subquery = SelectQuery {
        select,
        distinct: false,
        select_from: Some(JoinExpr {
            join_type: None,
            target: JoinTarget::Table {
                chain: vec![target.name.clone()],
            },
            alias: None,
            constraint: None,
            next_join: None,
            ty: Some(ExprType::Table(Rc::clone(&inner_table))),
        }),
        where_clause: None,
        prewhere: None,
        group_by: vec![column_field(&key_column.0, key_column.1)],
        having: Some(having),
        order_by: Vec::new(),
        limit: None,
        offset: None,
        scope: Some(inner_scope),
    };

    // ON equals(<anchor>.<source_key>, <alias>.<key>)
    let left = Expr::typed(
        ExprKind::Field {
            chain: vec![source_key.clone()],
        },
        ExprType::Field(Rc::new(FieldRef {
            source: lazy.source.clone(),
            name: source_key.clone(),
            backend_name: source_key.clone(),
            scalar: key_column.1,
        })),
    );
    let right = Expr::typed(
        ExprKind::Field {
            chain: vec![key_column.0.clone()],
        },
        ExprType::Field(Rc::new(FieldRef {
            source: TableSource::LazyJoin(Rc::clone(lazy)),
            name: key_column.0.clone(),
            backend_name: key_column.0.clone(),
            scalar: key_column.1,
        })),
    );
    let constraint = Expr::typed(
        ExprKind::CompareOp {
            op: CompareOperator::Eq,
            left: Box::new(left),
            right: Box::new(right),
        },
        ExprType::Scalar(ScalarType::Boolean),
    );

    Ok(JoinExpr {
        join_type: Some(JoinKind::Inner),
        target: JoinTarget::Subquery(Box::new(subquery)),
        alias: Some(lazy.alias.clone()),
        constraint: Some(constraint),
        next_join: None,
        ty: Some(ExprType::LazyJoin(Rc::clone(lazy))),
    })
}

/// Backend name and type of a column the join strategy depends on.
fn strategy_column(table: &Table, name: &str) -> Result<(String, ScalarType), SchemaError> {
    table
        .scalar(name)
        .map(|c| (c.backend_name.clone(), c.scalar))
        .ok_or_else(|| SchemaError::MissingStrategyColumn {
            table: table.name.clone(),
            column: name.to_string(),
        })
}
