//! Property-type coercion.
//!
//! Rewrites every JSON property access in SELECT / WHERE / PREWHERE /
//! GROUP BY / HAVING / ORDER BY according to the catalog-declared type:
//! Numeric wraps in `toFloat64OrNull`, DateTime in
//! `parseDateTimeBestEffort`, Boolean compares the raw extract against
//! `'true'`, String passes through. Accesses that live behind an argMax
//! rollup are not wrapped here; the declared kind is recorded on the
//! lazy-join request instead, and the planner applies the coercion inside
//! the rollup's argMax so the subquery output column already carries the
//! coerced type.

use crate::aql_parser::ast::{
    CompareOperator, Constant, ConstantValue, Expr, ExprKind, FunctionCall, JoinTarget,
    SelectQuery,
};
use crate::resolver::types::{ExprType, RequestedColumn, TableSource};
use crate::schema::property_catalog::CachedPropertyLookup;
use crate::schema::types::{PropertyKind, ScalarType};

/// Apply property coercions throughout a resolved query.
pub fn resolve_property_types(
    query: &mut SelectQuery,
    properties: &mut CachedPropertyLookup<'_>,
) {
    for item in &mut query.select {
        coerce_expr(item, properties);
    }
    if let Some(where_clause) = query.where_clause.as_mut() {
        coerce_expr(where_clause, properties);
    }
    if let Some(prewhere) = query.prewhere.as_mut() {
        coerce_expr(prewhere, properties);
    }
    for expr in &mut query.group_by {
        coerce_expr(expr, properties);
    }
    if let Some(having) = query.having.as_mut() {
        coerce_expr(having, properties);
    }
    for order in &mut query.order_by {
        coerce_expr(&mut order.expr, properties);
    }

    // FROM subqueries have their own clause set. ON constraints are left
    // untouched; join keys compare raw extracts.
    let mut join = query.select_from.as_mut();
    while let Some(current) = join {
        if let JoinTarget::Subquery(inner) = &mut current.target {
            resolve_property_types(inner, properties);
        }
        join = current.next_join.as_deref_mut();
    }
}

fn coerce_expr(expr: &mut Expr, properties: &mut CachedPropertyLookup<'_>) {
    if let Some(ExprType::Property(prop)) = expr.ty.clone() {
        let kind = properties.lookup(prop.owner, &prop.chain[0]);
        if let Some(output) = &prop.rollup_output {
            // Materialized through a rollup: record the coercion on the
            // request so the planner applies it inside argMax.
            if let TableSource::LazyJoin(lazy) = &prop.source {
                if let Some(RequestedColumn::Property { coercion, .. }) =
                    lazy.requested.borrow_mut().get_mut(output)
                {
                    *coercion = kind.filter(|k| *k != PropertyKind::String);
                }
            }
            return;
        }
        if !prop.coerced.get() {
            if let Some(kind) = kind.filter(|k| *k != PropertyKind::String) {
                prop.coerced.set(true);
                let inner = std::mem::replace(expr, Expr::new(ExprKind::Asterisk));
                *expr = coerce_access(inner, kind);
            }
        }
        return;
    }

    match &mut expr.kind {
        ExprKind::Alias { expr: inner, .. } | ExprKind::Not(inner) => {
            coerce_expr(inner, properties)
        }
        ExprKind::Call(call) => {
            for arg in &mut call.args {
                coerce_expr(arg, properties);
            }
        }
        ExprKind::ArithmeticOp { left, right, .. } | ExprKind::CompareOp { left, right, .. } => {
            coerce_expr(left, properties);
            coerce_expr(right, properties);
        }
        ExprKind::And(exprs) | ExprKind::Or(exprs) | ExprKind::Tuple(exprs) => {
            for e in exprs.iter_mut() {
                coerce_expr(e, properties);
            }
        }
        ExprKind::Select(subquery) => resolve_property_types(subquery, properties),
        _ => {}
    }
}

/// Wrap a raw property extraction according to its declared kind.
pub fn coerce_access(access: Expr, kind: PropertyKind) -> Expr {
    match kind {
        PropertyKind::Numeric => Expr::typed(
            ExprKind::Call(FunctionCall {
                name: "toFloat64OrNull".to_string(),
                args: vec![access],
            }),
            ExprType::Scalar(ScalarType::Float),
        ),
        PropertyKind::DateTime => Expr::typed(
            ExprKind::Call(FunctionCall {
                name: "parseDateTimeBestEffort".to_string(),
                args: vec![access],
            }),
            ExprType::Scalar(ScalarType::DateTime),
        ),
        PropertyKind::Boolean => Expr::typed(
            ExprKind::CompareOp {
                op: CompareOperator::Eq,
                left: Box::new(access),
                right: Box::new(Expr::typed(
                    ExprKind::Constant(Constant {
                        value: ConstantValue::String("true".to_string()),
                        synthetic: false,
                    }),
                    ExprType::Scalar(ScalarType::String),
                )),
            },
            ExprType::Scalar(ScalarType::Boolean),
        ),
        PropertyKind::String => access,
    }
}
