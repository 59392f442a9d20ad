//! AQL parser.
//!
//! A nom-based recursive-descent parser producing the AST in [`ast`].
//! Comments are stripped up front; `{name}` placeholders are substituted
//! with caller-provided AST fragments immediately after parsing, so the
//! resolver only ever sees a complete tree.

pub mod ast;
pub mod common;
pub mod errors;
pub mod expression;
pub mod select;

pub use errors::SyntaxError;

use std::collections::HashMap;

use nom::Parser;

use ast::{Expr, ExprKind, JoinTarget, SelectQuery};
use common::strip_comments;

/// Parse an AQL SELECT statement and substitute its placeholders.
pub fn parse_query(
    source: &str,
    placeholders: &HashMap<String, Expr>,
) -> Result<SelectQuery, SyntaxError> {
    let stripped = strip_comments(source);
    let (rest, mut query) = select::parse_select_query
        .parse(stripped.as_str())
        .map_err(|err| match err {
            nom::Err::Error(e) | nom::Err::Failure(e) => SyntaxError::new(
                "Unable to parse query",
                stripped.len() - e.input.len(),
            ),
            nom::Err::Incomplete(_) => SyntaxError::new("Unexpected end of input", stripped.len()),
        })?;

    let rest_trimmed = rest.trim_start();
    let rest_trimmed = rest_trimmed.strip_prefix(';').unwrap_or(rest_trimmed);
    if !rest_trimmed.trim().is_empty() {
        return Err(SyntaxError::new(
            format!("Unexpected input after query: '{}'", rest_trimmed.trim()),
            stripped.len() - rest.len(),
        ));
    }

    substitute_query(&mut query, placeholders)?;
    Ok(query)
}

fn substitute_query(
    query: &mut SelectQuery,
    placeholders: &HashMap<String, Expr>,
) -> Result<(), SyntaxError> {
    for item in &mut query.select {
        substitute_expr(item, placeholders)?;
    }
    let mut join = query.select_from.as_mut();
    while let Some(current) = join {
        if let JoinTarget::Subquery(inner) = &mut current.target {
            substitute_query(inner, placeholders)?;
        }
        if let Some(constraint) = current.constraint.as_mut() {
            substitute_expr(constraint, placeholders)?;
        }
        join = current.next_join.as_deref_mut();
    }
    if let Some(where_clause) = query.where_clause.as_mut() {
        substitute_expr(where_clause, placeholders)?;
    }
    if let Some(prewhere) = query.prewhere.as_mut() {
        substitute_expr(prewhere, placeholders)?;
    }
    for expr in &mut query.group_by {
        substitute_expr(expr, placeholders)?;
    }
    if let Some(having) = query.having.as_mut() {
        substitute_expr(having, placeholders)?;
    }
    for order in &mut query.order_by {
        substitute_expr(&mut order.expr, placeholders)?;
    }
    Ok(())
}

fn substitute_expr(
    expr: &mut Expr,
    placeholders: &HashMap<String, Expr>,
) -> Result<(), SyntaxError> {
    if let ExprKind::Placeholder(name) = &expr.kind {
        let replacement = placeholders.get(name).cloned().ok_or_else(|| {
            SyntaxError::new(format!("Placeholder '{{{}}}' has no value", name), 0)
        })?;
        *expr = replacement;
        // A substituted fragment may itself not contain placeholders; the
        // caller provides final ASTs.
        return Ok(());
    }
    match &mut expr.kind {
        ExprKind::Alias { expr: inner, .. } | ExprKind::Not(inner) => {
            substitute_expr(inner, placeholders)
        }
        ExprKind::Call(call) => {
            for arg in &mut call.args {
                substitute_expr(arg, placeholders)?;
            }
            Ok(())
        }
        ExprKind::ArithmeticOp { left, right, .. } | ExprKind::CompareOp { left, right, .. } => {
            substitute_expr(left, placeholders)?;
            substitute_expr(right, placeholders)
        }
        ExprKind::And(exprs) | ExprKind::Or(exprs) | ExprKind::Tuple(exprs) => {
            for e in exprs.iter_mut() {
                substitute_expr(e, placeholders)?;
            }
            Ok(())
        }
        ExprKind::Select(subquery) => substitute_query(subquery, placeholders),
        _ => Ok(()),
    }
}
