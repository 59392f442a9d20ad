//! SQL emission.
//!
//! The printer runs twice per compile over the same resolved tree: once in
//! AQL dialect before the structural transforms (normalized source form,
//! logical table names, original field chains, no tenant predicates, no
//! JSON expansion) and once in backend dialect after them. Backend emission
//! injects a tenant predicate for every physical table reference and
//! captures constants and JSON keys into a positional bound-value map.

pub mod errors;

pub use errors::PrintError;

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;

use crate::aql_parser::ast::{
    ArithmeticOperator, CompareOperator, Constant, ConstantValue, Expr, ExprKind, JoinExpr,
    JoinKind, JoinTarget, SelectQuery,
};
use crate::resolver::types::{ExprType, PropertyRef, TableSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// ClickHouse SQL with tenant predicates and JSON expansion.
    Backend,
    /// Normalized AQL for display and round-tripping.
    Aql,
}

/// Print a query, returning the SQL and the captured bound values.
pub fn print_query(
    query: &SelectQuery,
    dialect: Dialect,
    tenant_id: u64,
    default_limit: u64,
) -> Result<(String, IndexMap<String, ConstantValue>), PrintError> {
    let mut printer = Printer {
        dialect,
        tenant_id,
        default_limit,
        values: IndexMap::new(),
    };
    let sql = printer.print_select(query, true)?;
    Ok((sql, printer.values))
}

lazy_static! {
    static ref SAFE_IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// Emit an identifier, backtick-quoting anything outside the safe set
/// (materialized `$...` columns in particular).
fn ident(name: &str) -> String {
    if SAFE_IDENTIFIER.is_match(name) {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "\\`"))
    }
}

struct Printer {
    dialect: Dialect,
    tenant_id: u64,
    default_limit: u64,
    values: IndexMap<String, ConstantValue>,
}

impl Printer {
    fn print_select(&mut self, query: &SelectQuery, top_level: bool) -> Result<String, PrintError> {
        let mut parts: Vec<String> = Vec::new();

        let items = query
            .select
            .iter()
            .map(|e| self.print_expr(e))
            .collect::<Result<Vec<_>, _>>()?;
        let distinct = if query.distinct { "DISTINCT " } else { "" };
        parts.push(format!("SELECT {}{}", distinct, items.join(", ")));

        let mut tenant_predicates: Vec<String> = Vec::new();
        if let Some(from) = &query.select_from {
            let mut from_sql = String::from("FROM ");
            for (index, join) in from.iter().enumerate() {
                if index > 0 {
                    let kind: &str = join.join_type.unwrap_or(JoinKind::Inner).into();
                    from_sql.push(' ');
                    from_sql.push_str(kind);
                    from_sql.push(' ');
                }
                from_sql.push_str(&self.print_join_target(join)?);
                if let Some(constraint) = &join.constraint {
                    from_sql.push_str(" ON ");
                    from_sql.push_str(&self.print_expr(constraint)?);
                }
                if self.dialect == Dialect::Backend {
                    if let Some(ExprType::Table(table)) = &join.ty {
                        tenant_predicates.push(format!(
                            "equals({}.{}, {})",
                            ident(&table.alias),
                            ident(&table.tenant_column),
                            self.tenant_id
                        ));
                    }
                }
            }
            parts.push(from_sql);
        }

        if let Some(prewhere) = &query.prewhere {
            parts.push(format!("PREWHERE {}", self.print_expr(prewhere)?));
        }

        let mut conjuncts = tenant_predicates;
        if let Some(where_clause) = &query.where_clause {
            // Flatten a top-level AND so tenant predicates and user
            // conditions share one n-ary and(...).
            match (&where_clause.kind, conjuncts.is_empty()) {
                (ExprKind::And(exprs), false) => {
                    for e in exprs {
                        conjuncts.push(self.print_expr(e)?);
                    }
                }
                _ => conjuncts.push(self.print_expr(where_clause)?),
            }
        }
        if !conjuncts.is_empty() {
            let where_sql = if conjuncts.len() == 1 {
                conjuncts.remove(0)
            } else {
                format!("and({})", conjuncts.join(", "))
            };
            parts.push(format!("WHERE {}", where_sql));
        }

        if !query.group_by.is_empty() {
            let group = query
                .group_by
                .iter()
                .map(|e| self.print_expr(e))
                .collect::<Result<Vec<_>, _>>()?;
            parts.push(format!("GROUP BY {}", group.join(", ")));
        }
        if let Some(having) = &query.having {
            parts.push(format!("HAVING {}", self.print_expr(having)?));
        }
        if !query.order_by.is_empty() {
            let order = query
                .order_by
                .iter()
                .map(|o| {
                    let direction: &str = o.order.into();
                    Ok(format!("{} {}", self.print_expr(&o.expr)?, direction))
                })
                .collect::<Result<Vec<_>, PrintError>>()?;
            parts.push(format!("ORDER BY {}", order.join(", ")));
        }

        // The default LIMIT applies to the outermost query only; inner
        // limits are never altered.
        let limit = query
            .limit
            .or(if top_level { Some(self.default_limit) } else { None });
        if let Some(limit) = limit {
            parts.push(format!("LIMIT {}", limit));
        }
        if let Some(offset) = query.offset {
            parts.push(format!("OFFSET {}", offset));
        }

        Ok(parts.join(" "))
    }

    fn print_join_target(&mut self, join: &JoinExpr) -> Result<String, PrintError> {
        match &join.target {
            JoinTarget::Table { chain } => {
                let base = match self.dialect {
                    Dialect::Backend => match &join.ty {
                        Some(ExprType::Table(table)) => ident(&table.backend_table),
                        _ => {
                            return Err(PrintError::Unresolved(format!(
                                "table '{}'",
                                chain.join(".")
                            )))
                        }
                    },
                    Dialect::Aql => chain.join("."),
                };
                match &join.alias {
                    Some(alias) => Ok(format!("{} AS {}", base, ident(alias))),
                    None => Ok(base),
                }
            }
            JoinTarget::Subquery(subquery) => {
                let sql = self.print_select(subquery, false)?;
                match &join.alias {
                    Some(alias) => Ok(format!("({}) AS {}", sql, ident(alias))),
                    None => Ok(format!("({})", sql)),
                }
            }
        }
    }

    fn print_expr(&mut self, expr: &Expr) -> Result<String, PrintError> {
        match &expr.kind {
            ExprKind::Constant(constant) => Ok(self.print_constant(constant)),
            ExprKind::Field { chain } => match self.dialect {
                Dialect::Aql => Ok(chain.join(".")),
                Dialect::Backend => self.print_resolved_field(expr, chain),
            },
            ExprKind::Asterisk => Ok("*".to_string()),
            ExprKind::Placeholder(name) => Err(PrintError::Internal(format!(
                "unsubstituted placeholder '{{{}}}'",
                name
            ))),
            ExprKind::Alias { expr: inner, alias } => Ok(format!(
                "{} AS {}",
                self.print_expr(inner)?,
                ident(alias)
            )),
            ExprKind::Call(call) => {
                let args = call
                    .args
                    .iter()
                    .map(|a| self.print_expr(a))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("{}({})", call.name, args.join(", ")))
            }
            ExprKind::ArithmeticOp { op, left, right } => {
                let name = match op {
                    ArithmeticOperator::Add => "plus",
                    ArithmeticOperator::Sub => "minus",
                    ArithmeticOperator::Mul => "multiply",
                    ArithmeticOperator::Div => "divide",
                    ArithmeticOperator::Mod => "modulo",
                };
                Ok(format!(
                    "{}({}, {})",
                    name,
                    self.print_expr(left)?,
                    self.print_expr(right)?
                ))
            }
            ExprKind::CompareOp { op, left, right } => {
                let name = match op {
                    CompareOperator::Eq => "equals",
                    CompareOperator::NotEq => "notEquals",
                    CompareOperator::Lt => "less",
                    CompareOperator::LtEq => "lessOrEquals",
                    CompareOperator::Gt => "greater",
                    CompareOperator::GtEq => "greaterOrEquals",
                    CompareOperator::Like => "like",
                    CompareOperator::ILike => "ilike",
                    CompareOperator::NotLike => "notLike",
                    CompareOperator::In => "in",
                    CompareOperator::NotIn => "notIn",
                };
                Ok(format!(
                    "{}({}, {})",
                    name,
                    self.print_expr(left)?,
                    self.print_expr(right)?
                ))
            }
            ExprKind::And(exprs) => {
                let parts = exprs
                    .iter()
                    .map(|e| self.print_expr(e))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("and({})", parts.join(", ")))
            }
            ExprKind::Or(exprs) => {
                let parts = exprs
                    .iter()
                    .map(|e| self.print_expr(e))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("or({})", parts.join(", ")))
            }
            ExprKind::Not(inner) => Ok(format!("not({})", self.print_expr(inner)?)),
            ExprKind::Select(subquery) => {
                Ok(format!("({})", self.print_select(subquery, false)?))
            }
            ExprKind::Tuple(exprs) => {
                let parts = exprs
                    .iter()
                    .map(|e| self.print_expr(e))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("tuple({})", parts.join(", ")))
            }
        }
    }

    /// Backend rendering of a field access, by resolved type.
    fn print_resolved_field(&mut self, expr: &Expr, chain: &[String]) -> Result<String, PrintError> {
        match &expr.ty {
            Some(ExprType::Field(field)) => {
                Ok(self.qualified(&field.source, &field.backend_name))
            }
            Some(ExprType::Property(property)) => self.print_property(property),
            Some(ExprType::FieldAlias(alias)) => Ok(ident(&alias.name)),
            Some(ExprType::Table(table)) => Ok(ident(&table.alias)),
            Some(other) => Err(PrintError::Internal(format!(
                "field '{}' resolved to unprintable type {:?}",
                chain.join("."),
                other
            ))),
            None => Err(PrintError::Unresolved(chain.join("."))),
        }
    }

    fn print_property(&mut self, property: &PropertyRef) -> Result<String, PrintError> {
        if let Some(output) = &property.rollup_output {
            return Ok(self.qualified(&property.source, output));
        }
        let mut sql = self.qualified(&property.source, &property.bag_column);
        for key in &property.chain {
            let param = self.capture(ConstantValue::String(key.clone()));
            sql = format!("JSONExtractRaw({}, {})", sql, param);
        }
        Ok(format!("replaceRegexpAll({}, '^\"|\"$', '')", sql))
    }

    fn qualified(&self, source: &TableSource, name: &str) -> String {
        match source.print_alias() {
            Some(alias) => format!("{}.{}", ident(&alias), ident(name)),
            None => ident(name),
        }
    }

    fn print_constant(&mut self, constant: &Constant) -> String {
        if constant.synthetic {
            return raw_constant(&constant.value);
        }
        match &constant.value {
            ConstantValue::Bool(_) | ConstantValue::Null => raw_constant(&constant.value),
            value => self.capture(value.clone()),
        }
    }

    /// Record a bound value and emit its positional placeholder.
    fn capture(&mut self, value: ConstantValue) -> String {
        let key = format!("hogql_val_{}", self.values.len());
        let placeholder = format!("%({})s", key);
        self.values.insert(key, value);
        placeholder
    }
}

fn raw_constant(value: &ConstantValue) -> String {
    match value {
        ConstantValue::Integer(i) => i.to_string(),
        ConstantValue::Float(f) => f.to_string(),
        ConstantValue::Bool(b) => b.to_string(),
        ConstantValue::String(s) => format!("'{}'", s.replace('\'', "\\'")),
        ConstantValue::DateTime(dt) => {
            format!("toDateTime('{}')", dt.format("%Y-%m-%d %H:%M:%S"))
        }
        ConstantValue::Null => "NULL".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_identifiers_stay_bare() {
        assert_eq!(ident("event"), "event");
        assert_eq!(ident("properties___sneaky_mail"), "properties___sneaky_mail");
    }

    #[test]
    fn dollar_identifiers_are_backticked() {
        assert_eq!(ident("$session_id"), "`$session_id`");
    }

    #[test]
    fn raw_strings_are_quoted() {
        assert_eq!(
            raw_constant(&ConstantValue::String("a'b".to_string())),
            "'a\\'b'"
        );
    }
}
