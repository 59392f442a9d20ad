use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::resolver::scope::SelectScope;
use crate::resolver::types::ExprType;

/// A literal value carried by a [`Constant`] node.
///
/// `DateTime` constants cannot be written in AQL source; they enter the tree
/// through placeholder substitution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConstantValue {
    Integer(i64),
    Float(f64),
    Bool(bool),
    String(String),
    DateTime(DateTime<Utc>),
    Null,
}

impl ConstantValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ConstantValue::Null)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub value: ConstantValue,
    /// Synthetic constants are structural literals emitted by the compiler
    /// itself (rollup HAVING `0`). They print raw and never enter the
    /// bound-value map.
    pub synthetic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    ILike,
    NotLike,
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expr>,
}

/// An expression node. The parser leaves `ty` empty; the resolver fills it
/// for every node it visits.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Option<ExprType>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Constant(Constant),
    /// A dotted name chain, e.g. `e.pdi.person.properties.sneaky_mail`.
    /// The chain is preserved verbatim even after resolution; backend
    /// printing goes through the resolved type instead.
    Field { chain: Vec<String> },
    /// `*`, legal only as the sole argument of `count`.
    Asterisk,
    /// `{name}`, replaced by a caller-provided fragment right after parsing.
    Placeholder(String),
    Alias {
        expr: Box<Expr>,
        alias: String,
    },
    Call(FunctionCall),
    ArithmeticOp {
        op: ArithmeticOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    CompareOp {
        op: CompareOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    /// A SELECT in expression position, e.g. the right side of `IN (...)`.
    Select(Box<SelectQuery>),
    /// A parenthesized expression list, `(a, b, c)`.
    Tuple(Vec<Expr>),
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr { kind, ty: None }
    }

    pub fn typed(kind: ExprKind, ty: ExprType) -> Self {
        Expr { kind, ty: Some(ty) }
    }

    pub fn constant(value: ConstantValue) -> Self {
        Expr::new(ExprKind::Constant(Constant {
            value,
            synthetic: false,
        }))
    }

    pub fn synthetic_constant(value: ConstantValue) -> Self {
        Expr::new(ExprKind::Constant(Constant {
            value,
            synthetic: true,
        }))
    }

    pub fn field(chain: Vec<String>) -> Self {
        Expr::new(ExprKind::Field { chain })
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::new(ExprKind::Call(FunctionCall {
            name: name.into(),
            args,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl From<OrderDirection> for &'static str {
    fn from(value: OrderDirection) -> Self {
        match value {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderExpr {
    pub expr: Expr,
    pub order: OrderDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Cross,
}

impl From<JoinKind> for &'static str {
    fn from(value: JoinKind) -> Self {
        match value {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinTarget {
    /// A (possibly dotted) table reference, e.g. `events`.
    Table { chain: Vec<String> },
    Subquery(Box<SelectQuery>),
}

/// One entry of the FROM/JOIN chain. The leading FROM entry has
/// `join_type: None`; every subsequent entry carries its join kind and an
/// optional ON constraint. Entries form a linked list via `next_join`.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinExpr {
    pub join_type: Option<JoinKind>,
    pub target: JoinTarget,
    pub alias: Option<String>,
    pub constraint: Option<Expr>,
    pub next_join: Option<Box<JoinExpr>>,
    pub ty: Option<ExprType>,
}

impl JoinExpr {
    /// Iterate the chain front to back.
    pub fn iter(&self) -> JoinChainIter<'_> {
        JoinChainIter { next: Some(self) }
    }

    /// Append a join at the end of the chain.
    pub fn push(&mut self, join: JoinExpr) {
        let mut tail = self;
        while tail.next_join.is_some() {
            tail = tail.next_join.as_mut().unwrap();
        }
        tail.next_join = Some(Box::new(join));
    }
}

pub struct JoinChainIter<'a> {
    next: Option<&'a JoinExpr>,
}

impl<'a> Iterator for JoinChainIter<'a> {
    type Item = &'a JoinExpr;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.next_join.as_deref();
        Some(current)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectQuery {
    pub select: Vec<Expr>,
    pub distinct: bool,
    pub select_from: Option<JoinExpr>,
    pub where_clause: Option<Expr>,
    pub prewhere: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderExpr>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Scope attached by the resolver. Carries the visible table sources,
    /// SELECT aliases, output columns and the lazy-join request log that the
    /// join planner consumes.
    pub scope: Option<Rc<SelectScope>>,
}
