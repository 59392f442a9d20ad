use nom::{
    branch::alt,
    character::complete::char,
    combinator::opt,
    multi::separated_list1,
    sequence::{delimited, preceded},
    IResult, Parser,
};

use super::ast::{
    Expr, ExprKind, JoinExpr, JoinKind, JoinTarget, OrderDirection, OrderExpr, SelectQuery,
};
use super::common::{identifier_no_keyword, keyword, parse_u64, ws};
use super::expression::parse_expression;

pub fn parse_select_query(input: &str) -> IResult<&str, SelectQuery> {
    let (input, _) = ws(keyword("SELECT")).parse(input)?;
    let (input, distinct) = opt(ws(keyword("DISTINCT"))).parse(input)?;
    let (input, select) = separated_list1(ws(char(',')), parse_select_item).parse(input)?;

    let (input, select_from) = opt(preceded(ws(keyword("FROM")), parse_join_chain)).parse(input)?;

    let (input, prewhere_first) =
        opt(preceded(ws(keyword("PREWHERE")), parse_expression)).parse(input)?;
    let (input, where_clause) =
        opt(preceded(ws(keyword("WHERE")), parse_expression)).parse(input)?;
    let (input, prewhere) = match prewhere_first {
        Some(prewhere) => (input, Some(prewhere)),
        None => opt(preceded(ws(keyword("PREWHERE")), parse_expression)).parse(input)?,
    };

    let (input, group_by) = opt(preceded(
        (ws(keyword("GROUP")), ws(keyword("BY"))),
        separated_list1(ws(char(',')), parse_expression),
    ))
    .parse(input)?;
    let (input, having) = opt(preceded(ws(keyword("HAVING")), parse_expression)).parse(input)?;
    let (input, order_by) = opt(preceded(
        (ws(keyword("ORDER")), ws(keyword("BY"))),
        separated_list1(ws(char(',')), parse_order_item),
    ))
    .parse(input)?;
    let (input, limit) = opt(preceded(ws(keyword("LIMIT")), ws(parse_u64))).parse(input)?;
    let (input, offset) = opt(preceded(ws(keyword("OFFSET")), ws(parse_u64))).parse(input)?;

    Ok((
        input,
        SelectQuery {
            select,
            distinct: distinct.is_some(),
            select_from,
            where_clause,
            prewhere,
            group_by: group_by.unwrap_or_default(),
            having,
            order_by: order_by.unwrap_or_default(),
            limit,
            offset,
            scope: None,
        },
    ))
}

fn parse_select_item(input: &str) -> IResult<&str, Expr> {
    let (input, expr) = parse_expression.parse(input)?;
    let (input, alias) = opt(preceded(ws(keyword("AS")), identifier_no_keyword)).parse(input)?;
    match alias {
        Some(alias) => Ok((
            input,
            Expr::new(ExprKind::Alias {
                expr: Box::new(expr),
                alias: alias.to_string(),
            }),
        )),
        None => Ok((input, expr)),
    }
}

fn parse_order_item(input: &str) -> IResult<&str, OrderExpr> {
    let (input, expr) = parse_expression.parse(input)?;
    let (input, direction) = opt(alt((
        ws(keyword("ASC")).map(|_| OrderDirection::Asc),
        ws(keyword("DESC")).map(|_| OrderDirection::Desc),
    )))
    .parse(input)?;
    Ok((
        input,
        OrderExpr {
            expr,
            order: direction.unwrap_or(OrderDirection::Asc),
        },
    ))
}

fn parse_join_chain(input: &str) -> IResult<&str, JoinExpr> {
    let (input, first) = parse_join_entry(None).parse(input)?;
    let mut entries = vec![first];
    let mut remaining = input;
    loop {
        let kind_result = ws(parse_join_kind).parse(remaining);
        match kind_result {
            Ok((rest, kind)) => {
                let (rest, mut entry) = parse_join_entry(Some(kind)).parse(rest)?;
                let (rest, constraint) =
                    opt(preceded(ws(keyword("ON")), parse_expression)).parse(rest)?;
                entry.constraint = constraint;
                entries.push(entry);
                remaining = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }

    let mut acc: Option<Box<JoinExpr>> = None;
    for mut entry in entries.into_iter().rev() {
        entry.next_join = acc;
        acc = Some(Box::new(entry));
    }
    Ok((remaining, *acc.expect("at least one FROM entry")))
}

fn parse_join_kind(input: &str) -> IResult<&str, JoinKind> {
    alt((
        preceded(ws(keyword("INNER")), keyword("JOIN")).map(|_| JoinKind::Inner),
        preceded(
            (ws(keyword("LEFT")), opt(ws(keyword("OUTER")))),
            keyword("JOIN"),
        )
        .map(|_| JoinKind::Left),
        preceded(ws(keyword("CROSS")), keyword("JOIN")).map(|_| JoinKind::Cross),
        keyword("JOIN").map(|_| JoinKind::Inner),
    ))
    .parse(input)
}

fn parse_join_entry(
    kind: Option<JoinKind>,
) -> impl FnMut(&str) -> IResult<&str, JoinExpr> {
    move |input: &str| {
        let (input, target) = alt((parse_subquery_target, parse_table_target)).parse(input)?;
        let (input, alias) = opt(alt((
            preceded(ws(keyword("AS")), identifier_no_keyword),
            ws(identifier_no_keyword),
        )))
        .parse(input)?;
        Ok((
            input,
            JoinExpr {
                join_type: kind,
                target,
                alias: alias.map(|a| a.to_string()),
                constraint: None,
                next_join: None,
                ty: None,
            },
        ))
    }
}

fn parse_subquery_target(input: &str) -> IResult<&str, JoinTarget> {
    let (input, subquery) =
        delimited(ws(char('(')), parse_select_query, ws(char(')'))).parse(input)?;
    Ok((input, JoinTarget::Subquery(Box::new(subquery))))
}

fn parse_table_target(input: &str) -> IResult<&str, JoinTarget> {
    let (input, first) = ws(identifier_no_keyword).parse(input)?;
    let mut chain = vec![first.to_string()];
    let mut remaining = input;
    loop {
        match preceded(char('.'), identifier_no_keyword).parse(remaining) {
            Ok((rest, segment)) => {
                chain.push(segment.to_string());
                remaining = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((remaining, JoinTarget::Table { chain }))
}
