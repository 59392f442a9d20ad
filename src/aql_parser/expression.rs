use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, multispace0},
    combinator::{opt, recognize},
    multi::separated_list0,
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};

use super::ast::{
    ArithmeticOperator, CompareOperator, ConstantValue, Expr, ExprKind, FunctionCall,
};
use super::common::{identifier, identifier_no_keyword, keyword, ws};
use super::select::parse_select_query;

pub fn parse_expression(input: &str) -> IResult<&str, Expr> {
    parse_or.parse(input)
}

fn parse_or(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_and.parse(input)?;
    let mut operands = vec![first];
    let mut remaining = input;
    loop {
        match preceded(ws(keyword("OR")), parse_and).parse(remaining) {
            Ok((rest, operand)) => {
                operands.push(operand);
                remaining = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    if operands.len() == 1 {
        Ok((remaining, operands.pop().unwrap()))
    } else {
        Ok((remaining, Expr::new(ExprKind::Or(operands))))
    }
}

fn parse_and(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_not.parse(input)?;
    let mut operands = vec![first];
    let mut remaining = input;
    loop {
        match preceded(ws(keyword("AND")), parse_not).parse(remaining) {
            Ok((rest, operand)) => {
                operands.push(operand);
                remaining = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    if operands.len() == 1 {
        Ok((remaining, operands.pop().unwrap()))
    } else {
        Ok((remaining, Expr::new(ExprKind::And(operands))))
    }
}

fn parse_not(input: &str) -> IResult<&str, Expr> {
    let (input, negation) = opt(ws(keyword("NOT"))).parse(input)?;
    let (input, operand) = parse_comparison.parse(input)?;
    match negation {
        Some(_) => Ok((input, Expr::new(ExprKind::Not(Box::new(operand))))),
        None => Ok((input, operand)),
    }
}

/// Comparison level: a single (non-associative) comparison, the textual
/// predicates, or the IS [NOT] NULL postfix normalized to a function call.
fn parse_comparison(input: &str) -> IResult<&str, Expr> {
    let (input, left) = parse_additive.parse(input)?;

    if let Ok((rest, is_not)) = preceded(
        ws(keyword("IS")),
        alt((
            preceded(ws(keyword("NOT")), ws(keyword("NULL"))).map(|_| true),
            ws(keyword("NULL")).map(|_| false),
        )),
    )
    .parse(input)
    {
        let name = if is_not { "isNotNull" } else { "isNull" };
        return Ok((rest, Expr::call(name, vec![left])));
    }

    let operator = opt(alt((
        tag("==").map(|_| CompareOperator::Eq),
        tag("!=").map(|_| CompareOperator::NotEq),
        tag("<>").map(|_| CompareOperator::NotEq),
        tag("<=").map(|_| CompareOperator::LtEq),
        tag(">=").map(|_| CompareOperator::GtEq),
        tag("<").map(|_| CompareOperator::Lt),
        tag(">").map(|_| CompareOperator::Gt),
        tag("=").map(|_| CompareOperator::Eq),
        preceded(ws(keyword("NOT")), keyword("LIKE")).map(|_| CompareOperator::NotLike),
        preceded(ws(keyword("NOT")), keyword("IN")).map(|_| CompareOperator::NotIn),
        keyword("ILIKE").map(|_| CompareOperator::ILike),
        keyword("LIKE").map(|_| CompareOperator::Like),
        keyword("IN").map(|_| CompareOperator::In),
    )));
    let (input, op) = ws(operator).parse(input)?;
    match op {
        Some(op) => {
            let (input, right) = parse_additive.parse(input)?;
            Ok((
                input,
                Expr::new(ExprKind::CompareOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                }),
            ))
        }
        None => Ok((input, left)),
    }
}

fn parse_additive(input: &str) -> IResult<&str, Expr> {
    let (input, mut expr) = parse_multiplicative.parse(input)?;
    let mut remaining = input;
    loop {
        let op_parser = alt((
            char('+').map(|_| ArithmeticOperator::Add),
            char('-').map(|_| ArithmeticOperator::Sub),
        ));
        match pair(ws(op_parser), parse_multiplicative).parse(remaining) {
            Ok((rest, (op, right))) => {
                expr = Expr::new(ExprKind::ArithmeticOp {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                });
                remaining = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((remaining, expr))
}

fn parse_multiplicative(input: &str) -> IResult<&str, Expr> {
    let (input, mut expr) = parse_primary.parse(input)?;
    let mut remaining = input;
    loop {
        let op_parser = alt((
            char('*').map(|_| ArithmeticOperator::Mul),
            char('/').map(|_| ArithmeticOperator::Div),
            char('%').map(|_| ArithmeticOperator::Mod),
        ));
        match pair(ws(op_parser), parse_primary).parse(remaining) {
            Ok((rest, (op, right))) => {
                expr = Expr::new(ExprKind::ArithmeticOp {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                });
                remaining = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((remaining, expr))
}

fn parse_primary(input: &str) -> IResult<&str, Expr> {
    preceded(
        multispace0,
        alt((
            parse_placeholder,
            parse_literal,
            parse_unary_minus,
            parse_asterisk,
            parse_parenthesized,
            parse_function_call,
            parse_field_chain,
        )),
    )
    .parse(input)
}

/// Unary minus on a non-literal operand; literal negatives are handled by
/// the number parsers.
fn parse_unary_minus(input: &str) -> IResult<&str, Expr> {
    let (input, _) = char('-').parse(input)?;
    let (input, operand) = parse_primary.parse(input)?;
    Ok((input, Expr::call("negate", vec![operand])))
}

fn parse_placeholder(input: &str) -> IResult<&str, Expr> {
    let (input, name) = delimited(char('{'), ws(identifier), char('}')).parse(input)?;
    Ok((input, Expr::new(ExprKind::Placeholder(name.to_string()))))
}

fn parse_asterisk(input: &str) -> IResult<&str, Expr> {
    let (input, _) = char('*').parse(input)?;
    Ok((input, Expr::new(ExprKind::Asterisk)))
}

/// A parenthesized subquery, single expression, or tuple.
fn parse_parenthesized(input: &str) -> IResult<&str, Expr> {
    let (input, _) = char('(').parse(input)?;
    if let Ok((rest, subquery)) = parse_select_query.parse(input) {
        let (rest, _) = ws(char(')')).parse(rest)?;
        return Ok((rest, Expr::new(ExprKind::Select(Box::new(subquery)))));
    }
    let (input, mut exprs) =
        separated_list0(ws(char(',')), parse_expression).parse(input)?;
    let (input, _) = ws(char(')')).parse(input)?;
    let expr = match exprs.len() {
        1 => exprs.pop().unwrap(),
        _ => Expr::new(ExprKind::Tuple(exprs)),
    };
    Ok((input, expr))
}

fn parse_function_call(input: &str) -> IResult<&str, Expr> {
    let (input, name) = identifier_no_keyword.parse(input)?;
    let (input, args) = delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), parse_expression),
        ws(char(')')),
    )
    .parse(input)?;
    Ok((
        input,
        Expr::new(ExprKind::Call(FunctionCall {
            name: name.to_string(),
            args,
        })),
    ))
}

fn parse_field_chain(input: &str) -> IResult<&str, Expr> {
    let (input, first) = identifier_no_keyword.parse(input)?;
    let mut chain = vec![first.to_string()];
    let mut remaining = input;
    loop {
        match preceded(char('.'), identifier).parse(remaining) {
            Ok((rest, segment)) => {
                chain.push(segment.to_string());
                remaining = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((remaining, Expr::new(ExprKind::Field { chain })))
}

fn parse_literal(input: &str) -> IResult<&str, Expr> {
    alt((
        parse_string_literal,
        parse_float_literal,
        parse_integer_literal,
        keyword("TRUE").map(|_| Expr::constant(ConstantValue::Bool(true))),
        keyword("FALSE").map(|_| Expr::constant(ConstantValue::Bool(false))),
        keyword("NULL").map(|_| Expr::constant(ConstantValue::Null)),
    ))
    .parse(input)
}

fn parse_float_literal(input: &str) -> IResult<&str, Expr> {
    let (rest, text) = recognize((
        opt(char('-')),
        take_while1(|c: char| c.is_ascii_digit()),
        char('.'),
        take_while1(|c: char| c.is_ascii_digit()),
    ))
    .parse(input)?;
    match text.parse::<f64>() {
        Ok(value) => Ok((rest, Expr::constant(ConstantValue::Float(value)))),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Float,
        ))),
    }
}

fn parse_integer_literal(input: &str) -> IResult<&str, Expr> {
    let (rest, text) = recognize((
        opt(char('-')),
        take_while1(|c: char| c.is_ascii_digit()),
    ))
    .parse(input)?;
    match text.parse::<i64>() {
        Ok(value) => Ok((rest, Expr::constant(ConstantValue::Integer(value)))),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

/// Single-quoted string with `''` and backslash escapes.
fn parse_string_literal(input: &str) -> IResult<&str, Expr> {
    let (body, _) = char('\'').parse(input)?;
    let mut out = String::new();
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' => {
                if body[i + 1..].starts_with('\'') {
                    out.push('\'');
                    chars.next();
                } else {
                    return Ok((&body[i + 1..], Expr::constant(ConstantValue::String(out))));
                }
            }
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                }
            }
            other => out.push(other),
        }
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Expr {
        let (rest, expr) = parse_expression(input).unwrap();
        assert_eq!(rest.trim(), "");
        expr
    }

    #[test]
    fn parses_dotted_chains() {
        let expr = parse("e.pdi.person.properties.sneaky_mail");
        match expr.kind {
            ExprKind::Field { chain } => {
                assert_eq!(chain, vec!["e", "pdi", "person", "properties", "sneaky_mail"])
            }
            other => panic!("expected field chain, got {:?}", other),
        }
    }

    #[test]
    fn parses_dollar_segments() {
        let expr = parse("properties.$screen_width * properties.$screen_height");
        assert!(matches!(
            expr.kind,
            ExprKind::ArithmeticOp {
                op: ArithmeticOperator::Mul,
                ..
            }
        ));
    }

    #[test]
    fn comparison_binds_tighter_than_and() {
        let expr = parse("a = 1 and b = 2");
        match expr.kind {
            ExprKind::And(operands) => assert_eq!(operands.len(), 2),
            other => panic!("expected and(), got {:?}", other),
        }
    }

    #[test]
    fn is_not_null_normalizes_to_a_call() {
        let expr = parse("properties.$session_id is not null");
        match expr.kind {
            ExprKind::Call(call) => assert_eq!(call.name, "isNotNull"),
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn count_star_parses() {
        let expr = parse("count(*)");
        match expr.kind {
            ExprKind::Call(call) => {
                assert_eq!(call.name, "count");
                assert!(matches!(call.args[0].kind, ExprKind::Asterisk));
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn doubled_quotes_escape_in_strings() {
        let expr = parse("'don''t'");
        match expr.kind {
            ExprKind::Constant(c) => {
                assert_eq!(c.value, ConstantValue::String("don't".to_string()))
            }
            other => panic!("expected constant, got {:?}", other),
        }
    }

    #[test]
    fn placeholders_parse() {
        let expr = parse("{cohort_filter}");
        assert!(matches!(expr.kind, ExprKind::Placeholder(_)));
    }
}
