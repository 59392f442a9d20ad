use nom::{
    bytes::complete::{tag_no_case, take_while, take_while1},
    character::complete::multispace0,
    combinator::{not, peek, recognize},
    error::ParseError,
    sequence::{delimited, pair},
    IResult, Parser,
};

/// Wrap a parser so it eats surrounding whitespace.
pub fn ws<'a, O, E: ParseError<&'a str>, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
{
    delimited(multispace0, inner, multispace0)
}

/// Strip SQL-style comments before parsing: `--` line comments and
/// `/* */` block comments. Single-quoted strings and backticked
/// identifiers are respected.
pub fn strip_comments(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string: Option<char> = None;

    while let Some(ch) = chars.next() {
        if let Some(quote) = in_string {
            result.push(ch);
            if ch == '\\' {
                if let Some(escaped) = chars.next() {
                    result.push(escaped);
                }
            } else if ch == quote {
                in_string = None;
            }
            continue;
        }
        if ch == '\'' || ch == '`' {
            in_string = Some(ch);
            result.push(ch);
            continue;
        }
        if ch == '-' && chars.peek() == Some(&'-') {
            chars.next();
            for c in chars.by_ref() {
                if c == '\n' {
                    result.push('\n');
                    break;
                }
            }
            continue;
        }
        if ch == '/' && chars.peek() == Some(&'*') {
            chars.next();
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    break;
                }
            }
            continue;
        }
        result.push(ch);
    }
    result
}

/// Reserved words that cannot be used as bare identifiers or implicit
/// aliases.
const KEYWORDS: &[&str] = &[
    "select", "distinct", "from", "where", "prewhere", "group", "by", "having", "order", "limit",
    "offset", "join", "inner", "left", "outer", "cross", "on", "as", "and", "or", "not", "like",
    "ilike", "in", "is", "null", "true", "false", "asc", "desc", "union",
];

pub fn is_keyword(word: &str) -> bool {
    let lower = word.to_lowercase();
    KEYWORDS.contains(&lower.as_str())
}

/// A raw identifier segment. `$`-prefixed names are legal (property keys
/// like `$session_id`); keywords are allowed here, callers that must reject
/// them use [`identifier_no_keyword`].
pub fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_' || c == '$'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '$'),
    ))
    .parse(input)
}

pub fn identifier_no_keyword(input: &str) -> IResult<&str, &str> {
    let (rest, name) = identifier(input)?;
    if is_keyword(name) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    }
    Ok((rest, name))
}

/// Case-insensitive keyword with a word boundary, so `OR` never matches the
/// prefix of `ORDER`.
pub fn keyword<'a>(
    word: &'static str,
) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    nom::sequence::terminated(
        tag_no_case(word),
        not(peek(take_while1(|c: char| {
            c.is_ascii_alphanumeric() || c == '_' || c == '$'
        }))),
    )
}

/// An unsigned integer, for LIMIT/OFFSET counts.
pub fn parse_u64(input: &str) -> IResult<&str, u64> {
    let (rest, digits) = take_while1(|c: char| c.is_ascii_digit()).parse(input)?;
    match digits.parse::<u64>() {
        Ok(value) => Ok((rest, value)),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_allow_dollar_prefixes() {
        assert_eq!(identifier("$session_id rest"), Ok((" rest", "$session_id")));
        assert_eq!(identifier("event,"), Ok((",", "event")));
    }

    #[test]
    fn keywords_are_rejected_where_required() {
        assert!(identifier_no_keyword("from").is_err());
        assert!(identifier_no_keyword("events").is_ok());
    }

    #[test]
    fn keyword_parser_respects_word_boundaries() {
        let mut or = keyword("OR");
        assert!(or.parse("ORDER BY").is_err());
        assert!(or.parse("or x").is_ok());
    }

    #[test]
    fn comments_are_stripped_outside_strings() {
        assert_eq!(
            strip_comments("select 1 -- trailing\nfrom t /* block */ where x = '--not'"),
            "select 1 \nfrom t  where x = '--not'"
        );
    }
}
