//! A `nom`-based parser for the supported XPath subset of selectors.

use crate::ast::*;
use crate::error::SelectorError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{map, opt, recognize},
    multi::many0,
    number::complete::double,
    sequence::{delimited, pair, preceded, terminated},
};

// --- Pre-parse rewriting ---

/// Rewrites the contextual shorthand accepted in selectors into plain path syntax.
///
/// - whitespace outside `[...]` separates steps, like `/`
/// - `#document` alone is `/`, and a leading `#document/` is `/`
/// - `/**/`, a trailing `/**` and a leading `**/` are `//`
pub fn normalize(selector: &str) -> String {
    let mut out = String::with_capacity(selector.len());
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut pending_separator = false;

    for c in selector.trim().chars() {
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        if depth == 0 && c.is_whitespace() {
            pending_separator = true;
            continue;
        }
        if pending_separator {
            if c != '/' && !out.is_empty() && !out.ends_with('/') {
                out.push('/');
            }
            pending_separator = false;
        }
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '\'' | '"' if depth > 0 => quote = Some(c),
            _ => {}
        }
        out.push(c);
    }

    let mut out = if out == "#document" {
        "/".to_string()
    } else if let Some(rest) = out.strip_prefix("#document/") {
        format!("/{}", rest)
    } else {
        out
    };

    while out.contains("/**/") {
        out = out.replace("/**/", "//");
    }
    if let Some(rest) = out.strip_prefix("**/") {
        out = format!("//{}", rest);
    }
    if let Some(head) = out.strip_suffix("/**") {
        out = format!("{}//", head);
    }
    out
}

// --- Main Public Parser ---

/// Parses an already normalized selector into a [`ParsedPath`].
pub fn parse_path(input: &str) -> Result<ParsedPath, SelectorError> {
    let trimmed = input.trim();
    let (body, ends_star_star) = match trimmed.strip_suffix("//") {
        Some(body) => (body, true),
        None => (trimmed, false),
    };

    if body.is_empty() {
        if ends_star_star {
            return Ok(ParsedPath {
                rooted: true,
                steps: vec![],
                ends_star_star,
            });
        }
        return Err(SelectorError::parse(input, "empty selector"));
    }
    if body == "/" {
        return Ok(ParsedPath {
            rooted: true,
            steps: vec![],
            ends_star_star,
        });
    }

    match location_path(body) {
        Ok(("", mut path)) => {
            path.ends_star_star = ends_star_star;
            Ok(path)
        }
        Ok((rem, _)) => Err(SelectorError::parse(
            input,
            format!("Parser did not consume all input. Remainder: '{}'", rem),
        )),
        Err(e) => Err(SelectorError::parse(input, e.to_string())),
    }
}

/// Parses a single predicate expression, without the surrounding brackets.
pub fn parse_predicate(input: &str) -> Result<Expr, SelectorError> {
    match or_expr(input.trim()) {
        Ok(("", expr)) => Ok(expr),
        Ok((rem, _)) => Err(SelectorError::parse(
            input,
            format!("Parser did not consume all input. Remainder: '{}'", rem),
        )),
        Err(e) => Err(SelectorError::parse(input, e.to_string())),
    }
}

// --- Combinators & Helpers ---

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

fn fold_binary(first: Expr, rest: Vec<Expr>, combine: fn(Box<Expr>, Box<Expr>) -> Expr) -> Expr {
    rest.into_iter()
        .fold(first, |left, right| combine(Box::new(left), Box::new(right)))
}

// --- Name Parsers ---

fn nc_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '-' || c == '.'),
    ))
    .parse(input)
}

fn q_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(nc_name, opt(pair(char(':'), nc_name)))).parse(input)
}

fn name_test(input: &str) -> IResult<&str, NameTest> {
    alt((
        map(char('*'), |_| NameTest::Any),
        map(q_name, |name: &str| NameTest::Name(name.to_string())),
    ))
    .parse(input)
}

// --- Path Parsers ---

fn axis(input: &str) -> IResult<&str, Axis> {
    map(terminated(nc_name, tag("::")), |name: &str| match name {
        "child" => Axis::Child,
        "attribute" => Axis::Attribute,
        "descendant-or-self" => Axis::DescendantOrSelf,
        other => Axis::Other(other.to_string()),
    })
    .parse(input)
}

fn predicate(input: &str) -> IResult<&str, Expr> {
    delimited(ws(char('[')), or_expr, ws(char(']'))).parse(input)
}

fn step(input: &str) -> IResult<&str, ParsedStep> {
    let (i, (axis, test)) = alt((
        map(preceded(char('@'), name_test), |test| (Axis::Attribute, test)),
        map(pair(opt(axis), name_test), |(axis, test)| {
            (axis.unwrap_or(Axis::Child), test)
        }),
    ))
    .parse(input)?;
    let (i, predicates) = many0(predicate).parse(i)?;
    Ok((
        i,
        ParsedStep {
            axis,
            test,
            predicates,
        },
    ))
}

fn separator(input: &str) -> IResult<&str, &str> {
    alt((tag("//"), tag("/"))).parse(input)
}

fn location_path(input: &str) -> IResult<&str, ParsedPath> {
    let (i, lead) = opt(separator).parse(input)?;
    let (i, first) = step(i)?;
    let (i, rest) = many0(pair(separator, step)).parse(i)?;

    let mut steps = Vec::with_capacity(rest.len() + 2);
    if lead == Some("//") {
        steps.push(ParsedStep::descendant_or_self());
    }
    steps.push(first);
    for (sep, next) in rest {
        if sep == "//" {
            steps.push(ParsedStep::descendant_or_self());
        }
        steps.push(next);
    }

    Ok((
        i,
        ParsedPath {
            rooted: lead.is_some(),
            steps,
            ends_star_star: false,
        },
    ))
}

// --- Predicate Expression Parsers (in order of precedence) ---

fn or_expr(input: &str) -> IResult<&str, Expr> {
    let (i, first) = and_expr(input)?;
    let (i, rest) = many0(preceded(ws(tag("or")), and_expr)).parse(i)?;
    Ok((i, fold_binary(first, rest, Expr::Or)))
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    let (i, first) = comparison(input)?;
    let (i, rest) = many0(preceded(ws(tag("and")), comparison)).parse(i)?;
    Ok((i, fold_binary(first, rest, Expr::And)))
}

fn compare_op(input: &str) -> IResult<&str, CompareOp> {
    alt((
        map(tag("!="), |_| CompareOp::NotEquals),
        map(tag("<="), |_| CompareOp::LessThanOrEqual),
        map(tag("&lt;="), |_| CompareOp::LessThanOrEqual),
        map(tag(">="), |_| CompareOp::GreaterThanOrEqual),
        map(tag("&gt;="), |_| CompareOp::GreaterThanOrEqual),
        map(tag("="), |_| CompareOp::Equals),
        map(tag("<"), |_| CompareOp::LessThan),
        map(tag("&lt;"), |_| CompareOp::LessThan),
        map(tag(">"), |_| CompareOp::GreaterThan),
        map(tag("&gt;"), |_| CompareOp::GreaterThan),
    ))
    .parse(input)
}

fn comparison(input: &str) -> IResult<&str, Expr> {
    let (i, lhs) = primary(input)?;
    let (i, rhs) = opt(pair(ws(compare_op), primary)).parse(i)?;
    let expr = match rhs {
        Some((op, rhs)) => Expr::Compare {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(rhs),
        },
        None => lhs,
    };
    Ok((i, expr))
}

fn text_call(input: &str) -> IResult<&str, Expr> {
    map(pair(tag("text"), pair(ws(char('(')), char(')'))), |_| Expr::Text).parse(input)
}

fn position_call(input: &str) -> IResult<&str, Expr> {
    map(pair(tag("position"), pair(ws(char('(')), char(')'))), |_| {
        Expr::Position
    })
    .parse(input)
}

fn primary(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        delimited(char('('), or_expr, ws(char(')'))),
        map(
            delimited(pair(tag("not"), ws(char('('))), or_expr, ws(char(')'))),
            |inner| Expr::Not(Box::new(inner)),
        ),
        text_call,
        position_call,
        map(preceded(tag("self::"), q_name), |name: &str| {
            Expr::SelfName(name.to_string())
        }),
        map(preceded(char('@'), q_name), |name: &str| {
            Expr::Attribute(name.to_string())
        }),
        map(double, Expr::Number),
        map(string_literal, Expr::Literal),
    )))
    .parse(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        alt((
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
        )),
        |s: &str| s.to_string(),
    )
    .parse(input)
}
