//! Target expression parser
//!
//! Parses textual targets like `summarize(scale(foo.bar,2),'1min','avg')`
//! into an [`Expr`] tree.
//!
//! # Grammar
//!
//! ```text
//! expr   := const | string | name-or-call
//! const  := [+-]? digits ('.' digits)? ([eE][+-]?digits)?
//! string := '"' chars-not-" '"' | '\'' chars-not-' '\''
//! name-or-call := name ( '(' arglist ')' )?
//! arglist := expr ((',' | ' ') expr)*
//! name   := chars from {A-Z a-z 0-9 . _ - * ? : [ ]}, plus balanced braces
//!           with commas allowed inside them
//! ```
//!
//! Name scanning tracks brace depth so brace-expansion selectors such as
//! `prefix.{a,b}.suffix` parse as one name: commas and a closing brace at
//! depth zero terminate the name, inside braces they belong to it.
//!
//! Every failure carries a taxonomy tag and the input tail starting at the
//! offending byte. No panics, no exceptions for control flow.

use nom::bytes::complete::take_while1;
use nom::error::ParseError as NomParseError;
use nom::{IResult, Parser};

use crate::ast::Expr;
use crate::error::{ErrorKind, ParseError};

type PResult<'a, O> = IResult<&'a str, O, ParseError<'a>>;

impl<'a> NomParseError<&'a str> for ParseError<'a> {
    fn from_error_kind(input: &'a str, _kind: nom::error::ErrorKind) -> Self {
        ParseError {
            kind: ErrorKind::UnexpectedCharacter,
            remainder: input,
        }
    }

    fn append(_input: &'a str, _kind: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

/// Parse a target expression, returning the tree and the unconsumed tail.
///
/// Leading spaces are skipped. Callers expect an empty tail at the top
/// level; a non-empty tail means trailing garbage.
///
/// # Example
///
/// ```rust
/// use graphfn::parser::parse;
/// use graphfn::ast::Expr;
///
/// let (expr, rest) = parse("scale(foo.bar,2)").unwrap();
/// assert!(rest.is_empty());
/// match expr {
///     Expr::Func { target, args, arg_string } => {
///         assert_eq!(target, "scale");
///         assert_eq!(args.len(), 2);
///         assert_eq!(arg_string, "foo.bar,2");
///     }
///     _ => panic!("expected a function call"),
/// }
/// ```
pub fn parse(input: &str) -> Result<(Expr, &str), ParseError<'_>> {
    match expression(input) {
        Ok((rest, expr)) => Ok((expr, rest)),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(e),
        Err(nom::Err::Incomplete(_)) => Err(ParseError {
            kind: ErrorKind::MissingExpr,
            remainder: "",
        }),
    }
}

/// Characters allowed in a metric name outside of braces
pub(crate) fn is_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c, b'.' | b'_' | b'-' | b'*' | b'?' | b':' | b'[' | b']')
}

fn is_const_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e' | 'E')
}

fn fail<O>(kind: ErrorKind, remainder: &str) -> PResult<'_, O> {
    Err(nom::Err::Error(ParseError { kind, remainder }))
}

fn expression(input: &str) -> PResult<'_, Expr> {
    let input = input.trim_start_matches(' ');

    let Some(&first) = input.as_bytes().first() else {
        return fail(ErrorKind::MissingExpr, input);
    };

    match first {
        b'0'..=b'9' | b'-' | b'+' => number(input),
        b'\'' | b'"' => quoted(input),
        _ => name_or_call(input),
    }
}

/// Slurp every byte that could belong to a float literal and let the float
/// parser decide whether they add up to one.
fn number(input: &str) -> PResult<'_, Expr> {
    let (rest, literal) = take_while1(is_const_char).parse(input)?;

    match literal.parse::<f64>() {
        Ok(val) => Ok((rest, Expr::Const { val })),
        Err(_) => fail(ErrorKind::UnexpectedCharacter, input),
    }
}

fn quoted(input: &str) -> PResult<'_, Expr> {
    let quote = input.as_bytes()[0] as char;
    let body = &input[1..];

    match body.find(quote) {
        Some(end) => Ok((
            &body[end + 1..],
            Expr::Str {
                val: body[..end].to_string(),
            },
        )),
        None => fail(ErrorKind::MissingQuote, body),
    }
}

/// Scan a name, tracking brace depth so commas inside `{a,b}` groups stay
/// part of the name.
fn name_token(input: &str) -> (&str, &str) {
    let bytes = input.as_bytes();
    let mut braces = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if is_name_char(c) {
            i += 1;
            continue;
        }
        match c {
            b'{' => braces += 1,
            b'}' => {
                if braces == 0 {
                    break;
                }
                braces -= 1;
            }
            b',' => {
                if braces == 0 {
                    break;
                }
            }
            _ => break,
        }
        i += 1;
    }

    (&input[i..], &input[..i])
}

fn name_or_call(input: &str) -> PResult<'_, Expr> {
    let (rest, name) = name_token(input);

    if name.is_empty() {
        return fail(ErrorKind::MissingArgument, rest);
    }

    if rest.as_bytes().first() == Some(&b'(') {
        let (rest, (arg_string, args)) = arg_list(rest)?;
        return Ok((
            rest,
            Expr::Func {
                target: name.to_string(),
                args,
                arg_string,
            },
        ));
    }

    Ok((
        rest,
        Expr::Name {
            target: name.to_string(),
        },
    ))
}

/// Parse `(expr, expr, ...)`; `input` starts at the opening parenthesis.
///
/// Returns the verbatim text between the parentheses alongside the parsed
/// arguments.
fn arg_list(input: &str) -> PResult<'_, (String, Vec<Expr>)> {
    let body = &input[1..];
    let mut rest = body;
    let mut args = Vec::new();

    loop {
        let (next, arg) = expression(rest)?;
        args.push(arg);
        rest = next;

        let Some(&c) = rest.as_bytes().first() else {
            return fail(ErrorKind::MissingComma, rest);
        };

        if c == b')' {
            let consumed = body.len() - rest.len();
            return Ok((&rest[1..], (body[..consumed].to_string(), args)));
        }

        if c != b',' && c != b' ' {
            return fail(ErrorKind::UnexpectedCharacter, rest);
        }

        rest = &rest[1..];
    }
}
