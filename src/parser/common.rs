//! Whitespace, identifiers, and literal tokens shared across the parser
//! (grounded on the teacher's `open_cypher_parser::common`, adapted to an
//! owned-`String` AST instead of borrowed slices).

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{map, opt, recognize},
    sequence::{delimited, pair},
    IResult, Parser,
};

use super::errors::ParseErr;

pub type PResult<'a, O> = IResult<&'a str, O, ParseErr<'a>>;

/// Whitespace-handling combinator: runs `inner`, trimming surrounding
/// whitespace, matching every call site's expectation that tokens may be
/// separated by arbitrary space/newlines.
pub fn ws<'a, O>(inner: impl Parser<&'a str, Output = O, Error = ParseErr<'a>>) -> impl Parser<&'a str, Output = O, Error = ParseErr<'a>> {
    delimited(multispace0, inner, multispace0)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// `[A-Za-z_][A-Za-z0-9_]*`, plus backtick-quoted identifiers for names
/// that collide with keywords or contain characters outside that set.
pub fn identifier(input: &str) -> PResult<'_, String> {
    ws(alt((
        map(
            recognize(pair(
                nom::combinator::verify(nom::character::complete::anychar, |c: &char| is_ident_start(*c)),
                take_while(is_ident_continue),
            )),
            str::to_string,
        ),
        map(delimited(char('`'), take_while1(|c| c != '`'), char('`')), str::to_string),
    )))
    .parse(input)
}

/// A single-quoted Cypher string literal, honoring `''` and `\'` escapes.
pub fn quoted_string(input: &str) -> PResult<'_, String> {
    let (input, _) = char('\'').parse(input)?;
    let mut out = String::new();
    let mut rest = input;
    loop {
        match rest.chars().next() {
            None => {
                return Err(nom::Err::Error(ParseErr { input: rest, message: "unterminated string literal".into() }))
            }
            Some('\'') => {
                let after = &rest[1..];
                if after.starts_with('\'') {
                    out.push('\'');
                    rest = &after[1..];
                } else {
                    return Ok((after, out));
                }
            }
            Some('\\') => {
                let after = &rest[1..];
                match after.chars().next() {
                    Some('n') => {
                        out.push('\n');
                        rest = &after[1..];
                    }
                    Some('t') => {
                        out.push('\t');
                        rest = &after[1..];
                    }
                    Some(c) => {
                        out.push(c);
                        rest = &after[c.len_utf8()..];
                    }
                    None => return Err(nom::Err::Error(ParseErr { input: after, message: "unterminated escape".into() })),
                }
            }
            Some(c) => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
}

pub fn integer_literal(input: &str) -> PResult<'_, i64> {
    map(
        recognize(pair(opt(char('-')), digit1)),
        |s: &str| s.parse::<i64>().unwrap_or(0),
    )
    .parse(input)
}

pub fn decimal_literal(input: &str) -> PResult<'_, f64> {
    map(
        recognize((opt(char('-')), digit1, char('.'), digit1)),
        |s: &str| s.parse::<f64>().unwrap_or(0.0),
    )
    .parse(input)
}

pub fn boolean_literal(input: &str) -> PResult<'_, bool> {
    alt((
        map(tag_no_case_kw("true"), |_| true),
        map(tag_no_case_kw("false"), |_| false),
    ))
    .parse(input)
}

/// Case-insensitive keyword match that does not also swallow a longer
/// identifier sharing the keyword as a prefix (`tag_no_case("and")` would
/// otherwise also match the start of `android`).
pub fn tag_no_case_kw<'a>(kw: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = ParseErr<'a>> {
    move |input: &'a str| {
        let (rest, matched) = nom::bytes::complete::tag_no_case(kw).parse(input)?;
        if rest.chars().next().map(is_ident_continue).unwrap_or(false) {
            return Err(nom::Err::Error(ParseErr { input, message: format!("expected keyword '{kw}'") }));
        }
        Ok((rest, matched))
    }
}

pub fn kw<'a>(kw_str: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = ParseErr<'a>> {
    ws(tag_no_case_kw(kw_str))
}

pub fn symbol<'a>(s: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = ParseErr<'a>> {
    ws(tag(s))
}
