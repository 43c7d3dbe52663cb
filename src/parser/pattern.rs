//! Node/relationship/path pattern grammar, grounded on the teacher's
//! `open_cypher_parser::path_pattern`, plus the `shortestPath`/
//! `allShortestPaths` wrapper supplemented from the C original (SPEC_FULL
//! §10).

use nom::{
    branch::alt,
    combinator::{map, opt},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, separated_pair},
    Parser,
};

use crate::ast::{NodePattern, Path, PathElement, PathKind, RelPattern, VarLenRange};

use super::common::{identifier, integer_literal, kw, symbol, PResult};
use super::expr::parse_expression;

fn sp(input: &str) -> usize {
    input.len()
}

fn parse_properties(input: &str) -> PResult<'_, Vec<(String, crate::ast::Expression)>> {
    let entry = separated_pair(identifier, symbol(":"), parse_expression);
    delimited(symbol("{"), separated_list0(symbol(","), entry), symbol("}")).parse(input)
}

fn parse_labels(input: &str) -> PResult<'_, Vec<String>> {
    many0(preceded(symbol(":"), identifier)).parse(input)
}

fn parse_node_pattern(input: &str) -> PResult<'_, NodePattern> {
    let start = sp(input);
    let (input, (variable, labels, properties)) = delimited(
        symbol("("),
        (opt(identifier), parse_labels, opt(parse_properties)),
        symbol(")"),
    )
    .parse(input)?;
    Ok((input, NodePattern { span: start, variable, labels, properties }))
}

/// `*`, `*3`, `*1..5`, `*..5`, `*3..` — all treated as a bounded range with
/// an implicit minimum of 1 and maximum of 100 when a side is omitted,
/// matching the AST invariant in spec §3 ("unbounded ⇒ clamp to 100").
fn parse_varlen(input: &str) -> PResult<'_, VarLenRange> {
    let (input, _) = symbol("*").parse(input)?;
    let (input, range) = opt(alt((
        map(separated_pair(opt(integer_literal), symbol(".."), opt(integer_literal)), |(min, max)| {
            (min.unwrap_or(1) as u32, max.unwrap_or(100) as u32)
        }),
        map(integer_literal, |n| (n as u32, n as u32)),
    )))
    .parse(input)?;
    let (min, max) = range.unwrap_or((1, 100));
    Ok((input, VarLenRange { min, max }))
}

fn parse_rel_body(input: &str) -> PResult<'_, RelPattern> {
    let start = sp(input);
    let types = |i| preceded(symbol(":"), separated_list1(symbol("|"), identifier)).parse(i);
    let (input, inner) = opt(delimited(
        symbol("["),
        (opt(identifier), opt(types), opt(parse_varlen), opt(parse_properties)),
        symbol("]"),
    ))
    .parse(input)?;
    let (variable, types, varlen, properties) = inner.unwrap_or((None, None, None, None));
    Ok((
        input,
        RelPattern {
            span: start,
            variable,
            types: types.unwrap_or_default(),
            properties,
            left_arrow: false,
            right_arrow: false,
            varlen,
        },
    ))
}

/// `-->`, `<--`, `--`, `-[...]->`, `<-[...]-`, `-[...]-`.
fn parse_rel_pattern(input: &str) -> PResult<'_, RelPattern> {
    let (input, left_arrow) = map(opt(symbol("<")), |o| o.is_some()).parse(input)?;
    let (input, _) = symbol("-").parse(input)?;
    let (input, mut rel) = parse_rel_body(input)?;
    let (input, _) = symbol("-").parse(input)?;
    let (input, right_arrow) = map(opt(symbol(">")), |o| o.is_some()).parse(input)?;
    rel.left_arrow = left_arrow;
    rel.right_arrow = right_arrow;
    Ok((input, rel))
}

fn parse_bare_path(input: &str) -> PResult<'_, Path> {
    let start = sp(input);
    let (input, first) = parse_node_pattern(input)?;
    let (input, rest) = many0(pair(parse_rel_pattern, parse_node_pattern)).parse(input)?;
    let mut elements = vec![PathElement::Node(first)];
    for (rel, node) in rest {
        elements.push(PathElement::Rel(rel));
        elements.push(PathElement::Node(node));
    }
    Ok((input, Path { span: start, variable: None, elements, kind: PathKind::Normal }))
}

/// `p = (a)-[:T]->(b)`, `shortestPath((a)-[*]-(b))`, `allShortestPaths(...)`,
/// or a bare pattern with no variable binding.
pub fn parse_path(input: &str) -> PResult<'_, Path> {
    let start = sp(input);
    alt((
        map(preceded(kw("shortestpath"), delimited(symbol("("), parse_bare_path, symbol(")"))), move |mut p| {
            p.kind = PathKind::Shortest;
            p.span = start;
            p
        }),
        map(preceded(kw("allshortestpaths"), delimited(symbol("("), parse_bare_path, symbol(")"))), move |mut p| {
            p.kind = PathKind::AllShortest;
            p.span = start;
            p
        }),
        map(pair(opt(pair(identifier, symbol("="))), parse_bare_path), |(binding, mut p)| {
            p.variable = binding.map(|(name, _)| name);
            p
        }),
    ))
    .parse(input)
}

pub fn parse_pattern_list(input: &str) -> PResult<'_, Vec<Path>> {
    separated_list1(symbol(","), parse_path).parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_node_pattern() {
        let (rest, node) = parse_node_pattern("(n:Person {name: 'Alice'})").unwrap();
        assert!(rest.is_empty());
        assert_eq!(node.variable.as_deref(), Some("n"));
        assert_eq!(node.labels, vec!["Person".to_string()]);
        assert!(node.properties.is_some());
    }

    #[test]
    fn parses_directed_relationship_with_varlen() {
        let (rest, path) = parse_path("(a)-[:KNOWS*1..3]->(b)").unwrap();
        assert!(rest.is_empty());
        assert_eq!(path.elements.len(), 3);
        match &path.elements[1] {
            PathElement::Rel(r) => {
                assert!(r.right_arrow && !r.left_arrow);
                assert_eq!(r.varlen, Some(VarLenRange { min: 1, max: 3 }));
            }
            _ => panic!("expected relationship element"),
        }
    }

    #[test]
    fn parses_shortest_path_wrapper() {
        let (rest, path) = parse_path("shortestPath((a)-[*]-(b))").unwrap();
        assert!(rest.is_empty());
        assert_eq!(path.kind, PathKind::Shortest);
    }
}
