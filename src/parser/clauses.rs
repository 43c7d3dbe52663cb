//! Clause grammar: MATCH, CREATE, MERGE, SET, REMOVE, DELETE, RETURN, WITH,
//! UNWIND, FOREACH, LOAD CSV, USE, standalone CALL (spec §4.7, SPEC_FULL
//! §10), grounded on the teacher's per-clause parser modules.

use nom::{
    branch::alt,
    combinator::{map, opt},
    multi::{many0, many1, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, separated_pair},
    Parser,
};

use crate::ast::{
    Clause, Create, Delete, Foreach, LoadCsv, Match, Merge, OrderByItem, Query, Remove, RemoveItem,
    Return, ReturnItem, Set, SetItem, StandaloneProcedureCall, Union, Unwind, With,
};

use super::common::{identifier, integer_literal, kw, quoted_string, symbol, PResult};
use super::expr::parse_expression;
use super::pattern::parse_pattern_list;

fn sp(input: &str) -> usize {
    input.len()
}

fn parse_set_item(input: &str) -> PResult<'_, SetItem> {
    alt((
        map(separated_pair(identifier, symbol(":"), identifier), |(variable, label)| SetItem::Label { variable, label }),
        map(separated_pair(parse_expression, symbol("="), parse_expression), |(target, value)| SetItem::Property { target, value }),
        map(separated_pair(parse_expression, symbol("+="), parse_expression), |(target, value)| SetItem::Property { target, value }),
    ))
    .parse(input)
}

fn parse_set_items(input: &str) -> PResult<'_, Vec<SetItem>> {
    separated_list1(symbol(","), parse_set_item).parse(input)
}

fn parse_match(input: &str) -> PResult<'_, Match> {
    let start = sp(input);
    let (input, optional) = map(opt(kw("optional")), |o| o.is_some()).parse(input)?;
    let (input, _) = kw("match").parse(input)?;
    let (input, patterns) = parse_pattern_list(input)?;
    let (input, where_expr) = opt(preceded(kw("where"), parse_expression)).parse(input)?;
    Ok((input, Match { span: start, patterns, where_expr, optional, from_graph: None }))
}

fn parse_create(input: &str) -> PResult<'_, Create> {
    let start = sp(input);
    let (input, _) = kw("create").parse(input)?;
    let (input, patterns) = parse_pattern_list(input)?;
    Ok((input, Create { span: start, patterns }))
}

fn parse_merge(input: &str) -> PResult<'_, Merge> {
    let start = sp(input);
    let (input, _) = kw("merge").parse(input)?;
    let (input, pattern) = super::pattern::parse_path(input)?;
    let on_create_or_match = pair(
        preceded(kw("on"), alt((map(kw("create"), |_| true), map(kw("match"), |_| false)))),
        preceded(kw("set"), parse_set_items),
    );
    let (input, clauses) = many0(on_create_or_match).parse(input)?;
    let mut on_create = None;
    let mut on_match = None;
    for (is_create, items) in clauses {
        if is_create {
            on_create = Some(items);
        } else {
            on_match = Some(items);
        }
    }
    Ok((input, Merge { span: start, pattern, on_create, on_match }))
}

fn parse_set(input: &str) -> PResult<'_, Set> {
    let start = sp(input);
    let (input, _) = kw("set").parse(input)?;
    let (input, items) = parse_set_items(input)?;
    Ok((input, Set { span: start, items }))
}

/// REMOVE n:Label vs REMOVE n.prop are distinguished by the token after
/// the variable: `:` introduces a label, `.` a property.
fn parse_remove_item(input: &str) -> PResult<'_, RemoveItem> {
    let (input, variable) = identifier(input)?;
    alt((
        map(preceded(symbol(":"), identifier), {
            let variable = variable.clone();
            move |label| RemoveItem::Label { variable: variable.clone(), label }
        }),
        map(preceded(symbol("."), identifier), move |property| RemoveItem::Property { variable: variable.clone(), property }),
    ))
    .parse(input)
}

fn parse_remove(input: &str) -> PResult<'_, Remove> {
    let start = sp(input);
    let (input, _) = kw("remove").parse(input)?;
    let (input, items) = separated_list1(symbol(","), parse_remove_item).parse(input)?;
    Ok((input, Remove { span: start, items }))
}

fn parse_delete(input: &str) -> PResult<'_, Delete> {
    let start = sp(input);
    let (input, detach) = map(opt(kw("detach")), |o| o.is_some()).parse(input)?;
    let (input, _) = kw("delete").parse(input)?;
    let (input, items) = separated_list1(symbol(","), parse_expression).parse(input)?;
    Ok((input, Delete { span: start, items, detach }))
}

/// Captures the exact source text an expression was parsed from via
/// `consumed`, used as the default column alias when no `AS` is given
/// (SPEC_FULL §10): `RETURN n.name` auto-aliases to `n.name`, matching the
/// original implementation's ORIGINAL_TEXT preservation.
fn parse_return_item(input: &str) -> PResult<'_, ReturnItem> {
    let (input, (text, expression)) = nom::combinator::consumed(parse_expression).parse(input)?;
    let (input, alias) = opt(preceded(kw("as"), identifier)).parse(input)?;
    Ok((input, ReturnItem { expression, alias, original_text: Some(text.trim().to_string()) }))
}

fn parse_order_by(input: &str) -> PResult<'_, Vec<OrderByItem>> {
    let item = map(pair(parse_expression, opt(alt((kw("desc"), kw("descending"), kw("asc"), kw("ascending"))))), |(expression, dir)| {
        let descending = matches!(dir.map(str::to_lowercase).as_deref(), Some("desc") | Some("descending"));
        OrderByItem { expression, descending }
    });
    preceded(pair(kw("order"), kw("by")), separated_list1(symbol(","), item)).parse(input)
}

fn parse_skip_limit(input: &str) -> PResult<'_, (Option<i64>, Option<i64>)> {
    let (input, skip) = opt(preceded(kw("skip"), integer_literal)).parse(input)?;
    let (input, limit) = opt(preceded(kw("limit"), integer_literal)).parse(input)?;
    Ok((input, (skip, limit)))
}

fn parse_return(input: &str) -> PResult<'_, Return> {
    let start = sp(input);
    let (input, _) = kw("return").parse(input)?;
    let (input, distinct) = map(opt(kw("distinct")), |o| o.is_some()).parse(input)?;
    let (input, items) = separated_list1(symbol(","), parse_return_item).parse(input)?;
    let (input, order_by) = opt(parse_order_by).parse(input)?;
    let (input, (skip, limit)) = parse_skip_limit(input)?;
    Ok((input, Return { span: start, items, distinct, order_by: order_by.unwrap_or_default(), skip, limit }))
}

fn parse_with(input: &str) -> PResult<'_, With> {
    let start = sp(input);
    let (input, _) = kw("with").parse(input)?;
    let (input, distinct) = map(opt(kw("distinct")), |o| o.is_some()).parse(input)?;
    let (input, items) = separated_list1(symbol(","), parse_return_item).parse(input)?;
    let (input, order_by) = opt(parse_order_by).parse(input)?;
    let (input, (skip, limit)) = parse_skip_limit(input)?;
    let (input, where_expr) = opt(preceded(kw("where"), parse_expression)).parse(input)?;
    Ok((input, With { span: start, items, distinct, order_by: order_by.unwrap_or_default(), skip, limit, where_expr }))
}

fn parse_unwind(input: &str) -> PResult<'_, Unwind> {
    let start = sp(input);
    let (input, _) = kw("unwind").parse(input)?;
    let (input, expression) = parse_expression(input)?;
    let (input, alias) = preceded(kw("as"), identifier).parse(input)?;
    Ok((input, Unwind { span: start, expression, alias }))
}

fn parse_foreach(input: &str) -> PResult<'_, Foreach> {
    let start = sp(input);
    let (input, _) = kw("foreach").parse(input)?;
    let (input, (variable, list)) =
        delimited(symbol("("), pair(identifier, preceded(kw("in"), parse_expression)), symbol("|")).parse(input)?;
    let (input, body) = many1(parse_clause).parse(input)?;
    let (input, _) = symbol(")").parse(input)?;
    Ok((input, Foreach { span: start, variable, list, body }))
}

fn parse_load_csv(input: &str) -> PResult<'_, LoadCsv> {
    let start = sp(input);
    let (input, _) = kw("load").parse(input)?;
    let (input, _) = kw("csv").parse(input)?;
    let (input, with_headers) = map(opt(pair(kw("with"), kw("headers"))), |o| o.is_some()).parse(input)?;
    let (input, _) = kw("from").parse(input)?;
    let (input, file_path) = quoted_string(input)?;
    let (input, _) = kw("as").parse(input)?;
    let (input, variable) = identifier(input)?;
    Ok((input, LoadCsv { span: start, file_path, variable, with_headers }))
}

fn parse_use(input: &str) -> PResult<'_, String> {
    preceded(kw("use"), identifier).parse(input)
}

pub fn parse_clause(input: &str) -> PResult<'_, Clause> {
    alt((
        map(parse_match, Clause::Match),
        map(parse_create, Clause::Create),
        map(parse_merge, Clause::Merge),
        map(parse_set, Clause::Set),
        map(parse_remove, Clause::Remove),
        map(parse_delete, Clause::Delete),
        map(parse_with, Clause::With),
        map(parse_return, Clause::Return),
        map(parse_unwind, Clause::Unwind),
        map(parse_foreach, Clause::Foreach),
        map(parse_load_csv, Clause::LoadCsv),
        map(parse_use, Clause::Use),
    ))
    .parse(input)
}

fn parse_union(input: &str) -> PResult<'_, Union> {
    let start = sp(input);
    let (input, _) = kw("union").parse(input)?;
    let (input, all) = map(opt(kw("all")), |o| o.is_some()).parse(input)?;
    let (input, right) = parse_query(input)?;
    Ok((input, Union { span: start, all, right }))
}

pub fn parse_query(input: &str) -> PResult<'_, Query> {
    let start = sp(input);
    let (input, use_clause) = opt(parse_use).parse(input)?;
    let (input, clauses) = many1(parse_clause).parse(input)?;
    let (input, union) = opt(parse_union).parse(input)?;
    Ok((input, Query { span: start, use_clause, clauses, union: union.map(Box::new) }))
}

/// A bare `CALL proc.name(args) [YIELD a, b]` with no surrounding query
/// (SPEC_FULL §10).
pub fn parse_standalone_call(input: &str) -> PResult<'_, StandaloneProcedureCall> {
    let start = sp(input);
    let (input, _) = kw("call").parse(input)?;
    let (input, procedure_name) = separated_list1(symbol("."), identifier).parse(input)?;
    let (input, arguments) =
        delimited(symbol("("), separated_list0(symbol(","), parse_expression), symbol(")")).parse(input)?;
    let (input, yield_items) = opt(preceded(kw("yield"), separated_list1(symbol(","), identifier))).parse(input)?;
    Ok((
        input,
        StandaloneProcedureCall { span: start, procedure_name: procedure_name.join("."), arguments, yield_items },
    ))
}
