//! Expression grammar: precedence-climbing recursive descent, grounded on
//! the teacher's `open_cypher_parser::expression` but built directly
//! against `crate::ast::Expression` (owned tree, no lifetime parameter).

use nom::{
    branch::alt,
    combinator::{map, opt},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, separated_pair},
    Parser,
};

use crate::ast::{
    BinaryOperator, Expression, ExistsForm, Literal, ListPredicateKind, MapProjectionItem, WhenClause,
};

use super::common::{
    boolean_literal, decimal_literal, identifier, integer_literal, kw, quoted_string, symbol, PResult,
};
use super::pattern::parse_path;

fn sp(input: &str) -> usize {
    input.len()
}

/// Builds a `Span` from the byte length remaining when this node started;
/// combined with the total query length by the caller's `total_len -
/// start_len` at the point of use. Expression nodes record the remaining
/// length directly — callers needing an absolute offset subtract it from
/// the original query's length (`TransformCtx`/diagnostics never do, per
/// spec §7, so the raw remaining-length marker is sufficient here).
fn mk_span(start_len: usize) -> usize {
    start_len
}

pub fn parse_expression(input: &str) -> PResult<'_, Expression> {
    parse_or(input)
}

fn parse_or(input: &str) -> PResult<'_, Expression> {
    let start = sp(input);
    let (input, first) = parse_xor(input)?;
    let (input, rest) = many0(preceded(kw("or"), parse_xor)).parse(input)?;
    Ok((input, fold_binary(first, rest, BinaryOperator::Or, mk_span(start))))
}

fn parse_xor(input: &str) -> PResult<'_, Expression> {
    let start = sp(input);
    let (input, first) = parse_and(input)?;
    let (input, rest) = many0(preceded(kw("xor"), parse_and)).parse(input)?;
    Ok((input, fold_binary(first, rest, BinaryOperator::Xor, mk_span(start))))
}

fn parse_and(input: &str) -> PResult<'_, Expression> {
    let start = sp(input);
    let (input, first) = parse_not(input)?;
    let (input, rest) = many0(preceded(kw("and"), parse_not)).parse(input)?;
    Ok((input, fold_binary(first, rest, BinaryOperator::And, mk_span(start))))
}

fn parse_not(input: &str) -> PResult<'_, Expression> {
    let start = sp(input);
    let (input, nots) = many0(kw("not")).parse(input)?;
    let (input, inner) = parse_comparison(input)?;
    let span = mk_span(start);
    let expr = nots.iter().fold(inner, |e, _| Expression::NotExpr { span, expr: Box::new(e) });
    Ok((input, expr))
}

fn comparison_op(input: &str) -> PResult<'_, BinaryOperator> {
    alt((
        map(symbol("<>"), |_| BinaryOperator::Neq),
        map(symbol("!="), |_| BinaryOperator::Neq),
        map(symbol("<="), |_| BinaryOperator::Lte),
        map(symbol(">="), |_| BinaryOperator::Gte),
        map(symbol("="), |_| BinaryOperator::Eq),
        map(symbol("<"), |_| BinaryOperator::Lt),
        map(symbol(">"), |_| BinaryOperator::Gt),
        map((kw("starts"), kw("with")), |_| BinaryOperator::StartsWith),
        map((kw("ends"), kw("with")), |_| BinaryOperator::EndsWith),
        map(kw("contains"), |_| BinaryOperator::Contains),
        map(kw("in"), |_| BinaryOperator::In),
        map(symbol("=~"), |_| BinaryOperator::RegexMatch),
    ))
    .parse(input)
}

fn parse_comparison(input: &str) -> PResult<'_, Expression> {
    let start = sp(input);
    let (input, left) = parse_additive(input)?;
    let (input, tail) = opt(pair(comparison_op, parse_additive)).parse(input)?;
    Ok((
        input,
        match tail {
            Some((op, right)) => Expression::BinaryOp { span: mk_span(start), op, left: Box::new(left), right: Box::new(right) },
            None => left,
        },
    ))
}

fn parse_additive(input: &str) -> PResult<'_, Expression> {
    let start = sp(input);
    let (input, first) = parse_multiplicative(input)?;
    let (input, rest) = many0(pair(
        alt((map(symbol("+"), |_| BinaryOperator::Add), map(symbol("-"), |_| BinaryOperator::Sub))),
        parse_multiplicative,
    ))
    .parse(input)?;
    Ok((input, fold_binary_ops(first, rest, mk_span(start))))
}

fn parse_multiplicative(input: &str) -> PResult<'_, Expression> {
    let start = sp(input);
    let (input, first) = parse_power(input)?;
    let (input, rest) = many0(pair(
        alt((
            map(symbol("*"), |_| BinaryOperator::Mul),
            map(symbol("/"), |_| BinaryOperator::Div),
            map(symbol("%"), |_| BinaryOperator::Mod),
        )),
        parse_power,
    ))
    .parse(input)?;
    Ok((input, fold_binary_ops(first, rest, mk_span(start))))
}

fn parse_power(input: &str) -> PResult<'_, Expression> {
    let start = sp(input);
    let (input, base) = parse_unary(input)?;
    let (input, exp) = opt(preceded(symbol("^"), parse_unary)).parse(input)?;
    Ok((
        input,
        match exp {
            Some(e) => Expression::BinaryOp { span: mk_span(start), op: BinaryOperator::Pow, left: Box::new(base), right: Box::new(e) },
            None => base,
        },
    ))
}

fn parse_unary(input: &str) -> PResult<'_, Expression> {
    let start = sp(input);
    let (input, neg) = opt(symbol("-")).parse(input)?;
    let (input, inner) = parse_postfix(input)?;
    Ok((
        input,
        match neg {
            Some(_) => Expression::BinaryOp {
                span: mk_span(start),
                op: BinaryOperator::Sub,
                left: Box::new(Expression::Literal { span: mk_span(start), value: Literal::Integer(0) }),
                right: Box::new(inner),
            },
            None => inner,
        },
    ))
}

enum Postfix {
    Property(String),
    Subscript(Expression),
    Label(String),
    NullCheck(bool),
}

fn parse_null_check(input: &str) -> PResult<'_, Postfix> {
    let (input, is_not) = alt((map(pair(kw("is"), kw("not")), |_| true), map(kw("is"), |_| false))).parse(input)?;
    let (input, _) = kw("null").parse(input)?;
    Ok((input, Postfix::NullCheck(is_not)))
}

fn parse_postfix_op(input: &str) -> PResult<'_, Postfix> {
    alt((
        map(preceded(symbol("."), identifier), Postfix::Property),
        map(delimited(symbol("["), parse_expression, symbol("]")), Postfix::Subscript),
        parse_null_check,
        map(preceded(symbol(":"), identifier), Postfix::Label),
    ))
    .parse(input)
}

fn parse_postfix(input: &str) -> PResult<'_, Expression> {
    let start = sp(input);
    let (input, mut expr) = parse_primary(input)?;
    let (input, ops) = many0(parse_postfix_op).parse(input)?;
    for op in ops {
        let span = mk_span(start);
        expr = match op {
            Postfix::Property(p) => Expression::Property { span, expr: Box::new(expr), property: p },
            Postfix::Subscript(idx) => Expression::Subscript { span, base: Box::new(expr), index: Box::new(idx) },
            Postfix::Label(l) => Expression::LabelExpr { span, expr: Box::new(expr), label: l },
            Postfix::NullCheck(is_not) => Expression::NullCheck { span, expr: Box::new(expr), is_not },
        };
    }
    Ok((input, expr))
}

fn fold_binary(first: Expression, rest: Vec<Expression>, op: BinaryOperator, span: usize) -> Expression {
    rest.into_iter().fold(first, |acc, next| Expression::BinaryOp { span, op, left: Box::new(acc), right: Box::new(next) })
}

fn fold_binary_ops(first: Expression, rest: Vec<(BinaryOperator, Expression)>, span: usize) -> Expression {
    rest.into_iter().fold(first, |acc, (op, next)| Expression::BinaryOp { span, op, left: Box::new(acc), right: Box::new(next) })
}

pub fn parse_parameter(input: &str) -> PResult<'_, Expression> {
    let start = sp(input);
    let (input, _) = symbol("$").parse(input)?;
    let (input, name) = opt(identifier).parse(input)?;
    Ok((input, Expression::Parameter { span: mk_span(start), name }))
}

fn parse_literal(input: &str) -> PResult<'_, Expression> {
    let start = sp(input);
    alt((
        map(kw("null"), move |_| Expression::Literal { span: mk_span(start), value: Literal::Null }),
        map(boolean_literal, move |b| Expression::Literal { span: mk_span(start), value: Literal::Boolean(b) }),
        map(decimal_literal, move |d| Expression::Literal { span: mk_span(start), value: Literal::Decimal(d) }),
        map(integer_literal, move |i| Expression::Literal { span: mk_span(start), value: Literal::Integer(i) }),
        map(quoted_string, move |s| Expression::Literal { span: mk_span(start), value: Literal::String(s) }),
    ))
    .parse(input)
}

fn parse_list_literal(input: &str) -> PResult<'_, Expression> {
    let start = sp(input);
    let (input, items) = delimited(symbol("["), separated_list0(symbol(","), parse_expression), symbol("]")).parse(input)?;
    Ok((input, Expression::List { span: mk_span(start), items }))
}

fn parse_map_literal(input: &str) -> PResult<'_, Expression> {
    let start = sp(input);
    let entry = separated_pair(identifier, symbol(":"), parse_expression);
    let (input, entries) = delimited(symbol("{"), separated_list0(symbol(","), entry), symbol("}")).parse(input)?;
    Ok((input, Expression::Map { span: mk_span(start), entries }))
}

fn parse_map_projection(input: &str) -> PResult<'_, Expression> {
    let start = sp(input);
    let (input, variable) = identifier(input)?;
    let item = alt((
        map(symbol(".*"), |_| MapProjectionItem::AllProperties),
        map(preceded(symbol("."), identifier), MapProjectionItem::Property),
        map(separated_pair(identifier, symbol(":"), parse_expression), |(alias, expression)| MapProjectionItem::Alias { alias, expression }),
    ));
    let (input, items) = delimited(symbol("{"), separated_list0(symbol(","), item), symbol("}")).parse(input)?;
    Ok((input, Expression::MapProjection { span: mk_span(start), variable, items }))
}

fn parse_case(input: &str) -> PResult<'_, Expression> {
    let start = sp(input);
    let (input, _) = kw("case").parse(input)?;
    let (input, simple_test) = opt(|i| {
        if kw("when").parse(i).is_ok() {
            return Err(nom::Err::Error(super::errors::ParseErr { input: i, message: "no simple-case test".into() }));
        }
        parse_expression(i)
    })
    .parse(input)?;
    let when_clause = (preceded(kw("when"), parse_expression), preceded(kw("then"), parse_expression));
    let (input, whens) = many0(when_clause).parse(input)?;
    let (input, else_expr) = opt(preceded(kw("else"), parse_expression)).parse(input)?;
    let (input, _) = kw("end").parse(input)?;

    let whens: Vec<WhenClause> = whens
        .into_iter()
        .map(|(cond, result)| match &simple_test {
            Some(test) => WhenClause {
                condition: Expression::BinaryOp {
                    span: mk_span(start),
                    op: BinaryOperator::Eq,
                    left: Box::new(test.clone()),
                    right: Box::new(cond),
                },
                result,
            },
            None => WhenClause { condition: cond, result },
        })
        .collect();

    Ok((input, Expression::Case { span: mk_span(start), whens, else_expr: else_expr.map(Box::new) }))
}

fn parse_exists(input: &str) -> PResult<'_, Expression> {
    let start = sp(input);
    let (input, _) = kw("exists").parse(input)?;
    let (input, form) = delimited(
        symbol("("),
        alt((
            map(parse_path, |p| ExistsForm::Pattern(Box::new(p))),
            map(parse_expression, |e| ExistsForm::Property(Box::new(e))),
        )),
        symbol(")"),
    )
    .parse(input)?;
    Ok((input, Expression::Exists { span: mk_span(start), form }))
}

fn list_predicate_kind(input: &str) -> PResult<'_, ListPredicateKind> {
    alt((
        map(kw("all"), |_| ListPredicateKind::All),
        map(kw("any"), |_| ListPredicateKind::Any),
        map(kw("none"), |_| ListPredicateKind::None),
        map(kw("single"), |_| ListPredicateKind::Single),
    ))
    .parse(input)
}

fn parse_list_predicate(input: &str) -> PResult<'_, Expression> {
    let start = sp(input);
    let (input, kind) = list_predicate_kind(input)?;
    let (input, (variable, list, predicate)) = delimited(
        symbol("("),
        (identifier, preceded(kw("in"), parse_expression), preceded(kw("where"), parse_expression)),
        symbol(")"),
    )
    .parse(input)?;
    Ok((
        input,
        Expression::ListPredicate { span: mk_span(start), kind, variable, list: Box::new(list), predicate: Box::new(predicate) },
    ))
}

fn parse_reduce(input: &str) -> PResult<'_, Expression> {
    let start = sp(input);
    let (input, _) = kw("reduce").parse(input)?;
    let (input, (accumulator, initial, variable, list, expr)) = delimited(
        symbol("("),
        (
            identifier,
            preceded(symbol("="), parse_expression),
            preceded(symbol(","), identifier),
            preceded(kw("in"), parse_expression),
            preceded(symbol("|"), parse_expression),
        ),
        symbol(")"),
    )
    .parse(input)?;
    Ok((
        input,
        Expression::Reduce {
            span: mk_span(start),
            accumulator,
            initial: Box::new(initial),
            variable,
            list: Box::new(list),
            expr: Box::new(expr),
        },
    ))
}

/// `[x IN list WHERE pred | transform]`; WHERE and the transform are both
/// optional, in either order's absence (but the transform always follows a
/// literal `|` when present).
fn parse_list_comprehension(input: &str) -> PResult<'_, Expression> {
    let start = sp(input);
    let (input, (variable, list)) =
        preceded(symbol("["), pair(identifier, preceded(kw("in"), parse_expression))).parse(input)?;
    let (input, where_expr) = opt(preceded(kw("where"), parse_expression)).parse(input)?;
    let (input, transform) = opt(preceded(symbol("|"), parse_expression)).parse(input)?;
    let (input, _) = symbol("]").parse(input)?;
    Ok((
        input,
        Expression::ListComprehension {
            span: mk_span(start),
            variable,
            list: Box::new(list),
            where_expr: where_expr.map(Box::new),
            transform: transform.map(Box::new),
        },
    ))
}

/// `[(pattern) WHERE pred | collect]`.
fn parse_pattern_comprehension(input: &str) -> PResult<'_, Expression> {
    let start = sp(input);
    let (input, _) = symbol("[").parse(input)?;
    let (input, pattern) = parse_path(input)?;
    let (input, where_expr) = opt(preceded(kw("where"), parse_expression)).parse(input)?;
    let (input, collect) = preceded(symbol("|"), parse_expression).parse(input)?;
    let (input, _) = symbol("]").parse(input)?;
    Ok((
        input,
        Expression::PatternComprehension {
            span: mk_span(start),
            pattern: Box::new(pattern),
            where_expr: where_expr.map(Box::new),
            collect: Box::new(collect),
        },
    ))
}

fn parse_function_call(input: &str) -> PResult<'_, Expression> {
    let start = sp(input);
    let (input, name) = identifier(input)?;
    let (input, _) = symbol("(").parse(input)?;
    let (input, distinct) = opt(kw("distinct")).parse(input)?;
    let (input, args) = alt((map(symbol("*"), |_| Vec::new()), separated_list0(symbol(","), parse_expression))).parse(input)?;
    let (input, _) = symbol(")").parse(input)?;
    Ok((input, Expression::FunctionCall { span: mk_span(start), name, args, distinct: distinct.is_some() }))
}

fn parse_identifier_expr(input: &str) -> PResult<'_, Expression> {
    let start = sp(input);
    let (input, name) = identifier(input)?;
    Ok((input, Expression::Identifier { span: mk_span(start), name }))
}

fn parse_primary(input: &str) -> PResult<'_, Expression> {
    alt((
        parse_literal,
        parse_parameter,
        parse_case,
        parse_exists,
        parse_reduce,
        parse_list_predicate,
        parse_pattern_comprehension,
        parse_list_comprehension,
        parse_list_literal,
        parse_map_projection,
        parse_map_literal,
        parse_function_call,
        parse_identifier_expr,
        delimited(symbol("("), parse_expression, symbol(")")),
    ))
    .parse(input)
}
