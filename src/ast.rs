//! Owned AST consumed by the transform layer (spec §3).
//!
//! The parser (`crate::parser`) is the only producer of these types; the
//! transform only borrows the tree it's handed. Every node that carries
//! meaningful provenance also carries a `Span`, a byte offset into the
//! original query text, so callers can slice the source for diagnostics.

pub type Span = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum CypherStatement {
    Query(Query),
    ProcedureCall(StandaloneProcedureCall),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StandaloneProcedureCall {
    pub span: Span,
    pub procedure_name: String,
    pub arguments: Vec<Expression>,
    pub yield_items: Option<Vec<String>>,
}

/// A top-level query, possibly followed by UNION branches.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub span: Span,
    pub use_clause: Option<String>,
    pub clauses: Vec<Clause>,
    pub union: Option<Box<Union>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Union {
    pub span: Span,
    pub all: bool,
    pub right: Query,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Match(Match),
    Create(Create),
    Merge(Merge),
    Set(Set),
    Remove(Remove),
    Delete(Delete),
    Return(Return),
    With(With),
    Unwind(Unwind),
    Foreach(Foreach),
    LoadCsv(LoadCsv),
    Use(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub span: Span,
    pub patterns: Vec<Path>,
    pub where_expr: Option<Expression>,
    pub optional: bool,
    pub from_graph: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Create {
    pub span: Span,
    pub patterns: Vec<Path>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Merge {
    pub span: Span,
    pub pattern: Path,
    pub on_create: Option<Vec<SetItem>>,
    pub on_match: Option<Vec<SetItem>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Set {
    pub span: Span,
    pub items: Vec<SetItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetItem {
    Property { target: Expression, value: Expression },
    Label { variable: String, label: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Remove {
    pub span: Span,
    pub items: Vec<RemoveItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoveItem {
    Property { variable: String, property: String },
    Label { variable: String, label: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub span: Span,
    pub items: Vec<Expression>,
    pub detach: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Return {
    pub span: Span,
    pub items: Vec<ReturnItem>,
    pub distinct: bool,
    pub order_by: Vec<OrderByItem>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnItem {
    pub expression: Expression,
    pub alias: Option<String>,
    /// Original source text of the expression, used as the default alias
    /// when no `AS` is given (spec §4.7, §10 of SPEC_FULL).
    pub original_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct With {
    pub span: Span,
    pub items: Vec<ReturnItem>,
    pub distinct: bool,
    pub order_by: Vec<OrderByItem>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub where_expr: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expression: Expression,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unwind {
    pub span: Span,
    pub expression: Expression,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Foreach {
    pub span: Span,
    pub variable: String,
    pub list: Expression,
    pub body: Vec<Clause>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadCsv {
    pub span: Span,
    pub file_path: String,
    pub variable: String,
    pub with_headers: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodePattern {
    pub span: Span,
    pub variable: Option<String>,
    pub labels: Vec<String>,
    pub properties: Option<Vec<(String, Expression)>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelPattern {
    pub span: Span,
    pub variable: Option<String>,
    pub types: Vec<String>,
    pub properties: Option<Vec<(String, Expression)>>,
    pub left_arrow: bool,
    pub right_arrow: bool,
    pub varlen: Option<VarLenRange>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarLenRange {
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathElement {
    Node(NodePattern),
    Rel(RelPattern),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Normal,
    Shortest,
    AllShortest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub span: Span,
    pub variable: Option<String>,
    pub elements: Vec<PathElement>,
    pub kind: PathKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Decimal(f64),
    String(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    And,
    Or,
    Xor,
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    In,
    StartsWith,
    EndsWith,
    Contains,
    RegexMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListPredicateKind {
    All,
    Any,
    None,
    Single,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhenClause {
    pub condition: Expression,
    pub result: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapProjectionItem {
    AllProperties,
    Property(String),
    Alias { alias: String, expression: Expression },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExistsForm {
    /// exists((a)-[:T]->(b))
    Pattern(Box<Path>),
    /// exists(n.prop)
    Property(Box<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal { span: Span, value: Literal },
    Identifier { span: Span, name: String },
    Parameter { span: Span, name: Option<String> },
    Property { span: Span, expr: Box<Expression>, property: String },
    LabelExpr { span: Span, expr: Box<Expression>, label: String },
    BinaryOp { span: Span, op: BinaryOperator, left: Box<Expression>, right: Box<Expression> },
    NotExpr { span: Span, expr: Box<Expression> },
    NullCheck { span: Span, expr: Box<Expression>, is_not: bool },
    FunctionCall { span: Span, name: String, args: Vec<Expression>, distinct: bool },
    ListComprehension {
        span: Span,
        variable: String,
        list: Box<Expression>,
        where_expr: Option<Box<Expression>>,
        transform: Option<Box<Expression>>,
    },
    PatternComprehension {
        span: Span,
        pattern: Box<Path>,
        where_expr: Option<Box<Expression>>,
        collect: Box<Expression>,
    },
    Case {
        span: Span,
        whens: Vec<WhenClause>,
        else_expr: Option<Box<Expression>>,
    },
    Map { span: Span, entries: Vec<(String, Expression)> },
    MapProjection { span: Span, variable: String, items: Vec<MapProjectionItem> },
    List { span: Span, items: Vec<Expression> },
    Subscript { span: Span, base: Box<Expression>, index: Box<Expression> },
    Exists { span: Span, form: ExistsForm },
    ListPredicate {
        span: Span,
        kind: ListPredicateKind,
        variable: String,
        list: Box<Expression>,
        predicate: Box<Expression>,
    },
    Reduce {
        span: Span,
        accumulator: String,
        initial: Box<Expression>,
        variable: String,
        list: Box<Expression>,
        expr: Box<Expression>,
    },
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::Literal { span, .. }
            | Expression::Identifier { span, .. }
            | Expression::Parameter { span, .. }
            | Expression::Property { span, .. }
            | Expression::LabelExpr { span, .. }
            | Expression::BinaryOp { span, .. }
            | Expression::NotExpr { span, .. }
            | Expression::NullCheck { span, .. }
            | Expression::FunctionCall { span, .. }
            | Expression::ListComprehension { span, .. }
            | Expression::PatternComprehension { span, .. }
            | Expression::Case { span, .. }
            | Expression::Map { span, .. }
            | Expression::MapProjection { span, .. }
            | Expression::List { span, .. }
            | Expression::Subscript { span, .. }
            | Expression::Exists { span, .. }
            | Expression::ListPredicate { span, .. }
            | Expression::Reduce { span, .. } => *span,
        }
    }

    /// True if this is a string literal leaf — used by `+` to decide
    /// between arithmetic addition and SQL string concatenation (spec §4.5).
    pub fn is_string_literal(&self) -> bool {
        matches!(self, Expression::Literal { value: Literal::String(_), .. })
    }
}
