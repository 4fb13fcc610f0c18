//! Unified Query AST types.
//!
//! This module defines the dialect-neutral representation shared by the
//! parser frontend, the generators, the optimizer passes and the executor.
//! The AST is designed to be:
//! - Dialect-agnostic (every supported dialect parses into it and renders from it)
//! - Immutable-friendly (clone-based transformations)
//! - Lossless enough to round-trip through the pretty printer
use std::fmt;

/// Top-level query representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Select(Box<SelectQuery>),
    Insert(InsertQuery),
    Update(UpdateQuery),
    Delete(DeleteQuery),
    /// Common Table Expressions wrapping an inner query.
    With(CTEQuery),
    /// Passthrough for statements the AST does not model (DDL, utility).
    Raw(RawStatement),
}

/// A statement kept in `sqlparser`'s canonical rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStatement {
    pub kind: StatementKind,
    pub sql: String,
}

/// Statement kind tags reported by metadata extraction and syntax checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Union,
    Intersect,
    Except,
    Values,
    Insert,
    Update,
    Delete,
    Create,
    Drop,
    Alter,
    Merge,
    Command,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            StatementKind::Select => "Select",
            StatementKind::Union => "Union",
            StatementKind::Intersect => "Intersect",
            StatementKind::Except => "Except",
            StatementKind::Values => "Values",
            StatementKind::Insert => "Insert",
            StatementKind::Update => "Update",
            StatementKind::Delete => "Delete",
            StatementKind::Create => "Create",
            StatementKind::Drop => "Drop",
            StatementKind::Alter => "Alter",
            StatementKind::Merge => "Merge",
            StatementKind::Command => "Command",
        };
        write!(f, "{}", tag)
    }
}

impl Query {
    /// Kind tag of the statement; a WITH query reports its body's kind.
    pub fn kind(&self) -> StatementKind {
        match self {
            Query::Select(s) => match s.set_op.as_deref() {
                Some(op) => match op.op {
                    SetOperator::Union => StatementKind::Union,
                    SetOperator::Intersect => StatementKind::Intersect,
                    SetOperator::Except => StatementKind::Except,
                },
                None => StatementKind::Select,
            },
            Query::Insert(_) => StatementKind::Insert,
            Query::Update(_) => StatementKind::Update,
            Query::Delete(_) => StatementKind::Delete,
            Query::With(cte) => cte.body.kind(),
            Query::Raw(raw) => raw.kind,
        }
    }

    /// Whether the statement reads rows (SELECT, set operations, WITH ... SELECT).
    pub fn is_query(&self) -> bool {
        match self {
            Query::Select(_) => true,
            Query::With(cte) => cte.body.is_query(),
            _ => false,
        }
    }
}

/// A SELECT query with all standard SQL clauses.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectQuery {
    pub distinct: bool,
    pub projections: Vec<SelectItem>,
    pub from: Vec<TableRef>,
    pub joins: Vec<Join>,
    pub filter: Option<Expression>,
    pub group_by: Vec<Expression>,
    pub having: Option<Expression>,
    pub windows: Vec<NamedWindowSpec>,
    /// Applies to the combined result when `set_op` is present.
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<Expression>,
    pub offset: Option<Expression>,
    /// Set operations (UNION, INTERSECT, EXCEPT), chained left to right:
    /// `a UNION b EXCEPT c` is `a` with `set_op = (UNION, b)` and
    /// `b.set_op = (EXCEPT, c)`.
    pub set_op: Option<Box<SetOperation>>,
}

impl SelectQuery {
    /// Whether the projection list contains an aggregate call.
    pub fn has_aggregates(&self) -> bool {
        self.projections.iter().any(|item| match item {
            SelectItem::Expression { expr, .. } => expr.contains_aggregate(),
            _ => false,
        }) || self.having.is_some()
    }
}

/// A single item in the SELECT projection list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// `*`
    Wildcard,
    /// `table.*`
    QualifiedWildcard(String),
    /// An expression, optionally aliased: `expr AS alias`.
    Expression {
        expr: Expression,
        alias: Option<String>,
    },
}

/// Table reference in FROM clause.
#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    /// Simple table: `[catalog.]schema.table AS alias`
    Table {
        schema: Option<String>,
        name: String,
        alias: Option<String>,
    },
    /// Subquery: `(SELECT ...) AS alias`
    Subquery { query: Box<Query>, alias: String },
    /// Table-valued function: `generate_series(1, 10) AS alias`
    Function {
        name: String,
        args: Vec<Expression>,
        alias: Option<String>,
    },
    /// Table factor kept verbatim (UNNEST, PIVOT, table hints).
    Raw(String),
}

impl TableRef {
    /// The name other clauses use to qualify columns of this source.
    pub fn qualifier(&self) -> Option<&str> {
        match self {
            TableRef::Table { name, alias, .. } => Some(alias.as_deref().unwrap_or(name)),
            TableRef::Subquery { alias, .. } => Some(alias),
            TableRef::Function { alias, .. } => alias.as_deref(),
            TableRef::Raw(_) => None,
        }
    }
}

/// JOIN clause representation.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    pub condition: Option<JoinCondition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
    Lateral,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinCondition {
    On(Expression),
    Using(Vec<String>),
    Natural,
}

/// Core expression type. Recursive to support arbitrary nesting.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Column reference: `table.column` or just `column`.
    Column { table: Option<String>, name: String },
    /// Literal value.
    Literal(Literal),
    /// Binary operation: `left op right`.
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    /// Unary operation: `op expr` (e.g., NOT, -).
    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expression>,
    },
    /// Function call: `name(args)`.
    Function {
        name: String,
        args: Vec<Expression>,
        distinct: bool,
    },
    /// Aggregate function with optional filter.
    Aggregate {
        name: String,
        args: Vec<Expression>,
        distinct: bool,
        filter: Option<Box<Expression>>,
    },
    /// Window function: `expr OVER (...)`.
    WindowFunction {
        function: Box<Expression>,
        window: WindowSpec,
    },
    /// CASE expression.
    Case {
        operand: Option<Box<Expression>>,
        when_clauses: Vec<(Expression, Expression)>,
        else_clause: Option<Box<Expression>>,
    },
    /// Subquery expression: `(SELECT ...)`.
    Subquery(Box<Query>),
    /// EXISTS (SELECT ...).
    Exists(Box<Query>),
    /// expr IN (values or subquery).
    InList {
        expr: Box<Expression>,
        list: Vec<Expression>,
        negated: bool,
    },
    InSubquery {
        expr: Box<Expression>,
        subquery: Box<Query>,
        negated: bool,
    },
    /// expr BETWEEN low AND high.
    Between {
        expr: Box<Expression>,
        low: Box<Expression>,
        high: Box<Expression>,
        negated: bool,
    },
    /// expr IS NULL / IS NOT NULL.
    IsNull {
        expr: Box<Expression>,
        negated: bool,
    },
    /// CAST(expr AS type).
    Cast {
        expr: Box<Expression>,
        data_type: String,
    },
    /// Wildcard `*` (used in COUNT(*)).
    Wildcard,
    /// Parameter placeholder: `$1`, `$2`, etc.
    Parameter(usize),
    /// Array expression: `ARRAY[...]`.
    Array(Vec<Expression>),
    /// JSON access: `expr->key`, `expr->>key`.
    JsonAccess {
        expr: Box<Expression>,
        path: Box<Expression>,
        as_text: bool,
    },
    /// Type-cast using `::` operator (PostgreSQL specific).
    TypeCast {
        expr: Box<Expression>,
        data_type: String,
    },
    /// Nested expression (parenthesized).
    Nested(Box<Expression>),
    /// `INTERVAL '1' DAY`; `value` is the literal, `unit` the leading field.
    Interval {
        value: Box<Expression>,
        unit: Option<String>,
    },
    /// Typed literal such as `DATE '2020-01-01'`.
    TypedString { data_type: String, value: String },
    /// `expr IS [NOT] TRUE` / `expr IS [NOT] FALSE`.
    IsBool {
        expr: Box<Expression>,
        value: bool,
        negated: bool,
    },
    /// Expression kept verbatim in `sqlparser`'s rendering.
    Raw(String),
}

impl Expression {
    pub fn column(table: Option<&str>, name: &str) -> Self {
        Expression::Column {
            table: table.map(str::to_string),
            name: name.to_string(),
        }
    }

    pub fn boolean(value: bool) -> Self {
        Expression::Literal(Literal::Boolean(value))
    }

    pub fn binary(left: Expression, op: BinaryOperator, right: Expression) -> Self {
        Expression::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn not(expr: Expression) -> Self {
        Expression::UnaryOp {
            op: UnaryOperator::Not,
            expr: Box::new(expr),
        }
    }

    /// Whether an aggregate call appears outside of nested subqueries.
    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        super::visit::walk_expr(self, &mut |e| {
            if matches!(e, Expression::Aggregate { .. }) {
                found = true;
            }
        });
        found
    }

    /// Strip any number of enclosing parentheses.
    pub fn unnested(&self) -> &Expression {
        match self {
            Expression::Nested(inner) => inner.unnested(),
            other => other,
        }
    }
}

/// Literal values in SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    // Logical
    And,
    Or,
    // Arithmetic
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    // String
    Like,
    ILike,
    NotLike,
    NotILike,
    // Other
    Concat,
}

impl BinaryOperator {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::NotEq
                | BinaryOperator::Lt
                | BinaryOperator::LtEq
                | BinaryOperator::Gt
                | BinaryOperator::GtEq
        )
    }

    /// Binding strength used to decide where parentheses are required.
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Eq
            | BinaryOperator::NotEq
            | BinaryOperator::Lt
            | BinaryOperator::LtEq
            | BinaryOperator::Gt
            | BinaryOperator::GtEq
            | BinaryOperator::Like
            | BinaryOperator::ILike
            | BinaryOperator::NotLike
            | BinaryOperator::NotILike => 4,
            BinaryOperator::Concat => 5,
            BinaryOperator::Plus | BinaryOperator::Minus => 6,
            BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Modulo => 7,
        }
    }

    /// `(a op b) op c == a op (b op c)`
    pub fn is_associative(&self) -> bool {
        matches!(
            self,
            BinaryOperator::And
                | BinaryOperator::Or
                | BinaryOperator::Plus
                | BinaryOperator::Multiply
                | BinaryOperator::Concat
        )
    }

    /// The operator obtained by swapping operands: `a < b` is `b > a`.
    pub fn flipped(&self) -> Option<BinaryOperator> {
        match self {
            BinaryOperator::Eq => Some(BinaryOperator::Eq),
            BinaryOperator::NotEq => Some(BinaryOperator::NotEq),
            BinaryOperator::Lt => Some(BinaryOperator::Gt),
            BinaryOperator::LtEq => Some(BinaryOperator::GtEq),
            BinaryOperator::Gt => Some(BinaryOperator::Lt),
            BinaryOperator::GtEq => Some(BinaryOperator::LtEq),
            _ => None,
        }
    }

    /// The comparison equivalent to `NOT (a op b)`.
    pub fn negated(&self) -> Option<BinaryOperator> {
        match self {
            BinaryOperator::Eq => Some(BinaryOperator::NotEq),
            BinaryOperator::NotEq => Some(BinaryOperator::Eq),
            BinaryOperator::Lt => Some(BinaryOperator::GtEq),
            BinaryOperator::LtEq => Some(BinaryOperator::Gt),
            BinaryOperator::Gt => Some(BinaryOperator::LtEq),
            BinaryOperator::GtEq => Some(BinaryOperator::Lt),
            BinaryOperator::Like => Some(BinaryOperator::NotLike),
            BinaryOperator::NotLike => Some(BinaryOperator::Like),
            BinaryOperator::ILike => Some(BinaryOperator::NotILike),
            BinaryOperator::NotILike => Some(BinaryOperator::ILike),
            _ => None,
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
    Plus,
}

/// Window specification for window functions.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    pub partition_by: Vec<Expression>,
    pub order_by: Vec<OrderByExpr>,
    pub frame: Option<WindowFrame>,
}

/// Named window definition for WINDOW clause.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedWindowSpec {
    pub name: String,
    pub spec: WindowSpec,
}

/// Window frame specification.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowFrame {
    pub mode: WindowFrameMode,
    pub start: WindowFrameBound,
    pub end: Option<WindowFrameBound>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WindowFrameMode {
    Rows,
    Range,
    Groups,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WindowFrameBound {
    CurrentRow,
    Preceding(Option<u64>),
    Following(Option<u64>),
}

/// ORDER BY expression.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expression,
    pub asc: Option<bool>,
    pub nulls_first: Option<bool>,
}

/// Set operations (UNION, INTERSECT, EXCEPT).
#[derive(Debug, Clone, PartialEq)]
pub struct SetOperation {
    pub op: SetOperator,
    pub all: bool,
    pub right: Query,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    Intersect,
    Except,
}

/// Common Table Expression (WITH clause).
#[derive(Debug, Clone, PartialEq)]
pub struct CTEQuery {
    pub recursive: bool,
    pub ctes: Vec<CTE>,
    pub body: Box<Query>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CTE {
    pub name: String,
    pub columns: Vec<String>,
    pub query: Query,
}

/// INSERT statement.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertQuery {
    pub table: TableRef,
    pub columns: Vec<String>,
    pub source: InsertSource,
    pub returning: Vec<SelectItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    Values(Vec<Vec<Expression>>),
    Query(Box<Query>),
}

/// UPDATE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateQuery {
    pub table: TableRef,
    pub assignments: Vec<Assignment>,
    pub filter: Option<Expression>,
    pub returning: Vec<SelectItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Expression,
}

/// DELETE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteQuery {
    pub table: TableRef,
    pub filter: Option<Expression>,
    pub returning: Vec<SelectItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_select_query() {
        let q = SelectQuery::default();
        assert!(!q.distinct);
        assert!(q.projections.is_empty());
        assert!(q.from.is_empty());
        assert!(q.filter.is_none());
        assert!(q.limit.is_none());
    }

    #[test]
    fn test_query_clone() {
        let q = Query::Select(Box::new(SelectQuery {
            distinct: true,
            projections: vec![SelectItem::Wildcard],
            from: vec![TableRef::Table {
                schema: None,
                name: "users".into(),
                alias: None,
            }],
            ..Default::default()
        }));
        let q2 = q.clone();
        assert_eq!(q, q2);
    }

    #[test]
    fn test_expression_nesting() {
        let expr = Expression::BinaryOp {
            left: Box::new(Expression::Column {
                table: None,
                name: "age".into(),
            }),
            op: BinaryOperator::Gt,
            right: Box::new(Expression::Literal(Literal::Integer(18))),
        };
        // Verify we can clone deeply nested expressions
        let _ = expr.clone();
    }

    #[test]
    fn test_literal_equality() {
        assert_eq!(Literal::Null, Literal::Null);
        assert_eq!(Literal::Boolean(true), Literal::Boolean(true));
        assert_ne!(Literal::Integer(1), Literal::Integer(2));
        assert_eq!(
            Literal::String("hello".into()),
            Literal::String("hello".into())
        );
    }

    #[test]
    fn test_cte_query_structure() {
        let cte = CTEQuery {
            recursive: true,
            ctes: vec![CTE {
                name: "recursive_cte".into(),
                columns: vec!["n".into()],
                query: Query::Select(Box::new(SelectQuery {
                    projections: vec![SelectItem::Expression {
                        expr: Expression::Literal(Literal::Integer(1)),
                        alias: Some("n".into()),
                    }],
                    ..Default::default()
                })),
            }],
            body: Box::new(Query::Select(Box::new(SelectQuery::default()))),
        };
        assert!(cte.recursive);
        assert_eq!(cte.ctes.len(), 1);
        assert_eq!(cte.ctes[0].name, "recursive_cte");
    }

    #[test]
    fn test_query_kind() {
        let mut select = SelectQuery::default();
        assert_eq!(Query::Select(Box::new(select.clone())).kind(), StatementKind::Select);
        select.set_op = Some(Box::new(SetOperation {
            op: SetOperator::Except,
            all: false,
            right: Query::Select(Box::new(SelectQuery::default())),
        }));
        let q = Query::Select(Box::new(select));
        assert_eq!(q.kind(), StatementKind::Except);
        assert_eq!(q.kind().to_string(), "Except");

        let raw = Query::Raw(RawStatement {
            kind: StatementKind::Create,
            sql: "CREATE TABLE t (a INT)".into(),
        });
        assert_eq!(raw.kind(), StatementKind::Create);
        assert!(!raw.is_query());
    }

    #[test]
    fn test_operator_helpers() {
        assert_eq!(BinaryOperator::Lt.flipped(), Some(BinaryOperator::Gt));
        assert_eq!(BinaryOperator::GtEq.negated(), Some(BinaryOperator::Lt));
        assert_eq!(BinaryOperator::Plus.negated(), None);
        assert!(BinaryOperator::And.precedence() > BinaryOperator::Or.precedence());
        assert!(BinaryOperator::Multiply.precedence() > BinaryOperator::Plus.precedence());
    }

    #[test]
    fn test_contains_aggregate() {
        let agg = Expression::Aggregate {
            name: "COUNT".into(),
            args: vec![Expression::Wildcard],
            distinct: false,
            filter: None,
        };
        let expr = Expression::binary(agg, BinaryOperator::Plus, Expression::Literal(Literal::Integer(1)));
        assert!(expr.contains_aggregate());
        assert!(!Expression::column(None, "a").contains_aggregate());
    }
}
