/// Unified AST → SQL compiler.
///
/// Converts our internal AST back into single-line SQL for a target dialect.
/// Together with the parser this gives dialect conversion: SQL → AST → SQL.
/// The pretty printer in `formatter.rs` reuses the [`Generator`] for
/// everything below clause level.
use super::types::*;
use crate::dialect::{ConcatStyle, Dialect, IntervalStyle, LimitStyle, QuoteStyle};

/// Rendering options shared by the compiler and the formatter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Target dialect; `None` renders ANSI-flavoured generic SQL.
    pub dialect: Option<Dialect>,
    /// Quote every identifier, not only those that need it.
    pub identify: bool,
    /// Lowercase identifiers.
    pub normalize: bool,
}

impl GenerateOptions {
    pub fn for_dialect(dialect: Option<Dialect>) -> Self {
        GenerateOptions {
            dialect,
            ..Default::default()
        }
    }
}

/// Compile a query AST into generic SQL.
pub fn compile(query: &Query) -> String {
    Generator::new(GenerateOptions::default()).query(query)
}

/// Compile a query AST for the dialect and identifier policy in `opts`.
pub fn compile_with(query: &Query, opts: &GenerateOptions) -> String {
    Generator::new(*opts).query(query)
}

/// Render a single expression with default options.
pub fn compile_expr(expr: &Expression) -> String {
    Generator::new(GenerateOptions::default()).expr(expr)
}

/// Row limiting rendered for a SELECT under the target dialect.
#[derive(Debug, Default, PartialEq)]
pub struct RowLimit {
    /// Argument of `SELECT TOP n`.
    pub top: Option<String>,
    /// Trailing clauses, in order (`LIMIT 10`, `OFFSET 5 ROWS`, ...).
    pub clauses: Vec<String>,
    /// `OFFSET .. FETCH` without ORDER BY needs `ORDER BY (SELECT NULL)`.
    pub order_placeholder: bool,
}

const RESERVED: &[&str] = &[
    "ALL", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CAST", "CHECK", "COLUMN", "CONSTRAINT",
    "CREATE", "CROSS", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP", "ELSE", "END", "EXCEPT",
    "EXISTS", "FALSE", "FETCH", "FOR", "FOREIGN", "FROM", "FULL", "GROUP", "HAVING", "IN",
    "INNER", "INSERT", "INTERSECT", "INTO", "IS", "JOIN", "LEFT", "LIKE", "LIMIT", "NOT", "NULL",
    "OFFSET", "ON", "OR", "ORDER", "OUTER", "PRIMARY", "REFERENCES", "RIGHT", "SELECT", "SET",
    "TABLE", "THEN", "TO", "TRUE", "UNION", "UNIQUE", "UPDATE", "USING", "VALUES", "WHEN",
    "WHERE", "WITH",
];

/// Functions written without parentheses when called with no arguments.
const NILADIC: &[&str] = &[
    "CURRENT_DATE",
    "CURRENT_TIME",
    "CURRENT_TIMESTAMP",
    "CURRENT_USER",
    "LOCALTIME",
    "LOCALTIMESTAMP",
];

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !RESERVED.contains(&name.to_uppercase().as_str())
}

/// Precedence of an expression in operand position.
fn expr_precedence(expr: &Expression) -> u8 {
    match expr {
        Expression::BinaryOp { op, .. } => op.precedence(),
        Expression::UnaryOp {
            op: UnaryOperator::Not,
            ..
        } => 3,
        Expression::IsNull { .. }
        | Expression::IsBool { .. }
        | Expression::Between { .. }
        | Expression::InList { .. }
        | Expression::InSubquery { .. } => 4,
        _ => 10,
    }
}

/// Stateless SQL generator for one set of [`GenerateOptions`].
#[derive(Debug, Clone, Copy)]
pub struct Generator {
    opts: GenerateOptions,
}

impl Generator {
    pub fn new(opts: GenerateOptions) -> Self {
        Generator { opts }
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.opts
    }

    pub fn query(&self, query: &Query) -> String {
        match query {
            Query::Select(s) => self.select(s),
            Query::Insert(i) => self.insert(i),
            Query::Update(u) => self.update(u),
            Query::Delete(d) => self.delete(d),
            Query::With(cte) => format!("{} {}", self.with_clause(cte), self.query(&cte.body)),
            Query::Raw(raw) => raw.sql.clone(),
        }
    }

    // ---- identifiers -------------------------------------------------

    pub fn ident(&self, name: &str) -> String {
        let name = if self.opts.normalize {
            name.to_lowercase()
        } else {
            name.to_string()
        };
        if !self.opts.identify && is_plain_identifier(&name) {
            return name;
        }
        let style = self
            .opts
            .dialect
            .map(|d| d.quote_style())
            .unwrap_or(QuoteStyle::Double);
        match style {
            QuoteStyle::Double => format!("\"{}\"", name.replace('"', "\"\"")),
            QuoteStyle::Backtick => format!("`{}`", name.replace('`', "``")),
            QuoteStyle::Bracket => format!("[{}]", name.replace(']', "]]")),
        }
    }

    /// Render a dotted qualifier such as `catalog.schema` segment by segment.
    pub fn qualified(&self, dotted: &str) -> String {
        dotted
            .split('.')
            .map(|part| self.ident(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// ` AS alias`, or ` alias` where the dialect rejects `AS` for tables.
    pub fn alias_clause(&self, alias: &str) -> String {
        let supports_as = self
            .opts
            .dialect
            .map(|d| d.supports_table_alias_as())
            .unwrap_or(true);
        if supports_as {
            format!(" AS {}", self.ident(alias))
        } else {
            format!(" {}", self.ident(alias))
        }
    }

    pub fn data_type(&self, canonical: &str) -> String {
        match self.opts.dialect {
            Some(d) => d.data_type(canonical),
            None => canonical.to_string(),
        }
    }

    // ---- statements --------------------------------------------------

    pub fn select(&self, select: &SelectQuery) -> String {
        let mut parts = Vec::new();
        let limit = self.row_limit(select);

        parts.push(self.select_head(select, &limit));
        if !select.projections.is_empty() {
            let items: Vec<String> = select
                .projections
                .iter()
                .map(|p| self.select_item(p))
                .collect();
            parts.push(items.join(", "));
        } else {
            parts.push("*".to_string());
        }

        if !select.from.is_empty() {
            let tables: Vec<String> = select.from.iter().map(|t| self.table_ref(t)).collect();
            parts.push(format!("FROM {}", tables.join(", ")));
        }

        for join in &select.joins {
            let mut s = format!("{} {}", self.join_keyword(join), self.table_ref(&join.table));
            if let Some(cond) = self.join_condition(join) {
                s.push(' ');
                s.push_str(&cond);
            }
            parts.push(s);
        }

        if let Some(ref filter) = select.filter {
            parts.push(format!("WHERE {}", self.expr(filter)));
        }

        if !select.group_by.is_empty() {
            let groups: Vec<String> = select.group_by.iter().map(|g| self.expr(g)).collect();
            parts.push(format!("GROUP BY {}", groups.join(", ")));
        }

        if let Some(ref having) = select.having {
            parts.push(format!("HAVING {}", self.expr(having)));
        }

        if let Some(windows) = self.window_clause(select) {
            parts.push(windows);
        }

        if let Some(ref set_op) = select.set_op {
            parts.push(Self::set_operator(set_op));
            parts.push(self.query(&set_op.right));
        }

        if !select.order_by.is_empty() {
            let orders: Vec<String> = select.order_by.iter().map(|o| self.order_by(o)).collect();
            parts.push(format!("ORDER BY {}", orders.join(", ")));
        } else if limit.order_placeholder {
            parts.push("ORDER BY (SELECT NULL)".to_string());
        }

        parts.extend(limit.clauses);
        parts.join(" ")
    }

    /// `SELECT [DISTINCT] [TOP n]`
    pub fn select_head(&self, select: &SelectQuery, limit: &RowLimit) -> String {
        let mut head = String::from("SELECT");
        if select.distinct {
            head.push_str(" DISTINCT");
        }
        if let Some(ref top) = limit.top {
            head.push_str(&format!(" TOP {}", top));
        }
        head
    }

    pub fn row_limit(&self, select: &SelectQuery) -> RowLimit {
        let style = self
            .opts
            .dialect
            .map(|d| d.limit_style())
            .unwrap_or(LimitStyle::Limit);
        let limit = select.limit.as_ref().map(|l| self.expr(l));
        let offset = select.offset.as_ref().map(|o| self.expr(o));
        let mut out = RowLimit::default();

        match style {
            LimitStyle::Limit => {
                if let Some(l) = limit {
                    out.clauses.push(format!("LIMIT {}", l));
                }
                if let Some(o) = offset {
                    out.clauses.push(format!("OFFSET {}", o));
                }
            }
            LimitStyle::Top if offset.is_none() && select.set_op.is_none() => {
                out.top = limit;
            }
            LimitStyle::Top => {
                out.order_placeholder = select.order_by.is_empty();
                out.clauses.push(format!(
                    "OFFSET {} ROWS",
                    offset.unwrap_or_else(|| "0".to_string())
                ));
                if let Some(l) = limit {
                    out.clauses.push(format!("FETCH NEXT {} ROWS ONLY", l));
                }
            }
            LimitStyle::Fetch => {
                if let Some(o) = offset {
                    out.clauses.push(format!("OFFSET {} ROWS", o));
                }
                if let Some(l) = limit {
                    out.clauses.push(format!("FETCH FIRST {} ROWS ONLY", l));
                }
            }
        }
        out
    }

    pub fn window_clause(&self, select: &SelectQuery) -> Option<String> {
        if select.windows.is_empty() {
            return None;
        }
        let defs: Vec<String> = select
            .windows
            .iter()
            .map(|w| format!("{} AS ({})", self.ident(&w.name), self.window_spec(&w.spec)))
            .collect();
        Some(format!("WINDOW {}", defs.join(", ")))
    }

    pub fn set_operator(set_op: &SetOperation) -> String {
        let op_str = match set_op.op {
            SetOperator::Union => "UNION",
            SetOperator::Intersect => "INTERSECT",
            SetOperator::Except => "EXCEPT",
        };
        if set_op.all {
            format!("{} ALL", op_str)
        } else {
            op_str.to_string()
        }
    }

    pub fn select_item(&self, item: &SelectItem) -> String {
        match item {
            SelectItem::Wildcard => "*".to_string(),
            SelectItem::QualifiedWildcard(table) => format!("{}.*", self.qualified(table)),
            SelectItem::Expression { expr, alias } => {
                let expr_str = self.expr(expr);
                match alias {
                    Some(a) => format!("{} AS {}", expr_str, self.ident(a)),
                    None => expr_str,
                }
            }
        }
    }

    pub fn table_name(&self, schema: Option<&str>, name: &str) -> String {
        match schema {
            Some(sc) => format!("{}.{}", self.qualified(sc), self.ident(name)),
            None => self.ident(name),
        }
    }

    pub fn table_ref(&self, table: &TableRef) -> String {
        match table {
            TableRef::Table {
                schema,
                name,
                alias,
            } => {
                let mut s = self.table_name(schema.as_deref(), name);
                if let Some(a) = alias {
                    s.push_str(&self.alias_clause(a));
                }
                s
            }
            TableRef::Subquery { query, alias } => {
                format!("({}){}", self.query(query), self.alias_clause(alias))
            }
            TableRef::Function { name, args, alias } => {
                let args_str: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
                let mut s = format!("{}({})", name, args_str.join(", "));
                if let Some(a) = alias {
                    s.push_str(&self.alias_clause(a));
                }
                s
            }
            TableRef::Raw(sql) => sql.clone(),
        }
    }

    pub fn join_keyword(&self, join: &Join) -> String {
        let keyword = match join.join_type {
            JoinType::Inner => "JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL JOIN",
            JoinType::Cross => "CROSS JOIN",
            JoinType::Lateral => match self.opts.dialect {
                Some(Dialect::TSql | Dialect::Fabric) => "CROSS APPLY",
                _ => "CROSS JOIN LATERAL",
            },
        };
        match join.condition {
            Some(JoinCondition::Natural) => format!("NATURAL {}", keyword),
            _ => keyword.to_string(),
        }
    }

    pub fn join_condition(&self, join: &Join) -> Option<String> {
        match &join.condition {
            Some(JoinCondition::On(expr)) => Some(format!("ON {}", self.expr(expr))),
            Some(JoinCondition::Using(cols)) => {
                let cols: Vec<String> = cols.iter().map(|c| self.ident(c)).collect();
                Some(format!("USING ({})", cols.join(", ")))
            }
            Some(JoinCondition::Natural) | None => None,
        }
    }

    /// `WITH [RECURSIVE] name(cols) AS (...), ...` without the body.
    pub fn with_clause(&self, cte: &CTEQuery) -> String {
        let ctes: Vec<String> = cte
            .ctes
            .iter()
            .map(|c| format!("{} AS ({})", self.cte_name(c), self.query(&c.query)))
            .collect();
        format!("{}{}", self.with_keyword(cte), ctes.join(", "))
    }

    pub fn with_keyword(&self, cte: &CTEQuery) -> &'static str {
        let spelled = self
            .opts
            .dialect
            .map(|d| d.supports_recursive_keyword())
            .unwrap_or(true);
        if cte.recursive && spelled {
            "WITH RECURSIVE "
        } else {
            "WITH "
        }
    }

    pub fn cte_name(&self, cte: &CTE) -> String {
        if cte.columns.is_empty() {
            self.ident(&cte.name)
        } else {
            let cols: Vec<String> = cte.columns.iter().map(|c| self.ident(c)).collect();
            format!("{}({})", self.ident(&cte.name), cols.join(", "))
        }
    }

    pub fn insert(&self, insert: &InsertQuery) -> String {
        let mut s = format!("INSERT INTO {}", self.table_ref(&insert.table));
        if !insert.columns.is_empty() {
            let cols: Vec<String> = insert.columns.iter().map(|c| self.ident(c)).collect();
            s.push_str(&format!(" ({})", cols.join(", ")));
        }
        s.push(' ');
        s.push_str(&self.insert_source(&insert.source));
        s.push_str(&self.returning(&insert.returning));
        s
    }

    pub fn insert_source(&self, source: &InsertSource) -> String {
        match source {
            InsertSource::Values(rows) => {
                let row_strs: Vec<String> = rows
                    .iter()
                    .map(|row| {
                        let vals: Vec<String> = row.iter().map(|v| self.expr(v)).collect();
                        format!("({})", vals.join(", "))
                    })
                    .collect();
                format!("VALUES {}", row_strs.join(", "))
            }
            InsertSource::Query(q) => self.query(q),
        }
    }

    pub fn returning(&self, items: &[SelectItem]) -> String {
        if items.is_empty() {
            return String::new();
        }
        let items: Vec<String> = items.iter().map(|i| self.select_item(i)).collect();
        format!(" RETURNING {}", items.join(", "))
    }

    pub fn assignment(&self, assignment: &Assignment) -> String {
        format!(
            "{} = {}",
            self.qualified(&assignment.column),
            self.expr(&assignment.value)
        )
    }

    pub fn update(&self, update: &UpdateQuery) -> String {
        let sets: Vec<String> = update.assignments.iter().map(|a| self.assignment(a)).collect();
        let filter = match &update.filter {
            Some(f) => format!(" WHERE {}", self.expr(f)),
            None => String::new(),
        };
        format!(
            "UPDATE {} SET {}{}{}",
            self.table_ref(&update.table),
            sets.join(", "),
            filter,
            self.returning(&update.returning)
        )
    }

    pub fn delete(&self, delete: &DeleteQuery) -> String {
        let filter = match &delete.filter {
            Some(f) => format!(" WHERE {}", self.expr(f)),
            None => String::new(),
        };
        format!(
            "DELETE FROM {}{}{}",
            self.table_ref(&delete.table),
            filter,
            self.returning(&delete.returning)
        )
    }

    // ---- expressions -------------------------------------------------

    /// Render `expr`, parenthesized when it binds looser than `min_precedence`.
    fn operand(&self, expr: &Expression, min_precedence: u8) -> String {
        let s = self.expr(expr);
        if expr_precedence(expr) < min_precedence {
            format!("({})", s)
        } else {
            s
        }
    }

    pub fn expr(&self, expr: &Expression) -> String {
        match expr {
            Expression::Column { table, name } => match table {
                Some(t) => format!("{}.{}", self.qualified(t), self.ident(name)),
                None => self.ident(name),
            },
            Expression::Literal(lit) => self.literal(lit),
            Expression::BinaryOp { left, op, right } => self.binary(left, *op, right),
            Expression::UnaryOp { op, expr } => match op {
                UnaryOperator::Not => format!("NOT {}", self.operand(expr, 3)),
                UnaryOperator::Minus => format!("-{}", self.operand(expr, 8)),
                UnaryOperator::Plus => format!("+{}", self.operand(expr, 8)),
            },
            Expression::Function {
                name,
                args,
                distinct,
            } => {
                let target = self.function_name(name);
                if args.is_empty() && NILADIC.contains(&target) {
                    return target.to_string();
                }
                self.call(target, args, *distinct)
            }
            Expression::Aggregate {
                name,
                args,
                distinct,
                filter,
            } => {
                let mut s = self.call(self.function_name(name), args, *distinct);
                if let Some(f) = filter {
                    s.push_str(&format!(" FILTER (WHERE {})", self.expr(f)));
                }
                s
            }
            Expression::WindowFunction { function, window } => {
                format!("{} OVER ({})", self.expr(function), self.window_spec(window))
            }
            Expression::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                let mut s = String::from("CASE");
                if let Some(op) = operand {
                    s.push_str(&format!(" {}", self.expr(op)));
                }
                for (when, then) in when_clauses {
                    s.push_str(&format!(" WHEN {} THEN {}", self.expr(when), self.expr(then)));
                }
                if let Some(else_expr) = else_clause {
                    s.push_str(&format!(" ELSE {}", self.expr(else_expr)));
                }
                s.push_str(" END");
                s
            }
            Expression::Subquery(q) => format!("({})", self.query(q)),
            Expression::Exists(q) => format!("EXISTS ({})", self.query(q)),
            Expression::InList {
                expr,
                list,
                negated,
            } => {
                let not_str = if *negated { "NOT " } else { "" };
                let items: Vec<String> = list.iter().map(|i| self.expr(i)).collect();
                format!(
                    "{} {}IN ({})",
                    self.operand(expr, 5),
                    not_str,
                    items.join(", ")
                )
            }
            Expression::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                let not_str = if *negated { "NOT " } else { "" };
                format!(
                    "{} {}IN ({})",
                    self.operand(expr, 5),
                    not_str,
                    self.query(subquery)
                )
            }
            Expression::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let not_str = if *negated { "NOT " } else { "" };
                format!(
                    "{} {}BETWEEN {} AND {}",
                    self.operand(expr, 5),
                    not_str,
                    self.operand(low, 5),
                    self.operand(high, 5)
                )
            }
            Expression::IsNull { expr, negated } => {
                let not_str = if *negated { "NOT " } else { "" };
                format!("{} IS {}NULL", self.operand(expr, 5), not_str)
            }
            Expression::IsBool {
                expr,
                value,
                negated,
            } => {
                let not_str = if *negated { "NOT " } else { "" };
                let value = if *value { "TRUE" } else { "FALSE" };
                format!("{} IS {}{}", self.operand(expr, 5), not_str, value)
            }
            Expression::Cast { expr, data_type } => {
                format!("CAST({} AS {})", self.expr(expr), self.data_type(data_type))
            }
            Expression::TypeCast { expr, data_type } => {
                let native = self
                    .opts
                    .dialect
                    .map(|d| d.supports_double_colon_cast())
                    .unwrap_or(true);
                if native {
                    format!("{}::{}", self.operand(expr, 9), self.data_type(data_type))
                } else {
                    format!("CAST({} AS {})", self.expr(expr), self.data_type(data_type))
                }
            }
            Expression::Wildcard => "*".to_string(),
            Expression::Parameter(idx) => format!("${}", idx),
            Expression::Array(elems) => {
                let items: Vec<String> = elems.iter().map(|e| self.expr(e)).collect();
                format!("ARRAY[{}]", items.join(", "))
            }
            Expression::JsonAccess {
                expr,
                path,
                as_text,
            } => {
                let op = if *as_text { "->>" } else { "->" };
                format!("{}{}{}", self.operand(expr, 9), op, self.expr(path))
            }
            Expression::Nested(expr) => format!("({})", self.expr(expr)),
            Expression::Interval { value, unit } => self.interval(value, unit.as_deref()),
            Expression::TypedString { data_type, value } => {
                let typed = self
                    .opts
                    .dialect
                    .map(|d| d.supports_typed_literals())
                    .unwrap_or(true);
                let quoted = quote_string(value);
                if typed {
                    format!("{} {}", self.data_type(data_type), quoted)
                } else {
                    format!("CAST({} AS {})", quoted, self.data_type(data_type))
                }
            }
            Expression::Raw(sql) => sql.clone(),
        }
    }

    fn function_name<'a>(&self, canonical: &'a str) -> &'a str {
        match self.opts.dialect {
            Some(d) => d.function_name(canonical),
            None => canonical,
        }
    }

    fn call(&self, name: &str, args: &[Expression], distinct: bool) -> String {
        let distinct_str = if distinct { "DISTINCT " } else { "" };
        let args_str: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
        format!("{}({}{})", name, distinct_str, args_str.join(", "))
    }

    fn binary(&self, left: &Expression, op: BinaryOperator, right: &Expression) -> String {
        let dialect = self.opts.dialect;

        if op == BinaryOperator::Concat {
            match dialect.map(|d| d.concat_style()).unwrap_or(ConcatStyle::Pipes) {
                ConcatStyle::Pipes => {}
                ConcatStyle::Function => {
                    let mut parts = Vec::new();
                    flatten_concat(left, &mut parts);
                    flatten_concat(right, &mut parts);
                    let args: Vec<String> = parts.iter().map(|p| self.expr(p)).collect();
                    return format!("CONCAT({})", args.join(", "));
                }
                ConcatStyle::Plus => {
                    return format!(
                        "{} + {}",
                        self.operand(left, 6),
                        self.operand(right, 7)
                    );
                }
            }
        }

        let ilike_native = dialect.map(|d| d.supports_ilike()).unwrap_or(true);
        if matches!(op, BinaryOperator::ILike | BinaryOperator::NotILike) && !ilike_native {
            let keyword = if op == BinaryOperator::ILike {
                "LIKE"
            } else {
                "NOT LIKE"
            };
            return format!(
                "{} {} {}",
                self.call(self.function_name("LOWER"), std::slice::from_ref(left), false),
                keyword,
                self.call(self.function_name("LOWER"), std::slice::from_ref(right), false)
            );
        }

        let op_str = match op {
            BinaryOperator::Eq => "=",
            BinaryOperator::NotEq => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Like => "LIKE",
            BinaryOperator::ILike => "ILIKE",
            BinaryOperator::NotLike => "NOT LIKE",
            BinaryOperator::NotILike => "NOT ILIKE",
            BinaryOperator::Concat => "||",
        };
        let precedence = op.precedence();
        let right_min = if op.is_associative() {
            precedence
        } else {
            precedence + 1
        };
        format!(
            "{} {} {}",
            self.operand(left, precedence),
            op_str,
            self.operand(right, right_min)
        )
    }

    pub fn literal(&self, lit: &Literal) -> String {
        match lit {
            Literal::Null => "NULL".to_string(),
            Literal::Boolean(b) => {
                let native = self
                    .opts
                    .dialect
                    .map(|d| d.supports_boolean_literals())
                    .unwrap_or(true);
                match (native, b) {
                    (true, true) => "TRUE".to_string(),
                    (true, false) => "FALSE".to_string(),
                    (false, true) => "1".to_string(),
                    (false, false) => "0".to_string(),
                }
            }
            Literal::Integer(i) => i.to_string(),
            Literal::Float(f) => format!("{:?}", f),
            Literal::String(s) => quote_string(s),
        }
    }

    fn interval(&self, value: &Expression, unit: Option<&str>) -> String {
        let style = self
            .opts
            .dialect
            .map(|d| d.interval_style())
            .unwrap_or(IntervalStyle::Standard);
        let amount = match value {
            Expression::Literal(Literal::String(s)) => Some(s.clone()),
            Expression::Literal(Literal::Integer(i)) => Some(i.to_string()),
            _ => None,
        };
        match (unit, amount) {
            (Some(unit), Some(amount)) => match style {
                IntervalStyle::Standard => format!("INTERVAL {} {}", quote_string(&amount), unit),
                IntervalStyle::Quoted => {
                    format!("INTERVAL {}", quote_string(&format!("{} {}", amount, unit)))
                }
                IntervalStyle::Bare => format!("INTERVAL {} {}", amount, unit),
            },
            (Some(unit), None) => format!("INTERVAL {} {}", self.operand(value, 9), unit),
            (None, _) => format!("INTERVAL {}", self.expr(value)),
        }
    }

    pub fn window_spec(&self, spec: &WindowSpec) -> String {
        let mut parts = Vec::new();

        if !spec.partition_by.is_empty() {
            let cols: Vec<String> = spec.partition_by.iter().map(|p| self.expr(p)).collect();
            parts.push(format!("PARTITION BY {}", cols.join(", ")));
        }

        if !spec.order_by.is_empty() {
            let orders: Vec<String> = spec.order_by.iter().map(|o| self.order_by(o)).collect();
            parts.push(format!("ORDER BY {}", orders.join(", ")));
        }

        if let Some(ref frame) = spec.frame {
            parts.push(window_frame(frame));
        }

        parts.join(" ")
    }

    pub fn order_by(&self, order: &OrderByExpr) -> String {
        let mut s = self.expr(&order.expr);
        match order.asc {
            Some(true) => s.push_str(" ASC"),
            Some(false) => s.push_str(" DESC"),
            None => {}
        }
        match order.nulls_first {
            Some(true) => s.push_str(" NULLS FIRST"),
            Some(false) => s.push_str(" NULLS LAST"),
            None => {}
        }
        s
    }
}

fn flatten_concat<'a>(expr: &'a Expression, out: &mut Vec<&'a Expression>) {
    match expr {
        Expression::BinaryOp {
            left,
            op: BinaryOperator::Concat,
            right,
        } => {
            flatten_concat(left, out);
            flatten_concat(right, out);
        }
        other => out.push(other),
    }
}

pub fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn window_frame(frame: &WindowFrame) -> String {
    let mode = match frame.mode {
        WindowFrameMode::Rows => "ROWS",
        WindowFrameMode::Range => "RANGE",
        WindowFrameMode::Groups => "GROUPS",
    };

    let start = window_frame_bound(&frame.start);

    match &frame.end {
        Some(end) => format!("{} BETWEEN {} AND {}", mode, start, window_frame_bound(end)),
        None => format!("{} {}", mode, start),
    }
}

fn window_frame_bound(bound: &WindowFrameBound) -> String {
    match bound {
        WindowFrameBound::CurrentRow => "CURRENT ROW".to_string(),
        WindowFrameBound::Preceding(None) => "UNBOUNDED PRECEDING".to_string(),
        WindowFrameBound::Preceding(Some(n)) => format!("{} PRECEDING", n),
        WindowFrameBound::Following(None) => "UNBOUNDED FOLLOWING".to_string(),
        WindowFrameBound::Following(Some(n)) => format!("{} FOLLOWING", n),
    }
}
