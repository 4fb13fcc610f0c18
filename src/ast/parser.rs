/// SQL → Unified AST parser.
///
/// Translates SQL text into our internal AST representation using `sqlparser`
/// as the parsing frontend. This decouples our AST from the sqlparser crate,
/// allowing every dialect to be read into one shape and rendered into another.
///
/// Function synonyms and type spellings are canonicalized on the way in so
/// that the generator only has to know how each dialect spells the canonical
/// form. Constructs the AST does not model are kept as [`Expression::Raw`],
/// [`TableRef::Raw`] or [`Query::Raw`] in `sqlparser`'s rendering.
use sqlparser::ast as sp;
use sqlparser::parser::{Parser as SqlParser, ParserError};

use super::types::*;
use crate::dialect::{canonical_type, AutoDialect, Dialect};
use crate::error::{Result, SqlToolError};
use crate::temporal::{split_interval, IntervalUnit};

/// Parse a SQL string into our unified AST.
///
/// `None` reads the input with the generic dialect. An input made only of
/// whitespace and comments yields an empty list.
pub fn parse_sql(sql: &str, dialect: Option<Dialect>) -> Result<Vec<Query>> {
    let statements = match dialect {
        Some(d) => SqlParser::parse_sql(d.parser_dialect().as_ref(), sql),
        None => SqlParser::parse_sql(&AutoDialect::default(), sql),
    }
    .map_err(|e| parse_error(sql, e))?;

    statements.into_iter().map(convert_statement).collect()
}

/// Parse exactly one SQL statement.
pub fn parse_single(sql: &str, dialect: Option<Dialect>) -> Result<Query> {
    let mut queries = parse_sql(sql, dialect)?;
    match queries.len() {
        0 => Err(SqlToolError::parse("No valid SQL statements found")),
        1 => Ok(queries.remove(0)),
        n => Err(SqlToolError::validation(format!(
            "Expected a single SQL statement, found {}",
            n
        ))),
    }
}

const ERROR_PREFIX: &str = "sql parser error: ";
const LOCATION_MARKER: &str = " at Line: ";

fn parse_error(sql: &str, err: ParserError) -> SqlToolError {
    let text = err.to_string();
    let text = text.strip_prefix(ERROR_PREFIX).unwrap_or(&text);
    let (message, reported) = split_location(text);
    let (line, column) = reported.unwrap_or_else(|| locate_failure(sql));
    SqlToolError::Parse {
        message,
        line: Some(line),
        column: Some(column),
    }
}

/// Split `"Expected: ), found: x at Line: 1, Column: 5"` into the message and
/// the reported position.
fn split_location(text: &str) -> (String, Option<(usize, usize)>) {
    let Some(idx) = text.rfind(LOCATION_MARKER) else {
        return (text.to_string(), None);
    };
    let tail = &text[idx + LOCATION_MARKER.len()..];
    let position = tail.split_once(", Column: ").and_then(|(line, column)| {
        let line = line.trim().parse::<usize>().ok()?;
        let column = column.trim().parse::<usize>().ok()?;
        Some((line, column))
    });
    match position {
        Some(pos) if pos.0 > 0 => (text[..idx].to_string(), Some(pos)),
        _ => (text.to_string(), None),
    }
}

/// Position used when the parser gives none: the first unmatched `(`,
/// otherwise just past the last non-blank character.
pub fn locate_failure(sql: &str) -> (usize, usize) {
    if let Some(pos) = first_unclosed_paren(sql) {
        return pos;
    }
    let trimmed = sql.trim_end();
    let line = trimmed.lines().count().max(1);
    let column = trimmed.lines().last().map(|l| l.chars().count()).unwrap_or(0) + 1;
    (line, column)
}

/// 1-based `(line, column)` of the first `(` never closed, skipping string
/// literals, quoted identifiers and comments.
pub fn first_unclosed_paren(sql: &str) -> Option<(usize, usize)> {
    let chars: Vec<char> = sql.chars().collect();
    let mut open: Vec<(usize, usize)> = Vec::new();
    let (mut line, mut column) = (1usize, 1usize);
    let mut i = 0;

    // Advances over one char while keeping line/column current.
    let step = |c: char, line: &mut usize, column: &mut usize| {
        if c == '\n' {
            *line += 1;
            *column = 1;
        } else {
            *column += 1;
        }
    };

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' | '`' => {
                step(c, &mut line, &mut column);
                i += 1;
                while i < chars.len() {
                    let inner = chars[i];
                    step(inner, &mut line, &mut column);
                    i += 1;
                    if inner == c {
                        // Doubled quote is an escaped quote.
                        if i < chars.len() && chars[i] == c {
                            step(c, &mut line, &mut column);
                            i += 1;
                            continue;
                        }
                        break;
                    }
                }
                continue;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    step(chars[i], &mut line, &mut column);
                    i += 1;
                }
                continue;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                step('/', &mut line, &mut column);
                step('*', &mut line, &mut column);
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    step(chars[i], &mut line, &mut column);
                    i += 1;
                }
                if i < chars.len() {
                    step('*', &mut line, &mut column);
                    step('/', &mut line, &mut column);
                    i += 2;
                }
                continue;
            }
            '(' => open.push((line, column)),
            ')' => {
                open.pop();
            }
            _ => {}
        }
        step(c, &mut line, &mut column);
        i += 1;
    }

    open.first().copied()
}

fn convert_statement(stmt: sp::Statement) -> Result<Query> {
    match stmt {
        sp::Statement::Query(q) => convert_query(*q),
        sp::Statement::Insert(insert) if is_plain_insert(&insert) => convert_insert(insert),
        sp::Statement::Update {
            table,
            assignments,
            from: None,
            selection,
            returning,
            or: None,
            ..
        } if table.joins.is_empty() => convert_update(table, assignments, selection, returning),
        sp::Statement::Delete(delete) if is_plain_delete(&delete) => convert_delete(delete),
        other => Ok(raw_statement(&other)),
    }
}

fn raw_statement(stmt: &sp::Statement) -> Query {
    let sql = stmt.to_string();
    let keyword = sql
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase();
    let kind = match keyword.as_str() {
        "INSERT" | "REPLACE" => StatementKind::Insert,
        "UPDATE" => StatementKind::Update,
        "DELETE" => StatementKind::Delete,
        "CREATE" => StatementKind::Create,
        "DROP" => StatementKind::Drop,
        "ALTER" => StatementKind::Alter,
        "MERGE" => StatementKind::Merge,
        "VALUES" => StatementKind::Values,
        _ => StatementKind::Command,
    };
    Query::Raw(RawStatement { kind, sql })
}

fn is_plain_insert(insert: &sp::Insert) -> bool {
    insert.source.is_some()
        && insert.on.is_none()
        && insert.or.is_none()
        && !insert.ignore
        && !insert.overwrite
        && !insert.replace_into
        && insert.partitioned.is_none()
        && insert.table_alias.is_none()
}

fn is_plain_delete(delete: &sp::Delete) -> bool {
    let tables = match &delete.from {
        sp::FromTable::WithFromKeyword(tables) | sp::FromTable::WithoutKeyword(tables) => tables,
    };
    delete.tables.is_empty()
        && delete.using.is_none()
        && delete.order_by.is_empty()
        && delete.limit.is_none()
        && tables.len() == 1
        && tables[0].joins.is_empty()
}

fn convert_query(query: sp::Query) -> Result<Query> {
    let order_by_exprs: Vec<sp::OrderByExpr> =
        query.order_by.map(|ob| ob.exprs).unwrap_or_default();

    // FETCH FIRST n ROWS ONLY is a LIMIT in disguise.
    let limit = match (query.limit, query.fetch) {
        (Some(l), _) => Some(l),
        (None, Some(fetch)) if !fetch.percent && !fetch.with_ties => fetch.quantity,
        _ => None,
    };

    if let Some(with) = query.with {
        let recursive = with.recursive;
        let ctes = with
            .cte_tables
            .into_iter()
            .map(convert_cte)
            .collect::<Result<Vec<_>>>()?;

        let body = convert_set_expr(*query.body)?;
        let body = apply_query_modifiers(body, order_by_exprs, limit, query.offset)?;

        return Ok(Query::With(CTEQuery {
            recursive,
            ctes,
            body: Box::new(body),
        }));
    }

    let body = convert_set_expr(*query.body)?;
    apply_query_modifiers(body, order_by_exprs, limit, query.offset)
}

fn apply_query_modifiers(
    query: Query,
    order_by: Vec<sp::OrderByExpr>,
    limit: Option<sp::Expr>,
    offset: Option<sp::Offset>,
) -> Result<Query> {
    match query {
        Query::Select(mut select) => {
            if !order_by.is_empty() {
                select.order_by = order_by
                    .into_iter()
                    .map(convert_order_by)
                    .collect::<Result<Vec<_>>>()?;
            }
            if let Some(l) = limit {
                select.limit = Some(convert_expr(l)?);
            }
            if let Some(o) = offset {
                select.offset = Some(convert_expr(o.value)?);
            }
            Ok(Query::Select(select))
        }
        Query::Raw(mut raw) => {
            if !order_by.is_empty() {
                let items: Vec<String> = order_by.iter().map(|o| o.to_string()).collect();
                raw.sql.push_str(&format!(" ORDER BY {}", items.join(", ")));
            }
            if let Some(l) = limit {
                raw.sql.push_str(&format!(" LIMIT {}", l));
            }
            if let Some(o) = offset {
                raw.sql.push_str(&format!(" {}", o));
            }
            Ok(Query::Raw(raw))
        }
        other => Ok(other),
    }
}

fn convert_cte(cte: sp::Cte) -> Result<CTE> {
    let columns = cte
        .alias
        .columns
        .iter()
        .map(|c| c.name.value.clone())
        .collect();
    Ok(CTE {
        name: cte.alias.name.value.clone(),
        columns,
        query: convert_query(*cte.query)?,
    })
}

fn convert_set_expr(expr: sp::SetExpr) -> Result<Query> {
    match expr {
        sp::SetExpr::Select(select) => convert_select(*select),
        sp::SetExpr::Query(query) => convert_query(*query),
        sp::SetExpr::SetOperation {
            op,
            set_quantifier,
            left,
            right,
            ..
        } => {
            let op = match op {
                sp::SetOperator::Union => SetOperator::Union,
                sp::SetOperator::Intersect => SetOperator::Intersect,
                // EXCEPT and Oracle's MINUS
                _ => SetOperator::Except,
            };
            let all = matches!(
                set_quantifier,
                sp::SetQuantifier::All | sp::SetQuantifier::AllByName
            );

            let mut head = chain_operand(convert_set_expr(*left)?, true);
            let right = chain_operand(convert_set_expr(*right)?, false);
            attach_set_op(
                &mut head,
                SetOperation {
                    op,
                    all,
                    right: Query::Select(right),
                },
            );
            Ok(Query::Select(head))
        }
        sp::SetExpr::Values(values) => Ok(Query::Raw(RawStatement {
            kind: StatementKind::Values,
            sql: values.to_string(),
        })),
        other => Ok(Query::Raw(RawStatement {
            kind: StatementKind::Command,
            sql: other.to_string(),
        })),
    }
}

/// Prepare a set-operation operand for left-to-right chaining. Operands whose
/// own modifiers would otherwise leak onto the combined result are wrapped
/// in a derived table.
fn chain_operand(query: Query, is_head: bool) -> Box<SelectQuery> {
    match query {
        Query::Select(select)
            if select.order_by.is_empty()
                && select.limit.is_none()
                && select.offset.is_none()
                && (is_head || select.set_op.is_none()) =>
        {
            select
        }
        other => Box::new(SelectQuery {
            projections: vec![SelectItem::Wildcard],
            from: vec![TableRef::Subquery {
                query: Box::new(other),
                alias: "_q".into(),
            }],
            ..Default::default()
        }),
    }
}

/// Append `op` to the end of the chain starting at `select`.
fn attach_set_op(select: &mut SelectQuery, op: SetOperation) {
    match select.set_op.as_mut() {
        Some(existing) => {
            if !matches!(existing.right, Query::Select(_)) {
                let inner = std::mem::replace(&mut existing.right, Query::Select(Box::default()));
                existing.right = Query::Select(chain_operand(inner, false));
            }
            if let Query::Select(right) = &mut existing.right {
                attach_set_op(right, op);
            }
        }
        None => select.set_op = Some(Box::new(op)),
    }
}

/// SELECT features the unified AST has no slot for.
fn needs_passthrough(select: &sp::Select) -> bool {
    let odd_top = select
        .top
        .as_ref()
        .map(|t| t.percent || t.with_ties || t.quantity.is_none())
        .unwrap_or(false);
    odd_top
        || select.into.is_some()
        || !select.lateral_views.is_empty()
        || select.prewhere.is_some()
        || select.qualify.is_some()
        || select.connect_by.is_some()
        || !select.cluster_by.is_empty()
        || !select.distribute_by.is_empty()
        || !select.sort_by.is_empty()
        || matches!(select.distinct, Some(sp::Distinct::On(_)))
        || select
            .from
            .iter()
            .flat_map(|twj| twj.joins.iter())
            .any(|j| !is_modeled_join(&j.join_operator))
}

fn is_modeled_join(op: &sp::JoinOperator) -> bool {
    matches!(
        op,
        sp::JoinOperator::Inner(_)
            | sp::JoinOperator::LeftOuter(_)
            | sp::JoinOperator::RightOuter(_)
            | sp::JoinOperator::FullOuter(_)
            | sp::JoinOperator::CrossJoin
            | sp::JoinOperator::CrossApply
    )
}

fn convert_select(select: sp::Select) -> Result<Query> {
    if needs_passthrough(&select) {
        return Ok(Query::Raw(RawStatement {
            kind: StatementKind::Select,
            sql: select.to_string(),
        }));
    }

    let distinct = select.distinct.is_some();

    let limit = match select.top.and_then(|t| t.quantity) {
        Some(sp::TopQuantity::Constant(n)) => Some(match i64::try_from(n) {
            Ok(v) => Expression::Literal(Literal::Integer(v)),
            Err(_) => Expression::Raw(n.to_string()),
        }),
        Some(sp::TopQuantity::Expr(e)) => Some(convert_expr(e)?),
        None => None,
    };

    let projections = select
        .projection
        .into_iter()
        .map(convert_select_item)
        .collect::<Result<Vec<_>>>()?;

    let from = select
        .from
        .into_iter()
        .map(convert_table_with_joins)
        .collect::<Result<Vec<_>>>()?;

    // Flatten: first element is the table, rest are joins
    let (tables, join_lists): (Vec<_>, Vec<_>) = from.into_iter().unzip();

    let joins: Vec<Join> = join_lists.into_iter().flatten().collect();

    let filter = select.selection.map(convert_expr).transpose()?;

    let group_by = match select.group_by {
        sp::GroupByExpr::Expressions(exprs, _modifiers) => exprs
            .into_iter()
            .map(convert_expr)
            .collect::<Result<Vec<_>>>()?,
        sp::GroupByExpr::All(_) => vec![],
    };

    let having = select.having.map(convert_expr).transpose()?;

    let windows = select
        .named_window
        .into_iter()
        .map(|nw| {
            let spec = convert_window_spec_from_named(nw.1);
            Ok(NamedWindowSpec {
                name: nw.0.value.clone(),
                spec: spec?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Query::Select(Box::new(SelectQuery {
        distinct,
        projections,
        from: tables,
        joins,
        filter,
        group_by,
        having,
        windows,
        order_by: vec![],
        limit,
        offset: None,
        set_op: None,
    })))
}

fn convert_table_with_joins(twj: sp::TableWithJoins) -> Result<(TableRef, Vec<Join>)> {
    let table = convert_table_factor(twj.relation)?;
    let joins = twj
        .joins
        .into_iter()
        .map(convert_join)
        .collect::<Result<Vec<_>>>()?;
    Ok((table, joins))
}

/// Split `a.b.c` into schema `a.b` and name `c`.
fn split_object_name(name: &sp::ObjectName) -> (Option<String>, String) {
    let mut parts: Vec<String> = name.0.iter().map(|p| p.value.clone()).collect();
    let last = parts.pop().unwrap_or_default();
    let schema = if parts.is_empty() {
        None
    } else {
        Some(parts.join("."))
    };
    (schema, last)
}

fn convert_table_factor(tf: sp::TableFactor) -> Result<TableRef> {
    match tf {
        sp::TableFactor::Table {
            ref name,
            ref alias,
            ref args,
            ref with_hints,
            ..
        } if args.is_none()
            && with_hints.is_empty()
            && alias.as_ref().map_or(true, |a| a.columns.is_empty()) =>
        {
            let (schema, table_name) = split_object_name(name);
            Ok(TableRef::Table {
                schema,
                name: table_name,
                alias: alias.as_ref().map(|a| a.name.value.clone()),
            })
        }
        sp::TableFactor::Derived {
            lateral: false,
            subquery,
            alias,
        } if alias.as_ref().map_or(true, |a| a.columns.is_empty()) => {
            let alias_name = alias
                .map(|a| a.name.value)
                .unwrap_or_else(|| "_subquery".into());
            Ok(TableRef::Subquery {
                query: Box::new(convert_query(*subquery)?),
                alias: alias_name,
            })
        }
        other => Ok(TableRef::Raw(other.to_string())),
    }
}

fn convert_join(join: sp::Join) -> Result<Join> {
    let join_type = match &join.join_operator {
        sp::JoinOperator::Inner(_) => JoinType::Inner,
        sp::JoinOperator::LeftOuter(_) => JoinType::Left,
        sp::JoinOperator::RightOuter(_) => JoinType::Right,
        sp::JoinOperator::FullOuter(_) => JoinType::Full,
        sp::JoinOperator::CrossJoin => JoinType::Cross,
        // Only reachable for operators `is_modeled_join` accepts.
        _ => JoinType::Lateral,
    };

    let condition = match &join.join_operator {
        sp::JoinOperator::Inner(c)
        | sp::JoinOperator::LeftOuter(c)
        | sp::JoinOperator::RightOuter(c)
        | sp::JoinOperator::FullOuter(c) => convert_join_constraint(c)?,
        _ => None,
    };

    Ok(Join {
        join_type,
        table: convert_table_factor(join.relation)?,
        condition,
    })
}

fn convert_join_constraint(constraint: &sp::JoinConstraint) -> Result<Option<JoinCondition>> {
    match constraint {
        sp::JoinConstraint::On(expr) => Ok(Some(JoinCondition::On(convert_expr(expr.clone())?))),
        sp::JoinConstraint::Using(cols) => Ok(Some(JoinCondition::Using(
            cols.iter().map(|c| c.value.clone()).collect(),
        ))),
        sp::JoinConstraint::Natural => Ok(Some(JoinCondition::Natural)),
        sp::JoinConstraint::None => Ok(None),
    }
}

fn convert_select_item(item: sp::SelectItem) -> Result<SelectItem> {
    match item {
        sp::SelectItem::UnnamedExpr(expr) => Ok(SelectItem::Expression {
            expr: convert_expr(expr)?,
            alias: None,
        }),
        sp::SelectItem::ExprWithAlias { expr, alias } => Ok(SelectItem::Expression {
            expr: convert_expr(expr)?,
            alias: Some(alias.value),
        }),
        sp::SelectItem::Wildcard(_) => Ok(SelectItem::Wildcard),
        sp::SelectItem::QualifiedWildcard(name, _) => {
            let parts: Vec<String> = name.0.iter().map(|p| p.value.clone()).collect();
            Ok(SelectItem::QualifiedWildcard(parts.join(".")))
        }
    }
}

fn boxed(expr: sp::Expr) -> Result<Box<Expression>> {
    convert_expr(expr).map(Box::new)
}

fn convert_expr(expr: sp::Expr) -> Result<Expression> {
    match expr {
        sp::Expr::Identifier(ident) => Ok(Expression::Column {
            table: None,
            name: ident.value,
        }),
        sp::Expr::CompoundIdentifier(parts) => {
            let mut names: Vec<String> = parts.into_iter().map(|p| p.value).collect();
            let name = names.pop().unwrap_or_default();
            let table = if names.is_empty() {
                None
            } else {
                Some(names.join("."))
            };
            Ok(Expression::Column { table, name })
        }
        sp::Expr::Value(val) => Ok(convert_value(val)),
        sp::Expr::BinaryOp { left, op, right } => match convert_binary_op(&op) {
            Some(converted) => Ok(Expression::BinaryOp {
                left: boxed(*left)?,
                op: converted,
                right: boxed(*right)?,
            }),
            None => Ok(Expression::Raw(
                sp::Expr::BinaryOp { left, op, right }.to_string(),
            )),
        },
        sp::Expr::UnaryOp { op, expr } => {
            let converted = match op {
                sp::UnaryOperator::Not => UnaryOperator::Not,
                sp::UnaryOperator::Minus => UnaryOperator::Minus,
                sp::UnaryOperator::Plus => UnaryOperator::Plus,
                _ => return Ok(Expression::Raw(sp::Expr::UnaryOp { op, expr }.to_string())),
            };
            Ok(Expression::UnaryOp {
                op: converted,
                expr: boxed(*expr)?,
            })
        }
        sp::Expr::Function(func) => convert_function(func),
        sp::Expr::Case {
            operand,
            conditions,
            results,
            else_result,
        } => {
            let when_clauses = conditions
                .into_iter()
                .zip(results)
                .map(|(c, r)| Ok((convert_expr(c)?, convert_expr(r)?)))
                .collect::<Result<Vec<_>>>()?;
            Ok(Expression::Case {
                operand: operand.map(|o| boxed(*o)).transpose()?,
                when_clauses,
                else_clause: else_result.map(|e| boxed(*e)).transpose()?,
            })
        }
        sp::Expr::Subquery(q) => Ok(Expression::Subquery(Box::new(convert_query(*q)?))),
        sp::Expr::Exists { subquery, negated } => {
            let exists = Expression::Exists(Box::new(convert_query(*subquery)?));
            if negated {
                Ok(Expression::not(exists))
            } else {
                Ok(exists)
            }
        }
        sp::Expr::InList {
            expr,
            list,
            negated,
        } => Ok(Expression::InList {
            expr: boxed(*expr)?,
            list: list
                .into_iter()
                .map(convert_expr)
                .collect::<Result<Vec<_>>>()?,
            negated,
        }),
        sp::Expr::InSubquery {
            expr,
            subquery,
            negated,
        } => Ok(Expression::InSubquery {
            expr: boxed(*expr)?,
            subquery: Box::new(convert_query(*subquery)?),
            negated,
        }),
        sp::Expr::Between {
            expr,
            negated,
            low,
            high,
        } => Ok(Expression::Between {
            expr: boxed(*expr)?,
            low: boxed(*low)?,
            high: boxed(*high)?,
            negated,
        }),
        sp::Expr::IsNull(expr) => Ok(Expression::IsNull {
            expr: boxed(*expr)?,
            negated: false,
        }),
        sp::Expr::IsNotNull(expr) => Ok(Expression::IsNull {
            expr: boxed(*expr)?,
            negated: true,
        }),
        sp::Expr::IsTrue(expr) => is_bool(*expr, true, false),
        sp::Expr::IsNotTrue(expr) => is_bool(*expr, true, true),
        sp::Expr::IsFalse(expr) => is_bool(*expr, false, false),
        sp::Expr::IsNotFalse(expr) => is_bool(*expr, false, true),
        sp::Expr::Cast {
            kind: sp::CastKind::Cast,
            expr,
            data_type,
            format: None,
        } => Ok(Expression::Cast {
            expr: boxed(*expr)?,
            data_type: canonical_type(&data_type.to_string()),
        }),
        sp::Expr::Cast {
            kind: sp::CastKind::DoubleColon,
            expr,
            data_type,
            format: None,
        } => Ok(Expression::TypeCast {
            expr: boxed(*expr)?,
            data_type: canonical_type(&data_type.to_string()),
        }),
        sp::Expr::Nested(expr) => Ok(Expression::Nested(boxed(*expr)?)),
        sp::Expr::Like {
            negated,
            expr,
            pattern,
            escape_char: None,
            ..
        } => {
            let op = if negated {
                BinaryOperator::NotLike
            } else {
                BinaryOperator::Like
            };
            Ok(Expression::binary(convert_expr(*expr)?, op, convert_expr(*pattern)?))
        }
        sp::Expr::ILike {
            negated,
            expr,
            pattern,
            escape_char: None,
            ..
        } => {
            let op = if negated {
                BinaryOperator::NotILike
            } else {
                BinaryOperator::ILike
            };
            Ok(Expression::binary(convert_expr(*expr)?, op, convert_expr(*pattern)?))
        }
        sp::Expr::Array(arr) => {
            let elems = arr
                .elem
                .into_iter()
                .map(convert_expr)
                .collect::<Result<Vec<_>>>()?;
            Ok(Expression::Array(elems))
        }
        sp::Expr::JsonAccess { value, path } => convert_json_access(*value, path),
        sp::Expr::Interval(interval) => convert_interval(interval),
        sp::Expr::TypedString { ref data_type, .. } => {
            let data_type = canonical_type(&data_type.to_string());
            match quoted_payload(&expr.to_string()) {
                Some(value) => Ok(Expression::TypedString { data_type, value }),
                None => Ok(Expression::Raw(expr.to_string())),
            }
        }
        sp::Expr::Substring {
            expr,
            substring_from: Some(from),
            substring_for,
            ..
        } => {
            let mut args = vec![convert_expr(*expr)?, convert_expr(*from)?];
            if let Some(len) = substring_for {
                args.push(convert_expr(*len)?);
            }
            Ok(Expression::Function {
                name: "SUBSTRING".into(),
                args,
                distinct: false,
            })
        }
        sp::Expr::Ceil {
            expr,
            field: sp::CeilFloorKind::DateTimeField(sp::DateTimeField::NoDateTime),
        } => Ok(Expression::Function {
            name: "CEIL".into(),
            args: vec![convert_expr(*expr)?],
            distinct: false,
        }),
        sp::Expr::Floor {
            expr,
            field: sp::CeilFloorKind::DateTimeField(sp::DateTimeField::NoDateTime),
        } => Ok(Expression::Function {
            name: "FLOOR".into(),
            args: vec![convert_expr(*expr)?],
            distinct: false,
        }),
        // Fallback: keep sqlparser's rendering.
        other => Ok(Expression::Raw(other.to_string())),
    }
}

fn is_bool(expr: sp::Expr, value: bool, negated: bool) -> Result<Expression> {
    Ok(Expression::IsBool {
        expr: boxed(expr)?,
        value,
        negated,
    })
}

/// Text between the first and last single quote of `DATE '2020-01-01'`.
fn quoted_payload(rendered: &str) -> Option<String> {
    let start = rendered.find('\'')?;
    let end = rendered.rfind('\'')?;
    if end <= start {
        return None;
    }
    Some(rendered[start + 1..end].replace("''", "'"))
}

fn convert_interval(interval: sp::Interval) -> Result<Expression> {
    let rendered = interval.to_string();
    if interval.last_field.is_some()
        || interval.leading_precision.is_some()
        || interval.fractional_seconds_precision.is_some()
    {
        return Ok(Expression::Raw(rendered));
    }

    match interval.leading_field {
        Some(field) => {
            let field = field.to_string();
            let unit = IntervalUnit::parse(&field)
                .map(|u| u.keyword().to_string())
                .unwrap_or(field);
            Ok(Expression::Interval {
                value: boxed(*interval.value)?,
                unit: Some(unit),
            })
        }
        None => {
            // `INTERVAL '30 days'` carries the unit inside the string.
            if let sp::Expr::Value(sp::Value::SingleQuotedString(text)) = interval.value.as_ref() {
                if let Some((amount, unit)) = split_interval(text) {
                    return Ok(Expression::Interval {
                        value: Box::new(Expression::Literal(Literal::String(amount.to_string()))),
                        unit: Some(unit.keyword().to_string()),
                    });
                }
            }
            Ok(Expression::Interval {
                value: boxed(*interval.value)?,
                unit: None,
            })
        }
    }
}

fn convert_json_access(value: sp::Expr, path: sp::JsonPath) -> Result<Expression> {
    let base = convert_expr(value)?;
    let mut current = base;

    for element in path.path {
        match element {
            sp::JsonPathElem::Dot { key, .. } => {
                current = Expression::JsonAccess {
                    expr: Box::new(current),
                    path: Box::new(Expression::Literal(Literal::String(key))),
                    as_text: false,
                };
            }
            sp::JsonPathElem::Bracket { key } => {
                current = Expression::JsonAccess {
                    expr: Box::new(current),
                    path: boxed(key)?,
                    as_text: false,
                };
            }
        }
    }

    Ok(current)
}

fn convert_value(val: sp::Value) -> Expression {
    match val {
        sp::Value::Null => Expression::Literal(Literal::Null),
        sp::Value::Boolean(b) => Expression::Literal(Literal::Boolean(b)),
        sp::Value::Number(n, _) => {
            let is_integral = n.chars().all(|c| c.is_ascii_digit());
            if let Ok(i) = n.parse::<i64>() {
                Expression::Literal(Literal::Integer(i))
            } else if is_integral {
                // Wider than i64: keep the digits as written.
                Expression::Raw(n)
            } else if let Ok(f) = n.parse::<f64>() {
                Expression::Literal(Literal::Float(f))
            } else {
                Expression::Raw(n)
            }
        }
        sp::Value::SingleQuotedString(s)
        | sp::Value::DoubleQuotedString(s)
        | sp::Value::NationalStringLiteral(s) => Expression::Literal(Literal::String(s)),
        sp::Value::Placeholder(p) => {
            // Parse $1, $2, etc.
            if let Some(idx) = p.strip_prefix('$').and_then(|n| n.parse::<usize>().ok()) {
                return Expression::Parameter(idx);
            }
            Expression::Raw(p)
        }
        other => Expression::Raw(other.to_string()),
    }
}

fn convert_binary_op(op: &sp::BinaryOperator) -> Option<BinaryOperator> {
    match op {
        sp::BinaryOperator::Eq => Some(BinaryOperator::Eq),
        sp::BinaryOperator::NotEq => Some(BinaryOperator::NotEq),
        sp::BinaryOperator::Lt => Some(BinaryOperator::Lt),
        sp::BinaryOperator::LtEq => Some(BinaryOperator::LtEq),
        sp::BinaryOperator::Gt => Some(BinaryOperator::Gt),
        sp::BinaryOperator::GtEq => Some(BinaryOperator::GtEq),
        sp::BinaryOperator::And => Some(BinaryOperator::And),
        sp::BinaryOperator::Or => Some(BinaryOperator::Or),
        sp::BinaryOperator::Plus => Some(BinaryOperator::Plus),
        sp::BinaryOperator::Minus => Some(BinaryOperator::Minus),
        sp::BinaryOperator::Multiply => Some(BinaryOperator::Multiply),
        sp::BinaryOperator::Divide => Some(BinaryOperator::Divide),
        sp::BinaryOperator::Modulo => Some(BinaryOperator::Modulo),
        sp::BinaryOperator::StringConcat => Some(BinaryOperator::Concat),
        _ => None,
    }
}

/// Canonical spelling of a function name across dialects.
pub fn canonical_function(name: &str) -> String {
    let upper = name.to_uppercase();
    let canonical = match upper.as_str() {
        "IFNULL" | "NVL" | "ISNULL" => "COALESCE",
        "SUBSTR" => "SUBSTRING",
        "LEN" | "CHAR_LENGTH" | "CHARACTER_LENGTH" => "LENGTH",
        "NOW" | "GETDATE" | "SYSDATE" | "SYSDATETIME" => "CURRENT_TIMESTAMP",
        "GROUP_CONCAT" | "LISTAGG" => "STRING_AGG",
        "CEILING" => "CEIL",
        "RAND" => "RANDOM",
        "POW" => "POWER",
        "LCASE" => "LOWER",
        "UCASE" => "UPPER",
        other => other,
    };
    canonical.to_string()
}

fn is_aggregate_name(name: &str) -> bool {
    matches!(
        name,
        "COUNT"
            | "SUM"
            | "AVG"
            | "MIN"
            | "MAX"
            | "ARRAY_AGG"
            | "STRING_AGG"
            | "BOOL_AND"
            | "BOOL_OR"
            | "STDDEV"
            | "VARIANCE"
    )
}

/// Function shapes that only survive verbatim: named arguments, argument
/// clauses (`ORDER BY` inside the call, `SEPARATOR`), `WITHIN GROUP`, named
/// window references and frames with non-numeric bounds.
fn function_needs_passthrough(func: &sp::Function) -> bool {
    let odd_args = match &func.args {
        sp::FunctionArguments::List(list) => {
            !list.clauses.is_empty()
                || list.args.iter().any(|a| {
                    !matches!(
                        a,
                        sp::FunctionArg::Unnamed(
                            sp::FunctionArgExpr::Expr(_) | sp::FunctionArgExpr::Wildcard
                        )
                    )
                })
        }
        sp::FunctionArguments::None => false,
        sp::FunctionArguments::Subquery(_) => false,
    };
    let odd_window = match &func.over {
        Some(sp::WindowType::NamedWindow(_)) => true,
        Some(sp::WindowType::WindowSpec(spec)) => {
            spec.window_name.is_some()
                || spec
                    .window_frame
                    .as_ref()
                    .map_or(false, |f| !frame_is_simple(f))
        }
        None => false,
    };
    let odd_filter = func.filter.is_some()
        && !is_aggregate_name(&canonical_function(&func.name.to_string()));
    odd_args
        || odd_window
        || odd_filter
        || !func.within_group.is_empty()
        || func.null_treatment.is_some()
        || !matches!(func.parameters, sp::FunctionArguments::None)
        || func.name.0.len() > 1
}

fn frame_is_simple(frame: &sp::WindowFrame) -> bool {
    let simple = |bound: &sp::WindowFrameBound| match bound {
        sp::WindowFrameBound::CurrentRow
        | sp::WindowFrameBound::Preceding(None)
        | sp::WindowFrameBound::Following(None) => true,
        sp::WindowFrameBound::Preceding(Some(e)) | sp::WindowFrameBound::Following(Some(e)) => {
            matches!(e.as_ref(), sp::Expr::Value(sp::Value::Number(..)))
        }
    };
    simple(&frame.start_bound) && frame.end_bound.as_ref().map_or(true, simple)
}

fn convert_function(func: sp::Function) -> Result<Expression> {
    if function_needs_passthrough(&func) {
        return Ok(Expression::Raw(func.to_string()));
    }

    let name = canonical_function(&func.name.to_string());

    let (args, distinct) = match func.args {
        sp::FunctionArguments::List(arg_list) => {
            let distinct = matches!(
                arg_list.duplicate_treatment,
                Some(sp::DuplicateTreatment::Distinct)
            );
            let args = arg_list
                .args
                .into_iter()
                .filter_map(|a| match a {
                    sp::FunctionArg::Unnamed(sp::FunctionArgExpr::Expr(e)) => Some(convert_expr(e)),
                    sp::FunctionArg::Unnamed(sp::FunctionArgExpr::Wildcard) => {
                        Some(Ok(Expression::Wildcard))
                    }
                    _ => None,
                })
                .collect::<Result<Vec<_>>>()?;
            (args, distinct)
        }
        sp::FunctionArguments::None => (vec![], false),
        sp::FunctionArguments::Subquery(q) => (
            vec![Expression::Subquery(Box::new(convert_query(*q)?))],
            false,
        ),
    };

    let is_aggregate = is_aggregate_name(&name);
    let filter = func.filter.map(|f| boxed(*f)).transpose()?;

    if let Some(sp::WindowType::WindowSpec(spec)) = func.over {
        let window = convert_window_spec(spec)?;
        let function = if is_aggregate {
            Expression::Aggregate {
                name,
                args,
                distinct,
                filter,
            }
        } else {
            Expression::Function {
                name,
                args,
                distinct,
            }
        };
        return Ok(Expression::WindowFunction {
            function: Box::new(function),
            window,
        });
    }

    if is_aggregate {
        Ok(Expression::Aggregate {
            name,
            args,
            distinct,
            filter,
        })
    } else {
        Ok(Expression::Function {
            name,
            args,
            distinct,
        })
    }
}

fn convert_window_spec(spec: sp::WindowSpec) -> Result<WindowSpec> {
    let partition_by = spec
        .partition_by
        .into_iter()
        .map(convert_expr)
        .collect::<Result<Vec<_>>>()?;

    let order_by = spec
        .order_by
        .into_iter()
        .map(convert_order_by)
        .collect::<Result<Vec<_>>>()?;

    let frame = spec.window_frame.map(convert_window_frame);

    Ok(WindowSpec {
        partition_by,
        order_by,
        frame,
    })
}

fn convert_window_spec_from_named(spec: sp::NamedWindowExpr) -> Result<WindowSpec> {
    match spec {
        sp::NamedWindowExpr::NamedWindow(_ident) => Ok(WindowSpec {
            partition_by: vec![],
            order_by: vec![],
            frame: None,
        }),
        sp::NamedWindowExpr::WindowSpec(spec) => convert_window_spec(spec),
    }
}

fn convert_window_frame(frame: sp::WindowFrame) -> WindowFrame {
    let mode = match frame.units {
        sp::WindowFrameUnits::Rows => WindowFrameMode::Rows,
        sp::WindowFrameUnits::Range => WindowFrameMode::Range,
        sp::WindowFrameUnits::Groups => WindowFrameMode::Groups,
    };

    WindowFrame {
        mode,
        start: convert_window_frame_bound(frame.start_bound),
        end: frame.end_bound.map(convert_window_frame_bound),
    }
}

fn frame_offset(expr: &sp::Expr) -> Option<u64> {
    match expr {
        sp::Expr::Value(sp::Value::Number(n, _)) => n.parse().ok(),
        _ => None,
    }
}

fn convert_window_frame_bound(bound: sp::WindowFrameBound) -> WindowFrameBound {
    match bound {
        sp::WindowFrameBound::CurrentRow => WindowFrameBound::CurrentRow,
        sp::WindowFrameBound::Preceding(e) => {
            WindowFrameBound::Preceding(e.as_deref().and_then(frame_offset))
        }
        sp::WindowFrameBound::Following(e) => {
            WindowFrameBound::Following(e.as_deref().and_then(frame_offset))
        }
    }
}

fn convert_order_by(order: sp::OrderByExpr) -> Result<OrderByExpr> {
    Ok(OrderByExpr {
        expr: convert_expr(order.expr)?,
        asc: order.asc,
        nulls_first: order.nulls_first,
    })
}

fn convert_returning(returning: Option<Vec<sp::SelectItem>>) -> Result<Vec<SelectItem>> {
    returning
        .unwrap_or_default()
        .into_iter()
        .map(convert_select_item)
        .collect()
}

fn convert_insert(insert: sp::Insert) -> Result<Query> {
    let (schema, name) = split_object_name(&insert.table_name);
    let table = TableRef::Table {
        schema,
        name,
        alias: None,
    };

    let columns: Vec<String> = insert.columns.iter().map(|c| c.value.clone()).collect();

    let source = match insert.source {
        Some(src) => {
            let is_values =
                matches!(src.body.as_ref(), sp::SetExpr::Values(_)) && src.with.is_none();
            if is_values {
                match *src.body {
                    sp::SetExpr::Values(values) => {
                        let rows = values
                            .rows
                            .into_iter()
                            .map(|row| row.into_iter().map(convert_expr).collect::<Result<Vec<_>>>())
                            .collect::<Result<Vec<_>>>()?;
                        InsertSource::Values(rows)
                    }
                    other => InsertSource::Query(Box::new(convert_set_expr(other)?)),
                }
            } else {
                InsertSource::Query(Box::new(convert_query(*src)?))
            }
        }
        None => InsertSource::Values(vec![]),
    };

    Ok(Query::Insert(InsertQuery {
        table,
        columns,
        source,
        returning: convert_returning(insert.returning)?,
    }))
}

fn convert_update(
    table: sp::TableWithJoins,
    assignments: Vec<sp::Assignment>,
    selection: Option<sp::Expr>,
    returning: Option<Vec<sp::SelectItem>>,
) -> Result<Query> {
    let table_ref = convert_table_factor(table.relation)?;

    let assigns = assignments
        .into_iter()
        .map(|a| {
            let column = a.target.to_string();
            Ok(Assignment {
                column,
                value: convert_expr(a.value)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let filter = selection.map(convert_expr).transpose()?;

    Ok(Query::Update(UpdateQuery {
        table: table_ref,
        assignments: assigns,
        filter,
        returning: convert_returning(returning)?,
    }))
}

fn convert_delete(delete: sp::Delete) -> Result<Query> {
    let from_tables = match delete.from {
        sp::FromTable::WithFromKeyword(tables) => tables,
        sp::FromTable::WithoutKeyword(tables) => tables,
    };

    let table_ref = match from_tables.into_iter().next() {
        Some(twj) => convert_table_factor(twj.relation)?,
        None => return Err(SqlToolError::parse("DELETE without table reference")),
    };

    let filter = delete.selection.map(convert_expr).transpose()?;

    Ok(Query::Delete(DeleteQuery {
        table: table_ref,
        filter,
        returning: convert_returning(delete.returning)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(sql: &str) -> Query {
        parse_single(sql, None).unwrap()
    }

    fn first_projection(q: &Query) -> &Expression {
        match q {
            Query::Select(s) => match &s.projections[0] {
                SelectItem::Expression { expr, .. } => expr,
                _ => panic!("Expected expression"),
            },
            _ => panic!("Expected Select query"),
        }
    }

    #[test]
    fn test_parse_simple_select() {
        match single("SELECT * FROM users") {
            Query::Select(s) => {
                assert_eq!(s.projections.len(), 1);
                assert!(matches!(s.projections[0], SelectItem::Wildcard));
                assert_eq!(s.from.len(), 1);
            }
            _ => panic!("Expected Select query"),
        }
    }

    #[test]
    fn test_parse_select_with_join() {
        let q = single("SELECT u.name, o.total FROM users u JOIN orders o ON u.id = o.user_id");
        match q {
            Query::Select(s) => {
                assert_eq!(s.joins.len(), 1);
                assert!(matches!(s.joins[0].join_type, JoinType::Inner));
                assert_eq!(s.from[0].qualifier(), Some("u"));
            }
            _ => panic!("Expected Select query"),
        }
    }

    #[test]
    fn test_parse_select_with_group_by() {
        let q = single(
            "SELECT department, COUNT(*) FROM employees GROUP BY department HAVING COUNT(*) > 5",
        );
        match q {
            Query::Select(s) => {
                assert_eq!(s.group_by.len(), 1);
                assert!(s.having.is_some());
                assert!(s.has_aggregates());
            }
            _ => panic!("Expected Select query"),
        }
    }

    #[test]
    fn test_parse_cte() {
        let q = single("WITH active AS (SELECT * FROM users WHERE active = true) SELECT * FROM active");
        match q {
            Query::With(cte) => {
                assert!(!cte.recursive);
                assert_eq!(cte.ctes.len(), 1);
                assert_eq!(cte.ctes[0].name, "active");
            }
            _ => panic!("Expected CTE query"),
        }
    }

    #[test]
    fn test_parse_recursive_cte() {
        let q = single(
            "WITH RECURSIVE nums AS (SELECT 1 AS n UNION ALL SELECT n + 1 FROM nums WHERE n < 10) SELECT * FROM nums",
        );
        match q {
            Query::With(cte) => assert!(cte.recursive),
            _ => panic!("Expected CTE query"),
        }
    }

    #[test]
    fn test_parse_window_function() {
        let q = single(
            "SELECT name, ROW_NUMBER() OVER (PARTITION BY dept ORDER BY salary DESC) FROM employees",
        );
        match q {
            Query::Select(s) => match &s.projections[1] {
                SelectItem::Expression { expr, .. } => {
                    assert!(matches!(expr, Expression::WindowFunction { .. }));
                }
                _ => panic!("Expected window function expression"),
            },
            _ => panic!("Expected Select query"),
        }
    }

    #[test]
    fn test_parse_insert_update_delete() {
        match single("INSERT INTO users (name, email) VALUES ('John', 'john@example.com')") {
            Query::Insert(i) => {
                assert_eq!(i.columns.len(), 2);
                assert!(matches!(&i.source, InsertSource::Values(rows) if rows.len() == 1));
            }
            _ => panic!("Expected Insert query"),
        }
        match single("UPDATE users SET name = 'Jane' WHERE id = 1") {
            Query::Update(u) => {
                assert_eq!(u.assignments[0].column, "name");
                assert!(u.filter.is_some());
            }
            _ => panic!("Expected Update query"),
        }
        assert!(matches!(single("DELETE FROM users WHERE id = 1"), Query::Delete(_)));
    }

    #[test]
    fn test_parse_ddl_is_raw() {
        let q = single("CREATE TABLE t (id INT)");
        assert_eq!(q.kind(), StatementKind::Create);
        assert!(matches!(q, Query::Raw(_)));
        assert_eq!(single("DROP TABLE t").kind(), StatementKind::Drop);
    }

    #[test]
    fn test_parse_multiple_statements() {
        assert_eq!(parse_sql("SELECT 1; SELECT 2", None).unwrap().len(), 2);
        assert!(parse_sql("-- nothing here", None).unwrap().is_empty());
    }

    #[test]
    fn test_parse_single_rejects_counts() {
        let err = parse_single("  ", None).unwrap_err();
        assert_eq!(err.error_type(), "ParseError");
        let err = parse_single("SELECT 1; SELECT 2", None).unwrap_err();
        assert_eq!(err.error_type(), "ValidationError");
    }

    #[test]
    fn test_parse_invalid_sql_has_position() {
        let err = parse_single("SELCT * FORM users", None).unwrap_err();
        assert_eq!(err.error_type(), "ParseError");
        assert_eq!(err.position(), Some((1, 1)));
        assert!(!err.to_string().starts_with("sql parser error"));
    }

    #[test]
    fn test_unclosed_paren_position() {
        let err =
            parse_single("SELECT * FROM users WHERE (id = 1 AND name = 'John'", None).unwrap_err();
        assert_eq!(err.position(), Some((1, 27)));
    }

    #[test]
    fn test_first_unclosed_paren_skips_literals() {
        assert_eq!(first_unclosed_paren("SELECT '(' FROM t"), None);
        assert_eq!(first_unclosed_paren("SELECT 1 -- (\nFROM t"), None);
        assert_eq!(first_unclosed_paren("SELECT /* ( */ (1"), Some((1, 16)));
        assert_eq!(first_unclosed_paren("SELECT\n  (1 + (2)"), Some((2, 3)));
    }

    #[test]
    fn test_parse_union_chain_left_to_right() {
        let q = single("SELECT 1 UNION SELECT 2 EXCEPT SELECT 3");
        match q {
            Query::Select(s) => {
                let first = s.set_op.as_ref().unwrap();
                assert_eq!(first.op, SetOperator::Union);
                match &first.right {
                    Query::Select(right) => {
                        let second = right.set_op.as_ref().unwrap();
                        assert_eq!(second.op, SetOperator::Except);
                    }
                    _ => panic!("Expected chained select"),
                }
            }
            _ => panic!("Expected Select query"),
        }
    }

    #[test]
    fn test_parse_union_all() {
        let q = single("SELECT id FROM users UNION ALL SELECT id FROM admins");
        assert_eq!(q.kind(), StatementKind::Union);
        match q {
            Query::Select(s) => assert!(s.set_op.unwrap().all),
            _ => panic!("Expected Select query"),
        }
    }

    #[test]
    fn test_parse_order_by_limit() {
        match single("SELECT * FROM users ORDER BY name ASC LIMIT 10 OFFSET 5") {
            Query::Select(s) => {
                assert_eq!(s.order_by.len(), 1);
                assert_eq!(s.order_by[0].asc, Some(true));
                assert!(s.limit.is_some());
                assert!(s.offset.is_some());
            }
            _ => panic!("Expected Select query"),
        }
    }

    #[test]
    fn test_parse_top_becomes_limit() {
        match parse_single("SELECT TOP 5 name FROM users", Some(Dialect::TSql)).unwrap() {
            Query::Select(s) => {
                assert_eq!(s.limit, Some(Expression::Literal(Literal::Integer(5))));
            }
            _ => panic!("Expected Select query"),
        }
    }

    #[test]
    fn test_function_synonyms_canonicalized() {
        let q = parse_single("SELECT IFNULL(a, 0) FROM t", Some(Dialect::MySql)).unwrap();
        match first_projection(&q) {
            Expression::Function { name, .. } => assert_eq!(name, "COALESCE"),
            other => panic!("Expected function, got {:?}", other),
        }
        let q = parse_single("SELECT LEN(name) FROM t", Some(Dialect::TSql)).unwrap();
        match first_projection(&q) {
            Expression::Function { name, .. } => assert_eq!(name, "LENGTH"),
            other => panic!("Expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_cast_type_canonicalized() {
        let q = parse_single("SELECT CAST(x AS STRING) FROM t", Some(Dialect::BigQuery)).unwrap();
        match first_projection(&q) {
            Expression::Cast { data_type, .. } => assert_eq!(data_type, "TEXT"),
            other => panic!("Expected cast, got {:?}", other),
        }
    }

    #[test]
    fn test_interval_string_split() {
        let q = parse_single("SELECT INTERVAL '30 days'", Some(Dialect::Postgres)).unwrap();
        match first_projection(&q) {
            Expression::Interval { value, unit } => {
                assert_eq!(unit.as_deref(), Some("DAY"));
                assert_eq!(**value, Expression::Literal(Literal::String("30".into())));
            }
            other => panic!("Expected interval, got {:?}", other),
        }
    }

    #[test]
    fn test_typed_string() {
        let q = single("SELECT DATE '2020-01-01'");
        assert_eq!(
            *first_projection(&q),
            Expression::TypedString {
                data_type: "DATE".into(),
                value: "2020-01-01".into()
            }
        );
    }

    #[test]
    fn test_is_true() {
        let q = single("SELECT * FROM t WHERE flag IS NOT TRUE");
        match q {
            Query::Select(s) => assert!(matches!(
                s.filter,
                Some(Expression::IsBool {
                    value: true,
                    negated: true,
                    ..
                })
            )),
            _ => panic!("Expected Select query"),
        }
    }

    #[test]
    fn test_aggregate_filter() {
        let q = single("SELECT COUNT(*) FILTER (WHERE x > 1) FROM t");
        assert!(matches!(
            first_projection(&q),
            Expression::Aggregate {
                filter: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn test_parse_aggregate_distinct() {
        let q = single("SELECT COUNT(DISTINCT status) FROM orders");
        match first_projection(&q) {
            Expression::Aggregate { distinct, name, .. } => {
                assert!(distinct);
                assert_eq!(name, "COUNT");
            }
            _ => panic!("Expected aggregate"),
        }
    }

    #[test]
    fn test_unknown_operator_is_raw() {
        let q = parse_single("SELECT a ~ 'x' FROM t", Some(Dialect::Postgres)).unwrap();
        assert!(matches!(first_projection(&q), Expression::Raw(_)));
    }

    #[test]
    fn test_split_location() {
        let (msg, pos) = split_location("Expected: an expression, found: EOF");
        assert_eq!(msg, "Expected: an expression, found: EOF");
        assert_eq!(pos, None);
        let (msg, pos) = split_location("Expected: end of statement, found: x at Line: 2, Column: 7");
        assert_eq!(msg, "Expected: end of statement, found: x");
        assert_eq!(pos, Some((2, 7)));
    }
}
