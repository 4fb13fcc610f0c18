//! In-memory execution of SELECT queries over JSON tables.
//!
//! Intended for small, ephemeral datasets: every operator materializes its
//! rows and joins are nested loops.
pub mod eval;
pub mod table;
pub mod value;

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::ast::compiler::compile_expr;
use crate::ast::types::*;
use crate::ast::visit::{for_each_select, select_exprs, walk_expr};
use crate::error::{Result, SqlToolError};

pub use eval::{Binding, Env, Relation};
pub use table::{Table, TableSet};
pub use value::{Value, ValueKey};

/// Upper bound on iterations of a recursive CTE.
const MAX_RECURSION: usize = 1000;

/// Execute a SELECT (or WITH ... SELECT) query against `tables`.
pub fn execute(query: &Query, tables: &TableSet) -> Result<Table> {
    Executor::new(tables).execute(query)
}

pub struct Executor<'t> {
    tables: &'t TableSet,
    /// CTEs in scope, innermost last.
    ctes: Vec<(String, Table)>,
}

/// A row (or group representative) ready for projection.
struct Unit {
    row: Vec<Value>,
    group: Option<Vec<Vec<Value>>>,
}

/// A projected row with its ORDER BY keys.
struct OutputRow {
    values: Vec<Value>,
    keys: Vec<Value>,
}

fn row_key(row: &[Value]) -> Vec<ValueKey> {
    row.iter().map(Value::key).collect()
}

fn dedupe(rows: &mut Vec<Vec<Value>>) {
    let mut seen = HashSet::new();
    rows.retain(|row| seen.insert(row_key(row)));
}

fn contains_window(expr: &Expression) -> bool {
    let mut found = false;
    walk_expr(expr, &mut |e| {
        if matches!(e, Expression::WindowFunction { .. }) {
            found = true;
        }
    });
    found
}

/// Whether any FROM/JOIN of `query` reads the unqualified table `name`.
fn references_table(query: &Query, name: &str) -> bool {
    let mut found = false;
    for_each_select(query, &mut |select| {
        for table in select.from.iter().chain(select.joins.iter().map(|j| &j.table)) {
            if let TableRef::Table {
                schema: None,
                name: n,
                ..
            } = table
            {
                if n.eq_ignore_ascii_case(name) {
                    found = true;
                }
            }
        }
    });
    found
}

/// Value of an ORDER BY term that names a result column or its position.
fn output_value(expr: &Expression, values: &[Value], columns: &[String]) -> Option<Value> {
    match expr {
        Expression::Literal(Literal::Integer(n)) if *n >= 1 && (*n as usize) <= values.len() => {
            Some(values[*n as usize - 1].clone())
        }
        Expression::Column { table: None, name } => {
            let mut hits = columns
                .iter()
                .enumerate()
                .filter(|(_, c)| c.eq_ignore_ascii_case(name));
            match (hits.next(), hits.next()) {
                (Some((i, _)), None) => values.get(i).cloned(),
                _ => None,
            }
        }
        _ => None,
    }
}

/// NULLs sort as the largest value unless NULLS FIRST/LAST says otherwise.
fn compare_keys(a: &Value, b: &Value, order: &OrderByExpr) -> Result<Ordering> {
    let asc = order.asc.unwrap_or(true);
    let nulls_first = order.nulls_first.unwrap_or(!asc);
    Ok(match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) if nulls_first => Ordering::Less,
        (true, false) => Ordering::Greater,
        (false, true) if nulls_first => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = a.compare(b)?.unwrap_or(Ordering::Equal);
            if asc {
                ord
            } else {
                ord.reverse()
            }
        }
    })
}

fn combine(
    mut left: Vec<Vec<Value>>,
    right: Vec<Vec<Value>>,
    op: SetOperator,
    all: bool,
) -> Vec<Vec<Value>> {
    match op {
        SetOperator::Union => {
            left.extend(right);
            if !all {
                dedupe(&mut left);
            }
            left
        }
        SetOperator::Intersect | SetOperator::Except => {
            let keep_matches = op == SetOperator::Intersect;
            let mut counts: HashMap<Vec<ValueKey>, usize> = HashMap::new();
            for row in &right {
                *counts.entry(row_key(row)).or_default() += 1;
            }
            if !all {
                dedupe(&mut left);
            }
            left.retain(|row| {
                let present = match counts.get_mut(&row_key(row)) {
                    Some(n) if *n > 0 => {
                        // Multiset semantics for ALL: each right row pairs once.
                        if all {
                            *n -= 1;
                        }
                        true
                    }
                    _ => false,
                };
                present == keep_matches
            });
            left
        }
    }
}

impl<'t> Executor<'t> {
    pub fn new(tables: &'t TableSet) -> Self {
        Executor {
            tables,
            ctes: Vec::new(),
        }
    }

    pub fn execute(&mut self, query: &Query) -> Result<Table> {
        let table = self.run_query(query, None)?;
        debug!(
            rows = table.rows.len(),
            columns = table.columns.len(),
            "query executed"
        );
        Ok(table)
    }

    fn run_query(&mut self, query: &Query, outer: Option<&Env<'_>>) -> Result<Table> {
        match query {
            Query::Select(select) => self.run_select(select, outer),
            Query::With(with) => {
                let mark = self.ctes.len();
                let result = match self.bind_ctes(with, outer) {
                    Ok(()) => self.run_query(&with.body, outer),
                    Err(e) => Err(e),
                };
                self.ctes.truncate(mark);
                result
            }
            other => Err(SqlToolError::execution(format!(
                "Only SELECT queries can be executed, got {}",
                other.kind()
            ))),
        }
    }

    fn bind_ctes(&mut self, with: &CTEQuery, outer: Option<&Env<'_>>) -> Result<()> {
        for cte in &with.ctes {
            let name = cte.name.to_lowercase();
            let mut table = if with.recursive && references_table(&cte.query, &name) {
                self.recursive_cte(cte, outer)?
            } else {
                self.run_query(&cte.query, outer)?
            };
            if !cte.columns.is_empty() {
                if cte.columns.len() != table.columns.len() {
                    return Err(SqlToolError::execution(format!(
                        "CTE '{}' returns {} columns but {} were named",
                        cte.name,
                        table.columns.len(),
                        cte.columns.len()
                    )));
                }
                table.columns = cte.columns.clone();
            }
            self.ctes.push((name, table));
        }
        Ok(())
    }

    /// `anchor UNION [ALL] step`, iterated until the step yields no new rows.
    fn recursive_cte(&mut self, cte: &CTE, outer: Option<&Env<'_>>) -> Result<Table> {
        let malformed = || {
            SqlToolError::execution(format!(
                "Recursive CTE '{}' must be an anchor query UNION [ALL] a recursive term",
                cte.name
            ))
        };
        let (anchor, step) = match &cte.query {
            Query::Select(select) => match select.set_op.as_deref() {
                Some(op) if op.op == SetOperator::Union => (select, op),
                _ => return Err(malformed()),
            },
            _ => return Err(malformed()),
        };

        let mut anchor = (**anchor).clone();
        anchor.set_op = None;
        anchor.order_by.clear();
        anchor.limit = None;
        anchor.offset = None;
        let base = self.run_select(&anchor, outer)?;
        let columns = if cte.columns.is_empty() {
            base.columns
        } else {
            cte.columns.clone()
        };

        let name = cte.name.to_lowercase();
        let mut seen = HashSet::new();
        let mut all = Vec::new();
        let mut working = Vec::new();
        for row in base.rows {
            if step.all || seen.insert(row_key(&row)) {
                all.push(row.clone());
                working.push(row);
            }
        }

        let mut iterations = 0;
        while !working.is_empty() {
            iterations += 1;
            if iterations > MAX_RECURSION {
                return Err(SqlToolError::execution(format!(
                    "Recursive CTE '{}' exceeded {} iterations",
                    cte.name, MAX_RECURSION
                )));
            }
            self.ctes.push((
                name.clone(),
                Table {
                    columns: columns.clone(),
                    rows: std::mem::take(&mut working),
                },
            ));
            let produced = self.run_query(&step.right, outer);
            self.ctes.pop();
            let produced = produced?;
            if produced.columns.len() != columns.len() {
                return Err(SqlToolError::execution(format!(
                    "Recursive term of CTE '{}' returns {} columns, expected {}",
                    cte.name,
                    produced.columns.len(),
                    columns.len()
                )));
            }
            for row in produced.rows {
                if step.all || seen.insert(row_key(&row)) {
                    all.push(row.clone());
                    working.push(row);
                }
            }
        }
        Ok(Table { columns, rows: all })
    }

    fn run_select(&mut self, select: &SelectQuery, outer: Option<&Env<'_>>) -> Result<Table> {
        if select.set_op.is_none() {
            let (columns, rows) = self.select_core(select, outer, true)?;
            return self.finish(select, columns, rows, outer);
        }

        let (columns, first) = self.select_core(select, outer, false)?;
        let mut rows: Vec<Vec<Value>> = first.into_iter().map(|r| r.values).collect();
        let mut next = select.set_op.as_deref();
        while let Some(op) = next {
            let (width, right_rows, following) = match &op.right {
                Query::Select(right) => {
                    let (cols, out) = self.select_core(right, outer, false)?;
                    let values = out.into_iter().map(|r| r.values).collect();
                    (cols.len(), values, right.set_op.as_deref())
                }
                other => {
                    let table = self.run_query(other, outer)?;
                    (table.columns.len(), table.rows, None)
                }
            };
            if width != columns.len() {
                return Err(SqlToolError::execution(format!(
                    "Set operation operands have different column counts ({} vs {})",
                    columns.len(),
                    width
                )));
            }
            rows = combine(rows, right_rows, op.op, op.all);
            next = following;
        }

        // ORDER BY over a set operation can only name result columns.
        let mut out = Vec::with_capacity(rows.len());
        for values in rows {
            let mut keys = Vec::with_capacity(select.order_by.len());
            for order in &select.order_by {
                let key = output_value(&order.expr, &values, &columns).ok_or_else(|| {
                    SqlToolError::execution(format!(
                        "ORDER BY term '{}' must name a result column of the set operation",
                        compile_expr(&order.expr)
                    ))
                })?;
                keys.push(key);
            }
            out.push(OutputRow { values, keys });
        }
        self.finish(select, columns, out, outer)
    }

    /// ORDER BY, OFFSET and LIMIT.
    fn finish(
        &mut self,
        select: &SelectQuery,
        columns: Vec<String>,
        mut rows: Vec<OutputRow>,
        outer: Option<&Env<'_>>,
    ) -> Result<Table> {
        if !select.order_by.is_empty() {
            let mut failure = None;
            rows.sort_by(|a, b| {
                for (i, order) in select.order_by.iter().enumerate() {
                    match compare_keys(&a.keys[i], &b.keys[i], order) {
                        Ok(Ordering::Equal) => continue,
                        Ok(ord) => return ord,
                        Err(e) => {
                            failure.get_or_insert(e);
                            return Ordering::Equal;
                        }
                    }
                }
                Ordering::Equal
            });
            if let Some(e) = failure {
                return Err(e);
            }
        }

        let offset = match &select.offset {
            Some(expr) => self.row_count_clause("OFFSET", expr, outer)?,
            None => 0,
        };
        let limit = match &select.limit {
            Some(expr) => self.row_count_clause("LIMIT", expr, outer)?,
            None => usize::MAX,
        };
        let rows = rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|r| r.values)
            .collect();
        Ok(Table { columns, rows })
    }

    fn row_count_clause(
        &mut self,
        clause: &str,
        expr: &Expression,
        outer: Option<&Env<'_>>,
    ) -> Result<usize> {
        match self.eval(expr, &Env::empty(outer))? {
            Value::Int(n) if n >= 0 => Ok(n as usize),
            other => Err(SqlToolError::execution(format!(
                "{} must be a non-negative integer, got '{}'",
                clause,
                other.display()
            ))),
        }
    }

    /// FROM, WHERE, GROUP BY, HAVING, projection and DISTINCT of one block.
    fn select_core(
        &mut self,
        select: &SelectQuery,
        outer: Option<&Env<'_>>,
        with_keys: bool,
    ) -> Result<(Vec<String>, Vec<OutputRow>)> {
        if !select.windows.is_empty() || select_exprs(select).into_iter().any(contains_window) {
            return Err(SqlToolError::execution(
                "Window functions are not supported by the JSON executor",
            ));
        }

        let Relation { bindings, rows } = self.from_clause(select, outer)?;
        let mut filtered = Vec::new();
        for row in rows {
            if let Some(filter) = &select.filter {
                let env = Env {
                    bindings: &bindings,
                    row: &row,
                    group: None,
                    outer,
                };
                if !self.accepts(filter, &env)? {
                    continue;
                }
            }
            filtered.push(row);
        }

        let columns = output_columns(select, &bindings)?;
        let group_exprs = group_expressions(select, &bindings);
        let aggregated = !group_exprs.is_empty()
            || select.has_aggregates()
            || select.order_by.iter().any(|o| o.expr.contains_aggregate());
        let units = if aggregated {
            self.group_rows(filtered, &group_exprs, &bindings, outer)?
        } else {
            filtered
                .into_iter()
                .map(|row| Unit { row, group: None })
                .collect()
        };

        let mut out = Vec::with_capacity(units.len());
        for unit in &units {
            let env = Env {
                bindings: &bindings,
                row: &unit.row,
                group: unit.group.as_deref(),
                outer,
            };
            if let Some(having) = &select.having {
                if !self.accepts(having, &env)? {
                    continue;
                }
            }
            let values = self.project(select, &env, &bindings)?;
            let mut keys = Vec::new();
            if with_keys {
                for order in &select.order_by {
                    let key = match output_value(&order.expr, &values, &columns) {
                        Some(v) => v,
                        None => self.eval(&order.expr, &env)?,
                    };
                    keys.push(key);
                }
            }
            out.push(OutputRow { values, keys });
        }

        if select.distinct {
            let mut seen = HashSet::new();
            out.retain(|r| seen.insert(row_key(&r.values)));
        }
        Ok((columns, out))
    }

    fn group_rows(
        &mut self,
        rows: Vec<Vec<Value>>,
        group_exprs: &[Expression],
        bindings: &[Binding],
        outer: Option<&Env<'_>>,
    ) -> Result<Vec<Unit>> {
        // Global aggregation yields exactly one group, even over no rows.
        if group_exprs.is_empty() {
            let row = rows
                .first()
                .cloned()
                .unwrap_or_else(|| vec![Value::Null; bindings.len()]);
            return Ok(vec![Unit {
                row,
                group: Some(rows),
            }]);
        }

        let mut index: HashMap<Vec<ValueKey>, usize> = HashMap::new();
        let mut units: Vec<Unit> = Vec::new();
        for row in rows {
            let env = Env {
                bindings,
                row: &row,
                group: None,
                outer,
            };
            let mut key = Vec::with_capacity(group_exprs.len());
            for expr in group_exprs {
                key.push(self.eval(expr, &env)?.key());
            }
            match index.get(&key) {
                Some(&i) => units[i].group.get_or_insert_with(Vec::new).push(row),
                None => {
                    index.insert(key, units.len());
                    units.push(Unit {
                        row: row.clone(),
                        group: Some(vec![row]),
                    });
                }
            }
        }
        Ok(units)
    }

    fn project(
        &mut self,
        select: &SelectQuery,
        env: &Env<'_>,
        bindings: &[Binding],
    ) -> Result<Vec<Value>> {
        let mut values = Vec::new();
        for item in &select.projections {
            match item {
                SelectItem::Wildcard => {
                    for (i, binding) in bindings.iter().enumerate() {
                        if !binding.hidden {
                            values.push(env.row[i].clone());
                        }
                    }
                }
                SelectItem::QualifiedWildcard(table) => {
                    for (i, binding) in bindings.iter().enumerate() {
                        if binding.belongs_to(table) {
                            values.push(env.row[i].clone());
                        }
                    }
                }
                SelectItem::Expression { expr, .. } => values.push(self.eval(expr, env)?),
            }
        }
        Ok(values)
    }

    fn from_clause(&mut self, select: &SelectQuery, outer: Option<&Env<'_>>) -> Result<Relation> {
        // No FROM: a single empty row.
        let mut relation = Relation {
            bindings: Vec::new(),
            rows: vec![Vec::new()],
        };
        for table in &select.from {
            let right = self.table_relation(table, outer)?;
            relation = cross(relation, right);
        }
        for join in &select.joins {
            let right = self.table_relation(&join.table, outer)?;
            relation = self.join(relation, right, join, outer)?;
        }
        Ok(relation)
    }

    fn lookup_table(&self, schema: Option<&str>, name: &str) -> Result<Table> {
        if schema.is_none() {
            if let Some((_, table)) = self
                .ctes
                .iter()
                .rev()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
            {
                return Ok(table.clone());
            }
        }
        let full = schema.map(|s| format!("{}.{}", s, name));
        full.as_deref()
            .and_then(|f| self.tables.get(f))
            .or_else(|| self.tables.get(name))
            .cloned()
            .ok_or_else(|| {
                SqlToolError::execution(format!(
                    "Table '{}' not found",
                    full.as_deref().unwrap_or(name)
                ))
            })
    }

    fn table_relation(&mut self, table: &TableRef, outer: Option<&Env<'_>>) -> Result<Relation> {
        match table {
            TableRef::Table {
                schema,
                name,
                alias,
            } => {
                let source = self.lookup_table(schema.as_deref(), name)?;
                let qualifier = alias.as_deref().unwrap_or(name);
                Ok(Relation {
                    bindings: source
                        .columns
                        .iter()
                        .map(|c| Binding::new(Some(qualifier), c))
                        .collect(),
                    rows: source.rows,
                })
            }
            TableRef::Subquery { query, alias } => {
                let result = self.run_query(query, outer)?;
                Ok(Relation {
                    bindings: result
                        .columns
                        .iter()
                        .map(|c| Binding::new(Some(alias), c))
                        .collect(),
                    rows: result.rows,
                })
            }
            TableRef::Function { name, .. } => Err(SqlToolError::execution(format!(
                "Table function '{}' is not supported by the JSON executor",
                name
            ))),
            TableRef::Raw(text) => Err(SqlToolError::execution(format!(
                "Unsupported table source: {}",
                text
            ))),
        }
    }

    fn join(
        &mut self,
        left: Relation,
        right: Relation,
        join: &Join,
        outer: Option<&Env<'_>>,
    ) -> Result<Relation> {
        if join.join_type == JoinType::Lateral {
            return Err(SqlToolError::execution(
                "LATERAL joins are not supported by the JSON executor",
            ));
        }
        let left_width = left.bindings.len();
        let right_width = right.bindings.len();

        // Column index pairs compared for equality by USING / NATURAL.
        let pairs: Vec<(usize, usize)> = match &join.condition {
            Some(JoinCondition::Using(columns)) => {
                let mut pairs = Vec::with_capacity(columns.len());
                for column in columns {
                    let find = |bindings: &[Binding]| {
                        bindings
                            .iter()
                            .position(|b| b.matches(None, column))
                            .ok_or_else(|| {
                                SqlToolError::execution(format!(
                                    "Column '{}' in USING clause not found",
                                    column
                                ))
                            })
                    };
                    pairs.push((find(&left.bindings)?, find(&right.bindings)?));
                }
                pairs
            }
            Some(JoinCondition::Natural) => right
                .bindings
                .iter()
                .enumerate()
                .filter_map(|(ri, rb)| {
                    left.bindings
                        .iter()
                        .position(|lb| lb.matches(None, &rb.name))
                        .map(|li| (li, ri))
                })
                .collect(),
            _ => Vec::new(),
        };

        let mut bindings = left.bindings.clone();
        bindings.extend(right.bindings.iter().cloned());
        for &(li, ri) in &pairs {
            if join.join_type == JoinType::Right {
                bindings[li].hidden = true;
            } else {
                bindings[left_width + ri].hidden = true;
            }
        }
        let on = match &join.condition {
            Some(JoinCondition::On(expr)) => Some(expr),
            _ => None,
        };

        let keeps_left = matches!(join.join_type, JoinType::Left | JoinType::Full);
        let keeps_right = matches!(join.join_type, JoinType::Right | JoinType::Full);
        let mut rows = Vec::new();
        let mut right_matched = vec![false; right.rows.len()];
        for l in &left.rows {
            let mut matched = false;
            for (ri, r) in right.rows.iter().enumerate() {
                let mut keep = true;
                for &(li, rj) in &pairs {
                    if l[li].sql_eq(&r[rj])? != Some(true) {
                        keep = false;
                        break;
                    }
                }
                let mut combined = l.clone();
                combined.extend(r.iter().cloned());
                if keep {
                    if let Some(cond) = on {
                        let env = Env {
                            bindings: &bindings,
                            row: &combined,
                            group: None,
                            outer,
                        };
                        keep = self.accepts(cond, &env)?;
                    }
                }
                if keep {
                    matched = true;
                    right_matched[ri] = true;
                    rows.push(combined);
                }
            }
            if !matched && keeps_left {
                let mut padded = l.clone();
                padded.extend(std::iter::repeat(Value::Null).take(right_width));
                rows.push(padded);
            }
        }
        if keeps_right {
            for (r, matched) in right.rows.iter().zip(right_matched) {
                if !matched {
                    let mut padded = vec![Value::Null; left_width];
                    padded.extend(r.iter().cloned());
                    rows.push(padded);
                }
            }
        }
        Ok(Relation { bindings, rows })
    }
}

fn cross(left: Relation, right: Relation) -> Relation {
    let mut bindings = left.bindings;
    bindings.extend(right.bindings);
    let mut rows = Vec::with_capacity(left.rows.len() * right.rows.len());
    for l in &left.rows {
        for r in &right.rows {
            let mut row = l.clone();
            row.extend(r.iter().cloned());
            rows.push(row);
        }
    }
    Relation { bindings, rows }
}

fn output_columns(select: &SelectQuery, bindings: &[Binding]) -> Result<Vec<String>> {
    let mut columns = Vec::new();
    for item in &select.projections {
        match item {
            SelectItem::Wildcard => columns.extend(
                bindings
                    .iter()
                    .filter(|b| !b.hidden)
                    .map(|b| b.name.clone()),
            ),
            SelectItem::QualifiedWildcard(table) => {
                let before = columns.len();
                columns.extend(
                    bindings
                        .iter()
                        .filter(|b| b.belongs_to(table))
                        .map(|b| b.name.clone()),
                );
                if columns.len() == before {
                    return Err(SqlToolError::execution(format!(
                        "Unknown table '{}' in '{}.*'",
                        table, table
                    )));
                }
            }
            SelectItem::Expression { expr, alias } => columns.push(match (alias, expr) {
                (Some(alias), _) => alias.clone(),
                (None, Expression::Column { name, .. }) => name.clone(),
                (None, other) => compile_expr(other),
            }),
        }
    }
    Ok(columns)
}

/// GROUP BY terms with ordinals and output aliases replaced by the
/// projection they name.
fn group_expressions(select: &SelectQuery, bindings: &[Binding]) -> Vec<Expression> {
    let projection = |i: usize| match select.projections.get(i) {
        Some(SelectItem::Expression { expr, .. }) => Some(expr.clone()),
        _ => None,
    };
    select
        .group_by
        .iter()
        .map(|expr| match expr {
            Expression::Literal(Literal::Integer(n)) if *n >= 1 => {
                projection(*n as usize - 1).unwrap_or_else(|| expr.clone())
            }
            Expression::Column { table: None, name }
                if !bindings.iter().any(|b| b.matches(None, name)) =>
            {
                select
                    .projections
                    .iter()
                    .find_map(|item| match item {
                        SelectItem::Expression {
                            expr,
                            alias: Some(alias),
                        } if alias.eq_ignore_ascii_case(name) => Some(expr.clone()),
                        _ => None,
                    })
                    .unwrap_or_else(|| expr.clone())
            }
            other => other.clone(),
        })
        .collect()
}
