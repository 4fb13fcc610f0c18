//! Expression evaluation under SQL three-valued logic.
use std::cmp::Ordering;
use std::collections::HashSet;

use super::value::Value;
use super::Executor;
use crate::ast::compiler::compile_expr;
use crate::ast::types::*;
use crate::error::{Result, SqlToolError};
use crate::temporal::IntervalUnit;

/// A column visible to expressions: `qualifier.name`.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub qualifier: Option<String>,
    pub name: String,
    /// Merged away by USING/NATURAL: reachable only through its qualifier.
    pub hidden: bool,
}

impl Binding {
    pub fn new(qualifier: Option<&str>, name: &str) -> Self {
        Binding {
            qualifier: qualifier.map(str::to_string),
            name: name.to_string(),
            hidden: false,
        }
    }

    /// Whether `table` (possibly `schema.table`) names this column's source.
    pub fn belongs_to(&self, table: &str) -> bool {
        let last = table.rsplit('.').next().unwrap_or(table);
        self.qualifier
            .as_deref()
            .map_or(false, |q| q.eq_ignore_ascii_case(last))
    }

    pub fn matches(&self, table: Option<&str>, name: &str) -> bool {
        if !self.name.eq_ignore_ascii_case(name) {
            return false;
        }
        match table {
            Some(t) => self.belongs_to(t),
            None => !self.hidden,
        }
    }
}

/// Intermediate rows flowing through FROM, joins and WHERE.
#[derive(Debug, Clone, Default)]
pub struct Relation {
    pub bindings: Vec<Binding>,
    pub rows: Vec<Vec<Value>>,
}

/// Evaluation scope: the current row, its group when aggregating, and the
/// enclosing query's scope for correlated references.
#[derive(Clone, Copy)]
pub struct Env<'a> {
    pub bindings: &'a [Binding],
    pub row: &'a [Value],
    pub group: Option<&'a [Vec<Value>]>,
    pub outer: Option<&'a Env<'a>>,
}

impl<'a> Env<'a> {
    /// Scope without columns, used for LIMIT/OFFSET and constant expressions.
    pub fn empty(outer: Option<&'a Env<'a>>) -> Self {
        Env {
            bindings: &[],
            row: &[],
            group: None,
            outer,
        }
    }

    fn lookup(&self, table: Option<&str>, name: &str) -> Result<Option<Value>> {
        let mut hits = self
            .bindings
            .iter()
            .enumerate()
            .filter(|(_, b)| b.matches(table, name));
        match (hits.next(), hits.next()) {
            (Some((idx, _)), None) => Ok(Some(self.row.get(idx).cloned().unwrap_or(Value::Null))),
            (Some(_), Some(_)) => Err(SqlToolError::execution(format!(
                "Ambiguous column reference '{}'",
                display_column(table, name)
            ))),
            (None, _) => match self.outer {
                Some(outer) => outer.lookup(table, name),
                None => Ok(None),
            },
        }
    }

    fn resolve(&self, table: Option<&str>, name: &str) -> Result<Value> {
        self.lookup(table, name)?.ok_or_else(|| {
            SqlToolError::execution(format!(
                "Column '{}' not found",
                display_column(table, name)
            ))
        })
    }
}

fn display_column(table: Option<&str>, name: &str) -> String {
    match table {
        Some(t) => format!("{}.{}", t, name),
        None => name.to_string(),
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Boolean(b) => Value::Bool(*b),
        Literal::Integer(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::String(s) => Value::Text(s.clone()),
    }
}

fn and3(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn or3(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

fn bool_value(b: Option<bool>) -> Value {
    b.map(Value::Bool).unwrap_or(Value::Null)
}

/// `x IN (list)` under three-valued logic.
fn in_values(needle: &Value, haystack: &[Value]) -> Result<Option<bool>> {
    if needle.is_null() {
        return Ok(None);
    }
    let mut unknown = false;
    for candidate in haystack {
        match needle.sql_eq(candidate)? {
            Some(true) => return Ok(Some(true)),
            None => unknown = true,
            Some(false) => {}
        }
    }
    Ok(if unknown { None } else { Some(false) })
}

/// SQL LIKE with `%` and `_` wildcards.
pub fn like_match(text: &str, pattern: &str, case_insensitive: bool) -> bool {
    let (text, pattern) = if case_insensitive {
        (text.to_lowercase(), pattern.to_lowercase())
    } else {
        (text.to_string(), pattern.to_string())
    };
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();

    // dp[j]: pattern prefix of length j matches the text prefix processed so far.
    let mut dp = vec![false; p.len() + 1];
    dp[0] = true;
    for j in 1..=p.len() {
        dp[j] = dp[j - 1] && p[j - 1] == '%';
    }
    for &c in &t {
        let mut next = vec![false; p.len() + 1];
        for j in 1..=p.len() {
            next[j] = match p[j - 1] {
                '%' => next[j - 1] || dp[j],
                '_' => dp[j - 1],
                pc => dp[j - 1] && pc == c,
            };
        }
        dp = next;
    }
    dp[p.len()]
}

impl Executor<'_> {
    /// Evaluate `expr` in `env`.
    pub fn eval(&mut self, expr: &Expression, env: &Env<'_>) -> Result<Value> {
        match expr {
            Expression::Column { table, name } => env.resolve(table.as_deref(), name),
            Expression::Literal(lit) => Ok(literal_value(lit)),
            Expression::Nested(inner) => self.eval(inner, env),
            Expression::BinaryOp { left, op, right } => self.eval_binary(left, *op, right, env),
            Expression::UnaryOp { op, expr } => {
                let value = self.eval(expr, env)?;
                match op {
                    UnaryOperator::Not => Ok(bool_value(value.truth()?.map(|b| !b))),
                    UnaryOperator::Minus => value.neg(),
                    UnaryOperator::Plus => Ok(value),
                }
            }
            Expression::Function { name, args, .. } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, env)?);
                }
                scalar_function(name, values)
            }
            Expression::Aggregate {
                name,
                args,
                distinct,
                filter,
            } => {
                let group = env.group.ok_or_else(|| {
                    SqlToolError::execution(format!(
                        "Aggregate function {} is not allowed here",
                        name
                    ))
                })?;
                self.aggregate(name, args, *distinct, filter.as_deref(), env, group)
            }
            Expression::WindowFunction { .. } => Err(SqlToolError::execution(
                "Window functions are not supported by the JSON executor",
            )),
            Expression::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                let subject = match operand {
                    Some(op) => Some(self.eval(op, env)?),
                    None => None,
                };
                for (cond, result) in when_clauses {
                    let hit = match &subject {
                        Some(subject) => subject.sql_eq(&self.eval(cond, env)?)?,
                        None => self.eval(cond, env)?.truth()?,
                    };
                    if hit == Some(true) {
                        return self.eval(result, env);
                    }
                }
                match else_clause {
                    Some(e) => self.eval(e, env),
                    None => Ok(Value::Null),
                }
            }
            Expression::Subquery(query) => {
                let table = self.run_query(query, Some(env))?;
                if table.columns.len() != 1 {
                    return Err(SqlToolError::execution(
                        "Scalar subquery must return exactly one column",
                    ));
                }
                match table.rows.len() {
                    0 => Ok(Value::Null),
                    1 => Ok(table.rows[0][0].clone()),
                    _ => Err(SqlToolError::execution(
                        "Scalar subquery returned more than one row",
                    )),
                }
            }
            Expression::Exists(query) => {
                let table = self.run_query(query, Some(env))?;
                Ok(Value::Bool(!table.rows.is_empty()))
            }
            Expression::InList {
                expr,
                list,
                negated,
            } => {
                let needle = self.eval(expr, env)?;
                let mut haystack = Vec::with_capacity(list.len());
                for item in list {
                    haystack.push(self.eval(item, env)?);
                }
                let hit = in_values(&needle, &haystack)?;
                Ok(bool_value(if *negated { hit.map(|b| !b) } else { hit }))
            }
            Expression::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                let needle = self.eval(expr, env)?;
                let table = self.run_query(subquery, Some(env))?;
                if table.columns.len() != 1 {
                    return Err(SqlToolError::execution(
                        "IN subquery must return exactly one column",
                    ));
                }
                let haystack: Vec<Value> =
                    table.rows.into_iter().filter_map(|r| r.into_iter().next()).collect();
                let hit = in_values(&needle, &haystack)?;
                Ok(bool_value(if *negated { hit.map(|b| !b) } else { hit }))
            }
            Expression::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let value = self.eval(expr, env)?;
                let low = self.eval(low, env)?;
                let high = self.eval(high, env)?;
                let above = value.compare(&low)?.map(|o| o != Ordering::Less);
                let below = value.compare(&high)?.map(|o| o != Ordering::Greater);
                let hit = and3(above, below);
                Ok(bool_value(if *negated { hit.map(|b| !b) } else { hit }))
            }
            Expression::IsNull { expr, negated } => {
                let value = self.eval(expr, env)?;
                Ok(Value::Bool(value.is_null() != *negated))
            }
            Expression::IsBool {
                expr,
                value,
                negated,
            } => {
                let truth = self.eval(expr, env)?.truth()?;
                Ok(Value::Bool((truth == Some(*value)) != *negated))
            }
            Expression::Cast { expr, data_type } | Expression::TypeCast { expr, data_type } => {
                self.eval(expr, env)?.cast(data_type)
            }
            Expression::TypedString { data_type, value } => {
                Value::Text(value.clone()).cast(data_type)
            }
            Expression::Interval { value, unit } => {
                let unit = unit
                    .as_deref()
                    .and_then(IntervalUnit::parse)
                    .ok_or_else(|| SqlToolError::execution("Unsupported interval unit"))?;
                let amount = match self.eval(value, env)? {
                    Value::Int(i) => i,
                    Value::Text(s) => s.trim().parse::<i64>().map_err(|_| {
                        SqlToolError::execution(format!("Invalid interval amount '{}'", s))
                    })?,
                    other => {
                        return Err(SqlToolError::execution(format!(
                            "Invalid interval amount '{}'",
                            other.display()
                        )))
                    }
                };
                Ok(Value::Interval { amount, unit })
            }
            Expression::Wildcard => Err(SqlToolError::execution(
                "'*' is only allowed in the select list or COUNT(*)",
            )),
            Expression::Parameter(_)
            | Expression::Array(_)
            | Expression::JsonAccess { .. }
            | Expression::Raw(_) => Err(SqlToolError::execution(format!(
                "Unsupported expression in JSON execution: {}",
                compile_expr(expr)
            ))),
        }
    }

    /// Predicate truth; NULL and FALSE both reject the row.
    pub fn accepts(&mut self, predicate: &Expression, env: &Env<'_>) -> Result<bool> {
        Ok(self.eval(predicate, env)?.truth()? == Some(true))
    }

    fn eval_binary(
        &mut self,
        left: &Expression,
        op: BinaryOperator,
        right: &Expression,
        env: &Env<'_>,
    ) -> Result<Value> {
        use BinaryOperator::*;
        match op {
            And => {
                let l = self.eval(left, env)?.truth()?;
                if l == Some(false) {
                    return Ok(Value::Bool(false));
                }
                let r = self.eval(right, env)?.truth()?;
                Ok(bool_value(and3(l, r)))
            }
            Or => {
                let l = self.eval(left, env)?.truth()?;
                if l == Some(true) {
                    return Ok(Value::Bool(true));
                }
                let r = self.eval(right, env)?.truth()?;
                Ok(bool_value(or3(l, r)))
            }
            _ => {
                let l = self.eval(left, env)?;
                let r = self.eval(right, env)?;
                apply_binary(op, &l, &r)
            }
        }
    }

    fn aggregate(
        &mut self,
        name: &str,
        args: &[Expression],
        distinct: bool,
        filter: Option<&Expression>,
        env: &Env<'_>,
        group: &[Vec<Value>],
    ) -> Result<Value> {
        let star = matches!(args.first(), None | Some(Expression::Wildcard));
        let mut values = Vec::new();
        for row in group {
            let row_env = Env {
                bindings: env.bindings,
                row,
                group: None,
                outer: env.outer,
            };
            if let Some(filter) = filter {
                if !self.accepts(filter, &row_env)? {
                    continue;
                }
            }
            if star {
                values.push(Value::Bool(true));
            } else {
                let value = self.eval(&args[0], &row_env)?;
                if !value.is_null() {
                    values.push(value);
                }
            }
        }
        if distinct {
            let mut seen = HashSet::new();
            values.retain(|v| seen.insert(v.key()));
        }

        match name.to_uppercase().as_str() {
            "COUNT" => Ok(Value::Int(values.len() as i64)),
            "SUM" => {
                let mut iter = values.into_iter();
                let first = match iter.next() {
                    Some(v) => v,
                    None => return Ok(Value::Null),
                };
                iter.try_fold(first, |acc, v| acc.add(&v))
            }
            "AVG" => {
                if values.is_empty() {
                    return Ok(Value::Null);
                }
                let count = values.len() as f64;
                let mut total = 0.0;
                for v in &values {
                    total += match v {
                        Value::Int(i) => *i as f64,
                        Value::Float(f) => *f,
                        other => {
                            return Err(SqlToolError::execution(format!(
                                "AVG requires numeric values, found {} value '{}'",
                                other.type_name(),
                                other.display()
                            )))
                        }
                    };
                }
                Ok(Value::Float(total / count))
            }
            upper @ ("MIN" | "MAX") => {
                let wanted = if upper == "MIN" {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                let mut best: Option<Value> = None;
                for v in values {
                    best = match best {
                        Some(b) if v.compare(&b)? != Some(wanted) => Some(b),
                        _ => Some(v),
                    };
                }
                Ok(best.unwrap_or(Value::Null))
            }
            "STRING_AGG" => {
                if values.is_empty() {
                    return Ok(Value::Null);
                }
                let separator = match args.get(1) {
                    Some(sep) => self.eval(sep, &Env::empty(env.outer))?.display(),
                    None => ",".to_string(),
                };
                let parts: Vec<String> = values.iter().map(Value::display).collect();
                Ok(Value::Text(parts.join(&separator)))
            }
            other => Err(SqlToolError::execution(format!(
                "Unsupported aggregate function: {}",
                other
            ))),
        }
    }
}

/// Operators evaluated on both operand values.
fn apply_binary(op: BinaryOperator, l: &Value, r: &Value) -> Result<Value> {
    use BinaryOperator::*;
    match op {
        And => Ok(bool_value(and3(l.truth()?, r.truth()?))),
        Or => Ok(bool_value(or3(l.truth()?, r.truth()?))),
        Eq => Ok(bool_value(l.sql_eq(r)?)),
        NotEq => Ok(bool_value(l.sql_eq(r)?.map(|b| !b))),
        Lt => Ok(bool_value(l.compare(r)?.map(|o| o == Ordering::Less))),
        LtEq => Ok(bool_value(l.compare(r)?.map(|o| o != Ordering::Greater))),
        Gt => Ok(bool_value(l.compare(r)?.map(|o| o == Ordering::Greater))),
        GtEq => Ok(bool_value(l.compare(r)?.map(|o| o != Ordering::Less))),
        Plus => l.add(r),
        Minus => l.sub(r),
        Multiply => l.mul(r),
        Divide => l.div(r),
        Modulo => l.rem(r),
        Like | ILike | NotLike | NotILike => {
            if l.is_null() || r.is_null() {
                return Ok(Value::Null);
            }
            let hit = like_match(&l.display(), &r.display(), matches!(op, ILike | NotILike));
            Ok(Value::Bool(hit != matches!(op, NotLike | NotILike)))
        }
        Concat => {
            if l.is_null() || r.is_null() {
                return Ok(Value::Null);
            }
            Ok(Value::Text(format!("{}{}", l.display(), r.display())))
        }
    }
}

fn expect_args(name: &str, args: &[Value], min: usize, max: usize) -> Result<()> {
    if args.len() < min || args.len() > max {
        return Err(SqlToolError::execution(format!(
            "Wrong number of arguments to {}: {}",
            name,
            args.len()
        )));
    }
    Ok(())
}

fn int_arg(name: &str, value: &Value) -> Result<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Float(f) if f.fract() == 0.0 => Ok(*f as i64),
        other => Err(SqlToolError::execution(format!(
            "{} expects an integer argument, found {} value '{}'",
            name,
            other.type_name(),
            other.display()
        ))),
    }
}

fn float_arg(name: &str, value: &Value) -> Result<f64> {
    match value {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        other => Err(SqlToolError::execution(format!(
            "{} expects a numeric argument, found {} value '{}'",
            name,
            other.type_name(),
            other.display()
        ))),
    }
}

fn scalar_function(name: &str, args: Vec<Value>) -> Result<Value> {
    let upper = name.to_uppercase();
    match upper.as_str() {
        "COALESCE" => return Ok(args.into_iter().find(|v| !v.is_null()).unwrap_or(Value::Null)),
        "CONCAT" => {
            let text: String = args
                .iter()
                .filter(|v| !v.is_null())
                .map(Value::display)
                .collect();
            return Ok(Value::Text(text));
        }
        "NULLIF" => {
            expect_args(&upper, &args, 2, 2)?;
            return Ok(match args[0].sql_eq(&args[1])? {
                Some(true) => Value::Null,
                _ => args[0].clone(),
            });
        }
        _ => {}
    }
    if args.iter().any(Value::is_null) {
        return Ok(Value::Null);
    }

    match upper.as_str() {
        "UPPER" => {
            expect_args(&upper, &args, 1, 1)?;
            Ok(Value::Text(args[0].display().to_uppercase()))
        }
        "LOWER" => {
            expect_args(&upper, &args, 1, 1)?;
            Ok(Value::Text(args[0].display().to_lowercase()))
        }
        "LENGTH" => {
            expect_args(&upper, &args, 1, 1)?;
            Ok(Value::Int(args[0].display().chars().count() as i64))
        }
        "TRIM" | "LTRIM" | "RTRIM" => {
            expect_args(&upper, &args, 1, 1)?;
            let text = args[0].display();
            let trimmed = match upper.as_str() {
                "LTRIM" => text.trim_start(),
                "RTRIM" => text.trim_end(),
                _ => text.trim(),
            };
            Ok(Value::Text(trimmed.to_string()))
        }
        "REPLACE" => {
            expect_args(&upper, &args, 3, 3)?;
            Ok(Value::Text(
                args[0].display().replace(&args[1].display(), &args[2].display()),
            ))
        }
        "SUBSTRING" => {
            expect_args(&upper, &args, 2, 3)?;
            let chars: Vec<char> = args[0].display().chars().collect();
            let start = int_arg(&upper, &args[1])?;
            let end = match args.get(2) {
                Some(len) => start.saturating_add(int_arg(&upper, len)?.max(0)),
                None => i64::MAX,
            };
            let from = (start.max(1) - 1) as usize;
            let to = (end.max(1) - 1).min(chars.len() as i64) as usize;
            let text: String = chars.get(from..to.max(from)).unwrap_or(&[]).iter().collect();
            Ok(Value::Text(text))
        }
        "ABS" => {
            expect_args(&upper, &args, 1, 1)?;
            match &args[0] {
                Value::Int(i) => i
                    .checked_abs()
                    .map(Value::Int)
                    .ok_or_else(|| SqlToolError::execution("Integer overflow")),
                other => Ok(Value::Float(float_arg(&upper, other)?.abs())),
            }
        }
        "ROUND" => {
            expect_args(&upper, &args, 1, 2)?;
            let digits = match args.get(1) {
                Some(d) => int_arg(&upper, d)?,
                None => 0,
            };
            match &args[0] {
                Value::Int(i) if digits >= 0 => Ok(Value::Int(*i)),
                other => {
                    let factor = 10f64.powi(digits.clamp(-18, 18) as i32);
                    Ok(Value::Float((float_arg(&upper, other)? * factor).round() / factor))
                }
            }
        }
        "CEIL" | "CEILING" | "FLOOR" => {
            expect_args(&upper, &args, 1, 1)?;
            match &args[0] {
                Value::Int(i) => Ok(Value::Int(*i)),
                other => {
                    let x = float_arg(&upper, other)?;
                    Ok(Value::Float(if upper == "FLOOR" { x.floor() } else { x.ceil() }))
                }
            }
        }
        "POWER" | "POW" => {
            expect_args(&upper, &args, 2, 2)?;
            Ok(Value::Float(
                float_arg(&upper, &args[0])?.powf(float_arg(&upper, &args[1])?),
            ))
        }
        "MOD" => {
            expect_args(&upper, &args, 2, 2)?;
            args[0].rem(&args[1])
        }
        _ => Err(SqlToolError::execution(format!(
            "Unsupported function: {}",
            upper
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like() {
        assert!(like_match("Alice", "A%", false));
        assert!(like_match("Alice", "_lice", false));
        assert!(!like_match("Alice", "a%", false));
        assert!(like_match("Alice", "a%", true));
        assert!(like_match("", "%", false));
        assert!(!like_match("abc", "ab", false));
    }

    #[test]
    fn test_three_valued_connectives() {
        assert_eq!(and3(None, Some(false)), Some(false));
        assert_eq!(and3(None, Some(true)), None);
        assert_eq!(or3(None, Some(true)), Some(true));
        assert_eq!(or3(None, Some(false)), None);
    }

    #[test]
    fn test_in_values_null_semantics() {
        let list = vec![Value::Int(1), Value::Null];
        assert_eq!(in_values(&Value::Int(1), &list).unwrap(), Some(true));
        assert_eq!(in_values(&Value::Int(2), &list).unwrap(), None);
        assert_eq!(in_values(&Value::Null, &list).unwrap(), None);
    }

    #[test]
    fn test_scalar_functions() {
        let text = |s: &str| Value::Text(s.to_string());
        assert_eq!(
            scalar_function("SUBSTRING", vec![text("hello"), Value::Int(2), Value::Int(3)]).unwrap(),
            text("ell")
        );
        assert_eq!(
            scalar_function("COALESCE", vec![Value::Null, Value::Int(2)]).unwrap(),
            Value::Int(2)
        );
        assert_eq!(
            scalar_function("UPPER", vec![Value::Null]).unwrap(),
            Value::Null
        );
        assert_eq!(
            scalar_function("ROUND", vec![Value::Float(2.456), Value::Int(2)]).unwrap(),
            Value::Float(2.46)
        );
        assert_eq!(
            scalar_function("NULLIF", vec![Value::Int(1), Value::Int(1)]).unwrap(),
            Value::Null
        );
        assert!(scalar_function("FROBNICATE", vec![]).is_err());
    }

    #[test]
    fn test_env_lookup() {
        let bindings = vec![Binding::new(Some("u"), "id"), Binding::new(Some("o"), "id")];
        let row = vec![Value::Int(1), Value::Int(2)];
        let env = Env {
            bindings: &bindings,
            row: &row,
            group: None,
            outer: None,
        };
        assert_eq!(env.resolve(Some("o"), "ID").unwrap(), Value::Int(2));
        let err = env.resolve(None, "id").unwrap_err();
        assert!(err.to_string().contains("Ambiguous"));
        assert!(env.resolve(None, "missing").is_err());
    }
}
