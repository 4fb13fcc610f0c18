use std::cmp::Ordering;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

use crate::ast::schema::TypeFamily;
use crate::error::{Result, SqlToolError};
use crate::temporal::{
    add_to_date, add_to_timestamp, format_date, format_timestamp, parse_date, parse_timestamp,
    IntervalUnit,
};

/// A single cell value during execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Interval { amount: i64, unit: IntervalUnit },
}

/// Hashable identity of a value for grouping, DISTINCT and set operations.
/// Integral floats share a key with the equal integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Interval(i64, &'static str),
}

impl Value {
    /// Convert a JSON cell. Arrays and objects are carried as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::json!(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            other => serde_json::Value::String(other.display()),
        }
    }

    pub fn display(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Date(d) => format_date(*d),
            Value::DateTime(ts) => format_timestamp(*ts),
            Value::Interval { amount, unit } => format!("{} {}", amount, unit.keyword()),
        }
    }

    pub fn display_width(&self) -> usize {
        unicode_width::UnicodeWidthStr::width(self.display().as_str())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "INTEGER",
            Value::Float(_) => "DOUBLE",
            Value::Text(_) => "TEXT",
            Value::Date(_) => "DATE",
            Value::DateTime(_) => "TIMESTAMP",
            Value::Interval { .. } => "INTERVAL",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truth value for predicates: `None` is SQL unknown.
    pub fn truth(&self) -> Result<Option<bool>> {
        match self {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(*b)),
            Value::Int(i) => Ok(Some(*i != 0)),
            other => Err(SqlToolError::execution(format!(
                "Expected a boolean but found {} value '{}'",
                other.type_name(),
                other.display()
            ))),
        }
    }

    pub fn key(&self) -> ValueKey {
        match self {
            Value::Null => ValueKey::Null,
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::Int(i) => ValueKey::Int(*i),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => ValueKey::Int(*f as i64),
            Value::Float(f) => ValueKey::Float(f.to_bits()),
            Value::Text(s) => ValueKey::Text(s.clone()),
            Value::Date(d) => ValueKey::Date(*d),
            Value::DateTime(ts) => ValueKey::DateTime(*ts),
            Value::Interval { amount, unit } => ValueKey::Interval(*amount, unit.keyword()),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Three-valued comparison: `Ok(None)` when either side is NULL. Text is
    /// coerced when compared with a date or timestamp.
    pub fn compare(&self, other: &Value) -> Result<Option<Ordering>> {
        let ord = match (self, other) {
            (Value::Null, _) | (_, Value::Null) => return Ok(None),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Date(a), Value::DateTime(b)) => midnight(*a)?.cmp(b),
            (Value::DateTime(a), Value::Date(b)) => a.cmp(&midnight(*b)?),
            (Value::Text(s), Value::Date(_) | Value::DateTime(_)) => {
                return Value::coerce_temporal(s, other)?.compare(other)
            }
            (Value::Date(_) | Value::DateTime(_), Value::Text(s)) => {
                return self.compare(&Value::coerce_temporal(s, self)?)
            }
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).ok_or_else(|| {
                    SqlToolError::execution("Cannot compare NaN values")
                })?,
                _ => return Err(mismatch("compare", a, b)),
            },
        };
        Ok(Some(ord))
    }

    fn coerce_temporal(text: &str, like: &Value) -> Result<Value> {
        let parsed = match like {
            Value::Date(_) => parse_date(text).map(Value::Date),
            _ => parse_timestamp(text).map(Value::DateTime),
        };
        parsed
            .or_else(|| parse_date(text).map(Value::Date))
            .ok_or_else(|| {
                SqlToolError::execution(format!(
                    "Cannot compare TEXT value '{}' with {}",
                    text,
                    like.type_name()
                ))
            })
    }

    /// `=` under three-valued logic.
    pub fn sql_eq(&self, other: &Value) -> Result<Option<bool>> {
        if self.is_null() || other.is_null() {
            return Ok(None);
        }
        match self.compare(other) {
            Ok(ord) => Ok(ord.map(|o| o == Ordering::Equal)),
            // Values of unrelated types are simply unequal.
            Err(_) => Ok(Some(false)),
        }
    }

    pub fn add(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(*b)
                .map(Value::Int)
                .ok_or_else(overflow),
            (Value::Date(_) | Value::DateTime(_), Value::Interval { amount, unit }) => {
                shift(self, *amount, *unit)
            }
            (Value::Interval { amount, unit }, Value::Date(_) | Value::DateTime(_)) => {
                shift(other, *amount, *unit)
            }
            (Value::Date(d), Value::Int(days)) => shift(&Value::Date(*d), *days, IntervalUnit::Day),
            _ => float_op(self, other, "+", |x, y| x + y),
        }
    }

    pub fn sub(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
            (Value::Int(a), Value::Int(b)) => a
                .checked_sub(*b)
                .map(Value::Int)
                .ok_or_else(overflow),
            (Value::Date(_) | Value::DateTime(_), Value::Interval { amount, unit }) => {
                shift(self, amount.checked_neg().ok_or_else(overflow)?, *unit)
            }
            (Value::Date(d), Value::Int(days)) => shift(
                &Value::Date(*d),
                days.checked_neg().ok_or_else(overflow)?,
                IntervalUnit::Day,
            ),
            (Value::Date(a), Value::Date(b)) => Ok(Value::Int((*a - *b).num_days())),
            _ => float_op(self, other, "-", |x, y| x - y),
        }
    }

    pub fn mul(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
            (Value::Int(a), Value::Int(b)) => a
                .checked_mul(*b)
                .map(Value::Int)
                .ok_or_else(overflow),
            _ => float_op(self, other, "*", |x, y| x * y),
        }
    }

    /// Integer division truncates toward zero; dividing by zero is an error.
    pub fn div(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
            _ if other.as_f64() == Some(0.0) => Err(SqlToolError::execution("Division by zero")),
            (Value::Int(a), Value::Int(b)) => a
                .checked_div(*b)
                .map(Value::Int)
                .ok_or_else(overflow),
            _ => float_op(self, other, "/", |x, y| x / y),
        }
    }

    pub fn rem(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
            _ if other.as_f64() == Some(0.0) => Err(SqlToolError::execution("Division by zero")),
            (Value::Int(a), Value::Int(b)) => a
                .checked_rem(*b)
                .map(Value::Int)
                .ok_or_else(overflow),
            _ => float_op(self, other, "%", |x, y| x % y),
        }
    }

    pub fn neg(&self) -> Result<Value> {
        match self {
            Value::Null => Ok(Value::Null),
            Value::Int(i) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(SqlToolError::execution(format!(
                "Cannot negate {} value '{}'",
                other.type_name(),
                other.display()
            ))),
        }
    }

    /// `CAST(self AS data_type)`.
    pub fn cast(&self, data_type: &str) -> Result<Value> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        let fail = || {
            SqlToolError::execution(format!(
                "Cannot cast {} value '{}' to {}",
                self.type_name(),
                self.display(),
                data_type
            ))
        };
        let head = data_type.split('(').next().unwrap_or(data_type).trim();
        let integral = matches!(
            head,
            "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT"
        );
        match TypeFamily::of(data_type) {
            TypeFamily::Numeric if integral => match self {
                Value::Int(i) => Ok(Value::Int(*i)),
                Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
                Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                Value::Text(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| fail()),
                _ => Err(fail()),
            },
            TypeFamily::Numeric => match self {
                Value::Int(i) => Ok(Value::Float(*i as f64)),
                Value::Float(f) => Ok(Value::Float(*f)),
                Value::Text(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| fail()),
                _ => Err(fail()),
            },
            TypeFamily::Text => Ok(Value::Text(self.display())),
            TypeFamily::Boolean => match self {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::Int(i) => Ok(Value::Bool(*i != 0)),
                Value::Text(s) => match s.trim().to_lowercase().as_str() {
                    "true" | "t" | "1" | "yes" | "y" => Ok(Value::Bool(true)),
                    "false" | "f" | "0" | "no" | "n" => Ok(Value::Bool(false)),
                    _ => Err(fail()),
                },
                _ => Err(fail()),
            },
            TypeFamily::Date => match self {
                Value::Date(d) => Ok(Value::Date(*d)),
                Value::DateTime(ts) => Ok(Value::Date(ts.date())),
                Value::Text(s) => parse_date(s)
                    .or_else(|| parse_timestamp(s).map(|ts| ts.date()))
                    .map(Value::Date)
                    .ok_or_else(fail),
                _ => Err(fail()),
            },
            TypeFamily::Timestamp => match self {
                Value::DateTime(ts) => Ok(Value::DateTime(*ts)),
                Value::Date(d) => midnight(*d).map(Value::DateTime),
                Value::Text(s) => parse_timestamp(s)
                    .or_else(|| parse_date(s).and_then(|d| d.and_hms_opt(0, 0, 0)))
                    .map(Value::DateTime)
                    .ok_or_else(fail),
                _ => Err(fail()),
            },
            TypeFamily::Other => Err(fail()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

fn midnight(date: NaiveDate) -> Result<NaiveDateTime> {
    date.and_hms_opt(0, 0, 0)
        .ok_or_else(|| SqlToolError::execution("Invalid date"))
}

fn overflow() -> SqlToolError {
    SqlToolError::execution("Integer overflow")
}

fn mismatch(op: &str, a: &Value, b: &Value) -> SqlToolError {
    SqlToolError::execution(format!(
        "Cannot {} {} value '{}' and {} value '{}'",
        op,
        a.type_name(),
        a.display(),
        b.type_name(),
        b.display()
    ))
}

fn float_op(a: &Value, b: &Value, symbol: &str, op: impl Fn(f64, f64) -> f64) -> Result<Value> {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => Ok(Value::Float(op(x, y))),
        _ => Err(mismatch(&format!("apply '{}' to", symbol), a, b)),
    }
}

/// Date or timestamp shifted by an interval. Sub-day units turn a date into
/// a timestamp.
fn shift(base: &Value, amount: i64, unit: IntervalUnit) -> Result<Value> {
    let out_of_range = || SqlToolError::execution("Date arithmetic out of range");
    match base {
        Value::Date(d) if unit.is_date_part() => add_to_date(*d, amount, unit)
            .map(Value::Date)
            .ok_or_else(out_of_range),
        Value::Date(d) => add_to_timestamp(midnight(*d)?, amount, unit)
            .map(Value::DateTime)
            .ok_or_else(out_of_range),
        Value::DateTime(ts) => add_to_timestamp(*ts, amount, unit)
            .map(Value::DateTime)
            .ok_or_else(out_of_range),
        other => Err(SqlToolError::execution(format!(
            "Cannot add an interval to {} value",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        assert_eq!(Value::from_json(&json!(1)), Value::Int(1));
        assert_eq!(Value::from_json(&json!(1.5)), Value::Float(1.5));
        assert_eq!(Value::from_json(&json!(null)), Value::Null);
        assert_eq!(Value::from_json(&json!([1, 2])), Value::Text("[1,2]".into()));
    }

    #[test]
    fn test_compare_three_valued() {
        assert_eq!(Value::Int(1).compare(&Value::Null).unwrap(), None);
        assert_eq!(
            Value::Int(2).compare(&Value::Float(1.5)).unwrap(),
            Some(Ordering::Greater)
        );
        assert!(Value::Int(1).compare(&Value::Text("a".into())).is_err());
        assert_eq!(Value::Int(1).sql_eq(&Value::Text("1".into())).unwrap(), Some(false));
    }

    #[test]
    fn test_text_coerces_to_date() {
        let date = Value::Date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(
            Value::Text("2020-06-01".into()).compare(&date).unwrap(),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(Value::Int(7).div(&Value::Int(2)).unwrap(), Value::Int(3));
        assert_eq!(Value::Int(7).div(&Value::Float(2.0)).unwrap(), Value::Float(3.5));
        assert!(Value::Int(1).div(&Value::Int(0)).is_err());
        assert!(Value::Int(i64::MAX).add(&Value::Int(1)).is_err());
        assert_eq!(Value::Null.add(&Value::Int(1)).unwrap(), Value::Null);
        let err = Value::Text("a".into()).add(&Value::Int(1)).unwrap_err();
        assert_eq!(err.error_type(), "ExecutionError");
    }

    #[test]
    fn test_date_interval() {
        let date = Value::Date(NaiveDate::from_ymd_opt(2020, 1, 31).unwrap());
        let month = Value::Interval {
            amount: 1,
            unit: IntervalUnit::Month,
        };
        assert_eq!(date.add(&month).unwrap().display(), "2020-02-29");
        let hour = Value::Interval {
            amount: 2,
            unit: IntervalUnit::Hour,
        };
        assert_eq!(date.add(&hour).unwrap().display(), "2020-01-31 02:00:00");
    }

    #[test]
    fn test_cast() {
        assert_eq!(Value::Text("42".into()).cast("INT").unwrap(), Value::Int(42));
        assert_eq!(Value::Int(3).cast("DOUBLE").unwrap(), Value::Float(3.0));
        assert_eq!(Value::Int(3).cast("VARCHAR(10)").unwrap(), Value::Text("3".into()));
        assert_eq!(
            Value::Text("2020-01-02".into()).cast("DATE").unwrap().display(),
            "2020-01-02"
        );
        assert!(Value::Text("x".into()).cast("INT").is_err());
    }

    #[test]
    fn test_keys_unify_integral_floats() {
        assert_eq!(Value::Int(2).key(), Value::Float(2.0).key());
        assert_ne!(Value::Int(2).key(), Value::Text("2".into()).key());
    }
}
