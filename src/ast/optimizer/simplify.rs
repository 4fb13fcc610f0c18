//! Expression-level passes run to a fixed point.
use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveDateTime};

use super::OptimizationPass;
use crate::ast::types::*;
use crate::ast::visit::{for_each_select_mut, select_exprs_mut, transform_expr};
use crate::error::Result;
use crate::temporal::{
    add_to_date, add_to_timestamp, format_date, format_timestamp, parse_date, parse_timestamp,
    IntervalUnit,
};

/// Apply a bottom-up rewrite to every expression slot of every query level.
fn rewrite_query(query: &mut Query, rewrite: &dyn Fn(Expression) -> Expression) {
    let apply = |expr: &mut Expression| transform_expr(expr, &mut |e| rewrite(e));
    match query {
        Query::Update(update) => {
            for assignment in update.assignments.iter_mut() {
                apply(&mut assignment.value);
            }
            if let Some(filter) = update.filter.as_mut() {
                apply(filter);
            }
        }
        Query::Delete(delete) => {
            if let Some(filter) = delete.filter.as_mut() {
                apply(filter);
            }
        }
        _ => {}
    }
    for_each_select_mut(query, &mut |select| {
        for expr in select_exprs_mut(select) {
            apply(expr);
        }
    });
}

fn is_literal(expr: &Expression) -> bool {
    matches!(
        expr.unnested(),
        Expression::Literal(_) | Expression::TypedString { .. }
    ) || date_value(expr).is_some()
}

// ---- normalize_predicates ------------------------------------------------

/// Puts comparisons in column-first form and pushes NOT into predicates.
pub struct NormalizePredicates;

impl OptimizationPass for NormalizePredicates {
    fn name(&self) -> &str {
        "normalize_predicates"
    }

    fn description(&self) -> &str {
        "Flips literal-first comparisons and pushes NOT into predicates"
    }

    fn transform(&self, mut query: Query) -> Result<Query> {
        rewrite_query(&mut query, &normalize_expr);
        Ok(query)
    }
}

fn normalize_expr(expr: Expression) -> Expression {
    match expr {
        Expression::BinaryOp { left, op, right }
            if op.is_comparison() && is_literal(&left) && !is_literal(&right) =>
        {
            match op.flipped() {
                Some(flipped) => Expression::BinaryOp {
                    left: right,
                    op: flipped,
                    right: left,
                },
                None => Expression::BinaryOp { left, op, right },
            }
        }
        Expression::UnaryOp {
            op: UnaryOperator::Not,
            expr,
        } => negate(*expr),
        other => other,
    }
}

/// `NOT expr`, folded into the predicate when it has a direct negated form.
fn negate(expr: Expression) -> Expression {
    match expr {
        Expression::Nested(inner) if negatable(&inner) => negate(*inner),
        Expression::BinaryOp { left, op, right } => match op.negated() {
            Some(negated) => Expression::BinaryOp {
                left,
                op: negated,
                right,
            },
            None => Expression::not(Expression::Nested(Box::new(Expression::BinaryOp {
                left,
                op,
                right,
            }))),
        },
        Expression::IsNull { expr, negated } => Expression::IsNull {
            expr,
            negated: !negated,
        },
        Expression::IsBool {
            expr,
            value,
            negated,
        } => Expression::IsBool {
            expr,
            value,
            negated: !negated,
        },
        Expression::InList {
            expr,
            list,
            negated,
        } => Expression::InList {
            expr,
            list,
            negated: !negated,
        },
        Expression::InSubquery {
            expr,
            subquery,
            negated,
        } => Expression::InSubquery {
            expr,
            subquery,
            negated: !negated,
        },
        Expression::Between {
            expr,
            low,
            high,
            negated,
        } => Expression::Between {
            expr,
            low,
            high,
            negated: !negated,
        },
        other => Expression::not(other),
    }
}

fn negatable(expr: &Expression) -> bool {
    match expr {
        Expression::BinaryOp { op, .. } => op.negated().is_some(),
        Expression::IsNull { .. }
        | Expression::IsBool { .. }
        | Expression::InList { .. }
        | Expression::InSubquery { .. }
        | Expression::Between { .. } => true,
        Expression::Nested(inner) => negatable(inner),
        _ => false,
    }
}

// ---- fold_constants -------------------------------------------------------

/// Evaluates expressions whose operands are all literals.
pub struct FoldConstants;

impl OptimizationPass for FoldConstants {
    fn name(&self) -> &str {
        "fold_constants"
    }

    fn description(&self) -> &str {
        "Evaluates constant arithmetic, comparisons, concatenation and date math"
    }

    fn transform(&self, mut query: Query) -> Result<Query> {
        rewrite_query(&mut query, &fold_expr);
        Ok(query)
    }
}

fn literal(expr: &Expression) -> Option<&Literal> {
    match expr.unnested() {
        Expression::Literal(lit) => Some(lit),
        _ => None,
    }
}

fn date_value(expr: &Expression) -> Option<NaiveDate> {
    match expr.unnested() {
        Expression::TypedString { data_type, value } if data_type == "DATE" => parse_date(value),
        Expression::Cast { expr, data_type } if data_type == "DATE" => match expr.unnested() {
            Expression::Literal(Literal::String(s)) => parse_date(s),
            _ => None,
        },
        _ => None,
    }
}

fn timestamp_value(expr: &Expression) -> Option<NaiveDateTime> {
    match expr.unnested() {
        Expression::TypedString { data_type, value } if data_type == "TIMESTAMP" => {
            parse_timestamp(value)
        }
        Expression::Cast { expr, data_type } if data_type == "TIMESTAMP" => {
            match expr.unnested() {
                Expression::Literal(Literal::String(s)) => parse_timestamp(s),
                _ => None,
            }
        }
        _ => None,
    }
}

fn interval_value(expr: &Expression) -> Option<(i64, IntervalUnit)> {
    match expr.unnested() {
        Expression::Interval {
            value,
            unit: Some(unit),
        } => {
            let amount = match value.unnested() {
                Expression::Literal(Literal::Integer(i)) => *i,
                Expression::Literal(Literal::String(s)) => s.trim().parse().ok()?,
                _ => return None,
            };
            Some((amount, IntervalUnit::parse(unit)?))
        }
        _ => None,
    }
}

fn date_literal(date: NaiveDate) -> Expression {
    Expression::Cast {
        expr: Box::new(Expression::Literal(Literal::String(format_date(date)))),
        data_type: "DATE".into(),
    }
}

fn timestamp_literal(ts: NaiveDateTime) -> Expression {
    Expression::Cast {
        expr: Box::new(Expression::Literal(Literal::String(format_timestamp(ts)))),
        data_type: "TIMESTAMP".into(),
    }
}

fn int(v: i64) -> Expression {
    Expression::Literal(Literal::Integer(v))
}

fn float(v: f64) -> Option<Expression> {
    v.is_finite().then(|| Expression::Literal(Literal::Float(v)))
}

fn fold_expr(expr: Expression) -> Expression {
    match expr {
        Expression::BinaryOp { left, op, right } => match fold_binary(&left, op, &right) {
            Some(folded) => folded,
            None => Expression::BinaryOp { left, op, right },
        },
        Expression::UnaryOp { op, expr } => match (op, literal(&expr).cloned()) {
            (UnaryOperator::Minus, Some(Literal::Integer(i))) => match i.checked_neg() {
                Some(n) => int(n),
                None => Expression::UnaryOp { op, expr },
            },
            (UnaryOperator::Minus, Some(Literal::Float(f))) => {
                Expression::Literal(Literal::Float(-f))
            }
            (UnaryOperator::Plus, Some(Literal::Integer(_) | Literal::Float(_))) => *expr,
            (UnaryOperator::Not, Some(Literal::Boolean(b))) => Expression::boolean(!b),
            (UnaryOperator::Not, Some(Literal::Null)) => Expression::Literal(Literal::Null),
            _ => Expression::UnaryOp { op, expr },
        },
        Expression::IsNull { expr, negated } => match literal(&expr) {
            Some(lit) => Expression::boolean((*lit == Literal::Null) != negated),
            None => Expression::IsNull { expr, negated },
        },
        Expression::Cast { expr, data_type } => {
            let text = match expr.unnested() {
                Expression::Literal(Literal::String(s)) => Some(s.clone()),
                _ => None,
            };
            match (data_type.as_str(), text) {
                ("DATE", Some(s)) => match parse_date(&s) {
                    Some(d) => date_literal(d),
                    None => Expression::Cast { expr, data_type },
                },
                ("TIMESTAMP", Some(s)) => match parse_timestamp(&s) {
                    Some(ts) => timestamp_literal(ts),
                    None => Expression::Cast { expr, data_type },
                },
                _ => Expression::Cast { expr, data_type },
            }
        }
        Expression::Nested(inner) if matches!(*inner, Expression::Literal(_)) => *inner,
        other => other,
    }
}

fn fold_binary(left: &Expression, op: BinaryOperator, right: &Expression) -> Option<Expression> {
    use BinaryOperator::*;

    // Date and timestamp arithmetic with intervals.
    if matches!(op, Plus | Minus) {
        if let Some(folded) = fold_temporal(left, op, right) {
            return Some(folded);
        }
    }
    if op.is_comparison() {
        if let (Some(a), Some(b)) = (date_value(left), date_value(right)) {
            return Some(Expression::boolean(compare_result(op, a.cmp(&b))));
        }
    }

    let (a, b) = (literal(left)?, literal(right)?);
    if matches!(op, And | Or) {
        return None;
    }
    if *a == Literal::Null || *b == Literal::Null {
        return Some(Expression::Literal(Literal::Null));
    }

    match op {
        Plus | Minus | Multiply | Divide | Modulo => fold_arithmetic(a, op, b),
        Eq | NotEq | Lt | LtEq | Gt | GtEq => {
            compare_literals(a, b).map(|ord| Expression::boolean(compare_result(op, ord)))
        }
        Concat => match (a, b) {
            (Literal::String(x), Literal::String(y)) => {
                Some(Expression::Literal(Literal::String(format!("{}{}", x, y))))
            }
            _ => None,
        },
        _ => None,
    }
}

fn fold_temporal(left: &Expression, op: BinaryOperator, right: &Expression) -> Option<Expression> {
    let (amount, unit) = interval_value(right)
        .or_else(|| {
            if op == BinaryOperator::Plus {
                interval_value(left)
            } else {
                None
            }
        })?;
    let base = if interval_value(right).is_some() {
        left
    } else {
        right
    };
    let amount = if op == BinaryOperator::Minus {
        amount.checked_neg()?
    } else {
        amount
    };

    if let Some(date) = date_value(base) {
        if unit.is_date_part() {
            return add_to_date(date, amount, unit).map(date_literal);
        }
        let ts = date.and_hms_opt(0, 0, 0)?;
        return add_to_timestamp(ts, amount, unit).map(timestamp_literal);
    }
    let ts = timestamp_value(base)?;
    add_to_timestamp(ts, amount, unit).map(timestamp_literal)
}

fn fold_arithmetic(a: &Literal, op: BinaryOperator, b: &Literal) -> Option<Expression> {
    use BinaryOperator::*;
    match (a, b) {
        (Literal::Integer(x), Literal::Integer(y)) => {
            let (x, y) = (*x, *y);
            match op {
                Plus => x.checked_add(y).map(int),
                Minus => x.checked_sub(y).map(int),
                Multiply => x.checked_mul(y).map(int),
                // Only exact quotients: integer division semantics differ by dialect.
                Divide if y != 0 && x.checked_rem(y) == Some(0) => x.checked_div(y).map(int),
                Modulo if y != 0 => x.checked_rem(y).map(int),
                _ => None,
            }
        }
        (Literal::Integer(_) | Literal::Float(_), Literal::Integer(_) | Literal::Float(_)) => {
            let x = as_f64(a)?;
            let y = as_f64(b)?;
            match op {
                Plus => float(x + y),
                Minus => float(x - y),
                Multiply => float(x * y),
                Divide if y != 0.0 => float(x / y),
                _ => None,
            }
        }
        _ => None,
    }
}

fn as_f64(lit: &Literal) -> Option<f64> {
    match lit {
        Literal::Integer(i) => Some(*i as f64),
        Literal::Float(f) => Some(*f),
        _ => None,
    }
}

fn compare_literals(a: &Literal, b: &Literal) -> Option<Ordering> {
    match (a, b) {
        (Literal::Integer(x), Literal::Integer(y)) => Some(x.cmp(y)),
        (Literal::String(x), Literal::String(y)) => Some(x.cmp(y)),
        (Literal::Boolean(x), Literal::Boolean(y)) => Some(x.cmp(y)),
        _ => as_f64(a)?.partial_cmp(&as_f64(b)?),
    }
}

fn compare_result(op: BinaryOperator, ord: Ordering) -> bool {
    match op {
        BinaryOperator::Eq => ord == Ordering::Equal,
        BinaryOperator::NotEq => ord != Ordering::Equal,
        BinaryOperator::Lt => ord == Ordering::Less,
        BinaryOperator::LtEq => ord != Ordering::Greater,
        BinaryOperator::Gt => ord == Ordering::Greater,
        BinaryOperator::GtEq => ord != Ordering::Less,
        _ => false,
    }
}

// ---- simplify_booleans ----------------------------------------------------

/// Boolean algebra: identities, absorbing elements, duplicates, complements.
pub struct SimplifyBooleans;

impl OptimizationPass for SimplifyBooleans {
    fn name(&self) -> &str {
        "simplify_booleans"
    }

    fn description(&self) -> &str {
        "Applies boolean identities and drops WHERE TRUE / HAVING TRUE"
    }

    fn transform(&self, mut query: Query) -> Result<Query> {
        rewrite_query(&mut query, &simplify_expr);
        for_each_select_mut(&mut query, &mut |select| {
            if is_true(select.filter.as_ref()) {
                select.filter = None;
            }
            if is_true(select.having.as_ref()) {
                select.having = None;
            }
        });
        match &mut query {
            Query::Update(update) if is_true(update.filter.as_ref()) => update.filter = None,
            Query::Delete(delete) if is_true(delete.filter.as_ref()) => delete.filter = None,
            _ => {}
        }
        Ok(query)
    }
}

fn is_true(expr: Option<&Expression>) -> bool {
    matches!(expr.and_then(literal), Some(Literal::Boolean(true)))
}

fn bool_literal(expr: &Expression) -> Option<bool> {
    match literal(expr) {
        Some(Literal::Boolean(b)) => Some(*b),
        _ => None,
    }
}

fn flatten(expr: Expression, op: BinaryOperator, out: &mut Vec<Expression>) {
    match expr {
        Expression::BinaryOp { left, op: o, right } if o == op => {
            flatten(*left, op, out);
            flatten(*right, op, out);
        }
        Expression::Nested(inner)
            if matches!(inner.as_ref(), Expression::BinaryOp { op: o, .. } if *o == op) =>
        {
            flatten(*inner, op, out)
        }
        other => out.push(other),
    }
}

fn is_complement(a: &Expression, b: &Expression) -> bool {
    match b.unnested() {
        Expression::UnaryOp {
            op: UnaryOperator::Not,
            expr,
        } => expr.unnested() == a.unnested(),
        _ => false,
    }
}

fn simplify_connective(left: Expression, op: BinaryOperator, right: Expression) -> Expression {
    // AND: identity TRUE, absorbing FALSE. OR: the reverse.
    let identity = op == BinaryOperator::And;
    let other = if identity {
        BinaryOperator::Or
    } else {
        BinaryOperator::And
    };

    let mut operands = Vec::new();
    flatten(left, op, &mut operands);
    flatten(right, op, &mut operands);

    let mut kept: Vec<Expression> = Vec::new();
    for operand in operands {
        match bool_literal(&operand) {
            Some(b) if b == identity => continue,
            Some(_) => return Expression::boolean(!identity),
            None => {}
        }
        if kept.iter().any(|k| k.unnested() == operand.unnested()) {
            continue;
        }
        kept.push(operand);
    }

    for (i, a) in kept.iter().enumerate() {
        for (j, b) in kept.iter().enumerate() {
            if i != j && is_complement(a, b) {
                return Expression::boolean(!identity);
            }
        }
    }

    // Absorption: a AND (a OR b) is a, a OR (a AND b) is a.
    let absorbed: Vec<bool> = kept
        .iter()
        .enumerate()
        .map(|(i, candidate)| {
            let mut inner = Vec::new();
            flatten(candidate.unnested().clone(), other, &mut inner);
            inner.len() > 1
                && kept.iter().enumerate().any(|(j, k)| {
                    i != j && inner.iter().any(|x| x.unnested() == k.unnested())
                })
        })
        .collect();
    let kept: Vec<Expression> = kept
        .into_iter()
        .zip(absorbed)
        .filter(|(_, absorbed)| !absorbed)
        .map(|(e, _)| e)
        .collect();

    let mut iter = kept.into_iter();
    match iter.next() {
        None => Expression::boolean(identity),
        Some(first) => iter.fold(first, |acc, next| Expression::binary(acc, op, next)),
    }
}

fn simplify_expr(expr: Expression) -> Expression {
    match expr {
        Expression::BinaryOp { left, op, right }
            if matches!(op, BinaryOperator::And | BinaryOperator::Or) =>
        {
            simplify_connective(*left, op, *right)
        }
        Expression::BinaryOp { left, op, right }
            if matches!(op, BinaryOperator::Eq | BinaryOperator::NotEq) =>
        {
            let (value, subject) = match (bool_literal(&left), bool_literal(&right)) {
                (None, Some(b)) => (b, left),
                (Some(b), None) => (b, right),
                _ => return Expression::BinaryOp { left, op, right },
            };
            if value == (op == BinaryOperator::Eq) {
                *subject
            } else {
                Expression::not(*subject)
            }
        }
        Expression::UnaryOp {
            op: UnaryOperator::Not,
            expr,
        } => match *expr {
            Expression::UnaryOp {
                op: UnaryOperator::Not,
                expr: inner,
            } => *inner,
            Expression::Nested(inner)
                if matches!(
                    inner.as_ref(),
                    Expression::UnaryOp {
                        op: UnaryOperator::Not,
                        ..
                    }
                ) =>
            {
                match *inner {
                    Expression::UnaryOp { expr: x, .. } => *x,
                    other => Expression::not(Expression::Nested(Box::new(other))),
                }
            }
            other => match bool_literal(&other) {
                Some(b) => Expression::boolean(!b),
                None => Expression::not(other),
            },
        },
        other => other,
    }
}

// ---- remove_redundant_nesting ---------------------------------------------

/// Removes parentheses the tree structure already implies.
///
/// The generator re-inserts parentheses wherever operator precedence needs
/// them, so every `Nested` wrapper is redundant once parsed.
pub struct RemoveRedundantNesting;

impl OptimizationPass for RemoveRedundantNesting {
    fn name(&self) -> &str {
        "remove_redundant_nesting"
    }

    fn description(&self) -> &str {
        "Removes unnecessary parenthesized expressions"
    }

    fn transform(&self, mut query: Query) -> Result<Query> {
        rewrite_query(&mut query, &unnest_expr);
        Ok(query)
    }
}

fn unnest_expr(expr: Expression) -> Expression {
    match expr {
        Expression::Nested(inner) => unnest_expr(*inner),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::compiler::compile;
    use crate::ast::parser::parse_single;

    fn run(pass: &dyn OptimizationPass, sql: &str) -> String {
        let query = parse_single(sql, None).unwrap();
        compile(&pass.transform(query).unwrap())
    }

    #[test]
    fn test_flip_literal_first() {
        assert_eq!(
            run(&NormalizePredicates, "SELECT * FROM t WHERE 5 < x"),
            "SELECT * FROM t WHERE x > 5"
        );
    }

    #[test]
    fn test_push_not_into_predicates() {
        assert_eq!(
            run(&NormalizePredicates, "SELECT * FROM t WHERE NOT (x = 1)"),
            "SELECT * FROM t WHERE x <> 1"
        );
        assert_eq!(
            run(&NormalizePredicates, "SELECT * FROM t WHERE NOT x IS NULL"),
            "SELECT * FROM t WHERE x IS NOT NULL"
        );
        assert_eq!(
            run(&NormalizePredicates, "SELECT * FROM t WHERE NOT x IN (1, 2)"),
            "SELECT * FROM t WHERE x NOT IN (1, 2)"
        );
    }

    #[test]
    fn test_fold_arithmetic_and_comparison() {
        assert_eq!(
            run(&FoldConstants, "SELECT 1 + 2 * 3, 7 / 2, 6 / 3, 1 = 1"),
            "SELECT 7, 7 / 2, 2, TRUE"
        );
        assert_eq!(run(&FoldConstants, "SELECT 1 / 0"), "SELECT 1 / 0");
        assert_eq!(run(&FoldConstants, "SELECT NULL + 1"), "SELECT NULL");
        assert_eq!(run(&FoldConstants, "SELECT 'a' || 'b'"), "SELECT 'ab'");
    }

    #[test]
    fn test_fold_date_arithmetic() {
        assert_eq!(
            run(
                &FoldConstants,
                "SELECT CAST('2020-01-31' AS DATE) + INTERVAL '1' MONTH"
            ),
            "SELECT CAST('2020-02-29' AS DATE)"
        );
        assert_eq!(
            run(&FoldConstants, "SELECT DATE '2020-01-01' - INTERVAL '1' DAY"),
            "SELECT CAST('2019-12-31' AS DATE)"
        );
    }

    #[test]
    fn test_simplify_identities() {
        assert_eq!(
            run(&SimplifyBooleans, "SELECT * FROM t WHERE x = 1 AND TRUE"),
            "SELECT * FROM t WHERE x = 1"
        );
        assert_eq!(
            run(&SimplifyBooleans, "SELECT * FROM t WHERE x = 1 OR TRUE"),
            "SELECT * FROM t"
        );
        assert_eq!(
            run(&SimplifyBooleans, "SELECT * FROM t WHERE x = 1 AND FALSE"),
            "SELECT * FROM t WHERE FALSE"
        );
    }

    #[test]
    fn test_simplify_boolean_comparisons() {
        assert_eq!(
            run(&SimplifyBooleans, "SELECT * FROM t WHERE active = FALSE"),
            "SELECT * FROM t WHERE NOT active"
        );
        assert_eq!(
            run(&SimplifyBooleans, "SELECT * FROM t WHERE active = TRUE OR active = FALSE"),
            "SELECT * FROM t"
        );
    }

    #[test]
    fn test_simplify_duplicates_and_absorption() {
        assert_eq!(
            run(&SimplifyBooleans, "SELECT * FROM t WHERE a = 1 AND a = 1"),
            "SELECT * FROM t WHERE a = 1"
        );
        assert_eq!(
            run(&SimplifyBooleans, "SELECT * FROM t WHERE a = 1 AND (a = 1 OR b = 2)"),
            "SELECT * FROM t WHERE a = 1"
        );
        assert_eq!(
            run(&SimplifyBooleans, "SELECT * FROM t WHERE NOT NOT a"),
            "SELECT * FROM t WHERE a"
        );
    }

    #[test]
    fn test_remove_redundant_nesting() {
        assert_eq!(
            run(&RemoveRedundantNesting, "SELECT ((a)), (a + b) * c FROM t WHERE ((x = 1))"),
            "SELECT a, (a + b) * c FROM t WHERE x = 1"
        );
    }
}
