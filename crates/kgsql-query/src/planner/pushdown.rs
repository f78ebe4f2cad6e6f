//! Predicate splitting, constant folding and selectivity estimates

use crate::ast::BinaryOp;
use crate::binder::{BoundExpr, Parameters};
use kgsql_core::Value;
use std::cmp::Ordering;

// Selectivity factors by predicate shape
const EQUALITY_SELECTIVITY: f64 = 0.01;
const RANGE_SELECTIVITY: f64 = 0.33;
const TEXT_SELECTIVITY: f64 = 0.1;
const MEMBERSHIP_SELECTIVITY: f64 = 0.05;
const NULL_TEST_SELECTIVITY: f64 = 0.1;
const DEFAULT_SELECTIVITY: f64 = 0.5;

/// Flatten nested ANDs into their conjuncts, left to right
pub(crate) fn split_conjuncts(expr: &BoundExpr, out: &mut Vec<BoundExpr>) {
    match expr {
        BoundExpr::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => {
            split_conjuncts(left, out);
            split_conjuncts(right, out);
        }
        other => out.push(other.clone()),
    }
}

/// Fraction of rows a filter is expected to keep
pub(crate) fn selectivity(expr: &BoundExpr) -> f64 {
    match expr {
        BoundExpr::Binary { op, left, right } => match op {
            BinaryOp::Equals => EQUALITY_SELECTIVITY,
            BinaryOp::LessThan
            | BinaryOp::LessEquals
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterEquals => RANGE_SELECTIVITY,
            BinaryOp::Contains | BinaryOp::StartsWith | BinaryOp::EndsWith => TEXT_SELECTIVITY,
            BinaryOp::In => MEMBERSHIP_SELECTIVITY,
            BinaryOp::And => selectivity(left) * selectivity(right),
            BinaryOp::NotEquals | BinaryOp::Or | BinaryOp::Xor => DEFAULT_SELECTIVITY,
        },
        BoundExpr::IsNull { .. } => NULL_TEST_SELECTIVITY,
        _ => DEFAULT_SELECTIVITY,
    }
}

/// Scale a row estimate by the selectivity of its filters, keeping at least one row
pub(crate) fn estimate_rows(base: u64, filters: &[BoundExpr]) -> u64 {
    let factor: f64 = filters.iter().map(selectivity).product();
    ((base as f64 * factor).ceil() as u64).max(1)
}

/// Evaluate a variable-free predicate with SQL three-valued logic.
///
/// `None` means the predicate cannot be decided at plan time (it reads a
/// deferred parameter or calls the similarity function); `Some(None)` is
/// the SQL unknown.
pub(crate) fn fold_predicate(expr: &BoundExpr, params: &Parameters) -> Option<Option<bool>> {
    match expr {
        BoundExpr::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => {
            let (l, r) = (fold_predicate(left, params), fold_predicate(right, params));
            if l == Some(Some(false)) || r == Some(Some(false)) {
                return Some(Some(false));
            }
            match (l?, r?) {
                (Some(true), Some(true)) => Some(Some(true)),
                _ => Some(None),
            }
        }
        BoundExpr::Binary {
            op: BinaryOp::Or,
            left,
            right,
        } => {
            let (l, r) = (fold_predicate(left, params), fold_predicate(right, params));
            if l == Some(Some(true)) || r == Some(Some(true)) {
                return Some(Some(true));
            }
            match (l?, r?) {
                (Some(false), Some(false)) => Some(Some(false)),
                _ => Some(None),
            }
        }
        BoundExpr::Binary {
            op: BinaryOp::Xor,
            left,
            right,
        } => {
            let (l, r) = (fold_predicate(left, params)?, fold_predicate(right, params)?);
            Some(l.zip(r).map(|(a, b)| a != b))
        }
        BoundExpr::Binary {
            op: BinaryOp::In,
            left,
            right,
        } => {
            let needle = fold_value(left, params)?;
            let haystack = fold_value(right, params)?;
            let items = match haystack {
                Value::Null => return Some(None),
                other => other.elements()?,
            };
            if items.is_empty() {
                return Some(Some(false));
            }
            let mut unknown = false;
            for item in &items {
                match needle.sql_eq(item) {
                    Some(true) => return Some(Some(true)),
                    Some(false) => {}
                    None => unknown = true,
                }
            }
            Some(if unknown { None } else { Some(false) })
        }
        BoundExpr::Binary { op, left, right } => {
            let (l, r) = (fold_value(left, params)?, fold_value(right, params)?);
            Some(compare(*op, &l, &r))
        }
        BoundExpr::Not(operand) => Some(fold_predicate(operand, params)?.map(|b| !b)),
        BoundExpr::IsNull { operand, negated } => {
            let value = fold_value(operand, params)?;
            Some(Some(value.is_null() != *negated))
        }
        BoundExpr::Literal(Value::Boolean(b)) => Some(Some(*b)),
        BoundExpr::Literal(Value::Null) => Some(None),
        BoundExpr::Parameter { .. } => match fold_value(expr, params)? {
            Value::Boolean(b) => Some(Some(b)),
            _ => Some(None),
        },
        _ => None,
    }
}

/// Value of a variable-free operand, when known at plan time
fn fold_value(expr: &BoundExpr, params: &Parameters) -> Option<Value> {
    match expr {
        BoundExpr::Literal(value) => Some(value.clone()),
        BoundExpr::Parameter { name, .. } => params.values.get(name).cloned(),
        BoundExpr::List(items) => items
            .iter()
            .map(|item| fold_value(item, params))
            .collect::<Option<Vec<_>>>()
            .map(Value::List),
        BoundExpr::Binary { .. } | BoundExpr::Not(_) | BoundExpr::IsNull { .. } => {
            Some(match fold_predicate(expr, params)? {
                Some(b) => Value::Boolean(b),
                None => Value::Null,
            })
        }
        _ => None,
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Option<bool> {
    match op {
        BinaryOp::Equals => left.sql_eq(right),
        BinaryOp::NotEquals => left.sql_eq(right).map(|eq| !eq),
        BinaryOp::LessThan => left.sql_cmp(right).map(|o| o == Ordering::Less),
        BinaryOp::LessEquals => left.sql_cmp(right).map(|o| o != Ordering::Greater),
        BinaryOp::GreaterThan => left.sql_cmp(right).map(|o| o == Ordering::Greater),
        BinaryOp::GreaterEquals => left.sql_cmp(right).map(|o| o != Ordering::Less),
        BinaryOp::Contains => text_test(left, right, |h, n| h.contains(n)),
        BinaryOp::StartsWith => text_test(left, right, |h, n| h.starts_with(n)),
        BinaryOp::EndsWith => text_test(left, right, |h, n| h.ends_with(n)),
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::In => None,
    }
}

fn text_test(left: &Value, right: &Value, test: impl Fn(&str, &str) -> bool) -> Option<bool> {
    Some(test(left.as_str()?, right.as_str()?))
}
