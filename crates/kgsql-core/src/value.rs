//! Values exchanged with callers
//!
//! Parameter bindings come in as [`Value`]s and literals found in the query
//! text are turned into them, so both end up in the bind-parameter list
//! rather than in SQL text.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A parameter or literal value
///
/// Serialized as plain JSON: arrays of numbers become vectors, any other
/// array becomes a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null/missing value
    Null,

    /// Boolean value
    Boolean(bool),

    /// 64-bit signed integer
    Integer(i64),

    /// 64-bit floating point
    Float(f64),

    /// UTF-8 string
    String(String),

    /// Embedding vector
    Vector(Vec<f32>),

    /// Heterogeneous list, used for `IN` membership
    List(Vec<Value>),
}

/// Static kind of a property or expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    Vector,
}

impl ValueKind {
    /// Get the kind name
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Vector => "vector",
        }
    }

    /// Whether values of this kind have a total order usable by `<`, `>` etc.
    pub fn is_ordered(self) -> bool {
        matches!(self, ValueKind::String | ValueKind::Number)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    /// Returns true if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Static kind of the value; `None` for null and lists
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Value::Null | Value::List(_) => None,
            Value::Boolean(_) => Some(ValueKind::Boolean),
            Value::Integer(_) | Value::Float(_) => Some(ValueKind::Number),
            Value::String(_) => Some(ValueKind::String),
            Value::Vector(_) => Some(ValueKind::Vector),
        }
    }

    /// Try to get as boolean
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Elements of a list-like value, for membership tests
    pub fn elements(&self) -> Option<Vec<Value>> {
        match self {
            Value::List(items) => Some(items.clone()),
            Value::Vector(items) => Some(items.iter().map(|f| Value::Float(*f as f64)).collect()),
            _ => None,
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Vector(_) => "vector",
            Value::List(_) => "list",
        }
    }

    /// SQL-style equality: `None` when either side is null or the kinds
    /// cannot be compared
    pub fn sql_eq(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Boolean(a), Value::Boolean(b)) => Some(a == b),
            (Value::String(a), Value::String(b)) => Some(a == b),
            (Value::Vector(a), Value::Vector(b)) => Some(a == b),
            _ => self.sql_cmp(other).map(|ord| ord == Ordering::Equal),
        }
    }

    /// SQL-style ordering between numbers or between strings
    pub fn sql_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Vector(v) => write!(f, "vector[{}]", v.len()),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

// Convenience From implementations
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<f32>> for Value {
    fn from(v: Vec<f32>) -> Self {
        Value::Vector(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_value_kinds() {
        assert_eq!(Value::Null.kind(), None);
        assert_eq!(Value::Boolean(true).kind(), Some(ValueKind::Boolean));
        assert_eq!(Value::Integer(42).kind(), Some(ValueKind::Number));
        assert_eq!(Value::Float(0.5).kind(), Some(ValueKind::Number));
        assert_eq!(Value::from("x").kind(), Some(ValueKind::String));
        assert_eq!(Value::from(vec![0.1f32, 0.2]).kind(), Some(ValueKind::Vector));
    }

    #[test]
    fn test_json_shapes() {
        let values: Vec<Value> =
            serde_json::from_str(r#"[null, true, 7, 1.5, "P:1", [0.5, 1.0], ["a", "b"]]"#)
                .unwrap();
        assert_eq!(values[0], Value::Null);
        assert_eq!(values[1], Value::Boolean(true));
        assert_eq!(values[2], Value::Integer(7));
        assert_eq!(values[3], Value::Float(1.5));
        assert_eq!(values[4], Value::from("P:1"));
        assert_eq!(values[5], Value::Vector(vec![0.5, 1.0]));
        assert_eq!(
            values[6],
            Value::List(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn test_sql_comparison_is_null_aware() {
        assert_eq!(Value::Null.sql_eq(&Value::Integer(1)), None);
        assert_eq!(Value::Integer(1).sql_eq(&Value::Float(1.0)), Some(true));
        assert_eq!(Value::from("a").sql_eq(&Value::from("b")), Some(false));
        assert_eq!(Value::from("a").sql_cmp(&Value::Integer(1)), None);
        assert_eq!(
            Value::Integer(2).sql_cmp(&Value::Float(2.5)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_vector_elements() {
        let v = Value::Vector(vec![1.0, 2.0]);
        assert_eq!(
            v.elements(),
            Some(vec![Value::Float(1.0), Value::Float(2.0)])
        );
        assert_eq!(Value::Integer(1).elements(), None);
    }

    proptest! {
        #[test]
        fn prop_mixed_numeric_ordering_matches_f64(a in -1_000_000i64..1_000_000, b in -1.0e6f64..1.0e6) {
            let expected = (a as f64).partial_cmp(&b);
            prop_assert_eq!(Value::Integer(a).sql_cmp(&Value::Float(b)), expected);
        }
    }
}
