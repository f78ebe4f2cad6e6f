//! Abstract syntax tree for pattern queries

use kgsql_core::Direction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed `MATCH ... RETURN ...` query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// The path pattern after MATCH
    pub chain: PatternChain,

    /// WHERE predicate
    pub where_clause: Option<Expression>,

    /// RETURN DISTINCT
    pub distinct: bool,

    /// RETURN items in order
    pub projection: Vec<ReturnItem>,

    /// ORDER BY items in order
    pub order_by: Vec<OrderItem>,

    /// SKIP count
    pub skip: Option<Count>,

    /// LIMIT count
    pub limit: Option<Count>,
}

/// An identifier together with where it was written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    pub value: String,
    pub offset: usize,
}

impl Name {
    pub fn new(value: impl Into<String>, offset: usize) -> Self {
        Self {
            value: value.into(),
            offset,
        }
    }
}

/// A node followed by any number of relationship/node hops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternChain {
    pub head: NodePattern,
    pub hops: Vec<Hop>,
}

/// One relationship and the node it leads to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hop {
    pub relationship: RelationshipPattern,
    pub node: NodePattern,
}

/// `(var:Label {key: value})`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePattern {
    pub variable: Option<Name>,
    pub labels: Vec<Name>,
    pub properties: Vec<MapEntry>,
    pub offset: usize,
}

/// `-[var:TYPE|OTHER*min..max {key: value}]->`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipPattern {
    pub variable: Option<Name>,
    pub rel_types: Vec<Name>,
    pub direction: Direction,
    pub properties: Vec<MapEntry>,
    pub length: Option<HopBounds>,
    pub offset: usize,
}

/// Variable-length bounds; a missing bound is open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopBounds {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

/// Entry of an inline property map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapEntry {
    pub key: Name,
    pub value: Expression,
}

/// Item in RETURN clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnItem {
    pub expression: Expression,
    pub alias: Option<Name>,
}

/// Item in ORDER BY clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub expression: Expression,
    pub ascending: bool,
}

/// SKIP / LIMIT argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Count {
    Literal(u64),
    Parameter { name: String, offset: usize },
}

/// Expression with its source offset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub kind: ExprKind,
    pub offset: usize,
}

impl Expression {
    pub fn new(kind: ExprKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}

/// Expression variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// Literal value
    Literal(Literal),
    /// Variable reference
    Variable(String),
    /// Property access (variable.key)
    Property { variable: String, key: String },
    /// Parameter ($name)
    Parameter(String),
    /// List literal [a, b, c]
    List(Vec<Expression>),
    /// Function call
    Function { name: String, args: Vec<Expression> },
    /// Binary operation
    Binary {
        left: Box<Expression>,
        op: BinaryOp,
        right: Box<Expression>,
    },
    /// Unary operation
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
}

/// Literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // Comparison
    Equals,
    NotEquals,
    LessThan,
    LessEquals,
    GreaterThan,
    GreaterEquals,
    // Logical
    And,
    Or,
    Xor,
    // String
    Contains,
    StartsWith,
    EndsWith,
    // Other
    In,
}

impl BinaryOp {
    /// Source spelling of the operator
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Equals => "=",
            BinaryOp::NotEquals => "<>",
            BinaryOp::LessThan => "<",
            BinaryOp::LessEquals => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterEquals => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Xor => "XOR",
            BinaryOp::Contains => "CONTAINS",
            BinaryOp::StartsWith => "STARTS WITH",
            BinaryOp::EndsWith => "ENDS WITH",
            BinaryOp::In => "IN",
        }
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Xor)
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    IsNull,
    IsNotNull,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Boolean(b) => write!(f, "{b}"),
            Literal::Integer(i) => write!(f, "{i}"),
            Literal::Float(x) => write!(f, "{x:?}"),
            Literal::String(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        }
    }
}

/// Renders the canonical query text of an expression, used as the source
/// expression of result columns
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(lit) => write!(f, "{lit}"),
            ExprKind::Variable(name) => f.write_str(name),
            ExprKind::Property { variable, key } => write!(f, "{variable}.{key}"),
            ExprKind::Parameter(name) => write!(f, "${name}"),
            ExprKind::List(items) => {
                f.write_str("[")?;
                write_list(f, items)?;
                f.write_str("]")
            }
            ExprKind::Function { name, args } => {
                write!(f, "{name}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
            ExprKind::Binary { left, op, right } => {
                write_operand(f, left)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, right)
            }
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Not => {
                    f.write_str("NOT ")?;
                    write_operand(f, operand)
                }
                UnaryOp::IsNull => {
                    write_operand(f, operand)?;
                    f.write_str(" IS NULL")
                }
                UnaryOp::IsNotNull => {
                    write_operand(f, operand)?;
                    f.write_str(" IS NOT NULL")
                }
            },
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expression]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_operand(f: &mut fmt::Formatter<'_>, operand: &Expression) -> fmt::Result {
    match operand.kind {
        ExprKind::Binary { .. } | ExprKind::Unary { .. } => write!(f, "({operand})"),
        _ => write!(f, "{operand}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Box<Expression> {
        Box::new(Expression::new(ExprKind::Variable(name.to_string()), 0))
    }

    #[test]
    fn test_node_pattern_structure() {
        let node = NodePattern {
            variable: Some(Name::new("n", 1)),
            labels: vec![Name::new("Protein", 3)],
            properties: vec![],
            offset: 0,
        };

        assert_eq!(node.variable.as_ref().map(|v| v.value.as_str()), Some("n"));
        assert_eq!(node.labels[0].value, "Protein");
    }

    #[test]
    fn test_expression_display() {
        let prop = Expression::new(
            ExprKind::Property {
                variable: "q".to_string(),
                key: "name".to_string(),
            },
            0,
        );
        assert_eq!(prop.to_string(), "q.name");

        let cmp = Expression::new(
            ExprKind::Binary {
                left: Box::new(prop),
                op: BinaryOp::Equals,
                right: Box::new(Expression::new(
                    ExprKind::Literal(Literal::String("it's".to_string())),
                    0,
                )),
            },
            0,
        );
        assert_eq!(cmp.to_string(), r"q.name = 'it\'s'");

        let not = Expression::new(
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand: Box::new(cmp),
            },
            0,
        );
        assert_eq!(not.to_string(), r"NOT (q.name = 'it\'s')");
    }

    #[test]
    fn test_function_display() {
        let call = Expression::new(
            ExprKind::Function {
                name: "similarity".to_string(),
                args: vec![
                    *var("a"),
                    Expression::new(ExprKind::Parameter("qvec".to_string()), 0),
                ],
            },
            0,
        );
        assert_eq!(call.to_string(), "similarity(a, $qvec)");
    }
}
