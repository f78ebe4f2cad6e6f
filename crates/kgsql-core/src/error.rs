//! Error types for kgsql
//!
//! One enum per translation stage, unified under [`Error`]. Every variant
//! carries the facts a caller needs to build a diagnostic: the offending
//! identifier, its source position and the violated constraint.

use crate::types::{QueryClause, Span};
use std::fmt;
use thiserror::Error;

/// Errors raised while turning query text into tokens
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("illegal character {ch:?} at {span}")]
    IllegalCharacter { ch: char, span: Span },

    #[error("unterminated string literal starting at {span}")]
    UnterminatedString { span: Span },

    #[error("unterminated escaped identifier starting at {span}")]
    UnterminatedIdentifier { span: Span },

    #[error("invalid numeric literal '{text}' at {span}")]
    InvalidNumber { text: String, span: Span },
}

impl LexError {
    /// Position of the offending input
    pub fn span(&self) -> Span {
        match self {
            LexError::IllegalCharacter { span, .. }
            | LexError::UnterminatedString { span }
            | LexError::UnterminatedIdentifier { span }
            | LexError::InvalidNumber { span, .. } => *span,
        }
    }
}

/// First syntax error found by the parser
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("syntax error at {span}: expected {expected}, found {found}")]
pub struct ParseError {
    /// Where the unexpected token (or end of input) sits
    pub span: Span,

    /// Human-readable description of what the grammar allowed here
    pub expected: String,

    /// The token actually found
    pub found: String,
}

impl ParseError {
    /// Create a parse error
    pub fn new(span: Span, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            span,
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Byte offset of the error
    pub fn offset(&self) -> usize {
        self.span.offset
    }
}

/// Kind of schema element a name was resolved against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaElementKind {
    Label,
    RelationshipType,
}

impl fmt::Display for SchemaElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaElementKind::Label => f.write_str("label"),
            SchemaElementKind::RelationshipType => f.write_str("relationship type"),
        }
    }
}

/// Semantic errors found while binding a query against the catalog
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("unknown {kind} '{name}' at offset {offset}")]
    UnknownSchemaElement {
        kind: SchemaElementKind,
        name: String,
        offset: usize,
    },

    #[error("parameter ${name} at offset {offset} was not supplied")]
    UndeclaredParameter { name: String, offset: usize },

    #[error("variable-length relationship at offset {offset} has no upper bound")]
    UnboundedTraversal { offset: usize },

    #[error("hop range {min}..{max} at offset {offset} has min greater than max")]
    InvalidHopRange { min: u32, max: u32, offset: usize },

    #[error("type mismatch at offset {offset}: cannot apply {operator} to {left} and {right}")]
    TypeMismatch {
        operator: String,
        left: String,
        right: String,
        offset: usize,
    },

    #[error("variable '{name}' referenced in {clause} at offset {offset} is not bound by the pattern")]
    UnboundVariableReference {
        name: String,
        clause: QueryClause,
        offset: usize,
    },

    #[error("variable '{name}' at offset {offset} is used as both a node and a relationship")]
    VariableKindConflict { name: String, offset: usize },

    #[error("unknown function '{name}' at offset {offset}")]
    UnknownFunction { name: String, offset: usize },

    #[error("function '{name}' at offset {offset} expects {expected} arguments, got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        offset: usize,
    },

    #[error("duplicate output alias '{alias}' at offset {offset}")]
    DuplicateAlias { alias: String, offset: usize },

    #[error("unsupported construct at offset {offset}: {reason}")]
    UnsupportedConstruct { reason: String, offset: usize },
}

impl BindError {
    /// Byte offset of the offending construct
    pub fn offset(&self) -> usize {
        match self {
            BindError::UnknownSchemaElement { offset, .. }
            | BindError::UndeclaredParameter { offset, .. }
            | BindError::UnboundedTraversal { offset }
            | BindError::InvalidHopRange { offset, .. }
            | BindError::TypeMismatch { offset, .. }
            | BindError::UnboundVariableReference { offset, .. }
            | BindError::VariableKindConflict { offset, .. }
            | BindError::UnknownFunction { offset, .. }
            | BindError::ArityMismatch { offset, .. }
            | BindError::DuplicateAlias { offset, .. }
            | BindError::UnsupportedConstruct { offset, .. } => *offset,
        }
    }

    /// Builds an [`BindError::UnsupportedConstruct`]
    pub fn unsupported(reason: impl Into<String>, offset: usize) -> Self {
        BindError::UnsupportedConstruct {
            reason: reason.into(),
            offset,
        }
    }
}

/// Errors raised while building the logical plan
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("variable-length relationship at offset {offset} allows {max} hops, above the ceiling of {ceiling}")]
    HopCeilingExceeded { max: u32, ceiling: u32, offset: usize },

    #[error("relationship variable '{name}' is used with conflicting directions at offset {offset}")]
    ConflictingDirectionConstraints { name: String, offset: usize },

    #[error("variable-length expansion needs {branches} union branches, above the limit of {limit}")]
    BranchLimitExceeded { branches: usize, limit: usize },
}

/// The main error type for kgsql operations
#[derive(Error, Debug)]
pub enum Error {
    // ========== Translation Errors ==========
    #[error("Lex error: {0}")]
    Lex(#[from] LexError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Bind error: {0}")]
    Bind(#[from] BindError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    // ========== Input Errors ==========
    #[error("Invalid catalog: {0}")]
    Catalog(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ========== IO Errors ==========
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for kgsql operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns a machine-readable code for the error variant
    pub fn code(&self) -> &'static str {
        match self {
            Error::Lex(LexError::IllegalCharacter { .. }) => "IllegalCharacter",
            Error::Lex(LexError::UnterminatedString { .. }) => "UnterminatedString",
            Error::Lex(LexError::UnterminatedIdentifier { .. }) => "UnterminatedIdentifier",
            Error::Lex(LexError::InvalidNumber { .. }) => "InvalidNumber",
            Error::Parse(_) => "SyntaxError",
            Error::Bind(err) => match err {
                BindError::UnknownSchemaElement { .. } => "UnknownSchemaElement",
                BindError::UndeclaredParameter { .. } => "UndeclaredParameter",
                BindError::UnboundedTraversal { .. } => "UnboundedTraversal",
                BindError::InvalidHopRange { .. } => "InvalidHopRange",
                BindError::TypeMismatch { .. } => "TypeMismatch",
                BindError::UnboundVariableReference { .. } => "UnboundVariableReference",
                BindError::VariableKindConflict { .. } => "VariableKindConflict",
                BindError::UnknownFunction { .. } => "UnknownFunction",
                BindError::ArityMismatch { .. } => "ArityMismatch",
                BindError::DuplicateAlias { .. } => "DuplicateAlias",
                BindError::UnsupportedConstruct { .. } => "UnsupportedConstruct",
            },
            Error::Plan(err) => match err {
                PlanError::HopCeilingExceeded { .. } => "HopCeilingExceeded",
                PlanError::ConflictingDirectionConstraints { .. } => {
                    "ConflictingDirectionConstraints"
                }
                PlanError::BranchLimitExceeded { .. } => "BranchLimitExceeded",
            },
            Error::Catalog(_) => "InvalidCatalog",
            Error::Configuration(_) => "Configuration",
            Error::Serialization(_) => "Serialization",
            Error::Io(_) => "Io",
        }
    }

    /// Byte offset into the query text, when the error is tied to one
    pub fn offset(&self) -> Option<usize> {
        match self {
            Error::Lex(err) => Some(err.span().offset),
            Error::Parse(err) => Some(err.offset()),
            Error::Bind(err) => Some(err.offset()),
            Error::Plan(PlanError::HopCeilingExceeded { offset, .. })
            | Error::Plan(PlanError::ConflictingDirectionConstraints { offset, .. }) => {
                Some(*offset)
            }
            _ => None,
        }
    }

    /// Returns true if the error was caused by the query text rather than the
    /// catalog, configuration or environment
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            Error::Lex(_) | Error::Parse(_) | Error::Bind(_) | Error::Plan(_)
        )
    }
}
