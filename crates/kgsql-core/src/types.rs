//! Shared vocabulary types for kgsql
//!
//! Source positions, traversal directions and query clause names used across
//! the lexer, parser, binder and planner.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in the query source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of the first character
    pub offset: usize,

    /// Length in bytes
    pub len: usize,

    /// 1-based line number
    pub line: u32,

    /// 1-based column number (in characters)
    pub column: u32,
}

impl Span {
    /// Create a span
    pub fn new(offset: usize, len: usize, line: u32, column: u32) -> Self {
        Self {
            offset,
            len,
            line,
            column,
        }
    }

    /// Byte offset one past the end of the span
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}, column {} (offset {})",
            self.line, self.column, self.offset
        )
    }
}

/// Direction of a relationship pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Outgoing relationship (->)
    Outgoing,
    /// Incoming relationship (<-)
    Incoming,
    /// Either direction (--)
    Either,
}

impl Direction {
    /// Returns the opposite direction
    pub fn reverse(self) -> Self {
        match self {
            Direction::Outgoing => Direction::Incoming,
            Direction::Incoming => Direction::Outgoing,
            Direction::Either => Direction::Either,
        }
    }

    /// Arrow notation used in plan rendering
    pub fn arrow(self) -> &'static str {
        match self {
            Direction::Outgoing => "->",
            Direction::Incoming => "<-",
            Direction::Either => "--",
        }
    }
}

/// The clause of a query an expression appears in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryClause {
    Match,
    Where,
    Return,
    OrderBy,
    Skip,
    Limit,
}

impl fmt::Display for QueryClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryClause::Match => "MATCH",
            QueryClause::Where => "WHERE",
            QueryClause::Return => "RETURN",
            QueryClause::OrderBy => "ORDER BY",
            QueryClause::Skip => "SKIP",
            QueryClause::Limit => "LIMIT",
        };
        f.write_str(name)
    }
}
