//! kgsql query engine
//!
//! Compiles graph pattern queries into parameterized SQL.
//!
//! # Overview
//!
//! The translation pipeline runs in five stages, each consuming only the
//! previous stage's output and the read-only [`SchemaCatalog`]:
//! - Lexer: query text to tokens
//! - Parser: tokens to an AST
//! - Binder: names resolved against the catalog and parameters
//! - Planner: pushdown, join ordering, hop unrolling and vector ranking
//! - Emitter: PostgreSQL text with bind parameters
//!
//! [`SchemaCatalog`]: kgsql_core::SchemaCatalog

pub mod ast;
pub mod binder;
pub mod config;
pub mod emitter;
pub mod lexer;
pub mod parser;
pub mod planner;
pub mod translate;

pub use binder::{BindWarning, BoundQuery, Parameters, bind};
pub use config::{PlaceholderStyle, TranslatorConfig};
pub use emitter::{CompiledQuery, DeferredParam, ResultColumn, emit};
pub use lexer::{Token, TokenKind, tokenize};
pub use parser::{parse, parse_query};
pub use planner::{LogicalPlan, PlanNode, PlanOutcome, QueryPlanner, plan};
pub use translate::{Translator, translate};
