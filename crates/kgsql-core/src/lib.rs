//! kgsql Core Library
//!
//! This crate provides the fundamental types, the schema catalog and error
//! handling shared by every stage of the kgsql translator.
//!
//! # Modules
//!
//! - `types` - Source spans, directions and clause names
//! - `value` - Parameter and literal values
//! - `catalog` - Read-only description of the property-graph schema
//! - `error` - Error types and result aliases

pub mod catalog;
pub mod error;
pub mod types;
pub mod value;

pub use catalog::{
    LabelSchema, RelationshipSchema, SchemaCatalog, SimilarityFunction, StorageLayout,
    VectorMetric,
};
pub use error::{BindError, Error, LexError, ParseError, PlanError, Result, SchemaElementKind};
pub use types::{Direction, QueryClause, Span};
pub use value::{Value, ValueKind};
