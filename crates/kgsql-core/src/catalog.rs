//! Schema catalog for the translator
//!
//! Describes which labels, relationship types and properties exist, how the
//! property graph is laid out in relational tables, and which function ranks
//! by vector similarity. A catalog is read-only for the duration of a
//! translation and may be shared between threads.

use crate::error::{Error, Result};
use crate::value::ValueKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default ceiling for variable-length traversals
pub const DEFAULT_MAX_HOP_CEILING: u32 = 5;

/// Default row estimate for a node scan without a cardinality hint
pub const DEFAULT_NODE_ESTIMATE: u64 = 1000;

/// Declared properties of a node label
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelSchema {
    /// Property kinds by name
    #[serde(default)]
    pub properties: BTreeMap<String, ValueKind>,

    /// Approximate number of nodes carrying the label
    #[serde(default)]
    pub estimated_count: Option<u64>,
}

impl LabelSchema {
    /// Create a label without declared properties
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: declare a property
    pub fn property(mut self, name: &str, kind: ValueKind) -> Self {
        self.properties.insert(name.to_string(), kind);
        self
    }

    /// Builder: set the cardinality estimate
    pub fn estimated_count(mut self, count: u64) -> Self {
        self.estimated_count = Some(count);
        self
    }
}

/// Declared properties of a relationship type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipSchema {
    /// Property kinds by name
    #[serde(default)]
    pub properties: BTreeMap<String, ValueKind>,
}

impl RelationshipSchema {
    /// Create a relationship type without declared properties
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: declare a property
    pub fn property(mut self, name: &str, kind: ValueKind) -> Self {
        self.properties.insert(name.to_string(), kind);
        self
    }
}

/// Distance metric backing the similarity function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorMetric {
    /// Cosine distance (`<=>`), similarity is `1 - distance`
    Cosine,
    /// Euclidean distance (`<->`), similarity is `-distance`
    Euclidean,
    /// Negative inner product (`<#>`), similarity is `-distance`
    InnerProduct,
}

impl VectorMetric {
    /// SQL distance operator; smaller means more similar
    pub fn distance_operator(self) -> &'static str {
        match self {
            VectorMetric::Cosine => "<=>",
            VectorMetric::Euclidean => "<->",
            VectorMetric::InnerProduct => "<#>",
        }
    }

    /// Wrap a rendered distance expression into a similarity score
    pub fn similarity_from_distance(self, distance: &str) -> String {
        match self {
            VectorMetric::Cosine => format!("(1 - ({distance}))"),
            VectorMetric::Euclidean | VectorMetric::InnerProduct => format!("(-({distance}))"),
        }
    }
}

/// The reserved vector-similarity function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityFunction {
    /// Function name as written in queries (matched case-insensitively)
    pub name: String,

    /// Number of arguments
    pub arity: usize,

    /// Metric used by the storage engine's vector operator
    pub metric: VectorMetric,
}

impl Default for SimilarityFunction {
    fn default() -> Self {
        Self {
            name: "similarity".to_string(),
            arity: 2,
            metric: VectorMetric::Cosine,
        }
    }
}

/// Relational tables and columns holding the property graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageLayout {
    pub node_table: String,
    pub node_id: String,
    pub label_table: String,
    pub label_node_id: String,
    pub label_name: String,
    pub edge_table: String,
    pub edge_id: String,
    pub edge_source: String,
    pub edge_target: String,
    pub edge_type: String,
    pub node_property_table: String,
    pub edge_property_table: String,
    pub property_owner: String,
    pub property_key: String,
    pub text_column: String,
    pub number_column: String,
    pub boolean_column: String,
    pub vector_column: String,
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self {
            node_table: "kg_node".to_string(),
            node_id: "id".to_string(),
            label_table: "kg_node_label".to_string(),
            label_node_id: "node_id".to_string(),
            label_name: "label".to_string(),
            edge_table: "kg_edge".to_string(),
            edge_id: "id".to_string(),
            edge_source: "source_id".to_string(),
            edge_target: "target_id".to_string(),
            edge_type: "rel_type".to_string(),
            node_property_table: "kg_node_property".to_string(),
            edge_property_table: "kg_edge_property".to_string(),
            property_owner: "owner_id".to_string(),
            property_key: "key".to_string(),
            text_column: "value_text".to_string(),
            number_column: "value_number".to_string(),
            boolean_column: "value_bool".to_string(),
            vector_column: "value_vector".to_string(),
        }
    }
}

impl StorageLayout {
    /// Property-table column holding values of the given kind
    pub fn value_column(&self, kind: ValueKind) -> &str {
        match kind {
            ValueKind::String => &self.text_column,
            ValueKind::Number => &self.number_column,
            ValueKind::Boolean => &self.boolean_column,
            ValueKind::Vector => &self.vector_column,
        }
    }

    fn names(&self) -> [(&'static str, &str); 18] {
        [
            ("node_table", &self.node_table),
            ("node_id", &self.node_id),
            ("label_table", &self.label_table),
            ("label_node_id", &self.label_node_id),
            ("label_name", &self.label_name),
            ("edge_table", &self.edge_table),
            ("edge_id", &self.edge_id),
            ("edge_source", &self.edge_source),
            ("edge_target", &self.edge_target),
            ("edge_type", &self.edge_type),
            ("node_property_table", &self.node_property_table),
            ("edge_property_table", &self.edge_property_table),
            ("property_owner", &self.property_owner),
            ("property_key", &self.property_key),
            ("text_column", &self.text_column),
            ("number_column", &self.number_column),
            ("boolean_column", &self.boolean_column),
            ("vector_column", &self.vector_column),
        ]
    }
}

/// Schema catalog for a property graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaCatalog {
    /// Node labels by name
    #[serde(default)]
    pub labels: BTreeMap<String, LabelSchema>,

    /// Relationship types by name
    #[serde(default)]
    pub relationship_types: BTreeMap<String, RelationshipSchema>,

    /// The reserved similarity function
    #[serde(default)]
    pub similarity: SimilarityFunction,

    /// Deepest variable-length traversal the planner will unroll
    #[serde(default = "default_max_hop_ceiling")]
    pub max_hop_ceiling: u32,

    /// Row estimate for nodes without a label cardinality hint
    #[serde(default = "default_node_estimate")]
    pub default_node_estimate: u64,

    /// Table layout of the relational store
    #[serde(default)]
    pub layout: StorageLayout,
}

fn default_max_hop_ceiling() -> u32 {
    DEFAULT_MAX_HOP_CEILING
}

fn default_node_estimate() -> u64 {
    DEFAULT_NODE_ESTIMATE
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HOP_CEILING)
    }
}

impl SchemaCatalog {
    /// Create an empty catalog with the given hop ceiling
    pub fn new(max_hop_ceiling: u32) -> Self {
        Self {
            labels: BTreeMap::new(),
            relationship_types: BTreeMap::new(),
            similarity: SimilarityFunction::default(),
            max_hop_ceiling,
            default_node_estimate: DEFAULT_NODE_ESTIMATE,
            layout: StorageLayout::default(),
        }
    }

    /// Parse a catalog from JSON and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let catalog: SchemaCatalog = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Builder: add a label
    pub fn with_label(mut self, name: &str, schema: LabelSchema) -> Self {
        self.labels.insert(name.to_string(), schema);
        self
    }

    /// Builder: add a relationship type
    pub fn with_relationship_type(mut self, name: &str, schema: RelationshipSchema) -> Self {
        self.relationship_types.insert(name.to_string(), schema);
        self
    }

    /// Builder: replace the similarity function
    pub fn with_similarity(mut self, similarity: SimilarityFunction) -> Self {
        self.similarity = similarity;
        self
    }

    /// Builder: replace the storage layout
    pub fn with_layout(mut self, layout: StorageLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Check that the layout only names plain SQL identifiers and that the
    /// similarity function is usable
    pub fn validate(&self) -> Result<()> {
        for (field, name) in self.layout.names() {
            if !is_plain_identifier(name) {
                return Err(Error::Catalog(format!(
                    "layout.{field} '{name}' is not a plain SQL identifier"
                )));
            }
        }
        if self.similarity.arity != 2 {
            return Err(Error::Catalog(format!(
                "similarity function '{}' must take 2 arguments, declared {}",
                self.similarity.name, self.similarity.arity
            )));
        }
        if self.similarity.name.is_empty() {
            return Err(Error::Catalog(
                "similarity function name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Check if a label exists
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.contains_key(name)
    }

    /// Check if a relationship type exists
    pub fn has_relationship_type(&self, name: &str) -> bool {
        self.relationship_types.contains_key(name)
    }

    /// Kind of a node property given the labels a variable carries.
    ///
    /// An unlabeled variable may reach any label. Returns `None` when no
    /// reachable label declares the property, or when the declarations
    /// disagree on its kind.
    pub fn node_property_kind(&self, labels: &[String], key: &str) -> Option<ValueKind> {
        unanimous(&self.node_property_declarations(labels, key))
    }

    /// Check whether any label reachable from `labels` declares `key`
    pub fn declares_node_property(&self, labels: &[String], key: &str) -> bool {
        !self.node_property_declarations(labels, key).is_empty()
    }

    /// Kind of a relationship property given the types a variable may have
    pub fn relationship_property_kind(&self, types: &[String], key: &str) -> Option<ValueKind> {
        unanimous(&self.relationship_property_declarations(types, key))
    }

    /// Check whether any type reachable from `types` declares `key`
    pub fn declares_relationship_property(&self, types: &[String], key: &str) -> bool {
        !self.relationship_property_declarations(types, key).is_empty()
    }

    fn node_property_declarations(&self, labels: &[String], key: &str) -> Vec<ValueKind> {
        if labels.is_empty() {
            self.labels
                .values()
                .filter_map(|l| l.properties.get(key).copied())
                .collect()
        } else {
            labels
                .iter()
                .filter_map(|l| self.labels.get(l))
                .filter_map(|l| l.properties.get(key).copied())
                .collect()
        }
    }

    fn relationship_property_declarations(&self, types: &[String], key: &str) -> Vec<ValueKind> {
        if types.is_empty() {
            self.relationship_types
                .values()
                .filter_map(|t| t.properties.get(key).copied())
                .collect()
        } else {
            types
                .iter()
                .filter_map(|t| self.relationship_types.get(t))
                .filter_map(|t| t.properties.get(key).copied())
                .collect()
        }
    }

    /// Row estimate for a scan of nodes carrying all of `labels`
    pub fn label_estimate(&self, labels: &[String]) -> u64 {
        labels
            .iter()
            .map(|l| {
                self.labels
                    .get(l)
                    .and_then(|s| s.estimated_count)
                    .unwrap_or(self.default_node_estimate)
            })
            .min()
            .unwrap_or(self.default_node_estimate)
    }

    /// Check whether a function name refers to the similarity function
    pub fn is_similarity_function(&self, name: &str) -> bool {
        self.similarity.name.eq_ignore_ascii_case(name)
    }
}

fn unanimous(kinds: &[ValueKind]) -> Option<ValueKind> {
    let first = *kinds.first()?;
    kinds.iter().all(|k| *k == first).then_some(first)
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}
