//! Semantic binding
//!
//! Resolves the names of a parsed [`Query`] against a [`SchemaCatalog`] and
//! the caller's [`Parameters`]. Pattern elements are numbered by chain
//! position (nodes at even indices, relationships at odd ones) and every
//! expression is rewritten to refer to elements by index. Static kinds are
//! attached where they can be inferred so that provably incompatible
//! comparisons are rejected here rather than at execution time.

use crate::ast::{BinaryOp, Count, ExprKind, Expression, Literal, MapEntry, Query, UnaryOp};
use kgsql_core::{
    BindError, Direction, QueryClause, SchemaCatalog, SchemaElementKind, Value, ValueKind,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::RangeInclusive;

type BindResult<T> = std::result::Result<T, BindError>;

/// Named parameter values supplied with a query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Values known at translation time
    #[serde(default)]
    pub values: BTreeMap<String, Value>,

    /// Names whose values are bound by the executor; their slots are
    /// emitted as null and reported in [`crate::CompiledQuery::deferred`]
    #[serde(default)]
    pub deferred: BTreeSet<String>,
}

impl Parameters {
    /// Create an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: supply a value
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    /// Builder: defer a parameter to execution time
    pub fn defer(mut self, name: &str) -> Self {
        self.deferred.insert(name.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn is_deferred(&self, name: &str) -> bool {
        !self.values.contains_key(name) && self.deferred.contains(name)
    }
}

impl From<BTreeMap<String, Value>> for Parameters {
    fn from(values: BTreeMap<String, Value>) -> Self {
        Self {
            values,
            deferred: BTreeSet::new(),
        }
    }
}

/// Non-fatal findings reported alongside a successful translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BindWarning {
    /// A property no reachable label or type declares; reads yield null
    /// when the property is absent
    UndeclaredProperty {
        variable: String,
        key: String,
        offset: usize,
    },
}

impl fmt::Display for BindWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindWarning::UndeclaredProperty {
                variable,
                key,
                offset,
            } => write!(
                f,
                "property '{key}' of '{variable}' at offset {offset} is not declared in the catalog and may be null"
            ),
        }
    }
}

/// Inclusive hop range of a variable-length relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopRange {
    pub min: u32,
    pub max: u32,
}

impl HopRange {
    pub fn depths(&self) -> RangeInclusive<u32> {
        self.min..=self.max
    }

    /// Number of unrolled depths
    pub fn width(&self) -> usize {
        (self.max - self.min) as usize + 1
    }
}

/// Bound node pattern
#[derive(Debug, Clone, PartialEq)]
pub struct NodeElement {
    pub variable: Option<String>,
    pub labels: Vec<String>,
    /// Index of the first element bound to the same variable
    pub repeat_of: Option<usize>,
    pub offset: usize,
}

/// Bound relationship pattern
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipElement {
    pub variable: Option<String>,
    pub rel_types: Vec<String>,
    /// Direction as written, left to right along the chain
    pub direction: Direction,
    /// `None` for a single hop
    pub hops: Option<HopRange>,
    pub repeat_of: Option<usize>,
    pub offset: usize,
}

/// A pattern element at its chain position
#[derive(Debug, Clone, PartialEq)]
pub enum BoundElement {
    Node(NodeElement),
    Relationship(RelationshipElement),
}

impl BoundElement {
    pub fn variable(&self) -> Option<&str> {
        match self {
            BoundElement::Node(n) => n.variable.as_deref(),
            BoundElement::Relationship(r) => r.variable.as_deref(),
        }
    }

    pub fn repeat_of(&self) -> Option<usize> {
        match self {
            BoundElement::Node(n) => n.repeat_of,
            BoundElement::Relationship(r) => r.repeat_of,
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            BoundElement::Node(n) => n.offset,
            BoundElement::Relationship(r) => r.offset,
        }
    }

    pub fn as_node(&self) -> Option<&NodeElement> {
        match self {
            BoundElement::Node(n) => Some(n),
            BoundElement::Relationship(_) => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&RelationshipElement> {
        match self {
            BoundElement::Node(_) => None,
            BoundElement::Relationship(r) => Some(r),
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, BoundElement::Node(_))
    }
}

/// A resolved `variable.key` access
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRef {
    /// Index of the element the variable was first bound to
    pub element: usize,
    pub variable: String,
    pub key: String,
    /// Declared kind, or the kind inferred from the surrounding expression
    pub kind: ValueKind,
    /// Whether `kind` comes from the catalog
    pub declared: bool,
}

/// Expression with names resolved to pattern elements
#[derive(Debug, Clone, PartialEq)]
pub enum BoundExpr {
    Literal(Value),
    Parameter {
        name: String,
        kind: Option<ValueKind>,
    },
    Property(PropertyRef),
    /// Identity of a pattern element: a bare variable or `id(var)`
    Element {
        element: usize,
        variable: String,
    },
    List(Vec<BoundExpr>),
    Binary {
        op: BinaryOp,
        left: Box<BoundExpr>,
        right: Box<BoundExpr>,
    },
    Not(Box<BoundExpr>),
    IsNull {
        operand: Box<BoundExpr>,
        negated: bool,
    },
    /// Call of the catalog's similarity function
    Similarity {
        left: Box<BoundExpr>,
        right: Box<BoundExpr>,
    },
    /// ORDER BY reference to a RETURN item
    ProjectionRef(usize),
}

impl BoundExpr {
    /// Statically known kind of the expression's value
    pub fn static_kind(&self) -> Option<ValueKind> {
        match self {
            BoundExpr::Literal(value) => value.kind(),
            BoundExpr::Parameter { kind, .. } => *kind,
            BoundExpr::Property(p) if p.declared => Some(p.kind),
            BoundExpr::Property(_) => None,
            BoundExpr::Element { .. } | BoundExpr::List(_) | BoundExpr::ProjectionRef(_) => None,
            BoundExpr::Binary { .. } | BoundExpr::Not(_) | BoundExpr::IsNull { .. } => {
                Some(ValueKind::Boolean)
            }
            BoundExpr::Similarity { .. } => Some(ValueKind::Number),
        }
    }

    /// True for a bare pattern variable or `id(var)`
    pub fn is_element(&self) -> bool {
        matches!(self, BoundExpr::Element { .. })
    }

    /// Pattern elements the expression reads
    pub fn elements(&self) -> BTreeSet<usize> {
        let mut out = BTreeSet::new();
        self.collect_elements(&mut out);
        out
    }

    fn collect_elements(&self, out: &mut BTreeSet<usize>) {
        match self {
            BoundExpr::Property(p) => {
                out.insert(p.element);
            }
            BoundExpr::Element { element, .. } => {
                out.insert(*element);
            }
            BoundExpr::List(items) => items.iter().for_each(|i| i.collect_elements(out)),
            BoundExpr::Binary { left, right, .. } | BoundExpr::Similarity { left, right } => {
                left.collect_elements(out);
                right.collect_elements(out);
            }
            BoundExpr::Not(operand) | BoundExpr::IsNull { operand, .. } => {
                operand.collect_elements(out)
            }
            BoundExpr::Literal(_) | BoundExpr::Parameter { .. } | BoundExpr::ProjectionRef(_) => {}
        }
    }

    /// True when the expression reads no pattern element
    pub fn is_variable_free(&self) -> bool {
        self.elements().is_empty()
    }
}

impl fmt::Display for BoundExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundExpr::Literal(value) => write!(f, "{value}"),
            BoundExpr::Parameter { name, .. } => write!(f, "${name}"),
            BoundExpr::Property(p) => write!(f, "{}.{}", p.variable, p.key),
            BoundExpr::Element { variable, .. } => f.write_str(variable),
            BoundExpr::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            BoundExpr::Binary { op, left, right } => {
                write_operand(f, left)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, right)
            }
            BoundExpr::Not(operand) => {
                f.write_str("NOT ")?;
                write_operand(f, operand)
            }
            BoundExpr::IsNull { operand, negated } => {
                write_operand(f, operand)?;
                f.write_str(if *negated { " IS NOT NULL" } else { " IS NULL" })
            }
            BoundExpr::Similarity { left, right } => write!(f, "similarity({left}, {right})"),
            BoundExpr::ProjectionRef(i) => write!(f, "#{i}"),
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, operand: &BoundExpr) -> fmt::Result {
    match operand {
        BoundExpr::Binary { .. } | BoundExpr::Not(_) | BoundExpr::IsNull { .. } => {
            write!(f, "({operand})")
        }
        _ => write!(f, "{operand}"),
    }
}

/// SKIP / LIMIT after binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitValue {
    Literal(u64),
    Parameter(String),
}

impl fmt::Display for LimitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitValue::Literal(n) => write!(f, "{n}"),
            LimitValue::Parameter(name) => write!(f, "${name}"),
        }
    }
}

/// Bound RETURN item
#[derive(Debug, Clone, PartialEq)]
pub struct BoundProjection {
    pub expr: BoundExpr,
    /// Output column name
    pub alias: String,
    /// Query text the column was computed from
    pub source: String,
}

/// Bound ORDER BY item
#[derive(Debug, Clone, PartialEq)]
pub struct BoundOrder {
    pub expr: BoundExpr,
    pub ascending: bool,
}

/// A query whose names are resolved against a catalog
#[derive(Debug, Clone)]
pub struct BoundQuery<'c> {
    pub catalog: &'c SchemaCatalog,

    /// Chain elements: nodes at even indices, relationships at odd ones
    pub elements: Vec<BoundElement>,

    /// Variable name to the index of its first element
    pub variables: BTreeMap<String, usize>,

    /// Equalities from inline property maps
    pub inline_filters: Vec<BoundExpr>,

    /// WHERE predicate
    pub predicate: Option<BoundExpr>,

    pub distinct: bool,
    pub projection: Vec<BoundProjection>,
    pub order_by: Vec<BoundOrder>,
    pub skip: Option<LimitValue>,
    pub limit: Option<LimitValue>,

    /// The supplied and deferred parameters the query references
    pub parameters: Parameters,

    pub warnings: Vec<BindWarning>,
}

impl BoundQuery<'_> {
    /// Node elements in chain order
    pub fn node_count(&self) -> usize {
        self.elements.len().div_ceil(2)
    }

    /// Labels reachable by the element, across every occurrence of its variable
    pub fn labels_of(&self, element: usize) -> Vec<String> {
        collect_constraints(&self.elements, element, |e| {
            e.as_node().map(|n| n.labels.as_slice()).unwrap_or_default()
        })
    }
}

fn collect_constraints<'e>(
    elements: &'e [BoundElement],
    element: usize,
    names: impl Fn(&'e BoundElement) -> &'e [String],
) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for (i, e) in elements.iter().enumerate() {
        if i == element || e.repeat_of() == Some(element) {
            for name in names(e) {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
        }
    }
    out
}

/// Binds parsed queries against a catalog and parameter set
pub struct Binder<'c, 'p> {
    catalog: &'c SchemaCatalog,
    parameters: &'p Parameters,
    defer_missing: bool,
}

impl<'c, 'p> Binder<'c, 'p> {
    pub fn new(catalog: &'c SchemaCatalog, parameters: &'p Parameters) -> Self {
        Self {
            catalog,
            parameters,
            defer_missing: false,
        }
    }

    /// Builder: treat parameters that were not supplied as deferred
    pub fn defer_missing(mut self, defer: bool) -> Self {
        self.defer_missing = defer;
        self
    }

    /// Bind a parsed query
    pub fn bind(&self, query: &Query) -> BindResult<BoundQuery<'c>> {
        let mut scope = Scope {
            binder: self,
            elements: Vec::new(),
            variables: BTreeMap::new(),
            referenced: Parameters::new(),
            warnings: Vec::new(),
        };

        // Elements first, so that any clause may refer to any variable
        let mut maps: Vec<(usize, &[MapEntry])> = Vec::new();
        maps.push((0, query.chain.head.properties.as_slice()));
        scope.bind_node(&query.chain.head)?;
        for hop in &query.chain.hops {
            let rel_index = scope.elements.len();
            scope.bind_relationship(&hop.relationship)?;
            maps.push((rel_index, hop.relationship.properties.as_slice()));
            maps.push((rel_index + 1, hop.node.properties.as_slice()));
            scope.bind_node(&hop.node)?;
        }

        let mut inline_filters = Vec::new();
        for (element, entries) in maps {
            for entry in entries {
                inline_filters.push(scope.bind_map_entry(element, entry)?);
            }
        }

        let predicate = match &query.where_clause {
            Some(expr) => {
                let mut bound = scope.bind_expr(expr, QueryClause::Where)?;
                refine(&mut bound, Some(ValueKind::Boolean));
                expect_boolean(&bound, "WHERE", expr.offset)?;
                Some(bound)
            }
            None => None,
        };

        let projection = scope.bind_projection(query)?;
        let order_by = scope.bind_order_by(query, &projection)?;

        let skip = match &query.skip {
            Some(count) => Some(scope.bind_count(count, QueryClause::Skip)?),
            None => None,
        };
        let limit = match &query.limit {
            Some(count) => Some(scope.bind_count(count, QueryClause::Limit)?),
            None => None,
        };

        tracing::debug!(
            elements = scope.elements.len(),
            parameters = scope.referenced.values.len(),
            deferred = scope.referenced.deferred.len(),
            warnings = scope.warnings.len(),
            "bound query"
        );

        Ok(BoundQuery {
            catalog: self.catalog,
            elements: scope.elements,
            variables: scope.variables,
            inline_filters,
            predicate,
            distinct: query.distinct,
            projection,
            order_by,
            skip,
            limit,
            parameters: scope.referenced,
            warnings: scope.warnings,
        })
    }
}

/// Bind a parsed query, rejecting parameters that were neither supplied
/// nor deferred
pub fn bind<'c>(
    query: &Query,
    catalog: &'c SchemaCatalog,
    parameters: &Parameters,
) -> BindResult<BoundQuery<'c>> {
    Binder::new(catalog, parameters).bind(query)
}

/// Mutable state of one binding pass
struct Scope<'b, 'c, 'p> {
    binder: &'b Binder<'c, 'p>,
    elements: Vec<BoundElement>,
    variables: BTreeMap<String, usize>,
    referenced: Parameters,
    warnings: Vec<BindWarning>,
}

impl Scope<'_, '_, '_> {
    fn catalog(&self) -> &SchemaCatalog {
        self.binder.catalog
    }

    // ========== Pattern ==========

    fn bind_node(&mut self, node: &crate::ast::NodePattern) -> BindResult<()> {
        for label in &node.labels {
            if !self.catalog().has_label(&label.value) {
                return Err(BindError::UnknownSchemaElement {
                    kind: SchemaElementKind::Label,
                    name: label.value.clone(),
                    offset: label.offset,
                });
            }
        }

        let index = self.elements.len();
        let repeat_of = match &node.variable {
            Some(var) => match self.variables.get(&var.value) {
                Some(&first) if self.elements[first].is_node() => Some(first),
                Some(_) => {
                    return Err(BindError::VariableKindConflict {
                        name: var.value.clone(),
                        offset: var.offset,
                    });
                }
                None => {
                    self.variables.insert(var.value.clone(), index);
                    None
                }
            },
            None => None,
        };

        self.elements.push(BoundElement::Node(NodeElement {
            variable: node.variable.as_ref().map(|v| v.value.clone()),
            labels: node.labels.iter().map(|l| l.value.clone()).collect(),
            repeat_of,
            offset: node.offset,
        }));
        Ok(())
    }

    fn bind_relationship(&mut self, rel: &crate::ast::RelationshipPattern) -> BindResult<()> {
        for rel_type in &rel.rel_types {
            if !self.catalog().has_relationship_type(&rel_type.value) {
                return Err(BindError::UnknownSchemaElement {
                    kind: SchemaElementKind::RelationshipType,
                    name: rel_type.value.clone(),
                    offset: rel_type.offset,
                });
            }
        }

        let hops = match rel.length {
            Some(bounds) => {
                let max = bounds
                    .max
                    .ok_or(BindError::UnboundedTraversal { offset: rel.offset })?;
                let min = bounds.min.unwrap_or(1);
                if min > max {
                    return Err(BindError::InvalidHopRange {
                        min,
                        max,
                        offset: rel.offset,
                    });
                }
                Some(HopRange { min, max })
            }
            None => None,
        };

        if hops.is_some() && !rel.properties.is_empty() {
            return Err(BindError::unsupported(
                "property map on a variable-length relationship",
                rel.offset,
            ));
        }

        let index = self.elements.len();
        let repeat_of = match &rel.variable {
            Some(var) => match self.variables.get(&var.value) {
                Some(&first) => match &self.elements[first] {
                    BoundElement::Node(_) => {
                        return Err(BindError::VariableKindConflict {
                            name: var.value.clone(),
                            offset: var.offset,
                        });
                    }
                    BoundElement::Relationship(earlier) => {
                        if earlier.hops.is_some() || hops.is_some() {
                            return Err(BindError::unsupported(
                                format!(
                                    "variable-length relationship variable '{}' cannot be repeated",
                                    var.value
                                ),
                                var.offset,
                            ));
                        }
                        Some(first)
                    }
                },
                None => {
                    self.variables.insert(var.value.clone(), index);
                    None
                }
            },
            None => None,
        };

        self.elements
            .push(BoundElement::Relationship(RelationshipElement {
                variable: rel.variable.as_ref().map(|v| v.value.clone()),
                rel_types: rel.rel_types.iter().map(|t| t.value.clone()).collect(),
                direction: rel.direction,
                hops,
                repeat_of,
                offset: rel.offset,
            }));
        Ok(())
    }

    /// `{key: value}` on an element becomes `element.key = value`
    fn bind_map_entry(&mut self, element: usize, entry: &MapEntry) -> BindResult<BoundExpr> {
        let canonical = self.elements[element].repeat_of().unwrap_or(element);
        let variable = self.elements[element]
            .variable()
            .map(str::to_string)
            .unwrap_or_else(|| format!("_{element}"));

        let mut value = self.bind_expr(&entry.value, QueryClause::Match)?;
        let mut property = BoundExpr::Property(self.resolve_property(
            canonical,
            &variable,
            &entry.key.value,
            entry.key.offset,
            QueryClause::Match,
        )?);

        refine(&mut property, value.static_kind());
        refine(&mut value, property.static_kind());
        check_comparison(BinaryOp::Equals, &property, &value, entry.key.offset)?;

        Ok(BoundExpr::Binary {
            op: BinaryOp::Equals,
            left: Box::new(property),
            right: Box::new(value),
        })
    }

    fn resolve_property(
        &mut self,
        element: usize,
        variable: &str,
        key: &str,
        offset: usize,
        clause: QueryClause,
    ) -> BindResult<PropertyRef> {
        let catalog = self.binder.catalog;
        let (constraints, kind, declared) = match &self.elements[element] {
            BoundElement::Node(_) => {
                let labels = collect_constraints(&self.elements, element, |e| {
                    e.as_node().map(|n| n.labels.as_slice()).unwrap_or_default()
                });
                let kind = catalog.node_property_kind(&labels, key);
                let declared = catalog.declares_node_property(&labels, key);
                (labels, kind, declared)
            }
            BoundElement::Relationship(rel) => {
                if rel.hops.is_some() {
                    return Err(BindError::unsupported(
                        format!("property access on variable-length relationship '{variable}'"),
                        offset,
                    ));
                }
                let types = collect_constraints(&self.elements, element, |e| {
                    e.as_relationship()
                        .map(|r| r.rel_types.as_slice())
                        .unwrap_or_default()
                });
                let kind = catalog.relationship_property_kind(&types, key);
                let declared = catalog.declares_relationship_property(&types, key);
                (types, kind, declared)
            }
        };

        if !declared {
            // Nothing constrains the variable and nothing in the catalog has
            // the key: the reference cannot be resolved at all
            if constraints.is_empty() {
                return Err(BindError::UnboundVariableReference {
                    name: format!("{variable}.{key}"),
                    clause,
                    offset,
                });
            }
            tracing::warn!(variable, key, offset, "property is not declared in the catalog");
            let warning = BindWarning::UndeclaredProperty {
                variable: variable.to_string(),
                key: key.to_string(),
                offset,
            };
            if !self.warnings.contains(&warning) {
                self.warnings.push(warning);
            }
        }

        Ok(PropertyRef {
            element,
            variable: variable.to_string(),
            key: key.to_string(),
            kind: kind.unwrap_or(ValueKind::String),
            declared: kind.is_some(),
        })
    }

    fn lookup(&self, name: &str, clause: QueryClause, offset: usize) -> BindResult<usize> {
        let element = *self
            .variables
            .get(name)
            .ok_or_else(|| BindError::UnboundVariableReference {
                name: name.to_string(),
                clause,
                offset,
            })?;
        Ok(element)
    }

    // ========== Expressions ==========

    fn bind_expr(&mut self, expr: &Expression, clause: QueryClause) -> BindResult<BoundExpr> {
        let offset = expr.offset;
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(BoundExpr::Literal(literal_value(lit))),

            ExprKind::Parameter(name) => self.bind_parameter(name, offset),

            ExprKind::Variable(name) => self.bind_element_ref(name, clause, offset),

            ExprKind::Property { variable, key } => {
                let element = self.lookup(variable, clause, offset)?;
                let property = self.resolve_property(element, variable, key, offset, clause)?;
                Ok(BoundExpr::Property(property))
            }

            ExprKind::List(items) => {
                let items = items
                    .iter()
                    .map(|item| self.bind_expr(item, clause))
                    .collect::<BindResult<Vec<_>>>()?;
                Ok(BoundExpr::List(items))
            }

            ExprKind::Function { name, args } => self.bind_function(name, args, clause, offset),

            ExprKind::Binary { left, op, right } => {
                if *op == BinaryOp::In {
                    return self.bind_membership(left, right, clause, offset);
                }

                let mut left = self.bind_expr(left, clause)?;
                let mut right = self.bind_expr(right, clause)?;

                if op.is_logical() {
                    refine(&mut left, Some(ValueKind::Boolean));
                    refine(&mut right, Some(ValueKind::Boolean));
                    for operand in [&left, &right] {
                        let boolean = match operand.static_kind() {
                            Some(kind) => kind == ValueKind::Boolean,
                            None => !operand.is_element(),
                        };
                        if !boolean {
                            return Err(mismatch(op.symbol(), &left, &right, offset));
                        }
                    }
                } else {
                    if matches!(
                        op,
                        BinaryOp::Contains | BinaryOp::StartsWith | BinaryOp::EndsWith
                    ) {
                        refine(&mut left, Some(ValueKind::String));
                        refine(&mut right, Some(ValueKind::String));
                    }
                    refine(&mut left, right.static_kind());
                    refine(&mut right, left.static_kind());
                    check_comparison(*op, &left, &right, offset)?;
                }

                Ok(BoundExpr::Binary {
                    op: *op,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }

            ExprKind::Unary { op, operand } => {
                let mut operand = self.bind_expr(operand, clause)?;
                match op {
                    UnaryOp::Not => {
                        refine(&mut operand, Some(ValueKind::Boolean));
                        expect_boolean(&operand, "NOT", offset)?;
                        Ok(BoundExpr::Not(Box::new(operand)))
                    }
                    UnaryOp::IsNull | UnaryOp::IsNotNull => Ok(BoundExpr::IsNull {
                        operand: Box::new(operand),
                        negated: *op == UnaryOp::IsNotNull,
                    }),
                }
            }
        }
    }

    fn bind_element_ref(
        &mut self,
        name: &str,
        clause: QueryClause,
        offset: usize,
    ) -> BindResult<BoundExpr> {
        let element = self.lookup(name, clause, offset)?;
        if let BoundElement::Relationship(rel) = &self.elements[element]
            && rel.hops.is_some()
        {
            return Err(BindError::unsupported(
                format!("variable-length relationship '{name}' cannot be referenced"),
                offset,
            ));
        }
        Ok(BoundExpr::Element {
            element,
            variable: name.to_string(),
        })
    }

    fn bind_parameter(&mut self, name: &str, offset: usize) -> BindResult<BoundExpr> {
        let parameters = self.binder.parameters;
        if let Some(value) = parameters.get(name) {
            self.referenced
                .values
                .insert(name.to_string(), value.clone());
            return Ok(BoundExpr::Parameter {
                name: name.to_string(),
                kind: value.kind(),
            });
        }

        if parameters.is_deferred(name) || self.binder.defer_missing {
            self.referenced.deferred.insert(name.to_string());
            return Ok(BoundExpr::Parameter {
                name: name.to_string(),
                kind: None,
            });
        }

        Err(BindError::UndeclaredParameter {
            name: name.to_string(),
            offset,
        })
    }

    fn bind_function(
        &mut self,
        name: &str,
        args: &[Expression],
        clause: QueryClause,
        offset: usize,
    ) -> BindResult<BoundExpr> {
        let catalog = self.binder.catalog;

        if catalog.is_similarity_function(name) {
            // The call always compares two vectors, whatever arity an
            // unvalidated catalog declares
            let [left, right] = args else {
                return Err(BindError::ArityMismatch {
                    name: name.to_string(),
                    expected: 2,
                    found: args.len(),
                    offset,
                });
            };

            let mut left = self.bind_vector_argument(left, clause)?;
            let mut right = self.bind_vector_argument(right, clause)?;
            refine(&mut left, Some(ValueKind::Vector));
            refine(&mut right, Some(ValueKind::Vector));
            for operand in [&left, &right] {
                let vector = match operand.static_kind() {
                    Some(kind) => kind == ValueKind::Vector,
                    None => !operand.is_element(),
                };
                if !vector {
                    return Err(mismatch(name, &left, &right, offset));
                }
            }
            return Ok(BoundExpr::Similarity {
                left: Box::new(left),
                right: Box::new(right),
            });
        }

        if name.eq_ignore_ascii_case("id") {
            if args.len() != 1 {
                return Err(BindError::ArityMismatch {
                    name: name.to_string(),
                    expected: 1,
                    found: args.len(),
                    offset,
                });
            }
            return match &args[0].kind {
                ExprKind::Variable(var) => self.bind_element_ref(var, clause, args[0].offset),
                _ => Err(BindError::unsupported(
                    "id() takes a pattern variable",
                    args[0].offset,
                )),
            };
        }

        Err(BindError::UnknownFunction {
            name: name.to_string(),
            offset,
        })
    }

    /// A list literal of numbers passed to the similarity function is a vector
    fn bind_vector_argument(&mut self, arg: &Expression, clause: QueryClause) -> BindResult<BoundExpr> {
        if let ExprKind::List(items) = &arg.kind
            && !items.is_empty()
        {
            let components: Option<Vec<f32>> = items
                .iter()
                .map(|item| match &item.kind {
                    ExprKind::Literal(Literal::Integer(i)) => Some(*i as f32),
                    ExprKind::Literal(Literal::Float(x)) => Some(*x as f32),
                    _ => None,
                })
                .collect();
            if let Some(components) = components {
                return Ok(BoundExpr::Literal(Value::Vector(components)));
            }
        }
        self.bind_expr(arg, clause)
    }

    fn bind_membership(
        &mut self,
        left: &Expression,
        right: &Expression,
        clause: QueryClause,
        offset: usize,
    ) -> BindResult<BoundExpr> {
        let mut left = self.bind_expr(left, clause)?;
        let right_offset = right.offset;
        let right = match &right.kind {
            ExprKind::List(_) | ExprKind::Parameter(_) => self.bind_expr(right, clause)?,
            _ => {
                return Err(BindError::unsupported(
                    "IN requires a list literal or a parameter",
                    right_offset,
                ));
            }
        };

        let element_kinds: Vec<ValueKind> = match &right {
            BoundExpr::List(items) => items.iter().filter_map(BoundExpr::static_kind).collect(),
            BoundExpr::Parameter { name, .. } => match self.referenced.values.get(name) {
                Some(Value::List(items)) => items.iter().filter_map(Value::kind).collect(),
                Some(Value::Vector(_)) => vec![ValueKind::Number],
                Some(Value::Null) | None => Vec::new(),
                Some(other) => {
                    return Err(BindError::TypeMismatch {
                        operator: "IN".to_string(),
                        left: kind_name(left.static_kind()),
                        right: other.type_name().to_string(),
                        offset,
                    });
                }
            },
            _ => Vec::new(),
        };

        refine(&mut left, element_kinds.first().copied());
        if let Some(left_kind) = left.static_kind()
            && let Some(other) = element_kinds.iter().find(|k| **k != left_kind)
        {
            return Err(BindError::TypeMismatch {
                operator: "IN".to_string(),
                left: left_kind.name().to_string(),
                right: format!("list of {other}"),
                offset,
            });
        }

        Ok(BoundExpr::Binary {
            op: BinaryOp::In,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    // ========== Projection ==========

    fn bind_projection(&mut self, query: &Query) -> BindResult<Vec<BoundProjection>> {
        // Property names returned more than once without an alias keep
        // their full `var.key` text
        let mut key_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for item in query.projection.iter().filter(|i| i.alias.is_none()) {
            if let ExprKind::Property { key, .. } = &item.expression.kind {
                *key_counts.entry(key).or_default() += 1;
            }
        }

        let mut projection: Vec<BoundProjection> = Vec::with_capacity(query.projection.len());
        for item in &query.projection {
            let expr = self.bind_expr(&item.expression, QueryClause::Return)?;
            let source = item.expression.to_string();

            let (alias, alias_offset) = match &item.alias {
                Some(alias) => (alias.value.clone(), alias.offset),
                None => {
                    let alias = match &item.expression.kind {
                        ExprKind::Property { key, .. } if key_counts.get(key.as_str()) == Some(&1) => {
                            key.clone()
                        }
                        ExprKind::Variable(name) => name.clone(),
                        _ => source.clone(),
                    };
                    (alias, item.expression.offset)
                }
            };

            if projection.iter().any(|p| p.alias == alias) {
                return Err(BindError::DuplicateAlias {
                    alias,
                    offset: alias_offset,
                });
            }

            projection.push(BoundProjection {
                expr,
                alias,
                source,
            });
        }

        Ok(projection)
    }

    fn bind_order_by(
        &mut self,
        query: &Query,
        projection: &[BoundProjection],
    ) -> BindResult<Vec<BoundOrder>> {
        let mut order_by = Vec::with_capacity(query.order_by.len());

        for item in &query.order_by {
            let text = item.expression.to_string();
            let by_alias = match &item.expression.kind {
                ExprKind::Variable(name) => projection.iter().position(|p| &p.alias == name),
                _ => None,
            };
            let position = by_alias.or_else(|| projection.iter().position(|p| p.source == text));

            let expr = match position {
                Some(i) => BoundExpr::ProjectionRef(i),
                None if query.distinct => {
                    return Err(BindError::unsupported(
                        format!("ORDER BY {text} must appear in the RETURN DISTINCT items"),
                        item.expression.offset,
                    ));
                }
                None => self.bind_expr(&item.expression, QueryClause::OrderBy)?,
            };

            order_by.push(BoundOrder {
                expr,
                ascending: item.ascending,
            });
        }

        Ok(order_by)
    }

    fn bind_count(&mut self, count: &Count, clause: QueryClause) -> BindResult<LimitValue> {
        match count {
            Count::Literal(n) => Ok(LimitValue::Literal(*n)),
            Count::Parameter { name, offset } => {
                self.bind_parameter(name, *offset)?;
                match self.referenced.values.get(name) {
                    Some(Value::Integer(n)) if *n >= 0 => {}
                    None => {}
                    Some(other) => {
                        return Err(BindError::TypeMismatch {
                            operator: clause.to_string(),
                            left: "non-negative integer".to_string(),
                            right: other.to_string(),
                            offset: *offset,
                        });
                    }
                }
                Ok(LimitValue::Parameter(name.clone()))
            }
        }
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Boolean(b) => Value::Boolean(*b),
        Literal::Integer(i) => Value::Integer(*i),
        Literal::Float(x) => Value::Float(*x),
        Literal::String(s) => Value::String(s.clone()),
    }
}

/// Give an undeclared property the kind its context expects
fn refine(expr: &mut BoundExpr, kind: Option<ValueKind>) {
    if let (BoundExpr::Property(p), Some(kind)) = (expr, kind)
        && !p.declared
    {
        p.kind = kind;
    }
}

fn kind_name(kind: Option<ValueKind>) -> String {
    kind.map(|k| k.name().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Kind name for diagnostics; element identities are named by what they are
fn describe(expr: &BoundExpr) -> String {
    match expr {
        BoundExpr::Element { element, .. } if element % 2 == 0 => "node".to_string(),
        BoundExpr::Element { .. } => "relationship".to_string(),
        other => kind_name(other.static_kind()),
    }
}

fn mismatch(operator: &str, left: &BoundExpr, right: &BoundExpr, offset: usize) -> BindError {
    BindError::TypeMismatch {
        operator: operator.to_string(),
        left: describe(left),
        right: describe(right),
        offset,
    }
}

fn expect_boolean(expr: &BoundExpr, operator: &str, offset: usize) -> BindResult<()> {
    let boolean = match expr.static_kind() {
        Some(kind) => kind == ValueKind::Boolean,
        None => !expr.is_element(),
    };
    if boolean {
        return Ok(());
    }
    Err(BindError::TypeMismatch {
        operator: operator.to_string(),
        left: describe(expr),
        right: "boolean".to_string(),
        offset,
    })
}

/// Element identities only compare for (in)equality, against another
/// element or a scalar id
fn element_comparison(op: BinaryOp, left: &BoundExpr, right: &BoundExpr) -> bool {
    if !matches!(op, BinaryOp::Equals | BinaryOp::NotEquals) {
        return false;
    }
    [left, right].into_iter().all(|operand| {
        operand.is_element()
            || !matches!(
                operand.static_kind(),
                Some(ValueKind::Boolean | ValueKind::Vector)
            )
    })
}

fn check_comparison(op: BinaryOp, left: &BoundExpr, right: &BoundExpr, offset: usize) -> BindResult<()> {
    let kinds = (left.static_kind(), right.static_kind());
    let compatible = match op {
        _ if left.is_element() || right.is_element() => element_comparison(op, left, right),
        BinaryOp::Equals | BinaryOp::NotEquals => match kinds {
            (Some(a), Some(b)) => a == b,
            _ => true,
        },
        BinaryOp::LessThan | BinaryOp::LessEquals | BinaryOp::GreaterThan | BinaryOp::GreaterEquals => {
            let ordered = [kinds.0, kinds.1].into_iter().flatten().all(ValueKind::is_ordered);
            match kinds {
                (Some(a), Some(b)) => ordered && a == b,
                _ => ordered,
            }
        }
        BinaryOp::Contains | BinaryOp::StartsWith | BinaryOp::EndsWith => [kinds.0, kinds.1]
            .into_iter()
            .flatten()
            .all(|k| k == ValueKind::String),
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::In => true,
    };

    if compatible {
        Ok(())
    } else {
        Err(mismatch(op.symbol(), left, right, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_query;
    use kgsql_core::{LabelSchema, RelationshipSchema};

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::new(3)
            .with_label(
                "Protein",
                LabelSchema::new()
                    .property("id", ValueKind::String)
                    .property("name", ValueKind::String)
                    .property("mass", ValueKind::Number)
                    .property("embedding", ValueKind::Vector),
            )
            .with_label(
                "Disease",
                LabelSchema::new()
                    .property("id", ValueKind::String)
                    .property("chronic", ValueKind::Boolean),
            )
            .with_relationship_type(
                "INTERACTS_WITH",
                RelationshipSchema::new().property("weight", ValueKind::Number),
            )
            .with_relationship_type("ASSOCIATED_WITH", RelationshipSchema::new())
    }

    fn bind_text(text: &str, params: &Parameters) -> BindResult<BoundQuery<'static>> {
        let catalog: &'static SchemaCatalog = Box::leak(Box::new(catalog()));
        let query = parse_query(text).unwrap();
        bind(&query, catalog, params)
    }

    fn bind_ok(text: &str) -> BoundQuery<'static> {
        bind_text(text, &Parameters::new()).unwrap()
    }

    fn bind_err(text: &str) -> BindError {
        bind_text(text, &Parameters::new()).unwrap_err()
    }

    #[test]
    fn test_elements_are_numbered_by_chain_position() {
        let bound = bind_ok("MATCH (a:Protein)-[r:INTERACTS_WITH]->(b)<-[:ASSOCIATED_WITH*1..2]-(c) RETURN a, r, b");
        assert_eq!(bound.elements.len(), 5);
        assert!(bound.elements[0].is_node());
        assert_eq!(bound.variables["r"], 1);
        assert_eq!(bound.variables["b"], 2);
        let hop = bound.elements[3].as_relationship().unwrap();
        assert_eq!(hop.direction, Direction::Incoming);
        assert_eq!(hop.hops, Some(HopRange { min: 1, max: 2 }));
        assert_eq!(bound.node_count(), 3);
    }

    #[test]
    fn test_unknown_label_and_type() {
        assert!(matches!(
            bind_err("MATCH (a:Gene) RETURN a"),
            BindError::UnknownSchemaElement {
                kind: SchemaElementKind::Label,
                offset: 9,
                ..
            }
        ));
        assert!(matches!(
            bind_err("MATCH (a)-[:CURES]->(b) RETURN a"),
            BindError::UnknownSchemaElement {
                kind: SchemaElementKind::RelationshipType,
                ..
            }
        ));
    }

    #[test]
    fn test_parameters_must_be_supplied_or_deferred() {
        let text = "MATCH (p {id: $pid}) RETURN p";
        assert_eq!(
            bind_text(text, &Parameters::new()).unwrap_err(),
            BindError::UndeclaredParameter {
                name: "pid".to_string(),
                offset: 14
            }
        );

        let bound = bind_text(text, &Parameters::new().with("pid", "P:1")).unwrap();
        assert_eq!(bound.parameters.values["pid"], Value::from("P:1"));

        let bound = bind_text(text, &Parameters::new().defer("pid")).unwrap();
        assert!(bound.parameters.deferred.contains("pid"));
    }

    #[test]
    fn test_defer_missing_parameters() {
        let catalog = catalog();
        let query = parse_query("MATCH (p:Protein) WHERE p.id = $pid RETURN p").unwrap();
        let params = Parameters::new();
        let bound = Binder::new(&catalog, &params)
            .defer_missing(true)
            .bind(&query)
            .unwrap();
        assert!(bound.parameters.deferred.contains("pid"));
    }

    #[test]
    fn test_hop_bounds() {
        assert_eq!(
            bind_err("MATCH (a)-[:INTERACTS_WITH*2..]->(b) RETURN a"),
            BindError::UnboundedTraversal { offset: 9 }
        );
        assert_eq!(
            bind_err("MATCH (a)-[:INTERACTS_WITH*]->(b) RETURN a"),
            BindError::UnboundedTraversal { offset: 9 }
        );
        assert_eq!(
            bind_err("MATCH (a)-[:INTERACTS_WITH*3..1]->(b) RETURN a"),
            BindError::InvalidHopRange {
                min: 3,
                max: 1,
                offset: 9
            }
        );
        let bound = bind_ok("MATCH (a)-[:INTERACTS_WITH*..2]->(b) RETURN a");
        assert_eq!(
            bound.elements[1].as_relationship().unwrap().hops,
            Some(HopRange { min: 1, max: 2 })
        );
    }

    #[test]
    fn test_unbound_variables_in_every_clause() {
        assert!(matches!(
            bind_err("MATCH (a) WHERE b.id = 'x' RETURN a"),
            BindError::UnboundVariableReference { ref name, clause: QueryClause::Where, .. } if name == "b"
        ));
        assert!(matches!(
            bind_err("MATCH (a) RETURN c"),
            BindError::UnboundVariableReference { clause: QueryClause::Return, .. }
        ));
        assert!(matches!(
            bind_err("MATCH (a) RETURN a ORDER BY d.id"),
            BindError::UnboundVariableReference { clause: QueryClause::OrderBy, .. }
        ));
    }

    #[test]
    fn test_property_unknown_everywhere_on_unlabeled_variable() {
        assert_eq!(
            bind_err("MATCH (a) RETURN a.unknownVar"),
            BindError::UnboundVariableReference {
                name: "a.unknownVar".to_string(),
                clause: QueryClause::Return,
                offset: 17
            }
        );
    }

    #[test]
    fn test_undeclared_property_on_known_label_warns() {
        let bound = bind_ok("MATCH (a:Protein) WHERE a.score > 3 RETURN a.nickname");
        assert_eq!(bound.warnings.len(), 2);
        assert!(matches!(
            &bound.warnings[0],
            BindWarning::UndeclaredProperty { key, .. } if key == "score"
        ));

        // The kind is taken from the compared literal
        match bound.predicate.unwrap() {
            BoundExpr::Binary { left, .. } => match *left {
                BoundExpr::Property(p) => {
                    assert_eq!(p.kind, ValueKind::Number);
                    assert!(!p.declared);
                }
                other => panic!("expected property, got {other:?}"),
            },
            other => panic!("expected comparison, got {other:?}"),
        }
        match &bound.projection[0].expr {
            BoundExpr::Property(p) => assert_eq!(p.kind, ValueKind::String),
            other => panic!("expected property, got {other:?}"),
        }
    }

    #[test]
    fn test_type_mismatch() {
        assert!(matches!(
            bind_err("MATCH (a:Protein) WHERE a.embedding = 'x' RETURN a"),
            BindError::TypeMismatch { ref left, ref right, .. } if left == "vector" && right == "string"
        ));
        assert!(matches!(
            bind_err("MATCH (a:Protein) WHERE a.mass < 'heavy' RETURN a"),
            BindError::TypeMismatch { .. }
        ));
        assert!(matches!(
            bind_err("MATCH (a:Disease) WHERE a.chronic > true RETURN a"),
            BindError::TypeMismatch { .. }
        ));
        assert!(matches!(
            bind_err("MATCH (a:Protein) WHERE a.mass CONTAINS 'x' RETURN a"),
            BindError::TypeMismatch { .. }
        ));
        assert!(matches!(
            bind_err("MATCH (a:Protein) WHERE a.name AND true RETURN a"),
            BindError::TypeMismatch { .. }
        ));
        assert!(matches!(
            bind_err("MATCH (a:Protein) WHERE a.name IN [1, 2] RETURN a"),
            BindError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_parameter_kinds_are_checked() {
        let params = Parameters::new().with("qvec", "not a vector");
        let err = bind_text(
            "MATCH (a:Protein) RETURN similarity(a.embedding, $qvec)",
            &params,
        )
        .unwrap_err();
        assert!(matches!(err, BindError::TypeMismatch { ref operator, .. } if operator == "similarity"));

        let params = Parameters::new().with("n", "ten");
        let err = bind_text("MATCH (a) RETURN a LIMIT $n", &params).unwrap_err();
        assert!(matches!(err, BindError::TypeMismatch { ref operator, .. } if operator == "LIMIT"));
    }

    #[test]
    fn test_similarity_binding() {
        let params = Parameters::new().with("qvec", vec![0.1f32, 0.2]);
        let bound = bind_text(
            "MATCH (a:Protein) RETURN similarity(a.embedding, $qvec) AS score, similarity(a.embedding, [1, 0.5])",
            &params,
        )
        .unwrap();
        assert!(matches!(bound.projection[0].expr, BoundExpr::Similarity { .. }));
        match &bound.projection[1].expr {
            BoundExpr::Similarity { right, .. } => {
                assert_eq!(**right, BoundExpr::Literal(Value::Vector(vec![1.0, 0.5])))
            }
            other => panic!("expected similarity, got {other:?}"),
        }
        assert_eq!(bound.projection[1].alias, "similarity(a.embedding, [1, 0.5])");
    }

    #[test]
    fn test_functions() {
        assert!(matches!(
            bind_err("MATCH (a) RETURN count(a)"),
            BindError::UnknownFunction { ref name, .. } if name == "count"
        ));
        assert!(matches!(
            bind_err("MATCH (a:Protein) RETURN similarity(a.embedding)"),
            BindError::ArityMismatch {
                expected: 2,
                found: 1,
                ..
            }
        ));
        let bound = bind_ok("MATCH (a) RETURN id(a)");
        assert_eq!(
            bound.projection[0].expr,
            BoundExpr::Element {
                element: 0,
                variable: "a".to_string()
            }
        );
        assert_eq!(bound.projection[0].alias, "id(a)");
    }

    #[test]
    fn test_similarity_arity_of_unvalidated_catalog() {
        use kgsql_core::{SimilarityFunction, VectorMetric};

        for arity in [1, 3] {
            let catalog = catalog().with_similarity(SimilarityFunction {
                name: "sim".to_string(),
                arity,
                metric: VectorMetric::Cosine,
            });
            let args = vec!["a.embedding"; arity].join(", ");
            let query = parse_query(&format!("MATCH (a:Protein) RETURN sim({args})")).unwrap();
            let err = bind(&query, &catalog, &Parameters::new()).unwrap_err();
            assert!(matches!(
                err,
                BindError::ArityMismatch { expected: 2, found, .. } if found == arity
            ));
        }
    }

    #[test]
    fn test_element_variables_are_not_values() {
        let mismatch_on = |text: &str, params: &Parameters| match bind_text(text, params) {
            Err(BindError::TypeMismatch { operator, left, right, .. }) => (operator, left, right),
            other => panic!("expected a type mismatch for {text}, got {other:?}"),
        };
        let none = Parameters::new();

        let (operator, left, _) = mismatch_on("MATCH (a:Protein) WHERE a RETURN a.id", &none);
        assert_eq!((operator.as_str(), left.as_str()), ("WHERE", "node"));

        let (operator, _, _) = mismatch_on("MATCH (a:Protein) WHERE NOT a RETURN a.id", &none);
        assert_eq!(operator, "NOT");

        let (operator, _, _) =
            mismatch_on("MATCH (a:Protein) WHERE a AND a.id = 'x' RETURN a.id", &none);
        assert_eq!(operator, "AND");

        let params = Parameters::new().with("q", vec![0.1f32, 0.2]);
        let (operator, left, right) =
            mismatch_on("MATCH (a:Protein) RETURN similarity(a, $q)", &params);
        assert_eq!(operator, "similarity");
        assert_eq!((left.as_str(), right.as_str()), ("node", "vector"));

        let (_, left, _) = mismatch_on(
            "MATCH (a)-[r:INTERACTS_WITH]->(b) WHERE r > 1 RETURN b",
            &none,
        );
        assert_eq!(left, "relationship");
        mismatch_on("MATCH (a:Protein) WHERE a STARTS WITH 'P' RETURN a.id", &none);
        mismatch_on("MATCH (a:Protein) WHERE a = true RETURN a.id", &none);
        mismatch_on("MATCH (a:Protein) WHERE a.embedding = a RETURN a.id", &none);
    }

    #[test]
    fn test_element_identity_comparisons() {
        bind_ok("MATCH (a)-[:INTERACTS_WITH]->(b) WHERE a <> b RETURN a, b");
        let params = Parameters::new().with("pid", "P:1");
        let bound = bind_text("MATCH (a:Protein) WHERE id(a) = $pid RETURN a.id", &params).unwrap();
        assert!(matches!(
            bound.predicate,
            Some(BoundExpr::Binary { ref left, .. }) if left.is_element()
        ));
    }

    #[test]
    fn test_variable_reuse() {
        let bound = bind_ok("MATCH (a)-[:INTERACTS_WITH]->(b)-[:INTERACTS_WITH]->(a:Protein) RETURN a.mass");
        assert_eq!(bound.elements[4].repeat_of(), Some(0));
        // Labels of the second occurrence resolve the property
        assert_eq!(bound.labels_of(0), vec!["Protein".to_string()]);
        assert!(bound.warnings.is_empty());

        assert!(matches!(
            bind_err("MATCH (a)-[a]->(b) RETURN b"),
            BindError::VariableKindConflict { .. }
        ));
        assert!(matches!(
            bind_err("MATCH (a)-[r*1..2]->(b)-[r]->(c) RETURN c"),
            BindError::UnsupportedConstruct { .. }
        ));
        assert!(matches!(
            bind_err("MATCH (a)-[r*1..2]->(b) RETURN r"),
            BindError::UnsupportedConstruct { .. }
        ));
    }

    #[test]
    fn test_projection_aliases() {
        let bound = bind_ok("MATCH (q:Protein)-->(d:Disease) RETURN q.id, d.id, q.name, q AS node");
        let aliases: Vec<&str> = bound.projection.iter().map(|p| p.alias.as_str()).collect();
        assert_eq!(aliases, ["q.id", "d.id", "name", "node"]);
        assert_eq!(bound.projection[2].source, "q.name");

        assert!(matches!(
            bind_err("MATCH (a:Protein) RETURN a.id AS x, a.name AS x"),
            BindError::DuplicateAlias { ref alias, .. } if alias == "x"
        ));
    }

    #[test]
    fn test_order_by_references() {
        let bound = bind_ok(
            "MATCH (a:Protein) RETURN a.name AS n, a.mass ORDER BY n, a.mass DESC, a.id",
        );
        assert_eq!(bound.order_by[0].expr, BoundExpr::ProjectionRef(0));
        assert_eq!(bound.order_by[1].expr, BoundExpr::ProjectionRef(1));
        assert!(!bound.order_by[1].ascending);
        assert!(matches!(bound.order_by[2].expr, BoundExpr::Property(_)));

        assert!(matches!(
            bind_err("MATCH (a:Protein) RETURN DISTINCT a.name ORDER BY a.mass"),
            BindError::UnsupportedConstruct { .. }
        ));
    }

    #[test]
    fn test_inline_map_becomes_equality() {
        let params = Parameters::new().with("pid", "P:1");
        let bound = bind_text(
            "MATCH (p {id: $pid})-[:INTERACTS_WITH {weight: 2}]->(q) RETURN q",
            &params,
        )
        .unwrap();
        assert_eq!(bound.inline_filters.len(), 2);
        assert_eq!(bound.inline_filters[0].elements(), BTreeSet::from([0]));
        assert_eq!(bound.inline_filters[1].elements(), BTreeSet::from([1]));
        assert_eq!(bound.inline_filters[1].to_string(), "_1.weight = 2");
    }

    #[test]
    fn test_skip_and_limit() {
        let params = Parameters::new().with("k", 10);
        let bound = bind_text("MATCH (a) RETURN a SKIP 2 LIMIT $k", &params).unwrap();
        assert_eq!(bound.skip, Some(LimitValue::Literal(2)));
        assert_eq!(bound.limit, Some(LimitValue::Parameter("k".to_string())));
    }
}
