//! SQL emission
//!
//! Renders a [`LogicalPlan`] as a single PostgreSQL statement over the
//! catalog's storage layout. The match part becomes a derived table `m`
//! with one column per exposed pattern element (`v{index}`) plus the rank
//! score; the projection reads from `m` into positional columns `c0..cN`.
//!
//! Nothing the query author wrote is interpolated: literals, parameters,
//! labels, relationship types and property keys all go through
//! placeholders, and table and column names come from the validated layout.

mod params;

pub use params::DeferredParam;

use crate::ast::BinaryOp;
use crate::binder::{BindWarning, BoundElement, BoundExpr, LimitValue, PropertyRef};
use crate::config::PlaceholderStyle;
use crate::planner::{
    HopExpansion, Join, Limit, LogicalPlan, PlanNode, PlanOutcome, RankedSimilarity, Scan, Sort,
    VectorRank,
};
use kgsql_core::{Direction, StorageLayout, Value, ValueKind};
use params::ParamSink;
use serde::{Deserialize, Serialize};

/// One output column of the compiled statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultColumn {
    /// Column name in the SQL text
    pub column: String,
    /// Name the query gave the column
    pub alias: String,
    /// Query text the column is computed from
    pub source: String,
}

/// A translated query, ready to hand to a PostgreSQL driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledQuery {
    pub sql: String,

    /// Values for the placeholders, in placeholder order
    pub bind_params: Vec<Value>,

    /// Placeholders left for the executor to fill
    pub deferred: Vec<DeferredParam>,

    pub result_map: Vec<ResultColumn>,

    pub outcome: PlanOutcome,

    pub warnings: Vec<BindWarning>,
}

/// Where an expression is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// Inside the match part, against scan and edge aliases
    Match,
    /// Against the columns of the derived table `m`
    Outer,
}

/// Render a logical plan as SQL
pub fn emit(plan: &LogicalPlan<'_>, style: PlaceholderStyle) -> CompiledQuery {
    let mut emitter = Emitter {
        plan,
        layout: &plan.catalog.layout,
        sink: ParamSink::new(style, &plan.parameters),
    };

    let sql = match plan.outcome {
        PlanOutcome::Rows => emitter.statement(),
        PlanOutcome::EmptyStaticResult => emitter.empty_statement(),
    };
    let (bind_params, deferred) = emitter.sink.finish();

    let result_map = plan
        .projection()
        .map(|project| {
            project
                .items
                .iter()
                .enumerate()
                .map(|(i, item)| ResultColumn {
                    column: format!("c{i}"),
                    alias: item.alias.clone(),
                    source: item.source.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    tracing::debug!(
        sql_len = sql.len(),
        bind_params = bind_params.len(),
        deferred = deferred.len(),
        "emitted sql"
    );

    CompiledQuery {
        sql,
        bind_params,
        deferred,
        result_map,
        outcome: plan.outcome,
        warnings: plan.warnings.clone(),
    }
}

struct Emitter<'a, 'c> {
    plan: &'a LogicalPlan<'c>,
    layout: &'a StorageLayout,
    sink: ParamSink<'a>,
}

impl Emitter<'_, '_> {
    // ========== Statement ==========

    fn statement(&mut self) -> String {
        let plan = self.plan;
        let Some(project) = plan.projection() else {
            return String::new();
        };

        let mut sort: Option<&Sort> = None;
        let mut limit: Option<&Limit> = None;
        plan.root.walk(&mut |node| match node {
            PlanNode::Sort(s) => sort = Some(s),
            PlanNode::Limit(l) => limit = Some(l),
            _ => {}
        });

        let mut sql = String::from("SELECT ");
        if project.distinct {
            sql.push_str("DISTINCT ");
        }
        for (i, item) in project.items.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            let rendered = self.expr(&item.expr, Scope::Outer);
            sql.push_str(&format!("{rendered} AS c{i}"));
        }

        sql.push_str(" FROM (");
        for (i, branch) in plan.branches().into_iter().enumerate() {
            if i > 0 {
                sql.push_str(" UNION ALL ");
            }
            self.branch(branch, &mut sql);
        }
        sql.push_str(") AS m");

        if let Some(sort) = sort {
            sql.push_str(" ORDER BY ");
            for (i, key) in sort.keys.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                let rendered = match &key.expr {
                    BoundExpr::ProjectionRef(i) => format!("c{i}"),
                    other => self.expr(other, Scope::Outer),
                };
                sql.push_str(&rendered);
                sql.push_str(if key.ascending { " ASC" } else { " DESC" });
            }
        }

        if let Some(limit) = limit {
            if let Some(count) = &limit.count {
                let placeholder = self.count(count);
                sql.push_str(&format!(" LIMIT {placeholder}"));
            }
            if let Some(skip) = &limit.skip {
                let placeholder = self.count(skip);
                sql.push_str(&format!(" OFFSET {placeholder}"));
            }
        }

        sql
    }

    /// A statement with the projection's shape and no rows
    fn empty_statement(&self) -> String {
        let columns: Vec<String> = self
            .plan
            .projection()
            .map(|p| p.items.len())
            .map(|n| (0..n).map(|i| format!("NULL AS c{i}")).collect())
            .unwrap_or_default();
        format!("SELECT {} WHERE FALSE", columns.join(", "))
    }

    fn count(&mut self, count: &LimitValue) -> String {
        match count {
            LimitValue::Literal(n) => self
                .sink
                .value(Value::Integer(i64::try_from(*n).unwrap_or(i64::MAX))),
            LimitValue::Parameter(name) => self.sink.parameter(name),
        }
    }

    // ========== Match part ==========

    fn branch(&mut self, node: &PlanNode, sql: &mut String) {
        let plan = self.plan;
        let mut columns: Vec<String> = plan
            .exposed_elements()
            .into_iter()
            .map(|element| format!("{} AS v{element}", self.identity(element)))
            .collect();
        if let Some(rank) = &plan.rank {
            columns.push(format!("n{}.score AS score", rank.element));
        }

        sql.push_str("SELECT ");
        sql.push_str(&columns.join(", "));
        sql.push_str(" FROM ");
        self.source(node, sql);
    }

    fn source(&mut self, node: &PlanNode, sql: &mut String) {
        match node {
            PlanNode::Scan(scan) => self.scan(scan, sql),
            PlanNode::VectorRank(rank) => self.vector_rank(rank, sql),
            PlanNode::HopExpansion(hop) => {
                self.source(&hop.base, sql);
                self.hop(hop, sql);
            }
            PlanNode::Join(join) => self.join(join, sql),
            _ => {}
        }
    }

    fn scan(&mut self, scan: &Scan, sql: &mut String) {
        let alias = format!("n{}", scan.element);
        let table = &self.layout.node_table;

        if scan.labels.is_empty() && scan.filters.is_empty() {
            sql.push_str(&format!("{table} AS {alias}"));
            return;
        }

        let node_id = &self.layout.node_id;
        sql.push_str(&format!("(SELECT {alias}.{node_id} FROM {table} AS {alias} WHERE "));
        self.scan_conditions(scan, &alias, sql);
        sql.push_str(&format!(") AS {alias}"));
    }

    /// Label checks and pushed-down filters of a scan, joined with AND
    fn scan_conditions(&mut self, scan: &Scan, alias: &str, sql: &mut String) {
        let layout = self.layout;
        let mut first = true;
        for label in &scan.labels {
            if !first {
                sql.push_str(" AND ");
            }
            first = false;
            sql.push_str(&format!(
                "EXISTS (SELECT 1 FROM {} AS l WHERE l.{} = {alias}.{} AND l.{} = ",
                layout.label_table, layout.label_node_id, layout.node_id, layout.label_name
            ));
            let placeholder = self.sink.text(label);
            sql.push_str(&placeholder);
            sql.push(')');
        }
        for filter in &scan.filters {
            if !first {
                sql.push_str(" AND ");
            }
            first = false;
            let rendered = self.expr(filter, Scope::Match);
            sql.push_str(&rendered);
        }
    }

    /// `(SELECT n.id, <similarity> AS score FROM ... ORDER BY <distance> LIMIT k) AS n`
    fn vector_rank(&mut self, rank: &VectorRank, sql: &mut String) {
        let PlanNode::Scan(scan) = rank.input.as_ref() else {
            self.source(&rank.input, sql);
            return;
        };
        let alias = format!("n{}", scan.element);
        let layout = self.layout;

        let score = self.similarity(&rank.rank, Scope::Match);
        sql.push_str(&format!(
            "(SELECT {alias}.{}, {score} AS score FROM {} AS {alias}",
            layout.node_id, layout.node_table
        ));
        if !scan.labels.is_empty() || !scan.filters.is_empty() {
            sql.push_str(" WHERE ");
            self.scan_conditions(scan, &alias, sql);
        }

        let distance = self.distance(&rank.rank, Scope::Match);
        sql.push_str(&format!(" ORDER BY {distance}"));
        if let Some(top_k) = &rank.top_k {
            let placeholder = self.count(top_k);
            sql.push_str(&format!(" LIMIT {placeholder}"));
        }
        sql.push_str(&format!(") AS {alias}"));
    }

    fn hop(&mut self, hop: &HopExpansion, sql: &mut String) {
        let layout = self.layout;
        for step in 1..=hop.depth {
            let alias = edge_alias(hop.relationship, step);
            let previous = self.endpoint(hop, step - 1);

            let near = match hop.direction {
                Direction::Outgoing => format!("{alias}.{} = {previous}", layout.edge_source),
                Direction::Incoming => format!("{alias}.{} = {previous}", layout.edge_target),
                Direction::Either => format!(
                    "({alias}.{} = {previous} OR {alias}.{} = {previous})",
                    layout.edge_source, layout.edge_target
                ),
            };
            sql.push_str(&format!(" JOIN {} AS {alias} ON {near}", layout.edge_table));

            match hop.rel_types.as_slice() {
                [] => {}
                [rel_type] => {
                    let placeholder = self.sink.text(rel_type);
                    sql.push_str(&format!(" AND {alias}.{} = {placeholder}", layout.edge_type));
                }
                rel_types => {
                    sql.push_str(&format!(" AND {alias}.{} IN (", layout.edge_type));
                    for (i, rel_type) in rel_types.iter().enumerate() {
                        if i > 0 {
                            sql.push_str(", ");
                        }
                        let placeholder = self.sink.text(rel_type);
                        sql.push_str(&placeholder);
                    }
                    sql.push(')');
                }
            }

            let earlier = hop
                .distinct_from
                .iter()
                .map(|edge| edge_alias(edge.relationship, edge.step))
                .chain((1..step).map(|s| edge_alias(hop.relationship, s)));
            for other in earlier {
                sql.push_str(&format!(
                    " AND {alias}.{id} <> {other}.{id}",
                    id = layout.edge_id
                ));
            }

            if step == hop.depth {
                for filter in &hop.filters {
                    let rendered = self.expr(filter, Scope::Match);
                    sql.push_str(" AND ");
                    sql.push_str(&rendered);
                }
            }
        }
    }

    fn join(&mut self, join: &Join, sql: &mut String) {
        self.source(&join.left, sql);
        let far = match join.left.as_ref() {
            PlanNode::HopExpansion(hop) => self.endpoint(hop, hop.depth),
            _ => self.identity(join.join_keys.1),
        };

        sql.push_str(" JOIN ");
        self.source(&join.right, sql);
        sql.push_str(&format!(
            " ON {} = {far}",
            self.identity(join.join_keys.1)
        ));
        for condition in &join.conditions {
            let rendered = self.expr(condition, Scope::Match);
            sql.push_str(" AND ");
            sql.push_str(&rendered);
        }
    }

    /// Node id reached after `step` edges of a hop
    fn endpoint(&self, hop: &HopExpansion, step: u32) -> String {
        let layout = self.layout;
        if step == 0 {
            return self.identity(hop.from);
        }
        let alias = edge_alias(hop.relationship, step);
        match hop.direction {
            Direction::Outgoing => format!("{alias}.{}", layout.edge_target),
            Direction::Incoming => format!("{alias}.{}", layout.edge_source),
            Direction::Either => format!(
                "CASE WHEN {alias}.{source} = {previous} THEN {alias}.{target} ELSE {alias}.{source} END",
                source = layout.edge_source,
                target = layout.edge_target,
                previous = self.endpoint(hop, step - 1),
            ),
        }
    }

    /// Identity column of an element inside the match part
    fn identity(&self, element: usize) -> String {
        match self.plan.elements.get(element) {
            Some(BoundElement::Relationship(_)) => {
                format!("{}.{}", edge_alias(element, 1), self.layout.edge_id)
            }
            _ => format!("n{element}.{}", self.layout.node_id),
        }
    }

    fn identity_in(&self, element: usize, scope: Scope) -> String {
        match scope {
            Scope::Match => self.identity(element),
            Scope::Outer => format!("m.v{element}"),
        }
    }

    // ========== Expressions ==========

    fn expr(&mut self, expr: &BoundExpr, scope: Scope) -> String {
        match expr {
            BoundExpr::Literal(Value::Null) => "NULL".to_string(),
            BoundExpr::Literal(value @ Value::Vector(_)) => {
                format!("CAST({} AS vector)", self.sink.value(value.clone()))
            }
            BoundExpr::Literal(value) => self.sink.value(value.clone()),
            BoundExpr::Parameter { name, kind } => {
                let placeholder = self.sink.parameter(name);
                if *kind == Some(ValueKind::Vector) {
                    format!("CAST({placeholder} AS vector)")
                } else {
                    placeholder
                }
            }
            BoundExpr::Property(property) => self.property(property, scope),
            BoundExpr::Element { element, .. } => self.identity_in(*element, scope),
            BoundExpr::List(items) => {
                let rendered: Vec<String> = items.iter().map(|i| self.expr(i, scope)).collect();
                format!("ARRAY[{}]", rendered.join(", "))
            }
            BoundExpr::Binary { op, left, right } => self.binary(*op, left, right, scope),
            BoundExpr::Not(operand) => format!("(NOT {})", self.expr(operand, scope)),
            BoundExpr::IsNull { operand, negated } => {
                let rendered = self.expr(operand, scope);
                if *negated {
                    format!("({rendered} IS NOT NULL)")
                } else {
                    format!("({rendered} IS NULL)")
                }
            }
            BoundExpr::Similarity { left, right } => {
                let ranked = self.plan.rank.as_ref().filter(|r| r.similarity == *expr);
                match (scope, ranked) {
                    (Scope::Outer, Some(_)) => "m.score".to_string(),
                    _ => {
                        let distance = self.distance_between(left, right, scope);
                        self.plan
                            .catalog
                            .similarity
                            .metric
                            .similarity_from_distance(&distance)
                    }
                }
            }
            BoundExpr::ProjectionRef(i) => format!("c{i}"),
        }
    }

    fn binary(&mut self, op: BinaryOp, left: &BoundExpr, right: &BoundExpr, scope: Scope) -> String {
        match op {
            BinaryOp::In => match right {
                // Nothing is a member of the empty list, not even null
                BoundExpr::List(items) if items.is_empty() => "FALSE".to_string(),
                BoundExpr::List(items) => {
                    let needle = self.expr(left, scope);
                    let rendered: Vec<String> = items.iter().map(|i| self.expr(i, scope)).collect();
                    format!("({needle} IN ({}))", rendered.join(", "))
                }
                other => {
                    let needle = self.expr(left, scope);
                    let haystack = self.expr(other, scope);
                    format!("({needle} = ANY({haystack}))")
                }
            },
            BinaryOp::Xor => {
                let l = self.expr(left, scope);
                let r = self.expr(right, scope);
                format!("({l} <> {r})")
            }
            BinaryOp::Contains => {
                let l = self.expr(left, scope);
                let r = self.expr(right, scope);
                format!("(strpos({l}, {r}) > 0)")
            }
            BinaryOp::StartsWith => {
                let l = self.expr(left, scope);
                let r = self.expr(right, scope);
                format!("starts_with({l}, {r})")
            }
            BinaryOp::EndsWith => {
                let l = self.expr(left, scope);
                let length = self.expr(right, scope);
                let r = self.expr(right, scope);
                format!("(right({l}, length({length})) = {r})")
            }
            _ => {
                let l = self.expr(left, scope);
                let r = self.expr(right, scope);
                format!("({l} {} {r})", op.symbol())
            }
        }
    }

    /// Correlated scalar subquery; absent properties read as NULL
    fn property(&mut self, property: &PropertyRef, scope: Scope) -> String {
        let layout = self.layout;
        let owner = self.identity_in(property.element, scope);
        let table = match self.plan.elements.get(property.element) {
            Some(BoundElement::Relationship(_)) => &layout.edge_property_table,
            _ => &layout.node_property_table,
        };
        let key = self.sink.text(&property.key);
        format!(
            "(SELECT p.{} FROM {table} AS p WHERE p.{} = {owner} AND p.{} = {key})",
            layout.value_column(property.kind),
            layout.property_owner,
            layout.property_key,
        )
    }

    fn similarity(&mut self, rank: &RankedSimilarity, scope: Scope) -> String {
        let distance = self.distance(rank, scope);
        self.plan
            .catalog
            .similarity
            .metric
            .similarity_from_distance(&distance)
    }

    fn distance(&mut self, rank: &RankedSimilarity, scope: Scope) -> String {
        match &rank.similarity {
            BoundExpr::Similarity { left, right } => self.distance_between(left, right, scope),
            _ => self.distance_between(&rank.vector, &rank.query, scope),
        }
    }

    fn distance_between(&mut self, left: &BoundExpr, right: &BoundExpr, scope: Scope) -> String {
        let l = self.vector_operand(left, scope);
        let r = self.vector_operand(right, scope);
        let operator = self.plan.catalog.similarity.metric.distance_operator();
        format!("{l} {operator} {r}")
    }

    /// Constants compared by distance are cast so the operator resolves
    /// even when the value's type is unknown to the driver
    fn vector_operand(&mut self, operand: &BoundExpr, scope: Scope) -> String {
        match operand {
            BoundExpr::Parameter { name, .. } => {
                format!("CAST({} AS vector)", self.sink.parameter(name))
            }
            BoundExpr::Literal(value) if !value.is_null() => {
                format!("CAST({} AS vector)", self.sink.value(value.clone()))
            }
            other => self.expr(other, scope),
        }
    }
}

fn edge_alias(relationship: usize, step: u32) -> String {
    format!("e{relationship}_{step}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::{Binder, Parameters};
    use crate::parser::parse_query;
    use crate::planner::plan;
    use kgsql_core::{LabelSchema, RelationshipSchema, SchemaCatalog};

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::new(3)
            .with_label(
                "Protein",
                LabelSchema::new()
                    .property("id", ValueKind::String)
                    .property("name", ValueKind::String)
                    .property("embedding", ValueKind::Vector)
                    .estimated_count(20_000),
            )
            .with_label(
                "Disease",
                LabelSchema::new()
                    .property("id", ValueKind::String)
                    .estimated_count(500),
            )
            .with_relationship_type(
                "INTERACTS_WITH",
                RelationshipSchema::new().property("weight", ValueKind::Number),
            )
            .with_relationship_type("ASSOCIATED_WITH", RelationshipSchema::new())
    }

    fn compile_with(text: &str, params: &Parameters, style: PlaceholderStyle) -> CompiledQuery {
        let catalog = catalog();
        let query = parse_query(text).unwrap();
        let bound = Binder::new(&catalog, params).bind(&query).unwrap();
        emit(&plan(bound).unwrap(), style)
    }

    fn compile(text: &str, params: &Parameters) -> CompiledQuery {
        compile_with(text, params, PlaceholderStyle::Dollar)
    }

    #[test]
    fn test_single_hop_statement() {
        let params = Parameters::new().with("pid", "P:1");
        let compiled = compile(
            "MATCH (p {id: $pid})-[:INTERACTS_WITH]->(q) RETURN q.id, q.name LIMIT 10",
            &params,
        );

        assert_eq!(
            compiled.sql,
            "SELECT (SELECT p.value_text FROM kg_node_property AS p WHERE p.owner_id = m.v2 AND p.key = $1) AS c0, \
             (SELECT p.value_text FROM kg_node_property AS p WHERE p.owner_id = m.v2 AND p.key = $2) AS c1 \
             FROM (SELECT n0.id AS v0, e1_1.id AS v1, n2.id AS v2 \
             FROM (SELECT n0.id FROM kg_node AS n0 WHERE \
             ((SELECT p.value_text FROM kg_node_property AS p WHERE p.owner_id = n0.id AND p.key = $1) = $3)) AS n0 \
             JOIN kg_edge AS e1_1 ON e1_1.source_id = n0.id AND e1_1.rel_type = $4 \
             JOIN kg_node AS n2 ON n2.id = e1_1.target_id) AS m LIMIT $5"
        );
        assert_eq!(
            compiled.bind_params,
            vec![
                Value::from("id"),
                Value::from("name"),
                Value::from("P:1"),
                Value::from("INTERACTS_WITH"),
                Value::Integer(10),
            ]
        );
        let map: Vec<(&str, &str)> = compiled
            .result_map
            .iter()
            .map(|c| (c.alias.as_str(), c.source.as_str()))
            .collect();
        assert_eq!(map, [("id", "q.id"), ("name", "q.name")]);
    }

    #[test]
    fn test_question_placeholders_follow_text_order() {
        let params = Parameters::new().with("pid", "P:1");
        let compiled = compile_with(
            "MATCH (p:Protein {id: $pid}) RETURN p.id, p.name",
            &params,
            PlaceholderStyle::Question,
        );
        assert!(!compiled.sql.contains('$'));
        assert_eq!(compiled.sql.matches('?').count(), compiled.bind_params.len());
        assert_eq!(
            compiled.bind_params,
            vec![
                Value::from("id"),
                Value::from("name"),
                Value::from("Protein"),
                Value::from("id"),
                Value::from("P:1"),
            ]
        );
    }

    #[test]
    fn test_reversed_and_undirected_hops() {
        let compiled = compile(
            "MATCH (a:Protein)-[:INTERACTS_WITH]->(b:Disease) RETURN a",
            &Parameters::new(),
        );
        // Disease is the seed, the edge is walked target to source
        assert!(compiled.sql.contains("JOIN kg_edge AS e1_1 ON e1_1.target_id = n2.id"));
        assert!(compiled.sql.contains("ON n0.id = e1_1.source_id"));

        let compiled = compile(
            "MATCH (a:Disease)-[:INTERACTS_WITH|ASSOCIATED_WITH]-(b) RETURN b",
            &Parameters::new(),
        );
        assert!(compiled.sql.contains("(e1_1.source_id = n0.id OR e1_1.target_id = n0.id)"));
        assert!(compiled.sql.contains("e1_1.rel_type IN ($2, $3)"));
        assert!(compiled.sql.contains(
            "ON n2.id = CASE WHEN e1_1.source_id = n0.id THEN e1_1.target_id ELSE e1_1.source_id END"
        ));
    }

    #[test]
    fn test_union_branches_and_edge_uniqueness() {
        let compiled = compile(
            "MATCH (a:Disease)-[:ASSOCIATED_WITH]->(b)-[:INTERACTS_WITH*0..2]->(c) RETURN c",
            &Parameters::new(),
        );
        assert_eq!(compiled.sql.matches(" UNION ALL ").count(), 2);
        // Depth 0 joins the endpoints directly
        assert!(compiled.sql.contains("ON n4.id = n2.id"));
        assert!(compiled.sql.contains("AND e3_1.id <> e1_1.id"));
        assert!(compiled.sql.contains("AND e3_2.id <> e1_1.id AND e3_2.id <> e3_1.id"));
        assert!(compiled.sql.contains("ON n4.id = e3_2.target_id"));
    }

    #[test]
    fn test_vector_rank_statement() {
        let params = Parameters::new().with("qvec", vec![0.1f32, 0.2]);
        let compiled = compile(
            "MATCH (a:Protein) RETURN a.id, similarity(a.embedding, $qvec) AS score \
             ORDER BY score DESC LIMIT 5",
            &params,
        );
        assert_eq!(
            compiled.sql,
            "SELECT (SELECT p.value_text FROM kg_node_property AS p WHERE p.owner_id = m.v0 AND p.key = $1) AS c0, \
             m.score AS c1 \
             FROM (SELECT n0.id AS v0, n0.score AS score \
             FROM (SELECT n0.id, (1 - ((SELECT p.value_vector FROM kg_node_property AS p WHERE p.owner_id = n0.id AND p.key = $2) <=> CAST($3 AS vector))) AS score \
             FROM kg_node AS n0 WHERE EXISTS (SELECT 1 FROM kg_node_label AS l WHERE l.node_id = n0.id AND l.label = $4) \
             ORDER BY (SELECT p.value_vector FROM kg_node_property AS p WHERE p.owner_id = n0.id AND p.key = $2) <=> CAST($3 AS vector) \
             LIMIT $5) AS n0) AS m ORDER BY c1 DESC LIMIT $5"
        );
        assert_eq!(compiled.bind_params[4], Value::Integer(5));
    }

    #[test]
    fn test_membership_and_text_operators() {
        let params = Parameters::new().with("ids", Value::List(vec![Value::from("a")]));
        let compiled = compile(
            "MATCH (a:Protein) WHERE a.id IN $ids AND a.name STARTS WITH 'BR' \
             AND NOT a.name ENDS WITH 'X' AND a.id IN [] RETURN a.id",
            &params,
        );
        assert!(compiled.sql.contains("= ANY($"));
        assert!(compiled.sql.contains("starts_with("));
        assert!(compiled.sql.contains("(NOT (right("));
        assert!(compiled.sql.contains("AND FALSE"));
    }

    #[test]
    fn test_empty_static_result() {
        let compiled = compile(
            "MATCH (a:Protein) WHERE 1 = 2 RETURN a.id, a.name AS n",
            &Parameters::new(),
        );
        assert_eq!(compiled.sql, "SELECT NULL AS c0, NULL AS c1 WHERE FALSE");
        assert!(compiled.bind_params.is_empty());
        assert_eq!(compiled.outcome, PlanOutcome::EmptyStaticResult);
        assert_eq!(compiled.result_map[1].alias, "n");
    }

    #[test]
    fn test_deferred_parameters() {
        let params = Parameters::new().defer("tenant");
        let compiled = compile(
            "MATCH (a:Protein) WHERE a.id = $tenant RETURN a.id SKIP $tenant",
            &params,
        );
        assert_eq!(compiled.deferred.len(), 1);
        let slot = compiled.deferred[0].index;
        assert_eq!(compiled.deferred[0].name, "tenant");
        assert_eq!(compiled.bind_params[slot - 1], Value::Null);
        assert!(compiled.sql.ends_with(&format!("OFFSET ${slot}")));
    }

    #[test]
    fn test_repeated_relationship_and_node() {
        let compiled = compile(
            "MATCH (a:Disease)-[r:INTERACTS_WITH]->(b)-[r]->(a) WHERE r.weight > 1 RETURN r.weight",
            &Parameters::new(),
        );
        assert!(compiled.sql.contains("AND e3_1.id = e1_1.id"));
        assert!(compiled.sql.contains("AND n4.id = n0.id"));
        assert!(compiled.sql.contains("FROM kg_edge_property AS p WHERE p.owner_id = e1_1.id"));
        assert!(compiled.sql.contains("FROM kg_edge_property AS p WHERE p.owner_id = m.v1"));
    }
}
