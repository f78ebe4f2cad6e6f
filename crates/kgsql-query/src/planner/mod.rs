//! Query planning
//!
//! Turns a [`BoundQuery`] into a [`LogicalPlan`]:
//! - Label and property pushdown onto node scans
//! - Seed selection and greedy join ordering along the chain
//! - Unrolling of bounded variable-length relationships into union branches
//! - Vector-similarity ranking spliced above the ranked node's scan

mod explain;
mod pushdown;

use crate::ast::BinaryOp;
use crate::binder::{
    BindWarning, BoundElement, BoundExpr, BoundOrder, BoundProjection, BoundQuery, HopRange,
    LimitValue, NodeElement, Parameters, RelationshipElement,
};
use crate::config::DEFAULT_MAX_UNION_BRANCHES;
use kgsql_core::{Direction, PlanError, SchemaCatalog};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

type PlanResult<T> = std::result::Result<T, PlanError>;

/// Whether the plan can produce rows at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanOutcome {
    Rows,
    /// The predicate is false or unknown for every row
    EmptyStaticResult,
}

/// One edge of an unrolled relationship: `step` counts from 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EdgeRef {
    pub relationship: usize,
    pub step: u32,
}

/// Node scan with pushed-down label and property filters
#[derive(Debug, Clone, PartialEq)]
pub struct Scan {
    pub element: usize,
    pub variable: Option<String>,
    pub labels: Vec<String>,
    pub filters: Vec<BoundExpr>,
    pub estimated_rows: u64,
}

/// Traversal of one relationship pattern at a fixed depth
#[derive(Debug, Clone, PartialEq)]
pub struct HopExpansion {
    pub base: Box<PlanNode>,
    pub relationship: usize,
    /// Node element the traversal starts from; already bound by `base`
    pub from: usize,
    /// Node element reached by the traversal
    pub to: usize,
    pub rel_types: Vec<String>,
    /// Direction in traversal order, reversed when the chain is walked leftward
    pub direction: Direction,
    /// Number of edges; zero joins `from` and `to` directly
    pub depth: u32,
    /// Predicates over the relationship alone
    pub filters: Vec<BoundExpr>,
    /// Edges bound earlier in the branch that every new edge must differ from
    pub distinct_from: Vec<EdgeRef>,
}

/// Attaches the node reached by a hop
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub left: Box<PlanNode>,
    /// Scan of the reached node, possibly under a [`VectorRank`]
    pub right: Box<PlanNode>,
    /// (relationship element, node element): the hop's far end meets the node
    pub join_keys: (usize, usize),
    pub direction: Direction,
    /// Predicates over several elements, first evaluable here
    pub conditions: Vec<BoundExpr>,
}

/// A similarity call that ranks one node element against a constant vector
#[derive(Debug, Clone, PartialEq)]
pub struct RankedSimilarity {
    pub element: usize,
    /// Argument reading the node, usually a vector property
    pub vector: BoundExpr,
    /// Variable-free argument
    pub query: BoundExpr,
    /// The call as bound, used to find later references
    pub similarity: BoundExpr,
}

/// Orders a node scan by vector distance and exposes the score
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRank {
    pub input: Box<PlanNode>,
    pub rank: RankedSimilarity,
    pub top_k: Option<LimitValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub input: Box<PlanNode>,
    pub items: Vec<BoundProjection>,
    pub distinct: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub input: Box<PlanNode>,
    pub keys: Vec<BoundOrder>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Limit {
    pub input: Box<PlanNode>,
    pub skip: Option<LimitValue>,
    pub count: Option<LimitValue>,
}

/// Logical plan operators
#[derive(Debug, Clone, PartialEq)]
pub enum PlanNode {
    Scan(Scan),
    HopExpansion(HopExpansion),
    Join(Join),
    VectorRank(VectorRank),
    Project(Project),
    Sort(Sort),
    Limit(Limit),
    /// Branches of unrolled variable-length relationships
    Union(Vec<PlanNode>),
    /// Produces no rows
    Empty,
}

impl PlanNode {
    /// Direct inputs of the operator
    pub fn children(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::Scan(_) | PlanNode::Empty => Vec::new(),
            PlanNode::HopExpansion(hop) => vec![hop.base.as_ref()],
            PlanNode::Join(join) => vec![join.left.as_ref(), join.right.as_ref()],
            PlanNode::VectorRank(rank) => vec![rank.input.as_ref()],
            PlanNode::Project(project) => vec![project.input.as_ref()],
            PlanNode::Sort(sort) => vec![sort.input.as_ref()],
            PlanNode::Limit(limit) => vec![limit.input.as_ref()],
            PlanNode::Union(branches) => branches.iter().collect(),
        }
    }

    /// Visit the operator and its inputs depth-first
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a PlanNode)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }
}

/// Planner output, consumed by the emitter
#[derive(Debug, Clone)]
pub struct LogicalPlan<'c> {
    pub catalog: &'c SchemaCatalog,
    /// Chain elements from binding
    pub elements: Vec<BoundElement>,
    pub root: PlanNode,
    pub outcome: PlanOutcome,
    /// The similarity whose score the match part exposes
    pub rank: Option<RankedSimilarity>,
    pub parameters: Parameters,
    pub warnings: Vec<BindWarning>,
}

impl LogicalPlan<'_> {
    /// Elements whose identities the match part exposes: first occurrences
    /// of nodes and of single-hop relationships
    pub fn exposed_elements(&self) -> Vec<usize> {
        self.elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.repeat_of().is_none())
            .filter(|(_, e)| match e {
                BoundElement::Node(_) => true,
                BoundElement::Relationship(r) => r.hops.is_none(),
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// The projection operator
    pub fn projection(&self) -> Option<&Project> {
        let mut found = None;
        self.root.walk(&mut |node| {
            if let PlanNode::Project(project) = node
                && found.is_none()
            {
                found = Some(project);
            }
        });
        found
    }

    /// The match part: one branch, or the branches of a union
    pub fn branches(&self) -> Vec<&PlanNode> {
        match self.projection().map(|p| p.input.as_ref()) {
            Some(PlanNode::Union(branches)) => branches.iter().collect(),
            Some(PlanNode::Empty) | None => Vec::new(),
            Some(branch) => vec![branch],
        }
    }
}

/// Filters sorted by where they are evaluated
#[derive(Debug, Default)]
struct Placement {
    /// Variable-free conjuncts that could not be folded
    seed: Vec<BoundExpr>,
    nodes: BTreeMap<usize, Vec<BoundExpr>>,
    relationships: BTreeMap<usize, Vec<BoundExpr>>,
    joins: Vec<BoundExpr>,
}

/// Query planner
pub struct QueryPlanner {
    max_union_branches: usize,
}

impl QueryPlanner {
    /// Create a new query planner
    pub fn new() -> Self {
        Self {
            max_union_branches: DEFAULT_MAX_UNION_BRANCHES,
        }
    }

    /// Builder: cap the number of union branches
    pub fn max_union_branches(mut self, limit: usize) -> Self {
        self.max_union_branches = limit;
        self
    }

    /// Create a logical plan from a bound query
    pub fn plan<'c>(&self, bound: BoundQuery<'c>) -> PlanResult<LogicalPlan<'c>> {
        check_hop_ceiling(&bound)?;
        check_directions(&bound)?;
        let unrolled = self.unrolled_relationships(&bound)?;

        let mut conjuncts = bound.inline_filters.clone();
        if let Some(predicate) = &bound.predicate {
            pushdown::split_conjuncts(predicate, &mut conjuncts);
        }

        let mut placement = Placement::default();
        for conjunct in conjuncts {
            let elements = conjunct.elements();
            match elements.len() {
                0 => match pushdown::fold_predicate(&conjunct, &bound.parameters) {
                    Some(Some(true)) => {}
                    Some(_) => {
                        tracing::debug!(predicate = %conjunct, "predicate is statically false");
                        return Ok(empty_plan(bound));
                    }
                    None => placement.seed.push(conjunct),
                },
                1 => {
                    let element = elements.into_iter().next().unwrap_or_default();
                    let target = if bound.elements[element].is_node() {
                        &mut placement.nodes
                    } else {
                        &mut placement.relationships
                    };
                    target.entry(element).or_default().push(conjunct);
                }
                _ => placement.joins.push(conjunct),
            }
        }

        let nodes: Vec<&NodeElement> = bound
            .elements
            .iter()
            .filter_map(BoundElement::as_node)
            .collect();
        let relationships: Vec<&RelationshipElement> = bound
            .elements
            .iter()
            .filter_map(BoundElement::as_relationship)
            .collect();

        let estimates: Vec<u64> = nodes
            .iter()
            .enumerate()
            .map(|(position, node)| {
                let base = bound.catalog.label_estimate(&node.labels);
                let filters = placement
                    .nodes
                    .get(&(2 * position))
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                pushdown::estimate_rows(base, filters)
            })
            .collect();

        let seed = (0..nodes.len())
            .min_by_key(|&position| (estimates[position], position))
            .unwrap_or_default();

        let rank = find_rank(&bound);
        let top_k = rank.as_ref().and_then(|rank| rank_cutoff(&bound, rank));

        let context = BranchContext {
            bound: &bound,
            nodes,
            relationships,
            placement: &placement,
            estimates: &estimates,
            seed,
            rank: rank.as_ref(),
            top_k,
        };

        let mut branches: Vec<PlanNode> = depth_combinations(&unrolled)
            .iter()
            .map(|depths| context.build_branch(depths))
            .collect();

        tracing::debug!(
            seed = 2 * seed,
            branches = branches.len(),
            ranked = rank.is_some(),
            "planned match"
        );

        let matched = if branches.len() == 1 {
            branches.remove(0)
        } else {
            PlanNode::Union(branches)
        };

        let mut root = PlanNode::Project(Project {
            input: Box::new(matched),
            items: bound.projection.clone(),
            distinct: bound.distinct,
        });
        if !bound.order_by.is_empty() {
            root = PlanNode::Sort(Sort {
                input: Box::new(root),
                keys: bound.order_by.clone(),
            });
        }
        if bound.skip.is_some() || bound.limit.is_some() {
            root = PlanNode::Limit(Limit {
                input: Box::new(root),
                skip: bound.skip.clone(),
                count: bound.limit.clone(),
            });
        }

        Ok(LogicalPlan {
            catalog: bound.catalog,
            elements: bound.elements,
            root,
            outcome: PlanOutcome::Rows,
            rank,
            parameters: bound.parameters,
            warnings: bound.warnings,
        })
    }

    /// Variable-length relationships with their ranges, after checking the
    /// number of branches they unroll into
    fn unrolled_relationships(&self, bound: &BoundQuery<'_>) -> PlanResult<Vec<(usize, HopRange)>> {
        let unrolled: Vec<(usize, HopRange)> = bound
            .elements
            .iter()
            .enumerate()
            .filter_map(|(i, e)| Some((i, e.as_relationship()?.hops?)))
            .collect();

        let branches = unrolled
            .iter()
            .fold(1usize, |acc, (_, range)| acc.saturating_mul(range.width()));
        if branches > self.max_union_branches {
            return Err(PlanError::BranchLimitExceeded {
                branches,
                limit: self.max_union_branches,
            });
        }
        Ok(unrolled)
    }
}

impl Default for QueryPlanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Plan a bound query with the default branch limit
pub fn plan(bound: BoundQuery<'_>) -> PlanResult<LogicalPlan<'_>> {
    QueryPlanner::new().plan(bound)
}

fn check_hop_ceiling(bound: &BoundQuery<'_>) -> PlanResult<()> {
    let ceiling = bound.catalog.max_hop_ceiling;
    for rel in bound.elements.iter().filter_map(BoundElement::as_relationship) {
        if let Some(range) = rel.hops
            && range.max > ceiling
        {
            return Err(PlanError::HopCeilingExceeded {
                max: range.max,
                ceiling,
                offset: rel.offset,
            });
        }
    }
    Ok(())
}

/// Every occurrence of a relationship variable must agree on its direction
fn check_directions(bound: &BoundQuery<'_>) -> PlanResult<()> {
    for rel in bound.elements.iter().filter_map(BoundElement::as_relationship) {
        let Some(first) = rel.repeat_of.and_then(|i| bound.elements[i].as_relationship()) else {
            continue;
        };
        let conflicting = matches!(
            (first.direction, rel.direction),
            (Direction::Outgoing, Direction::Incoming) | (Direction::Incoming, Direction::Outgoing)
        );
        if conflicting {
            return Err(PlanError::ConflictingDirectionConstraints {
                name: rel.variable.clone().unwrap_or_default(),
                offset: rel.offset,
            });
        }
    }
    Ok(())
}

/// Depth assignments of the unrolled relationships, in lexicographic order
fn depth_combinations(unrolled: &[(usize, HopRange)]) -> Vec<BTreeMap<usize, u32>> {
    let mut combinations = vec![BTreeMap::new()];
    for (relationship, range) in unrolled {
        combinations = combinations
            .into_iter()
            .flat_map(|prefix| {
                range.depths().map(move |depth| {
                    let mut depths = prefix.clone();
                    depths.insert(*relationship, depth);
                    depths
                })
            })
            .collect();
    }
    combinations
}

/// The first similarity call that ranks a single node element against a
/// constant vector: ORDER BY first, then RETURN, then WHERE
fn find_rank(bound: &BoundQuery<'_>) -> Option<RankedSimilarity> {
    let order_keys = bound.order_by.iter().map(|key| resolve(bound, &key.expr));
    let projected = bound.projection.iter().map(|item| &item.expr);
    let filtered = bound.predicate.iter();

    order_keys
        .chain(projected)
        .chain(filtered)
        .find_map(|expr| rankable_similarity(bound, expr))
}

fn resolve<'a>(bound: &'a BoundQuery<'_>, expr: &'a BoundExpr) -> &'a BoundExpr {
    match expr {
        BoundExpr::ProjectionRef(i) => bound.projection.get(*i).map(|p| &p.expr).unwrap_or(expr),
        other => other,
    }
}

fn rankable_similarity(bound: &BoundQuery<'_>, expr: &BoundExpr) -> Option<RankedSimilarity> {
    match expr {
        BoundExpr::Similarity { left, right } => {
            let node_side = |side: &BoundExpr| {
                let elements = side.elements();
                match elements.len() {
                    1 => elements
                        .into_iter()
                        .next()
                        .filter(|e| bound.elements[*e].is_node()),
                    _ => None,
                }
            };
            let ranked = match (node_side(left), node_side(right)) {
                (Some(element), None) if right.is_variable_free() => {
                    Some((element, left.as_ref(), right.as_ref()))
                }
                (None, Some(element)) if left.is_variable_free() => {
                    Some((element, right.as_ref(), left.as_ref()))
                }
                _ => None,
            };
            ranked.map(|(element, vector, query)| RankedSimilarity {
                element,
                vector: vector.clone(),
                query: query.clone(),
                similarity: expr.clone(),
            })
        }
        BoundExpr::Binary { left, right, .. } => rankable_similarity(bound, left)
            .or_else(|| rankable_similarity(bound, right)),
        BoundExpr::Not(operand) | BoundExpr::IsNull { operand, .. } => {
            rankable_similarity(bound, operand)
        }
        BoundExpr::List(items) => items.iter().find_map(|i| rankable_similarity(bound, i)),
        _ => None,
    }
}

/// The rank may stop after LIMIT (+ SKIP) rows only when it alone decides
/// the outer order: a single-node pattern sorted by descending similarity,
/// with no DISTINCT to merge rows after the cut
fn rank_cutoff(bound: &BoundQuery<'_>, rank: &RankedSimilarity) -> Option<LimitValue> {
    if bound.elements.len() != 1 || bound.distinct {
        return None;
    }
    let first = bound.order_by.first()?;
    if first.ascending || *resolve(bound, &first.expr) != rank.similarity {
        return None;
    }
    match (&bound.limit, &bound.skip) {
        (Some(LimitValue::Literal(count)), None) => Some(LimitValue::Literal(*count)),
        (Some(LimitValue::Literal(count)), Some(LimitValue::Literal(skip))) => {
            Some(LimitValue::Literal(count.saturating_add(*skip)))
        }
        (Some(LimitValue::Parameter(name)), None) => Some(LimitValue::Parameter(name.clone())),
        _ => None,
    }
}

fn empty_plan(bound: BoundQuery<'_>) -> LogicalPlan<'_> {
    LogicalPlan {
        catalog: bound.catalog,
        root: PlanNode::Project(Project {
            input: Box::new(PlanNode::Empty),
            items: bound.projection,
            distinct: bound.distinct,
        }),
        elements: bound.elements,
        outcome: PlanOutcome::EmptyStaticResult,
        rank: None,
        parameters: Parameters::new(),
        warnings: bound.warnings,
    }
}

fn element_ref(bound: &BoundQuery<'_>, element: usize) -> BoundExpr {
    BoundExpr::Element {
        element,
        variable: bound.elements[element]
            .variable()
            .map(str::to_string)
            .unwrap_or_else(|| format!("_{element}")),
    }
}

fn identity_equality(bound: &BoundQuery<'_>, left: usize, right: usize) -> BoundExpr {
    BoundExpr::Binary {
        op: BinaryOp::Equals,
        left: Box::new(element_ref(bound, left)),
        right: Box::new(element_ref(bound, right)),
    }
}

/// Everything one branch of the match part is built from
struct BranchContext<'a, 'c> {
    bound: &'a BoundQuery<'c>,
    nodes: Vec<&'a NodeElement>,
    relationships: Vec<&'a RelationshipElement>,
    placement: &'a Placement,
    estimates: &'a [u64],
    /// Node position the branch starts from
    seed: usize,
    rank: Option<&'a RankedSimilarity>,
    top_k: Option<LimitValue>,
}

impl BranchContext<'_, '_> {
    fn canonical(&self, element: usize) -> usize {
        self.bound.elements[element].repeat_of().unwrap_or(element)
    }

    fn scan(&self, position: usize) -> PlanNode {
        let element = 2 * position;
        let node = self.nodes[position];

        let mut filters = self.placement.nodes.get(&element).cloned().unwrap_or_default();
        if position == self.seed {
            filters.extend(self.placement.seed.iter().cloned());
        }

        let scan = PlanNode::Scan(Scan {
            element,
            variable: node.variable.clone(),
            labels: node.labels.clone(),
            filters,
            estimated_rows: self.estimates[position],
        });

        match self.rank {
            Some(rank) if rank.element == element => PlanNode::VectorRank(VectorRank {
                input: Box::new(scan),
                rank: rank.clone(),
                top_k: self.top_k.clone(),
            }),
            _ => scan,
        }
    }

    /// Start at the seed and extend outward, cheaper neighbour first
    fn build_branch(&self, depths: &BTreeMap<usize, u32>) -> PlanNode {
        let bound = self.bound;
        let node_count = self.nodes.len();

        // Repeated node variables join on identity once both sides are bound
        let mut pending: Vec<BoundExpr> = self.placement.joins.clone();
        for (position, node) in self.nodes.iter().enumerate() {
            if let Some(first) = node.repeat_of {
                pending.push(identity_equality(bound, 2 * position, first));
            }
        }

        let mut available = BTreeSet::from([2 * self.seed]);
        let mut edges: Vec<EdgeRef> = Vec::new();
        let mut current = self.scan(self.seed);

        let mut left = self.seed.checked_sub(1);
        let mut right = (self.seed + 1 < node_count).then_some(self.seed + 1);

        loop {
            let go_right = match (left, right) {
                (None, None) => break,
                (Some(_), None) => false,
                (None, Some(_)) => true,
                (Some(l), Some(r)) => self.estimates[r] <= self.estimates[l],
            };

            let (from, to) = if go_right {
                let to = right.unwrap_or_default();
                right = (to + 1 < node_count).then_some(to + 1);
                (to - 1, to)
            } else {
                let to = left.unwrap_or_default();
                left = to.checked_sub(1);
                (to + 1, to)
            };

            let position = from.min(to);
            let rel = self.relationships[position];
            let rel_element = 2 * position + 1;
            let direction = if go_right {
                rel.direction
            } else {
                rel.direction.reverse()
            };
            let depth = depths.get(&rel_element).copied().unwrap_or(1);

            let mut filters = self
                .placement
                .relationships
                .get(&rel_element)
                .cloned()
                .unwrap_or_default();
            let same_variable = |other: usize| self.canonical(other) == self.canonical(rel_element);
            let earlier = available
                .iter()
                .copied()
                .find(|e| *e != rel_element && same_variable(*e));
            if let Some(earlier) = earlier {
                filters.push(identity_equality(bound, rel_element, earlier));
            }
            let distinct_from: Vec<EdgeRef> = edges
                .iter()
                .filter(|edge| !same_variable(edge.relationship))
                .copied()
                .collect();

            let hop = PlanNode::HopExpansion(HopExpansion {
                base: Box::new(current),
                relationship: rel_element,
                from: 2 * from,
                to: 2 * to,
                rel_types: rel.rel_types.clone(),
                direction,
                depth,
                filters,
                distinct_from,
            });
            edges.extend((1..=depth).map(|step| EdgeRef {
                relationship: rel_element,
                step,
            }));
            available.insert(rel_element);
            available.insert(2 * to);

            let (ready, rest): (Vec<BoundExpr>, Vec<BoundExpr>) = pending
                .into_iter()
                .partition(|condition| condition.elements().is_subset(&available));
            pending = rest;

            current = PlanNode::Join(Join {
                left: Box::new(hop),
                right: Box::new(self.scan(to)),
                join_keys: (rel_element, 2 * to),
                direction,
                conditions: ready,
            });
        }

        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::Binder;
    use crate::parser::parse_query;
    use kgsql_core::{LabelSchema, RelationshipSchema, Value, ValueKind};

    fn catalog(ceiling: u32) -> SchemaCatalog {
        SchemaCatalog::new(ceiling)
            .with_label(
                "Protein",
                LabelSchema::new()
                    .property("id", ValueKind::String)
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

    fn plan_with<'c>(
        catalog: &'c SchemaCatalog,
        text: &str,
        params: &Parameters,
    ) -> PlanResult<LogicalPlan<'c>> {
        let query = parse_query(text).unwrap();
        let bound = Binder::new(catalog, params).bind(&query).unwrap();
        plan(bound)
    }

    fn collect<'a, T>(plan: &'a LogicalPlan<'_>, pick: impl Fn(&'a PlanNode) -> Option<T>) -> Vec<T> {
        let mut out = Vec::new();
        plan.root.walk(&mut |node| out.extend(pick(node)));
        out
    }

    fn scans<'a>(plan: &'a LogicalPlan<'_>) -> Vec<&'a Scan> {
        collect(plan, |node| match node {
            PlanNode::Scan(scan) => Some(scan),
            _ => None,
        })
    }

    fn hops<'a>(plan: &'a LogicalPlan<'_>) -> Vec<&'a HopExpansion> {
        collect(plan, |node| match node {
            PlanNode::HopExpansion(hop) => Some(hop),
            _ => None,
        })
    }

    #[test]
    fn test_variable_length_unrolls_into_union() {
        let catalog = catalog(3);
        let plan = plan_with(
            &catalog,
            "MATCH (a:Protein)-[:INTERACTS_WITH*1..3]->(b:Disease) RETURN a.id, b.id",
            &Parameters::new(),
        )
        .unwrap();

        assert_eq!(plan.outcome, PlanOutcome::Rows);
        assert_eq!(plan.branches().len(), 3);
        let depths: Vec<u32> = hops(&plan).iter().map(|h| h.depth).collect();
        assert_eq!(depths, [1, 2, 3]);
        assert!(hops(&plan).iter().all(|h| h.rel_types == ["INTERACTS_WITH"]));
    }

    #[test]
    fn test_hop_ceiling() {
        let catalog = catalog(2);
        let err = plan_with(
            &catalog,
            "MATCH (a:Protein)-[:INTERACTS_WITH*1..3]->(b:Disease) RETURN a.id, b.id",
            &Parameters::new(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            PlanError::HopCeilingExceeded {
                max: 3,
                ceiling: 2,
                offset: 17
            }
        );
    }

    #[test]
    fn test_branch_limit() {
        let catalog = catalog(5);
        let query = parse_query(
            "MATCH (a)-[:INTERACTS_WITH*0..5]->(b)-[:INTERACTS_WITH*0..5]->(c) RETURN a",
        )
        .unwrap();
        let params = Parameters::new();
        let bound = Binder::new(&catalog, &params).bind(&query).unwrap();
        let err = QueryPlanner::new()
            .max_union_branches(30)
            .plan(bound)
            .unwrap_err();
        assert_eq!(
            err,
            PlanError::BranchLimitExceeded {
                branches: 36,
                limit: 30
            }
        );
    }

    #[test]
    fn test_label_and_property_pushdown() {
        let catalog = catalog(3);
        let plan = plan_with(
            &catalog,
            "MATCH (a:Protein)-[r:INTERACTS_WITH]->(b) \
             WHERE a.id = 'P:1' AND r.weight > 0.5 AND a.id <> b.id RETURN b",
            &Parameters::new(),
        )
        .unwrap();

        let scans = scans(&plan);
        let a = scans.iter().find(|s| s.element == 0).unwrap();
        assert_eq!(a.labels, ["Protein"]);
        assert_eq!(a.filters.len(), 1);
        assert_eq!(a.filters[0].to_string(), "a.id = \"P:1\"");

        let hop = &hops(&plan)[0];
        assert_eq!(hop.filters.len(), 1);
        assert_eq!(hop.filters[0].to_string(), "r.weight > 0.5");

        let joins = collect(&plan, |node| match node {
            PlanNode::Join(join) => Some(join),
            _ => None,
        });
        assert_eq!(joins[0].conditions.len(), 1);
        assert_eq!(joins[0].conditions[0].to_string(), "a.id <> b.id");
    }

    #[test]
    fn test_seed_is_cheapest_node_and_direction_reverses() {
        let catalog = catalog(3);
        let plan = plan_with(
            &catalog,
            "MATCH (a:Protein)-[:INTERACTS_WITH]->(b:Disease) RETURN a, b",
            &Parameters::new(),
        )
        .unwrap();

        // Disease (500) is cheaper than Protein (20000)
        let hop = &hops(&plan)[0];
        assert_eq!(hop.from, 2);
        assert_eq!(hop.to, 0);
        assert_eq!(hop.direction, Direction::Incoming);

        let PlanNode::Scan(seed) = hop.base.as_ref() else {
            panic!("expected the seed scan under the hop");
        };
        assert_eq!(seed.element, 2);
    }

    #[test]
    fn test_selective_filter_moves_the_seed() {
        let catalog = catalog(3);
        let params = Parameters::new().with("pid", "P:1");
        let plan = plan_with(
            &catalog,
            "MATCH (p:Protein {id: $pid})-[:INTERACTS_WITH]->(d:Disease) RETURN d.id",
            &params,
        )
        .unwrap();
        // 20000 * 0.01 = 200 < 500
        let hop = &hops(&plan)[0];
        assert_eq!(hop.from, 0);
        assert_eq!(hop.direction, Direction::Outgoing);
    }

    #[test]
    fn test_static_false_predicate() {
        let catalog = catalog(3);
        let plan = plan_with(
            &catalog,
            "MATCH (a:Protein) WHERE 1 = 2 RETURN a.id",
            &Parameters::new(),
        )
        .unwrap();
        assert_eq!(plan.outcome, PlanOutcome::EmptyStaticResult);
        assert!(plan.branches().is_empty());
        assert!(plan.parameters.values.is_empty());

        let params = Parameters::new().with("flag", Value::Null);
        let plan = plan_with(
            &catalog,
            "MATCH (a:Protein) WHERE $flag RETURN a.id",
            &params,
        )
        .unwrap();
        assert_eq!(plan.outcome, PlanOutcome::EmptyStaticResult);

        let plan = plan_with(
            &catalog,
            "MATCH (a:Protein) WHERE 1 = 1 AND a.id = 'x' RETURN a.id",
            &Parameters::new(),
        )
        .unwrap();
        assert_eq!(plan.outcome, PlanOutcome::Rows);
        assert_eq!(scans(&plan)[0].filters.len(), 1);
    }

    #[test]
    fn test_deferred_constant_stays_on_seed() {
        let catalog = catalog(3);
        let params = Parameters::new().defer("enabled");
        let plan = plan_with(
            &catalog,
            "MATCH (a:Protein)-->(b:Disease) WHERE $enabled = true RETURN a",
            &params,
        )
        .unwrap();
        let seed = scans(&plan).into_iter().find(|s| s.element == 2).unwrap();
        assert_eq!(seed.filters.len(), 1);
    }

    #[test]
    fn test_vector_rank_with_top_k() {
        let catalog = catalog(3);
        let params = Parameters::new().with("qvec", vec![0.1f32, 0.2, 0.3]);
        let plan = plan_with(
            &catalog,
            "MATCH (a:Protein) WHERE similarity(a.embedding, $qvec) > 0.9 \
             RETURN a.id ORDER BY similarity(a.embedding, $qvec) DESC LIMIT 5",
            &params,
        )
        .unwrap();

        let ranks = collect(&plan, |node| match node {
            PlanNode::VectorRank(rank) => Some(rank),
            _ => None,
        });
        assert_eq!(ranks.len(), 1);
        assert_eq!(ranks[0].top_k, Some(LimitValue::Literal(5)));
        let PlanNode::Scan(scan) = ranks[0].input.as_ref() else {
            panic!("rank must sit directly above the scan");
        };
        assert_eq!(scan.labels, ["Protein"]);
        // filter-then-rank
        assert_eq!(scan.filters.len(), 1);
        assert!(matches!(plan.root, PlanNode::Limit(_)));
    }

    #[test]
    fn test_vector_rank_unbounded_in_multi_node_pattern() {
        let catalog = catalog(3);
        let params = Parameters::new().with("qvec", vec![0.1f32, 0.2]);
        let plan = plan_with(
            &catalog,
            "MATCH (a:Protein)-[:INTERACTS_WITH]->(b:Disease) \
             RETURN b.id, similarity(a.embedding, $qvec) AS score ORDER BY score DESC LIMIT 5",
            &params,
        )
        .unwrap();
        let ranks = collect(&plan, |node| match node {
            PlanNode::VectorRank(rank) => Some(rank),
            _ => None,
        });
        assert_eq!(ranks.len(), 1);
        assert_eq!(ranks[0].rank.element, 0);
        assert_eq!(ranks[0].top_k, None);
    }

    #[test]
    fn test_ascending_similarity_is_not_cut_off() {
        let catalog = catalog(3);
        let params = Parameters::new().with("qvec", vec![0.1f32, 0.2]);
        let plan = plan_with(
            &catalog,
            "MATCH (a:Protein) RETURN a.id ORDER BY similarity(a.embedding, $qvec) LIMIT 5",
            &params,
        )
        .unwrap();
        assert!(plan.rank.is_some());
        let ranks = collect(&plan, |node| match node {
            PlanNode::VectorRank(rank) => Some(rank.top_k.clone()),
            _ => None,
        });
        assert_eq!(ranks, [None]);
    }

    #[test]
    fn test_repeated_node_joins_on_identity() {
        let catalog = catalog(3);
        let plan = plan_with(
            &catalog,
            "MATCH (a:Protein)-[:INTERACTS_WITH]->(b:Disease)-[:ASSOCIATED_WITH]->(a) RETURN b",
            &Parameters::new(),
        )
        .unwrap();
        let conditions: Vec<String> = collect(&plan, |node| match node {
            PlanNode::Join(join) => Some(join.conditions.iter().map(|c| c.to_string()).collect::<Vec<_>>()),
            _ => None,
        })
        .concat();
        assert_eq!(conditions, ["a = a"]);
    }

    #[test]
    fn test_edges_are_distinct_within_a_branch() {
        let catalog = catalog(3);
        let plan = plan_with(
            &catalog,
            "MATCH (a:Disease)-[:INTERACTS_WITH]->(b)-[:INTERACTS_WITH*2]->(c) RETURN c",
            &Parameters::new(),
        )
        .unwrap();
        let hops = hops(&plan);
        assert_eq!(hops.len(), 2);
        // The second hop must avoid the edge of the first
        let later = hops.iter().find(|h| h.relationship == 3).unwrap();
        assert_eq!(
            later.distinct_from,
            [EdgeRef {
                relationship: 1,
                step: 1
            }]
        );
        assert_eq!(later.depth, 2);
    }

    #[test]
    fn test_conflicting_relationship_directions() {
        let catalog = catalog(3);
        let err = plan_with(
            &catalog,
            "MATCH (a)-[r:INTERACTS_WITH]->(b)<-[r]-(c) RETURN a",
            &Parameters::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PlanError::ConflictingDirectionConstraints { ref name, .. } if name == "r"
        ));

        let plan = plan_with(
            &catalog,
            "MATCH (a)-[r:INTERACTS_WITH]->(b)-[r]->(c) RETURN a",
            &Parameters::new(),
        )
        .unwrap();
        let later = hops(&plan).into_iter().find(|h| h.relationship == 3).unwrap();
        assert!(later.distinct_from.is_empty());
        assert_eq!(later.filters[0].to_string(), "r = r");
    }
}
