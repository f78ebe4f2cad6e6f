//! Indented text rendering of logical plans

use super::{LogicalPlan, PlanNode, PlanOutcome};
use std::fmt;

impl fmt::Display for LogicalPlan<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.outcome == PlanOutcome::EmptyStaticResult {
            writeln!(f, "-- predicate is statically false")?;
        }
        write_node(f, &self.root, 0)?;
        for warning in &self.warnings {
            writeln!(f, "-- warning: {warning}")?;
        }
        Ok(())
    }
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_node(f, self, 0)
    }
}

fn join_exprs<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn element_name(element: usize, variable: Option<&str>) -> String {
    match variable {
        Some(name) => name.to_string(),
        None => format!("_{element}"),
    }
}

fn write_node(f: &mut fmt::Formatter<'_>, node: &PlanNode, depth: usize) -> fmt::Result {
    let indent = "  ".repeat(depth);
    match node {
        PlanNode::Scan(scan) => {
            write!(
                f,
                "{indent}Scan {}",
                element_name(scan.element, scan.variable.as_deref())
            )?;
            for label in &scan.labels {
                write!(f, ":{label}")?;
            }
            write!(f, " rows~{}", scan.estimated_rows)?;
            if !scan.filters.is_empty() {
                write!(f, " filter [{}]", join_exprs(&scan.filters))?;
            }
            writeln!(f)?;
        }
        PlanNode::HopExpansion(hop) => {
            write!(
                f,
                "{indent}Expand #{} {} #{} depth={}",
                hop.from,
                hop.direction.arrow(),
                hop.to,
                hop.depth
            )?;
            if !hop.rel_types.is_empty() {
                write!(f, " types={}", hop.rel_types.join("|"))?;
            }
            if !hop.filters.is_empty() {
                write!(f, " filter [{}]", join_exprs(&hop.filters))?;
            }
            if !hop.distinct_from.is_empty() {
                let edges: Vec<String> = hop
                    .distinct_from
                    .iter()
                    .map(|e| format!("#{}.{}", e.relationship, e.step))
                    .collect();
                write!(f, " distinct from {}", edges.join(", "))?;
            }
            writeln!(f)?;
            write_node(f, &hop.base, depth + 1)?;
        }
        PlanNode::Join(join) => {
            write!(f, "{indent}Join #{} = #{}", join.join_keys.0, join.join_keys.1)?;
            if !join.conditions.is_empty() {
                write!(f, " on [{}]", join_exprs(&join.conditions))?;
            }
            writeln!(f)?;
            write_node(f, &join.left, depth + 1)?;
            write_node(f, &join.right, depth + 1)?;
        }
        PlanNode::VectorRank(rank) => {
            write!(f, "{indent}VectorRank {}", rank.rank.similarity)?;
            if let Some(top_k) = &rank.top_k {
                write!(f, " top={top_k}")?;
            }
            writeln!(f)?;
            write_node(f, &rank.input, depth + 1)?;
        }
        PlanNode::Project(project) => {
            let items: Vec<String> = project
                .items
                .iter()
                .map(|item| format!("{} AS {}", item.expr, item.alias))
                .collect();
            let distinct = if project.distinct { " DISTINCT" } else { "" };
            writeln!(f, "{indent}Project{distinct} [{}]", items.join(", "))?;
            write_node(f, &project.input, depth + 1)?;
        }
        PlanNode::Sort(sort) => {
            let keys: Vec<String> = sort
                .keys
                .iter()
                .map(|key| {
                    let order = if key.ascending { "ASC" } else { "DESC" };
                    format!("{} {order}", key.expr)
                })
                .collect();
            writeln!(f, "{indent}Sort [{}]", keys.join(", "))?;
            write_node(f, &sort.input, depth + 1)?;
        }
        PlanNode::Limit(limit) => {
            write!(f, "{indent}Limit")?;
            if let Some(skip) = &limit.skip {
                write!(f, " skip={skip}")?;
            }
            if let Some(count) = &limit.count {
                write!(f, " count={count}")?;
            }
            writeln!(f)?;
            write_node(f, &limit.input, depth + 1)?;
        }
        PlanNode::Union(branches) => {
            writeln!(f, "{indent}UnionAll branches={}", branches.len())?;
            for branch in branches {
                write_node(f, branch, depth + 1)?;
            }
        }
        PlanNode::Empty => writeln!(f, "{indent}Empty")?,
    }
    Ok(())
}
