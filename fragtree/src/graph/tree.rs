use decomp::chemistry::formula::MolecularFormula;
use serde::{Deserialize, Serialize};

use crate::error::FragtreeError;
use crate::graph::model::FGraph;

/// A node of the extracted fragmentation tree. `incoming_weight` is the
/// score of the loss edge from the parent, 0 for the root.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TreeNode {
    pub formula: MolecularFormula,
    pub color: Option<usize>,
    pub incoming_weight: f64,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// Rooted fragmentation tree in arena form; node 0 is the root.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FTree {
    nodes: Vec<TreeNode>,
}

impl FTree {
    pub fn root(&self) -> &TreeNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: usize) -> &TreeNode {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Sum of all loss edge weights in the tree.
    pub fn total_score(&self) -> f64 {
        self.nodes.iter().map(|n| n.incoming_weight).sum()
    }
}

/// Reconstructs the rooted tree selected by a boolean edge assignment.
///
/// The walk follows active edges from the graph root only. Any active
/// structure the solver should have ruled out - a second incoming edge, a
/// repeated color, active edges unreachable from the root (which covers
/// cycles) - is a solver or constraint-builder defect and raises
/// [`FragtreeError::InternalConsistency`] instead of being repaired.
pub fn extract_tree(graph: &FGraph, assignment: &[bool]) -> Result<FTree, FragtreeError> {
    if assignment.len() != graph.num_edges() {
        return Err(FragtreeError::InternalConsistency(format!(
            "assignment covers {} edges, graph has {}",
            assignment.len(),
            graph.num_edges()
        )));
    }
    for node in 1..graph.num_nodes() {
        let active_in = graph
            .in_edge_ids(node)
            .iter()
            .filter(|&&e| assignment[e])
            .count();
        if active_in > 1 {
            return Err(FragtreeError::InternalConsistency(format!(
                "node {} has {} active incoming edges",
                node, active_in
            )));
        }
        if active_in == 0 && graph.out_edge_ids(node).any(|e| assignment[e]) {
            return Err(FragtreeError::InternalConsistency(format!(
                "node {} has active outgoing edges but no active incoming edge",
                node
            )));
        }
    }

    let root = graph.root();
    let mut tree = FTree {
        nodes: vec![TreeNode {
            formula: root.formula.clone(),
            color: None,
            incoming_weight: 0.0,
            parent: None,
            children: Vec::new(),
        }],
    };

    let mut used_colors = Vec::new();
    let mut traversed = 0usize;
    // (graph node, tree node)
    let mut stack = vec![(0usize, 0usize)];
    while let Some((graph_node, tree_node)) = stack.pop() {
        for edge_id in graph.out_edge_ids(graph_node) {
            if !assignment[edge_id] {
                continue;
            }
            traversed += 1;
            let edge = graph.edge(edge_id);
            let target = graph.node(edge.target);
            if let Some(color) = target.color {
                if used_colors.contains(&color) {
                    return Err(FragtreeError::InternalConsistency(format!(
                        "color {} appears twice in the solution",
                        color
                    )));
                }
                used_colors.push(color);
            }
            let child = tree.nodes.len();
            tree.nodes.push(TreeNode {
                formula: target.formula.clone(),
                color: target.color,
                incoming_weight: edge.weight,
                parent: Some(tree_node),
                children: Vec::new(),
            });
            tree.nodes[tree_node].children.push(child);
            stack.push((edge.target, child));
        }
    }

    let total_active = assignment.iter().filter(|&&a| a).count();
    if traversed != total_active {
        return Err(FragtreeError::InternalConsistency(format!(
            "{} active edges are not reachable from the root",
            total_active - traversed
        )));
    }
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::FGraphBuilder;
    use std::collections::HashMap;

    fn formula(count: i32) -> MolecularFormula {
        MolecularFormula::new(HashMap::from([("C".to_string(), count)]))
    }

    fn chain() -> FGraph {
        // root -> a -> c, root -> b -> c
        let mut builder = FGraphBuilder::new(formula(10));
        let a = builder.add_node(formula(8), 0);
        let b = builder.add_node(formula(7), 1);
        let c = builder.add_node(formula(5), 2);
        builder.add_edge(0, a, 5.0);
        builder.add_edge(0, b, 4.0);
        builder.add_edge(a, c, 3.0);
        builder.add_edge(b, c, 2.0);
        builder.build().unwrap()
    }

    #[test]
    fn valid_assignment_becomes_a_tree() {
        let graph = chain();
        // root -> a -> c
        let tree = extract_tree(&graph, &[true, false, true, false]).unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.total_score(), 8.0);
        assert_eq!(tree.root().children.len(), 1);
    }

    #[test]
    fn two_active_incoming_edges_are_a_defect() {
        let graph = chain();
        let err = extract_tree(&graph, &[true, true, true, true]).unwrap_err();
        assert!(matches!(err, FragtreeError::InternalConsistency(_)));
    }

    #[test]
    fn dangling_active_edges_are_a_defect() {
        let graph = chain();
        // a -> c active without root -> a
        let err = extract_tree(&graph, &[false, true, true, false]).unwrap_err();
        assert!(matches!(err, FragtreeError::InternalConsistency(_)));
    }

    #[test]
    fn wrong_assignment_length_is_a_defect() {
        let graph = chain();
        let err = extract_tree(&graph, &[true, false]).unwrap_err();
        assert!(matches!(err, FragtreeError::InternalConsistency(_)));
    }

    #[test]
    fn empty_assignment_yields_the_bare_root() {
        let graph = chain();
        let tree = extract_tree(&graph, &[false, false, false, false]).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.total_score(), 0.0);
    }
}
