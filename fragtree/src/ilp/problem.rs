use serde::{Deserialize, Serialize};

use crate::graph::model::FGraph;

/// Which constraint family a row belongs to. Backends may exploit the tag
/// (the greedy backend does); exact backends can ignore it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowKind {
    /// at most one incoming edge per non-root node
    TreeInDegree,
    /// an outgoing edge is only active if the node itself is reached
    Connectivity,
    /// at most one edge into each color class
    Color,
    /// at least one edge must leave the root
    RootMinimumSize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowSense {
    Leq,
    Geq,
}

/// One sparse constraint row over the edge variables.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Row {
    pub kind: RowKind,
    pub indices: Vec<usize>,
    pub coefficients: Vec<f64>,
    pub sense: RowSense,
    pub rhs: f64,
}

impl Row {
    /// Evaluates the row against a complete 0/1 assignment.
    pub fn is_satisfied(&self, assignment: &[bool]) -> bool {
        let lhs: f64 = self
            .indices
            .iter()
            .zip(self.coefficients.iter())
            .filter(|(&index, _)| assignment[index])
            .map(|(_, &coefficient)| coefficient)
            .sum();
        match self.sense {
            RowSense::Leq => lhs <= self.rhs + 1e-9,
            RowSense::Geq => lhs >= self.rhs - 1e-9,
        }
    }
}

/// Solver-agnostic description of the colorful subtree program: one 0/1
/// variable per edge, objective = maximize total edge weight, plus the four
/// row families. Integrality is a backend concern.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IlpProblem {
    pub num_variables: usize,
    pub objective: Vec<f64>,
    pub rows: Vec<Row>,
}

/// Translates a candidate graph into its linear program.
///
/// Row counts are exact: one in-degree row per non-root node, one
/// connectivity row per outgoing edge of every non-root node, one row per
/// color class, and a single root row. Trivially satisfiable rows (single
/// candidate colors, nodes whose constraints cannot bind) are emitted like
/// any other.
pub fn build_problem(graph: &FGraph) -> IlpProblem {
    let objective: Vec<f64> = graph.edges().iter().map(|e| e.weight).collect();
    let mut rows = Vec::new();

    // in-degree rows
    for node in 1..graph.num_nodes() {
        let indices = graph.in_edge_ids(node).to_vec();
        let coefficients = vec![1.0; indices.len()];
        rows.push(Row {
            kind: RowKind::TreeInDegree,
            indices,
            coefficients,
            sense: RowSense::Leq,
            rhs: 1.0,
        });
    }

    // connectivity rows: sum(in(v)) - out_edge >= 0 for every outgoing edge
    for node in 1..graph.num_nodes() {
        let incoming = graph.in_edge_ids(node);
        for out_edge in graph.out_edge_ids(node) {
            let mut indices = incoming.to_vec();
            let mut coefficients = vec![1.0; indices.len()];
            indices.push(out_edge);
            coefficients.push(-1.0);
            rows.push(Row {
                kind: RowKind::Connectivity,
                indices,
                coefficients,
                sense: RowSense::Geq,
                rhs: 0.0,
            });
        }
    }

    // color rows: all edges whose target carries the color
    for &color in graph.colors() {
        let indices: Vec<usize> = graph
            .edges()
            .iter()
            .enumerate()
            .filter(|(_, e)| graph.node(e.target).color == Some(color))
            .map(|(id, _)| id)
            .collect();
        let coefficients = vec![1.0; indices.len()];
        rows.push(Row {
            kind: RowKind::Color,
            indices,
            coefficients,
            sense: RowSense::Leq,
            rhs: 1.0,
        });
    }

    // root row: forbid the empty tree
    let indices: Vec<usize> = graph.out_edge_ids(0).collect();
    let coefficients = vec![1.0; indices.len()];
    rows.push(Row {
        kind: RowKind::RootMinimumSize,
        indices,
        coefficients,
        sense: RowSense::Geq,
        rhs: 1.0,
    });

    IlpProblem { num_variables: graph.num_edges(), objective, rows }
}
