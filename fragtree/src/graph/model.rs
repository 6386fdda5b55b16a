use decomp::chemistry::formula::MolecularFormula;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// A fragment candidate in the graph. Node 0 is always the root (the
/// precursor), which carries no color; every other node belongs to exactly
/// one color class, the group of candidate formulas explaining the same
/// peak. At most one node per color survives into the final tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FragmentNode {
    pub id: usize,
    pub color: Option<usize>,
    pub formula: MolecularFormula,
}

/// A directed loss edge with a non-negative score.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LossEdge {
    pub source: usize,
    pub target: usize,
    pub weight: f64,
}

/// Read-only candidate graph in arena form: nodes and edges live in flat
/// arrays, edges are stored contiguously per source node, and a permutation
/// sorted by target gives the incoming side. Both adjacency directions are
/// O(1) slices without allocation, which the constraint builder relies on.
#[derive(Clone, Debug)]
pub struct FGraph {
    nodes: Vec<FragmentNode>,
    edges: Vec<LossEdge>,
    out_offsets: Vec<usize>,
    in_edge_ids: Vec<usize>,
    in_offsets: Vec<usize>,
    colors: Vec<usize>,
}

impl FGraph {
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn root(&self) -> &FragmentNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: usize) -> &FragmentNode {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[FragmentNode] {
        &self.nodes
    }

    pub fn edge(&self, id: usize) -> &LossEdge {
        &self.edges[id]
    }

    pub fn edges(&self) -> &[LossEdge] {
        &self.edges
    }

    /// Outgoing edges of a node as a contiguous slice; edge ids for this
    /// slice are `out_edge_ids(node)`.
    pub fn out_edges(&self, node: usize) -> &[LossEdge] {
        &self.edges[self.out_offsets[node]..self.out_offsets[node + 1]]
    }

    pub fn out_edge_ids(&self, node: usize) -> std::ops::Range<usize> {
        self.out_offsets[node]..self.out_offsets[node + 1]
    }

    /// Ids of the edges pointing into a node.
    pub fn in_edge_ids(&self, node: usize) -> &[usize] {
        &self.in_edge_ids[self.in_offsets[node]..self.in_offsets[node + 1]]
    }

    pub fn out_degree(&self, node: usize) -> usize {
        self.out_offsets[node + 1] - self.out_offsets[node]
    }

    pub fn in_degree(&self, node: usize) -> usize {
        self.in_offsets[node + 1] - self.in_offsets[node]
    }

    /// The distinct color classes of the non-root nodes, sorted.
    pub fn colors(&self) -> &[usize] {
        &self.colors
    }
}

/// Assembles and validates an [`FGraph`]. The scorer that fills the builder
/// lives outside this crate; validation here is the last line of defense
/// before constraint generation.
pub struct FGraphBuilder {
    nodes: Vec<FragmentNode>,
    edges: Vec<LossEdge>,
}

impl FGraphBuilder {
    /// Starts a graph whose root (node 0) represents the precursor formula.
    pub fn new(root_formula: MolecularFormula) -> Self {
        FGraphBuilder {
            nodes: vec![FragmentNode { id: 0, color: None, formula: root_formula }],
            edges: Vec::new(),
        }
    }

    /// Adds a fragment candidate and returns its node id.
    pub fn add_node(&mut self, formula: MolecularFormula, color: usize) -> usize {
        let id = self.nodes.len();
        self.nodes.push(FragmentNode { id, color: Some(color), formula });
        id
    }

    pub fn add_edge(&mut self, source: usize, target: usize, weight: f64) {
        self.edges.push(LossEdge { source, target, weight });
    }

    pub fn build(self) -> Result<FGraph, GraphError> {
        let FGraphBuilder { nodes, mut edges } = self;
        let n = nodes.len();
        if n < 2 {
            return Err(GraphError::TooSmall);
        }
        for (index, edge) in edges.iter().enumerate() {
            if edge.source >= n || edge.target >= n {
                return Err(GraphError::EdgeOutOfRange { index });
            }
            if !edge.weight.is_finite() || edge.weight < 0.0 {
                return Err(GraphError::InvalidWeight { index, weight: edge.weight });
            }
            if edge.target == 0 {
                return Err(GraphError::RootHasIncomingEdges);
            }
        }

        // group edges contiguously by source node
        edges.sort_by_key(|e| e.source);
        let mut out_offsets = vec![0usize; n + 1];
        for edge in &edges {
            out_offsets[edge.source + 1] += 1;
        }
        for i in 0..n {
            out_offsets[i + 1] += out_offsets[i];
        }

        // incoming permutation, sorted by target
        let mut in_offsets = vec![0usize; n + 1];
        for edge in &edges {
            in_offsets[edge.target + 1] += 1;
        }
        for i in 0..n {
            in_offsets[i + 1] += in_offsets[i];
        }
        let mut cursor = in_offsets.clone();
        let mut in_edge_ids = vec![0usize; edges.len()];
        for (id, edge) in edges.iter().enumerate() {
            in_edge_ids[cursor[edge.target]] = id;
            cursor[edge.target] += 1;
        }

        // every non-root node needs at least one incoming candidate edge
        for node in nodes.iter().skip(1) {
            if in_offsets[node.id + 1] == in_offsets[node.id] {
                return Err(GraphError::UnreachableNode { node: node.id });
            }
        }

        // Kahn's algorithm, the graph must be acyclic
        let mut remaining: Vec<usize> =
            (0..n).map(|v| in_offsets[v + 1] - in_offsets[v]).collect();
        let mut queue: Vec<usize> =
            (0..n).filter(|&v| remaining[v] == 0).collect();
        let mut seen = 0usize;
        while let Some(v) = queue.pop() {
            seen += 1;
            for edge in &edges[out_offsets[v]..out_offsets[v + 1]] {
                remaining[edge.target] -= 1;
                if remaining[edge.target] == 0 {
                    queue.push(edge.target);
                }
            }
        }
        if seen != n {
            return Err(GraphError::Cyclic);
        }

        let mut colors: Vec<usize> = nodes.iter().filter_map(|node| node.color).collect();
        colors.sort_unstable();
        colors.dedup();

        Ok(FGraph { nodes, edges, out_offsets, in_edge_ids, in_offsets, colors })
    }
}
