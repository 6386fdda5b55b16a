use thiserror::Error;

/// Errors raised while assembling a candidate graph. These always indicate
/// malformed caller input and are reported before any solve starts.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("graph must contain a root and at least one fragment node")]
    TooSmall,

    #[error("edge {index} references a node out of range")]
    EdgeOutOfRange { index: usize },

    #[error("edge {index} has invalid weight {weight}, weights must be finite and non-negative")]
    InvalidWeight { index: usize, weight: f64 },

    #[error("root node must not have incoming edges")]
    RootHasIncomingEdges,

    #[error("node {node} has no incoming candidate edge")]
    UnreachableNode { node: usize },

    #[error("candidate graph contains a cycle")]
    Cyclic,
}

/// Errors raised at the solver backend boundary.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SolverError {
    #[error("solver backend '{0}' is not available on this host")]
    Unavailable(String),

    #[error("solver called in state {found}, expected {expected}")]
    InvalidState { expected: &'static str, found: &'static str },

    #[error("no solution available, solve did not produce an incumbent")]
    NoSolution,

    #[error("solver backend failure: {0}")]
    Native(String),
}

#[derive(Debug, Error)]
pub enum FragtreeError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Solver(#[from] SolverError),

    /// A violated tree invariant after solving. Always a defect in the
    /// solver or the constraint builder, never a user-facing condition.
    #[error("internal consistency violation: {0}")]
    InternalConsistency(String),
}
