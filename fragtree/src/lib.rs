// graph module
pub mod graph {
    pub mod model;
    pub mod tree;
}

// ilp module
pub mod ilp {
    pub mod branch_bound;
    pub mod heuristic;
    pub mod problem;
    pub mod registry;
    pub mod solver;
}

pub mod error;
