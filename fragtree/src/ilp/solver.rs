use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};

use crate::error::{FragtreeError, SolverError};
use crate::graph::model::FGraph;
use crate::graph::tree::{extract_tree, FTree};
use crate::ilp::problem::{build_problem, Row};

/// Outcome of a MIP solve. `TimedOut` always carries a feasible incumbent;
/// a backend that hits its limit without one reports `NoSolution` instead.
/// `Infeasible` and `TimedOut` are valid outcomes, not errors - callers
/// branch on the status instead of failing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverStatus {
    Optimal,
    Infeasible,
    TimedOut,
    NoSolution,
}

/// Best-effort solve limits, passed to the backend before solving. A
/// backend that cannot honor a setting continues without it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SolverOptions {
    /// wall clock limit in seconds, 0 disables the limit
    pub time_limit_seconds: f64,
    /// worker threads for backends that solve in parallel, 0 leaves the
    /// backend default untouched
    pub number_of_cpus: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions { time_limit_seconds: 0.0, number_of_cpus: 0 }
    }
}

/// Capability interface every ILP engine implements. Methods follow a fixed
/// lifecycle: `initialize_model`, `define_variables`, `add_row` per
/// constraint, optional warm start and limits, `solve_mip`, then solution
/// readback and `past_build_solution`. Calls out of order are an
/// `InvalidState` error. Instances are single-use and never shared between
/// concurrent solves.
pub trait SolverBackend: Send {
    fn name(&self) -> &'static str;

    /// Whether a returned `Optimal` status is a proven optimum.
    fn is_exact(&self) -> bool;

    fn supports_multithreading(&self) -> bool {
        false
    }

    /// Allocate solver structures sized to the number of edge variables.
    fn initialize_model(&mut self, num_variables: usize) -> Result<(), SolverError>;

    /// Set the `[0, 1]` bounds and the maximization coefficient of every
    /// variable.
    fn define_variables(&mut self, objective: &[f64]) -> Result<(), SolverError>;

    fn add_row(&mut self, row: &Row) -> Result<(), SolverError>;

    /// Warm start hint: edge ids of a known feasible solution.
    fn set_variable_start_values(&mut self, active_edges: &[usize]) -> Result<(), SolverError>;

    fn set_time_limit_in_seconds(&mut self, seconds: f64);

    fn set_number_of_cpus(&mut self, n: usize);

    fn solve_mip(&mut self) -> Result<SolverStatus, SolverError>;

    /// Boolean edge assignment of the incumbent. Backends returning
    /// fractional values threshold them at 0.5 here.
    fn variable_assignment(&self) -> Result<Vec<bool>, SolverError>;

    /// Authoritative objective value of the incumbent.
    fn solver_score(&self) -> Result<f64, SolverError>;

    /// Release solver-native resources. Runs on every exit path of a
    /// solve, including failures.
    fn past_build_solution(&mut self);
}

/// Result of one tree computation. A missing tree with `Infeasible` or
/// `NoSolution` status is a valid outcome.
#[derive(Clone, Debug)]
pub struct TreeResult {
    pub tree: Option<FTree>,
    pub score: f64,
    pub status: SolverStatus,
}

/// Drives one backend instance through the solve lifecycle and converts
/// the raw assignment back into a checked tree.
pub struct TreeSolver {
    backend: Box<dyn SolverBackend>,
    options: SolverOptions,
}

impl TreeSolver {
    pub fn new(backend: Box<dyn SolverBackend>, options: SolverOptions) -> Self {
        TreeSolver { backend, options }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn solve(&mut self, graph: &FGraph) -> Result<TreeResult, FragtreeError> {
        self.solve_with_start(graph, None)
    }

    /// Solves with an optional warm start, a list of edge ids forming a
    /// known feasible tree.
    pub fn solve_with_start(
        &mut self,
        graph: &FGraph,
        warm_start: Option<&[usize]>,
    ) -> Result<TreeResult, FragtreeError> {
        // a single edge has a single non-empty solution
        if graph.num_edges() == 1 {
            let tree = extract_tree(graph, &[true])?;
            let score = tree.total_score();
            return Ok(TreeResult { tree: Some(tree), score, status: SolverStatus::Optimal });
        }

        let problem = build_problem(graph);
        let outcome = (|| -> Result<(SolverStatus, Option<(Vec<bool>, f64)>), SolverError> {
            self.backend.initialize_model(problem.num_variables)?;
            self.backend.define_variables(&problem.objective)?;
            for row in &problem.rows {
                self.backend.add_row(row)?;
            }
            if let Some(edges) = warm_start {
                self.backend.set_variable_start_values(edges)?;
            }
            if self.options.time_limit_seconds > 0.0 {
                self.backend.set_time_limit_in_seconds(self.options.time_limit_seconds);
            }
            if self.options.number_of_cpus > 0 {
                self.backend.set_number_of_cpus(self.options.number_of_cpus);
            }
            let status = self.backend.solve_mip()?;
            let incumbent = match status {
                SolverStatus::Optimal | SolverStatus::TimedOut => Some((
                    self.backend.variable_assignment()?,
                    self.backend.solver_score()?,
                )),
                SolverStatus::Infeasible | SolverStatus::NoSolution => None,
            };
            Ok((status, incumbent))
        })();
        // release native resources no matter how the solve went
        self.backend.past_build_solution();

        let (status, incumbent) = outcome?;
        match incumbent {
            Some((assignment, score)) => {
                let tree = extract_tree(graph, &assignment)?;
                let recomputed = tree.total_score();
                if (recomputed - score).abs() > 1e-4 {
                    return Err(FragtreeError::InternalConsistency(format!(
                        "solver score {} disagrees with tree score {}",
                        score, recomputed
                    )));
                }
                Ok(TreeResult { tree: Some(tree), score, status })
            }
            None => Ok(TreeResult { tree: None, score: f64::NEG_INFINITY, status }),
        }
    }
}

/// Solves many independent graphs in parallel. One backend instance is
/// created per in-flight solve, so backends never need to be thread-safe
/// across solves.
pub fn solve_all<F>(
    graphs: &[FGraph],
    options: SolverOptions,
    make_backend: F,
    num_threads: usize,
) -> Vec<Result<TreeResult, FragtreeError>>
where
    F: Fn() -> Box<dyn SolverBackend> + Sync,
{
    let pool = ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .expect("failed to build tree solver thread pool");
    pool.install(|| {
        graphs
            .par_iter()
            .map(|graph| TreeSolver::new(make_backend(), options).solve(graph))
            .collect()
    })
}
