use std::collections::HashMap;

use rand::prelude::*;

use decomp::chemistry::formula::MolecularFormula;
use fragtree::error::SolverError;
use fragtree::graph::model::{FGraph, FGraphBuilder};
use fragtree::ilp::problem::{build_problem, Row};
use fragtree::ilp::registry::{
    default_backend, make_backend, BACKEND_BRANCH_BOUND, BACKEND_GREEDY_INSERTION,
};
use fragtree::ilp::solver::{
    solve_all, SolverBackend, SolverOptions, SolverStatus, TreeSolver,
};

fn carbon(count: i32) -> MolecularFormula {
    MolecularFormula::new(HashMap::from([("C".to_string(), count)]))
}

/// root -> a, root -> b, a -> c, b -> c with distinct colors.
fn diamond() -> FGraph {
    let mut builder = FGraphBuilder::new(carbon(10));
    let a = builder.add_node(carbon(8), 0);
    let b = builder.add_node(carbon(7), 1);
    let c = builder.add_node(carbon(5), 2);
    builder.add_edge(0, a, 5.0);
    builder.add_edge(0, b, 4.0);
    builder.add_edge(a, c, 3.0);
    builder.add_edge(b, c, 2.0);
    builder.build().unwrap()
}

/// Three candidates explaining the same peak; only one may survive.
fn one_peak_three_candidates() -> FGraph {
    let mut builder = FGraphBuilder::new(carbon(10));
    let a = builder.add_node(carbon(8), 7);
    let b = builder.add_node(carbon(7), 7);
    let c = builder.add_node(carbon(6), 7);
    builder.add_edge(0, a, 2.0);
    builder.add_edge(0, b, 9.0);
    builder.add_edge(0, c, 4.0);
    builder.build().unwrap()
}

/// Exhaustive maximum over all feasible 0/1 assignments.
fn brute_force_optimum(graph: &FGraph) -> f64 {
    let problem = build_problem(graph);
    let mut best = f64::NEG_INFINITY;
    for mask in 0u32..(1 << problem.num_variables) {
        let assignment: Vec<bool> =
            (0..problem.num_variables).map(|v| mask & (1 << v) != 0).collect();
        if !problem.rows.iter().all(|row| row.is_satisfied(&assignment)) {
            continue;
        }
        let score: f64 = assignment
            .iter()
            .zip(problem.objective.iter())
            .filter(|(&active, _)| active)
            .map(|(_, &weight)| weight)
            .sum();
        best = best.max(score);
    }
    best
}

/// A layered random DAG small enough for brute force.
fn random_graph(rng: &mut StdRng) -> FGraph {
    let mut builder = FGraphBuilder::new(carbon(20));
    let mut layers: Vec<Vec<usize>> = vec![vec![0]];
    let mut color = 0usize;
    for _ in 0..rng.gen_range(1..=3) {
        let mut layer = Vec::new();
        for _ in 0..rng.gen_range(1..=2) {
            layer.push(builder.add_node(carbon(rng.gen_range(1..=19)), color));
            if rng.gen_bool(0.5) {
                color += 1;
            }
        }
        color += 1;
        layers.push(layer);
    }
    // every node gets an edge from some earlier layer, extras at random
    let mut edges = 0usize;
    for depth in 1..layers.len() {
        for &node in &layers[depth] {
            let above = &layers[rng.gen_range(0..depth)];
            builder.add_edge(*above.choose(rng).unwrap(), node, rng.gen_range(0.0..8.0));
            edges += 1;
            if edges < 10 && rng.gen_bool(0.4) {
                let above = &layers[rng.gen_range(0..depth)];
                builder.add_edge(*above.choose(rng).unwrap(), node, rng.gen_range(0.0..8.0));
                edges += 1;
            }
        }
    }
    builder.build().unwrap()
}

#[test]
fn branch_and_bound_finds_the_known_optimum() {
    let graph = diamond();
    let mut solver = TreeSolver::new(default_backend(), SolverOptions::default());
    let result = solver.solve(&graph).unwrap();
    assert_eq!(result.status, SolverStatus::Optimal);
    // root -> a -> c plus root -> b
    assert_eq!(result.score, 12.0);
    let tree = result.tree.unwrap();
    assert_eq!(tree.len(), 4);
    assert_eq!(tree.total_score(), 12.0);
}

#[test]
fn only_one_candidate_per_color_survives() {
    let graph = one_peak_three_candidates();
    let mut solver = TreeSolver::new(default_backend(), SolverOptions::default());
    let result = solver.solve(&graph).unwrap();
    assert_eq!(result.status, SolverStatus::Optimal);
    let tree = result.tree.unwrap();
    assert_eq!(tree.len(), 2);
    assert_eq!(result.score, 9.0);
    assert_eq!(tree.node(1).color, Some(7));
}

#[test]
fn branch_and_bound_matches_brute_force_on_random_graphs() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..50 {
        let graph = random_graph(&mut rng);
        let expected = brute_force_optimum(&graph);
        let mut solver = TreeSolver::new(
            make_backend(BACKEND_BRANCH_BOUND).unwrap(),
            SolverOptions::default(),
        );
        let result = solver.solve(&graph).unwrap();
        assert_eq!(result.status, SolverStatus::Optimal);
        assert!(
            (result.score - expected).abs() < 1e-6,
            "solver found {}, brute force found {}",
            result.score,
            expected
        );
    }
}

#[test]
fn greedy_trees_are_feasible_and_never_beat_the_exact_score() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let graph = random_graph(&mut rng);
        let exact = brute_force_optimum(&graph);
        let mut solver = TreeSolver::new(
            make_backend(BACKEND_GREEDY_INSERTION).unwrap(),
            SolverOptions::default(),
        );
        // extract_tree re-checks every tree invariant, so an Ok here means
        // the heuristic produced a genuinely feasible tree
        let result = solver.solve(&graph).unwrap();
        assert!(result.tree.is_some());
        assert!(result.score <= exact + 1e-6);
    }
}

#[test]
fn warm_started_solves_reach_the_same_optimum() {
    let graph = diamond();
    // feasible but suboptimal: root -> b -> c
    let mut solver = TreeSolver::new(
        make_backend(BACKEND_BRANCH_BOUND).unwrap(),
        SolverOptions::default(),
    );
    let result = solver.solve_with_start(&graph, Some(&[1, 3])).unwrap();
    assert_eq!(result.status, SolverStatus::Optimal);
    assert_eq!(result.score, 12.0);
}

#[test]
fn solve_all_preserves_input_order() {
    let graphs = vec![diamond(), one_peak_three_candidates(), diamond()];
    let results = solve_all(&graphs, SolverOptions::default(), default_backend, 2);
    assert_eq!(results.len(), 3);
    let scores: Vec<f64> = results
        .into_iter()
        .map(|r| r.unwrap().score)
        .collect();
    assert_eq!(scores, vec![12.0, 9.0, 12.0]);
}

/// Scripted backend for exercising the driver's status handling.
struct ScriptedBackend {
    status: SolverStatus,
    assignment: Vec<bool>,
    score: f64,
    released: bool,
}

impl ScriptedBackend {
    fn new(status: SolverStatus, assignment: Vec<bool>, score: f64) -> Box<Self> {
        Box::new(ScriptedBackend { status, assignment, score, released: false })
    }
}

impl SolverBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn is_exact(&self) -> bool {
        true
    }

    fn initialize_model(&mut self, _num_variables: usize) -> Result<(), SolverError> {
        Ok(())
    }

    fn define_variables(&mut self, _objective: &[f64]) -> Result<(), SolverError> {
        Ok(())
    }

    fn add_row(&mut self, _row: &Row) -> Result<(), SolverError> {
        Ok(())
    }

    fn set_variable_start_values(&mut self, _active_edges: &[usize]) -> Result<(), SolverError> {
        Ok(())
    }

    fn set_time_limit_in_seconds(&mut self, _seconds: f64) {}

    fn set_number_of_cpus(&mut self, _n: usize) {}

    fn solve_mip(&mut self) -> Result<SolverStatus, SolverError> {
        Ok(self.status)
    }

    fn variable_assignment(&self) -> Result<Vec<bool>, SolverError> {
        Ok(self.assignment.clone())
    }

    fn solver_score(&self) -> Result<f64, SolverError> {
        Ok(self.score)
    }

    fn past_build_solution(&mut self) {
        self.released = true;
    }
}

#[test]
fn timed_out_incumbents_become_trees_without_claiming_optimality() {
    let graph = diamond();
    // feasible incumbent root -> b -> c, reported as a timeout
    let backend =
        ScriptedBackend::new(SolverStatus::TimedOut, vec![false, true, false, true], 6.0);
    let mut solver = TreeSolver::new(backend, SolverOptions::default());
    let result = solver.solve(&graph).unwrap();
    assert_eq!(result.status, SolverStatus::TimedOut);
    let tree = result.tree.unwrap();
    assert_eq!(tree.total_score(), 6.0);
}

#[test]
fn infeasible_status_yields_no_tree() {
    let graph = diamond();
    let backend = ScriptedBackend::new(SolverStatus::Infeasible, Vec::new(), 0.0);
    let mut solver = TreeSolver::new(backend, SolverOptions::default());
    let result = solver.solve(&graph).unwrap();
    assert_eq!(result.status, SolverStatus::Infeasible);
    assert!(result.tree.is_none());
    assert_eq!(result.score, f64::NEG_INFINITY);
}

#[test]
fn disagreeing_solver_scores_are_a_defect() {
    let graph = diamond();
    // assignment scores 6.0 but the backend claims 11.0
    let backend =
        ScriptedBackend::new(SolverStatus::Optimal, vec![false, true, false, true], 11.0);
    let mut solver = TreeSolver::new(backend, SolverOptions::default());
    let err = solver.solve(&graph).unwrap_err();
    assert!(matches!(err, fragtree::error::FragtreeError::InternalConsistency(_)));
}

#[test]
fn infeasible_incumbents_from_the_backend_are_a_defect() {
    let graph = diamond();
    // both edges into c active, which the in-degree row forbids
    let backend =
        ScriptedBackend::new(SolverStatus::Optimal, vec![true, true, true, true], 14.0);
    let mut solver = TreeSolver::new(backend, SolverOptions::default());
    let err = solver.solve(&graph).unwrap_err();
    assert!(matches!(err, fragtree::error::FragtreeError::InternalConsistency(_)));
}

/// Backend that panics on contact, proving the single-edge shortcut never
/// touches the solver.
struct UnreachableBackend;

impl SolverBackend for UnreachableBackend {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    fn is_exact(&self) -> bool {
        true
    }

    fn initialize_model(&mut self, _num_variables: usize) -> Result<(), SolverError> {
        panic!("single-edge graphs must not reach the backend");
    }

    fn define_variables(&mut self, _objective: &[f64]) -> Result<(), SolverError> {
        unreachable!()
    }

    fn add_row(&mut self, _row: &Row) -> Result<(), SolverError> {
        unreachable!()
    }

    fn set_variable_start_values(&mut self, _active_edges: &[usize]) -> Result<(), SolverError> {
        unreachable!()
    }

    fn set_time_limit_in_seconds(&mut self, _seconds: f64) {}

    fn set_number_of_cpus(&mut self, _n: usize) {}

    fn solve_mip(&mut self) -> Result<SolverStatus, SolverError> {
        unreachable!()
    }

    fn variable_assignment(&self) -> Result<Vec<bool>, SolverError> {
        unreachable!()
    }

    fn solver_score(&self) -> Result<f64, SolverError> {
        unreachable!()
    }

    fn past_build_solution(&mut self) {}
}

#[test]
fn single_edge_graphs_skip_the_solver() {
    let mut builder = FGraphBuilder::new(carbon(10));
    let a = builder.add_node(carbon(8), 0);
    builder.add_edge(0, a, 3.5);
    let graph = builder.build().unwrap();

    let mut solver = TreeSolver::new(Box::new(UnreachableBackend), SolverOptions::default());
    let result = solver.solve(&graph).unwrap();
    assert_eq!(result.status, SolverStatus::Optimal);
    assert_eq!(result.score, 3.5);
    assert_eq!(result.tree.unwrap().len(), 2);
}
