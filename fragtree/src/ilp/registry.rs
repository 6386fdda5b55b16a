use crate::error::SolverError;
use crate::ilp::branch_bound::BranchBoundSolver;
use crate::ilp::heuristic::GreedyInsertionSolver;
use crate::ilp::solver::SolverBackend;

pub const BACKEND_BRANCH_BOUND: &str = "branch-and-bound";
pub const BACKEND_GREEDY_INSERTION: &str = "greedy-insertion";

/// Known backend names, exact backends first. `default_backend` walks this
/// order.
pub fn backend_names() -> &'static [&'static str] {
    &[BACKEND_BRANCH_BOUND, BACKEND_GREEDY_INSERTION]
}

/// Checks whether a backend can be constructed on this host without
/// building a model. Callers probe once at startup instead of failing per
/// solve.
pub fn check_solver(name: &str) -> Result<(), SolverError> {
    if backend_names().contains(&name) {
        Ok(())
    } else {
        Err(SolverError::Unavailable(name.to_string()))
    }
}

/// Constructs a fresh single-use backend by name.
pub fn make_backend(name: &str) -> Result<Box<dyn SolverBackend>, SolverError> {
    match name {
        BACKEND_BRANCH_BOUND => Ok(Box::new(BranchBoundSolver::new())),
        BACKEND_GREEDY_INSERTION => Ok(Box::new(GreedyInsertionSolver::new())),
        _ => Err(SolverError::Unavailable(name.to_string())),
    }
}

/// First available backend in preference order.
pub fn default_backend() -> Box<dyn SolverBackend> {
    for name in backend_names() {
        if let Ok(backend) = make_backend(name) {
            return backend;
        }
    }
    unreachable!("backend registry must always contain the built-in backends")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_registered_names_construct() {
        for name in backend_names() {
            check_solver(name).unwrap();
            let backend = make_backend(name).unwrap();
            assert_eq!(backend.name(), *name);
        }
    }

    #[test]
    fn unknown_names_are_unavailable() {
        assert!(matches!(check_solver("gurobi"), Err(SolverError::Unavailable(_))));
        assert!(make_backend("cplex").is_err());
    }

    #[test]
    fn default_backend_is_exact() {
        assert!(default_backend().is_exact());
    }
}
