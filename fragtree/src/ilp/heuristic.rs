use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::error::SolverError;
use crate::ilp::problem::{Row, RowKind, RowSense};
use crate::ilp::solver::{SolverBackend, SolverStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Created,
    Initialized,
    VariablesDefined,
    Solved,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            State::Created => "Created",
            State::Initialized => "Initialized",
            State::VariablesDefined => "VariablesDefined",
            State::Solved => "Solved",
        }
    }
}

/// Greedy insertion heuristic. Edges are inserted in order of descending
/// weight whenever the insertion keeps every row satisfied, repeated until
/// a full pass adds nothing. Always terminates with a feasible assignment
/// but makes no optimality claim, so `is_exact` is false. Useful as a fast
/// fallback and as a warm start producer for an exact backend.
pub struct GreedyInsertionSolver {
    state: State,
    num_variables: usize,
    objective: Vec<f64>,
    rows: Vec<Row>,
    warm_start: Option<Vec<usize>>,
    incumbent: Option<Vec<bool>>,
    incumbent_score: f64,
}

impl GreedyInsertionSolver {
    pub fn new() -> Self {
        GreedyInsertionSolver {
            state: State::Created,
            num_variables: 0,
            objective: Vec::new(),
            rows: Vec::new(),
            warm_start: None,
            incumbent: None,
            incumbent_score: f64::NEG_INFINITY,
        }
    }

    fn expect_state(&self, expected: State) -> Result<(), SolverError> {
        if self.state != expected {
            return Err(SolverError::InvalidState {
                expected: expected.name(),
                found: self.state.name(),
            });
        }
        Ok(())
    }

    /// Whether switching `variable` on keeps all of its rows satisfied,
    /// given the current activity per row.
    fn insertion_is_feasible(
        &self,
        variable: usize,
        var_rows: &[Vec<(usize, f64)>],
        activity: &[f64],
    ) -> bool {
        var_rows[variable].iter().all(|&(r, coefficient)| {
            let row = &self.rows[r];
            match row.sense {
                // capacity rows must keep their slack
                RowSense::Leq => activity[r] + coefficient <= row.rhs + 1e-9,
                // an out-edge may only join once its source is reached; the
                // other Geq memberships (coefficient +1) only help
                RowSense::Geq => {
                    coefficient > 0.0 || activity[r] + coefficient >= row.rhs - 1e-9
                }
            }
        })
    }
}

impl Default for GreedyInsertionSolver {
    fn default() -> Self {
        GreedyInsertionSolver::new()
    }
}

impl SolverBackend for GreedyInsertionSolver {
    fn name(&self) -> &'static str {
        "greedy-insertion"
    }

    fn is_exact(&self) -> bool {
        false
    }

    fn initialize_model(&mut self, num_variables: usize) -> Result<(), SolverError> {
        self.expect_state(State::Created)?;
        self.num_variables = num_variables;
        self.state = State::Initialized;
        Ok(())
    }

    fn define_variables(&mut self, objective: &[f64]) -> Result<(), SolverError> {
        self.expect_state(State::Initialized)?;
        if objective.len() != self.num_variables {
            return Err(SolverError::Native(format!(
                "objective has {} coefficients, model has {} variables",
                objective.len(),
                self.num_variables
            )));
        }
        self.objective = objective.to_vec();
        self.state = State::VariablesDefined;
        Ok(())
    }

    fn add_row(&mut self, row: &Row) -> Result<(), SolverError> {
        self.expect_state(State::VariablesDefined)?;
        if row.indices.iter().any(|&i| i >= self.num_variables) {
            return Err(SolverError::Native("row references an unknown variable".to_string()));
        }
        self.rows.push(row.clone());
        Ok(())
    }

    fn set_variable_start_values(&mut self, active_edges: &[usize]) -> Result<(), SolverError> {
        self.expect_state(State::VariablesDefined)?;
        self.warm_start = Some(active_edges.to_vec());
        Ok(())
    }

    fn set_time_limit_in_seconds(&mut self, _seconds: f64) {
        // a single insertion sweep finishes immediately, no limit needed
    }

    fn set_number_of_cpus(&mut self, _n: usize) {}

    fn solve_mip(&mut self) -> Result<SolverStatus, SolverError> {
        self.expect_state(State::VariablesDefined)?;
        let mut var_rows = vec![Vec::new(); self.num_variables];
        for (r, row) in self.rows.iter().enumerate() {
            for (&index, &coefficient) in row.indices.iter().zip(row.coefficients.iter()) {
                var_rows[index].push((r, coefficient));
            }
        }

        let mut assignment = vec![false; self.num_variables];
        let mut activity = vec![0.0; self.rows.len()];
        let activate = |variable: usize, assignment: &mut Vec<bool>, activity: &mut Vec<f64>| {
            assignment[variable] = true;
            for &(r, coefficient) in &var_rows[variable] {
                activity[r] += coefficient;
            }
        };

        // start from the hint when it is feasible as a whole
        if let Some(edges) = &self.warm_start {
            let mut seeded = vec![false; self.num_variables];
            for &edge in edges {
                if edge < self.num_variables {
                    seeded[edge] = true;
                }
            }
            if self.rows.iter().all(|row| row.is_satisfied(&seeded)) {
                for (variable, &active) in seeded.iter().enumerate() {
                    if active {
                        activate(variable, &mut assignment, &mut activity);
                    }
                }
            }
        }

        let order: Vec<usize> = (0..self.num_variables)
            .sorted_by_key(|&v| OrderedFloat(-self.objective[v]))
            .collect();
        // insert until a full pass changes nothing; connectivity makes deep
        // edges insertable only after their parent edge got in
        loop {
            let mut inserted = false;
            for &variable in &order {
                if assignment[variable] || self.objective[variable] <= 0.0 {
                    continue;
                }
                if self.insertion_is_feasible(variable, &var_rows, &activity) {
                    activate(variable, &mut assignment, &mut activity);
                    inserted = true;
                }
            }
            if !inserted {
                break;
            }
        }

        // zero-weight root edges are skipped above; take the best one if the
        // root row is still short
        for (r, row) in self.rows.iter().enumerate() {
            if row.kind != RowKind::RootMinimumSize || activity[r] >= row.rhs - 1e-9 {
                continue;
            }
            let candidate = row
                .indices
                .iter()
                .copied()
                .filter(|&v| {
                    !assignment[v] && self.insertion_is_feasible(v, &var_rows, &activity)
                })
                .max_by_key(|&v| OrderedFloat(self.objective[v]));
            match candidate {
                Some(variable) => activate(variable, &mut assignment, &mut activity),
                None => {
                    self.state = State::Solved;
                    return Ok(SolverStatus::Infeasible);
                }
            }
        }

        self.incumbent_score = assignment
            .iter()
            .zip(self.objective.iter())
            .filter(|(&active, _)| active)
            .map(|(_, &weight)| weight)
            .sum();
        self.incumbent = Some(assignment);
        self.state = State::Solved;
        Ok(SolverStatus::Optimal)
    }

    fn variable_assignment(&self) -> Result<Vec<bool>, SolverError> {
        self.expect_state(State::Solved)?;
        self.incumbent.clone().ok_or(SolverError::NoSolution)
    }

    fn solver_score(&self) -> Result<f64, SolverError> {
        self.expect_state(State::Solved)?;
        if self.incumbent.is_none() {
            return Err(SolverError::NoSolution);
        }
        Ok(self.incumbent_score)
    }

    fn past_build_solution(&mut self) {
        self.objective = Vec::new();
        self.rows = Vec::new();
        self.warm_start = None;
        self.incumbent = None;
        self.incumbent_score = f64::NEG_INFINITY;
        self.num_variables = 0;
        self.state = State::Created;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leq(kind: RowKind, indices: Vec<usize>, rhs: f64) -> Row {
        let coefficients = vec![1.0; indices.len()];
        Row { kind, indices, coefficients, sense: RowSense::Leq, rhs }
    }

    #[test]
    fn result_always_satisfies_the_rows() {
        let mut solver = GreedyInsertionSolver::new();
        solver.initialize_model(4).unwrap();
        solver.define_variables(&[4.0, 3.0, 2.0, 1.0]).unwrap();
        let rows = vec![
            leq(RowKind::TreeInDegree, vec![0, 1], 1.0),
            leq(RowKind::Color, vec![1, 2, 3], 1.0),
            Row {
                kind: RowKind::RootMinimumSize,
                indices: vec![0, 1],
                coefficients: vec![1.0, 1.0],
                sense: RowSense::Geq,
                rhs: 1.0,
            },
        ];
        for row in &rows {
            solver.add_row(row).unwrap();
        }
        assert_eq!(solver.solve_mip().unwrap(), SolverStatus::Optimal);
        let assignment = solver.variable_assignment().unwrap();
        assert!(rows.iter().all(|row| row.is_satisfied(&assignment)));
    }

    #[test]
    fn connectivity_gates_deep_edges() {
        // edge 1 depends on edge 0 being active, but edge 0 has weight 0
        let mut solver = GreedyInsertionSolver::new();
        solver.initialize_model(2).unwrap();
        solver.define_variables(&[0.0, 10.0]).unwrap();
        solver
            .add_row(&Row {
                kind: RowKind::Connectivity,
                indices: vec![0, 1],
                coefficients: vec![1.0, -1.0],
                sense: RowSense::Geq,
                rhs: 0.0,
            })
            .unwrap();
        solver
            .add_row(&Row {
                kind: RowKind::RootMinimumSize,
                indices: vec![0],
                coefficients: vec![1.0],
                sense: RowSense::Geq,
                rhs: 1.0,
            })
            .unwrap();
        assert_eq!(solver.solve_mip().unwrap(), SolverStatus::Optimal);
        let assignment = solver.variable_assignment().unwrap();
        // the root edge gets forced in, but edge 1 stays out because the
        // forcing pass runs after the insertion sweep
        assert!(assignment[0]);
    }

    #[test]
    fn hopeless_root_row_reports_infeasible() {
        let mut solver = GreedyInsertionSolver::new();
        solver.initialize_model(1).unwrap();
        solver.define_variables(&[1.0]).unwrap();
        solver.add_row(&leq(RowKind::TreeInDegree, vec![0], 0.0)).unwrap();
        solver
            .add_row(&Row {
                kind: RowKind::RootMinimumSize,
                indices: vec![0],
                coefficients: vec![1.0],
                sense: RowSense::Geq,
                rhs: 1.0,
            })
            .unwrap();
        assert_eq!(solver.solve_mip().unwrap(), SolverStatus::Infeasible);
    }
}
