use std::time::{Duration, Instant};

use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::error::SolverError;
use crate::ilp::problem::{Row, RowSense};
use crate::ilp::solver::{SolverBackend, SolverStatus};

const EPS: f64 = 1e-9;

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

/// Exact 0/1 branch-and-bound over the generic row description.
///
/// Variables are explored in order of descending objective, branching on 1
/// first. Subtrees are cut when the fixed value plus the optimistic gain of
/// the unfixed suffix cannot beat the incumbent, and when a row can no
/// longer be satisfied by any completion. The deadline is checked
/// cooperatively at every search node; running out of time surfaces the
/// best incumbent as `TimedOut`, never a forced abort.
pub struct BranchBoundSolver {
    state: State,
    num_variables: usize,
    objective: Vec<f64>,
    rows: Vec<Row>,
    warm_start: Option<Vec<usize>>,
    time_limit: Option<Duration>,
    incumbent: Option<Vec<f64>>,
    incumbent_score: f64,
}

impl BranchBoundSolver {
    pub fn new() -> Self {
        BranchBoundSolver {
            state: State::Created,
            num_variables: 0,
            objective: Vec::new(),
            rows: Vec::new(),
            warm_start: None,
            time_limit: None,
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
}

impl Default for BranchBoundSolver {
    fn default() -> Self {
        BranchBoundSolver::new()
    }
}

impl SolverBackend for BranchBoundSolver {
    fn name(&self) -> &'static str {
        "branch-and-bound"
    }

    fn is_exact(&self) -> bool {
        true
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

    fn set_time_limit_in_seconds(&mut self, seconds: f64) {
        if seconds > 0.0 {
            self.time_limit = Some(Duration::from_secs_f64(seconds));
        }
    }

    fn set_number_of_cpus(&mut self, n: usize) {
        // the search is single threaded, the setting cannot be honored
        if n > 1 {
            eprintln!("{}: ignoring request for {} cpus, search is single threaded", self.name(), n);
        }
    }

    fn solve_mip(&mut self) -> Result<SolverStatus, SolverError> {
        self.expect_state(State::VariablesDefined)?;
        let deadline = self.time_limit.map(|limit| Instant::now() + limit);
        let mut search = Search::new(&self.objective, &self.rows, deadline);

        // seed the incumbent from the warm start hint when it is feasible
        if let Some(edges) = &self.warm_start {
            let mut assignment = vec![false; self.num_variables];
            for &edge in edges {
                if edge < self.num_variables {
                    assignment[edge] = true;
                }
            }
            if self.rows.iter().all(|row| row.is_satisfied(&assignment)) {
                let score = assignment
                    .iter()
                    .zip(self.objective.iter())
                    .filter(|(&active, _)| active)
                    .map(|(_, &weight)| weight)
                    .sum();
                search.best = Some((assignment, score));
            }
        }

        search.run();
        self.state = State::Solved;
        let timed_out = search.timed_out;
        match search.best.take() {
            Some((assignment, score)) => {
                self.incumbent =
                    Some(assignment.iter().map(|&a| if a { 1.0 } else { 0.0 }).collect());
                self.incumbent_score = score;
                Ok(if timed_out { SolverStatus::TimedOut } else { SolverStatus::Optimal })
            }
            None => Ok(if timed_out { SolverStatus::NoSolution } else { SolverStatus::Infeasible }),
        }
    }

    fn variable_assignment(&self) -> Result<Vec<bool>, SolverError> {
        self.expect_state(State::Solved)?;
        let values = self.incumbent.as_ref().ok_or(SolverError::NoSolution)?;
        Ok(values.iter().map(|&v| v > 0.5).collect())
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

/// One depth-first search over the variable tree with row activity
/// bookkeeping.
struct Search<'a> {
    objective: &'a [f64],
    rows: &'a [Row],
    /// variable ids, most valuable first
    order: Vec<usize>,
    /// suffix_gain[p]: best additional objective reachable from depth p
    suffix_gain: Vec<f64>,
    /// per variable: (row index, coefficient) memberships
    var_rows: Vec<Vec<(usize, f64)>>,
    activity: Vec<f64>,
    pos_remaining: Vec<f64>,
    neg_remaining: Vec<f64>,
    assignment: Vec<bool>,
    best: Option<(Vec<bool>, f64)>,
    deadline: Option<Instant>,
    timed_out: bool,
}

impl<'a> Search<'a> {
    fn new(objective: &'a [f64], rows: &'a [Row], deadline: Option<Instant>) -> Self {
        let n = objective.len();
        let order: Vec<usize> =
            (0..n).sorted_by_key(|&v| OrderedFloat(-objective[v])).collect();
        let mut suffix_gain = vec![0.0; n + 1];
        for p in (0..n).rev() {
            suffix_gain[p] = suffix_gain[p + 1] + objective[order[p]].max(0.0);
        }
        let mut var_rows = vec![Vec::new(); n];
        let mut pos_remaining = vec![0.0; rows.len()];
        let mut neg_remaining = vec![0.0; rows.len()];
        for (r, row) in rows.iter().enumerate() {
            for (&index, &coefficient) in row.indices.iter().zip(row.coefficients.iter()) {
                var_rows[index].push((r, coefficient));
                if coefficient > 0.0 {
                    pos_remaining[r] += coefficient;
                } else {
                    neg_remaining[r] += coefficient;
                }
            }
        }
        Search {
            objective,
            rows,
            order,
            suffix_gain,
            var_rows,
            activity: vec![0.0; rows.len()],
            pos_remaining,
            neg_remaining,
            assignment: vec![false; n],
            best: None,
            deadline,
            timed_out: false,
        }
    }

    /// a row that can no longer be satisfied by any completion cuts the
    /// whole subtree
    fn row_still_satisfiable(&self, r: usize) -> bool {
        match self.rows[r].sense {
            RowSense::Leq => self.activity[r] + self.neg_remaining[r] <= self.rows[r].rhs + EPS,
            RowSense::Geq => self.activity[r] + self.pos_remaining[r] >= self.rows[r].rhs - EPS,
        }
    }

    /// switch `variable` to `choice`, updating row activity and slack;
    /// returns whether every affected row can still be satisfied
    fn apply(&mut self, variable: usize, choice: bool) -> bool {
        self.assignment[variable] = choice;
        for &(r, coefficient) in &self.var_rows[variable] {
            if coefficient > 0.0 {
                self.pos_remaining[r] -= coefficient;
            } else {
                self.neg_remaining[r] -= coefficient;
            }
            if choice {
                self.activity[r] += coefficient;
            }
        }
        self.var_rows[variable]
            .iter()
            .all(|&(r, _)| self.row_still_satisfiable(r))
    }

    fn undo(&mut self, variable: usize, choice: bool) {
        for &(r, coefficient) in &self.var_rows[variable] {
            if coefficient > 0.0 {
                self.pos_remaining[r] += coefficient;
            } else {
                self.neg_remaining[r] += coefficient;
            }
            if choice {
                self.activity[r] -= coefficient;
            }
        }
        self.assignment[variable] = false;
    }

    fn run(&mut self) {
        // rows that start out unsatisfiable make the whole program infeasible
        if !(0..self.rows.len()).all(|r| self.row_still_satisfiable(r)) {
            return;
        }
        let n = self.order.len();
        // explicit backtracking state, one slot per depth: the objective
        // accumulated on entry and how many of the two branches are done.
        // Search depth equals the edge count, which must not translate into
        // call stack depth.
        const CHOICES: [bool; 2] = [true, false];
        let mut value = vec![0.0f64; n + 1];
        let mut tried = vec![0u8; n + 1];
        let mut depth = 0usize;
        let mut entering = true;
        loop {
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    self.timed_out = true;
                    return;
                }
            }
            if entering {
                tried[depth] = 0;
                let bounded = match &self.best {
                    Some((_, best)) => value[depth] + self.suffix_gain[depth] <= best + EPS,
                    None => false,
                };
                if bounded || depth == n {
                    if !bounded {
                        // feasible leaf, the incremental row checks on the
                        // way down proved it
                        self.best = Some((self.assignment.clone(), value[depth]));
                    }
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    let variable = self.order[depth];
                    self.undo(variable, CHOICES[tried[depth] as usize]);
                    tried[depth] += 1;
                    entering = false;
                    continue;
                }
            }
            if tried[depth] >= 2 {
                // both branches explored, hand control back up
                if depth == 0 {
                    return;
                }
                depth -= 1;
                let variable = self.order[depth];
                self.undo(variable, CHOICES[tried[depth] as usize]);
                tried[depth] += 1;
                entering = false;
                continue;
            }
            let variable = self.order[depth];
            let choice = CHOICES[tried[depth] as usize];
            if self.apply(variable, choice) {
                value[depth + 1] =
                    value[depth] + if choice { self.objective[variable] } else { 0.0 };
                depth += 1;
                entering = true;
            } else {
                self.undo(variable, choice);
                tried[depth] += 1;
            }
        }
    }
}
