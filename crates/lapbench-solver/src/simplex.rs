use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::engine::{Engine, EngineError, EngineModel, EngineStatus};
use crate::problem::{ConstraintBound, Direction, Domain};

/// Consecutive degenerate pivots tolerated before switching to Bland's rule
const BLAND_AFTER: usize = 50;
/// Distance from the nearest integer below which a value counts as integral
const INTEGRALITY_TOLERANCE: f64 = 1e-6;

/// Dense two-phase simplex with depth-first branch-and-bound for integer variables
#[derive(Debug, Clone, Copy)]
pub struct SimplexEngine {
    settings: Settings,
}

#[derive(Debug, Clone, Copy)]
struct Settings {
    /// Pivot budget for a whole solve, across all branch-and-bound nodes
    max_iterations: usize,
    /// Branch-and-bound node budget
    max_nodes: usize,
    /// Tolerance for floating point comparisons
    tolerance: f64,
}

impl Default for SimplexEngine {
    fn default() -> Self {
        Self {
            settings: Settings {
                max_iterations: 1_000_000,
                max_nodes: 10_000,
                tolerance: 1e-9,
            },
        }
    }
}

impl SimplexEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.settings.max_iterations = max;
        self
    }

    pub fn with_max_nodes(mut self, max: usize) -> Self {
        self.settings.max_nodes = max;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.settings.tolerance = tol;
        self
    }
}

impl Engine for SimplexEngine {
    type Model = SimplexModel;

    fn name(&self) -> &'static str {
        "simplex"
    }

    fn create_model(&self, num_variables: usize, num_constraints: usize) -> Result<SimplexModel, EngineError> {
        if num_variables == 0 {
            return Err(EngineError::Construction("a model needs at least one variable".to_string()));
        }
        let mut rows = Vec::new();
        rows.try_reserve(num_constraints)
            .map_err(|e| EngineError::Construction(e.to_string()))?;

        Ok(SimplexModel {
            settings: self.settings,
            lower: vec![0.0; num_variables],
            upper: vec![f64::INFINITY; num_variables],
            domains: vec![Domain::Continuous; num_variables],
            rows,
            objective: vec![0.0; num_variables],
            minimize: true,
            time_limit: None,
            solution: None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowOp {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

#[derive(Debug, Clone)]
struct Row {
    coefficients: Vec<(usize, f64)>,
    op: RowOp,
    rhs: f64,
}

/// Model handle of [`SimplexEngine`]
#[derive(Debug)]
pub struct SimplexModel {
    settings: Settings,
    lower: Vec<f64>,
    upper: Vec<f64>,
    domains: Vec<Domain>,
    rows: Vec<Row>,
    objective: Vec<f64>,
    minimize: bool,
    time_limit: Option<Duration>,
    /// Best solution of the last solve and its objective
    solution: Option<(Vec<f64>, f64)>,
}

impl SimplexModel {
    fn check_index(&self, index: usize) -> Result<(), EngineError> {
        if index >= self.lower.len() {
            return Err(EngineError::IndexOutOfRange {
                index,
                len: self.lower.len(),
            });
        }
        Ok(())
    }

    fn push_row(&mut self, coefficients: &[(usize, f64)], op: RowOp, rhs: f64) -> Result<(), EngineError> {
        self.rows
            .try_reserve(1)
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        self.rows.push(Row {
            coefficients: coefficients.to_vec(),
            op,
            rhs,
        });
        Ok(())
    }

    fn objective_of(&self, values: &[f64]) -> f64 {
        self.objective.iter().zip(values).map(|(c, v)| c * v).sum()
    }

    fn first_fractional(&self, values: &[f64]) -> Option<usize> {
        values
            .iter()
            .zip(&self.domains)
            .position(|(v, d)| d.is_integral() && (v - v.round()).abs() > INTEGRALITY_TOLERANCE)
    }

    fn branch_and_bound(&mut self, deadline: Option<Instant>) -> Result<EngineStatus, EngineError> {
        let tol = self.settings.tolerance;
        let sense = if self.minimize { 1.0 } else { -1.0 };

        let mut stack = vec![(self.lower.clone(), self.upper.clone())];
        let mut incumbent: Option<(Vec<f64>, f64)> = None;
        let mut stopped = None;
        let mut nodes = 0;
        let mut iterations = 0;

        while let Some((lower, upper)) = stack.pop() {
            if nodes >= self.settings.max_nodes {
                stopped = Some(EngineStatus::IterationLimit);
                break;
            }
            nodes += 1;

            let values = match self.solve_relaxation(&lower, &upper, deadline, &mut iterations)? {
                LpOutcome::Optimal(values) => values,
                LpOutcome::Infeasible => continue,
                LpOutcome::Unbounded => return Ok(EngineStatus::Unbounded),
                LpOutcome::Stopped(status) => {
                    stopped = Some(status);
                    break;
                }
            };

            let objective = self.objective_of(&values);
            if let Some((_, best)) = &incumbent {
                // Relaxation cannot beat the incumbent
                if sense * objective >= sense * best - tol * (1.0 + best.abs()) {
                    continue;
                }
            }

            match self.first_fractional(&values) {
                None => {
                    let values: Vec<f64> = values
                        .iter()
                        .zip(&self.domains)
                        .map(|(&v, d)| if d.is_integral() { v.round() } else { v })
                        .collect();
                    let objective = self.objective_of(&values);
                    trace!("node {}: new incumbent {}", nodes, objective);
                    incumbent = Some((values, objective));
                }
                Some(j) => {
                    let v = values[j];
                    let mut down_upper = upper.clone();
                    down_upper[j] = v.floor();
                    let mut up_lower = lower.clone();
                    up_lower[j] = v.ceil();

                    let down = (lower, down_upper);
                    let up = (up_lower, upper);
                    // The nearer side is explored first
                    if v - v.floor() < 0.5 {
                        stack.push(up);
                        stack.push(down);
                    } else {
                        stack.push(down);
                        stack.push(up);
                    }
                }
            }
        }

        debug!("simplex explored {} nodes in {} pivots", nodes, iterations);

        let status = match (stopped, &incumbent) {
            (Some(status), _) => status,
            (None, Some(_)) => EngineStatus::Optimal,
            (None, None) => EngineStatus::Infeasible,
        };
        self.solution = incumbent;
        Ok(status)
    }

    /// Solves the LP relaxation under the given variable bounds
    fn solve_relaxation(
        &self,
        lower: &[f64],
        upper: &[f64],
        deadline: Option<Instant>,
        iterations: &mut usize,
    ) -> Result<LpOutcome, EngineError> {
        let tol = self.settings.tolerance;
        if lower.iter().zip(upper).any(|(l, u)| l > &(u + tol)) {
            return Ok(LpOutcome::Infeasible);
        }

        let mut tableau = self.build_tableau(lower, upper)?;

        if tableau.n_artificial > 0 {
            match self.phase1(&mut tableau, deadline, iterations) {
                SimplexResult::Optimal => {}
                SimplexResult::Stopped(status) => return Ok(LpOutcome::Stopped(status)),
                SimplexResult::Unbounded | SimplexResult::Infeasible => return Ok(LpOutcome::Infeasible),
            }
        }

        let exclude_from = tableau.n_vars + tableau.n_slack;
        let cost_tolerance = tol * self.objective.iter().fold(1.0_f64, |m, c| m.max(c.abs()));
        match self.iterate(&mut tableau, exclude_from, cost_tolerance, deadline, iterations) {
            SimplexResult::Optimal => {}
            SimplexResult::Unbounded => return Ok(LpOutcome::Unbounded),
            SimplexResult::Infeasible => return Ok(LpOutcome::Infeasible),
            SimplexResult::Stopped(status) => return Ok(LpOutcome::Stopped(status)),
        }

        let rhs_col = tableau.data[0].len() - 1;
        let mut values = lower.to_vec();
        for (i, &basic) in tableau.basic_vars.iter().enumerate() {
            if basic < tableau.n_vars {
                values[basic] += tableau.data[i][rhs_col];
            }
        }
        trace!("relaxation solved after {} pivots total", iterations);
        Ok(LpOutcome::Optimal(values))
    }

    /// Upper bounds that an equality row with non-negative terms already enforces
    fn implied_upper_bounds(&self, lower: &[f64], upper: &[f64]) -> Vec<bool> {
        let tol = self.settings.tolerance;
        let mut implied = vec![false; lower.len()];

        for row in self.rows.iter().filter(|r| r.op == RowOp::Eq) {
            let nonnegative = row
                .coefficients
                .iter()
                .all(|&(j, a)| a >= 0.0 && lower[j] >= 0.0);
            if !nonnegative {
                continue;
            }
            let floor: f64 = row.coefficients.iter().map(|&(j, a)| a * lower[j]).sum();
            for &(j, a) in &row.coefficients {
                if a > tol && (row.rhs - (floor - a * lower[j])) / a <= upper[j] + tol {
                    implied[j] = true;
                }
            }
        }
        implied
    }

    fn build_tableau(&self, lower: &[f64], upper: &[f64]) -> Result<Tableau, EngineError> {
        let n_vars = lower.len();
        let implied = self.implied_upper_bounds(lower, upper);

        // Substituting x = lower + y leaves y >= 0; remaining upper bounds become rows
        let mut rows: Vec<Row> = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let shift: f64 = row.coefficients.iter().map(|&(j, a)| a * lower[j]).sum();
            let mut row = Row {
                coefficients: row.coefficients.clone(),
                op: row.op,
                rhs: row.rhs - shift,
            };
            if row.rhs < 0.0 {
                row.rhs = -row.rhs;
                row.coefficients.iter_mut().for_each(|(_, a)| *a = -*a);
                row.op = match row.op {
                    RowOp::Le => RowOp::Ge,
                    RowOp::Ge => RowOp::Le,
                    RowOp::Eq => RowOp::Eq,
                };
            }
            rows.push(row);
        }
        for j in 0..n_vars {
            if upper[j].is_finite() && !implied[j] {
                rows.push(Row {
                    coefficients: vec![(j, 1.0)],
                    op: RowOp::Le,
                    rhs: upper[j] - lower[j],
                });
            }
        }

        let n_constraints = rows.len();
        let mut n_slack = 0;
        let mut n_artificial = 0;
        for r in &rows {
            match r.op {
                RowOp::Le => n_slack += 1,
                RowOp::Ge => {
                    n_slack += 1; // surplus
                    n_artificial += 1;
                }
                RowOp::Eq => n_artificial += 1,
            }
        }

        let total_cols = n_vars + n_slack + n_artificial + 1; // +1 for RHS
        let total_rows = n_constraints + 1; // +1 for objective

        let mut data = Vec::new();
        data.try_reserve_exact(total_rows)
            .map_err(|e| EngineError::Construction(e.to_string()))?;
        for _ in 0..total_rows {
            let mut line = Vec::new();
            line.try_reserve_exact(total_cols)
                .map_err(|e| EngineError::Construction(e.to_string()))?;
            line.resize(total_cols, 0.0);
            data.push(line);
        }

        let mut tableau = Tableau {
            data,
            basic_vars: vec![0; n_constraints],
            n_vars,
            n_slack,
            n_artificial,
        };

        let mut slack_idx = n_vars;
        let mut artificial_idx = n_vars + n_slack;
        for (i, r) in rows.iter().enumerate() {
            for &(j, a) in &r.coefficients {
                tableau.data[i][j] += a;
            }
            tableau.data[i][total_cols - 1] = r.rhs;

            match r.op {
                RowOp::Le => {
                    tableau.data[i][slack_idx] = 1.0;
                    tableau.basic_vars[i] = slack_idx;
                    slack_idx += 1;
                }
                RowOp::Ge => {
                    tableau.data[i][slack_idx] = -1.0; // surplus
                    slack_idx += 1;
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                }
                RowOp::Eq => {
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                }
            }
        }

        // Simplex maximizes, so for minimization we negate the coefficients
        let obj_row = n_constraints;
        for (j, &coef) in self.objective.iter().enumerate() {
            tableau.data[obj_row][j] = if self.minimize { -coef } else { coef };
        }

        Ok(tableau)
    }

    fn phase1(&self, tableau: &mut Tableau, deadline: Option<Instant>, iterations: &mut usize) -> SimplexResult {
        let tol = self.settings.tolerance;
        let n_constraints = tableau.data.len() - 1;
        let n_cols = tableau.data[0].len();
        let art_start = tableau.n_vars + tableau.n_slack;

        let orig_obj = std::mem::replace(&mut tableau.data[n_constraints], vec![0.0; n_cols]);

        // Maximize -sum(artificials), made consistent with the artificial basis
        for j in art_start..(art_start + tableau.n_artificial) {
            tableau.data[n_constraints][j] = -1.0;
        }
        for i in 0..n_constraints {
            if tableau.basic_vars[i] >= art_start {
                let (rows, obj) = tableau.data.split_at_mut(n_constraints);
                for (o, x) in obj[0].iter_mut().zip(&rows[i]) {
                    *o += x;
                }
            }
        }

        match self.iterate(tableau, n_cols - 1, tol, deadline, iterations) {
            SimplexResult::Optimal => {}
            // Unbounded in phase 1 means infeasible original
            SimplexResult::Unbounded | SimplexResult::Infeasible => return SimplexResult::Infeasible,
            SimplexResult::Stopped(status) => return SimplexResult::Stopped(status),
        }

        let rhs_col = n_cols - 1;
        for i in 0..n_constraints {
            if tableau.basic_vars[i] >= art_start && tableau.data[i][rhs_col].abs() > tol * (1.0 + n_constraints as f64) {
                return SimplexResult::Infeasible;
            }
        }

        // Pivot zero-valued artificials out of the basis; rows where that fails are redundant
        for i in 0..n_constraints {
            if tableau.basic_vars[i] >= art_start {
                if let Some(j) = (0..art_start).find(|&j| tableau.data[i][j].abs() > 1e-7) {
                    self.pivot(tableau, i, j);
                }
            }
        }

        // Restore original objective and adjust for basic variables
        tableau.data[n_constraints] = orig_obj;
        for i in 0..n_constraints {
            let basic = tableau.basic_vars[i];
            let ratio = tableau.data[n_constraints][basic];
            if ratio != 0.0 {
                let (rows, obj) = tableau.data.split_at_mut(n_constraints);
                for (o, x) in obj[0].iter_mut().zip(&rows[i]) {
                    *o -= ratio * x;
                }
            }
        }

        SimplexResult::Optimal
    }

    /// Pivots until no column below `limit` improves the objective row
    fn iterate(
        &self,
        tableau: &mut Tableau,
        limit: usize,
        cost_tolerance: f64,
        deadline: Option<Instant>,
        iterations: &mut usize,
    ) -> SimplexResult {
        let rhs_col = tableau.data[0].len() - 1;
        let mut degenerate_run = 0;

        loop {
            if *iterations >= self.settings.max_iterations {
                return SimplexResult::Stopped(EngineStatus::IterationLimit);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return SimplexResult::Stopped(EngineStatus::TimeLimit);
            }

            let bland = degenerate_run > BLAND_AFTER;
            let Some(pivot_col) = self.find_pivot_column(tableau, limit, cost_tolerance, bland) else {
                return SimplexResult::Optimal;
            };
            let Some(pivot_row) = self.find_pivot_row(tableau, pivot_col, bland) else {
                return SimplexResult::Unbounded;
            };

            if tableau.data[pivot_row][rhs_col] <= self.settings.tolerance {
                degenerate_run += 1;
            } else {
                degenerate_run = 0;
            }
            self.pivot(tableau, pivot_row, pivot_col);
            *iterations += 1;
        }
    }

    fn find_pivot_column(&self, tableau: &Tableau, limit: usize, cost_tolerance: f64, bland: bool) -> Option<usize> {
        let obj = &tableau.data[tableau.data.len() - 1];

        if bland {
            return (0..limit).find(|&j| obj[j] > cost_tolerance);
        }

        // Look for the most positive reduced cost (can improve objective)
        let mut max_val = cost_tolerance;
        let mut max_col = None;
        for (j, &v) in obj[..limit].iter().enumerate() {
            if v > max_val {
                max_val = v;
                max_col = Some(j);
            }
        }
        max_col
    }

    fn find_pivot_row(&self, tableau: &Tableau, col: usize, bland: bool) -> Option<usize> {
        let tol = self.settings.tolerance;
        let n_constraints = tableau.data.len() - 1;
        let rhs_col = tableau.data[0].len() - 1;

        let mut min_ratio = f64::INFINITY;
        let mut min_row: Option<usize> = None;

        for i in 0..n_constraints {
            let val = tableau.data[i][col];
            if val <= tol {
                continue;
            }
            let ratio = tableau.data[i][rhs_col].max(0.0) / val;
            let better = match min_row {
                None => true,
                Some(_) if ratio < min_ratio - tol => true,
                Some(r) if (ratio - min_ratio).abs() <= tol => {
                    if bland {
                        tableau.basic_vars[i] < tableau.basic_vars[r]
                    } else {
                        val > tableau.data[r][col]
                    }
                }
                Some(_) => false,
            };
            if better {
                min_ratio = ratio;
                min_row = Some(i);
            }
        }

        min_row
    }

    fn pivot(&self, tableau: &mut Tableau, row: usize, col: usize) {
        tableau.basic_vars[row] = col;

        let pivot_val = tableau.data[row][col];
        tableau.data[row].iter_mut().for_each(|x| *x /= pivot_val);
        let pivot_row = tableau.data[row].clone();

        for (i, line) in tableau.data.iter_mut().enumerate() {
            if i == row {
                continue;
            }
            let factor = line[col];
            if factor != 0.0 {
                for (x, p) in line.iter_mut().zip(&pivot_row) {
                    *x -= factor * p;
                }
            }
        }
    }
}

impl EngineModel for SimplexModel {
    fn set_variable_bounds(&mut self, index: usize, lower: f64, upper: f64, domain: Domain) -> Result<(), EngineError> {
        self.check_index(index)?;
        let invalid = EngineError::InvalidBounds { index, lower, upper };
        if lower.is_nan() || upper.is_nan() {
            return Err(invalid);
        }
        if !lower.is_finite() {
            return Err(EngineError::Unsupported(format!("variable {} has no finite lower bound", index)));
        }

        let (lo, hi) = match domain {
            Domain::Continuous => (lower, upper),
            Domain::Integer => (lower.ceil(), upper.floor()),
            Domain::Binary => (lower.max(0.0).ceil(), upper.min(1.0).floor()),
        };
        if lo > hi {
            return Err(invalid);
        }

        self.lower[index] = lo;
        self.upper[index] = hi;
        self.domains[index] = domain;
        Ok(())
    }

    fn add_constraint(&mut self, coefficients: &[(usize, f64)], bound: ConstraintBound) -> Result<(), EngineError> {
        for &(j, _) in coefficients {
            self.check_index(j)?;
        }

        let (lower, upper) = bound.interval();
        if lower.is_nan() || upper.is_nan() || lower == f64::INFINITY || upper == f64::NEG_INFINITY {
            return Err(EngineError::Unsupported(format!("constraint bound {:?}", bound)));
        }

        if lower == upper {
            return self.push_row(coefficients, RowOp::Eq, lower);
        }
        if lower.is_finite() {
            self.push_row(coefficients, RowOp::Ge, lower)?;
        }
        if upper.is_finite() {
            self.push_row(coefficients, RowOp::Le, upper)?;
        }
        Ok(())
    }

    fn set_objective(&mut self, coefficients: &[(usize, f64)], direction: Direction) -> Result<(), EngineError> {
        for &(j, _) in coefficients {
            self.check_index(j)?;
        }
        self.objective.iter_mut().for_each(|c| *c = 0.0);
        for &(j, coef) in coefficients {
            self.objective[j] += coef;
        }
        self.minimize = direction == Direction::Minimize;
        Ok(())
    }

    fn set_time_limit(&mut self, limit: Option<Duration>) {
        self.time_limit = limit;
    }

    fn solve(&mut self) -> Result<EngineStatus, EngineError> {
        self.solution = None;
        let deadline = self.time_limit.and_then(|l| Instant::now().checked_add(l));
        debug!(
            "simplex solving {} variables, {} rows",
            self.lower.len(),
            self.rows.len()
        );
        self.branch_and_bound(deadline)
    }

    fn objective_value(&self) -> Option<f64> {
        self.solution.as_ref().map(|(_, obj)| *obj)
    }

    fn variable_values(&self) -> Option<Vec<f64>> {
        self.solution.as_ref().map(|(values, _)| values.clone())
    }
}

impl Drop for SimplexModel {
    fn drop(&mut self) {
        trace!("releasing simplex model with {} variables", self.lower.len());
    }
}

struct Tableau {
    data: Vec<Vec<f64>>,
    basic_vars: Vec<usize>,
    n_vars: usize,
    n_slack: usize,
    n_artificial: usize,
}

enum SimplexResult {
    Optimal,
    Unbounded,
    Infeasible,
    Stopped(EngineStatus),
}

enum LpOutcome {
    Optimal(Vec<f64>),
    Infeasible,
    Unbounded,
    Stopped(EngineStatus),
}
