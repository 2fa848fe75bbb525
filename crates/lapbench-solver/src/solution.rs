use std::fmt;

use crate::engine::EngineError;

/// The normalized result of handing a model to an engine
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    /// Solution status
    pub status: SolveStatus,
    /// Objective value, present only for optimal/feasible results
    pub objective_value: Option<f64>,
    /// Solved value per variable, parallel to `LinearModel::variables`
    pub values: Option<Vec<f64>>,
    /// Why the solve failed, when `status` is `Error`
    pub error: Option<EngineError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// An optimal solution was found
    Optimal,
    /// A solution satisfying all constraints was found, optimality not proven
    Feasible,
    /// The problem is infeasible (no solution exists)
    Infeasible,
    /// Solver encountered an error
    Error,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolveStatus::Optimal => "OPTIMAL",
            SolveStatus::Feasible => "FEASIBLE",
            SolveStatus::Infeasible => "INFEASIBLE",
            SolveStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

impl SolveResult {
    pub fn optimal(values: Vec<f64>, objective_value: f64) -> Self {
        Self {
            status: SolveStatus::Optimal,
            objective_value: Some(objective_value),
            values: Some(values),
            error: None,
        }
    }

    pub fn feasible(values: Vec<f64>, objective_value: f64) -> Self {
        Self {
            status: SolveStatus::Feasible,
            objective_value: Some(objective_value),
            values: Some(values),
            error: None,
        }
    }

    pub fn infeasible() -> Self {
        Self {
            status: SolveStatus::Infeasible,
            objective_value: None,
            values: None,
            error: None,
        }
    }

    pub fn error(error: EngineError) -> Self {
        Self {
            status: SolveStatus::Error,
            objective_value: None,
            values: None,
            error: Some(error),
        }
    }

    /// True when `values` and `objective_value` can be read.
    pub fn is_solved(&self) -> bool {
        matches!(self.status, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}
