use lapbench_solver::{SolveResult, SolveStatus};
use thiserror::Error;

use crate::builder::AssignmentModel;

/// Solved values above this count as "assigned"
pub const ASSIGNED_THRESHOLD: f64 = 0.5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("No assignment in a {0} result")]
    Unsolved(SolveStatus),
    #[error("Result has {actual} values for a model with {expected} variables")]
    ValueCount { expected: usize, actual: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchingError {
    #[error("Worker {0} is not assigned")]
    WorkerUnassigned(usize),
    #[error("Worker {0} is assigned more than once")]
    WorkerRepeated(usize),
    #[error("Task {0} is not assigned")]
    TaskUnassigned(usize),
    #[error("Task {0} is assigned more than once")]
    TaskRepeated(usize),
    #[error("Pair ({worker}, {task}) is outside the cost matrix")]
    OutOfRange { worker: usize, task: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssignedPair {
    pub worker: usize,
    pub task: usize,
    pub cost: f64,
}

/// Worker/task pairs chosen by a solve, in variable-index order
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Assignment {
    pub pairs: Vec<AssignedPair>,
}

impl Assignment {
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssignedPair> {
        self.pairs.iter()
    }

    pub fn total_cost(&self) -> f64 {
        self.pairs.iter().map(|p| p.cost).sum()
    }

    /// Checks the pairs form a matching covering the smaller side exactly once
    /// (both sides, for a square problem) and the larger side at most once.
    pub fn check_matching(&self, num_workers: usize, num_tasks: usize) -> Result<(), MatchingError> {
        let mut worker_seen = vec![false; num_workers];
        let mut task_seen = vec![false; num_tasks];

        for p in &self.pairs {
            if p.worker >= num_workers || p.task >= num_tasks {
                return Err(MatchingError::OutOfRange {
                    worker: p.worker,
                    task: p.task,
                });
            }
            if std::mem::replace(&mut worker_seen[p.worker], true) {
                return Err(MatchingError::WorkerRepeated(p.worker));
            }
            if std::mem::replace(&mut task_seen[p.task], true) {
                return Err(MatchingError::TaskRepeated(p.task));
            }
        }

        if num_workers <= num_tasks {
            if let Some(w) = worker_seen.iter().position(|&s| !s) {
                return Err(MatchingError::WorkerUnassigned(w));
            }
        }
        if num_tasks <= num_workers {
            if let Some(t) = task_seen.iter().position(|&s| !s) {
                return Err(MatchingError::TaskUnassigned(t));
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Assignment {
    type Item = &'a AssignedPair;
    type IntoIter = std::slice::Iter<'a, AssignedPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}

/// Reads the chosen pairs out of an optimal or feasible result.
///
/// The matching property is not enforced here; see [`Assignment::check_matching`].
pub fn extract(model: &AssignmentModel, result: &SolveResult) -> Result<Assignment, ExtractError> {
    let values = match (result.is_solved(), &result.values) {
        (true, Some(values)) => values,
        _ => return Err(ExtractError::Unsolved(result.status)),
    };
    let expected = model.model.num_variables();
    if values.len() != expected {
        return Err(ExtractError::ValueCount {
            expected,
            actual: values.len(),
        });
    }

    let pairs = values
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v > ASSIGNED_THRESHOLD)
        .map(|(index, _)| {
            let (worker, task) = model.variable_position(index);
            AssignedPair {
                worker,
                task,
                cost: model.model.objective.coefficients.get(&index).copied().unwrap_or(0.0),
            }
        })
        .collect();

    Ok(Assignment { pairs })
}
