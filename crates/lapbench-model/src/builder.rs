use std::collections::BTreeMap;

use lapbench_solver::{Constraint, ConstraintBound, Direction, Domain, LinearModel};
use log::debug;
use thiserror::Error;

use crate::cost::CostMatrix;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("Cost matrix must have at least one worker and one task, got {workers}x{tasks}")]
    EmptyMatrix { workers: usize, tasks: usize },
    #[error("Cost matrix must be square, got {workers}x{tasks}")]
    NotSquare { workers: usize, tasks: usize },
}

/// A formulated assignment problem together with the shape needed to read its solution
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentModel {
    pub model: LinearModel,
    pub num_workers: usize,
    pub num_tasks: usize,
}

impl AssignmentModel {
    /// Index of the variable "worker is assigned to task".
    pub fn variable_index(&self, worker: usize, task: usize) -> usize {
        variable_index(self.num_tasks, worker, task)
    }

    /// Inverse of [`AssignmentModel::variable_index`].
    pub fn variable_position(&self, index: usize) -> (usize, usize) {
        variable_position(self.num_tasks, index)
    }
}

/// Variable `(worker, task)` lives at `worker * num_tasks + task`.
pub fn variable_index(num_tasks: usize, worker: usize, task: usize) -> usize {
    worker * num_tasks + task
}

pub fn variable_position(num_tasks: usize, index: usize) -> (usize, usize) {
    (index / num_tasks, index % num_tasks)
}

/// Formulates a cost matrix as a 0/1 linear program.
///
/// For an N x N matrix the model has N*N variables, N worker rows followed by
/// N task rows (each `sum == 1`), and minimizes `sum cost[i][j] * x[i][j]`.
#[derive(Debug, Clone, Copy)]
pub struct AssignmentModelBuilder {
    allow_rectangular: bool,
    domain: Domain,
}

impl Default for AssignmentModelBuilder {
    fn default() -> Self {
        Self {
            allow_rectangular: false,
            domain: Domain::Binary,
        }
    }
}

impl AssignmentModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept non-square matrices. The larger side is then constrained to
    /// "at most one" and the smaller side to "exactly one".
    pub fn allow_rectangular(mut self, allow: bool) -> Self {
        self.allow_rectangular = allow;
        self
    }

    /// Domain of every assignment variable. `Continuous` solves the LP
    /// relaxation, which is integral for this constraint matrix.
    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = domain;
        self
    }

    pub fn build(&self, costs: &CostMatrix) -> Result<AssignmentModel, BuildError> {
        let workers = costs.num_workers();
        let tasks = costs.num_tasks();
        if workers == 0 || tasks == 0 {
            return Err(BuildError::EmptyMatrix { workers, tasks });
        }
        if workers != tasks && !self.allow_rectangular {
            return Err(BuildError::NotSquare { workers, tasks });
        }

        let exactly_one = ConstraintBound::Equal(1.0);
        let at_most_one = ConstraintBound::Range { lower: 0.0, upper: 1.0 };
        let worker_bound = if workers > tasks { at_most_one } else { exactly_one };
        let task_bound = if tasks > workers { at_most_one } else { exactly_one };

        let mut model = LinearModel::new();
        let mut objective = BTreeMap::new();
        for i in 0..workers {
            for j in 0..tasks {
                let index = model.add_variable(format!("worker_{}_task_{}", i, j), 0.0, 1.0, self.domain);
                debug_assert_eq!(index, variable_index(tasks, i, j));
                objective.insert(index, costs.get(i, j));
            }
        }

        // Each worker is assigned to one task
        for i in 0..workers {
            let mut constraint = Constraint::new(format!("worker_{}", i), worker_bound);
            for j in 0..tasks {
                constraint.add_term(variable_index(tasks, i, j), 1.0);
            }
            model.add_constraint(constraint);
        }

        // Each task is assigned to one worker
        for j in 0..tasks {
            let mut constraint = Constraint::new(format!("task_{}", j), task_bound);
            for i in 0..workers {
                constraint.add_term(variable_index(tasks, i, j), 1.0);
            }
            model.add_constraint(constraint);
        }

        model.set_objective(objective, Direction::Minimize);

        debug!(
            "built assignment model: {} variables, {} constraints",
            model.num_variables(),
            model.num_constraints()
        );

        Ok(AssignmentModel {
            model,
            num_workers: workers,
            num_tasks: tasks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: Vec<Vec<f64>>) -> CostMatrix {
        CostMatrix::from_rows(rows).unwrap()
    }

    #[test]
    fn test_model_shape() {
        let n = 4;
        let costs = matrix((0..n).map(|i| (0..n).map(|j| (i * n + j) as f64).collect()).collect());
        let built = AssignmentModelBuilder::new().build(&costs).unwrap();
        let model = &built.model;

        assert_eq!(model.num_variables(), n * n);
        assert_eq!(model.num_constraints(), 2 * n);

        let mut worker_hits = vec![0; n * n];
        let mut task_hits = vec![0; n * n];
        for (k, c) in model.constraints.iter().enumerate() {
            assert_eq!(c.bound, ConstraintBound::Equal(1.0));
            assert_eq!(c.coefficients.len(), n);
            assert!(c.coefficients.values().all(|&a| a == 1.0));
            let hits = if k < n { &mut worker_hits } else { &mut task_hits };
            for &j in c.coefficients.keys() {
                hits[j] += 1;
            }
        }
        assert!(worker_hits.iter().all(|&h| h == 1));
        assert!(task_hits.iter().all(|&h| h == 1));

        assert!(model.variables.iter().all(|v| v.lower == 0.0 && v.upper == 1.0 && v.domain == Domain::Binary));
    }

    #[test]
    fn test_worker_and_task_rows() {
        let costs = matrix(vec![vec![1.0, 2.0, 3.0]; 3]);
        let built = AssignmentModelBuilder::new().build(&costs).unwrap();

        let worker_1: Vec<usize> = built.model.constraints[1].coefficients.keys().copied().collect();
        assert_eq!(worker_1, vec![3, 4, 5]);
        let task_2: Vec<usize> = built.model.constraints[5].coefficients.keys().copied().collect();
        assert_eq!(task_2, vec![2, 5, 8]);
        assert_eq!(built.model.constraints[5].name, "task_2");
        assert_eq!(built.model.variables[5].name, "worker_1_task_2");
    }

    #[test]
    fn test_objective_matches_costs() {
        let costs = matrix(vec![vec![4.0, 2.0, 9.0], vec![3.0, 5.0, 0.0], vec![7.0, 1.0, 8.0]]);
        let built = AssignmentModelBuilder::new().build(&costs).unwrap();

        assert_eq!(built.model.objective.direction, Direction::Minimize);
        assert_eq!(built.model.objective.coefficients.len(), 9);
        for i in 0..3 {
            for j in 0..3 {
                let index = built.variable_index(i, j);
                assert_eq!(built.model.objective.coefficients[&index], costs.get(i, j));
                assert_eq!(built.variable_position(index), (i, j));
            }
        }
    }

    #[test]
    fn test_rejects_non_square() {
        let costs = matrix(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        assert_eq!(
            AssignmentModelBuilder::new().build(&costs),
            Err(BuildError::NotSquare { workers: 2, tasks: 3 })
        );
    }

    #[test]
    fn test_rejects_empty() {
        let costs = matrix(Vec::new());
        assert_eq!(
            AssignmentModelBuilder::new().allow_rectangular(true).build(&costs),
            Err(BuildError::EmptyMatrix { workers: 0, tasks: 0 })
        );
    }

    #[test]
    fn test_rectangular_bounds() {
        let costs = matrix(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let built = AssignmentModelBuilder::new().allow_rectangular(true).build(&costs).unwrap();

        assert_eq!(built.model.num_variables(), 6);
        assert_eq!(built.model.num_constraints(), 5);
        // two workers must each take a task, three tasks take at most one worker
        assert!(built.model.constraints[..2].iter().all(|c| c.bound == ConstraintBound::Equal(1.0)));
        assert!(
            built.model.constraints[2..]
                .iter()
                .all(|c| c.bound == ConstraintBound::Range { lower: 0.0, upper: 1.0 })
        );
    }

    #[test]
    fn test_continuous_domain() {
        let costs = matrix(vec![vec![7.0]]);
        let built = AssignmentModelBuilder::new()
            .with_domain(Domain::Continuous)
            .build(&costs)
            .unwrap();
        assert_eq!(built.model.variables[0].domain, Domain::Continuous);
    }
}
