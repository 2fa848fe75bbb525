//! The capability an optimization engine must provide.
//!
//! An [`Engine`] hands out one [`EngineModel`] handle per solve. Handles are
//! released when dropped, so every exit path of a caller disposes of them.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::problem::{ConstraintBound, Direction, Domain, ModelError};

pub trait Engine {
    type Model: EngineModel;

    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Allocates an empty model sized for the given dimensions.
    fn create_model(&self, num_variables: usize, num_constraints: usize) -> Result<Self::Model, EngineError>;
}

/// A native model handle owned by an engine.
pub trait EngineModel {
    fn set_variable_bounds(&mut self, index: usize, lower: f64, upper: f64, domain: Domain) -> Result<(), EngineError>;

    /// Adds a row given as sparse `(variable index, coefficient)` pairs.
    fn add_constraint(&mut self, coefficients: &[(usize, f64)], bound: ConstraintBound) -> Result<(), EngineError>;

    fn set_objective(&mut self, coefficients: &[(usize, f64)], direction: Direction) -> Result<(), EngineError>;

    /// `None` removes any limit.
    fn set_time_limit(&mut self, limit: Option<Duration>);

    /// Runs the engine. Blocks until it terminates or a limit is hit.
    fn solve(&mut self) -> Result<EngineStatus, EngineError>;

    /// Objective of the best solution found by the last `solve`, if any.
    fn objective_value(&self) -> Option<f64>;

    /// Values of the best solution found by the last `solve`, aligned to variable index.
    fn variable_values(&self) -> Option<Vec<f64>>;
}

/// Termination status as reported by an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Optimal,
    Infeasible,
    Unbounded,
    /// The time limit expired; a solution may or may not be available
    TimeLimit,
    /// An iteration or node limit was hit; a solution may or may not be available
    IterationLimit,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineStatus::Optimal => "optimal",
            EngineStatus::Infeasible => "infeasible",
            EngineStatus::Unbounded => "unbounded",
            EngineStatus::TimeLimit => "time limit",
            EngineStatus::IterationLimit => "iteration limit",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Could not create solver model: {0}")]
    Construction(String),
    #[error("Variable index {index} out of range (model has {len} variables)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Invalid bounds [{lower}, {upper}] for variable {index}")]
    InvalidBounds { index: usize, lower: f64, upper: f64 },
    #[error("Unsupported by engine: {0}")]
    Unsupported(String),
    #[error("Invalid model: {0}")]
    InvalidModel(#[from] ModelError),
    #[error("The problem is unbounded")]
    Unbounded,
    #[error("Stopped at {0} without a solution")]
    LimitReached(EngineStatus),
    #[error("Engine reported {0} but returned no usable solution")]
    MissingSolution(EngineStatus),
    #[error("Internal engine error: {0}")]
    Internal(String),
}
