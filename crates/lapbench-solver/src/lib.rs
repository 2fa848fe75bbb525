mod adapter;
mod engine;
mod problem;
mod simplex;
mod solution;

pub use adapter::{EngineAdapter, SolverAdapter};
pub use engine::{Engine, EngineError, EngineModel, EngineStatus};
pub use problem::{Constraint, ConstraintBound, ConstraintViolation, Direction, Domain, LinearModel, ModelError, Objective, Variable};
pub use simplex::{SimplexEngine, SimplexModel};
pub use solution::{SolveResult, SolveStatus};
