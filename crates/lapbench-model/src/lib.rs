pub mod builder;
pub mod cost;
pub mod extract;

pub use builder::{AssignmentModel, AssignmentModelBuilder, BuildError, variable_index, variable_position};
pub use cost::{CostMatrix, CostMatrixError, RandomCostGenerator};
pub use extract::{AssignedPair, Assignment, ExtractError, MatchingError, extract};
