//! File operations for matched files.
//!
//! [`DestinationPlanner`] turns a rule destination into a target path,
//! [`CollisionResolver`] decides what happens when that path is taken, and
//! [`OperationExecutor`] performs the move, copy, delete or rename.

mod executor;
mod planner;
mod resolver;
mod types;

pub use executor::OperationExecutor;
pub use planner::DestinationPlanner;
pub use resolver::CollisionResolver;
pub use types::*;
