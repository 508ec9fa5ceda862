//! Dependency resolution engine: breadth-first graph expansion with
//! override and conflict policy, settings/options propagation, binary
//! identity computation, build planning, and the lockfile codec.

pub mod conflict;
pub mod error;
pub mod graph;
pub mod lock;
pub mod package_id;
pub mod planner;
pub mod propagate;
pub mod resolver;
pub mod retry;

pub use error::{FetchFailure, ResolveError};
pub use graph::{DepEdge, DependencyGraph, GraphNode};
pub use planner::{BuildPlan, NodeAction, PlannedNode};
pub use resolver::{resolve, ResolutionResult};
