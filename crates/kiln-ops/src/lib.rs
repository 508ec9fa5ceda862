pub mod cache;
pub mod index;
pub mod ops_lock;
pub mod ops_plan;
pub mod ops_tree;
pub mod project;

pub use project::{Project, ProjectPaths};
