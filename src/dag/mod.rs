// src/dag/mod.rs

//! Task graph resolution.
//!
//! - [`resolver`] walks dependencies backward from a goal, pruning subtrees
//!   whose markers already exist, and detects cycles.
//! - [`plan`] is the resolver's output: an ordered, de-duplicated list of
//!   tasks to run plus the dependency edges among them.

pub mod plan;
pub mod resolver;

pub use plan::Plan;
pub use resolver::Resolver;
