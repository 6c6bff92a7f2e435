//! Scenario execution: a World of one client plus scripted servers,
//! stepped one virtual second at a time, verified by a mandatory oracle.

mod builder;
mod world;

pub use builder::{RunnableScenario, Scenario};
pub use world::World;

/// Oracle verifying global consistency after a scenario run.
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String>>;
