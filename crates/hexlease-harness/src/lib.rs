//! Deterministic simulation harness for the hexlease client engine.
//!
//! The engine is a pure action-based state machine, so most scenarios run
//! without any network at all: [`scenario::World`] routes `Transmit`
//! actions straight into scripted [`SimServer`] models and feeds their
//! answers back, one virtual second per tick. Turmoil-based tests wire
//! the same engine to a simulated UDP socket for end-to-end coverage.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod scenario;
pub mod sim_server;
pub mod udp_driver;

pub use scenario::{Scenario, World};
pub use sim_server::SimServer;
pub use udp_driver::drive_until_bound;
