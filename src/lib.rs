//! Monte Carlo simulations of a neutron fission branching process and of the
//! secretary problem.

pub mod config;
pub mod engine;
pub mod error;
pub mod fission;
pub mod manager;
pub mod report;
pub mod secretary;
pub mod stats;
