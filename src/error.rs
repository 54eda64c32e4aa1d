//! Typed errors raised by the simulators.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Debug, Error)]
pub enum SimError {
    /// Derived probabilities are inconsistent (e.g. negative `p[0]`).
    #[error("invalid distribution: {0}")]
    InvalidDistribution(String),

    /// A count parameter is zero or arguments contradict each other.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Writing a report to its sink failed.
    #[error("output sink error: {0}")]
    OutputSink(#[from] std::io::Error),
}
