#[macro_use]
extern crate serde;
extern crate log;

use std::error::Error;
use std::fmt;
use std::io;

pub mod config;
pub mod plan;
pub mod testutil;

pub use config::DbConfig;
pub use plan::PlanNode;

/// Custom error type.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplanError {
    /// IO Errors.
    IOError(String),
    /// Malformed or absent plan payload. Non-fatal: callers treat this as
    /// "no hints available" for the affected row.
    PlanParseError(String),
    /// The database rejected a query or a connection failed. Row-scoped.
    ExecutionError(String),
    /// A worker hit an uncaught fault. Row-scoped.
    WorkerFault(String),
    /// Invalid configuration (bad worker count, missing input column).
    /// Fatal: surfaced before any dispatch begins.
    ConfigError(String),
}

impl fmt::Display for ReplanError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ReplanError::IOError(s) => s.to_string(),
                ReplanError::PlanParseError(s) => format!("Plan Parse Error: {}", s),
                ReplanError::ExecutionError(s) => format!("Execution Error: {}", s),
                ReplanError::WorkerFault(s) => format!("Worker Fault: {}", s),
                ReplanError::ConfigError(s) => format!("Config Error: {}", s),
            }
        )
    }
}

impl From<io::Error> for ReplanError {
    fn from(error: io::Error) -> Self {
        ReplanError::IOError(error.to_string())
    }
}

impl Error for ReplanError {}
