//! SQL execution collaborator interface
//!
//! The core emits statement sequences; something else runs them. This module
//! defines the entire contract that something must satisfy. Real database
//! drivers (and any worker-pool dispatch across per-group transactions) live
//! outside this crate; both a sequential and a parallel strategy consume the
//! same plans.

use std::fmt;

use crate::sql::Statement;

/// Failure reported back by the executor for a single statement or query.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteError {
    pub message: String,
}

impl ExecuteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for ExecuteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Statement execution failed: {}", self.message)
    }
}

impl std::error::Error for ExecuteError {}

/// The capability the core consumes from its execution collaborator.
///
/// Transaction boundaries belong to the executor; the core only marks where
/// they go. The core never retries a failed statement.
pub trait SqlExecutor {
    /// Run one statement for effect.
    fn execute(&mut self, statement: &Statement) -> Result<(), ExecuteError>;

    /// Run a read query expected to return a single boolean scalar
    /// (used by temporal validation round trips).
    fn query_scalar_bool(&mut self, sql: &str) -> Result<bool, ExecuteError>;

    fn begin(&mut self) -> Result<(), ExecuteError>;

    fn commit(&mut self) -> Result<(), ExecuteError>;

    fn rollback(&mut self) -> Result<(), ExecuteError>;
}
