//! Shared test utilities for integration tests

use std::collections::VecDeque;

use collate::{AggregationConfig, ExecuteError, SqlExecutor, Statement};

/// Load a test fixture from the tests/test_data directory
pub fn load_fixture(name: &str) -> AggregationConfig {
    let path = format!("tests/test_data/{}", name);
    collate::parser::parse_file(&path)
        .unwrap_or_else(|e| panic!("Failed to load test data {}: {}", name, e))
}

/// An executor test double: records every statement and query, replays
/// scripted scalar results, and can be told to fail on a matching statement.
#[derive(Default)]
pub struct ScriptedExecutor {
    /// SQL of every executed statement, in order.
    pub executed: Vec<String>,
    /// SQL of every scalar query, in order.
    pub queries: Vec<String>,
    /// Results replayed by `query_scalar_bool`; `false` once exhausted.
    pub scalar_results: VecDeque<bool>,
    /// Fail any statement whose SQL contains this fragment.
    pub fail_on: Option<String>,
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scalar_results(mut self, results: &[bool]) -> Self {
        self.scalar_results = results.iter().copied().collect();
        self
    }

    pub fn failing_on(mut self, fragment: &str) -> Self {
        self.fail_on = Some(fragment.to_string());
        self
    }
}

impl SqlExecutor for ScriptedExecutor {
    fn execute(&mut self, statement: &Statement) -> Result<(), ExecuteError> {
        let sql = statement.to_sql();
        if let Some(fragment) = &self.fail_on {
            if sql.contains(fragment.as_str()) {
                return Err(ExecuteError::new(format!("scripted failure on '{}'", fragment)));
            }
        }
        self.executed.push(sql);
        Ok(())
    }

    fn query_scalar_bool(&mut self, sql: &str) -> Result<bool, ExecuteError> {
        self.queries.push(sql.to_string());
        Ok(self.scalar_results.pop_front().unwrap_or(false))
    }

    fn begin(&mut self) -> Result<(), ExecuteError> {
        self.begins += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), ExecuteError> {
        self.commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), ExecuteError> {
        self.rollbacks += 1;
        Ok(())
    }
}
