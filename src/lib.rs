//! collate - Generate SQL for wide, time-windowed aggregate feature tables
//!
//! This library provides:
//! - Aggregate column generation (Aggregate, AggregateExpression, Compare,
//!   Categorical) - declarative quantity/function/order specs expanded into
//!   named SQL columns by cross product
//! - Aggregation orchestration (Aggregation, SpacetimeAggregation) - per
//!   group-by key, per as-of date, per trailing time window
//! - Table lifecycle plans (drop, create, insert, index, final join)
//! - Imputation rules and COALESCE-based rewrites of null-bearing columns
//! - YAML config parsing
//!
//! # Architecture
//!
//! **Noun modules** (data structures):
//! - `sql/` - SQL text building blocks (Select, Statement, quoting)
//! - `imputation/` - per-column fill policies and their SQL synthesis
//! - `config/` - the declarative YAML config shape
//!
//! **Verb modules** (transformations):
//! - `aggregate/` - spec → named column expressions (ColumnSource)
//! - `aggregation/` - column sources + groups + dates → queries and plans
//! - `parser/` - YAML → AggregationConfig
//!
//! **Interface modules**:
//! - `executor/` - the SqlExecutor collaborator contract; the core emits
//!   plans, something else runs them
//!
//! # Example
//!
//! ```ignore
//! use collate::{Aggregate, Group, ImputeRule, SpacetimeAggregation};
//!
//! let amount = Aggregate::new("amount", &["sum", "avg"])?
//!     .with_imputation(ImputeRule::mean());
//! let st = SpacetimeAggregation::new(
//!     vec![Box::new(amount)],
//!     vec![Group::of("entity_id")],
//!     &["1 month", "1 year"],
//!     "transactions",
//!     &["2013-01-01"],
//!     "staging.states",
//! )?
//! .with_prefix("txn")
//! .with_schema("features");
//!
//! st.execute(&mut executor)?;
//! println!("{}", st.find_nulls());
//! ```

pub mod aggregate;
pub mod aggregation;
pub mod config;
pub mod error;
pub mod executor;
pub mod imputation;
pub mod parser;
pub mod sql;

// Re-export commonly used types
pub use aggregate::{
    Aggregate, AggregateExpression, BinaryOp, Categorical, Choices, ColumnContext, ColumnSource,
    Compare, ConfigError, FormatArgs, IncludeNull, SqlColumn,
};
pub use aggregation::{
    Aggregation, AggregationError, ExecutionPlan, Group, GroupPlan, Interval,
    SpacetimeAggregation,
};
pub use config::AggregationConfig;
pub use error::ParseError;
pub use executor::{ExecuteError, SqlExecutor};
pub use imputation::{ColType, ImputeError, ImputeRule, ImputeType, ImputeValue};
pub use sql::{maybequote, sql_name, ChoiceValue, Select, Statement};
