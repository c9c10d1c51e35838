//! Aggregation orchestration (verb module)
//!
//! Combines column sources across named group-by keys into per-group select
//! queries, derives the table lifecycle (drop, create, insert, index, final
//! join), and - for [`SpacetimeAggregation`] - adds time windows, as-of
//! dates, temporal validation and imputation.

mod aggregation;
mod error;
mod plan;
mod spacetime;

pub use aggregation::{Aggregation, Group};
pub use error::AggregationError;
pub use plan::{ExecutionPlan, GroupPlan};
pub use spacetime::{Interval, SpacetimeAggregation};
