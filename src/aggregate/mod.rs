//! Aggregate column generation (noun + verb module)
//!
//! Expands declarative quantity/function/order specifications into named SQL
//! aggregate columns:
//! - [`Aggregate`] - the cross product {function} x {quantity} x {order}
//! - [`AggregateExpression`] - derived binary expressions over two column
//!   sources (ratios, differences, boolean combinations)
//! - [`Compare`] / [`Categorical`] - one-column-vs-many-choices expansion
//!   into 0/1 indicator aggregates
//!
//! Everything that can produce columns implements [`ColumnSource`].

mod aggregate;
mod column;
mod compare;
mod error;
mod expression;

pub use aggregate::{split_distinct, Aggregate};
pub use column::{ColumnContext, ColumnSource, FormatArgs, SqlColumn};
pub use compare::{Categorical, Choices, Compare, IncludeNull};
pub use error::ConfigError;
pub use expression::{AggregateExpression, BinaryOp};
