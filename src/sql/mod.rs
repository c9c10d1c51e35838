//! SQL text construction (noun module)
//!
//! Quoting helpers, a small SELECT builder, and the statement types the
//! aggregation lifecycle emits (CREATE TABLE AS, INSERT FROM SELECT, drops,
//! indexes). Everything here renders to plain SQL text; execution belongs to
//! the [`crate::executor`] collaborator.

mod expr;
mod statement;

pub use expr::{maybequote, sql_name, ChoiceValue, Select};
pub use statement::Statement;
