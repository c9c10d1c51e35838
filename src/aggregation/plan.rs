//! Execution plans: ordered statement sequences with phase constraints

use tracing::debug;

use crate::executor::SqlExecutor;
use crate::sql::Statement;

use super::error::AggregationError;

/// The lifecycle statements for one group's aggregation table.
///
/// Within a group: drop and create come first, inserts follow, the index
/// last. Inserts are independent of each other, so a parallel executor may
/// dispatch them concurrently once the create has committed.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPlan {
    pub group: String,
    pub drop: Statement,
    pub create: Statement,
    pub inserts: Vec<Statement>,
    pub index: Statement,
}

/// Every statement needed to build the final joined feature table, in
/// dependency order. The same plan feeds a single-transaction sequential
/// executor or a per-group-transaction parallel one; the statements do not
/// change.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPlan {
    pub schema: Option<Statement>,
    pub groups: Vec<GroupPlan>,
    /// Drop of the final joined table; runs after every group's index.
    pub final_drop: Statement,
    /// Create of the final joined table; always the last statement.
    pub final_create: Statement,
}

impl ExecutionPlan {
    /// The flattened sequential order.
    pub fn statements(&self) -> Vec<&Statement> {
        let mut all = Vec::new();
        if let Some(schema) = &self.schema {
            all.push(schema);
        }
        for group in &self.groups {
            all.push(&group.drop);
            all.push(&group.create);
            all.extend(group.inserts.iter());
            all.push(&group.index);
        }
        all.push(&self.final_drop);
        all.push(&self.final_create);
        all
    }
}

/// Run a plan sequentially inside one executor transaction.
///
/// The first failure rolls the transaction back and surfaces the executor's
/// reason; nothing is retried.
pub(crate) fn run_plan<E: SqlExecutor>(
    plan: &ExecutionPlan,
    executor: &mut E,
) -> Result<(), AggregationError> {
    executor.begin()?;
    for statement in plan.statements() {
        debug!(sql = %statement, "executing");
        if let Err(err) = executor.execute(statement) {
            let _ = executor.rollback();
            return Err(err.into());
        }
    }
    executor.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(sql: &str) -> Statement {
        Statement::Raw(sql.to_string())
    }

    #[test]
    fn test_statement_order() {
        let plan = ExecutionPlan {
            schema: Some(raw("schema")),
            groups: vec![GroupPlan {
                group: "g".to_string(),
                drop: raw("drop g"),
                create: raw("create g"),
                inserts: vec![raw("insert 1"), raw("insert 2")],
                index: raw("index g"),
            }],
            final_drop: raw("drop final"),
            final_create: raw("create final"),
        };
        let order: Vec<String> = plan.statements().iter().map(|s| s.to_sql()).collect();
        assert_eq!(
            order,
            vec![
                "schema", "drop g", "create g", "insert 1", "insert 2", "index g",
                "drop final", "create final"
            ]
        );
    }
}
