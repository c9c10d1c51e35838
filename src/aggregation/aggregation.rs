//! Group-by aggregation over a source relation

use crate::aggregate::{ColumnContext, ColumnSource};
use crate::executor::SqlExecutor;
use crate::sql::{sql_name, Select, Statement};

use super::error::AggregationError;
use super::plan::{run_plan, ExecutionPlan, GroupPlan};

/// A named group-by key: the alias used in table/column names and the SQL
/// expression grouped on.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: String,
    pub expr: String,
}

impl Group {
    pub fn new(name: impl Into<String>, expr: impl Into<String>) -> Self {
        Self { name: name.into(), expr: expr.into() }
    }

    /// A group whose alias is its expression, e.g. a plain column name.
    pub fn of(expr: impl Into<String>) -> Self {
        let expr = expr.into();
        Self { name: expr.clone(), expr }
    }
}

/// Orchestrates column sources across named groups into per-group tables and
/// one joined output table.
///
/// Each group gets its own physical table, dropped and recreated on every
/// run; the final table left-joins every group table against a synthetic
/// join table of the group-key combinations present in the source.
pub struct Aggregation {
    aggregates: Vec<Box<dyn ColumnSource>>,
    groups: Vec<Group>,
    from_obj: String,
    prefix: String,
    suffix: String,
    schema: Option<String>,
}

impl std::fmt::Debug for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregation")
            .field("groups", &self.groups)
            .field("from_obj", &self.from_obj)
            .field("prefix", &self.prefix)
            .field("suffix", &self.suffix)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl Aggregation {
    pub fn new(
        aggregates: Vec<Box<dyn ColumnSource>>,
        groups: Vec<Group>,
        from_obj: impl Into<String>,
    ) -> Self {
        let from_obj = from_obj.into();
        Self {
            aggregates,
            groups,
            prefix: from_obj.clone(),
            suffix: "aggregation".to_string(),
            from_obj,
            schema: None,
        }
    }

    /// Prefix for table and column names; defaults to the from clause.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Suffix for the final table name; defaults to "aggregation".
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn aggregates(&self) -> &[Box<dyn ColumnSource>] {
        &self.aggregates
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn from_obj(&self) -> &str {
        &self.from_obj
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Schema-qualified, quoted table name for a group table, or for the
    /// final joined table when `group` is `None`.
    pub fn get_table_name(&self, group: Option<&str>) -> String {
        let name = match group {
            Some(group) => format!("\"{}\"", sql_name(&format!("{}_{}", self.prefix, group))),
            None => format!("\"{}_{}\"", self.prefix, self.suffix),
        };
        match &self.schema {
            Some(schema) => format!("\"{}\".{}", schema, name),
            None => name,
        }
    }

    fn aggregate_columns(&self, group: &str) -> Vec<String> {
        let ctx = ColumnContext::new().with_prefix(format!("{}_{}_", self.prefix, group));
        self.aggregates
            .iter()
            .flat_map(|a| a.get_columns(&ctx))
            .map(|c| c.to_sql())
            .collect()
    }

    /// One select per group: the group expression plus every aggregate
    /// column, grouped by the group expression.
    pub fn get_selects(&self) -> Vec<(String, Vec<Select>)> {
        self.groups
            .iter()
            .map(|group| {
                let select = Select::new(self.from_obj.clone())
                    .column(group.expr.clone())
                    .columns(self.aggregate_columns(&group.name))
                    .group_by(group.expr.clone());
                (group.name.clone(), vec![select])
            })
            .collect()
    }

    /// Create each group table empty, shaped by its select.
    pub fn get_creates(&self) -> Vec<(String, Statement)> {
        self.get_selects()
            .into_iter()
            .map(|(group, selects)| {
                let create = Statement::CreateTableAs {
                    table: self.get_table_name(Some(&group)),
                    query: selects[0].clone().limit(0).to_sql(),
                };
                (group, create)
            })
            .collect()
    }

    /// Populate each group table, one insert per select.
    pub fn get_inserts(&self) -> Vec<(String, Vec<Statement>)> {
        self.get_selects()
            .into_iter()
            .map(|(group, selects)| {
                let table = self.get_table_name(Some(&group));
                let inserts = selects
                    .into_iter()
                    .map(|select| Statement::InsertFromSelect {
                        table: table.clone(),
                        query: select.to_sql(),
                    })
                    .collect();
                (group, inserts)
            })
            .collect()
    }

    pub fn get_drops(&self) -> Vec<(String, Statement)> {
        self.groups
            .iter()
            .map(|group| {
                (
                    group.name.clone(),
                    Statement::DropTable { table: self.get_table_name(Some(&group.name)) },
                )
            })
            .collect()
    }

    pub fn get_indexes(&self) -> Vec<(String, Statement)> {
        self.groups
            .iter()
            .map(|group| {
                (
                    group.name.clone(),
                    Statement::CreateIndex {
                        table: self.get_table_name(Some(&group.name)),
                        columns: vec![group.expr.clone()],
                    },
                )
            })
            .collect()
    }

    /// The distinct group-key combinations present in the source; the left
    /// side of the final join.
    pub fn get_join_table(&self) -> String {
        let mut select = Select::new(self.from_obj.clone());
        for group in &self.groups {
            select = select.column(group.expr.clone()).group_by(group.expr.clone());
        }
        select.to_sql()
    }

    /// The final joined table: the join table left-joined with every group
    /// table on its group key.
    pub fn get_create(&self, join_table: Option<&str>) -> Statement {
        let join_table = match join_table {
            Some(t) => t.to_string(),
            None => format!("(\n{}\n) t1", self.get_join_table()),
        };
        let mut query = format!("SELECT * FROM {}\n", join_table);
        for group in &self.groups {
            query.push_str(&format!(
                "LEFT JOIN {} USING ({})\n",
                self.get_table_name(Some(&group.name)),
                group.expr
            ));
        }
        Statement::CreateTableAs {
            table: self.get_table_name(None),
            query: query.trim_end().to_string(),
        }
    }

    pub fn get_drop(&self) -> Statement {
        Statement::DropTable { table: self.get_table_name(None) }
    }

    pub fn get_create_schema(&self) -> Option<Statement> {
        self.schema
            .as_ref()
            .map(|schema| Statement::CreateSchema { schema: schema.clone() })
    }

    /// Assemble the full lifecycle as an ordered plan.
    pub fn build_plan(&self) -> ExecutionPlan {
        build_plan_parts(
            self.get_create_schema(),
            self.get_drops(),
            self.get_creates(),
            self.get_inserts(),
            self.get_indexes(),
            self.get_drop(),
            self.get_create(None),
        )
    }

    /// Extension point; the plain aggregation has nothing to check.
    pub fn validate<E: SqlExecutor>(&self, _executor: &mut E) -> Result<(), AggregationError> {
        Ok(())
    }

    /// Validate, then run the whole lifecycle in one executor transaction.
    pub fn execute<E: SqlExecutor>(&self, executor: &mut E) -> Result<(), AggregationError> {
        self.validate(executor)?;
        run_plan(&self.build_plan(), executor)
    }
}

/// Zip per-group statement collections into a plan. Shared with the
/// spacetime aggregation, which derives the same shapes from its own
/// selects.
pub(crate) fn build_plan_parts(
    schema: Option<Statement>,
    drops: Vec<(String, Statement)>,
    creates: Vec<(String, Statement)>,
    inserts: Vec<(String, Vec<Statement>)>,
    indexes: Vec<(String, Statement)>,
    final_drop: Statement,
    final_create: Statement,
) -> ExecutionPlan {
    let groups = drops
        .into_iter()
        .zip(creates)
        .zip(inserts)
        .zip(indexes)
        .map(|((((group, drop), (_, create)), (_, inserts)), (_, index))| GroupPlan {
            group,
            drop,
            create,
            inserts,
            index,
        })
        .collect();
    ExecutionPlan {
        schema,
        groups,
        final_drop,
        final_create,
    }
}
