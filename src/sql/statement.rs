//! Statement types emitted by the aggregation lifecycle

use std::fmt;

/// An executable SQL statement.
///
/// The table-lifecycle methods emit these; an executor renders them with
/// [`Statement::to_sql`] and runs them. Table names arrive pre-qualified and
/// pre-quoted (see `Aggregation::get_table_name`).
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `CREATE TABLE <table> AS (<query>)`
    CreateTableAs { table: String, query: String },
    /// `INSERT INTO <table> (<query>)`
    InsertFromSelect { table: String, query: String },
    /// `DROP TABLE IF EXISTS <table>`
    DropTable { table: String },
    /// Unnamed index: `CREATE INDEX ON <table> (<columns>)`
    CreateIndex { table: String, columns: Vec<String> },
    /// `CREATE SCHEMA IF NOT EXISTS <schema>`
    CreateSchema { schema: String },
    /// Raw SQL text, passed through untouched.
    Raw(String),
}

impl Statement {
    pub fn to_sql(&self) -> String {
        match self {
            Statement::CreateTableAs { table, query } => {
                format!("CREATE TABLE {} AS (\n{}\n)", table, query)
            }
            Statement::InsertFromSelect { table, query } => {
                format!("INSERT INTO {} (\n{}\n)", table, query)
            }
            Statement::DropTable { table } => format!("DROP TABLE IF EXISTS {}", table),
            Statement::CreateIndex { table, columns } => {
                format!("CREATE INDEX ON {} ({})", table, columns.join(", "))
            }
            Statement::CreateSchema { schema } => {
                format!("CREATE SCHEMA IF NOT EXISTS {}", schema)
            }
            Statement::Raw(sql) => sql.clone(),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_table_as() {
        let s = Statement::CreateTableAs {
            table: "\"feat\".\"txn_entity_id\"".to_string(),
            query: "SELECT 1".to_string(),
        };
        assert_eq!(
            s.to_sql(),
            "CREATE TABLE \"feat\".\"txn_entity_id\" AS (\nSELECT 1\n)"
        );
    }

    #[test]
    fn test_drop_and_index() {
        let drop = Statement::DropTable { table: "\"t\"".to_string() };
        assert_eq!(drop.to_sql(), "DROP TABLE IF EXISTS \"t\"");

        let idx = Statement::CreateIndex {
            table: "\"t\"".to_string(),
            columns: vec!["entity_id".to_string(), "date".to_string()],
        };
        assert_eq!(idx.to_sql(), "CREATE INDEX ON \"t\" (entity_id, date)");
    }

    #[test]
    fn test_create_schema() {
        let s = Statement::CreateSchema { schema: "features".to_string() };
        assert_eq!(s.to_sql(), "CREATE SCHEMA IF NOT EXISTS features");
    }
}
