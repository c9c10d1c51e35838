//! Time-windowed aggregation over as-of dates

use tracing::debug;

use crate::aggregate::{ColumnContext, ColumnSource, ConfigError, FormatArgs};
use crate::executor::SqlExecutor;
use crate::imputation::{impute_sql, ImputeError, ImputeRule};
use crate::sql::{Select, Statement};

use super::aggregation::{build_plan_parts, Aggregation, Group};
use super::error::AggregationError;
use super::plan::{run_plan, ExecutionPlan};

/// A trailing time window: either unbounded (`all`) or an SQL time-span
/// expression such as `"1 year"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interval {
    All,
    Span(String),
}

impl Interval {
    pub fn new(s: &str) -> Self {
        if s == "all" {
            Interval::All
        } else {
            Interval::Span(s.to_string())
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Interval::All)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Interval::All => "all",
            Interval::Span(s) => s,
        }
    }
}

impl From<&str> for Interval {
    fn from(s: &str) -> Self {
        Interval::new(s)
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An [`Aggregation`] whose per-group selects are computed per as-of date,
/// with every aggregate filtered to a trailing time window.
///
/// Output tables are keyed by (group value, as-of date). Imputation rules
/// travel with the aggregates; [`SpacetimeAggregation::get_impute_create`]
/// turns null diagnostics into an imputed copy of the final table.
pub struct SpacetimeAggregation {
    base: Aggregation,
    intervals: Vec<(String, Vec<Interval>)>,
    dates: Vec<String>,
    state_table: String,
    state_group: String,
    date_column: String,
    output_date_column: String,
    input_min_date: Option<String>,
}

impl std::fmt::Debug for SpacetimeAggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpacetimeAggregation")
            .field("base", &self.base)
            .field("intervals", &self.intervals)
            .field("dates", &self.dates)
            .field("state_table", &self.state_table)
            .field("state_group", &self.state_group)
            .field("date_column", &self.date_column)
            .field("output_date_column", &self.output_date_column)
            .field("input_min_date", &self.input_min_date)
            .finish()
    }
}

impl SpacetimeAggregation {
    /// Build with one interval list shared by every group; override per
    /// group with [`SpacetimeAggregation::with_group_intervals`]. Every
    /// group needs at least one interval and the aggregation at least one
    /// as-of date; empty lists would render malformed or unindexable SQL.
    pub fn new(
        aggregates: Vec<Box<dyn ColumnSource>>,
        groups: Vec<Group>,
        intervals: &[&str],
        from_obj: impl Into<String>,
        dates: &[&str],
        state_table: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        if intervals.is_empty() {
            return Err(ConfigError::NoIntervals);
        }
        if dates.is_empty() {
            return Err(ConfigError::NoDates);
        }
        let base = Aggregation::new(aggregates, groups, from_obj);
        let shared: Vec<Interval> = intervals.iter().map(|i| Interval::new(i)).collect();
        let intervals = base
            .groups()
            .iter()
            .map(|g| (g.name.clone(), shared.clone()))
            .collect();
        Ok(Self {
            base,
            intervals,
            dates: dates.iter().map(|d| d.to_string()).collect(),
            state_table: state_table.into(),
            state_group: "entity_id".to_string(),
            date_column: "date".to_string(),
            output_date_column: "date".to_string(),
            input_min_date: None,
        })
    }

    pub fn with_group_intervals(
        mut self,
        group: &str,
        intervals: &[&str],
    ) -> Result<Self, ConfigError> {
        if intervals.is_empty() {
            return Err(ConfigError::NoIntervals);
        }
        let parsed: Vec<Interval> = intervals.iter().map(|i| Interval::new(i)).collect();
        for (name, entry) in &mut self.intervals {
            if name == group {
                *entry = parsed;
                break;
            }
        }
        Ok(self)
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.base = self.base.with_prefix(prefix);
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.base = self.base.with_suffix(suffix);
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.base = self.base.with_schema(schema);
        self
    }

    /// Group column present in the state table; defaults to "entity_id".
    pub fn with_state_group(mut self, state_group: impl Into<String>) -> Self {
        self.state_group = state_group.into();
        self
    }

    /// Date column in the source relation; defaults to "date".
    pub fn with_date_column(mut self, date_column: impl Into<String>) -> Self {
        self.date_column = date_column.into();
        self
    }

    /// Date column in the output tables; defaults to "date".
    pub fn with_output_date_column(mut self, column: impl Into<String>) -> Self {
        self.output_date_column = column.into();
        self
    }

    /// Absolute floor on source rows; no query reaches before it, and
    /// validation rejects any (date, interval) pair that would need to.
    pub fn with_input_min_date(mut self, date: impl Into<String>) -> Self {
        self.input_min_date = Some(date.into());
        self
    }

    pub fn get_table_name(&self, group: Option<&str>) -> String {
        self.base.get_table_name(group)
    }

    pub fn dates(&self) -> &[String] {
        &self.dates
    }

    pub fn intervals(&self, group: &str) -> &[Interval] {
        self.intervals
            .iter()
            .find(|(name, _)| name == group)
            .map(|(_, intervals)| intervals.as_slice())
            .unwrap_or(&[])
    }

    /// Every distinct interval across all groups, in first-seen order.
    fn distinct_intervals(&self) -> Vec<Interval> {
        let mut seen = Vec::new();
        for (_, intervals) in &self.intervals {
            for interval in intervals {
                if !seen.contains(interval) {
                    seen.push(interval.clone());
                }
            }
        }
        seen
    }

    /// The shared bounding clause for one (date, interval-set) pair: always
    /// upper-bounded by the as-of date, lower-bounded by the greatest
    /// interval unless `all` is present, and floored by `input_min_date`.
    pub fn where_clause(&self, date: &str, intervals: &[Interval]) -> String {
        let mut parts = vec![format!("{} < '{}'", self.date_column, date)];
        if !intervals.iter().any(Interval::is_all) {
            let greatest = intervals
                .iter()
                .map(|i| format!("interval '{}'", i.as_str()))
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!(
                "{} >= '{}'::date - greatest({})",
                self.date_column, date, greatest
            ));
        }
        if let Some(min_date) = &self.input_min_date {
            parts.push(format!("{} >= '{}'::date", self.date_column, min_date));
        }
        parts.join(" AND ")
    }

    fn column_context(&self, group: &str, interval: &Interval, date: &str) -> ColumnContext {
        let prefix = format!("{}_{}_{}_", self.base.prefix(), group, interval.as_str());
        let mut ctx = ColumnContext::new()
            .with_prefix(prefix)
            .with_args(FormatArgs::new(date, interval.as_str()));
        if let Interval::Span(span) = interval {
            ctx = ctx.with_when(format!(
                "{} >= '{}'::date - interval '{}'",
                self.date_column, date, span
            ));
        }
        ctx
    }

    fn aggregate_columns(&self, group: &str, interval: &Interval, date: &str) -> Vec<String> {
        let ctx = self.column_context(group, interval, date);
        self.base
            .aggregates()
            .iter()
            .flat_map(|a| a.get_columns(&ctx))
            .map(|c| c.to_sql())
            .collect()
    }

    fn date_literal(&self, date: &str) -> String {
        format!("'{}'::date AS \"{}\"", date, self.output_date_column)
    }

    /// One select per (group, as-of date), unioning over the group's
    /// intervals in its column list.
    pub fn get_selects(&self) -> Vec<(String, Vec<Select>)> {
        self.base
            .groups()
            .iter()
            .map(|group| {
                let intervals = self.intervals(&group.name);
                let selects = self
                    .dates
                    .iter()
                    .map(|date| {
                        let mut select = Select::new(self.base.from_obj())
                            .column(group.expr.clone())
                            .column(self.date_literal(date));
                        for interval in intervals {
                            select =
                                select.columns(self.aggregate_columns(&group.name, interval, date));
                        }
                        select
                            .where_sql(self.where_clause(date, intervals))
                            .group_by(group.expr.clone())
                    })
                    .collect();
                (group.name.clone(), selects)
            })
            .collect()
    }

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
        self.base.get_drops()
    }

    /// Group tables are read back joined on (group, date), so both key the
    /// index.
    pub fn get_indexes(&self) -> Vec<(String, Statement)> {
        self.base
            .groups()
            .iter()
            .map(|group| {
                (
                    group.name.clone(),
                    Statement::CreateIndex {
                        table: self.get_table_name(Some(&group.name)),
                        columns: vec![group.expr.clone(), self.output_date_column.clone()],
                    },
                )
            })
            .collect()
    }

    /// Every (group-value combination, date) pair present in the source
    /// under the same window bounds: one select per date, unioned.
    pub fn get_join_table(&self) -> String {
        let intervals = self.distinct_intervals();
        self.dates
            .iter()
            .map(|date| {
                let mut select = Select::new(self.base.from_obj());
                for group in self.base.groups() {
                    select = select.column(group.expr.clone()).group_by(group.expr.clone());
                }
                select
                    .column(self.date_literal(date))
                    .where_sql(self.where_clause(date, &intervals))
                    .to_sql()
            })
            .collect::<Vec<_>>()
            .join("\nUNION ALL\n")
    }

    pub fn get_create(&self, join_table: Option<&str>) -> Statement {
        let join_table = match join_table {
            Some(t) => t.to_string(),
            None => format!("(\n{}\n) t1", self.get_join_table()),
        };
        let mut query = format!("SELECT * FROM {}\n", join_table);
        for group in self.base.groups() {
            query.push_str(&format!(
                "LEFT JOIN {} USING ({}, {})\n",
                self.get_table_name(Some(&group.name)),
                group.expr,
                self.output_date_column
            ));
        }
        Statement::CreateTableAs {
            table: self.get_table_name(None),
            query: query.trim_end().to_string(),
        }
    }

    pub fn get_drop(&self) -> Statement {
        self.base.get_drop()
    }

    pub fn get_create_schema(&self) -> Option<Statement> {
        self.base.get_create_schema()
    }

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

    /// Reject any (date, interval) pair that reaches before the configured
    /// minimum input date. The comparison round-trips through the executor
    /// so the database's own interval arithmetic decides.
    pub fn validate<E: SqlExecutor>(&self, executor: &mut E) -> Result<(), AggregationError> {
        let Some(min_date) = &self.input_min_date else {
            return Ok(());
        };
        for date in &self.dates {
            for interval in self.distinct_intervals() {
                let Interval::Span(span) = &interval else {
                    continue;
                };
                let sql = format!(
                    "SELECT ('{}'::date - interval '{}') < '{}'::date",
                    date, span, min_date
                );
                debug!(sql = %sql, "validating window bound");
                if executor.query_scalar_bool(&sql)? {
                    return Err(AggregationError::Validation {
                        date: date.clone(),
                        interval: span.clone(),
                        min_date: min_date.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Validate, then run the whole lifecycle in one executor transaction.
    pub fn execute<E: SqlExecutor>(&self, executor: &mut E) -> Result<(), AggregationError> {
        self.validate(executor)?;
        run_plan(&self.build_plan(), executor)
    }

    /// The imputation rule for every output column, keyed by column label.
    /// Rules travel with the aggregates that produced the columns.
    pub fn get_imputation_rules(&self) -> Vec<(String, ImputeRule)> {
        let mut rules = Vec::new();
        for group in self.base.groups() {
            for interval in self.intervals(&group.name) {
                // labels are date-independent; any date context works
                let date = self.dates.first().map(String::as_str).unwrap_or("");
                let ctx = self.column_context(&group.name, interval, date);
                for aggregate in self.base.aggregates() {
                    rules.extend(aggregate.imputation_rules(&ctx));
                }
            }
        }
        rules
    }

    /// Diagnostic query counting nulls per output column, anchored on the
    /// state table so absent source rows show up as nulls.
    pub fn find_nulls(&self) -> String {
        let cols = self
            .get_imputation_rules()
            .into_iter()
            .map(|(col, _)| {
                format!(
                    "SUM(CASE WHEN \"{col}\" IS NULL THEN 1 ELSE 0 END) AS \"{col}\"",
                    col = col
                )
            })
            .collect::<Vec<_>>()
            .join(",\n");
        format!(
            "SELECT {}\nFROM {} t1\nLEFT JOIN {} t2 USING ({}, {})",
            cols,
            self.state_table,
            self.get_table_name(None),
            self.state_group,
            self.output_date_column
        )
    }

    /// Name of the imputed copy of the final table.
    pub fn get_impute_table_name(&self) -> String {
        let final_name = self.get_table_name(None);
        format!("{}_imputed\"", final_name.trim_end_matches('"'))
    }

    /// Build the imputed output table: keys and clean columns pass through,
    /// null-bearing columns are rewritten per their rules, and every
    /// rewritten non-categorical column gains an `_imp` flag sibling.
    ///
    /// Every column with a rule must land in exactly one of the two lists.
    pub fn get_impute_create(
        &self,
        impute_cols: &[String],
        nonimpute_cols: &[String],
    ) -> Result<Statement, ImputeError> {
        let rules = self.get_imputation_rules();
        for (col, _) in &rules {
            let imputed = impute_cols.contains(col);
            let passed = nonimpute_cols.contains(col);
            if imputed && passed {
                return Err(ImputeError::ConflictingColumn(col.clone()));
            }
            if !imputed && !passed {
                return Err(ImputeError::UnclassifiedColumn(col.clone()));
            }
        }

        let group_keys = self
            .base
            .groups()
            .iter()
            .map(|g| g.expr.clone())
            .collect::<Vec<_>>()
            .join(", ");
        let mut query = format!("SELECT {}, {}", group_keys, self.output_date_column);

        for col in nonimpute_cols {
            query.push_str(&format!("\n,\"{}\"", col));
        }
        for col in impute_cols {
            let rule = rules
                .iter()
                .find(|(name, _)| name == col)
                .map(|(_, rule)| rule)
                .ok_or_else(|| ImputeError::UnclassifiedColumn(col.clone()))?;
            query.push_str(&format!("\n,{}", impute_sql(col, rule, &self.output_date_column)?));
            if !rule.coltype.is_categorical() {
                query.push_str(&format!(
                    "\n,CASE WHEN \"{col}\" IS NULL THEN 1 ELSE 0 END AS \"{col}_imp\"",
                    col = col
                ));
            }
        }

        query.push_str(&format!("\nFROM {} t1", self.state_table));
        query.push_str(&format!(
            "\nLEFT JOIN {} t2 USING ({}, {})",
            self.get_table_name(None),
            self.state_group,
            self.output_date_column
        ));

        Ok(Statement::CreateTableAs {
            table: self.get_impute_table_name(),
            query,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregate;
    use crate::imputation::ImputeRule;

    fn sample() -> SpacetimeAggregation {
        let agg = Aggregate::new("amount", &["sum"])
            .unwrap()
            .with_imputation(ImputeRule::mean());
        SpacetimeAggregation::new(
            vec![Box::new(agg)],
            vec![Group::of("entity_id")],
            &["1 month", "1 year"],
            "transactions",
            &["2013-01-01", "2014-01-01"],
            "staging.states",
        )
        .unwrap()
        .with_prefix("txn")
    }

    #[test]
    fn test_where_clause_bounds() {
        let st = sample();
        let clause = st.where_clause("2013-01-01", st.intervals("entity_id"));
        assert_eq!(
            clause,
            "date < '2013-01-01' AND date >= '2013-01-01'::date - greatest(interval '1 month', interval '1 year')"
        );
    }

    #[test]
    fn test_where_clause_all_drops_lower_bound() {
        let st = sample().with_group_intervals("entity_id", &["1 month", "all"]).unwrap();
        let clause = st.where_clause("2013-01-01", st.intervals("entity_id"));
        assert_eq!(clause, "date < '2013-01-01'");
    }

    #[test]
    fn test_where_clause_input_min_date() {
        let st = sample().with_input_min_date("2010-01-01");
        let clause = st.where_clause("2013-01-01", &[Interval::All]);
        assert_eq!(clause, "date < '2013-01-01' AND date >= '2010-01-01'::date");
    }

    #[test]
    fn test_selects_one_per_date() {
        let selects = sample().get_selects();
        assert_eq!(selects.len(), 1);
        let (_, queries) = &selects[0];
        assert_eq!(queries.len(), 2);
        let sql = queries[0].to_sql();
        assert!(sql.contains("'2013-01-01'::date AS \"date\""));
        assert!(sql.contains(
            "sum(amount) FILTER (WHERE date >= '2013-01-01'::date - interval '1 month') AS \"txn_entity_id_1 month_amount_sum\""
        ));
        assert!(sql.contains("AS \"txn_entity_id_1 year_amount_sum\""));
        assert!(sql.contains("GROUP BY entity_id"));
    }

    #[test]
    fn test_all_interval_has_no_filter() {
        let st = sample().with_group_intervals("entity_id", &["all"]).unwrap();
        let sql = st.get_selects()[0].1[0].to_sql();
        assert!(sql.contains("sum(amount) AS \"txn_entity_id_all_amount_sum\""));
        assert!(!sql.contains("FILTER"));
    }

    #[test]
    fn test_indexes_include_date() {
        let st = sample();
        let (_, index) = &st.get_indexes()[0];
        assert_eq!(
            index.to_sql(),
            "CREATE INDEX ON \"txn_entity_id\" (entity_id, date)"
        );
    }

    #[test]
    fn test_join_table_unions_dates() {
        let join = sample().get_join_table();
        assert_eq!(join.matches("UNION ALL").count(), 1);
        assert!(join.contains("'2013-01-01'::date AS \"date\""));
        assert!(join.contains("'2014-01-01'::date AS \"date\""));
    }

    #[test]
    fn test_final_create_joins_on_date() {
        let sql = sample().get_create(None).to_sql();
        assert!(sql.contains("LEFT JOIN \"txn_entity_id\" USING (entity_id, date)"));
    }

    #[test]
    fn test_imputation_rules_per_interval() {
        let rules = sample().get_imputation_rules();
        let names: Vec<&str> = rules.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["txn_entity_id_1 month_amount_sum", "txn_entity_id_1 year_amount_sum"]
        );
    }

    #[test]
    fn test_find_nulls_anchors_on_state_table() {
        let sql = sample().find_nulls();
        assert!(sql.starts_with("SELECT SUM(CASE WHEN \"txn_entity_id_1 month_amount_sum\" IS NULL"));
        assert!(sql.contains("FROM staging.states t1"));
        assert!(sql.contains("LEFT JOIN \"txn_aggregation\" t2 USING (entity_id, date)"));
    }

    #[test]
    fn test_empty_interval_list_rejected() {
        let agg = Aggregate::new("amount", &["sum"]).unwrap();
        let err = SpacetimeAggregation::new(
            vec![Box::new(agg)],
            vec![Group::of("entity_id")],
            &[],
            "transactions",
            &["2013-01-01"],
            "staging.states",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::NoIntervals));

        let err = sample().with_group_intervals("entity_id", &[]).unwrap_err();
        assert!(matches!(err, ConfigError::NoIntervals));
    }

    #[test]
    fn test_empty_date_list_rejected() {
        let agg = Aggregate::new("amount", &["sum"]).unwrap();
        let err = SpacetimeAggregation::new(
            vec![Box::new(agg)],
            vec![Group::of("entity_id")],
            &["1 year"],
            "transactions",
            &[],
            "staging.states",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::NoDates));
    }

    #[test]
    fn test_impute_table_name() {
        assert_eq!(sample().get_impute_table_name(), "\"txn_aggregation_imputed\"");
        let with_schema = sample().with_schema("features");
        assert_eq!(
            with_schema.get_impute_table_name(),
            "\"features\".\"txn_aggregation_imputed\""
        );
    }
}
