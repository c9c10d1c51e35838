//! The core aggregate column generator

use crate::imputation::ImputeRule;
use crate::sql::sql_name;

use super::column::{
    check_placeholders, ColumnContext, ColumnSource, SqlColumn, QUANTITY_PLACEHOLDERS,
};
use super::error::ConfigError;

/// Detect and strip a leading `distinct` qualifier from a quantity.
///
/// Only single-argument quantities support distinct. Matches the leading
/// token `distinct ` or `distinct(`, returning the qualifier to place inside
/// the aggregate call and the remaining quantity text.
pub fn split_distinct(quantity: &[String]) -> (&'static str, Vec<String>) {
    if quantity.len() != 1 {
        return ("", quantity.to_vec());
    }
    let q = &quantity[0];
    if q.starts_with("distinct ") || q.starts_with("distinct(") {
        let rest = q["distinct".len()..].trim_start_matches(' ');
        ("distinct ", vec![rest.to_string()])
    } else {
        ("", vec![q.clone()])
    }
}

/// One or more SQL aggregate columns over a group-by.
///
/// Holds named quantity tuples, aggregate functions, and optional ordering
/// expressions; [`ColumnSource::get_columns`] expands their cross product
/// into named columns, one per (function, quantity, order) combination.
#[derive(Debug, Clone)]
pub struct Aggregate {
    quantities: Vec<(String, Vec<String>)>,
    functions: Vec<String>,
    orders: Vec<Option<String>>,
    imputation: ImputeRule,
}

impl Aggregate {
    /// A single-quantity aggregate; the quantity expression names itself.
    pub fn new(quantity: &str, functions: &[&str]) -> Result<Self, ConfigError> {
        Self::build(
            vec![(sql_name(quantity), vec![quantity.to_string()])],
            functions,
        )
    }

    /// Several independent quantities, each naming itself.
    pub fn from_list(quantities: &[&str], functions: &[&str]) -> Result<Self, ConfigError> {
        Self::build(
            quantities
                .iter()
                .map(|q| (sql_name(q), vec![q.to_string()]))
                .collect(),
            functions,
        )
    }

    /// A multi-argument quantity for functions like `corr` or `regr_slope`.
    pub fn multi_arg(name: &str, args: &[&str], functions: &[&str]) -> Result<Self, ConfigError> {
        Self::build(
            vec![(name.to_string(), args.iter().map(|a| a.to_string()).collect())],
            functions,
        )
    }

    /// Quantities paired with explicit names; lengths must agree.
    pub fn with_names(
        names: &[&str],
        quantities: &[&str],
        functions: &[&str],
    ) -> Result<Self, ConfigError> {
        if names.len() != quantities.len() {
            return Err(ConfigError::MismatchedNames {
                names: names.len(),
                quantities: quantities.len(),
            });
        }
        Self::build(
            names
                .iter()
                .zip(quantities.iter())
                .map(|(n, q)| (n.to_string(), vec![q.to_string()]))
                .collect(),
            functions,
        )
    }

    /// Fully explicit name -> quantity-tuple pairs.
    pub fn named(
        quantities: Vec<(String, Vec<String>)>,
        functions: &[&str],
    ) -> Result<Self, ConfigError> {
        Self::build(quantities, functions)
    }

    fn build(
        quantities: Vec<(String, Vec<String>)>,
        functions: &[&str],
    ) -> Result<Self, ConfigError> {
        if functions.is_empty() {
            return Err(ConfigError::NoFunctions);
        }
        for (i, (name, quantity)) in quantities.iter().enumerate() {
            if quantity.is_empty() {
                return Err(ConfigError::EmptyQuantity(name.clone()));
            }
            if quantities[..i].iter().any(|(other, _)| other == name) {
                return Err(ConfigError::DuplicateQuantityName(name.clone()));
            }
            for q in quantity {
                check_placeholders(q, QUANTITY_PLACEHOLDERS)?;
            }
        }
        Ok(Self {
            quantities,
            functions: functions.iter().map(|f| f.to_string()).collect(),
            orders: vec![None],
            imputation: ImputeRule::error(),
        })
    }

    /// Ordering expressions for ordered-set aggregates (percentiles).
    pub fn with_order(mut self, orders: &[&str]) -> Result<Self, ConfigError> {
        for order in orders {
            check_placeholders(order, QUANTITY_PLACEHOLDERS)?;
        }
        self.orders = orders.iter().map(|o| Some(o.to_string())).collect();
        Ok(self)
    }

    /// Attach the imputation rule carried by every column this aggregate
    /// produces. Defaults to the `error` rule: unhandled nulls fail loudly.
    pub fn with_imputation(mut self, rule: ImputeRule) -> Self {
        self.imputation = rule;
        self
    }

    pub fn imputation(&self) -> &ImputeRule {
        &self.imputation
    }

    fn column_label(&self, prefix: &str, quantity_name: &str, order: &Option<String>, function: &str) -> String {
        let mut name = quantity_name.to_string();
        if let Some(order) = order {
            if !name.is_empty() {
                name.push('_');
            }
            name.push_str(&sql_name(order));
        }
        sql_name(&format!("{}{}_{}", prefix, name, function))
    }
}

impl ColumnSource for Aggregate {
    fn get_columns(&self, ctx: &ColumnContext) -> Vec<SqlColumn> {
        let mut columns = Vec::with_capacity(
            self.functions.len() * self.quantities.len() * self.orders.len(),
        );
        for function in &self.functions {
            for (quantity_name, quantity) in &self.quantities {
                for order in &self.orders {
                    let (distinct, args) = split_distinct(quantity);
                    let args = args.join(", ");
                    let order_clause = match order {
                        Some(order) => format!(" WITHIN GROUP (ORDER BY {})", order),
                        None => String::new(),
                    };
                    let filter = match &ctx.when {
                        Some(when) => format!(" FILTER (WHERE {})", when),
                        None => String::new(),
                    };

                    let expression = ctx.args.apply(&format!(
                        "{}({}{}){}{}",
                        function, distinct, args, order_clause, filter
                    ));
                    let label = self.column_label(&ctx.prefix, quantity_name, order, function);
                    columns.push(SqlColumn::new(expression, label));
                }
            }
        }
        columns
    }

    fn imputation_rules(&self, ctx: &ColumnContext) -> Vec<(String, ImputeRule)> {
        self.get_columns(ctx)
            .into_iter()
            .map(|c| (c.label, self.imputation.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imputation::{ColType, ImputeType};

    fn labels(agg: &Aggregate, ctx: &ColumnContext) -> Vec<String> {
        agg.get_columns(ctx).into_iter().map(|c| c.label).collect()
    }

    #[test]
    fn test_simple_columns() {
        let agg = Aggregate::new("amount", &["sum", "avg"]).unwrap();
        let ctx = ColumnContext::new().with_prefix("txn_");
        let cols = agg.get_columns(&ctx);
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[0].expression, "sum(amount)");
        assert_eq!(cols[0].label, "txn_amount_sum");
        assert_eq!(cols[1].label, "txn_amount_avg");
    }

    #[test]
    fn test_cross_product_count() {
        let agg = Aggregate::from_list(&["a", "b", "c"], &["sum", "avg"])
            .unwrap()
            .with_order(&["x", "y"])
            .unwrap();
        let mut seen = labels(&agg, &ColumnContext::new());
        assert_eq!(seen.len(), 3 * 2 * 2);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 12, "labels must be unique");
    }

    #[test]
    fn test_order_clause_and_name() {
        let agg = Aggregate::new("0.5", &["percentile_cont"])
            .unwrap()
            .with_order(&["amount"])
            .unwrap();
        let cols = agg.get_columns(&ColumnContext::new());
        assert_eq!(cols[0].expression, "percentile_cont(0.5) WITHIN GROUP (ORDER BY amount)");
        assert_eq!(cols[0].label, "0.5_amount_percentile_cont");
    }

    #[test]
    fn test_filter_clause() {
        let agg = Aggregate::new("amount", &["sum"]).unwrap();
        let ctx = ColumnContext::new().with_when("date >= '2013-01-01'");
        let cols = agg.get_columns(&ctx);
        assert_eq!(cols[0].expression, "sum(amount) FILTER (WHERE date >= '2013-01-01')");
    }

    #[test]
    fn test_distinct_detection() {
        let (d, q) = split_distinct(&["distinct entity_id".to_string()]);
        assert_eq!(d, "distinct ");
        assert_eq!(q, vec!["entity_id"]);

        let (d, q) = split_distinct(&["distinct(entity_id)".to_string()]);
        assert_eq!(d, "distinct ");
        assert_eq!(q, vec!["(entity_id)"]);

        let (d, q) = split_distinct(&["entity_id".to_string()]);
        assert_eq!(d, "");
        assert_eq!(q, vec!["entity_id"]);

        // multi-argument quantities never support distinct
        let (d, _) = split_distinct(&["distinct a".to_string(), "b".to_string()]);
        assert_eq!(d, "");
    }

    #[test]
    fn test_distinct_in_columns() {
        let agg = Aggregate::new("distinct entity_id", &["count"]).unwrap();
        let cols = agg.get_columns(&ColumnContext::new());
        assert_eq!(cols[0].expression, "count(distinct entity_id)");
    }

    #[test]
    fn test_multi_arg_quantity() {
        let agg = Aggregate::multi_arg("xy_corr", &["x", "y"], &["corr"]).unwrap();
        let cols = agg.get_columns(&ColumnContext::new());
        assert_eq!(cols[0].expression, "corr(x, y)");
        assert_eq!(cols[0].label, "xy_corr_corr");
    }

    #[test]
    fn test_mismatched_names() {
        let err = Aggregate::with_names(&["a", "b"], &["x"], &["sum"]).unwrap_err();
        assert!(matches!(err, ConfigError::MismatchedNames { names: 2, quantities: 1 }));
    }

    #[test]
    fn test_empty_quantity_tuple_rejected() {
        // an empty tuple would expand into an argument-less call like sum()
        let err = Aggregate::multi_arg("x", &[], &["sum"]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyQuantity(ref name) if name == "x"));

        let err = Aggregate::named(vec![("x".to_string(), vec![])], &["sum"]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyQuantity(_)));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = Aggregate::from_list(&["x", "x"], &["sum"]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateQuantityName(_)));
    }

    #[test]
    fn test_unknown_placeholder_rejected() {
        let err = Aggregate::new("age_at({some_date})", &["max"]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPlaceholder { .. }));
    }

    #[test]
    fn test_date_parameterized_quantity() {
        let agg = Aggregate::new("'{collate_date}'::date - birth_date", &["max"]).unwrap();
        let ctx = ColumnContext::new()
            .with_args(crate::aggregate::FormatArgs::new("2013-01-01", "all"));
        let cols = agg.get_columns(&ctx);
        assert_eq!(cols[0].expression, "max('2013-01-01'::date - birth_date)");
    }

    #[test]
    fn test_imputation_travels_with_columns() {
        let agg = Aggregate::new("amount", &["sum"]).unwrap().with_imputation(
            ImputeRule::mean().with_coltype(ColType::Numeric),
        );
        let rules = agg.imputation_rules(&ColumnContext::new().with_prefix("p_"));
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].0, "p_amount_sum");
        assert_eq!(rules[0].1.kind, ImputeType::Mean);
    }
}
