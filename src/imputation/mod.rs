//! Imputation rules (noun module)
//!
//! Per-column policies for filling missing aggregate values, and the SQL
//! synthesis that turns a policy into a COALESCE rewrite. Rules travel with
//! the column definitions: every `Aggregate` carries one and hands it to each
//! column it produces.

use std::fmt;

use serde::Deserialize;

/// Marker appended to the label of the null-indicator quantity of a
/// categorical aggregate. Categorical imputation keys off its presence.
pub const NULL_CATEGORY_MARKER: &str = "_NULL";

/// Fill strategy for a column's missing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputeType {
    /// Within-date average, falling back to 0 when the whole date is null.
    Mean,
    /// A configured constant (`value` required for non-categorical columns).
    Constant,
    /// Zero-fill (categoricals still flag the null-indicator column with 1).
    Zero,
    /// Rely on the dedicated null-indicator column; categorical only.
    NullCategory,
    /// Refuse: finding a null in this column is a configuration error.
    Error,
}

impl fmt::Display for ImputeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImputeType::Mean => "mean",
            ImputeType::Constant => "constant",
            ImputeType::Zero => "zero",
            ImputeType::NullCategory => "null_category",
            ImputeType::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Column family, as far as imputation is concerned.
///
/// Categorical and array-categorical columns are 0/1 indicators with a
/// dedicated null-indicator sibling; they never get an `_imp` flag column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColType {
    Numeric,
    Categorical,
    ArrayCategorical,
}

impl ColType {
    pub fn is_categorical(&self) -> bool {
        matches!(self, ColType::Categorical | ColType::ArrayCategorical)
    }
}

impl Default for ColType {
    fn default() -> Self {
        ColType::Numeric
    }
}

/// The constant used by [`ImputeType::Constant`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ImputeValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for ImputeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImputeValue::Int(i) => write!(f, "{}", i),
            ImputeValue::Float(v) => write!(f, "{}", v),
            ImputeValue::Str(s) => write!(f, "{}", s),
        }
    }
}

/// A per-column imputation policy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImputeRule {
    #[serde(rename = "type")]
    pub kind: ImputeType,
    #[serde(default)]
    pub coltype: ColType,
    #[serde(default)]
    pub value: Option<ImputeValue>,
}

impl ImputeRule {
    pub fn mean() -> Self {
        Self { kind: ImputeType::Mean, coltype: ColType::Numeric, value: None }
    }

    pub fn constant(value: ImputeValue) -> Self {
        Self { kind: ImputeType::Constant, coltype: ColType::Numeric, value: Some(value) }
    }

    pub fn zero() -> Self {
        Self { kind: ImputeType::Zero, coltype: ColType::Numeric, value: None }
    }

    pub fn null_category() -> Self {
        Self { kind: ImputeType::NullCategory, coltype: ColType::Categorical, value: None }
    }

    pub fn error() -> Self {
        Self { kind: ImputeType::Error, coltype: ColType::Numeric, value: None }
    }

    pub fn with_coltype(mut self, coltype: ColType) -> Self {
        self.coltype = coltype;
        self
    }
}

/// Errors raised while building an imputation plan.
#[derive(Debug)]
pub enum ImputeError {
    /// An `error`-type rule met a column that actually contains nulls.
    NullsInColumn(String),
    /// The rule type is not defined for the column's coltype
    /// (e.g. `null_category` on a non-categorical column).
    InvalidRule { kind: ImputeType, column: String },
    /// A `constant` rule on a non-categorical column needs a value.
    MissingValue { column: String },
    /// A column with a rule appeared in neither impute list.
    UnclassifiedColumn(String),
    /// A column appeared in both the impute and non-impute lists.
    ConflictingColumn(String),
}

impl fmt::Display for ImputeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImputeError::NullsInColumn(col) => {
                write!(f, "NULL values found in column '{}'", col)
            }
            ImputeError::InvalidRule { kind, column } => {
                write!(f, "Invalid imputation type '{}' for column '{}'", kind, column)
            }
            ImputeError::MissingValue { column } => {
                write!(f, "Constant imputation for column '{}' requires a value", column)
            }
            ImputeError::UnclassifiedColumn(col) => {
                write!(f, "Column '{}' classified as neither impute nor non-impute", col)
            }
            ImputeError::ConflictingColumn(col) => {
                write!(f, "Column '{}' classified as both impute and non-impute", col)
            }
        }
    }
}

impl std::error::Error for ImputeError {}

/// Build the COALESCE rewrite for one null-bearing column.
///
/// `partition_column` is the output date column; mean imputation averages
/// within it so each as-of date fills from its own distribution.
pub fn impute_sql(
    column: &str,
    rule: &ImputeRule,
    partition_column: &str,
) -> Result<String, ImputeError> {
    let catcol = rule.coltype.is_categorical();
    let is_null_indicator = column.contains(NULL_CATEGORY_MARKER);
    let coalesce = |imp: &str| format!("COALESCE(\"{col}\", {imp}) AS \"{col}\"", col = column);
    let within_date_mean = format!(
        "AVG(\"{}\") OVER (PARTITION BY \"{}\"), 0",
        column, partition_column
    );

    match rule.kind {
        // the 0 fallback covers a date whose column is entirely NULL, where
        // the window mean is itself NULL
        ImputeType::Mean if !catcol => Ok(coalesce(&within_date_mean)),
        ImputeType::Mean => {
            if is_null_indicator {
                Ok(coalesce("1"))
            } else {
                Ok(coalesce(&within_date_mean))
            }
        }
        ImputeType::Constant if !catcol => match &rule.value {
            Some(value) => Ok(coalesce(&value.to_string())),
            None => Err(ImputeError::MissingValue { column: column.to_string() }),
        },
        ImputeType::Constant => {
            let matches_category = rule
                .value
                .as_ref()
                .map(|v| column.contains(&v.to_string()))
                .unwrap_or(false);
            Ok(coalesce(if matches_category || is_null_indicator { "1" } else { "0" }))
        }
        ImputeType::Zero => Ok(coalesce(if catcol && is_null_indicator { "1" } else { "0" })),
        ImputeType::NullCategory if catcol => {
            Ok(coalesce(if is_null_indicator { "1" } else { "0" }))
        }
        ImputeType::NullCategory => Err(ImputeError::InvalidRule {
            kind: rule.kind,
            column: column.to_string(),
        }),
        ImputeType::Error => Err(ImputeError::NullsInColumn(column.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_numeric() {
        let sql = impute_sql("f_amount_avg", &ImputeRule::mean(), "as_of_date").unwrap();
        assert_eq!(
            sql,
            "COALESCE(\"f_amount_avg\", AVG(\"f_amount_avg\") OVER (PARTITION BY \"as_of_date\"), 0) AS \"f_amount_avg\""
        );
    }

    #[test]
    fn test_mean_categorical_null_indicator() {
        let rule = ImputeRule::mean().with_coltype(ColType::Categorical);
        let sql = impute_sql("f_status_NULL_sum", &rule, "date").unwrap();
        assert_eq!(sql, "COALESCE(\"f_status_NULL_sum\", 1) AS \"f_status_NULL_sum\"");
    }

    #[test]
    fn test_constant_numeric() {
        let rule = ImputeRule::constant(ImputeValue::Float(0.5));
        let sql = impute_sql("f_x_sum", &rule, "date").unwrap();
        assert_eq!(sql, "COALESCE(\"f_x_sum\", 0.5) AS \"f_x_sum\"");
    }

    #[test]
    fn test_constant_numeric_missing_value() {
        let rule = ImputeRule { kind: ImputeType::Constant, coltype: ColType::Numeric, value: None };
        assert!(matches!(
            impute_sql("f_x_sum", &rule, "date"),
            Err(ImputeError::MissingValue { .. })
        ));
    }

    #[test]
    fn test_constant_categorical_matches_category() {
        let rule = ImputeRule::constant(ImputeValue::Str("open".to_string()))
            .with_coltype(ColType::Categorical);
        let hit = impute_sql("f_status_open_sum", &rule, "date").unwrap();
        assert!(hit.contains(", 1)"));
        let miss = impute_sql("f_status_closed_sum", &rule, "date").unwrap();
        assert!(miss.contains(", 0)"));
    }

    #[test]
    fn test_zero() {
        let numeric = impute_sql("f_x_sum", &ImputeRule::zero(), "date").unwrap();
        assert!(numeric.contains(", 0)"));
        let cat = ImputeRule::zero().with_coltype(ColType::Categorical);
        let null_col = impute_sql("f_s_NULL_sum", &cat, "date").unwrap();
        assert!(null_col.contains(", 1)"));
        let other = impute_sql("f_s_open_sum", &cat, "date").unwrap();
        assert!(other.contains(", 0)"));
    }

    #[test]
    fn test_null_category_on_numeric_rejected() {
        let rule = ImputeRule { kind: ImputeType::NullCategory, coltype: ColType::Numeric, value: None };
        assert!(matches!(
            impute_sql("f_x_sum", &rule, "date"),
            Err(ImputeError::InvalidRule { .. })
        ));
    }

    #[test]
    fn test_error_rule() {
        assert!(matches!(
            impute_sql("f_x_sum", &ImputeRule::error(), "date"),
            Err(ImputeError::NullsInColumn(c)) if c == "f_x_sum"
        ));
    }
}
