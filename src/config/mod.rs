//! Declarative aggregation configuration (noun module)
//!
//! The YAML shape feature pipelines describe aggregations in; `build()`
//! assembles it into a [`SpacetimeAggregation`].

use serde::Deserialize;

use crate::aggregate::{Aggregate, Categorical, Choices, ColumnSource, ConfigError};
use crate::aggregation::{Group, SpacetimeAggregation};
use crate::imputation::ImputeRule;
use crate::sql::ChoiceValue;

/// A group-by key: either a bare column name or an alias/expression pair.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GroupConfig {
    Name(String),
    Full { name: String, expr: String },
}

impl GroupConfig {
    fn to_group(&self) -> Group {
        match self {
            GroupConfig::Name(name) => Group::of(name.clone()),
            GroupConfig::Full { name, expr } => Group::new(name.clone(), expr.clone()),
        }
    }
}

/// One plain aggregate: a quantity and the functions applied to it.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregateConfig {
    pub quantity: String,
    pub functions: Vec<String>,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub imputation: Option<ImputeRule>,
}

impl AggregateConfig {
    fn build(&self) -> Result<Aggregate, ConfigError> {
        let functions: Vec<&str> = self.functions.iter().map(String::as_str).collect();
        let mut aggregate = Aggregate::new(&self.quantity, &functions)?;
        if let Some(order) = &self.order {
            aggregate = aggregate.with_order(&[order])?;
        }
        if let Some(rule) = &self.imputation {
            aggregate = aggregate.with_imputation(rule.clone());
        }
        Ok(aggregate)
    }
}

/// One categorical expansion: a column and its choice values. A `null`
/// choice requests the null-indicator column.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoricalConfig {
    pub column: String,
    pub choices: Vec<ChoiceValue>,
    pub functions: Vec<String>,
    #[serde(default)]
    pub maxlen: Option<usize>,
    #[serde(default)]
    pub imputation: Option<ImputeRule>,
}

impl CategoricalConfig {
    fn build(&self) -> Result<Aggregate, ConfigError> {
        let functions: Vec<&str> = self.functions.iter().map(String::as_str).collect();
        let mut categorical = Categorical::new(
            self.column.clone(),
            Choices::Plain(self.choices.clone()),
            &functions,
        );
        if let Some(maxlen) = self.maxlen {
            categorical = categorical.with_maxlen(maxlen);
        }
        if let Some(rule) = &self.imputation {
            categorical = categorical.with_imputation(rule.clone());
        }
        categorical.build()
    }
}

/// A complete spacetime aggregation description.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregationConfig {
    pub from_obj: String,
    pub groups: Vec<GroupConfig>,
    pub intervals: Vec<String>,
    pub dates: Vec<String>,
    pub state_table: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub state_group: Option<String>,
    #[serde(default)]
    pub date_column: Option<String>,
    #[serde(default)]
    pub output_date_column: Option<String>,
    #[serde(default)]
    pub input_min_date: Option<String>,
    #[serde(default)]
    pub aggregates: Vec<AggregateConfig>,
    #[serde(default)]
    pub categoricals: Vec<CategoricalConfig>,
}

impl AggregationConfig {
    /// Assemble the configured [`SpacetimeAggregation`].
    pub fn build(&self) -> Result<SpacetimeAggregation, ConfigError> {
        let mut sources: Vec<Box<dyn ColumnSource>> = Vec::new();
        for aggregate in &self.aggregates {
            sources.push(Box::new(aggregate.build()?));
        }
        for categorical in &self.categoricals {
            sources.push(Box::new(categorical.build()?));
        }

        let groups = self.groups.iter().map(GroupConfig::to_group).collect();
        let intervals: Vec<&str> = self.intervals.iter().map(String::as_str).collect();
        let dates: Vec<&str> = self.dates.iter().map(String::as_str).collect();

        let mut aggregation = SpacetimeAggregation::new(
            sources,
            groups,
            &intervals,
            self.from_obj.clone(),
            &dates,
            self.state_table.clone(),
        )?;
        if let Some(prefix) = &self.prefix {
            aggregation = aggregation.with_prefix(prefix.clone());
        }
        if let Some(suffix) = &self.suffix {
            aggregation = aggregation.with_suffix(suffix.clone());
        }
        if let Some(schema) = &self.schema {
            aggregation = aggregation.with_schema(schema.clone());
        }
        if let Some(state_group) = &self.state_group {
            aggregation = aggregation.with_state_group(state_group.clone());
        }
        if let Some(date_column) = &self.date_column {
            aggregation = aggregation.with_date_column(date_column.clone());
        }
        if let Some(column) = &self.output_date_column {
            aggregation = aggregation.with_output_date_column(column.clone());
        }
        if let Some(min_date) = &self.input_min_date {
            aggregation = aggregation.with_input_min_date(min_date.clone());
        }
        Ok(aggregation)
    }
}
