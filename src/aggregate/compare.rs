//! Choice-expansion shorthands: Compare and Categorical

use crate::imputation::{ColType, ImputeRule, NULL_CATEGORY_MARKER};
use crate::sql::{maybequote, ChoiceValue};

use super::aggregate::Aggregate;
use super::error::ConfigError;

/// Whether to add a `{col} is NULL` companion quantity, and under what name.
#[derive(Debug, Clone, PartialEq)]
pub enum IncludeNull {
    No,
    /// Named `{col}_NULL`.
    Yes,
    /// Named `{col}_{name}`.
    Named(String),
}

impl IncludeNull {
    fn short_name(&self) -> Option<String> {
        match self {
            IncludeNull::No => None,
            IncludeNull::Yes => Some(NULL_CATEGORY_MARKER.trim_start_matches('_').to_string()),
            IncludeNull::Named(name) => Some(name.clone()),
        }
    }
}

/// Choice values, optionally paired with short names for use in labels.
#[derive(Debug, Clone, PartialEq)]
pub enum Choices {
    Plain(Vec<ChoiceValue>),
    Named(Vec<(String, ChoiceValue)>),
}

impl Choices {
    /// Normalize into (short name, value) pairs.
    fn entries(&self) -> Vec<(String, ChoiceValue)> {
        match self {
            Choices::Plain(values) => values
                .iter()
                .map(|v| (v.raw(), v.clone()))
                .collect(),
            Choices::Named(pairs) => pairs.clone(),
        }
    }
}

impl From<Vec<ChoiceValue>> for Choices {
    fn from(values: Vec<ChoiceValue>) -> Self {
        Choices::Plain(values)
    }
}

impl From<Vec<&str>> for Choices {
    fn from(values: Vec<&str>) -> Self {
        Choices::Plain(values.into_iter().map(ChoiceValue::from).collect())
    }
}

impl From<Vec<i64>> for Choices {
    fn from(values: Vec<i64>) -> Self {
        Choices::Plain(values.into_iter().map(ChoiceValue::from).collect())
    }
}

impl From<Vec<(String, ChoiceValue)>> for Choices {
    fn from(pairs: Vec<(String, ChoiceValue)>) -> Self {
        Choices::Named(pairs)
    }
}

/// Expand one source column against many choice values into 0/1 aggregates.
///
/// Each choice yields a quantity `({col} {op} {value})::INT`, so `sum` counts
/// matches and `avg` gives the matching fraction. Builds into an
/// [`Aggregate`] whose columns carry a categorical imputation rule.
#[derive(Debug, Clone)]
pub struct Compare {
    col: String,
    op: String,
    choices: Choices,
    functions: Vec<String>,
    orders: Vec<String>,
    include_null: IncludeNull,
    maxlen: Option<usize>,
    op_in_name: bool,
    quote_choices: Option<bool>,
    imputation: ImputeRule,
}

impl Compare {
    pub fn new(
        col: impl Into<String>,
        op: impl Into<String>,
        choices: impl Into<Choices>,
        functions: &[&str],
    ) -> Self {
        Self {
            col: col.into(),
            op: op.into(),
            choices: choices.into(),
            functions: functions.iter().map(|f| f.to_string()).collect(),
            orders: Vec::new(),
            include_null: IncludeNull::No,
            maxlen: None,
            op_in_name: true,
            quote_choices: None,
            imputation: ImputeRule::error().with_coltype(ColType::Categorical),
        }
    }

    /// Add a `{col} is NULL` indicator quantity.
    pub fn include_null(mut self) -> Self {
        self.include_null = IncludeNull::Yes;
        self
    }

    /// Add the null indicator under an explicit short name.
    pub fn include_null_named(mut self, name: impl Into<String>) -> Self {
        self.include_null = IncludeNull::Named(name.into());
        self
    }

    /// Cap generated quantity-name lengths; longer sets are truncated and
    /// index-suffixed to stay unique.
    pub fn with_maxlen(mut self, maxlen: usize) -> Self {
        self.maxlen = Some(maxlen);
        self
    }

    /// Include the operator in generated names (on by default).
    pub fn op_in_name(mut self, include: bool) -> Self {
        self.op_in_name = include;
        self
    }

    /// Force quoting of choice values on or off, overriding type-based
    /// smart quoting.
    pub fn quote_choices(mut self, quote: bool) -> Self {
        self.quote_choices = Some(quote);
        self
    }

    pub fn with_order(mut self, orders: &[&str]) -> Self {
        self.orders = orders.iter().map(|o| o.to_string()).collect();
        self
    }

    /// Imputation for the generated indicator columns. The coltype is forced
    /// to categorical; these are 0/1 indicators with a null-indicator
    /// sibling.
    pub fn with_imputation(mut self, rule: ImputeRule) -> Self {
        self.imputation = rule.with_coltype(ColType::Categorical);
        self
    }

    pub fn build(self) -> Result<Aggregate, ConfigError> {
        if let Some(maxlen) = self.maxlen {
            // truncated names are stem + "_NN"; below 3 nothing fits
            if maxlen < 3 {
                return Err(ConfigError::MaxlenTooSmall(maxlen));
            }
        }

        let opname = if self.op_in_name {
            format!("_{}_", self.op)
        } else {
            "_".to_string()
        };

        let mut quantities: Vec<(String, Vec<String>)> = self
            .choices
            .entries()
            .into_iter()
            .map(|(nickname, choice)| {
                (
                    format!("{}{}{}", self.col, opname, nickname),
                    vec![format!(
                        "({} {} {})::INT",
                        self.col,
                        self.op,
                        maybequote(&choice, self.quote_choices)
                    )],
                )
            })
            .collect();

        if let Some(null_name) = self.include_null.short_name() {
            quantities.push((
                format!("{}_{}", self.col, null_name),
                vec![format!("({} is NULL)::INT", self.col)],
            ));
        }

        if let Some(maxlen) = self.maxlen {
            if quantities.iter().any(|(name, _)| name.len() > maxlen) {
                let keep = maxlen.saturating_sub(3);
                quantities = quantities
                    .into_iter()
                    .enumerate()
                    .map(|(i, (name, quantity))| {
                        let stem: String = name.chars().take(keep).collect();
                        (format!("{}_{:02}", stem, i), quantity)
                    })
                    .collect();
            }
        }

        let functions: Vec<&str> = self.functions.iter().map(String::as_str).collect();
        let mut aggregate =
            Aggregate::named(quantities, &functions)?.with_imputation(self.imputation);
        if !self.orders.is_empty() {
            let orders: Vec<&str> = self.orders.iter().map(String::as_str).collect();
            aggregate = aggregate.with_order(&orders)?;
        }
        Ok(aggregate)
    }
}

/// Equality comparison against many category values.
///
/// A [`Compare`] fixed to `=` with the operator left out of generated names.
/// A NULL among the choices (or a named choice whose value is NULL) lifts
/// into the null-indicator quantity; the caller's choice set is never
/// modified in place.
#[derive(Debug, Clone)]
pub struct Categorical {
    col: String,
    choices: Choices,
    functions: Vec<String>,
    maxlen: Option<usize>,
    quote_choices: Option<bool>,
    imputation: ImputeRule,
}

impl Categorical {
    pub fn new(
        col: impl Into<String>,
        choices: impl Into<Choices>,
        functions: &[&str],
    ) -> Self {
        Self {
            col: col.into(),
            choices: choices.into(),
            functions: functions.iter().map(|f| f.to_string()).collect(),
            maxlen: None,
            quote_choices: None,
            imputation: ImputeRule::null_category(),
        }
    }

    pub fn with_maxlen(mut self, maxlen: usize) -> Self {
        self.maxlen = Some(maxlen);
        self
    }

    pub fn quote_choices(mut self, quote: bool) -> Self {
        self.quote_choices = Some(quote);
        self
    }

    pub fn with_imputation(mut self, rule: ImputeRule) -> Self {
        self.imputation = rule.with_coltype(ColType::Categorical);
        self
    }

    pub fn build(self) -> Result<Aggregate, ConfigError> {
        let (choices, include_null) = lift_null_choices(&self.choices);

        let mut compare = Compare::new(self.col, "=", choices, &[])
            .op_in_name(false)
            .with_imputation(self.imputation);
        compare.functions = self.functions;
        compare.include_null = include_null;
        compare.maxlen = self.maxlen;
        compare.quote_choices = self.quote_choices;
        compare.build()
    }
}

/// Derive a NULL-free choice set plus the null-indicator request.
///
/// Plain NULL choices become [`IncludeNull::Yes`]; a named choice whose
/// value is NULL keeps its short name for the indicator.
fn lift_null_choices(choices: &Choices) -> (Choices, IncludeNull) {
    match choices {
        Choices::Plain(values) => {
            let kept: Vec<ChoiceValue> =
                values.iter().filter(|v| !v.is_null()).cloned().collect();
            let include_null = if kept.len() < values.len() {
                IncludeNull::Yes
            } else {
                IncludeNull::No
            };
            (Choices::Plain(kept), include_null)
        }
        Choices::Named(pairs) => {
            let mut include_null = IncludeNull::No;
            let mut kept = Vec::with_capacity(pairs.len());
            for (name, value) in pairs {
                if value.is_null() {
                    include_null = IncludeNull::Named(name.clone());
                } else {
                    kept.push((name.clone(), value.clone()));
                }
            }
            (Choices::Named(kept), include_null)
        }
    }
}
