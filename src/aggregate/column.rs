//! The column-producing contract shared by all aggregate generators

use crate::imputation::ImputeRule;

use super::error::ConfigError;

/// One named SQL column: an expression and the label it is selected as.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlColumn {
    pub expression: String,
    pub label: String,
}

impl SqlColumn {
    pub fn new(expression: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            label: label.into(),
        }
    }

    /// Render as a select-list item. Labels are double-quoted because
    /// interval tokens ("1 month") put spaces into generated names.
    pub fn to_sql(&self) -> String {
        format!("{} AS \"{}\"", self.expression, self.label)
    }
}

/// Date/interval substitution arguments for parameterized quantities.
///
/// Quantities may reference `{collate_date}` and `{collate_interval}`; at
/// column-generation time the spacetime engine substitutes the current as-of
/// date and interval. These two are the only recognized placeholders, and
/// templates are checked against them at construction time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatArgs {
    pub collate_date: Option<String>,
    pub collate_interval: Option<String>,
}

pub(crate) const QUANTITY_PLACEHOLDERS: &[&str] = &["collate_date", "collate_interval"];

impl FormatArgs {
    pub fn new(date: impl Into<String>, interval: impl Into<String>) -> Self {
        Self {
            collate_date: Some(date.into()),
            collate_interval: Some(interval.into()),
        }
    }

    /// Substitute recognized placeholders in `text`.
    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        if let Some(date) = &self.collate_date {
            out = out.replace("{collate_date}", date);
        }
        if let Some(interval) = &self.collate_interval {
            out = out.replace("{collate_interval}", interval);
        }
        out
    }
}

/// Extract `{placeholder}` tokens from a template.
///
/// Only brace-delimited identifiers count; stray braces around
/// non-identifier text are left to the database to reject.
pub(crate) fn template_placeholders(template: &str) -> Vec<String> {
    let mut found = Vec::new();
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(close) = template[i + 1..].find('}') {
                let token = &template[i + 1..i + 1 + close];
                if !token.is_empty()
                    && token
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_')
                {
                    found.push(token.to_string());
                }
                i += close + 2;
                continue;
            }
        }
        i += 1;
    }
    found
}

/// Reject placeholders outside the allowed set, at construction time.
pub(crate) fn check_placeholders(template: &str, allowed: &[&str]) -> Result<(), ConfigError> {
    for token in template_placeholders(template) {
        if !allowed.contains(&token.as_str()) {
            return Err(ConfigError::UnknownPlaceholder {
                placeholder: token,
                template: template.to_string(),
            });
        }
    }
    Ok(())
}

/// Everything column generation needs from the caller: an optional row
/// filter, a label prefix, and date/interval substitutions.
#[derive(Debug, Clone, Default)]
pub struct ColumnContext {
    pub when: Option<String>,
    pub prefix: String,
    pub args: FormatArgs,
}

impl ColumnContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_when(mut self, when: impl Into<String>) -> Self {
        self.when = Some(when.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_args(mut self, args: FormatArgs) -> Self {
        self.args = args;
        self
    }
}

/// A finite, restartable source of named SQL columns.
///
/// Both leaf aggregates and derived binary expressions implement this, so an
/// aggregation can hold an arbitrary mix of the two.
pub trait ColumnSource {
    /// Produce every column this source defines, in a stable order.
    fn get_columns(&self, ctx: &ColumnContext) -> Vec<SqlColumn>;

    /// The imputation rule for every column label `get_columns` would
    /// produce under the same context, in the same order.
    fn imputation_rules(&self, ctx: &ColumnContext) -> Vec<(String, ImputeRule)>;
}
