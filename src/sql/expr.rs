//! Quoting helpers and the SELECT builder

use std::fmt;

use serde::Deserialize;

/// Strip the identifier quoting character from a generated name.
///
/// Column labels are rendered inside double quotes, so any double quote in
/// the source expression would produce a malformed identifier.
pub fn sql_name(name: &str) -> String {
    name.replace('"', "")
}

/// A scalar value used in comparison choices and literals.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ChoiceValue {
    Int(i64),
    Float(f64),
    Str(String),
    /// Explicit SQL NULL. In YAML this is a `null`/`~` entry.
    Null,
}

impl ChoiceValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ChoiceValue::Null)
    }

    fn is_number(&self) -> bool {
        matches!(self, ChoiceValue::Int(_) | ChoiceValue::Float(_))
    }

    /// The bare (unquoted) rendering, used for short names.
    pub fn raw(&self) -> String {
        match self {
            ChoiceValue::Int(i) => i.to_string(),
            ChoiceValue::Float(f) => f.to_string(),
            ChoiceValue::Str(s) => s.clone(),
            ChoiceValue::Null => "NULL".to_string(),
        }
    }
}

impl From<&str> for ChoiceValue {
    fn from(s: &str) -> Self {
        ChoiceValue::Str(s.to_string())
    }
}

impl From<String> for ChoiceValue {
    fn from(s: String) -> Self {
        ChoiceValue::Str(s)
    }
}

impl From<i64> for ChoiceValue {
    fn from(i: i64) -> Self {
        ChoiceValue::Int(i)
    }
}

impl From<f64> for ChoiceValue {
    fn from(f: f64) -> Self {
        ChoiceValue::Float(f)
    }
}

/// Quote a value for embedding in SQL, based on its type.
///
/// Numbers stay unquoted, everything else is single-quoted. `quote_override`
/// forces quoting on (`Some(true)`) or off (`Some(false)`) regardless of
/// type. NULL is never quoted.
pub fn maybequote(value: &ChoiceValue, quote_override: Option<bool>) -> String {
    if value.is_null() {
        return "NULL".to_string();
    }
    let quote = match quote_override {
        Some(q) => q,
        None => !value.is_number(),
    };
    if quote {
        format!("'{}'", value.raw())
    } else {
        value.raw()
    }
}

/// A SELECT statement under construction.
///
/// Column items are pre-rendered SQL fragments ("entity_id",
/// "sum(amount) AS \"txn_amount_sum\""); the builder only assembles clauses.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    columns: Vec<String>,
    from_obj: String,
    where_clause: Option<String>,
    group_by: Vec<String>,
    limit: Option<u64>,
}

impl Select {
    pub fn new(from_obj: impl Into<String>) -> Self {
        Self {
            columns: Vec::new(),
            from_obj: from_obj.into(),
            where_clause: None,
            group_by: Vec::new(),
            limit: None,
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn where_sql(mut self, clause: impl Into<String>) -> Self {
        self.where_clause = Some(clause.into());
        self
    }

    pub fn group_by(mut self, expr: impl Into<String>) -> Self {
        self.group_by.push(expr.into());
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn to_sql(&self) -> String {
        let mut sql = format!("SELECT {}\nFROM {}", self.columns.join(", "), self.from_obj);
        if let Some(w) = &self.where_clause {
            sql.push_str("\nWHERE ");
            sql.push_str(w);
        }
        if !self.group_by.is_empty() {
            sql.push_str("\nGROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        if let Some(n) = self.limit {
            sql.push_str(&format!("\nLIMIT {}", n));
        }
        sql
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}
