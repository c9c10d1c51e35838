//! Derived binary expressions over column sources

use crate::imputation::ImputeRule;

use super::column::{check_placeholders, ColumnContext, ColumnSource, SqlColumn};
use super::error::ConfigError;

const EXPRESSION_PLACEHOLDERS: &[&str] = &["name1", "operator", "name2"];
const DEFAULT_TEMPLATE: &str = "{name1}{operator}{name2}";

/// The closed set of binary operators for combining aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
    Or,
    And,
}

impl BinaryOp {
    /// The SQL operator text.
    pub fn sql(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
        }
    }

    /// The operator text used in generated column names.
    pub fn display(&self) -> &'static str {
        match self {
            BinaryOp::Or => "|",
            BinaryOp::And => "&",
            other => other.sql(),
        }
    }

    /// Cast suffix applied to the left operand. Division forces `*1.0` so
    /// integer aggregates divide as reals.
    pub fn cast(&self) -> &'static str {
        match self {
            BinaryOp::Div => "*1.0",
            _ => "",
        }
    }
}

/// A binary combination of two column sources, itself a column source.
///
/// Expands into the cross product of its operands' columns, one derived
/// expression `({left}{cast} {op} {right})` per pair, so arbitrary
/// arithmetic/logical trees of aggregates still flatten into plain column
/// lists.
pub struct AggregateExpression {
    left: Box<dyn ColumnSource>,
    right: Box<dyn ColumnSource>,
    op: BinaryOp,
    cast: String,
    template: String,
    imputation: Option<ImputeRule>,
}

impl std::fmt::Debug for AggregateExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateExpression")
            .field("op", &self.op)
            .field("cast", &self.cast)
            .field("template", &self.template)
            .field("imputation", &self.imputation)
            .finish_non_exhaustive()
    }
}

impl AggregateExpression {
    pub fn new(
        left: impl ColumnSource + 'static,
        right: impl ColumnSource + 'static,
        op: BinaryOp,
    ) -> Self {
        Self {
            left: Box::new(left),
            right: Box::new(right),
            op,
            cast: op.cast().to_string(),
            template: DEFAULT_TEMPLATE.to_string(),
            imputation: None,
        }
    }

    /// Override the cast suffix placed after the left operand.
    pub fn with_cast(mut self, cast: impl Into<String>) -> Self {
        self.cast = cast.into();
        self
    }

    /// Set the naming template for derived columns. Recognized placeholders
    /// are `{name1}`, `{operator}` and `{name2}`; anything else is rejected.
    pub fn alias(mut self, template: &str) -> Result<Self, ConfigError> {
        check_placeholders(template, EXPRESSION_PLACEHOLDERS)?;
        self.template = template.to_string();
        Ok(self)
    }

    pub fn with_imputation(mut self, rule: ImputeRule) -> Self {
        self.imputation = Some(rule);
        self
    }

    fn name(&self, name1: &str, name2: &str) -> String {
        self.template
            .replace("{name1}", name1)
            .replace("{operator}", self.op.display())
            .replace("{name2}", name2)
    }

    fn rule(&self) -> ImputeRule {
        self.imputation.clone().unwrap_or_else(ImputeRule::error)
    }
}

impl ColumnSource for AggregateExpression {
    fn get_columns(&self, ctx: &ColumnContext) -> Vec<SqlColumn> {
        // operands expand unprefixed; the prefix lands on the derived label
        let inner = ColumnContext {
            when: ctx.when.clone(),
            prefix: String::new(),
            args: ctx.args.clone(),
        };
        let left = self.left.get_columns(&inner);
        let right = self.right.get_columns(&inner);

        let mut columns = Vec::with_capacity(left.len() * right.len());
        for c1 in &left {
            for c2 in &right {
                let expression = format!(
                    "({}{} {} {})",
                    c1.expression,
                    self.cast,
                    self.op.sql(),
                    c2.expression
                );
                let label = format!("{}{}", ctx.prefix, self.name(&c1.label, &c2.label));
                columns.push(SqlColumn::new(expression, label));
            }
        }
        columns
    }

    fn imputation_rules(&self, ctx: &ColumnContext) -> Vec<(String, ImputeRule)> {
        self.get_columns(ctx)
            .into_iter()
            .map(|c| (c.label, self.rule()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregate;

    fn sums() -> Aggregate {
        Aggregate::new("cost", &["sum"]).unwrap()
    }

    fn counts() -> Aggregate {
        Aggregate::new("*", &["count"]).unwrap()
    }

    #[test]
    fn test_division_casts_left_operand() {
        let expr = AggregateExpression::new(sums(), counts(), BinaryOp::Div);
        let cols = expr.get_columns(&ColumnContext::new());
        assert_eq!(cols.len(), 1);
        assert_eq!(cols[0].expression, "(sum(cost)*1.0 / count(*))");
        assert_eq!(cols[0].label, "cost_sum/*_count");
    }

    #[test]
    fn test_logical_operator_naming() {
        let expr = AggregateExpression::new(sums(), counts(), BinaryOp::Or);
        let cols = expr.get_columns(&ColumnContext::new());
        assert_eq!(cols[0].expression, "(sum(cost) or count(*))");
        assert_eq!(cols[0].label, "cost_sum|*_count");
    }

    #[test]
    fn test_nested_expression_cross_product() {
        let a = Aggregate::from_list(&["a", "b"], &["sum"]).unwrap();
        let b = Aggregate::new("c", &["sum", "avg"]).unwrap();
        let ratio = AggregateExpression::new(a, b, BinaryOp::Div);
        let diff = AggregateExpression::new(ratio, counts(), BinaryOp::Sub);
        let cols = diff.get_columns(&ColumnContext::new());
        // (2 x 2) pairs on the left, 1 on the right
        assert_eq!(cols.len(), 4);
        assert_eq!(
            cols[0].expression,
            "((sum(a)*1.0 / sum(c)) - count(*))"
        );
    }

    #[test]
    fn test_alias_template() {
        let expr = AggregateExpression::new(sums(), counts(), BinaryOp::Div)
            .alias("{name1}_per_{name2}")
            .unwrap();
        let cols = expr.get_columns(&ColumnContext::new().with_prefix("p_"));
        assert_eq!(cols[0].label, "p_cost_sum_per_*_count");
    }

    #[test]
    fn test_alias_rejects_unknown_placeholder() {
        let err = AggregateExpression::new(sums(), counts(), BinaryOp::Add)
            .alias("{name1}_{bogus}")
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPlaceholder { .. }));
    }

    #[test]
    fn test_when_propagates_to_operands() {
        let expr = AggregateExpression::new(sums(), counts(), BinaryOp::Div);
        let ctx = ColumnContext::new().with_when("date >= '2012-01-01'");
        let cols = expr.get_columns(&ctx);
        assert_eq!(
            cols[0].expression,
            "(sum(cost) FILTER (WHERE date >= '2012-01-01')*1.0 / count(*) FILTER (WHERE date >= '2012-01-01'))"
        );
    }
}
