use std::fmt;

use crate::executor::ExecuteError;

/// Errors raised while validating or executing an aggregation.
#[derive(Debug)]
pub enum AggregationError {
    /// An as-of date and interval reach back past the configured minimum
    /// input date; the window would be silently truncated.
    Validation {
        date: String,
        interval: String,
        min_date: String,
    },
    /// The executor collaborator reported a failure.
    Execute(ExecuteError),
}

impl fmt::Display for AggregationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationError::Validation { date, interval, min_date } => {
                write!(
                    f,
                    "date '{}' - interval '{}' is before input_min_date ('{}')",
                    date, interval, min_date
                )
            }
            AggregationError::Execute(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for AggregationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AggregationError::Execute(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ExecuteError> for AggregationError {
    fn from(err: ExecuteError) -> Self {
        AggregationError::Execute(err)
    }
}
