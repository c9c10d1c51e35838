use std::fmt;

/// Errors raised while constructing aggregate specifications.
#[derive(Debug)]
pub enum ConfigError {
    /// Explicit names were supplied for a different number of quantities.
    MismatchedNames { names: usize, quantities: usize },
    /// Two quantities normalized to the same name.
    DuplicateQuantityName(String),
    /// An aggregate needs at least one function.
    NoFunctions,
    /// A template referenced a placeholder this crate does not substitute.
    UnknownPlaceholder { placeholder: String, template: String },
    /// A named quantity mapped to an empty argument tuple.
    EmptyQuantity(String),
    /// A truncation cap below 3 cannot hold the `_NN` index suffix.
    MaxlenTooSmall(usize),
    /// A spacetime aggregation needs at least one as-of date.
    NoDates,
    /// A group was given an empty interval list.
    NoIntervals,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MismatchedNames { names, quantities } => {
                write!(
                    f,
                    "{} names supplied for {} quantities; counts must match",
                    names, quantities
                )
            }
            ConfigError::DuplicateQuantityName(name) => {
                write!(f, "Duplicate quantity name '{}'", name)
            }
            ConfigError::NoFunctions => {
                write!(f, "An aggregate requires at least one function")
            }
            ConfigError::UnknownPlaceholder { placeholder, template } => {
                write!(
                    f,
                    "Unknown placeholder '{{{}}}' in template '{}'",
                    placeholder, template
                )
            }
            ConfigError::EmptyQuantity(name) => {
                write!(f, "Quantity '{}' has an empty argument tuple", name)
            }
            ConfigError::MaxlenTooSmall(maxlen) => {
                write!(f, "maxlen {} cannot fit a two-digit index suffix", maxlen)
            }
            ConfigError::NoDates => {
                write!(f, "A spacetime aggregation requires at least one date")
            }
            ConfigError::NoIntervals => {
                write!(f, "At least one interval is required per group")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
