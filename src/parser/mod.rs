//! Config parser (verb module)
//!
//! Transforms YAML files into aggregation configs.

use std::path::Path;

use crate::config::AggregationConfig;
use crate::error::ParseError;

/// Parse an aggregation config from a YAML file
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<AggregationConfig, ParseError> {
    let path_str = path.as_ref().display().to_string();
    let contents = std::fs::read_to_string(&path).map_err(|e| ParseError::Io {
        path: path_str,
        source: e,
    })?;
    parse_str(&contents)
}

/// Parse an aggregation config from a YAML string
pub fn parse_str(yaml: &str) -> Result<AggregationConfig, ParseError> {
    serde_yaml::from_str(yaml).map_err(ParseError::from)
}
