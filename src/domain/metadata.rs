//! Event metadata
//!
//! Metadata is a closed mapping of string keys to scalar values. Anything
//! that is not a string, number or bool is rejected when deserializing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Scalar metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// Boolean flag
    Bool(bool),
    /// Numeric value
    Number(f64),
    /// Free-form text
    Text(String),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{:.2}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Ordered metadata map; ordering keeps dedupe keys and rendering stable
pub type Metadata = BTreeMap<String, MetadataValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_accepts_scalars() {
        let meta: Metadata =
            serde_json::from_str(r#"{"version": "1.2.0", "replicas": 3, "canary": true}"#)
                .unwrap();
        assert_eq!(meta["version"], MetadataValue::Text("1.2.0".into()));
        assert_eq!(meta["replicas"], MetadataValue::Number(3.0));
        assert_eq!(meta["canary"], MetadataValue::Bool(true));
    }

    #[test]
    fn test_metadata_rejects_nested_values() {
        assert!(serde_json::from_str::<Metadata>(r#"{"tags": ["a", "b"]}"#).is_err());
        assert!(serde_json::from_str::<Metadata>(r#"{"owner": {"team": "ops"}}"#).is_err());
        assert!(serde_json::from_str::<Metadata>(r#"{"note": null}"#).is_err());
    }

    #[test]
    fn test_metadata_display() {
        assert_eq!(MetadataValue::Number(3.0).to_string(), "3");
        assert_eq!(MetadataValue::Number(92.456).to_string(), "92.46");
        assert_eq!(MetadataValue::from("prod").to_string(), "prod");
    }
}
