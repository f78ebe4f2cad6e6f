//! Translator configuration

use kgsql_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default cap on the number of union branches a query may unroll into
pub const DEFAULT_MAX_UNION_BRANCHES: usize = 64;

/// How bind-parameter placeholders are written into the SQL text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderStyle {
    /// `$1`, `$2`, ... ; a value used twice shares one slot
    #[default]
    Dollar,
    /// `?`, one slot per occurrence in text order
    Question,
}

/// Translator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Placeholder syntax of the emitted SQL
    pub placeholder_style: PlaceholderStyle,

    /// Maximum number of `UNION ALL` branches produced by unrolling
    /// variable-length relationships
    pub max_union_branches: usize,

    /// Treat parameters missing from the caller's map as deferred instead
    /// of rejecting the query
    pub allow_deferred_parameters: bool,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            placeholder_style: PlaceholderStyle::Dollar,
            max_union_branches: DEFAULT_MAX_UNION_BRANCHES,
            allow_deferred_parameters: false,
        }
    }
}

impl TranslatorConfig {
    /// Create a default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TranslatorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Builder: set the placeholder style
    pub fn placeholder_style(mut self, style: PlaceholderStyle) -> Self {
        self.placeholder_style = style;
        self
    }

    /// Builder: set the union branch limit
    pub fn max_union_branches(mut self, limit: usize) -> Self {
        self.max_union_branches = limit;
        self
    }

    /// Builder: accept parameters that were not supplied
    pub fn with_deferred_parameters(mut self) -> Self {
        self.allow_deferred_parameters = true;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_union_branches == 0 {
            return Err(Error::Configuration(
                "max_union_branches must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TranslatorConfig::default();
        assert_eq!(config.placeholder_style, PlaceholderStyle::Dollar);
        assert_eq!(config.max_union_branches, DEFAULT_MAX_UNION_BRANCHES);
        assert!(!config.allow_deferred_parameters);
    }

    #[test]
    fn test_builder() {
        let config = TranslatorConfig::new()
            .placeholder_style(PlaceholderStyle::Question)
            .max_union_branches(8)
            .with_deferred_parameters();

        assert_eq!(config.placeholder_style, PlaceholderStyle::Question);
        assert_eq!(config.max_union_branches, 8);
        assert!(config.allow_deferred_parameters);
    }

    #[test]
    fn test_from_json() {
        let config = TranslatorConfig::from_json(r#"{"placeholder_style": "question"}"#).unwrap();
        assert_eq!(config.placeholder_style, PlaceholderStyle::Question);
        assert_eq!(config.max_union_branches, DEFAULT_MAX_UNION_BRANCHES);

        let err = TranslatorConfig::from_json(r#"{"max_union_branches": 0}"#).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
