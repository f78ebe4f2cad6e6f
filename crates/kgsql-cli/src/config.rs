//! Command-line configuration

use kgsql_core::Result;
use kgsql_query::{PlaceholderStyle, TranslatorConfig};
use std::path::PathBuf;

/// How translation results are printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON of the compiled query
    #[default]
    Json,
    /// The SQL text followed by one bind value per line
    Sql,
}

/// Options shared by every subcommand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    /// Schema catalog (JSON)
    pub catalog_path: PathBuf,

    /// Query parameters (JSON)
    pub params_path: Option<PathBuf>,

    /// Translator configuration (JSON)
    pub config_path: Option<PathBuf>,

    /// Overrides the configured placeholder style
    pub placeholder: Option<PlaceholderStyle>,

    /// Overrides the configured union branch limit
    pub max_union_branches: Option<usize>,

    /// Allow parameters missing from the parameter file
    pub defer_missing: bool,

    pub format: OutputFormat,
}

impl CliConfig {
    /// Create a configuration reading the catalog at `catalog_path`
    pub fn new<P: Into<PathBuf>>(catalog_path: P) -> Self {
        Self {
            catalog_path: catalog_path.into(),
            params_path: None,
            config_path: None,
            placeholder: None,
            max_union_branches: None,
            defer_missing: false,
            format: OutputFormat::default(),
        }
    }

    /// Builder: read parameters from a file
    pub fn params_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.params_path = Some(path.into());
        self
    }

    /// Builder: read translator settings from a file
    pub fn config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Builder: force a placeholder style
    pub fn placeholder(mut self, style: PlaceholderStyle) -> Self {
        self.placeholder = Some(style);
        self
    }

    /// Builder: force a union branch limit
    pub fn max_union_branches(mut self, limit: usize) -> Self {
        self.max_union_branches = Some(limit);
        self
    }

    /// Builder: defer missing parameters
    pub fn defer_missing(mut self) -> Self {
        self.defer_missing = true;
        self
    }

    /// Builder: set the output format
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Translator settings: the config file, if any, with command-line
    /// overrides applied on top
    pub fn translator_config(&self) -> Result<TranslatorConfig> {
        let mut config = match &self.config_path {
            Some(path) => TranslatorConfig::from_json(&std::fs::read_to_string(path)?)?,
            None => TranslatorConfig::default(),
        };
        if let Some(style) = self.placeholder {
            config = config.placeholder_style(style);
        }
        if let Some(limit) = self.max_union_branches {
            config = config.max_union_branches(limit);
        }
        if self.defer_missing {
            config = config.with_deferred_parameters();
        }
        config.validate()?;
        Ok(config)
    }
}
