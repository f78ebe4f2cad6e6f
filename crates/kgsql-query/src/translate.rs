//! Translation pipeline: lexer, parser, binder, planner and emitter

use crate::binder::{Binder, Parameters};
use crate::config::TranslatorConfig;
use crate::emitter::{CompiledQuery, emit};
use crate::parser::parse_query;
use crate::planner::{LogicalPlan, QueryPlanner};
use kgsql_core::{Result, SchemaCatalog};

/// Translates graph pattern queries against one catalog
#[derive(Debug, Clone)]
pub struct Translator {
    catalog: SchemaCatalog,
    config: TranslatorConfig,
}

impl Translator {
    /// Create a translator with the default configuration
    pub fn new(catalog: SchemaCatalog) -> Result<Self> {
        Self::with_config(catalog, TranslatorConfig::default())
    }

    /// Create a translator, validating the catalog and configuration
    pub fn with_config(catalog: SchemaCatalog, config: TranslatorConfig) -> Result<Self> {
        catalog.validate()?;
        config.validate()?;
        Ok(Self { catalog, config })
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    /// Run the pipeline up to the logical plan
    #[tracing::instrument(skip_all, fields(query_len = text.len()))]
    pub fn plan(&self, text: &str, parameters: &Parameters) -> Result<LogicalPlan<'_>> {
        plan_query(&self.catalog, &self.config, text, parameters)
    }

    /// Translate a query into parameterized SQL
    #[tracing::instrument(skip_all, fields(query_len = text.len()))]
    pub fn translate(&self, text: &str, parameters: &Parameters) -> Result<CompiledQuery> {
        let plan = plan_query(&self.catalog, &self.config, text, parameters)?;
        Ok(emit(&plan, self.config.placeholder_style))
    }

    /// Render the logical plan of a query as an indented tree
    #[tracing::instrument(skip_all, fields(query_len = text.len()))]
    pub fn explain(&self, text: &str, parameters: &Parameters) -> Result<String> {
        let plan = plan_query(&self.catalog, &self.config, text, parameters)?;
        Ok(plan.to_string())
    }
}

/// Translate a query with the default configuration
pub fn translate(
    text: &str,
    parameters: &Parameters,
    catalog: &SchemaCatalog,
) -> Result<CompiledQuery> {
    catalog.validate()?;
    let config = TranslatorConfig::default();
    let plan = plan_query(catalog, &config, text, parameters)?;
    Ok(emit(&plan, config.placeholder_style))
}

fn plan_query<'c>(
    catalog: &'c SchemaCatalog,
    config: &TranslatorConfig,
    text: &str,
    parameters: &Parameters,
) -> Result<LogicalPlan<'c>> {
    run_pipeline(catalog, config, text, parameters).inspect_err(|err| {
        tracing::debug!(code = err.code(), offset = ?err.offset(), error = %err, "translation failed");
    })
}

fn run_pipeline<'c>(
    catalog: &'c SchemaCatalog,
    config: &TranslatorConfig,
    text: &str,
    parameters: &Parameters,
) -> Result<LogicalPlan<'c>> {
    let query = parse_query(text)?;
    let bound = Binder::new(catalog, parameters)
        .defer_missing(config.allow_deferred_parameters)
        .bind(&query)?;
    let plan = QueryPlanner::new()
        .max_union_branches(config.max_union_branches)
        .plan(bound)?;
    Ok(plan)
}
