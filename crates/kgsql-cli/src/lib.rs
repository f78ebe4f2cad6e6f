//! kgsql command-line front end
//!
//! Loads a schema catalog, query parameters and translator settings from
//! JSON files and prints either the compiled SQL or the logical plan of a
//! graph pattern query.

pub mod config;

pub use config::{CliConfig, OutputFormat};

use kgsql_core::{Result, SchemaCatalog};
use kgsql_query::{CompiledQuery, Parameters, Translator};
use std::path::Path;
use tracing::{debug, info};

/// What to do with the query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Translate,
    Explain,
}

/// Read and validate a schema catalog
pub fn load_catalog(path: &Path) -> Result<SchemaCatalog> {
    let catalog = SchemaCatalog::from_json(&std::fs::read_to_string(path)?)?;
    debug!(path = %path.display(), "loaded catalog");
    Ok(catalog)
}

/// Read query parameters; no file means no parameters.
///
/// The file holds `{"values": {...}, "deferred": [...]}`, both keys optional.
pub fn load_parameters(path: Option<&Path>) -> Result<Parameters> {
    let Some(path) = path else {
        return Ok(Parameters::new());
    };
    let parameters: Parameters = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    debug!(
        path = %path.display(),
        values = parameters.values.len(),
        deferred = parameters.deferred.len(),
        "loaded parameters"
    );
    Ok(parameters)
}

/// Run one command and return the text to print
pub fn run(command: Command, config: &CliConfig, query: &str) -> Result<String> {
    let catalog = load_catalog(&config.catalog_path)?;
    let parameters = load_parameters(config.params_path.as_deref())?;
    let translator = Translator::with_config(catalog, config.translator_config()?)?;

    match command {
        Command::Translate => {
            let compiled = translator.translate(query, &parameters)?;
            info!(
                bind_params = compiled.bind_params.len(),
                deferred = compiled.deferred.len(),
                outcome = ?compiled.outcome,
                "translated query"
            );
            render(&compiled, config.format)
        }
        Command::Explain => translator.explain(query, &parameters),
    }
}

fn render(compiled: &CompiledQuery, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(compiled)?),
        OutputFormat::Sql => {
            let mut out = compiled.sql.clone();
            for (i, value) in compiled.bind_params.iter().enumerate() {
                out.push_str(&format!("\n-- {}: {}", i + 1, serde_json::to_string(value)?));
                if let Some(param) = compiled.deferred.iter().find(|d| d.index == i + 1) {
                    out.push_str(&format!(" (deferred ${})", param.name));
                }
            }
            for warning in &compiled.warnings {
                out.push_str(&format!("\n-- warning: {warning}"));
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgsql_core::Error;
    use kgsql_query::PlaceholderStyle;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    const CATALOG: &str = r#"{
        "labels": {
            "Protein": {"properties": {"id": "string", "name": "string"}, "estimated_count": 20000}
        },
        "relationship_types": {
            "INTERACTS_WITH": {"properties": {"weight": "number"}}
        },
        "max_hop_ceiling": 3
    }"#;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_catalog() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "catalog.json", CATALOG);
        let catalog = load_catalog(&path).unwrap();
        assert!(catalog.has_label("Protein"));
        assert_eq!(catalog.max_hop_ceiling, 3);

        let err = load_catalog(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_load_parameters() {
        assert_eq!(load_parameters(None).unwrap(), Parameters::new());

        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"values": {{"pid": "P:1"}}, "deferred": ["tenant"]}}"#).unwrap();
        let parameters = load_parameters(Some(file.path())).unwrap();
        assert_eq!(parameters.get("pid"), Some(&"P:1".into()));
        assert!(parameters.is_deferred("tenant"));

        let mut bad = NamedTempFile::new().unwrap();
        write!(bad, "not json").unwrap();
        let err = load_parameters(Some(bad.path())).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_run_translate() {
        let dir = TempDir::new().unwrap();
        let catalog = write_file(&dir, "catalog.json", CATALOG);
        let params = write_file(&dir, "params.json", r#"{"values": {"pid": "P:1"}}"#);
        let config = CliConfig::new(&catalog).params_path(&params);

        let out = run(
            Command::Translate,
            &config,
            "MATCH (p:Protein {id: $pid})-[:INTERACTS_WITH]->(q) RETURN q.id",
        )
        .unwrap();
        let compiled: CompiledQuery = serde_json::from_str(&out).unwrap();
        assert!(compiled.sql.contains("$1"));
        assert!(compiled.bind_params.contains(&"P:1".into()));
        assert!(!compiled.sql.contains("P:1"));
    }

    #[test]
    fn test_run_sql_format_with_deferred() {
        let dir = TempDir::new().unwrap();
        let catalog = write_file(&dir, "catalog.json", CATALOG);
        let config = CliConfig::new(&catalog)
            .placeholder(PlaceholderStyle::Question)
            .defer_missing()
            .format(OutputFormat::Sql);

        let out = run(
            Command::Translate,
            &config,
            "MATCH (p:Protein) WHERE p.id = $pid RETURN p.name",
        )
        .unwrap();
        assert!(out.starts_with("SELECT "));
        assert!(out.contains('?'));
        assert!(out.contains("null (deferred $pid)"));
    }

    #[test]
    fn test_run_explain_and_errors() {
        let dir = TempDir::new().unwrap();
        let catalog = write_file(&dir, "catalog.json", CATALOG);
        let config = CliConfig::new(&catalog);

        let out = run(Command::Explain, &config, "MATCH (p:Protein) RETURN p.id").unwrap();
        assert!(out.starts_with("Project"));
        assert!(out.contains("Scan p:Protein"));

        let err = run(Command::Translate, &config, "MATCH (p:Protein) RETURN p.id LIMIT $n")
            .unwrap_err();
        assert_eq!(err.code(), "UndeclaredParameter");
    }
}
