//! kgsql - graph pattern query to SQL translator
//!
//! This is the main library crate that re-exports all kgsql components.

pub use kgsql_core as core;
pub use kgsql_query as query;

// Re-export commonly used types
pub use kgsql_core::{Direction, Error, Result, SchemaCatalog, Value, ValueKind};

pub use kgsql_query::{
    CompiledQuery, LogicalPlan, Parameters, PlaceholderStyle, Translator, TranslatorConfig,
    translate,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facade_translates_with_json_catalog() {
        let catalog = SchemaCatalog::from_json(
            r#"{"labels": {"Protein": {"properties": {"id": "string"}}}, "max_hop_ceiling": 2}"#,
        )
        .unwrap();
        let params = Parameters::new().with("pid", "P:1");
        let compiled = translate("MATCH (p:Protein {id: $pid}) RETURN p.id", &params, &catalog)
            .unwrap();

        let json = serde_json::to_value(&compiled).unwrap();
        assert_eq!(json["outcome"], "rows");
        assert_eq!(json["result_map"][0]["alias"], "id");
        assert!(compiled.bind_params.contains(&Value::from("P:1")));
    }
}
