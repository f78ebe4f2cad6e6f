//! Bind-parameter allocation

use crate::binder::Parameters;
use crate::config::PlaceholderStyle;
use kgsql_core::Value;
use serde::{Deserialize, Serialize};

/// A placeholder whose value the executor supplies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredParam {
    /// 1-based position in `bind_params`
    pub index: usize,
    pub name: String,
}

/// What a `$n` slot holds; equal keys share a slot
#[derive(Debug, Clone, PartialEq)]
enum SlotKey {
    Parameter(String),
    Value(Value),
}

/// Collects bind values while the SQL text is written.
///
/// Placeholders must be requested in text order: with
/// [`PlaceholderStyle::Question`] the position of a value in `values` is
/// the position of its `?` in the text.
pub(crate) struct ParamSink<'p> {
    style: PlaceholderStyle,
    parameters: &'p Parameters,
    keys: Vec<SlotKey>,
    values: Vec<Value>,
    deferred: Vec<DeferredParam>,
}

impl<'p> ParamSink<'p> {
    pub(crate) fn new(style: PlaceholderStyle, parameters: &'p Parameters) -> Self {
        Self {
            style,
            parameters,
            keys: Vec::new(),
            values: Vec::new(),
            deferred: Vec::new(),
        }
    }

    /// Placeholder for a constant
    pub(crate) fn value(&mut self, value: Value) -> String {
        self.slot(SlotKey::Value(value.clone()), value, None)
    }

    /// Placeholder for a constant string such as a label or property key
    pub(crate) fn text(&mut self, text: &str) -> String {
        self.value(Value::String(text.to_string()))
    }

    /// Placeholder for a named query parameter
    pub(crate) fn parameter(&mut self, name: &str) -> String {
        let (value, deferred) = match self.parameters.get(name) {
            Some(value) => (value.clone(), None),
            None => (Value::Null, Some(name.to_string())),
        };
        self.slot(SlotKey::Parameter(name.to_string()), value, deferred)
    }

    fn slot(&mut self, key: SlotKey, value: Value, deferred: Option<String>) -> String {
        match self.style {
            PlaceholderStyle::Dollar => {
                if let Some(i) = self.keys.iter().position(|k| *k == key) {
                    return format!("${}", i + 1);
                }
                self.push(key, value, deferred);
                format!("${}", self.values.len())
            }
            PlaceholderStyle::Question => {
                self.push(key, value, deferred);
                "?".to_string()
            }
        }
    }

    fn push(&mut self, key: SlotKey, value: Value, deferred: Option<String>) {
        self.keys.push(key);
        self.values.push(value);
        if let Some(name) = deferred {
            self.deferred.push(DeferredParam {
                index: self.values.len(),
                name,
            });
        }
    }

    pub(crate) fn finish(self) -> (Vec<Value>, Vec<DeferredParam>) {
        (self.values, self.deferred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dollar_slots_are_shared() {
        let params = Parameters::new().with("pid", "P:1");
        let mut sink = ParamSink::new(PlaceholderStyle::Dollar, &params);

        assert_eq!(sink.parameter("pid"), "$1");
        assert_eq!(sink.text("Protein"), "$2");
        assert_eq!(sink.parameter("pid"), "$1");
        assert_eq!(sink.text("Protein"), "$2");
        // Same text as the parameter's value, but a different slot
        assert_eq!(sink.text("P:1"), "$3");

        let (values, deferred) = sink.finish();
        assert_eq!(
            values,
            vec![Value::from("P:1"), Value::from("Protein"), Value::from("P:1")]
        );
        assert!(deferred.is_empty());
    }

    #[test]
    fn test_question_slots_follow_occurrences() {
        let params = Parameters::new().with("k", 5);
        let mut sink = ParamSink::new(PlaceholderStyle::Question, &params);

        assert_eq!(sink.parameter("k"), "?");
        assert_eq!(sink.value(Value::Integer(1)), "?");
        assert_eq!(sink.parameter("k"), "?");

        let (values, _) = sink.finish();
        assert_eq!(
            values,
            vec![Value::Integer(5), Value::Integer(1), Value::Integer(5)]
        );
    }

    #[test]
    fn test_deferred_parameters_bind_null() {
        let params = Parameters::new().defer("tenant");
        let mut sink = ParamSink::new(PlaceholderStyle::Dollar, &params);

        assert_eq!(sink.text("x"), "$1");
        assert_eq!(sink.parameter("tenant"), "$2");
        assert_eq!(sink.parameter("tenant"), "$2");

        let (values, deferred) = sink.finish();
        assert_eq!(values, vec![Value::from("x"), Value::Null]);
        assert_eq!(
            deferred,
            vec![DeferredParam {
                index: 2,
                name: "tenant".to_string()
            }]
        );
    }
}
