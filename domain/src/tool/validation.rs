//! Parameter validation against an [`OperationSchema`]
//!
//! Validation is total: every violated field is reported, in parameter
//! declaration order followed by unknown keys in sorted order, so error
//! strings are reproducible. Tag invocations deliver every value as text,
//! which is why scalar strings are coerced to numbers and booleans when the
//! schema asks for them.

use super::schema::{OperationSchema, ParamType};
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// A single violated field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted path, e.g. `domains.1`
    pub path: String,
    pub reason: String,
}

impl FieldError {
    fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// All validation failures for one operation call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Parameter validation failed for {operation}: {}", render_fields(.errors))]
pub struct ValidationError {
    pub operation: String,
    pub errors: Vec<FieldError>,
}

fn render_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.path, e.reason))
        .collect::<Vec<_>>()
        .join(", ")
}

impl OperationSchema {
    /// Validate raw parameters, returning the normalised argument object
    /// (defaults applied, coercions performed).
    pub fn validate(&self, raw: &Value) -> Result<Map<String, Value>, ValidationError> {
        let empty = Map::new();
        let input = match raw {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(self.error(vec![FieldError::new(
                    "(root)",
                    format!("expected object, received {}", type_name(other)),
                )]));
            }
        };

        let mut errors = Vec::new();
        let mut normalized = Map::new();

        for param in &self.params {
            match input.get(&param.name) {
                None | Some(Value::Null) => {
                    if let Some(default) = &param.default {
                        normalized.insert(param.name.clone(), default.clone());
                    } else if param.required {
                        errors.push(FieldError::new(&param.name, "required"));
                    }
                }
                Some(value) => match check_value(&param.name, &param.kind, value) {
                    Ok(v) => {
                        normalized.insert(param.name.clone(), v);
                    }
                    Err(mut errs) => errors.append(&mut errs),
                },
            }
        }

        for key in input.keys() {
            if self.get_param(key).is_none() {
                errors.push(FieldError::new(key, "unknown parameter"));
            }
        }

        if errors.is_empty() {
            Ok(normalized)
        } else {
            Err(self.error(errors))
        }
    }

    /// Validate and deserialize into a typed parameter struct.
    pub fn parse<T: DeserializeOwned>(&self, raw: &Value) -> Result<T, ValidationError> {
        let normalized = self.validate(raw)?;
        serde_json::from_value(Value::Object(normalized))
            .map_err(|e| self.error(vec![FieldError::new("(root)", e.to_string())]))
    }

    fn error(&self, errors: Vec<FieldError>) -> ValidationError {
        ValidationError {
            operation: self.name.clone(),
            errors,
        }
    }
}

fn check_value(path: &str, kind: &ParamType, value: &Value) -> Result<Value, Vec<FieldError>> {
    let mismatch = || {
        vec![FieldError::new(
            path,
            format!("expected {}, received {}", kind.json_type(), type_name(value)),
        )]
    };

    match kind {
        ParamType::String => value.is_string().then(|| value.clone()).ok_or_else(mismatch),
        ParamType::Object => value.is_object().then(|| value.clone()).ok_or_else(mismatch),
        ParamType::Number => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        ParamType::Integer => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                    Ok(Value::from(f as i64))
                }
                _ => Err(mismatch()),
            },
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        ParamType::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
        ParamType::Enum(values) => match value.as_str() {
            Some(s) if values.iter().any(|v| v == s) => Ok(value.clone()),
            Some(s) => Err(vec![FieldError::new(
                path,
                format!(
                    "expected one of {}, received '{}'",
                    values
                        .iter()
                        .map(|v| format!("'{v}'"))
                        .collect::<Vec<_>>()
                        .join(" | "),
                    s
                ),
            )]),
            None => Err(mismatch()),
        },
        ParamType::Array(items) => {
            let Some(elements) = value.as_array() else {
                return Err(mismatch());
            };
            let mut errors = Vec::new();
            let mut out = Vec::with_capacity(elements.len());
            for (i, element) in elements.iter().enumerate() {
                match check_value(&format!("{path}.{i}"), items, element) {
                    Ok(v) => out.push(v),
                    Err(mut errs) => errors.append(&mut errs),
                }
            }
            if errors.is_empty() {
                Ok(Value::Array(out))
            } else {
                Err(errors)
            }
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::schema::ParamSpec;
    use serde::Deserialize;
    use serde_json::json;

    fn search_op() -> OperationSchema {
        OperationSchema::new("search", "Search the web")
            .param(ParamSpec::string("query", "Query").required())
            .param(ParamSpec::integer("max_results", "Result cap").with_default(5))
            .param(ParamSpec::one_of("depth", ["basic", "advanced"], "Depth"))
            .param(ParamSpec::string_list("domains", "Domain filter"))
            .param(ParamSpec::boolean("news", "News only"))
    }

    #[test]
    fn test_defaults_applied() {
        let args = search_op().validate(&json!({"query": "rust"})).unwrap();
        assert_eq!(args["max_results"], 5);
        assert!(!args.contains_key("depth"));
    }

    #[test]
    fn test_reports_every_violation() {
        let err = search_op()
            .validate(&json!({
                "max_results": "many",
                "depth": "deep",
                "domains": ["a.com", 7],
                "extra": true
            }))
            .unwrap_err();

        let paths: Vec<_> = err.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["query", "max_results", "depth", "domains.1", "extra"]);
        assert_eq!(
            err.to_string(),
            "Parameter validation failed for search: query: required, \
             max_results: expected integer, received string, \
             depth: expected one of 'basic' | 'advanced', received 'deep', \
             domains.1: expected string, received number, \
             extra: unknown parameter"
        );
    }

    #[test]
    fn test_string_coercion_for_tag_calls() {
        let args = search_op()
            .validate(&json!({"query": "q", "max_results": "10", "news": "true"}))
            .unwrap();
        assert_eq!(args["max_results"], 10);
        assert_eq!(args["news"], true);
    }

    #[test]
    fn test_null_treated_as_missing() {
        let err = search_op().validate(&json!({"query": null})).unwrap_err();
        assert_eq!(err.errors, vec![FieldError::new("query", "required")]);
        assert!(search_op().validate(&Value::Null).is_err());
    }

    #[test]
    fn test_non_object_rejected() {
        let err = search_op().validate(&json!("ls")).unwrap_err();
        assert_eq!(err.errors[0].path, "(root)");
    }

    #[test]
    fn test_parse_typed() {
        #[derive(Deserialize)]
        struct Params {
            query: String,
            max_results: u32,
        }

        let params: Params = search_op().parse(&json!({"query": "tokio"})).unwrap();
        assert_eq!(params.query, "tokio");
        assert_eq!(params.max_results, 5);
    }

    #[test]
    fn test_parse_reports_range_errors() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Params {
            query: String,
            max_results: u32,
        }

        let err = search_op()
            .parse::<Params>(&json!({"query": "q", "max_results": -1}))
            .unwrap_err();
        assert_eq!(err.errors[0].path, "(root)");
    }
}
