//! Canonical operation schema and its two projections
//!
//! Every tool operation declares its input contract exactly once, as an
//! [`OperationSchema`]. The model-facing views are *derived* from it:
//!
//! ```text
//!                    ┌──────────────────────┐
//!                    │   OperationSchema    │
//!                    │ name, params, tag?   │
//!                    └──────────┬───────────┘
//!               ┌───────────────┴───────────────┐
//!               ▼                               ▼
//!   ┌──────────────────────┐        ┌──────────────────────┐
//!   │   FunctionSchema     │        │      TagSchema       │
//!   │ (structured calls)   │        │ (inline markup tags) │
//!   └──────────────────────┘        └──────────────────────┘
//! ```
//!
//! Both projections are pure functions of the canonical schema, so the two
//! views cannot drift apart. Validation (see [`super::validation`]) runs
//! against the same [`ParamSpec`] list.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// Type of a single operation parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    /// Homogeneous list of the inner type
    Array(Box<ParamType>),
    /// String restricted to a fixed set of values
    Enum(Vec<String>),
    /// Free-form JSON object
    Object,
}

impl ParamType {
    /// JSON type name used by both projections.
    pub fn json_type(&self) -> &'static str {
        match self {
            ParamType::String | ParamType::Enum(_) => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Array(_) => "array",
            ParamType::Object => "object",
        }
    }

    fn to_json_schema(&self) -> Map<String, Value> {
        let mut schema = Map::new();
        schema.insert("type".into(), Value::from(self.json_type()));
        match self {
            ParamType::Array(items) => {
                schema.insert("items".into(), Value::Object(items.to_json_schema()));
            }
            ParamType::Enum(values) => {
                schema.insert("enum".into(), json!(values));
            }
            _ => {}
        }
        schema
    }
}

/// A single named parameter of an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamType,
    pub description: String,
    pub required: bool,
    /// Applied by validation when the caller omits the parameter
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, kind: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: false,
            default: None,
        }
    }

    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ParamType::String, description)
    }

    pub fn integer(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ParamType::Integer, description)
    }

    pub fn number(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ParamType::Number, description)
    }

    pub fn boolean(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ParamType::Boolean, description)
    }

    pub fn string_list(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ParamType::Array(Box::new(ParamType::String)), description)
    }

    pub fn one_of<S: Into<String>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = S>,
        description: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            ParamType::Enum(values.into_iter().map(Into::into).collect()),
            description,
        )
    }

    /// Mark the parameter as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Markup-tag exposure of an operation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TagSpec {
    pub tag_name: String,
    /// Falls back to the operation description when absent
    pub description: Option<String>,
    /// Literal example snippets; derived from the operation examples when empty
    pub examples: Vec<String>,
}

impl TagSpec {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }
}

/// Canonical, single-source description of one tool operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSchema {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    /// Example argument objects
    pub examples: Vec<Value>,
    pub tag: Option<TagSpec>,
}

impl OperationSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
            examples: Vec::new(),
            tag: None,
        }
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn example(mut self, example: Value) -> Self {
        self.examples.push(example);
        self
    }

    pub fn with_tag(mut self, tag: TagSpec) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn tag_name(&self) -> Option<&str> {
        self.tag.as_ref().map(|t| t.tag_name.as_str())
    }

    pub fn get_param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Project to the structured function-call view.
    pub fn to_function_schema(&self) -> FunctionSchema {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.params {
            let mut prop = param.kind.to_json_schema();
            prop.insert("description".into(), Value::from(param.description.clone()));
            if let Some(default) = &param.default {
                prop.insert("default".into(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(prop));
            if param.required {
                required.push(Value::from(param.name.clone()));
            }
        }

        FunctionSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
            examples: self.examples.clone(),
        }
    }

    /// Project to the markup-tag view. `None` when the operation has no tag.
    pub fn to_tag_schema(&self) -> Option<TagSchema> {
        let tag = self.tag.as_ref()?;

        let parameters = self
            .params
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    TagParameter {
                        param_type: p.kind.json_type().to_string(),
                        description: p.description.clone(),
                        required: p.required,
                    },
                )
            })
            .collect();

        let examples = if tag.examples.is_empty() {
            self.examples
                .iter()
                .filter_map(|e| e.as_object())
                .map(|args| render_tag_example(&tag.tag_name, args))
                .collect()
        } else {
            tag.examples.clone()
        };

        Some(TagSchema {
            tag_name: tag.tag_name.clone(),
            description: tag
                .description
                .clone()
                .unwrap_or_else(|| self.description.clone()),
            parameters,
            examples,
        })
    }

    /// Both descriptors for this operation, function view first.
    pub fn descriptors(&self) -> Vec<SchemaDescriptor> {
        let mut out = vec![SchemaDescriptor::Function(self.to_function_schema())];
        if let Some(tag) = self.to_tag_schema() {
            out.push(SchemaDescriptor::Tag(tag));
        }
        out
    }
}

fn render_tag_example(tag_name: &str, args: &Map<String, Value>) -> String {
    let mut out = format!("<{tag_name}>\n");
    for (key, value) in args {
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out.push_str(&format!("<{key}>{text}</{key}>\n"));
    }
    out.push_str(&format!("</{tag_name}>"));
    out
}

/// Structured function-call descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    /// JSON-Schema object describing the arguments
    pub parameters: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Value>,
}

impl FunctionSchema {
    /// Wrapper shape expected by OpenAI-compatible tool-calling APIs.
    pub fn to_tool_declaration(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// Parameter entry of a [`TagSchema`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagParameter {
    #[serde(rename = "type")]
    pub param_type: String,
    pub description: String,
    pub required: bool,
}

/// Markup-tag descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagSchema {
    pub tag_name: String,
    pub description: String,
    pub parameters: BTreeMap<String, TagParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
}

/// One calling-convention view of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "schema_type", rename_all = "snake_case")]
pub enum SchemaDescriptor {
    Function(FunctionSchema),
    Tag(TagSchema),
}

/// Operation name → its descriptors.
pub type ToolSchemas = BTreeMap<String, Vec<SchemaDescriptor>>;

/// Build the descriptor map for a set of operations.
pub fn schema_map(operations: &[OperationSchema]) -> ToolSchemas {
    operations
        .iter()
        .map(|op| (op.name.clone(), op.descriptors()))
        .collect()
}
