//! Structural parameter schema: the validation source of truth for a tool's
//! arguments, and the thing [`ParamSchema::to_json_schema`] derives an LLM
//! JSON-Schema descriptor from when a tool has no explicit one.

use serde_json::{Map, Value, json};

/// One field's type, used both for argument validation and for JSON-Schema
/// derivation.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array(Box<FieldType>),
    Object(Vec<Field>),
    /// No constraint — any value is accepted and no `type` is emitted.
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub description: Option<String>,
    pub required: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            description: None,
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// An object-shaped parameter schema: the top-level type every tool's
/// `parameter_schema()` returns (LLM tool parameters are always `type:
/// object`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSchema {
    pub fields: Vec<Field>,
}

impl ParamSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Derive a JSON-Schema-like descriptor: `type: object`, `properties`,
    /// `required`.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for field in &self.fields {
            properties.insert(field.name.clone(), field_to_json_schema(field));
            if field.required {
                required.push(Value::String(field.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": Value::Object(properties),
            "required": required,
        })
    }

    /// Validate `args` against this schema, returning human-readable issues.
    /// Empty means the arguments are valid.
    pub fn validate(&self, args: &Value) -> Vec<String> {
        let Some(obj) = args.as_object() else {
            return vec!["arguments must be a JSON object".to_string()];
        };

        let mut issues = Vec::new();
        for field in &self.fields {
            match obj.get(&field.name) {
                Some(value) => {
                    if let Some(issue) = check_type(&field.name, &field.field_type, value) {
                        issues.push(issue);
                    }
                }
                None if field.required => {
                    issues.push(format!("missing required field \"{}\"", field.name));
                }
                None => {}
            }
        }
        issues
    }
}

fn field_to_json_schema(field: &Field) -> Value {
    let mut schema = type_to_json_schema(&field.field_type);
    if let (Some(obj), Some(desc)) = (schema.as_object_mut(), &field.description) {
        obj.insert("description".to_string(), Value::String(desc.clone()));
    }
    schema
}

fn type_to_json_schema(field_type: &FieldType) -> Value {
    match field_type {
        FieldType::String => json!({"type": "string"}),
        FieldType::Number => json!({"type": "number"}),
        FieldType::Boolean => json!({"type": "boolean"}),
        FieldType::Array(inner) => json!({"type": "array", "items": type_to_json_schema(inner)}),
        FieldType::Object(fields) => {
            let nested = ParamSchema {
                fields: fields.clone(),
            };
            nested.to_json_schema()
        }
        FieldType::Unknown => json!({}),
    }
}

fn check_type(name: &str, field_type: &FieldType, value: &Value) -> Option<String> {
    let ok = match field_type {
        FieldType::String => value.is_string(),
        FieldType::Number => value.is_number(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::Array(inner) => match value.as_array() {
            Some(items) => items
                .iter()
                .enumerate()
                .find_map(|(i, item)| check_type(&format!("{name}[{i}]"), inner, item))
                .is_none(),
            None => false,
        },
        FieldType::Object(fields) => {
            let nested = ParamSchema {
                fields: fields.clone(),
            };
            return nested
                .validate(value)
                .into_iter()
                .next()
                .map(|issue| format!("{name}.{issue}"));
        }
        FieldType::Unknown => true,
    };

    if ok {
        None
    } else {
        Some(format!("field \"{name}\" has the wrong type"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> ParamSchema {
        ParamSchema::new()
            .field(Field::new("path", FieldType::String).describe("file path"))
            .field(Field::new("recursive", FieldType::Boolean).optional())
    }

    #[test]
    fn to_json_schema_marks_required_vs_optional() {
        let schema = sample_schema().to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["path"]["type"], "string");
        assert_eq!(schema["properties"]["path"]["description"], "file path");
        let required = schema["required"].as_array().unwrap();
        assert!(required.contains(&Value::String("path".to_string())));
        assert!(!required.contains(&Value::String("recursive".to_string())));
    }

    #[test]
    fn validate_accepts_well_formed_arguments() {
        let schema = sample_schema();
        let issues = schema.validate(&json!({"path": "/tmp/x"}));
        assert!(issues.is_empty());
    }

    #[test]
    fn validate_flags_missing_required_field() {
        let schema = sample_schema();
        let issues = schema.validate(&json!({}));
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("path"));
    }

    #[test]
    fn validate_flags_wrong_type() {
        let schema = sample_schema();
        let issues = schema.validate(&json!({"path": 5}));
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("path"));
    }

    #[test]
    fn validate_rejects_non_object_arguments() {
        let schema = sample_schema();
        let issues = schema.validate(&json!("not an object"));
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn nested_object_field_validates_recursively() {
        let schema = ParamSchema::new().field(Field::new(
            "target",
            FieldType::Object(vec![Field::new("id", FieldType::String)]),
        ));
        let issues = schema.validate(&json!({"target": {}}));
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("target.id") || issues[0].contains("id"));
    }

    #[test]
    fn array_field_validates_each_item() {
        let schema =
            ParamSchema::new().field(Field::new("tags", FieldType::Array(Box::new(FieldType::String))));
        assert!(schema.validate(&json!({"tags": ["a", "b"]})).is_empty());
        assert_eq!(schema.validate(&json!({"tags": ["a", 1]})).len(), 1);
    }

    #[test]
    fn unknown_type_accepts_anything() {
        let schema = ParamSchema::new().field(Field::new("anything", FieldType::Unknown));
        assert!(schema.validate(&json!({"anything": {"x": 1}})).is_empty());
    }
}
