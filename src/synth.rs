//! Example value synthesis.
//!
//! Turns a contract schema into the simplest concrete value that satisfies
//! it. The generator is deterministic: the same schema and name hint always
//! produce the same value, so request payloads are reproducible between runs.

use serde_json::{Map, Value, json};

use crate::contract::ContractStore;

/// Nesting depth beyond which synthesis gives up, so recursive schemas terminate
pub const MAX_DEPTH: usize = 8;

/// Optional properties emitted per object before only required ones are added
const OPTIONAL_PROPERTY_BUDGET: usize = 3;

/// Declared type of a schema node, inferred when the `type` keyword is absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    /// `allOf` composition without an explicit type
    AllOf,
    /// `oneOf` / `anyOf` without an explicit type
    FirstOf,
    Unknown,
}

/// Read-only typed view over a raw schema node
#[derive(Debug, Clone, Copy)]
pub struct SchemaNode<'a> {
    raw: &'a Value,
}

impl<'a> SchemaNode<'a> {
    pub fn new(raw: &'a Value) -> Self {
        Self { raw }
    }

    pub fn is_empty(&self) -> bool {
        self.raw.as_object().is_none_or(|map| map.is_empty())
    }

    pub fn schema_type(&self) -> SchemaType {
        let declared = match self.raw.get("type") {
            Some(Value::String(name)) => Some(name.as_str()),
            // `type: [string, "null"]` style unions use their first concrete member
            Some(Value::Array(names)) => names
                .iter()
                .filter_map(Value::as_str)
                .find(|name| *name != "null"),
            _ => None,
        };

        match declared {
            Some("string") => SchemaType::String,
            Some("integer") => SchemaType::Integer,
            Some("number") => SchemaType::Number,
            Some("boolean") => SchemaType::Boolean,
            Some("array") => SchemaType::Array,
            Some("object") => SchemaType::Object,
            Some(_) => SchemaType::Unknown,
            None if self.raw.get("allOf").is_some() => SchemaType::AllOf,
            None if self.raw.get("oneOf").is_some() || self.raw.get("anyOf").is_some() => {
                SchemaType::FirstOf
            }
            None if self.raw.get("properties").is_some() => SchemaType::Object,
            None if self.raw.get("items").is_some() => SchemaType::Array,
            None => SchemaType::String,
        }
    }

    pub fn example(&self) -> Option<&'a Value> {
        self.raw.get("example").or_else(|| {
            self.raw
                .get("examples")
                .and_then(Value::as_array)
                .and_then(|examples| examples.first())
        })
    }

    pub fn default_value(&self) -> Option<&'a Value> {
        self.raw.get("default")
    }

    pub fn first_enum(&self) -> Option<&'a Value> {
        self.raw
            .get("enum")
            .and_then(Value::as_array)
            .and_then(|values| values.first())
    }

    pub fn format(&self) -> Option<&'a str> {
        self.raw.get("format").and_then(Value::as_str)
    }

    pub fn minimum(&self) -> Option<&'a Value> {
        self.raw.get("minimum").filter(|v| v.is_number())
    }

    pub fn properties(&self) -> Option<&'a Map<String, Value>> {
        self.raw.get("properties").and_then(Value::as_object)
    }

    pub fn required(&self) -> Vec<&'a str> {
        self.raw
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn items(&self) -> Option<&'a Value> {
        self.raw.get("items")
    }

    fn branches(&self, keyword: &str) -> &'a [Value] {
        self.raw
            .get(keyword)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Produces example values for schemas found in a contract
pub struct ExampleSynthesizer<'s> {
    store: &'s ContractStore,
}

impl<'s> ExampleSynthesizer<'s> {
    pub fn new(store: &'s ContractStore) -> Self {
        Self { store }
    }

    /// Synthesize a value for `schema`; `None` means no value could be produced
    pub fn synthesize(&self, schema: &Value, name_hint: Option<&str>) -> Option<Value> {
        self.synthesize_at(schema, name_hint, 0)
    }

    fn synthesize_at(&self, schema: &Value, name_hint: Option<&str>, depth: usize) -> Option<Value> {
        if depth > MAX_DEPTH {
            return None;
        }

        let resolved = self.store.resolve_node(schema);
        let node = SchemaNode::new(&resolved);
        if node.is_empty() {
            return None;
        }

        if let Some(example) = node.example() {
            return Some(example.clone());
        }
        if let Some(default) = node.default_value() {
            return Some(default.clone());
        }

        let hint = name_hint.map(str::to_lowercase);
        let hint = hint.as_deref();

        match node.schema_type() {
            SchemaType::String => Some(string_value(&node, hint)),
            SchemaType::Integer => Some(integer_value(&node, hint)),
            SchemaType::Number => Some(node.minimum().cloned().unwrap_or_else(|| json!(1.0))),
            SchemaType::Boolean => Some(Value::Bool(false)),
            SchemaType::Array => {
                let item = node
                    .items()
                    .and_then(|items| self.synthesize_at(items, None, depth + 1));
                Some(Value::Array(item.into_iter().collect()))
            }
            SchemaType::Object => Some(self.object_value(&node, depth)),
            SchemaType::AllOf => {
                let merged = self.merge_all_of(&node);
                Some(self.object_value(&SchemaNode::new(&merged), depth))
            }
            SchemaType::FirstOf => {
                let first = node
                    .branches("oneOf")
                    .first()
                    .or_else(|| node.branches("anyOf").first())?;
                self.synthesize_at(first, name_hint, depth + 1)
            }
            SchemaType::Unknown => None,
        }
    }

    fn object_value(&self, node: &SchemaNode<'_>, depth: usize) -> Value {
        let required = node.required();
        let mut object = Map::new();
        // keys that yield nothing still use up their slot
        let mut attempted = 0;

        if let Some(properties) = node.properties() {
            for (name, property) in properties {
                let wanted =
                    required.contains(&name.as_str()) || attempted < OPTIONAL_PROPERTY_BUDGET;
                if !wanted {
                    continue;
                }
                attempted += 1;
                if let Some(value) = self.synthesize_at(property, Some(name), depth + 1) {
                    object.insert(name.clone(), value);
                }
            }
        }

        Value::Object(object)
    }

    /// Flatten `allOf` branches into one object schema
    fn merge_all_of(&self, node: &SchemaNode<'_>) -> Value {
        let mut properties = Map::new();
        let mut required: Vec<Value> = Vec::new();

        for branch in node.branches("allOf") {
            let branch = self.store.resolve_node(branch);
            let branch = SchemaNode::new(&branch);
            if let Some(props) = branch.properties() {
                for (name, schema) in props {
                    properties
                        .entry(name.clone())
                        .or_insert_with(|| schema.clone());
                }
            }
            for name in branch.required() {
                let name = Value::String(name.to_string());
                if !required.contains(&name) {
                    required.push(name);
                }
            }
        }

        json!({ "type": "object", "properties": properties, "required": required })
    }
}

fn string_value(node: &SchemaNode<'_>, hint: Option<&str>) -> Value {
    if let Some(first) = node.first_enum() {
        return first.clone();
    }

    let canned = match node.format() {
        Some("date-time") => Some("2024-01-01T00:00:00.000Z"),
        Some("date") => Some("2024-01-01"),
        Some("email") => Some("test@example.com"),
        Some("uuid") => Some("123e4567-e89b-12d3-a456-426614174000"),
        _ => None,
    };
    if let Some(canned) = canned {
        return Value::String(canned.to_string());
    }

    let token = match hint {
        Some(h) if h.contains("id") => "test-id",
        Some(h) if h.contains("name") => "test-name",
        Some(h) if h.contains("query") => "*",
        _ => "test-string",
    };
    Value::String(token.to_string())
}

fn integer_value(node: &SchemaNode<'_>, hint: Option<&str>) -> Value {
    if let Some(first) = node.first_enum() {
        return first.clone();
    }

    match hint {
        Some(h) if h.contains("page") => json!(1),
        Some(h) if h.contains("size") => json!(10),
        _ => node.minimum().cloned().unwrap_or_else(|| json!(1)),
    }
}
