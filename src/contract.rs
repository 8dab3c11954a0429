//! Contract loading and `$ref` resolution.
//!
//! The contract document is parsed once and shared read-only for the rest of
//! the run. Internal references are resolved by walking the pointer through
//! the document and memoized by pointer string, so resolving the same pointer
//! twice hands back the same shared node.

use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use moka::sync::Cache;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{ReferenceError, Result, ValidationError};
use crate::result::HttpMethod;

/// Upper bound on `$ref` -> `$ref` hops before giving up
const MAX_REF_HOPS: usize = 16;

/// Where a parameter is carried on the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    Query,
    Path,
    Header,
    Cookie,
}

impl ParameterLocation {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "query" => Some(ParameterLocation::Query),
            "path" => Some(ParameterLocation::Path),
            "header" => Some(ParameterLocation::Header),
            "cookie" => Some(ParameterLocation::Cookie),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Query => "query",
            ParameterLocation::Path => "path",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
        }
    }
}

/// A declared operation parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: Value,
}

/// One (path, method) pair declared in the contract
#[derive(Debug, Clone)]
pub struct Operation {
    /// 1-based identifier in document order
    pub id: usize,
    pub path: String,
    pub method: HttpMethod,
    /// Raw operation object from the contract
    pub definition: Arc<Value>,
    /// Path-level and operation-level parameters, merged
    pub parameters: Vec<Parameter>,
}

impl Operation {
    pub fn is_deprecated(&self) -> bool {
        self.definition
            .get("deprecated")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn request_body(&self) -> Option<&Value> {
        self.definition.get("requestBody")
    }

    pub fn responses(&self) -> Option<&Map<String, Value>> {
        self.definition.get("responses").and_then(Value::as_object)
    }

    /// Declared status-code keys in declaration order
    pub fn response_keys(&self) -> Vec<String> {
        self.responses()
            .map(|responses| responses.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// A schema node that is either borrowed from the caller or shared from the
/// resolution cache
#[derive(Debug, Clone)]
pub enum NodeRef<'a> {
    Borrowed(&'a Value),
    Shared(Arc<Value>),
}

impl Deref for NodeRef<'_> {
    type Target = Value;

    fn deref(&self) -> &Value {
        match self {
            NodeRef::Borrowed(value) => value,
            NodeRef::Shared(value) => value,
        }
    }
}

/// Loaded contract document plus its reference cache
pub struct ContractStore {
    document: Arc<Value>,
    resolved: Cache<String, Arc<Value>>,
    empty: Arc<Value>,
}

impl ContractStore {
    /// Read and parse a contract file (YAML or JSON)
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let document = if is_json {
            serde_json::from_str::<Value>(&content).map_err(|e| ValidationError::ContractLoad {
                path: path.to_path_buf(),
                details: e.to_string(),
            })?
        } else {
            parse_yaml(&content).map_err(|details| ValidationError::ContractLoad {
                path: path.to_path_buf(),
                details,
            })?
        };

        let store = Self::from_value(document).map_err(|e| match e {
            ValidationError::ContractLoad { details, .. } => ValidationError::ContractLoad {
                path: path.to_path_buf(),
                details,
            },
            other => other,
        })?;

        info!("Loaded OpenAPI contract: {}", store.title());
        Ok(store)
    }

    /// Parse a contract held in memory; YAML is a superset of JSON so both work
    pub fn parse(content: &str) -> Result<Self> {
        let document = parse_yaml(content).map_err(|details| ValidationError::ContractLoad {
            path: "<memory>".into(),
            details,
        })?;
        Self::from_value(document)
    }

    pub fn from_value(document: Value) -> Result<Self> {
        if !document.is_object() {
            return Err(ValidationError::ContractLoad {
                path: "<memory>".into(),
                details: "contract root must be a mapping".to_string(),
            });
        }

        Ok(Self {
            document: Arc::new(document),
            resolved: Cache::builder().build(),
            empty: Arc::new(Value::Object(Map::new())),
        })
    }

    pub fn document(&self) -> &Arc<Value> {
        &self.document
    }

    pub fn title(&self) -> &str {
        self.document
            .pointer("/info/title")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
    }

    /// Resolve an internal pointer, memoizing successful lookups
    pub fn try_resolve(&self, pointer: &str) -> std::result::Result<Arc<Value>, ReferenceError> {
        if let Some(hit) = self.resolved.get(pointer) {
            return Ok(hit);
        }

        self.resolved
            .try_get_with(pointer.to_string(), || self.lookup(pointer))
            .map_err(|e| (*e).clone())
    }

    /// Resolve a pointer, degrading to an empty node with a warning
    pub fn resolve_reference(&self, pointer: &str) -> Arc<Value> {
        match self.try_resolve(pointer) {
            Ok(node) => node,
            Err(e) => {
                warn!("{}", e);
                Arc::clone(&self.empty)
            }
        }
    }

    /// Follow `$ref` chains starting at `node`
    pub fn resolve_node<'a>(&self, node: &'a Value) -> NodeRef<'a> {
        let mut current = NodeRef::Borrowed(node);

        for _ in 0..MAX_REF_HOPS {
            let Some(next) = reference_of(&current).map(|pointer| self.resolve_reference(pointer))
            else {
                return current;
            };
            current = NodeRef::Shared(next);
        }

        warn!("Reference chain exceeds {} hops", MAX_REF_HOPS);
        NodeRef::Shared(Arc::clone(&self.empty))
    }

    fn lookup(&self, pointer: &str) -> std::result::Result<Arc<Value>, ReferenceError> {
        let Some(rest) = pointer.strip_prefix("#/") else {
            return Err(ReferenceError::External {
                pointer: pointer.to_string(),
            });
        };

        let mut current: &Value = &self.document;
        for raw in rest.split('/') {
            let segment = raw.replace("~1", "/").replace("~0", "~");
            current = match current {
                Value::Object(map) => map.get(&segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            }
            .ok_or_else(|| ReferenceError::Unresolvable {
                pointer: pointer.to_string(),
            })?;
        }

        debug!("Resolved ref {}", pointer);
        Ok(Arc::new(current.clone()))
    }

    /// Enumerate every operation in document order with stable 1-based ids
    pub fn operations(&self) -> Vec<Operation> {
        let Some(paths) = self.document.get("paths").and_then(Value::as_object) else {
            return Vec::new();
        };

        let mut operations = Vec::new();
        for (path, path_item) in paths {
            let path_item = self.resolve_node(path_item);
            let Some(item) = path_item.as_object() else {
                continue;
            };

            let shared = self.parameters_of(item.get("parameters"));

            for (key, definition) in item {
                let Some(method) = HttpMethod::from_key(key) else {
                    continue;
                };

                let own = self.parameters_of(definition.get("parameters"));
                operations.push(Operation {
                    id: operations.len() + 1,
                    path: path.clone(),
                    method,
                    definition: Arc::new(definition.clone()),
                    parameters: merge_parameters(&shared, own),
                });
            }
        }

        operations
    }

    /// Raw operation object as declared, for display
    pub fn operation_definition(&self, path: &str, method: HttpMethod) -> Option<&Value> {
        self.document
            .get("paths")
            .and_then(|paths| paths.get(path))
            .and_then(|item| item.get(method.key()))
    }

    fn parameters_of(&self, list: Option<&Value>) -> Vec<Parameter> {
        let Some(entries) = list.and_then(Value::as_array) else {
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|entry| {
                let entry = self.resolve_node(entry);
                let name = entry.get("name").and_then(Value::as_str)?;
                let location = entry
                    .get("in")
                    .and_then(Value::as_str)
                    .and_then(ParameterLocation::from_key);
                let Some(location) = location else {
                    debug!("Ignoring parameter {} with unknown location", name);
                    return None;
                };

                Some(Parameter {
                    name: name.to_string(),
                    location,
                    required: entry
                        .get("required")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                    schema: entry
                        .get("schema")
                        .cloned()
                        .unwrap_or_else(|| Value::Object(Map::new())),
                })
            })
            .collect()
    }
}

fn reference_of<'v>(node: &'v Value) -> Option<&'v str> {
    node.get("$ref").and_then(Value::as_str)
}

/// Path-level parameters apply unless the operation redeclares the same
/// (name, location) pair
fn merge_parameters(shared: &[Parameter], own: Vec<Parameter>) -> Vec<Parameter> {
    let mut merged: Vec<Parameter> = shared
        .iter()
        .filter(|p| {
            !own.iter()
                .any(|o| o.name == p.name && o.location == p.location)
        })
        .cloned()
        .collect();
    merged.extend(own);
    merged
}

fn parse_yaml(content: &str) -> std::result::Result<Value, String> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
    Ok(yaml_to_json(yaml))
}

/// Convert YAML to JSON, stringifying non-string mapping keys such as `200:`
fn yaml_to_json(yaml: serde_yaml::Value) -> Value {
    match yaml {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => {
            Value::Array(items.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                map.insert(yaml_key(key), yaml_to_json(value));
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}
