//! Request planning.
//!
//! A [`RequestPlan`] is everything needed to exercise one operation: the
//! final URL, query and header values, and an optional JSON body. Problems
//! found while planning are carried on the plan rather than aborting it, so
//! the request is still attempted and the problems surface in the result.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::Url;
use serde_json::{Map, Value};
use tracing::debug;

use crate::contract::{ContractStore, Operation, ParameterLocation};
use crate::error::{Result, ValidationError};
use crate::result::{HttpMethod, RequestRecord, ResultError};
use crate::synth::ExampleSynthesizer;

pub const JSON_MEDIA_TYPE: &str = "application/json";

/// A fully planned request for one operation
#[derive(Debug, Clone)]
pub struct RequestPlan {
    pub method: HttpMethod,
    /// Path template with path parameters substituted
    pub path: String,
    pub url: String,
    /// Session headers followed by header parameters
    pub headers: BTreeMap<String, String>,
    pub query: Map<String, Value>,
    pub body: Option<Value>,
    pub errors: Vec<ResultError>,
}

impl RequestPlan {
    /// The plan as recorded on a result
    pub fn record(&self) -> RequestRecord {
        RequestRecord {
            method: self.method,
            url: self.url.clone(),
            headers: self.headers.clone(),
            query: self.query.clone(),
            body: self.body.clone(),
        }
    }

    /// Query values flattened into wire pairs; arrays repeat their key
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (name, value) in &self.query {
            match value {
                Value::Array(items) => {
                    pairs.extend(items.iter().map(|item| (name.clone(), plain_text(item))))
                }
                other => pairs.push((name.clone(), plain_text(other))),
            }
        }
        pairs
    }
}

/// Builds the base URL `{scheme}://{host}:{port}{base_path}/`
pub fn base_url(scheme: &str, hostname: &str, port: u16, base_path: &str) -> Result<Url> {
    let base_path = base_path.trim_end_matches('/');
    let raw = format!("{}://{}:{}{}/", scheme, hostname, port, base_path);
    Url::parse(&raw).map_err(|e| ValidationError::InvalidBaseUrl {
        url: raw.clone(),
        details: e.to_string(),
    })
}

/// Turns operations into concrete requests
pub struct RequestPlanner {
    store: Arc<ContractStore>,
    base_url: Url,
    session_headers: BTreeMap<String, String>,
}

impl RequestPlanner {
    pub fn new(
        store: Arc<ContractStore>,
        base_url: Url,
        session_headers: BTreeMap<String, String>,
    ) -> Self {
        Self {
            store,
            base_url,
            session_headers,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn plan(&self, operation: &Operation) -> RequestPlan {
        let synth = ExampleSynthesizer::new(&self.store);
        let mut errors = Vec::new();
        let mut path = operation.path.clone();
        let mut query = Map::new();
        let mut headers = self.session_headers.clone();

        for parameter in &operation.parameters {
            if !parameter.required && operation.method.is_read_only() {
                continue;
            }

            let Some(value) = synth.synthesize(&parameter.schema, Some(&parameter.name)) else {
                if parameter.required {
                    errors.push(ResultError::other(format!(
                        "Could not generate required parameter: {}",
                        parameter.name
                    )));
                }
                continue;
            };

            match parameter.location {
                ParameterLocation::Query => {
                    query.insert(parameter.name.clone(), value);
                }
                ParameterLocation::Path => {
                    path = path.replace(&format!("{{{}}}", parameter.name), &plain_text(&value));
                }
                ParameterLocation::Header => {
                    headers.insert(parameter.name.clone(), plain_text(&value));
                }
                ParameterLocation::Cookie => {}
            }
        }

        let body = self.plan_body(operation, &synth, &mut errors);

        let url = match self.base_url.join(path.trim_start_matches('/')) {
            Ok(url) => url.to_string(),
            Err(e) => {
                errors.push(ResultError::other(format!("Unexpected error: {}", e)));
                format!("{}{}", self.base_url, path.trim_start_matches('/'))
            }
        };

        debug!("Planned {} {}", operation.method, url);

        RequestPlan {
            method: operation.method,
            path,
            url,
            headers,
            query,
            body,
            errors,
        }
    }

    fn plan_body(
        &self,
        operation: &Operation,
        synth: &ExampleSynthesizer<'_>,
        errors: &mut Vec<ResultError>,
    ) -> Option<Value> {
        let request_body = self.store.resolve_node(operation.request_body()?);
        let schema = request_body
            .get("content")
            .and_then(|content| content.get(JSON_MEDIA_TYPE))?
            .get("schema")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        let body = synth.synthesize(&schema, None);
        let required = request_body
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if body.is_none() && required {
            errors.push(ResultError::other("Could not generate required request body"));
        }
        body
    }
}

/// Text form of a value as it appears in a URL or header
fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ErrorKind;
    use serde_json::json;

    fn planner(document: Value) -> (Arc<ContractStore>, RequestPlanner) {
        let store = Arc::new(ContractStore::from_value(document).unwrap());
        let base = base_url("http", "localhost", 9000, "/api").unwrap();
        let mut headers = BTreeMap::new();
        headers.insert("Accept".to_string(), "application/json".to_string());
        let planner = RequestPlanner::new(Arc::clone(&store), base, headers);
        (store, planner)
    }

    fn operation(store: &ContractStore, id: usize) -> Operation {
        store
            .operations()
            .into_iter()
            .find(|op| op.id == id)
            .unwrap()
    }

    #[test]
    fn test_base_url_shape() {
        let url = base_url("https", "graylog.local", 443, "/api").unwrap();
        assert_eq!(url.as_str(), "https://graylog.local/api/");

        let url = base_url("http", "localhost", 9000, "/api/").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/api/");

        let url = base_url("http", "localhost", 9000, "").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/");

        assert!(base_url("http", "bad host", 9000, "/api").is_err());
    }

    #[test]
    fn test_get_omits_optional_parameters() {
        let (store, planner) = planner(json!({
            "paths": {
                "/streams/{streamId}": {
                    "get": {
                        "parameters": [
                            {"name": "streamId", "in": "path", "required": true, "schema": {"type": "string"}},
                            {"name": "page", "in": "query", "schema": {"type": "integer"}},
                            {"name": "query", "in": "query", "required": true, "schema": {"type": "string"}}
                        ],
                        "responses": {"200": {"description": "ok"}}
                    }
                }
            }
        }));

        let plan = planner.plan(&operation(&store, 1));

        assert_eq!(plan.url, "http://localhost:9000/api/streams/test-id");
        assert_eq!(plan.path, "/streams/test-id");
        assert_eq!(plan.query, json!({"query": "*"}).as_object().cloned().unwrap());
        assert!(plan.body.is_none());
        assert!(plan.errors.is_empty());
    }

    #[test]
    fn test_non_get_synthesizes_every_parameter() {
        let (store, planner) = planner(json!({
            "paths": {
                "/search": {
                    "post": {
                        "parameters": [
                            {"name": "size", "in": "query", "schema": {"type": "integer"}},
                            {"name": "X-Trace", "in": "header", "schema": {"type": "integer", "minimum": 7}},
                            {"name": "session", "in": "cookie", "schema": {"type": "string"}}
                        ],
                        "responses": {"200": {"description": "ok"}}
                    }
                }
            }
        }));

        let plan = planner.plan(&operation(&store, 1));

        assert_eq!(plan.query.get("size"), Some(&json!(10)));
        assert_eq!(plan.headers.get("X-Trace").map(String::as_str), Some("7"));
        assert_eq!(
            plan.headers.get("Accept").map(String::as_str),
            Some("application/json")
        );
        assert!(!plan.headers.contains_key("session"));
    }

    #[test]
    fn test_unsynthesizable_required_parameter_is_a_planning_error() {
        let (store, planner) = planner(json!({
            "paths": {
                "/things/{thingId}": {
                    "get": {
                        "parameters": [
                            {"name": "thingId", "in": "path", "required": true, "schema": {}}
                        ],
                        "responses": {"200": {"description": "ok"}}
                    }
                }
            }
        }));

        let plan = planner.plan(&operation(&store, 1));

        assert_eq!(plan.errors.len(), 1);
        assert_eq!(plan.errors[0].kind, ErrorKind::Other);
        assert_eq!(
            plan.errors[0].message,
            "Could not generate required parameter: thingId"
        );
        assert!(plan.url.contains("things/%7BthingId%7D"));
    }

    #[test]
    fn test_body_from_referenced_request_body() {
        let (store, planner) = planner(json!({
            "paths": {
                "/users": {
                    "post": {
                        "requestBody": {"$ref": "#/components/requestBodies/NewUser"},
                        "responses": {"201": {"description": "created"}}
                    }
                }
            },
            "components": {
                "requestBodies": {
                    "NewUser": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {
                                    "type": "object",
                                    "required": ["username"],
                                    "properties": {"username": {"type": "string"}}
                                }
                            }
                        }
                    }
                }
            }
        }));

        let plan = planner.plan(&operation(&store, 1));

        assert_eq!(plan.body, Some(json!({"username": "test-name"})));
        assert!(plan.errors.is_empty());
    }

    #[test]
    fn test_required_body_without_value_is_a_planning_error() {
        let (store, planner) = planner(json!({
            "paths": {
                "/upload": {
                    "put": {
                        "requestBody": {
                            "required": true,
                            "content": {"application/json": {"schema": {"type": "file"}}}
                        },
                        "responses": {"204": {"description": "done"}}
                    }
                },
                "/form": {
                    "post": {
                        "requestBody": {
                            "required": true,
                            "content": {"application/x-www-form-urlencoded": {"schema": {"type": "object"}}}
                        },
                        "responses": {"204": {"description": "done"}}
                    }
                }
            }
        }));

        let plan = planner.plan(&operation(&store, 1));
        assert!(plan.body.is_none());
        assert_eq!(
            plan.errors[0].message,
            "Could not generate required request body"
        );

        // only JSON bodies are synthesized
        let plan = planner.plan(&operation(&store, 2));
        assert!(plan.body.is_none());
        assert!(plan.errors.is_empty());
    }

    #[test]
    fn test_query_pairs_flatten_arrays() {
        let mut query = Map::new();
        query.insert("fields".to_string(), json!(["a", "b"]));
        query.insert("limit".to_string(), json!(5));
        query.insert("flag".to_string(), json!(false));

        let plan = RequestPlan {
            method: HttpMethod::Get,
            path: "/x".to_string(),
            url: "http://localhost/api/x".to_string(),
            headers: BTreeMap::new(),
            query,
            body: None,
            errors: Vec::new(),
        };

        assert_eq!(
            plan.query_pairs(),
            vec![
                ("fields".to_string(), "a".to_string()),
                ("fields".to_string(), "b".to_string()),
                ("limit".to_string(), "5".to_string()),
                ("flag".to_string(), "false".to_string()),
            ]
        );
    }
}
