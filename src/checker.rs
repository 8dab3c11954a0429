//! Conformance checking of live responses.
//!
//! The checker sends a planned request, then compares what came back with
//! the operation's declared responses: first the status code (exact or
//! `NXX` wildcard classes), then, for non-error statuses with a JSON schema,
//! the body itself.

use std::sync::Arc;

use jsonschema::{Draft, Validator};
use moka::sync::Cache;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::contract::{ContractStore, Operation};
use crate::http_client::ApiClient;
use crate::planner::{JSON_MEDIA_TYPE, RequestPlan};
use crate::result::{ErrorKind, ResultError, ValidationResult};

pub const RATE_LIMIT_WARNING: &str = "Rate limited - consider reducing concurrent requests";

/// Find the declared response key covering an observed status code.
///
/// An exact key wins. Otherwise keys containing `XX` are tried in declaration
/// order with `XX` standing for any two characters, matched from the start of
/// the observed code. Other partial patterns such as `20X` never match.
pub fn match_status<'k>(observed: &str, declared: &'k [String]) -> Option<&'k str> {
    if let Some(exact) = declared.iter().find(|key| key.as_str() == observed) {
        return Some(exact.as_str());
    }

    declared
        .iter()
        .filter(|key| key.contains("XX"))
        .find(|key| {
            let pattern = format!("^{}", regex::escape(key).replace("XX", ".."));
            Regex::new(&pattern)
                .map(|re| re.is_match(observed))
                .unwrap_or(false)
        })
        .map(String::as_str)
}

/// A response schema compiled against the contract root, or the reason it
/// would not compile
pub type CompiledSchema = Result<Arc<Validator>, String>;

/// Compile `schema` with the whole contract available for resolving `#/...`
/// references inside it. An empty schema compiles to nothing.
pub fn compile_schema(document: &Value, schema: &Value) -> Option<CompiledSchema> {
    if schema.as_object().is_none_or(|map| map.is_empty()) {
        return None;
    }

    let mut root = document.clone();
    if let Some(map) = root.as_object_mut() {
        map.insert("allOf".to_string(), Value::Array(vec![schema.clone()]));
    }

    Some(
        jsonschema::options()
            .with_draft(Draft::Draft7)
            .build(&root)
            .map(Arc::new)
            .map_err(|e| e.to_string()),
    )
}

fn schema_errors(compiled: &CompiledSchema, instance: &Value) -> Vec<ResultError> {
    match compiled {
        Ok(validator) => validator
            .iter_errors(instance)
            .map(|error| ResultError::schema(error))
            .collect(),
        Err(e) => vec![ResultError::other(format!(
            "Unexpected error during schema validation: {}",
            e
        ))],
    }
}

/// Validate `instance` against `schema`, with the whole contract available
/// for resolving `#/...` references inside the schema
pub fn validate_schema(document: &Value, schema: &Value, instance: &Value) -> Vec<ResultError> {
    compile_schema(document, schema)
        .map(|compiled| schema_errors(&compiled, instance))
        .unwrap_or_default()
}

/// Sends plans and judges the responses
pub struct ConformanceChecker {
    client: Arc<ApiClient>,
    store: Arc<ContractStore>,
    /// Compiled response schemas keyed by operation id and response key
    compiled: Cache<(usize, String), Option<CompiledSchema>>,
}

impl ConformanceChecker {
    pub fn new(client: Arc<ApiClient>, store: Arc<ContractStore>) -> Self {
        Self {
            client,
            store,
            compiled: Cache::builder().build(),
        }
    }

    fn compiled_schema(
        &self,
        operation: &Operation,
        key: &str,
        schema: &Value,
    ) -> Option<CompiledSchema> {
        self.compiled.get_with((operation.id, key.to_string()), || {
            compile_schema(self.store.document(), schema)
        })
    }

    pub async fn execute(&self, plan: &RequestPlan, operation: &Operation) -> ValidationResult {
        let mut result = ValidationResult::attempt(operation.id, &operation.path, operation.method);
        result.errors.extend(plan.errors.iter().cloned());
        result.request = Some(plan.record());

        let response = match self.client.send(plan).await {
            Ok(response) => response,
            Err(e) => {
                result.errors.push(e.into());
                return result.finish();
            }
        };

        debug!(
            "{} {} answered {} in {:?}",
            plan.method, plan.url, response.status, response.elapsed
        );

        result.response_code = Some(response.status);
        result.response_time = Some(response.elapsed);

        let observed = response.status.to_string();
        let declared = operation.response_keys();
        match match_status(&observed, &declared) {
            None => result.errors.push(ResultError::new(
                ErrorKind::UnexpectedResponse,
                format!(
                    "Unexpected response code: {}. Expected: {:?}",
                    response.status, declared
                ),
            )),
            Some(key) if response.status < 400 => {
                self.check_body(operation, key, &response.body, &mut result);
            }
            Some(_) => {}
        }

        if response.status == 429 {
            warn!("Rate limited on {} {}", operation.method, operation.path);
            result.warnings.push(RATE_LIMIT_WARNING.to_string());
        }

        result.response_body = Some(response.body);
        result.finish()
    }

    fn check_body(
        &self,
        operation: &Operation,
        key: &str,
        body: &str,
        result: &mut ValidationResult,
    ) {
        let Some(declared) = operation.responses().and_then(|responses| responses.get(key)) else {
            return;
        };
        let declared = self.store.resolve_node(declared);
        let Some(media) = declared
            .get("content")
            .and_then(|content| content.get(JSON_MEDIA_TYPE))
        else {
            return;
        };
        if body.is_empty() {
            return;
        }

        let instance: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(_) => {
                result.errors.push(ResultError::other("Response is not valid JSON"));
                return;
            }
        };

        let schema = media.get("schema").cloned().unwrap_or(Value::Null);
        if let Some(compiled) = self.compiled_schema(operation, key, &schema) {
            result.errors.extend(schema_errors(&compiled, &instance));
        }
        result.expected_response_schema = Some(schema);
    }
}
