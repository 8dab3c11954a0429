//! Console reporting.
//!
//! Formats run summaries, one-line result listings, per-endpoint detail
//! views and raw operation definitions. Everything returns a `String`; the
//! caller decides where it goes.

use std::time::Duration;

use serde_json::Value;

use crate::cli::{OutputFormat, VerbosityLevel};
use crate::result::{HttpMethod, ValidationResult};
use crate::summary::RunSummary;

const RULE_WIDTH: usize = 60;
const FAILED_PREVIEW: usize = 10;
const ERRORS_PER_FAILURE: usize = 2;
const SCHEMA_PREVIEW_CHARS: usize = 1000;
const RESPONSE_PREVIEW_CHARS: usize = 2000;
const SENSITIVE_HEADER_MARKERS: [&str; 4] = ["auth", "token", "key", "secret"];

/// Formatter for human-readable results
pub struct Output {
    verbosity: VerbosityLevel,
    show_colors: bool,
}

impl Output {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    /// Formatter that never emits color codes
    pub fn plain(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_colors: false,
        }
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    /// End-of-run report in the requested format
    pub fn format_results(&self, summary: &RunSummary, format: OutputFormat) -> String {
        match format {
            OutputFormat::Json => crate::export::render(summary)
                .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e)),
            OutputFormat::Summary => self.format_counts(summary),
            OutputFormat::Human => match self.verbosity {
                VerbosityLevel::Quiet => {
                    if summary.has_failures() {
                        format!("Failed: {}\n", summary.failed_tests)
                    } else {
                        String::new()
                    }
                }
                VerbosityLevel::Normal | VerbosityLevel::Verbose => self.format_summary(summary),
            },
        }
    }

    fn format_counts(&self, summary: &RunSummary) -> String {
        let mut output = String::new();
        output.push_str(&format!("Total endpoints:          {}\n", summary.total_endpoints));
        output.push_str(&format!("Endpoints tested:         {}\n", summary.tested_endpoints));
        output.push_str(&format!(
            "Successful tests:         {}\n",
            self.colorize(&summary.successful_tests.to_string(), "32")
        ));
        output.push_str(&format!(
            "Failed tests:             {}\n",
            self.colorize(&summary.failed_tests.to_string(), "31")
        ));
        output.push_str(&format!(
            "Skipped tests:            {}\n",
            self.colorize(&summary.skipped_tests.to_string(), "36")
        ));
        output
    }

    pub fn format_summary(&self, summary: &RunSummary) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n{}\n", rule()));
        output.push_str("VALIDATION SUMMARY\n");
        output.push_str(&format!("{}\n", rule()));
        output.push_str(&self.format_counts(summary));

        if !summary.errors_by_type.is_empty() {
            output.push_str("\nError breakdown:\n");
            for (kind, count) in &summary.errors_by_type {
                output.push_str(&format!("  {}: {}\n", kind, count));
            }
        }

        let failed: Vec<_> = summary.failed().collect();
        if !failed.is_empty() {
            output.push_str(&format!(
                "\nFailed endpoints (showing first {}):\n",
                FAILED_PREVIEW
            ));
            for result in failed.iter().take(FAILED_PREVIEW) {
                output.push_str(&format!("  - {} {}\n", result.method, result.path));
                for error in result.errors.iter().take(ERRORS_PER_FAILURE) {
                    output.push_str(&format!("    → {}\n", error));
                }
            }
        }

        output
    }

    /// One line per result, as used by listings
    pub fn format_result_line(&self, result: &ValidationResult) -> String {
        let (marker, color, detail) = if result.is_skipped() {
            ("⊘", "36", first_or(&result.warnings, "Skipped"))
        } else if result.success() {
            (
                "✓",
                "32",
                format!(
                    "{} ({})",
                    code_text(result),
                    format_duration(result.response_time.unwrap_or_default())
                ),
            )
        } else {
            (
                "✗",
                "31",
                result
                    .errors
                    .first()
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| "Unknown error".to_string()),
            )
        };

        format!(
            "[{:04}] {} {} {} - {}",
            result.endpoint_id,
            self.colorize(marker, color),
            result.method,
            result.path,
            detail
        )
    }

    /// Full detail view of one result
    pub fn format_detail(&self, result: &ValidationResult) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n{}\n", rule()));
        output.push_str(&format!("ENDPOINT {:04} DETAILS\n", result.endpoint_id));
        output.push_str(&format!("{}\n", rule()));

        output.push_str(&format!("\nEndpoint: {} {}\n", result.method, result.path));
        let status = if result.is_skipped() {
            "SKIPPED"
        } else if result.success() {
            "SUCCESS"
        } else {
            "FAILED"
        };
        output.push_str(&format!("Status: {}\n", status));
        if let Some(code) = result.response_code {
            output.push_str(&format!("Response Code: {}\n", code));
        }
        if let Some(elapsed) = result.response_time {
            output.push_str(&format!("Response Time: {:.3} seconds\n", elapsed.as_secs_f64()));
        }

        output.push_str(&format!("\nLog Line: {}\n", log_line(result)));

        if !result.errors.is_empty() {
            output.push_str(&format!("\nErrors ({}):\n", result.errors.len()));
            for (i, error) in result.errors.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, error));
            }
        }
        if !result.warnings.is_empty() {
            output.push_str(&format!("\nWarnings ({}):\n", result.warnings.len()));
            for (i, warning) in result.warnings.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, warning));
            }
        }

        if let Some(request) = &result.request {
            output.push_str("\n--- REQUEST ---\n");
            output.push_str(&format!("Method: {}\n", request.method));
            output.push_str(&format!("URL: {}\n", request.url));
            if !request.query.is_empty() {
                output.push_str(&format!("Query Parameters: {}\n", pretty(&request.query)));
            }
            if let Some(body) = &request.body {
                output.push_str(&format!("Request Body:\n{}\n", pretty(body)));
            }

            let safe: serde_json::Map<String, Value> = request
                .headers
                .iter()
                .filter(|(name, _)| !is_sensitive_header(name))
                .map(|(name, value)| (name.clone(), Value::String(value.clone())))
                .collect();
            if !safe.is_empty() {
                output.push_str(&format!("Headers (excluding auth): {}\n", pretty(&safe)));
            }
        }

        if let Some(schema) = result
            .expected_response_schema
            .as_ref()
            .filter(|schema| !is_empty_node(schema))
        {
            output.push_str("\n--- EXPECTED RESPONSE SCHEMA ---\n");
            let (text, cut) = truncate(&pretty(schema), SCHEMA_PREVIEW_CHARS);
            output.push_str(&text);
            if cut {
                output.push_str("\n... (truncated)");
            }
            output.push('\n');
        }

        if let Some(body) = result.response_body.as_ref().filter(|b| !b.is_empty()) {
            output.push_str("\n--- ACTUAL RESPONSE ---\n");
            let rendered = serde_json::from_str::<Value>(body)
                .map(|value| pretty(&value))
                .unwrap_or_else(|_| body.clone());
            let (text, cut) = truncate(&rendered, RESPONSE_PREVIEW_CHARS);
            output.push_str(&text);
            if cut {
                output.push_str(&format!(
                    "\n... (truncated - full response: {} bytes)",
                    body.len()
                ));
            }
            output.push('\n');
        }

        output.push_str(&format!("\n{}\n", rule()));
        output
    }

    /// Contract definition of an operation, laid out like the source document
    pub fn format_definition(
        &self,
        endpoint_id: usize,
        method: HttpMethod,
        path: &str,
        definition: Option<&Value>,
    ) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n{}\n", rule()));
        output.push_str(&format!("ENDPOINT {:04} DEFINITION\n", endpoint_id));
        output.push_str(&format!("{}\n", rule()));
        output.push_str(&format!("\nEndpoint: {} {}\n", method, path));

        let Some(operation) = definition else {
            output.push_str(&format!(
                "\nMethod {} not found in contract for path {}\n",
                method.key(),
                path
            ));
            output.push_str(&format!("\n{}\n", rule()));
            return output;
        };

        output.push_str("\n--- ENDPOINT DEFINITION ---\n");
        output.push_str(&format!("  {}:\n", path));
        output.push_str(&format!("    {}:\n", method.key()));

        if let Some(summary) = text_of(operation, "summary") {
            output.push_str(&format!("      summary: {}\n", summary));
        }
        if let Some(operation_id) = text_of(operation, "operationId") {
            output.push_str(&format!("      operationId: {}\n", operation_id));
        }
        if let Some(tags) = operation.get("tags").and_then(Value::as_array) {
            output.push_str("      tags:\n");
            for tag in tags.iter().filter_map(Value::as_str) {
                output.push_str(&format!("        - {}\n", tag));
            }
        }
        if let Some(description) = text_of(operation, "description") {
            output.push_str(&format!("      description: {}\n", ellipsize(description, 100)));
        }

        if let Some(parameters) = operation.get("parameters").and_then(Value::as_array) {
            output.push_str("      parameters:\n");
            for parameter in parameters {
                output.push_str(&format!(
                    "        - name: {}\n",
                    text_of(parameter, "name").unwrap_or("unknown")
                ));
                output.push_str(&format!(
                    "          in: {}\n",
                    text_of(parameter, "in").unwrap_or("unknown")
                ));
                output.push_str(&format!(
                    "          required: {}\n",
                    flag_of(parameter, "required")
                ));
                if let Some(description) = text_of(parameter, "description") {
                    output.push_str(&format!("          description: {}\n", ellipsize(description, 50)));
                }
            }
        }

        if let Some(body) = operation.get("requestBody") {
            output.push_str("      requestBody:\n");
            output.push_str(&format!("        required: {}\n", flag_of(body, "required")));
            if let Some(description) = text_of(body, "description") {
                output.push_str(&format!("        description: {}\n", description));
            }
            if let Some(reference) = text_of(body, "$ref") {
                output.push_str(&format!("        $ref: '{}'\n", reference));
            }
            write_content(&mut output, body, 8);
        }

        if let Some(responses) = operation.get("responses").and_then(Value::as_object) {
            output.push_str("      responses:\n");
            for (code, response) in responses {
                output.push_str(&format!("        '{}':\n", code));
                if let Some(description) = text_of(response, "description") {
                    output.push_str(&format!("          description: {}\n", description));
                }
                write_content(&mut output, response, 10);
            }
        }

        output.push_str(&format!("\n{}\n", rule()));
        output
    }
}

/// The log line this result produced, reconstructed
pub fn log_line(result: &ValidationResult) -> String {
    if result.is_skipped() {
        format!(
            "WARNING - ⊘ {} {} - {}",
            result.method,
            result.path,
            first_or(&result.warnings, "")
        )
    } else if result.success() {
        format!(
            "INFO - ✓ {} {} - {} ({:.2}s)",
            result.method,
            result.path,
            code_text(result),
            result.response_time.unwrap_or_default().as_secs_f64()
        )
    } else {
        format!(
            "ERROR - ✗ {} {} - {} (+{} more errors)",
            result.method,
            result.path,
            result
                .errors
                .first()
                .map(|e| e.message.as_str())
                .unwrap_or("Unknown error"),
            result.errors.len().saturating_sub(1)
        )
    }
}

pub fn is_sensitive_header(name: &str) -> bool {
    let name = name.to_lowercase();
    SENSITIVE_HEADER_MARKERS
        .iter()
        .any(|marker| name.contains(marker))
}

fn write_content(output: &mut String, node: &Value, indent: usize) {
    let Some(content) = node.get("content").and_then(Value::as_object) else {
        return;
    };
    let pad = " ".repeat(indent);
    output.push_str(&format!("{}content:\n", pad));
    for (media_type, media) in content {
        output.push_str(&format!("{}  {}:\n", pad, media_type));
        let Some(schema) = media.get("schema") else {
            continue;
        };
        if let Some(reference) = text_of(schema, "$ref") {
            output.push_str(&format!("{}    schema:\n", pad));
            output.push_str(&format!("{}      $ref: '{}'\n", pad, reference));
        } else if let Some(kind) = schema.get("type") {
            output.push_str(&format!("{}    schema:\n", pad));
            output.push_str(&format!("{}      type: {}\n", pad, plain(kind)));
        }
    }
}

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

fn pretty<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn text_of<'v>(node: &'v Value, key: &str) -> Option<&'v str> {
    node.get(key).and_then(Value::as_str)
}

fn flag_of(node: &Value, key: &str) -> bool {
    node.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn is_empty_node(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn first_or(items: &[String], fallback: &str) -> String {
    items
        .first()
        .cloned()
        .unwrap_or_else(|| fallback.to_string())
}

fn code_text(result: &ValidationResult) -> String {
    result
        .response_code
        .map(|code| code.to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Cut `text` to at most `max` characters
fn truncate(text: &str, max: usize) -> (String, bool) {
    match text.char_indices().nth(max) {
        Some((index, _)) => (text[..index].to_string(), true),
        None => (text.to_string(), false),
    }
}

fn ellipsize(text: &str, max: usize) -> String {
    match truncate(text, max) {
        (cut, true) => format!("{}...", cut),
        (whole, false) => whole,
    }
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{:.0}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{ErrorKind, RequestRecord, ResultError};
    use crate::summary::ResultAggregate;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn failure(id: usize, errors: &[&str]) -> ValidationResult {
        let mut result = ValidationResult::attempt(id, format!("/f/{}", id), HttpMethod::Get);
        result.errors = errors.iter().map(|e| ResultError::classified(*e)).collect();
        result.finish()
    }

    fn passed() -> ValidationResult {
        let mut result = ValidationResult::attempt(1, "/streams", HttpMethod::Get);
        result.response_code = Some(200);
        result.response_time = Some(Duration::from_millis(120));
        result.finish()
    }

    #[test]
    fn test_output_summary() {
        let aggregate = ResultAggregate::new();
        aggregate.set_total(12);
        aggregate.record(passed());
        for id in 2..=13 {
            aggregate.record(failure(
                id,
                &["Connection error: refused", "second", "third is hidden"],
            ));
        }

        let output = Output::plain(VerbosityLevel::Normal);
        let formatted = output.format_summary(&aggregate.snapshot());

        assert!(formatted.contains("VALIDATION SUMMARY"));
        assert!(formatted.contains("Total endpoints:          12"));
        assert!(formatted.contains("Successful tests:         1"));
        assert!(formatted.contains("Failed tests:             12"));
        assert!(formatted.contains("Error breakdown:"));
        assert!(formatted.contains("  connection_error: 12"));
        assert!(formatted.contains("  other: 24"));
        assert!(formatted.contains("Failed endpoints (showing first 10):"));
        assert!(formatted.contains("  - GET /f/11"));
        assert!(!formatted.contains("/f/12"));
        assert!(formatted.contains("    → second"));
        assert!(!formatted.contains("third is hidden"));
    }

    #[test]
    fn test_quiet_and_summary_formats() {
        let aggregate = ResultAggregate::new();
        aggregate.record(passed());

        let quiet = Output::plain(VerbosityLevel::Quiet);
        assert!(
            quiet
                .format_results(&aggregate.snapshot(), OutputFormat::Human)
                .is_empty()
        );

        let counts = quiet.format_results(&aggregate.snapshot(), OutputFormat::Summary);
        assert!(counts.contains("Endpoints tested:         1"));
        assert!(!counts.contains("VALIDATION SUMMARY"));
    }

    #[test]
    fn test_result_lines() {
        let output = Output::plain(VerbosityLevel::Normal);

        assert_eq!(
            output.format_result_line(&passed()),
            "[0001] ✓ GET /streams - 200 (120ms)"
        );

        let skipped =
            ValidationResult::skipped(2, "/x", HttpMethod::Delete, "Skipped: reason").finish();
        assert_eq!(
            output.format_result_line(&skipped),
            "[0002] ⊘ DELETE /x - Skipped: reason"
        );

        assert_eq!(
            output.format_result_line(&failure(3, &["boom"])),
            "[0003] ✗ GET /f/3 - boom"
        );
    }

    #[test]
    fn test_log_line_reconstruction() {
        assert_eq!(log_line(&passed()), "INFO - ✓ GET /streams - 200 (0.12s)");
        assert_eq!(
            log_line(&failure(4, &["a", "b", "c"])),
            "ERROR - ✗ GET /f/4 - a (+2 more errors)"
        );
    }

    #[test]
    fn test_detail_redacts_and_truncates() {
        let mut headers = BTreeMap::new();
        headers.insert("authorization".to_string(), "Basic c2VjcmV0".to_string());
        headers.insert("X-API-Token".to_string(), "secret".to_string());
        headers.insert("accept".to_string(), "application/json".to_string());

        let mut result = passed();
        result.request = Some(RequestRecord {
            method: HttpMethod::Get,
            url: "http://localhost:9000/api/streams".to_string(),
            headers,
            query: json!({"page": 1}).as_object().cloned().unwrap(),
            body: None,
        });
        result.response_body = Some(format!("\"{}\"", "x".repeat(3000)));
        result.expected_response_schema = Some(json!({"type": "string"}));
        result.errors.push(ResultError::new(ErrorKind::Other, "late"));

        let output = Output::plain(VerbosityLevel::Normal);
        let detail = output.format_detail(&result);

        assert!(detail.contains("ENDPOINT 0001 DETAILS"));
        assert!(detail.contains("URL: http://localhost:9000/api/streams"));
        assert!(detail.contains("Headers (excluding auth)"));
        assert!(detail.contains("application/json"));
        assert!(!detail.contains("Basic c2VjcmV0"));
        assert!(!detail.contains("X-API-Token"));
        assert!(detail.contains("--- EXPECTED RESPONSE SCHEMA ---"));
        assert!(detail.contains("... (truncated - full response: 3002 bytes)"));
        assert!(detail.contains("Errors (1):"));
    }

    #[test]
    fn test_definition_view() {
        let definition = json!({
            "summary": "List streams",
            "operationId": "getStreams",
            "tags": ["streams"],
            "parameters": [{"name": "page", "in": "query"}],
            "requestBody": {"required": true, "content": {"application/json": {"schema": {"$ref": "#/components/schemas/New"}}}},
            "responses": {"200": {"description": "ok", "content": {"application/json": {"schema": {"type": "array"}}}}}
        });

        let output = Output::plain(VerbosityLevel::Normal);
        let view = output.format_definition(1, HttpMethod::Get, "/streams", Some(&definition));

        assert!(view.contains("ENDPOINT 0001 DEFINITION"));
        assert!(view.contains("      summary: List streams"));
        assert!(view.contains("      operationId: getStreams"));
        assert!(view.contains("        - streams"));
        assert!(view.contains("        - name: page"));
        assert!(view.contains("          required: false"));
        assert!(view.contains("              $ref: '#/components/schemas/New'"));
        assert!(view.contains("        '200':"));
        assert!(view.contains("                type: array"));

        let missing = output.format_definition(1, HttpMethod::Get, "/streams", None);
        assert!(missing.contains("Method get not found in contract for path /streams"));
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("héllo", 2), ("hé".to_string(), true));
        assert_eq!(truncate("abc", 3), ("abc".to_string(), false));
        assert_eq!(ellipsize("abcdef", 3), "abc...");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30.0s");
    }
}
