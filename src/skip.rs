use regex::RegexSet;
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

use crate::contract::Operation;
use crate::result::HttpMethod;

/// Warning recorded on every skipped result
pub const SKIP_WARNING: &str = "Skipped: Potentially destructive or deprecated endpoint";

static ADMINISTRATIVE_PATHS: OnceLock<RegexSet> = OnceLock::new();

/// Paths that are never exercised, whatever the destructive setting.
/// Matched from the start of the path only.
fn administrative_paths() -> &'static RegexSet {
    ADMINISTRATIVE_PATHS.get_or_init(|| {
        RegexSet::new([
            r"^/system/shutdown",
            r"^/system/restart",
            r"^/cluster/nodes/.*/shutdown",
            r"^/system/processing/pause",
        ])
        .expect("Failed to compile administrative path patterns")
    })
}

const DESTRUCTIVE_POST_MARKERS: [&str; 4] = ["delete", "remove", "clear", "reset"];
const DESTRUCTIVE_PUT_MARKERS: [&str; 2] = ["shutdown", "restart"];

/// Why an operation was left out of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Deprecated,
    Destructive,
    Administrative,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SkipReason::Deprecated => "deprecated",
            SkipReason::Destructive => "destructive",
            SkipReason::Administrative => "administrative",
        };
        f.write_str(name)
    }
}

/// Decides which operations must not be sent to the live service
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipPolicy {
    allow_destructive: bool,
}

impl SkipPolicy {
    pub fn new(allow_destructive: bool) -> Self {
        Self { allow_destructive }
    }

    pub fn should_skip(&self, path: &str, method: HttpMethod, definition: &Value) -> bool {
        self.skip_reason(path, method, definition).is_some()
    }

    /// The first rule that excludes the operation, if any
    pub fn skip_reason(
        &self,
        path: &str,
        method: HttpMethod,
        definition: &Value,
    ) -> Option<SkipReason> {
        if definition.get("deprecated").and_then(Value::as_bool) == Some(true) {
            return Some(SkipReason::Deprecated);
        }

        if !self.allow_destructive && is_destructive(path, method) {
            return Some(SkipReason::Destructive);
        }

        if administrative_paths().is_match(path) {
            return Some(SkipReason::Administrative);
        }

        None
    }

    pub fn check(&self, operation: &Operation) -> Option<SkipReason> {
        self.skip_reason(&operation.path, operation.method, &operation.definition)
    }
}

fn is_destructive(path: &str, method: HttpMethod) -> bool {
    let path = path.to_lowercase();
    match method {
        HttpMethod::Delete => true,
        HttpMethod::Post => DESTRUCTIVE_POST_MARKERS.iter().any(|m| path.contains(m)),
        HttpMethod::Put => DESTRUCTIVE_PUT_MARKERS.iter().any(|m| path.contains(m)),
        _ => false,
    }
}
