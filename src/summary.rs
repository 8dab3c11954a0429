use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::result::{ErrorKind, ValidationResult};

/// Counters and results of a run at one point in time
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub total_endpoints: usize,
    pub tested_endpoints: usize,
    pub successful_tests: usize,
    pub failed_tests: usize,
    pub skipped_tests: usize,
    pub errors_by_type: BTreeMap<ErrorKind, usize>,
    #[serde(skip)]
    pub results: Vec<Arc<ValidationResult>>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.failed_tests > 0
    }

    pub fn failed(&self) -> impl Iterator<Item = &Arc<ValidationResult>> {
        self.results.iter().filter(|r| r.is_failure())
    }

    /// Tally for one category; categories never hit read as zero
    pub fn error_count(&self, kind: ErrorKind) -> usize {
        self.errors_by_type.get(&kind).copied().unwrap_or(0)
    }
}

/// Thread-safe accumulator shared by every worker of a run
#[derive(Debug, Default)]
pub struct ResultAggregate {
    inner: Mutex<RunSummary>,
}

impl ResultAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_total(&self, total: usize) {
        self.inner.lock().total_endpoints = total;
    }

    /// Record one result; all counters move together under a single lock
    pub fn record(&self, result: ValidationResult) -> Arc<ValidationResult> {
        let result = Arc::new(result);
        let mut summary = self.inner.lock();

        summary.tested_endpoints += 1;
        if result.is_skipped() {
            summary.skipped_tests += 1;
        } else if result.success() {
            summary.successful_tests += 1;
        } else {
            summary.failed_tests += 1;
            for error in &result.errors {
                *summary.errors_by_type.entry(error.kind).or_insert(0) += 1;
            }
        }
        summary.results.push(Arc::clone(&result));

        result
    }

    pub fn snapshot(&self) -> RunSummary {
        self.inner.lock().clone()
    }

    /// Most recent result recorded for an endpoint id
    pub fn get(&self, endpoint_id: usize) -> Option<Arc<ValidationResult>> {
        self.inner
            .lock()
            .results
            .iter()
            .rev()
            .find(|r| r.endpoint_id == endpoint_id)
            .cloned()
    }

    pub fn failed(&self) -> Vec<Arc<ValidationResult>> {
        self.inner
            .lock()
            .results
            .iter()
            .filter(|r| r.is_failure())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{HttpMethod, ResultError};

    fn failed(id: usize, errors: Vec<ResultError>) -> ValidationResult {
        let mut result = ValidationResult::attempt(id, "/x", HttpMethod::Get);
        result.errors = errors;
        result.finish()
    }

    #[test]
    fn test_record_classifies_results() {
        let aggregate = ResultAggregate::new();
        aggregate.set_total(4);

        aggregate.record(ValidationResult::attempt(1, "/a", HttpMethod::Get).finish());
        aggregate.record(ValidationResult::skipped(2, "/b", HttpMethod::Delete, "Skipped").finish());
        aggregate.record(failed(
            3,
            vec![
                ResultError::schema("x"),
                ResultError::schema("y"),
                ResultError::new(ErrorKind::UnexpectedResponse, "Unexpected response code: 500"),
            ],
        ));

        let summary = aggregate.snapshot();
        assert_eq!(summary.total_endpoints, 4);
        assert_eq!(summary.tested_endpoints, 3);
        assert_eq!(summary.successful_tests, 1);
        assert_eq!(summary.skipped_tests, 1);
        assert_eq!(summary.failed_tests, 1);
        assert_eq!(summary.error_count(ErrorKind::SchemaValidation), 2);
        assert_eq!(summary.error_count(ErrorKind::UnexpectedResponse), 1);
        assert_eq!(summary.error_count(ErrorKind::Timeout), 0);
        assert!(summary.has_failures());
        assert_eq!(summary.failed().count(), 1);
    }

    #[test]
    fn test_lookup_by_id() {
        let aggregate = ResultAggregate::new();
        aggregate.record(ValidationResult::attempt(7, "/a", HttpMethod::Get).finish());
        aggregate.record(failed(9, vec![ResultError::other("boom")]));

        assert_eq!(aggregate.get(7).unwrap().path, "/a");
        assert!(aggregate.get(8).is_none());
        assert_eq!(aggregate.failed().len(), 1);
        assert_eq!(aggregate.failed()[0].endpoint_id, 9);
    }

    #[test]
    fn test_concurrent_records_are_consistent() {
        let aggregate = Arc::new(ResultAggregate::new());

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let aggregate = Arc::clone(&aggregate);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let id = worker * 50 + i + 1;
                        let result = if i % 2 == 0 {
                            ValidationResult::attempt(id, "/ok", HttpMethod::Get).finish()
                        } else {
                            failed(id, vec![ResultError::other("bad")])
                        };
                        aggregate.record(result);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let summary = aggregate.snapshot();
        assert_eq!(summary.tested_endpoints, 400);
        assert_eq!(summary.results.len(), 400);
        assert_eq!(
            summary.successful_tests + summary.failed_tests + summary.skipped_tests,
            summary.tested_endpoints
        );
        assert_eq!(summary.failed_tests, 200);
        assert_eq!(summary.error_count(ErrorKind::Other), 200);
    }
}
