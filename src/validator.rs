//! Validation orchestration.
//!
//! Operations are enumerated once from the contract and driven in one of two
//! modes that are never mixed within a run:
//! - **Sequential**: an explicit cursor over operation ids, pulled one result
//!   at a time so a run can be resumed from any id or stepped interactively
//! - **Concurrent**: one tokio task per operation, bounded by a semaphore,
//!   with results recorded in completion order
//!
//! Every result passes through the shared [`ResultAggregate`] and is logged.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, Stream, StreamExt};
use reqwest::Url;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use crate::checker::ConformanceChecker;
use crate::contract::{ContractStore, Operation};
use crate::error::{Result, ValidationError};
use crate::http_client::ApiClient;
use crate::planner::RequestPlanner;
use crate::result::ValidationResult;
use crate::skip::{SKIP_WARNING, SkipPolicy};
use crate::summary::{ResultAggregate, RunSummary};

/// How operations are driven through a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Sequential,
    Concurrent { max_workers: usize },
}

impl RunMode {
    /// A single worker is the same as running sequentially
    pub fn select(max_workers: usize, force_sequential: bool) -> Self {
        if force_sequential || max_workers <= 1 {
            RunMode::Sequential
        } else {
            RunMode::Concurrent { max_workers }
        }
    }

    pub fn is_sequential(&self) -> bool {
        matches!(self, RunMode::Sequential)
    }
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::Concurrent { max_workers: 5 }
    }
}

/// Validation configuration
#[derive(Debug, Clone, Default)]
pub struct ValidationConfig {
    pub mode: RunMode,
    pub skip_policy: SkipPolicy,
}

/// Progress update emitted after each recorded result
#[derive(Debug, Clone)]
pub struct ValidationProgress {
    /// Results recorded so far in this run
    pub completed: usize,
    /// Operations this run will attempt
    pub total: usize,
    pub last: Arc<ValidationResult>,
}

pub type ProgressCallback = Arc<dyn Fn(ValidationProgress) + Send + Sync>;

/// Per-operation work shared by every worker
struct EngineCore {
    planner: RequestPlanner,
    checker: ConformanceChecker,
    skip_policy: SkipPolicy,
}

impl EngineCore {
    async fn validate(&self, operation: &Operation) -> ValidationResult {
        if let Some(reason) = self.skip_policy.check(operation) {
            debug!(
                "Skipping {} {}: {}",
                operation.method, operation.path, reason
            );
            return ValidationResult::skipped(
                operation.id,
                &operation.path,
                operation.method,
                SKIP_WARNING,
            )
            .finish();
        }

        let plan = self.planner.plan(operation);
        self.checker.execute(&plan, operation).await
    }
}

/// Drives validation of every contract operation against the live service
pub struct ValidationEngine {
    store: Arc<ContractStore>,
    operations: Arc<Vec<Operation>>,
    core: Arc<EngineCore>,
    aggregate: Arc<ResultAggregate>,
    mode: RunMode,
}

impl ValidationEngine {
    /// Create a new validation engine
    pub fn new(
        store: Arc<ContractStore>,
        client: ApiClient,
        base_url: Url,
        config: ValidationConfig,
    ) -> Self {
        let client = Arc::new(client);
        let planner = RequestPlanner::new(
            Arc::clone(&store),
            base_url,
            client.session_headers().clone(),
        );
        let checker = ConformanceChecker::new(client, Arc::clone(&store));

        let operations = Arc::new(store.operations());
        let aggregate = Arc::new(ResultAggregate::new());
        aggregate.set_total(operations.len());

        Self {
            store,
            operations,
            core: Arc::new(EngineCore {
                planner,
                checker,
                skip_policy: config.skip_policy,
            }),
            aggregate,
            mode: config.mode,
        }
    }

    pub fn store(&self) -> &Arc<ContractStore> {
        &self.store
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn operation(&self, endpoint_id: usize) -> Option<&Operation> {
        endpoint_id
            .checked_sub(1)
            .and_then(|index| self.operations.get(index))
    }

    pub fn aggregate(&self) -> &Arc<ResultAggregate> {
        &self.aggregate
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn summary(&self) -> RunSummary {
        self.aggregate.snapshot()
    }

    /// Skip check, plan and execute one operation without recording it
    pub async fn validate_operation(&self, operation: &Operation) -> ValidationResult {
        self.core.validate(operation).await
    }

    /// Start a sequential cursor at `start_from`
    pub fn sequential(&self, start_from: usize) -> Result<SequentialRun<'_>> {
        check_start(start_from)?;
        Ok(SequentialRun {
            engine: self,
            next_id: start_from,
        })
    }

    /// Validate up to `limit` operations one at a time from `start_from`
    pub async fn validate_sequential(
        &self,
        start_from: usize,
        limit: Option<usize>,
        progress: Option<ProgressCallback>,
    ) -> Result<RunSummary> {
        let mut run = self.sequential(start_from)?;
        let total = self.remaining_from(start_from);
        let total = limit.map_or(total, |limit| limit.min(total));

        info!("Running sequential validation...");
        let mut completed = 0;
        while completed < total {
            let Some(last) = run.next_result().await else {
                break;
            };
            completed += 1;
            if let Some(ref callback) = progress {
                callback(ValidationProgress {
                    completed,
                    total,
                    last,
                });
            }
        }

        Ok(self.summary())
    }

    /// Validate every operation from `start_from` on a bounded worker pool
    pub async fn validate_concurrent(
        &self,
        start_from: usize,
        max_workers: usize,
        progress: Option<ProgressCallback>,
    ) -> Result<RunSummary> {
        check_start(start_from)?;
        if max_workers == 0 {
            return Err(ValidationError::Config(
                "max_workers must be at least 1".to_string(),
            ));
        }

        info!("Running parallel validation with {} workers...", max_workers);

        let semaphore = Arc::new(Semaphore::new(max_workers));
        let tasks: FuturesUnordered<_> = self
            .operations
            .iter()
            .filter(|operation| operation.id >= start_from)
            .cloned()
            .map(|operation| {
                let core = Arc::clone(&self.core);
                let semaphore = Arc::clone(&semaphore);
                let id = operation.id;

                let handle = tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.map_err(|_| {
                        ValidationError::Concurrency {
                            details: "Failed to acquire worker permit".to_string(),
                        }
                    })?;
                    Ok::<ValidationResult, ValidationError>(core.validate(&operation).await)
                });
                async move { (id, handle.await) }
            })
            .collect();

        self.drain_tasks(tasks, progress).await;
        Ok(self.summary())
    }

    /// Run in the configured mode
    pub async fn run(
        &self,
        start_from: usize,
        progress: Option<ProgressCallback>,
    ) -> Result<RunSummary> {
        match self.mode {
            RunMode::Sequential => self.validate_sequential(start_from, None, progress).await,
            RunMode::Concurrent { max_workers } => {
                if start_from > 1 {
                    warn!("Note: --start-from is most useful with sequential mode");
                }
                self.validate_concurrent(start_from, max_workers, progress)
                    .await
            }
        }
    }

    /// Record results as workers finish; a worker that fails is logged and
    /// the rest of the run carries on
    async fn drain_tasks<F>(
        &self,
        mut tasks: FuturesUnordered<F>,
        progress: Option<ProgressCallback>,
    ) where
        F: Future<Output = (usize, std::result::Result<Result<ValidationResult>, JoinError>)>,
    {
        let total = tasks.len();
        let mut completed = 0;
        while let Some((id, joined)) = tasks.next().await {
            let result = match joined {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    error!("Failed to validate endpoint {:04}: {}", id, e);
                    continue;
                }
                Err(e) => {
                    error!("Failed to validate endpoint {:04}: {}", id, e);
                    continue;
                }
            };

            let last = self.record(result);
            completed += 1;
            if let Some(ref callback) = progress {
                callback(ValidationProgress {
                    completed,
                    total,
                    last,
                });
            }
        }
    }

    fn remaining_from(&self, start_from: usize) -> usize {
        self.operations
            .iter()
            .filter(|operation| operation.id >= start_from)
            .count()
    }

    fn record(&self, result: ValidationResult) -> Arc<ValidationResult> {
        let result = self.aggregate.record(result);
        log_result(&result);
        result
    }
}

/// Resumable cursor over operations in id order
pub struct SequentialRun<'e> {
    engine: &'e ValidationEngine,
    next_id: usize,
}

impl<'e> SequentialRun<'e> {
    /// Id of the operation the next pull will validate
    pub fn position(&self) -> usize {
        self.next_id
    }

    pub fn is_exhausted(&self) -> bool {
        self.engine.operation(self.next_id).is_none()
    }

    /// Validate and record the next operation; `None` once every id is done
    pub async fn next_result(&mut self) -> Option<Arc<ValidationResult>> {
        let operation = self.engine.operation(self.next_id)?;
        self.next_id += 1;

        let endpoint = format!("{:04}", operation.id);
        info!(
            endpoint = %endpoint,
            "Validating endpoint {}/{}: {} {}",
            operation.id,
            self.engine.operations.len(),
            operation.method,
            operation.path
        );

        let result = self.engine.validate_operation(operation).await;
        Some(self.engine.record(result))
    }

    pub fn into_stream(self) -> impl Stream<Item = Arc<ValidationResult>> + 'e {
        futures::stream::unfold(self, |mut run| async move {
            let result = run.next_result().await?;
            Some((result, run))
        })
    }
}

fn check_start(start_from: usize) -> Result<()> {
    if start_from < 1 {
        return Err(ValidationError::Config(format!(
            "Invalid start-from value: {}. Must be >= 1",
            start_from
        )));
    }
    Ok(())
}

fn log_result(result: &ValidationResult) {
    let endpoint = format!("{:04}", result.endpoint_id);

    if result.is_skipped() {
        warn!(
            endpoint = %endpoint,
            "⊘ {} {} - {}",
            result.method,
            result.path,
            result.warnings.first().map(String::as_str).unwrap_or_default()
        );
    } else if result.success() {
        info!(
            endpoint = %endpoint,
            "✓ {} {} - {} ({:.2}s)",
            result.method,
            result.path,
            result.response_code.map(|c| c.to_string()).unwrap_or_default(),
            result.response_time.map(|t| t.as_secs_f64()).unwrap_or(0.0)
        );
    } else {
        error!(
            endpoint = %endpoint,
            "✗ {} {} - {}",
            result.method,
            result.path,
            result
                .errors
                .first()
                .map(|e| e.message.as_str())
                .unwrap_or("Unknown error")
        );
    }
}
