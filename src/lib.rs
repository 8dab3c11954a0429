//! # validate-api Library
//!
//! Checks a running HTTP service against its OpenAPI contract: every
//! operation in the contract gets a synthesized request, the live response
//! is matched against the documented status codes and JSON schemas, and the
//! results are aggregated for reporting, export and interactive inspection.

pub mod checker;
pub mod cli;
pub mod config;
pub mod contract;
pub mod error;
pub mod export;
pub mod http_client;
pub mod output;
pub mod planner;
pub mod result;
pub mod shell;
pub mod skip;
pub mod summary;
pub mod synth;
pub mod validator;

pub use checker::ConformanceChecker;
pub use cli::{Cli, OutputFormat, VerbosityLevel};
pub use config::{Config, ConfigManager, Target};
pub use contract::{ContractStore, Operation, Parameter, ParameterLocation};
pub use error::{Result, ValidationError};
pub use export::export_results;
pub use http_client::{ApiClient, ApiResponse, HttpClientConfig};
pub use output::Output;
pub use planner::{RequestPlan, RequestPlanner, base_url};
pub use result::{ErrorKind, HttpMethod, Outcome, ResultError, ValidationResult};
pub use shell::{Inspector, ShellCommand};
pub use skip::{SkipPolicy, SkipReason};
pub use summary::{ResultAggregate, RunSummary};
pub use synth::ExampleSynthesizer;
pub use validator::{
    ProgressCallback, RunMode, SequentialRun, ValidationConfig, ValidationEngine,
    ValidationProgress,
};
