use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

use validate_api::cli::{Cli, VerbosityLevel};
use validate_api::config::{Config, ConfigManager};
use validate_api::contract::ContractStore;
use validate_api::export::export_results;
use validate_api::http_client::{ApiClient, HttpClientConfig};
use validate_api::output::Output;
use validate_api::planner::base_url;
use validate_api::shell::Inspector;
use validate_api::skip::SkipPolicy;
use validate_api::validator::{RunMode, ValidationConfig, ValidationEngine};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let config = match load_config(&cli).await {
        Ok(config) => config,
        Err(e) => {
            init_tracing(cli.verbosity());
            tracing::error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.verbosity());

    match run(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbosity: VerbosityLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn load_config(cli: &Cli) -> Result<Config> {
    cli.validate().map_err(anyhow::Error::msg)?;

    ConfigManager::load_config(cli)
        .await
        .context("Failed to load configuration")
}

async fn run(cli: Cli, config: Config) -> Result<ExitCode> {
    let target = config.target()?;

    let store = Arc::new(ContractStore::load(&cli.contract).await?);

    let client = ApiClient::new(HttpClientConfig {
        timeout_seconds: config.run.timeout_seconds,
        access_token: target.access_token.clone(),
        ..Default::default()
    })?;
    let base = base_url(
        &target.scheme,
        &target.hostname,
        target.port,
        &target.base_path,
    )?;

    let mode = RunMode::select(config.run.max_workers, config.run.sequential);
    let engine = ValidationEngine::new(
        store,
        client,
        base,
        ValidationConfig {
            mode,
            skip_policy: SkipPolicy::new(config.run.allow_destructive),
        },
    );

    info!("Starting validation against {}:{}", target.hostname, target.port);
    let start_from = config.run.start_from;
    let cursor = match mode {
        RunMode::Sequential => {
            info!(
                "Settings: timeout={}s, mode=sequential, skip_destructive={}",
                config.run.timeout_seconds, !config.run.allow_destructive
            );
            if start_from > 1 {
                info!("Starting from endpoint #{}", start_from);
            }

            let mut cursor = engine.sequential(start_from)?;
            info!("Running sequential validation...");
            while cursor.next_result().await.is_some() {}
            Some(cursor)
        }
        RunMode::Concurrent { max_workers } => {
            info!(
                "Settings: timeout={}s, max_workers={}, mode=parallel, skip_destructive={}",
                config.run.timeout_seconds, max_workers, !config.run.allow_destructive
            );
            engine.run(start_from, None).await?;
            None
        }
    };

    let verbosity = config.verbosity();
    let summary = engine.summary();
    println!(
        "{}",
        Output::new(verbosity).format_results(&summary, config.output.format.clone().into())
    );

    if let Some(path) = &cli.export {
        export_results(&summary, path).await?;
    }

    if cli.divein {
        let mut inspector = Inspector::new(&engine, Output::new(verbosity), cursor);
        let mut stdout = tokio::io::stdout();
        inspector
            .run(BufReader::new(tokio::io::stdin()), &mut stdout)
            .await
            .context("Interactive mode failed")?;
    }

    if engine.summary().failed_tests > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
