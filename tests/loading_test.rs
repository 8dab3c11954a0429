mod common;

use std::collections::HashMap;

use clap::Parser;

use validate_api::cli::Cli;
use validate_api::config::{ConfigError, ConfigManager, EnvProvider};
use validate_api::contract::ContractStore;
use validate_api::error::ValidationError;
use validate_api::result::HttpMethod;

use common::{STREAMS_CONTRACT, write_temp};

struct FakeEnv(HashMap<&'static str, &'static str>);

impl EnvProvider for FakeEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).map(|v| v.to_string())
    }
}

#[tokio::test]
async fn test_load_yaml_contract_from_disk() {
    let (_dir, path) = write_temp("openapi.yaml", STREAMS_CONTRACT);

    let store = ContractStore::load(&path).await.unwrap();
    let operations = store.operations();

    assert_eq!(store.title(), "Streams API");
    assert_eq!(operations.len(), 5);
    let listing: Vec<(usize, HttpMethod, &str)> = operations
        .iter()
        .map(|op| (op.id, op.method, op.path.as_str()))
        .collect();
    assert_eq!(
        listing,
        vec![
            (1, HttpMethod::Get, "/streams"),
            (2, HttpMethod::Post, "/streams"),
            (3, HttpMethod::Get, "/streams/{streamId}"),
            (4, HttpMethod::Delete, "/streams/{streamId}"),
            (5, HttpMethod::Post, "/system/shutdown"),
        ]
    );
}

#[tokio::test]
async fn test_load_json_contract_from_disk() {
    let contract = r#"{
        "info": {"title": "Tiny"},
        "paths": {"/ping": {"get": {"responses": {"200": {"description": "pong"}}}}}
    }"#;
    let (_dir, path) = write_temp("openapi.json", contract);

    let store = ContractStore::load(&path).await.unwrap();
    assert_eq!(store.title(), "Tiny");
    assert_eq!(store.operations().len(), 1);
}

#[tokio::test]
async fn test_broken_contract_is_a_load_error() {
    let (_dir, path) = write_temp("broken.yaml", "paths: [unclosed");

    match ContractStore::load(&path).await {
        Err(ValidationError::ContractLoad { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected a load error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_missing_contract_is_an_io_error() {
    let result = ContractStore::load("/definitely/not/here.yaml").await;
    assert!(matches!(result, Err(ValidationError::Io(_))));
}

#[tokio::test]
async fn test_config_layers_file_env_and_cli() {
    let (_dir, config_path) = write_temp(
        "validate-api.toml",
        r#"
[target]
hostname = "from-file"
port = 9000
base_path = "/v1"

[run]
timeout_seconds = 12
max_workers = 3
"#,
    );
    let cli = Cli::try_parse_from([
        "validate-api",
        "openapi.yaml",
        "--config",
        config_path.to_str().unwrap(),
        "--max-workers",
        "7",
    ])
    .unwrap();
    let env = FakeEnv(HashMap::from([
        ("VALIDATE_API_HOSTNAME", "from-env"),
        ("VALIDATE_API_ACCESS_TOKEN", "abc"),
    ]));

    let config = ConfigManager::load_config_with(&cli, &env).await.unwrap();
    let target = config.target().unwrap();

    assert_eq!(target.hostname, "from-env");
    assert_eq!(target.port, 9000);
    assert_eq!(target.access_token, "abc");
    assert_eq!(target.base_path, "/v1");
    assert_eq!(config.run.timeout_seconds, 12);
    assert_eq!(config.run.max_workers, 7);
}

#[tokio::test]
async fn test_config_without_target_is_rejected() {
    let (_dir, config_path) = write_temp("empty.toml", "");
    let cli = Cli::try_parse_from([
        "validate-api",
        "openapi.yaml",
        "--config",
        config_path.to_str().unwrap(),
    ])
    .unwrap();

    let result = ConfigManager::load_config_with(&cli, &FakeEnv(HashMap::new())).await;
    assert!(matches!(result, Err(ConfigError::MissingField { .. })));
}
