#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;
use wiremock::MockServer;

use validate_api::contract::ContractStore;
use validate_api::http_client::{ApiClient, HttpClientConfig};
use validate_api::planner::base_url;
use validate_api::skip::SkipPolicy;
use validate_api::validator::{RunMode, ValidationConfig, ValidationEngine};

pub const ACCESS_TOKEN: &str = "secret-token";

/// A small contract exercising refs, wildcards, parameters and skips
pub const STREAMS_CONTRACT: &str = r##"
openapi: 3.0.0
info:
  title: Streams API
  version: "1.0"
paths:
  /streams:
    get:
      operationId: listStreams
      parameters:
        - name: page
          in: query
          schema:
            type: integer
      responses:
        "200":
          description: All streams
          content:
            application/json:
              schema:
                $ref: "#/components/schemas/StreamList"
    post:
      operationId: createStream
      requestBody:
        required: true
        content:
          application/json:
            schema:
              $ref: "#/components/schemas/Stream"
      responses:
        "2XX":
          description: Created
  /streams/{streamId}:
    get:
      operationId: getStream
      parameters:
        - name: streamId
          in: path
          required: true
          schema:
            type: string
      responses:
        "200":
          description: One stream
          content:
            application/json:
              schema:
                $ref: "#/components/schemas/Stream"
    delete:
      operationId: deleteStream
      parameters:
        - name: streamId
          in: path
          required: true
          schema:
            type: string
      responses:
        "204":
          description: Deleted
  /system/shutdown:
    post:
      responses:
        "202":
          description: Shutting down
components:
  schemas:
    Stream:
      type: object
      required: [id, title]
      properties:
        id:
          type: string
        title:
          type: string
        disabled:
          type: boolean
    StreamList:
      type: object
      required: [total, streams]
      properties:
        total:
          type: integer
        streams:
          type: array
          items:
            $ref: "#/components/schemas/Stream"
"##;

pub fn store(contract: &str) -> Arc<ContractStore> {
    Arc::new(ContractStore::parse(contract).unwrap())
}

pub fn engine_with(
    server: &MockServer,
    contract: &str,
    mode: RunMode,
    allow_destructive: bool,
    timeout_seconds: u64,
) -> ValidationEngine {
    let address = server.address();
    let client = ApiClient::new(HttpClientConfig {
        timeout_seconds,
        access_token: ACCESS_TOKEN.to_string(),
        ..Default::default()
    })
    .unwrap();
    let base = base_url("http", &address.ip().to_string(), address.port(), "/api").unwrap();

    ValidationEngine::new(
        store(contract),
        client,
        base,
        ValidationConfig {
            mode,
            skip_policy: SkipPolicy::new(allow_destructive),
        },
    )
}

pub fn engine(server: &MockServer, mode: RunMode) -> ValidationEngine {
    engine_with(server, STREAMS_CONTRACT, mode, false, 5)
}

/// Write `content` to a file named `name` inside a fresh temp dir
pub fn write_temp(name: &str, content: &str) -> (TempDir, std::path::PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    (temp_dir, path)
}
