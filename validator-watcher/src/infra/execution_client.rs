// This file is part of validator-watcher.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::execution::{Execution, ExecutionBlock, ExecutionTransaction};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Config for the execution node connection.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub url: String,

    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

/// An [Execution] implementation based on the execution node JSON-RPC API.
#[derive(Debug, Clone)]
pub struct ExecutionClient {
    url: String,
    http: HttpClient,
}

impl ExecutionClient {
    /// Create a new [ExecutionClient] with the given [Config].
    pub fn new(config: Config) -> Result<Self, ExecutionClientError> {
        let Config { url, timeout } = config;

        let http = HttpClient::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(ExecutionClientError::Client)?;

        Ok(Self { url, http })
    }
}

impl Execution for ExecutionClient {
    type Error = ExecutionClientError;

    async fn block_by_hash(&self, block_hash: &str) -> Result<ExecutionBlock, Self::Error> {
        let method = "eth_getBlockByHash";
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params: json!([block_hash, true]),
            id: 1,
        };

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|error| ExecutionClientError::Request(method, error))?
            .json::<RpcResponse<BlockDto>>()
            .await
            .map_err(|error| ExecutionClientError::Decode(method, error))?;

        let block = response.into_result(method)?.ok_or_else(|| {
            ExecutionClientError::BlockNotFound(block_hash.to_owned())
        })?;

        Ok(block.into())
    }
}

#[derive(Debug, Error)]
pub enum ExecutionClientError {
    #[error("cannot create HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("cannot make rpc call {0}")]
    Request(&'static str, #[source] reqwest::Error),

    #[error("cannot decode response of rpc call {0}")]
    Decode(&'static str, #[source] reqwest::Error),

    #[error("rpc call {0} failed with code {1}: {2}")]
    Rpc(&'static str, i64, String),

    #[error("execution block {0} not found")]
    BlockNotFound(String),
}

#[derive(Debug, Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    method: &'static str,
    params: serde_json::Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorDto>,
}

impl<T> RpcResponse<T> {
    /// The result, `None` for a `null` one.
    fn into_result(self, method: &'static str) -> Result<Option<T>, ExecutionClientError> {
        match self.error {
            Some(RpcErrorDto { code, message }) => {
                Err(ExecutionClientError::Rpc(method, code, message))
            }
            None => Ok(self.result),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcErrorDto {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct BlockDto {
    transactions: Vec<TransactionDto>,
}

#[derive(Debug, Deserialize)]
struct TransactionDto {
    to: Option<String>,
}

impl From<BlockDto> for ExecutionBlock {
    fn from(dto: BlockDto) -> Self {
        let transactions = dto
            .transactions
            .into_iter()
            .map(|transaction| ExecutionTransaction { to: transaction.to })
            .collect();

        Self { transactions }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        domain::execution::ExecutionBlock,
        infra::execution_client::{BlockDto, ExecutionClientError, RpcResponse},
    };
    use assert_matches::assert_matches;
    use indoc::indoc;

    #[test]
    fn test_decode_block() {
        let json = indoc! {r#"
            {
              "jsonrpc": "2.0",
              "id": 1,
              "result": {
                "hash": "0xb10c",
                "number": "0x1b4",
                "transactions": [
                  { "hash": "0x01", "from": "0xaaaa", "to": "0xBBBB", "value": "0x0" },
                  { "hash": "0x02", "from": "0xaaaa", "to": null, "value": "0x0" }
                ]
              }
            }
        "#};

        let response = serde_json::from_str::<RpcResponse<BlockDto>>(json)
            .expect("block response can be decoded");
        let block = response
            .into_result("eth_getBlockByHash")
            .expect("response is no error")
            .map(ExecutionBlock::from)
            .expect("block is not null");

        let recipients = block
            .transactions
            .iter()
            .map(|transaction| transaction.to.as_deref())
            .collect::<Vec<_>>();
        assert_eq!(recipients, vec![Some("0xBBBB"), None]);
    }

    #[test]
    fn test_decode_null_and_error() {
        let json = r#"{ "jsonrpc": "2.0", "id": 1, "result": null }"#;
        let response = serde_json::from_str::<RpcResponse<BlockDto>>(json)
            .expect("null response can be decoded");
        assert_matches!(response.into_result("eth_getBlockByHash"), Ok(None));

        let json = indoc! {r#"
            {
              "jsonrpc": "2.0",
              "id": 1,
              "error": { "code": -32602, "message": "invalid argument 0: hex string has length 4" }
            }
        "#};
        let response = serde_json::from_str::<RpcResponse<BlockDto>>(json)
            .expect("error response can be decoded");
        assert_matches!(
            response.into_result("eth_getBlockByHash"),
            Err(ExecutionClientError::Rpc("eth_getBlockByHash", -32602, _))
        );
    }
}
