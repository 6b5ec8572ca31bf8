// Copyright 2024 The Relay Gateway Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Thin HTTP binding for [`ConsensusClient`]. The consensus-node SDK
//! client is named out of scope (distilled §1); `submit` forwards over
//! the standard `eth_sendRawTransaction` surface. File staging has no
//! Ethereum-shaped equivalent, so it is forwarded under a
//! `hedera_`-prefixed method name; a real deployment would replace this
//! whole file with the actual consensus-node SDK client without touching
//! [`evm_relay_core::ConsensusClient`] callers.

use async_trait::async_trait;
use evm_relay_core::{ConsensusClient, StagedFileId, SubmissionOutcome};
use evm_relay_primitives::RelayError;
use reqwest::Client;
use serde_json::{json, Value};

use crate::wire::hex_h256;

pub struct HttpConsensusClient {
	http: Client,
	base_url: String,
}

impl HttpConsensusClient {
	pub fn new(base_url: impl Into<String>) -> Self {
		HttpConsensusClient { http: Client::new(), base_url: base_url.into() }
	}

	async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, RelayError> {
		let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
		let response = self.http.post(&self.base_url).json(&body).send().await.map_err(RelayError::internal)?;
		let parsed: Value = response.json().await.map_err(RelayError::internal)?;
		if let Some(error) = parsed.get("error") {
			return Err(RelayError::internal(format!("consensus node returned an error for {method}: {error}")));
		}
		Ok(parsed.get("result").cloned().unwrap_or(Value::Null))
	}
}

#[async_trait]
impl ConsensusClient for HttpConsensusClient {
	async fn submit(&self, raw: &[u8], staged_file: Option<&StagedFileId>, synchronous: bool) -> Result<SubmissionOutcome, RelayError> {
		let raw_hex = format!("0x{}", hex::encode(raw));
		let result = match staged_file {
			Some(file_id) => self.rpc_call("eth_sendRawTransaction", json!([raw_hex, file_id.0])).await?,
			None => self.rpc_call("eth_sendRawTransaction", json!([raw_hex])).await?,
		};
		Ok(SubmissionOutcome { transaction_hash: hex_h256(&result)?, awaited_to_completion: synchronous })
	}

	async fn stage_file(&self, data: &[u8]) -> Result<StagedFileId, RelayError> {
		let data_hex = format!("0x{}", hex::encode(data));
		let result = self.rpc_call("hedera_stageFile", json!([data_hex])).await?;
		let id = result.as_str().ok_or_else(|| RelayError::internal("stage_file response was not a string id"))?;
		Ok(StagedFileId(id.to_string()))
	}

	async fn delete_file(&self, id: &StagedFileId) -> Result<(), RelayError> {
		self.rpc_call("hedera_deleteFile", json!([id.0])).await?;
		Ok(())
	}
}
