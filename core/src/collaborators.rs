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

//! Interfaces for the two out-of-scope backend collaborators (distilled
//! spec §1): the Mirror API HTTP client and the consensus submission
//! node client. Only their shape is specified here; concrete HTTP/gRPC
//! implementations are not part of this core.

use async_trait::async_trait;
use ethereum_types::{H160, H256, U256};
use evm_relay_primitives::{AccountView, Block, BlockTag, CallRequest, LogFilter, Log, RelayError, TransactionReceipt};

/// Opaque handle to a file staged on the consensus node for jumbo-tx
/// call-data (distilled §4.6 step 5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFileId(pub String);

/// Outcome of submitting signed bytes to the consensus node.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
	pub transaction_hash: H256,
	/// `true` when the caller should await the full receipt before
	/// releasing the account lock (distilled §4.6 step 6, sync mode).
	pub awaited_to_completion: bool,
}

/// The read surface distilled §6 requires the gateway to expose. Every
/// method here is a thin, non-executing projection except [`Self::call`]
/// and [`Self::estimate_gas`], whose actual EVM execution happens on the
/// Mirror API side — the gateway itself still performs no EVM execution
/// (distilled §1 Non-goals).
#[async_trait]
pub trait MirrorClient: Send + Sync {
	async fn get_account(&self, address: H160) -> Result<AccountView, RelayError>;
	async fn get_reference_gas_price(&self) -> Result<U256, RelayError>;
	/// `Ok(None)` on a 404 (not yet indexed) per distilled §7, never an
	/// error for that case.
	async fn get_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>, RelayError>;
	async fn latest_block_number(&self) -> Result<u64, RelayError>;
	async fn get_block_by_number(&self, tag: BlockTag, full: bool) -> Result<Option<Block>, RelayError>;
	async fn get_block_by_hash(&self, hash: H256, full: bool) -> Result<Option<Block>, RelayError>;
	async fn get_code(&self, address: H160, tag: BlockTag) -> Result<Vec<u8>, RelayError>;
	async fn get_storage_at(&self, address: H160, slot: H256, tag: BlockTag) -> Result<H256, RelayError>;
	async fn get_logs(
		&self,
		filter: &LogFilter,
		from_block: BlockTag,
		to_block: BlockTag,
	) -> Result<Vec<Log>, RelayError>;
	async fn call(&self, request: &CallRequest) -> Result<Vec<u8>, RelayError>;
	async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, RelayError>;
	async fn fee_history(
		&self,
		block_count: u64,
		newest_block: BlockTag,
		reward_percentiles: &[f64],
	) -> Result<serde_json::Value, RelayError>;
}

#[async_trait]
pub trait ConsensusClient: Send + Sync {
	/// `staged_file` is `Some` when the caller already staged this
	/// transaction's call-data via [`Self::stage_file`] — `raw` then
	/// carries the transaction with its inline data emptied out
	/// ([`evm_relay_primitives::ChainTransaction::encode_with_data`]) and
	/// the submission must reference the staged file instead (distilled
	/// §4.6 step 5).
	async fn submit(&self, raw: &[u8], staged_file: Option<&StagedFileId>, synchronous: bool) -> Result<SubmissionOutcome, RelayError>;
	/// Stages call-data as a file ahead of a jumbo-tx submission that
	/// references it by id.
	async fn stage_file(&self, data: &[u8]) -> Result<StagedFileId, RelayError>;
	/// Scheduled once the deployed artefact completes; the file must be
	/// observably empty/deleted afterwards (distilled §4.6 step 5).
	async fn delete_file(&self, id: &StagedFileId) -> Result<(), RelayError>;
}
