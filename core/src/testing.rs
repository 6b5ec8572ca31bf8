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

//! In-memory fakes for the two out-of-scope backend collaborators,
//! injected via constructor in place of the real HTTP/gRPC clients
//! (distilled spec §9, "tests substitute in-memory fakes via
//! constructor injection"). Shared across this crate's and the
//! dispatcher/pipeline tests in `evm-relay-rpc`.

use std::sync::{
	atomic::{AtomicU64, Ordering},
	Mutex,
};

use async_trait::async_trait;
use ethereum_types::{H160, H256, U256};
use evm_relay_primitives::{AccountView, Block, BlockTag, CallRequest, LogFilter, Log, RelayError, TransactionReceipt};

use crate::collaborators::{ConsensusClient, MirrorClient, StagedFileId, SubmissionOutcome};

pub struct FakeMirrorClient {
	pub account: Mutex<AccountView>,
	pub reference_gas_price: U256,
	pub receipts: Mutex<std::collections::HashMap<H256, TransactionReceipt>>,
	pub blocks_by_number: Mutex<std::collections::HashMap<u64, Block>>,
	pub latest_block: Mutex<u64>,
	pub logs: Mutex<Vec<Log>>,
	pub code: Mutex<std::collections::HashMap<H160, Vec<u8>>>,
}

impl FakeMirrorClient {
	pub fn new(account: AccountView, reference_gas_price: U256) -> Self {
		FakeMirrorClient {
			account: Mutex::new(account),
			reference_gas_price,
			receipts: Mutex::new(Default::default()),
			blocks_by_number: Mutex::new(Default::default()),
			latest_block: Mutex::new(0),
			logs: Mutex::new(Vec::new()),
			code: Mutex::new(Default::default()),
		}
	}

	pub fn insert_receipt(&self, receipt: TransactionReceipt) {
		self.receipts.lock().unwrap().insert(receipt.transaction_hash, receipt);
	}

	pub fn insert_block(&self, number: u64, block: Block) {
		*self.latest_block.lock().unwrap() = self.latest_block.lock().unwrap().max(number);
		self.blocks_by_number.lock().unwrap().insert(number, block);
	}
}

fn resolve_number(tag: BlockTag, latest: u64) -> Option<u64> {
	match tag {
		BlockTag::Number(n) => Some(n),
		BlockTag::Earliest => Some(0),
		BlockTag::Latest | BlockTag::Pending | BlockTag::Safe | BlockTag::Finalized => Some(latest),
	}
}

#[async_trait]
impl MirrorClient for FakeMirrorClient {
	async fn get_account(&self, _address: H160) -> Result<AccountView, RelayError> {
		Ok(self.account.lock().unwrap().clone())
	}

	async fn get_reference_gas_price(&self) -> Result<U256, RelayError> {
		Ok(self.reference_gas_price)
	}

	async fn get_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>, RelayError> {
		Ok(self.receipts.lock().unwrap().get(&hash).cloned())
	}

	async fn latest_block_number(&self) -> Result<u64, RelayError> {
		Ok(*self.latest_block.lock().unwrap())
	}

	async fn get_block_by_number(&self, tag: BlockTag, _full: bool) -> Result<Option<Block>, RelayError> {
		let latest = *self.latest_block.lock().unwrap();
		let Some(number) = resolve_number(tag, latest) else { return Ok(None) };
		Ok(self.blocks_by_number.lock().unwrap().get(&number).cloned())
	}

	async fn get_block_by_hash(&self, hash: H256, _full: bool) -> Result<Option<Block>, RelayError> {
		Ok(self.blocks_by_number.lock().unwrap().values().find(|b| b.hash == hash).cloned())
	}

	async fn get_code(&self, address: H160, _tag: BlockTag) -> Result<Vec<u8>, RelayError> {
		Ok(self.code.lock().unwrap().get(&address).cloned().unwrap_or_default())
	}

	async fn get_storage_at(&self, _address: H160, _slot: H256, _tag: BlockTag) -> Result<H256, RelayError> {
		Ok(H256::zero())
	}

	async fn get_logs(
		&self,
		filter: &LogFilter,
		_from_block: BlockTag,
		_to_block: BlockTag,
	) -> Result<Vec<Log>, RelayError> {
		Ok(self.logs.lock().unwrap().iter().filter(|log| filter.matches(log)).cloned().collect())
	}

	async fn call(&self, _request: &CallRequest) -> Result<Vec<u8>, RelayError> {
		Ok(Vec::new())
	}

	async fn estimate_gas(&self, _request: &CallRequest) -> Result<u64, RelayError> {
		Ok(21_000)
	}

	async fn fee_history(
		&self,
		_block_count: u64,
		_newest_block: BlockTag,
		_reward_percentiles: &[f64],
	) -> Result<serde_json::Value, RelayError> {
		Ok(serde_json::json!({}))
	}
}

pub struct FakeConsensusClient {
	next_hash_seed: AtomicU64,
	pub staged_files: Mutex<std::collections::HashSet<String>>,
	pub submitted: Mutex<Vec<Vec<u8>>>,
	/// The `staged_file` argument `submit` was called with, one entry per
	/// call, so tests can assert a jumbo-tx submission actually referenced
	/// the staged file rather than silently dropping it.
	pub submitted_with_file: Mutex<Vec<Option<StagedFileId>>>,
}

impl Default for FakeConsensusClient {
	fn default() -> Self {
		FakeConsensusClient {
			next_hash_seed: AtomicU64::new(1),
			staged_files: Mutex::new(Default::default()),
			submitted: Mutex::new(Vec::new()),
			submitted_with_file: Mutex::new(Vec::new()),
		}
	}
}

#[async_trait]
impl ConsensusClient for FakeConsensusClient {
	async fn submit(&self, raw: &[u8], staged_file: Option<&StagedFileId>, synchronous: bool) -> Result<SubmissionOutcome, RelayError> {
		self.submitted.lock().unwrap().push(raw.to_vec());
		self.submitted_with_file.lock().unwrap().push(staged_file.cloned());
		let seed = self.next_hash_seed.fetch_add(1, Ordering::Relaxed);
		let mut bytes = [0u8; 32];
		bytes[24..].copy_from_slice(&seed.to_be_bytes());
		Ok(SubmissionOutcome { transaction_hash: H256::from(bytes), awaited_to_completion: synchronous })
	}

	async fn stage_file(&self, data: &[u8]) -> Result<StagedFileId, RelayError> {
		let id = format!("0.0.{}", data.len());
		self.staged_files.lock().unwrap().insert(id.clone());
		Ok(StagedFileId(id))
	}

	async fn delete_file(&self, id: &StagedFileId) -> Result<(), RelayError> {
		self.staged_files.lock().unwrap().remove(&id.0);
		Ok(())
	}
}
