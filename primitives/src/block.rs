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

//! Ethereum-shaped projections of Mirror-API records: blocks, transactions,
//! receipts, and logs. These are wire types only — building them from raw
//! Mirror-API JSON is the out-of-scope Mirror client's job (distilled §1);
//! the gateway only shapes and serializes what it is handed.

use ethereum_types::{Bloom, H160, H256, U256, U64};
use serde::{Deserialize, Serialize};

fn hex_bytes<S: serde::Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
	serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Block {
	pub number: U64,
	pub hash: H256,
	pub parent_hash: H256,
	#[serde(serialize_with = "hex_bytes")]
	pub extra_data: Vec<u8>,
	pub logs_bloom: Bloom,
	pub transactions_root: H256,
	pub state_root: H256,
	pub receipts_root: H256,
	pub miner: H160,
	pub difficulty: U256,
	pub total_difficulty: U256,
	pub size: U64,
	pub gas_limit: U256,
	pub gas_used: U256,
	pub timestamp: U64,
	pub transactions: BlockTransactions,
	pub uncles: Vec<H256>,
	pub base_fee_per_gas: Option<U256>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum BlockTransactions {
	Hashes(Vec<H256>),
	Full(Vec<TransactionReceipt>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
	pub transaction_hash: H256,
	pub transaction_index: U64,
	pub block_hash: H256,
	pub block_number: U64,
	pub from: H160,
	pub to: Option<H160>,
	pub cumulative_gas_used: U256,
	pub gas_used: U256,
	pub contract_address: Option<H160>,
	pub logs: Vec<Log>,
	pub logs_bloom: Bloom,
	pub status: U64,
	pub effective_gas_price: U256,
	#[serde(rename = "type")]
	pub transaction_type: U64,
	/// UTF-8 decoded revert reason surfaced on failure, never an RPC error
	/// (distilled §4.6, reserved-address rule; §8 testable properties).
	pub revert_reason: Option<String>,
}

impl TransactionReceipt {
	/// Projects a synthetic transaction (a native transfer that produced
	/// logs but no EVM execution) in Ethereum shape: zero gas, empty
	/// input/output, matching distilled §3.
	pub fn synthetic(
		transaction_hash: H256,
		transaction_index: U64,
		block_hash: H256,
		block_number: U64,
		from: H160,
		to: Option<H160>,
		logs: Vec<Log>,
		status: U64,
		revert_reason: Option<String>,
	) -> Self {
		TransactionReceipt {
			transaction_hash,
			transaction_index,
			block_hash,
			block_number,
			from,
			to,
			cumulative_gas_used: U256::zero(),
			gas_used: U256::zero(),
			contract_address: None,
			logs,
			logs_bloom: Bloom::zero(),
			status,
			effective_gas_price: U256::zero(),
			transaction_type: U64::zero(),
			revert_reason,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Log {
	pub address: H160,
	pub topics: Vec<H256>,
	#[serde(serialize_with = "hex_bytes")]
	pub data: Vec<u8>,
	pub block_hash: Option<H256>,
	pub block_number: Option<U64>,
	pub transaction_hash: Option<H256>,
	pub transaction_index: Option<U64>,
	pub log_index: Option<U64>,
	pub removed: bool,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn synthetic_receipt_has_zero_gas_and_no_contract_address() {
		let receipt = TransactionReceipt::synthetic(
			H256::zero(),
			U64::zero(),
			H256::zero(),
			U64::zero(),
			H160::zero(),
			Some(H160::repeat_byte(1)),
			Vec::new(),
			U64::one(),
			None,
		);
		assert!(receipt.gas_used.is_zero());
		assert!(receipt.contract_address.is_none());
	}

	#[test]
	fn reserved_account_revert_reasons_round_trip_as_utf8() {
		let receipt = TransactionReceipt::synthetic(
			H256::zero(),
			U64::zero(),
			H256::zero(),
			U64::zero(),
			H160::zero(),
			Some(H160::repeat_byte(2)),
			Vec::new(),
			U64::zero(),
			Some("INVALID_CONTRACT_ID".to_string()),
		);
		assert_eq!(receipt.revert_reason.as_deref(), Some("INVALID_CONTRACT_ID"));
	}
}
