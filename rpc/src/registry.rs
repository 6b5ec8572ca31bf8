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

//! The static method table (distilled spec §4.7): name, handler,
//! parameter schema, cache policy, and gating flags. Built once at
//! start-up and never mutated afterwards — the Dispatcher only reads
//! from it.

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use evm_relay_primitives::RelayError;
use serde_json::Value;

use crate::context::RpcContext;

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, RelayError>> + Send + 'static>>;
pub type HandlerFn = fn(Arc<RpcContext>, Vec<Value>) -> HandlerFuture;

/// Shape a parameter's value must take, checked positionally by the
/// dispatcher before a request ever reaches its handler. Deliberately
/// shallow — it rejects the wrong JSON shape (a number where an object
/// belongs, a non-hex string where an address belongs) but leaves
/// semantic decoding (checksum bytes, tag enums, RLP) to the `params::`
/// helpers the handler calls afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
	/// No shape constraint; any present value (including `null`) passes.
	Any,
	/// A `0x`-prefixed, 20-byte hex string.
	Address,
	/// A `0x`-prefixed, 32-byte hex string.
	Hash,
	/// A `0x`-prefixed hex string of unspecified length (quantities, raw
	/// transaction bytes, indices).
	HexString,
	/// A block tag or block-number string; exact values are validated by
	/// `params::block_tag`.
	BlockTag,
	/// A JSON object (call requests, filters, tracer configs).
	Object,
	JsonArray,
	Bool,
	String,
}

impl ParamType {
	fn check(self, value: &Value) -> Result<(), &'static str> {
		match self {
			ParamType::Any => Ok(()),
			ParamType::Address => check_hex_string(value, 40, "a 20-byte hex address"),
			ParamType::Hash => check_hex_string(value, 64, "a 32-byte hex value"),
			ParamType::HexString => check_hex_string_any_length(value),
			ParamType::BlockTag | ParamType::String => {
				if value.is_string() {
					Ok(())
				} else {
					Err("a string")
				}
			},
			ParamType::Object => {
				if value.is_object() {
					Ok(())
				} else {
					Err("an object")
				}
			},
			ParamType::JsonArray => {
				if value.is_array() {
					Ok(())
				} else {
					Err("an array")
				}
			},
			ParamType::Bool => {
				if value.is_boolean() {
					Ok(())
				} else {
					Err("a boolean")
				}
			},
		}
	}
}

fn check_hex_string(value: &Value, hex_digits: usize, expected: &'static str) -> Result<(), &'static str> {
	let Some(text) = value.as_str() else { return Err(expected) };
	let digits = text.strip_prefix("0x").unwrap_or(text);
	if digits.len() == hex_digits && digits.chars().all(|c| c.is_ascii_hexdigit()) {
		Ok(())
	} else {
		Err(expected)
	}
}

fn check_hex_string_any_length(value: &Value) -> Result<(), &'static str> {
	let Some(text) = value.as_str() else { return Err("a 0x-prefixed hex string") };
	let digits = text.strip_prefix("0x").unwrap_or(text);
	if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit()) {
		Ok(())
	} else {
		Err("a 0x-prefixed hex string")
	}
}

pub struct ParamSpec {
	pub name: &'static str,
	pub required: bool,
	pub kind: ParamType,
}

pub const fn required(name: &'static str, kind: ParamType) -> ParamSpec {
	ParamSpec { name, required: true, kind }
}

pub const fn optional(name: &'static str, kind: ParamType) -> ParamSpec {
	ParamSpec { name, required: false, kind }
}

/// Checks `params` against `schema` positionally, returning the index and
/// reason of the first mismatch. Driven by the dispatcher ahead of every
/// handler call (distilled spec §4.7/§4.8).
pub fn validate_params(schema: &[ParamSpec], params: &[Value]) -> Result<(), RelayError> {
	for (index, spec) in schema.iter().enumerate() {
		match params.get(index) {
			Some(value) if !value.is_null() => {
				if let Err(reason) = spec.kind.check(value) {
					return Err(RelayError::InvalidParameter { index, reason: format!("{} must be {reason}", spec.name) });
				}
			},
			_ if spec.required => return Err(RelayError::MissingRequiredParameter { index }),
			_ => {},
		}
	}
	Ok(())
}

pub struct MethodEntry {
	pub name: &'static str,
	pub handler: HandlerFn,
	pub param_schema: &'static [ParamSpec],
	/// `None` means never cached (mutation methods, or methods whose
	/// result is never safe to reuse across requests).
	pub cache_ttl_ms: Option<u64>,
	pub read_only_allowed: bool,
	pub debug_api_guarded: bool,
	pub txpool_guarded: bool,
	pub ws_allowed: bool,
}

pub struct MethodRegistry {
	entries: HashMap<&'static str, MethodEntry>,
}

macro_rules! entry {
	($map:expr, $name:expr, $handler:expr, $schema:expr, $cache_ttl_ms:expr, $read_only:expr, $debug:expr, $txpool:expr, $ws:expr) => {
		$map.insert(
			$name,
			MethodEntry {
				name: $name,
				handler: $handler,
				param_schema: $schema,
				cache_ttl_ms: $cache_ttl_ms,
				read_only_allowed: $read_only,
				debug_api_guarded: $debug,
				txpool_guarded: $txpool,
				ws_allowed: $ws,
			},
		);
	};
}

impl MethodRegistry {
	pub fn new() -> Self {
		use crate::handlers::*;

		let mut entries = HashMap::new();

		entry!(entries, "eth_chainId", eth_chain_id, &[], Some(60_000), true, false, false, false);
		entry!(entries, "eth_blockNumber", eth_block_number, &[], Some(1_000), true, false, false, false);
		entry!(entries, "eth_gasPrice", eth_gas_price, &[], Some(1_000), true, false, false, false);
		entry!(
			entries,
			"eth_getBalance",
			eth_get_balance,
			&[required("address", ParamType::Address), optional("block", ParamType::BlockTag)],
			Some(1_000),
			true,
			false,
			false,
			false
		);
		entry!(
			entries,
			"eth_getTransactionCount",
			eth_get_transaction_count,
			&[required("address", ParamType::Address), optional("block", ParamType::BlockTag)],
			Some(1_000),
			true,
			false,
			false,
			false
		);
		entry!(
			entries,
			"eth_getCode",
			eth_get_code,
			&[required("address", ParamType::Address), optional("block", ParamType::BlockTag)],
			Some(60_000),
			true,
			false,
			false,
			false
		);
		entry!(
			entries,
			"eth_getStorageAt",
			eth_get_storage_at,
			&[required("address", ParamType::Address), required("slot", ParamType::Hash), optional("block", ParamType::BlockTag)],
			Some(1_000),
			true,
			false,
			false,
			false
		);
		entry!(
			entries,
			"eth_call",
			eth_call,
			&[required("transaction", ParamType::Object), optional("block", ParamType::BlockTag)],
			None,
			true,
			false,
			false,
			false
		);
		entry!(
			entries,
			"eth_estimateGas",
			eth_estimate_gas,
			&[required("transaction", ParamType::Object), optional("block", ParamType::BlockTag)],
			None,
			true,
			false,
			false,
			false
		);
		entry!(
			entries,
			"eth_getBlockByNumber",
			eth_get_block_by_number,
			&[required("block", ParamType::BlockTag), required("fullTransactions", ParamType::Bool)],
			Some(4_000),
			true,
			false,
			false,
			false
		);
		entry!(
			entries,
			"eth_getBlockByHash",
			eth_get_block_by_hash,
			&[required("hash", ParamType::Hash), required("fullTransactions", ParamType::Bool)],
			Some(60_000),
			true,
			false,
			false,
			false
		);
		entry!(
			entries,
			"eth_getBlockTransactionCountByNumber",
			eth_get_block_transaction_count_by_number,
			&[required("block", ParamType::BlockTag)],
			Some(4_000),
			true,
			false,
			false,
			false
		);
		entry!(
			entries,
			"eth_getBlockTransactionCountByHash",
			eth_get_block_transaction_count_by_hash,
			&[required("hash", ParamType::Hash)],
			Some(60_000),
			true,
			false,
			false,
			false
		);
		entry!(
			entries,
			"eth_getBlockReceipts",
			eth_get_block_receipts,
			&[required("block", ParamType::BlockTag)],
			Some(4_000),
			true,
			false,
			false,
			false
		);
		entry!(
			entries,
			"eth_getTransactionByHash",
			eth_get_transaction_by_hash,
			&[required("hash", ParamType::Hash)],
			Some(60_000),
			true,
			false,
			false,
			false
		);
		entry!(
			entries,
			"eth_getTransactionByBlockHashAndIndex",
			eth_get_transaction_by_block_hash_and_index,
			&[required("hash", ParamType::Hash), required("index", ParamType::HexString)],
			Some(60_000),
			true,
			false,
			false,
			false
		);
		entry!(
			entries,
			"eth_getTransactionByBlockNumberAndIndex",
			eth_get_transaction_by_block_number_and_index,
			&[required("block", ParamType::BlockTag), required("index", ParamType::HexString)],
			Some(4_000),
			true,
			false,
			false,
			false
		);
		entry!(
			entries,
			"eth_getTransactionReceipt",
			eth_get_transaction_receipt,
			&[required("hash", ParamType::Hash)],
			Some(60_000),
			true,
			false,
			false,
			false
		);
		entry!(
			entries,
			"eth_getLogs",
			eth_get_logs,
			&[required("filter", ParamType::Object)],
			Some(4_000),
			true,
			false,
			false,
			false
		);
		entry!(
			entries,
			"eth_feeHistory",
			eth_fee_history,
			&[required("blockCount", ParamType::HexString), required("newestBlock", ParamType::BlockTag), optional("rewardPercentiles", ParamType::JsonArray)],
			Some(4_000),
			true,
			false,
			false,
			false
		);
		entry!(entries, "eth_maxPriorityFeePerGas", eth_max_priority_fee_per_gas, &[], Some(1_000), true, false, false, false);
		entry!(entries, "eth_syncing", eth_syncing, &[], None, true, false, false, false);
		entry!(entries, "eth_accounts", eth_accounts, &[], None, true, false, false, false);
		entry!(entries, "eth_mining", eth_mining, &[], None, true, false, false, false);
		entry!(entries, "eth_hashrate", eth_hashrate, &[], None, true, false, false, false);
		entry!(entries, "eth_coinbase", eth_coinbase, &[], None, true, false, false, false);
		entry!(
			entries,
			"eth_sendRawTransaction",
			eth_send_raw_transaction,
			&[required("transaction", ParamType::HexString)],
			None,
			false,
			false,
			false,
			false
		);
		entry!(entries, "net_version", net_version, &[], Some(60_000), true, false, false, false);
		entry!(entries, "net_listening", net_listening, &[], None, true, false, false, false);
		entry!(entries, "net_peerCount", net_peer_count, &[], None, true, false, false, false);
		entry!(entries, "web3_clientVersion", web3_client_version, &[], Some(60_000), true, false, false, false);

		entry!(
			entries,
			"debug_traceTransaction",
			debug_trace_transaction,
			&[required("hash", ParamType::Hash), optional("tracerConfig", ParamType::Object)],
			None,
			true,
			true,
			false,
			false
		);
		entry!(
			entries,
			"debug_traceBlockByNumber",
			debug_trace_block_by_number,
			&[required("block", ParamType::BlockTag), optional("tracerConfig", ParamType::Object)],
			None,
			true,
			true,
			false,
			false
		);
		entry!(
			entries,
			"debug_traceBlockByHash",
			debug_trace_block_by_hash,
			&[required("hash", ParamType::Hash), optional("tracerConfig", ParamType::Object)],
			None,
			true,
			true,
			false,
			false
		);
		entry!(entries, "debug_getBadBlocks", debug_get_bad_blocks, &[], None, true, true, false, false);
		entry!(entries, "txpool_content", txpool_content, &[], None, true, false, true, false);

		entry!(entries, "eth_subscribe", eth_subscribe_over_http, &[required("kind", ParamType::String), optional("filter", ParamType::Object)], None, true, false, false, true);
		entry!(entries, "eth_unsubscribe", eth_unsubscribe_over_http, &[required("id", ParamType::String)], None, true, false, false, true);

		MethodRegistry { entries }
	}

	pub fn get(&self, method: &str) -> Option<&MethodEntry> {
		self.entries.get(method)
	}
}

impl Default for MethodRegistry {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn required_eth_surface_is_present_and_correctly_gated() {
		let registry = MethodRegistry::new();
		assert!(registry.get("eth_chainId").unwrap().read_only_allowed);
		assert!(!registry.get("eth_sendRawTransaction").unwrap().read_only_allowed);
		assert!(registry.get("debug_traceTransaction").unwrap().debug_api_guarded);
		assert!(registry.get("txpool_content").unwrap().txpool_guarded);
		assert!(registry.get("eth_subscribe").unwrap().ws_allowed);
		assert!(registry.get("unknown_method").is_none());
	}

	#[test]
	fn mutation_method_is_never_cached() {
		let registry = MethodRegistry::new();
		assert!(registry.get("eth_sendRawTransaction").unwrap().cache_ttl_ms.is_none());
		assert!(registry.get("eth_chainId").unwrap().cache_ttl_ms.is_some());
	}
}
