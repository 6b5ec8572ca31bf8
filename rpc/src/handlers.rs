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

//! Concrete handlers for every method in [`crate::registry::MethodRegistry`].
//! Each is a plain function (not `async fn`) returning a boxed future
//! directly, so it coerces to [`crate::registry::HandlerFn`] without an
//! intermediate closure.

use std::sync::Arc;

use evm_relay_primitives::BlockTransactions;
use serde_json::{json, Value};

use crate::{
	context::RpcContext,
	params,
	registry::HandlerFuture,
};

fn hex_u64(value: u64) -> Value {
	json!(format!("{value:#x}"))
}

pub fn eth_chain_id(ctx: Arc<RpcContext>, _params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move { Ok(hex_u64(ctx.config.chain_id)) })
}

pub fn eth_block_number(ctx: Arc<RpcContext>, _params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move { Ok(hex_u64(ctx.mirror.latest_block_number().await?)) })
}

pub fn eth_gas_price(ctx: Arc<RpcContext>, _params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move { Ok(serde_json::to_value(ctx.mirror.get_reference_gas_price().await?).unwrap()) })
}

pub fn eth_max_priority_fee_per_gas(ctx: Arc<RpcContext>, _params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move { Ok(serde_json::to_value(ctx.mirror.get_reference_gas_price().await?).unwrap()) })
}

/// Only the Mirror client's latest-state projection is available through
/// [`evm_relay_core::MirrorClient::get_account`]; the historical block tag
/// is still parsed for shape validation but has no effect on the result
/// (the Mirror API is the out-of-scope component that would serve
/// historical state).
pub fn eth_get_balance(ctx: Arc<RpcContext>, params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		let address = params::address(&params, 0)?;
		params::block_tag(&params, 1, evm_relay_primitives::BlockTag::Latest)?;
		let account = ctx.mirror.get_account(address).await?;
		Ok(serde_json::to_value(account.balance_weibar).unwrap())
	})
}

pub fn eth_get_transaction_count(ctx: Arc<RpcContext>, params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		let address = params::address(&params, 0)?;
		params::block_tag(&params, 1, evm_relay_primitives::BlockTag::Latest)?;
		let account = ctx.mirror.get_account(address).await?;
		let nonce = account.expected_nonce(ctx.config.enable_tx_pool, ctx.config.use_async_tx_processing);
		Ok(hex_u64(nonce))
	})
}

pub fn eth_get_code(ctx: Arc<RpcContext>, params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		let address = params::address(&params, 0)?;
		let tag = params::block_tag(&params, 1, evm_relay_primitives::BlockTag::Latest)?;
		let code = ctx.mirror.get_code(address, tag).await?;
		Ok(json!(format!("0x{}", hex::encode(code))))
	})
}

pub fn eth_get_storage_at(ctx: Arc<RpcContext>, params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		let address = params::address(&params, 0)?;
		let slot = params::hash(&params, 1)?;
		let tag = params::block_tag(&params, 2, evm_relay_primitives::BlockTag::Latest)?;
		let value = ctx.mirror.get_storage_at(address, slot, tag).await?;
		Ok(serde_json::to_value(value).unwrap())
	})
}

pub fn eth_call(ctx: Arc<RpcContext>, params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		let request = params::call_request(&params, 0)?;
		let output = ctx.mirror.call(&request).await?;
		Ok(json!(format!("0x{}", hex::encode(output))))
	})
}

pub fn eth_estimate_gas(ctx: Arc<RpcContext>, params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		let request = params::call_request(&params, 0)?;
		let gas = ctx.mirror.estimate_gas(&request).await?;
		Ok(hex_u64(gas))
	})
}

pub fn eth_get_block_by_number(ctx: Arc<RpcContext>, params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		let tag = params::block_tag(&params, 0, evm_relay_primitives::BlockTag::Latest)?;
		let full = params::boolean(&params, 1)?;
		match ctx.mirror.get_block_by_number(tag, full).await? {
			Some(block) => Ok(serde_json::to_value(block).unwrap()),
			None => Ok(Value::Null),
		}
	})
}

pub fn eth_get_block_by_hash(ctx: Arc<RpcContext>, params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		let hash = params::hash(&params, 0)?;
		let full = params::boolean(&params, 1)?;
		match ctx.mirror.get_block_by_hash(hash, full).await? {
			Some(block) => Ok(serde_json::to_value(block).unwrap()),
			None => Ok(Value::Null),
		}
	})
}

fn transaction_count(transactions: &BlockTransactions) -> u64 {
	match transactions {
		BlockTransactions::Hashes(hashes) => hashes.len() as u64,
		BlockTransactions::Full(receipts) => receipts.len() as u64,
	}
}

pub fn eth_get_block_transaction_count_by_number(ctx: Arc<RpcContext>, params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		let tag = params::block_tag(&params, 0, evm_relay_primitives::BlockTag::Latest)?;
		match ctx.mirror.get_block_by_number(tag, false).await? {
			Some(block) => Ok(hex_u64(transaction_count(&block.transactions))),
			None => Ok(Value::Null),
		}
	})
}

pub fn eth_get_block_transaction_count_by_hash(ctx: Arc<RpcContext>, params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		let hash = params::hash(&params, 0)?;
		match ctx.mirror.get_block_by_hash(hash, false).await? {
			Some(block) => Ok(hex_u64(transaction_count(&block.transactions))),
			None => Ok(Value::Null),
		}
	})
}

pub fn eth_get_block_receipts(ctx: Arc<RpcContext>, params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		let tag = params::block_tag(&params, 0, evm_relay_primitives::BlockTag::Latest)?;
		match ctx.mirror.get_block_by_number(tag, true).await? {
			Some(block) => match block.transactions {
				BlockTransactions::Full(receipts) => Ok(serde_json::to_value(receipts).unwrap()),
				BlockTransactions::Hashes(_) => Ok(json!([])),
			},
			None => Ok(Value::Null),
		}
	})
}

/// Projects the subset of fields a receipt carries into a
/// transaction-shaped response. The Mirror client's receipt projection
/// does not carry `nonce`, `value`, `gas`, or `input` — reconstructing a
/// full transaction body from consensus records is out of scope for this
/// gateway (distilled spec §1 Non-goals: "no EVM execution" extends to
/// not re-deriving call data this gateway never decoded).
fn transaction_view_from_receipt(receipt: &evm_relay_primitives::TransactionReceipt) -> Value {
	json!({
		"hash": receipt.transaction_hash,
		"blockHash": receipt.block_hash,
		"blockNumber": receipt.block_number,
		"transactionIndex": receipt.transaction_index,
		"from": receipt.from,
		"to": receipt.to,
		"type": receipt.transaction_type,
	})
}

pub fn eth_get_transaction_by_hash(ctx: Arc<RpcContext>, params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		let hash = params::hash(&params, 0)?;
		match ctx.mirror.get_receipt(hash).await? {
			Some(receipt) => Ok(transaction_view_from_receipt(&receipt)),
			None => Ok(Value::Null),
		}
	})
}

pub fn eth_get_transaction_by_block_hash_and_index(ctx: Arc<RpcContext>, params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		let hash = params::hash(&params, 0)?;
		let index = params::u64_value(&params, 1)? as usize;
		match ctx.mirror.get_block_by_hash(hash, true).await? {
			Some(block) => match block.transactions {
				BlockTransactions::Full(receipts) => Ok(receipts.get(index).map(transaction_view_from_receipt).unwrap_or(Value::Null)),
				BlockTransactions::Hashes(_) => Ok(Value::Null),
			},
			None => Ok(Value::Null),
		}
	})
}

pub fn eth_get_transaction_by_block_number_and_index(ctx: Arc<RpcContext>, params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		let tag = params::block_tag(&params, 0, evm_relay_primitives::BlockTag::Latest)?;
		let index = params::u64_value(&params, 1)? as usize;
		match ctx.mirror.get_block_by_number(tag, true).await? {
			Some(block) => match block.transactions {
				BlockTransactions::Full(receipts) => Ok(receipts.get(index).map(transaction_view_from_receipt).unwrap_or(Value::Null)),
				BlockTransactions::Hashes(_) => Ok(Value::Null),
			},
			None => Ok(Value::Null),
		}
	})
}

pub fn eth_get_transaction_receipt(ctx: Arc<RpcContext>, params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		let hash = params::hash(&params, 0)?;
		match ctx.mirror.get_receipt(hash).await? {
			Some(receipt) => Ok(serde_json::to_value(receipt).unwrap()),
			None => Ok(Value::Null),
		}
	})
}

/// Resolves a possibly-relative block tag to a concrete number, the only
/// shape against which `ETH_GET_LOGS_BLOCK_RANGE_LIMIT` can be enforced.
async fn resolve_block_number(ctx: &RpcContext, tag: evm_relay_primitives::BlockTag) -> Result<u64, evm_relay_primitives::RelayError> {
	use evm_relay_primitives::BlockTag;
	match tag {
		BlockTag::Number(n) => Ok(n),
		BlockTag::Earliest => Ok(0),
		BlockTag::Latest | BlockTag::Pending | BlockTag::Safe | BlockTag::Finalized => ctx.mirror.latest_block_number().await,
	}
}

pub fn eth_get_logs(ctx: Arc<RpcContext>, params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		let (filter, from_tag, to_tag) = params::log_filter(&params, 0)?;
		let from_number = resolve_block_number(&ctx, from_tag).await?;
		let to_number = resolve_block_number(&ctx, to_tag).await?;
		if to_number >= from_number && to_number - from_number > ctx.config.eth_get_logs_block_range_limit {
			return Err(evm_relay_primitives::RelayError::InvalidArguments(format!(
				"block range {from_number}..{to_number} exceeds the configured limit of {} blocks",
				ctx.config.eth_get_logs_block_range_limit
			)));
		}
		let logs = ctx.mirror.get_logs(&filter, from_tag, to_tag).await?;
		Ok(serde_json::to_value(logs).unwrap())
	})
}

pub fn eth_fee_history(ctx: Arc<RpcContext>, params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		let block_count = params::u64_value(&params, 0)?;
		let newest_block = params::block_tag(&params, 1, evm_relay_primitives::BlockTag::Latest)?;
		let percentiles = params::percentile_list(&params, 2)?;
		ctx.mirror.fee_history(block_count, newest_block, &percentiles).await
	})
}

pub fn eth_syncing(_ctx: Arc<RpcContext>, _params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move { Ok(json!(false)) })
}

pub fn eth_accounts(_ctx: Arc<RpcContext>, _params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move { Ok(json!([])) })
}

pub fn eth_mining(_ctx: Arc<RpcContext>, _params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move { Ok(json!(false)) })
}

pub fn eth_hashrate(_ctx: Arc<RpcContext>, _params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move { Ok(json!("0x0")) })
}

pub fn eth_coinbase(_ctx: Arc<RpcContext>, _params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		Err(evm_relay_primitives::RelayError::UnsupportedOperation("this relay has no miner account".to_string()))
	})
}

pub fn eth_send_raw_transaction(ctx: Arc<RpcContext>, params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		let raw = params::bytes(&params, 0)?;
		let outcome = ctx.pipeline.submit(&raw).await?;
		Ok(json!(format!("{:#x}", outcome.transaction_hash)))
	})
}

pub fn net_version(ctx: Arc<RpcContext>, _params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move { Ok(json!(ctx.config.chain_id.to_string())) })
}

pub fn net_listening(_ctx: Arc<RpcContext>, _params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move { Ok(json!(true)) })
}

pub fn net_peer_count(_ctx: Arc<RpcContext>, _params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move { Ok(json!("0x0")) })
}

pub fn web3_client_version(ctx: Arc<RpcContext>, _params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move { Ok(json!(ctx.client_version.clone())) })
}

/// Tracer output requires decoding EVM opcode traces and contract ABIs,
/// which distilled spec §1 places out of scope for this gateway; the
/// method is registered (and gated by `DEBUG_API_ENABLED`) purely so a
/// caller sees a clean `UnsupportedOperation` rather than a 404.
fn debug_unsupported() -> HandlerFuture {
	Box::pin(async move {
		Err(evm_relay_primitives::RelayError::UnsupportedOperation(
			"debug tracing requires ABI/opcode decoding, which this relay does not implement".to_string(),
		))
	})
}

pub fn debug_trace_transaction(_ctx: Arc<RpcContext>, raw_params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		params::hash(&raw_params, 0)?;
		params::tracer_config(&raw_params, 1)?;
		debug_unsupported().await
	})
}

pub fn debug_trace_block_by_number(_ctx: Arc<RpcContext>, raw_params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		params::block_tag(&raw_params, 0, evm_relay_primitives::BlockTag::Latest)?;
		params::tracer_config(&raw_params, 1)?;
		debug_unsupported().await
	})
}

pub fn debug_trace_block_by_hash(_ctx: Arc<RpcContext>, raw_params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		params::hash(&raw_params, 0)?;
		params::tracer_config(&raw_params, 1)?;
		debug_unsupported().await
	})
}

pub fn debug_get_bad_blocks(_ctx: Arc<RpcContext>, _params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move { Ok(json!([])) })
}

pub fn txpool_content(_ctx: Arc<RpcContext>, _params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move { Ok(json!({ "pending": {}, "queued": {} })) })
}

/// `eth_subscribe`/`eth_unsubscribe` are WebSocket-only (distilled spec
/// §6); the Subscription Engine in `evm-relay-ws` intercepts them before
/// dispatch over a WS connection. Reaching this handler means the call
/// arrived over HTTP.
pub fn eth_subscribe_over_http(_ctx: Arc<RpcContext>, _params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		Err(evm_relay_primitives::RelayError::UnsupportedOperation("use a WebSocket connection for subscriptions".to_string()))
	})
}

pub fn eth_unsubscribe_over_http(_ctx: Arc<RpcContext>, _params: Vec<Value>) -> HandlerFuture {
	Box::pin(async move {
		Err(evm_relay_primitives::RelayError::UnsupportedOperation("use a WebSocket connection for subscriptions".to_string()))
	})
}
