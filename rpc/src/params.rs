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

//! Decodes untyped JSON-RPC parameters into the tagged types handlers
//! expect, per distilled spec §9 ("Dynamic parameter shapes"). Every
//! failure here carries the offending parameter's index so the
//! dispatcher can report it verbatim.

use std::collections::HashSet;

use ethereum_types::{H160, H256, U256};
use evm_relay_primitives::{BlockTag, CallRequest, LogFilter, RelayError, TopicSlot};
use serde_json::Value;

pub fn required(params: &[Value], index: usize) -> Result<&Value, RelayError> {
	params.get(index).filter(|value| !value.is_null()).ok_or(RelayError::MissingRequiredParameter { index })
}

pub fn optional(params: &[Value], index: usize) -> Option<&Value> {
	params.get(index).filter(|value| !value.is_null())
}

fn as_hex_str(value: &Value, index: usize) -> Result<&str, RelayError> {
	value.as_str().ok_or_else(|| RelayError::InvalidParameter { index, reason: "expected a 0x-prefixed string".to_string() })
}

fn parse_address(raw: &str, index: usize) -> Result<H160, RelayError> {
	let stripped = raw.strip_prefix("0x").unwrap_or(raw);
	if stripped.len() != 40 {
		return Err(RelayError::InvalidParameter { index, reason: "expected a 20-byte address".to_string() });
	}
	let mut bytes = [0u8; 20];
	hex::decode_to_slice(stripped, &mut bytes)
		.map_err(|_| RelayError::InvalidParameter { index, reason: "invalid hex address".to_string() })?;
	Ok(H160::from(bytes))
}

fn parse_hash(raw: &str, index: usize) -> Result<H256, RelayError> {
	let stripped = raw.strip_prefix("0x").unwrap_or(raw);
	if stripped.len() != 64 {
		return Err(RelayError::InvalidParameter { index, reason: "expected a 32-byte hash".to_string() });
	}
	let mut bytes = [0u8; 32];
	hex::decode_to_slice(stripped, &mut bytes)
		.map_err(|_| RelayError::InvalidParameter { index, reason: "invalid hex hash".to_string() })?;
	Ok(H256::from(bytes))
}

fn parse_u256(raw: &str, index: usize) -> Result<U256, RelayError> {
	let stripped = raw
		.strip_prefix("0x")
		.ok_or_else(|| RelayError::InvalidParameter { index, reason: "expected a 0x-prefixed integer".to_string() })?;
	let stripped = if stripped.is_empty() { "0" } else { stripped };
	U256::from_str_radix(stripped, 16).map_err(|_| RelayError::InvalidParameter { index, reason: "invalid hex integer".to_string() })
}

fn parse_bytes(raw: &str, index: usize) -> Result<Vec<u8>, RelayError> {
	let stripped = raw.strip_prefix("0x").unwrap_or(raw);
	let padded = if stripped.len() % 2 == 1 { format!("0{stripped}") } else { stripped.to_string() };
	hex::decode(padded).map_err(|_| RelayError::InvalidParameter { index, reason: "invalid hex byte string".to_string() })
}

pub fn address(params: &[Value], index: usize) -> Result<H160, RelayError> {
	parse_address(as_hex_str(required(params, index)?, index)?, index)
}

pub fn hash(params: &[Value], index: usize) -> Result<H256, RelayError> {
	parse_hash(as_hex_str(required(params, index)?, index)?, index)
}

pub fn u256_value(params: &[Value], index: usize) -> Result<U256, RelayError> {
	parse_u256(as_hex_str(required(params, index)?, index)?, index)
}

pub fn u64_value(params: &[Value], index: usize) -> Result<u64, RelayError> {
	Ok(u256_value(params, index)?.as_u64())
}

pub fn bytes(params: &[Value], index: usize) -> Result<Vec<u8>, RelayError> {
	parse_bytes(as_hex_str(required(params, index)?, index)?, index)
}

pub fn boolean(params: &[Value], index: usize) -> Result<bool, RelayError> {
	required(params, index)?
		.as_bool()
		.ok_or_else(|| RelayError::InvalidParameter { index, reason: "expected a boolean".to_string() })
}

pub fn optional_boolean(params: &[Value], index: usize, default: bool) -> Result<bool, RelayError> {
	match optional(params, index) {
		Some(value) => {
			value.as_bool().ok_or_else(|| RelayError::InvalidParameter { index, reason: "expected a boolean".to_string() })
		},
		None => Ok(default),
	}
}

pub fn block_tag(params: &[Value], index: usize, default: BlockTag) -> Result<BlockTag, RelayError> {
	match optional(params, index) {
		Some(value) => BlockTag::parse(as_hex_str(value, index)?)
			.map_err(|_| RelayError::InvalidParameter { index, reason: "invalid block tag".to_string() }),
		None => Ok(default),
	}
}

pub fn percentile_list(params: &[Value], index: usize) -> Result<Vec<f64>, RelayError> {
	match optional(params, index) {
		Some(Value::Array(items)) => items
			.iter()
			.map(|item| item.as_f64().ok_or_else(|| RelayError::InvalidParameter { index, reason: "reward percentiles must be numbers".to_string() }))
			.collect(),
		Some(_) => Err(RelayError::InvalidParameter { index, reason: "expected an array of percentiles".to_string() }),
		None => Ok(Vec::new()),
	}
}

/// Decodes the transaction object `eth_call`/`eth_estimateGas` take as
/// their first parameter; the block tag (second, optional parameter)
/// defaults to `latest`.
pub fn call_request(params: &[Value], index: usize) -> Result<CallRequest, RelayError> {
	let value = required(params, index)?;
	let object = value
		.as_object()
		.ok_or_else(|| RelayError::InvalidParameter { index, reason: "expected a transaction object".to_string() })?;

	let from = object.get("from").and_then(Value::as_str).map(|raw| parse_address(raw, index)).transpose()?;
	let to = object.get("to").and_then(Value::as_str).map(|raw| parse_address(raw, index)).transpose()?;
	let gas = object
		.get("gas")
		.and_then(Value::as_str)
		.map(|raw| parse_u256(raw, index))
		.transpose()?
		.map(|value| value.as_u64());
	let gas_price = object.get("gasPrice").and_then(Value::as_str).map(|raw| parse_u256(raw, index)).transpose()?;
	let value_field = object.get("value").and_then(Value::as_str).map(|raw| parse_u256(raw, index)).transpose()?;
	let data = object
		.get("data")
		.or_else(|| object.get("input"))
		.and_then(Value::as_str)
		.map(|raw| parse_bytes(raw, index))
		.transpose()?
		.unwrap_or_default();

	let tag = block_tag(params, index + 1, BlockTag::Latest)?;
	Ok(CallRequest { from, to, gas, gas_price, value: value_field, data, block_tag: tag })
}

/// Decodes `eth_getLogs`'s filter object. `fromBlock`/`toBlock` default
/// to `latest` unless an explicit `toBlock` is present with no
/// `fromBlock`, which is rejected with `MissingFromBlockParam` — a
/// block-range limit cannot be enforced without a concrete lower bound
/// (distilled spec §4.1, §6 `ETH_GET_LOGS_BLOCK_RANGE_LIMIT`).
pub fn log_filter(params: &[Value], index: usize) -> Result<(LogFilter, BlockTag, BlockTag), RelayError> {
	let value = required(params, index)?;
	let object = value
		.as_object()
		.ok_or_else(|| RelayError::InvalidParameter { index, reason: "expected a filter object".to_string() })?;

	if object.contains_key("toBlock") && !object.contains_key("fromBlock") {
		return Err(RelayError::MissingFromBlockParam);
	}

	let from_block = match object.get("fromBlock").and_then(Value::as_str) {
		Some(raw) => BlockTag::parse(raw).map_err(|_| RelayError::InvalidParameter { index, reason: "invalid fromBlock".to_string() })?,
		None => BlockTag::Latest,
	};
	let to_block = match object.get("toBlock").and_then(Value::as_str) {
		Some(raw) => BlockTag::parse(raw).map_err(|_| RelayError::InvalidParameter { index, reason: "invalid toBlock".to_string() })?,
		None => BlockTag::Latest,
	};

	let mut addresses = HashSet::new();
	match object.get("address") {
		Some(Value::String(raw)) => {
			addresses.insert(parse_address(raw, index)?);
		},
		Some(Value::Array(items)) => {
			for item in items {
				let raw = item
					.as_str()
					.ok_or_else(|| RelayError::InvalidParameter { index, reason: "address entries must be strings".to_string() })?;
				addresses.insert(parse_address(raw, index)?);
			}
		},
		None | Some(Value::Null) => {},
		Some(_) => return Err(RelayError::InvalidParameter { index, reason: "invalid address filter".to_string() }),
	}

	let mut topics = Vec::new();
	if let Some(Value::Array(slots)) = object.get("topics") {
		for slot in slots {
			match slot {
				Value::Null => topics.push(TopicSlot::Wildcard),
				Value::String(raw) => {
					let mut set = HashSet::new();
					set.insert(parse_hash(raw, index)?);
					topics.push(TopicSlot::AnyOf(set));
				},
				Value::Array(options) => {
					let mut set = HashSet::new();
					for option in options {
						let raw = option
							.as_str()
							.ok_or_else(|| RelayError::InvalidParameter { index, reason: "topic entries must be strings".to_string() })?;
						set.insert(parse_hash(raw, index)?);
					}
					topics.push(TopicSlot::AnyOf(set));
				},
				_ => return Err(RelayError::InvalidParameter { index, reason: "invalid topics filter".to_string() }),
			}
		}
	}

	Ok((LogFilter { addresses, topics }, from_block, to_block))
}

/// Option keys recognised under `callTracer`'s config.
const CALL_TRACER_OPTIONS: &[&str] = &["onlyTopCall"];
/// Option keys recognised under `opcodeLogger`'s config. `fullStorage` is
/// accepted for Remix compatibility (distilled spec §9) even though it
/// has no effect here.
const OPCODE_LOGGER_OPTIONS: &[&str] = &["enableMemory", "disableStack", "disableStorage", "enableReturnData", "fullStorage"];

/// Decodes the optional `tracerConfig` parameter `debug_traceTransaction`/
/// `debug_traceBlockByNumber`/`debug_traceBlockByHash` take (distilled
/// spec §6). Validates the tracer name and its option shape without
/// acting on them — tracer *execution* requires ABI/opcode decoding,
/// out of distilled scope (§1), but the wire-level validation contract
/// is not.
///
/// Accepts both the flat shape (`{tracer, onlyTopCall}`) and the nested
/// shape (`{tracer, tracerConfig: {onlyTopCall}}`); a request that puts
/// option keys in both places at once is rejected, as is a request that
/// uses one tracer's options with another tracer's name.
pub fn tracer_config(params: &[Value], index: usize) -> Result<(), RelayError> {
	let Some(value) = optional(params, index) else { return Ok(()) };
	let object = value
		.as_object()
		.ok_or_else(|| RelayError::InvalidParameter { index, reason: "expected a tracer config object".to_string() })?;

	let tracer = object
		.get("tracer")
		.and_then(Value::as_str)
		.ok_or_else(|| RelayError::InvalidParameter { index, reason: "missing or invalid `tracer` name".to_string() })?;
	let recognised_options: &[&str] = match tracer {
		"callTracer" => CALL_TRACER_OPTIONS,
		"opcodeLogger" => OPCODE_LOGGER_OPTIONS,
		"prestateTracer" => &[],
		_ => return Err(RelayError::InvalidParameter { index, reason: format!("unknown tracer `{tracer}`") }),
	};

	let nested = object.get("tracerConfig").and_then(Value::as_object);
	let flat_option_keys: Vec<&str> =
		object.keys().map(String::as_str).filter(|key| *key != "tracer" && *key != "tracerConfig").collect();

	if nested.is_some() && !flat_option_keys.is_empty() {
		return Err(RelayError::InvalidParameter {
			index,
			reason: "tracer options must be given either nested under `tracerConfig` or flat, not both".to_string(),
		});
	}

	let option_keys: Vec<&str> = match nested {
		Some(nested) => nested.keys().map(String::as_str).collect(),
		None => flat_option_keys,
	};

	for key in option_keys {
		if !recognised_options.contains(&key) {
			return Err(RelayError::InvalidParameter { index, reason: format!("option `{key}` is not valid for tracer `{tracer}`") });
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn missing_required_parameter_reports_its_index() {
		let err = address(&[], 0).unwrap_err();
		assert!(matches!(err, RelayError::MissingRequiredParameter { index: 0 }));
	}

	#[test]
	fn address_rejects_wrong_length() {
		let params = vec![json!("0x1234")];
		let err = address(&params, 0).unwrap_err();
		assert!(matches!(err, RelayError::InvalidParameter { index: 0, .. }));
	}

	#[test]
	fn block_tag_defaults_when_absent() {
		let tag = block_tag(&[], 0, BlockTag::Latest).unwrap();
		assert_eq!(tag, BlockTag::Latest);
	}

	#[test]
	fn log_filter_requires_from_block_when_to_block_given() {
		let params = vec![json!({ "toBlock": "0x10" })];
		let err = log_filter(&params, 0).unwrap_err();
		assert!(matches!(err, RelayError::MissingFromBlockParam));
	}

	#[test]
	fn log_filter_parses_address_array_and_positional_topics() {
		let params = vec![json!({
			"address": ["0x0000000000000000000000000000000000000001"],
			"topics": [null, "0x0000000000000000000000000000000000000000000000000000000000000002"],
		})];
		let (filter, from, to) = log_filter(&params, 0).unwrap();
		assert_eq!(filter.addresses.len(), 1);
		assert_eq!(filter.topics.len(), 2);
		assert_eq!(from, BlockTag::Latest);
		assert_eq!(to, BlockTag::Latest);
	}

	#[test]
	fn call_request_reads_block_tag_from_the_second_parameter() {
		let params = vec![json!({ "to": "0x0000000000000000000000000000000000000001" }), json!("earliest")];
		let request = call_request(&params, 0).unwrap();
		assert_eq!(request.block_tag, BlockTag::Earliest);
	}

	#[test]
	fn tracer_config_is_optional() {
		assert!(tracer_config(&[], 0).is_ok());
	}

	#[test]
	fn tracer_config_accepts_flat_and_nested_shapes() {
		let flat = vec![json!({ "tracer": "callTracer", "onlyTopCall": true })];
		assert!(tracer_config(&flat, 0).is_ok());
		let nested = vec![json!({ "tracer": "callTracer", "tracerConfig": { "onlyTopCall": true } })];
		assert!(tracer_config(&nested, 0).is_ok());
	}

	#[test]
	fn tracer_config_rejects_mixed_flat_and_nested_shapes() {
		let params = vec![json!({ "tracer": "callTracer", "onlyTopCall": true, "tracerConfig": { "onlyTopCall": false } })];
		let err = tracer_config(&params, 0).unwrap_err();
		assert!(matches!(err, RelayError::InvalidParameter { index: 0, .. }));
	}

	#[test]
	fn tracer_config_rejects_the_other_tracer_s_options() {
		let params = vec![json!({ "tracer": "callTracer", "enableMemory": true })];
		let err = tracer_config(&params, 0).unwrap_err();
		assert!(matches!(err, RelayError::InvalidParameter { index: 0, .. }));
	}

	#[test]
	fn tracer_config_accepts_full_storage_for_opcode_logger() {
		let params = vec![json!({ "tracer": "opcodeLogger", "fullStorage": true })];
		assert!(tracer_config(&params, 0).is_ok());
	}

	#[test]
	fn tracer_config_rejects_unknown_tracers() {
		let params = vec![json!({ "tracer": "mysteryTracer" })];
		let err = tracer_config(&params, 0).unwrap_err();
		assert!(matches!(err, RelayError::InvalidParameter { index: 0, .. }));
	}
}
