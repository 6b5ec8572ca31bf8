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

//! Decodes the optional filter object `eth_subscribe("logs", filter)`
//! takes as its second parameter. A reduced form of `eth_getLogs`'
//! filter object (distilled spec §4.9): only `address`/`topics`, since a
//! live subscription has no block range to validate.

use std::collections::HashSet;

use ethereum_types::{H160, H256};
use evm_relay_primitives::{LogFilter, RelayError, SubscriptionKind, TopicSlot};
use serde_json::Value;

pub fn parse_subscription_kind(raw: &str) -> Result<SubscriptionKind, RelayError> {
	match raw {
		"newHeads" => Ok(SubscriptionKind::NewHeads),
		"logs" => Ok(SubscriptionKind::Logs),
		other => Err(RelayError::InvalidParameter { index: 0, reason: format!("unsupported subscription kind `{other}`") }),
	}
}

fn parse_address(raw: &str) -> Result<H160, RelayError> {
	let stripped = raw.strip_prefix("0x").unwrap_or(raw);
	if stripped.len() != 40 {
		return Err(RelayError::InvalidParameter { index: 1, reason: "expected a 20-byte address".to_string() });
	}
	let mut bytes = [0u8; 20];
	hex::decode_to_slice(stripped, &mut bytes).map_err(|_| RelayError::InvalidParameter { index: 1, reason: "invalid hex address".to_string() })?;
	Ok(H160::from(bytes))
}

fn parse_hash(raw: &str) -> Result<H256, RelayError> {
	let stripped = raw.strip_prefix("0x").unwrap_or(raw);
	if stripped.len() != 64 {
		return Err(RelayError::InvalidParameter { index: 1, reason: "expected a 32-byte hash".to_string() });
	}
	let mut bytes = [0u8; 32];
	hex::decode_to_slice(stripped, &mut bytes).map_err(|_| RelayError::InvalidParameter { index: 1, reason: "invalid hex hash".to_string() })?;
	Ok(H256::from(bytes))
}

pub fn parse_filter_object(value: &Value) -> Result<LogFilter, RelayError> {
	let object = value.as_object().ok_or_else(|| RelayError::InvalidParameter { index: 1, reason: "expected a filter object".to_string() })?;

	let mut addresses = HashSet::new();
	match object.get("address") {
		Some(Value::String(raw)) => {
			addresses.insert(parse_address(raw)?);
		},
		Some(Value::Array(items)) => {
			for item in items {
				let raw = item.as_str().ok_or_else(|| RelayError::InvalidParameter { index: 1, reason: "address entries must be strings".to_string() })?;
				addresses.insert(parse_address(raw)?);
			}
		},
		None | Some(Value::Null) => {},
		Some(_) => return Err(RelayError::InvalidParameter { index: 1, reason: "invalid address filter".to_string() }),
	}

	let mut topics = Vec::new();
	if let Some(Value::Array(slots)) = object.get("topics") {
		for slot in slots {
			match slot {
				Value::Null => topics.push(TopicSlot::Wildcard),
				Value::String(raw) => {
					let mut set = HashSet::new();
					set.insert(parse_hash(raw)?);
					topics.push(TopicSlot::AnyOf(set));
				},
				Value::Array(options) => {
					let mut set = HashSet::new();
					for option in options {
						let raw =
							option.as_str().ok_or_else(|| RelayError::InvalidParameter { index: 1, reason: "topic entries must be strings".to_string() })?;
						set.insert(parse_hash(raw)?);
					}
					topics.push(TopicSlot::AnyOf(set));
				},
				_ => return Err(RelayError::InvalidParameter { index: 1, reason: "invalid topics filter".to_string() }),
			}
		}
	}

	Ok(LogFilter { addresses, topics })
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn unsupported_kind_is_rejected() {
		let err = parse_subscription_kind("pendingTransactions").unwrap_err();
		assert!(matches!(err, RelayError::InvalidParameter { .. }));
	}

	#[test]
	fn filter_object_parses_address_and_positional_topics() {
		let value = json!({
			"address": "0x0000000000000000000000000000000000000001",
			"topics": [null, "0x0000000000000000000000000000000000000000000000000000000000000002"],
		});
		let filter = parse_filter_object(&value).unwrap();
		assert_eq!(filter.addresses.len(), 1);
		assert_eq!(filter.topics.len(), 2);
	}
}
