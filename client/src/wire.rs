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

//! Hex-quantity decoding shared by the upstream HTTP clients.

use ethereum_types::{H256, U256};
use evm_relay_primitives::RelayError;
use serde_json::Value;

pub fn hex_u64(value: &Value) -> Result<u64, RelayError> {
	let raw = value.as_str().ok_or_else(|| RelayError::internal("expected a hex quantity string"))?;
	let stripped = raw.strip_prefix("0x").unwrap_or(raw);
	u64::from_str_radix(stripped, 16).map_err(|e| RelayError::internal(format!("invalid hex quantity `{raw}`: {e}")))
}

pub fn hex_u256(value: &Value) -> Result<U256, RelayError> {
	let raw = value.as_str().ok_or_else(|| RelayError::internal("expected a hex quantity string"))?;
	U256::from_str_radix(raw.trim_start_matches("0x"), 16).map_err(|e| RelayError::internal(format!("invalid hex quantity `{raw}`: {e}")))
}

pub fn hex_h256(value: &Value) -> Result<H256, RelayError> {
	let raw = value.as_str().ok_or_else(|| RelayError::internal("expected a hex hash string"))?;
	let stripped = raw.strip_prefix("0x").unwrap_or(raw);
	let mut bytes = [0u8; 32];
	hex::decode_to_slice(stripped, &mut bytes).map_err(|e| RelayError::internal(format!("invalid hex hash `{raw}`: {e}")))?;
	Ok(H256::from(bytes))
}

pub fn hex_bytes(value: &Value) -> Result<Vec<u8>, RelayError> {
	let raw = value.as_str().ok_or_else(|| RelayError::internal("expected a hex byte string"))?;
	let stripped = raw.strip_prefix("0x").unwrap_or(raw);
	hex::decode(stripped).map_err(|e| RelayError::internal(format!("invalid hex bytes `{raw}`: {e}")))
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn decodes_quantities_and_hashes() {
		assert_eq!(hex_u64(&json!("0x10")).unwrap(), 16);
		assert_eq!(hex_u256(&json!("0x1")).unwrap(), U256::one());
		assert_eq!(hex_bytes(&json!("0x0102")).unwrap(), vec![1, 2]);
	}
}
