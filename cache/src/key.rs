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

//! Cache key namespacing: method name + salted parameter hash (distilled
//! spec §4.2).

use sha3::{Digest, Keccak256};

/// Random per-process salt, mixed into every key so that two gateway
/// instances sharing the same Redis never read each other's keys with a
/// differently-versioned parameter encoding by accident.
pub fn build_key(salt: &str, method: &str, params: &serde_json::Value) -> String {
	let mut hasher = Keccak256::new();
	hasher.update(salt.as_bytes());
	hasher.update(method.as_bytes());
	hasher.update(params.to_string().as_bytes());
	let digest = hasher.finalize();
	format!("relay:{method}:{}", hex::encode(digest))
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn same_method_and_params_produce_same_key() {
		let a = build_key("salt", "eth_getBalance", &json!(["0xabc", "latest"]));
		let b = build_key("salt", "eth_getBalance", &json!(["0xabc", "latest"]));
		assert_eq!(a, b);
	}

	#[test]
	fn different_params_produce_different_keys() {
		let a = build_key("salt", "eth_getBalance", &json!(["0xabc", "latest"]));
		let b = build_key("salt", "eth_getBalance", &json!(["0xdef", "latest"]));
		assert_ne!(a, b);
	}

	#[test]
	fn different_salts_produce_different_keys_for_the_same_input() {
		let a = build_key("salt-one", "eth_chainId", &json!([]));
		let b = build_key("salt-two", "eth_chainId", &json!([]));
		assert_ne!(a, b);
	}
}
