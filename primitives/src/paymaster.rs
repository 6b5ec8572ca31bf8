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

//! The paymaster's mutable decision state (distilled spec §3). Mutated
//! only by the paymaster component in `evm-relay-core`; read by the
//! submission pipeline.

use std::collections::HashSet;

use ethereum_types::H160;

#[derive(Debug, Clone)]
pub struct PaymasterState {
	pub enabled: bool,
	/// Empty set with `wildcard = true` behaves as "match nothing unless
	/// wildcard"; a populated set is consulted alongside the wildcard bit.
	pub whitelist: HashSet<H160>,
	pub whitelist_wildcard: bool,
	pub remaining_allowance_weibar: u128,
}

impl PaymasterState {
	pub fn allows(&self, to: Option<H160>) -> bool {
		if !self.enabled || self.remaining_allowance_weibar == 0 {
			return false;
		}
		if self.whitelist_wildcard {
			return true;
		}
		match to {
			Some(address) => self.whitelist.contains(&address),
			None => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn disabled_paymaster_never_subsidises() {
		let state = PaymasterState {
			enabled: false,
			whitelist: HashSet::new(),
			whitelist_wildcard: true,
			remaining_allowance_weibar: 1_000,
		};
		assert!(!state.allows(Some(H160::repeat_byte(1))));
	}

	#[test]
	fn exhausted_allowance_never_subsidises_even_when_whitelisted() {
		let mut whitelist = HashSet::new();
		whitelist.insert(H160::repeat_byte(1));
		let state =
			PaymasterState { enabled: true, whitelist, whitelist_wildcard: false, remaining_allowance_weibar: 0 };
		assert!(!state.allows(Some(H160::repeat_byte(1))));
	}

	#[test]
	fn wildcard_whitelist_allows_any_destination() {
		let state = PaymasterState {
			enabled: true,
			whitelist: HashSet::new(),
			whitelist_wildcard: true,
			remaining_allowance_weibar: 1,
		};
		assert!(state.allows(Some(H160::repeat_byte(9))));
	}
}
