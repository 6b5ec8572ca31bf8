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

//! The Mirror API's projection of one account, as consumed by Precheck.
//! Never authoritative — distilled spec §3 allows it to lag consensus by up
//! to one round.

use ethereum_types::{H160, U256};

/// Reserved-address boundary below which a value transfer to the account
/// is rejected with `INVALID_CONTRACT_ID` at consensus (distilled §4.6).
pub const RESERVED_ACCOUNT_ID_CEILING: u64 = 750;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountView {
	pub address: H160,
	pub nonce_latest: u64,
	pub nonce_pending: u64,
	pub balance_weibar: U256,
	pub code_hash: Option<ethereum_types::H256>,
	pub receiver_sig_required: bool,
}

impl AccountView {
	/// The nonce Precheck compares a submission against: `nonce_pending`
	/// when a pool is enabled and async processing is on, else
	/// `nonce_latest` (distilled §4.3 step 8).
	pub fn expected_nonce(&self, pool_enabled: bool, async_processing: bool) -> u64 {
		if pool_enabled && async_processing {
			self.nonce_pending
		} else {
			self.nonce_latest
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn view(nonce_latest: u64, nonce_pending: u64) -> AccountView {
		AccountView {
			address: H160::zero(),
			nonce_latest,
			nonce_pending,
			balance_weibar: U256::zero(),
			code_hash: None,
			receiver_sig_required: false,
		}
	}

	#[test]
	fn expected_nonce_prefers_pending_only_when_pool_and_async_both_enabled() {
		let account = view(5, 8);
		assert_eq!(account.expected_nonce(true, true), 8);
		assert_eq!(account.expected_nonce(true, false), 5);
		assert_eq!(account.expected_nonce(false, true), 5);
		assert_eq!(account.expected_nonce(false, false), 5);
	}
}
