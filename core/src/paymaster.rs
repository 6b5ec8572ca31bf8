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

//! Owns the mutable [`PaymasterState`] singleton and decides whether a
//! zero-fee transaction is subsidised (distilled spec §4.5). The running
//! allowance is the one piece of process-wide mutable state this
//! component is responsible for; everything else about the decision is
//! pure.

use std::sync::Mutex;

use ethereum_types::H160;
use evm_relay_primitives::PaymasterState;

pub struct Paymaster {
	state: Mutex<PaymasterState>,
}

impl Paymaster {
	pub fn new(state: PaymasterState) -> Self {
		Paymaster { state: Mutex::new(state) }
	}

	/// Consulted only when the transaction's effective gas price is zero
	/// (distilled §4.5). Does not itself deduct from the allowance — the
	/// allowance is debited by the submission pipeline once consensus has
	/// actually accepted the subsidised transaction, since a precheck-time
	/// decision may still be outpaced by a concurrent submission exhausting
	/// the same allowance before consensus executes either one.
	pub fn decide(&self, to: Option<H160>) -> bool {
		let state = self.state.lock().expect("paymaster state mutex poisoned");
		state.allows(to)
	}

	/// Debits the allowance after a subsidised submission is accepted.
	/// Saturates at zero rather than underflowing when a race has already
	/// exhausted it — the resulting `INSUFFICIENT_TX_FEE` surfaces through
	/// the receipt, not here.
	pub fn debit(&self, amount_weibar: u128) {
		let mut state = self.state.lock().expect("paymaster state mutex poisoned");
		state.remaining_allowance_weibar = state.remaining_allowance_weibar.saturating_sub(amount_weibar);
	}

	pub fn snapshot(&self) -> PaymasterState {
		self.state.lock().expect("paymaster state mutex poisoned").clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashSet;

	fn state(remaining: u128) -> PaymasterState {
		PaymasterState { enabled: true, whitelist: HashSet::new(), whitelist_wildcard: true, remaining_allowance_weibar: remaining }
	}

	#[test]
	fn decide_consults_the_current_snapshot() {
		let paymaster = Paymaster::new(state(1_000));
		assert!(paymaster.decide(Some(H160::repeat_byte(1))));
	}

	#[test]
	fn debit_reduces_the_remaining_allowance_and_saturates_at_zero() {
		let paymaster = Paymaster::new(state(100));
		paymaster.debit(150);
		assert_eq!(paymaster.snapshot().remaining_allowance_weibar, 0);
		assert!(!paymaster.decide(Some(H160::repeat_byte(1))));
	}
}
