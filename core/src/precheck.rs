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

//! Pure synchronous validation of a decoded transaction against the
//! signer's account view and the chain's current parameters
//! (distilled spec §4.3). No I/O: callers read the account view and the
//! gas price reference ahead of time.

use ethereum_types::U256;
use evm_relay_primitives::{AccountView, ChainTransaction, RelayConfig, RelayError};

/// The ten checks run in the exact order distilled §4.3 enumerates them;
/// the first violated check short-circuits the rest. Signature recovery
/// (step 1's "recovers to a non-zero address" half) has already happened
/// upstream — the caller could not have fetched `account` without first
/// recovering the signer's address — so this only re-checks the chain id
/// half of step 1.
pub fn run(
	tx: &ChainTransaction,
	account: &AccountView,
	reference_gas_price: U256,
	paymaster_subsidises: bool,
	config: &RelayConfig,
) -> Result<(), RelayError> {
	if let Some(chain_id) = tx.chain_id {
		if chain_id != config.chain_id {
			return Err(RelayError::UnsupportedChainId { got: chain_id, want: config.chain_id });
		}
	}

	let size = tx.size();
	if size > config.send_raw_transaction_size_limit {
		return Err(RelayError::TransactionSizeLimitExceeded { size, limit: config.send_raw_transaction_size_limit });
	}

	if tx.data.len() > config.call_data_size_limit {
		return Err(RelayError::CallDataSizeLimitExceeded {
			size: tx.data.len(),
			limit: config.call_data_size_limit,
		});
	}

	if tx.to.is_none() && tx.data.len() > config.contract_code_size_limit {
		return Err(RelayError::ContractCodeSizeLimitExceeded {
			size: tx.data.len(),
			limit: config.contract_code_size_limit,
		});
	}

	if !paymaster_subsidises && tx.effective_gas_price() < reference_gas_price {
		return Err(RelayError::GasPriceTooLow {
			got: tx.effective_gas_price().as_u128(),
			reference: reference_gas_price.as_u128(),
		});
	}

	let intrinsic = tx.intrinsic_gas();
	if tx.gas_limit < intrinsic {
		return Err(RelayError::GasLimitTooLow { got: tx.gas_limit, floor: intrinsic });
	}
	if tx.gas_limit > config.max_transaction_fee_threshold {
		return Err(RelayError::GasLimitTooHigh { got: tx.gas_limit, ceiling: config.max_transaction_fee_threshold });
	}

	let required = tx.value.saturating_add(U256::from(tx.gas_limit).saturating_mul(tx.effective_gas_price()));
	if account.balance_weibar < required {
		return Err(RelayError::InsufficientAccountBalance);
	}

	let expected_nonce = account.expected_nonce(config.enable_tx_pool, config.use_async_tx_processing);
	if tx.nonce < expected_nonce {
		return Err(RelayError::NonceTooLow { got: tx.nonce, current: expected_nonce });
	}
	if tx.nonce > expected_nonce && !config.enable_nonce_ordering {
		return Err(RelayError::NonceTooHigh { got: tx.nonce, current: expected_nonce });
	}

	if tx.data.is_empty() && !tx.value.is_zero() && account.receiver_sig_required {
		return Err(RelayError::ReceiverSignatureEnabled);
	}

	tx.validate_signature_shape()?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use ethereum_types::H160;

	fn account(balance: u128, nonce_latest: u64, nonce_pending: u64) -> AccountView {
		AccountView {
			address: H160::zero(),
			nonce_latest,
			nonce_pending,
			balance_weibar: U256::from(balance),
			code_hash: None,
			receiver_sig_required: false,
		}
	}

	fn tx(gas_limit: u64, gas_price: u64, value: u64, nonce: u64) -> ChainTransaction {
		use evm_relay_primitives::TxType;
		ChainTransaction {
			tx_type: TxType::Legacy,
			chain_id: None,
			nonce,
			gas_limit,
			gas_price: Some(U256::from(gas_price)),
			max_fee_per_gas: None,
			max_priority_fee_per_gas: None,
			to: Some(H160::repeat_byte(7)),
			value: U256::from(value),
			data: Vec::new(),
			access_list: Vec::new(),
			v: 27,
			r: U256::one(),
			s: U256::one(),
			raw: vec![0xc0],
		}
	}

	#[test]
	fn gas_limit_below_intrinsic_is_rejected() {
		let config = RelayConfig::default();
		let account = account(1_000_000_000, 0, 0);
		let mut transaction = tx(100, 1, 0, 0);
		transaction.r = U256::from(12345);
		transaction.s = U256::from(12345);
		let err = run(&transaction, &account, U256::from(1), false, &config).unwrap_err();
		assert!(matches!(err, RelayError::GasLimitTooLow { got: 100, floor: 21_000 }));
	}

	#[test]
	fn call_data_over_limit_is_rejected_before_gas_checks() {
		let mut config = RelayConfig::default();
		config.call_data_size_limit = 1_024;
		let account = account(1_000_000_000, 0, 0);
		let mut transaction = tx(21_000, 1, 0, 0);
		transaction.data = vec![0u8; 2_048];
		transaction.r = U256::from(12345);
		transaction.s = U256::from(12345);
		let err = run(&transaction, &account, U256::from(1), false, &config).unwrap_err();
		assert!(matches!(
			err,
			RelayError::CallDataSizeLimitExceeded { size: 2_048, limit: 1_024 }
		));
	}

	#[test]
	fn paymaster_subsidy_waives_the_gas_price_floor() {
		let config = RelayConfig::default();
		let account = account(1_000_000_000, 0, 0);
		let mut transaction = tx(21_000, 0, 0, 0);
		transaction.r = U256::from(12345);
		transaction.s = U256::from(12345);
		assert!(run(&transaction, &account, U256::from(1), true, &config).is_ok());
	}

	#[test]
	fn nonce_too_low_is_reported_against_the_latest_nonce_when_pool_disabled() {
		let config = RelayConfig::default();
		let account = account(1_000_000_000, 5, 5);
		let mut transaction = tx(21_000, 1, 0, 3);
		transaction.r = U256::from(12345);
		transaction.s = U256::from(12345);
		let err = run(&transaction, &account, U256::from(1), false, &config).unwrap_err();
		assert!(matches!(err, RelayError::NonceTooLow { got: 3, current: 5 }));
	}

	#[test]
	fn insufficient_balance_rejects_before_nonce_check() {
		let config = RelayConfig::default();
		let account = account(100, 0, 0);
		let mut transaction = tx(21_000, 1, 1_000, 0);
		transaction.r = U256::from(12345);
		transaction.s = U256::from(12345);
		let err = run(&transaction, &account, U256::from(1), false, &config).unwrap_err();
		assert!(matches!(err, RelayError::InsufficientAccountBalance));
	}
}
