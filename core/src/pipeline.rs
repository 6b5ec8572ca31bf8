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

//! Orchestrates one raw-transaction submission end to end (distilled
//! spec §4.6): decode, read-only gate, account lock, precheck,
//! paymaster, jumbo-tx staging, consensus submit, and the follow-up file
//! cleanup once the transaction has been indexed.

use std::sync::Arc;

use ethereum_types::H256;
use evm_relay_primitives::{ChainTransaction, RelayConfig, RelayError};

use crate::{
	collaborators::{ConsensusClient, MirrorClient, StagedFileId, SubmissionOutcome},
	lock::AccountLockService,
	paymaster::Paymaster,
	precheck,
};

/// Hedera's HFS inlining threshold for contract call-data: payloads
/// larger than this are staged as a file and referenced by id rather
/// than embedded directly in the transaction body.
const HFS_INLINE_THRESHOLD_BYTES: usize = 6 * 1024;

/// How long the cleanup task waits between receipt polls, and how many
/// times it polls before giving up and deleting the file anyway.
const RECEIPT_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(250);
const RECEIPT_POLL_MAX_ATTEMPTS: u32 = 40;

pub struct SubmissionPipeline {
	mirror: Arc<dyn MirrorClient>,
	consensus: Arc<dyn ConsensusClient>,
	locks: Arc<AccountLockService>,
	paymaster: Arc<Paymaster>,
	config: Arc<RelayConfig>,
}

impl SubmissionPipeline {
	pub fn new(
		mirror: Arc<dyn MirrorClient>,
		consensus: Arc<dyn ConsensusClient>,
		locks: Arc<AccountLockService>,
		paymaster: Arc<Paymaster>,
		config: Arc<RelayConfig>,
	) -> Self {
		SubmissionPipeline { mirror, consensus, locks, paymaster, config }
	}

	pub async fn submit(&self, raw: &[u8]) -> Result<SubmissionOutcome, RelayError> {
		let tx = ChainTransaction::decode(raw)?;

		if self.config.read_only {
			return Err(RelayError::UnsupportedOperation("Relay is in read-only mode".to_string()));
		}

		let signer = tx.recover_signer()?;
		let _lock = self.locks.acquire(signer).await;

		let account = self.mirror.get_account(signer).await?;
		let reference_gas_price = self.mirror.get_reference_gas_price().await?;
		let subsidised = tx.is_zero_fee() && self.paymaster.decide(tx.to);

		precheck::run(&tx, &account, reference_gas_price, subsidised, &self.config)?;

		let staged_file = if tx.data.len() > HFS_INLINE_THRESHOLD_BYTES && !self.config.jumbo_tx_enabled {
			log::debug!("staging {} bytes of call-data for sender {signer:#x}", tx.data.len());
			Some(self.consensus.stage_file(&tx.data).await?)
		} else {
			None
		};

		// Once staged, the submitted bytes must reference the file rather
		// than re-inline the oversized payload `tx.raw` still carries.
		let submission_bytes = match &staged_file {
			Some(_) => tx.encode_with_data(&[]),
			None => tx.raw.clone(),
		};

		let synchronous = !self.config.use_async_tx_processing;
		let outcome = self.consensus.submit(&submission_bytes, staged_file.as_ref(), synchronous).await?;
		log::debug!("submitted transaction {:#x} for sender {signer:#x}", outcome.transaction_hash);

		if subsidised {
			let cost = (tx.gas_limit as u128).saturating_mul(tx.effective_gas_price().as_u128());
			self.paymaster.debit(cost);
		}

		if let Some(file_id) = staged_file {
			let mirror = self.mirror.clone();
			let consensus = self.consensus.clone();
			let hash = outcome.transaction_hash;
			tokio::spawn(cleanup_staged_file(mirror, consensus, hash, file_id));
		}

		Ok(outcome)
	}
}

async fn cleanup_staged_file(
	mirror: Arc<dyn MirrorClient>,
	consensus: Arc<dyn ConsensusClient>,
	hash: H256,
	file_id: StagedFileId,
) {
	for _ in 0..RECEIPT_POLL_MAX_ATTEMPTS {
		match mirror.get_receipt(hash).await {
			Ok(Some(_)) => break,
			Ok(None) => tokio::time::sleep(RECEIPT_POLL_INTERVAL).await,
			Err(err) => {
				log::warn!("receipt poll failed while awaiting jumbo-tx cleanup for {hash:#x}: {err}");
				break;
			},
		}
	}
	if let Err(err) = consensus.delete_file(&file_id).await {
		log::warn!("failed to delete staged jumbo-tx file {} for {hash:#x}: {err}", file_id.0);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{FakeConsensusClient, FakeMirrorClient};
	use ethereum_types::{H160, U256};
	use evm_relay_primitives::{AccountView, PaymasterState, TxType};
	use rlp::RlpStream;
	use std::collections::HashSet;

	fn account(balance: u128) -> AccountView {
		AccountView {
			address: H160::zero(),
			nonce_latest: 0,
			nonce_pending: 0,
			balance_weibar: U256::from(balance),
			code_hash: None,
			receiver_sig_required: false,
		}
	}

	/// Builds and signs a minimal legacy transaction with a real
	/// secp256k1 key so `recover_signer` succeeds end to end.
	fn signed_legacy_tx(nonce: u64, gas_price: u64, gas_limit: u64, value: u64, data: Vec<u8>) -> Vec<u8> {
		let secret = libsecp256k1::SecretKey::parse(&[7u8; 32]).unwrap();
		let to = H160::repeat_byte(9);

		let mut unsigned = RlpStream::new();
		unsigned.begin_list(6);
		unsigned.append(&nonce);
		unsigned.append(&gas_price);
		unsigned.append(&gas_limit);
		unsigned.append(&to);
		unsigned.append(&value);
		unsigned.append(&data);
		let hash = {
			use sha3::{Digest, Keccak256};
			Keccak256::digest(unsigned.out())
		};

		let message = libsecp256k1::Message::parse_slice(&hash).unwrap();
		let (signature, recovery_id) = libsecp256k1::sign(&message, &secret);
		let sig_bytes = signature.serialize();

		let mut signed = RlpStream::new();
		signed.begin_list(9);
		signed.append(&nonce);
		signed.append(&gas_price);
		signed.append(&gas_limit);
		signed.append(&to);
		signed.append(&value);
		signed.append(&data);
		signed.append(&(27u64 + recovery_id.serialize() as u64));
		signed.append(&U256::from_big_endian(&sig_bytes[0..32]));
		signed.append(&U256::from_big_endian(&sig_bytes[32..64]));
		signed.out().to_vec()
	}

	fn pipeline(
		config: RelayConfig,
		mirror: Arc<FakeMirrorClient>,
		consensus: Arc<FakeConsensusClient>,
	) -> SubmissionPipeline {
		let paymaster = Arc::new(Paymaster::new(PaymasterState {
			enabled: false,
			whitelist: HashSet::new(),
			whitelist_wildcard: false,
			remaining_allowance_weibar: 0,
		}));
		SubmissionPipeline::new(mirror, consensus, Arc::new(AccountLockService::new()), paymaster, Arc::new(config))
	}

	#[tokio::test]
	async fn a_well_formed_transaction_reaches_the_consensus_client() {
		let raw = signed_legacy_tx(0, 1, 21_000, 0, Vec::new());
		let mirror = Arc::new(FakeMirrorClient::new(account(1_000_000_000_000), U256::from(1)));
		let consensus = Arc::new(FakeConsensusClient::default());
		let pipeline = pipeline(RelayConfig::default(), mirror, consensus.clone());

		let outcome = pipeline.submit(&raw).await.expect("submission succeeds");
		assert!(!outcome.transaction_hash.is_zero());
		assert_eq!(consensus.submitted.lock().unwrap().len(), 1);
	}

	#[tokio::test]
	async fn read_only_mode_rejects_before_touching_the_consensus_client() {
		let raw = signed_legacy_tx(0, 1, 21_000, 0, Vec::new());
		let mirror = Arc::new(FakeMirrorClient::new(account(1_000_000_000_000), U256::from(1)));
		let consensus = Arc::new(FakeConsensusClient::default());
		let mut config = RelayConfig::default();
		config.read_only = true;
		let pipeline = pipeline(config, mirror, consensus.clone());

		let err = pipeline.submit(&raw).await.unwrap_err();
		assert!(matches!(err, RelayError::UnsupportedOperation(_)));
		assert!(consensus.submitted.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn precheck_failure_never_reaches_the_consensus_client() {
		let raw = signed_legacy_tx(0, 1, 100, 0, Vec::new());
		let mirror = Arc::new(FakeMirrorClient::new(account(1_000_000_000_000), U256::from(1)));
		let consensus = Arc::new(FakeConsensusClient::default());
		let pipeline = pipeline(RelayConfig::default(), mirror, consensus.clone());

		let err = pipeline.submit(&raw).await.unwrap_err();
		assert!(matches!(err, RelayError::GasLimitTooLow { .. }));
		assert!(consensus.submitted.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn oversized_call_data_is_staged_as_a_file_before_submission() {
		let data = vec![0x11u8; HFS_INLINE_THRESHOLD_BYTES + 1];
		let gas_limit = 21_000 + (data.len() as u64) * 16;
		let raw = signed_legacy_tx(0, 1, gas_limit, 0, data);
		let mirror = Arc::new(FakeMirrorClient::new(account(1_000_000_000_000_000), U256::from(1)));
		let consensus = Arc::new(FakeConsensusClient::default());
		let pipeline = pipeline(RelayConfig::default(), mirror, consensus.clone());

		pipeline.submit(&raw).await.expect("submission succeeds");
		assert_eq!(consensus.staged_files.lock().unwrap().len(), 1);

		// The submitted bytes must reference the staged file, not re-inline
		// the oversized call-data `raw` still carries.
		let submitted = consensus.submitted.lock().unwrap();
		assert_eq!(submitted.len(), 1);
		assert_ne!(submitted[0], raw);
		let decoded = ChainTransaction::decode(&submitted[0]).expect("submitted bytes still decode");
		assert!(decoded.data.is_empty());
		let file_ids = consensus.submitted_with_file.lock().unwrap();
		assert_eq!(file_ids.len(), 1);
		assert!(file_ids[0].is_some());
	}
}
