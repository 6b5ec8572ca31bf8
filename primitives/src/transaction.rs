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

//! RLP decoding and signature recovery for the three transaction
//! envelopes distilled spec §3 enumerates: legacy, EIP-2930
//! (access-list), and EIP-1559.

use ethereum_types::{H160, H256, U256};
use rlp::{Rlp, RlpStream};
use sha3::{Digest, Keccak256};

use crate::error::RelayError;

/// secp256k1 group order. `r`/`s` must be strictly below this.
const SECP256K1_ORDER: [u8; 32] = [
	0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe, 0xba, 0xae, 0xdc,
	0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxType {
	Legacy,
	Legacy2930,
	Eip1559,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessListItem {
	pub address: H160,
	pub storage_keys: Vec<H256>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTransaction {
	pub tx_type: TxType,
	pub chain_id: Option<u64>,
	pub nonce: u64,
	pub gas_limit: u64,
	pub gas_price: Option<U256>,
	pub max_fee_per_gas: Option<U256>,
	pub max_priority_fee_per_gas: Option<U256>,
	pub to: Option<H160>,
	pub value: U256,
	pub data: Vec<u8>,
	pub access_list: Vec<AccessListItem>,
	pub v: u64,
	pub r: U256,
	pub s: U256,
	/// The exact bytes this transaction was decoded from, kept for size
	/// checks and round-trip re-encoding.
	pub raw: Vec<u8>,
}

impl ChainTransaction {
	/// Decodes a signed transaction from its RLP (optionally type-prefixed)
	/// encoding. Rejects trailing bytes with
	/// `InvalidArguments("unexpected junk after rlp payload")`
	/// (distilled §4.6 step 1).
	pub fn decode(raw: &[u8]) -> Result<Self, RelayError> {
		if raw.is_empty() {
			return Err(RelayError::InvalidArguments("empty transaction payload".to_string()));
		}

		let (tx_type, body) = match raw[0] {
			0x01 => (TxType::Legacy2930, &raw[1..]),
			0x02 => (TxType::Eip1559, &raw[1..]),
			b if b >= 0xc0 => (TxType::Legacy, raw),
			other => {
				return Err(RelayError::InvalidArguments(format!("unsupported transaction type byte {other:#x}")))
			},
		};

		let rlp = Rlp::new(body);
		if rlp.payload_info().map(|info| info.total() != body.len()).unwrap_or(true) {
			return Err(RelayError::InvalidArguments("unexpected junk after rlp payload".to_string()));
		}

		let tx = match tx_type {
			TxType::Legacy => decode_legacy(&rlp)?,
			TxType::Legacy2930 => decode_2930(&rlp)?,
			TxType::Eip1559 => decode_1559(&rlp)?,
		};

		Ok(ChainTransaction { raw: raw.to_vec(), ..tx })
	}

	/// Total on-wire size in bytes, used against
	/// `SEND_RAW_TRANSACTION_SIZE_LIMIT`.
	pub fn size(&self) -> usize {
		self.raw.len()
	}

	/// The gas price Precheck compares against the chain's reference price
	/// (distilled §4.3 step 5). EIP-1559 transactions are compared on their
	/// `max_fee_per_gas`.
	pub fn effective_gas_price(&self) -> U256 {
		match self.tx_type {
			TxType::Legacy | TxType::Legacy2930 => self.gas_price.unwrap_or_default(),
			TxType::Eip1559 => self.max_fee_per_gas.unwrap_or_default(),
		}
	}

	/// `true` when the effective gas price is exactly zero, the trigger
	/// for paymaster consultation (distilled §4.5).
	pub fn is_zero_fee(&self) -> bool {
		self.effective_gas_price().is_zero()
	}

	/// Minimum gas a transaction of this shape must carry: 21000 base,
	/// +32000 for contract creation, +4 per zero data byte, +16 per
	/// non-zero data byte (post-Istanbul schedule).
	pub fn intrinsic_gas(&self) -> u64 {
		let mut gas: u64 = 21_000;
		if self.to.is_none() {
			gas += 32_000;
		}
		for byte in &self.data {
			gas += if *byte == 0 { 4 } else { 16 };
		}
		gas += (self.access_list.len() as u64) * 2_400;
		gas += self.access_list.iter().map(|i| i.storage_keys.len() as u64).sum::<u64>() * 1_900;
		gas
	}

	/// Validates `r`/`s` are positive and below the curve order, and that
	/// the access list is only present for type-1 transactions (distilled
	/// §3 invariants, §4.3 step 10).
	pub fn validate_signature_shape(&self) -> Result<(), RelayError> {
		let order = U256::from_big_endian(&SECP256K1_ORDER);
		if self.r.is_zero() || self.s.is_zero() || self.r >= order || self.s >= order {
			return Err(RelayError::InvalidArguments("invalid transaction signature".to_string()));
		}
		if self.tx_type != TxType::Legacy2930 && !self.access_list.is_empty() {
			return Err(RelayError::InvalidArguments(
				"access list only accepted on EIP-2930 transactions".to_string(),
			));
		}
		Ok(())
	}

	/// Recovers the signer's address from the signature. Returns
	/// `InvalidArguments` if recovery fails or recovers the zero address.
	pub fn recover_signer(&self) -> Result<H160, RelayError> {
		self.validate_signature_shape()?;

		let (recovery_id, chain_id_from_v) = match self.tx_type {
			TxType::Legacy if self.v == 27 || self.v == 28 => ((self.v - 27) as u8, None),
			TxType::Legacy if self.v >= 35 => (((self.v - 35) % 2) as u8, Some((self.v - 35) / 2)),
			TxType::Legacy => return Err(RelayError::InvalidArguments("invalid legacy signature v".to_string())),
			TxType::Legacy2930 | TxType::Eip1559 if self.v == 0 || self.v == 1 => (self.v as u8, self.chain_id),
			TxType::Legacy2930 | TxType::Eip1559 => {
				return Err(RelayError::InvalidArguments("invalid typed transaction y-parity".to_string()))
			},
		};
		if let (Some(declared), Some(from_v)) = (self.chain_id, chain_id_from_v) {
			if declared != from_v {
				return Err(RelayError::InvalidArguments("chain id mismatch between v and payload".to_string()));
			}
		}

		let mut sig_bytes = [0u8; 64];
		self.r.to_big_endian(&mut sig_bytes[0..32]);
		self.s.to_big_endian(&mut sig_bytes[32..64]);

		let signature = libsecp256k1::Signature::parse_standard(&sig_bytes)
			.map_err(|_| RelayError::InvalidArguments("malformed signature".to_string()))?;
		let recovery_id = libsecp256k1::RecoveryId::parse(recovery_id)
			.map_err(|_| RelayError::InvalidArguments("malformed recovery id".to_string()))?;
		let message = libsecp256k1::Message::parse(&self.signing_hash().0);

		let public_key = libsecp256k1::recover(&message, &signature, &recovery_id)
			.map_err(|_| RelayError::InvalidArguments("signature does not recover to a public key".to_string()))?;

		let uncompressed = public_key.serialize();
		let hash = Keccak256::digest(&uncompressed[1..]);
		let address = H160::from_slice(&hash[12..]);
		if address.is_zero() {
			return Err(RelayError::InvalidArguments("signature recovers to the zero address".to_string()));
		}
		Ok(address)
	}

	/// Re-encodes this transaction with `data` substituted for its
	/// original call-data, keeping every other field — including the
	/// original `v`/`r`/`s` — unchanged. Used for jumbo-tx staging
	/// (distilled §4.6 step 5): the bytes actually submitted to consensus
	/// carry empty inline data once the real payload has been staged as a
	/// file, the same way the reference relay swaps a staged transaction's
	/// `ethereum_data` call-data for the file it was split into.
	pub fn encode_with_data(&self, data: &[u8]) -> Vec<u8> {
		let mut stream = RlpStream::new();
		match self.tx_type {
			TxType::Legacy => {
				stream.begin_list(9);
				stream.append(&self.nonce);
				stream.append(&self.gas_price.unwrap_or_default());
				stream.append(&self.gas_limit);
				append_to(&mut stream, self.to);
				stream.append(&self.value);
				stream.append(&data.to_vec());
				stream.append(&self.v);
				stream.append(&self.r);
				stream.append(&self.s);
				stream.out().to_vec()
			},
			TxType::Legacy2930 => {
				stream.begin_list(11);
				stream.append(&self.chain_id.unwrap_or_default());
				stream.append(&self.nonce);
				stream.append(&self.gas_price.unwrap_or_default());
				stream.append(&self.gas_limit);
				append_to(&mut stream, self.to);
				stream.append(&self.value);
				stream.append(&data.to_vec());
				append_access_list(&mut stream, &self.access_list);
				stream.append(&self.v);
				stream.append(&self.r);
				stream.append(&self.s);
				let mut out = vec![0x01u8];
				out.extend_from_slice(stream.out().as_ref());
				out
			},
			TxType::Eip1559 => {
				stream.begin_list(12);
				stream.append(&self.chain_id.unwrap_or_default());
				stream.append(&self.nonce);
				stream.append(&self.max_priority_fee_per_gas.unwrap_or_default());
				stream.append(&self.max_fee_per_gas.unwrap_or_default());
				stream.append(&self.gas_limit);
				append_to(&mut stream, self.to);
				stream.append(&self.value);
				stream.append(&data.to_vec());
				append_access_list(&mut stream, &self.access_list);
				stream.append(&self.v);
				stream.append(&self.r);
				stream.append(&self.s);
				let mut out = vec![0x02u8];
				out.extend_from_slice(stream.out().as_ref());
				out
			},
		}
	}

	/// The keccak256 hash of the unsigned payload this transaction's
	/// signature was produced over.
	pub fn signing_hash(&self) -> H256 {
		let mut stream = RlpStream::new();
		match self.tx_type {
			TxType::Legacy => {
				let fields = if self.chain_id.is_some() { 9 } else { 6 };
				stream.begin_list(fields);
				stream.append(&self.nonce);
				stream.append(&self.gas_price.unwrap_or_default());
				stream.append(&self.gas_limit);
				append_to(&mut stream, self.to);
				stream.append(&self.value);
				stream.append(&self.data);
				if let Some(chain_id) = self.chain_id {
					stream.append(&chain_id);
					stream.append(&0u8);
					stream.append(&0u8);
				}
				H256::from_slice(&Keccak256::digest(stream.out()))
			},
			TxType::Legacy2930 => {
				stream.begin_list(8);
				stream.append(&self.chain_id.unwrap_or_default());
				stream.append(&self.nonce);
				stream.append(&self.gas_price.unwrap_or_default());
				stream.append(&self.gas_limit);
				append_to(&mut stream, self.to);
				stream.append(&self.value);
				stream.append(&self.data);
				append_access_list(&mut stream, &self.access_list);
				let mut preimage = vec![0x01u8];
				preimage.extend_from_slice(stream.out().as_ref());
				H256::from_slice(&Keccak256::digest(&preimage))
			},
			TxType::Eip1559 => {
				stream.begin_list(9);
				stream.append(&self.chain_id.unwrap_or_default());
				stream.append(&self.nonce);
				stream.append(&self.max_priority_fee_per_gas.unwrap_or_default());
				stream.append(&self.max_fee_per_gas.unwrap_or_default());
				stream.append(&self.gas_limit);
				append_to(&mut stream, self.to);
				stream.append(&self.value);
				stream.append(&self.data);
				append_access_list(&mut stream, &self.access_list);
				let mut preimage = vec![0x02u8];
				preimage.extend_from_slice(stream.out().as_ref());
				H256::from_slice(&Keccak256::digest(&preimage))
			},
		}
	}
}

fn append_to(stream: &mut RlpStream, to: Option<H160>) {
	match to {
		Some(address) => {
			stream.append(&address);
		},
		None => {
			stream.append_empty_data();
		},
	}
}

fn append_access_list(stream: &mut RlpStream, access_list: &[AccessListItem]) {
	stream.begin_list(access_list.len());
	for item in access_list {
		stream.begin_list(2);
		stream.append(&item.address);
		stream.begin_list(item.storage_keys.len());
		for key in &item.storage_keys {
			stream.append(key);
		}
	}
}

fn decode_to(rlp: &Rlp, index: usize) -> Result<Option<H160>, RelayError> {
	let item = rlp.at(index).map_err(rlp_err)?;
	if item.is_empty() {
		Ok(None)
	} else {
		Ok(Some(item.as_val().map_err(rlp_err)?))
	}
}

fn decode_access_list(rlp: &Rlp, index: usize) -> Result<Vec<AccessListItem>, RelayError> {
	let list = rlp.at(index).map_err(rlp_err)?;
	let mut out = Vec::with_capacity(list.item_count().unwrap_or(0));
	for entry in list.iter() {
		let address: H160 = entry.at(0).map_err(rlp_err)?.as_val().map_err(rlp_err)?;
		let keys_rlp = entry.at(1).map_err(rlp_err)?;
		let mut storage_keys = Vec::with_capacity(keys_rlp.item_count().unwrap_or(0));
		for key in keys_rlp.iter() {
			storage_keys.push(key.as_val().map_err(rlp_err)?);
		}
		out.push(AccessListItem { address, storage_keys });
	}
	Ok(out)
}

fn decode_legacy(rlp: &Rlp) -> Result<ChainTransaction, RelayError> {
	if rlp.item_count().map_err(rlp_err)? != 9 {
		return Err(RelayError::InvalidArguments("legacy transaction must have 9 fields".to_string()));
	}
	let v: u64 = rlp.at(6).map_err(rlp_err)?.as_val().map_err(rlp_err)?;
	Ok(ChainTransaction {
		tx_type: TxType::Legacy,
		chain_id: None,
		nonce: rlp.at(0).map_err(rlp_err)?.as_val().map_err(rlp_err)?,
		gas_price: Some(rlp.at(1).map_err(rlp_err)?.as_val().map_err(rlp_err)?),
		gas_limit: rlp.at(2).map_err(rlp_err)?.as_val().map_err(rlp_err)?,
		max_fee_per_gas: None,
		max_priority_fee_per_gas: None,
		to: decode_to(rlp, 3)?,
		value: rlp.at(4).map_err(rlp_err)?.as_val().map_err(rlp_err)?,
		data: rlp.at(5).map_err(rlp_err)?.data().map_err(rlp_err)?.to_vec(),
		access_list: Vec::new(),
		v,
		r: rlp.at(7).map_err(rlp_err)?.as_val().map_err(rlp_err)?,
		s: rlp.at(8).map_err(rlp_err)?.as_val().map_err(rlp_err)?,
		raw: Vec::new(),
	})
}

fn decode_2930(rlp: &Rlp) -> Result<ChainTransaction, RelayError> {
	if rlp.item_count().map_err(rlp_err)? != 11 {
		return Err(RelayError::InvalidArguments("EIP-2930 transaction must have 11 fields".to_string()));
	}
	Ok(ChainTransaction {
		tx_type: TxType::Legacy2930,
		chain_id: Some(rlp.at(0).map_err(rlp_err)?.as_val().map_err(rlp_err)?),
		nonce: rlp.at(1).map_err(rlp_err)?.as_val().map_err(rlp_err)?,
		gas_price: Some(rlp.at(2).map_err(rlp_err)?.as_val().map_err(rlp_err)?),
		gas_limit: rlp.at(3).map_err(rlp_err)?.as_val().map_err(rlp_err)?,
		max_fee_per_gas: None,
		max_priority_fee_per_gas: None,
		to: decode_to(rlp, 4)?,
		value: rlp.at(5).map_err(rlp_err)?.as_val().map_err(rlp_err)?,
		data: rlp.at(6).map_err(rlp_err)?.data().map_err(rlp_err)?.to_vec(),
		access_list: decode_access_list(rlp, 7)?,
		v: rlp.at(8).map_err(rlp_err)?.as_val().map_err(rlp_err)?,
		r: rlp.at(9).map_err(rlp_err)?.as_val().map_err(rlp_err)?,
		s: rlp.at(10).map_err(rlp_err)?.as_val().map_err(rlp_err)?,
		raw: Vec::new(),
	})
}

fn decode_1559(rlp: &Rlp) -> Result<ChainTransaction, RelayError> {
	if rlp.item_count().map_err(rlp_err)? != 12 {
		return Err(RelayError::InvalidArguments("EIP-1559 transaction must have 12 fields".to_string()));
	}
	Ok(ChainTransaction {
		tx_type: TxType::Eip1559,
		chain_id: Some(rlp.at(0).map_err(rlp_err)?.as_val().map_err(rlp_err)?),
		nonce: rlp.at(1).map_err(rlp_err)?.as_val().map_err(rlp_err)?,
		max_priority_fee_per_gas: Some(rlp.at(2).map_err(rlp_err)?.as_val().map_err(rlp_err)?),
		max_fee_per_gas: Some(rlp.at(3).map_err(rlp_err)?.as_val().map_err(rlp_err)?),
		gas_price: None,
		gas_limit: rlp.at(4).map_err(rlp_err)?.as_val().map_err(rlp_err)?,
		to: decode_to(rlp, 5)?,
		value: rlp.at(6).map_err(rlp_err)?.as_val().map_err(rlp_err)?,
		data: rlp.at(7).map_err(rlp_err)?.data().map_err(rlp_err)?.to_vec(),
		access_list: decode_access_list(rlp, 8)?,
		v: rlp.at(9).map_err(rlp_err)?.as_val().map_err(rlp_err)?,
		r: rlp.at(10).map_err(rlp_err)?.as_val().map_err(rlp_err)?,
		s: rlp.at(11).map_err(rlp_err)?.as_val().map_err(rlp_err)?,
		raw: Vec::new(),
	})
}

fn rlp_err(e: rlp::DecoderError) -> RelayError {
	RelayError::InvalidArguments(format!("malformed rlp: {e}"))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn legacy_unsigned_stream(nonce: u64, gas_price: u64, gas_limit: u64, to: H160, value: u64, data: &[u8]) -> Vec<u8> {
		let mut stream = RlpStream::new();
		stream.begin_list(6);
		stream.append(&nonce);
		stream.append(&gas_price);
		stream.append(&gas_limit);
		stream.append(&to);
		stream.append(&value);
		stream.append(&data.to_vec());
		stream.out().to_vec()
	}

	#[test]
	fn decode_rejects_trailing_bytes() {
		let mut encoded = legacy_unsigned_stream(0, 1, 21_000, H160::zero(), 0, &[]);
		encoded.push(0xff);
		let err = ChainTransaction::decode(&encoded).unwrap_err();
		assert!(matches!(err, RelayError::InvalidArguments(_)));
	}

	#[test]
	fn intrinsic_gas_counts_zero_and_nonzero_bytes_separately() {
		let tx = ChainTransaction {
			tx_type: TxType::Legacy,
			chain_id: None,
			nonce: 0,
			gas_limit: 21_000,
			gas_price: Some(U256::one()),
			max_fee_per_gas: None,
			max_priority_fee_per_gas: None,
			to: Some(H160::zero()),
			value: U256::zero(),
			data: vec![0x00, 0x01, 0x00, 0xff],
			access_list: Vec::new(),
			v: 27,
			r: U256::one(),
			s: U256::one(),
			raw: Vec::new(),
		};
		// base 21000 + 2 zero bytes * 4 + 2 nonzero bytes * 16
		assert_eq!(tx.intrinsic_gas(), 21_000 + 2 * 4 + 2 * 16);
	}

	#[test]
	fn contract_creation_adds_32000_gas() {
		let mut tx = ChainTransaction {
			tx_type: TxType::Legacy,
			chain_id: None,
			nonce: 0,
			gas_limit: 21_000,
			gas_price: Some(U256::one()),
			max_fee_per_gas: None,
			max_priority_fee_per_gas: None,
			to: Some(H160::zero()),
			value: U256::zero(),
			data: Vec::new(),
			access_list: Vec::new(),
			v: 27,
			r: U256::one(),
			s: U256::one(),
			raw: Vec::new(),
		};
		let with_to = tx.intrinsic_gas();
		tx.to = None;
		assert_eq!(tx.intrinsic_gas(), with_to + 32_000);
	}

	#[test]
	fn encode_with_data_replaces_call_data_and_keeps_the_signature() {
		let tx = ChainTransaction {
			tx_type: TxType::Legacy,
			chain_id: None,
			nonce: 3,
			gas_limit: 50_000,
			gas_price: Some(U256::from(7)),
			max_fee_per_gas: None,
			max_priority_fee_per_gas: None,
			to: Some(H160::repeat_byte(9)),
			value: U256::from(42),
			data: vec![0xaa; 9000],
			access_list: Vec::new(),
			v: 27,
			r: U256::one(),
			s: U256::one(),
			raw: Vec::new(),
		};
		let restaged = tx.encode_with_data(&[]);
		assert_ne!(restaged, tx.raw);
		let decoded = ChainTransaction::decode(&restaged).expect("re-encoded bytes still decode");
		assert!(decoded.data.is_empty());
		assert_eq!(decoded.nonce, tx.nonce);
		assert_eq!(decoded.v, tx.v);
		assert_eq!(decoded.r, tx.r);
		assert_eq!(decoded.s, tx.s);
	}

	#[test]
	fn access_list_rejected_on_non_2930_type() {
		let tx = ChainTransaction {
			tx_type: TxType::Eip1559,
			chain_id: Some(295),
			nonce: 0,
			gas_limit: 21_000,
			gas_price: None,
			max_fee_per_gas: Some(U256::from(10)),
			max_priority_fee_per_gas: Some(U256::from(1)),
			to: Some(H160::zero()),
			value: U256::zero(),
			data: Vec::new(),
			access_list: vec![AccessListItem { address: H160::zero(), storage_keys: Vec::new() }],
			v: 0,
			r: U256::one(),
			s: U256::one(),
			raw: Vec::new(),
		};
		assert!(tx.validate_signature_shape().is_err());
	}
}
