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

//! Per-connection subscription bookkeeping (distilled spec §4.9). A
//! connection registers zero or more subscriptions, each either a
//! `newHeads` or a `logs` subscription with an optional filter; the
//! shared poller consults this table on every tick to decide who to
//! notify. Matching itself is `LogFilter::matches`, shared with the rest
//! of the gateway.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use evm_relay_primitives::{context::ConnectionId, LogFilter, RelayError, SubscriptionKind, SubscriptionRecord};
use rand::RngCore;

fn random_subscription_id() -> String {
	let mut bytes = [0u8; 16];
	rand::thread_rng().fill_bytes(&mut bytes);
	format!("0x{}", hex::encode(bytes))
}

pub struct SubscriptionEngine {
	by_connection: DashMap<ConnectionId, Vec<String>>,
	by_id: DashMap<String, SubscriptionRecord>,
	max_per_connection: usize,
	max_filter_addresses: Option<usize>,
	total: AtomicU64,
}

impl SubscriptionEngine {
	pub fn new(max_per_connection: usize) -> Self {
		Self::with_filter_limit(max_per_connection, None)
	}

	/// `max_filter_addresses` of `None` lifts the bound entirely (distilled
	/// §4.9 doesn't name one; `ws_multi_address_filters_enabled` maps to
	/// `None` here so deployments can opt into unbounded multi-address
	/// filters).
	pub fn with_filter_limit(max_per_connection: usize, max_filter_addresses: Option<usize>) -> Self {
		SubscriptionEngine { by_connection: DashMap::new(), by_id: DashMap::new(), max_per_connection, max_filter_addresses, total: AtomicU64::new(0) }
	}

	pub fn subscribe(&self, connection_id: ConnectionId, kind: SubscriptionKind, filter: Option<LogFilter>) -> Result<String, RelayError> {
		let current = self.by_connection.get(&connection_id).map(|ids| ids.len()).unwrap_or(0);
		if current >= self.max_per_connection {
			return Err(RelayError::MaxSubscriptions);
		}
		if let (Some(max), Some(filter)) = (self.max_filter_addresses, &filter) {
			if filter.addresses.len() > max {
				return Err(RelayError::TooManyFilterAddresses { got: filter.addresses.len(), max });
			}
		}

		let id = random_subscription_id();
		let record = SubscriptionRecord { id: id.clone(), connection_id, kind, filter, created_at: std::time::Instant::now() };
		self.by_id.insert(id.clone(), record);
		self.by_connection.entry(connection_id).or_default().push(id.clone());
		self.total.fetch_add(1, Ordering::Relaxed);
		Ok(id)
	}

	/// `false` both when the id is unknown and when it belongs to a
	/// different connection — a caller must not be able to cancel another
	/// connection's subscription by guessing its id.
	pub fn unsubscribe(&self, connection_id: ConnectionId, id: &str) -> bool {
		let owned_by_caller = matches!(self.by_id.get(id), Some(record) if record.connection_id == connection_id);
		if !owned_by_caller {
			return false;
		}
		self.by_id.remove(id);
		if let Some(mut ids) = self.by_connection.get_mut(&connection_id) {
			ids.retain(|existing| existing != id);
		}
		true
	}

	pub fn drop_connection(&self, connection_id: ConnectionId) {
		if let Some((_, ids)) = self.by_connection.remove(&connection_id) {
			for id in ids {
				self.by_id.remove(&id);
			}
		}
	}

	pub fn new_heads_subscriptions(&self) -> Vec<SubscriptionRecord> {
		self.by_id.iter().filter(|entry| entry.kind == SubscriptionKind::NewHeads).map(|entry| entry.clone()).collect()
	}

	pub fn log_subscriptions(&self) -> Vec<SubscriptionRecord> {
		self.by_id.iter().filter(|entry| entry.kind == SubscriptionKind::Logs).map(|entry| entry.clone()).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use ethereum_types::H160;

	#[test]
	fn subscribing_past_the_connection_ceiling_is_rejected() {
		let engine = SubscriptionEngine::new(1);
		engine.subscribe(1, SubscriptionKind::NewHeads, None).unwrap();
		let err = engine.subscribe(1, SubscriptionKind::NewHeads, None).unwrap_err();
		assert!(matches!(err, RelayError::MaxSubscriptions));
	}

	#[test]
	fn a_logs_filter_over_the_configured_address_limit_is_rejected() {
		let engine = SubscriptionEngine::with_filter_limit(10, Some(1));
		let filter = LogFilter { addresses: [H160::from_low_u64_be(1), H160::from_low_u64_be(2)].into_iter().collect(), topics: Vec::new() };
		let err = engine.subscribe(1, SubscriptionKind::Logs, Some(filter)).unwrap_err();
		assert!(matches!(err, RelayError::TooManyFilterAddresses { got: 2, max: 1 }));
	}

	#[test]
	fn no_filter_limit_allows_any_address_count() {
		let engine = SubscriptionEngine::with_filter_limit(10, None);
		let filter = LogFilter { addresses: [H160::from_low_u64_be(1), H160::from_low_u64_be(2)].into_iter().collect(), topics: Vec::new() };
		assert!(engine.subscribe(1, SubscriptionKind::Logs, Some(filter)).is_ok());
	}

	#[test]
	fn unsubscribe_rejects_a_foreign_connection() {
		let engine = SubscriptionEngine::new(10);
		let id = engine.subscribe(1, SubscriptionKind::NewHeads, None).unwrap();
		assert!(!engine.unsubscribe(2, &id));
		assert!(engine.unsubscribe(1, &id));
	}

	#[test]
	fn dropping_a_connection_removes_all_of_its_subscriptions() {
		let engine = SubscriptionEngine::new(10);
		let first = engine.subscribe(1, SubscriptionKind::NewHeads, None).unwrap();
		let second = engine.subscribe(1, SubscriptionKind::Logs, None).unwrap();
		engine.drop_connection(1);
		assert!(!engine.unsubscribe(1, &first));
		assert!(!engine.unsubscribe(1, &second));
	}

	#[test]
	fn kind_specific_lookups_only_return_their_own_kind() {
		let engine = SubscriptionEngine::new(10);
		engine.subscribe(1, SubscriptionKind::NewHeads, None).unwrap();
		engine.subscribe(1, SubscriptionKind::Logs, None).unwrap();
		assert_eq!(engine.new_heads_subscriptions().len(), 1);
		assert_eq!(engine.log_subscriptions().len(), 1);
	}
}
