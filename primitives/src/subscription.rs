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

//! The subscription and log-filter model distilled spec §3/§4.9 define.
//! Matching logic lives here so both the subscription engine and its tests
//! share one implementation.

use std::collections::HashSet;

use ethereum_types::H160;

use crate::{block::Log, context::ConnectionId};

/// One positional topic slot: either a wildcard (matches anything) or a
/// set of 32-byte topics any of which match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicSlot {
	Wildcard,
	AnyOf(HashSet<ethereum_types::H256>),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogFilter {
	/// Empty means "any address".
	pub addresses: HashSet<H160>,
	/// Up to 4 positional slots.
	pub topics: Vec<TopicSlot>,
}

impl LogFilter {
	/// Address and positional topic matching per distilled §4.9: address
	/// matches iff the filter's address set is empty or contains the log's
	/// address (case-insensitively — `H160` equality already ignores case
	/// since both sides are parsed into the same 20-byte representation);
	/// each topic position is wildcard or a set; an event with fewer
	/// topics than the filter length never matches at a non-wildcard
	/// position beyond its own length.
	pub fn matches(&self, log: &Log) -> bool {
		if !self.addresses.is_empty() && !self.addresses.contains(&log.address) {
			return false;
		}
		for (index, slot) in self.topics.iter().enumerate() {
			match slot {
				TopicSlot::Wildcard => continue,
				TopicSlot::AnyOf(set) => match log.topics.get(index) {
					Some(topic) if set.contains(topic) => continue,
					_ => return false,
				},
			}
		}
		true
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionKind {
	NewHeads,
	Logs,
}

#[derive(Debug, Clone)]
pub struct SubscriptionRecord {
	/// 0x-prefixed, 32 hex char (128-bit) subscription id.
	pub id: String,
	pub connection_id: ConnectionId,
	pub kind: SubscriptionKind,
	pub filter: Option<LogFilter>,
	pub created_at: std::time::Instant,
}

#[cfg(test)]
mod tests {
	use super::*;
	use ethereum_types::H256;

	fn log_with(address: H160, topics: Vec<H256>) -> Log {
		Log {
			address,
			topics,
			data: Vec::new(),
			block_hash: None,
			block_number: None,
			transaction_hash: None,
			transaction_index: None,
			log_index: None,
			removed: false,
		}
	}

	#[test]
	fn empty_address_set_matches_everything() {
		let filter = LogFilter::default();
		assert!(filter.matches(&log_with(H160::repeat_byte(9), vec![])));
	}

	#[test]
	fn zero_address_filter_registers_but_matches_nothing_else() {
		let mut addresses = HashSet::new();
		addresses.insert(H160::zero());
		let filter = LogFilter { addresses, topics: vec![] };
		assert!(!filter.matches(&log_with(H160::repeat_byte(1), vec![])));
		assert!(filter.matches(&log_with(H160::zero(), vec![])));
	}

	#[test]
	fn topics_match_positionally_and_short_events_fail_non_wildcard_slots() {
		let topic0 = H256::repeat_byte(0xaa);
		let mut set = HashSet::new();
		set.insert(topic0);
		let filter = LogFilter { addresses: HashSet::new(), topics: vec![TopicSlot::Wildcard, TopicSlot::AnyOf(set)] };

		// Only one topic present; slot 1 is non-wildcard so this must not match.
		assert!(!filter.matches(&log_with(H160::zero(), vec![H256::repeat_byte(1)])));
		assert!(filter.matches(&log_with(H160::zero(), vec![H256::repeat_byte(1), topic0])));
	}
}
