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

//! One poller, shared by every connection (distilled spec §4.9): the
//! Mirror API has no push mechanism of its own, so the gateway polls for
//! the latest block on a fixed interval and fans new heads and logs out
//! to whichever subscriptions match. `LogFilter::matches` — the same
//! code the read-path cache-key logic never touches — decides who gets
//! each log.

use std::{sync::Arc, time::Duration};

use evm_relay_core::MirrorClient;
use evm_relay_primitives::{BlockTag, LogFilter};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::hub::ConnectionHub;

pub struct SharedPoller {
	mirror: Arc<dyn MirrorClient>,
	hub: Arc<ConnectionHub>,
	interval: Duration,
}

impl SharedPoller {
	pub fn new(mirror: Arc<dyn MirrorClient>, hub: Arc<ConnectionHub>, interval: Duration) -> Self {
		SharedPoller { mirror, hub, interval }
	}

	/// Spawns the poll loop, exiting once `shutdown` is cancelled. Only the
	/// sleep between ticks is cancellable; a fetch-and-fan-out already in
	/// flight always runs to completion, so a subscriber never misses the
	/// last block the gateway saw before shutting down.
	pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
		tokio::spawn(async move {
			let mut last_seen: Option<u64> = None;
			loop {
				tokio::select! {
					_ = shutdown.cancelled() => {
						log::debug!("shared poller received shutdown signal, draining last tick");
						break;
					},
					_ = tokio::time::sleep(self.interval) => {},
				}
				match self.mirror.latest_block_number().await {
					Ok(latest) => {
						if last_seen != Some(latest) {
							let from = last_seen.map(|n| n + 1).unwrap_or(latest);
							self.fan_out(from, latest).await;
							last_seen = Some(latest);
						}
					},
					Err(err) => log::warn!("shared poller failed to read the latest block: {err}"),
				}
				if shutdown.is_cancelled() {
					break;
				}
			}
			log::debug!("shared poller stopped");
		})
	}

	async fn fan_out(&self, from: u64, latest: u64) {
		self.fan_out_new_heads(latest).await;
		self.fan_out_logs(from, latest).await;
	}

	async fn fan_out_new_heads(&self, latest: u64) {
		let subscriptions = self.hub.engine.new_heads_subscriptions();
		if subscriptions.is_empty() {
			return;
		}
		match self.mirror.get_block_by_number(BlockTag::Number(latest), false).await {
			Ok(Some(block)) => {
				for subscription in subscriptions {
					let payload = json!({
						"jsonrpc": "2.0",
						"method": "eth_subscription",
						"params": { "subscription": subscription.id, "result": block },
					});
					self.hub.notify(subscription.connection_id, payload);
				}
			},
			Ok(None) => log::debug!("shared poller: mirror has no block at height {latest} yet"),
			Err(err) => log::warn!("shared poller failed to fetch the new head: {err}"),
		}
	}

	async fn fan_out_logs(&self, from: u64, latest: u64) {
		let subscriptions = self.hub.engine.log_subscriptions();
		if subscriptions.is_empty() {
			return;
		}
		match self.mirror.get_logs(&LogFilter::default(), BlockTag::Number(from), BlockTag::Number(latest)).await {
			Ok(logs) => {
				for subscription in subscriptions {
					let filter = subscription.filter.clone().unwrap_or_default();
					for log in logs.iter().filter(|log| filter.matches(log)) {
						let payload = json!({
							"jsonrpc": "2.0",
							"method": "eth_subscription",
							"params": { "subscription": subscription.id, "result": log },
						});
						self.hub.notify(subscription.connection_id, payload);
					}
				}
			},
			Err(err) => log::warn!("shared poller failed to fetch logs between {from} and {latest}: {err}"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use ethereum_types::{H160, H256, U64};
	use evm_relay_core::testing::FakeMirrorClient;
	use evm_relay_primitives::{AccountView, Block, BlockTransactions, Log, SubscriptionKind};
	use ethereum_types::U256;

	fn account() -> AccountView {
		AccountView { address: H160::zero(), nonce_latest: 0, nonce_pending: 0, balance_weibar: U256::zero(), code_hash: None, receiver_sig_required: false }
	}

	fn block(number: u64, hash: H256) -> Block {
		Block {
			number: U64::from(number),
			hash,
			parent_hash: H256::zero(),
			extra_data: Vec::new(),
			logs_bloom: Default::default(),
			transactions_root: H256::zero(),
			state_root: H256::zero(),
			receipts_root: H256::zero(),
			miner: H160::zero(),
			difficulty: U256::zero(),
			total_difficulty: U256::zero(),
			size: U64::zero(),
			gas_limit: U256::zero(),
			gas_used: U256::zero(),
			timestamp: U64::zero(),
			transactions: BlockTransactions::Hashes(Vec::new()),
			uncles: Vec::new(),
			base_fee_per_gas: None,
		}
	}

	#[tokio::test]
	async fn cancelling_the_shutdown_token_stops_the_poll_loop() {
		let mirror = Arc::new(FakeMirrorClient::new(account(), U256::from(1)));
		let hub = Arc::new(ConnectionHub::new(10));
		let poller = Arc::new(SharedPoller::new(mirror, hub, Duration::from_secs(30)));
		let shutdown = CancellationToken::new();
		let handle = poller.spawn(shutdown.clone());
		shutdown.cancel();
		tokio::time::timeout(Duration::from_secs(1), handle).await.expect("poller should stop promptly after cancellation").unwrap();
	}

	#[tokio::test]
	async fn new_head_notification_is_delivered_to_subscribed_connections() {
		let mirror = Arc::new(FakeMirrorClient::new(account(), U256::from(1)));
		mirror.insert_block(1, block(1, H256::repeat_byte(1)));
		let hub = Arc::new(ConnectionHub::new(10));
		let (tx, mut rx) = tokio::sync::mpsc::channel(8);
		hub.register(1, tx);
		hub.engine.subscribe(1, SubscriptionKind::NewHeads, None).unwrap();

		let poller = SharedPoller::new(mirror, hub, Duration::from_millis(10));
		poller.fan_out(1, 1).await;

		let message = rx.try_recv().expect("a notification should have been sent");
		assert_eq!(message["method"], json!("eth_subscription"));
		assert_eq!(message["params"]["result"]["number"], json!("0x1"));
	}

	#[tokio::test]
	async fn log_notification_only_reaches_matching_filters() {
		let mirror = Arc::new(FakeMirrorClient::new(account(), U256::from(1)));
		mirror.logs.lock().unwrap().push(Log {
			address: H160::repeat_byte(9),
			topics: Vec::new(),
			data: Vec::new(),
			block_hash: None,
			block_number: None,
			transaction_hash: None,
			transaction_index: None,
			log_index: None,
			removed: false,
		});
		let hub = Arc::new(ConnectionHub::new(10));
		let (tx_match, mut rx_match) = tokio::sync::mpsc::channel(8);
		let (tx_miss, mut rx_miss) = tokio::sync::mpsc::channel(8);
		hub.register(1, tx_match);
		hub.register(2, tx_miss);

		let mut matching_addresses = std::collections::HashSet::new();
		matching_addresses.insert(H160::repeat_byte(9));
		hub.engine.subscribe(1, SubscriptionKind::Logs, Some(LogFilter { addresses: matching_addresses, topics: Vec::new() })).unwrap();

		let mut non_matching_addresses = std::collections::HashSet::new();
		non_matching_addresses.insert(H160::repeat_byte(1));
		hub.engine.subscribe(2, SubscriptionKind::Logs, Some(LogFilter { addresses: non_matching_addresses, topics: Vec::new() })).unwrap();

		let poller = SharedPoller::new(mirror, hub, Duration::from_millis(10));
		poller.fan_out(1, 1).await;

		assert!(rx_match.try_recv().is_ok());
		assert!(rx_miss.try_recv().is_err());
	}
}
