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

//! Ties a connection id to the outbound channel its WebSocket task reads
//! from, so the shared poller can push a subscription notification
//! without knowing anything about axum or the socket itself.
//!
//! The outbound channel is bounded at `ws_send_queue_high_water_mark`
//! (distilled spec §4.9: "if a connection's send queue is over its
//! high-water mark, the engine drops the connection... it never
//! unbounded-buffers"). A connection whose queue is full is closed by
//! dropping its sender, which makes the connection task's next
//! `outbound_rx.recv()` observe the channel has hung up.

use dashmap::DashMap;
use evm_relay_primitives::context::ConnectionId;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::engine::SubscriptionEngine;

pub struct ConnectionHub {
	pub engine: SubscriptionEngine,
	senders: DashMap<ConnectionId, mpsc::Sender<Value>>,
}

impl ConnectionHub {
	pub fn new(max_subscriptions_per_connection: usize) -> Self {
		ConnectionHub { engine: SubscriptionEngine::new(max_subscriptions_per_connection), senders: DashMap::new() }
	}

	pub fn with_filter_limit(max_subscriptions_per_connection: usize, max_filter_addresses: Option<usize>) -> Self {
		ConnectionHub { engine: SubscriptionEngine::with_filter_limit(max_subscriptions_per_connection, max_filter_addresses), senders: DashMap::new() }
	}

	pub fn register(&self, connection_id: ConnectionId, sender: mpsc::Sender<Value>) {
		self.senders.insert(connection_id, sender);
	}

	pub fn deregister(&self, connection_id: ConnectionId) {
		self.senders.remove(&connection_id);
		self.engine.drop_connection(connection_id);
	}

	/// Best-effort delivery: a closed channel means the connection is
	/// already gone. A full channel means the connection is over its
	/// high-water mark and is force-closed here by dropping its sender —
	/// the connection task notices on its next receive and closes with a
	/// close code (distilled spec §4.9, "best-effort delivery").
	pub fn notify(&self, connection_id: ConnectionId, message: Value) {
		// Clone the sender and drop the DashMap ref before touching
		// `deregister`, which takes the write lock on the same shard.
		let result = self.senders.get(&connection_id).map(|sender| sender.clone().try_send(message));
		match result {
			None | Some(Ok(())) => {},
			Some(Err(mpsc::error::TrySendError::Closed(_))) => {
				log::debug!("dropping notification for closed websocket connection {connection_id}");
			},
			Some(Err(mpsc::error::TrySendError::Full(_))) => {
				log::warn!("websocket connection {connection_id} exceeded its send queue high-water mark, closing");
				self.deregister(connection_id);
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use evm_relay_primitives::SubscriptionKind;
	use serde_json::json;

	#[tokio::test]
	async fn notify_delivers_to_the_registered_channel() {
		let hub = ConnectionHub::new(10);
		let (tx, mut rx) = mpsc::channel(8);
		hub.register(1, tx);
		hub.notify(1, json!({ "hello": "world" }));
		let received = rx.recv().await.unwrap();
		assert_eq!(received, json!({ "hello": "world" }));
	}

	#[tokio::test]
	async fn notify_closes_a_connection_over_its_high_water_mark() {
		let hub = ConnectionHub::new(10);
		let (tx, rx) = mpsc::channel(1);
		hub.register(1, tx);
		hub.notify(1, json!(1));
		hub.notify(1, json!(2));
		assert!(rx.is_closed() || hub.senders.get(&1).is_none());
	}

	#[test]
	fn deregister_also_clears_the_connection_s_subscriptions() {
		let hub = ConnectionHub::new(10);
		let id = hub.engine.subscribe(1, SubscriptionKind::NewHeads, None).unwrap();
		hub.deregister(1);
		assert!(!hub.engine.unsubscribe(1, &id));
	}
}
