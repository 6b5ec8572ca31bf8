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

//! Per-request context threaded through every handler: the request id used
//! in logs/metrics/error data, the connection id (WebSocket only), a
//! cancellation token tied to the client's connection, and the immutable
//! config snapshot.

use std::sync::Arc;

pub use tokio_util::sync::CancellationToken;

use crate::config::RelayConfig;

/// A monotonically issued request id, propagated into every log line,
/// outbound error, and metric label for one dispatched RPC call
/// (distilled spec §4.8).
pub type RequestId = u64;

/// Connection id, assigned once per WebSocket connection and propagated
/// alongside the request id for every request made over that connection.
pub type ConnectionId = u64;

/// Everything a handler needs besides its decoded parameters.
#[derive(Clone)]
pub struct RequestContext {
	pub request_id: RequestId,
	pub connection_id: Option<ConnectionId>,
	/// Cancelled when the owning HTTP request disconnects or the owning
	/// WebSocket closes. Work downstream must check this at suspension
	/// points rather than retry across it (distilled spec §5).
	pub cancellation: CancellationToken,
	pub config: Arc<RelayConfig>,
	/// Caller IP, used for per-IP rate limiting and connection ceilings.
	pub peer_ip: std::net::IpAddr,
}

impl RequestContext {
	pub fn new(request_id: RequestId, config: Arc<RelayConfig>, peer_ip: std::net::IpAddr) -> Self {
		RequestContext {
			request_id,
			connection_id: None,
			cancellation: CancellationToken::new(),
			config,
			peer_ip,
		}
	}

	pub fn with_connection(mut self, connection_id: ConnectionId) -> Self {
		self.connection_id = Some(connection_id);
		self
	}

	pub fn child(&self, request_id: RequestId) -> Self {
		RequestContext {
			request_id,
			connection_id: self.connection_id,
			cancellation: self.cancellation.child_token(),
			config: self.config.clone(),
			peer_ip: self.peer_ip,
		}
	}
}
