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

//! The WebSocket connection lifecycle (distilled spec §4.10): upgrade,
//! idle-ping eviction, per-connection serialized frame processing, and a
//! per-IP connection ceiling. `eth_subscribe`/`eth_unsubscribe` are
//! intercepted here, ahead of the generic dispatcher, since subscription
//! bookkeeping is inherently connection-scoped; every other method is
//! handed to the same [`evm_relay_rpc::Dispatcher`] the HTTP handler
//! uses.

use std::{
	net::{IpAddr, SocketAddr},
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc,
	},
};

use axum::{
	extract::{
		ws::{Message, WebSocket},
		ConnectInfo, State, WebSocketUpgrade,
	},
	response::IntoResponse,
};
use dashmap::DashMap;
use evm_relay_primitives::{context::ConnectionId, RelayError, SubscriptionKind};
use evm_relay_rpc::{Dispatcher, RpcContext, Transport};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::{
	filter::{parse_filter_object, parse_subscription_kind},
	hub::ConnectionHub,
};

pub struct WsServerState {
	pub ctx: Arc<RpcContext>,
	pub dispatcher: Arc<Dispatcher>,
	pub hub: Arc<ConnectionHub>,
	pub max_connections_per_ip: usize,
	next_connection_id: AtomicU64,
	connections_per_ip: DashMap<IpAddr, usize>,
}

impl WsServerState {
	pub fn new(ctx: Arc<RpcContext>, dispatcher: Arc<Dispatcher>, hub: Arc<ConnectionHub>, max_connections_per_ip: usize) -> Self {
		WsServerState {
			ctx,
			dispatcher,
			hub,
			max_connections_per_ip,
			next_connection_id: AtomicU64::new(1),
			connections_per_ip: DashMap::new(),
		}
	}
}

pub async fn upgrade(State(state): State<Arc<WsServerState>>, ConnectInfo(addr): ConnectInfo<SocketAddr>, ws: WebSocketUpgrade) -> impl IntoResponse {
	ws.on_upgrade(move |socket| handle_connection(state, socket, addr.ip()))
}

async fn handle_connection(state: Arc<WsServerState>, socket: WebSocket, peer_ip: IpAddr) {
	{
		let mut count = state.connections_per_ip.entry(peer_ip).or_insert(0);
		if *count >= state.max_connections_per_ip {
			log::warn!("rejecting websocket connection from {peer_ip}: per-IP connection ceiling reached");
			return;
		}
		*count += 1;
	}

	let connection_id: ConnectionId = state.next_connection_id.fetch_add(1, Ordering::Relaxed);
	let (outbound_tx, mut outbound_rx) = mpsc::channel::<Value>(state.ctx.config.ws_send_queue_high_water_mark);
	state.hub.register(connection_id, outbound_tx);
	log::debug!("websocket connection {connection_id} opened from {peer_ip}");

	let (mut sink, mut stream) = socket.split();
	let ping_interval = state.ctx.config.ws_ping_interval;
	let mut ping_timer = tokio::time::interval(ping_interval);
	ping_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
	let mut last_activity = tokio::time::Instant::now();

	'connection: loop {
		tokio::select! {
			outbound = outbound_rx.recv() => {
				match outbound {
					Some(message) => {
						if sink.send(Message::Text(message.to_string())).await.is_err() {
							break 'connection;
						}
					}
					None => break 'connection,
				}
			}
			incoming = stream.next() => {
				match incoming {
					Some(Ok(Message::Text(text))) => {
						last_activity = tokio::time::Instant::now();
						if let Some(response) = handle_text_frame(&state, connection_id, peer_ip, &text).await {
							if sink.send(Message::Text(response.to_string())).await.is_err() {
								break 'connection;
							}
						}
					}
					Some(Ok(Message::Ping(payload))) => {
						last_activity = tokio::time::Instant::now();
						if sink.send(Message::Pong(payload)).await.is_err() {
							break 'connection;
						}
					}
					Some(Ok(Message::Pong(_))) => {
						last_activity = tokio::time::Instant::now();
					}
					Some(Ok(Message::Close(_))) | None => break 'connection,
					Some(Ok(Message::Binary(_))) => {}
					Some(Err(err)) => {
						log::debug!("websocket read error on connection {connection_id}: {err}");
						break 'connection;
					}
				}
			}
			_ = ping_timer.tick() => {
				if last_activity.elapsed() > ping_interval * 3 {
					log::debug!("closing idle websocket connection {connection_id}");
					break 'connection;
				}
				if sink.send(Message::Ping(Vec::new())).await.is_err() {
					break 'connection;
				}
			}
		}
	}

	state.hub.deregister(connection_id);
	if let Some(mut count) = state.connections_per_ip.get_mut(&peer_ip) {
		*count = count.saturating_sub(1);
	}
	log::debug!("websocket connection {connection_id} closed");
}

async fn handle_text_frame(state: &Arc<WsServerState>, connection_id: ConnectionId, peer_ip: IpAddr, text: &str) -> Option<Value> {
	let body: Value = match serde_json::from_str(text) {
		Ok(body) => body,
		Err(_) => return Some(evm_relay_rpc::error_response(Value::Null, &RelayError::InvalidRequest)),
	};

	match body.get("method").and_then(Value::as_str) {
		Some("eth_subscribe") => Some(handle_subscribe(state, connection_id, &body)),
		Some("eth_unsubscribe") => Some(handle_unsubscribe(state, connection_id, &body)),
		_ => state.dispatcher.dispatch(&state.ctx, body, Transport::Ws, peer_ip, Some(connection_id)).await,
	}
}

fn handle_subscribe(state: &Arc<WsServerState>, connection_id: ConnectionId, body: &Value) -> Value {
	let id = body.get("id").cloned().unwrap_or(Value::Null);
	let params = body.get("params").and_then(Value::as_array).cloned().unwrap_or_default();

	let outcome = (|| -> Result<Value, RelayError> {
		if !state.ctx.config.subscriptions_enabled {
			return Err(RelayError::UnsupportedOperation("subscriptions are disabled".to_string()));
		}
		let kind_raw = params.first().and_then(Value::as_str).ok_or(RelayError::MissingRequiredParameter { index: 0 })?;
		let kind = parse_subscription_kind(kind_raw)?;
		if kind == SubscriptionKind::NewHeads && !state.ctx.config.ws_new_heads_enabled {
			return Err(RelayError::UnsupportedOperation("newHeads subscriptions are disabled".to_string()));
		}

		let filter = match (kind, params.get(1)) {
			(SubscriptionKind::Logs, Some(value)) if !value.is_null() => Some(parse_filter_object(value)?),
			_ => None,
		};

		let subscription_id = state.hub.engine.subscribe(connection_id, kind, filter)?;
		Ok(json!(subscription_id))
	})();

	match outcome {
		Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
		Err(error) => evm_relay_rpc::error_response(id, &error),
	}
}

fn handle_unsubscribe(state: &Arc<WsServerState>, connection_id: ConnectionId, body: &Value) -> Value {
	let id = body.get("id").cloned().unwrap_or(Value::Null);
	let params = body.get("params").and_then(Value::as_array).cloned().unwrap_or_default();

	let subscription_id = match params.first().and_then(Value::as_str) {
		Some(raw) => raw.to_string(),
		None => return evm_relay_rpc::error_response(id, &RelayError::MissingRequiredParameter { index: 0 }),
	};

	let removed = state.hub.engine.unsubscribe(connection_id, &subscription_id);
	json!({ "jsonrpc": "2.0", "id": id, "result": removed })
}
