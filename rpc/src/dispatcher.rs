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

//! Request shape validation, rate limiting, method gating, cache policy,
//! and batch assembly (distilled spec §4.8). One [`Dispatcher`] is built
//! once at start-up and shared by both the HTTP handler and every
//! WebSocket connection in `evm-relay-ws`.

use std::{
	net::IpAddr,
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc, Mutex,
	},
	time::{Duration, Instant},
};

use dashmap::DashMap;
use evm_relay_primitives::{cache_entry::NEVER_CACHED_BLOCK_TAGS, context::ConnectionId, RelayError, RequestContext};
use futures::future::join_all;
use jsonrpsee::types::ErrorObjectOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
	context::RpcContext,
	registry::{validate_params, MethodRegistry},
};

/// The wire shape of one JSON-RPC request. `id` is kept as a raw [`Value`]
/// rather than jsonrpsee's borrowed `Id<'a>` so a batch of independently
/// owned requests can be decoded, dispatched, and reassembled without
/// threading lifetimes through `join_all`.
#[derive(Debug, Clone, Deserialize)]
struct RpcRequestIn {
	#[serde(default)]
	#[allow(dead_code)]
	jsonrpc: Option<String>,
	method: String,
	#[serde(default)]
	params: Option<Value>,
	#[serde(default)]
	id: Value,
}

#[derive(Debug, Clone, serde::Serialize)]
struct RpcResponseOut {
	jsonrpc: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	result: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	error: Option<ErrorObjectOwned>,
	id: Value,
}

impl RpcResponseOut {
	fn ok(id: Value, result: Value) -> Self {
		RpcResponseOut { jsonrpc: "2.0", result: Some(result), error: None, id }
	}

	fn err(id: Value, error: &RelayError) -> Self {
		RpcResponseOut { jsonrpc: "2.0", result: None, error: Some(to_error_object(error)), id }
	}
}

fn to_error_object(error: &RelayError) -> ErrorObjectOwned {
	let code = error.code() as i32;
	let data = error.param_index().map(|index| json!({ "index": index }));
	ErrorObjectOwned::owned(code, error.to_string(), data)
}

/// Builds a standalone JSON-RPC error response. Exposed so the WebSocket
/// server can render subscribe/unsubscribe failures (which it handles
/// itself, ahead of the generic dispatch path) in the identical wire
/// shape every other error takes.
pub fn error_response(id: Value, error: &RelayError) -> Value {
	serde_json::to_value(RpcResponseOut::err(id, error)).expect("response always serializes")
}

struct RateWindow {
	opened_at: Instant,
	count: u32,
}

/// Per (IP, method) fixed-window counter. A window resets the first time
/// it's found stale rather than on a timer, so idle callers cost nothing.
struct RateLimiter {
	windows: DashMap<(IpAddr, &'static str), Mutex<RateWindow>>,
}

impl RateLimiter {
	fn new() -> Self {
		RateLimiter { windows: DashMap::new() }
	}

	fn check(&self, peer_ip: IpAddr, method: &'static str, limit: u32, window: Duration) -> bool {
		let entry = self.windows.entry((peer_ip, method)).or_insert_with(|| Mutex::new(RateWindow { opened_at: Instant::now(), count: 0 }));
		let mut state = entry.lock().unwrap();
		let now = Instant::now();
		if now.duration_since(state.opened_at) >= window {
			state.opened_at = now;
			state.count = 0;
		}
		state.count += 1;
		state.count <= limit
	}
}

/// Which transport a request arrived over — batches and subscription
/// control methods are gated differently depending on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
	Http,
	Ws,
}

pub struct Dispatcher {
	registry: Arc<MethodRegistry>,
	rate_limiter: RateLimiter,
	next_request_id: AtomicU64,
}

impl Dispatcher {
	pub fn new(registry: Arc<MethodRegistry>) -> Self {
		Dispatcher { registry, rate_limiter: RateLimiter::new(), next_request_id: AtomicU64::new(1) }
	}

	fn next_request_id(&self) -> u64 {
		self.next_request_id.fetch_add(1, Ordering::Relaxed)
	}

	/// Entry point for one HTTP POST body or one WebSocket text frame.
	/// Accepts either a single request object or a batch array and always
	/// returns the exact shape the caller should write back (a lone
	/// object, an array, or — for a malformed batch — a single error
	/// object with a null id, per JSON-RPC 2.0). `connection_id` is
	/// `Some` for every call made over a WebSocket, `None` over HTTP, and
	/// is carried into the per-request log line alongside the request id
	/// every dispatched request is issued (distilled §4.8).
	pub async fn dispatch(&self, ctx: &Arc<RpcContext>, body: Value, transport: Transport, peer_ip: IpAddr, connection_id: Option<ConnectionId>) -> Option<Value> {
		match body {
			Value::Array(items) => self.dispatch_batch(ctx, items, transport, peer_ip, connection_id).await,
			Value::Object(_) => {
				let response = self.dispatch_value(ctx, body, transport, peer_ip, connection_id).await;
				Some(serde_json::to_value(response).expect("response always serializes"))
			},
			_ => Some(serde_json::to_value(RpcResponseOut::err(Value::Null, &RelayError::InvalidRequest)).expect("response always serializes")),
		}
	}

	async fn dispatch_batch(
		&self,
		ctx: &Arc<RpcContext>,
		items: Vec<Value>,
		transport: Transport,
		peer_ip: IpAddr,
		connection_id: Option<ConnectionId>,
	) -> Option<Value> {
		if transport == Transport::Ws && !ctx.config.ws_batch_requests_enabled {
			return Some(
				serde_json::to_value(RpcResponseOut::err(Value::Null, &RelayError::WsBatchRequestsDisabled)).expect("response always serializes"),
			);
		}
		if items.is_empty() {
			return Some(serde_json::to_value(RpcResponseOut::err(Value::Null, &RelayError::InvalidRequest)).expect("response always serializes"));
		}
		if items.len() > ctx.config.batch_requests_max_size {
			let error = RelayError::BatchRequestsAmountMaxExceeded { actual: items.len(), max: ctx.config.batch_requests_max_size };
			return Some(serde_json::to_value(RpcResponseOut::err(Value::Null, &error)).expect("response always serializes"));
		}

		let futures = items.into_iter().map(|item| self.dispatch_batch_item(ctx, item, transport, peer_ip, connection_id));
		let responses = join_all(futures).await;
		Some(serde_json::to_value(responses).expect("responses always serialize"))
	}

	async fn dispatch_batch_item(
		&self,
		ctx: &Arc<RpcContext>,
		item: Value,
		transport: Transport,
		peer_ip: IpAddr,
		connection_id: Option<ConnectionId>,
	) -> RpcResponseOut {
		let id = extract_id(&item);
		let method = item.get("method").and_then(Value::as_str).map(str::to_string);
		if let Some(method) = method {
			if ctx.config.batch_requests_disallowed_methods.contains(&method) {
				return RpcResponseOut::err(id, &RelayError::BatchRequestsMethodNotPermitted(method));
			}
		}
		self.dispatch_value(ctx, item, transport, peer_ip, connection_id).await
	}

	async fn dispatch_value(
		&self,
		ctx: &Arc<RpcContext>,
		raw: Value,
		transport: Transport,
		peer_ip: IpAddr,
		connection_id: Option<ConnectionId>,
	) -> RpcResponseOut {
		let id = extract_id(&raw);
		let request: RpcRequestIn = match serde_json::from_value(raw) {
			Ok(request) => request,
			Err(_) => return RpcResponseOut::err(id, &RelayError::InvalidRequest),
		};

		let mut request_ctx = RequestContext::new(self.next_request_id(), ctx.config.clone(), peer_ip);
		if let Some(connection_id) = connection_id {
			request_ctx = request_ctx.with_connection(connection_id);
		}

		match self.invoke(ctx, &request, transport, &request_ctx).await {
			Ok(result) => {
				log::debug!(
					"request {} method={} connection={:?} peer={} completed",
					request_ctx.request_id,
					request.method,
					request_ctx.connection_id,
					request_ctx.peer_ip
				);
				RpcResponseOut::ok(id, result)
			},
			Err(error) => {
				ctx.metrics.record_error(&request.method, error.code());
				log::debug!(
					"request {} method={} connection={:?} peer={} failed: {error}",
					request_ctx.request_id,
					request.method,
					request_ctx.connection_id,
					request_ctx.peer_ip
				);
				RpcResponseOut::err(id, &error)
			},
		}
	}

	async fn invoke(&self, ctx: &Arc<RpcContext>, request: &RpcRequestIn, transport: Transport, request_ctx: &RequestContext) -> Result<Value, RelayError> {
		let peer_ip = request_ctx.peer_ip;
		let entry = self.registry.get(&request.method).ok_or_else(|| RelayError::MethodNotFound(request.method.clone()))?;

		log::debug!("request {} dispatching method={} connection={:?}", request_ctx.request_id, entry.name, request_ctx.connection_id);

		if !self.rate_limiter.check(peer_ip, entry.name, ctx.config.default_rate_limit, ctx.config.limit_duration) {
			ctx.metrics.record_rate_limited(entry.name);
			return Err(RelayError::IpRateLimitExceeded(entry.name.to_string()));
		}

		if ctx.config.read_only && !entry.read_only_allowed {
			return Err(RelayError::UnsupportedOperation(format!("{} is disabled while the relay is running read-only", entry.name)));
		}
		if entry.debug_api_guarded && !ctx.config.debug_api_enabled {
			return Err(RelayError::UnsupportedMethod);
		}
		if entry.txpool_guarded && !ctx.config.txpool_api_enabled {
			return Err(RelayError::UnsupportedMethod);
		}
		if transport == Transport::Http && entry.ws_allowed {
			return Err(RelayError::UnsupportedOperation("use a WebSocket connection for subscriptions".to_string()));
		}

		let params = match &request.params {
			Some(Value::Array(items)) => items.clone(),
			Some(Value::Null) | None => Vec::new(),
			Some(_) => return Err(RelayError::InvalidRequest),
		};
		validate_params(entry.param_schema, &params)?;
		let params_key = Value::Array(params.clone());

		ctx.metrics.record_request(entry.name);

		let cacheable = entry.cache_ttl_ms.is_some() && is_cacheable(entry.name, &params);
		if cacheable {
			if let Some(hit) = ctx.cache.get(entry.name, &params_key).await {
				let layer = match hit.layer {
					evm_relay_primitives::CacheLayer::Local => "local",
					evm_relay_primitives::CacheLayer::Shared => "shared",
				};
				ctx.metrics.record_cache_hit(entry.name, layer);
				return Ok(hit.value);
			}
		}

		let started = Instant::now();
		let result = (entry.handler)(ctx.clone(), params).await?;
		ctx.metrics.record_latency(entry.name, started.elapsed());

		if cacheable {
			let ttl = Duration::from_millis(entry.cache_ttl_ms.expect("checked by `cacheable` above"));
			ctx.cache.set(entry.name, &params_key, result.clone(), ttl).await;
		}

		Ok(result)
	}
}

fn extract_id(value: &Value) -> Value {
	value.get("id").cloned().unwrap_or(Value::Null)
}

/// Block-tag-bearing parameter index for methods whose result depends on
/// a mutable tag (`latest`, `pending`, `safe`, `finalized`) — those are
/// never cached, matching `evm_relay_primitives::cache_entry`.
fn tagged_param_index(method: &str) -> Option<usize> {
	match method {
		"eth_getBalance" | "eth_getTransactionCount" | "eth_getCode" => Some(1),
		"eth_getStorageAt" => Some(2),
		"eth_call" | "eth_estimateGas" => Some(1),
		"eth_getBlockByNumber" | "eth_getBlockTransactionCountByNumber" | "eth_getBlockReceipts" | "eth_getTransactionByBlockNumberAndIndex" => Some(0),
		"eth_feeHistory" => Some(1),
		_ => None,
	}
}

fn is_cacheable(method: &str, params: &[Value]) -> bool {
	if method == "eth_getLogs" {
		return match params.first().and_then(Value::as_object) {
			Some(filter) => ["fromBlock", "toBlock"]
				.iter()
				.filter_map(|key| filter.get(*key).and_then(Value::as_str))
				.all(|tag| !NEVER_CACHED_BLOCK_TAGS.contains(&tag)),
			None => true,
		};
	}

	match tagged_param_index(method) {
		Some(index) => {
			let tag = params.get(index).and_then(Value::as_str).unwrap_or("latest");
			!NEVER_CACHED_BLOCK_TAGS.contains(&tag)
		},
		None => true,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use ethereum_types::U256;
	use evm_relay_cache::CacheService;
	use evm_relay_core::testing::{FakeConsensusClient, FakeMirrorClient};
	use evm_relay_core::{AccountLockService, Paymaster, SubmissionPipeline};
	use evm_relay_primitives::{AccountView, PaymasterState, RelayConfig};
	use std::{
		collections::HashSet,
		net::{IpAddr, Ipv4Addr},
	};

	fn peer() -> IpAddr {
		IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
	}

	fn test_ctx(config: RelayConfig) -> Arc<RpcContext> {
		let cache = Arc::new(CacheService::local_only(100, "salt"));
		let account = AccountView {
			address: ethereum_types::H160::zero(),
			nonce_latest: 0,
			nonce_pending: 0,
			balance_weibar: U256::max_value(),
			code_hash: None,
			receiver_sig_required: false,
		};
		let mirror = Arc::new(FakeMirrorClient::new(account, U256::from(1)));
		let consensus = Arc::new(FakeConsensusClient::default());
		let locks = Arc::new(AccountLockService::new());
		let paymaster =
			Arc::new(Paymaster::new(PaymasterState { enabled: false, whitelist: HashSet::new(), whitelist_wildcard: false, remaining_allowance_weibar: 0 }));
		let config = Arc::new(config);
		let pipeline = Arc::new(SubmissionPipeline::new(mirror.clone(), consensus, locks, paymaster, config.clone()));
		Arc::new(RpcContext::new(config, cache, mirror, pipeline))
	}

	#[tokio::test]
	async fn unknown_method_reports_method_not_found() {
		let ctx = test_ctx(RelayConfig::default());
		let dispatcher = Dispatcher::new(Arc::new(MethodRegistry::new()));
		let body = json!({ "jsonrpc": "2.0", "method": "eth_doesNotExist", "params": [], "id": 1 });
		let response = dispatcher.dispatch(&ctx, body, Transport::Http, peer(), None).await.unwrap();
		assert_eq!(response["error"]["code"], json!(-32601));
		assert_eq!(response["id"], json!(1));
	}

	#[tokio::test]
	async fn malformed_request_is_invalid_request_with_preserved_id() {
		let ctx = test_ctx(RelayConfig::default());
		let dispatcher = Dispatcher::new(Arc::new(MethodRegistry::new()));
		let body = json!({ "id": 7 });
		let response = dispatcher.dispatch(&ctx, body, Transport::Http, peer(), None).await.unwrap();
		assert_eq!(response["error"]["code"], json!(-32600));
		assert_eq!(response["id"], json!(7));
	}

	#[tokio::test]
	async fn simple_read_method_round_trips() {
		let ctx = test_ctx(RelayConfig::default());
		let dispatcher = Dispatcher::new(Arc::new(MethodRegistry::new()));
		let body = json!({ "jsonrpc": "2.0", "method": "eth_chainId", "params": [], "id": 1 });
		let response = dispatcher.dispatch(&ctx, body, Transport::Http, peer(), None).await.unwrap();
		assert_eq!(response["result"], json!("0x127"));
	}

	#[tokio::test]
	async fn empty_batch_is_rejected() {
		let ctx = test_ctx(RelayConfig::default());
		let dispatcher = Dispatcher::new(Arc::new(MethodRegistry::new()));
		let response = dispatcher.dispatch(&ctx, json!([]), Transport::Http, peer(), None).await.unwrap();
		assert_eq!(response["error"]["code"], json!(-32600));
	}

	#[tokio::test]
	async fn batch_preserves_request_ids_in_order() {
		let ctx = test_ctx(RelayConfig::default());
		let dispatcher = Dispatcher::new(Arc::new(MethodRegistry::new()));
		let body = json!([
			{ "jsonrpc": "2.0", "method": "eth_chainId", "params": [], "id": 1 },
			{ "jsonrpc": "2.0", "method": "eth_blockNumber", "params": [], "id": 2 },
		]);
		let response = dispatcher.dispatch(&ctx, body, Transport::Http, peer(), None).await.unwrap();
		let array = response.as_array().unwrap();
		assert_eq!(array[0]["id"], json!(1));
		assert_eq!(array[1]["id"], json!(2));
	}

	#[tokio::test]
	async fn batch_over_the_configured_limit_is_rejected() {
		let mut config = RelayConfig::default();
		config.batch_requests_max_size = 1;
		let ctx = test_ctx(config);
		let dispatcher = Dispatcher::new(Arc::new(MethodRegistry::new()));
		let body = json!([
			{ "jsonrpc": "2.0", "method": "eth_chainId", "params": [], "id": 1 },
			{ "jsonrpc": "2.0", "method": "eth_blockNumber", "params": [], "id": 2 },
		]);
		let response = dispatcher.dispatch(&ctx, body, Transport::Http, peer(), None).await.unwrap();
		assert_eq!(response["error"]["code"], json!(-32005));
	}

	#[tokio::test]
	async fn disallowed_batch_method_is_rejected_per_item() {
		let mut config = RelayConfig::default();
		config.batch_requests_disallowed_methods.insert("eth_sendRawTransaction".to_string());
		let ctx = test_ctx(config);
		let dispatcher = Dispatcher::new(Arc::new(MethodRegistry::new()));
		let body = json!([{ "jsonrpc": "2.0", "method": "eth_sendRawTransaction", "params": ["0x00"], "id": 1 }]);
		let response = dispatcher.dispatch(&ctx, body, Transport::Http, peer(), None).await.unwrap();
		let array = response.as_array().unwrap();
		assert_eq!(array[0]["error"]["code"], json!(-32006));
	}

	#[tokio::test]
	async fn read_only_mode_rejects_mutating_methods() {
		let mut config = RelayConfig::default();
		config.read_only = true;
		let ctx = test_ctx(config);
		let dispatcher = Dispatcher::new(Arc::new(MethodRegistry::new()));
		let body = json!({ "jsonrpc": "2.0", "method": "eth_sendRawTransaction", "params": ["0x00"], "id": 1 });
		let response = dispatcher.dispatch(&ctx, body, Transport::Http, peer(), None).await.unwrap();
		assert_eq!(response["error"]["code"], json!(-32002));
	}

	#[tokio::test]
	async fn debug_api_is_gated_off_by_default() {
		let ctx = test_ctx(RelayConfig::default());
		let dispatcher = Dispatcher::new(Arc::new(MethodRegistry::new()));
		let body = json!({ "jsonrpc": "2.0", "method": "debug_getBadBlocks", "params": [], "id": 1 });
		let response = dispatcher.dispatch(&ctx, body, Transport::Http, peer(), None).await.unwrap();
		assert_eq!(response["error"]["code"], json!(-32001));
	}

	#[tokio::test]
	async fn subscription_methods_are_rejected_over_http() {
		let ctx = test_ctx(RelayConfig::default());
		let dispatcher = Dispatcher::new(Arc::new(MethodRegistry::new()));
		let body = json!({ "jsonrpc": "2.0", "method": "eth_subscribe", "params": ["newHeads"], "id": 1 });
		let response = dispatcher.dispatch(&ctx, body, Transport::Http, peer(), None).await.unwrap();
		assert_eq!(response["error"]["code"], json!(-32002));
	}

	#[tokio::test]
	async fn exceeding_the_per_ip_rate_limit_is_reported() {
		let mut config = RelayConfig::default();
		config.default_rate_limit = 1;
		let ctx = test_ctx(config);
		let dispatcher = Dispatcher::new(Arc::new(MethodRegistry::new()));
		let body = || json!({ "jsonrpc": "2.0", "method": "eth_chainId", "params": [], "id": 1 });
		let first = dispatcher.dispatch(&ctx, body(), Transport::Http, peer(), None).await.unwrap();
		assert!(first["error"].is_null());
		let second = dispatcher.dispatch(&ctx, body(), Transport::Http, peer(), None).await.unwrap();
		assert_eq!(second["error"]["code"], json!(-32003));
	}

	#[tokio::test]
	async fn missing_required_parameter_is_reported_with_its_index() {
		let ctx = test_ctx(RelayConfig::default());
		let dispatcher = Dispatcher::new(Arc::new(MethodRegistry::new()));
		let body = json!({ "jsonrpc": "2.0", "method": "eth_getBalance", "params": [], "id": 1 });
		let response = dispatcher.dispatch(&ctx, body, Transport::Http, peer(), None).await.unwrap();
		assert_eq!(response["error"]["code"], json!(-32602));
		assert_eq!(response["error"]["data"]["index"], json!(0));
	}

	#[tokio::test]
	async fn malformed_parameter_shape_is_rejected_before_the_handler_runs() {
		let ctx = test_ctx(RelayConfig::default());
		let dispatcher = Dispatcher::new(Arc::new(MethodRegistry::new()));
		let body = json!({ "jsonrpc": "2.0", "method": "eth_getBalance", "params": ["not-an-address"], "id": 1 });
		let response = dispatcher.dispatch(&ctx, body, Transport::Http, peer(), None).await.unwrap();
		assert_eq!(response["error"]["code"], json!(-32602));
		assert_eq!(response["error"]["data"]["index"], json!(0));
	}

	#[test]
	fn mutable_block_tags_are_never_cacheable() {
		assert!(!is_cacheable("eth_getBalance", &[json!("0x1"), json!("latest")]));
		assert!(is_cacheable("eth_getBalance", &[json!("0x1"), json!("earliest")]));
		assert!(is_cacheable("eth_getBalance", &[json!("0x1"), json!("0x10")]));
		assert!(is_cacheable("eth_chainId", &[]));
	}

	#[test]
	fn get_logs_is_uncacheable_when_either_bound_is_mutable() {
		let params = [json!({ "fromBlock": "0x1", "toBlock": "latest" })];
		assert!(!is_cacheable("eth_getLogs", &params));
		let params = [json!({ "fromBlock": "0x1", "toBlock": "0x10" })];
		assert!(is_cacheable("eth_getLogs", &params));
	}
}
