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

//! The HTTP surface (distilled §6, SPEC_FULL.md AMBIENT.5): `POST /` for
//! JSON-RPC, `GET /ws` upgraded by `evm-relay-ws`, `GET /metrics`, and the
//! two health endpoints. Grounded in the reference's `jsonrpsee`
//! dependency for the wire types the Dispatcher already speaks, fronted
//! by a plain `axum::Router` since there is no `sc-service` here to own
//! one.

use std::{net::SocketAddr, sync::Arc};

use axum::{
	extract::{ConnectInfo, State},
	http::StatusCode,
	response::IntoResponse,
	routing::{get, post},
	Json, Router,
};
use evm_relay_cache::HealthProbe;
use evm_relay_rpc::{Dispatcher, RpcContext, Transport};
use evm_relay_ws::{upgrade, WsServerState};
use serde_json::Value;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::metrics::RelayMetrics;

pub struct AppState {
	pub ctx: Arc<RpcContext>,
	pub dispatcher: Arc<Dispatcher>,
	pub metrics: Arc<RelayMetrics>,
	/// `None` when no shared cache is configured — readiness never
	/// depends on a collaborator the deployment didn't ask for.
	pub shared_cache_health: Option<HealthProbe>,
}

pub fn router(state: Arc<AppState>, ws_state: Arc<WsServerState>) -> Router {
	let rpc_routes = Router::new()
		.route("/", post(handle_rpc))
		.route("/metrics", get(handle_metrics))
		.route("/health/liveness", get(handle_liveness))
		.route("/health/readiness", get(handle_readiness))
		.with_state(state);

	let ws_routes = Router::new().route("/ws", get(upgrade)).with_state(ws_state);

	rpc_routes.merge(ws_routes).layer(CorsLayer::permissive()).layer(TraceLayer::new_for_http())
}

async fn handle_rpc(State(state): State<Arc<AppState>>, ConnectInfo(addr): ConnectInfo<SocketAddr>, Json(body): Json<Value>) -> impl IntoResponse {
	match state.dispatcher.dispatch(&state.ctx, body, Transport::Http, addr.ip(), None).await {
		Some(response) => Json(response).into_response(),
		None => StatusCode::NO_CONTENT.into_response(),
	}
}

async fn handle_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
	(StatusCode::OK, [("content-type", "text/plain; version=0.0.4")], state.metrics.render())
}

/// 200 once the process is accepting connections and, when a shared
/// cache is configured, its last liveness probe succeeded (distilled
/// §6). A deployment with no shared store configured is always live.
async fn handle_liveness(State(state): State<Arc<AppState>>) -> impl IntoResponse {
	match &state.shared_cache_health {
		Some(probe) if !probe.is_healthy() => StatusCode::SERVICE_UNAVAILABLE,
		_ => StatusCode::OK,
	}
}

/// Everything liveness requires, plus a non-empty cached chain id
/// (distilled §6) — the one piece of state every other handler depends
/// on having resolved before the gateway is fit to serve traffic.
async fn handle_readiness(State(state): State<Arc<AppState>>) -> impl IntoResponse {
	if let Some(probe) = &state.shared_cache_health {
		if !probe.is_healthy() {
			return StatusCode::SERVICE_UNAVAILABLE;
		}
	}
	if state.ctx.config.chain_id == 0 {
		return StatusCode::SERVICE_UNAVAILABLE;
	}
	StatusCode::OK
}
