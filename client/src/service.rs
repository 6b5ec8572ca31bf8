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

//! Builds every collaborator and hands them to an axum server with
//! graceful shutdown. The reference node wires its service the same way
//! (`client/src/service.rs`): one function assembling every piece the
//! process needs, called once from `main`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use evm_relay_cache::{CacheService, HealthProbe, RedisStore};
use evm_relay_core::{AccountLockService, MirrorClient, Paymaster, SubmissionPipeline};
use evm_relay_primitives::{PaymasterState, RelayConfig};
use evm_relay_rpc::{Dispatcher, MethodRegistry, RpcContext};
use evm_relay_ws::{ConnectionHub, SharedPoller, WsServerState};
use tokio_util::sync::CancellationToken;

use crate::{
	http::{router, AppState},
	http_consensus::HttpConsensusClient,
	http_mirror::HttpMirrorClient,
	metrics::RelayMetrics,
};

pub async fn run(config: RelayConfig) -> anyhow::Result<()> {
	let config = Arc::new(config);

	let mirror: Arc<dyn MirrorClient> = Arc::new(HttpMirrorClient::new(config.mirror_node_base_url.clone()));
	let consensus = Arc::new(HttpConsensusClient::new(config.consensus_node_base_url.clone()));

	let (cache, shared_cache_health) = build_cache(&config).await;

	let locks = Arc::new(AccountLockService::new());
	let paymaster_whitelist = config
		.paymaster_whitelist
		.iter()
		.filter_map(|raw| raw.parse::<ethereum_types::H160>().ok())
		.collect();
	let paymaster = Arc::new(Paymaster::new(PaymasterState {
		enabled: config.paymaster_enabled,
		whitelist: paymaster_whitelist,
		whitelist_wildcard: config.paymaster_whitelist.contains(evm_relay_primitives::config::WILDCARD),
		remaining_allowance_weibar: config.max_gas_allowance_hbar * 100_000_000,
	}));

	let pipeline = Arc::new(SubmissionPipeline::new(mirror.clone(), consensus, locks, paymaster, config.clone()));

	let metrics = Arc::new(RelayMetrics::new());
	let ctx = Arc::new(RpcContext::new(config.clone(), cache.clone(), mirror.clone(), pipeline).with_metrics(metrics.clone()));

	let registry = Arc::new(MethodRegistry::new());
	let dispatcher = Arc::new(Dispatcher::new(registry));

	let max_filter_addresses = (!config.ws_multi_address_filters_enabled).then_some(config.ws_max_filter_addresses);
	let hub = Arc::new(ConnectionHub::with_filter_limit(config.ws_max_subscriptions_per_connection, max_filter_addresses));
	let poller_shutdown = CancellationToken::new();
	let poller_handle = config.subscriptions_enabled.then(|| {
		let poller = Arc::new(SharedPoller::new(mirror, hub.clone(), Duration::from_secs(2)));
		poller.spawn(poller_shutdown.clone())
	});

	let ws_state = Arc::new(WsServerState::new(ctx.clone(), dispatcher.clone(), hub, config.ws_max_connections_per_ip));
	let app_state = Arc::new(AppState { ctx, dispatcher, metrics, shared_cache_health });

	let app = router(app_state, ws_state);
	let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;

	log::info!("evm-relay listening on {addr}");
	let listener = tokio::net::TcpListener::bind(addr).await?;
	axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	poller_shutdown.cancel();
	if let Some(handle) = poller_handle {
		if let Err(err) = handle.await {
			log::warn!("shared poller task did not shut down cleanly: {err}");
		}
	}

	Ok(())
}

async fn build_cache(config: &RelayConfig) -> (Arc<CacheService>, Option<HealthProbe>) {
	if !config.redis_enabled {
		return (Arc::new(CacheService::local_only(config.local_lru_cache_capacity, config.chain_id.to_string())), None);
	}

	let url = match &config.redis_url {
		Some(url) => url,
		None => {
			log::warn!("REDIS_ENABLED is set but REDIS_URL is missing; falling back to the local-only cache");
			return (Arc::new(CacheService::local_only(config.local_lru_cache_capacity, config.chain_id.to_string())), None);
		},
	};

	match RedisStore::connect(url).await {
		Ok(store) => {
			let store: Arc<dyn evm_relay_cache::SharedStore> = Arc::new(store);
			let (probe, _handle) = HealthProbe::spawn(store.clone(), Duration::from_secs(5));
			(Arc::new(CacheService::shared_backed_by_local(config.local_lru_cache_capacity, store, config.chain_id.to_string())), Some(probe))
		},
		Err(err) => {
			log::warn!("failed to connect to the shared cache, falling back to local-only: {err}");
			(Arc::new(CacheService::local_only(config.local_lru_cache_capacity, config.chain_id.to_string())), None)
		},
	}
}

async fn shutdown_signal() {
	let ctrl_c = async {
		tokio::signal::ctrl_c().await.expect("failed to install the Ctrl+C signal handler");
	};

	#[cfg(unix)]
	let terminate = async {
		tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
			.expect("failed to install the SIGTERM signal handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
	log::info!("shutdown signal received, draining in-flight requests");
}
