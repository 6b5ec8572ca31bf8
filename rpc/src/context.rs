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

//! The process-wide singletons every handler reaches through
//! (distilled spec §9, "Global mutable state"): the cache, the Mirror
//! API client, and the submission pipeline (which itself owns the
//! account-lock map and the paymaster). One `RpcContext` is built at
//! start-up and shared behind an `Arc` for the life of the process.

use std::sync::Arc;

use evm_relay_cache::CacheService;
use evm_relay_core::{MirrorClient, SubmissionPipeline};
use evm_relay_primitives::RelayConfig;

use crate::metrics::{MetricsSink, NoopMetricsSink};

pub struct RpcContext {
	pub config: Arc<RelayConfig>,
	pub cache: Arc<CacheService>,
	pub mirror: Arc<dyn MirrorClient>,
	pub pipeline: Arc<SubmissionPipeline>,
	/// Rendered once at start-up for `web3_clientVersion`.
	pub client_version: String,
	pub metrics: Arc<dyn MetricsSink>,
}

impl RpcContext {
	pub fn new(
		config: Arc<RelayConfig>,
		cache: Arc<CacheService>,
		mirror: Arc<dyn MirrorClient>,
		pipeline: Arc<SubmissionPipeline>,
	) -> Self {
		RpcContext {
			config,
			cache,
			mirror,
			pipeline,
			client_version: format!("evm-relay/v{}", env!("CARGO_PKG_VERSION")),
			metrics: Arc::new(NoopMetricsSink),
		}
	}

	pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
		self.metrics = metrics;
		self
	}
}
