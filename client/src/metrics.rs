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

//! Owns the process's `prometheus::Registry` directly; there is no
//! `sc-service` here to thread one through. Registers every series
//! `evm_relay_rpc::MetricsSink` can record and renders them at `/metrics`
//! via `prometheus::TextEncoder`.

use std::time::Duration;

use evm_relay_rpc::MetricsSink;
use prometheus::{Encoder, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Registry, TextEncoder};

pub struct RelayMetrics {
	registry: Registry,
	rpc_requests_total: IntCounterVec,
	rpc_errors_total: IntCounterVec,
	ip_rate_limited_total: IntCounterVec,
	ws_connections_current: IntGauge,
	ws_subscriptions_current: IntGaugeVec,
	cache_hits_total: IntCounterVec,
	cache_misses_total: prometheus::IntCounter,
	submission_duration_seconds: HistogramVec,
	account_lock_wait_seconds: prometheus::Histogram,
}

impl RelayMetrics {
	pub fn new() -> Self {
		let registry = Registry::new();

		let rpc_requests_total = IntCounterVec::new(prometheus::Opts::new("rpc_requests_total", "Total dispatched RPC requests"), &["method"]).unwrap();
		let rpc_errors_total =
			IntCounterVec::new(prometheus::Opts::new("rpc_errors_total", "Total RPC errors returned"), &["method", "code"]).unwrap();
		let ip_rate_limited_total =
			IntCounterVec::new(prometheus::Opts::new("ip_rate_limited_total", "Total requests rejected by the per-IP rate limiter"), &["method"])
				.unwrap();
		let ws_connections_current = IntGauge::new("ws_connections_current", "Currently open websocket connections").unwrap();
		let ws_subscriptions_current =
			IntGaugeVec::new(prometheus::Opts::new("ws_subscriptions_current", "Currently active subscriptions"), &["kind"]).unwrap();
		let cache_hits_total = IntCounterVec::new(prometheus::Opts::new("cache_hits_total", "Total cache hits"), &["layer"]).unwrap();
		let cache_misses_total = prometheus::IntCounter::new("cache_misses_total", "Total cache misses").unwrap();
		let submission_duration_seconds =
			HistogramVec::new(prometheus::HistogramOpts::new("submission_duration_seconds", "Submission pipeline latency"), &["method"]).unwrap();
		let account_lock_wait_seconds =
			prometheus::Histogram::with_opts(prometheus::HistogramOpts::new("account_lock_wait_seconds", "Time spent waiting to acquire an account lock"))
				.unwrap();

		registry.register(Box::new(rpc_requests_total.clone())).expect("metric registration never collides at start-up");
		registry.register(Box::new(rpc_errors_total.clone())).expect("metric registration never collides at start-up");
		registry.register(Box::new(ip_rate_limited_total.clone())).expect("metric registration never collides at start-up");
		registry.register(Box::new(ws_connections_current.clone())).expect("metric registration never collides at start-up");
		registry.register(Box::new(ws_subscriptions_current.clone())).expect("metric registration never collides at start-up");
		registry.register(Box::new(cache_hits_total.clone())).expect("metric registration never collides at start-up");
		registry.register(Box::new(cache_misses_total.clone())).expect("metric registration never collides at start-up");
		registry.register(Box::new(submission_duration_seconds.clone())).expect("metric registration never collides at start-up");
		registry.register(Box::new(account_lock_wait_seconds.clone())).expect("metric registration never collides at start-up");

		RelayMetrics {
			registry,
			rpc_requests_total,
			rpc_errors_total,
			ip_rate_limited_total,
			ws_connections_current,
			ws_subscriptions_current,
			cache_hits_total,
			cache_misses_total,
			submission_duration_seconds,
			account_lock_wait_seconds,
		}
	}

	pub fn ws_connection_opened(&self) {
		self.ws_connections_current.inc();
	}

	pub fn ws_connection_closed(&self) {
		self.ws_connections_current.dec();
	}

	pub fn subscription_opened(&self, kind: &str) {
		self.ws_subscriptions_current.with_label_values(&[kind]).inc();
	}

	pub fn subscription_closed(&self, kind: &str) {
		self.ws_subscriptions_current.with_label_values(&[kind]).dec();
	}

	pub fn observe_account_lock_wait(&self, elapsed: Duration) {
		self.account_lock_wait_seconds.observe(elapsed.as_secs_f64());
	}

	pub fn observe_submission(&self, method: &str, elapsed: Duration) {
		self.submission_duration_seconds.with_label_values(&[method]).observe(elapsed.as_secs_f64());
	}

	/// Renders the registry in the Prometheus text exposition format, for
	/// the `/metrics` handler.
	pub fn render(&self) -> String {
		let mut buffer = Vec::new();
		let encoder = TextEncoder::new();
		encoder.encode(&self.registry.gather(), &mut buffer).expect("prometheus text encoding never fails");
		String::from_utf8(buffer).expect("prometheus text encoding is always valid utf-8")
	}
}

impl Default for RelayMetrics {
	fn default() -> Self {
		Self::new()
	}
}

impl MetricsSink for RelayMetrics {
	fn record_request(&self, method: &str) {
		self.rpc_requests_total.with_label_values(&[method]).inc();
	}

	fn record_error(&self, method: &str, code: i64) {
		self.rpc_errors_total.with_label_values(&[method, &code.to_string()]).inc();
	}

	fn record_latency(&self, _method: &str, _elapsed: Duration) {}

	fn record_cache_hit(&self, _method: &str, layer: &'static str) {
		self.cache_hits_total.with_label_values(&[layer]).inc();
	}

	fn record_rate_limited(&self, method: &str) {
		self.ip_rate_limited_total.with_label_values(&[method]).inc();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn recorded_requests_are_rendered_in_the_text_exposition_format() {
		let metrics = RelayMetrics::new();
		metrics.record_request("eth_chainId");
		metrics.record_error("eth_call", -32603);
		let rendered = metrics.render();
		assert!(rendered.contains("rpc_requests_total"));
		assert!(rendered.contains("eth_chainId"));
	}
}
