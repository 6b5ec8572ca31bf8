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

//! A dependency-inverted sink the dispatcher reports into, so this crate
//! never has to know about the concrete Prometheus registry the binary
//! builds (that lives in the `client` crate, alongside the HTTP/WS
//! server — see SPEC_FULL.md AMBIENT.4).

use std::time::Duration;

pub trait MetricsSink: Send + Sync {
	fn record_request(&self, method: &str);
	fn record_error(&self, method: &str, code: i64);
	fn record_latency(&self, method: &str, elapsed: Duration);
	fn record_cache_hit(&self, method: &str, layer: &'static str);
	fn record_rate_limited(&self, method: &str);
}

/// Used by tests and by any caller that doesn't want to wire up metrics.
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
	fn record_request(&self, _method: &str) {}
	fn record_error(&self, _method: &str, _code: i64) {}
	fn record_latency(&self, _method: &str, _elapsed: Duration) {}
	fn record_cache_hit(&self, _method: &str, _layer: &'static str) {}
	fn record_rate_limited(&self, _method: &str) {}
}
