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

//! The method registry and the JSON-RPC dispatch/validation pipeline
//! (distilled spec §4.7 – §4.8): routing, parameter validation, per-IP
//! rate limiting, cache policy, and batch assembly. The WebSocket server
//! in `evm-relay-ws` drives the same [`Dispatcher`] for every non-
//! subscription method it receives.

pub mod context;
pub mod dispatcher;
pub mod handlers;
pub mod metrics;
pub mod params;
pub mod registry;

pub use context::RpcContext;
pub use dispatcher::{error_response, Dispatcher, Transport};
pub use metrics::{MetricsSink, NoopMetricsSink};
pub use registry::MethodRegistry;
