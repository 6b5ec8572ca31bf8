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

//! Binary-crate library surface: CLI parsing, the concrete Mirror/consensus
//! HTTP clients, metrics, and the axum-based HTTP/WS service assembly.
//! Kept as a library (not folded into `main.rs`) so integration tests can
//! drive `service::run` and the HTTP clients without going through a
//! spawned process, matching the reference node client's split between
//! `lib.rs` and a thin `main.rs`.

pub mod cli;
pub mod http;
pub mod http_consensus;
pub mod http_mirror;
pub mod metrics;
pub mod service;
pub mod wire;

pub use cli::Cli;
pub use service::run;
