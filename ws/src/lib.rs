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

//! The subscription engine and WebSocket server (distilled spec §4.9 –
//! §4.10): per-connection subscription bookkeeping, a shared poller that
//! turns Mirror-API polling into `eth_subscription` notifications, and
//! the axum connection lifecycle that drives both.

pub mod engine;
pub mod filter;
pub mod hub;
pub mod poller;
pub mod server;

pub use engine::SubscriptionEngine;
pub use hub::ConnectionHub;
pub use poller::SharedPoller;
pub use server::{WsServerState, upgrade};
