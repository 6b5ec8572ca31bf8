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

//! The two-tier cache (distilled spec §4.2): a process-local LRU,
//! optionally backed by a shared Redis store. [`CacheService`] is the
//! only type the rest of the gateway talks to.

mod key;
mod local;
mod service;
mod shared;

pub use key::build_key;
pub use local::LocalCache;
pub use service::{CacheLookup, CacheService};
pub use shared::{HealthProbe, RedisStore, SharedStore, SharedStoreError};
