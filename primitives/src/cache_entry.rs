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

//! The cache's unit of storage (distilled spec §3). Behavior lives in the
//! `evm-relay-cache` crate; this is the plain data shape both layers and
//! their callers agree on.

use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLayer {
	Local,
	Shared,
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
	pub key: String,
	pub value: serde_json::Value,
	pub expires_at: Instant,
	pub layer: CacheLayer,
}

impl CacheEntry {
	pub fn is_expired(&self, now: Instant) -> bool {
		now >= self.expires_at
	}
}

/// Block tags that distilled spec §6 forbids caching across requests: all
/// mutable tags except `earliest`, which (like a numeric block number) is
/// immutable and therefore cacheable.
pub const NEVER_CACHED_BLOCK_TAGS: [&str; 4] = ["latest", "pending", "safe", "finalized"];

pub fn block_tag_is_cacheable(tag: &str) -> bool {
	tag == "earliest" || tag.starts_with("0x")
}
