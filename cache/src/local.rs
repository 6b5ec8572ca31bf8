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

//! The process-local LRU layer. Opaque to other gateway instances
//! (distilled spec §3, "A Local entry is opaque to other processes").

use std::{
	num::NonZeroUsize,
	sync::Mutex,
	time::{Duration, Instant},
};

use lru::LruCache;
use serde_json::Value;

struct Entry {
	value: Value,
	expires_at: Instant,
}

pub struct LocalCache {
	inner: Mutex<LruCache<String, Entry>>,
}

impl LocalCache {
	pub fn new(capacity: usize) -> Self {
		let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
		LocalCache { inner: Mutex::new(LruCache::new(capacity)) }
	}

	pub fn get(&self, key: &str) -> Option<Value> {
		let mut guard = self.inner.lock().expect("local cache mutex poisoned");
		match guard.get(key) {
			Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
			Some(_) => {
				guard.pop(key);
				None
			},
			None => None,
		}
	}

	pub fn set(&self, key: String, value: Value, ttl: Duration) {
		let mut guard = self.inner.lock().expect("local cache mutex poisoned");
		guard.put(key, Entry { value, expires_at: Instant::now() + ttl });
	}

	pub fn delete(&self, key: &str) {
		let mut guard = self.inner.lock().expect("local cache mutex poisoned");
		guard.pop(key);
	}

	pub fn clear(&self) {
		let mut guard = self.inner.lock().expect("local cache mutex poisoned");
		guard.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn set_then_get_within_ttl_returns_the_value() {
		let cache = LocalCache::new(10);
		cache.set("k".to_string(), serde_json::json!(42), Duration::from_secs(60));
		assert_eq!(cache.get("k"), Some(serde_json::json!(42)));
	}

	#[test]
	fn get_after_ttl_elapses_returns_none() {
		let cache = LocalCache::new(10);
		cache.set("k".to_string(), serde_json::json!(42), Duration::from_millis(1));
		std::thread::sleep(Duration::from_millis(10));
		assert_eq!(cache.get("k"), None);
	}

	#[test]
	fn eviction_respects_capacity() {
		let cache = LocalCache::new(1);
		cache.set("a".to_string(), serde_json::json!(1), Duration::from_secs(60));
		cache.set("b".to_string(), serde_json::json!(2), Duration::from_secs(60));
		assert_eq!(cache.get("a"), None);
		assert_eq!(cache.get("b"), Some(serde_json::json!(2)));
	}
}
