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

//! The composite cache the rest of the gateway actually talks to
//! (distilled spec §4.2): a local LRU, optionally backed by a shared
//! store. Callers never see a `Result` — a shared-store read failure is
//! reported as a cache miss, never silently satisfied from the local
//! layer, while a shared-store write failure never blocks the local
//! write from taking effect.

use std::{sync::Arc, time::Duration};

use evm_relay_primitives::CacheLayer;
use serde_json::Value;

use crate::{key::build_key, local::LocalCache, shared::SharedStore};

/// `LocalOnly` when no shared store is configured; `SharedBackedByLocal`
/// once one is. The two variants exist (rather than an `Option<Arc<dyn
/// SharedStore>>` field) so that the common local-only deployment never
/// pays for an indirection it doesn't need.
pub enum CacheService {
	LocalOnly { local: LocalCache, salt: String },
	SharedBackedByLocal { local: LocalCache, shared: Arc<dyn SharedStore>, salt: String },
}

pub struct CacheLookup {
	pub value: Value,
	pub layer: CacheLayer,
}

impl CacheService {
	pub fn local_only(capacity: usize, salt: impl Into<String>) -> Self {
		CacheService::LocalOnly { local: LocalCache::new(capacity), salt: salt.into() }
	}

	pub fn shared_backed_by_local(capacity: usize, shared: Arc<dyn SharedStore>, salt: impl Into<String>) -> Self {
		CacheService::SharedBackedByLocal { local: LocalCache::new(capacity), shared, salt: salt.into() }
	}

	fn key(&self, method: &str, params: &Value) -> String {
		let salt = match self {
			CacheService::LocalOnly { salt, .. } => salt,
			CacheService::SharedBackedByLocal { salt, .. } => salt,
		};
		build_key(salt, method, params)
	}

	/// Shared-first. A miss on the shared layer falls through to local, but
	/// a shared-store *error* (disconnected, timed out, protocol error) is
	/// reported as a cache miss outright — it never silently promotes a
	/// locally-cached value, which would make a disconnected shared store
	/// indistinguishable from a healthy one to the caller.
	pub async fn get(&self, method: &str, params: &Value) -> Option<CacheLookup> {
		let cache_key = self.key(method, params);
		match self {
			CacheService::LocalOnly { local, .. } => {
				local.get(&cache_key).map(|value| CacheLookup { value, layer: CacheLayer::Local })
			},
			CacheService::SharedBackedByLocal { local, shared, .. } => {
				match shared.get(&cache_key).await {
					Ok(Some(value)) => Some(CacheLookup { value, layer: CacheLayer::Shared }),
					Ok(None) => local.get(&cache_key).map(|value| CacheLookup { value, layer: CacheLayer::Local }),
					Err(err) => {
						log::warn!("shared cache get failed, reporting a miss rather than promoting a local value: {err}");
						None
					},
				}
			},
		}
	}

	/// Writes to local unconditionally; on `SharedBackedByLocal` also
	/// attempts the shared write, but a shared-store failure never
	/// prevents the local write from taking effect.
	pub async fn set(&self, method: &str, params: &Value, value: Value, ttl: Duration) {
		let cache_key = self.key(method, params);
		match self {
			CacheService::LocalOnly { local, .. } => local.set(cache_key, value, ttl),
			CacheService::SharedBackedByLocal { local, shared, .. } => {
				if let Err(err) = shared.set(&cache_key, &value, ttl).await {
					log::warn!("shared cache set failed, local layer still updated: {err}");
				}
				local.set(cache_key, value, ttl);
			},
		}
	}

	/// Writes several entries in one round trip to the shared layer
	/// (`RedisStore::multi_set` pipelines them), falling back to the same
	/// per-entry local write `set` uses on a shared-store failure. Used by
	/// collaborators that produce a batch of cacheable results together,
	/// e.g. the shared poller priming a just-seen block's receipts.
	pub async fn multi_set(&self, entries: &[(&str, &Value, Value)], ttl: Duration) {
		if entries.is_empty() {
			return;
		}
		match self {
			CacheService::LocalOnly { local, .. } => {
				for (method, params, value) in entries {
					local.set(self.key(method, params), value.clone(), ttl);
				}
			},
			CacheService::SharedBackedByLocal { local, shared, .. } => {
				let pairs: Vec<(String, Value)> =
					entries.iter().map(|(method, params, value)| (self.key(method, params), value.clone())).collect();
				if let Err(err) = shared.multi_set(&pairs, ttl).await {
					log::warn!("shared cache multi_set failed, local layer still updated: {err}");
				}
				for (cache_key, value) in pairs {
					local.set(cache_key, value, ttl);
				}
			},
		}
	}

	pub async fn delete(&self, method: &str, params: &Value) {
		let cache_key = self.key(method, params);
		match self {
			CacheService::LocalOnly { local, .. } => local.delete(&cache_key),
			CacheService::SharedBackedByLocal { local, shared, .. } => {
				if let Err(err) = shared.delete(&cache_key).await {
					log::warn!("shared cache delete failed: {err}");
				}
				local.delete(&cache_key);
			},
		}
	}

	pub async fn clear(&self) {
		match self {
			CacheService::LocalOnly { local, .. } => local.clear(),
			CacheService::SharedBackedByLocal { local, shared, .. } => {
				if let Err(err) = shared.clear().await {
					log::warn!("shared cache clear failed: {err}");
				}
				local.clear();
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::shared::SharedStoreError;
	use async_trait::async_trait;
	use serde_json::json;
	use std::sync::Mutex;

	struct FlakyStore {
		fail_gets: bool,
		fail_sets: bool,
		backing: Mutex<std::collections::HashMap<String, Value>>,
	}

	#[async_trait]
	impl SharedStore for FlakyStore {
		async fn get(&self, key: &str) -> Result<Option<Value>, SharedStoreError> {
			if self.fail_gets {
				return Err(SharedStoreError::Connection("down".into()));
			}
			Ok(self.backing.lock().unwrap().get(key).cloned())
		}
		async fn set(&self, key: &str, value: &Value, _ttl: Duration) -> Result<(), SharedStoreError> {
			if self.fail_sets {
				return Err(SharedStoreError::Connection("down".into()));
			}
			self.backing.lock().unwrap().insert(key.to_string(), value.clone());
			Ok(())
		}
		async fn multi_set(&self, pairs: &[(String, Value)], _ttl: Duration) -> Result<(), SharedStoreError> {
			if self.fail_sets {
				return Err(SharedStoreError::Connection("down".into()));
			}
			let mut backing = self.backing.lock().unwrap();
			for (key, value) in pairs {
				backing.insert(key.clone(), value.clone());
			}
			Ok(())
		}
		async fn delete(&self, key: &str) -> Result<(), SharedStoreError> {
			self.backing.lock().unwrap().remove(key);
			Ok(())
		}
		async fn clear(&self) -> Result<(), SharedStoreError> {
			self.backing.lock().unwrap().clear();
			Ok(())
		}
		async fn ping(&self) -> Result<(), SharedStoreError> {
			Ok(())
		}
	}

	#[tokio::test]
	async fn local_only_round_trips_without_a_shared_store() {
		let service = CacheService::local_only(10, "salt");
		service.set("eth_chainId", &json!([]), json!("0x127"), Duration::from_secs(30)).await;
		let hit = service.get("eth_chainId", &json!([])).await.expect("cache hit");
		assert_eq!(hit.value, json!("0x127"));
		assert_eq!(hit.layer, CacheLayer::Local);
	}

	#[tokio::test]
	async fn shared_hit_is_reported_as_the_shared_layer() {
		let store = Arc::new(FlakyStore { fail_gets: false, fail_sets: false, backing: Mutex::new(Default::default()) });
		let service = CacheService::shared_backed_by_local(10, store, "salt");
		service.set("eth_blockNumber", &json!([]), json!("0x10"), Duration::from_secs(30)).await;
		let hit = service.get("eth_blockNumber", &json!([])).await.expect("cache hit");
		assert_eq!(hit.layer, CacheLayer::Shared);
	}

	#[tokio::test]
	async fn shared_get_failure_is_reported_as_a_miss_not_a_promoted_local_value() {
		let store = Arc::new(FlakyStore { fail_gets: true, fail_sets: false, backing: Mutex::new(Default::default()) });
		let service = CacheService::shared_backed_by_local(10, store, "salt");
		// `set` still populates the local layer even though gets are flaky.
		service.set("eth_gasPrice", &json!([]), json!("0x1"), Duration::from_secs(30)).await;
		assert!(service.get("eth_gasPrice", &json!([])).await.is_none());
	}

	#[tokio::test]
	async fn multi_set_writes_every_entry_to_both_layers() {
		let store = Arc::new(FlakyStore { fail_gets: false, fail_sets: false, backing: Mutex::new(Default::default()) });
		let service = CacheService::shared_backed_by_local(10, store, "salt");
		let params_a = json!([]);
		let params_b = json!(["0x1"]);
		service
			.multi_set(&[("eth_chainId", &params_a, json!("0x127")), ("eth_getBlockByNumber", &params_b, json!("0x10"))], Duration::from_secs(30))
			.await;

		let first = service.get("eth_chainId", &params_a).await.expect("cache hit");
		assert_eq!(first.value, json!("0x127"));
		assert_eq!(first.layer, CacheLayer::Shared);
		let second = service.get("eth_getBlockByNumber", &params_b).await.expect("cache hit");
		assert_eq!(second.value, json!("0x10"));
	}

	#[tokio::test]
	async fn multi_set_shared_failure_still_updates_local() {
		let store = Arc::new(FlakyStore { fail_gets: false, fail_sets: true, backing: Mutex::new(Default::default()) });
		let service = CacheService::shared_backed_by_local(10, store, "salt");
		let params = json!([]);
		service.multi_set(&[("eth_gasPrice", &params, json!("0x1"))], Duration::from_secs(30)).await;
		let hit = service.get("eth_gasPrice", &params).await.expect("local fallback hit");
		assert_eq!(hit.layer, CacheLayer::Local);
	}

	#[tokio::test]
	async fn shared_set_failure_still_updates_local() {
		let store = Arc::new(FlakyStore { fail_gets: false, fail_sets: true, backing: Mutex::new(Default::default()) });
		let service = CacheService::shared_backed_by_local(10, store, "salt");
		service.set("eth_gasPrice", &json!([]), json!("0x1"), Duration::from_secs(30)).await;
		let hit = service.get("eth_gasPrice", &json!([])).await.expect("local still has it");
		assert_eq!(hit.layer, CacheLayer::Local);
	}
}
