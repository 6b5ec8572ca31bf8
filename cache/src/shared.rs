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

//! The shared (networked) cache layer. Behind the [`SharedStore`] trait so
//! the composite [`crate::CacheService`] can catch every connection,
//! timeout, or protocol error at this boundary and fall through to the
//! local layer (distilled spec §4.2).

use std::{
	sync::atomic::{AtomicBool, Ordering},
	time::Duration,
};

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum SharedStoreError {
	#[error("shared store connection error: {0}")]
	Connection(String),
	#[error("shared store protocol error: {0}")]
	Protocol(String),
}

#[async_trait]
pub trait SharedStore: Send + Sync {
	async fn get(&self, key: &str) -> Result<Option<Value>, SharedStoreError>;
	async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), SharedStoreError>;
	async fn multi_set(&self, pairs: &[(String, Value)], ttl: Duration) -> Result<(), SharedStoreError>;
	async fn delete(&self, key: &str) -> Result<(), SharedStoreError>;
	async fn clear(&self) -> Result<(), SharedStoreError>;
	async fn ping(&self) -> Result<(), SharedStoreError>;
}

/// Redis-backed implementation. `ConnectionManager` already retries
/// transient connection loss internally; the gateway adds its own
/// liveness bit on top via [`HealthProbe`] because callers need a
/// synchronous read of "was the shared store reachable last we checked"
/// without blocking on a fresh round-trip.
pub struct RedisStore {
	manager: ConnectionManager,
}

impl RedisStore {
	pub async fn connect(url: &str) -> Result<Self, SharedStoreError> {
		let client = redis::Client::open(url).map_err(|e| SharedStoreError::Connection(e.to_string()))?;
		let manager =
			ConnectionManager::new(client).await.map_err(|e| SharedStoreError::Connection(e.to_string()))?;
		Ok(RedisStore { manager })
	}
}

#[async_trait]
impl SharedStore for RedisStore {
	async fn get(&self, key: &str) -> Result<Option<Value>, SharedStoreError> {
		let mut conn = self.manager.clone();
		let raw: Option<String> =
			conn.get(key).await.map_err(|e| SharedStoreError::Protocol(e.to_string()))?;
		match raw {
			Some(s) => serde_json::from_str(&s)
				.map(Some)
				.map_err(|e| SharedStoreError::Protocol(e.to_string())),
			None => Ok(None),
		}
	}

	async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), SharedStoreError> {
		let mut conn = self.manager.clone();
		let encoded = serde_json::to_string(value).map_err(|e| SharedStoreError::Protocol(e.to_string()))?;
		let ttl_seconds = ttl.as_secs().max(1);
		conn.set_ex(key, encoded, ttl_seconds).await.map_err(|e| SharedStoreError::Connection(e.to_string()))
	}

	async fn multi_set(&self, pairs: &[(String, Value)], ttl: Duration) -> Result<(), SharedStoreError> {
		let mut conn = self.manager.clone();
		let ttl_seconds = ttl.as_secs().max(1);
		let mut pipeline = redis::pipe();
		for (key, value) in pairs {
			let encoded = serde_json::to_string(value).map_err(|e| SharedStoreError::Protocol(e.to_string()))?;
			pipeline.set_ex(key, encoded, ttl_seconds);
		}
		pipeline
			.query_async(&mut conn)
			.await
			.map_err(|e| SharedStoreError::Connection(e.to_string()))
	}

	async fn delete(&self, key: &str) -> Result<(), SharedStoreError> {
		let mut conn = self.manager.clone();
		conn.del(key).await.map_err(|e| SharedStoreError::Connection(e.to_string()))
	}

	async fn clear(&self) -> Result<(), SharedStoreError> {
		let mut conn = self.manager.clone();
		redis::cmd("FLUSHDB")
			.query_async(&mut conn)
			.await
			.map_err(|e| SharedStoreError::Connection(e.to_string()))
	}

	async fn ping(&self) -> Result<(), SharedStoreError> {
		let mut conn = self.manager.clone();
		redis::cmd("PING")
			.query_async::<_, String>(&mut conn)
			.await
			.map(|_| ())
			.map_err(|e| SharedStoreError::Connection(e.to_string()))
	}
}

/// The last known liveness outcome of the shared store, refreshed by a
/// background task on a fixed interval. Never blocks a read
/// (distilled §4.2, "it does not block reads").
#[derive(Clone)]
pub struct HealthProbe {
	healthy: std::sync::Arc<AtomicBool>,
}

impl HealthProbe {
	pub fn new() -> Self {
		HealthProbe { healthy: std::sync::Arc::new(AtomicBool::new(true)) }
	}

	pub fn is_healthy(&self) -> bool {
		self.healthy.load(Ordering::Relaxed)
	}

	/// Spawns the periodic probe task. Returns a handle the caller should
	/// keep alive for the lifetime of the process; dropping it aborts the
	/// probe.
	pub fn spawn(
		store: std::sync::Arc<dyn SharedStore>,
		interval: Duration,
	) -> (Self, tokio::task::JoinHandle<()>) {
		let probe = HealthProbe::new();
		let healthy = probe.healthy.clone();
		let handle = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			loop {
				ticker.tick().await;
				let outcome = store.ping().await.is_ok();
				healthy.store(outcome, Ordering::Relaxed);
				if !outcome {
					log::warn!("shared cache liveness probe failed");
				}
			}
		});
		(probe, handle)
	}
}

impl Default for HealthProbe {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;

	struct AlwaysFailingStore;

	#[async_trait]
	impl SharedStore for AlwaysFailingStore {
		async fn get(&self, _key: &str) -> Result<Option<Value>, SharedStoreError> {
			Err(SharedStoreError::Connection("down".into()))
		}
		async fn set(&self, _key: &str, _value: &Value, _ttl: Duration) -> Result<(), SharedStoreError> {
			Err(SharedStoreError::Connection("down".into()))
		}
		async fn multi_set(&self, _pairs: &[(String, Value)], _ttl: Duration) -> Result<(), SharedStoreError> {
			Err(SharedStoreError::Connection("down".into()))
		}
		async fn delete(&self, _key: &str) -> Result<(), SharedStoreError> {
			Err(SharedStoreError::Connection("down".into()))
		}
		async fn clear(&self) -> Result<(), SharedStoreError> {
			Err(SharedStoreError::Connection("down".into()))
		}
		async fn ping(&self) -> Result<(), SharedStoreError> {
			Err(SharedStoreError::Connection("down".into()))
		}
	}

	#[tokio::test]
	async fn probe_flips_unhealthy_after_a_failed_ping() {
		let store: Arc<dyn SharedStore> = Arc::new(AlwaysFailingStore);
		let (probe, handle) = HealthProbe::spawn(store, Duration::from_millis(5));
		tokio::time::sleep(Duration::from_millis(30)).await;
		assert!(!probe.is_healthy());
		handle.abort();
	}
}
