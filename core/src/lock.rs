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

//! Per-sender mutual exclusion around submission (distilled spec §4.4).
//! Entries are created lazily on first submission and dropped once no
//! submission holds or waits on them; read-only RPC paths never touch
//! this map.

use std::sync::Arc;

use dashmap::DashMap;
use ethereum_types::H160;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Held for the duration of one submission attempt. Dropping it releases
/// the underlying per-address mutex.
pub struct AccountLockGuard {
	address: H160,
	_guard: OwnedMutexGuard<()>,
}

impl AccountLockGuard {
	pub fn address(&self) -> H160 {
		self.address
	}
}

/// Owns the `address -> mutex` map. A `DashMap` entry is never removed
/// while a lock is outstanding, so concurrent `acquire` calls for the
/// same address always observe the same mutex; stale entries for
/// addresses with no in-flight submission are harmless (a mutex with no
/// waiters costs a few words) and are not proactively evicted.
#[derive(Default)]
pub struct AccountLockService {
	locks: DashMap<H160, Arc<Mutex<()>>>,
}

impl AccountLockService {
	pub fn new() -> Self {
		AccountLockService::default()
	}

	/// Blocks until no other holder owns this address's lock. Read-only
	/// RPC handlers must never call this — only the submission pipeline
	/// does, strictly around precheck-with-nonce-read through
	/// submit-to-consensus.
	pub async fn acquire(&self, address: H160) -> AccountLockGuard {
		let mutex = self.locks.entry(address).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
		log::debug!("acquiring account lock for {address:#x}");
		let guard = mutex.lock_owned().await;
		log::debug!("acquired account lock for {address:#x}");
		AccountLockGuard { address, _guard: guard }
	}
}

impl Drop for AccountLockGuard {
	fn drop(&mut self) {
		log::debug!("released account lock for {:#x}", self.address);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	#[tokio::test]
	async fn a_second_acquire_for_the_same_address_waits_for_the_first_to_release() {
		let service = Arc::new(AccountLockService::new());
		let address = H160::repeat_byte(1);

		let first = service.acquire(address).await;
		let service_clone = service.clone();
		let second_acquired = tokio::spawn(async move {
			service_clone.acquire(address).await;
		});

		tokio::time::sleep(Duration::from_millis(20)).await;
		assert!(!second_acquired.is_finished());

		drop(first);
		tokio::time::timeout(Duration::from_millis(200), second_acquired)
			.await
			.expect("second acquire completes after release")
			.expect("task did not panic");
	}

	#[tokio::test]
	async fn locks_for_different_addresses_never_block_each_other() {
		let service = AccountLockService::new();
		let a = service.acquire(H160::repeat_byte(1)).await;
		let b = tokio::time::timeout(Duration::from_millis(50), service.acquire(H160::repeat_byte(2))).await;
		assert!(b.is_ok());
		drop(a);
	}
}
