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

//! Types shared across the gateway: the error taxonomy, the config
//! snapshot, the decoded transaction model, Mirror-API projections, and
//! the subscription/filter model. None of these types perform I/O.

pub mod account;
pub mod block;
pub mod block_tag;
pub mod cache_entry;
pub mod call_request;
pub mod config;
pub mod context;
pub mod error;
pub mod paymaster;
pub mod subscription;
pub mod transaction;

pub use account::AccountView;
pub use block::{Block, BlockTransactions, Log, TransactionReceipt};
pub use block_tag::BlockTag;
pub use cache_entry::{CacheEntry, CacheLayer};
pub use call_request::CallRequest;
pub use config::RelayConfig;
pub use context::RequestContext;
pub use error::{ErrorClass, RelayError};
pub use paymaster::PaymasterState;
pub use subscription::{LogFilter, SubscriptionKind, SubscriptionRecord, TopicSlot};
pub use transaction::{ChainTransaction, TxType};
