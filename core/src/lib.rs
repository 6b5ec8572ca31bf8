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

//! Precheck, account locking, paymaster orchestration, and the
//! submission pipeline (distilled spec §4.3 – §4.6). The pipeline talks
//! to the backend collaborators exclusively through the traits in
//! [`collaborators`]; caching is the dispatcher's concern, layered on
//! top of this crate in `evm-relay-rpc`.

pub mod collaborators;
pub mod lock;
pub mod paymaster;
pub mod pipeline;
pub mod precheck;
pub mod testing;

pub use collaborators::{ConsensusClient, MirrorClient, StagedFileId, SubmissionOutcome};
pub use lock::{AccountLockGuard, AccountLockService};
pub use paymaster::Paymaster;
pub use pipeline::SubmissionPipeline;
