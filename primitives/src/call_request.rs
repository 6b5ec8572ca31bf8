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

//! The parameter object `eth_call`/`eth_estimateGas` accept. Execution
//! itself is the Mirror API's job (distilled spec §1 Non-goals, "no EVM
//! execution"); this is only the decoded request shape.

use ethereum_types::{H160, U256};

use crate::block_tag::BlockTag;

#[derive(Debug, Clone)]
pub struct CallRequest {
	pub from: Option<H160>,
	pub to: Option<H160>,
	pub gas: Option<u64>,
	pub gas_price: Option<U256>,
	pub value: Option<U256>,
	pub data: Vec<u8>,
	pub block_tag: BlockTag,
}
