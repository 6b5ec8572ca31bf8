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

//! Block tag parsing (distilled spec §6, "Block tag strings").

use crate::error::RelayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockTag {
	Latest,
	Pending,
	Safe,
	Finalized,
	Earliest,
	Number(u64),
}

impl BlockTag {
	pub fn parse(raw: &str) -> Result<Self, RelayError> {
		match raw {
			"latest" => Ok(BlockTag::Latest),
			"pending" => Ok(BlockTag::Pending),
			"safe" => Ok(BlockTag::Safe),
			"finalized" => Ok(BlockTag::Finalized),
			"earliest" => Ok(BlockTag::Earliest),
			hex if hex.starts_with("0x") => u64::from_str_radix(&hex[2..], 16)
				.map(BlockTag::Number)
				.map_err(|_| RelayError::InvalidParameter { index: 0, reason: "invalid block number".to_string() }),
			_ => Err(RelayError::InvalidParameter { index: 0, reason: "invalid block tag".to_string() }),
		}
	}

	/// The wire spelling this tag was (or would be) parsed from; used to
	/// build the cache key so `"latest"` and `"0x10"` never collide even
	/// if they happen to resolve to the same block.
	pub fn as_wire_str(&self) -> String {
		match self {
			BlockTag::Latest => "latest".to_string(),
			BlockTag::Pending => "pending".to_string(),
			BlockTag::Safe => "safe".to_string(),
			BlockTag::Finalized => "finalized".to_string(),
			BlockTag::Earliest => "earliest".to_string(),
			BlockTag::Number(n) => format!("{n:#x}"),
		}
	}

	pub fn is_cacheable(&self) -> bool {
		crate::cache_entry::block_tag_is_cacheable(&self.as_wire_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_every_named_tag() {
		assert_eq!(BlockTag::parse("latest").unwrap(), BlockTag::Latest);
		assert_eq!(BlockTag::parse("earliest").unwrap(), BlockTag::Earliest);
		assert_eq!(BlockTag::parse("0x10").unwrap(), BlockTag::Number(16));
	}

	#[test]
	fn rejects_garbage() {
		assert!(BlockTag::parse("soon").is_err());
		assert!(BlockTag::parse("0xzz").is_err());
	}

	#[test]
	fn earliest_and_numeric_tags_are_cacheable_mutable_tags_are_not() {
		assert!(BlockTag::Earliest.is_cacheable());
		assert!(BlockTag::Number(5).is_cacheable());
		assert!(!BlockTag::Latest.is_cacheable());
		assert!(!BlockTag::Pending.is_cacheable());
	}
}
