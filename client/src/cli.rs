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

//! CLI flags, layered over the environment defaults in
//! `evm_relay_primitives::RelayConfig::from_env` (SPEC_FULL.md AMBIENT.3).
//! Every flag here is optional: an unset flag leaves the environment-or-
//! default value untouched.

use evm_relay_primitives::RelayConfig;

#[derive(Debug, clap::Parser)]
#[command(name = "evm-relay", about = "Ethereum JSON-RPC gateway")]
pub struct Cli {
	#[clap(flatten)]
	pub run: RunCmd,
}

#[derive(Debug, clap::Parser)]
pub struct RunCmd {
	/// Address the HTTP/WS listener binds on.
	#[clap(long)]
	pub server_host: Option<String>,

	/// Port the HTTP/WS listener binds on.
	#[clap(long)]
	pub server_port: Option<u16>,

	/// Mirror API base URL.
	#[clap(long)]
	pub mirror_node_base_url: Option<String>,

	/// Consensus submission endpoint base URL.
	#[clap(long)]
	pub consensus_node_base_url: Option<String>,

	/// Enables the shared Redis-backed cache layer.
	#[clap(long)]
	pub redis_enabled: bool,

	/// Redis connection URL, required when `--redis-enabled` is set.
	#[clap(long)]
	pub redis_url: Option<String>,

	/// Puts the gateway into read-only mode: every mutating method is
	/// rejected before it reaches the submission pipeline.
	#[clap(long)]
	pub read_only: bool,

	/// Enables the `debug_*` method family.
	#[clap(long)]
	pub debug_api_enabled: bool,

	/// Enables the `txpool_*` method family.
	#[clap(long)]
	pub txpool_api_enabled: bool,

	/// `RUST_LOG`-style log level, used when `RUST_LOG` itself is unset.
	#[clap(long)]
	pub log_level: Option<String>,
}

impl RunCmd {
	/// Applies this command's flags over an environment-loaded config,
	/// flag-by-flag, so any flag left unset preserves the environment or
	/// default value underneath.
	pub fn apply(&self, mut config: RelayConfig) -> RelayConfig {
		if let Some(host) = &self.server_host {
			config.server_host = host.clone();
		}
		if let Some(port) = self.server_port {
			config.server_port = port;
		}
		if let Some(url) = &self.mirror_node_base_url {
			config.mirror_node_base_url = url.clone();
		}
		if let Some(url) = &self.consensus_node_base_url {
			config.consensus_node_base_url = url.clone();
		}
		if self.redis_enabled {
			config.redis_enabled = true;
		}
		if let Some(url) = &self.redis_url {
			config.redis_url = Some(url.clone());
		}
		if self.read_only {
			config.read_only = true;
		}
		if self.debug_api_enabled {
			config.debug_api_enabled = true;
		}
		if self.txpool_api_enabled {
			config.txpool_api_enabled = true;
		}
		if let Some(level) = &self.log_level {
			config.log_level = level.clone();
		}
		config
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unset_flags_preserve_the_environment_config() {
		let run = RunCmd {
			server_host: None,
			server_port: None,
			mirror_node_base_url: None,
			consensus_node_base_url: None,
			redis_enabled: false,
			redis_url: None,
			read_only: false,
			debug_api_enabled: false,
			txpool_api_enabled: false,
			log_level: None,
		};
		let base = RelayConfig::default();
		let applied = run.apply(base.clone());
		assert_eq!(applied.server_host, base.server_host);
		assert!(!applied.read_only);
	}

	#[test]
	fn a_set_flag_overrides_the_default() {
		let run = RunCmd {
			server_host: None,
			server_port: Some(9000),
			mirror_node_base_url: None,
			consensus_node_base_url: None,
			redis_enabled: false,
			redis_url: None,
			read_only: true,
			debug_api_enabled: false,
			txpool_api_enabled: false,
			log_level: None,
		};
		let applied = run.apply(RelayConfig::default());
		assert_eq!(applied.server_port, 9000);
		assert!(applied.read_only);
	}
}
