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

//! Entry point: parse CLI flags over the environment-loaded config, install
//! the logger, and run the service. Mirrors the reference node client's
//! `main.rs` shape — all the real assembly work lives in `service::run`.

use clap::Parser;
use evm_relay_client::Cli;
use evm_relay_primitives::RelayConfig;

fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	let config = cli.run.apply(RelayConfig::from_env());

	if std::env::var("RUST_LOG").is_err() {
		std::env::set_var("RUST_LOG", &config.log_level);
	}
	env_logger::init();

	tokio::runtime::Builder::new_multi_thread().enable_all().build()?.block_on(evm_relay_client::run(config))
}
