// Copyright 2025 itscheems
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

use anyhow::{Context, Result};
use keystone_gateway::{GatewayConfig, GatewayState, logging::init_logging, server};
use tracing::info;

#[actix_rt::main]
async fn main() -> Result<()> {
	// Initialize logging first
	init_logging()?;

	// An optional config file path as the only argument; GATEWAY_* variables win.
	let config = match std::env::args().nth(1) {
		Some(path) => GatewayConfig::from_file(&path),
		None => GatewayConfig::from_env(),
	}
	.context("Failed to load gateway configuration")?;

	info!(target: "server", "Starting Keystone Gateway on {}", config.bind_addr);

	let state = GatewayState::from_config(&config).context("Failed to initialize gateway")?;
	server::run(config, state).await
}
