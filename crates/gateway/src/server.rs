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

use std::{sync::Arc, time::Duration};

use actix_web::{App, HttpServer, web};
use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::{
	admission::ReplayGuard,
	clock::{Clock, SystemClock},
	config::{GatewayConfig, REPLAY_EVICTION_INTERVAL_SECS},
	credentials::{CredentialStore, MemoryCredentialStore},
	gate::Gate,
	middleware::AccessLog,
	router::{LoggingSink, OrderStateSink},
	routes::configure_routes,
};

/// State shared by all workers
#[derive(Clone)]
pub struct GatewayState {
	pub gate: Gate,
	pub sink: Arc<dyn OrderStateSink>,
}

impl GatewayState {
	pub fn new(gate: Gate, sink: Arc<dyn OrderStateSink>) -> Self {
		Self { gate, sink }
	}

	/// Production wiring: system clock, in-memory replay store, logging sink,
	/// credentials from the configured seed file
	pub fn from_config(config: &GatewayConfig) -> Result<Self> {
		let credentials: Arc<dyn CredentialStore> = match &config.credentials_file {
			Some(path) => Arc::new(MemoryCredentialStore::from_seed_file(path)?),
			None => {
				warn!(
					target: "server",
					"No credentials file configured; every request will be rejected"
				);
				Arc::new(MemoryCredentialStore::new())
			}
		};
		let clock: Arc<dyn Clock> = Arc::new(SystemClock);
		let replay = ReplayGuard::in_memory(
			config.replay_window_ms,
			config.future_tolerance_ms,
			config.replay_cache_max_capacity,
		);

		Ok(Self::new(
			Gate::new(credentials, clock, replay),
			Arc::new(LoggingSink::new()),
		))
	}
}

/// Periodically drop expired replay records
fn spawn_replay_eviction(replay: ReplayGuard) {
	actix_rt::spawn(async move {
		let mut interval =
			tokio::time::interval(Duration::from_secs(REPLAY_EVICTION_INTERVAL_SECS));
		loop {
			interval.tick().await;
			replay.evict_expired();
			debug!(
				target: "gate::replay",
				entries = replay.store().entry_count(),
				"Replay cache maintenance"
			);
		}
	});
}

/// Bind and run the HTTP server until shutdown
pub async fn run(config: GatewayConfig, state: GatewayState) -> Result<()> {
	let workers = config.workers();
	let max_body_bytes = config.max_body_bytes;

	info!(
		target: "server",
		"Replay window: {} ms, future tolerance: {} ms",
		config.replay_window_ms,
		config.future_tolerance_ms
	);

	spawn_replay_eviction(state.gate.replay_guard().clone());

	let data = web::Data::new(state);
	let server = HttpServer::new(move || {
		App::new()
			.wrap(AccessLog)
			.app_data(data.clone())
			.app_data(web::PayloadConfig::new(max_body_bytes))
			.configure(configure_routes)
	})
	.workers(workers)
	.bind(config.bind_addr)
	.with_context(|| format!("Failed to bind {}", config.bind_addr))?;

	info!(
		target: "server",
		"Gateway listening on {} with {} workers",
		config.bind_addr,
		workers
	);

	server.run().await.context("Gateway server terminated")?;
	Ok(())
}
