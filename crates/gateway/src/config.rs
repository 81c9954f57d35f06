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

use std::{net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// Logging configuration constants
/// Default log level (can be overridden by RUST_LOG environment variable)
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log directory component name
pub const LOG_COMPONENT_NAME: &str = "gateway";

/// Default console output enabled (can be overridden by LOG_TO_CONSOLE environment variable)
pub const DEFAULT_LOG_TO_CONSOLE: bool = false;

// Server configuration constants
/// Default HTTP server bind address (can be overridden by GATEWAY_BIND_ADDR)
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Default maximum HTTP request body size in bytes (can be overridden by GATEWAY_MAX_BODY_BYTES)
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

// Replay protection configuration constants
/// Default replay window in milliseconds (can be overridden by GATEWAY_REPLAY_WINDOW_MS)
pub const DEFAULT_REPLAY_WINDOW_MS: u64 = 5 * 60 * 1000;

/// Default allowance for client clocks running ahead, in milliseconds
/// (can be overridden by GATEWAY_FUTURE_TOLERANCE_MS)
pub const DEFAULT_FUTURE_TOLERANCE_MS: u64 = 0;

/// Default replay cache maximum capacity in entries (can be overridden by GATEWAY_REPLAY_CACHE_MAX_CAPACITY)
pub const DEFAULT_REPLAY_CACHE_MAX_CAPACITY: u64 = 1_000_000;

/// Interval between replay cache maintenance runs
pub const REPLAY_EVICTION_INTERVAL_SECS: u64 = 30;

/// Gateway service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
	/// HTTP server bind address
	pub bind_addr: SocketAddr,
	/// Number of worker threads, defaults to the CPU count
	pub workers: Option<usize>,
	pub max_body_bytes: usize,
	pub replay_window_ms: u64,
	pub future_tolerance_ms: u64,
	pub replay_cache_max_capacity: u64,
	/// JSON file seeding the in-memory credential store
	pub credentials_file: Option<PathBuf>,
}

impl Default for GatewayConfig {
	fn default() -> Self {
		Self {
			bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
			workers: None,
			max_body_bytes: DEFAULT_MAX_BODY_BYTES,
			replay_window_ms: DEFAULT_REPLAY_WINDOW_MS,
			future_tolerance_ms: DEFAULT_FUTURE_TOLERANCE_MS,
			replay_cache_max_capacity: DEFAULT_REPLAY_CACHE_MAX_CAPACITY,
			credentials_file: None,
		}
	}
}

impl GatewayConfig {
	/// Load configuration from `GATEWAY_*` environment variables (and `.env`)
	pub fn from_env() -> Result<Self> {
		Self::load(None)
	}

	/// Load configuration from a file, with `GATEWAY_*` environment variables
	/// taking precedence
	pub fn from_file(path: &str) -> Result<Self> {
		Self::load(Some(path))
	}

	fn load(path: Option<&str>) -> Result<Self> {
		dotenv::dotenv().ok();

		let mut builder = config::Config::builder();
		if let Some(path) = path {
			builder = builder.add_source(config::File::with_name(path));
		}
		let cfg = builder
			.add_source(config::Environment::with_prefix("GATEWAY").try_parsing(true))
			.build()
			.context("Failed to build gateway configuration")?;

		let config: Self = cfg
			.try_deserialize()
			.context("Invalid gateway configuration")?;
		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<()> {
		if self.replay_window_ms == 0 {
			anyhow::bail!("replay_window_ms must be > 0");
		}
		if self.replay_cache_max_capacity == 0 {
			anyhow::bail!("replay_cache_max_capacity must be > 0");
		}
		if self.workers == Some(0) {
			anyhow::bail!("workers must be > 0");
		}
		Ok(())
	}

	pub fn workers(&self) -> usize {
		self.workers.unwrap_or_else(num_cpus::get)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = GatewayConfig::default();
		assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR.parse::<SocketAddr>().unwrap());
		assert_eq!(config.replay_window_ms, 300_000);
		assert_eq!(config.future_tolerance_ms, 0);
		assert!(config.workers() >= 1);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn test_from_file() {
		let path = std::env::temp_dir().join(format!("keystone-gateway-{}.json", std::process::id()));
		std::fs::write(
			&path,
			r#"{"bind_addr": "127.0.0.1:9000", "future_tolerance_ms": 1500, "workers": 2}"#,
		)
		.unwrap();

		let config = GatewayConfig::from_file(path.to_str().unwrap()).unwrap();
		std::fs::remove_file(&path).ok();

		assert_eq!(config.bind_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
		assert_eq!(config.future_tolerance_ms, 1500);
		assert_eq!(config.workers(), 2);
		assert_eq!(config.replay_window_ms, DEFAULT_REPLAY_WINDOW_MS);
	}

	#[test]
	fn test_zero_window_rejected() {
		let config = GatewayConfig {
			replay_window_ms: 0,
			..Default::default()
		};
		assert!(config.validate().is_err());
	}
}
