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

//! Logging initialization for the gateway
//!
//! # Configuration
//!
//! - `RUST_LOG`: filter directives (default: `info`), e.g.
//!   `RUST_LOG=gate=debug,gate::replay=trace,actix_web=info`
//! - `LOG_DIR`: root directory for log files (default: `{workspace_root}/logs`).
//!   Files go to `{LOG_DIR}/gateway/`.
//! - `LOG_TO_CONSOLE`: also write to stderr with ANSI colors when `true`, `1`
//!   or `yes` (default: off)
//!
//! # Targets
//!
//! | Target | Emitted by |
//! |---|---|
//! | `gate` | admission / rejection of every request |
//! | `gate::intent` | wallet signature recovery details |
//! | `gate::replay` | dedup hits |
//! | `server` | startup, configuration, access log |
//!
//! Files roll daily (UTC) as `gateway.{date}.log`, without ANSI colors.

use std::{
	env,
	path::{Path, PathBuf},
	sync::OnceLock,
};

use anyhow::{Context, Result};
use tracing::info;
use tracing_appender::{
	non_blocking,
	rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{DEFAULT_LOG_LEVEL, DEFAULT_LOG_TO_CONSOLE, LOG_COMPONENT_NAME};

// Flushes buffered file output on exit
static LOG_GUARD: OnceLock<non_blocking::WorkerGuard> = OnceLock::new();

/// Walk up from `start` to the first directory whose Cargo.toml declares a
/// `[workspace]`
fn find_workspace_root(start: &Path) -> Option<PathBuf> {
	start.ancestors().find_map(|dir| {
		let content = std::fs::read_to_string(dir.join("Cargo.toml")).ok()?;
		content.contains("[workspace]").then(|| dir.to_path_buf())
	})
}

fn log_root() -> PathBuf {
	if let Ok(dir) = env::var("LOG_DIR") {
		return PathBuf::from(dir);
	}
	let start = env::var("CARGO_MANIFEST_DIR")
		.map(PathBuf::from)
		.or_else(|_| env::current_dir())
		.unwrap_or_else(|_| PathBuf::from("."));
	find_workspace_root(&start)
		.unwrap_or(start)
		.join("logs")
}

fn flag_enabled(value: &str) -> bool {
	matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Initialize logging with daily-rolling file output and optional console output
pub fn init_logging() -> Result<()> {
	dotenv::dotenv().ok();

	let log_level = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
	let log_dir = log_root().join(LOG_COMPONENT_NAME);
	std::fs::create_dir_all(&log_dir)
		.with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

	let file_appender = RollingFileAppender::builder()
		.rotation(Rotation::DAILY)
		.filename_prefix(LOG_COMPONENT_NAME)
		.filename_suffix("log")
		.build(&log_dir)
		.with_context(|| {
			format!(
				"Failed to create rolling file appender in {}",
				log_dir.display()
			)
		})?;
	let (file_writer, guard) = non_blocking(file_appender);
	LOG_GUARD.set(guard).ok();

	let log_to_console = env::var("LOG_TO_CONSOLE")
		.map(|v| flag_enabled(&v))
		.unwrap_or(DEFAULT_LOG_TO_CONSOLE);

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

	let file_layer = fmt::layer()
		.with_writer(file_writer)
		.with_timer(fmt::time::UtcTime::rfc_3339())
		.with_thread_ids(true)
		.with_target(true)
		.with_ansi(false);

	// `Option<Layer>` is itself a layer; `None` is a no-op.
	let console_layer = log_to_console.then(|| {
		fmt::layer()
			.with_writer(std::io::stderr)
			.with_timer(fmt::time::UtcTime::rfc_3339())
			.with_thread_ids(true)
			.with_target(true)
			.with_ansi(true)
	});

	tracing_subscriber::registry()
		.with(filter)
		.with(file_layer)
		.with(console_layer)
		.try_init()
		.context("Failed to install tracing subscriber")?;

	info!(target: "server", "Log level: {}", log_level);
	info!(target: "server", "Log directory: {}", log_dir.display());
	if log_to_console {
		info!(target: "server", "Console output: enabled");
	}

	Ok(())
}
