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

//! Hand-off of verified requests to order-state logic

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::gate::VerifiedRequest;

/// Error types for the downstream hand-off
#[derive(Debug, Error)]
pub enum RouterError {
	#[error("Order-state component unavailable: {0}")]
	Unavailable(String),
	#[error("Rejected downstream: {0}")]
	Rejected(String),
}

/// Acknowledgement returned to the caller once a request is handed off
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Acknowledgement {
	pub status: &'static str,
	pub action: keystone_sdk::Action,
	/// Gateway-local sequence number of the hand-off
	pub sequence: u64,
}

/// Receiver of requests that passed the gate
///
/// Only [`VerifiedRequest`]s can be forwarded, so nothing reaches order-state
/// logic without both signatures and the replay check.
pub trait OrderStateSink: Send + Sync {
	fn forward(&self, request: VerifiedRequest) -> Result<Acknowledgement, RouterError>;
}

/// Sink that logs and acknowledges every request
#[derive(Debug, Default)]
pub struct LoggingSink {
	sequence: AtomicU64,
}

impl LoggingSink {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn forwarded(&self) -> u64 {
		self.sequence.load(Ordering::Relaxed)
	}
}

impl OrderStateSink for LoggingSink {
	fn forward(&self, request: VerifiedRequest) -> Result<Acknowledgement, RouterError> {
		let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
		info!(
			target: "server",
			sequence,
			action = %request.action,
			account_id = %request.account_id,
			wallet = %request.wallet_address,
			"Forwarded verified request"
		);
		Ok(Acknowledgement {
			status: "accepted",
			action: request.action,
			sequence,
		})
	}
}
