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

//! The dual-signature gate
//!
//! Every mutating request passes, in order and fail-fast:
//!
//! 1. Canonicalization of the body
//! 2. HMAC gate: API key + request signature
//! 3. Wallet-intent gate: the account's wallet signed this exact intent
//! 4. Replay guard: both timestamps fresh, intent not seen before
//!
//! A request reaches downstream order-state logic only as a
//! [`VerifiedRequest`]. A replay record is written only once every earlier
//! stage has passed, so a rejected request never burns its dedup key.

use std::{borrow::Cow, sync::Arc};

use actix_web::http::StatusCode;
use keystone_sdk::{
	Action, CanonicalError, FIELD_TIMESTAMP, Intent, SigningEnvelope, Transport, WalletAddress,
	canonicalize,
};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
	admission::{DedupKey, ReplayError, ReplayGuard, parse_timestamp, parse_timestamp_str},
	auth::{self, AuthContext, AuthError},
	clock::Clock,
	credentials::CredentialStore,
	intent::{self, IntentError},
};

/// Error types for the gate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
	#[error("Canonicalization failed: {0}")]
	Canonical(#[from] CanonicalError),
	#[error("Authentication failed: {0}")]
	Auth(#[from] AuthError),
	#[error("Intent verification failed: {0}")]
	Intent(#[from] IntentError),
	#[error("No wallet registered for account {0}")]
	WalletNotRegistered(String),
	#[error("Replay check failed: {0}")]
	Replay(#[from] ReplayError),
}

impl GateError {
	/// HTTP status of the external response
	pub fn status(&self) -> StatusCode {
		match self {
			GateError::Auth(_) => StatusCode::UNAUTHORIZED,
			GateError::Intent(IntentError::InvalidIntentSignature) | GateError::WalletNotRegistered(_) => {
				StatusCode::FORBIDDEN
			}
			GateError::Replay(ReplayError::StoreFull) => StatusCode::SERVICE_UNAVAILABLE,
			GateError::Canonical(_)
			| GateError::Intent(IntentError::MissingField(_))
			| GateError::Intent(IntentError::Malformed(_))
			| GateError::Replay(_) => StatusCode::BAD_REQUEST,
		}
	}

	/// Message of the external response
	///
	/// All 401 causes share one message so callers cannot tell an unknown key
	/// from a bad signature.
	pub fn public_message(&self) -> Cow<'static, str> {
		let message = match self {
			GateError::Auth(_) => "Invalid API key or signature.",
			GateError::Intent(IntentError::InvalidIntentSignature) | GateError::WalletNotRegistered(_) => {
				"Invalid message signature."
			}
			GateError::Canonical(_)
			| GateError::Intent(IntentError::MissingField(_))
			| GateError::Intent(IntentError::Malformed(_)) => "Missing required fields.",
			GateError::Replay(ReplayError::InvalidTimestampFormat) => {
				"Invalid timestamp format. Timestamp must be an integer in milliseconds."
			}
			GateError::Replay(ReplayError::TimestampTooOld { window_ms }) => {
				return Cow::Owned(format!(
					"Timestamp is too old. Requests must be sent within {}.",
					describe_window(*window_ms)
				));
			}
			GateError::Replay(ReplayError::TimestampInFuture) => "Timestamp cannot be in the future.",
			GateError::Replay(ReplayError::DuplicateRequest(action)) => duplicate_message(*action),
			GateError::Replay(ReplayError::StoreFull) => "Service temporarily unavailable.",
		};
		Cow::Borrowed(message)
	}

	/// Stage that rejected the request, for logs
	pub fn stage(&self) -> &'static str {
		match self {
			GateError::Canonical(_) => "canonicalize",
			GateError::Auth(_) => "hmac",
			GateError::Intent(_) | GateError::WalletNotRegistered(_) => "intent",
			GateError::Replay(_) => "replay",
		}
	}
}

/// Window length in the largest whole unit, e.g. "5 minutes"
fn describe_window(window_ms: u64) -> String {
	let (count, unit) = if window_ms % 60_000 == 0 {
		(window_ms / 60_000, "minute")
	} else if window_ms % 1_000 == 0 {
		(window_ms / 1_000, "second")
	} else {
		(window_ms, "millisecond")
	};
	let plural = if count == 1 { "" } else { "s" };
	format!("{count} {unit}{plural}")
}

fn duplicate_message(action: Action) -> &'static str {
	match action {
		Action::PlaceOrder => "Your order request is already received.",
		Action::CancelOrder | Action::CancelAllOrders => {
			"Your cancellation request is already received."
		}
		Action::Withdraw => "Your withdrawal request is already received.",
		Action::Transfer => "Your transfer request is already received.",
	}
}

/// Transport-neutral view of an inbound request
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
	/// Fixed by the route, never taken from the payload
	pub action: Action,
	pub method: &'a str,
	/// Path exactly as signed: bare path for body-mode actions, path plus the
	/// literal query string for query-mode actions
	pub signed_path: &'a str,
	/// Body object (body mode) or decoded query parameters (query mode)
	pub fields: Option<&'a Map<String, Value>>,
	pub auth: AuthContext<'a>,
}

/// A request that passed every stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedRequest {
	pub account_id: String,
	pub wallet_address: WalletAddress,
	pub action: Action,
	pub intent: Intent,
	/// Intent timestamp, unix milliseconds
	pub timestamp: u64,
}

/// The gate, shared across workers behind an `Arc`
#[derive(Clone)]
pub struct Gate {
	credentials: Arc<dyn CredentialStore>,
	clock: Arc<dyn Clock>,
	replay: ReplayGuard,
}

impl Gate {
	pub fn new(
		credentials: Arc<dyn CredentialStore>,
		clock: Arc<dyn Clock>,
		replay: ReplayGuard,
	) -> Self {
		Self {
			credentials,
			clock,
			replay,
		}
	}

	pub fn replay_guard(&self) -> &ReplayGuard {
		&self.replay
	}

	/// Run a request through every stage
	pub fn verify(&self, request: &GateRequest<'_>) -> Result<VerifiedRequest, GateError> {
		let result = self.run(request);
		match &result {
			Ok(verified) => info!(
				target: "gate",
				action = %verified.action,
				account_id = %verified.account_id,
				"Request admitted"
			),
			Err(e) => warn!(
				target: "gate",
				action = %request.action,
				stage = e.stage(),
				reason = %e,
				"Request rejected"
			),
		}
		result
	}

	fn run(&self, request: &GateRequest<'_>) -> Result<VerifiedRequest, GateError> {
		let empty = Map::new();
		let fields = request.fields.unwrap_or(&empty);

		// 1. Canonicalize. Query-mode actions carry no body.
		let canonical_body = match request.action.transport() {
			Transport::Body => canonicalize(request.fields)?,
			Transport::Query => String::new(),
		};

		// 2. HMAC gate
		let credential = auth::authenticate(
			self.credentials.as_ref(),
			&request.auth,
			request.method,
			request.signed_path,
			&canonical_body,
		)?;
		let account_id = credential.owner_account_id;

		// 3. Wallet-intent gate
		let claimed_signature = intent::wallet_signature(fields)?;
		let timestamp = match fields.get(FIELD_TIMESTAMP) {
			None | Some(Value::Null) => return Err(IntentError::MissingField(FIELD_TIMESTAMP).into()),
			Some(value) => parse_timestamp(value, request.action.transport())?,
		};
		let wallet = self
			.credentials
			.wallet_identity(&account_id)
			.ok_or_else(|| GateError::WalletNotRegistered(account_id.clone()))?;
		let intent = intent::verify_intent(
			request.action,
			fields,
			timestamp,
			claimed_signature,
			&wallet.wallet_address,
		)?;

		// 4. Replay guard. The header timestamp is HMAC-bound, so it is
		// held to the same window as the intent timestamp.
		let now = self.clock.now_millis();
		let header_timestamp = parse_timestamp_str(request.auth.timestamp.unwrap_or_default())?;
		self.replay.check_window(header_timestamp, now)?;

		let envelope = SigningEnvelope::new(intent, timestamp);
		let dedup_key = DedupKey::new(&account_id, &envelope);
		self.replay
			.admit(&account_id, request.action, &dedup_key, timestamp, now)?;

		Ok(VerifiedRequest {
			account_id,
			wallet_address: wallet.wallet_address,
			action: request.action,
			intent: envelope.intent,
			timestamp,
		})
	}
}
