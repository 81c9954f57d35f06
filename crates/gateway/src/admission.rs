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

//! Replay protection for signed intents
//!
//! Two checks, in order:
//!
//! 1. **Freshness**: the intent timestamp must lie in
//!    `[now - window, now + future_tolerance]`.
//! 2. **Uniqueness**: the dedup key of an accepted intent is recorded and any
//!    later request with the same key is a duplicate, until the record expires.
//!
//! Records live at least `window + future_tolerance`, so anything still
//! fresh enough to pass (1) is guaranteed to hit its record in (2). A store
//! that has no room for a new record refuses the admission instead of
//! dropping a live one.
//!
//! The dedup key covers the account, the action and the canonical envelope
//! (which includes the timestamp). The wallet signature is not part of it:
//! two valid signatures over the same envelope are the same request.

use std::{
	fmt,
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
	time::{Duration, Instant},
};

use keystone_sdk::{Action, SigningEnvelope, Transport};
use moka::{Expiry, notification::RemovalCause, sync::Cache};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::{
	DEFAULT_FUTURE_TOLERANCE_MS, DEFAULT_REPLAY_CACHE_MAX_CAPACITY, DEFAULT_REPLAY_WINDOW_MS,
};

/// Error types for replay protection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
	#[error("Timestamp is not an integer number of milliseconds")]
	InvalidTimestampFormat,
	#[error("Timestamp is older than the {window_ms} ms window")]
	TimestampTooOld { window_ms: u64 },
	#[error("Timestamp is in the future")]
	TimestampInFuture,
	#[error("Duplicate {0} request")]
	DuplicateRequest(Action),
	#[error("Replay store is at capacity")]
	StoreFull,
}

/// Stable identifier of a signed intent
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(String);

impl DedupKey {
	pub fn new(account_id: &str, envelope: &SigningEnvelope) -> Self {
		let mut hasher = Sha256::new();
		// Length-prefix the account id so no two (account, envelope) pairs collide.
		hasher.update((account_id.len() as u64).to_be_bytes());
		hasher.update(account_id.as_bytes());
		hasher.update(envelope.action().as_str().as_bytes());
		hasher.update(envelope.canonical().as_bytes());
		Self(hex::encode(hasher.finalize()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for DedupKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Storage for seen dedup keys
///
/// `insert_if_absent` must be atomic across concurrent callers: for any key,
/// exactly one caller observes `Ok(true)` until the record expires. A record
/// must never be dropped before its TTL; a store without room returns
/// [`ReplayError::StoreFull`]. A shared backend (e.g. Redis `SET NX PX`) can
/// implement this for multi-instance deployments.
pub trait ReplayStore: Send + Sync {
	/// Record `key` for at least `ttl`. Returns `Ok(true)` if this call recorded it first.
	fn insert_if_absent(&self, key: &DedupKey, ttl: Duration) -> Result<bool, ReplayError>;

	/// Drop expired records
	fn evict_expired(&self);

	/// Approximate number of live records
	fn entry_count(&self) -> u64;
}

/// A seen dedup key
#[derive(Debug, Clone, Copy)]
struct ReplayRecord {
	/// Token of the call that created the record
	token: u64,
	ttl: Duration,
}

/// Per-record TTL, fixed at creation
struct RecordExpiry;

impl Expiry<String, ReplayRecord> for RecordExpiry {
	fn expire_after_create(
		&self,
		_key: &String,
		record: &ReplayRecord,
		_created_at: Instant,
	) -> Option<Duration> {
		Some(record.ttl)
	}
}

/// In-process replay store backed by `moka::sync::Cache`
///
/// - **Native TTL**: each record expires after the TTL it was inserted with,
///   and only expiry removes it
/// - **Fail closed**: at `max_capacity` live records, new keys are refused
///   with [`ReplayError::StoreFull`] until expired records are reclaimed
/// - **Atomic first-seen**: `get_with` plus a per-call token, no
///   check-then-insert window
///
/// The cache itself has no size bound: moka's size-based eviction would drop
/// live records and reopen their replay window. `live` counts records from
/// first insert until the removal listener sees them go. Concurrent inserts
/// may overshoot the limit by at most the number of racing callers.
pub struct MemoryReplayStore {
	cache: Cache<String, ReplayRecord>,
	next_token: AtomicU64,
	live: Arc<AtomicU64>,
	max_capacity: u64,
}

impl MemoryReplayStore {
	pub fn new(max_capacity: u64) -> Self {
		let live = Arc::new(AtomicU64::new(0));
		let released = live.clone();
		let cache = Cache::builder()
			.expire_after(RecordExpiry)
			.eviction_listener(move |_key, _record, _cause: RemovalCause| {
				let _ = released.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
					Some(n.saturating_sub(1))
				});
			})
			.build();

		Self {
			cache,
			next_token: AtomicU64::new(1),
			live,
			max_capacity,
		}
	}

	fn is_full(&self) -> bool {
		self.live.load(Ordering::Acquire) >= self.max_capacity
	}
}

impl fmt::Debug for MemoryReplayStore {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MemoryReplayStore")
			.field("live", &self.live.load(Ordering::Acquire))
			.field("max_capacity", &self.max_capacity)
			.finish()
	}
}

impl ReplayStore for MemoryReplayStore {
	/// `get_with(key, || token)` runs the init closure exactly once per
	/// missing key, even under contention; only the caller whose token got
	/// stored is first-seen. Tokens come from a monotonic counter, so they
	/// never collide within a TTL.
	fn insert_if_absent(&self, key: &DedupKey, ttl: Duration) -> Result<bool, ReplayError> {
		if self.is_full() {
			if self.cache.contains_key(key.as_str()) {
				return Ok(false);
			}
			// Reclaim expired records before refusing.
			self.cache.run_pending_tasks();
			if self.is_full() {
				return Err(ReplayError::StoreFull);
			}
		}

		let token = self.next_token.fetch_add(1, Ordering::Relaxed);
		let stored = self
			.cache
			.get_with(key.as_str().to_string(), || ReplayRecord { token, ttl });
		if stored.token != token {
			return Ok(false);
		}
		self.live.fetch_add(1, Ordering::AcqRel);
		Ok(true)
	}

	fn evict_expired(&self) {
		self.cache.run_pending_tasks();
	}

	fn entry_count(&self) -> u64 {
		self.live.load(Ordering::Acquire)
	}
}

/// Freshness window plus deduplication
#[derive(Clone)]
pub struct ReplayGuard {
	store: Arc<dyn ReplayStore>,
	window_ms: u64,
	future_tolerance_ms: u64,
}

impl ReplayGuard {
	pub fn new(store: Arc<dyn ReplayStore>, window_ms: u64, future_tolerance_ms: u64) -> Self {
		Self {
			store,
			window_ms,
			future_tolerance_ms,
		}
	}

	/// Guard over a fresh in-memory store sized for the given window
	pub fn in_memory(window_ms: u64, future_tolerance_ms: u64, max_capacity: u64) -> Self {
		let store = MemoryReplayStore::new(max_capacity);
		Self::new(Arc::new(store), window_ms, future_tolerance_ms)
	}

	pub fn window_ms(&self) -> u64 {
		self.window_ms
	}

	pub fn future_tolerance_ms(&self) -> u64 {
		self.future_tolerance_ms
	}

	pub fn store(&self) -> &Arc<dyn ReplayStore> {
		&self.store
	}

	/// Accept `timestamp` iff `now - window <= timestamp <= now + tolerance`
	pub fn check_window(&self, timestamp: u64, now: u64) -> Result<(), ReplayError> {
		if timestamp > now.saturating_add(self.future_tolerance_ms) {
			return Err(ReplayError::TimestampInFuture);
		}
		if now.saturating_sub(timestamp) > self.window_ms {
			return Err(ReplayError::TimestampTooOld {
				window_ms: self.window_ms,
			});
		}
		Ok(())
	}

	/// How long a dedup record must survive
	pub fn retention(&self) -> Duration {
		Duration::from_millis(self.window_ms.saturating_add(self.future_tolerance_ms))
	}

	/// Check freshness of `timestamp` and record `dedup_key` as seen.
	///
	/// Nothing is recorded when the timestamp check fails.
	pub fn admit(
		&self,
		account_id: &str,
		action: Action,
		dedup_key: &DedupKey,
		timestamp: u64,
		now: u64,
	) -> Result<(), ReplayError> {
		self.check_window(timestamp, now)?;

		if !self.store.insert_if_absent(dedup_key, self.retention())? {
			tracing::debug!(
				target: "gate::replay",
				account_id,
				dedup_key = %dedup_key,
				"Dedup key already admitted"
			);
			return Err(ReplayError::DuplicateRequest(action));
		}
		Ok(())
	}

	pub fn evict_expired(&self) {
		self.store.evict_expired();
	}
}

impl Default for ReplayGuard {
	fn default() -> Self {
		Self::in_memory(
			DEFAULT_REPLAY_WINDOW_MS,
			DEFAULT_FUTURE_TOLERANCE_MS,
			DEFAULT_REPLAY_CACHE_MAX_CAPACITY,
		)
	}
}

impl fmt::Debug for ReplayGuard {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ReplayGuard")
			.field("window_ms", &self.window_ms)
			.field("future_tolerance_ms", &self.future_tolerance_ms)
			.field("entries", &self.store.entry_count())
			.finish()
	}
}

/// Parse an intent timestamp as sent over `transport`.
///
/// A JSON body must carry a non-negative JSON integer. The query string
/// carries everything as text, so there a string of ASCII digits is accepted.
/// Floats, negatives, ISO-8601 dates and anything else are rejected.
pub fn parse_timestamp(value: &Value, transport: Transport) -> Result<u64, ReplayError> {
	match (value, transport) {
		(Value::Number(n), _) => n.as_u64().ok_or(ReplayError::InvalidTimestampFormat),
		(Value::String(s), Transport::Query) => parse_timestamp_str(s),
		_ => Err(ReplayError::InvalidTimestampFormat),
	}
}

/// Parse a timestamp carried as text, e.g. the `x-api-timestamp` header

pub fn parse_timestamp_str(s: &str) -> Result<u64, ReplayError> {
	if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
		return Err(ReplayError::InvalidTimestampFormat);
	}
	s.parse().map_err(|_| ReplayError::InvalidTimestampFormat)
}
