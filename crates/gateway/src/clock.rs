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

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Source of "now" for timestamp checks, in unix milliseconds
pub trait Clock: Send + Sync {
	fn now_millis(&self) -> u64;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now_millis(&self) -> u64 {
		// Pre-epoch clocks clamp to 0; every timestamp then reads as "in the future".
		u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
	}
}

/// Manually driven clock for deterministic tests and replays
#[derive(Debug, Default)]
pub struct ManualClock {
	now: AtomicU64,
}

impl ManualClock {
	pub fn new(now_millis: u64) -> Self {
		Self {
			now: AtomicU64::new(now_millis),
		}
	}

	pub fn set(&self, now_millis: u64) {
		self.now.store(now_millis, Ordering::SeqCst);
	}

	pub fn advance(&self, millis: u64) {
		self.now.fetch_add(millis, Ordering::SeqCst);
	}
}

impl Clock for ManualClock {
	fn now_millis(&self) -> u64 {
		self.now.load(Ordering::SeqCst)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_manual_clock() {
		let clock = ManualClock::new(1_000);
		assert_eq!(clock.now_millis(), 1_000);
		clock.advance(500);
		assert_eq!(clock.now_millis(), 1_500);
		clock.set(42);
		assert_eq!(clock.now_millis(), 42);
	}

	#[test]
	fn test_system_clock_is_after_2020() {
		assert!(SystemClock.now_millis() > 1_577_836_800_000);
	}
}
