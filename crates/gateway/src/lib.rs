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

//! Keystone gateway
//!
//! Authentication and replay-protection gate in front of order-state logic.
//! Every mutating request must carry two independent proofs:
//!
//! - an HMAC over the HTTP request, keyed by the caller's API secret
//! - a wallet signature over the canonical intent, recoverable to the
//!   account's registered wallet address
//!
//! and must be fresh and never seen before. Only then is it forwarded as a
//! [`gate::VerifiedRequest`].
//!
//! The gate itself ([`gate::Gate`]) is transport-neutral; [`handlers`] and
//! [`routes`] adapt it to actix-web.

pub mod admission;
pub mod auth;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod gate;
pub mod handlers;
pub mod intent;
pub mod logging;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod server;

pub use admission::{DedupKey, MemoryReplayStore, ReplayError, ReplayGuard, ReplayStore};
pub use auth::{AuthContext, AuthError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::GatewayConfig;
pub use credentials::{ApiCredential, CredentialStore, MemoryCredentialStore, WalletIdentity};
pub use gate::{Gate, GateError, GateRequest, VerifiedRequest};
pub use intent::IntentError;
pub use router::{Acknowledgement, LoggingSink, OrderStateSink, RouterError};
pub use server::GatewayState;
