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

//! Keystone SDK
//!
//! Wire formats shared by clients and the gateway: action and intent types,
//! the canonicalizer, HMAC and wallet signing, and a signing HTTP client.
//! Anything that must be byte-identical on both sides of the connection
//! lives here.

pub mod canonical;
pub mod client;
pub mod signing;
pub mod types;

pub use canonical::{CanonicalError, CanonicalPayload, Scalar, canonicalize};
pub use client::{Client, ClientError, PreparedRequest, RequestSigner};
pub use signing::{
	SigningError, WalletAddress, hmac_message, recover_personal_signer, sign_hmac, sign_intent,
	signing_key_from_hex,
};
pub use types::*;
