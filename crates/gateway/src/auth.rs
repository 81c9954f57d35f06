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

//! API-key authentication (HMAC gate)
//!
//! Every mutating request carries three headers:
//!
//! - `x-api-key`: identifies the [`ApiCredential`]
//! - `x-api-timestamp`: unix milliseconds, as sent
//! - `x-api-signature`: hex HMAC-SHA256 of
//!   `method|path|canonical_body|timestamp` keyed by the API secret
//!
//! Query-mode requests (cancellations) sign the path including the literal
//! query string; body-mode requests sign the bare path and the canonical body.
//!
//! # Enumeration resistance
//!
//! An unknown key and a wrong signature are distinct internally but collapse
//! to the same external response. Unknown keys are also run through the MAC
//! (against a throwaway secret) so both branches do the same work.

use hmac::Mac;
use keystone_sdk::{
	HEADER_API_KEY, HEADER_API_SIGNATURE, HEADER_API_TIMESTAMP, hmac_message,
	signing::HmacSha256,
};
use thiserror::Error;

use crate::credentials::{ApiCredential, CredentialStore};

/// Secret used to keep the unknown-key branch on the same code path
const UNKNOWN_KEY_SECRET: &[u8] = b"keystone-unknown-api-key";

/// Error types for API-key authentication
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
	#[error("Unknown API key")]
	UnknownApiKey,
	#[error("Invalid signature")]
	InvalidSignature,
}

/// Protocol-agnostic container for API-key authentication materials
///
/// Transport adapters build this from their own header representation; the
/// gate never touches HTTP types directly. Absent or non-UTF-8 values are
/// `None` and fail authentication downstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthContext<'a> {
	pub api_key: Option<&'a str>,
	pub signature: Option<&'a str>,
	pub timestamp: Option<&'a str>,
}

impl<'a> AuthContext<'a> {
	/// Extract materials from HTTP headers
	pub fn from_http(headers: &'a actix_web::http::header::HeaderMap) -> Self {
		let get = move |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
		Self {
			api_key: get(HEADER_API_KEY),
			signature: get(HEADER_API_SIGNATURE),
			timestamp: get(HEADER_API_TIMESTAMP),
		}
	}
}

/// Verify an HMAC signature in constant time.
///
/// Returns `true` iff `supplied_signature` is the hex HMAC-SHA256 of
/// `method|path|canonical_body|timestamp` under `secret`.
pub fn verify_hmac(
	method: &str,
	path: &str,
	canonical_body: &str,
	timestamp: &str,
	secret: &[u8],
	supplied_signature: &str,
) -> bool {
	let Ok(supplied) = hex::decode(supplied_signature.trim()) else {
		return false;
	};
	let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
		return false;
	};
	mac.update(hmac_message(method, path, canonical_body, timestamp).as_bytes());
	// verify_slice compares in constant time
	mac.verify_slice(&supplied).is_ok()
}

/// Look up the credential for the request and verify its HMAC signature
pub fn authenticate(
	store: &dyn CredentialStore,
	ctx: &AuthContext<'_>,
	method: &str,
	path: &str,
	canonical_body: &str,
) -> Result<ApiCredential, AuthError> {
	let credential = ctx.api_key.and_then(|key| store.api_credential(key));

	let secret = credential
		.as_ref()
		.map(|c| c.api_secret.as_slice())
		.unwrap_or(UNKNOWN_KEY_SECRET);
	let valid = verify_hmac(
		method,
		path,
		canonical_body,
		ctx.timestamp.unwrap_or_default(),
		secret,
		ctx.signature.unwrap_or_default(),
	);

	match credential {
		Some(credential) if valid => Ok(credential),
		Some(_) => Err(AuthError::InvalidSignature),
		None => Err(AuthError::UnknownApiKey),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::credentials::MemoryCredentialStore;
	use keystone_sdk::sign_hmac;

	const SECRET: &[u8] = b"s3cr3t";
	const METHOD: &str = "POST";
	const PATH: &str = "/api/v1/orders";
	const BODY: &str = r#"{"price":"30000","side":"BUY"}"#;
	const TIMESTAMP: &str = "1700000000000";

	fn valid_signature() -> String {
		sign_hmac(SECRET, METHOD, PATH, BODY, TIMESTAMP).unwrap()
	}

	fn flip_byte(s: &str, index: usize) -> String {
		let mut bytes = s.as_bytes().to_vec();
		bytes[index] ^= 0x01;
		String::from_utf8(bytes).unwrap()
	}

	#[test]
	fn test_valid_signature_accepted() {
		assert!(verify_hmac(
			METHOD,
			PATH,
			BODY,
			TIMESTAMP,
			SECRET,
			&valid_signature()
		));
	}

	#[test]
	fn test_uppercase_hex_accepted() {
		let signature = valid_signature().to_uppercase();
		assert!(verify_hmac(METHOD, PATH, BODY, TIMESTAMP, SECRET, &signature));
	}

	#[test]
	fn test_any_single_byte_flip_rejected() {
		let signature = valid_signature();

		for i in 0..METHOD.len() {
			assert!(!verify_hmac(&flip_byte(METHOD, i), PATH, BODY, TIMESTAMP, SECRET, &signature));
		}
		for i in 0..PATH.len() {
			assert!(!verify_hmac(METHOD, &flip_byte(PATH, i), BODY, TIMESTAMP, SECRET, &signature));
		}
		for i in 0..BODY.len() {
			assert!(!verify_hmac(METHOD, PATH, &flip_byte(BODY, i), TIMESTAMP, SECRET, &signature));
		}
		for i in 0..TIMESTAMP.len() {
			assert!(!verify_hmac(METHOD, PATH, BODY, &flip_byte(TIMESTAMP, i), SECRET, &signature));
		}
	}

	#[test]
	fn test_wrong_secret_rejected() {
		assert!(!verify_hmac(
			METHOD,
			PATH,
			BODY,
			TIMESTAMP,
			b"other-secret",
			&valid_signature()
		));
	}

	#[test]
	fn test_garbage_signatures_rejected() {
		for signature in ["", "zz", "abcd", &valid_signature()[..62]] {
			assert!(!verify_hmac(METHOD, PATH, BODY, TIMESTAMP, SECRET, signature));
		}
	}

	#[test]
	fn test_authenticate_distinguishes_internally() {
		let store = MemoryCredentialStore::new();
		store.issue(ApiCredential {
			api_key: "key-1".into(),
			api_secret: SECRET.to_vec(),
			owner_account_id: "acc-1".into(),
		});
		let signature = valid_signature();

		let ok = AuthContext {
			api_key: Some("key-1"),
			signature: Some(&signature),
			timestamp: Some(TIMESTAMP),
		};
		assert_eq!(
			authenticate(&store, &ok, METHOD, PATH, BODY).unwrap().owner_account_id,
			"acc-1"
		);

		let unknown = AuthContext {
			api_key: Some("key-2"),
			..ok
		};
		assert_eq!(
			authenticate(&store, &unknown, METHOD, PATH, BODY),
			Err(AuthError::UnknownApiKey)
		);

		let missing = AuthContext::default();
		assert_eq!(
			authenticate(&store, &missing, METHOD, PATH, BODY),
			Err(AuthError::UnknownApiKey)
		);

		let wrong_ts = AuthContext {
			timestamp: Some("1700000000001"),
			..ok
		};
		assert_eq!(
			authenticate(&store, &wrong_ts, METHOD, PATH, BODY),
			Err(AuthError::InvalidSignature)
		);
	}

	#[test]
	fn test_context_from_http_headers() {
		use actix_web::http::header::{HeaderMap, HeaderName, HeaderValue};

		let mut headers = HeaderMap::new();
		headers.insert(
			HeaderName::from_static("x-api-key"),
			HeaderValue::from_static("key-1"),
		);
		headers.insert(
			HeaderName::from_static("x-api-timestamp"),
			HeaderValue::from_static("1"),
		);

		let ctx = AuthContext::from_http(&headers);
		assert_eq!(ctx.api_key, Some("key-1"));
		assert_eq!(ctx.timestamp, Some("1"));
		assert_eq!(ctx.signature, None);
	}
}
