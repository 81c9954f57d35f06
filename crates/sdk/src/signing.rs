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

//! Request signing primitives
//!
//! Two independent signatures protect every mutating request:
//!
//! - **HMAC-SHA256** over `method|path|canonical_body|timestamp`, keyed by the
//!   API secret. Proves possession of the API credential.
//! - **Wallet signature** (secp256k1, recoverable) over the canonical
//!   [`SigningEnvelope`], using the Ethereum personal-message convention
//!   (EIP-191). Proves the account's wallet authorized this exact intent.

use std::{fmt, str::FromStr};

use hmac::{Hmac, Mac};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha256;
use sha3::{Digest, Keccak256};
use thiserror::Error;

use crate::types::SigningEnvelope;

pub type HmacSha256 = Hmac<Sha256>;

/// Prefix of the EIP-191 personal message (version 0x45)
const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SigningError {
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	#[error("Signature format error: {0}")]
	SignatureFormat(String),
	#[error("Signing error: {0}")]
	Signing(String),
	#[error("Address recovery failed: {0}")]
	Recovery(String),
	#[error("Invalid wallet address: {0}")]
	InvalidAddress(String),
}

/// 20-byte account address derived from a secp256k1 public key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WalletAddress([u8; 20]);

impl WalletAddress {
	pub fn from_bytes(bytes: [u8; 20]) -> Self {
		Self(bytes)
	}

	pub fn as_bytes(&self) -> &[u8; 20] {
		&self.0
	}

	/// keccak256 of the uncompressed public key (without the 0x04 tag), last 20 bytes
	pub fn from_verifying_key(key: &VerifyingKey) -> Self {
		let point = key.to_encoded_point(false);
		let hash = keccak256(&point.as_bytes()[1..]);
		let mut address = [0u8; 20];
		address.copy_from_slice(&hash[12..]);
		Self(address)
	}

	pub fn from_signing_key(key: &SigningKey) -> Self {
		Self::from_verifying_key(key.verifying_key())
	}
}

impl FromStr for WalletAddress {
	type Err = SigningError;

	/// Parses with or without `0x`; hex case is ignored (no EIP-55 checksum enforcement)
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let trimmed = s.trim();
		let hex_part = trimmed
			.strip_prefix("0x")
			.or_else(|| trimmed.strip_prefix("0X"))
			.unwrap_or(trimmed);
		if hex_part.len() != 40 {
			return Err(SigningError::InvalidAddress(s.to_string()));
		}
		let mut bytes = [0u8; 20];
		hex::decode_to_slice(hex_part, &mut bytes)
			.map_err(|_| SigningError::InvalidAddress(s.to_string()))?;
		Ok(Self(bytes))
	}
}

impl fmt::Display for WalletAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{}", hex::encode(self.0))
	}
}

impl Serialize for WalletAddress {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for WalletAddress {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
	let mut hasher = Keccak256::new();
	hasher.update(data);
	hasher.finalize().into()
}

/// Digest of an EIP-191 personal message
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
	let mut hasher = Keccak256::new();
	hasher.update(PERSONAL_MESSAGE_PREFIX.as_bytes());
	hasher.update(message.len().to_string().as_bytes());
	hasher.update(message);
	hasher.finalize().into()
}

/// The string covered by the HMAC signature
pub fn hmac_message(method: &str, path: &str, canonical_body: &str, timestamp: &str) -> String {
	let mut message = String::with_capacity(
		method.len() + path.len() + canonical_body.len() + timestamp.len() + 3,
	);
	message.push_str(method);
	message.push('|');
	message.push_str(path);
	message.push('|');
	message.push_str(canonical_body);
	message.push('|');
	message.push_str(timestamp);
	message
}

/// Compute the hex HMAC-SHA256 signature a client sends in `x-api-signature`
pub fn sign_hmac(
	secret: &[u8],
	method: &str,
	path: &str,
	canonical_body: &str,
	timestamp: &str,
) -> Result<String, SigningError> {
	let mut mac =
		HmacSha256::new_from_slice(secret).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
	mac.update(hmac_message(method, path, canonical_body, timestamp).as_bytes());
	Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Parse a hex-encoded secp256k1 private key (with or without `0x`)
pub fn signing_key_from_hex(private_key: &str) -> Result<SigningKey, SigningError> {
	let hex_part = private_key.strip_prefix("0x").unwrap_or(private_key);
	let bytes = hex::decode(hex_part).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
	SigningKey::from_slice(&bytes).map_err(|e| SigningError::InvalidKey(e.to_string()))
}

/// Sign an arbitrary message as an EIP-191 personal message.
///
/// Returns `0x` + hex(r || s || v) with `v` in {27, 28}.
pub fn sign_personal_message(key: &SigningKey, message: &[u8]) -> Result<String, SigningError> {
	let digest = personal_message_hash(message);
	let (signature, recovery_id) = key
		.sign_prehash_recoverable(&digest)
		.map_err(|e| SigningError::Signing(e.to_string()))?;

	let mut bytes = [0u8; 65];
	bytes[..64].copy_from_slice(&signature.to_bytes());
	bytes[64] = recovery_id.to_byte() + 27;
	Ok(format!("0x{}", hex::encode(bytes)))
}

/// Sign the canonical form of an intent envelope
pub fn sign_intent(key: &SigningKey, envelope: &SigningEnvelope) -> Result<String, SigningError> {
	sign_personal_message(key, envelope.canonical().as_bytes())
}

/// Recover the address that produced `signature` over an EIP-191 personal message
pub fn recover_personal_signer(
	message: &[u8],
	signature: &str,
) -> Result<WalletAddress, SigningError> {
	let hex_part = signature.strip_prefix("0x").unwrap_or(signature);
	let bytes =
		hex::decode(hex_part).map_err(|e| SigningError::SignatureFormat(e.to_string()))?;
	if bytes.len() != 65 {
		return Err(SigningError::SignatureFormat(format!(
			"expected 65 bytes, got {}",
			bytes.len()
		)));
	}

	// Wallets emit v as 27/28; some libraries emit the raw 0/1 parity.
	let v = match bytes[64] {
		27 | 28 => bytes[64] - 27,
		0 | 1 => bytes[64],
		other => {
			return Err(SigningError::SignatureFormat(format!(
				"invalid recovery byte: {}",
				other
			)));
		}
	};
	let recovery_id = RecoveryId::from_byte(v)
		.ok_or_else(|| SigningError::SignatureFormat(format!("invalid recovery id: {}", v)))?;
	let signature = Signature::from_slice(&bytes[..64])
		.map_err(|e| SigningError::SignatureFormat(e.to_string()))?;

	let digest = personal_message_hash(message);
	let key = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
		.map_err(|e| SigningError::Recovery(e.to_string()))?;
	Ok(WalletAddress::from_verifying_key(&key))
}
