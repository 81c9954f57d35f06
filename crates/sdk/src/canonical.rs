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

//! Canonical serialization of request fields
//!
//! Both the HMAC message and the wallet-signed intent message are built from
//! the canonical form produced here. Client and server must agree on it
//! byte-for-byte, so the encoding is fixed:
//!
//! - Keys are sorted lexicographically (byte order), independent of the order
//!   in which the client transmitted them
//! - Compact JSON: no whitespace between tokens
//! - Scalars only: strings, integers and `null`
//! - An empty mapping canonicalizes to the empty string, not `{}`
//!
//! Prices and quantities travel as decimal strings. Floating-point numbers are
//! rejected outright because `0.1`, `0.10` and `1e-1` would otherwise produce
//! three different signed messages for the same value.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

/// Error types for canonicalization
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanonicalError {
	#[error("Malformed payload: field `{0}` is not a scalar")]
	MalformedPayload(String),
}

/// A single canonical field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
	Str(String),
	Int(i128),
	Empty,
}

impl Scalar {
	/// Convert a JSON value into a scalar, rejecting anything that has no
	/// single fixed textual representation.
	pub fn from_json(field: &str, value: &Value) -> Result<Self, CanonicalError> {
		match value {
			Value::String(s) => Ok(Scalar::Str(s.clone())),
			Value::Null => Ok(Scalar::Empty),
			Value::Number(n) => {
				if let Some(i) = n.as_i64() {
					Ok(Scalar::Int(i as i128))
				} else if let Some(u) = n.as_u64() {
					Ok(Scalar::Int(u as i128))
				} else {
					Err(CanonicalError::MalformedPayload(field.to_string()))
				}
			}
			Value::Bool(_) | Value::Array(_) | Value::Object(_) => {
				Err(CanonicalError::MalformedPayload(field.to_string()))
			}
		}
	}

	fn write_to(&self, out: &mut String) {
		match self {
			Scalar::Str(s) => out.push_str(&quote(s)),
			Scalar::Int(i) => out.push_str(&i.to_string()),
			Scalar::Empty => out.push_str("null"),
		}
	}
}

impl From<&str> for Scalar {
	fn from(value: &str) -> Self {
		Scalar::Str(value.to_string())
	}
}

impl From<String> for Scalar {
	fn from(value: String) -> Self {
		Scalar::Str(value)
	}
}

impl From<i64> for Scalar {
	fn from(value: i64) -> Self {
		Scalar::Int(value as i128)
	}
}

impl From<u64> for Scalar {
	fn from(value: u64) -> Self {
		Scalar::Int(value as i128)
	}
}

/// Field mapping with a fixed (sorted) iteration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalPayload {
	fields: BTreeMap<String, Scalar>,
}

impl CanonicalPayload {
	pub fn new() -> Self {
		Self::default()
	}

	/// Build a payload from parsed JSON fields
	pub fn from_json(fields: &Map<String, Value>) -> Result<Self, CanonicalError> {
		let mut payload = Self::new();
		for (key, value) in fields {
			payload.insert(key.clone(), Scalar::from_json(key, value)?);
		}
		Ok(payload)
	}

	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Scalar>) {
		self.fields.insert(key.into(), value.into());
	}

	pub fn with(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
		self.insert(key, value);
		self
	}

	pub fn get(&self, key: &str) -> Option<&Scalar> {
		self.fields.get(key)
	}

	pub fn len(&self) -> usize {
		self.fields.len()
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}

	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.fields.keys().map(String::as_str)
	}

	/// Serialize into the canonical string
	pub fn to_canonical_string(&self) -> String {
		if self.fields.is_empty() {
			return String::new();
		}

		let mut out = String::with_capacity(16 * self.fields.len());
		out.push('{');
		for (i, (key, value)) in self.fields.iter().enumerate() {
			if i > 0 {
				out.push(',');
			}
			out.push_str(&quote(key));
			out.push(':');
			value.write_to(&mut out);
		}
		out.push('}');
		out
	}
}

/// Canonicalize a request body.
///
/// `None` (no body) and an empty object both yield `""`.
pub fn canonicalize(body: Option<&Map<String, Value>>) -> Result<String, CanonicalError> {
	match body {
		None => Ok(String::new()),
		Some(fields) => Ok(CanonicalPayload::from_json(fields)?.to_canonical_string()),
	}
}

// JSON string escaping, delegated to serde_json so both sides escape identically.
fn quote(s: &str) -> String {
	Value::String(s.to_string()).to_string()
}
