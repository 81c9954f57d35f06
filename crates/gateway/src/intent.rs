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

//! Wallet-intent verification
//!
//! The API key proves who is calling; the wallet signature proves the account
//! holder authorized *this* action with *these* parameters. The gate rebuilds
//! the signed message itself from the action's fixed field set, so extra
//! fields a client sends are never covered by, nor able to influence, the
//! intent signature.

use keystone_sdk::{
	Action, CancelAllOrdersIntent, CancelOrderIntent, CanonicalError, FIELD_SIGNATURE, Intent,
	PlaceOrderIntent, SigningEnvelope, TransferIntent, Transport, WalletAddress, WithdrawIntent,
	recover_personal_signer,
};
use serde_json::{Map, Value};
use thiserror::Error;

/// Error types for wallet-intent verification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentError {
	#[error("Missing required field: {0}")]
	MissingField(&'static str),
	#[error("Invalid message signature")]
	InvalidIntentSignature,
	#[error(transparent)]
	Malformed(#[from] CanonicalError),
}

fn malformed(field: &str) -> IntentError {
	IntentError::Malformed(CanonicalError::MalformedPayload(field.to_string()))
}

fn required<'a>(fields: &'a Map<String, Value>, name: &'static str) -> Result<&'a Value, IntentError> {
	match fields.get(name) {
		None | Some(Value::Null) => Err(IntentError::MissingField(name)),
		Some(value) => Ok(value),
	}
}

fn string_field(fields: &Map<String, Value>, name: &'static str) -> Result<String, IntentError> {
	match required(fields, name)? {
		Value::String(s) => Ok(s.clone()),
		_ => Err(malformed(name)),
	}
}

/// Integer field. A JSON body must carry a JSON integer; the query string
/// delivers integers as decimal strings.
fn integer_field(
	fields: &Map<String, Value>,
	name: &'static str,
	transport: Transport,
) -> Result<i64, IntentError> {
	match (required(fields, name)?, transport) {
		(Value::Number(n), _) => n.as_i64().ok_or_else(|| malformed(name)),
		(Value::String(s), Transport::Query) => parse_integer(s).ok_or_else(|| malformed(name)),
		_ => Err(malformed(name)),
	}
}

/// Strict decimal integer: optional `-`, then ASCII digits only
fn parse_integer(s: &str) -> Option<i64> {
	let digits = s.strip_prefix('-').unwrap_or(s);
	if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}
	s.parse().ok()
}

/// Build the typed intent for `action` from loosely-typed request fields.
///
/// Only the action's own fields are read; anything else is ignored.
pub fn parse_intent(action: Action, fields: &Map<String, Value>) -> Result<Intent, IntentError> {
	let transport = action.transport();
	let intent = match action {
		Action::PlaceOrder => Intent::PlaceOrder(PlaceOrderIntent {
			ticker: string_field(fields, "ticker")?,
			side: string_field(fields, "side")?,
			order_type: string_field(fields, "order_type")?,
			quantity: string_field(fields, "quantity")?,
			quote_quantity: string_field(fields, "quote_quantity")?,
			price: string_field(fields, "price")?,
			time_in_force: integer_field(fields, "time_in_force", transport)?,
			expires_at: integer_field(fields, "expires_at", transport)?,
		}),
		Action::CancelOrder => Intent::CancelOrder(CancelOrderIntent {
			order_id: string_field(fields, "order_id")?,
		}),
		Action::CancelAllOrders => Intent::CancelAllOrders(CancelAllOrdersIntent {
			market: integer_field(fields, "market", transport)?,
		}),
		Action::Withdraw => Intent::Withdraw(WithdrawIntent {
			asset: string_field(fields, "asset")?,
			amount: string_field(fields, "amount")?,
			chain_id: integer_field(fields, "chain_id", transport)?,
		}),
		Action::Transfer => Intent::Transfer(TransferIntent {
			asset: string_field(fields, "asset")?,
			amount: string_field(fields, "amount")?,
			to_wallet_address: string_field(fields, "to_wallet_address")?,
		}),
	};
	Ok(intent)
}

/// The wallet signature carried alongside the intent fields
pub fn wallet_signature(fields: &Map<String, Value>) -> Result<&str, IntentError> {
	match required(fields, FIELD_SIGNATURE)? {
		Value::String(s) => Ok(s.as_str()),
		_ => Err(malformed(FIELD_SIGNATURE)),
	}
}

/// Verify that `claimed_signature` is the expected wallet's signature over
/// the canonical envelope of `action` built from `fields` and `timestamp`.
///
/// Returns the validated intent on success.
pub fn verify_intent(
	action: Action,
	fields: &Map<String, Value>,
	timestamp: u64,
	claimed_signature: &str,
	expected_wallet_address: &WalletAddress,
) -> Result<Intent, IntentError> {
	let envelope = SigningEnvelope::new(parse_intent(action, fields)?, timestamp);
	let message = envelope.canonical();

	let recovered = recover_personal_signer(message.as_bytes(), claimed_signature).map_err(|e| {
		tracing::debug!(target: "gate::intent", error = %e, "Wallet signature recovery failed");
		IntentError::InvalidIntentSignature
	})?;

	// Byte comparison of the decoded addresses, so hex case never matters.
	if recovered != *expected_wallet_address {
		return Err(IntentError::InvalidIntentSignature);
	}

	Ok(envelope.intent)
}

#[cfg(test)]
mod tests {
	use super::*;
	use keystone_sdk::{sign_intent, signing_key_from_hex};
	use serde_json::json;

	const WALLET_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
	const OTHER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
	const TS: u64 = 1_700_000_000_000;

	fn object(value: Value) -> Map<String, Value> {
		match value {
			Value::Object(map) => map,
			other => panic!("expected object, got {other}"),
		}
	}

	fn place_order_fields() -> Map<String, Value> {
		object(json!({
			"ticker": "BTC_USDT",
			"side": "BUY",
			"order_type": "LIMIT",
			"quantity": "0.1",
			"quote_quantity": "",
			"price": "30000",
			"time_in_force": 0,
			"expires_at": 0,
			"timestamp": TS,
		}))
	}

	fn sign(key_hex: &str, action: Action, fields: &Map<String, Value>) -> String {
		let key = signing_key_from_hex(key_hex).unwrap();
		let intent = parse_intent(action, fields).unwrap();
		sign_intent(&key, &SigningEnvelope::new(intent, TS)).unwrap()
	}

	fn address(key_hex: &str) -> WalletAddress {
		WalletAddress::from_signing_key(&signing_key_from_hex(key_hex).unwrap())
	}

	#[test]
	fn test_valid_intent_signature() {
		let fields = place_order_fields();
		let signature = sign(WALLET_KEY, Action::PlaceOrder, &fields);

		let intent = verify_intent(
			Action::PlaceOrder,
			&fields,
			TS,
			&signature,
			&address(WALLET_KEY),
		)
		.unwrap();
		assert_eq!(intent.action(), Action::PlaceOrder);
	}

	#[test]
	fn test_other_wallet_rejected() {
		let fields = place_order_fields();
		let signature = sign(WALLET_KEY, Action::PlaceOrder, &fields);

		assert_eq!(
			verify_intent(
				Action::PlaceOrder,
				&fields,
				TS,
				&signature,
				&address(OTHER_KEY)
			),
			Err(IntentError::InvalidIntentSignature)
		);
	}

	#[test]
	fn test_tampered_field_rejected() {
		let fields = place_order_fields();
		let signature = sign(WALLET_KEY, Action::PlaceOrder, &fields);

		let mut tampered = fields.clone();
		tampered.insert("price".into(), json!("1"));
		assert_eq!(
			verify_intent(
				Action::PlaceOrder,
				&tampered,
				TS,
				&signature,
				&address(WALLET_KEY)
			),
			Err(IntentError::InvalidIntentSignature)
		);
	}

	#[test]
	fn test_signature_bound_to_action_and_timestamp() {
		let fields = object(json!({"order_id": "ord-1"}));
		let signature = sign(WALLET_KEY, Action::CancelOrder, &fields);
		let wallet = address(WALLET_KEY);

		assert!(verify_intent(Action::CancelOrder, &fields, TS, &signature, &wallet).is_ok());
		assert_eq!(
			verify_intent(Action::CancelOrder, &fields, TS + 1, &signature, &wallet),
			Err(IntentError::InvalidIntentSignature)
		);
	}

	#[test]
	fn test_extra_fields_ignored() {
		let fields = object(json!({"order_id": "ord-1"}));
		let signature = sign(WALLET_KEY, Action::CancelOrder, &fields);

		let mut noisy = fields.clone();
		noisy.insert("client_note".into(), json!("hello"));
		assert!(
			verify_intent(
				Action::CancelOrder,
				&noisy,
				TS,
				&signature,
				&address(WALLET_KEY)
			)
			.is_ok()
		);
	}

	#[test]
	fn test_missing_fields() {
		let mut fields = place_order_fields();
		fields.remove("expires_at");
		assert_eq!(
			parse_intent(Action::PlaceOrder, &fields),
			Err(IntentError::MissingField("expires_at"))
		);

		let null_order = object(json!({"order_id": null}));
		assert_eq!(
			parse_intent(Action::CancelOrder, &null_order),
			Err(IntentError::MissingField("order_id"))
		);

		assert_eq!(
			wallet_signature(&Map::new()),
			Err(IntentError::MissingField("signature"))
		);
	}

	#[test]
	fn test_integer_fields_accept_query_strings() {
		let query = object(json!({"market": "7"}));
		assert_eq!(
			parse_intent(Action::CancelAllOrders, &query),
			Ok(Intent::CancelAllOrders(CancelAllOrdersIntent { market: 7 }))
		);

		for bad in [json!("7.0"), json!("+7"), json!(""), json!(7.5), json!(true)] {
			let fields = object(json!({ "market": bad }));
			assert!(matches!(
				parse_intent(Action::CancelAllOrders, &fields),
				Err(IntentError::Malformed(_))
			));
		}
	}

	#[test]
	fn test_body_integer_fields_reject_strings() {
		let fields = object(json!({"asset": "USDT", "amount": "10", "chain_id": "1"}));
		assert_eq!(
			parse_intent(Action::Withdraw, &fields),
			Err(malformed("chain_id"))
		);

		let mut order = place_order_fields();
		order.insert("time_in_force".into(), json!("0"));
		assert_eq!(
			parse_intent(Action::PlaceOrder, &order),
			Err(malformed("time_in_force"))
		);
	}

	#[test]
	fn test_string_fields_reject_numbers() {
		let fields = object(json!({"asset": "USDT", "amount": 10, "chain_id": 1}));
		assert!(matches!(
			parse_intent(Action::Withdraw, &fields),
			Err(IntentError::Malformed(CanonicalError::MalformedPayload(field))) if field == "amount"
		));
	}

	#[test]
	fn test_garbage_signature_is_intent_failure() {
		let fields = object(json!({"order_id": "ord-1"}));
		assert_eq!(
			verify_intent(
				Action::CancelOrder,
				&fields,
				TS,
				"0xdeadbeef",
				&address(WALLET_KEY)
			),
			Err(IntentError::InvalidIntentSignature)
		);
	}
}
