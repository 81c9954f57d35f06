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

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::canonical::CanonicalPayload;

/// Mutating actions that require a wallet-signed intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
	PlaceOrder,
	CancelOrder,
	CancelAllOrders,
	Withdraw,
	Transfer,
}

/// Where a request carries its signed fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
	/// JSON body; HMAC covers the bare path and the canonical body
	Body,
	/// Query string; HMAC covers the path with the literal query string
	Query,
}

impl Action {
	pub const ALL: [Action; 5] = [
		Action::PlaceOrder,
		Action::CancelOrder,
		Action::CancelAllOrders,
		Action::Withdraw,
		Action::Transfer,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			Action::PlaceOrder => "PLACE_ORDER",
			Action::CancelOrder => "CANCEL_ORDER",
			Action::CancelAllOrders => "CANCEL_ALL_ORDERS",
			Action::Withdraw => "WITHDRAW",
			Action::Transfer => "TRANSFER",
		}
	}

	/// Fields the signed envelope is built from, `timestamp` included
	pub fn required_fields(&self) -> &'static [&'static str] {
		match self {
			Action::PlaceOrder => &[
				"ticker",
				"side",
				"order_type",
				"quantity",
				"quote_quantity",
				"price",
				"time_in_force",
				"expires_at",
				"timestamp",
			],
			Action::CancelOrder => &["order_id", "timestamp"],
			Action::CancelAllOrders => &["market", "timestamp"],
			Action::Withdraw => &["asset", "amount", "chain_id", "timestamp"],
			Action::Transfer => &["asset", "amount", "to_wallet_address", "timestamp"],
		}
	}

	pub fn transport(&self) -> Transport {
		match self {
			Action::CancelOrder | Action::CancelAllOrders => Transport::Query,
			Action::PlaceOrder | Action::Withdraw | Action::Transfer => Transport::Body,
		}
	}

	/// HTTP method of the endpoint serving this action
	pub fn method(&self) -> &'static str {
		match self.transport() {
			Transport::Body => "POST",
			Transport::Query => "DELETE",
		}
	}

	/// Endpoint path, without query string
	pub fn path(&self) -> &'static str {
		match self {
			Action::PlaceOrder | Action::CancelOrder => "/api/v1/orders",
			Action::CancelAllOrders => "/api/v1/orders/all",
			Action::Withdraw => "/api/v1/withdrawals",
			Action::Transfer => "/api/v1/transfers",
		}
	}
}

/// Header carrying the API key
pub const HEADER_API_KEY: &str = "x-api-key";

/// Header carrying the hex HMAC signature
pub const HEADER_API_SIGNATURE: &str = "x-api-signature";

/// Header carrying the millisecond timestamp covered by the HMAC
pub const HEADER_API_TIMESTAMP: &str = "x-api-timestamp";

/// Body/query field carrying the wallet signature
pub const FIELD_SIGNATURE: &str = "signature";

/// Body/query field carrying the signed intent timestamp
pub const FIELD_TIMESTAMP: &str = "timestamp";

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
	type Err = UnknownAction;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Action::ALL
			.into_iter()
			.find(|action| action.as_str() == s)
			.ok_or_else(|| UnknownAction(s.to_string()))
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderIntent {
	/// Market ticker (e.g., "BTC_USDT")
	pub ticker: String,
	pub side: String,
	pub order_type: String,
	/// Decimal string
	pub quantity: String,
	/// Decimal string, empty when the order is sized by `quantity`
	pub quote_quantity: String,
	/// Decimal string
	pub price: String,
	pub time_in_force: i64,
	/// Expiry in milliseconds, 0 for none
	pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrderIntent {
	pub order_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelAllOrdersIntent {
	/// Numeric market identifier
	pub market: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawIntent {
	pub asset: String,
	pub amount: String,
	pub chain_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferIntent {
	pub asset: String,
	pub amount: String,
	pub to_wallet_address: String,
}

/// Action-specific business fields, one variant per action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Intent {
	PlaceOrder(PlaceOrderIntent),
	CancelOrder(CancelOrderIntent),
	CancelAllOrders(CancelAllOrdersIntent),
	Withdraw(WithdrawIntent),
	Transfer(TransferIntent),
}

impl Intent {
	pub fn action(&self) -> Action {
		match self {
			Intent::PlaceOrder(_) => Action::PlaceOrder,
			Intent::CancelOrder(_) => Action::CancelOrder,
			Intent::CancelAllOrders(_) => Action::CancelAllOrders,
			Intent::Withdraw(_) => Action::Withdraw,
			Intent::Transfer(_) => Action::Transfer,
		}
	}

	/// Business fields only (no `action`, no `timestamp`)
	pub fn payload(&self) -> CanonicalPayload {
		match self {
			Intent::PlaceOrder(o) => CanonicalPayload::new()
				.with("ticker", o.ticker.as_str())
				.with("side", o.side.as_str())
				.with("order_type", o.order_type.as_str())
				.with("quantity", o.quantity.as_str())
				.with("quote_quantity", o.quote_quantity.as_str())
				.with("price", o.price.as_str())
				.with("time_in_force", o.time_in_force)
				.with("expires_at", o.expires_at),
			Intent::CancelOrder(c) => CanonicalPayload::new().with("order_id", c.order_id.as_str()),
			Intent::CancelAllOrders(c) => CanonicalPayload::new().with("market", c.market),
			Intent::Withdraw(w) => CanonicalPayload::new()
				.with("asset", w.asset.as_str())
				.with("amount", w.amount.as_str())
				.with("chain_id", w.chain_id),
			Intent::Transfer(t) => CanonicalPayload::new()
				.with("asset", t.asset.as_str())
				.with("amount", t.amount.as_str())
				.with("to_wallet_address", t.to_wallet_address.as_str()),
		}
	}
}

/// The message a wallet signs: intent fields plus `action` and `timestamp`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningEnvelope {
	pub intent: Intent,
	/// Unix milliseconds
	pub timestamp: u64,
}

impl SigningEnvelope {
	pub fn new(intent: Intent, timestamp: u64) -> Self {
		Self { intent, timestamp }
	}

	pub fn action(&self) -> Action {
		self.intent.action()
	}

	pub fn payload(&self) -> CanonicalPayload {
		self.intent
			.payload()
			.with("action", self.action().as_str())
			.with("timestamp", self.timestamp)
	}

	/// Canonical string that is hashed and signed
	pub fn canonical(&self) -> String {
		self.payload().to_canonical_string()
	}
}

/// Signatures attached to a single request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSignature {
	/// Hex HMAC-SHA256, sent in `x-api-signature`
	pub hmac_signature: String,
	/// 0x-prefixed 65-byte recoverable signature, sent as `signature`
	pub wallet_signature: String,
	/// Unix milliseconds, sent in `x-api-timestamp`
	pub timestamp: u64,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_action_round_trips_through_str() {
		for action in Action::ALL {
			assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
		}
		assert!("DELETE_EVERYTHING".parse::<Action>().is_err());
	}

	#[test]
	fn test_envelope_field_set_matches_required_fields() {
		let envelopes = [
			Intent::PlaceOrder(PlaceOrderIntent {
				ticker: "BTC_USDT".into(),
				side: "BUY".into(),
				order_type: "LIMIT".into(),
				quantity: "0.1".into(),
				quote_quantity: String::new(),
				price: "30000".into(),
				time_in_force: 0,
				expires_at: 0,
			}),
			Intent::CancelOrder(CancelOrderIntent {
				order_id: "42".into(),
			}),
			Intent::CancelAllOrders(CancelAllOrdersIntent { market: 1 }),
			Intent::Withdraw(WithdrawIntent {
				asset: "USDT".into(),
				amount: "10".into(),
				chain_id: 1,
			}),
			Intent::Transfer(TransferIntent {
				asset: "USDT".into(),
				amount: "10".into(),
				to_wallet_address: "0xabc".into(),
			}),
		];

		for intent in envelopes {
			let action = intent.action();
			let payload = SigningEnvelope::new(intent, 1).payload();
			let mut expected: Vec<&str> = action.required_fields().to_vec();
			expected.push("action");
			expected.sort_unstable();
			assert_eq!(payload.keys().collect::<Vec<_>>(), expected, "{action}");
		}
	}

	#[test]
	fn test_cancel_envelope_canonical_form() {
		let envelope = SigningEnvelope::new(
			Intent::CancelOrder(CancelOrderIntent {
				order_id: "ord-1".into(),
			}),
			1_700_000_000_000,
		);
		assert_eq!(
			envelope.canonical(),
			r#"{"action":"CANCEL_ORDER","order_id":"ord-1","timestamp":1700000000000}"#
		);
	}

	#[test]
	fn test_transport_modes() {
		assert_eq!(Action::CancelOrder.transport(), Transport::Query);
		assert_eq!(Action::CancelAllOrders.transport(), Transport::Query);
		assert_eq!(Action::PlaceOrder.transport(), Transport::Body);
		assert_eq!(Action::Withdraw.transport(), Transport::Body);
		assert_eq!(Action::Transfer.transport(), Transport::Body);
	}
}
