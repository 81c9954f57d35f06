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

//! Shared fixtures for gateway integration tests

#![allow(dead_code)]

use std::sync::Arc;

use keystone_gateway::{
	ApiCredential, AuthContext, Gate, GateError, GateRequest, ManualClock, MemoryCredentialStore,
	ReplayGuard, VerifiedRequest, WalletIdentity,
};
use keystone_sdk::{
	Action, CancelOrderIntent, Client, HEADER_API_KEY, HEADER_API_SIGNATURE, HEADER_API_TIMESTAMP,
	Intent, PlaceOrderIntent, PreparedRequest, RequestSigner, Transport, WalletAddress,
	signing_key_from_hex,
};
use serde_json::{Map, Value};

pub const API_KEY: &str = "key-1";
pub const API_SECRET: &[u8] = b"api-secret-1";
pub const ACCOUNT_ID: &str = "acc-1";
pub const WALLET_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const OTHER_WALLET_KEY: &str =
	"0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
/// Account with a valid API key but no registered wallet
pub const WALLETLESS_API_KEY: &str = "key-2";
pub const NOW: u64 = 1_700_000_000_000;
pub const WINDOW_MS: u64 = 300_000;

pub struct Fixture {
	pub gate: Gate,
	pub clock: Arc<ManualClock>,
	pub client: Client,
}

fn signer(api_key: &str, wallet_key: &str) -> RequestSigner {
	RequestSigner::new(
		api_key,
		API_SECRET.to_vec(),
		signing_key_from_hex(wallet_key).unwrap(),
	)
}

pub fn fixture() -> Fixture {
	let store = MemoryCredentialStore::new();
	store.issue(ApiCredential {
		api_key: API_KEY.to_string(),
		api_secret: API_SECRET.to_vec(),
		owner_account_id: ACCOUNT_ID.to_string(),
	});
	store.issue(ApiCredential {
		api_key: WALLETLESS_API_KEY.to_string(),
		api_secret: API_SECRET.to_vec(),
		owner_account_id: "acc-2".to_string(),
	});
	store.register_wallet(WalletIdentity {
		account_id: ACCOUNT_ID.to_string(),
		wallet_address: wallet_address(WALLET_KEY),
	});

	let clock = Arc::new(ManualClock::new(NOW));
	let gate = Gate::new(
		Arc::new(store),
		clock.clone(),
		ReplayGuard::in_memory(WINDOW_MS, 0, 10_000),
	);

	Fixture {
		gate,
		clock,
		client: client(API_KEY, WALLET_KEY),
	}
}

pub fn client(api_key: &str, wallet_key: &str) -> Client {
	Client::new("http://localhost:8080", signer(api_key, wallet_key)).unwrap()
}

pub fn wallet_address(key_hex: &str) -> WalletAddress {
	WalletAddress::from_signing_key(&signing_key_from_hex(key_hex).unwrap())
}

pub fn place_order() -> Intent {
	Intent::PlaceOrder(PlaceOrderIntent {
		ticker: "BTC_USDT".to_string(),
		side: "BUY".to_string(),
		order_type: "LIMIT".to_string(),
		quantity: "0.5".to_string(),
		quote_quantity: String::new(),
		price: "30000.5".to_string(),
		time_in_force: 1,
		expires_at: 0,
	})
}

pub fn cancel_order(order_id: &str) -> Intent {
	Intent::CancelOrder(CancelOrderIntent {
		order_id: order_id.to_string(),
	})
}

pub fn header<'a>(prepared: &'a PreparedRequest, name: &str) -> Option<&'a str> {
	prepared
		.headers
		.iter()
		.find(|(n, _)| *n == name)
		.map(|(_, v)| v.as_str())
}

/// Decode a query string whose values need no percent-decoding
pub fn query_map(path_and_query: &str) -> Map<String, Value> {
	let Some((_, query)) = path_and_query.split_once('?') else {
		return Map::new();
	};
	query
		.split('&')
		.filter_map(|pair| pair.split_once('='))
		.map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
		.collect()
}

/// Intent fields of a prepared request, as the HTTP adapter would decode them
pub fn fields(action: Action, prepared: &PreparedRequest) -> Option<Map<String, Value>> {
	match action.transport() {
		Transport::Body if prepared.body.is_empty() => None,
		Transport::Body => serde_json::from_str(&prepared.body).ok(),
		Transport::Query => Some(query_map(&prepared.path_and_query)),
	}
}

/// Run a prepared request through the gate
pub fn verify(
	gate: &Gate,
	action: Action,
	prepared: &PreparedRequest,
) -> Result<VerifiedRequest, GateError> {
	let fields = fields(action, prepared);
	gate.verify(&GateRequest {
		action,
		method: prepared.method,
		signed_path: &prepared.path_and_query,
		fields: fields.as_ref(),
		auth: AuthContext {
			api_key: header(prepared, HEADER_API_KEY),
			signature: header(prepared, HEADER_API_SIGNATURE),
			timestamp: header(prepared, HEADER_API_TIMESTAMP),
		},
	})
}

/// Re-sign the HMAC of a body-mode request after its fields were edited,
/// keeping the original wallet signature
pub fn with_body(
	client: &Client,
	prepared: &PreparedRequest,
	body: &Map<String, Value>,
	header_timestamp: u64,
) -> PreparedRequest {
	let body = keystone_sdk::canonicalize(Some(body)).unwrap();
	let signature = client
		.signer()
		.sign_request(
			prepared.method,
			&prepared.path_and_query,
			&body,
			header_timestamp,
			String::new(),
		)
		.unwrap();
	PreparedRequest {
		method: prepared.method,
		path_and_query: prepared.path_and_query.clone(),
		body,
		headers: client.signer().headers(&signature),
	}
}

/// Build and HMAC-sign a query-mode request from raw query pairs
pub fn with_query(
	client: &Client,
	method: &'static str,
	path: &str,
	pairs: &[(&str, &str)],
	header_timestamp: u64,
) -> PreparedRequest {
	let query = pairs
		.iter()
		.map(|(k, v)| format!("{k}={v}"))
		.collect::<Vec<_>>()
		.join("&");
	let path_and_query = format!("{path}?{query}");
	let signature = client
		.signer()
		.sign_request(method, &path_and_query, "", header_timestamp, String::new())
		.unwrap();
	PreparedRequest {
		method,
		path_and_query,
		body: String::new(),
		headers: client.signer().headers(&signature),
	}
}
