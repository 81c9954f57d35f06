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

use std::{
	fmt,
	time::{Duration, SystemTime, UNIX_EPOCH},
};

use k256::ecdsa::SigningKey;
use reqwest::{Client as ReqwestClient, Method, Url};
use thiserror::Error;

use crate::canonical::{CanonicalPayload, Scalar};
use crate::signing::{SigningError, WalletAddress, sign_hmac, sign_intent};
use crate::types::{
	CancelAllOrdersIntent, CancelOrderIntent, FIELD_SIGNATURE, FIELD_TIMESTAMP,
	HEADER_API_KEY, HEADER_API_SIGNATURE, HEADER_API_TIMESTAMP, Intent, PlaceOrderIntent,
	RequestSignature, SigningEnvelope, TransferIntent, Transport, WithdrawIntent,
};

#[derive(Debug, Error)]
pub enum ClientError {
	#[error("Network error: {0}")]
	Network(String),
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Server error: {0}")]
	Server(String),
	#[error("Signing error: {0}")]
	Signing(#[from] SigningError),
	#[error("Invalid URL: {0}")]
	InvalidUrl(String),
	#[error("System clock error: {0}")]
	Clock(String),
}

/// Signs requests with an API credential and a wallet key
pub struct RequestSigner {
	api_key: String,
	api_secret: Vec<u8>,
	wallet_key: SigningKey,
}

impl fmt::Debug for RequestSigner {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RequestSigner")
			.field("api_key", &self.api_key)
			.field("wallet", &self.wallet_address())
			.finish_non_exhaustive()
	}
}

impl RequestSigner {
	pub fn new(
		api_key: impl Into<String>,
		api_secret: impl Into<Vec<u8>>,
		wallet_key: SigningKey,
	) -> Self {
		Self {
			api_key: api_key.into(),
			api_secret: api_secret.into(),
			wallet_key,
		}
	}

	pub fn api_key(&self) -> &str {
		&self.api_key
	}

	pub fn wallet_address(&self) -> WalletAddress {
		WalletAddress::from_signing_key(&self.wallet_key)
	}

	/// Wallet-sign the intent and return the fields to transmit
	/// (intent fields, `timestamp`, `signature`) plus the raw signature.
	pub fn signed_fields(
		&self,
		intent: Intent,
		timestamp: u64,
	) -> Result<(CanonicalPayload, String), SigningError> {
		let fields = intent.payload();
		let envelope = SigningEnvelope::new(intent, timestamp);
		let wallet_signature = sign_intent(&self.wallet_key, &envelope)?;
		let fields = fields
			.with(FIELD_TIMESTAMP, timestamp)
			.with(FIELD_SIGNATURE, wallet_signature.clone());
		Ok((fields, wallet_signature))
	}

	/// HMAC-sign a request and return the signature set
	pub fn sign_request(
		&self,
		method: &str,
		path: &str,
		canonical_body: &str,
		timestamp: u64,
		wallet_signature: String,
	) -> Result<RequestSignature, SigningError> {
		let hmac_signature = sign_hmac(
			&self.api_secret,
			method,
			path,
			canonical_body,
			&timestamp.to_string(),
		)?;
		Ok(RequestSignature {
			hmac_signature,
			wallet_signature,
			timestamp,
		})
	}

	/// Header set for a signed request
	pub fn headers(&self, signature: &RequestSignature) -> [(&'static str, String); 3] {
		[
			(HEADER_API_KEY, self.api_key.clone()),
			(HEADER_API_SIGNATURE, signature.hmac_signature.clone()),
			(HEADER_API_TIMESTAMP, signature.timestamp.to_string()),
		]
	}
}

/// Render a scalar as a query-string value
fn query_value(value: &Scalar) -> String {
	match value {
		Scalar::Str(s) => s.clone(),
		Scalar::Int(i) => i.to_string(),
		Scalar::Empty => String::new(),
	}
}

/// A request ready to be sent: everything the gateway will verify
#[derive(Debug, Clone)]
pub struct PreparedRequest {
	pub method: &'static str,
	/// Path as the server will see it (query string included for query-mode actions)
	pub path_and_query: String,
	/// Canonical JSON body, empty for query-mode actions
	pub body: String,
	pub headers: [(&'static str, String); 3],
}

pub struct Client {
	base_url: Url,
	client: ReqwestClient,
	signer: RequestSigner,
}

impl Client {
	/// Create a new client with the given base URL
	pub fn new(base_url: &str, signer: RequestSigner) -> Result<Self, ClientError> {
		Self::with_timeout(base_url, signer, Duration::from_secs(30))
	}

	pub fn with_timeout(
		base_url: &str,
		signer: RequestSigner,
		timeout: Duration,
	) -> Result<Self, ClientError> {
		let base_url = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| ClientError::Network(format!("Failed to create HTTP client: {}", e)))?;

		Ok(Self {
			base_url,
			client,
			signer,
		})
	}

	pub fn signer(&self) -> &RequestSigner {
		&self.signer
	}

	/// Build and sign a request for `intent` at `timestamp` without sending it
	pub fn prepare(&self, intent: Intent, timestamp: u64) -> Result<PreparedRequest, ClientError> {
		let action = intent.action();
		let (fields, wallet_signature) = self.signer.signed_fields(intent, timestamp)?;

		let mut url = self
			.base_url
			.join(action.path())
			.map_err(|e| ClientError::InvalidUrl(e.to_string()))?;

		let (path_and_query, body) = match action.transport() {
			Transport::Body => (url.path().to_string(), fields.to_canonical_string()),
			Transport::Query => {
				{
					let mut pairs = url.query_pairs_mut();
					for key in fields.keys() {
						if let Some(value) = fields.get(key) {
							pairs.append_pair(key, &query_value(value));
						}
					}
				}
				let path_and_query = match url.query() {
					Some(query) => format!("{}?{}", url.path(), query),
					None => url.path().to_string(),
				};
				(path_and_query, String::new())
			}
		};

		let signature = self.signer.sign_request(
			action.method(),
			&path_and_query,
			&body,
			timestamp,
			wallet_signature,
		)?;

		Ok(PreparedRequest {
			method: action.method(),
			path_and_query,
			body,
			headers: self.signer.headers(&signature),
		})
	}

	/// Sign and submit an intent, returning the gateway's JSON response
	pub async fn submit(&self, intent: Intent) -> Result<serde_json::Value, ClientError> {
		let prepared = self.prepare(intent, now_millis()?)?;
		let url = self
			.base_url
			.join(&prepared.path_and_query)
			.map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
		let method = Method::from_bytes(prepared.method.as_bytes())
			.map_err(|e| ClientError::InvalidUrl(e.to_string()))?;

		let mut request = self.client.request(method, url);
		for (name, value) in &prepared.headers {
			request = request.header(*name, value);
		}
		if !prepared.body.is_empty() {
			request = request
				.header(reqwest::header::CONTENT_TYPE, "application/json")
				.body(prepared.body);
		}

		let response = request
			.send()
			.await
			.map_err(|e| ClientError::Network(format!("Request failed: {}", e)))?;

		if !response.status().is_success() {
			let status = response.status();
			let error_text = response
				.text()
				.await
				.unwrap_or_else(|_| format!("HTTP {}", status));
			return Err(ClientError::Server(format!("{}: {}", status, error_text)));
		}

		response
			.json()
			.await
			.map_err(|e| ClientError::Serialization(format!("Failed to parse response: {}", e)))
	}

	pub async fn place_order(
		&self,
		order: PlaceOrderIntent,
	) -> Result<serde_json::Value, ClientError> {
		self.submit(Intent::PlaceOrder(order)).await
	}

	pub async fn cancel_order(&self, order_id: &str) -> Result<serde_json::Value, ClientError> {
		self.submit(Intent::CancelOrder(CancelOrderIntent {
			order_id: order_id.to_string(),
		}))
		.await
	}

	pub async fn cancel_all_orders(&self, market: i64) -> Result<serde_json::Value, ClientError> {
		self.submit(Intent::CancelAllOrders(CancelAllOrdersIntent { market }))
			.await
	}

	pub async fn withdraw(
		&self,
		withdrawal: WithdrawIntent,
	) -> Result<serde_json::Value, ClientError> {
		self.submit(Intent::Withdraw(withdrawal)).await
	}

	pub async fn transfer(
		&self,
		transfer: TransferIntent,
	) -> Result<serde_json::Value, ClientError> {
		self.submit(Intent::Transfer(transfer)).await
	}

	/// Check gateway health
	pub async fn health_check(&self) -> Result<bool, ClientError> {
		let url = self
			.base_url
			.join("/health")
			.map_err(|e| ClientError::InvalidUrl(e.to_string()))?;

		let response = self
			.client
			.get(url)
			.send()
			.await
			.map_err(|e| ClientError::Network(format!("Request failed: {}", e)))?;

		Ok(response.status().is_success())
	}
}

fn now_millis() -> Result<u64, ClientError> {
	let elapsed = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map_err(|e| ClientError::Clock(e.to_string()))?;
	Ok(elapsed.as_millis() as u64)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::signing::{recover_personal_signer, signing_key_from_hex};

	const TEST_PRIVATE_KEY: &str =
		"0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

	fn test_client() -> Client {
		let key = signing_key_from_hex(TEST_PRIVATE_KEY).unwrap();
		let signer = RequestSigner::new("key-1", b"secret-1".to_vec(), key);
		Client::new("http://localhost:8080", signer).unwrap()
	}

	#[test]
	fn test_client_creation() {
		let client = test_client();
		assert_eq!(client.base_url.as_str(), "http://localhost:8080/");
		assert!(Client::new("not a url", test_client().signer).is_err());
	}

	#[test]
	fn test_prepare_body_request() {
		let client = test_client();
		let prepared = client
			.prepare(
				Intent::Withdraw(WithdrawIntent {
					asset: "USDT".into(),
					amount: "25.5".into(),
					chain_id: 1,
				}),
				1_700_000_000_000,
			)
			.unwrap();

		assert_eq!(prepared.method, "POST");
		assert_eq!(prepared.path_and_query, "/api/v1/withdrawals");

		let body: serde_json::Value = serde_json::from_str(&prepared.body).unwrap();
		assert_eq!(body["asset"], "USDT");
		assert_eq!(body["chain_id"], 1);
		assert_eq!(body["timestamp"], 1_700_000_000_000u64);
		assert!(body["signature"].as_str().unwrap().starts_with("0x"));

		let expected_hmac = sign_hmac(
			b"secret-1",
			"POST",
			"/api/v1/withdrawals",
			&prepared.body,
			"1700000000000",
		)
		.unwrap();
		assert_eq!(prepared.headers[0], (HEADER_API_KEY, "key-1".to_string()));
		assert_eq!(prepared.headers[1], (HEADER_API_SIGNATURE, expected_hmac));
		assert_eq!(
			prepared.headers[2],
			(HEADER_API_TIMESTAMP, "1700000000000".to_string())
		);
	}

	#[test]
	fn test_prepare_query_request() {
		let client = test_client();
		let prepared = client
			.prepare(
				Intent::CancelOrder(CancelOrderIntent {
					order_id: "a b".into(),
				}),
				1_700_000_000_000,
			)
			.unwrap();

		assert_eq!(prepared.method, "DELETE");
		assert!(prepared.body.is_empty());
		assert!(
			prepared
				.path_and_query
				.starts_with("/api/v1/orders?order_id=a+b&signature=0x")
		);
		assert!(prepared.path_and_query.ends_with("&timestamp=1700000000000"));
	}

	#[test]
	fn test_signed_fields_recover_to_wallet() {
		let client = test_client();
		let intent = Intent::CancelAllOrders(CancelAllOrdersIntent { market: 3 });
		let (fields, signature) = client.signer().signed_fields(intent.clone(), 5).unwrap();
		assert_eq!(fields.get(FIELD_SIGNATURE), Some(&Scalar::Str(signature.clone())));

		let envelope = SigningEnvelope::new(intent, 5);
		let recovered =
			recover_personal_signer(envelope.canonical().as_bytes(), &signature).unwrap();
		assert_eq!(recovered, client.signer().wallet_address());
	}
}
