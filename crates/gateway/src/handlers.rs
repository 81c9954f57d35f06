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

use std::collections::BTreeMap;

use actix_web::{HttpRequest, HttpResponse, Responder, http::StatusCode, web};
use keystone_sdk::{Action, CanonicalError, Transport};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
	auth::AuthContext,
	gate::{GateError, GateRequest},
	router::RouterError,
	server::GatewayState,
};

/// Error types for gateway operations
#[derive(Debug, Error)]
pub enum GatewayError {
	#[error(transparent)]
	Gate(#[from] GateError),
	#[error("Routing error: {0}")]
	Routing(#[from] RouterError),
}

impl From<CanonicalError> for GatewayError {
	fn from(e: CanonicalError) -> Self {
		GatewayError::Gate(GateError::Canonical(e))
	}
}

impl actix_web::ResponseError for GatewayError {
	fn status_code(&self) -> StatusCode {
		match self {
			GatewayError::Gate(e) => e.status(),
			GatewayError::Routing(_) => StatusCode::SERVICE_UNAVAILABLE,
		}
	}

	fn error_response(&self) -> HttpResponse {
		let message = match self {
			GatewayError::Gate(e) => e.public_message(),
			GatewayError::Routing(_) => "Service temporarily unavailable.".into(),
		};

		HttpResponse::build(self.status_code()).json(serde_json::json!({
			"error": message
		}))
	}
}

/// Health check endpoint
pub async fn health() -> impl Responder {
	HttpResponse::Ok().json(serde_json::json!({
		"status": "ok",
		"service": "keystone-gateway"
	}))
}

/// Parse a JSON body into its top-level object. An empty body has no fields.
fn body_fields(body: &[u8]) -> Result<Option<Map<String, Value>>, CanonicalError> {
	if body.iter().all(u8::is_ascii_whitespace) {
		return Ok(None);
	}
	match serde_json::from_slice(body) {
		Ok(Value::Object(map)) => Ok(Some(map)),
		_ => Err(CanonicalError::MalformedPayload("body".to_string())),
	}
}

/// Decode query parameters; every value arrives as a string
fn query_fields(query: &str) -> Result<Map<String, Value>, CanonicalError> {
	let params = web::Query::<BTreeMap<String, String>>::from_query(query)
		.map_err(|_| CanonicalError::MalformedPayload("query".to_string()))?;
	Ok(params
		.into_inner()
		.into_iter()
		.map(|(key, value)| (key, Value::String(value)))
		.collect())
}

/// Run a request for `action` through the gate and hand it off
///
/// Authentication materials are always read from headers; the wallet
/// signature travels with the intent fields (body or query string).
async fn submit(
	state: web::Data<GatewayState>,
	action: Action,
	req: HttpRequest,
	body: web::Bytes,
) -> Result<HttpResponse, GatewayError> {
	let (fields, signed_path) = match action.transport() {
		Transport::Body => (body_fields(&body)?, req.path()),
		Transport::Query => (
			Some(query_fields(req.query_string())?),
			req.uri()
				.path_and_query()
				.map(|pq| pq.as_str())
				.unwrap_or_else(|| req.path()),
		),
	};

	let request = GateRequest {
		action,
		method: req.method().as_str(),
		signed_path,
		fields: fields.as_ref(),
		auth: AuthContext::from_http(req.headers()),
	};
	let verified = state.gate.verify(&request)?;
	let ack = state.sink.forward(verified)?;

	Ok(HttpResponse::Ok().json(ack))
}

/// `POST /api/v1/orders`
pub async fn place_order(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	body: web::Bytes,
) -> Result<HttpResponse, GatewayError> {
	submit(state, Action::PlaceOrder, req, body).await
}

/// `DELETE /api/v1/orders?order_id=..&timestamp=..&signature=..`
pub async fn cancel_order(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	body: web::Bytes,
) -> Result<HttpResponse, GatewayError> {
	submit(state, Action::CancelOrder, req, body).await
}

/// `DELETE /api/v1/orders/all?market=..&timestamp=..&signature=..`
pub async fn cancel_all_orders(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	body: web::Bytes,
) -> Result<HttpResponse, GatewayError> {
	submit(state, Action::CancelAllOrders, req, body).await
}

/// `POST /api/v1/withdrawals`
pub async fn withdraw(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	body: web::Bytes,
) -> Result<HttpResponse, GatewayError> {
	submit(state, Action::Withdraw, req, body).await
}

/// `POST /api/v1/transfers`
pub async fn transfer(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	body: web::Bytes,
) -> Result<HttpResponse, GatewayError> {
	submit(state, Action::Transfer, req, body).await
}
