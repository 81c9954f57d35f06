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

use std::future::{Ready, ready};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::Instant;

use actix_web::{
	Error,
	dev::{Service, ServiceRequest, ServiceResponse, Transform},
};
use tracing::{Instrument, info, warn};

/// Access log middleware for actix-web
///
/// Logs method, path, status and duration of every request. Only the path is
/// recorded: query strings carry wallet signatures for cancellations and never
/// reach the logs.
pub struct AccessLog;

impl<S, B> Transform<S, ServiceRequest> for AccessLog
where
	S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
	S::Future: 'static,
	B: 'static,
{
	type Response = ServiceResponse<B>;
	type Error = Error;
	type InitError = ();
	type Transform = AccessLogInner<S>;
	type Future = Ready<Result<Self::Transform, Self::InitError>>;

	fn new_transform(&self, service: S) -> Self::Future {
		ready(Ok(AccessLogInner {
			service: Rc::new(service),
		}))
	}
}

pub struct AccessLogInner<S> {
	service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AccessLogInner<S>
where
	S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
	S::Future: 'static,
	B: 'static,
{
	type Response = ServiceResponse<B>;
	type Error = Error;
	type Future = Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>>>>;

	fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.service.poll_ready(cx)
	}

	fn call(&self, req: ServiceRequest) -> Self::Future {
		let service = self.service.clone();
		let span = tracing::info_span!(
			target: "server",
			"http_request",
			method = %req.method(),
			path = %req.path()
		);

		Box::pin(
			async move {
				let start = Instant::now();
				let res = service.call(req).await;
				let duration_ms = start.elapsed().as_millis();

				match &res {
					Ok(response) if response.status().is_server_error() => warn!(
						target: "server",
						status = response.status().as_u16(),
						duration_ms,
						"Request completed"
					),
					Ok(response) => info!(
						target: "server",
						status = response.status().as_u16(),
						duration_ms,
						"Request completed"
					),
					Err(e) => warn!(target: "server", error = %e, duration_ms, "Request failed"),
				}

				res
			}
			.instrument(span),
		)
	}
}
