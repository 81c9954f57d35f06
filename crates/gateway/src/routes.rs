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

use actix_web::web;

use crate::handlers;

/// Configure HTTP routes for the gateway
///
/// - `POST   /api/v1/orders`       place order (JSON body)
/// - `DELETE /api/v1/orders`       cancel one order (query string)
/// - `DELETE /api/v1/orders/all`   cancel all orders in a market (query string)
/// - `POST   /api/v1/withdrawals`  withdraw (JSON body)
/// - `POST   /api/v1/transfers`    transfer (JSON body)
/// - `GET    /health`
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
	cfg.service(
		web::scope("/api/v1")
			.route("/orders", web::post().to(handlers::place_order))
			.route("/orders", web::delete().to(handlers::cancel_order))
			.route(
				"/orders/all",
				web::delete().to(handlers::cancel_all_orders),
			)
			.route("/withdrawals", web::post().to(handlers::withdraw))
			.route("/transfers", web::post().to(handlers::transfer)),
	)
	.route("/health", web::get().to(handlers::health));
}
