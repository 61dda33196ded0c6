use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use waxmarket_auth::Permission;
use waxmarket_catalog::ProductId;
use waxmarket_core::{AggregateId, UserId};
use waxmarket_infra::command_dispatcher::rehydrate;
use waxmarket_infra::services::{CartLine, NewOrder};
use waxmarket_orders::{
    AcceptItem, Order, OrderCommand, OrderId, RejectItem, ShippingAddress, UpdateStatus,
};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(place_order).get(list_my_orders))
        .route("/pending", get(pending_for_provider))
        .route("/:id", get(get_order))
        .route("/:id/status", post(update_status))
        .route("/:id/items/:line_no/accept", post(accept_item))
        .route("/:id/items/:line_no/reject", post(reject_item))
}

fn buyer_id_of(principal: &crate::context::PrincipalContext) -> UserId {
    UserId::from_uuid(*principal.principal_id().as_uuid())
}

pub async fn place_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::PlaceOrderRequest>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::authorize_permission(&principal, &Permission::new("orders.place")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let mut lines = Vec::with_capacity(body.lines.len());
    for line in &body.lines {
        let agg: AggregateId = match line.product_id.parse() {
            Ok(v) => v,
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id")
            }
        };
        lines.push(CartLine {
            product_id: ProductId::new(agg),
            quantity: line.quantity,
        });
    }

    let new_order = NewOrder {
        buyer_id: buyer_id_of(&principal),
        payment_method: body.payment_method,
        shipping: ShippingAddress {
            recipient: body.shipping.recipient,
            street: body.shipping.street,
            city: body.shipping.city,
            postal_code: body.shipping.postal_code,
            country: body.shipping.country,
        },
        lines,
    };

    let (order_id, committed) = match services.composer().place_order(new_order, Utc::now()) {
        Ok(v) => v,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": order_id.0.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn list_my_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::authorize_permission(&principal, &Permission::new("orders.view")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let orders = services.orders().list_for_buyer(buyer_id_of(&principal));
    let body: Vec<_> = orders.iter().map(dto::order_to_json).collect();
    (StatusCode::OK, Json(body)).into_response()
}

pub async fn pending_for_provider(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
) -> axum::response::Response {
    let provider_id = match crate::authz::require_provider(&principal) {
        Ok(p) => p,
        Err(e) => return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()),
    };

    if let Err(e) = crate::authz::authorize_permission(&principal, &Permission::new("orders.pending.view")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let orders = services.orders().pending_for_provider(provider_id);
    let body: Vec<_> = orders.iter().map(dto::order_to_json).collect();
    (StatusCode::OK, Json(body)).into_response()
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id"),
    };
    let order_id = OrderId::new(agg);

    let rm = match services.orders().get(&order_id) {
        Some(rm) => rm,
        None => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
    };

    // Visible to its buyer, to a provider with a line in it, and to admins.
    let is_buyer = rm.buyer_id == buyer_id_of(&principal);
    let is_involved_provider = principal
        .provider()
        .map(|p| rm.items.iter().any(|i| i.provider_id == p.provider_id))
        .unwrap_or(false);

    if !is_buyer && !is_involved_provider && !crate::authz::is_admin(&principal) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", "not your order");
    }

    (StatusCode::OK, Json(dto::order_to_json(&rm))).into_response()
}

pub async fn accept_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path((id, line_no)): Path<(String, u32)>,
) -> axum::response::Response {
    decide_item(services, principal, id, line_no, Decision::Accept).await
}

pub async fn reject_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path((id, line_no)): Path<(String, u32)>,
    Json(body): Json<dto::RejectItemRequest>,
) -> axum::response::Response {
    decide_item(services, principal, id, line_no, Decision::Reject(body.reason)).await
}

enum Decision {
    Accept,
    Reject(String),
}

async fn decide_item(
    services: Arc<AppServices>,
    principal: crate::context::PrincipalContext,
    id: String,
    line_no: u32,
    decision: Decision,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id"),
    };
    let order_id = OrderId::new(agg);

    let provider_id = match crate::authz::require_provider(&principal) {
        Ok(p) => p,
        Err(e) => return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()),
    };

    if let Err(e) = crate::authz::authorize_permission(&principal, &Permission::new("orders.fulfill")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    // Ownership is checked here at the boundary via the aggregate's pure
    // predicate; the command handler re-enforces it.
    let order = match rehydrate::<Order, _>(services.store(), agg, |aggregate_id| {
        Order::empty(OrderId::new(aggregate_id))
    }) {
        Ok(o) => o,
        Err(e) => return errors::dispatch_error_to_response(e),
    };
    if order.exists() && !order.line_belongs_to(line_no, provider_id) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", "not your order item");
    }

    let cmd = match decision {
        Decision::Accept => OrderCommand::AcceptItem(AcceptItem {
            order_id,
            provider_id,
            line_no,
            occurred_at: Utc::now(),
        }),
        Decision::Reject(reason) => OrderCommand::RejectItem(RejectItem {
            order_id,
            provider_id,
            line_no,
            reason,
            occurred_at: Utc::now(),
        }),
    };

    let committed = match services.dispatch::<Order>(agg, "orders.order", cmd, |aggregate_id| {
        Order::empty(OrderId::new(aggregate_id))
    }) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateOrderStatusRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id"),
    };
    let order_id = OrderId::new(agg);

    let status = match errors::parse_order_status(&body.status) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let cmd = OrderCommand::UpdateStatus(UpdateStatus {
        order_id,
        status,
        occurred_at: Utc::now(),
    });

    // Shipping workflow only; granted through the admin wildcard.
    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("orders.status.update")],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Order>(
        agg,
        "orders.order",
        cmd_auth.inner,
        |aggregate_id| Order::empty(OrderId::new(aggregate_id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}
