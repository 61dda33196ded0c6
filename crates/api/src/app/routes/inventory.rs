use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
    Json, Router,
};
use chrono::Utc;

use waxmarket_auth::Permission;
use waxmarket_catalog::ProductId;
use waxmarket_core::AggregateId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/products/:id/stock", put(set_stock))
        .route("/products/:id/stock/adjust", post(adjust_stock))
}

pub async fn set_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetStockRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"),
    };
    let product_id = ProductId::new(agg);

    let provider_id = match crate::authz::require_provider(&principal) {
        Ok(p) => p,
        Err(e) => return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()),
    };

    if let Err(e) = crate::authz::authorize_permission(&principal, &Permission::new("inventory.stock.set")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.stock_ledger().set_stock(
        provider_id,
        product_id,
        body.quantity,
        body.reason,
        Utc::now(),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
            "stream_version": committed.last().map(|e| e.sequence_number).unwrap_or(0),
        })),
    )
        .into_response()
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"),
    };
    let product_id = ProductId::new(agg);

    let direction = match errors::parse_stock_direction(&body.direction) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    let provider_id = match crate::authz::require_provider(&principal) {
        Ok(p) => p,
        Err(e) => return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()),
    };

    if let Err(e) = crate::authz::authorize_permission(&principal, &Permission::new("inventory.stock.adjust")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.stock_ledger().adjust_stock(
        provider_id,
        product_id,
        direction,
        body.amount,
        body.reason,
        Utc::now(),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
            "stream_version": committed.last().map(|e| e.sequence_number).unwrap_or(0),
        })),
    )
        .into_response()
}
