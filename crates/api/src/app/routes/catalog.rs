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
use waxmarket_catalog::{
    ListProduct, Product, ProductCommand, ProductId, ToggleActive, ToggleFeatured,
};
use waxmarket_core::{AggregateId, AlbumId};
use waxmarket_infra::services::{BulkMutation, BulkUpdate};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/products", post(list_product).get(browse_products))
        .route("/products/bulk", post(bulk_update))
        .route("/products/:id", get(get_product))
        .route("/products/:id/toggle-featured", post(toggle_featured))
        .route("/products/:id/toggle-active", post(toggle_active))
}

pub async fn list_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::ListProductRequest>,
) -> axum::response::Response {
    let album_id: AlbumId = match body.album_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid album id"),
    };
    let product_type = match errors::parse_product_type(&body.product_type) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let provider_id = match crate::authz::require_provider(&principal) {
        Ok(p) => p,
        Err(e) => return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()),
    };

    let agg = AggregateId::new();
    let product_id = ProductId::new(agg);

    let cmd = ProductCommand::ListProduct(ListProduct {
        provider_id,
        product_id,
        album_id,
        price_cents: body.price_cents,
        stock: body.stock,
        product_type,
        featured: body.featured,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("catalog.products.list")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Product>(
        agg,
        "catalog.product",
        cmd_auth.inner,
        |aggregate_id| Product::empty(ProductId::new(aggregate_id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn browse_products(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let entries = services.catalog().list();
    let body: Vec<_> = entries
        .iter()
        .map(|e| dto::catalog_entry_to_json(e, None))
        .collect();

    (StatusCode::OK, Json(body)).into_response()
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"),
    };

    let product_id = ProductId::new(agg);
    match services.catalog().get(&product_id) {
        Some(entry) => {
            let alternative = services.catalog().alternative_format_available(&product_id);
            (
                StatusCode::OK,
                Json(dto::catalog_entry_to_json(&entry, alternative)),
            )
                .into_response()
        }
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
    }
}

pub async fn toggle_featured(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    toggle(services, principal, id, Toggle::Featured).await
}

pub async fn toggle_active(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    toggle(services, principal, id, Toggle::Active).await
}

enum Toggle {
    Featured,
    Active,
}

async fn toggle(
    services: Arc<AppServices>,
    principal: crate::context::PrincipalContext,
    id: String,
    which: Toggle,
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

    let cmd = match which {
        Toggle::Featured => ProductCommand::ToggleFeatured(ToggleFeatured {
            provider_id,
            product_id,
            occurred_at: Utc::now(),
        }),
        Toggle::Active => ProductCommand::ToggleActive(ToggleActive {
            provider_id,
            product_id,
            occurred_at: Utc::now(),
        }),
    };

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("catalog.products.update")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Product>(
        agg,
        "catalog.product",
        cmd_auth.inner,
        |aggregate_id| Product::empty(ProductId::new(aggregate_id)),
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

pub async fn bulk_update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::BulkUpdateRequest>,
) -> axum::response::Response {
    let mut product_ids = Vec::with_capacity(body.product_ids.len());
    for raw in &body.product_ids {
        match raw.parse::<AggregateId>() {
            Ok(agg) => product_ids.push(ProductId::new(agg)),
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id")
            }
        }
    }

    let mutation = match body.mutation {
        dto::BulkMutationRequest::PricePercent { percent } => BulkMutation::PricePercent(percent),
        dto::BulkMutationRequest::PriceSet { price_cents } => BulkMutation::PriceSet(price_cents),
        dto::BulkMutationRequest::StockSet { quantity } => BulkMutation::StockSet(quantity),
        dto::BulkMutationRequest::StockIncrement { amount } => BulkMutation::StockIncrement(amount),
        dto::BulkMutationRequest::StockDecrement { amount } => BulkMutation::StockDecrement(amount),
        dto::BulkMutationRequest::ToggleFeatured => BulkMutation::ToggleFeatured,
        dto::BulkMutationRequest::ToggleActive => BulkMutation::ToggleActive,
    };

    let update = BulkUpdate {
        product_ids,
        mutation,
        reason: body.reason,
    };

    let cmd_auth = CmdAuth {
        inner: update,
        required: vec![Permission::new("catalog.products.bulk")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    // Admins operate across providers; everyone else acts as themselves and
    // the operator rejects the whole batch on any foreign product.
    let acting = if crate::authz::is_admin(&principal) {
        None
    } else {
        match crate::authz::require_provider(&principal) {
            Ok(p) => Some(p),
            Err(e) => return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()),
        }
    };

    let updated = match services
        .bulk_operator()
        .apply(acting, cmd_auth.inner, Utc::now())
    {
        Ok(u) => u,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    let body: Vec<_> = updated.iter().map(dto::product_state_to_json).collect();
    (StatusCode::OK, Json(body)).into_response()
}
