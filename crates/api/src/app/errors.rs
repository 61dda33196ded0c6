use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use waxmarket_catalog::{ProductType, StockDirection};
use waxmarket_infra::command_dispatcher::DispatchError;
use waxmarket_orders::OrderStatus;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::InvalidArgument(msg) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_argument", msg)
        }
        DispatchError::InvalidState(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_state", msg)
        }
        DispatchError::Forbidden => json_error(StatusCode::FORBIDDEN, "forbidden", "forbidden"),
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::Deserialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            format!("{e:?}"),
        ),
        DispatchError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish_error", msg),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_product_type(s: &str) -> Result<ProductType, axum::response::Response> {
    match s.to_lowercase().as_str() {
        "physical" => Ok(ProductType::Physical),
        "digital" => Ok(ProductType::Digital),
        _ => Err(json_error(
            StatusCode::BAD_REQUEST,
            "invalid_product_type",
            "product_type must be one of: physical, digital",
        )),
    }
}

pub fn parse_stock_direction(s: &str) -> Result<StockDirection, axum::response::Response> {
    match s.to_lowercase().as_str() {
        "increment" => Ok(StockDirection::Increment),
        "decrement" => Ok(StockDirection::Decrement),
        _ => Err(json_error(
            StatusCode::BAD_REQUEST,
            "invalid_direction",
            "direction must be one of: increment, decrement",
        )),
    }
}

pub fn parse_order_status(s: &str) -> Result<OrderStatus, axum::response::Response> {
    match s.to_lowercase().as_str() {
        "pending" => Ok(OrderStatus::Pending),
        "shipped" => Ok(OrderStatus::Shipped),
        "delivered" => Ok(OrderStatus::Delivered),
        "rejected" => Ok(OrderStatus::Rejected),
        _ => Err(json_error(
            StatusCode::BAD_REQUEST,
            "invalid_status",
            "status must be one of: pending, shipped, delivered, rejected",
        )),
    }
}
