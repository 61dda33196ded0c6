use serde::Deserialize;
use serde_json::json;

use waxmarket_catalog::Product;
use waxmarket_infra::projections::catalog::CatalogEntry;
use waxmarket_infra::projections::orders::OrderReadModel;

#[derive(Debug, Deserialize)]
pub struct ListProductRequest {
    pub album_id: String,
    pub price_cents: u64,
    pub stock: i64,
    pub product_type: String,
    #[serde(default)]
    pub featured: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub quantity: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub direction: String,
    pub amount: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BulkMutationRequest {
    PricePercent { percent: i64 },
    PriceSet { price_cents: u64 },
    StockSet { quantity: i64 },
    StockIncrement { amount: i64 },
    StockDecrement { amount: i64 },
    ToggleFeatured,
    ToggleActive,
}

#[derive(Debug, Deserialize)]
pub struct BulkUpdateRequest {
    pub product_ids: Vec<String>,
    pub mutation: BulkMutationRequest,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShippingAddressRequest {
    pub recipient: String,
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub payment_method: String,
    pub shipping: ShippingAddressRequest,
    pub lines: Vec<OrderLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct RejectItemRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

pub fn catalog_entry_to_json(
    entry: &CatalogEntry,
    alternative_format_available: Option<bool>,
) -> serde_json::Value {
    json!({
        "id": entry.product_id.0.to_string(),
        "provider_id": entry.provider_id.to_string(),
        "album_id": entry.album_id.to_string(),
        "price_cents": entry.price_cents,
        "stock": entry.stock,
        "product_type": entry.product_type,
        "active": entry.active,
        "featured": entry.featured,
        "availability": entry.availability(),
        "alternative_format_available": alternative_format_available,
    })
}

pub fn order_to_json(rm: &OrderReadModel) -> serde_json::Value {
    json!({
        "id": rm.order_id.0.to_string(),
        "buyer_id": rm.buyer_id.to_string(),
        "order_number": rm.order_number,
        "status": rm.status,
        "fulfillment": rm.fulfillment(),
        "total_cents": rm.total_cents,
        "items": rm.items.iter().map(|i| json!({
            "line_no": i.line_no,
            "product_id": i.product_id.0.to_string(),
            "provider_id": i.provider_id.to_string(),
            "quantity": i.quantity,
            "unit_price_cents": i.unit_price_cents,
            "subtotal_cents": i.subtotal_cents,
            "status": i.status,
            "rejection_reason": i.rejection_reason,
        })).collect::<Vec<_>>(),
    })
}

pub fn product_state_to_json(product: &Product) -> serde_json::Value {
    json!({
        "id": product.id_typed().0.to_string(),
        "provider_id": product.provider_id().map(|p| p.to_string()),
        "album_id": product.album_id().map(|a| a.to_string()),
        "price_cents": product.price_cents(),
        "stock": product.stock(),
        "product_type": product.product_type(),
        "active": product.is_active(),
        "featured": product.is_featured(),
        "availability": product.availability(),
    })
}
