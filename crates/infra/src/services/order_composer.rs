//! Order composition: one buyer cart, split across providers.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use waxmarket_catalog::{Product, ProductId};
use waxmarket_core::{AggregateId, UserId};
use waxmarket_events::{EventBus, EventEnvelope};
use waxmarket_orders::{Order, OrderCommand, OrderId, OrderLineSpec, PlaceOrder, ShippingAddress};

use crate::command_dispatcher::{rehydrate, CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, StoredEvent};

/// One requested cart line, as submitted by the buyer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Everything needed to compose an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub buyer_id: UserId,
    pub payment_method: String,
    pub shipping: ShippingAddress,
    pub lines: Vec<CartLine>,
}

/// The Order Composer.
///
/// Resolves each requested product's current owning provider and price,
/// freezes them into order lines, and persists the order as one atomic
/// `OrderPlaced` event. Any unresolvable product aborts the whole order —
/// no partial orders, nothing persisted.
///
/// Composition does **not** check or reserve stock; inventory moves only
/// through the stock ledger operations.
#[derive(Debug)]
pub struct OrderComposer<S, B> {
    store: S,
    dispatcher: CommandDispatcher<S, B>,
}

impl<S, B> OrderComposer<S, B>
where
    S: EventStore + Clone,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store: store.clone(),
            dispatcher: CommandDispatcher::new(store, bus),
        }
    }

    /// Compose and persist an order.
    ///
    /// `now` is the order's business timestamp; it also seeds the
    /// informational order number (`ORD-yyyyMMdd-HHmmss`, second-level
    /// granularity, no collision handling — the order id is the key).
    pub fn place_order(
        &self,
        new_order: NewOrder,
        now: DateTime<Utc>,
    ) -> Result<(OrderId, Vec<StoredEvent>), DispatchError> {
        if new_order.lines.is_empty() {
            return Err(DispatchError::InvalidArgument(
                "order must have items".to_string(),
            ));
        }

        // Resolve all products before writing anything. Price and provider
        // are captured here and never re-resolved.
        let mut specs = Vec::with_capacity(new_order.lines.len());
        for line in &new_order.lines {
            if line.quantity < 1 {
                return Err(DispatchError::InvalidArgument(
                    "quantity must be at least 1".to_string(),
                ));
            }

            let product = rehydrate::<Product, _>(&self.store, line.product_id.0, |id| {
                Product::empty(ProductId::new(id))
            })?;

            if !product.exists() {
                return Err(DispatchError::NotFound);
            }

            let provider_id = product.provider_id().ok_or(DispatchError::NotFound)?;

            specs.push(OrderLineSpec {
                product_id: line.product_id,
                provider_id,
                quantity: line.quantity,
                unit_price_cents: product.price_cents(),
            });
        }

        let aggregate_id = AggregateId::new();
        let order_id = OrderId::new(aggregate_id);

        let cmd = OrderCommand::PlaceOrder(PlaceOrder {
            order_id,
            buyer_id: new_order.buyer_id,
            order_number: format!("ORD-{}", now.format("%Y%m%d-%H%M%S")),
            payment_method: new_order.payment_method,
            shipping: new_order.shipping,
            items: specs,
            occurred_at: now,
        });

        let committed = self.dispatcher.dispatch::<Order>(
            aggregate_id,
            "orders.order",
            cmd,
            |id| Order::empty(OrderId::new(id)),
        )?;

        tracing::info!(order_id = %order_id, events = committed.len(), "order placed");

        Ok((order_id, committed))
    }
}
