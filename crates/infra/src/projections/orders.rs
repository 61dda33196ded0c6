use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use waxmarket_catalog::ProductId;
use waxmarket_core::{AggregateId, ProviderId, UserId};
use waxmarket_events::EventEnvelope;
use waxmarket_orders::{ItemStatus, OrderEvent, OrderFulfillment, OrderId, OrderStatus};

use crate::read_model::ReadModelStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItemReadModel {
    pub line_no: u32,
    pub product_id: ProductId,
    pub provider_id: ProviderId,
    pub quantity: i64,
    pub unit_price_cents: u64,
    pub subtotal_cents: u64,
    pub status: ItemStatus,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReadModel {
    pub order_id: OrderId,
    pub buyer_id: UserId,
    pub order_number: String,
    pub status: OrderStatus,
    pub total_cents: u64,
    pub items: Vec<OrderItemReadModel>,
}

impl OrderReadModel {
    pub fn has_pending_items_for(&self, provider_id: ProviderId) -> bool {
        self.items
            .iter()
            .any(|i| i.provider_id == provider_id && i.status == ItemStatus::Pending)
    }

    /// Same derivation as the aggregate's, recomputed over the read model.
    pub fn fulfillment(&self) -> OrderFulfillment {
        let total = self.items.len();
        let accepted = self
            .items
            .iter()
            .filter(|i| i.status == ItemStatus::Accepted)
            .count();
        let rejected = self
            .items
            .iter()
            .filter(|i| i.status == ItemStatus::Rejected)
            .count();

        if total == 0 || accepted + rejected == 0 {
            OrderFulfillment::Pending
        } else if accepted == total {
            OrderFulfillment::Fulfilled
        } else if rejected == total {
            OrderFulfillment::Rejected
        } else if rejected > 0 {
            OrderFulfillment::PartiallyRejected
        } else {
            OrderFulfillment::PartiallyAccepted
        }
    }
}

#[derive(Debug, Error)]
pub enum OrdersProjectionError {
    #[error("failed to deserialize order event: {0}")]
    Deserialize(String),

    #[error("event order_id does not match envelope aggregate_id")]
    AggregateMismatch,

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Orders projection.
///
/// Feeds buyer order history and each provider's pending-decision queue.
#[derive(Debug)]
pub struct OrdersProjection<S>
where
    S: ReadModelStore<OrderId, OrderReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> OrdersProjection<S>
where
    S: ReadModelStore<OrderId, OrderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, order_id: &OrderId) -> Option<OrderReadModel> {
        self.store.get(order_id)
    }

    pub fn list(&self) -> Vec<OrderReadModel> {
        self.store.list()
    }

    /// A buyer's order history.
    pub fn list_for_buyer(&self, buyer_id: UserId) -> Vec<OrderReadModel> {
        self.store
            .list()
            .into_iter()
            .filter(|o| o.buyer_id == buyer_id)
            .collect()
    }

    /// Orders with at least one PENDING item belonging to `provider_id`.
    pub fn pending_for_provider(&self, provider_id: ProviderId) -> Vec<OrderReadModel> {
        self.store
            .list()
            .into_iter()
            .filter(|o| o.has_pending_items_for(provider_id))
            .collect()
    }

    /// Apply a published envelope into the projection.
    ///
    /// - Enforces monotonic sequence per aggregate stream
    /// - Idempotent for at-least-once delivery (replays <= cursor are ignored)
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), OrdersProjectionError> {
        if envelope.aggregate_type() != "orders.order" {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if let Ok(mut cursors) = self.cursors.write() {
            let last = *cursors.get(&aggregate_id).unwrap_or(&0);

            if seq == 0 {
                return Err(OrdersProjectionError::NonMonotonicSequence { last, found: seq });
            }

            if seq <= last {
                return Ok(());
            }

            if seq != last + 1 && last != 0 {
                return Err(OrdersProjectionError::NonMonotonicSequence { last, found: seq });
            }

            let ev: OrderEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| OrdersProjectionError::Deserialize(e.to_string()))?;

            let order_id = match &ev {
                OrderEvent::OrderPlaced(e) => e.order_id,
                OrderEvent::OrderItemAccepted(e) => e.order_id,
                OrderEvent::OrderItemRejected(e) => e.order_id,
                OrderEvent::OrderStatusChanged(e) => e.order_id,
            };

            if order_id.0 != aggregate_id {
                return Err(OrdersProjectionError::AggregateMismatch);
            }

            match ev {
                OrderEvent::OrderPlaced(e) => {
                    let items = e
                        .items
                        .iter()
                        .map(|i| OrderItemReadModel {
                            line_no: i.line_no,
                            product_id: i.product_id,
                            provider_id: i.provider_id,
                            quantity: i.quantity,
                            unit_price_cents: i.unit_price_cents,
                            subtotal_cents: i.subtotal_cents,
                            status: i.status,
                            rejection_reason: i.rejection_reason.clone(),
                        })
                        .collect();

                    self.store.upsert(
                        e.order_id,
                        OrderReadModel {
                            order_id: e.order_id,
                            buyer_id: e.buyer_id,
                            order_number: e.order_number,
                            status: OrderStatus::Pending,
                            total_cents: e.total_cents,
                            items,
                        },
                    );
                }
                OrderEvent::OrderItemAccepted(e) => {
                    if let Some(mut rm) = self.store.get(&e.order_id) {
                        if let Some(item) = rm.items.iter_mut().find(|i| i.line_no == e.line_no) {
                            item.status = ItemStatus::Accepted;
                        }
                        self.store.upsert(e.order_id, rm);
                    }
                }
                OrderEvent::OrderItemRejected(e) => {
                    if let Some(mut rm) = self.store.get(&e.order_id) {
                        if let Some(item) = rm.items.iter_mut().find(|i| i.line_no == e.line_no) {
                            item.status = ItemStatus::Rejected;
                            item.rejection_reason = Some(e.reason.clone());
                        }
                        self.store.upsert(e.order_id, rm);
                    }
                }
                OrderEvent::OrderStatusChanged(e) => {
                    if let Some(mut rm) = self.store.get(&e.order_id) {
                        rm.status = e.status;
                        self.store.upsert(e.order_id, rm);
                    }
                }
            }

            cursors.insert(aggregate_id, seq);
        }

        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), OrdersProjectionError> {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }
        self.store.clear();

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}
