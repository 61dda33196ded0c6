//! Bulk inventory operator: one mutation across a provider-owned product set.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use waxmarket_catalog::{
    AdjustPricePercent, AdjustStock, Product, ProductCommand, ProductId, SetPrice, SetStock,
    StockDirection, ToggleActive, ToggleFeatured,
};
use waxmarket_core::{Aggregate, AggregateRoot, ExpectedVersion, ProviderId};
use waxmarket_events::{EventBus, EventEnvelope};

use crate::command_dispatcher::{rehydrate, DispatchError};
use crate::event_store::{EventStore, UncommittedEvent};

/// The single mutation applied to every product in the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkMutation {
    /// Percentage price change, rounded half-up, floored at zero.
    PricePercent(i64),
    /// Absolute price in cents.
    PriceSet(u64),
    /// Absolute stock quantity.
    StockSet(i64),
    StockIncrement(i64),
    StockDecrement(i64),
    ToggleFeatured,
    ToggleActive,
}

/// A bulk update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkUpdate {
    pub product_ids: Vec<ProductId>,
    pub mutation: BulkMutation,
    pub reason: Option<String>,
}

/// The Bulk Inventory Operator.
///
/// Applies one mutation across a product set as a single logical unit:
/// every product is resolved and the **entire** batch is ownership-checked
/// and validated before any product is mutated. A failure anywhere aborts
/// the whole batch with nothing written.
#[derive(Debug)]
pub struct BulkInventoryOperator<S, B> {
    store: S,
    bus: B,
}

impl<S, B> BulkInventoryOperator<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    /// Apply `update` to every product in the batch.
    ///
    /// `acting` is the requesting provider; `None` is the admin override,
    /// which skips the ownership gate and issues each command as the
    /// product's own provider. Returns the updated product states.
    pub fn apply(
        &self,
        acting: Option<ProviderId>,
        update: BulkUpdate,
        now: DateTime<Utc>,
    ) -> Result<Vec<Product>, DispatchError> {
        if update.product_ids.is_empty() {
            return Err(DispatchError::InvalidArgument(
                "no products selected".to_string(),
            ));
        }

        // Phase 1: resolve the whole batch.
        let mut products = Vec::with_capacity(update.product_ids.len());
        for product_id in &update.product_ids {
            let product = rehydrate::<Product, _>(&self.store, product_id.0, |id| {
                Product::empty(ProductId::new(id))
            })?;
            if !product.exists() {
                return Err(DispatchError::NotFound);
            }
            products.push(product);
        }

        // Phase 2: ownership across the entire batch, before any write.
        if let Some(provider_id) = acting {
            if products.iter().any(|p| !p.is_owned_by(provider_id)) {
                return Err(DispatchError::Forbidden);
            }
        }

        // Phase 3: decide events for every product (pure). Any validation
        // failure aborts the batch with nothing persisted.
        let mut staged = Vec::with_capacity(products.len());
        for product in products {
            let issuer = acting
                .or_else(|| product.provider_id())
                .ok_or(DispatchError::NotFound)?;
            let cmd = command_for(&product, issuer, &update.mutation, &update.reason, now);
            let events = product.handle(&cmd).map_err(DispatchError::from)?;
            staged.push((product, events));
        }

        // Phase 4: commit. Validation is complete; a conflict here means a
        // concurrent writer raced the batch and surfaces as Concurrency.
        let mut updated = Vec::with_capacity(staged.len());
        for (mut product, events) in staged {
            let expected = ExpectedVersion::Exact(product.version());
            let uncommitted = events
                .iter()
                .map(|ev| {
                    UncommittedEvent::from_typed(
                        product.id_typed().0,
                        "catalog.product",
                        Uuid::now_v7(),
                        ev,
                    )
                })
                .collect::<Result<Vec<_>, _>>()?;

            let committed = self.store.append(uncommitted, expected)?;

            for stored in &committed {
                self.bus
                    .publish(stored.to_envelope())
                    .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
            }

            for event in &events {
                product.apply(event);
            }
            updated.push(product);
        }

        tracing::info!(products = updated.len(), "bulk inventory update applied");

        Ok(updated)
    }
}

fn command_for(
    product: &Product,
    issuer: ProviderId,
    mutation: &BulkMutation,
    reason: &Option<String>,
    now: DateTime<Utc>,
) -> ProductCommand {
    let product_id = product.id_typed();
    match mutation {
        BulkMutation::PricePercent(percent) => {
            ProductCommand::AdjustPricePercent(AdjustPricePercent {
                provider_id: issuer,
                product_id,
                percent: *percent,
                occurred_at: now,
            })
        }
        BulkMutation::PriceSet(price_cents) => ProductCommand::SetPrice(SetPrice {
            provider_id: issuer,
            product_id,
            price_cents: *price_cents,
            occurred_at: now,
        }),
        BulkMutation::StockSet(quantity) => ProductCommand::SetStock(SetStock {
            provider_id: issuer,
            product_id,
            quantity: *quantity,
            reason: reason.clone(),
            occurred_at: now,
        }),
        BulkMutation::StockIncrement(amount) => ProductCommand::AdjustStock(AdjustStock {
            provider_id: issuer,
            product_id,
            direction: StockDirection::Increment,
            amount: *amount,
            reason: reason.clone(),
            occurred_at: now,
        }),
        BulkMutation::StockDecrement(amount) => ProductCommand::AdjustStock(AdjustStock {
            provider_id: issuer,
            product_id,
            direction: StockDirection::Decrement,
            amount: *amount,
            reason: reason.clone(),
            occurred_at: now,
        }),
        BulkMutation::ToggleFeatured => ProductCommand::ToggleFeatured(ToggleFeatured {
            provider_id: issuer,
            product_id,
            occurred_at: now,
        }),
        BulkMutation::ToggleActive => ProductCommand::ToggleActive(ToggleActive {
            provider_id: issuer,
            product_id,
            occurred_at: now,
        }),
    }
}
