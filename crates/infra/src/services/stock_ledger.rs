//! Stock ledger application service.
//!
//! Thin wrapper over the dispatcher that serializes concurrent mutations on
//! one product: the store's optimistic append detects a lost update, and the
//! bounded retry loop re-reads and re-decides against fresh state.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use waxmarket_catalog::{
    AdjustStock, Product, ProductCommand, ProductId, SetStock, StockDirection,
};
use waxmarket_core::ProviderId;
use waxmarket_events::{EventBus, EventEnvelope};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, StoredEvent};

/// Retries on optimistic-concurrency conflicts before giving up.
///
/// Every conflict means another writer committed, so a retry loop makes
/// global progress; the bound only caps pathological contention.
const MAX_CONFLICT_RETRIES: u32 = 16;

/// The Stock Ledger service.
///
/// Every stock mutation in the system goes through here (or through the bulk
/// operator, which applies the same per-product invariants).
#[derive(Debug)]
pub struct StockLedger<S, B> {
    dispatcher: CommandDispatcher<S, B>,
}

impl<S, B> StockLedger<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: S, bus: B) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(store, bus),
        }
    }

    /// Replace a product's stock counter (absolute, idempotent).
    pub fn set_stock(
        &self,
        provider_id: ProviderId,
        product_id: ProductId,
        quantity: i64,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatch_with_retry(
            product_id,
            ProductCommand::SetStock(SetStock {
                provider_id,
                product_id,
                quantity,
                reason,
                occurred_at: now,
            }),
        )
    }

    /// Adjust a product's stock counter (relative, all-or-nothing).
    pub fn adjust_stock(
        &self,
        provider_id: ProviderId,
        product_id: ProductId,
        direction: StockDirection,
        amount: i64,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatch_with_retry(
            product_id,
            ProductCommand::AdjustStock(AdjustStock {
                provider_id,
                product_id,
                direction,
                amount,
                reason,
                occurred_at: now,
            }),
        )
    }

    fn dispatch_with_retry(
        &self,
        product_id: ProductId,
        command: ProductCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let mut last_conflict = String::new();

        for attempt in 0..MAX_CONFLICT_RETRIES {
            match self.dispatcher.dispatch::<Product>(
                product_id.0,
                "catalog.product",
                command.clone(),
                |id| Product::empty(ProductId::new(id)),
            ) {
                Err(DispatchError::Concurrency(msg)) => {
                    tracing::debug!(
                        product_id = %product_id,
                        attempt,
                        "stock mutation lost the optimistic race, retrying"
                    );
                    last_conflict = msg;
                }
                other => return other,
            }
        }

        Err(DispatchError::Concurrency(last_conflict))
    }
}
