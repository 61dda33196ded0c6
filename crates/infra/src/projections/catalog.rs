use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use waxmarket_catalog::{Availability, ProductEvent, ProductId, ProductType};
use waxmarket_core::{AggregateId, AlbumId, ProviderId};
use waxmarket_events::EventEnvelope;

use crate::read_model::ReadModelStore;

/// Queryable catalog read model: current price, stock and flags per product.
///
/// Availability is **derived** on read (pure function of the stock counter),
/// never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub product_id: ProductId,
    pub provider_id: ProviderId,
    pub album_id: AlbumId,
    pub price_cents: u64,
    pub stock: i64,
    pub product_type: ProductType,
    pub active: bool,
    pub featured: bool,
}

impl CatalogEntry {
    pub fn availability(&self) -> Availability {
        Availability::from_stock(self.stock)
    }
}

#[derive(Debug, Error)]
pub enum CatalogProjectionError {
    #[error("failed to deserialize product event: {0}")]
    Deserialize(String),

    #[error("event product_id does not match envelope aggregate_id")]
    AggregateMismatch,

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Catalog availability projection.
///
/// Consumes published envelopes (JSON payloads) and maintains the read model
/// behind catalog search. Read models are disposable and rebuildable from the
/// event stream.
#[derive(Debug)]
pub struct CatalogProjection<S>
where
    S: ReadModelStore<ProductId, CatalogEntry>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> CatalogProjection<S>
where
    S: ReadModelStore<ProductId, CatalogEntry>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    /// Query the read model for one product.
    pub fn get(&self, product_id: &ProductId) -> Option<CatalogEntry> {
        self.store.get(product_id)
    }

    /// List all catalog entries (disposable read model).
    pub fn list(&self) -> Vec<CatalogEntry> {
        self.store.list()
    }

    /// All entries listed against one album.
    pub fn list_by_album(&self, album_id: AlbumId) -> Vec<CatalogEntry> {
        self.store
            .list()
            .into_iter()
            .filter(|e| e.album_id == album_id)
            .collect()
    }

    /// Is the same album available in the other sale format?
    ///
    /// True when some *other* active product on the same album has the
    /// alternative format and non-zero availability. `None` when the product
    /// itself is unknown.
    pub fn alternative_format_available(&self, product_id: &ProductId) -> Option<bool> {
        let entry = self.get(product_id)?;
        let wanted = entry.product_type.alternative();

        Some(self.list_by_album(entry.album_id).iter().any(|e| {
            e.product_id != entry.product_id
                && e.product_type == wanted
                && e.active
                && e.availability().is_available()
        }))
    }

    /// Apply a published envelope into the projection.
    ///
    /// - Enforces monotonic sequence per aggregate stream
    /// - Idempotent for at-least-once delivery (replays <= cursor are ignored)
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), CatalogProjectionError> {
        if envelope.aggregate_type() != "catalog.product" {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if let Ok(mut cursors) = self.cursors.write() {
            let last = *cursors.get(&aggregate_id).unwrap_or(&0);

            if seq == 0 {
                return Err(CatalogProjectionError::NonMonotonicSequence { last, found: seq });
            }

            if seq <= last {
                // Duplicate or replay; safe to ignore.
                return Ok(());
            }

            if seq != last + 1 && last != 0 {
                return Err(CatalogProjectionError::NonMonotonicSequence { last, found: seq });
            }

            let ev: ProductEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| CatalogProjectionError::Deserialize(e.to_string()))?;

            let product_id = match &ev {
                ProductEvent::ProductListed(e) => e.product_id,
                ProductEvent::PriceChanged(e) => e.product_id,
                ProductEvent::StockSet(e) => e.product_id,
                ProductEvent::StockAdjusted(e) => e.product_id,
                ProductEvent::FeaturedToggled(e) => e.product_id,
                ProductEvent::ActiveToggled(e) => e.product_id,
            };

            if product_id.0 != aggregate_id {
                return Err(CatalogProjectionError::AggregateMismatch);
            }

            match ev {
                ProductEvent::ProductListed(e) => {
                    self.store.upsert(
                        e.product_id,
                        CatalogEntry {
                            product_id: e.product_id,
                            provider_id: e.provider_id,
                            album_id: e.album_id,
                            price_cents: e.price_cents,
                            stock: e.stock,
                            product_type: e.product_type,
                            active: true,
                            featured: e.featured,
                        },
                    );
                }
                ProductEvent::PriceChanged(e) => {
                    if let Some(mut entry) = self.store.get(&e.product_id) {
                        entry.price_cents = e.price_cents;
                        self.store.upsert(e.product_id, entry);
                    }
                }
                ProductEvent::StockSet(e) => {
                    if let Some(mut entry) = self.store.get(&e.product_id) {
                        entry.stock = e.quantity;
                        self.store.upsert(e.product_id, entry);
                    }
                }
                ProductEvent::StockAdjusted(e) => {
                    if let Some(mut entry) = self.store.get(&e.product_id) {
                        entry.stock += e.delta;
                        self.store.upsert(e.product_id, entry);
                    }
                }
                ProductEvent::FeaturedToggled(e) => {
                    if let Some(mut entry) = self.store.get(&e.product_id) {
                        entry.featured = e.featured;
                        self.store.upsert(e.product_id, entry);
                    }
                }
                ProductEvent::ActiveToggled(e) => {
                    if let Some(mut entry) = self.store.get(&e.product_id) {
                        entry.active = e.active;
                        self.store.upsert(e.product_id, entry);
                    }
                }
            }

            // Advance cursor after successful apply.
            cursors.insert(aggregate_id, seq);
        }

        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), CatalogProjectionError> {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }
        self.store.clear();

        // Deterministic replay order: aggregate, then sequence.
        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}
