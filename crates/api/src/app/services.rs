use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};

use waxmarket_catalog::ProductId;
use waxmarket_core::{Aggregate, AggregateId, DomainError};
use waxmarket_events::{EventBus, EventEnvelope, InMemoryEventBus};
use waxmarket_infra::{
    command_dispatcher::{CommandDispatcher, DispatchError},
    event_store::{InMemoryEventStore, StoredEvent},
    projections::{
        catalog::{CatalogEntry, CatalogProjection},
        orders::{OrderReadModel, OrdersProjection},
    },
    read_model::InMemoryReadModelStore,
    services::{BulkInventoryOperator, OrderComposer, StockLedger},
};
use waxmarket_orders::OrderId;

pub type Store = Arc<InMemoryEventStore>;
pub type Bus = Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>;

type Dispatcher = CommandDispatcher<Store, Bus>;
type CatalogView = CatalogProjection<Arc<InMemoryReadModelStore<ProductId, CatalogEntry>>>;
type OrdersView = OrdersProjection<Arc<InMemoryReadModelStore<OrderId, OrderReadModel>>>;

/// Realtime notification broadcasted via SSE.
///
/// This is the notification collaborator's consumption surface: "stock
/// changed" and "order item status changed" events fan out here after they
/// are persisted and published on the bus.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeMessage {
    pub topic: String,
    pub payload: serde_json::Value,
}

pub struct AppServices {
    dispatcher: Dispatcher,
    store: Store,
    bus: Bus,
    catalog_projection: Arc<CatalogView>,
    orders_projection: Arc<OrdersView>,
    composer: OrderComposer<Store, Bus>,
    stock_ledger: StockLedger<Store, Bus>,
    bulk_operator: BulkInventoryOperator<Store, Bus>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
}

impl AppServices {
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: waxmarket_events::Event + Serialize + DeserializeOwned,
    {
        self.dispatcher
            .dispatch(aggregate_id, aggregate_type, command, make_aggregate)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn catalog(&self) -> &CatalogView {
        &self.catalog_projection
    }

    pub fn orders(&self) -> &OrdersView {
        &self.orders_projection
    }

    pub fn composer(&self) -> &OrderComposer<Store, Bus> {
        &self.composer
    }

    pub fn stock_ledger(&self) -> &StockLedger<Store, Bus> {
        &self.stock_ledger
    }

    pub fn bulk_operator(&self) -> &BulkInventoryOperator<Store, Bus> {
        &self.bulk_operator
    }
}

/// In-memory infra wiring: store + bus + projections + services.
pub fn build_services() -> Arc<AppServices> {
    let store: Store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let dispatcher = CommandDispatcher::new(store.clone(), bus.clone());

    let catalog_store: Arc<InMemoryReadModelStore<ProductId, CatalogEntry>> =
        Arc::new(InMemoryReadModelStore::new());
    let catalog_projection = Arc::new(CatalogProjection::new(catalog_store));

    let orders_store: Arc<InMemoryReadModelStore<OrderId, OrderReadModel>> =
        Arc::new(InMemoryReadModelStore::new());
    let orders_projection = Arc::new(OrdersProjection::new(orders_store));

    let (realtime_tx, _) = broadcast::channel::<RealtimeMessage>(256);

    // Projection worker: subscribe before any command can publish, apply
    // envelopes to the read models, and fan out realtime notifications
    // (lossy; no backpressure on the core).
    let catalog_clone = catalog_projection.clone();
    let orders_clone = orders_projection.clone();
    let bus_clone = bus.clone();
    let tx_clone = realtime_tx.clone();
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<()>();
    std::thread::spawn(move || {
        let sub = bus_clone.subscribe();
        let _ = ready_tx.send(());
        loop {
            match sub.recv() {
                Ok(env) => {
                    if let Err(e) = catalog_clone.apply_envelope(&env) {
                        tracing::error!(error = ?e, "catalog projection failed to apply envelope");
                    }
                    if let Err(e) = orders_clone.apply_envelope(&env) {
                        tracing::error!(error = ?e, "orders projection failed to apply envelope");
                    }

                    let _ = tx_clone.send(RealtimeMessage {
                        topic: topic_for(&env),
                        payload: env.payload().clone(),
                    });
                }
                Err(_) => break,
            }
        }
    });
    let _ = ready_rx.recv_timeout(std::time::Duration::from_secs(1));

    let composer = OrderComposer::new(store.clone(), bus.clone());
    let stock_ledger = StockLedger::new(store.clone(), bus.clone());
    let bulk_operator = BulkInventoryOperator::new(store.clone(), bus.clone());

    Arc::new(AppServices {
        dispatcher,
        store,
        bus,
        catalog_projection,
        orders_projection,
        composer,
        stock_ledger,
        bulk_operator,
        realtime_tx,
    })
}

/// Topic for a published envelope, e.g. "orders.order/OrderItemAccepted".
fn topic_for(env: &EventEnvelope<serde_json::Value>) -> String {
    let variant = env
        .payload()
        .as_object()
        .and_then(|o| o.keys().next().cloned());

    match variant {
        Some(v) => format!("{}/{}", env.aggregate_type(), v),
        None => env.aggregate_type().to_string(),
    }
}

/// SSE stream of realtime notifications for the authenticated caller.
pub fn sse_stream(
    services: Arc<AppServices>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(m) => SseEvent::default().json_data(&m).ok().map(Ok),
        // Lagged receivers just skip; the stream itself stays alive.
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
