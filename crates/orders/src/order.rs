use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use waxmarket_catalog::ProductId;
use waxmarket_core::{money, Aggregate, AggregateId, AggregateRoot, DomainError, ProviderId, UserId};
use waxmarket_events::Event;

/// Order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Order-level shipping status.
///
/// Settable only by the external shipping workflow; orthogonal to per-item
/// fulfillment statuses and never derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Shipped,
    Delivered,
    Rejected,
}

/// Per-item fulfillment status (terminal once accepted/rejected).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Accepted,
    Rejected,
}

/// Derived order-level fulfillment progress, computed over item statuses.
///
/// Read-only projection; not persisted and not a state machine of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderFulfillment {
    Pending,
    PartiallyAccepted,
    Fulfilled,
    PartiallyRejected,
    Rejected,
}

/// Shipping destination captured at order creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub recipient: String,
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// A provider-scoped order line.
///
/// `provider_id` and `unit_price_cents` are facts captured at composition
/// time; later catalog edits never flow back into an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub line_no: u32,
    pub product_id: ProductId,
    pub provider_id: ProviderId,
    pub quantity: i64,
    pub unit_price_cents: u64,
    pub subtotal_cents: u64,
    pub status: ItemStatus,
    pub rejection_reason: Option<String>,
}

/// Input line for order placement (already resolved by the composer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineSpec {
    pub product_id: ProductId,
    pub provider_id: ProviderId,
    pub quantity: i64,
    pub unit_price_cents: u64,
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    buyer_id: Option<UserId>,
    order_number: String,
    payment_method: String,
    shipping: Option<ShippingAddress>,
    status: OrderStatus,
    items: Vec<OrderItem>,
    total_cents: u64,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            buyer_id: None,
            order_number: String::new(),
            payment_method: String::new(),
            shipping: None,
            status: OrderStatus::Pending,
            items: Vec::new(),
            total_cents: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn buyer_id(&self) -> Option<UserId> {
        self.buyer_id
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn payment_method(&self) -> &str {
        &self.payment_method
    }

    pub fn shipping(&self) -> Option<&ShippingAddress> {
        self.shipping.as_ref()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn total_cents(&self) -> u64 {
        self.total_cents
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    fn item(&self, line_no: u32) -> Option<&OrderItem> {
        self.items.iter().find(|i| i.line_no == line_no)
    }

    /// Ownership predicate for the authorization boundary: does line
    /// `line_no` belong to `provider_id`?
    pub fn line_belongs_to(&self, line_no: u32, provider_id: ProviderId) -> bool {
        self.item(line_no)
            .map(|i| i.provider_id == provider_id)
            .unwrap_or(false)
    }

    /// Does any item of this order still await a decision from `provider_id`?
    pub fn has_pending_items_for(&self, provider_id: ProviderId) -> bool {
        self.items
            .iter()
            .any(|i| i.provider_id == provider_id && i.status == ItemStatus::Pending)
    }

    /// Derive order-level fulfillment progress from item statuses.
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

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceOrder (composed output; one event, atomic).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub buyer_id: UserId,
    pub order_number: String,
    pub payment_method: String,
    pub shipping: ShippingAddress,
    pub items: Vec<OrderLineSpec>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AcceptItem (provider accepts their line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptItem {
    pub order_id: OrderId,
    pub provider_id: ProviderId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectItem (provider rejects their line; reason required).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectItem {
    pub order_id: OrderId,
    pub provider_id: ProviderId,
    pub line_no: u32,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateStatus (external shipping workflow only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStatus {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    AcceptItem(AcceptItem),
    RejectItem(RejectItem),
    UpdateStatus(UpdateStatus),
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub buyer_id: UserId,
    pub order_number: String,
    pub payment_method: String,
    pub shipping: ShippingAddress,
    pub items: Vec<OrderItem>,
    pub total_cents: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderItemAccepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemAccepted {
    pub order_id: OrderId,
    pub line_no: u32,
    pub provider_id: ProviderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderItemRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRejected {
    pub order_id: OrderId,
    pub line_no: u32,
    pub provider_id: ProviderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    OrderItemAccepted(OrderItemAccepted),
    OrderItemRejected(OrderItemRejected),
    OrderStatusChanged(OrderStatusChanged),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "orders.order.placed",
            OrderEvent::OrderItemAccepted(_) => "orders.order.item_accepted",
            OrderEvent::OrderItemRejected(_) => "orders.order.item_rejected",
            OrderEvent::OrderStatusChanged(_) => "orders.order.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::OrderItemAccepted(e) => e.occurred_at,
            OrderEvent::OrderItemRejected(e) => e.occurred_at,
            OrderEvent::OrderStatusChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.buyer_id = Some(e.buyer_id);
                self.order_number = e.order_number.clone();
                self.payment_method = e.payment_method.clone();
                self.shipping = Some(e.shipping.clone());
                self.status = OrderStatus::Pending;
                self.items = e.items.clone();
                self.total_cents = e.total_cents;
                self.created = true;
            }
            OrderEvent::OrderItemAccepted(e) => {
                if let Some(item) = self.items.iter_mut().find(|i| i.line_no == e.line_no) {
                    item.status = ItemStatus::Accepted;
                }
            }
            OrderEvent::OrderItemRejected(e) => {
                if let Some(item) = self.items.iter_mut().find(|i| i.line_no == e.line_no) {
                    item.status = ItemStatus::Rejected;
                    item.rejection_reason = Some(e.reason.clone());
                }
            }
            OrderEvent::OrderStatusChanged(e) => {
                self.status = e.status;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::AcceptItem(cmd) => self.handle_accept(cmd),
            OrderCommand::RejectItem(cmd) => self.handle_reject(cmd),
            OrderCommand::UpdateStatus(cmd) => self.handle_update_status(cmd),
        }
    }
}

impl Order {
    fn ensure_order_id(&self, order_id: OrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invalid_id("order_id mismatch".to_string()));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already placed"));
        }

        if cmd.items.is_empty() {
            return Err(DomainError::invalid_argument("order must have items"));
        }

        if cmd.payment_method.trim().is_empty() {
            return Err(DomainError::invalid_argument("payment method is required"));
        }

        let mut items = Vec::with_capacity(cmd.items.len());
        let mut total_cents: u64 = 0;

        // No merging of duplicate product ids: two input lines for the same
        // product stay two items.
        for (idx, spec) in cmd.items.iter().enumerate() {
            if spec.quantity < 1 {
                return Err(DomainError::invalid_argument("quantity must be at least 1"));
            }

            let subtotal_cents = money::subtotal(spec.unit_price_cents, spec.quantity);
            total_cents += subtotal_cents;

            items.push(OrderItem {
                line_no: (idx as u32) + 1,
                product_id: spec.product_id,
                provider_id: spec.provider_id,
                quantity: spec.quantity,
                unit_price_cents: spec.unit_price_cents,
                subtotal_cents,
                status: ItemStatus::Pending,
                rejection_reason: None,
            });
        }

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            order_id: cmd.order_id,
            buyer_id: cmd.buyer_id,
            order_number: cmd.order_number.clone(),
            payment_method: cmd.payment_method.clone(),
            shipping: cmd.shipping.clone(),
            items,
            total_cents,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn decidable_item(
        &self,
        order_id: OrderId,
        line_no: u32,
        provider_id: ProviderId,
    ) -> Result<&OrderItem, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_order_id(order_id)?;

        let item = self.item(line_no).ok_or(DomainError::NotFound)?;

        if item.provider_id != provider_id {
            return Err(DomainError::forbidden());
        }

        // Terminal states are final: re-deciding an item is an error.
        if item.status != ItemStatus::Pending {
            return Err(DomainError::invalid_state("order item is not pending"));
        }

        Ok(item)
    }

    fn handle_accept(&self, cmd: &AcceptItem) -> Result<Vec<OrderEvent>, DomainError> {
        self.decidable_item(cmd.order_id, cmd.line_no, cmd.provider_id)?;

        Ok(vec![OrderEvent::OrderItemAccepted(OrderItemAccepted {
            order_id: cmd.order_id,
            line_no: cmd.line_no,
            provider_id: cmd.provider_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectItem) -> Result<Vec<OrderEvent>, DomainError> {
        self.decidable_item(cmd.order_id, cmd.line_no, cmd.provider_id)?;

        if cmd.reason.trim().is_empty() {
            return Err(DomainError::invalid_argument("rejection reason is required"));
        }

        Ok(vec![OrderEvent::OrderItemRejected(OrderItemRejected {
            order_id: cmd.order_id,
            line_no: cmd.line_no,
            provider_id: cmd.provider_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_status(&self, cmd: &UpdateStatus) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_order_id(cmd.order_id)?;

        Ok(vec![OrderEvent::OrderStatusChanged(OrderStatusChanged {
            order_id: cmd.order_id,
            status: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waxmarket_core::AggregateId;

    fn test_order_id() -> OrderId {
        OrderId::new(AggregateId::new())
    }

    fn test_buyer_id() -> UserId {
        UserId::new()
    }

    fn test_provider_id() -> ProviderId {
        ProviderId::new()
    }

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn test_shipping() -> ShippingAddress {
        ShippingAddress {
            recipient: "Ada Lovelace".to_string(),
            street: "12 Analytical Row".to_string(),
            city: "London".to_string(),
            postal_code: "N1 9GU".to_string(),
            country: "GB".to_string(),
        }
    }

    fn place(order_id: OrderId, items: Vec<OrderLineSpec>) -> Order {
        let mut order = Order::empty(order_id);
        let cmd = PlaceOrder {
            order_id,
            buyer_id: test_buyer_id(),
            order_number: "ORD-20260805-101500".to_string(),
            payment_method: "card".to_string(),
            shipping: test_shipping(),
            items,
            occurred_at: test_time(),
        };
        let events = order.handle(&OrderCommand::PlaceOrder(cmd)).unwrap();
        order.apply(&events[0]);
        order
    }

    #[test]
    fn place_order_splits_lines_per_provider_and_totals() {
        let order_id = test_order_id();
        let provider_a = test_provider_id();
        let provider_b = test_provider_id();

        let order = place(
            order_id,
            vec![
                OrderLineSpec {
                    product_id: test_product_id(),
                    provider_id: provider_a,
                    quantity: 2,
                    unit_price_cents: 1500,
                },
                OrderLineSpec {
                    product_id: test_product_id(),
                    provider_id: provider_b,
                    quantity: 1,
                    unit_price_cents: 950,
                },
            ],
        );

        assert_eq!(order.items().len(), 2);
        assert_eq!(order.total_cents(), 3950);
        assert!(order
            .items()
            .iter()
            .all(|i| i.status == ItemStatus::Pending));
        assert_eq!(order.items()[0].provider_id, provider_a);
        assert_eq!(order.items()[0].subtotal_cents, 3000);
        assert_eq!(order.items()[1].provider_id, provider_b);
        assert_eq!(order.items()[1].subtotal_cents, 950);
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.fulfillment(), OrderFulfillment::Pending);
    }

    #[test]
    fn duplicate_product_lines_are_not_merged() {
        let provider = test_provider_id();
        let product = test_product_id();
        let order = place(
            test_order_id(),
            vec![
                OrderLineSpec {
                    product_id: product,
                    provider_id: provider,
                    quantity: 1,
                    unit_price_cents: 1000,
                },
                OrderLineSpec {
                    product_id: product,
                    provider_id: provider,
                    quantity: 3,
                    unit_price_cents: 1000,
                },
            ],
        );

        assert_eq!(order.items().len(), 2);
        assert_eq!(order.items()[0].line_no, 1);
        assert_eq!(order.items()[1].line_no, 2);
        assert_eq!(order.total_cents(), 4000);
    }

    #[test]
    fn place_order_rejects_empty_cart() {
        let order_id = test_order_id();
        let order = Order::empty(order_id);
        let cmd = PlaceOrder {
            order_id,
            buyer_id: test_buyer_id(),
            order_number: "ORD-20260805-101500".to_string(),
            payment_method: "card".to_string(),
            shipping: test_shipping(),
            items: vec![],
            occurred_at: test_time(),
        };
        let err = order.handle(&OrderCommand::PlaceOrder(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn place_order_rejects_zero_quantity() {
        let order_id = test_order_id();
        let order = Order::empty(order_id);
        let cmd = PlaceOrder {
            order_id,
            buyer_id: test_buyer_id(),
            order_number: "ORD-20260805-101500".to_string(),
            payment_method: "card".to_string(),
            shipping: test_shipping(),
            items: vec![OrderLineSpec {
                product_id: test_product_id(),
                provider_id: test_provider_id(),
                quantity: 0,
                unit_price_cents: 1000,
            }],
            occurred_at: test_time(),
        };
        let err = order.handle(&OrderCommand::PlaceOrder(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn accept_moves_item_to_terminal_state() {
        let order_id = test_order_id();
        let provider = test_provider_id();
        let mut order = place(
            order_id,
            vec![OrderLineSpec {
                product_id: test_product_id(),
                provider_id: provider,
                quantity: 1,
                unit_price_cents: 1000,
            }],
        );

        let accept = AcceptItem {
            order_id,
            provider_id: provider,
            line_no: 1,
            occurred_at: test_time(),
        };
        let events = order.handle(&OrderCommand::AcceptItem(accept)).unwrap();
        order.apply(&events[0]);
        assert_eq!(order.items()[0].status, ItemStatus::Accepted);

        // Terminal: a follow-up reject is refused.
        let reject = RejectItem {
            order_id,
            provider_id: provider,
            line_no: 1,
            reason: "changed my mind".to_string(),
            occurred_at: test_time(),
        };
        let err = order.handle(&OrderCommand::RejectItem(reject)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));

        // And so is a second accept.
        let accept_again = AcceptItem {
            order_id,
            provider_id: provider,
            line_no: 1,
            occurred_at: test_time(),
        };
        let err = order
            .handle(&OrderCommand::AcceptItem(accept_again))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn reject_requires_reason() {
        let order_id = test_order_id();
        let provider = test_provider_id();
        let order = place(
            order_id,
            vec![OrderLineSpec {
                product_id: test_product_id(),
                provider_id: provider,
                quantity: 1,
                unit_price_cents: 1000,
            }],
        );

        let reject = RejectItem {
            order_id,
            provider_id: provider,
            line_no: 1,
            reason: "   ".to_string(),
            occurred_at: test_time(),
        };
        let err = order.handle(&OrderCommand::RejectItem(reject)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn reject_records_reason() {
        let order_id = test_order_id();
        let provider = test_provider_id();
        let mut order = place(
            order_id,
            vec![OrderLineSpec {
                product_id: test_product_id(),
                provider_id: provider,
                quantity: 1,
                unit_price_cents: 1000,
            }],
        );

        let reject = RejectItem {
            order_id,
            provider_id: provider,
            line_no: 1,
            reason: "out of pressing".to_string(),
            occurred_at: test_time(),
        };
        let events = order.handle(&OrderCommand::RejectItem(reject)).unwrap();
        order.apply(&events[0]);
        assert_eq!(order.items()[0].status, ItemStatus::Rejected);
        assert_eq!(
            order.items()[0].rejection_reason.as_deref(),
            Some("out of pressing")
        );
    }

    #[test]
    fn foreign_provider_cannot_decide_an_item() {
        let order_id = test_order_id();
        let owner = test_provider_id();
        let intruder = test_provider_id();
        let order = place(
            order_id,
            vec![OrderLineSpec {
                product_id: test_product_id(),
                provider_id: owner,
                quantity: 1,
                unit_price_cents: 1000,
            }],
        );

        let accept = AcceptItem {
            order_id,
            provider_id: intruder,
            line_no: 1,
            occurred_at: test_time(),
        };
        assert_eq!(
            order.handle(&OrderCommand::AcceptItem(accept)).unwrap_err(),
            DomainError::Forbidden
        );
        assert!(order.line_belongs_to(1, owner));
        assert!(!order.line_belongs_to(1, intruder));
    }

    #[test]
    fn unknown_line_is_not_found() {
        let order_id = test_order_id();
        let provider = test_provider_id();
        let order = place(
            order_id,
            vec![OrderLineSpec {
                product_id: test_product_id(),
                provider_id: provider,
                quantity: 1,
                unit_price_cents: 1000,
            }],
        );

        let accept = AcceptItem {
            order_id,
            provider_id: provider,
            line_no: 9,
            occurred_at: test_time(),
        };
        assert_eq!(
            order.handle(&OrderCommand::AcceptItem(accept)).unwrap_err(),
            DomainError::NotFound
        );
    }

    #[test]
    fn fulfillment_is_derived_from_item_statuses() {
        let order_id = test_order_id();
        let provider_a = test_provider_id();
        let provider_b = test_provider_id();
        let mut order = place(
            order_id,
            vec![
                OrderLineSpec {
                    product_id: test_product_id(),
                    provider_id: provider_a,
                    quantity: 1,
                    unit_price_cents: 1000,
                },
                OrderLineSpec {
                    product_id: test_product_id(),
                    provider_id: provider_b,
                    quantity: 1,
                    unit_price_cents: 2000,
                },
            ],
        );
        assert_eq!(order.fulfillment(), OrderFulfillment::Pending);

        let events = order
            .handle(&OrderCommand::AcceptItem(AcceptItem {
                order_id,
                provider_id: provider_a,
                line_no: 1,
                occurred_at: test_time(),
            }))
            .unwrap();
        order.apply(&events[0]);
        assert_eq!(order.fulfillment(), OrderFulfillment::PartiallyAccepted);

        let events = order
            .handle(&OrderCommand::RejectItem(RejectItem {
                order_id,
                provider_id: provider_b,
                line_no: 2,
                reason: "warehouse flooded".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap();
        order.apply(&events[0]);
        assert_eq!(order.fulfillment(), OrderFulfillment::PartiallyRejected);
    }

    #[test]
    fn fulfillment_all_accepted_and_all_rejected() {
        let order_id = test_order_id();
        let provider = test_provider_id();
        let mut order = place(
            order_id,
            vec![OrderLineSpec {
                product_id: test_product_id(),
                provider_id: provider,
                quantity: 1,
                unit_price_cents: 1000,
            }],
        );

        let events = order
            .handle(&OrderCommand::AcceptItem(AcceptItem {
                order_id,
                provider_id: provider,
                line_no: 1,
                occurred_at: test_time(),
            }))
            .unwrap();
        order.apply(&events[0]);
        assert_eq!(order.fulfillment(), OrderFulfillment::Fulfilled);

        let mut rejected_order = place(
            order_id,
            vec![OrderLineSpec {
                product_id: test_product_id(),
                provider_id: provider,
                quantity: 1,
                unit_price_cents: 1000,
            }],
        );
        let events = rejected_order
            .handle(&OrderCommand::RejectItem(RejectItem {
                order_id,
                provider_id: provider,
                line_no: 1,
                reason: "sold out".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap();
        rejected_order.apply(&events[0]);
        assert_eq!(rejected_order.fulfillment(), OrderFulfillment::Rejected);
    }

    #[test]
    fn shipping_status_is_orthogonal_to_item_statuses() {
        let order_id = test_order_id();
        let provider = test_provider_id();
        let mut order = place(
            order_id,
            vec![OrderLineSpec {
                product_id: test_product_id(),
                provider_id: provider,
                quantity: 1,
                unit_price_cents: 1000,
            }],
        );

        let events = order
            .handle(&OrderCommand::UpdateStatus(UpdateStatus {
                order_id,
                status: OrderStatus::Shipped,
                occurred_at: test_time(),
            }))
            .unwrap();
        order.apply(&events[0]);

        assert_eq!(order.status(), OrderStatus::Shipped);
        // Items are untouched by the shipping workflow.
        assert_eq!(order.items()[0].status, ItemStatus::Pending);
        assert_eq!(order.fulfillment(), OrderFulfillment::Pending);
    }

    #[test]
    fn has_pending_items_for_tracks_provider_queues() {
        let order_id = test_order_id();
        let provider_a = test_provider_id();
        let provider_b = test_provider_id();
        let mut order = place(
            order_id,
            vec![
                OrderLineSpec {
                    product_id: test_product_id(),
                    provider_id: provider_a,
                    quantity: 1,
                    unit_price_cents: 1000,
                },
                OrderLineSpec {
                    product_id: test_product_id(),
                    provider_id: provider_b,
                    quantity: 1,
                    unit_price_cents: 2000,
                },
            ],
        );
        assert!(order.has_pending_items_for(provider_a));
        assert!(order.has_pending_items_for(provider_b));

        let events = order
            .handle(&OrderCommand::AcceptItem(AcceptItem {
                order_id,
                provider_id: provider_a,
                line_no: 1,
                occurred_at: test_time(),
            }))
            .unwrap();
        order.apply(&events[0]);

        assert!(!order.has_pending_items_for(provider_a));
        assert!(order.has_pending_items_for(provider_b));
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let order_id = test_order_id();
        let provider = test_provider_id();
        let order = place(
            order_id,
            vec![OrderLineSpec {
                product_id: test_product_id(),
                provider_id: provider,
                quantity: 1,
                unit_price_cents: 1000,
            }],
        );

        let accept = AcceptItem {
            order_id,
            provider_id: provider,
            line_no: 1,
            occurred_at: test_time(),
        };

        let before = order.clone();
        let events1 = order
            .handle(&OrderCommand::AcceptItem(accept.clone()))
            .unwrap();
        let events2 = order.handle(&OrderCommand::AcceptItem(accept)).unwrap();

        assert_eq!(order, before);
        assert_eq!(events1, events2);
    }

    #[test]
    fn version_increments_on_apply() {
        let order_id = test_order_id();
        let provider = test_provider_id();
        let mut order = place(
            order_id,
            vec![OrderLineSpec {
                product_id: test_product_id(),
                provider_id: provider,
                quantity: 1,
                unit_price_cents: 1000,
            }],
        );
        assert_eq!(order.version(), 1);

        let events = order
            .handle(&OrderCommand::AcceptItem(AcceptItem {
                order_id,
                provider_id: provider,
                line_no: 1,
                occurred_at: test_time(),
            }))
            .unwrap();
        order.apply(&events[0]);
        assert_eq!(order.version(), 2);
    }
}
