//! `waxmarket-orders` — the Order aggregate and per-item fulfillment machine.

pub mod order;

pub use order::{
    AcceptItem, ItemStatus, Order, OrderCommand, OrderEvent, OrderFulfillment, OrderId, OrderItem,
    OrderLineSpec, OrderStatus, PlaceOrder, RejectItem, ShippingAddress, UpdateStatus,
};
