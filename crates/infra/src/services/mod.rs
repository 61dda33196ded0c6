mod bulk_inventory;
mod order_composer;
mod stock_ledger;

pub use bulk_inventory::{BulkInventoryOperator, BulkMutation, BulkUpdate};
pub use order_composer::{CartLine, NewOrder, OrderComposer};
pub use stock_ledger::StockLedger;
