//! `waxmarket-catalog` — the Product aggregate and stock ledger invariants.

pub mod product;

pub use product::{
    AdjustPricePercent, AdjustStock, Availability, ListProduct, Product, ProductCommand,
    ProductEvent, ProductId, ProductType, SetPrice, SetStock, StockDirection, ToggleActive,
    ToggleFeatured, DIGITAL_STOCK_SENTINEL, DIGITAL_STOCK_THRESHOLD, LOW_STOCK_THRESHOLD,
};
