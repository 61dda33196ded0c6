//! `waxmarket-api` — HTTP binding for the marketplace core.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
