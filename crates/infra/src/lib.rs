//! `waxmarket-infra` — infrastructure composition for the marketplace core.
//!
//! Event store, command dispatch pipeline, application services (order
//! composition, stock ledger, bulk inventory) and read-model projections.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod services;
