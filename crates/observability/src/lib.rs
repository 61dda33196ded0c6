//! `waxmarket-observability` — logging/tracing bootstrap.

mod tracing;

pub use self::tracing::init;
