pub mod api;
pub mod clock;
pub mod config;
pub mod engine;
pub mod market_data;
pub mod persist;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;
