pub mod merge;
pub mod persist_queue;
pub mod resolver;
pub mod single_flight;
pub mod types;
