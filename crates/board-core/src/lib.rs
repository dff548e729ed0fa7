//! Board comment threads (cache, sources, pagination, config, telemetry).

pub mod cache;
pub mod config;
pub mod pagination;
pub mod sources;
pub mod telemetry;

pub use board_types as types;
