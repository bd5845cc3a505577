pub mod api;
pub mod config;
pub mod engine;
pub mod exchange;
pub mod feeds;
pub mod math;
pub mod strategies;
pub mod telemetry;
pub mod types;
