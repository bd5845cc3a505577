pub mod auth;
pub mod client;
pub mod error;
pub mod models;

pub use client::KalshiClient;
pub use error::ExchangeError;
