pub mod breaker;
pub mod client;
pub mod config;
pub mod connection;
pub mod h2;
pub mod negotiator;
pub mod pool;
pub mod stream;
pub mod types;
pub mod utils;

pub use breaker::{BreakerPersistence, BreakerState, CircuitBreaker};
pub use client::HttpClient;
pub use config::ClientConfig;
pub use h2::protocol::H2;
pub use negotiator::{NegotiatedProtocol, ProtocolNegotiator};
pub use pool::{ConnectionPool, PoolKey};
pub use types::*;
pub use utils::*;
