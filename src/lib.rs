pub mod checker;
pub mod config;
pub mod error;
pub mod metrics;
pub mod mitm;
pub mod pool;
pub mod proxy;
pub mod server;
pub mod transport;

pub use error::ProxyError;
