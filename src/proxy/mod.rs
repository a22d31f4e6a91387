pub mod context;
pub mod forwarder;
mod handler;
pub mod sanitize;

pub use context::BoxBody;
pub use handler::dispatch;
