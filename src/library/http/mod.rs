//! HTTP/1.1 request handling: the per-connection state machine, the
//! incremental parser it drives, response assembly into a fixed buffer,
//! and document-root resolution with memory-mapped file bodies.

pub mod connection;
pub mod parser;
pub mod resolve;
pub mod response;
pub mod types;

pub use connection::Connection;
pub use types::RequestOutcome;
