//! API Module
//!
//! Remote service boundary: method dispatch, the per-client PIN session,
//! and the HTTP transport.

pub mod client;
pub mod operations;
pub mod session;
pub mod transport;

pub use client::{Client, SweepPreparation};
pub use operations::{CallKind, OperationTable};
pub use session::Session;
pub use transport::{parse_response, HttpTransport, Transport, TransportResponse};
