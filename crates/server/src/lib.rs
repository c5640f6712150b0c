#![warn(missing_docs)]
//! HBUP server: per-connection sessions, request dispatch and the TCP listener.

pub mod connection;
pub mod listener;
pub mod replay;
pub mod session;

pub use connection::{serve_connection, ConnectionEnd, ConnectionSummary};
pub use listener::{HbupServer, ServerOptions};
pub use replay::{ExchangeEntry, ExchangeLogger, ExchangeReplay, ReplayMismatch, ReplayReport};
pub use session::Session;
