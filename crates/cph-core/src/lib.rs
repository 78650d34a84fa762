//! Transport contract and request/response dispatcher for CPH readers.
//!
//! This crate sits between the pure codec (`cph-proto`) and the typed facade
//! (`cph-client`):
//!
//! - [`transport`]: the narrow async byte-stream capability the dispatcher
//!   consumes (connect, disconnect, send, receive-sink registration), plus a
//!   queue-backed [`transport::MockTransport`] test seam
//! - [`dispatcher`]: receive-buffer assembly, frame routing, the
//!   pending-request table keyed by command code, notification fan-out, and
//!   per-command timeouts
//! - [`error`]: the single user-facing error taxonomy
//!
//! Concrete serial/TCP/UDP transports implement [`transport::Transport`]
//! outside this crate.

pub mod dispatcher;
pub mod error;
pub mod transport;

pub use dispatcher::{Dispatcher, NotificationHandler};
pub use error::ReaderError;
pub use transport::{DataSink, MockTransport, Transport};
