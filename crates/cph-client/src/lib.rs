//! Typed async client for CPH UHF RFID readers.
//!
//! [`Reader`] is the high-level facade: one method per protocol operation,
//! each combining a request encoder, a dispatcher round-trip, and a typed
//! response decoder. Subscriptions deliver decoded tag reads, heartbeats,
//! and record uploads to async handlers.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cph_client::{Reader, ReaderOptions};
//! use cph_core::MockTransport;
//!
//! # async fn demo() -> Result<(), cph_core::ReaderError> {
//! let transport = Arc::new(MockTransport::new());
//! let reader = Reader::connect(transport, ReaderOptions::default()).await?;
//! let info = reader.get_version().await?;
//! println!("firmware {}", info.software_version);
//! reader.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod identify;
pub mod reader;

pub use cph_core::{MockTransport, ReaderError, Transport};
pub use cph_proto::commands::{DeviceInfo, TagReadData};
pub use identify::{TagIdentification, identify_tag, load_tag_definitions};
pub use reader::{ConnectionState, Reader, ReaderOptions, TagHandler};
