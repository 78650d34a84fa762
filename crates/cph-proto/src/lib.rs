//! Wire codec for the CPH UHF RFID reader protocol (v4.0.1).
//!
//! CPH readers speak a framed binary protocol over serial, TCP, or UDP.
//! Every message is an `RF`-headed frame carrying a sequence of one-byte-tag,
//! one-byte-length TLV units. This crate implements the byte-exact codec:
//!
//! - [`frame`]: frame layout, negated-sum checksum, and the stream framer
//!   with its resynchronization rule
//! - [`tlv`]: TLV parsing/building plus typed decoders for every recognized
//!   tag (status, version, RSSI, time, operation, single-parameter, nested
//!   tag containers)
//! - [`params`]: fixed-layout parameter blocks (working, transport, advance,
//!   ext, USB, data-flag, Modbus)
//! - [`commands`]: per-command request encoders and response decoders
//!
//! The crate is pure computation: no I/O, no logging, no runtime dependency.
//! Transports and the request/response dispatcher live in `cph-core`.

pub mod codes;
pub mod commands;
pub mod frame;
pub mod params;
pub mod time;
pub mod tlv;

mod errors;

pub use errors::{ProtocolError, Result};
pub use frame::{ExtractedFrame, FrameType, ParsedFrame};
pub use time::CphTime;
pub use tlv::{TlvMap, TlvValue};
