//! Codec error types.
//!
//! Everything in this crate fails with [`ProtocolError`]. The dispatcher
//! layer (`cph-core`) maps these into its user-facing error taxonomy, so
//! variants here stay close to the wire: they name the frame or TLV field
//! that was malformed and the sizes involved.

use thiserror::Error;

/// Convenience alias used throughout the codec.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding CPH wire data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Input ends before a complete frame.
    #[error("input too short: need {needed} bytes, have {available}")]
    ShortInput {
        /// Bytes required for the structure being parsed
        needed: usize,
        /// Bytes actually available
        available: usize,
    },

    /// No `RF` marker anywhere in the input.
    #[error("frame header 'RF' not found")]
    NoHeader,

    /// Recomputed checksum disagrees with the frame's trailing byte.
    #[error("checksum mismatch: calculated {calculated:#04x}, received {received:#04x}")]
    ChecksumMismatch {
        /// Checksum computed over the received frame content
        calculated: u8,
        /// Checksum byte carried by the frame
        received: u8,
    },

    /// A caller-supplied value is outside its legal range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Fewer than the two bytes needed for a TLV tag + length.
    #[error("TLV header truncated: need 2 bytes, have {available}")]
    TlvShortHeader {
        /// Bytes remaining in the input
        available: usize,
    },

    /// A TLV's declared length runs past the end of the input.
    #[error(
        "TLV {tag:#04x} value exceeds input: declared {declared} bytes, {available} available"
    )]
    TlvValueExceedsInput {
        /// Tag of the offending TLV
        tag: u8,
        /// Length declared by the TLV header
        declared: usize,
        /// Bytes actually remaining after the header
        available: usize,
    },

    /// A TLV value cannot exceed 255 bytes (one-byte length field).
    #[error("TLV value too long: {len} bytes exceeds 255")]
    TlvValueTooLong {
        /// Length of the rejected value
        len: usize,
    },

    /// A recognized tag carried a value that does not match its layout.
    #[error("invalid value for TLV {tag:#04x}: {reason}")]
    InvalidTlvValue {
        /// Tag whose typed decoder rejected the value
        tag: u8,
        /// What was wrong with it
        reason: String,
    },

    /// A response is missing a TLV the command decoder requires.
    #[error("required TLV {tag:#04x} missing in response")]
    MissingTlv {
        /// Tag the decoder looked for
        tag: u8,
    },

    /// A fixed-layout parameter block had the wrong size.
    #[error("parameter block length mismatch: expected {expected} bytes, got {actual}")]
    ParamLength {
        /// Size the block's layout requires
        expected: usize,
        /// Size that was supplied
        actual: usize,
    },
}
