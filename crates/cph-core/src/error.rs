//! The user-facing error taxonomy.
//!
//! Every operation in this crate and in `cph-client` fails with
//! [`ReaderError`]. Codec errors from `cph-proto` are folded in via `From`,
//! keeping checksum and argument failures distinguishable from generic
//! frame/TLV damage.

use cph_proto::ProtocolError;
use cph_proto::codes::status_message;
use thiserror::Error;

/// Convenience alias used throughout the dispatcher and facade.
pub type Result<T> = std::result::Result<T, ReaderError>;

/// Errors surfaced to users of the reader client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReaderError {
    /// Generic transport-layer failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Establishing or using the connection failed
    #[error("connection error: {0}")]
    Connection(String),

    /// Reading from the transport failed
    #[error("read error: {0}")]
    Read(String),

    /// Writing to the transport failed
    #[error("write error: {0}")]
    Write(String),

    /// No response arrived within the configured window
    #[error("timeout waiting for response to command {code:#04x}")]
    Timeout {
        /// Command code that went unanswered
        code: u8,
    },

    /// Response structure violated the protocol
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A frame could not be parsed
    #[error("frame parse error: {0}")]
    FrameParse(String),

    /// Frame checksum validation failed
    #[error("checksum mismatch: calculated {calculated:#04x}, received {received:#04x}")]
    Checksum {
        /// Checksum computed locally
        calculated: u8,
        /// Checksum carried by the frame
        received: u8,
    },

    /// A TLV sequence could not be parsed
    #[error("TLV parse error: {0}")]
    TlvParse(String),

    /// The reader answered with a non-zero status code
    #[error("reader status {status:#04x}: {message}")]
    Command {
        /// Status byte from the status TLV
        status: u8,
        /// Message from the protocol's status table
        message: String,
    },

    /// A response arrived that no command was waiting for
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A caller-supplied value is outside its legal range
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The dispatcher was torn down while commands were pending
    #[error("dispatcher closed")]
    DispatcherClosed,

    /// A newer command with the same code took over the pending slot
    #[error("superseded by a newer command with code {code:#04x}")]
    Superseded {
        /// Command code the two requests shared
        code: u8,
    },
}

impl ReaderError {
    /// Build the error for a reader-reported status byte, attaching the
    /// protocol's message for that code.
    #[must_use]
    pub fn from_status(status: u8) -> Self {
        Self::Command { status, message: status_message(status) }
    }
}

impl From<ProtocolError> for ReaderError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::ShortInput { .. } | ProtocolError::NoHeader => {
                Self::FrameParse(err.to_string())
            },
            ProtocolError::ChecksumMismatch { calculated, received } => {
                Self::Checksum { calculated, received }
            },
            ProtocolError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            ProtocolError::TlvShortHeader { .. }
            | ProtocolError::TlvValueExceedsInput { .. }
            | ProtocolError::TlvValueTooLong { .. }
            | ProtocolError::InvalidTlvValue { .. } => Self::TlvParse(err.to_string()),
            ProtocolError::MissingTlv { .. } | ProtocolError::ParamLength { .. } => {
                Self::Protocol(err.to_string())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_carry_protocol_messages() {
        let err = ReaderError::from_status(0x14);
        assert_eq!(
            err,
            ReaderError::Command {
                status: 0x14,
                message: "PARAMETER_UNSUPPORTED: Unsupported parameter type.".to_string(),
            }
        );
    }

    #[test]
    fn protocol_errors_map_into_the_taxonomy() {
        assert!(matches!(
            ReaderError::from(ProtocolError::NoHeader),
            ReaderError::FrameParse(_)
        ));
        assert_eq!(
            ReaderError::from(ProtocolError::ChecksumMismatch { calculated: 1, received: 2 }),
            ReaderError::Checksum { calculated: 1, received: 2 }
        );
        assert!(matches!(
            ReaderError::from(ProtocolError::TlvShortHeader { available: 1 }),
            ReaderError::TlvParse(_)
        ));
        assert!(matches!(
            ReaderError::from(ProtocolError::InvalidArgument("x".to_string())),
            ReaderError::InvalidArgument(_)
        ));
        assert!(matches!(
            ReaderError::from(ProtocolError::MissingTlv { tag: 0x23 }),
            ReaderError::Protocol(_)
        ));
    }
}
