//! Frame layout, checksum, and the stream framer.
//!
//! A CPH frame is, big-endian throughout:
//!
//! ```text
//! "RF" | frame_type(u8) | address(u16) | frame_code(u8) | param_len(u16)
//!      | parameters(param_len bytes) | checksum(u8)
//! ```
//!
//! The checksum is the two's complement of the byte sum of everything before
//! it, header included. The fixed 8-byte prefix is parsed zero-copy via a
//! `zerocopy` view; the minimum frame (empty parameters) is 9 bytes.
//!
//! # Invariants
//!
//! - A parsed frame's checksum always verifies and its parameter slice has
//!   exactly the declared length.
//! - [`find_and_parse_frame`] never consumes bytes of a frame that might
//!   still complete; it only discards on a checksum failure, and then only
//!   up to and including the offending `RF` marker (stream-resync rule).

use bytes::{Buf, Bytes, BytesMut};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::errors::{ProtocolError, Result};

/// Two-byte frame marker, ASCII `RF`.
pub const FRAME_HEADER: [u8; 2] = *b"RF";

/// Fixed bytes before the parameter region.
pub const FIXED_HEADER_LEN: usize = 8;

/// Smallest possible frame: fixed header + checksum, empty parameters.
pub const MIN_FRAME_LEN: usize = FIXED_HEADER_LEN + 1;

/// Frame type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Host-initiated command
    Command = 0x00,
    /// Reader response to a command
    Response = 0x01,
    /// Unsolicited reader notification
    Notification = 0x02,
}

impl FrameType {
    /// Wire value of this frame type.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Frame type for a wire value. `None` if unrecognized.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x00 => Self::Command,
            0x01 => Self::Response,
            0x02 => Self::Notification,
            _ => return None,
        })
    }
}

/// Fixed frame prefix, viewed zero-copy over received bytes.
///
/// Fields are raw byte arrays to keep the struct free of padding and valid
/// for any bit pattern; accessors decode Big Endian.
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct RawHeader {
    magic: [u8; 2],
    frame_type: u8,
    address: [u8; 2],
    frame_code: u8,
    param_len: [u8; 2],
}

impl RawHeader {
    fn address(&self) -> u16 {
        u16::from_be_bytes(self.address)
    }

    fn param_len(&self) -> u16 {
        u16::from_be_bytes(self.param_len)
    }
}

/// Result of [`parse_frame_header`]: one validated frame located inside the
/// input, with the indexes that delimit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFrame {
    /// Raw frame type byte (see [`FrameType::from_code`])
    pub frame_type: u8,
    /// 16-bit device address
    pub address: u16,
    /// Command or notification code
    pub frame_code: u8,
    /// Declared parameter length
    pub param_len: u16,
    /// Parameter region (exactly `param_len` bytes)
    pub parameters: Vec<u8>,
    /// Total frame length from the `RF` marker through the checksum
    pub total_len: usize,
    /// Offset of the `RF` marker within the input
    pub start: usize,
}

/// One frame extracted from the front of a stream buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFrame {
    /// Raw frame type byte
    pub frame_type: u8,
    /// 16-bit device address
    pub address: u16,
    /// Command or notification code
    pub frame_code: u8,
    /// Parameter region
    pub parameters: Bytes,
    /// Bytes drained from the buffer (junk prefix included)
    pub consumed: usize,
}

/// CPH checksum: two's complement of the byte sum, modulo 256.
#[must_use]
pub fn checksum(data: &[u8]) -> u8 {
    let sum = data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    (!sum).wrapping_add(1)
}

/// Locate the first `RF` marker in `data`.
fn find_header(data: &[u8]) -> Option<usize> {
    data.windows(FRAME_HEADER.len()).position(|w| w == FRAME_HEADER)
}

/// Assemble a complete frame from its fields.
///
/// # Errors
///
/// - `ProtocolError::InvalidArgument` if `parameters` exceeds the 16-bit
///   length field (65 535 bytes)
pub fn build_frame(
    frame_type: FrameType,
    address: u16,
    frame_code: u8,
    parameters: &[u8],
) -> Result<Vec<u8>> {
    let Ok(param_len) = u16::try_from(parameters.len()) else {
        return Err(ProtocolError::InvalidArgument(format!(
            "parameter length {} exceeds maximum of 65535 bytes",
            parameters.len()
        )));
    };

    let mut frame = Vec::with_capacity(MIN_FRAME_LEN + parameters.len());
    frame.extend_from_slice(&FRAME_HEADER);
    frame.push(frame_type.code());
    frame.extend_from_slice(&address.to_be_bytes());
    frame.push(frame_code);
    frame.extend_from_slice(&param_len.to_be_bytes());
    frame.extend_from_slice(parameters);
    frame.push(checksum(&frame));

    Ok(frame)
}

/// Locate and validate the first frame within `input`.
///
/// Scans for the `RF` marker, decodes the fixed header, checks that the full
/// declared length is present, and verifies the checksum.
///
/// # Errors
///
/// - `ProtocolError::ShortInput` if the input (or the data after the marker)
///   is shorter than the frame requires
/// - `ProtocolError::NoHeader` if no `RF` marker is present
/// - `ProtocolError::ChecksumMismatch` if the trailing byte disagrees with
///   the recomputed checksum
pub fn parse_frame_header(input: &[u8]) -> Result<ParsedFrame> {
    if input.len() < MIN_FRAME_LEN {
        return Err(ProtocolError::ShortInput {
            needed: MIN_FRAME_LEN,
            available: input.len(),
        });
    }

    let start = find_header(input).ok_or(ProtocolError::NoHeader)?;
    let frame = &input[start..];
    if frame.len() < MIN_FRAME_LEN {
        return Err(ProtocolError::ShortInput {
            needed: MIN_FRAME_LEN,
            available: frame.len(),
        });
    }

    let (header, _) = RawHeader::ref_from_prefix(frame).map_err(|_| {
        ProtocolError::ShortInput { needed: FIXED_HEADER_LEN, available: frame.len() }
    })?;

    let param_len = usize::from(header.param_len());
    let total_len = FIXED_HEADER_LEN + param_len + 1;
    if frame.len() < total_len {
        return Err(ProtocolError::ShortInput { needed: total_len, available: frame.len() });
    }

    let content = &frame[..total_len - 1];
    let received = frame[total_len - 1];
    let calculated = checksum(content);
    if calculated != received {
        return Err(ProtocolError::ChecksumMismatch { calculated, received });
    }

    Ok(ParsedFrame {
        frame_type: header.frame_type,
        address: header.address(),
        frame_code: header.frame_code,
        param_len: header.param_len(),
        parameters: content[FIXED_HEADER_LEN..].to_vec(),
        total_len,
        start,
    })
}

/// Attempt one frame extraction from the front of a stream buffer.
///
/// - A full, valid frame drains everything up to and including it and is
///   returned.
/// - No `RF` marker, or a marker whose frame has not fully arrived: the
///   buffer is left untouched and `None` is returned.
/// - A marker whose frame fails its checksum: the buffer is advanced past
///   that marker and `None` is returned, so the next call rescans from the
///   following byte. This may skip a valid frame whose `RF` bytes happen to
///   sit inside the corrupt region; resynchronization then happens on the
///   frame after it.
pub fn find_and_parse_frame(buffer: &mut BytesMut) -> Option<ExtractedFrame> {
    if buffer.len() < MIN_FRAME_LEN {
        return None;
    }

    match parse_frame_header(&buffer[..]) {
        Ok(parsed) => {
            let consumed = parsed.start + parsed.total_len;
            let drained = buffer.split_to(consumed).freeze();
            let param_start = parsed.start + FIXED_HEADER_LEN;
            let parameters =
                drained.slice(param_start..param_start + usize::from(parsed.param_len));
            Some(ExtractedFrame {
                frame_type: parsed.frame_type,
                address: parsed.address,
                frame_code: parsed.frame_code,
                parameters,
                consumed,
            })
        },
        Err(ProtocolError::NoHeader | ProtocolError::ShortInput { .. }) => None,
        Err(_) => {
            // Checksum failure: discard through the bad marker and resync.
            if let Some(start) = find_header(&buffer[..]) {
                buffer.advance(start + FRAME_HEADER.len());
            }
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    /// Get-version response: status 0, version 4.0.1, device type 5.
    const VERSION_RESPONSE: &str = "524601000040000B0701002003040001210105C5";

    fn frame_bytes(hex_str: &str) -> Vec<u8> {
        hex::decode(hex_str).unwrap()
    }

    #[test]
    fn checksum_known_vectors() {
        // Get-version command, empty parameters
        assert_eq!(checksum(&frame_bytes("5246000000400000")), 0x28);
        // Start-inventory command
        assert_eq!(checksum(&frame_bytes("5246000000210000")), 0x47);
        // Start-inventory response carrying a success status TLV
        assert_eq!(checksum(&frame_bytes("5246010000210003070100")), 0x3B);
    }

    #[test]
    fn build_get_version_command() {
        let frame = build_frame(FrameType::Command, 0x0000, 0x40, &[]).unwrap();
        assert_eq!(frame, frame_bytes("524600000040000028"));
    }

    #[test]
    fn build_rejects_oversized_parameters() {
        let params = vec![0u8; 0x1_0000];
        let result = build_frame(FrameType::Command, 0, 0x21, &params);
        assert!(matches!(result, Err(ProtocolError::InvalidArgument(_))));
    }

    #[test]
    fn parse_version_response() {
        let data = frame_bytes(VERSION_RESPONSE);
        let parsed = parse_frame_header(&data).unwrap();
        assert_eq!(parsed.frame_type, FrameType::Response.code());
        assert_eq!(parsed.address, 0x0000);
        assert_eq!(parsed.frame_code, 0x40);
        assert_eq!(parsed.param_len, 0x0B);
        assert_eq!(parsed.parameters, frame_bytes("0701002003040001210105"));
        assert_eq!(parsed.total_len, data.len());
        assert_eq!(parsed.start, 0);
    }

    #[test]
    fn parse_with_junk_prefix() {
        let mut data = frame_bytes("DEADBEEF");
        data.extend_from_slice(&frame_bytes(VERSION_RESPONSE));
        let parsed = parse_frame_header(&data).unwrap();
        assert_eq!(parsed.start, 4);
        assert_eq!(parsed.frame_code, 0x40);
    }

    #[test]
    fn parse_rejects_short_input() {
        let result = parse_frame_header(&frame_bytes("524601"));
        assert!(matches!(result, Err(ProtocolError::ShortInput { .. })));
    }

    #[test]
    fn parse_rejects_missing_header() {
        let result = parse_frame_header(&[0x01; 16]);
        assert_eq!(result, Err(ProtocolError::NoHeader));
    }

    #[test]
    fn parse_rejects_incomplete_frame() {
        // Declared parameter length of 0x0B with only 3 parameter bytes present
        let result = parse_frame_header(&frame_bytes("524601000040000B070100"));
        assert!(matches!(result, Err(ProtocolError::ShortInput { .. })));
    }

    #[test]
    fn parse_rejects_bad_checksum() {
        let mut data = frame_bytes(VERSION_RESPONSE);
        let last = data.len() - 1;
        data[last] ^= 0xFF;
        let result = parse_frame_header(&data);
        assert!(matches!(result, Err(ProtocolError::ChecksumMismatch { .. })));
    }

    #[test]
    fn any_single_bit_flip_is_detected() {
        let reference = frame_bytes(VERSION_RESPONSE);
        for byte in 0..reference.len() {
            for bit in 0..8 {
                let mut corrupted = reference.clone();
                corrupted[byte] ^= 1 << bit;
                assert!(
                    parse_frame_header(&corrupted).is_err(),
                    "flip of byte {byte} bit {bit} went undetected"
                );
            }
        }
    }

    #[test]
    fn stream_extracts_frame_behind_junk() {
        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(&[0x01, 0x02, 0x03]);
        buffer.extend_from_slice(&frame_bytes(VERSION_RESPONSE));

        let extracted = find_and_parse_frame(&mut buffer).unwrap();
        assert_eq!(extracted.frame_code, 0x40);
        assert_eq!(extracted.consumed, 3 + frame_bytes(VERSION_RESPONSE).len());
        assert!(buffer.is_empty());
    }

    #[test]
    fn stream_extracts_consecutive_frames() {
        let first = build_frame(FrameType::Response, 0, 0x21, &frame_bytes("070100")).unwrap();
        let second = frame_bytes(VERSION_RESPONSE);
        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(&first);
        buffer.extend_from_slice(&second);

        let f1 = find_and_parse_frame(&mut buffer).unwrap();
        assert_eq!(f1.frame_code, 0x21);
        let f2 = find_and_parse_frame(&mut buffer).unwrap();
        assert_eq!(f2.frame_code, 0x40);
        assert!(buffer.is_empty());
    }

    #[test]
    fn stream_waits_on_partial_frame() {
        let full = frame_bytes(VERSION_RESPONSE);
        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(&full[..12]);

        assert!(find_and_parse_frame(&mut buffer).is_none());
        assert_eq!(&buffer[..], &full[..12]);

        buffer.extend_from_slice(&full[12..]);
        let extracted = find_and_parse_frame(&mut buffer).unwrap();
        assert_eq!(extracted.frame_code, 0x40);
    }

    #[test]
    fn stream_resyncs_past_corrupt_frame() {
        let mut bad = frame_bytes(VERSION_RESPONSE);
        bad[10] ^= 0x01;
        let good = build_frame(FrameType::Notification, 0, 0x90, &[]).unwrap();

        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(&bad);
        buffer.extend_from_slice(&good);

        // First call discards through the corrupt marker
        assert!(find_and_parse_frame(&mut buffer).is_none());
        assert_eq!(buffer.len(), bad.len() + good.len() - 2);

        // Subsequent calls rescan until the heartbeat frame surfaces
        let mut extracted = None;
        for _ in 0..buffer.len() {
            if let Some(frame) = find_and_parse_frame(&mut buffer) {
                extracted = Some(frame);
                break;
            }
        }
        assert_eq!(extracted.unwrap().frame_code, 0x90);
    }

    #[test]
    fn stream_leaves_headerless_buffer_untouched() {
        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(&[0xAA; 32]);
        assert!(find_and_parse_frame(&mut buffer).is_none());
        assert_eq!(buffer.len(), 32);
    }

    proptest! {
        #[test]
        fn frame_round_trip(
            frame_type in prop::sample::select(vec![
                FrameType::Command, FrameType::Response, FrameType::Notification,
            ]),
            address in any::<u16>(),
            frame_code in any::<u8>(),
            parameters in prop::collection::vec(any::<u8>(), 0..256),
        ) {
            let wire = build_frame(frame_type, address, frame_code, &parameters).unwrap();
            let parsed = parse_frame_header(&wire).unwrap();

            prop_assert_eq!(parsed.frame_type, frame_type.code());
            prop_assert_eq!(parsed.address, address);
            prop_assert_eq!(parsed.frame_code, frame_code);
            prop_assert_eq!(usize::from(parsed.param_len), parameters.len());
            prop_assert_eq!(parsed.parameters, parameters);
            prop_assert_eq!(parsed.total_len, wire.len());
            prop_assert_eq!(parsed.start, 0);
        }

        #[test]
        fn empty_and_max_parameters_round_trip(len in prop::sample::select(vec![0usize, 255])) {
            let parameters = vec![0x5Au8; len];
            let wire = build_frame(FrameType::Command, 0, 0x31, &parameters).unwrap();
            let parsed = parse_frame_header(&wire).unwrap();
            prop_assert_eq!(parsed.parameters, parameters);
        }
    }
}
