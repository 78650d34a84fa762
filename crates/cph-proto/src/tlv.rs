//! Tag-length-value codec.
//!
//! The parameter region of every frame is a sequence of TLVs with a one-byte
//! tag and a one-byte length (values are therefore capped at 255 bytes).
//! Parsing is strict: a recognized tag whose value does not match its
//! documented layout is rejected with `InvalidTlvValue`, and a trailing
//! partial TLV fails the whole sequence rather than being dropped.
//!
//! Unrecognized tags pass through as raw bytes so firmware additions do not
//! break decoding.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::codes::{OperationType, ParamType};
use crate::errors::{ProtocolError, Result};
use crate::params::{AdvanceParams, ExtParams, TransportParams, WorkingParams};
use crate::time::CphTime;

/// TLV tag namespace (flat, one byte).
pub mod tags {
    /// Tag EPC (hex-decoded to an uppercase string)
    pub const EPC: u8 = 0x01;
    /// User memory bank data
    pub const USER_DATA: u8 = 0x02;
    /// Reserved memory bank data (access/kill passwords)
    pub const RESERVE_DATA: u8 = 0x03;
    /// TID memory bank data
    pub const TID_DATA: u8 = 0x04;
    /// Signed-byte RSSI
    pub const RSSI: u8 = 0x05;
    /// Timestamp (7-byte calendar or 4-byte legacy)
    pub const TIME: u8 = 0x06;
    /// Response status code
    pub const STATUS: u8 = 0x07;
    /// Tag memory operation descriptor
    pub const OPERATION: u8 = 0x08;
    /// Antenna number
    pub const ANT_NO: u8 = 0x0A;
    /// Firmware version triple
    pub const SOFTWARE_VERSION: u8 = 0x20;
    /// Device type code
    pub const DEVICE_TYPE: u8 = 0x21;
    /// Working parameter block
    pub const WORKING_PARAM: u8 = 0x23;
    /// Transport parameter block
    pub const TRANSPORT_PARAM: u8 = 0x24;
    /// Advance (RF) parameter block
    pub const ADVANCE_PARAM: u8 = 0x25;
    /// Single-parameter container (type byte + value)
    pub const SINGLE_PARAMETER: u8 = 0x26;
    /// Relay state
    pub const RELAY: u8 = 0x27;
    /// Audio payload
    pub const AUDIO_TEXT: u8 = 0x28;
    /// Extended parameter block
    pub const EXT_PARAM: u8 = 0x29;
    /// Container for one tag read (nested TLV sequence)
    pub const SINGLE_TAG: u8 = 0x50;
    /// Device number
    pub const DEVICE_NO: u8 = 0x52;
    /// Modbus slave address
    pub const MODBUS_ADDRESS: u8 = 0x53;
    /// Modbus parity code
    pub const MODBUS_PARITY: u8 = 0x54;
    /// Modbus stop-bits code
    pub const MODBUS_STOP_BITS: u8 = 0x55;
    /// Modbus protocol variant
    pub const MODBUS_PROTOCOL: u8 = 0x56;
    /// Serial baud-rate code (shared by the Modbus commands)
    pub const BAUD_RATE: u8 = 0x0B;
    /// Reader temperature
    pub const TEMPERATURE: u8 = 0x70;
}

/// Ordered map from TLV tag to its decoded value.
pub type TlvMap = BTreeMap<u8, TlvValue>;

/// Firmware version triple from the software-version TLV (0x20).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    /// Major version
    pub major: u8,
    /// Minor version
    pub minor: u8,
    /// Revision
    pub revision: u8,
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)
    }
}

/// Decoded time TLV (0x06).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeValue {
    /// 7-byte calendar form, validated
    Calendar(CphTime),
    /// 4-byte legacy form; no decoding rule is documented, kept opaque
    Legacy(u32),
}

/// Modem tuning values inside a single-parameter TLV of type 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModemSettings {
    /// Mixer gain
    pub mixer_gain: u8,
    /// IF amplifier gain
    pub if_amp_gain: u8,
    /// Detection threshold
    pub threshold: u16,
}

/// Typed value of a single-parameter TLV (0x26).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// RF power in dBm
    Power(u8),
    /// Buzzer enabled
    Buzzer(bool),
    /// Duplicate-filter window in seconds
    FilterTime(u8),
    /// Modem tuning
    Modem(ModemSettings),
    /// Unrecognized sub-type, raw value bytes
    Other(Vec<u8>),
}

/// Decoded single-parameter TLV: sub-type byte, typed value, raw value bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleParameter {
    /// Sub-type byte (see [`ParamType`])
    pub param_type: u8,
    /// Typed decoding of the value bytes
    pub value: ParamValue,
    /// Value bytes as received, sub-type byte excluded
    pub raw: Vec<u8>,
}

/// Decoded operation TLV (0x08).
///
/// Layout: `password(4) | op_type | mem_bank | word_ptr(u16) | word_count |
/// [data(word_count * 2)]`. For lock operations `mem_bank` carries the lock
/// sub-code; for kill everything but the password is zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagOperation {
    /// 4-byte access (or kill) password
    pub password: [u8; 4],
    /// Operation discriminator
    pub op_type: OperationType,
    /// Memory bank, or lock sub-code for lock operations
    pub mem_bank: u8,
    /// Starting word address
    pub word_ptr: u16,
    /// Word count (data is twice this many bytes)
    pub word_count: u8,
    /// Data region; empty for requests without payload
    pub data: Vec<u8>,
}

/// One decoded TLV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlvValue {
    /// Status code (0x07)
    Status(u8),
    /// Firmware version (0x20)
    Version(FirmwareVersion),
    /// Device type (0x21)
    DeviceType(u8),
    /// Signed RSSI (0x05)
    Rssi(i8),
    /// Timestamp (0x06)
    Time(TimeValue),
    /// Single parameter (0x26)
    SingleParam(SingleParameter),
    /// Tag memory operation (0x08)
    Operation(TagOperation),
    /// Nested tag-read container (0x50)
    TagContainer(TlvMap),
    /// EPC as an uppercase hex string (0x01)
    Epc(String),
    /// Raw bytes for data tags and anything unrecognized
    Bytes(Vec<u8>),
}

impl TlvValue {
    /// Raw bytes, if this value is a byte blob.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Uppercase hex rendering of a byte slice.
#[must_use]
pub fn encode_hex_upper(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02X}");
    }
    out
}

/// Inverse of [`encode_hex_upper`]. `None` on odd length or non-hex digits.
#[must_use]
pub fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    let digits = text.as_bytes();
    let mut out = Vec::with_capacity(digits.len() / 2);
    for pair in digits.chunks_exact(2) {
        let hi = (pair[0] as char).to_digit(16)?;
        let lo = (pair[1] as char).to_digit(16)?;
        out.push(((hi << 4) | lo) as u8);
    }
    Some(out)
}

// --- Parsing ---

/// Parse the first TLV in `input`.
///
/// Returns `(tag, length, value, consumed)` where `consumed` is
/// `2 + length`.
///
/// # Errors
///
/// - `ProtocolError::TlvShortHeader` with fewer than two bytes of input
/// - `ProtocolError::TlvValueExceedsInput` if the declared length runs past
///   the end of the input
pub fn parse_tlv(input: &[u8]) -> Result<(u8, u8, &[u8], usize)> {
    if input.len() < 2 {
        return Err(ProtocolError::TlvShortHeader { available: input.len() });
    }

    let tag = input[0];
    let length = input[1];
    let consumed = 2 + usize::from(length);
    if input.len() < consumed {
        return Err(ProtocolError::TlvValueExceedsInput {
            tag,
            declared: usize::from(length),
            available: input.len() - 2,
        });
    }

    Ok((tag, length, &input[2..consumed], consumed))
}

/// Parse a full TLV sequence into a tag-keyed map of typed values.
///
/// The input must be consumed exactly; a trailing partial TLV is an error.
/// Duplicate tags keep the last occurrence.
pub fn parse_tlv_sequence(input: &[u8]) -> Result<TlvMap> {
    let mut map = TlvMap::new();
    let mut offset = 0;
    while offset < input.len() {
        let (tag, _, value, consumed) = parse_tlv(&input[offset..])?;
        map.insert(tag, decode_value(tag, value)?);
        offset += consumed;
    }
    Ok(map)
}

/// Typed decoding for one recognized tag; raw pass-through otherwise.
fn decode_value(tag: u8, value: &[u8]) -> Result<TlvValue> {
    let invalid = |reason: String| ProtocolError::InvalidTlvValue { tag, reason };

    Ok(match tag {
        tags::STATUS => {
            if value.len() != 1 {
                return Err(invalid(format!("status expects 1 byte, got {}", value.len())));
            }
            TlvValue::Status(value[0])
        },
        tags::SOFTWARE_VERSION => {
            if value.len() != 3 {
                return Err(invalid(format!("version expects 3 bytes, got {}", value.len())));
            }
            TlvValue::Version(FirmwareVersion {
                major: value[0],
                minor: value[1],
                revision: value[2],
            })
        },
        tags::DEVICE_TYPE => {
            if value.len() != 1 {
                return Err(invalid(format!("device type expects 1 byte, got {}", value.len())));
            }
            TlvValue::DeviceType(value[0])
        },
        tags::RSSI => {
            if value.len() != 1 {
                return Err(invalid(format!("RSSI expects 1 byte, got {}", value.len())));
            }
            TlvValue::Rssi(value[0] as i8)
        },
        tags::TIME => match value.len() {
            CphTime::ENCODED_LEN => {
                let time = CphTime::decode(value).map_err(|e| invalid(e.to_string()))?;
                TlvValue::Time(TimeValue::Calendar(time))
            },
            4 => TlvValue::Time(TimeValue::Legacy(u32::from_be_bytes([
                value[0], value[1], value[2], value[3],
            ]))),
            other => {
                return Err(invalid(format!("time expects 7 or 4 bytes, got {other}")));
            },
        },
        tags::SINGLE_PARAMETER => TlvValue::SingleParam(parse_single_parameter(value)?),
        tags::OPERATION => TlvValue::Operation(parse_operation(value)?),
        tags::SINGLE_TAG => TlvValue::TagContainer(parse_tlv_sequence(value)?),
        tags::EPC => TlvValue::Epc(encode_hex_upper(value)),
        _ => TlvValue::Bytes(value.to_vec()),
    })
}

/// Decode the value region of a single-parameter TLV (0x26).
fn parse_single_parameter(value: &[u8]) -> Result<SingleParameter> {
    let invalid = |reason: String| ProtocolError::InvalidTlvValue {
        tag: tags::SINGLE_PARAMETER,
        reason,
    };

    let Some((&param_type, rest)) = value.split_first() else {
        return Err(invalid("missing sub-type byte".to_string()));
    };

    let decoded = match ParamType::from_code(param_type) {
        Some(ParamType::Power) => {
            if rest.len() != 1 {
                return Err(invalid(format!("power expects 1 byte, got {}", rest.len())));
            }
            ParamValue::Power(rest[0])
        },
        Some(ParamType::Buzzer) => {
            if rest.len() != 1 {
                return Err(invalid(format!("buzzer expects 1 byte, got {}", rest.len())));
            }
            ParamValue::Buzzer(rest[0] != 0)
        },
        Some(ParamType::TagFilterTime) => {
            if rest.len() != 1 {
                return Err(invalid(format!("filter time expects 1 byte, got {}", rest.len())));
            }
            ParamValue::FilterTime(rest[0])
        },
        Some(ParamType::Modem) => {
            if rest.len() != 4 {
                return Err(invalid(format!("modem expects 4 bytes, got {}", rest.len())));
            }
            ParamValue::Modem(ModemSettings {
                mixer_gain: rest[0],
                if_amp_gain: rest[1],
                threshold: u16::from_be_bytes([rest[2], rest[3]]),
            })
        },
        None => ParamValue::Other(rest.to_vec()),
    };

    Ok(SingleParameter { param_type, value: decoded, raw: rest.to_vec() })
}

/// Decode the value region of an operation TLV (0x08).
///
/// The data region must be empty (request form, and all non-read responses)
/// or exactly `word_count * 2` bytes.
fn parse_operation(value: &[u8]) -> Result<TagOperation> {
    let invalid = |reason: String| ProtocolError::InvalidTlvValue { tag: tags::OPERATION, reason };

    const FIXED_LEN: usize = 9;
    if value.len() < FIXED_LEN {
        return Err(invalid(format!(
            "operation expects at least {FIXED_LEN} bytes, got {}",
            value.len()
        )));
    }

    let mut password = [0u8; 4];
    password.copy_from_slice(&value[..4]);
    let op_type = OperationType::from_code(value[4])
        .ok_or_else(|| invalid(format!("unknown operation type {:#04x}", value[4])))?;
    let mem_bank = value[5];
    let word_ptr = u16::from_be_bytes([value[6], value[7]]);
    let word_count = value[8];

    let data = &value[FIXED_LEN..];
    let expected_data = usize::from(word_count) * 2;
    if !data.is_empty() && data.len() != expected_data {
        return Err(invalid(format!(
            "data length {} does not match word count {word_count}",
            data.len()
        )));
    }

    Ok(TagOperation { password, op_type, mem_bank, word_ptr, word_count, data: data.to_vec() })
}

// --- Building ---

/// Build a single TLV.
///
/// # Errors
///
/// - `ProtocolError::TlvValueTooLong` if `value` exceeds 255 bytes
pub fn build_tlv(tag: u8, value: &[u8]) -> Result<Vec<u8>> {
    let Ok(length) = u8::try_from(value.len()) else {
        return Err(ProtocolError::TlvValueTooLong { len: value.len() });
    };

    let mut out = Vec::with_capacity(2 + value.len());
    out.push(tag);
    out.push(length);
    out.extend_from_slice(value);
    Ok(out)
}

/// Build a single-parameter TLV (0x26): sub-type byte followed by the value.
pub fn build_single_parameter_tlv(param_type: u8, value: &[u8]) -> Result<Vec<u8>> {
    let mut inner = Vec::with_capacity(1 + value.len());
    inner.push(param_type);
    inner.extend_from_slice(value);
    build_tlv(tags::SINGLE_PARAMETER, &inner)
}

/// Build the TLV that sets RF power.
///
/// # Errors
///
/// - `ProtocolError::InvalidArgument` if `power_dbm` is outside 0..=30
pub fn build_power_tlv(power_dbm: u8) -> Result<Vec<u8>> {
    if power_dbm > 30 {
        return Err(ProtocolError::InvalidArgument(format!(
            "power {power_dbm} dBm outside supported range 0..=30"
        )));
    }
    build_single_parameter_tlv(ParamType::Power.code(), &[power_dbm])
}

/// Build the TLV that turns the buzzer on or off.
pub fn build_buzzer_tlv(enabled: bool) -> Result<Vec<u8>> {
    build_single_parameter_tlv(ParamType::Buzzer.code(), &[u8::from(enabled)])
}

/// Build the TLV that sets the duplicate-tag filter window.
pub fn build_filter_time_tlv(seconds: u8) -> Result<Vec<u8>> {
    build_single_parameter_tlv(ParamType::TagFilterTime.code(), &[seconds])
}

/// Build the TLV that queries one single parameter: the value is the
/// sub-type byte alone.
pub fn build_query_parameter_tlv(param_type: u8) -> Result<Vec<u8>> {
    build_tlv(tags::SINGLE_PARAMETER, &[param_type])
}

/// Build an operation TLV (0x08).
///
/// `mem_bank` is the bank code for read/write, the lock sub-code for lock,
/// and zero for kill. `write_data` is required for writes (exactly
/// `word_count * 2` bytes) and forbidden otherwise.
///
/// # Errors
///
/// - `ProtocolError::InvalidArgument` for a non-4-byte password, mismatched
///   write data, or data supplied to a non-write operation
pub fn build_operation_tlv(
    op_type: OperationType,
    mem_bank: u8,
    word_ptr: u16,
    word_count: u8,
    password: &[u8],
    write_data: Option<&[u8]>,
) -> Result<Vec<u8>> {
    if password.len() != 4 {
        return Err(ProtocolError::InvalidArgument(format!(
            "access password must be exactly 4 bytes, got {}",
            password.len()
        )));
    }

    match (op_type, write_data) {
        (OperationType::Write, None) => {
            return Err(ProtocolError::InvalidArgument(
                "write operation requires data".to_string(),
            ));
        },
        (OperationType::Write, Some(data)) => {
            let expected = usize::from(word_count) * 2;
            if data.len() != expected {
                return Err(ProtocolError::InvalidArgument(format!(
                    "write data length {} does not match word count {word_count} ({expected} bytes)",
                    data.len()
                )));
            }
        },
        (_, Some(_)) => {
            return Err(ProtocolError::InvalidArgument(format!(
                "data must not be provided for {op_type:?} operations"
            )));
        },
        (_, None) => {},
    }

    let mut value = Vec::with_capacity(9 + write_data.map_or(0, <[u8]>::len));
    value.extend_from_slice(password);
    value.push(op_type.code());
    value.push(mem_bank);
    value.extend_from_slice(&word_ptr.to_be_bytes());
    value.push(word_count);
    if let Some(data) = write_data {
        value.extend_from_slice(data);
    }

    build_tlv(tags::OPERATION, &value)
}

/// Wrap an extended parameter block in its TLV (0x29).
pub fn build_ext_params_tlv(params: &ExtParams) -> Result<Vec<u8>> {
    build_tlv(tags::EXT_PARAM, &params.encode()?)
}

/// Decode the value region of an extended parameter TLV.
pub fn parse_ext_params_tlv(value: &[u8]) -> Result<ExtParams> {
    ExtParams::decode(value)
}

/// Wrap a working parameter block in its TLV (0x23).
pub fn build_working_params_tlv(params: &WorkingParams) -> Result<Vec<u8>> {
    build_tlv(tags::WORKING_PARAM, &params.encode()?)
}

/// Decode the value region of a working parameter TLV.
pub fn parse_working_params_tlv(value: &[u8]) -> Result<WorkingParams> {
    WorkingParams::decode(value)
}

/// Wrap a transport parameter block in its TLV (0x24).
pub fn build_transport_params_tlv(params: &TransportParams) -> Result<Vec<u8>> {
    build_tlv(tags::TRANSPORT_PARAM, &params.encode()?)
}

/// Decode the value region of a transport parameter TLV.
pub fn parse_transport_params_tlv(value: &[u8]) -> Result<TransportParams> {
    TransportParams::decode(value)
}

/// Wrap an advance parameter block in its TLV (0x25).
pub fn build_advance_params_tlv(params: &AdvanceParams) -> Result<Vec<u8>> {
    build_tlv(tags::ADVANCE_PARAM, &params.encode()?)
}

/// Decode the value region of an advance parameter TLV.
pub fn parse_advance_params_tlv(value: &[u8]) -> Result<AdvanceParams> {
    AdvanceParams::decode(value)
}
