//! Relay, audio, and Modbus commands.

use crate::codes::RelayState;
use crate::errors::{ProtocolError, Result};
use crate::params::ModbusParams;
use crate::tlv::{self, TlvMap, TlvValue, tags};

/// Encode a relay operation request (0x4C): a single-byte relay TLV.
pub fn encode_relay_request(state: RelayState) -> Result<Vec<u8>> {
    tlv::build_tlv(tags::RELAY, &[state.code()])
}

/// Encode an audio play request (0x4D). The reader interprets the bytes
/// itself (text in the firmware's encoding, or a clip index); they only need
/// to be non-empty.
///
/// # Errors
///
/// - `ProtocolError::InvalidArgument` if `audio_data` is empty
pub fn encode_audio_request(audio_data: &[u8]) -> Result<Vec<u8>> {
    if audio_data.is_empty() {
        return Err(ProtocolError::InvalidArgument("audio data cannot be empty".to_string()));
    }
    tlv::build_tlv(tags::AUDIO_TEXT, audio_data)
}

/// Encode a set-Modbus-params request (0x54).
///
/// Unlike the other parameter blocks, Modbus settings travel as individual
/// TLVs: address (0x53), baud-rate code (0x0B, 4 bytes), parity (0x54),
/// stop bits (0x55), protocol variant (0x56).
pub fn encode_set_modbus_request(params: &ModbusParams) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.extend_from_slice(&tlv::build_tlv(tags::MODBUS_ADDRESS, &[params.address])?);
    out.extend_from_slice(&tlv::build_tlv(
        tags::BAUD_RATE,
        &params.baud_rate_code.to_be_bytes(),
    )?);
    out.extend_from_slice(&tlv::build_tlv(tags::MODBUS_PARITY, &[params.parity_code])?);
    out.extend_from_slice(&tlv::build_tlv(tags::MODBUS_STOP_BITS, &[params.stop_bits_code])?);
    out.extend_from_slice(&tlv::build_tlv(tags::MODBUS_PROTOCOL, &[params.protocol_code])?);
    Ok(out)
}

/// Decode a query-Modbus-params response (0x55).
///
/// Address, baud rate, parity, and stop bits are required; the protocol
/// variant TLV is optional and defaults to zero.
pub fn decode_get_modbus_response(parsed: &TlvMap) -> Result<ModbusParams> {
    let address = single_byte(parsed, tags::MODBUS_ADDRESS)?;
    let parity_code = single_byte(parsed, tags::MODBUS_PARITY)?;
    let stop_bits_code = single_byte(parsed, tags::MODBUS_STOP_BITS)?;

    let baud_bytes = parsed
        .get(&tags::BAUD_RATE)
        .and_then(TlvValue::as_bytes)
        .ok_or(ProtocolError::MissingTlv { tag: tags::BAUD_RATE })?;
    let baud_rate_code = match baud_bytes {
        [a, b, c, d] => u32::from_be_bytes([*a, *b, *c, *d]),
        other => {
            return Err(ProtocolError::InvalidTlvValue {
                tag: tags::BAUD_RATE,
                reason: format!("baud-rate code expects 4 bytes, got {}", other.len()),
            });
        },
    };

    let protocol_code = match parsed.get(&tags::MODBUS_PROTOCOL) {
        Some(value) => match value.as_bytes() {
            Some([code]) => *code,
            _ => {
                return Err(ProtocolError::InvalidTlvValue {
                    tag: tags::MODBUS_PROTOCOL,
                    reason: "protocol code expects 1 byte".to_string(),
                });
            },
        },
        None => 0,
    };

    Ok(ModbusParams { address, baud_rate_code, parity_code, stop_bits_code, protocol_code })
}

fn single_byte(parsed: &TlvMap, tag: u8) -> Result<u8> {
    match parsed.get(&tag) {
        Some(value) => match value.as_bytes() {
            Some([byte]) => Ok(*byte),
            _ => Err(ProtocolError::InvalidTlvValue {
                tag,
                reason: "expected a single byte".to_string(),
            }),
        },
        None => Err(ProtocolError::MissingTlv { tag }),
    }
}
