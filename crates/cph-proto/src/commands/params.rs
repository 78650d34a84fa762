//! Parameter commands: single parameters (0x48/0x49) and the ext, working,
//! transport, and advance parameter blocks.

use crate::codes::ParamType;
use crate::errors::{ProtocolError, Result};
use crate::params::{AdvanceParams, ExtParams, TransportParams, WorkingParams};
use crate::tlv::{self, ModemSettings, ParamValue, TlvMap, TlvValue, tags};

// --- Single parameters (0x48 set / 0x49 query) ---

/// Encode a set-power request. `power_dbm` must be within 0..=30.
pub fn encode_set_power_request(power_dbm: u8) -> Result<Vec<u8>> {
    tlv::build_power_tlv(power_dbm)
}

/// Encode a set-buzzer request.
pub fn encode_set_buzzer_request(enabled: bool) -> Result<Vec<u8>> {
    tlv::build_buzzer_tlv(enabled)
}

/// Encode a set-filter-time request.
pub fn encode_set_filter_time_request(seconds: u8) -> Result<Vec<u8>> {
    tlv::build_filter_time_tlv(seconds)
}

/// Encode a set-modem request: mixer gain, IF amp gain, 16-bit threshold.
pub fn encode_set_modem_request(settings: &ModemSettings) -> Result<Vec<u8>> {
    let threshold = settings.threshold.to_be_bytes();
    tlv::build_single_parameter_tlv(
        ParamType::Modem.code(),
        &[settings.mixer_gain, settings.if_amp_gain, threshold[0], threshold[1]],
    )
}

/// Encode a query for one single parameter: the TLV value is the sub-type
/// byte alone.
pub fn encode_query_parameter_request(param_type: ParamType) -> Result<Vec<u8>> {
    tlv::build_query_parameter_tlv(param_type.code())
}

/// Extract the echoed single parameter of `param_type` from a query
/// response.
///
/// # Errors
///
/// - `ProtocolError::MissingTlv` if the response has no single-parameter TLV
/// - `ProtocolError::InvalidTlvValue` if the echoed sub-type disagrees with
///   the one queried
pub fn decode_query_parameter_response(
    param_type: ParamType,
    parsed: &TlvMap,
) -> Result<ParamValue> {
    let Some(TlvValue::SingleParam(param)) = parsed.get(&tags::SINGLE_PARAMETER) else {
        return Err(ProtocolError::MissingTlv { tag: tags::SINGLE_PARAMETER });
    };

    if param.param_type != param_type.code() {
        return Err(ProtocolError::InvalidTlvValue {
            tag: tags::SINGLE_PARAMETER,
            reason: format!(
                "queried parameter type {:#04x} but response echoed {:#04x}",
                param_type.code(),
                param.param_type
            ),
        });
    }

    Ok(param.value.clone())
}

/// Decode a power query response into dBm.
pub fn decode_get_power_response(parsed: &TlvMap) -> Result<u8> {
    match decode_query_parameter_response(ParamType::Power, parsed)? {
        ParamValue::Power(dbm) => Ok(dbm),
        other => Err(unexpected_param(&other)),
    }
}

/// Decode a buzzer query response.
pub fn decode_get_buzzer_response(parsed: &TlvMap) -> Result<bool> {
    match decode_query_parameter_response(ParamType::Buzzer, parsed)? {
        ParamValue::Buzzer(on) => Ok(on),
        other => Err(unexpected_param(&other)),
    }
}

/// Decode a filter-time query response into seconds.
pub fn decode_get_filter_time_response(parsed: &TlvMap) -> Result<u8> {
    match decode_query_parameter_response(ParamType::TagFilterTime, parsed)? {
        ParamValue::FilterTime(seconds) => Ok(seconds),
        other => Err(unexpected_param(&other)),
    }
}

/// Decode a modem query response.
pub fn decode_get_modem_response(parsed: &TlvMap) -> Result<ModemSettings> {
    match decode_query_parameter_response(ParamType::Modem, parsed)? {
        ParamValue::Modem(settings) => Ok(settings),
        other => Err(unexpected_param(&other)),
    }
}

fn unexpected_param(value: &ParamValue) -> ProtocolError {
    ProtocolError::InvalidTlvValue {
        tag: tags::SINGLE_PARAMETER,
        reason: format!("unexpected parameter payload {value:?}"),
    }
}

// --- Parameter blocks ---

/// Encode a set-ext-params request (0x3F).
pub fn encode_set_ext_params_request(params: &ExtParams) -> Result<Vec<u8>> {
    tlv::build_ext_params_tlv(params)
}

/// Decode a query-ext-params response (0x3E).
pub fn decode_get_ext_params_response(parsed: &TlvMap) -> Result<ExtParams> {
    tlv::parse_ext_params_tlv(block_bytes(parsed, tags::EXT_PARAM)?)
}

/// Encode a set-working-params request (0x41).
pub fn encode_set_working_params_request(params: &WorkingParams) -> Result<Vec<u8>> {
    tlv::build_working_params_tlv(params)
}

/// Decode a query-working-params response (0x42).
pub fn decode_get_working_params_response(parsed: &TlvMap) -> Result<WorkingParams> {
    tlv::parse_working_params_tlv(block_bytes(parsed, tags::WORKING_PARAM)?)
}

/// Encode a set-transport-params request (0x44).
pub fn encode_set_transport_params_request(params: &TransportParams) -> Result<Vec<u8>> {
    tlv::build_transport_params_tlv(params)
}

/// Decode a query-transport-params response (0x43).
pub fn decode_get_transport_params_response(parsed: &TlvMap) -> Result<TransportParams> {
    tlv::parse_transport_params_tlv(block_bytes(parsed, tags::TRANSPORT_PARAM)?)
}

/// Encode a set-advance-params request (0x46).
pub fn encode_set_advance_params_request(params: &AdvanceParams) -> Result<Vec<u8>> {
    tlv::build_advance_params_tlv(params)
}

/// Decode a query-advance-params response (0x45).
pub fn decode_get_advance_params_response(parsed: &TlvMap) -> Result<AdvanceParams> {
    tlv::parse_advance_params_tlv(block_bytes(parsed, tags::ADVANCE_PARAM)?)
}

/// The raw bytes of a parameter-block wrapper TLV.
fn block_bytes(parsed: &TlvMap, tag: u8) -> Result<&[u8]> {
    parsed
        .get(&tag)
        .and_then(TlvValue::as_bytes)
        .ok_or(ProtocolError::MissingTlv { tag })
}
