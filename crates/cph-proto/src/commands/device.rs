//! Device control and identity commands: reboot, defaults, version, RTC.

use crate::commands::DeviceInfo;
use crate::errors::{ProtocolError, Result};
use crate::time::CphTime;
use crate::tlv::{self, TlvMap, TlvValue, tags};

/// Reboot (0x10) carries no parameters.
#[must_use]
pub fn encode_reboot_request() -> Vec<u8> {
    Vec::new()
}

/// Restore-defaults (0x12) carries no parameters.
#[must_use]
pub fn encode_set_default_params_request() -> Vec<u8> {
    Vec::new()
}

/// Get-version (0x40) carries no parameters.
#[must_use]
pub fn encode_get_version_request() -> Vec<u8> {
    Vec::new()
}

/// Decode a get-version response into a [`DeviceInfo`].
///
/// # Errors
///
/// - `ProtocolError::MissingTlv` if the version or device-type TLV is absent
pub fn decode_get_version_response(parsed: &TlvMap) -> Result<DeviceInfo> {
    let Some(TlvValue::Version(version)) = parsed.get(&tags::SOFTWARE_VERSION) else {
        return Err(ProtocolError::MissingTlv { tag: tags::SOFTWARE_VERSION });
    };
    let Some(TlvValue::DeviceType(device_type)) = parsed.get(&tags::DEVICE_TYPE) else {
        return Err(ProtocolError::MissingTlv { tag: tags::DEVICE_TYPE });
    };

    Ok(DeviceInfo { software_version: version.to_string(), device_type: *device_type })
}

/// Encode a set-RTC request (0x4B): one 7-byte time TLV.
pub fn encode_set_rtc_request(time: &CphTime) -> Result<Vec<u8>> {
    tlv::build_tlv(tags::TIME, &time.encode()?)
}

/// Decode a query-RTC response (0x4A) into a validated timestamp.
///
/// # Errors
///
/// - `ProtocolError::MissingTlv` if no time TLV is present
/// - `ProtocolError::InvalidTlvValue` if the reader sent the 4-byte legacy
///   form instead of the calendar form
pub fn decode_get_rtc_response(parsed: &TlvMap) -> Result<CphTime> {
    match parsed.get(&tags::TIME) {
        Some(TlvValue::Time(crate::tlv::TimeValue::Calendar(time))) => Ok(*time),
        Some(TlvValue::Time(crate::tlv::TimeValue::Legacy(raw))) => {
            Err(ProtocolError::InvalidTlvValue {
                tag: tags::TIME,
                reason: format!("expected 7-byte calendar time, got legacy value {raw:#010x}"),
            })
        },
        _ => Err(ProtocolError::MissingTlv { tag: tags::TIME }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::parse_tlv_sequence;

    #[test]
    fn version_response_decodes() {
        let params = hex::decode("0701002003040001210105").unwrap();
        let map = parse_tlv_sequence(&params).unwrap();
        let info = decode_get_version_response(&map).unwrap();
        assert_eq!(info.software_version, "4.0.1");
        assert_eq!(info.device_type, 5);
    }

    #[test]
    fn version_response_requires_both_tlvs() {
        let map = parse_tlv_sequence(&[0x07, 0x01, 0x00]).unwrap();
        assert!(matches!(
            decode_get_version_response(&map),
            Err(ProtocolError::MissingTlv { tag: tags::SOFTWARE_VERSION })
        ));
    }

    #[test]
    fn rtc_round_trip() {
        let time = CphTime::new(2026, 8, 1, 10, 20, 30).unwrap();
        let request = encode_set_rtc_request(&time).unwrap();
        assert_eq!(request[..2], [tags::TIME, 7]);

        let map = parse_tlv_sequence(&request).unwrap();
        assert_eq!(decode_get_rtc_response(&map).unwrap(), time);
    }

    #[test]
    fn rtc_rejects_year_before_2000() {
        let time = CphTime { year: 1999, month: 1, day: 1, hour: 0, minute: 0, second: 0 };
        assert!(encode_set_rtc_request(&time).is_err());
    }

    #[test]
    fn rtc_decode_rejects_legacy_time() {
        let map = parse_tlv_sequence(&[0x06, 0x04, 0x3D, 0x00, 0x00, 0x00]).unwrap();
        assert!(matches!(
            decode_get_rtc_response(&map),
            Err(ProtocolError::InvalidTlvValue { tag: tags::TIME, .. })
        ));
    }

    #[test]
    fn control_requests_are_empty() {
        assert!(encode_reboot_request().is_empty());
        assert!(encode_set_default_params_request().is_empty());
        assert!(encode_get_version_request().is_empty());
    }
}
