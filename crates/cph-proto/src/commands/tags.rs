//! Inventory and tag-memory commands, plus the tag upload notification
//! decoder.

use crate::codes::{LockType, MemoryBank, OperationType};
use crate::commands::TagReadData;
use crate::errors::{ProtocolError, Result};
use crate::tlv::{self, TimeValue, TlvMap, TlvValue, tags};

/// Default access password when the caller supplies none.
pub const DEFAULT_PASSWORD: [u8; 4] = [0, 0, 0, 0];

/// Start-inventory (0x21) carries no parameters; inventory behavior is
/// configured beforehand through the working and advance parameter blocks.
#[must_use]
pub fn encode_start_inventory_request() -> Vec<u8> {
    Vec::new()
}

/// Single-burst inventory (0x22) carries no parameters.
#[must_use]
pub fn encode_active_inventory_request() -> Vec<u8> {
    Vec::new()
}

/// Stop-inventory (0x23) carries no parameters.
#[must_use]
pub fn encode_stop_inventory_request() -> Vec<u8> {
    Vec::new()
}

/// Encode a read-tag request (0x31): an operation TLV with no data region.
///
/// # Errors
///
/// - `ProtocolError::InvalidArgument` if `word_count` is zero
pub fn encode_read_tag_request(
    bank: MemoryBank,
    word_ptr: u16,
    word_count: u8,
    password: Option<&[u8; 4]>,
) -> Result<Vec<u8>> {
    if word_count == 0 {
        return Err(ProtocolError::InvalidArgument(
            "read word count must be at least 1".to_string(),
        ));
    }
    tlv::build_operation_tlv(
        OperationType::Read,
        bank.code(),
        word_ptr,
        word_count,
        password.unwrap_or(&DEFAULT_PASSWORD),
        None,
    )
}

/// Extract the read data for `bank` from a read-tag response.
///
/// The reader answers with a dedicated data TLV per bank: user 0x02,
/// EPC 0x01, TID 0x04, reserved 0x03. EPC values arrive as hex strings from
/// the sequence parser and are converted back to bytes here.
///
/// # Errors
///
/// - `ProtocolError::MissingTlv` if the bank's data TLV is absent
pub fn decode_read_tag_response(bank: MemoryBank, parsed: &TlvMap) -> Result<Vec<u8>> {
    let tag = match bank {
        MemoryBank::Reserved => tags::RESERVE_DATA,
        MemoryBank::Epc => tags::EPC,
        MemoryBank::Tid => tags::TID_DATA,
        MemoryBank::User => tags::USER_DATA,
    };

    match parsed.get(&tag) {
        Some(TlvValue::Bytes(data)) => Ok(data.clone()),
        Some(TlvValue::Epc(text)) => tlv::decode_hex(text).ok_or_else(|| {
            ProtocolError::InvalidTlvValue {
                tag,
                reason: format!("EPC string {text:?} is not valid hex"),
            }
        }),
        _ => Err(ProtocolError::MissingTlv { tag }),
    }
}

/// Encode a write-tag request (0x30).
///
/// `data` must be a non-empty, even number of bytes (16-bit words).
pub fn encode_write_tag_request(
    bank: MemoryBank,
    word_ptr: u16,
    data: &[u8],
    password: Option<&[u8; 4]>,
) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Err(ProtocolError::InvalidArgument(
            "write data cannot be empty".to_string(),
        ));
    }
    if data.len() % 2 != 0 {
        return Err(ProtocolError::InvalidArgument(format!(
            "write data must be a whole number of 16-bit words, got {} bytes",
            data.len()
        )));
    }
    let Ok(word_count) = u8::try_from(data.len() / 2) else {
        return Err(ProtocolError::InvalidArgument(format!(
            "write data of {} bytes exceeds the 255-word limit",
            data.len()
        )));
    };

    tlv::build_operation_tlv(
        OperationType::Write,
        bank.code(),
        word_ptr,
        word_count,
        password.unwrap_or(&DEFAULT_PASSWORD),
        Some(data),
    )
}

/// Encode a lock-tag request (0x33): the mem-bank field carries the lock
/// sub-code, pointer and count are zero.
pub fn encode_lock_tag_request(
    lock_type: LockType,
    password: Option<&[u8; 4]>,
) -> Result<Vec<u8>> {
    tlv::build_operation_tlv(
        OperationType::Lock,
        lock_type.code(),
        0,
        0,
        password.unwrap_or(&DEFAULT_PASSWORD),
        None,
    )
}

/// Encode a kill-tag request (0x33): everything but the 4-byte kill password
/// is zero.
///
/// # Errors
///
/// - `ProtocolError::InvalidArgument` if the password is not exactly 4 bytes
pub fn encode_kill_tag_request(kill_password: &[u8]) -> Result<Vec<u8>> {
    tlv::build_operation_tlv(OperationType::Kill, 0, 0, 0, kill_password, None)
}

/// Decode a tag upload notification (0x80/0x81) into a [`TagReadData`].
///
/// The parameter region is a single-tag container (0x50) holding at least an
/// EPC, optionally TID, user data, RSSI, antenna, and a timestamp. The
/// timestamp is only populated for the validated 7-byte calendar form.
///
/// # Errors
///
/// - `ProtocolError::MissingTlv` if the container or the EPC inside it is
///   absent
pub fn decode_tag_notification(params: &[u8]) -> Result<TagReadData> {
    tag_read_from_map(&tlv::parse_tlv_sequence(params)?)
}

/// Build a [`TagReadData`] from an already-parsed notification TLV map.
pub fn tag_read_from_map(outer: &TlvMap) -> Result<TagReadData> {
    let Some(TlvValue::TagContainer(inner)) = outer.get(&tags::SINGLE_TAG) else {
        return Err(ProtocolError::MissingTlv { tag: tags::SINGLE_TAG });
    };

    let Some(TlvValue::Epc(epc)) = inner.get(&tags::EPC) else {
        return Err(ProtocolError::MissingTlv { tag: tags::EPC });
    };

    let tid = inner
        .get(&tags::TID_DATA)
        .and_then(TlvValue::as_bytes)
        .map(tlv::encode_hex_upper);
    let user_data = inner
        .get(&tags::USER_DATA)
        .and_then(TlvValue::as_bytes)
        .map(<[u8]>::to_vec);
    let rssi = match inner.get(&tags::RSSI) {
        Some(TlvValue::Rssi(rssi)) => Some(*rssi),
        _ => None,
    };
    let antenna = match inner.get(&tags::ANT_NO).and_then(TlvValue::as_bytes) {
        Some([antenna]) => Some(*antenna),
        _ => None,
    };
    let timestamp = match inner.get(&tags::TIME) {
        Some(TlvValue::Time(TimeValue::Calendar(time))) => Some(*time),
        _ => None,
    };

    Ok(TagReadData { epc: epc.clone(), tid, user_data, rssi, antenna, timestamp })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::CphTime;
    use crate::tlv::parse_tlv_sequence;

    #[test]
    fn inventory_requests_are_empty() {
        assert!(encode_start_inventory_request().is_empty());
        assert!(encode_active_inventory_request().is_empty());
        assert!(encode_stop_inventory_request().is_empty());
    }

    #[test]
    fn read_request_encodes_operation() {
        let request = encode_read_tag_request(MemoryBank::User, 2, 4, None).unwrap();
        let map = parse_tlv_sequence(&request).unwrap();
        let Some(TlvValue::Operation(op)) = map.get(&tags::OPERATION) else {
            panic!("missing operation TLV");
        };
        assert_eq!(op.op_type, OperationType::Read);
        assert_eq!(op.mem_bank, MemoryBank::User.code());
        assert_eq!(op.word_ptr, 2);
        assert_eq!(op.word_count, 4);
        assert!(op.data.is_empty());
    }

    #[test]
    fn read_request_rejects_zero_word_count() {
        assert!(encode_read_tag_request(MemoryBank::Tid, 0, 0, None).is_err());
    }

    #[test]
    fn read_response_selects_bank_tlv() {
        let map = parse_tlv_sequence(&[0x07, 0x01, 0x00, 0x02, 0x02, 0xAB, 0xCD]).unwrap();
        assert_eq!(decode_read_tag_response(MemoryBank::User, &map).unwrap(), vec![0xAB, 0xCD]);
        assert!(matches!(
            decode_read_tag_response(MemoryBank::Tid, &map),
            Err(ProtocolError::MissingTlv { tag: tags::TID_DATA })
        ));
    }

    #[test]
    fn read_response_rehexes_epc_bank() {
        let map = parse_tlv_sequence(&[0x01, 0x04, 0xE2, 0x00, 0x12, 0x34]).unwrap();
        assert_eq!(
            decode_read_tag_response(MemoryBank::Epc, &map).unwrap(),
            vec![0xE2, 0x00, 0x12, 0x34]
        );
    }

    #[test]
    fn write_request_validates_data() {
        assert!(encode_write_tag_request(MemoryBank::User, 0, &[], None).is_err());
        assert!(encode_write_tag_request(MemoryBank::User, 0, &[0x01], None).is_err());

        let request =
            encode_write_tag_request(MemoryBank::User, 1, &[0x11, 0x22, 0x33, 0x44], None)
                .unwrap();
        let map = parse_tlv_sequence(&request).unwrap();
        let Some(TlvValue::Operation(op)) = map.get(&tags::OPERATION) else {
            panic!("missing operation TLV");
        };
        assert_eq!(op.op_type, OperationType::Write);
        assert_eq!(op.word_count, 2);
        assert_eq!(op.data, vec![0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn lock_request_uses_lock_code_as_bank() {
        let request =
            encode_lock_tag_request(LockType::WriteEpcPerma, Some(&[1, 2, 3, 4])).unwrap();
        let map = parse_tlv_sequence(&request).unwrap();
        let Some(TlvValue::Operation(op)) = map.get(&tags::OPERATION) else {
            panic!("missing operation TLV");
        };
        assert_eq!(op.op_type, OperationType::Lock);
        assert_eq!(op.mem_bank, LockType::WriteEpcPerma.code());
        assert_eq!(op.word_ptr, 0);
        assert_eq!(op.word_count, 0);
        assert_eq!(op.password, [1, 2, 3, 4]);
    }

    #[test]
    fn kill_request_is_password_only() {
        let request = encode_kill_tag_request(&[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        let map = parse_tlv_sequence(&request).unwrap();
        let Some(TlvValue::Operation(op)) = map.get(&tags::OPERATION) else {
            panic!("missing operation TLV");
        };
        assert_eq!(op.op_type, OperationType::Kill);
        assert_eq!(op.mem_bank, 0);
        assert_eq!(op.word_ptr, 0);
        assert_eq!(op.word_count, 0);
        assert_eq!(op.password, [0xDE, 0xAD, 0xBE, 0xEF]);

        assert!(encode_kill_tag_request(&[1, 2, 3]).is_err());
    }

    #[test]
    fn tag_notification_with_legacy_time() {
        let params =
            hex::decode("5017010CE2000017021701992390217D0501C306043D000000").unwrap();
        let tag = decode_tag_notification(&params).unwrap();

        assert_eq!(tag.epc, "E2000017021701992390217D");
        assert_eq!(tag.rssi, Some(-61));
        assert_eq!(tag.tid, None);
        assert_eq!(tag.antenna, None);
        // Legacy 4-byte time never becomes a timestamp
        assert_eq!(tag.timestamp, None);
    }

    #[test]
    fn tag_notification_with_all_fields() {
        let mut inner = Vec::new();
        inner.extend_from_slice(&tlv::build_tlv(tags::EPC, &[0xE2, 0x00]).unwrap());
        inner.extend_from_slice(&tlv::build_tlv(tags::TID_DATA, &[0xAA, 0xBB]).unwrap());
        inner.extend_from_slice(&tlv::build_tlv(tags::USER_DATA, &[0x01]).unwrap());
        inner.extend_from_slice(&tlv::build_tlv(tags::RSSI, &[0xC3]).unwrap());
        inner.extend_from_slice(&tlv::build_tlv(tags::ANT_NO, &[0x02]).unwrap());
        inner.extend_from_slice(
            &tlv::build_tlv(tags::TIME, &[0x07, 0xE9, 6, 15, 12, 30, 45]).unwrap(),
        );
        let params = tlv::build_tlv(tags::SINGLE_TAG, &inner).unwrap();

        let tag = decode_tag_notification(&params).unwrap();
        assert_eq!(tag.epc, "E200");
        assert_eq!(tag.tid, Some("AABB".to_string()));
        assert_eq!(tag.user_data, Some(vec![0x01]));
        assert_eq!(tag.rssi, Some(-61));
        assert_eq!(tag.antenna, Some(2));
        assert_eq!(tag.timestamp, Some(CphTime::new(2025, 6, 15, 12, 30, 45).unwrap()));
    }

    #[test]
    fn tag_notification_requires_container_and_epc() {
        assert!(matches!(
            decode_tag_notification(&[0x07, 0x01, 0x00]),
            Err(ProtocolError::MissingTlv { tag: tags::SINGLE_TAG })
        ));

        let no_epc = tlv::build_tlv(
            tags::SINGLE_TAG,
            &tlv::build_tlv(tags::RSSI, &[0xC3]).unwrap(),
        )
        .unwrap();
        assert!(matches!(
            decode_tag_notification(&no_epc),
            Err(ProtocolError::MissingTlv { tag: tags::EPC })
        ));
    }
}
