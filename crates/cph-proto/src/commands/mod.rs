//! Per-command request encoders and response decoders.
//!
//! Encoders produce the parameter-region bytes of a command frame (never the
//! full frame; framing happens at the dispatcher). Decoders take the parsed
//! TLV map of a response and produce the typed result the caller asked for.
//!
//! Split by concern the way the protocol document groups commands:
//! [`device`] (version, reboot, RTC), [`params`] (single and block
//! parameters), [`tags`] (inventory and tag memory), [`misc`] (relay, audio,
//! Modbus).

pub mod device;
pub mod misc;
pub mod params;
pub mod tags;

use crate::time::CphTime;

/// Reader identity from the get-version response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Firmware version rendered as a dotted triple, e.g. `"4.0.1"`
    pub software_version: String,
    /// Device type code as reported by the reader
    pub device_type: u8,
}

/// One tag read delivered by an upload notification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagReadData {
    /// EPC as an uppercase hex string
    pub epc: String,
    /// TID as an uppercase hex string, when uploaded
    pub tid: Option<String>,
    /// User memory bytes, when uploaded
    pub user_data: Option<Vec<u8>>,
    /// Signal strength in dBm (signed byte)
    pub rssi: Option<i8>,
    /// Antenna the tag was seen on
    pub antenna: Option<u8>,
    /// Read timestamp; only present for the validated 7-byte calendar form
    pub timestamp: Option<CphTime>,
}
