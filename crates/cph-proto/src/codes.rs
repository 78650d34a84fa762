//! Protocol code tables: commands, notifications, status codes, and the
//! enumerations carried inside operation and parameter TLVs.
//!
//! All codes are single bytes on the wire. Enums keep their wire value as
//! the discriminant so `as u8` is the encoding; `from_code` is the strict
//! inverse (unknown bytes yield `None`, callers decide whether that is an
//! error or a pass-through).

/// Host-to-reader command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Reboot the reader
    Reboot = 0x10,
    /// Restore factory-default parameters
    SetDefaultParams = 0x12,
    /// Start continuous inventory
    StartInventory = 0x21,
    /// Single-burst inventory
    ActiveInventory = 0x22,
    /// Stop continuous inventory
    StopInventory = 0x23,
    /// Write tag memory
    WriteTag = 0x30,
    /// Read tag memory
    ReadTag = 0x31,
    /// Lock or kill a tag
    LockTag = 0x33,
    /// Query extended parameters
    QueryExtParams = 0x3E,
    /// Set extended parameters
    SetExtParams = 0x3F,
    /// Query device version and type
    GetVersion = 0x40,
    /// Set working parameters
    SetWorkingParams = 0x41,
    /// Query working parameters
    QueryWorkingParams = 0x42,
    /// Query transport parameters
    QueryTransportParams = 0x43,
    /// Set transport parameters
    SetTransportParams = 0x44,
    /// Query advance (RF) parameters
    QueryAdvanceParams = 0x45,
    /// Set advance (RF) parameters
    SetAdvanceParams = 0x46,
    /// Set a single parameter (power, buzzer, filter time, modem)
    SetParameter = 0x48,
    /// Query a single parameter
    QueryParameter = 0x49,
    /// Query the real-time clock
    QueryRtc = 0x4A,
    /// Set the real-time clock
    SetRtc = 0x4B,
    /// Drive the relay output
    RelayOp = 0x4C,
    /// Play audio on the reader
    AudioPlay = 0x4D,
    /// Verify a tag password (parameter layout undocumented)
    VerifyTag = 0x4E,
    /// Set USB data parameters
    SetUsbData = 0x50,
    /// Query USB data parameters
    QueryUsbData = 0x51,
    /// Set data-flag parameters
    SetDataFlag = 0x52,
    /// Query data-flag parameters
    QueryDataFlag = 0x53,
    /// Set Modbus parameters
    SetModbusParams = 0x54,
    /// Query Modbus parameters
    QueryModbusParams = 0x55,
}

impl Command {
    /// Wire value of this command.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Command for a wire value. `None` if unrecognized.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x10 => Self::Reboot,
            0x12 => Self::SetDefaultParams,
            0x21 => Self::StartInventory,
            0x22 => Self::ActiveInventory,
            0x23 => Self::StopInventory,
            0x30 => Self::WriteTag,
            0x31 => Self::ReadTag,
            0x33 => Self::LockTag,
            0x3E => Self::QueryExtParams,
            0x3F => Self::SetExtParams,
            0x40 => Self::GetVersion,
            0x41 => Self::SetWorkingParams,
            0x42 => Self::QueryWorkingParams,
            0x43 => Self::QueryTransportParams,
            0x44 => Self::SetTransportParams,
            0x45 => Self::QueryAdvanceParams,
            0x46 => Self::SetAdvanceParams,
            0x48 => Self::SetParameter,
            0x49 => Self::QueryParameter,
            0x4A => Self::QueryRtc,
            0x4B => Self::SetRtc,
            0x4C => Self::RelayOp,
            0x4D => Self::AudioPlay,
            0x4E => Self::VerifyTag,
            0x50 => Self::SetUsbData,
            0x51 => Self::QueryUsbData,
            0x52 => Self::SetDataFlag,
            0x53 => Self::QueryDataFlag,
            0x54 => Self::SetModbusParams,
            0x55 => Self::QueryModbusParams,
            _ => return None,
        })
    }
}

/// Reader-to-host notification frame codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NotificationCode {
    /// Live tag read upload
    TagUploaded = 0x80,
    /// Stored (offline) tag read upload
    OfflineTagUploaded = 0x81,
    /// Access record upload
    RecordUploaded = 0x82,
    /// Periodic heartbeat
    Heartbeat = 0x90,
}

impl NotificationCode {
    /// Wire value of this notification code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Notification code for a wire value. `None` if unrecognized.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x80 => Self::TagUploaded,
            0x81 => Self::OfflineTagUploaded,
            0x82 => Self::RecordUploaded,
            0x90 => Self::Heartbeat,
            _ => return None,
        })
    }
}

/// Status codes carried in the status TLV (0x07) of every response.
pub mod status {
    /// Command completed successfully.
    pub const SUCCESS: u8 = 0x00;
    /// Unsupported parameter type.
    pub const PARAMETER_UNSUPPORTED: u8 = 0x14;
    /// Incorrect parameter length.
    pub const PARAMETER_LEN_ERROR: u8 = 0x15;
    /// Incorrect parameter content.
    pub const PARAMETER_CONTEXT_ERROR: u8 = 0x16;
    /// Command code not supported by the reader.
    pub const UNSUPPORTED_COMMAND: u8 = 0x17;
    /// Device address mismatch.
    pub const DEVICE_ADDRESS_ERROR: u8 = 0x18;
    /// Frame checksum validation failed (reader-reported).
    pub const CHECKSUM_ERROR: u8 = 0x20;
    /// Unsupported TLV type encountered by the reader.
    pub const UNSUPPORTED_TLV_TYPE: u8 = 0x21;
    /// Error writing parameters to flash.
    pub const FLASH_ERROR: u8 = 0x22;
    /// Unspecified internal reader error.
    pub const INTERNAL_ERROR: u8 = 0xFF;
}

/// Human-readable message for a reader status code.
#[must_use]
pub fn status_message(code: u8) -> String {
    match code {
        status::SUCCESS => "SUCCESS: Command completed successfully.".to_string(),
        status::PARAMETER_UNSUPPORTED => {
            "PARAMETER_UNSUPPORTED: Unsupported parameter type.".to_string()
        },
        status::PARAMETER_LEN_ERROR => {
            "PARAMETER_LEN_ERROR: Incorrect parameter length.".to_string()
        },
        status::PARAMETER_CONTEXT_ERROR => {
            "PARAMETER_CONTEXT_ERROR: Incorrect parameter content.".to_string()
        },
        status::UNSUPPORTED_COMMAND => {
            "UNSUPPORTED_COMMAND: The command code is not supported by the reader.".to_string()
        },
        status::DEVICE_ADDRESS_ERROR => {
            "DEVICE_ADDRESS_ERROR: The device address in the command does not match the reader's address."
                .to_string()
        },
        status::CHECKSUM_ERROR => {
            "CHECKSUM_ERROR: Frame checksum validation failed.".to_string()
        },
        status::UNSUPPORTED_TLV_TYPE => {
            "UNSUPPORTED_TLV_TYPE: Internal error - Unsupported TLV type encountered during processing."
                .to_string()
        },
        status::FLASH_ERROR => {
            "FLASH_ERROR: Error writing parameters to flash memory.".to_string()
        },
        status::INTERNAL_ERROR => {
            "INTERNAL_ERROR: Unspecified internal reader error.".to_string()
        },
        other => format!("Unknown CPH status code: {other:#04x}"),
    }
}

/// Operation discriminator inside the operation TLV (0x08).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OperationType {
    /// Read tag memory
    Read = 0x00,
    /// Write tag memory
    Write = 0x01,
    /// Lock a memory region (the mem-bank field carries a [`LockType`])
    Lock = 0x02,
    /// Kill the tag (password-only)
    Kill = 0x03,
}

impl OperationType {
    /// Wire value of this operation type.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Operation type for a wire value. `None` if unrecognized.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x00 => Self::Read,
            0x01 => Self::Write,
            0x02 => Self::Lock,
            0x03 => Self::Kill,
            _ => return None,
        })
    }
}

/// EPC Gen2 memory banks addressed by read/write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MemoryBank {
    /// Reserved bank (kill + access passwords)
    Reserved = 0x00,
    /// EPC bank
    Epc = 0x01,
    /// TID bank
    Tid = 0x02,
    /// User bank
    User = 0x03,
}

impl MemoryBank {
    /// Wire value of this memory bank.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Lock sub-codes carried in the mem-bank field of a lock operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LockType {
    /// EPC bank writable without password
    WriteEpcOpen = 0x00,
    /// EPC bank writable with access password
    WriteEpcPwd = 0x01,
    /// EPC bank permanently write-locked
    WriteEpcPerma = 0x02,
    /// Unlock EPC write protection
    AccessEpcOpen = 0x03,
    /// User bank writable with access password
    WriteUserPwd = 0x04,
    /// User bank permanently write-locked
    WriteUserPerma = 0x05,
    /// Unlock user-bank write protection
    AccessUserOpen = 0x06,
    /// Access password locked with access password
    AccessPwdPwd = 0x07,
    /// Access password permanently locked
    AccessPwdPerma = 0x08,
    /// Unlock access-password protection
    AccessAccessOpen = 0x09,
    /// Kill password locked with access password
    KillPwdPwd = 0x0A,
    /// Kill password permanently locked
    KillPwdPerma = 0x0B,
    /// Unlock kill-password protection
    AccessKillOpen = 0x0C,
}

impl LockType {
    /// Wire value of this lock type.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Relay states for the relay operation command (0x4C).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RelayState {
    /// Relay open
    Off = 0x00,
    /// Relay closed
    On = 0x01,
    /// Momentary pulse
    Pulse = 0x02,
}

impl RelayState {
    /// Wire value of this relay state.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Sub-types inside the single-parameter TLV (0x26).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ParamType {
    /// RF output power, 1 byte dBm (0..=30)
    Power = 0x01,
    /// Buzzer enable, 1 byte (0 = off)
    Buzzer = 0x02,
    /// Duplicate-tag filter window, 1 byte seconds
    TagFilterTime = 0x03,
    /// Modem tuning: mixer gain, IF amp gain, 16-bit threshold
    Modem = 0x04,
}

impl ParamType {
    /// Wire value of this parameter type.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Parameter type for a wire value. `None` if unrecognized.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x01 => Self::Power,
            0x02 => Self::Buzzer,
            0x03 => Self::TagFilterTime,
            0x04 => Self::Modem,
            _ => return None,
        })
    }
}
