//! Fixed-layout parameter blocks.
//!
//! Each block is a packed, big-endian byte blob carried inside its own TLV
//! (working 0x23, transport 0x24, advance 0x25, ext 0x29). `encode` always
//! produces exactly `ENCODED_LEN` bytes; `decode` rejects any other length.
//!
//! The advance and Modbus layouts are inferred from the vendor SDK rather
//! than the protocol document; round-trip tests guard the chosen byte
//! order.

use std::net::Ipv4Addr;

use crate::errors::{ProtocolError, Result};

fn check_len(data: &[u8], expected: usize) -> Result<()> {
    if data.len() != expected {
        return Err(ProtocolError::ParamLength { expected, actual: data.len() });
    }
    Ok(())
}

/// Extended parameters (TLV 0x29): relay behavior and tag verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtParams {
    /// 0 = automatic relay, 1 = manual
    pub relay_mode: u8,
    /// Relay hold time in seconds
    pub relay_time: u8,
    /// 0 = verification disabled, 1 = enabled
    pub verify_flag: u8,
    /// 16-bit verification password
    pub verify_pwd: u16,
}

impl ExtParams {
    /// Wire size of the block.
    pub const ENCODED_LEN: usize = 5;

    /// Encode into the 5-byte wire layout.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidArgument` if a flag field is not 0 or 1
    pub fn encode(&self) -> Result<[u8; Self::ENCODED_LEN]> {
        if self.relay_mode > 1 {
            return Err(ProtocolError::InvalidArgument(format!(
                "relay mode must be 0 or 1, got {}",
                self.relay_mode
            )));
        }
        if self.verify_flag > 1 {
            return Err(ProtocolError::InvalidArgument(format!(
                "verify flag must be 0 or 1, got {}",
                self.verify_flag
            )));
        }

        let pwd = self.verify_pwd.to_be_bytes();
        Ok([self.relay_mode, self.relay_time, self.verify_flag, pwd[0], pwd[1]])
    }

    /// Decode the 5-byte wire layout.
    pub fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, Self::ENCODED_LEN)?;
        Ok(Self {
            relay_mode: data[0],
            relay_time: data[1],
            verify_flag: data[2],
            verify_pwd: u16::from_be_bytes([data[3], data[4]]),
        })
    }
}

/// Working parameters (TLV 0x23): inventory cadence, upload behavior, and
/// Wiegand output settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingParams {
    /// Inventory round duration
    pub read_duration: u16,
    /// Interval between inventory rounds
    pub read_interval: u16,
    /// 0 = answer, 1 = active, 2 = trigger
    pub work_mode: u8,
    /// Bitmask of fields uploaded with each tag
    pub tag_upload_flag: u16,
    /// Relay behavior in trigger mode
    pub trigger_mode_output: u8,
    /// 0 = Wiegand 26, 1 = Wiegand 34
    pub wiegand_protocol: u8,
    /// Wiegand output interval
    pub wiegand_interval: u16,
    /// Wiegand pulse width
    pub wiegand_pulse_width: u16,
    /// Wiegand pulse interval
    pub wiegand_pulse_interval: u16,
    /// ISO 18000-6B memory area
    pub iso_area: u8,
    /// ISO 18000-6B start address
    pub iso_addr: u8,
    /// ISO 18000-6B word count
    pub iso_word_count: u8,
}

impl Default for WorkingParams {
    fn default() -> Self {
        Self {
            read_duration: 300,
            read_interval: 50,
            work_mode: 0,
            tag_upload_flag: 0,
            trigger_mode_output: 0,
            wiegand_protocol: 0,
            wiegand_interval: 0,
            wiegand_pulse_width: 0,
            wiegand_pulse_interval: 0,
            iso_area: 0,
            iso_addr: 0,
            iso_word_count: 0,
        }
    }
}

impl WorkingParams {
    /// Wire size of the block.
    pub const ENCODED_LEN: usize = 18;

    /// Encode into the 18-byte wire layout.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidArgument` if `work_mode` exceeds 2
    pub fn encode(&self) -> Result<[u8; Self::ENCODED_LEN]> {
        if self.work_mode > 2 {
            return Err(ProtocolError::InvalidArgument(format!(
                "work mode must be 0, 1, or 2, got {}",
                self.work_mode
            )));
        }

        let mut out = [0u8; Self::ENCODED_LEN];
        out[0..2].copy_from_slice(&self.read_duration.to_be_bytes());
        out[2..4].copy_from_slice(&self.read_interval.to_be_bytes());
        out[4] = self.work_mode;
        out[5..7].copy_from_slice(&self.tag_upload_flag.to_be_bytes());
        out[7] = self.trigger_mode_output;
        out[8] = self.wiegand_protocol;
        out[9..11].copy_from_slice(&self.wiegand_interval.to_be_bytes());
        out[11..13].copy_from_slice(&self.wiegand_pulse_width.to_be_bytes());
        out[13..15].copy_from_slice(&self.wiegand_pulse_interval.to_be_bytes());
        out[15] = self.iso_area;
        out[16] = self.iso_addr;
        out[17] = self.iso_word_count;
        Ok(out)
    }

    /// Decode the 18-byte wire layout.
    pub fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, Self::ENCODED_LEN)?;
        Ok(Self {
            read_duration: u16::from_be_bytes([data[0], data[1]]),
            read_interval: u16::from_be_bytes([data[2], data[3]]),
            work_mode: data[4],
            tag_upload_flag: u16::from_be_bytes([data[5], data[6]]),
            trigger_mode_output: data[7],
            wiegand_protocol: data[8],
            wiegand_interval: u16::from_be_bytes([data[9], data[10]]),
            wiegand_pulse_width: u16::from_be_bytes([data[11], data[12]]),
            wiegand_pulse_interval: u16::from_be_bytes([data[13], data[14]]),
            iso_area: data[15],
            iso_addr: data[16],
            iso_word_count: data[17],
        })
    }
}

/// Transport parameters (TLV 0x24): physical link and network settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportParams {
    /// 0 = RS232, 1 = RS485, 2..=5 = TCP/WIFI server or client
    pub transport_type: u8,
    /// UART baud rate
    pub uart_baud_rate: u32,
    /// 0 = static IP, 1 = DHCP
    pub dhcp_flag: u8,
    /// Static IP address
    pub ip_addr: Ipv4Addr,
    /// Subnet mask
    pub subnet_mask: Ipv4Addr,
    /// Gateway address
    pub gateway: Ipv4Addr,
    /// TCP server / local port
    pub local_port: u16,
    /// TCP client remote address
    pub remote_ip_addr: Ipv4Addr,
    /// TCP client remote port
    pub remote_port: u16,
    /// Heartbeat interval in seconds, 0 = disabled
    pub heartbeat_interval: u8,
}

impl Default for TransportParams {
    fn default() -> Self {
        Self {
            transport_type: 0,
            uart_baud_rate: 115_200,
            dhcp_flag: 0,
            ip_addr: Ipv4Addr::new(192, 168, 1, 178),
            subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Ipv4Addr::new(192, 168, 1, 1),
            local_port: 6000,
            remote_ip_addr: Ipv4Addr::new(192, 168, 1, 100),
            remote_port: 6001,
            heartbeat_interval: 0,
        }
    }
}

impl TransportParams {
    /// Wire size of the block.
    pub const ENCODED_LEN: usize = 27;

    /// Encode into the 27-byte wire layout.
    pub fn encode(&self) -> Result<[u8; Self::ENCODED_LEN]> {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[0] = self.transport_type;
        out[1..5].copy_from_slice(&self.uart_baud_rate.to_be_bytes());
        out[5] = self.dhcp_flag;
        out[6..10].copy_from_slice(&self.ip_addr.octets());
        out[10..14].copy_from_slice(&self.subnet_mask.octets());
        out[14..18].copy_from_slice(&self.gateway.octets());
        out[18..20].copy_from_slice(&self.local_port.to_be_bytes());
        out[20..24].copy_from_slice(&self.remote_ip_addr.octets());
        out[24..26].copy_from_slice(&self.remote_port.to_be_bytes());
        out[26] = self.heartbeat_interval;
        Ok(out)
    }

    /// Decode the 27-byte wire layout.
    pub fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, Self::ENCODED_LEN)?;
        Ok(Self {
            transport_type: data[0],
            uart_baud_rate: u32::from_be_bytes([data[1], data[2], data[3], data[4]]),
            dhcp_flag: data[5],
            ip_addr: Ipv4Addr::new(data[6], data[7], data[8], data[9]),
            subnet_mask: Ipv4Addr::new(data[10], data[11], data[12], data[13]),
            gateway: Ipv4Addr::new(data[14], data[15], data[16], data[17]),
            local_port: u16::from_be_bytes([data[18], data[19]]),
            remote_ip_addr: Ipv4Addr::new(data[20], data[21], data[22], data[23]),
            remote_port: u16::from_be_bytes([data[24], data[25]]),
            heartbeat_interval: data[26],
        })
    }
}

/// Advance parameters (TLV 0x25): RF link and inventory tuning.
///
/// The layout is inferred; field order follows the vendor SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceParams {
    /// RF link profile index
    pub rf_link_profile: u8,
    /// Regulatory region index
    pub rf_region: u8,
    /// Spectrum start frequency in kHz
    pub rf_spectrum_start: u32,
    /// Spectrum end frequency in kHz
    pub rf_spectrum_end: u32,
    /// Bitmask of antennas used during inventory
    pub rf_inventory_ant_flag: u32,
    /// Gen2 inventory session (0..=3)
    pub rf_inventory_session: u8,
    /// Gen2 inventory target (A = 0, B = 1)
    pub rf_inventory_target: u8,
    /// FM0 divisor
    pub rf_fm0_div: u8,
    /// Miller encoding type
    pub rf_miller_type: u8,
    /// Receive filter coefficient
    pub rf_filter_coefficient: u8,
    /// Tari index
    pub rf_tari: u8,
    /// Write power in dBm
    pub rf_write_power: u16,
    /// Continuous carrier flag
    pub rf_carrier_flag: u8,
}

impl Default for AdvanceParams {
    fn default() -> Self {
        Self {
            rf_link_profile: 0,
            rf_region: 0,
            rf_spectrum_start: 0,
            rf_spectrum_end: 0,
            rf_inventory_ant_flag: 0,
            rf_inventory_session: 0,
            rf_inventory_target: 0,
            rf_fm0_div: 0,
            rf_miller_type: 0,
            rf_filter_coefficient: 0,
            rf_tari: 0,
            rf_write_power: 30,
            rf_carrier_flag: 0,
        }
    }
}

impl AdvanceParams {
    /// Wire size of the block.
    pub const ENCODED_LEN: usize = 23;

    /// Encode into the 23-byte wire layout.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidArgument` if the link profile exceeds 5
    pub fn encode(&self) -> Result<[u8; Self::ENCODED_LEN]> {
        if self.rf_link_profile > 5 {
            return Err(ProtocolError::InvalidArgument(format!(
                "RF link profile must be 0..=5, got {}",
                self.rf_link_profile
            )));
        }

        let mut out = [0u8; Self::ENCODED_LEN];
        out[0] = self.rf_link_profile;
        out[1] = self.rf_region;
        out[2..6].copy_from_slice(&self.rf_spectrum_start.to_be_bytes());
        out[6..10].copy_from_slice(&self.rf_spectrum_end.to_be_bytes());
        out[10..14].copy_from_slice(&self.rf_inventory_ant_flag.to_be_bytes());
        out[14] = self.rf_inventory_session;
        out[15] = self.rf_inventory_target;
        out[16] = self.rf_fm0_div;
        out[17] = self.rf_miller_type;
        out[18] = self.rf_filter_coefficient;
        out[19] = self.rf_tari;
        out[20..22].copy_from_slice(&self.rf_write_power.to_be_bytes());
        out[22] = self.rf_carrier_flag;
        Ok(out)
    }

    /// Decode the 23-byte wire layout.
    pub fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, Self::ENCODED_LEN)?;
        Ok(Self {
            rf_link_profile: data[0],
            rf_region: data[1],
            rf_spectrum_start: u32::from_be_bytes([data[2], data[3], data[4], data[5]]),
            rf_spectrum_end: u32::from_be_bytes([data[6], data[7], data[8], data[9]]),
            rf_inventory_ant_flag: u32::from_be_bytes([data[10], data[11], data[12], data[13]]),
            rf_inventory_session: data[14],
            rf_inventory_target: data[15],
            rf_fm0_div: data[16],
            rf_miller_type: data[17],
            rf_filter_coefficient: data[18],
            rf_tari: data[19],
            rf_write_power: u16::from_be_bytes([data[20], data[21]]),
            rf_carrier_flag: data[22],
        })
    }
}

/// USB HID parameters for commands 0x50/0x51.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UsbDataParams {
    /// 0 = disabled, 1 = enabled
    pub usb_enable: u8,
    /// Output interval
    pub data_interval: u8,
    /// Keyboard layout code
    pub keyboard_layout: u8,
}

impl UsbDataParams {
    /// Wire size of the block.
    pub const ENCODED_LEN: usize = 3;

    /// Encode into the 3-byte wire layout.
    pub fn encode(&self) -> Result<[u8; Self::ENCODED_LEN]> {
        Ok([self.usb_enable, self.data_interval, self.keyboard_layout])
    }

    /// Decode the 3-byte wire layout.
    pub fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, Self::ENCODED_LEN)?;
        Ok(Self { usb_enable: data[0], data_interval: data[1], keyboard_layout: data[2] })
    }
}

/// Uploaded-data format flags for commands 0x52/0x53.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataFlagParams {
    /// Bitmask of uploaded fields (EPC, TID, RSSI, antenna)
    pub data_flag: u16,
    /// 0 = hex, 1 = decimal
    pub data_format: u8,
}

impl DataFlagParams {
    /// Wire size of the block.
    pub const ENCODED_LEN: usize = 3;

    /// Encode into the 3-byte wire layout.
    pub fn encode(&self) -> Result<[u8; Self::ENCODED_LEN]> {
        let flag = self.data_flag.to_be_bytes();
        Ok([flag[0], flag[1], self.data_format])
    }

    /// Decode the 3-byte wire layout.
    pub fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, Self::ENCODED_LEN)?;
        Ok(Self { data_flag: u16::from_be_bytes([data[0], data[1]]), data_format: data[2] })
    }
}

/// Modbus link parameters for commands 0x54/0x55.
///
/// On the wire these travel as individual TLVs (see
/// [`crate::commands::misc`]); the fixed blob form exists for storage and
/// round-trip testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModbusParams {
    /// Modbus slave address
    pub address: u8,
    /// Baud-rate code
    pub baud_rate_code: u32,
    /// Parity code
    pub parity_code: u8,
    /// Stop-bits code
    pub stop_bits_code: u8,
    /// Protocol variant code
    pub protocol_code: u8,
}

impl Default for ModbusParams {
    fn default() -> Self {
        Self { address: 1, baud_rate_code: 9600, parity_code: 0, stop_bits_code: 0, protocol_code: 0 }
    }
}

impl ModbusParams {
    /// Wire size of the blob form.
    pub const ENCODED_LEN: usize = 8;

    /// Encode into the 8-byte blob layout.
    pub fn encode(&self) -> Result<[u8; Self::ENCODED_LEN]> {
        let baud = self.baud_rate_code.to_be_bytes();
        Ok([
            self.address,
            baud[0],
            baud[1],
            baud[2],
            baud[3],
            self.parity_code,
            self.stop_bits_code,
            self.protocol_code,
        ])
    }

    /// Decode the 8-byte blob layout.
    pub fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, Self::ENCODED_LEN)?;
        Ok(Self {
            address: data[0],
            baud_rate_code: u32::from_be_bytes([data[1], data[2], data[3], data[4]]),
            parity_code: data[5],
            stop_bits_code: data[6],
            protocol_code: data[7],
        })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn ext_params_round_trip() {
        let params =
            ExtParams { relay_mode: 1, relay_time: 30, verify_flag: 1, verify_pwd: 0xBEEF };
        let wire = params.encode().unwrap();
        assert_eq!(wire, [0x01, 0x1E, 0x01, 0xBE, 0xEF]);
        assert_eq!(ExtParams::decode(&wire).unwrap(), params);
    }

    #[test]
    fn ext_params_validates_flags() {
        let params = ExtParams { relay_mode: 2, ..ExtParams::default() };
        assert!(matches!(params.encode(), Err(ProtocolError::InvalidArgument(_))));
    }

    #[test]
    fn working_params_validates_mode() {
        let params = WorkingParams { work_mode: 3, ..WorkingParams::default() };
        assert!(matches!(params.encode(), Err(ProtocolError::InvalidArgument(_))));
    }

    #[test]
    fn transport_params_default_layout() {
        let wire = TransportParams::default().encode().unwrap();
        assert_eq!(wire.len(), TransportParams::ENCODED_LEN);
        assert_eq!(&wire[6..10], &[192, 168, 1, 178]);
        assert_eq!(u16::from_be_bytes([wire[18], wire[19]]), 6000);
    }

    macro_rules! reject_wrong_lengths {
        ($name:ident, $ty:ty) => {
            #[test]
            fn $name() {
                for len in [0, <$ty>::ENCODED_LEN - 1, <$ty>::ENCODED_LEN + 1] {
                    let data = vec![0u8; len];
                    assert!(
                        matches!(<$ty>::decode(&data), Err(ProtocolError::ParamLength { .. })),
                        "length {len} accepted"
                    );
                }
            }
        };
    }

    reject_wrong_lengths!(ext_rejects_wrong_lengths, ExtParams);
    reject_wrong_lengths!(working_rejects_wrong_lengths, WorkingParams);
    reject_wrong_lengths!(transport_rejects_wrong_lengths, TransportParams);
    reject_wrong_lengths!(advance_rejects_wrong_lengths, AdvanceParams);
    reject_wrong_lengths!(usb_rejects_wrong_lengths, UsbDataParams);
    reject_wrong_lengths!(data_flag_rejects_wrong_lengths, DataFlagParams);
    reject_wrong_lengths!(modbus_rejects_wrong_lengths, ModbusParams);

    proptest! {
        #[test]
        fn working_params_round_trip(
            read_duration in any::<u16>(),
            read_interval in any::<u16>(),
            work_mode in 0u8..=2,
            tag_upload_flag in any::<u16>(),
            wiegand_interval in any::<u16>(),
        ) {
            let params = WorkingParams {
                read_duration,
                read_interval,
                work_mode,
                tag_upload_flag,
                wiegand_interval,
                ..WorkingParams::default()
            };
            let wire = params.encode().unwrap();
            prop_assert_eq!(wire.len(), WorkingParams::ENCODED_LEN);
            prop_assert_eq!(WorkingParams::decode(&wire).unwrap(), params);
        }

        #[test]
        fn transport_params_round_trip(
            transport_type in any::<u8>(),
            uart_baud_rate in any::<u32>(),
            dhcp_flag in any::<u8>(),
            ip in prop::array::uniform4(any::<u8>()),
            local_port in any::<u16>(),
            remote_port in any::<u16>(),
            heartbeat_interval in any::<u8>(),
        ) {
            let params = TransportParams {
                transport_type,
                uart_baud_rate,
                dhcp_flag,
                ip_addr: Ipv4Addr::from(ip),
                local_port,
                remote_port,
                heartbeat_interval,
                ..TransportParams::default()
            };
            let wire = params.encode().unwrap();
            prop_assert_eq!(wire.len(), TransportParams::ENCODED_LEN);
            prop_assert_eq!(TransportParams::decode(&wire).unwrap(), params);
        }

        #[test]
        fn advance_params_round_trip(
            rf_link_profile in 0u8..=5,
            rf_spectrum_start in any::<u32>(),
            rf_spectrum_end in any::<u32>(),
            rf_inventory_ant_flag in any::<u32>(),
            rf_write_power in any::<u16>(),
        ) {
            let params = AdvanceParams {
                rf_link_profile,
                rf_spectrum_start,
                rf_spectrum_end,
                rf_inventory_ant_flag,
                rf_write_power,
                ..AdvanceParams::default()
            };
            let wire = params.encode().unwrap();
            prop_assert_eq!(wire.len(), AdvanceParams::ENCODED_LEN);
            prop_assert_eq!(AdvanceParams::decode(&wire).unwrap(), params);
        }

        #[test]
        fn small_blocks_round_trip(
            usb in prop::array::uniform3(any::<u8>()),
            data_flag in any::<u16>(),
            data_format in any::<u8>(),
            modbus_address in any::<u8>(),
            baud_rate_code in any::<u32>(),
        ) {
            let usb_params = UsbDataParams {
                usb_enable: usb[0],
                data_interval: usb[1],
                keyboard_layout: usb[2],
            };
            prop_assert_eq!(
                UsbDataParams::decode(&usb_params.encode().unwrap()).unwrap(),
                usb_params
            );

            let flag_params = DataFlagParams { data_flag, data_format };
            prop_assert_eq!(
                DataFlagParams::decode(&flag_params.encode().unwrap()).unwrap(),
                flag_params
            );

            let modbus = ModbusParams {
                address: modbus_address,
                baud_rate_code,
                ..ModbusParams::default()
            };
            prop_assert_eq!(ModbusParams::decode(&modbus.encode().unwrap()).unwrap(), modbus);
        }
    }
}
