//! This module is used to define the registers of a serial-over-Modbus device.
//!
//! Register numbers here are 1-origin, as in device documentation. Use [address_of] to get the
//! 0-origin address that goes on the bus.

use strum_macros::EnumIter;

/// Number of 16-bit registers in the receive data window.
pub const N_RX_DATA_REG: u16 = 63;
/// Number of 16-bit registers in the two-byte transmit data window.
pub const N_TX_DATA_REG: u16 = 63;

/// First register of the receive data window.
pub const RX_DATA_FIRST: u16 = 1002;
/// Last register of the receive data window.
pub const RX_DATA_LAST: u16 = RX_DATA_FIRST + N_RX_DATA_REG - 1;
/// First register of the two-byte transmit data window.
pub const TX_DATA_FIRST: u16 = 2001;
/// Last register of the two-byte transmit data window.
pub const TX_DATA_LAST: u16 = TX_DATA_FIRST + N_TX_DATA_REG - 1;
/// The single-byte transmit register, directly after the transmit window.
pub const TX_DATA_BYTE: u16 = TX_DATA_LAST + 1;

#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
#[repr(u16)]
pub enum SerialRegister {
    /// __R__ - Input, 32 bits. Always reads as zero.
    Dummy = 1,
    /// __R/W__ - Holding, 32 bits. Baud rate of the device's downstream serial link.
    ///
    /// High word in the first register.
    Baudrate = 3,
    /// __R__ - Input. The [`StatusWord`](crate::status::StatusWord).
    Status = 1001,
    /// __R__ - Input, consuming. First of [N_RX_DATA_REG] registers of received bytes.
    RxData = RX_DATA_FIRST,
    /// __R__ - Input, consuming. Last receive data register.
    RxDataLast = RX_DATA_LAST,
    /// __W__ - Holding, appending. First of [N_TX_DATA_REG] registers of bytes to send.
    TxData = TX_DATA_FIRST,
    /// __W__ - Holding, appending. Last two-byte transmit register.
    TxDataLast = TX_DATA_LAST,
    /// __W__ - Holding, appending. Only the high byte is sent.
    TxDataByte = TX_DATA_BYTE,
}

impl SerialRegister {
    /// 1-origin register number.
    pub const fn number(self) -> u16 {
        self as u16
    }

    /// 0-origin bus address.
    pub const fn address(self) -> u16 {
        address_of(self as u16)
    }
}

impl From<SerialRegister> for u16 {
    fn from(value: SerialRegister) -> Self {
        value as u16
    }
}

/// Convert a 1-origin register number into its bus address.
pub const fn address_of(register: u16) -> u16 {
    register - 1
}

/// Convert a bus address into its 1-origin register number.
pub const fn register_of(address: u16) -> u16 {
    address + 1
}

/// Version of the register protocol, packed as `major.minor.patch.local`, one byte each.
///
/// Packed values compare in version order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProtocolVersion(u32);

/// The register layout this crate speaks.
pub const PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::new(0, 1, 0, 0);

impl ProtocolVersion {
    pub const fn new(major: u8, minor: u8, patch: u8, local: u8) -> Self {
        Self((major as u32) << 24 | (minor as u32) << 16 | (patch as u32) << 8 | local as u32)
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn major(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn minor(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn patch(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn local(self) -> u8 {
        self.0 as u8
    }
}

impl core::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())?;
        if self.local() != 0 {
            write!(f, ".{}", self.local())?;
        }
        Ok(())
    }
}
