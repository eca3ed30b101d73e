//! The 16-bit status word the device publishes in its status register.
//!
//! Layout, LSB first:
//! * bits 0..=6 - `rx_avail`, bytes waiting in the device's receive queue.
//! * bit 7 - `tx_empty`, the device transmitter is idle.
//! * bits 8..=14 - `tx_avail`, free byte slots in the device's transmit queue.
//! * bit 15 - `connected`, the device sees a downstream consumer.
//!
//! Both counts are in bytes, not registers.

use modular_bitfield::prelude::*;
use thiserror::Error;

/// Largest queue count the device ever reports.
pub const MAX_QUEUE_COUNT: u8 = 126;

/// Mask of a 7 bit count field, after normalisation.
const COUNT_MASK: u8 = 0x7F;

#[bitfield(bits = 16)]
#[derive(Clone, Copy, PartialEq, Eq)]
struct StatusBits {
    rx_avail: B7,
    tx_empty: bool,
    tx_avail: B7,
    connected: bool,
}

/// Returned by the checked setters when a count does not fit the field.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("queue count {0} is out of range (0-126)")]
pub struct FieldOverflow(pub u8);

/// Immutable view of one status register value.
///
/// The plain `with_*` setters truncate: excess bits of a count are silently masked off, exactly as
/// the device packs them. Use the `try_with_*` variants (or [StatusWord::new]) to have out of range
/// counts rejected instead.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct StatusWord(StatusBits);

impl StatusWord {
    /// Build a status word from validated fields.
    pub fn new(
        rx_avail: u8,
        tx_empty: bool,
        tx_avail: u8,
        connected: bool,
    ) -> Result<Self, FieldOverflow> {
        Self::default()
            .try_with_rx_avail(rx_avail)?
            .with_tx_empty(tx_empty)
            .try_with_tx_avail(tx_avail)
            .map(|status| status.with_connected(connected))
    }

    /// Unpack a raw register value. Every value is valid.
    pub fn decode(raw: u16) -> Self {
        Self(StatusBits::from_bytes(raw.to_le_bytes()))
    }

    /// Pack back into a raw register value.
    pub fn encode(self) -> u16 {
        u16::from_le_bytes(self.0.into_bytes())
    }

    /// Bytes ready to be read from the device.
    pub fn rx_avail(&self) -> u8 {
        self.0.rx_avail()
    }

    /// Registers needed to fetch all of [Self::rx_avail].
    pub fn rx_registers(&self) -> u16 {
        chars_to_registers(self.rx_avail() as u16)
    }

    pub fn is_tx_empty(&self) -> bool {
        self.0.tx_empty()
    }

    /// Free byte slots in the device's transmit queue.
    pub fn tx_avail(&self) -> u8 {
        self.0.tx_avail()
    }

    pub fn is_connected(&self) -> bool {
        self.0.connected()
    }

    /// Replace the receive count, truncated to 7 bits.
    pub fn with_rx_avail(self, n_avail: u8) -> Self {
        Self(self.0.with_rx_avail(n_avail & COUNT_MASK))
    }

    /// Replace the receive count, rejecting values above [MAX_QUEUE_COUNT].
    pub fn try_with_rx_avail(self, n_avail: u8) -> Result<Self, FieldOverflow> {
        check_count(n_avail).map(|n| self.with_rx_avail(n))
    }

    pub fn with_tx_empty(self, is_empty: bool) -> Self {
        Self(self.0.with_tx_empty(is_empty))
    }

    /// Replace the transmit count, truncated to 7 bits.
    pub fn with_tx_avail(self, n_avail: u8) -> Self {
        Self(self.0.with_tx_avail(n_avail & COUNT_MASK))
    }

    /// Replace the transmit count, rejecting values above [MAX_QUEUE_COUNT].
    pub fn try_with_tx_avail(self, n_avail: u8) -> Result<Self, FieldOverflow> {
        check_count(n_avail).map(|n| self.with_tx_avail(n))
    }

    pub fn with_connected(self, connected: bool) -> Self {
        Self(self.0.with_connected(connected))
    }
}

impl Default for StatusWord {
    fn default() -> Self {
        Self::decode(0)
    }
}

impl From<u16> for StatusWord {
    fn from(raw: u16) -> Self {
        Self::decode(raw)
    }
}

impl From<StatusWord> for u16 {
    fn from(status: StatusWord) -> Self {
        status.encode()
    }
}

impl core::fmt::Debug for StatusWord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StatusWord")
            .field("raw", &format_args!("{:#06x}", self.encode()))
            .field("rx_avail", &self.rx_avail())
            .field("tx_empty", &self.is_tx_empty())
            .field("tx_avail", &self.tx_avail())
            .field("connected", &self.is_connected())
            .finish()
    }
}

fn check_count(n: u8) -> Result<u8, FieldOverflow> {
    if n <= MAX_QUEUE_COUNT {
        Ok(n)
    } else {
        Err(FieldOverflow(n))
    }
}

/// Number of registers needed to carry `n_chars` bytes.
///
/// Written so that it cannot overflow, even for `0xFFFF`.
pub const fn chars_to_registers(n_chars: u16) -> u16 {
    (n_chars >> 1) + (n_chars & 1)
}
