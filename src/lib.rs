//! This crate streams bytes to and from a serial port that lives behind a Modbus device.
//!
//! The device exposes a small receive FIFO and a small transmit FIFO as registers, plus a status
//! register describing how full they are. A [SerialBridge](bridge::SerialBridge) polls that status,
//! drains the receive side into a local buffer and feeds queued bytes into the transmit side as
//! room allows, so the application just sees a byte stream.
//!
//! Register map, 1-origin register numbers:
//! * 3-4: downstream baud rate, 32 bit, high word first (holding)
//! * 1001: status (input)
//! * 1002-1064: receive data, two bytes per register, high byte first (input)
//! * 2001-2063: transmit data, two bytes per register, high byte first (holding)
//! * 2064: transmit a single byte from the high half (holding)
//!
//! It uses Modbus RTU under the hood via [RtuTransport](transport::RtuTransport), over anything
//! implementing [embedded_io::Read] & [embedded_io::Write]. Other transports can be plugged in by
//! implementing [RegisterTransport](transport::RegisterTransport).
//!
//! The crate is `no_std` but needs an allocator.

#![no_std]

extern crate alloc;
#[cfg(test)]
extern crate std;

pub mod bridge;
pub mod config;
pub mod error;
pub mod fsm;
pub mod register;
pub mod rx;
pub mod status;
pub mod transport;
pub mod tx;

#[cfg(test)]
mod mock_serial;

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use bridge::{Clock, Instant, SerialBridge, Step};
pub use config::{BridgeConfig, BridgeConfigBuilder, BridgeConfigError};
pub use error::TransportError;
pub use register::{PROTOCOL_VERSION, ProtocolVersion};
pub use status::StatusWord;
pub use transport::{RegisterTransport, RtuTransport};
