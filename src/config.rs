use fugit::MillisDurationU64;
use thiserror::Error;

use crate::register::N_RX_DATA_REG;

/// Modbus unit ID the device answers on unless told otherwise.
pub const DEFAULT_UNIT_ID: u8 = 0x01;
/// Baud rate programmed into the device's downstream port.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
/// How long to sit in [Idle](crate::fsm::State::Idle) before polling the device.
pub const DEFAULT_POLL_INTERVAL: MillisDurationU64 = MillisDurationU64::millis(20);
/// How long to wait before trying an absent device again.
pub const DEFAULT_DEVICE_BACKOFF: MillisDurationU64 = MillisDurationU64::millis(2000);
/// Receive registers fetched alongside the status on a routine poll.
pub const DEFAULT_READ_WINDOW: u16 = 8;

/// Settings for a [SerialBridge](crate::bridge::SerialBridge).
///
/// Use [`BridgeConfigBuilder`] to create one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    unit_id: u8,
    baud_rate: u32,
    poll_interval: MillisDurationU64,
    device_backoff: MillisDurationU64,
    read_window: u16,
}

impl BridgeConfig {
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn poll_interval(&self) -> MillisDurationU64 {
        self.poll_interval
    }

    pub fn device_backoff(&self) -> MillisDurationU64 {
        self.device_backoff
    }

    /// Receive registers read with each poll, 1 to 63.
    pub fn read_window(&self) -> u16 {
        self.read_window
    }

    /// The baud rate as written to the 32-bit baud rate register, high word first.
    pub fn baud_rate_registers(&self) -> [u16; 2] {
        [(self.baud_rate >> 16) as u16, self.baud_rate as u16]
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            unit_id: DEFAULT_UNIT_ID,
            baud_rate: DEFAULT_BAUD_RATE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            device_backoff: DEFAULT_DEVICE_BACKOFF,
            read_window: DEFAULT_READ_WINDOW,
        }
    }
}

/// Use this type to create a [BridgeConfig].
#[derive(Debug, Clone, Copy, Default)]
pub struct BridgeConfigBuilder {
    config: BridgeConfig,
}

impl BridgeConfigBuilder {
    /// Set the Modbus unit ID of the device.
    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.config.unit_id = unit_id;
        self
    }

    /// Set the baud rate the device should use downstream.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.config.baud_rate = baud_rate;
        self
    }

    /// Set how often an idle bridge polls the device.
    pub fn with_poll_interval(mut self, interval: MillisDurationU64) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set how long to wait between attempts to find an absent device.
    pub fn with_device_backoff(mut self, backoff: MillisDurationU64) -> Self {
        self.config.device_backoff = backoff;
        self
    }

    /// Set the number of receive registers read with each poll.
    pub fn with_read_window(mut self, registers: u16) -> Self {
        self.config.read_window = registers;
        self
    }

    /// Let's build it!
    pub fn build(self) -> Result<BridgeConfig, BridgeConfigError> {
        let config = self.config;
        if !(1..=247).contains(&config.unit_id) {
            return Err(BridgeConfigError::InvalidUnitId(config.unit_id));
        }
        if config.baud_rate == 0 {
            return Err(BridgeConfigError::InvalidBaudRate);
        }
        if !(1..=N_RX_DATA_REG).contains(&config.read_window) {
            return Err(BridgeConfigError::InvalidReadWindow(config.read_window));
        }
        if config.device_backoff.ticks() == 0 {
            return Err(BridgeConfigError::ZeroBackoff);
        }
        Ok(config)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeConfigError {
    #[error("unit id {0} is not a valid Modbus device address")]
    InvalidUnitId(u8),
    #[error("baud rate must not be zero")]
    InvalidBaudRate,
    #[error("read window of {0} registers is outside 1-63")]
    InvalidReadWindow(u16),
    #[error("device backoff must not be zero")]
    ZeroBackoff,
}
