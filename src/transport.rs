//! Register transactions, as the bridge sees them, and a Modbus RTU implementation.

use alloc::vec::Vec;

use embedded_io::Error as _;

use crate::{
    error::{Error, Result, TransportError},
    register::address_of,
};

/// Bytes in a Modbus RTU exception reply: unit, function, code and CRC.
const EXCEPTION_FRAME_LEN: usize = 5;
/// Bytes in a write-multiple reply: unit, function, address, count and CRC.
const WRITE_REPLY_LEN: usize = 8;
/// Most registers a single transaction of this protocol ever carries.
const MAX_REGISTERS: usize = 64;

/// A way of issuing register transactions to one device.
///
/// Registers are given as 1-origin register numbers. Only one transaction is ever in flight.
pub trait RegisterTransport {
    type Error: Into<TransportError> + core::fmt::Debug;

    /// Read `count` consecutive input registers starting at `register`.
    fn read_input_registers(
        &mut self,
        register: u16,
        count: u16,
    ) -> core::result::Result<Vec<u16>, Self::Error>;

    /// Write `values` to consecutive holding registers starting at `register`.
    fn write_holding_registers(
        &mut self,
        register: u16,
        values: &[u16],
    ) -> core::result::Result<(), Self::Error>;
}

/// You can create a RtuTransport using any interface which implements [embedded_io::Read] &
/// [embedded_io::Write].
///
/// The interface's reads are expected to time out (or report `Other`, like a non-blocking port)
/// when the device stays silent.
pub struct RtuTransport<S: embedded_io::Read + embedded_io::Write, const L: usize = 256> {
    interface: S,
    /// Modbus unit ID of the device.
    unit_id: u8,
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> RtuTransport<S, L> {
    /// Create a new RtuTransport with the given interface and unit ID
    pub fn new(interface: S, unit_id: u8) -> Self {
        Self { interface, unit_id }
    }

    /// Give back the serial interface.
    pub fn release(self) -> S {
        self.interface
    }

    /// Read multiple, sequential input registers.
    pub fn read_inputs(&mut self, register: u16, count: u16) -> Result<Vec<u16>, S::Error> {
        if count == 0 || count as usize > MAX_REGISTERS {
            return Err(Error::InvalidRange);
        }

        let mut buff: heapless::Vec<u8, L> = heapless::Vec::new();
        let mut req = rmodbus::client::ModbusRequest::new(self.unit_id, rmodbus::ModbusProto::Rtu);
        req.generate_get_inputs(address_of(register), count, &mut buff)?;
        self.send(&buff)?;

        // Reuse same buffer when reading back: unit, function, byte count, data, CRC.
        buff.clear();
        self.receive(&mut buff, 5 + 2 * count as usize)?;

        let mut parsed_data: heapless::Vec<u16, MAX_REGISTERS> = heapless::Vec::new();
        req.parse_u16(&buff, &mut parsed_data)?;
        if parsed_data.len() != count as usize {
            log::debug!(
                "asked for {} registers at {}, got {}",
                count,
                register,
                parsed_data.len()
            );
            return Err(Error::InvalidResponse);
        }
        Ok(parsed_data.iter().copied().collect())
    }

    /// Write to multiple, sequential holding registers.
    pub fn write_holdings(&mut self, register: u16, data: &[u16]) -> Result<(), S::Error> {
        if data.is_empty() || data.len() > MAX_REGISTERS {
            return Err(Error::InvalidRange);
        }

        let mut buff: heapless::Vec<u8, L> = heapless::Vec::new();
        let mut req = rmodbus::client::ModbusRequest::new(self.unit_id, rmodbus::ModbusProto::Rtu);
        req.generate_set_holdings_bulk(address_of(register), data, &mut buff)?;
        self.send(&buff)?;

        buff.clear();
        self.receive(&mut buff, WRITE_REPLY_LEN)?;
        req.parse_ok(&buff)?;
        Ok(())
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), S::Error> {
        self.interface
            .write_all(frame)
            .map_err(Error::SerialError)?;
        self.interface.flush().map_err(Error::SerialError)
    }

    /// Read one reply frame of `frame_len` bytes, or a shorter exception frame.
    ///
    /// Never reads past the end of the frame, so a late reply can't leak into the next one.
    fn receive(
        &mut self,
        buff: &mut heapless::Vec<u8, L>,
        frame_len: usize,
    ) -> Result<(), S::Error> {
        let mut frame_len = frame_len;
        let mut temp_buf = [0u8; 32];
        while buff.len() < frame_len {
            // The function code tells us whether this is an exception, so get it first.
            let target = if buff.len() < 2 { 2 } else { frame_len };
            let want = (target - buff.len()).min(temp_buf.len());

            match self.interface.read(&mut temp_buf[..want]) {
                Ok(0) if buff.is_empty() => return Err(Error::Timeout),
                Ok(0) => break,
                Ok(bytes_read) => {
                    buff.extend_from_slice(&temp_buf[..bytes_read])
                        .map_err(|_| Error::BufferError)?;
                    if buff.len() >= 2 && buff[1] & 0x80 != 0 {
                        frame_len = EXCEPTION_FRAME_LEN;
                    }
                }
                Err(e) => {
                    if !matches!(
                        e.kind(),
                        embedded_io::ErrorKind::Other | embedded_io::ErrorKind::TimedOut
                    ) {
                        return Err(Error::SerialError(e));
                    }
                    if buff.is_empty() {
                        return Err(Error::Timeout);
                    }
                    // Garbled or cut short; let the parser reject it.
                    break;
                }
            }
        }
        Ok(())
    }
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> RegisterTransport
    for RtuTransport<S, L>
{
    type Error = Error<S::Error>;

    fn read_input_registers(
        &mut self,
        register: u16,
        count: u16,
    ) -> core::result::Result<Vec<u16>, Self::Error> {
        self.read_inputs(register, count)
    }

    fn write_holding_registers(
        &mut self,
        register: u16,
        values: &[u16],
    ) -> core::result::Result<(), Self::Error> {
        self.write_holdings(register, values)
    }
}
