//! Our error types for the serial bridge.

use thiserror::Error;

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Errors from the Modbus RTU transport over a serial interface.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Serial communication error")]
    SerialError(I),
    #[error("Modbus protocol error: {0}")]
    ModbusError(rmodbus::ErrorKind),
    #[error("Communication timeout")]
    Timeout,
    #[error("Invalid range")]
    InvalidRange,
    #[error("Invalid response received")]
    InvalidResponse,
    #[error("Frame does not fit the buffer")]
    BufferError,
}

impl<I: embedded_io::Error> From<rmodbus::ErrorKind> for Error<I> {
    fn from(err: rmodbus::ErrorKind) -> Self {
        Error::ModbusError(err)
    }
}

/// How a failed register transaction looks to the bridge.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Nothing, or nothing intelligible, came back.
    #[error("device unreachable")]
    DeviceUnreachable,
    /// A reply arrived but had the wrong shape, e.g. the wrong register count.
    #[error("malformed response")]
    MalformedResponse,
    /// The device answered with a Modbus exception.
    #[error("device rejected the request with exception {0:#04x}")]
    Exception(u8),
}

impl TransportError {
    /// True when the device should be treated as gone.
    ///
    /// Malformed replies count, we can't trust a device that garbles its answers.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::DeviceUnreachable | Self::MalformedResponse)
    }
}

impl<I: embedded_io::Error> From<Error<I>> for TransportError {
    fn from(err: Error<I>) -> Self {
        use rmodbus::ErrorKind as EK;
        match err {
            Error::SerialError(_) | Error::Timeout => Self::DeviceUnreachable,
            Error::ModbusError(kind) => match kind {
                EK::IllegalFunction => Self::Exception(0x01),
                EK::IllegalDataAddress => Self::Exception(0x02),
                EK::IllegalDataValue => Self::Exception(0x03),
                EK::SlaveDeviceFailure => Self::Exception(0x04),
                EK::SlaveDeviceBusy => Self::Exception(0x06),
                _ => Self::MalformedResponse,
            },
            Error::InvalidRange | Error::InvalidResponse | Error::BufferError => {
                Self::MalformedResponse
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_serial::MockSerialError;

    #[test]
    fn classification() {
        let err: TransportError = Error::<MockSerialError>::Timeout.into();
        assert_eq!(err, TransportError::DeviceUnreachable);
        assert!(err.is_unreachable());

        let err: TransportError = Error::SerialError(MockSerialError::SimulatedError).into();
        assert!(err.is_unreachable());

        let err: TransportError = Error::<MockSerialError>::InvalidResponse.into();
        assert_eq!(err, TransportError::MalformedResponse);
        assert!(err.is_unreachable());

        let err: TransportError =
            Error::<MockSerialError>::ModbusError(rmodbus::ErrorKind::IllegalDataAddress).into();
        assert_eq!(err, TransportError::Exception(0x02));
        assert!(!err.is_unreachable());

        let err: TransportError =
            Error::<MockSerialError>::ModbusError(rmodbus::ErrorKind::FrameCRCError).into();
        assert_eq!(err, TransportError::MalformedResponse);
    }
}
