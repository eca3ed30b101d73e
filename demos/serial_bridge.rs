use std::{
    env,
    io::{BufRead, Write as _},
    sync::mpsc,
    time::Duration,
};

use inquire::Select;
use modbus_serial_bridge::{BridgeConfig, Clock, Instant, RtuTransport, SerialBridge, Step};
use serialport::SerialPort;

// Configuration constants - adjust these for your setup
const BUS_BAUD_RATE: u32 = 115200;
const DOWNSTREAM_BAUD_RATE: u32 = 9600;
const SERIAL_TIMEOUT_MS: u64 = 100;
const MODBUS_UNIT_ID: u8 = 0x01;
const IDLE_SLEEP_MS: u64 = 5;

pub struct PortWrapper(Box<dyn SerialPort>);

#[derive(Debug)]
pub struct IoError(std::io::Error);

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0.kind() {
            std::io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
            std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
            std::io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
            std::io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
            std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            std::io::ErrorKind::Unsupported => embedded_io::ErrorKind::Unsupported,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for PortWrapper {
    type Error = IoError;
}

impl embedded_io::Read for PortWrapper {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(&mut self.0, buf).map_err(IoError)
    }
}

impl embedded_io::Write for PortWrapper {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.0, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0).map_err(IoError)
    }
}

/// Milliseconds since the demo started.
struct StdClock(std::time::Instant);

impl Clock for StdClock {
    fn now(&self) -> Instant {
        Instant::from_ticks(self.0.elapsed().as_millis() as u64)
    }
}

fn main() {
    env_logger::init();

    // Get serial port from command line arg or interactive selection
    let port_name = env::args().nth(1).unwrap_or_else(|| {
        let ports = serialport::available_ports().expect("Failed to enumerate serial ports");

        if ports.is_empty() {
            eprintln!("No serial ports found!");
            std::process::exit(1);
        }

        let port_names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();

        Select::new("Select a serial port:", port_names)
            .prompt()
            .expect("Failed to select port")
    });

    eprintln!("Using port: {}", port_name);

    let port = serialport::new(&port_name, BUS_BAUD_RATE)
        .timeout(Duration::from_millis(SERIAL_TIMEOUT_MS))
        .open()
        .expect("Failed to open serial port");

    let config = BridgeConfig::builder()
        .with_unit_id(MODBUS_UNIT_ID)
        .with_baud_rate(DOWNSTREAM_BAUD_RATE)
        .build()
        .expect("Invalid bridge configuration");

    let transport: RtuTransport<PortWrapper> =
        RtuTransport::new(PortWrapper(port), config.unit_id());
    let mut bridge = SerialBridge::new(transport, StdClock(std::time::Instant::now()), config);

    // Lines typed on stdin go to the device; end of input shuts the bridge down once sent.
    let (lines_tx, lines_rx) = mpsc::channel::<Vec<u8>>();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(mut line) = line else { break };
            line.push('\n');
            if lines_tx.send(line.into_bytes()).is_err() {
                break;
            }
        }
    });

    let mut input_closed = false;
    let mut was_connected = false;
    let mut buf = [0u8; 256];
    let mut stdout = std::io::stdout();

    loop {
        loop {
            match lines_rx.try_recv() {
                Ok(bytes) => bridge.write(&bytes),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    input_closed = true;
                    break;
                }
            }
        }
        if input_closed && bridge.tx_pending() == 0 {
            bridge.shutdown();
        }

        let step = bridge.step();

        let n = bridge.read(&mut buf);
        if n > 0 {
            stdout.write_all(&buf[..n]).expect("Failed to write stdout");
            stdout.flush().expect("Failed to flush stdout");
        }

        if bridge.is_connected() != was_connected {
            was_connected = bridge.is_connected();
            eprintln!("Remote end {}", if was_connected { "connected" } else { "disconnected" });
        }

        match step {
            Step::Busy => {}
            Step::Waiting => std::thread::sleep(Duration::from_millis(IDLE_SLEEP_MS)),
            Step::Stopped => break,
        }
    }

    eprintln!("Bridge stopped in state {}", bridge.state().name());
}
