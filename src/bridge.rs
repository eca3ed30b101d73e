//! Driving the state machine against a real transport.

use alloc::{collections::VecDeque, vec::Vec};

use fugit::TimerInstantU64;

use crate::{
    config::BridgeConfig,
    error::TransportError,
    fsm::{self, Action, Context, Event, ReadReport, State},
    register::SerialRegister,
    rx::interpret,
    status::StatusWord,
    transport::RegisterTransport,
    tx::{TxPlan, pack_registers},
};

/// Millisecond timestamp used for the poll and backoff timers.
pub type Instant = TimerInstantU64<1000>;

/// A monotonic millisecond clock.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// What a call to [SerialBridge::step] achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Something happened; call again straight away.
    Busy,
    /// Waiting on a timer or for data to send. Come back later.
    Waiting,
    /// Shut down.
    Stopped,
}

/// Streams bytes to and from one serial-over-Modbus device.
///
/// The application queues outgoing bytes with [Self::write], collects incoming bytes with
/// [Self::read], and keeps the bridge going by calling [Self::step]. Each step performs at most one
/// register transaction and never sleeps, so it can be driven from a main loop or a dedicated task.
pub struct SerialBridge<T: RegisterTransport, C: Clock> {
    transport: T,
    clock: C,
    config: BridgeConfig,
    state: State,
    next: Action,
    tx_queue: VecDeque<u8>,
    rx_queue: VecDeque<u8>,
    poll_deadline: Option<Instant>,
    backoff_deadline: Option<Instant>,
    shutdown: bool,
}

impl<T: RegisterTransport, C: Clock> SerialBridge<T, C> {
    pub fn new(transport: T, clock: C, config: BridgeConfig) -> Self {
        let ctx = Context {
            tx_pending: 0,
            poll_expired: false,
            read_window: config.read_window(),
        };
        let (state, next) = fsm::enter(State::initial(), &ctx);
        Self {
            transport,
            clock,
            config,
            state,
            next,
            tx_queue: VecDeque::new(),
            rx_queue: VecDeque::new(),
            poll_deadline: None,
            backoff_deadline: None,
            shutdown: false,
        }
    }

    /// Queue bytes for the device.
    pub fn write(&mut self, bytes: &[u8]) {
        self.tx_queue.extend(bytes);
    }

    /// Take up to `buf.len()` received bytes. Returns how many were copied.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.rx_queue.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx_queue.drain(..n)) {
            *slot = byte;
        }
        n
    }

    /// Received bytes waiting for [Self::read].
    pub fn available(&self) -> usize {
        self.rx_queue.len()
    }

    /// Queued bytes not yet accepted by the device.
    pub fn tx_pending(&self) -> usize {
        self.tx_queue.len()
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// The most recent status read from the device, if operating.
    pub fn last_status(&self) -> Option<StatusWord> {
        self.state.session().and_then(|session| session.status)
    }

    /// Whether the device reports a consumer on its side of the link.
    pub fn is_connected(&self) -> bool {
        self.last_status().is_some_and(|status| status.is_connected())
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Ask the bridge to stop. Takes effect at the start of the next [Self::step].
    pub fn shutdown(&mut self) {
        self.shutdown = true;
    }

    /// Give back the transport and clock.
    pub fn release(self) -> (T, C) {
        (self.transport, self.clock)
    }

    /// Do the next piece of work.
    pub fn step(&mut self) -> Step {
        if self.shutdown && self.state != State::Stopped {
            log::debug!("shutdown requested in {}", self.state.name());
            self.handle(Event::Shutdown);
        }

        match self.next {
            Action::Halt => return Step::Stopped,
            Action::Configure => {
                let result = self.configure();
                self.handle(Event::Configured(result));
            }
            Action::ArmBackoff => {
                self.backoff_deadline = Some(self.clock.now() + self.config.device_backoff());
                self.next = Action::Wait;
            }
            Action::ArmPoll => {
                self.poll_deadline = Some(self.clock.now() + self.config.poll_interval());
                self.next = Action::Wait;
            }
            Action::Wait => return self.wait(),
            Action::Read { window } => {
                // Any status read answers the poll.
                self.poll_deadline = None;
                let result = self.read_device(window);
                self.handle(Event::ReadDone(result));
            }
            Action::Write(plan) => {
                let result = self.write_device(plan);
                self.handle(Event::WriteDone(result));
            }
        }
        Step::Busy
    }

    fn wait(&mut self) -> Step {
        let now = self.clock.now();
        let event = match self.state {
            State::AwaitingDevice if self.backoff_deadline.is_none_or(|at| now >= at) => {
                Event::BackoffExpired
            }
            State::Idle(_) if self.poll_expired(now) => Event::PollExpired,
            State::Idle(_) if !self.tx_queue.is_empty() => Event::WriteQueued,
            _ => return Step::Waiting,
        };

        self.handle(event);
        if self.next == Action::Wait {
            // Held back: refused, or the device has no room.
            Step::Waiting
        } else {
            Step::Busy
        }
    }

    fn handle(&mut self, event: Event) {
        let ctx = Context {
            tx_pending: self.tx_queue.len(),
            poll_expired: self.poll_expired(self.clock.now()),
            read_window: self.config.read_window(),
        };
        let (state, next) = fsm::transition(self.state, event, &ctx);

        if core::mem::discriminant(&state) != core::mem::discriminant(&self.state) {
            log::debug!("{} -> {}", self.state.name(), state.name());
            match (self.state.is_operating(), state) {
                (false, State::Idle(_)) => log::info!("device configured"),
                (true, State::AwaitingDevice) => log::info!("device lost"),
                _ => {}
            }
        }

        self.state = state;
        self.next = next;
    }

    fn poll_expired(&self, now: Instant) -> bool {
        self.poll_deadline.is_some_and(|at| now >= at)
    }

    fn configure(&mut self) -> Result<(), TransportError> {
        let registers = self.config.baud_rate_registers();
        self.transport
            .write_holding_registers(SerialRegister::Baudrate.number(), &registers)
            .map_err(|err| failed("configuring baud rate", err))
    }

    /// Read the status and `window` data registers in one go and deliver what is valid.
    fn read_device(&mut self, window: u16) -> Result<ReadReport, TransportError> {
        let count = window + 1;
        let registers = self
            .transport
            .read_input_registers(SerialRegister::Status.number(), count)
            .map_err(|err| failed("status read", err))?;

        if registers.len() != count as usize {
            log::debug!("expected {} registers, got {}", count, registers.len());
            return Err(TransportError::MalformedResponse);
        }
        let Some((&raw_status, data)) = registers.split_first() else {
            return Err(TransportError::MalformedResponse);
        };

        // The status came first in the burst, so it describes the data that follows.
        let status = StatusWord::decode(raw_status);
        let chunk = interpret(status, data);
        log::debug!(
            "read {:?}: {} bytes, {} more waiting",
            status,
            chunk.payload.len(),
            chunk.bytes_remaining
        );
        self.rx_queue.extend(chunk.payload);

        Ok(ReadReport {
            status,
            rx_remaining: chunk.bytes_remaining,
        })
    }

    /// Send the front of the queue as planned. Bytes leave the queue only once acknowledged.
    fn write_device(&mut self, plan: TxPlan) -> Result<u16, TransportError> {
        let payload: Vec<u8> = self
            .tx_queue
            .iter()
            .take(plan.bytes_to_send as usize)
            .copied()
            .collect();
        let values = pack_registers(&payload);

        self.transport
            .write_holding_registers(plan.first_register, &values)
            .map_err(|err| failed("transmit write", err))?;

        self.tx_queue.drain(..payload.len());
        log::debug!(
            "sent {} bytes at register {}, {} queued",
            payload.len(),
            plan.first_register,
            self.tx_queue.len()
        );
        Ok(payload.len() as u16)
    }
}

fn failed<E: Into<TransportError> + core::fmt::Debug>(what: &str, err: E) -> TransportError {
    log::debug!("{} failed: {:?}", what, err);
    let err = err.into();
    if let TransportError::Exception(code) = err {
        log::warn!("device refused {} with exception 0x{:02X}", what, code);
    }
    err
}
