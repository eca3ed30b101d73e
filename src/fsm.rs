//! The host state machine.
//!
//! Two macro states:
//! * discovery - [State::Configuring] and [State::AwaitingDevice], until the device acknowledges
//!   its configuration.
//! * operating - [State::Idle], [State::Read] and [State::Write], moving bytes.
//!
//! [transition] is a pure function: it takes the current state and what just happened, and
//! returns the next state together with the one [Action] the driver has to perform next. All I/O,
//! timers and buffers live in [SerialBridge](crate::bridge::SerialBridge).

use strum_macros::IntoStaticStr;

use crate::{
    error::TransportError,
    register::N_RX_DATA_REG,
    status::{StatusWord, chars_to_registers},
    tx::{TxPlan, plan_write},
};

/// What the bridge knows about the device while operating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Session {
    /// Last status read from the device, `None` until the first read.
    pub status: Option<StatusWord>,
    /// Bytes the device still held after the last read.
    pub rx_remaining: u16,
    /// Bytes the device can still take since the last status read.
    pub tx_remaining: u16,
    /// The device refused the last transaction; wait out a poll interval before talking again.
    pub rejected: bool,
}

impl Session {
    /// Whether queued data may go out before the next poll.
    ///
    /// Not after a refusal, and not when the last status showed a full transmit queue.
    pub fn may_write(&self) -> bool {
        !self.rejected && (self.status.is_none() || self.tx_remaining > 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum State {
    /// Writing the baud rate to a device which may or may not be there.
    Configuring,
    /// The device did not answer; waiting for the backoff timer.
    AwaitingDevice,
    /// Waiting for outgoing data or the poll timer.
    Idle(Session),
    /// Reading the status and `window` receive registers.
    Read { session: Session, window: u16 },
    /// Sending queued bytes.
    Write(Session),
    /// Shut down, nothing more will happen.
    Stopped,
}

impl State {
    /// The state the bridge starts in.
    pub const fn initial() -> Self {
        State::Configuring
    }

    pub fn is_operating(&self) -> bool {
        matches!(self, State::Idle(_) | State::Read { .. } | State::Write(_))
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            State::Idle(session) | State::Read { session, .. } | State::Write(session) => {
                Some(session)
            }
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// Something that happened, fed to [transition].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The baud rate write finished.
    Configured(Result<(), TransportError>),
    /// The device-await backoff timer ran out.
    BackoffExpired,
    /// The poll timer ran out.
    PollExpired,
    /// The application has bytes waiting to be sent.
    WriteQueued,
    /// A status + receive read finished. The payload has already been delivered.
    ReadDone(Result<ReadReport, TransportError>),
    /// A transmit write finished, carrying this many bytes. They have already left the queue.
    WriteDone(Result<u16, TransportError>),
    /// Stop now.
    Shutdown,
}

/// Outcome of a successful read, as far as the state machine cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadReport {
    /// Status sampled at the start of the read.
    pub status: StatusWord,
    /// Bytes left on the device after this read.
    pub rx_remaining: u16,
}

/// What the driver has to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Write the baud rate register.
    Configure,
    /// Start the device-await backoff timer, then wait.
    ArmBackoff,
    /// Restart the poll timer, then wait.
    ArmPoll,
    /// Nothing to do until a timer runs out or data is queued.
    Wait,
    /// Read the status register followed by `window` receive registers.
    Read { window: u16 },
    /// Send queued bytes as planned.
    Write(TxPlan),
    /// Stop driving the machine.
    Halt,
}

/// Facts about the world outside the state machine, sampled when an event is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    /// Bytes queued by the application and not yet sent.
    pub tx_pending: usize,
    /// Whether the poll timer has run out.
    pub poll_expired: bool,
    /// Receive registers to read on a routine poll.
    pub read_window: u16,
}

/// Advance the machine by one event.
pub fn transition(state: State, event: Event, ctx: &Context) -> (State, Action) {
    use Event as E;
    use State as S;

    let next = match (state, event) {
        (S::Stopped, _) | (_, E::Shutdown) => S::Stopped,

        (S::Configuring, E::Configured(Ok(()))) => S::Idle(Session::default()),
        (S::Configuring, E::Configured(Err(_))) => S::AwaitingDevice,
        (S::AwaitingDevice, E::BackoffExpired) => S::Configuring,

        (S::Idle(session), E::WriteQueued) if ctx.tx_pending > 0 && session.may_write() => {
            S::Write(session)
        }
        (S::Idle(session), E::PollExpired) => S::Read {
            session,
            window: ctx.read_window,
        },

        (S::Read { .. }, E::ReadDone(Ok(report))) => after_read(report, ctx),
        (S::Write(session), E::WriteDone(Ok(sent))) => after_write(session, sent, ctx),
        (S::Read { session, .. }, E::ReadDone(Err(err)))
        | (S::Write(session), E::WriteDone(Err(err))) => after_failure(session, err),

        (state, _) => {
            // Not for this state; carry on with whatever it was doing.
            return match state {
                S::Idle(_) | S::AwaitingDevice => (state, Action::Wait),
                _ => enter(state, ctx),
            };
        }
    };

    enter(next, ctx)
}

/// Work out the entry action of `state`.
///
/// A write can't be planned without a known capacity, so [State::Write] may turn into a
/// [State::Read] here.
pub fn enter(state: State, ctx: &Context) -> (State, Action) {
    let action = match state {
        State::Configuring => Action::Configure,
        State::AwaitingDevice => Action::ArmBackoff,
        State::Idle(_) => Action::ArmPoll,
        State::Read { window, .. } => Action::Read { window },
        State::Write(session) => match session.status {
            Some(status) => {
                let room = status.with_tx_avail(session.tx_remaining as u8);
                let plan = plan_write(room, ctx.tx_pending);
                if plan.is_empty() {
                    // Full, or nothing to send after all. Refresh the status.
                    return enter(refresh(session, ctx), ctx);
                }
                Action::Write(plan)
            }
            None => return enter(refresh(session, ctx), ctx),
        },
        State::Stopped => Action::Halt,
    };
    (state, action)
}

fn refresh(session: Session, ctx: &Context) -> State {
    State::Read {
        session,
        window: ctx.read_window,
    }
}

fn after_read(report: ReadReport, ctx: &Context) -> State {
    let session = Session {
        status: Some(report.status),
        rx_remaining: report.rx_remaining,
        tx_remaining: report.status.tx_avail() as u16,
        rejected: false,
    };

    if ctx.tx_pending > 0 && session.tx_remaining > 0 {
        State::Write(session)
    } else if session.rx_remaining > 0 {
        State::Read {
            session,
            window: drain_window(session.rx_remaining, ctx.read_window),
        }
    } else {
        State::Idle(session)
    }
}

fn after_write(session: Session, sent: u16, ctx: &Context) -> State {
    let session = Session {
        tx_remaining: session.tx_remaining.saturating_sub(sent),
        ..session
    };

    if ctx.poll_expired || session.rx_remaining > 0 {
        State::Read {
            session,
            window: drain_window(session.rx_remaining, ctx.read_window),
        }
    } else if ctx.tx_pending > 0 && session.tx_remaining > 0 {
        State::Write(session)
    } else if ctx.tx_pending > 0 {
        // Out of room as far as we know; get a fresh capacity figure.
        refresh(session, ctx)
    } else {
        State::Idle(session)
    }
}

fn after_failure(session: Session, err: TransportError) -> State {
    if err.is_unreachable() {
        State::AwaitingDevice
    } else {
        State::Idle(Session {
            rejected: true,
            ..session
        })
    }
}

/// Receive window big enough for `rx_remaining` bytes, never below `read_window` nor above the
/// protocol maximum.
pub fn drain_window(rx_remaining: u16, read_window: u16) -> u16 {
    chars_to_registers(rx_remaining).clamp(read_window.min(N_RX_DATA_REG), N_RX_DATA_REG)
}
