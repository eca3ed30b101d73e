//! Interpreting a combined status + receive data read.

use alloc::vec::Vec;

use crate::status::{StatusWord, chars_to_registers};

/// The useful part of one receive read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RxChunk {
    /// Bytes received, in order.
    pub payload: Vec<u8>,
    /// Bytes the device still held after this read. A hint only, the next status read is the
    /// authority.
    pub bytes_remaining: u16,
    /// The device put something other than zero where no data was. Never part of the payload.
    pub filler_seen: bool,
}

/// Split `registers` into payload and filler.
///
/// `status` must be the status sampled at the start of the same transaction, before any of the
/// data registers were consumed. A status read after the data would undercount what is valid.
///
/// Registers past the valid count are ignored whatever they contain, as is the low half of the
/// last register when the count is odd.
pub fn interpret(status: StatusWord, registers: &[u16]) -> RxChunk {
    let avail = status.rx_avail() as usize;
    let requested = 2 * registers.len();

    let (n_bytes, bytes_remaining) = if avail >= requested {
        (requested, (avail - requested) as u16)
    } else {
        (avail, 0)
    };

    let n_valid = chars_to_registers(n_bytes as u16) as usize;
    let (valid, filler) = registers.split_at(n_valid);
    let odd_filler = n_bytes % 2 == 1 && valid.last().is_some_and(|last| last & 0x00FF != 0);
    let filler_seen = odd_filler || filler.iter().any(|&reg| reg != 0);
    if filler_seen {
        log::warn!(
            "device returned non-zero filler past {} valid bytes, ignoring it",
            n_bytes
        );
    }

    let mut payload: Vec<u8> = valid.iter().flat_map(|reg| reg.to_be_bytes()).collect();
    payload.truncate(n_bytes);

    RxChunk {
        payload,
        bytes_remaining,
        filler_seen,
    }
}
