//! Fitting outgoing bytes into the device's transmit window.

use alloc::vec::Vec;

use crate::{
    register::TX_DATA_BYTE,
    status::{StatusWord, chars_to_registers},
};

/// One register write, as computed by [plan_write].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxPlan {
    /// First register number to write.
    pub first_register: u16,
    /// Registers to write. Zero means nothing to send.
    pub register_count: u16,
    /// Payload bytes carried by those registers.
    pub bytes_to_send: u16,
}

impl TxPlan {
    /// A plan which carries nothing and must not be transmitted.
    pub fn is_empty(&self) -> bool {
        self.register_count == 0
    }
}

/// Work out how much of `bytes_available` fits into the device right now, and where to put it.
///
/// Asking for more than the device has room for is fine, the plan is just smaller and the rest has
/// to go in a later write.
pub fn plan_write(status: StatusWord, bytes_available: usize) -> TxPlan {
    // initialize assuming we have more than there's room for.
    let capacity = status.tx_avail() as u16;
    let bytes_to_send = match u16::try_from(bytes_available) {
        Ok(n) if n < capacity => n,
        _ => capacity,
    };

    TxPlan {
        first_register: tx_base_register(bytes_to_send),
        register_count: chars_to_registers(bytes_to_send),
        bytes_to_send,
    }
}

/// First register to write for `bytes_to_send` bytes.
///
/// The run always ends at the top of the window: on the last two-byte register for an even count,
/// on the single-byte register when an odd byte is left over.
pub const fn tx_base_register(bytes_to_send: u16) -> u16 {
    TX_DATA_BYTE - bytes_to_send / 2
}

/// Pack payload bytes into register values, high byte first.
///
/// A trailing odd byte lands in the high half of its register, low half zero.
pub fn pack_registers(payload: &[u8]) -> Vec<u16> {
    payload
        .chunks(2)
        .map(|pair| match *pair {
            [high, low] => u16::from_be_bytes([high, low]),
            [high] => u16::from_be_bytes([high, 0]),
            _ => 0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::TX_DATA_LAST;

    fn with_room(n: u8) -> StatusWord {
        StatusWord::default().with_tx_avail(n)
    }

    #[test]
    fn nothing_fits_when_device_is_full() {
        for wanted in [0, 1, 2, 127, 10_000] {
            let plan = plan_write(with_room(0), wanted);
            assert!(plan.is_empty());
            assert_eq!(plan.register_count, 0);
            assert_eq!(plan.bytes_to_send, 0);
        }
    }

    #[test]
    fn base_register_placement() {
        assert_eq!(tx_base_register(0), TX_DATA_BYTE);
        assert_eq!(tx_base_register(1), TX_DATA_BYTE);
        assert_eq!(tx_base_register(2), TX_DATA_LAST);
        assert_eq!(tx_base_register(3), TX_DATA_LAST);
        assert_eq!(tx_base_register(4), TX_DATA_LAST - 1);
    }

    #[test]
    fn run_ends_at_window_top() {
        for room in 0..=126u8 {
            for wanted in 0..=130usize {
                let plan = plan_write(with_room(room), wanted);
                assert_eq!(plan.bytes_to_send as usize, wanted.min(room as usize));

                if plan.is_empty() {
                    continue;
                }
                let last = plan.first_register + plan.register_count - 1;
                if plan.bytes_to_send % 2 == 1 {
                    assert_eq!(last, TX_DATA_BYTE);
                } else {
                    assert_eq!(last, TX_DATA_LAST);
                }
            }
        }
    }

    #[test]
    fn overflow_is_clamped() {
        let plan = plan_write(with_room(50), 200);
        assert_eq!(
            plan,
            TxPlan {
                first_register: TX_DATA_BYTE - 25,
                register_count: 25,
                bytes_to_send: 50,
            }
        );

        // More than u16 worth of pending data still plans against the device capacity.
        let plan = plan_write(with_room(7), usize::MAX);
        assert_eq!(plan.bytes_to_send, 7);
        assert_eq!(plan.register_count, 4);
        assert_eq!(plan.first_register, TX_DATA_LAST - 2);
    }

    #[test]
    fn full_window() {
        let plan = plan_write(with_room(126), 126);
        assert_eq!(plan.first_register, crate::register::TX_DATA_FIRST);
        assert_eq!(plan.register_count, 63);

        let plan = plan_write(with_room(127), 127);
        assert_eq!(plan.first_register, crate::register::TX_DATA_FIRST);
        assert_eq!(plan.register_count, 64);
    }

    #[test]
    fn packing_is_big_endian() {
        assert_eq!(pack_registers(b""), Vec::<u16>::new());
        assert_eq!(pack_registers(b"A"), [0x4100]);
        assert_eq!(pack_registers(b"AB"), [0x4142]);
        assert_eq!(pack_registers(b"ABC"), [0x4142, 0x4300]);
    }
}
