//! 82C54 counter programming for the scan clock and channel-switch delay.
//!
//! The board paces conversions from a 10 MHz input clock through three
//! 16-bit counters: counter 0 times the delay between channel switches,
//! and counters 1 and 2 are chained to divide the input clock down to the
//! scan rate.

use tracing::debug;

use crate::registers::{cmd, ctr8254, reg, RegisterBus, INPUT_CLOCK_HZ};

/// Largest divisor one 16-bit counter can hold.
pub const COUNTER_LIMIT: u32 = 65_535;

/// Minimum channel-switch delay in nanoseconds.
pub const MIN_CHANNEL_DELAY_NS: u32 = 500;

/// Input-clock ticks per nanosecond step of the delay counter.
const NSECS_PER_TICK: u32 = 100;

/// Factor a tick count into two chained 16-bit divisors.
///
/// Repeatedly divides by 2 or 5 until the residue fits one counter. The
/// tick count must have no other prime factors once it exceeds the counter
/// limit; the scan-rate divisibility check guarantees that for every count
/// this module is handed.
pub fn divide_down(mut ticks: u32) -> (u16, u16) {
    let mut c1: u32 = 1;
    while ticks > COUNTER_LIMIT {
        if ticks % 2 == 0 {
            c1 *= 2;
            ticks /= 2;
        } else if ticks % 5 == 0 {
            c1 *= 5;
            ticks /= 5;
        } else {
            break;
        }
    }
    debug_assert!(ticks <= COUNTER_LIMIT && c1 <= COUNTER_LIMIT);
    (c1 as u16, ticks as u16)
}

/// Load one 82C54 counter: control word, then low byte, then high byte.
pub fn set_counter<B: RegisterBus>(bus: &B, counter: u8, mode: u8, value: u16) {
    let (select, port) = match counter {
        0 => (ctr8254::CNTR_0, reg::COUNTER_0),
        1 => (ctr8254::CNTR_1, reg::COUNTER_1),
        _ => (ctr8254::CNTR_2, reg::COUNTER_2),
    };
    let ctrl = select | ctr8254::RW_LS_MS | (mode << 1);
    bus.write8(reg::COUNTER_CTRL, ctrl);
    bus.write8(port, (value & 0xff) as u8);
    bus.write8(port, (value >> 8) as u8);
}

/// Program counters 1 and 2 to pace scans at `rate_hz`.
///
/// Returns the divisor pair actually loaded.
pub fn program_scan_clock<B: RegisterBus>(bus: &B, rate_hz: u32) -> (u16, u16) {
    let ticks = INPUT_CLOCK_HZ / rate_hz;
    let (c1, c2) = divide_down(ticks);
    debug!(rate_hz, ticks, c1, c2, "programming scan clock divisors");
    set_counter(bus, 1, ctr8254::MODE_2, c1);
    set_counter(bus, 2, ctr8254::MODE_2, c2);
    (c1, c2)
}

/// Program counter 0 with the delay between channel switches.
///
/// `delay_ns` is clamped up to the 500 ns hardware minimum.
pub fn program_channel_delay<B: RegisterBus>(bus: &B, delay_ns: u32) {
    let delay_ns = delay_ns.max(MIN_CHANNEL_DELAY_NS);
    let ticks = delay_ns / NSECS_PER_TICK;
    debug!(delay_ns, ticks, "programming channel-switch delay");
    set_counter(bus, 0, ctr8254::MODE_2, ticks as u16);
}

/// Command value for the oversample register, or `None` for unsupported
/// factors.
pub fn oversample_command(oversample: usize) -> Option<u8> {
    match oversample {
        1 => Some(cmd::OVERSAMPLE_X1),
        2 => Some(cmd::OVERSAMPLE_X2),
        8 => Some(cmd::OVERSAMPLE_X8),
        16 => Some(cmd::OVERSAMPLE_X16),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBus;

    #[test]
    fn small_divisor_fits_one_counter() {
        assert_eq!(divide_down(10_000), (1, 10_000));
        assert_eq!(divide_down(COUNTER_LIMIT), (1, 65_535));
    }

    #[test]
    fn large_divisor_factors_by_two_and_five() {
        // 10 Hz from 10 MHz
        let (c1, c2) = divide_down(1_000_000);
        assert_eq!(u32::from(c1) * u32::from(c2), 1_000_000);
        assert!(u32::from(c2) <= COUNTER_LIMIT);

        // 1 Hz from 10 MHz
        let (c1, c2) = divide_down(10_000_000);
        assert_eq!(u32::from(c1) * u32::from(c2), 10_000_000);
        assert!(u32::from(c2) <= COUNTER_LIMIT);
    }

    #[test]
    fn counter_load_writes_ctrl_then_lsb_msb() {
        let bus = MockBus::new();
        set_counter(&bus, 2, ctr8254::MODE_2, 0x1234);
        assert_eq!(
            bus.writes(),
            vec![
                (reg::COUNTER_CTRL, ctr8254::CNTR_2 | ctr8254::RW_LS_MS | 0x04),
                (reg::COUNTER_2, 0x34),
                (reg::COUNTER_2, 0x12),
            ]
        );
    }

    #[test]
    fn channel_delay_clamps_to_minimum() {
        let bus = MockBus::new();
        program_channel_delay(&bus, 0);
        // 500 ns at 10 MHz is 5 ticks
        assert_eq!(bus.writes()[1], (reg::COUNTER_0, 5));
    }

    #[test]
    fn oversample_commands_match_hardware_table() {
        assert_eq!(oversample_command(16), Some(cmd::OVERSAMPLE_X16));
        assert_eq!(oversample_command(1), Some(cmd::OVERSAMPLE_X1));
        assert_eq!(oversample_command(4), None);
    }
}
