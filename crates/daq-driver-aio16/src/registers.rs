//! Register map of the 104-AIO16-16 board.
//!
//! Offsets are relative to the board's base I/O address (32-byte window).
//! Only the analog input side of the board is modeled here; the DAC,
//! digital I/O, and EEPROM ports are listed for completeness but unused.

use bitflags::bitflags;

/// Number of analog input channels on the board.
pub const NUM_CHANNELS: usize = 16;

/// Samples in half of the board's hardware FIFO. One interrupt delivers
/// exactly this many 16-bit conversions.
pub const HALF_FIFO_SAMPLES: usize = 1024;

/// A/D input clock frequency in Hz.
pub const INPUT_CLOCK_HZ: u32 = 10_000_000;

/// Register offsets within the board's I/O window.
pub mod reg {
    /// Start a software-triggered conversion (write).
    pub const START_CONVERSION: u16 = 0x00;
    /// Conversion FIFO (16-bit read).
    pub const FIFO: u16 = 0x00;
    /// FIFO reset (any write clears the FIFO).
    pub const FIFO_RESET: u16 = 0x01;
    /// First/last scanned channel, packed as `high << 4 | low`.
    pub const CHANNELS: u16 = 0x02;
    /// Burst mode control.
    pub const BURST_MODE: u16 = 0x03;
    /// Software gain select.
    pub const SW_GAIN: u16 = 0x04;
    /// Jumper configuration and FIFO/IRQ status (read).
    pub const CONFIG_STATUS: u16 = 0x08;
    /// Interrupt enable.
    pub const ENABLE_IRQ: u16 = 0x0c;
    /// 82C54 counter 0 data port.
    pub const COUNTER_0: u16 = 0x14;
    /// 82C54 counter 1 data port.
    pub const COUNTER_1: u16 = 0x15;
    /// 82C54 counter 2 data port.
    pub const COUNTER_2: u16 = 0x16;
    /// 82C54 control word.
    pub const COUNTER_CTRL: u16 = 0x17;
    /// Oversample configuration / A/D enable.
    pub const OVERSAMPLE: u16 = 0x1a;
    /// External trigger select.
    pub const EXT_TRIG_SEL: u16 = 0x1c;
    /// A/D counter mode select.
    pub const AD_COUNTER_MD: u16 = 0x1d;
    /// A/D counter enables.
    pub const ENABLE_AD_CNT: u16 = 0x1e;
}

/// Command values written to the registers above.
pub mod cmd {
    /// `OVERSAMPLE`: disable the A/D converter.
    pub const A2D_DISABLE: u8 = 0x00;
    /// `OVERSAMPLE`: run with 1x oversampling.
    pub const OVERSAMPLE_X1: u8 = 0x11;
    /// `OVERSAMPLE`: run with 2x oversampling.
    pub const OVERSAMPLE_X2: u8 = 0x91;
    /// `OVERSAMPLE`: run with 8x oversampling.
    pub const OVERSAMPLE_X8: u8 = 0x10;
    /// `OVERSAMPLE`: run with 16x oversampling.
    pub const OVERSAMPLE_X16: u8 = 0x90;

    /// `ENABLE_IRQ`: enable the half-full interrupt.
    pub const IRQ_ENABLE: u8 = 0x10;
    /// `ENABLE_IRQ`: disable interrupts.
    pub const IRQ_DISABLE: u8 = 0x00;

    /// `AD_COUNTER_MD`: timed (counter-paced) conversions.
    pub const TIMED_MODE: u8 = 0x10;

    /// `ENABLE_AD_CNT`: enable counter 0 (channel-switch delay).
    pub const ENABLE_CTR0: u8 = 0x80;
    /// `ENABLE_AD_CNT`: enable cascaded counters 1 and 2 (scan clock).
    pub const ENABLE_CTR12: u8 = 0x40;
}

/// 82C54 control-word fields.
pub mod ctr8254 {
    /// Select counter 0.
    pub const CNTR_0: u8 = 0x00;
    /// Select counter 1.
    pub const CNTR_1: u8 = 0x40;
    /// Select counter 2.
    pub const CNTR_2: u8 = 0x80;
    /// Read/write least significant byte then most significant byte.
    pub const RW_LS_MS: u8 = 0x30;
    /// Mode 2: rate generator.
    pub const MODE_2: u8 = 2;
}

bitflags! {
    /// Bits of the `CONFIG_STATUS` register.
    ///
    /// The low bits reflect board jumpers and are stable; the high bits are
    /// live FIFO and interrupt state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusReg: u8 {
        /// Conversion FIFO is empty.
        const FIFO_EMPTY = 0x80;
        /// Interrupts are enabled.
        const IRQ_ENABLED = 0x40;
        /// Conversion FIFO is at least half full.
        const FIFO_HALF_FULL = 0x20;
        /// DAC channel A jumpered for 5 V output.
        const DA5V = 0x10;
        /// DAC channel B jumpered for 5 V output.
        const DB5V = 0x08;
        /// Jumpers select the high-gain range set.
        const GAIN_HIGH = 0x04;
        /// Jumpers select bipolar input ranges.
        const BIPOLAR = 0x02;
        /// Jumpers select 16 single-ended inputs.
        const SINGLE_ENDED = 0x01;
    }
}

/// Input-range jumper settings sensed from the status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumperSettings {
    /// High-gain range set selected.
    pub high_gain: bool,
    /// Bipolar input ranges selected.
    pub bipolar: bool,
    /// 16 single-ended inputs (vs. 8 differential).
    pub single_ended: bool,
}

impl From<StatusReg> for JumperSettings {
    fn from(status: StatusReg) -> Self {
        Self {
            high_gain: status.contains(StatusReg::GAIN_HIGH),
            bipolar: status.contains(StatusReg::BIPOLAR),
            single_ended: status.contains(StatusReg::SINGLE_ENDED),
        }
    }
}

/// Byte-level access to the board's I/O window.
///
/// Implementations map `read8`/`write8`/`read16` onto port I/O (or a mock).
/// Port access itself cannot fail, so the methods are infallible; bad
/// offsets are a programming error on the implementation's side.
pub trait RegisterBus: Send + Sync {
    /// Read one byte from a register.
    fn read8(&self, offset: u16) -> u8;
    /// Write one byte to a register.
    fn write8(&self, offset: u16, value: u8);
    /// Read one 16-bit word from a register (FIFO reads).
    fn read16(&self, offset: u16) -> u16;
}
