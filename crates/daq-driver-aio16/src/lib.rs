//! Driver for the AccesIO 104-AIO16-16 analog input board.
//!
//! This crate models the board's interrupt-driven acquisition path: the
//! hardware converts a window of channels at high rate with 16x
//! oversampling, and raises an interrupt whenever its FIFO reaches half
//! full. The interrupt handler drains one half-FIFO of raw conversions
//! into a bounded block queue; a decimation worker averages each channel's
//! oversampled conversions into one sample per scan, reconstructs
//! per-scan time-of-day tags, and stages framed records toward a
//! byte-stream delivery channel with latency-based flushing.
//!
//! # Architecture
//!
//! - [`Aio16Board`] - board handle: configure, start, stop, interrupt service
//! - [`ChannelTable`] / [`ScanConfig`] - requested channels and the
//!   validated scan geometry derived from them
//! - [`RegisterBus`] - the seam to the hardware's I/O window
//! - [`SampleSink`] / [`SinkFactory`] - the seam to the delivery channel
//! - [`ControlRequest`] / [`dispatch`] - typed control-plane surface
//! - [`mock`] - register, clock, and sink mocks for hardware-free tests
//!
//! Overflow never blocks a producer anywhere in the pipeline: a full block
//! queue drops raw blocks, a full staging buffer drops output scans, and
//! both are counted and reported through [`BoardStatus`].
//!
//! # Example
//!
//! ```
//! use daq_driver_aio16::mock::{ManualClock, MemorySink, MockBus};
//! use daq_driver_aio16::{Aio16Board, ChannelTable, StatusReg};
//!
//! # fn main() -> anyhow::Result<()> {
//! let bus = MockBus::new();
//! bus.set_status((StatusReg::BIPOLAR | StatusReg::FIFO_HALF_FULL).bits());
//!
//! let (sinks, delivered) = MemorySink::factory();
//! let board = Aio16Board::new(bus, ManualClock::new(0), sinks);
//!
//! let table = ChannelTable::from_toml_str(
//!     r#"
//!     latency_ms = 250
//!
//!     [[channel]]
//!     index = 0
//!     rate_hz = 100
//!     gain = 2
//!     bipolar = true
//!     "#,
//! )?;
//! board.configure(&table)?;
//! board.start()?;
//! // interrupts now feed the pipeline; records appear in `delivered`
//! board.stop();
//! # drop(delivered);
//! # Ok(())
//! # }
//! ```

pub mod board;
pub mod clock;
pub mod config;
pub mod control;
pub mod error;
pub mod mock;
pub mod output;
pub mod queue;
pub mod registers;
pub mod timing;

mod worker;

pub use board::{Aio16Board, BoardStatus, CounterSnapshot, IsrOutcome};
pub use clock::{MsClock, SystemMsClock, TimeTag, MSECS_PER_DAY};
pub use config::{ChannelConfig, ChannelTable, ScanConfig, DEFAULT_LATENCY_MS, OVERSAMPLE};
pub use control::{dispatch, ControlRequest, ControlResponse, NUM_PORTS};
pub use error::{Aio16Error, Result};
pub use output::{SampleSink, SinkFactory, OUT_BUFFER_SIZE, RECORD_HEADER_LEN};
pub use queue::{BlockSignal, RawBlock, RawQueue, RAW_QUEUE_BLOCKS};
pub use registers::{
    JumperSettings, RegisterBus, StatusReg, HALF_FIFO_SAMPLES, INPUT_CLOCK_HZ, NUM_CHANNELS,
};
