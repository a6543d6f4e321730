//! In-memory board, clock, and sink mocks for tests and examples.
//!
//! [`MockBus`] emulates the register window well enough to exercise the
//! whole acquisition path without hardware: writes are logged for
//! assertions, the status register returns a scripted byte, and FIFO reads
//! pop from a scripted sample stream.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::clock::{MsClock, TimeTag};
use crate::output::{SampleSink, SinkFactory};
use crate::registers::{reg, RegisterBus};

/// Scriptable register bus.
#[derive(Debug, Default)]
pub struct MockBus {
    status: Mutex<u8>,
    fifo: Mutex<VecDeque<u16>>,
    writes: Mutex<Vec<(u16, u8)>>,
}

impl MockBus {
    /// New bus with an empty FIFO and a zero status byte.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the byte returned by status-register reads.
    pub fn set_status(&self, status: u8) {
        *self.status.lock() = status;
    }

    /// Append samples to the scripted FIFO stream.
    pub fn push_samples(&self, samples: &[u16]) {
        self.fifo.lock().extend(samples.iter().copied());
    }

    /// Samples still queued in the scripted FIFO.
    pub fn fifo_len(&self) -> usize {
        self.fifo.lock().len()
    }

    /// Every `(register, value)` byte write, in order.
    pub fn writes(&self) -> Vec<(u16, u8)> {
        self.writes.lock().clone()
    }

    /// Last value written to `offset`, if any.
    pub fn last_write(&self, offset: u16) -> Option<u8> {
        self.writes
            .lock()
            .iter()
            .rev()
            .find(|&&(at, _)| at == offset)
            .map(|&(_, value)| value)
    }
}

impl RegisterBus for MockBus {
    fn read8(&self, offset: u16) -> u8 {
        if offset == reg::CONFIG_STATUS {
            *self.status.lock()
        } else {
            0
        }
    }

    fn write8(&self, offset: u16, value: u8) {
        self.writes.lock().push((offset, value));
    }

    fn read16(&self, offset: u16) -> u16 {
        if offset == reg::FIFO {
            self.fifo.lock().pop_front().unwrap_or(0)
        } else {
            0
        }
    }
}

/// Clock that reports a manually set time of day.
#[derive(Debug)]
pub struct ManualClock {
    msecs: Mutex<u32>,
}

impl ManualClock {
    /// Clock starting at `msecs` past midnight.
    pub fn new(msecs: u32) -> Self {
        Self {
            msecs: Mutex::new(msecs),
        }
    }

    /// Move the clock to `msecs` past midnight.
    pub fn set(&self, msecs: u32) {
        *self.msecs.lock() = msecs;
    }
}

impl MsClock for ManualClock {
    fn now(&self) -> TimeTag {
        TimeTag::from_msecs(*self.msecs.lock())
    }
}

/// Shared handle to a [`ManualClock`], usable as a clock itself.
#[derive(Debug, Clone)]
pub struct SharedManualClock(pub Arc<ManualClock>);

impl MsClock for SharedManualClock {
    fn now(&self) -> TimeTag {
        self.0.now()
    }
}

/// Delivery sink that collects written bytes in memory.
///
/// Built through [`MemorySink::factory`], which hands back the factory to
/// give the board and a shared buffer to read delivered bytes from.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    data: Arc<Mutex<Vec<u8>>>,
    fail_writes: Arc<Mutex<bool>>,
}

/// Factory producing [`MemorySink`]s over one shared buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySinkFactory {
    sink: MemorySink,
}

impl MemorySink {
    /// New factory plus the buffer its sinks write into.
    pub fn factory() -> (MemorySinkFactory, Arc<Mutex<Vec<u8>>>) {
        let factory = MemorySinkFactory::default();
        let data = Arc::clone(&factory.sink.data);
        (factory, data)
    }
}

impl MemorySinkFactory {
    /// Make every subsequent write fail with a broken-pipe error.
    pub fn fail_writes(&self) {
        *self.sink.fail_writes.lock() = true;
    }
}

impl SampleSink for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if *self.fail_writes.lock() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink failed"));
        }
        self.data.lock().extend_from_slice(buf);
        Ok(buf.len())
    }
}

impl SinkFactory for MemorySinkFactory {
    fn open(&self) -> io::Result<Box<dyn SampleSink>> {
        Ok(Box::new(self.sink.clone()))
    }
}

/// Factory whose `open` always fails, for start-error tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnopenableSinkFactory;

impl SinkFactory for UnopenableSinkFactory {
    fn open(&self) -> io::Result<Box<dyn SampleSink>> {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            "delivery channel unavailable",
        ))
    }
}
