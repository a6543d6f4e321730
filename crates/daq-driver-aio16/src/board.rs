//! Board handle: configuration, lifecycle, and interrupt service.
//!
//! One [`Aio16Board`] models one card. The queue and its blocks are
//! allocated once at construction; `start` only rewinds cursors and
//! counters, so arming the board never allocates on the acquisition path.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::MsClock;
use crate::config::{ChannelTable, ScanConfig};
use crate::error::{Aio16Error, Result};
use crate::output::SinkFactory;
use crate::queue::{BlockSignal, RawQueue, RAW_QUEUE_BLOCKS};
use crate::registers::{cmd, reg, RegisterBus, StatusReg, HALF_FIFO_SAMPLES};
use crate::timing;
use crate::worker::DecimationWorker;

/// Outcome of servicing one interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsrOutcome {
    /// Half FIFO drained into a queued raw block.
    Captured,
    /// Queue full; half FIFO drained and discarded.
    Dropped,
    /// FIFO was not half full; reset and ignored.
    Spurious,
}

/// Runtime overflow counters, shared between the interrupt path, the
/// worker, and status readers.
#[derive(Debug, Default)]
pub struct Counters {
    pub(crate) missed_blocks: AtomicU64,
    pub(crate) skipped_scans: AtomicU64,
    pub(crate) spurious_interrupts: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    /// Raw blocks discarded because the queue was full.
    pub missed_blocks: u64,
    /// Output scans dropped because the staging buffer was full.
    pub skipped_scans: u64,
    /// Interrupts taken without the FIFO half full.
    pub spurious_interrupts: u64,
}

impl Counters {
    pub(crate) fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            missed_blocks: self.missed_blocks.load(Ordering::Relaxed),
            skipped_scans: self.skipped_scans.load(Ordering::Relaxed),
            spurious_interrupts: self.spurious_interrupts.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.missed_blocks.store(0, Ordering::Relaxed);
        self.skipped_scans.store(0, Ordering::Relaxed);
        self.spurious_interrupts.store(0, Ordering::Relaxed);
    }
}

/// Board status as reported to the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoardStatus {
    /// Raw status register byte from the last interrupt or configure.
    pub status_reg: u8,
    /// Whether acquisition is running.
    pub busy: bool,
    /// Overflow counters for the current run.
    pub counters: CounterSnapshot,
}

/// Driver handle for one 104-AIO16-16 board.
pub struct Aio16Board<B: RegisterBus> {
    bus: B,
    clock: Arc<dyn MsClock>,
    sink_factory: Box<dyn SinkFactory>,
    scan: Mutex<Option<ScanConfig>>,
    queue: Arc<RawQueue>,
    signal: Arc<BlockSignal>,
    counters: Arc<Counters>,
    busy: AtomicBool,
    interrupted: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    last_status: AtomicU8,
}

impl<B: RegisterBus> Aio16Board<B> {
    /// Create a handle over `bus`, quiescing the hardware.
    ///
    /// All acquisition buffers are allocated here.
    pub fn new(
        bus: B,
        clock: impl MsClock + 'static,
        sink_factory: impl SinkFactory + 'static,
    ) -> Self {
        let board = Self {
            bus,
            clock: Arc::new(clock),
            sink_factory: Box::new(sink_factory),
            scan: Mutex::new(None),
            queue: Arc::new(RawQueue::new(RAW_QUEUE_BLOCKS, HALF_FIFO_SAMPLES)),
            signal: Arc::new(BlockSignal::new()),
            counters: Arc::new(Counters::default()),
            busy: AtomicBool::new(false),
            interrupted: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
            last_status: AtomicU8::new(0),
        };
        board.quiesce_hardware();
        board
    }

    fn quiesce_hardware(&self) {
        self.bus.write8(reg::OVERSAMPLE, cmd::A2D_DISABLE);
        self.bus.write8(reg::BURST_MODE, 0);
        self.bus.write8(reg::ENABLE_AD_CNT, 0);
        self.bus.write8(reg::EXT_TRIG_SEL, 0);
        self.bus.write8(reg::ENABLE_IRQ, cmd::IRQ_DISABLE);
        self.bus.write8(reg::FIFO_RESET, 0);
    }

    /// Validate `table` against the board jumpers and store the scan
    /// configuration for the next `start`.
    ///
    /// Fails with [`Aio16Error::Busy`] while acquiring. A validation
    /// failure leaves any previously stored configuration untouched.
    pub fn configure(&self, table: &ChannelTable) -> Result<()> {
        if self.busy.load(Ordering::SeqCst) {
            return Err(Aio16Error::Busy);
        }
        self.bus.write8(reg::OVERSAMPLE, cmd::A2D_DISABLE);

        let status = self.read_status_reg();
        let jumpers = status.into();
        if status.contains(StatusReg::SINGLE_ENDED) {
            warn!("board jumpered for single-ended inputs, not differential");
        }

        let scan = ScanConfig::validate(table, jumpers)?;
        info!(
            low_channel = scan.low_channel,
            high_channel = scan.high_channel,
            gain_code = scan.gain_code,
            max_rate_hz = scan.max_rate_hz,
            latency_ms = scan.latency_ms,
            "analog input scan configured"
        );
        *self.scan.lock() = Some(scan);
        Ok(())
    }

    /// Arm the board and begin acquisition.
    ///
    /// Stops any previous run, opens a fresh delivery channel, spawns the
    /// decimation worker, programs the scan window, gain, and counters,
    /// and finally enables interrupts and conversions. Any failure leaves
    /// the board stopped and disabled.
    pub fn start(&self) -> Result<()> {
        self.stop();
        let scan = self
            .scan
            .lock()
            .clone()
            .ok_or(Aio16Error::NotConfigured)?;

        self.busy.store(true, Ordering::SeqCst);
        self.interrupted.store(false, Ordering::SeqCst);
        self.queue.reset();
        self.signal.reset();
        self.counters.reset();

        if let Err(err) = self.start_worker(&scan) {
            self.stop();
            return Err(err);
        }

        let channel_nibbles = ((scan.high_channel << 4) | scan.low_channel) as u8;
        self.bus.write8(reg::CHANNELS, channel_nibbles);
        self.bus.write8(reg::SW_GAIN, scan.gain_code);
        self.bus.write8(reg::AD_COUNTER_MD, cmd::TIMED_MODE);
        self.bus.write8(reg::OVERSAMPLE, cmd::A2D_DISABLE);
        self.bus.write8(reg::BURST_MODE, 0);
        self.bus
            .write8(reg::ENABLE_AD_CNT, cmd::ENABLE_CTR0 | cmd::ENABLE_CTR12);
        timing::program_channel_delay(&self.bus, timing::MIN_CHANNEL_DELAY_NS);
        timing::program_scan_clock(&self.bus, scan.max_rate_hz);

        // Oversampling is fixed; a scan config always carries a factor the
        // hardware supports.
        let oversample_cmd =
            timing::oversample_command(scan.oversample).unwrap_or(cmd::OVERSAMPLE_X16);

        self.bus.write8(reg::ENABLE_IRQ, cmd::IRQ_ENABLE);
        self.bus.write8(reg::OVERSAMPLE, oversample_cmd);

        info!(
            low_channel = scan.low_channel,
            high_channel = scan.high_channel,
            rate_hz = scan.max_rate_hz,
            oversample = scan.oversample,
            "acquisition started"
        );
        Ok(())
    }

    fn start_worker(&self, scan: &ScanConfig) -> Result<()> {
        let sink = self.sink_factory.open().map_err(Aio16Error::DeliveryOpen)?;
        let worker = DecimationWorker::new(
            scan.clone(),
            Arc::clone(&self.queue),
            Arc::clone(&self.signal),
            Arc::clone(&self.interrupted),
            Arc::clone(&self.counters),
            sink,
        );
        let handle = std::thread::Builder::new()
            .name("aio16-decimation".into())
            .spawn(move || worker.run())
            .map_err(Aio16Error::WorkerSpawn)?;
        *self.worker.lock() = Some(handle);
        Ok(())
    }

    /// Disable the hardware and join the worker. Idempotent.
    pub fn stop(&self) {
        self.quiesce_hardware();

        if let Some(handle) = self.worker.lock().take() {
            self.interrupted.store(true, Ordering::SeqCst);
            // the worker checks the flag only at its wait point
            self.signal.post();
            if handle.join().is_err() {
                warn!("decimation worker panicked");
            }
            debug!("decimation worker joined");
        }
        self.busy.store(false, Ordering::SeqCst);
    }

    /// Service one board interrupt.
    ///
    /// Reads the status register; if the FIFO is not half full the
    /// interrupt is counted as spurious and the FIFO reset. Otherwise one
    /// half-FIFO of conversions is drained: into a queued block stamped
    /// with the current time, or discarded (and counted) when the queue is
    /// full. Never blocks and never allocates.
    pub fn handle_interrupt(&self) -> IsrOutcome {
        let status = self.read_status_reg();
        if !status.contains(StatusReg::FIFO_HALF_FULL) {
            self.bus.write8(reg::FIFO_RESET, 0);
            let spurious = self
                .counters
                .spurious_interrupts
                .fetch_add(1, Ordering::Relaxed)
                + 1;
            if spurious % 100 == 1 {
                warn!(spurious, "spurious interrupts, FIFO not half full");
            }
            return IsrOutcome::Spurious;
        }

        match self.queue.try_reserve() {
            Some(mut block) => {
                block.timetag = self.clock.now();
                for slot in &mut block.buf_mut()[..HALF_FIFO_SAMPLES] {
                    *slot = self.bus.read16(reg::FIFO);
                }
                block.set_len(HALF_FIFO_SAMPLES);
                drop(block);
                self.queue.publish();
                self.signal.post();
                IsrOutcome::Captured
            }
            None => {
                // drain and discard so the FIFO keeps pace with the clock
                for _ in 0..HALF_FIFO_SAMPLES {
                    let _ = self.bus.read16(reg::FIFO);
                }
                let missed = self
                    .counters
                    .missed_blocks
                    .fetch_add(1, Ordering::Relaxed)
                    + 1;
                if missed % 100 == 1 {
                    warn!(missed, "raw blocks dropped, queue full");
                }
                IsrOutcome::Dropped
            }
        }
    }

    /// Status word from the last interrupt or configure, plus counters.
    pub fn status(&self) -> BoardStatus {
        BoardStatus {
            status_reg: self.last_status.load(Ordering::Relaxed),
            busy: self.busy.load(Ordering::SeqCst),
            counters: self.counters.snapshot(),
        }
    }

    /// Whether acquisition is running.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// The underlying register bus.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    fn read_status_reg(&self) -> StatusReg {
        let raw = self.bus.read8(reg::CONFIG_STATUS);
        self.last_status.store(raw, Ordering::Relaxed);
        StatusReg::from_bits_retain(raw)
    }
}

impl<B: RegisterBus> Drop for Aio16Board<B> {
    fn drop(&mut self) {
        self.stop();
    }
}
