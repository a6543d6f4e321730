//! Decimation worker thread.
//!
//! Consumes raw blocks from the queue, averages each channel's oversampled
//! conversions into one output sample, reconstructs per-scan timestamps
//! from the block's drain time, and stages framed records toward the
//! delivery channel.
//!
//! Timestamp reconstruction: a block was stamped when its last conversion
//! entered the FIFO, so the first whole scan in it began `whole_scans *
//! scan_period` earlier (modulo midnight). Each emitted scan then advances
//! the running tag by one period. A scan split across two blocks keeps the
//! tag it was given when its first conversions arrived.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::board::Counters;
use crate::clock::TimeTag;
use crate::config::ScanConfig;
use crate::output::{encode_scan, SampleSink, StagingBuffer, OUT_BUFFER_SIZE};
use crate::queue::{BlockSignal, RawQueue};

pub(crate) struct DecimationWorker {
    queue: Arc<RawQueue>,
    signal: Arc<BlockSignal>,
    interrupted: Arc<AtomicBool>,
    counters: Arc<Counters>,
    scan: ScanConfig,
    staging: StagingBuffer,
    sink: Option<Box<dyn SampleSink>>,
    record: Vec<u8>,
    out_samples: Vec<u16>,
    /// Position within the scan window of the next conversion group.
    out_chan: usize,
    /// Time tag of the scan currently being assembled.
    scan_tt: TimeTag,
    last_flush: TimeTag,
}

impl DecimationWorker {
    pub(crate) fn new(
        scan: ScanConfig,
        queue: Arc<RawQueue>,
        signal: Arc<BlockSignal>,
        interrupted: Arc<AtomicBool>,
        counters: Arc<Counters>,
        sink: Box<dyn SampleSink>,
    ) -> Self {
        let n_requested = scan.n_requested();
        Self {
            queue,
            signal,
            interrupted,
            counters,
            scan,
            staging: StagingBuffer::new(OUT_BUFFER_SIZE),
            sink: Some(sink),
            record: Vec::new(),
            out_samples: Vec::with_capacity(n_requested),
            out_chan: 0,
            scan_tt: TimeTag::default(),
            last_flush: TimeTag::default(),
        }
    }

    /// Worker loop: wait for a post, drain one block, retire it.
    pub(crate) fn run(mut self) {
        let queue = Arc::clone(&self.queue);
        loop {
            self.signal.wait();
            if self.interrupted.load(Ordering::SeqCst) {
                break;
            }
            let Some(block) = queue.peek() else {
                warn!("woken with empty raw queue");
                continue;
            };
            let timetag = block.timetag;
            self.process_block(timetag, block.samples());
            drop(block);
            queue.release();
        }
        debug!("decimation worker exiting");
    }

    /// Decimate one raw block.
    ///
    /// `timetag` is the block's drain time; `samples` hold `oversample`
    /// consecutive conversions per channel, cycling through the scan
    /// window low to high.
    fn process_block(&mut self, timetag: TimeTag, samples: &[u16]) {
        let nover = self.scan.oversample;
        let n_channels = self.scan.n_channels();
        let period = self.scan.scan_period_ms();
        let groups = samples.len() / nover;

        if self.out_chan == 0 {
            let whole_scans = (groups / n_channels) as u32;
            self.scan_tt = timetag.back(whole_scans * period);
        }

        for group in samples.chunks_exact(nover) {
            let channel = self.scan.low_channel + self.out_chan;
            if self.scan.requested[channel] {
                let sum: u32 = group.iter().map(|&v| u32::from(v)).sum();
                self.out_samples.push((sum / nover as u32) as u16);
            }
            self.out_chan = (self.out_chan + 1) % n_channels;
            if self.out_chan == 0 {
                self.emit_scan();
            }
        }
    }

    /// Finish the scan in progress: frame it, stage it, advance the tag.
    fn emit_scan(&mut self) {
        let timetag = self.scan_tt;
        if self.sink.is_some() {
            encode_scan(timetag, &self.out_samples, &mut self.record);
            self.deliver(timetag);
        }
        self.out_samples.clear();
        self.scan_tt = self.scan_tt.forward(self.scan.scan_period_ms());
    }

    fn deliver(&mut self, timetag: TimeTag) {
        let latency_elapsed = timetag.millis_since(self.last_flush) > self.scan.latency_ms;
        if !self.staging.fits(self.record.len()) || latency_elapsed {
            let Some(sink) = self.sink.as_mut() else {
                return;
            };
            match self.staging.flush(sink.as_mut()) {
                Ok(_) => {
                    self.last_flush = timetag;
                    let pending = self.staging.pending();
                    if pending > 0 {
                        warn!(pending, "short write to delivery channel");
                    }
                }
                Err(err) => {
                    error!(error = %err, "delivery channel write failed, closing it");
                    self.sink = None;
                    return;
                }
            }
        }
        if !self.staging.stage(&self.record) {
            let skipped = self.counters.skipped_scans.fetch_add(1, Ordering::Relaxed) + 1;
            if skipped % 100 == 1 {
                warn!(skipped, "output scans dropped, delivery channel backlogged");
            }
        }
    }
}
