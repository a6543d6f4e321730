//! End-to-end pipeline tests: scripted FIFO contents in, framed scan
//! records out, with the decimation worker running as a real thread.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use daq_driver_aio16::mock::{ManualClock, MemorySink, MockBus, SharedManualClock};
use daq_driver_aio16::{
    Aio16Board, ChannelTable, IsrOutcome, StatusReg, HALF_FIFO_SAMPLES, MSECS_PER_DAY, OVERSAMPLE,
    RECORD_HEADER_LEN,
};

const READY_STATUS: u8 = StatusReg::BIPOLAR.bits()
    | StatusReg::GAIN_HIGH.bits()
    | StatusReg::FIFO_HALF_FULL.bits();

/// Scans per half-FIFO block with a two-channel window.
const SCANS_PER_BLOCK: usize = HALF_FIFO_SAMPLES / OVERSAMPLE / 2;

fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) {
    let start = Instant::now();
    while !done() {
        assert!(start.elapsed() < deadline, "timed out waiting for pipeline");
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn decode_records(bytes: &[u8]) -> Vec<(u64, Vec<u16>)> {
    let mut records = Vec::new();
    let mut at = 0;
    while at + RECORD_HEADER_LEN <= bytes.len() {
        let tt = u64::from_le_bytes(bytes[at..at + 8].try_into().unwrap());
        let len = u32::from_le_bytes(bytes[at + 8..at + 12].try_into().unwrap()) as usize;
        let payload = bytes[at + 12..at + 12 + len]
            .chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .collect();
        records.push((tt, payload));
        at += RECORD_HEADER_LEN + len;
    }
    records
}

/// One half-FIFO of conversions for a two-channel window: every scan is
/// `OVERSAMPLE` conversions of `ch0` then `OVERSAMPLE` of `ch1`.
fn block_for(ch0: u16, ch1: u16) -> Vec<u16> {
    let mut block = Vec::with_capacity(HALF_FIFO_SAMPLES);
    for _ in 0..SCANS_PER_BLOCK {
        block.extend(std::iter::repeat(ch0).take(OVERSAMPLE));
        block.extend(std::iter::repeat(ch1).take(OVERSAMPLE));
    }
    block
}

fn two_channel_table() -> ChannelTable {
    let mut table = ChannelTable::default();
    table.set_channel(0, 100, 2, true);
    table.set_channel(1, 100, 2, true);
    table.latency_ms = 1; // flush on every scan boundary
    table
}

struct Pipeline {
    board: Aio16Board<MockBus>,
    clock: Arc<ManualClock>,
    delivered: Arc<Mutex<Vec<u8>>>,
}

fn pipeline() -> Pipeline {
    let bus = MockBus::new();
    bus.set_status(READY_STATUS);
    let clock = Arc::new(ManualClock::new(0));
    let (sinks, delivered) = MemorySink::factory();
    let board = Aio16Board::new(bus, SharedManualClock(Arc::clone(&clock)), sinks);
    board.configure(&two_channel_table()).unwrap();
    Pipeline {
        board,
        clock,
        delivered,
    }
}

/// Feed one half-FIFO through the interrupt path at the given clock time.
fn interrupt_with(p: &Pipeline, ch0: u16, ch1: u16, msecs: u32) {
    p.board.bus().push_samples(&block_for(ch0, ch1));
    p.clock.set(msecs);
    assert_eq!(p.board.handle_interrupt(), IsrOutcome::Captured);
}

#[test]
fn block_decimates_to_averaged_scan_records() {
    let p = pipeline();
    p.board.start().unwrap();

    // 100 Hz scans: a block of 32 scans spans 320 ms, stamped at its end
    interrupt_with(&p, 1000, 2000, 1000);

    // all but the last staged scan flush out
    let expected = (SCANS_PER_BLOCK - 1) * (RECORD_HEADER_LEN + 4);
    wait_until(Duration::from_secs(2), || p.delivered.lock().len() >= expected);
    p.board.stop();

    let records = decode_records(&p.delivered.lock());
    assert_eq!(records.len(), SCANS_PER_BLOCK - 1);
    // first scan back-dated by the whole block, then one period per scan
    assert_eq!(records[0].0, 680);
    for (i, (tt, samples)) in records.iter().enumerate() {
        assert_eq!(*tt, 680 + 10 * i as u64);
        assert_eq!(samples, &vec![1000, 2000]);
    }
}

#[test]
fn consecutive_blocks_continue_the_timeline() {
    let p = pipeline();
    p.board.start().unwrap();

    interrupt_with(&p, 10, 20, 1000);
    interrupt_with(&p, 30, 40, 1320);

    let expected = (2 * SCANS_PER_BLOCK - 1) * (RECORD_HEADER_LEN + 4);
    wait_until(Duration::from_secs(2), || p.delivered.lock().len() >= expected);
    p.board.stop();

    let records = decode_records(&p.delivered.lock());
    assert_eq!(records[0].0, 680);
    // timeline is contiguous across the block boundary
    for window in records.windows(2) {
        assert_eq!(window[1].0, window[0].0 + 10);
    }
    assert_eq!(records[SCANS_PER_BLOCK].1, vec![30, 40]);
}

#[test]
fn scan_tags_wrap_backward_across_midnight() {
    let p = pipeline();
    p.board.start().unwrap();

    // stamped 100 ms after midnight, the block's first scan began the
    // previous day
    interrupt_with(&p, 5, 6, 100);
    interrupt_with(&p, 7, 8, 420);

    let expected = SCANS_PER_BLOCK * (RECORD_HEADER_LEN + 4);
    wait_until(Duration::from_secs(2), || p.delivered.lock().len() >= expected);
    p.board.stop();

    let records = decode_records(&p.delivered.lock());
    assert_eq!(records[0].0, u64::from(MSECS_PER_DAY) - 220);
    // tags step through midnight without a discontinuity
    let wrap_at = records
        .iter()
        .position(|(tt, _)| *tt < u64::from(MSECS_PER_DAY) - 220)
        .unwrap();
    assert_eq!(records[wrap_at].0, 0);
    assert_eq!(records[wrap_at - 1].0, u64::from(MSECS_PER_DAY) - 10);
}

#[test]
fn queue_overflow_is_dropped_and_counted_not_blocking() {
    let p = pipeline();
    // worker not started: interrupts fill the three usable queue slots
    for i in 0..3 {
        interrupt_with(&p, i, i, 1000 + u32::from(i));
    }
    p.board.bus().push_samples(&block_for(9, 9));
    assert_eq!(p.board.handle_interrupt(), IsrOutcome::Dropped);
    assert_eq!(p.board.status().counters.missed_blocks, 1);
    // the dropped block was still drained from the hardware FIFO
    assert_eq!(p.board.bus().fifo_len(), 0);
}

#[test]
fn restart_resets_counters_and_keeps_delivering() {
    let p = pipeline();
    p.board.start().unwrap();
    interrupt_with(&p, 1, 1, 1000);
    let expected = (SCANS_PER_BLOCK - 1) * (RECORD_HEADER_LEN + 4);
    wait_until(Duration::from_secs(2), || p.delivered.lock().len() >= expected);
    p.board.stop();

    // force a spurious interrupt so a counter is nonzero
    p.board.bus().set_status(READY_STATUS & !StatusReg::FIFO_HALF_FULL.bits());
    p.board.handle_interrupt();
    assert_eq!(p.board.status().counters.spurious_interrupts, 1);

    p.board.bus().set_status(READY_STATUS);
    p.delivered.lock().clear();
    p.board.start().unwrap();
    assert_eq!(p.board.status().counters.spurious_interrupts, 0);

    interrupt_with(&p, 2, 2, 5000);
    wait_until(Duration::from_secs(2), || p.delivered.lock().len() >= expected);
    p.board.stop();
    let records = decode_records(&p.delivered.lock());
    assert_eq!(records[0].1, vec![2, 2]);
}
