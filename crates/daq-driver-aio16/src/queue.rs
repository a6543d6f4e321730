//! Raw-block queue between the interrupt handler and the decimation worker.
//!
//! A fixed ring of preallocated sample blocks with separate producer and
//! consumer cursors. One slot is always left empty to distinguish full from
//! empty, so a ring of N slots holds N-1 blocks. The cursor pair is the only
//! state shared by both contexts and is guarded by a lock held just long
//! enough to read or step one index. Nothing on this path allocates.

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::clock::TimeTag;

/// Raw blocks the queue can hold (one slot reserved).
pub const RAW_QUEUE_BLOCKS: usize = 4;

/// One half-FIFO's worth of raw conversions, stamped at drain time.
#[derive(Debug)]
pub struct RawBlock {
    /// Time of day when the block was drained from the hardware FIFO.
    pub timetag: TimeTag,
    data: Box<[u16]>,
    len: usize,
}

impl RawBlock {
    fn new(capacity: usize) -> Self {
        Self {
            timetag: TimeTag::default(),
            data: vec![0u16; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Samples stored in the block.
    pub fn samples(&self) -> &[u16] {
        &self.data[..self.len]
    }

    /// Full-capacity buffer for the producer to fill.
    pub fn buf_mut(&mut self) -> &mut [u16] {
        &mut self.data
    }

    /// Record how many samples the producer stored.
    pub fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.data.len());
        self.len = len;
    }
}

#[derive(Debug, Default)]
struct Cursors {
    head: usize,
    tail: usize,
}

/// Single-producer single-consumer ring of raw blocks.
#[derive(Debug)]
pub struct RawQueue {
    slots: Box<[Mutex<RawBlock>]>,
    cursors: Mutex<Cursors>,
}

impl RawQueue {
    /// Allocate a ring of `slots` blocks of `block_capacity` samples each.
    pub fn new(slots: usize, block_capacity: usize) -> Self {
        let slots = (0..slots)
            .map(|_| Mutex::new(RawBlock::new(block_capacity)))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            cursors: Mutex::new(Cursors::default()),
        }
    }

    /// Blocks the ring can hold before dropping.
    pub fn capacity(&self) -> usize {
        self.slots.len() - 1
    }

    /// Producer side: the head slot, or `None` when the ring is full.
    ///
    /// The returned guard gives exclusive access to the slot; the block is
    /// not visible to the consumer until [`RawQueue::publish`].
    pub fn try_reserve(&self) -> Option<MutexGuard<'_, RawBlock>> {
        let cursors = self.cursors.lock();
        if (cursors.head + 1) % self.slots.len() == cursors.tail {
            return None;
        }
        Some(self.slots[cursors.head].lock())
    }

    /// Producer side: make the reserved head slot visible to the consumer.
    pub fn publish(&self) {
        let mut cursors = self.cursors.lock();
        cursors.head = (cursors.head + 1) % self.slots.len();
    }

    /// Consumer side: the tail slot, or `None` when the ring is empty.
    pub fn peek(&self) -> Option<MutexGuard<'_, RawBlock>> {
        let cursors = self.cursors.lock();
        if cursors.head == cursors.tail {
            return None;
        }
        Some(self.slots[cursors.tail].lock())
    }

    /// Consumer side: retire the tail slot.
    pub fn release(&self) {
        let mut cursors = self.cursors.lock();
        cursors.tail = (cursors.tail + 1) % self.slots.len();
    }

    /// Rewind both cursors, discarding queued blocks.
    pub fn reset(&self) {
        let mut cursors = self.cursors.lock();
        cursors.head = 0;
        cursors.tail = 0;
    }
}

/// Counting wakeup signal posted once per published block.
///
/// `stop` also posts it once so a parked worker observes its interrupt
/// flag. Waiters must tolerate waking to an empty queue.
#[derive(Debug, Default)]
pub struct BlockSignal {
    count: Mutex<usize>,
    cond: Condvar,
}

impl BlockSignal {
    /// New signal with no pending posts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Post one wakeup.
    pub fn post(&self) {
        let mut count = self.count.lock();
        *count += 1;
        self.cond.notify_one();
    }

    /// Wait for, and consume, one post.
    pub fn wait(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.cond.wait(&mut count);
        }
        *count -= 1;
    }

    /// Discard pending posts.
    pub fn reset(&self) {
        *self.count.lock() = 0;
    }
}
