//! Output staging and delivery of decimated scans.
//!
//! Each output scan is framed as a small binary record and staged into a
//! byte buffer; the buffer is written to the delivery channel only when a
//! record would not fit or when the configured latency has elapsed in data
//! time. Writes are best-effort: a short write leaves the remainder staged
//! for the next flush.

use std::io;

use crate::clock::TimeTag;

/// Bytes of staging between the worker and the delivery channel.
pub const OUT_BUFFER_SIZE: usize = 8192;

/// Bytes of record framing ahead of the sample payload.
pub const RECORD_HEADER_LEN: usize = 12;

/// Frame one scan record: an 8-byte little-endian millisecond time tag,
/// a 4-byte little-endian payload byte count, then the samples as
/// little-endian 16-bit words.
pub fn encode_scan(timetag: TimeTag, samples: &[u16], out: &mut Vec<u8>) {
    out.clear();
    out.reserve(RECORD_HEADER_LEN + samples.len() * 2);
    out.extend_from_slice(&u64::from(timetag.msecs()).to_le_bytes());
    out.extend_from_slice(&((samples.len() * 2) as u32).to_le_bytes());
    for &sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
}

/// Byte-stream consumer of framed scan records.
///
/// Implementations are expected to be non-blocking or cheap; partial writes
/// are allowed and are not retried synchronously.
pub trait SampleSink: Send {
    /// Write as much of `buf` as the channel will take, returning the byte
    /// count accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

impl SampleSink for std::fs::File {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(self, buf)
    }
}

/// Opens the delivery channel at acquisition start.
///
/// The channel is opened per run so a failed sink can be replaced by a
/// plain `stop`/`start` cycle.
pub trait SinkFactory: Send + Sync {
    /// Open a fresh delivery channel.
    fn open(&self) -> io::Result<Box<dyn SampleSink>>;
}

/// Staging buffer between scan records and the delivery channel.
///
/// Bytes accumulate from `tail` to `head`; a fully drained flush rewinds
/// both to zero. A short write advances `tail` only, so staged data is
/// never lost to a slow channel, only to an exhausted buffer.
#[derive(Debug)]
pub struct StagingBuffer {
    buf: Box<[u8]>,
    head: usize,
    tail: usize,
}

impl StagingBuffer {
    /// Allocate a staging buffer of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
        }
    }

    /// Bytes staged and not yet written.
    pub fn pending(&self) -> usize {
        self.head - self.tail
    }

    /// Whether `len` more bytes fit without a flush.
    pub fn fits(&self, len: usize) -> bool {
        self.head + len <= self.buf.len()
    }

    /// Stage one record. Returns false (staging nothing) if it does not fit.
    pub fn stage(&mut self, record: &[u8]) -> bool {
        if !self.fits(record.len()) {
            return false;
        }
        self.buf[self.head..self.head + record.len()].copy_from_slice(record);
        self.head += record.len();
        true
    }

    /// Write staged bytes to `sink`, returning the byte count accepted.
    ///
    /// Drained completely, the buffer rewinds to the start; a short write
    /// keeps the remainder staged.
    pub fn flush(&mut self, sink: &mut dyn SampleSink) -> io::Result<usize> {
        if self.pending() == 0 {
            return Ok(0);
        }
        let written = sink.write(&self.buf[self.tail..self.head])?;
        self.tail += written;
        if self.tail == self.head {
            self.head = 0;
            self.tail = 0;
        }
        Ok(written)
    }

    /// Discard staged bytes.
    pub fn reset(&mut self) {
        self.head = 0;
        self.tail = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecSink(Vec<u8>);
    impl SampleSink for VecSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }
    }

    /// Accepts at most `limit` bytes per write.
    struct ChokedSink {
        data: Vec<u8>,
        limit: usize,
    }
    impl SampleSink for ChokedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.limit);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }
    }

    #[test]
    fn record_layout_is_header_then_samples() {
        let mut record = Vec::new();
        encode_scan(TimeTag::from_msecs(0x0102_0304), &[0xaabb, 0x1122], &mut record);
        assert_eq!(record.len(), RECORD_HEADER_LEN + 4);
        assert_eq!(&record[0..8], &[0x04, 0x03, 0x02, 0x01, 0, 0, 0, 0]);
        assert_eq!(&record[8..12], &[4, 0, 0, 0]);
        assert_eq!(&record[12..], &[0xbb, 0xaa, 0x22, 0x11]);
    }

    #[test]
    fn stage_and_flush_round_trip() {
        let mut staging = StagingBuffer::new(64);
        assert!(staging.stage(b"abcd"));
        assert!(staging.stage(b"efgh"));
        assert_eq!(staging.pending(), 8);

        let mut sink = VecSink(Vec::new());
        assert_eq!(staging.flush(&mut sink).unwrap(), 8);
        assert_eq!(sink.0, b"abcdefgh");
        assert_eq!(staging.pending(), 0);
        // drained buffer rewinds, full capacity available again
        assert!(staging.fits(64));
    }

    #[test]
    fn stage_rejects_when_full() {
        let mut staging = StagingBuffer::new(8);
        assert!(staging.stage(b"123456"));
        assert!(!staging.stage(b"789"));
        assert_eq!(staging.pending(), 6);
    }

    #[test]
    fn short_write_keeps_remainder_staged() {
        let mut staging = StagingBuffer::new(16);
        staging.stage(b"0123456789");

        let mut sink = ChokedSink {
            data: Vec::new(),
            limit: 4,
        };
        assert_eq!(staging.flush(&mut sink).unwrap(), 4);
        assert_eq!(staging.pending(), 6);
        assert_eq!(staging.flush(&mut sink).unwrap(), 4);
        assert_eq!(staging.flush(&mut sink).unwrap(), 2);
        assert_eq!(sink.data, b"0123456789");
        assert_eq!(staging.pending(), 0);
    }

    #[test]
    fn empty_flush_writes_nothing() {
        let mut staging = StagingBuffer::new(16);
        let mut sink = VecSink(Vec::new());
        assert_eq!(staging.flush(&mut sink).unwrap(), 0);
        assert!(sink.0.is_empty());
    }
}
