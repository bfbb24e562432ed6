use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Relaxed per-stream counters. Not synchronized with the buffer lock, so a
/// snapshot taken under concurrent traffic is approximate.
#[derive(Debug, Default)]
pub(crate) struct StreamCounters {
    records: AtomicU64,
    bytes_put: AtomicU64,
    flushes: AtomicU64,
    bytes_flushed: AtomicU64,
    flush_failures: AtomicU64,
}

impl StreamCounters {
    pub(crate) fn record_put(&self, bytes: usize) {
        self.records.fetch_add(1, Ordering::Relaxed);
        self.bytes_put.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self, bytes: usize) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.bytes_flushed.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_flush_failure(&self) {
        self.flush_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, buffered: usize) -> StreamStats {
        StreamStats {
            records: self.records.load(Ordering::Relaxed),
            bytes_put: self.bytes_put.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            bytes_flushed: self.bytes_flushed.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            buffered: buffered as u64,
        }
    }
}

/// Point-in-time view of a stream's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    /// Successful `put` calls.
    pub records: u64,
    /// Bytes accepted by `put`.
    pub bytes_put: u64,
    /// Artifacts written.
    pub flushes: u64,
    /// Bytes written to the sink, summed over all flushes.
    pub bytes_flushed: u64,
    pub flush_failures: u64,
    /// Bytes currently held in the buffer.
    pub buffered: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let c = StreamCounters::default();
        c.record_put(10);
        c.record_put(5);
        c.record_flush(15);
        c.record_flush_failure();

        let s = c.snapshot(15);
        assert_eq!(s.records, 2);
        assert_eq!(s.bytes_put, 15);
        assert_eq!(s.flushes, 1);
        assert_eq!(s.bytes_flushed, 15);
        assert_eq!(s.flush_failures, 1);
        assert_eq!(s.buffered, 15);
    }
}
