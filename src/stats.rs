use crate::frame::HEADER_SIZE;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// Counters shared by the data path and the statistics ticker.
///
/// The per-second fields are zeroed on every tick; everything else runs for
/// the whole benchmark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub rx_packets_second: u64,
    pub rx_bytes_second: u64,
    pub tx_packets_second: u64,
    pub tx_bytes_second: u64,
    pub rx_packets_total: u64,
    pub rx_bytes_total: u64,
    pub tx_packets_total: u64,
    pub tx_bytes_total: u64,
    pub malformed: u64,
    pub missed: u64,
    pub unmatched: u64,
}

impl Counters {
    /// Bits received in the current interval
    pub fn rx_bits_second(&self) -> u64 {
        self.rx_bytes_second * 8
    }

    /// Bits sent in the current interval
    pub fn tx_bits_second(&self) -> u64 {
        self.tx_bytes_second * 8
    }
}

/// What a single received frame contributes to the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Receipt {
    /// Frame length as seen on the wire
    pub length: usize,
    pub malformed: bool,
    /// Sequence numbers skipped before this frame
    pub missed: u64,
    pub unmatched: bool,
}

/// Link-layer payload bytes in a frame of `length` bytes.
fn payload_bytes(length: usize) -> u64 {
    length.saturating_sub(HEADER_SIZE) as u64
}

/// Thread-safe counters collector.
///
/// Every update and every snapshot takes the same lock, so the ticker never
/// sees a half-applied receive and never loses a frame counted between its
/// read and its reset.
///
/// # Examples
///
/// ```
/// use framebench::stats::{Receipt, StatsCollector};
///
/// let stats = StatsCollector::new();
/// stats.record_send(1514);
/// stats.record_receipt(Receipt { length: 1514, ..Default::default() });
///
/// let tick = stats.snapshot_and_reset();
/// assert_eq!(tick.tx_packets_second, 1);
/// assert_eq!(tick.rx_bytes_second, 1500);
/// assert_eq!(stats.snapshot().rx_packets_second, 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StatsCollector {
    inner: Arc<Mutex<Counters>>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a completed send of `length` bytes.
    pub fn record_send(&self, length: usize) {
        let bytes = payload_bytes(length);
        let mut c = self.inner.lock();
        c.tx_packets_second += 1;
        c.tx_bytes_second += bytes;
        c.tx_packets_total += 1;
        c.tx_bytes_total += bytes;
    }

    /// Applies everything one received frame changes, in a single critical section.
    pub fn record_receipt(&self, receipt: Receipt) {
        let bytes = payload_bytes(receipt.length);
        let mut c = self.inner.lock();
        c.rx_packets_second += 1;
        c.rx_bytes_second += bytes;
        c.rx_packets_total += 1;
        c.rx_bytes_total += bytes;
        c.missed += receipt.missed;
        if receipt.malformed {
            c.malformed += 1;
        }
        if receipt.unmatched {
            c.unmatched += 1;
        }
    }

    /// Copies the counters without resetting anything.
    pub fn snapshot(&self) -> Counters {
        *self.inner.lock()
    }

    /// Copies the counters and zeroes the per-second fields in one step.
    pub fn snapshot_and_reset(&self) -> Counters {
        let mut c = self.inner.lock();
        let snapshot = *c;
        c.rx_packets_second = 0;
        c.rx_bytes_second = 0;
        c.tx_packets_second = 0;
        c.tx_bytes_second = 0;
        snapshot
    }
}
