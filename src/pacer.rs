//! Transmit pacing: sequence assignment and the outstanding window.
//!
//! The pacer holds send credits. Priming grants a window's worth up front,
//! after which every confirmed receive grants exactly one more. The data path
//! drains credits in a loop, so throughput is bounded by how fast frames make
//! the round trip.

use crate::stats::StatsCollector;
use log::debug;

/// Sequence numbers and send credits for one run.
///
/// # Examples
///
/// ```
/// use framebench::pacer::Pacer;
///
/// let mut pacer = Pacer::new(None);
/// pacer.prime(2);
/// assert_eq!(pacer.next_send(), Some(1));
/// assert_eq!(pacer.next_send(), Some(2));
/// assert_eq!(pacer.next_send(), None);
///
/// pacer.grant();
/// assert_eq!(pacer.next_send(), Some(3));
/// ```
#[derive(Debug)]
pub struct Pacer {
    next_sequence: u32,
    credits: u64,
    completed: u64,
    sequence_limit: Option<u32>,
    verbose: bool,
}

/// Signal that the configured number of frames has been sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitReached {
    /// Sequence number of the send that hit the limit
    pub sequence: u32,
}

impl Pacer {
    pub fn new(sequence_limit: Option<u32>) -> Self {
        Self {
            next_sequence: 1,
            credits: 0,
            completed: 0,
            sequence_limit,
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Grants the initial burst of `window` sends.
    pub fn prime(&mut self, window: u32) {
        self.credits += u64::from(window);
    }

    /// Grants one send after a confirmed receive.
    pub fn grant(&mut self) {
        self.credits += 1;
    }

    /// Spends a credit and assigns the next sequence number, if a send is allowed.
    pub fn next_send(&mut self) -> Option<u32> {
        if self.credits == 0 {
            return None;
        }
        self.credits -= 1;
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        Some(sequence)
    }

    /// Records a successful send and checks the sequence limit.
    pub fn on_send_complete(
        &mut self,
        sequence: u32,
        bytes_sent: usize,
        stats: &StatsCollector,
    ) -> Option<LimitReached> {
        if self.verbose {
            debug!("Sent {}", sequence);
        }
        stats.record_send(bytes_sent);
        self.completed += 1;

        match self.sequence_limit {
            Some(limit) if self.completed >= u64::from(limit) => Some(LimitReached { sequence }),
            _ => None,
        }
    }

    /// Sends that may still be issued without another receive
    #[cfg(test)]
    pub fn credits(&self) -> u64 {
        self.credits
    }

    /// Successful send completions so far
    #[cfg(test)]
    pub fn completed(&self) -> u64 {
        self.completed
    }
}
