//! Receive-side matching, validation and loss detection.

use crate::config::{Config, ReorderPolicy, UnmatchedPolicy};
use crate::frame::{self, Verdict};
use crate::in_flight::InFlightTable;
use crate::stats::{Receipt, StatsCollector};
use crate::{Error, Result};
use log::{debug, info, warn};

/// What the data path should do after a frame has been received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Receive-only mode: counted, nothing else
    Counted,
    /// Matched an in-flight frame; one new send may be issued
    Confirmed { sequence: u32, verdict: Verdict },
    /// No frame in flight for this sequence and the policy says to carry on
    Unmatched { sequence: u32 },
    /// Too short to carry a sequence number
    Runt { length: usize },
}

impl Delivery {
    /// Whether this delivery earns the pacer a new send credit
    pub fn grants_send(&self) -> bool {
        matches!(self, Delivery::Confirmed { .. })
    }
}

/// Matches received frames against the in-flight table.
///
/// Holds the loss-detection cursor: the sequence number of the last matched
/// frame. The cursor is only ever touched from the data path, so it is not
/// part of the shared counters.
#[derive(Debug)]
pub struct Sequencer {
    check_content: bool,
    verbose: bool,
    receive_only: bool,
    unmatched: UnmatchedPolicy,
    reorder: ReorderPolicy,
    cursor: u32,
}

impl Sequencer {
    pub fn new(config: &Config) -> Self {
        Self {
            check_content: config.check_content,
            verbose: config.verbose,
            receive_only: config.receive_only,
            unmatched: config.unmatched,
            reorder: config.reorder,
            cursor: 0,
        }
    }

    /// Sequence number of the last matched frame (0 before the first match)
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Handles one received frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnmatchedSequence`] when the frame has no frame in
    /// flight and the unmatched policy is [`UnmatchedPolicy::Abort`].
    pub fn on_receive(
        &mut self,
        received: &[u8],
        table: &mut InFlightTable,
        stats: &StatsCollector,
    ) -> Result<Delivery> {
        let length = received.len();

        if self.receive_only {
            stats.record_receipt(Receipt {
                length,
                ..Default::default()
            });
            return Ok(Delivery::Counted);
        }

        let Some(sequence) = frame::sequence_of(received) else {
            warn!("Runt frame of {} bytes carries no sequence number", length);
            self.dump(received);
            stats.record_receipt(Receipt {
                length,
                malformed: true,
                ..Default::default()
            });
            return Ok(Delivery::Runt { length });
        };

        let Some(sent) = table.take(sequence) else {
            return match self.unmatched {
                UnmatchedPolicy::Abort => Err(Error::UnmatchedSequence(sequence)),
                UnmatchedPolicy::Ignore => {
                    warn!(
                        "Received sequence number {} with no frame in flight, ignoring it",
                        sequence
                    );
                    stats.record_receipt(Receipt {
                        length,
                        unmatched: true,
                        ..Default::default()
                    });
                    Ok(Delivery::Unmatched { sequence })
                }
            };
        };

        let verdict = frame::validate(received, &sent, self.check_content);
        drop(sent);
        match verdict {
            Verdict::Ok => {}
            Verdict::SizeMismatch { sent, received } => warn!(
                "Size mismatch: Sequence number {} had {} bytes sent, {} received",
                sequence, sent, received
            ),
            Verdict::HeaderMismatch => warn!("Header mismatch on sequence number {}", sequence),
            Verdict::ContentMismatch { offset } => warn!(
                "Frame data mismatch on sequence number {} at byte {}",
                sequence, offset
            ),
        }
        if !verdict.is_ok() {
            self.dump(received);
        }
        if self.verbose {
            debug!("Received {} length {}", sequence, length);
        }

        let missed = self.advance(sequence);
        stats.record_receipt(Receipt {
            length,
            malformed: !verdict.is_ok(),
            missed,
            unmatched: false,
        });

        Ok(Delivery::Confirmed { sequence, verdict })
    }

    /// Moves the cursor to `sequence` and returns how many sequence numbers were skipped.
    ///
    /// Distances are taken modulo 2^32, so the step from `u32::MAX` to 0 is
    /// one forward and a frame up to 2^31 behind the cursor is a late frame.
    fn advance(&mut self, sequence: u32) -> u64 {
        let expected = self.cursor.wrapping_add(1);
        let gap = sequence.wrapping_sub(expected) as i32;
        let missed = if gap > 0 {
            info!(
                "Missed {} packet(s) (sequence numbers {} to {})",
                gap,
                expected,
                sequence.wrapping_sub(1)
            );
            gap as u64
        } else {
            0
        };

        let forward = sequence.wrapping_sub(self.cursor) as i32 > 0;
        match self.reorder {
            ReorderPolicy::Advance => self.cursor = sequence,
            ReorderPolicy::Monotonic if forward => self.cursor = sequence,
            ReorderPolicy::Monotonic => {}
        }
        missed
    }

    fn dump(&self, received: &[u8]) {
        if self.verbose {
            debug!("Malformed packet: {}", frame::hex_dump(received));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{encode, FRAME_SIZE};

    fn sent_table(sequences: impl IntoIterator<Item = u32>) -> InFlightTable {
        let mut table = InFlightTable::new();
        for sequence in sequences {
            table.insert(sequence, encode(sequence));
        }
        table
    }

    #[test]
    fn test_in_order_receives_confirm_and_drain_table() {
        let mut sequencer = Sequencer::new(&Config::new("eth0"));
        let mut table = sent_table(1..=3);
        let stats = StatsCollector::new();

        for sequence in 1..=3 {
            let delivery = sequencer
                .on_receive(&encode(sequence), &mut table, &stats)
                .unwrap();
            assert_eq!(
                delivery,
                Delivery::Confirmed {
                    sequence,
                    verdict: Verdict::Ok
                }
            );
            assert!(delivery.grants_send());
        }

        assert!(table.is_empty());
        assert_eq!(sequencer.cursor(), 3);
        let c = stats.snapshot();
        assert_eq!(c.rx_packets_second, 3);
        assert_eq!(c.missed, 0);
        assert_eq!(c.malformed, 0);
    }

    #[test]
    fn test_single_gap_counts_one_missed() {
        let mut sequencer = Sequencer::new(&Config::new("eth0"));
        let mut table = sent_table(1..=5);
        let stats = StatsCollector::new();

        for sequence in [1, 2, 4, 5] {
            sequencer
                .on_receive(&encode(sequence), &mut table, &stats)
                .unwrap();
        }

        assert_eq!(stats.snapshot().missed, 1);
        assert!(table.contains(3));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_first_receive_after_loss_of_leading_frames() {
        let mut sequencer = Sequencer::new(&Config::new("eth0"));
        let mut table = sent_table(1..=10);
        let stats = StatsCollector::new();

        sequencer
            .on_receive(&encode(10), &mut table, &stats)
            .unwrap();

        assert_eq!(stats.snapshot().missed, 9);
    }

    #[test]
    fn test_content_mismatch_counts_malformed_and_still_confirms() {
        let mut sequencer = Sequencer::new(&Config::new("eth0"));
        let mut table = sent_table([1]);
        let stats = StatsCollector::new();

        let mut corrupted = encode(1);
        corrupted[500] ^= 0xFF;
        let delivery = sequencer.on_receive(&corrupted, &mut table, &stats).unwrap();

        assert_eq!(
            delivery,
            Delivery::Confirmed {
                sequence: 1,
                verdict: Verdict::ContentMismatch { offset: 500 }
            }
        );
        assert!(table.is_empty());
        assert_eq!(stats.snapshot().malformed, 1);
    }

    #[test]
    fn test_content_mismatch_ignored_without_content_check() {
        let config = Config::new("eth0").with_check_content(false);
        let mut sequencer = Sequencer::new(&config);
        let mut table = sent_table([1]);
        let stats = StatsCollector::new();

        let mut corrupted = encode(1);
        corrupted[500] ^= 0xFF;
        sequencer.on_receive(&corrupted, &mut table, &stats).unwrap();

        assert_eq!(stats.snapshot().malformed, 0);
    }

    #[test]
    fn test_truncated_frame_is_size_mismatch() {
        let mut sequencer = Sequencer::new(&Config::new("eth0"));
        let mut table = sent_table([1]);
        let stats = StatsCollector::new();

        let frame = encode(1);
        let delivery = sequencer
            .on_receive(&frame[..64], &mut table, &stats)
            .unwrap();

        assert_eq!(
            delivery,
            Delivery::Confirmed {
                sequence: 1,
                verdict: Verdict::SizeMismatch {
                    sent: FRAME_SIZE,
                    received: 64
                }
            }
        );
        assert_eq!(stats.snapshot().malformed, 1);
    }

    #[test]
    fn test_unmatched_aborts_by_default() {
        let mut sequencer = Sequencer::new(&Config::new("eth0"));
        let mut table = sent_table([1]);
        let stats = StatsCollector::new();

        let err = sequencer
            .on_receive(&encode(2), &mut table, &stats)
            .unwrap_err();
        assert!(matches!(err, Error::UnmatchedSequence(2)));
        assert!(table.contains(1));
    }

    #[test]
    fn test_duplicate_ignored_when_configured() {
        let config = Config::new("eth0").with_unmatched_policy(UnmatchedPolicy::Ignore);
        let mut sequencer = Sequencer::new(&config);
        let mut table = sent_table([1]);
        let stats = StatsCollector::new();

        sequencer.on_receive(&encode(1), &mut table, &stats).unwrap();
        let delivery = sequencer.on_receive(&encode(1), &mut table, &stats).unwrap();

        assert_eq!(delivery, Delivery::Unmatched { sequence: 1 });
        assert!(!delivery.grants_send());
        assert_eq!(sequencer.cursor(), 1);
        let c = stats.snapshot();
        assert_eq!(c.unmatched, 1);
        assert_eq!(c.rx_packets_second, 2);
    }

    #[test]
    fn test_runt_frame_is_malformed_and_grants_nothing() {
        let mut sequencer = Sequencer::new(&Config::new("eth0"));
        let mut table = sent_table([1]);
        let stats = StatsCollector::new();

        let delivery = sequencer.on_receive(&[0xFF; 12], &mut table, &stats).unwrap();

        assert_eq!(delivery, Delivery::Runt { length: 12 });
        assert!(!delivery.grants_send());
        assert_eq!(stats.snapshot().malformed, 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_receive_only_skips_matching() {
        let config = Config::new("eth0").with_receive_only(true);
        let mut sequencer = Sequencer::new(&config);
        let mut table = InFlightTable::new();
        let stats = StatsCollector::new();

        let delivery = sequencer.on_receive(&encode(99), &mut table, &stats).unwrap();

        assert_eq!(delivery, Delivery::Counted);
        assert!(!delivery.grants_send());
        assert_eq!(sequencer.cursor(), 0);
        let c = stats.snapshot();
        assert_eq!(c.rx_packets_second, 1);
        assert_eq!(c.missed, 0);
    }

    #[test]
    fn test_late_frame_moves_cursor_back_with_advance_policy() {
        let mut sequencer = Sequencer::new(&Config::new("eth0"));
        let mut table = sent_table(1..=4);
        let stats = StatsCollector::new();

        for sequence in [1, 3, 2, 4] {
            sequencer
                .on_receive(&encode(sequence), &mut table, &stats)
                .unwrap();
        }

        // 1 -> 3 skips 2, then 2 rewinds the cursor so 2 -> 4 skips 3 again.
        assert_eq!(stats.snapshot().missed, 2);
        assert_eq!(sequencer.cursor(), 4);
    }

    #[test]
    fn test_late_frame_keeps_cursor_with_monotonic_policy() {
        let config = Config::new("eth0").with_reorder_policy(ReorderPolicy::Monotonic);
        let mut sequencer = Sequencer::new(&config);
        let mut table = sent_table(1..=4);
        let stats = StatsCollector::new();

        for sequence in [1, 3, 2, 4] {
            sequencer
                .on_receive(&encode(sequence), &mut table, &stats)
                .unwrap();
        }

        assert_eq!(stats.snapshot().missed, 1);
        assert_eq!(sequencer.cursor(), 4);
    }

    #[test]
    fn test_monotonic_cursor_follows_sequence_wrap() {
        let config = Config::new("eth0").with_reorder_policy(ReorderPolicy::Monotonic);
        let mut sequencer = Sequencer::new(&config);
        sequencer.cursor = u32::MAX - 1;
        let mut table = sent_table([u32::MAX, 0, 1, 3]);
        let stats = StatsCollector::new();

        for sequence in [u32::MAX, 0, 1] {
            sequencer
                .on_receive(&encode(sequence), &mut table, &stats)
                .unwrap();
        }
        assert_eq!(sequencer.cursor(), 1);
        assert_eq!(stats.snapshot().missed, 0);

        sequencer.on_receive(&encode(3), &mut table, &stats).unwrap();
        assert_eq!(sequencer.cursor(), 3);
        assert_eq!(stats.snapshot().missed, 1);
    }

    #[test]
    fn test_gap_across_wrap_is_counted() {
        let mut sequencer = Sequencer::new(&Config::new("eth0"));
        sequencer.cursor = u32::MAX - 1;
        let mut table = sent_table([1]);
        let stats = StatsCollector::new();

        sequencer.on_receive(&encode(1), &mut table, &stats).unwrap();

        // u32::MAX and 0 never arrived
        assert_eq!(stats.snapshot().missed, 2);
        assert_eq!(sequencer.cursor(), 1);
    }
}
