//! Frames that have been sent and not yet matched by a received frame.
//!
//! The table owns every sent frame from the moment the send is issued until
//! the receive path takes it back out. Nothing else keeps a copy, so a frame
//! that has been matched is gone.

use log::warn;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Sent frames keyed by sequence number.
///
/// # Examples
///
/// ```
/// use framebench::frame::encode;
/// use framebench::in_flight::InFlightTable;
///
/// let mut table = InFlightTable::new();
/// table.insert(1, encode(1));
/// assert_eq!(table.len(), 1);
///
/// let frame = table.take(1).expect("frame 1 is in flight");
/// assert_eq!(frame, encode(1));
/// assert!(table.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct InFlightTable {
    frames: BTreeMap<u32, Vec<u8>>,
    peak: usize,
}

impl InFlightTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the frame for `sequence` and returns the stored bytes for sending.
    ///
    /// A sequence number is only reused after 2^32 sends; if the old frame is
    /// somehow still in flight by then it is replaced.
    pub fn insert(&mut self, sequence: u32, frame: Vec<u8>) -> &[u8] {
        let len_after = if self.frames.contains_key(&sequence) {
            self.frames.len()
        } else {
            self.frames.len() + 1
        };
        self.peak = self.peak.max(len_after);

        match self.frames.entry(sequence) {
            Entry::Occupied(mut entry) => {
                warn!(
                    "Sequence number {} wrapped while still in flight, replacing it",
                    sequence
                );
                entry.insert(frame);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(frame),
        }
    }

    /// Removes and returns the frame for `sequence`.
    pub fn take(&mut self, sequence: u32) -> Option<Vec<u8>> {
        self.frames.remove(&sequence)
    }

    #[cfg(test)]
    pub fn contains(&self, sequence: u32) -> bool {
        self.frames.contains_key(&sequence)
    }

    /// Lowest sequence number still waiting for its reply
    pub fn oldest(&self) -> Option<u32> {
        self.frames.keys().next().copied()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Largest number of frames that were ever in flight at once
    pub fn peak(&self) -> usize {
        self.peak
    }
}
