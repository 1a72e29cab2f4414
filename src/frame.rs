//! Fixed-size benchmark frames with sequence numbers for loss and corruption measurement.
//!
//! Every frame is a full-size Ethernet frame (without FCS) that carries:
//! - A constant placeholder link header used to recognise benchmark traffic
//! - A direction flag
//! - A sequence number for correlating replies with sends
//! - A payload derived from the sequence number, so corruption can be detected
//!
//! # Frame Format
//!
//! ```text
//! ┌──────────────┬───────────┬────────────┬────────────────┬───────────┐
//! │ Link header  │ Direction │  Sequence  │    Payload     │  Padding  │
//! │  (14 bytes)  │ (1 byte)  │ (4 bytes)  │ (bytes 19..1495) │  (zeros)  │
//! └──────────────┴───────────┴────────────┴────────────────┴───────────┘
//! ```
//!
//! - **Link header**: destination and source addresses `ff:ff:ff:ff:ff:ff`
//!   followed by ethertype `0xFFFF`
//! - **Direction**: always 0 on transmit
//! - **Sequence**: 32-bit big-endian sequence number
//! - **Payload**: `byte[i] = low_byte(i) ^ c` with
//!   `c = low_byte(seq) ^ low_byte(seq >> 8) ^ low_byte(seq >> 16)`
//! - **Padding**: bytes 1495..1514 are zero
//!
//! # Examples
//!
//! ```
//! use framebench::frame::{decode, encode, validate, Verdict, FRAME_SIZE};
//!
//! let frame = encode(42);
//! assert_eq!(frame.len(), FRAME_SIZE);
//!
//! let header = decode(&frame).expect("frame carries a sequence number");
//! assert_eq!(header.sequence, 42);
//! assert_eq!(validate(&frame, &frame, true), Verdict::Ok);
//! ```

/// Total length of a benchmark frame on the wire
pub const FRAME_SIZE: usize = 1514;

/// Length of the link-layer header
pub const HEADER_SIZE: usize = 14;

/// Ethertype carried in every frame and used to filter the raw socket
pub const ETHERTYPE: u16 = 0xFFFF;

/// Constant link header: broadcast placeholders for both addresses, then the ethertype
pub const LINK_HEADER: [u8; HEADER_SIZE] = [
    // destination address
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    // source address
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    // ethertype
    0xFF, 0xFF,
];

/// Offset of the direction flag
pub const DIRECTION_OFFSET: usize = 14;

/// Offset of the big-endian sequence number
pub const SEQUENCE_OFFSET: usize = 15;

/// First payload byte
pub const PAYLOAD_OFFSET: usize = SEQUENCE_OFFSET + 4;

/// One past the last payload byte; everything after it is zero padding
pub const PAYLOAD_END: usize = 1500 - 1 - 4;

/// Direction flag written into every transmitted frame
pub const DIRECTION_OUTBOUND: u8 = 0x00;

/// Fixed fields read back from a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Direction flag (0 for frames sent by the benchmark)
    pub direction: u8,
    /// Sequence number assigned when the frame was sent
    pub sequence: u32,
}

/// Result of comparing a received frame with the frame that was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Frame matches
    Ok,
    /// Received length differs from the sent length
    SizeMismatch { sent: usize, received: usize },
    /// Link header is not the benchmark header
    HeaderMismatch,
    /// Content differs; `offset` is the first differing byte
    ContentMismatch { offset: usize },
}

impl Verdict {
    pub fn is_ok(&self) -> bool {
        matches!(self, Verdict::Ok)
    }
}

/// Builds the frame for `sequence`.
///
/// The result depends on nothing but `sequence`, so the same sequence always
/// produces the same bytes.
pub fn encode(sequence: u32) -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_SIZE);
    frame.extend_from_slice(&LINK_HEADER);
    frame.push(DIRECTION_OUTBOUND);
    frame.extend_from_slice(&sequence.to_be_bytes());
    frame.resize(FRAME_SIZE, 0);

    let c = (sequence ^ (sequence >> 8) ^ (sequence >> 16)) as u8;
    for (i, byte) in frame
        .iter_mut()
        .enumerate()
        .take(PAYLOAD_END)
        .skip(PAYLOAD_OFFSET)
    {
        *byte = (i as u8) ^ c;
    }
    frame
}

/// Reads the direction flag and sequence number.
///
/// Returns `None` if the frame is too short to carry a sequence number.
pub fn decode(frame: &[u8]) -> Option<FrameHeader> {
    let sequence = sequence_of(frame)?;
    Some(FrameHeader {
        direction: frame[DIRECTION_OFFSET],
        sequence,
    })
}

/// Reads the sequence number at its fixed offset.
pub fn sequence_of(frame: &[u8]) -> Option<u32> {
    let bytes = frame.get(SEQUENCE_OFFSET..PAYLOAD_OFFSET)?;
    Some(u32::from_be_bytes(bytes.try_into().ok()?))
}

/// Compares a received frame with the frame that was sent for its sequence.
///
/// Length is checked first, then the link header, then (only when
/// `check_content` is set) every byte. The first failing check decides the
/// verdict.
pub fn validate(received: &[u8], sent: &[u8], check_content: bool) -> Verdict {
    if received.len() != sent.len() {
        return Verdict::SizeMismatch {
            sent: sent.len(),
            received: received.len(),
        };
    }
    if !received.starts_with(&LINK_HEADER) {
        return Verdict::HeaderMismatch;
    }
    if check_content {
        if let Some(offset) = received.iter().zip(sent).position(|(r, s)| r != s) {
            return Verdict::ContentMismatch { offset };
        }
    }
    Verdict::Ok
}

/// Formats a frame as space-separated hex bytes for verbose dumps.
pub fn hex_dump(frame: &[u8]) -> String {
    frame
        .iter()
        .map(|byte| format!("{:x}", byte))
        .collect::<Vec<_>>()
        .join(" ")
}
