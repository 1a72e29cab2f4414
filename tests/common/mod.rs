// In-memory transports for driving the benchmark without a network interface

#![allow(dead_code)]

use framebench::frame::{self, PAYLOAD_OFFSET};
use framebench::Transport;
use std::collections::HashSet;
use std::io;
use std::sync::Mutex;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

/// Reflects every sent frame back, with optional faults injected per sequence
/// number. Frames queued with [`EchoTransport::inject`] are received first.
pub struct EchoTransport {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: AsyncMutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    drop: HashSet<u32>,
    corrupt: HashSet<u32>,
    duplicate: HashSet<u32>,
    sent: Mutex<Vec<u32>>,
}

impl EchoTransport {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: AsyncMutex::new(rx),
            drop: HashSet::new(),
            corrupt: HashSet::new(),
            duplicate: HashSet::new(),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Never echo these sequence numbers
    pub fn dropping(mut self, sequences: impl IntoIterator<Item = u32>) -> Self {
        self.drop.extend(sequences);
        self
    }

    /// Flip one payload byte of these sequence numbers
    pub fn corrupting(mut self, sequences: impl IntoIterator<Item = u32>) -> Self {
        self.corrupt.extend(sequences);
        self
    }

    /// Echo these sequence numbers twice
    pub fn duplicating(mut self, sequences: impl IntoIterator<Item = u32>) -> Self {
        self.duplicate.extend(sequences);
        self
    }

    /// Queue a frame to be received as if it had arrived unprompted
    pub fn inject(&self, frame: Vec<u8>) {
        let _ = self.tx.send(frame);
    }

    /// Sequence numbers sent so far, in send order
    pub fn sent(&self) -> Vec<u32> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for EchoTransport {
    async fn send_frame(&self, bytes: &[u8]) -> io::Result<usize> {
        let sequence = frame::sequence_of(bytes).expect("benchmark sent a runt frame");
        self.sent.lock().unwrap().push(sequence);

        if self.drop.contains(&sequence) {
            return Ok(bytes.len());
        }

        let mut echoed = bytes.to_vec();
        if self.corrupt.contains(&sequence) {
            echoed[PAYLOAD_OFFSET + 10] ^= 0xFF;
        }
        if self.duplicate.contains(&sequence) {
            let _ = self.tx.send(echoed.clone());
        }
        let _ = self.tx.send(echoed);
        Ok(bytes.len())
    }

    async fn recv_frame(&self, buf: &mut [u8]) -> io::Result<usize> {
        let frame = self
            .rx
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;
        let len = frame.len().min(buf.len());
        buf[..len].copy_from_slice(&frame[..len]);
        Ok(len)
    }
}

/// Accepts every send and never receives anything.
#[derive(Default)]
pub struct SilentTransport {
    sent: Mutex<u64>,
}

impl SilentTransport {
    pub fn sent(&self) -> u64 {
        *self.sent.lock().unwrap()
    }
}

impl Transport for SilentTransport {
    async fn send_frame(&self, bytes: &[u8]) -> io::Result<usize> {
        *self.sent.lock().unwrap() += 1;
        Ok(bytes.len())
    }

    async fn recv_frame(&self, _buf: &mut [u8]) -> io::Result<usize> {
        std::future::pending().await
    }
}

/// Fails sends after a number of successful ones, or fails every receive.
pub struct FailingTransport {
    sends_before_failure: Option<u64>,
    sent: Mutex<u64>,
}

impl FailingTransport {
    /// Sends succeed `count` times, then fail
    pub fn failing_send_after(count: u64) -> Self {
        Self {
            sends_before_failure: Some(count),
            sent: Mutex::new(0),
        }
    }

    /// Sends always succeed; every receive fails
    pub fn failing_receive() -> Self {
        Self {
            sends_before_failure: None,
            sent: Mutex::new(0),
        }
    }
}

impl Transport for FailingTransport {
    async fn send_frame(&self, bytes: &[u8]) -> io::Result<usize> {
        let mut sent = self.sent.lock().unwrap();
        if let Some(limit) = self.sends_before_failure {
            if *sent >= limit {
                return Err(io::Error::new(io::ErrorKind::Other, "link down"));
            }
        }
        *sent += 1;
        Ok(bytes.len())
    }

    async fn recv_frame(&self, _buf: &mut [u8]) -> io::Result<usize> {
        if self.sends_before_failure.is_some() {
            return std::future::pending().await;
        }
        Err(io::Error::new(io::ErrorKind::Other, "network is down"))
    }
}
