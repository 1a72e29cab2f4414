//! The link the benchmark sends frames over and receives replies from.

use std::future::Future;
use std::io;

/// A frame transport bound to one pre-resolved interface.
///
/// Both methods take `&self` so a send and a receive can be outstanding at the
/// same time. Any error is treated by the benchmark as fatal for the run.
///
/// # Examples
///
/// A transport that loops every frame straight back:
///
/// ```
/// use framebench::Transport;
/// use std::io;
/// use tokio::sync::{mpsc, Mutex};
///
/// struct Loopback {
///     tx: mpsc::UnboundedSender<Vec<u8>>,
///     rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
/// }
///
/// impl Transport for Loopback {
///     async fn send_frame(&self, frame: &[u8]) -> io::Result<usize> {
///         self.tx
///             .send(frame.to_vec())
///             .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?;
///         Ok(frame.len())
///     }
///
///     async fn recv_frame(&self, buf: &mut [u8]) -> io::Result<usize> {
///         let frame = self.rx.lock().await.recv().await
///             .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;
///         let len = frame.len().min(buf.len());
///         buf[..len].copy_from_slice(&frame[..len]);
///         Ok(len)
///     }
/// }
/// ```
pub trait Transport: Send + Sync {
    /// Sends one complete frame, returning the number of bytes written.
    fn send_frame(&self, frame: &[u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Receives one frame into `buf`, returning its length.
    ///
    /// The length must not exceed `buf.len()`; the benchmark treats a larger
    /// one as a receive error.
    fn recv_frame(&self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send;
}
