//! framebench - A raw Ethernet frame round-trip benchmark
//!
//! This library sends numbered frames out of a network interface, expects a
//! loopback or reflector to bring them back, and measures what returns.
//!
//! # Features
//!
//! - Sequence-numbered 1514-byte frames with a deterministic payload
//! - Outstanding-window pacing: one new frame per frame that comes back
//! - Size, header and payload validation of every returned frame
//! - Missing sequence number detection
//! - Per-second RX/TX statistics with an optional CSV log and JSON output
//! - Sequence and time limits, and cancellation
//! - Asynchronous I/O using tokio, over `AF_PACKET` raw sockets on Linux

pub mod benchmark;
pub mod config;
pub mod error;
pub mod frame;
pub mod in_flight;
pub mod interval_reporter;
pub mod pacer;
#[cfg(target_os = "linux")]
pub mod raw_socket;
pub mod sequencer;
pub mod stat_log;
pub mod stats;
pub mod transport;

pub use benchmark::{Benchmark, ProgressCallback, ProgressEvent, RunOutcome, RunSummary};
pub use config::{Config, ReorderPolicy, UnmatchedPolicy};
pub use error::{Error, Result};
#[cfg(target_os = "linux")]
pub use raw_socket::RawSocket;
pub use transport::Transport;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
