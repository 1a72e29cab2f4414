//! Interval reporting system for per-second statistics.
//!
//! The statistics ticker only takes a snapshot under the counters lock and
//! hands it to this module's task over a channel. Formatting, console output,
//! the statistics log and progress callbacks all happen here, off the lock.

use crate::benchmark::{ProgressCallback, ProgressEvent};
use crate::stat_log::StatLog;
use crate::stats::Counters;
use crate::{Error, Result};
use log::{debug, error};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Statistics for one tick
///
/// # Examples
///
/// ```
/// use framebench::interval_reporter::TickReport;
/// use framebench::stats::Counters;
/// use std::time::Duration;
///
/// let counters = Counters {
///     rx_packets_second: 2,
///     rx_bytes_second: 3000,
///     ..Default::default()
/// };
/// let report = TickReport::from_counters(1, Duration::from_secs(2), &counters);
///
/// assert_eq!(report.rx_bits, 24_000);
/// assert!(!report.warm_up);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    /// Tick index, starting at 0
    pub tick: u64,
    /// First tick of the run; its sample is not logged
    pub warm_up: bool,
    /// Seconds since the run started
    pub elapsed_secs: f64,
    pub rx_packets: u64,
    pub rx_bits: u64,
    pub tx_packets: u64,
    pub tx_bits: u64,
    /// Cumulative malformed frames
    pub malformed: u64,
    /// Cumulative missing sequence numbers
    pub missed: u64,
    /// Cumulative frames with no frame in flight
    pub unmatched: u64,
}

impl TickReport {
    pub fn from_counters(tick: u64, elapsed: Duration, counters: &Counters) -> Self {
        Self {
            tick,
            warm_up: tick == 0,
            elapsed_secs: elapsed.as_secs_f64(),
            rx_packets: counters.rx_packets_second,
            rx_bits: counters.rx_bits_second(),
            tx_packets: counters.tx_packets_second,
            tx_bits: counters.tx_bits_second(),
            malformed: counters.malformed,
            missed: counters.missed,
            unmatched: counters.unmatched,
        }
    }
}

/// What the statistics ticker hands to the reporter task
#[derive(Debug)]
pub enum ReporterMessage {
    Tick(TickReport),
    /// No more ticks will follow; flush the log and return
    Finish,
}

/// Sending half used by the statistics ticker and the run controller
#[derive(Clone)]
pub struct IntervalReporter {
    sender: mpsc::UnboundedSender<ReporterMessage>,
}

impl IntervalReporter {
    /// Pairs a reporter with the receiver that [`run_reporter_task`] drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ReporterMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Queues one tick. Dropped silently once the reporter task is gone.
    pub fn report(&self, report: TickReport) {
        let _ = self.sender.send(ReporterMessage::Tick(report));
    }

    pub fn finish(&self) {
        let _ = self.sender.send(ReporterMessage::Finish);
    }
}

/// Runs the interval reporter until [`ReporterMessage::Finish`] arrives or
/// every sender is gone.
///
/// Every tick is printed; every tick except the warm-up tick is appended to
/// the statistics log. A log write failure is reported once the queue has
/// drained, and console reporting carries on without the log.
pub async fn run_reporter_task(
    mut receiver: mpsc::UnboundedReceiver<ReporterMessage>,
    json_mode: bool,
    mut stat_log: Option<StatLog>,
    callback: Option<Arc<dyn ProgressCallback>>,
) -> Result<()> {
    let mut failure: Option<Error> = None;

    while let Some(msg) = receiver.recv().await {
        match msg {
            ReporterMessage::Tick(report) => {
                if json_mode {
                    match serde_json::to_string(&report) {
                        Ok(line) => println!("{}", line),
                        Err(e) => error!("Failed to encode tick report: {}", e),
                    }
                } else {
                    println!("{}", format_report(&report));
                }

                if !report.warm_up {
                    if let Some(log) = stat_log.as_mut() {
                        if let Err(e) = log.write_row(report.rx_bits, report.tx_bits) {
                            error!("Failed to write statistics log, disabling it: {}", e);
                            failure.get_or_insert(e);
                            stat_log = None;
                        }
                    }
                }

                if let Some(ref cb) = callback {
                    cb.on_progress(ProgressEvent::Tick(report));
                }
            }
            ReporterMessage::Finish => break,
        }
    }

    if let Some(log) = stat_log.as_mut() {
        match log.flush() {
            Ok(()) => debug!("Statistics log closed after {} rows", log.rows()),
            Err(e) => {
                failure.get_or_insert(e);
            }
        }
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Formats the two-line console block for a tick
pub fn format_report(report: &TickReport) -> String {
    format!(
        "Statistics: RX {} packets/s {} bits/s  TX {} packets/s {} bits/s\n\
         Cumulative malformed packets: {}, cumulative missing sequence numbers: {}",
        report.rx_packets,
        report.rx_bits,
        report.tx_packets,
        report.tx_bits,
        report.malformed,
        report.missed
    )
}
