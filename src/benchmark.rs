use crate::config::Config;
use crate::frame;
use crate::in_flight::InFlightTable;
use crate::interval_reporter::{run_reporter_task, IntervalReporter, TickReport};
use crate::pacer::Pacer;
use crate::sequencer::Sequencer;
use crate::stat_log::StatLog;
use crate::stats::{Counters, StatsCollector};
use crate::transport::Transport;
use crate::{Error, Result};
use log::{info, warn};
use serde::Serialize;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

/// Statistics cadence
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Receive buffer size; comfortably larger than a full frame
pub const RECV_BUFFER_SIZE: usize = 1600;

/// Exit code for a run that finished normally or hit its time limit
pub const EXIT_SUCCESS: u8 = 0;

/// Exit code for a run that hit its sequence limit
pub const EXIT_LIMIT_REACHED: u8 = 2;

/// How a run that did not fail came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The configured time limit expired
    TimeLimit,
    /// The configured number of frames was sent
    SequenceLimit,
    /// The cancellation token was triggered
    Cancelled,
}

impl RunOutcome {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::SequenceLimit => EXIT_LIMIT_REACHED,
            RunOutcome::TimeLimit | RunOutcome::Cancelled => EXIT_SUCCESS,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            RunOutcome::TimeLimit => "time limit reached",
            RunOutcome::SequenceLimit => "sequence number limit reached",
            RunOutcome::Cancelled => "cancelled",
        }
    }
}

/// Totals for a finished run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub exit_code: u8,
    pub elapsed_secs: f64,
    pub tx_packets: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub rx_bytes: u64,
    pub malformed: u64,
    pub missed: u64,
    pub unmatched: u64,
    /// Frames sent but never matched
    pub in_flight: usize,
    /// Lowest sequence number still in flight
    pub oldest_in_flight: Option<u32>,
    /// Most frames that were ever in flight at once
    pub peak_in_flight: usize,
}

impl RunSummary {
    fn new(outcome: RunOutcome, elapsed: Duration, counters: &Counters, table: &InFlightTable) -> Self {
        Self {
            outcome,
            exit_code: outcome.exit_code(),
            elapsed_secs: elapsed.as_secs_f64(),
            tx_packets: counters.tx_packets_total,
            tx_bytes: counters.tx_bytes_total,
            rx_packets: counters.rx_packets_total,
            rx_bytes: counters.rx_bytes_total,
            malformed: counters.malformed,
            missed: counters.missed,
            unmatched: counters.unmatched,
            in_flight: table.len(),
            oldest_in_flight: table.oldest(),
            peak_in_flight: table.peak(),
        }
    }
}

/// Progress event types reported during a run.
///
/// # Examples
///
/// ```no_run
/// use framebench::raw_socket::RawSocket;
/// use framebench::{Benchmark, Config, ProgressEvent};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::new("eth0").with_time_limit(Duration::from_secs(10));
/// let socket = RawSocket::open(&config.interface)?;
///
/// let benchmark = Benchmark::new(config, socket)?.with_callback(|event: ProgressEvent| {
///     if let ProgressEvent::Tick(report) = event {
///         println!("{} bits/s received", report.rx_bits);
///     }
/// });
/// benchmark.run().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// The run is starting
    RunStarted,
    /// A statistics tick, including the warm-up tick
    Tick(TickReport),
    /// The run ended without an error
    RunFinished(RunSummary),
    /// The run ended with an error
    Error(String),
}

/// Callback trait for receiving progress updates during a run.
///
/// Implemented for any `Fn(ProgressEvent) + Send + Sync` closure.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);
}

impl<F> ProgressCallback for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: ProgressEvent) {
        self(event)
    }
}

type CallbackRef = Arc<dyn ProgressCallback>;

/// Link-layer frame benchmark.
///
/// Sends numbered frames over a [`Transport`], matches every frame that comes
/// back against the frame that was sent, and reports per-second throughput,
/// loss and corruption until a limit is hit, the run is cancelled, or the
/// transport fails.
///
/// Frames are paced by an outstanding window: `window` frames go out up
/// front, then one more for every frame that comes back.
///
/// # Examples
///
/// ```no_run
/// use framebench::raw_socket::RawSocket;
/// use framebench::{Benchmark, Config};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::new("eth0").with_sequence_limit(1_000_000);
/// let socket = RawSocket::open(&config.interface)?;
///
/// let summary = Benchmark::new(config, socket)?.run().await?;
/// println!("{} of {} frames came back", summary.rx_packets, summary.tx_packets);
/// std::process::exit(summary.exit_code.into());
/// # }
/// ```
pub struct Benchmark<T> {
    config: Config,
    transport: T,
    stats: StatsCollector,
    callback: Option<CallbackRef>,
    cancellation_token: CancellationToken,
}

impl<T: Transport> Benchmark<T> {
    /// Creates a benchmark over an already opened transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn new(config: Config, transport: T) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            transport,
            stats: StatsCollector::new(),
            callback: None,
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Attaches a progress callback.
    pub fn with_callback<C: ProgressCallback + 'static>(mut self, callback: C) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Token that ends the run when cancelled.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Live counters of the run
    pub fn stats(&self) -> &StatsCollector {
        &self.stats
    }

    fn notify(&self, event: ProgressEvent) {
        if let Some(callback) = &self.callback {
            callback.on_progress(event);
        }
    }

    /// Runs the benchmark until a limit is reached, the run is cancelled, or
    /// the transport fails.
    ///
    /// Whatever ends the run, the statistics ticker is stopped and the
    /// reporter drains and flushes the statistics log before this returns.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the statistics log cannot be created
    /// - [`Error::Transport`] if a send or receive fails
    /// - [`Error::UnmatchedSequence`] if a frame with no frame in flight
    ///   arrives under [`UnmatchedPolicy::Abort`](crate::UnmatchedPolicy::Abort)
    pub async fn run(&self) -> Result<RunSummary> {
        let stat_log = match &self.config.stat_file {
            Some(path) => Some(StatLog::create(path)?),
            None => None,
        };

        let start = Instant::now();
        self.notify(ProgressEvent::RunStarted);

        let (reporter, receiver) = IntervalReporter::new();
        let reporter_task = tokio::spawn(run_reporter_task(
            receiver,
            self.config.json,
            stat_log,
            self.callback.clone(),
        ));
        let ticker_token = self.cancellation_token.child_token();
        let ticker = tokio::spawn(run_statistics(
            self.stats.clone(),
            reporter.clone(),
            ticker_token.clone(),
            start,
        ));

        let mut datapath = DataPath::new(&self.config, &self.transport, &self.stats);
        let result = tokio::select! {
            result = datapath.run() => result,
            _ = wait_for_time_limit(start, self.config.time_limit) => {
                info!("Time limit reached, exiting");
                Ok(RunOutcome::TimeLimit)
            }
            _ = self.cancellation_token.cancelled() => {
                info!("Benchmark cancelled, exiting");
                Ok(RunOutcome::Cancelled)
            }
        };
        let elapsed = start.elapsed();

        ticker_token.cancel();
        if let Err(e) = ticker.await {
            warn!("Statistics ticker stopped abnormally: {}", e);
        }
        reporter.finish();
        match reporter_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Statistics log is incomplete: {}", e),
            Err(e) => warn!("Interval reporter stopped abnormally: {}", e),
        }

        match result {
            Ok(outcome) => {
                let counters = self.stats.snapshot();
                let summary = RunSummary::new(outcome, elapsed, &counters, &datapath.table);
                self.notify(ProgressEvent::RunFinished(summary.clone()));
                Ok(summary)
            }
            Err(e) => {
                self.notify(ProgressEvent::Error(e.to_string()));
                Err(e)
            }
        }
    }
}

/// The transport side of a run: pacing, sending, receiving and matching.
///
/// Sends are drained from the pacer's credits in a loop rather than chained
/// from completion handlers, so sustained traffic never deepens the stack.
struct DataPath<'a, T> {
    transport: &'a T,
    stats: &'a StatsCollector,
    receive_only: bool,
    window: u32,
    table: InFlightTable,
    pacer: Pacer,
    sequencer: Sequencer,
}

impl<'a, T: Transport> DataPath<'a, T> {
    fn new(config: &Config, transport: &'a T, stats: &'a StatsCollector) -> Self {
        Self {
            transport,
            stats,
            receive_only: config.receive_only,
            window: config.window,
            table: InFlightTable::new(),
            pacer: Pacer::new(config.sequence_limit).with_verbose(config.verbose),
            sequencer: Sequencer::new(config),
        }
    }

    async fn run(&mut self) -> Result<RunOutcome> {
        let mut buffer = vec![0u8; RECV_BUFFER_SIZE];

        if !self.receive_only {
            self.pacer.prime(self.window);
        }

        loop {
            while let Some(sequence) = self.pacer.next_send() {
                let frame = self.table.insert(sequence, frame::encode(sequence));
                let sent = self
                    .transport
                    .send_frame(frame)
                    .await
                    .map_err(|e| Error::transport("send", e))?;

                if let Some(limit) = self.pacer.on_send_complete(sequence, sent, self.stats) {
                    info!(
                        "Sequence number limit reached at {}, exiting",
                        limit.sequence
                    );
                    return Ok(RunOutcome::SequenceLimit);
                }
            }

            let length = self
                .transport
                .recv_frame(&mut buffer)
                .await
                .map_err(|e| Error::transport("receive", e))?;
            let received = buffer.get(..length).ok_or_else(|| {
                Error::transport(
                    "receive",
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "transport reported {} bytes for a {}-byte buffer",
                            length, RECV_BUFFER_SIZE
                        ),
                    ),
                )
            })?;

            let delivery = self
                .sequencer
                .on_receive(received, &mut self.table, self.stats)?;
            if delivery.grants_send() && !self.receive_only {
                self.pacer.grant();
            }
        }
    }
}

/// Resolves when the time limit expires, or never without one.
async fn wait_for_time_limit(start: Instant, limit: Option<Duration>) {
    match limit {
        Some(limit) => time::sleep_until(start + limit).await,
        None => std::future::pending().await,
    }
}

/// Snapshots and resets the counters once per tick until cancelled.
///
/// Deadlines are computed from `start` rather than from the previous wake-up,
/// so late wake-ups do not accumulate drift.
async fn run_statistics(
    stats: StatsCollector,
    reporter: IntervalReporter,
    shutdown: CancellationToken,
    start: Instant,
) {
    let mut deadline = start + TICK_INTERVAL;
    let mut tick = 0u64;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = time::sleep_until(deadline) => {}
        }

        let counters = stats.snapshot_and_reset();
        reporter.report(TickReport::from_counters(tick, deadline - start, &counters));

        tick += 1;
        deadline += TICK_INTERVAL;
    }
}

/// Prints the end-of-run summary.
pub fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!(
        "Run finished: {} after {:.2} s (exit code {})",
        summary.outcome.describe(),
        summary.elapsed_secs,
        summary.exit_code
    );
    println!(
        "Sent {} frames ({} bytes), received {} frames ({} bytes)",
        summary.tx_packets, summary.tx_bytes, summary.rx_packets, summary.rx_bytes
    );
    println!(
        "Malformed {}, missing sequence numbers {}, unmatched {}",
        summary.malformed, summary.missed, summary.unmatched
    );
    match summary.oldest_in_flight {
        Some(oldest) => println!(
            "Still in flight {} from sequence number {} (peak {})",
            summary.in_flight, oldest, summary.peak_in_flight
        ),
        None => println!(
            "Nothing left in flight (peak {})",
            summary.peak_in_flight
        ),
    }
    Ok(())
}

/// Exit code for the result of [`Benchmark::run`].
pub fn exit_code(result: &Result<RunSummary>) -> u8 {
    match result {
        Ok(summary) => summary.exit_code,
        Err(e) => e.exit_code(),
    }
}
