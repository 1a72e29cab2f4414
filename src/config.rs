use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default number of frames sent before pacing switches to one-in-one-out.
pub const DEFAULT_WINDOW: u32 = 40;

/// What to do with a received frame whose sequence number has no frame in flight.
///
/// Such a frame is either a duplicate of one already matched or something the
/// benchmark never sent.
///
/// # Examples
///
/// ```
/// use framebench::{Config, UnmatchedPolicy};
///
/// let config = Config::new("eth0").with_unmatched_policy(UnmatchedPolicy::Ignore);
/// assert_eq!(config.unmatched, UnmatchedPolicy::Ignore);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnmatchedPolicy {
    /// End the run with a protocol error (exit code 1)
    #[default]
    Abort,
    /// Log a warning, count the frame as unmatched and keep running
    Ignore,
}

/// How the loss-detection cursor reacts to a sequence number lower than the
/// last one seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReorderPolicy {
    /// Always move the cursor to the sequence just received, even backwards
    #[default]
    Advance,
    /// Only move the cursor forward, modulo 2^32; late frames leave it untouched
    Monotonic,
}

/// Configuration for a frame benchmark run.
///
/// Use the builder methods to customize the defaults. The configuration is
/// never modified once a [`Benchmark`](crate::Benchmark) has been created.
///
/// # Examples
///
/// ## Echo test with a sequence limit
///
/// ```
/// use framebench::Config;
///
/// let config = Config::new("eth0")
///     .with_window(64)
///     .with_sequence_limit(100_000);
/// assert_eq!(config.sequence_limit, Some(100_000));
/// ```
///
/// ## Passive receiver writing a statistics log
///
/// ```
/// use framebench::Config;
/// use std::time::Duration;
///
/// let config = Config::new("eth1")
///     .with_receive_only(true)
///     .with_time_limit(Duration::from_secs(60))
///     .with_stat_file("rx.csv");
/// assert!(config.receive_only);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Network interface the frames are sent and received on
    pub interface: String,

    /// Compare received frames byte-for-byte with the frame that was sent
    pub check_content: bool,

    /// Log every frame sent and received, and dump malformed frames
    pub verbose: bool,

    /// Only count received traffic; never send or validate
    pub receive_only: bool,

    /// Stop after this many frames have been sent
    pub sequence_limit: Option<u32>,

    /// Stop after this much time has passed since the run started
    pub time_limit: Option<Duration>,

    /// Frames sent up front before pacing switches to one-in-one-out
    pub window: u32,

    /// Path of the CSV statistics log
    pub stat_file: Option<PathBuf>,

    /// Handling of frames with no matching frame in flight
    pub unmatched: UnmatchedPolicy,

    /// Handling of out-of-order frames for loss detection
    pub reorder: ReorderPolicy,

    /// Emit tick reports and the run summary as JSON
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: String::new(),
            check_content: true,
            verbose: false,
            receive_only: false,
            sequence_limit: None,
            time_limit: None,
            window: DEFAULT_WINDOW,
            stat_file: None,
            unmatched: UnmatchedPolicy::default(),
            reorder: ReorderPolicy::default(),
            json: false,
        }
    }
}

impl Config {
    /// Creates a configuration for the given interface with default values.
    ///
    /// # Examples
    ///
    /// ```
    /// use framebench::Config;
    ///
    /// let config = Config::new("eth0");
    /// assert_eq!(config.window, 40);
    /// assert!(config.check_content);
    /// ```
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            ..Default::default()
        }
    }

    /// Enables or disables byte-for-byte content comparison.
    ///
    /// Size and header checks are always performed.
    pub fn with_check_content(mut self, check_content: bool) -> Self {
        self.check_content = check_content;
        self
    }

    /// Enables or disables per-frame logging.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Enables or disables receive-only mode.
    ///
    /// In receive-only mode nothing is sent and received frames are only
    /// counted, never matched or validated.
    pub fn with_receive_only(mut self, receive_only: bool) -> Self {
        self.receive_only = receive_only;
        self
    }

    /// Stops the run once `limit` frames have been sent.
    ///
    /// A limit of zero disables the check.
    ///
    /// # Examples
    ///
    /// ```
    /// use framebench::Config;
    ///
    /// assert_eq!(Config::new("eth0").with_sequence_limit(0).sequence_limit, None);
    /// ```
    pub fn with_sequence_limit(mut self, limit: u32) -> Self {
        self.sequence_limit = Some(limit).filter(|&limit| limit != 0);
        self
    }

    /// Stops the run once `limit` has elapsed since it started.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Sets the outstanding window (default: 40).
    ///
    /// Larger windows keep more frames in the transmit queue, but the kernel
    /// drops frames once its buffer is full.
    pub fn with_window(mut self, window: u32) -> Self {
        self.window = window;
        self
    }

    /// Writes per-second bit rates to a CSV file at `path`.
    pub fn with_stat_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stat_file = Some(path.into());
        self
    }

    /// Sets the handling of frames with no matching frame in flight.
    pub fn with_unmatched_policy(mut self, policy: UnmatchedPolicy) -> Self {
        self.unmatched = policy;
        self
    }

    /// Sets the handling of out-of-order frames for loss detection.
    pub fn with_reorder_policy(mut self, policy: ReorderPolicy) -> Self {
        self.reorder = policy;
        self
    }

    /// Enables or disables JSON output.
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Checks the configuration before any I/O happens.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the interface name is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use framebench::Config;
    ///
    /// assert!(Config::new("eth0").validate().is_ok());
    /// assert!(Config::new("").validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        if self.interface.trim().is_empty() {
            return Err(Error::Config("an interface is required".to_string()));
        }
        Ok(())
    }
}
