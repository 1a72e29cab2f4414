//! CSV log of per-second bit rates.
//!
//! ```text
//! bps_rx,bps_tx
//! 953600000,953600000
//! 953612000,953600000
//! ```

use crate::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Header line written when the log is opened
pub const HEADER: &str = "bps_rx,bps_tx";

/// Writer for the statistics log. Rows are flushed as they are written.
pub struct StatLog {
    writer: Box<dyn Write + Send>,
    rows: u64,
}

impl StatLog {
    /// Creates (or truncates) the log file at `path` and writes the header.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(Box::new(BufWriter::new(file)))
    }

    /// Wraps an arbitrary writer and writes the header.
    pub fn new(mut writer: Box<dyn Write + Send>) -> Result<Self> {
        writeln!(writer, "{}", HEADER)?;
        writer.flush()?;
        Ok(Self { writer, rows: 0 })
    }

    /// Appends one `rx,tx` row of bits per second.
    pub fn write_row(&mut self, rx_bits: u64, tx_bits: u64) -> Result<()> {
        writeln!(self.writer, "{},{}", rx_bits, tx_bits)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Rows written so far, not counting the header
    pub fn rows(&self) -> u64 {
        self.rows
    }
}
