use thiserror::Error;

/// Exit code for configuration, transport and protocol failures.
pub const EXIT_FAILURE: u8 = 1;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error during {operation}: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Protocol error: received sequence number {0} with no frame in flight")]
    UnmatchedSequence(u32),
}

impl Error {
    pub(crate) fn transport(operation: &'static str, source: std::io::Error) -> Self {
        Error::Transport { operation, source }
    }

    /// Process exit code for a run that ended with this error.
    pub fn exit_code(&self) -> u8 {
        EXIT_FAILURE
    }
}

pub type Result<T> = std::result::Result<T, Error>;
