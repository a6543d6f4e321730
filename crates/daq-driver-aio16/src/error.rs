//! Error types for board configuration and lifecycle operations.

use thiserror::Error;

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, Aio16Error>;

/// Errors that can occur when configuring or running the board.
#[derive(Error, Debug)]
pub enum Aio16Error {
    /// No channel in the table has a nonzero sample rate.
    #[error("no channels requested: all sample rates are zero")]
    NoChannelsRequested,

    /// A requested channel has a gain outside the positive range.
    #[error("channel {channel}: invalid gain {gain}")]
    InvalidGain {
        /// Offending channel index.
        channel: usize,
        /// Requested gain.
        gain: u32,
    },

    /// A requested channel's gain differs from an earlier channel's.
    #[error("channel {channel}: gain {gain} differs from {first_gain} set by channel {first}")]
    GainMismatch {
        /// Offending channel index.
        channel: usize,
        /// Gain requested for that channel.
        gain: u32,
        /// First requested channel.
        first: usize,
        /// Gain set by the first requested channel.
        first_gain: u32,
    },

    /// A requested channel's polarity differs from an earlier channel's.
    #[error("channel {channel}: polarity differs from channel {first}")]
    PolarityMismatch {
        /// Offending channel index.
        channel: usize,
        /// First requested channel.
        first: usize,
    },

    /// Requested polarity conflicts with the board's input jumpers.
    #[error("requested {requested} inputs but board jumpers are set {jumpered}")]
    PolarityJumperConflict {
        /// Polarity the table asked for.
        requested: &'static str,
        /// Polarity the jumpers select.
        jumpered: &'static str,
    },

    /// Requested gain is not offered by the jumper-selected range set.
    #[error("gain {gain} not available with {jumpered} jumpers; available gains: {available}")]
    UnsupportedGain {
        /// Requested gain.
        gain: u32,
        /// Description of the jumper setting.
        jumpered: &'static str,
        /// Gains the range set does offer.
        available: &'static str,
    },

    /// The sample rate does not evenly divide the A/D input clock.
    #[error("sample rate {rate} Hz does not divide the {clock} Hz input clock")]
    RateNotDivisible {
        /// Requested rate.
        rate: u32,
        /// Input clock frequency.
        clock: u32,
    },

    /// The board is acquiring; stop before reconfiguring.
    #[error("board is busy; stop acquisition before reconfiguring")]
    Busy,

    /// `start` was called before any successful configuration.
    #[error("board has not been configured")]
    NotConfigured,

    /// The delivery channel could not be opened at start.
    #[error("failed to open delivery channel")]
    DeliveryOpen(#[source] std::io::Error),

    /// The decimation worker thread could not be spawned.
    #[error("failed to spawn decimation worker")]
    WorkerSpawn(#[source] std::io::Error),

    /// A channel table file could not be parsed.
    #[error("channel table parse error")]
    TableParse(#[from] toml::de::Error),

    /// A channel table entry is structurally invalid.
    #[error("invalid channel table: {message}")]
    InvalidTable {
        /// What is wrong with the table.
        message: String,
    },
}

impl Aio16Error {
    /// Check if this is the busy error.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }

    /// Check if this error came from validating a channel table.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::NoChannelsRequested
                | Self::InvalidGain { .. }
                | Self::GainMismatch { .. }
                | Self::PolarityMismatch { .. }
                | Self::PolarityJumperConflict { .. }
                | Self::UnsupportedGain { .. }
                | Self::RateNotDivisible { .. }
                | Self::TableParse(_)
                | Self::InvalidTable { .. }
        )
    }
}
