//! Channel tables and validated scan configuration.
//!
//! A [`ChannelTable`] is what the caller asks for: per-channel rate, gain,
//! and polarity, plus an output latency. [`ScanConfig::validate`] checks the
//! table against the board's jumper-sensed input configuration and derives
//! the scan geometry the hardware will actually run.

use serde::{Deserialize, Serialize};

use crate::clock::MSECS_PER_SEC;
use crate::error::{Aio16Error, Result};
use crate::registers::{JumperSettings, INPUT_CLOCK_HZ, NUM_CHANNELS};

/// Conversions averaged into each output sample.
pub const OVERSAMPLE: usize = 16;

/// Output latency applied when the table leaves it unset (milliseconds).
pub const DEFAULT_LATENCY_MS: u32 = 500;

/// Gains offered by the board for each jumper setting, indexed by
/// `high_gain * 2 + bipolar`. A zero entry is a placeholder (gain 1 is not
/// offered when jumpered low-gain/unipolar).
pub const GAIN_TABLE: [[u32; 4]; 4] = [
    [0, 2, 5, 10],  // low gain, unipolar
    [1, 2, 5, 10],  // low gain, bipolar
    [2, 4, 10, 20], // high gain, unipolar
    [2, 4, 10, 20], // high gain, bipolar
];

const GAIN_STRINGS: [&str; 4] = ["2,5,10", "1,2,5,10", "2,4,10,20", "2,4,10,20"];

fn jumper_description(jumpers: JumperSettings) -> &'static str {
    match (jumpers.high_gain, jumpers.bipolar) {
        (false, false) => "low-gain/unipolar",
        (false, true) => "low-gain/bipolar",
        (true, false) => "high-gain/unipolar",
        (true, true) => "high-gain/bipolar",
    }
}

/// Requested settings for a single analog input channel.
///
/// A rate of zero means the channel is not requested; its gain and polarity
/// are then ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Sample rate in Hz, 0 = channel off.
    #[serde(default)]
    pub rate_hz: u32,
    /// Gain setting (1, 2, 4, 5, 10, or 20 depending on jumpers).
    #[serde(default)]
    pub gain: u32,
    /// Bipolar (true) or unipolar (false) input range.
    #[serde(default)]
    pub bipolar: bool,
}

/// Full per-board channel request table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelTable {
    /// Per-channel settings, indexed by channel number.
    pub channels: [ChannelConfig; NUM_CHANNELS],
    /// Output latency in milliseconds; 0 selects [`DEFAULT_LATENCY_MS`].
    pub latency_ms: u32,
}

impl Default for ChannelTable {
    fn default() -> Self {
        Self {
            channels: [ChannelConfig::default(); NUM_CHANNELS],
            latency_ms: 0,
        }
    }
}

/// TOML shape of a channel table: a `latency_ms` key and `[[channel]]`
/// entries carrying an explicit channel `index`.
#[derive(Debug, Deserialize)]
struct RawTable {
    #[serde(default)]
    latency_ms: u32,
    #[serde(default, rename = "channel")]
    channels: Vec<RawChannel>,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    index: usize,
    #[serde(flatten)]
    config: ChannelConfig,
}

impl ChannelTable {
    /// Set one channel's request, for building tables in code.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`NUM_CHANNELS`]. Tables built from
    /// TOML get the same bound reported as [`Aio16Error::InvalidTable`]
    /// instead.
    pub fn set_channel(&mut self, index: usize, rate_hz: u32, gain: u32, bipolar: bool) {
        self.channels[index] = ChannelConfig {
            rate_hz,
            gain,
            bipolar,
        };
    }

    /// Parse a table from TOML text.
    ///
    /// ```
    /// use daq_driver_aio16::config::ChannelTable;
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let table = ChannelTable::from_toml_str(
    ///     r#"
    ///     latency_ms = 250
    ///
    ///     [[channel]]
    ///     index = 0
    ///     rate_hz = 100
    ///     gain = 2
    ///     bipolar = true
    ///     "#,
    /// )?;
    /// assert_eq!(table.channels[0].rate_hz, 100);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let raw: RawTable = toml::from_str(text)?;
        let mut table = ChannelTable {
            latency_ms: raw.latency_ms,
            ..ChannelTable::default()
        };
        for entry in raw.channels {
            if entry.index >= NUM_CHANNELS {
                return Err(Aio16Error::InvalidTable {
                    message: format!(
                        "channel index {} out of range (board has {} channels)",
                        entry.index, NUM_CHANNELS
                    ),
                });
            }
            table.channels[entry.index] = entry.config;
        }
        Ok(table)
    }
}

/// Validated scan geometry derived from a [`ChannelTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Which channels the caller asked for. Channels inside the scan window
    /// that are not requested are converted and discarded.
    pub requested: [bool; NUM_CHANNELS],
    /// Lowest channel the hardware scans.
    pub low_channel: usize,
    /// Highest channel the hardware scans.
    pub high_channel: usize,
    /// Index into the jumper-selected gain set, written to the gain register.
    pub gain_code: u8,
    /// Scan pacing rate in Hz.
    pub max_rate_hz: u32,
    /// Conversions averaged per output sample.
    pub oversample: usize,
    /// Output latency in milliseconds.
    pub latency_ms: u32,
}

impl ScanConfig {
    /// Number of channels in the hardware scan window.
    pub fn n_channels(&self) -> usize {
        self.high_channel - self.low_channel + 1
    }

    /// Number of requested channels (samples per output scan).
    pub fn n_requested(&self) -> usize {
        self.requested.iter().filter(|&&r| r).count()
    }

    /// Inter-scan period in milliseconds.
    ///
    /// The time base is the millisecond-of-day clock, so rates above
    /// 1 kHz truncate to a zero period: such scans all carry their
    /// block's anchor tag, and output flushing falls back to the
    /// buffer-full path alone.
    pub fn scan_period_ms(&self) -> u32 {
        MSECS_PER_SEC / self.max_rate_hz
    }

    /// Validate a channel table against the board's sensed jumpers.
    ///
    /// The first requested channel fixes the gain and polarity; every later
    /// requested channel must match them. The scan is paced at the highest
    /// requested rate, which must evenly divide the 10 MHz input clock. A
    /// single-channel request is widened to two channels (the hardware will
    /// not scan fewer in timed mode), preferring to extend downward.
    pub fn validate(table: &ChannelTable, jumpers: JumperSettings) -> Result<Self> {
        let mut requested = [false; NUM_CHANNELS];
        let mut low_channel = 0usize;
        let mut high_channel = 0usize;
        let mut first = 0usize;
        let mut gain = 0u32;
        let mut bipolar = false;
        let mut max_rate_hz = 0u32;

        for (i, ch) in table.channels.iter().enumerate() {
            if ch.rate_hz == 0 {
                continue;
            }
            requested[i] = true;
            if max_rate_hz == 0 {
                low_channel = i;
                first = i;
                gain = ch.gain;
                if gain == 0 {
                    return Err(Aio16Error::InvalidGain {
                        channel: i,
                        gain: ch.gain,
                    });
                }
                bipolar = ch.bipolar;
            }
            max_rate_hz = max_rate_hz.max(ch.rate_hz);
            high_channel = i;

            if ch.gain != gain {
                return Err(Aio16Error::GainMismatch {
                    channel: i,
                    gain: ch.gain,
                    first,
                    first_gain: gain,
                });
            }
            if ch.bipolar != bipolar {
                return Err(Aio16Error::PolarityMismatch { channel: i, first });
            }
        }

        if max_rate_hz == 0 {
            return Err(Aio16Error::NoChannelsRequested);
        }
        if INPUT_CLOCK_HZ % max_rate_hz != 0 {
            return Err(Aio16Error::RateNotDivisible {
                rate: max_rate_hz,
                clock: INPUT_CLOCK_HZ,
            });
        }
        if bipolar != jumpers.bipolar {
            return Err(Aio16Error::PolarityJumperConflict {
                requested: if bipolar { "bipolar" } else { "unipolar" },
                jumpered: if jumpers.bipolar { "bipolar" } else { "unipolar" },
            });
        }

        let gain_index = usize::from(jumpers.high_gain) * 2 + usize::from(jumpers.bipolar);
        let gain_code = GAIN_TABLE[gain_index]
            .iter()
            .position(|&g| g == gain && g != 0)
            .ok_or(Aio16Error::UnsupportedGain {
                gain,
                jumpered: jumper_description(jumpers),
                available: GAIN_STRINGS[gain_index],
            })?;

        if high_channel == low_channel {
            if low_channel == 0 {
                high_channel = low_channel + 1;
            } else {
                low_channel -= 1;
            }
        }

        let latency_ms = if table.latency_ms == 0 {
            DEFAULT_LATENCY_MS
        } else {
            table.latency_ms
        };

        Ok(Self {
            requested,
            low_channel,
            high_channel,
            gain_code: gain_code as u8,
            max_rate_hz,
            oversample: OVERSAMPLE,
            latency_ms,
        })
    }
}
