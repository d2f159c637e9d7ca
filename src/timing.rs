//! Conversion timing.
//!
//! The data-rate code means different rates on the two chip families: the
//! 12-bit parts run 128..3300 SPS, the ADS1115 runs 8..860 SPS for the same
//! eight codes. [`SampleRate`] is named after the 12-bit rates; the 16-bit
//! column below is keyed by the same name.

use std::time::Duration;

use crate::registers::SampleRate;

/// Added after every rate-derived delay.
pub const SAFETY_MARGIN_US: u32 = 100;

/// 12-bit 860 SPS delay as shipped by the flawed driver revision
/// (computed with the 3300 SPS divisor).
pub const LEGACY_12BIT_860_DELAY_US: u32 = 1_000_000 / 3300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// ADS1015, TLA2024
    Bits12,
    /// ADS1115
    Bits16,
}

/// Sample rate to conversion delay lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DelayTable {
    /// Reproduce the 12-bit 860 SPS delay of the flawed revision instead of
    /// 1000000 / 860.
    pub legacy_860: bool,
}

impl DelayTable {
    pub const fn legacy() -> Self {
        Self { legacy_860: true }
    }

    /// Rate-derived delay in microseconds, without the safety margin.
    pub const fn base_micros(&self, family: Family, rate: SampleRate) -> u32 {
        match family {
            Family::Bits12 => match rate {
                SampleRate::Sps128 => 7812,
                SampleRate::Sps250 => 4000,
                SampleRate::Sps490 => 2041,
                SampleRate::Sps920 => 1087,
                SampleRate::Sps1600 => 625,
                SampleRate::Sps2400 => 417,
                SampleRate::Sps3300 => 303,
                SampleRate::Sps860 if self.legacy_860 => LEGACY_12BIT_860_DELAY_US,
                SampleRate::Sps860 => 1163,
            },
            // Effective rates 8, 16, 32, 64, 128, 250, 475 and 860 SPS.
            Family::Bits16 => match rate {
                SampleRate::Sps128 => 125_000,
                SampleRate::Sps250 => 62_500,
                SampleRate::Sps490 => 31_250,
                SampleRate::Sps920 => 15_625,
                SampleRate::Sps1600 => 7812,
                SampleRate::Sps2400 => 4000,
                SampleRate::Sps3300 => 2105,
                SampleRate::Sps860 => 1163,
            },
        }
    }

    pub fn conversion_delay(&self, family: Family, rate: SampleRate) -> Duration {
        Duration::from_micros(u64::from(self.base_micros(family, rate) + SAFETY_MARGIN_US))
    }
}

/// How a conversion call waits for the chip to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionWait {
    /// Sleep the conversion delay, then read once.
    FixedDelay,
    /// Sleep the conversion delay, then re-read the config register every
    /// `interval` until the OS bit reports idle, at most `max_polls` times.
    /// A chip found in continuous mode is not polled further.
    Poll { interval: Duration, max_polls: u32 },
}

impl Default for CompletionWait {
    fn default() -> Self {
        CompletionWait::Poll {
            interval: Duration::from_millis(10),
            max_polls: 10,
        }
    }
}
