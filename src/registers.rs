//! ADS1x15 / TLA2024 register map.
//!
//! All four chips share the same pointer register layout and the same
//! configuration word; they differ only in resolution and in what the
//! data-rate bits mean (see [`crate::timing`]).

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use binrw::{BinRead, BinWrite};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::timing::Family;

/// Register pointer addresses
#[allow(dead_code)]
pub mod pointer {
    /// Conversion result register
    pub const CONVERSION: u8 = 0x00;
    /// Configuration register
    pub const CONFIG: u8 = 0x01;
    /// Comparator low threshold
    pub const LO_THRESH: u8 = 0x02;
    /// Comparator high threshold
    pub const HI_THRESH: u8 = 0x03;
}

bitflags! {
    /// Configuration register (0x01)
    ///
    /// The multi-bit fields (MUX, PGA, DR, COMP_QUE) are declared as masks so
    /// that `from_bits_truncate` keeps every defined bit.
    pub struct ConfigWord: u16 {
        /// Write: start a single conversion. Read: 1 = idle, 0 = converting.
        const OS = 0x8000;
        const MUX = 0x7000;
        const PGA = 0x0E00;
        /// Single-shot / power-down mode. Cleared = continuous conversion.
        const MODE_SINGLE = 0x0100;
        const DR = 0x00E0;
        const COMP_WINDOW = 0x0010;
        const COMP_ACTIVE_HIGH = 0x0008;
        const COMP_LATCH = 0x0004;
        /// COMP_QUE = 11, comparator disabled. 00 asserts after one conversion.
        const COMP_QUE_DISABLE = 0x0003;
    }
}

impl ConfigWord {
    /// Word for a one-shot conversion with the comparator disabled,
    /// non-latching, active-low, traditional mode.
    pub fn single_shot(mux: Mux, gain: Gain, rate: SampleRate) -> Self {
        Self::COMP_QUE_DISABLE | Self::MODE_SINGLE | Self::OS | Self::fields(mux, gain, rate)
    }

    /// Word arming the comparator: assert after one conversion, latching,
    /// active-low, traditional mode, continuous conversion.
    pub fn comparator(mux: Mux, gain: Gain, rate: SampleRate) -> Self {
        Self::COMP_LATCH | Self::fields(mux, gain, rate)
    }

    fn fields(mux: Mux, gain: Gain, rate: SampleRate) -> Self {
        Self::from_bits_truncate(mux.code() | gain.code() | rate.code())
    }

    pub fn mux(self) -> Option<Mux> {
        Mux::from_code((self & Self::MUX).bits())
    }

    /// True once the chip reports no conversion in progress.
    pub fn is_idle(self) -> bool {
        self.contains(Self::OS)
    }
}

/// Input multiplexer selection (MUX, bits 14:12)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mux {
    /// AIN0 positive, AIN1 negative
    Diff01,
    /// AIN0 positive, AIN3 negative
    Diff03,
    /// AIN1 positive, AIN3 negative
    Diff13,
    /// AIN2 positive, AIN3 negative
    Diff23,
    Single0,
    Single1,
    Single2,
    Single3,
}

impl Mux {
    pub const fn code(self) -> u16 {
        match self {
            Mux::Diff01 => 0x0000,
            Mux::Diff03 => 0x1000,
            Mux::Diff13 => 0x2000,
            Mux::Diff23 => 0x3000,
            Mux::Single0 => 0x4000,
            Mux::Single1 => 0x5000,
            Mux::Single2 => 0x6000,
            Mux::Single3 => 0x7000,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0x0000 => Some(Mux::Diff01),
            0x1000 => Some(Mux::Diff03),
            0x2000 => Some(Mux::Diff13),
            0x3000 => Some(Mux::Diff23),
            0x4000 => Some(Mux::Single0),
            0x5000 => Some(Mux::Single1),
            0x6000 => Some(Mux::Single2),
            0x7000 => Some(Mux::Single3),
            _ => None,
        }
    }

    /// Single-ended input for `channel`, `None` above AIN3.
    pub fn single_ended(channel: u8) -> Option<Self> {
        match channel {
            0 => Some(Mux::Single0),
            1 => Some(Mux::Single1),
            2 => Some(Mux::Single2),
            3 => Some(Mux::Single3),
            _ => None,
        }
    }
}

/// Programmable gain amplifier setting (PGA, bits 11:9)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gain {
    /// ±6.144 V
    #[serde(rename = "2/3")]
    TwoThirds,
    /// ±4.096 V
    #[serde(rename = "1")]
    One,
    /// ±2.048 V
    #[serde(rename = "2")]
    Two,
    /// ±1.024 V
    #[serde(rename = "4")]
    Four,
    /// ±0.512 V
    #[serde(rename = "8")]
    Eight,
    /// ±0.256 V
    #[serde(rename = "16")]
    Sixteen,
    /// ±0.256 V, PGA code 110
    #[serde(rename = "16b")]
    SixteenAlt,
    /// ±0.256 V, PGA code 111
    #[serde(rename = "16c")]
    SixteenAlt2,
}

impl Gain {
    pub const ALL: [Gain; 8] = [
        Gain::TwoThirds,
        Gain::One,
        Gain::Two,
        Gain::Four,
        Gain::Eight,
        Gain::Sixteen,
        Gain::SixteenAlt,
        Gain::SixteenAlt2,
    ];

    pub const fn code(self) -> u16 {
        match self {
            Gain::TwoThirds => 0x0000,
            Gain::One => 0x0200,
            Gain::Two => 0x0400,
            Gain::Four => 0x0600,
            Gain::Eight => 0x0800,
            Gain::Sixteen => 0x0A00,
            Gain::SixteenAlt => 0x0C00,
            Gain::SixteenAlt2 => 0x0E00,
        }
    }

    /// Positive full-scale input range in millivolts.
    pub const fn full_scale_millivolts(self) -> f32 {
        match self {
            Gain::TwoThirds => 6144.0,
            Gain::One => 4096.0,
            Gain::Two => 2048.0,
            Gain::Four => 1024.0,
            Gain::Eight => 512.0,
            Gain::Sixteen | Gain::SixteenAlt | Gain::SixteenAlt2 => 256.0,
        }
    }
}

impl fmt::Display for Gain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Gain::TwoThirds => "2/3",
            Gain::One => "1",
            Gain::Two => "2",
            Gain::Four => "4",
            Gain::Eight => "8",
            Gain::Sixteen => "16",
            Gain::SixteenAlt => "16b",
            Gain::SixteenAlt2 => "16c",
        };
        f.write_str(s)
    }
}

impl FromStr for Gain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gain::ALL
            .into_iter()
            .find(|g| g.to_string() == s.trim())
            .ok_or_else(|| "unknown gain, expected one of 2/3, 1, 2, 4, 8, 16, 16b, 16c".to_string())
    }
}

/// Data rate setting (DR, bits 7:5), named after the 12-bit family rates.
/// Use [`SampleRate::sps`] for the rate a given chip actually runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleRate {
    Sps128,
    Sps250,
    Sps490,
    Sps920,
    Sps1600,
    Sps2400,
    Sps3300,
    Sps860,
}

impl SampleRate {
    pub const ALL: [SampleRate; 8] = [
        SampleRate::Sps128,
        SampleRate::Sps250,
        SampleRate::Sps490,
        SampleRate::Sps920,
        SampleRate::Sps1600,
        SampleRate::Sps2400,
        SampleRate::Sps3300,
        SampleRate::Sps860,
    ];

    pub const fn code(self) -> u16 {
        match self {
            SampleRate::Sps128 => 0x0000,
            SampleRate::Sps250 => 0x0020,
            SampleRate::Sps490 => 0x0040,
            SampleRate::Sps920 => 0x0060,
            SampleRate::Sps1600 => 0x0080,
            SampleRate::Sps2400 => 0x00A0,
            SampleRate::Sps3300 => 0x00C0,
            SampleRate::Sps860 => 0x00E0,
        }
    }

    /// Effective rate for the chip family, in samples per second.
    pub const fn sps(self, family: Family) -> u16 {
        match family {
            Family::Bits12 => match self {
                SampleRate::Sps128 => 128,
                SampleRate::Sps250 => 250,
                SampleRate::Sps490 => 490,
                SampleRate::Sps920 => 920,
                SampleRate::Sps1600 => 1600,
                SampleRate::Sps2400 => 2400,
                SampleRate::Sps3300 => 3300,
                SampleRate::Sps860 => 860,
            },
            Family::Bits16 => match self {
                SampleRate::Sps128 => 8,
                SampleRate::Sps250 => 16,
                SampleRate::Sps490 => 32,
                SampleRate::Sps920 => 64,
                SampleRate::Sps1600 => 128,
                SampleRate::Sps2400 => 250,
                SampleRate::Sps3300 => 475,
                SampleRate::Sps860 => 860,
            },
        }
    }

    /// Data-rate code giving `sps` on the chip family, if it has one.
    pub fn from_sps(sps: u16, family: Family) -> Option<Self> {
        SampleRate::ALL.into_iter().find(|r| r.sps(family) == sps)
    }
}

/// Register write on the wire: pointer byte followed by the big-endian value.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWrite {
    pub pointer: u8,
    pub value: u16,
}

impl RegisterWrite {
    pub fn encode(&self) -> Result<[u8; 3], TransportError> {
        let mut buf = [0u8; 3];
        let mut writer = Cursor::new(&mut buf[..]);
        self.write_be(&mut writer)
            .map_err(|e| TransportError::Frame(e.to_string()))?;
        Ok(buf)
    }
}

/// Compose two bytes read back from a register, high byte first.
pub fn decode_register(bytes: [u8; 2]) -> Result<u16, TransportError> {
    let mut reader = Cursor::new(&bytes[..]);
    u16::read_be(&mut reader).map_err(|e| TransportError::Frame(e.to_string()))
}
