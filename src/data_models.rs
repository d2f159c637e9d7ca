use serde::{Deserialize, Serialize};

use crate::device::Variant;
use crate::registers::Gain;

/// One input of one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputReading {
    /// "ain0".."ain3", "diff_0_1" or "diff_2_3"
    pub input: String,
    /// Decoded counts (unsigned for single-ended inputs, signed for differential)
    pub raw: i32,
    #[serde(serialize_with = "serialize_volts")]
    pub volts: f32,
}

// A full scan of one chip, published as the JSON snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    #[serde(serialize_with = "serialize_address", deserialize_with = "deserialize_address")]
    pub address: u8,
    pub variant: Variant,
    pub gain: Gain,
    /// Effective conversion rate, SPS
    pub sample_rate: u16,
    pub readings: Vec<InputReading>,
    /// Unix time of the end of the scan, milliseconds
    pub timestamp_ms: u64,
}

impl DeviceSnapshot {
    /// Address as used in topic names, e.g. "0x48".
    pub fn address_label(&self) -> String {
        format!("0x{:02x}", self.address)
    }
}

// 电压保留到微伏
fn serialize_volts<S>(value: &f32, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f32((value * 1_000_000.0).round() / 1_000_000.0)
}

fn serialize_address<S>(address: &u8, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format!("0x{:02x}", address))
}

fn deserialize_address<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    u8::from_str_radix(s.trim_start_matches("0x"), 16).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> DeviceSnapshot {
        DeviceSnapshot {
            address: 0x49,
            variant: Variant::Tla2024,
            gain: Gain::TwoThirds,
            sample_rate: 1600,
            readings: vec![InputReading {
                input: "diff_0_1".to_string(),
                raw: -12,
                volts: -0.036,
            }],
            timestamp_ms: 1_700_000_000_000,
        }
    }

    #[test]
    fn snapshot_json_uses_hex_address_and_short_names() {
        let json = serde_json::to_value(snapshot()).unwrap();
        assert_eq!(json["address"], "0x49");
        assert_eq!(json["variant"], "tla2024");
        assert_eq!(json["gain"], "2/3");
        assert_eq!(json["sample_rate"], 1600);
        assert_eq!(json["readings"][0]["raw"], -12);
    }

    #[test]
    fn snapshot_json_parses_back() {
        let text = serde_json::to_string(&snapshot()).unwrap();
        let back: DeviceSnapshot = serde_json::from_str(&text).unwrap();
        assert_eq!(back.address, 0x49);
        assert_eq!(back.readings[0].input, "diff_0_1");
    }
}
