//! Daemon configuration, read from the environment (and `.env`).

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::device::{DEFAULT_ADDRESS, DEFAULT_BUS, Variant};
use crate::error::ConfigError;
use crate::registers::{Gain, SampleRate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    pub topic_prefix: String,
}

/// Which inputs a device is scanned on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// AIN0..AIN3 against ground
    SingleEnded,
    /// AIN0-AIN1 and AIN2-AIN3
    Differential,
}

impl FromStr for ReadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" | "single_ended" | "se" => Ok(ReadMode::SingleEnded),
            "differential" | "diff" => Ok(ReadMode::Differential),
            other => Err(format!("unknown read mode {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub address: u8,
    pub variant: Variant,
    pub mode: ReadMode,
    /// Data-rate code for this chip's family
    pub sample_rate: SampleRate,
}

impl FromStr for DeviceConfig {
    type Err = ConfigError;

    /// `address:variant:mode`, e.g. `0x49:tla2024:differential`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let entry = || ConfigError::DeviceEntry(s.to_string());
        let mut parts = s.trim().split(':');
        let (Some(address), Some(variant), Some(mode), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(entry());
        };
        Ok(DeviceConfig {
            address: parse_address(address)?,
            variant: variant.parse().map_err(|_| entry())?,
            mode: mode.parse().map_err(|_| entry())?,
            // power-on DR code: 1600 SPS on 12-bit parts, 128 SPS on the ADS1115
            sample_rate: SampleRate::Sps1600,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdcConfig {
    pub bus: String,
    pub devices: Vec<DeviceConfig>,
    pub gain: Gain,
    pub poll_interval: Duration,
    pub legacy_860_delay: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub mqtt: MqttConfig,
    pub adc: AdcConfig,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let mqtt = MqttConfig {
            host: lookup("MQTT_BROKER_HOST").ok_or(ConfigError::Missing("MQTT_BROKER_HOST"))?,
            port: parse_var("MQTT_BROKER_PORT", &get("MQTT_BROKER_PORT", "1883"))?,
            username: lookup("MQTT_USERNAME"),
            password: lookup("MQTT_PASSWORD"),
            client_id: get("MQTT_CLIENT_ID", "ads1x15_daemon"),
            topic_prefix: get("MQTT_TOPIC_PREFIX", "ads1x15"),
        };

        let default_device = format!("0x{:02x}:ads1015:single", DEFAULT_ADDRESS);
        let mut devices = get("ADC_DEVICES", &default_device)
            .split(',')
            .filter(|entry| !entry.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<DeviceConfig>, _>>()?;
        if devices.is_empty() {
            return Err(ConfigError::DeviceEntry(String::new()));
        }
        if let Some(value) = lookup("ADC_SAMPLE_RATE") {
            let sps: u16 = parse_var("ADC_SAMPLE_RATE", &value)?;
            for device in &mut devices {
                device.sample_rate = SampleRate::from_sps(sps, device.variant.family()).ok_or_else(|| {
                    ConfigError::Invalid {
                        name: "ADC_SAMPLE_RATE",
                        value: value.clone(),
                        reason: format!("{} does not run at {} SPS", device.variant, sps),
                    }
                })?;
            }
        }

        let poll_ms: u64 = parse_var("ADC_POLL_INTERVAL_MS", &get("ADC_POLL_INTERVAL_MS", "1000"))?;
        let adc = AdcConfig {
            bus: get("ADC_I2C_BUS", DEFAULT_BUS),
            devices,
            gain: parse_var("ADC_GAIN", &get("ADC_GAIN", "2/3"))?,
            poll_interval: Duration::from_millis(poll_ms.max(1)),
            legacy_860_delay: parse_var("ADC_LEGACY_860_DELAY", &get("ADC_LEGACY_860_DELAY", "false"))?,
        };

        Ok(DaemonConfig { mqtt, adc })
    }
}

fn parse_var<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// `0x48`-style hex or plain decimal 7-bit address.
pub fn parse_address(s: &str) -> Result<u8, ConfigError> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse::<u16>(),
    };
    let address = parsed.map_err(|e| ConfigError::Invalid {
        name: "I2C address",
        value: s.to_string(),
        reason: e.to_string(),
    })?;
    if address > 0x7F {
        return Err(ConfigError::AddressRange(address));
    }
    Ok(address as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<DaemonConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DaemonConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_need_only_broker_host() {
        let config = load(&[("MQTT_BROKER_HOST", "broker.local")]).unwrap();
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.topic_prefix, "ads1x15");
        assert_eq!(config.adc.bus, "/dev/i2c-1");
        assert_eq!(
            config.adc.devices,
            vec![DeviceConfig {
                address: 0x48,
                variant: Variant::Ads1015,
                mode: ReadMode::SingleEnded,
                sample_rate: SampleRate::Sps1600,
            }]
        );
        assert_eq!(config.adc.gain, Gain::TwoThirds);
        assert_eq!(config.adc.poll_interval, Duration::from_secs(1));
        assert!(!config.adc.legacy_860_delay);
    }

    #[test]
    fn missing_broker_host_is_reported() {
        assert!(matches!(load(&[]), Err(ConfigError::Missing("MQTT_BROKER_HOST"))));
    }

    #[test]
    fn two_devices_on_one_bus() {
        let config = load(&[
            ("MQTT_BROKER_HOST", "broker.local"),
            ("ADC_DEVICES", "0x48:tla2024:single, 0x49:tla2024:differential"),
            ("ADC_GAIN", "4"),
            ("ADC_SAMPLE_RATE", "860"),
            ("ADC_LEGACY_860_DELAY", "true"),
        ])
        .unwrap();
        assert_eq!(config.adc.devices.len(), 2);
        assert_eq!(config.adc.devices[1].address, 0x49);
        assert_eq!(config.adc.devices[1].mode, ReadMode::Differential);
        assert_eq!(config.adc.gain, Gain::Four);
        assert!(config.adc.devices.iter().all(|d| d.sample_rate == SampleRate::Sps860));
        assert!(config.adc.legacy_860_delay);
    }

    #[test]
    fn sample_rate_is_resolved_per_chip_family() {
        let base = ("MQTT_BROKER_HOST", "broker.local");
        let config = load(&[base, ("ADC_DEVICES", "0x48:ads1115:single"), ("ADC_SAMPLE_RATE", "475")]).unwrap();
        assert_eq!(config.adc.devices[0].sample_rate, SampleRate::Sps3300);

        assert!(matches!(
            load(&[base, ("ADC_DEVICES", "0x48:ads1115:single"), ("ADC_SAMPLE_RATE", "3300")]),
            Err(ConfigError::Invalid {
                name: "ADC_SAMPLE_RATE",
                ..
            })
        ));
        assert!(matches!(
            load(&[
                base,
                ("ADC_DEVICES", "0x48:ads1015:single,0x49:ads1115:single"),
                ("ADC_SAMPLE_RATE", "1600"),
            ]),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn bad_values_are_rejected() {
        let base = ("MQTT_BROKER_HOST", "broker.local");
        assert!(matches!(
            load(&[base, ("ADC_GAIN", "3")]),
            Err(ConfigError::Invalid { name: "ADC_GAIN", .. })
        ));
        assert!(matches!(
            load(&[base, ("ADC_DEVICES", "0x48:ads1015")]),
            Err(ConfigError::DeviceEntry(_))
        ));
        assert!(matches!(
            load(&[base, ("ADC_DEVICES", "0x80:ads1015:single")]),
            Err(ConfigError::AddressRange(0x80))
        ));
    }

    #[test]
    fn addresses_accept_hex_and_decimal() {
        assert_eq!(parse_address("0x49").unwrap(), 0x49);
        assert_eq!(parse_address("72").unwrap(), 0x48);
        assert_eq!(parse_address("0x7f").unwrap(), 0x7F);
        assert!(parse_address("0x4g").is_err());
    }
}
