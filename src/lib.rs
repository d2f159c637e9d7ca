//! ADS1015 / TLA2024 / ADS1115 I2C ADC driver for Linux hosts, plus the
//! sampling daemon that publishes readings over MQTT.
//!
//! ```no_run
//! use ads1x15_daemon::device::{Ads1x15, Variant, DEFAULT_ADDRESS};
//!
//! let mut adc = Ads1x15::new("/dev/i2c-1", DEFAULT_ADDRESS, Variant::Ads1015);
//! let counts = adc.read_single_ended(0)?;
//! # Ok::<(), ads1x15_daemon::error::AdcError>(())
//! ```

pub mod config;
pub mod data_models;
pub mod device;
pub mod error;
pub mod events;
pub mod mqtt_handlers;
pub mod registers;
pub mod sampler;
pub mod timing;
pub mod transport;
pub mod units;
