//! ADS1015 / TLA2024 / ADS1115 conversion driver.
//!
//! One device type covers all three chips; the [`Variant`] carries what
//! differs between them (result shift, timing family, comparator support).
//! Every conversion is a fresh config write, a wait, and a read of the
//! conversion register. Nothing is cached on the chip side.

use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use uom::si::f32::ElectricPotential;

use crate::error::AdcError;
use crate::registers::{ConfigWord, Gain, Mux, SampleRate, pointer};
use crate::timing::{CompletionWait, DelayTable, Family};
use crate::transport::{I2cTransport, LinuxI2c, RegisterTransport};
use crate::units;

/// ADDR pin tied to GND
pub const DEFAULT_ADDRESS: u8 = 0x48;
/// ADDR pin tied to VDD
pub const SECONDARY_ADDRESS: u8 = 0x49;

pub const DEFAULT_BUS: &str = "/dev/i2c-1";

/// Supported chips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// 12-bit, with comparator
    Ads1015,
    /// 12-bit, no ALERT/RDY pin
    Tla2024,
    /// 16-bit
    Ads1115,
}

impl Variant {
    /// Right shift applied to the conversion register.
    pub const fn bit_shift(self) -> u8 {
        match self {
            Variant::Ads1015 | Variant::Tla2024 => 4,
            Variant::Ads1115 => 0,
        }
    }

    pub const fn family(self) -> Family {
        match self {
            Variant::Ads1015 | Variant::Tla2024 => Family::Bits12,
            Variant::Ads1115 => Family::Bits16,
        }
    }

    pub const fn resolution_bits(self) -> u8 {
        match self.family() {
            Family::Bits12 => 12,
            Family::Bits16 => 16,
        }
    }

    pub const fn supports_comparator(self) -> bool {
        matches!(self, Variant::Ads1015)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Variant::Ads1015 => "ADS1015",
            Variant::Tla2024 => "TLA2024",
            Variant::Ads1115 => "ADS1115",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ads1015" => Ok(Variant::Ads1015),
            "tla2024" => Ok(Variant::Tla2024),
            "ads1115" => Ok(Variant::Ads1115),
            other => Err(format!("unknown chip {:?}", other)),
        }
    }
}

/// Conversion register to unsigned sample.
pub const fn decode_unsigned(raw: u16, bit_shift: u8) -> u16 {
    raw >> bit_shift
}

/// Conversion register to signed sample.
///
/// 16-bit results are already two's complement. 12-bit results are
/// left-justified, so after the shift the sign sits in bit 11 and has to be
/// carried into the top nibble.
pub const fn decode_signed(raw: u16, bit_shift: u8) -> i16 {
    let mut res = raw >> bit_shift;
    if bit_shift != 0 && res > 0x07FF {
        res |= 0xF000;
    }
    res as i16
}

/// One ADC chip on one I2C bus.
#[derive(Debug)]
pub struct Ads1x15<T = LinuxI2c> {
    regs: RegisterTransport<T>,
    variant: Variant,
    bit_shift: u8,
    gain: Gain,
    sample_rate: SampleRate,
    delay_table: DelayTable,
    conversion_delay: Duration,
    wait: CompletionWait,
}

impl Ads1x15<LinuxI2c> {
    /// Chip at `address` on the i2c-dev node `bus`. The bus is not touched
    /// until the first conversion.
    pub fn new(bus: impl Into<String>, address: u8, variant: Variant) -> Self {
        Self::with_transport(LinuxI2c::new(), bus, address, variant)
    }
}

impl<T: I2cTransport> Ads1x15<T> {
    pub fn with_transport(transport: T, bus: impl Into<String>, address: u8, variant: Variant) -> Self {
        let gain = Gain::TwoThirds;
        let sample_rate = SampleRate::Sps1600;
        let delay_table = DelayTable::default();
        Self {
            regs: RegisterTransport::new(transport, bus, address),
            variant,
            bit_shift: variant.bit_shift(),
            gain,
            sample_rate,
            delay_table,
            conversion_delay: delay_table.conversion_delay(variant.family(), sample_rate),
            wait: CompletionWait::default(),
        }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn bit_shift(&self) -> u8 {
        self.bit_shift
    }

    pub fn address(&self) -> u8 {
        self.regs.address()
    }

    pub fn bus(&self) -> &str {
        self.regs.bus()
    }

    /// Point the handle at another bus device node.
    pub fn set_bus(&mut self, bus: impl Into<String>) {
        self.regs.set_bus(bus);
    }

    pub fn transport(&self) -> &T {
        self.regs.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.regs.transport_mut()
    }

    /// Takes effect on the next conversion.
    pub fn set_gain(&mut self, gain: Gain) {
        self.gain = gain;
    }

    pub fn gain(&self) -> Gain {
        self.gain
    }

    pub fn set_sample_rate(&mut self, rate: SampleRate) {
        self.sample_rate = rate;
        self.update_conversion_delay();
    }

    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    /// Rate the chip converts at with the current data-rate code.
    pub fn sample_rate_sps(&self) -> u16 {
        self.sample_rate.sps(self.variant.family())
    }

    pub fn set_delay_table(&mut self, table: DelayTable) {
        self.delay_table = table;
        self.update_conversion_delay();
    }

    pub fn conversion_delay(&self) -> Duration {
        self.conversion_delay
    }

    pub fn set_completion_wait(&mut self, wait: CompletionWait) {
        self.wait = wait;
    }

    pub fn completion_wait(&self) -> CompletionWait {
        self.wait
    }

    fn update_conversion_delay(&mut self) {
        self.conversion_delay = self
            .delay_table
            .conversion_delay(self.variant.family(), self.sample_rate);
    }

    /// Single-ended reading of AIN`channel`. Channels above 3 read as 0
    /// without touching the bus.
    pub fn read_single_ended(&mut self, channel: u8) -> Result<u16, AdcError> {
        let Some(mux) = Mux::single_ended(channel) else {
            debug!("{}@0x{:02x}: no channel {}", self.variant, self.address(), channel);
            return Ok(0);
        };
        let raw = self.convert(mux)?;
        Ok(decode_unsigned(raw, self.bit_shift))
    }

    /// AIN0 - AIN1
    pub fn read_differential_0_1(&mut self) -> Result<i16, AdcError> {
        let raw = self.convert(Mux::Diff01)?;
        Ok(decode_signed(raw, self.bit_shift))
    }

    /// AIN2 - AIN3
    pub fn read_differential_2_3(&mut self) -> Result<i16, AdcError> {
        let raw = self.convert(Mux::Diff23)?;
        Ok(decode_signed(raw, self.bit_shift))
    }

    /// Arm the comparator on AIN`channel` so ALERT/RDY asserts once a
    /// conversion exceeds `threshold`. Leaves the chip converting
    /// continuously; read [`Self::last_conversion_results`] to clear the
    /// latched alert.
    pub fn start_comparator_single_ended(&mut self, channel: u8, threshold: i16) -> Result<(), AdcError> {
        if !self.variant.supports_comparator() {
            return Err(AdcError::ComparatorUnsupported(self.variant.name()));
        }
        let Some(mux) = Mux::single_ended(channel) else {
            debug!("{}@0x{:02x}: no channel {}", self.variant, self.address(), channel);
            return Ok(());
        };

        let config = ConfigWord::comparator(mux, self.gain, self.sample_rate);
        self.regs
            .write_register(pointer::HI_THRESH, (threshold as u16) << self.bit_shift)?;
        self.regs.write_register(pointer::CONFIG, config.bits())?;
        Ok(())
    }

    /// Result of the last conversion, without starting a new one.
    pub fn last_conversion_results(&mut self) -> Result<i16, AdcError> {
        self.wait_for_conversion()?;
        let raw = self.regs.read_register(pointer::CONVERSION)?;
        Ok(decode_signed(raw, self.bit_shift))
    }

    /// Counts at the current gain to voltage.
    pub fn to_potential(&self, counts: i32) -> ElectricPotential {
        units::counts_to_potential(counts, self.gain, self.variant)
    }

    fn convert(&mut self, mux: Mux) -> Result<u16, AdcError> {
        let config = ConfigWord::single_shot(mux, self.gain, self.sample_rate);
        self.regs.write_register(pointer::CONFIG, config.bits())?;
        self.wait_for_conversion()?;
        Ok(self.regs.read_register(pointer::CONVERSION)?)
    }

    fn wait_for_conversion(&mut self) -> Result<(), AdcError> {
        thread::sleep(self.conversion_delay);

        let CompletionWait::Poll { interval, max_polls } = self.wait else {
            return Ok(());
        };
        let mut polls = 0;
        loop {
            let config = ConfigWord::from_bits_truncate(self.regs.read_register(pointer::CONFIG)?);
            // OS never reads idle in continuous mode (comparator armed).
            if config.is_idle() || !config.contains(ConfigWord::MODE_SINGLE) {
                return Ok(());
            }
            polls += 1;
            if polls >= max_polls {
                warn!(
                    "{}@0x{:02x}: still busy after {} polls, reading anyway",
                    self.variant,
                    self.address(),
                    polls
                );
                return Ok(());
            }
            thread::sleep(interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockI2c;
    use crate::transport::mock::Transaction;

    fn device(variant: Variant) -> Ads1x15<MockI2c> {
        Ads1x15::with_transport(MockI2c::new(), DEFAULT_BUS, DEFAULT_ADDRESS, variant)
    }

    #[test]
    fn bit_shift_follows_variant() {
        assert_eq!(device(Variant::Ads1015).bit_shift(), 4);
        assert_eq!(device(Variant::Tla2024).bit_shift(), 4);
        assert_eq!(device(Variant::Ads1115).bit_shift(), 0);
    }

    #[test]
    fn sixteen_bit_decode_is_plain_reinterpretation() {
        assert_eq!(decode_signed(0x8000, 0), -32768);
        assert_eq!(decode_signed(0x7FFF, 0), 32767);
        assert_eq!(decode_signed(0xFFFF, 0), -1);
        assert_eq!(decode_unsigned(0xABCD, 0), 0xABCD);
    }

    #[test]
    fn twelve_bit_decode_extends_sign() {
        assert_eq!(decode_signed(0x0FF0, 4), 255);
        assert_eq!(decode_signed(0xFFF0, 4), -1);
        assert_eq!(decode_signed(0x7FF0, 4), 2047);
        assert_eq!(decode_signed(0x8000, 4), -2048);
        assert_eq!(decode_unsigned(0xFFF0, 4), 0x0FFF);
    }

    #[test]
    fn defaults_match_power_on_driver_state() {
        let dev = device(Variant::Tla2024);
        assert_eq!(dev.gain(), Gain::TwoThirds);
        assert_eq!(dev.sample_rate(), SampleRate::Sps1600);
        assert_eq!(dev.conversion_delay(), Duration::from_micros(725));
        assert!(dev.transport().transactions().is_empty());
    }

    #[test]
    fn sample_rate_change_recomputes_delay() {
        let mut dev = device(Variant::Ads1115);
        dev.set_sample_rate(SampleRate::Sps860);
        assert_eq!(dev.conversion_delay(), Duration::from_micros(1263));

        let mut dev = device(Variant::Ads1015);
        dev.set_delay_table(DelayTable::legacy());
        dev.set_sample_rate(SampleRate::Sps860);
        assert_eq!(dev.conversion_delay(), Duration::from_micros(403));
    }

    #[test]
    fn gain_round_trips_without_io() {
        let mut dev = device(Variant::Ads1015);
        for gain in Gain::ALL {
            dev.set_gain(gain);
            assert_eq!(dev.gain(), gain);
        }
        assert!(dev.transport().transactions().is_empty());
    }

    #[test]
    fn single_ended_writes_config_then_reads_conversion() {
        let mut dev = device(Variant::Ads1015);
        dev.transport_mut().set_register(pointer::CONVERSION, 0x0FF0);

        assert_eq!(dev.read_single_ended(1).unwrap(), 0x00FF);
        let writes = dev.transport().writes();
        assert_eq!(writes[0], vec![0x01, 0xD1, 0x83]);
        assert_eq!(writes.last(), Some(&vec![pointer::CONVERSION]));
    }

    #[test]
    fn channel_four_is_silent_zero() {
        let mut dev = device(Variant::Ads1115);
        assert_eq!(dev.read_single_ended(4).unwrap(), 0);
        assert_eq!(dev.read_single_ended(200).unwrap(), 0);
        assert!(dev.transport().transactions().is_empty());
    }

    #[test]
    fn busy_chip_is_polled_until_idle() {
        let mut dev = device(Variant::Tla2024);
        dev.set_completion_wait(CompletionWait::Poll {
            interval: Duration::from_millis(1),
            max_polls: 10,
        });
        dev.transport_mut().set_busy_polls(2);
        dev.transport_mut().set_register(pointer::CONVERSION, 0x1230);

        assert_eq!(dev.read_single_ended(0).unwrap(), 0x0123);
        // two busy polls, one idle poll, one conversion read
        assert_eq!(dev.transport().read_count(), 4);
    }

    #[test]
    fn poll_gives_up_after_max_polls() {
        let mut dev = device(Variant::Tla2024);
        dev.set_completion_wait(CompletionWait::Poll {
            interval: Duration::from_millis(1),
            max_polls: 3,
        });
        dev.transport_mut().set_busy_polls(100);

        dev.read_differential_0_1().unwrap();
        assert_eq!(dev.transport().read_count(), 4);
    }

    #[test]
    fn fixed_delay_reads_once() {
        let mut dev = device(Variant::Ads1115);
        dev.set_completion_wait(CompletionWait::FixedDelay);
        dev.transport_mut().set_register(pointer::CONVERSION, 0x8000);

        assert_eq!(dev.read_differential_2_3().unwrap(), -32768);
        assert_eq!(dev.transport().read_count(), 1);
    }

    #[test]
    fn comparator_is_two_writes_no_reads() {
        let mut dev = device(Variant::Ads1015);
        dev.start_comparator_single_ended(2, 1000).unwrap();

        assert_eq!(dev.transport().read_count(), 0);
        let writes = dev.transport().writes();
        assert_eq!(writes.len(), 2);
        // 1000 << 4 = 0x3E80
        assert_eq!(writes[0], vec![pointer::HI_THRESH, 0x3E, 0x80]);
        assert_eq!(writes[1], vec![pointer::CONFIG, 0x60, 0x84]);
    }

    #[test]
    fn clearing_comparator_reads_config_once() {
        let mut dev = device(Variant::Ads1015);
        dev.start_comparator_single_ended(0, 100).unwrap();
        dev.transport_mut().clear_transactions();
        dev.transport_mut().set_register(pointer::CONVERSION, 0x1230);

        assert_eq!(dev.last_conversion_results().unwrap(), 0x0123);
        assert_eq!(
            dev.transport().writes(),
            vec![vec![pointer::CONFIG], vec![pointer::CONVERSION]]
        );
        assert_eq!(dev.transport().read_count(), 2);
    }

    #[test]
    fn sample_rate_sps_follows_family() {
        let mut dev = device(Variant::Ads1115);
        dev.set_sample_rate(SampleRate::Sps3300);
        assert_eq!(dev.sample_rate_sps(), 475);

        let mut dev = device(Variant::Tla2024);
        dev.set_sample_rate(SampleRate::Sps3300);
        assert_eq!(dev.sample_rate_sps(), 3300);
    }

    #[test]
    fn comparator_needs_ads1015() {
        let mut dev = device(Variant::Tla2024);
        let err = dev.start_comparator_single_ended(0, 100).unwrap_err();
        assert!(matches!(err, AdcError::ComparatorUnsupported("TLA2024")));
        assert!(dev.transport().transactions().is_empty());
    }

    #[test]
    fn last_conversion_does_not_write_config() {
        let mut dev = device(Variant::Ads1015);
        dev.set_completion_wait(CompletionWait::FixedDelay);
        dev.transport_mut().set_register(pointer::CONVERSION, 0xFFF0);

        assert_eq!(dev.last_conversion_results().unwrap(), -1);
        assert_eq!(dev.transport().writes(), vec![vec![pointer::CONVERSION]]);
    }

    #[test]
    fn set_bus_retargets_next_transaction() {
        let mut dev = device(Variant::Ads1115);
        dev.set_completion_wait(CompletionWait::FixedDelay);
        dev.set_bus("/dev/i2c-7");
        dev.read_differential_0_1().unwrap();

        assert_eq!(
            dev.transport().transactions()[0],
            Transaction::Open {
                bus: "/dev/i2c-7".to_string(),
                address: DEFAULT_ADDRESS
            }
        );
    }

    #[test]
    fn variant_parses_case_insensitively() {
        assert_eq!("ADS1115".parse::<Variant>(), Ok(Variant::Ads1115));
        assert_eq!("tla2024".parse::<Variant>(), Ok(Variant::Tla2024));
        assert!("ads1234".parse::<Variant>().is_err());
    }
}
