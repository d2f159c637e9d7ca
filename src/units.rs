use uom::si::electric_potential::millivolt;
use uom::si::f32::ElectricPotential;

use crate::device::Variant;
use crate::registers::Gain;

// 1 LSB = full scale / 2^(resolution - 1), results are two's complement.
pub fn lsb_millivolts(gain: Gain, variant: Variant) -> f32 {
    let counts = (1u32 << (variant.resolution_bits() - 1)) as f32;
    gain.full_scale_millivolts() / counts
}

// ADC counts to voltage
pub fn counts_to_potential(counts: i32, gain: Gain, variant: Variant) -> ElectricPotential {
    ElectricPotential::new::<millivolt>(counts as f32 * lsb_millivolts(gain, variant))
}
