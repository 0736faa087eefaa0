//! Physical constants of the transport model.
//!
//! Energies are expressed in electron-volts, distances in nanometres, rates
//! in hertz and the temperature in kelvin. Nothing else in the engine is
//! process-global.

use std::f64::consts::PI;

/// Boltzmann constant [eV/K].
pub const BOLTZMANN: f64 = 8.617333262e-5;

/// Vacuum permittivity [e²/(eV·nm)].
pub const VACUUM_PERMITTIVITY: f64 = 55.26349406e-3;

/// Relative permittivity of the organic blend.
pub const RELATIVE_PERMITTIVITY: f64 = 3.0;

/// Screened electrostatic prefactor e²/(4π ε₀ ε_r) [eV·nm].
pub const ELECTROSTATIC: f64 =
    1.0 / (4.0 * PI * VACUUM_PERMITTIVITY * RELATIVE_PERMITTIVITY);

/// Device temperature [K].
pub const TEMPERATURE: f64 = 300.0;

/// Thermal energy k_B·T at the device temperature [eV].
pub const THERMAL_ENERGY: f64 = BOLTZMANN * TEMPERATURE;

/// Lattice constant, the distance between neighbouring sites [nm].
pub const LATTICE_CONSTANT: f64 = 1.0;

/// Attempt frequency for charge transfer between neighbouring sites [Hz].
pub const ATTEMPT_FREQUENCY: f64 = 1e15;

/// Inverse localization length γ of the tunnelling attenuation [1/nm].
pub const INVERSE_LOCALIZATION: f64 = 10.0;

/// Prompt fluorescence rate of the TADF sensitiser (ACRSA) [Hz].
pub const TADF_FLUORESCENCE_RATE: f64 = 4.58e6;

/// Phosphorescence rate of the TADF sensitiser (ACRSA) [Hz].
pub const TADF_PHOSPHORESCENCE_RATE: f64 = 4.19e6;

/// Spin-orbit-coupling prefactor for intersystem crossing [Hz].
pub const ISC_PREFACTOR: f64 = 1e8;

/// Spin-orbit-coupling prefactor for reverse intersystem crossing [Hz].
pub const RISC_PREFACTOR: f64 = 1e5;

/// Förster radius for singlet-to-singlet transfer (ACRSA → TBPe) [nm].
pub const FORSTER_RADIUS_SINGLET: f64 = 5.55;

/// Förster radius for triplet-to-singlet transfer (ACRSA → TBPe) [nm].
pub const FORSTER_RADIUS_TRIPLET: f64 = 4.75;

/// Default truncation radius of the Coulomb interaction [nm].
pub const DEFAULT_CUTOFF_RADIUS: f64 = 19.2;

/// Default energetic disorder σ of the Gaussian level sampling [eV].
pub const DEFAULT_DISORDER: f64 = 0.1;

/// Default vertical electric field E_z [eV/nm].
pub const DEFAULT_FIELD: f64 = 0.1;

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn electrostatic_prefactor() {
        // e²/(4π ε₀) = 1.44 eV·nm, screened by ε_r = 3
        assert_approx_eq!(f64, ELECTROSTATIC * RELATIVE_PERMITTIVITY, 1.44, epsilon = 1e-3);
    }

    #[test]
    fn thermal_energy_at_room_temperature() {
        assert_approx_eq!(f64, THERMAL_ENERGY, 0.02585, epsilon = 1e-4);
    }
}
