//! Rate expressions of the kinetic model.
//!
//! These are pure functions of local quantities; the context-dependent parts
//! (energy differences, field work, Coulomb sums) are assembled by the
//! scheduler. Rates are in hertz, energies in electron-volts and distances
//! in nanometres.

use crate::constants::{
    ATTEMPT_FREQUENCY, ELECTROSTATIC, FORSTER_RADIUS_SINGLET, FORSTER_RADIUS_TRIPLET,
    INVERSE_LOCALIZATION, ISC_PREFACTOR, RISC_PREFACTOR, TADF_FLUORESCENCE_RATE,
    TADF_PHOSPHORESCENCE_RATE, THERMAL_ENERGY,
};
use crate::molecule::Spin;

/// Exponentially distributed waiting time for a process with rate `rate`,
/// drawn from a uniform `u` in (0, 1].
///
/// A vanishing (or negative, from extreme suppression) rate yields
/// `f64::INFINITY`: the event exists but is never selected.
#[must_use]
pub fn waiting_time(u: f64, rate: f64) -> f64 {
    debug_assert!(u > 0.0 && u <= 1.0);
    if rate <= 0.0 {
        f64::INFINITY
    } else {
        (-u.ln() / rate).max(0.0)
    }
}

/// Tunnelling-attenuated attempt rate for a charge hop over `distance`.
#[must_use]
pub fn hop_attempt_rate(distance: f64) -> f64 {
    ATTEMPT_FREQUENCY * (-2.0 * INVERSE_LOCALIZATION * distance).exp()
}

/// Applies the Boltzmann factor to an uphill total energy difference;
/// downhill hops proceed at the base rate.
#[must_use]
pub fn thermally_activated(base: f64, delta_energy: f64) -> f64 {
    if delta_energy >= 0.0 {
        base * (-delta_energy / THERMAL_ENERGY).exp()
    } else {
        base
    }
}

/// Shifted, truncated Coulomb pair potential at separation `distance`.
///
/// The shift makes the potential continuous at the cutoff, where it vanishes
/// together with every contribution from farther away.
#[must_use]
pub fn coulomb_potential(distance: f64, cutoff: f64) -> f64 {
    if distance >= cutoff {
        0.0
    } else {
        ELECTROSTATIC * (1.0 / distance - 1.0 / cutoff)
    }
}

/// Intersystem-crossing rate (singlet → triplet) for the exchange gap
/// `gap` = S1 − T1.
#[must_use]
pub fn isc_rate(gap: f64) -> f64 {
    ISC_PREFACTOR * (gap / THERMAL_ENERGY).exp()
}

/// Reverse intersystem-crossing rate (triplet → singlet) for the exchange
/// gap `gap` = S1 − T1.
#[must_use]
pub fn risc_rate(gap: f64) -> f64 {
    RISC_PREFACTOR * (-gap / THERMAL_ENERGY).exp()
}

/// Intrinsic recombination rate of a TADF exciton with spin `spin`.
#[must_use]
pub const fn tadf_decay_rate(spin: Spin) -> f64 {
    match spin {
        Spin::Singlet => TADF_FLUORESCENCE_RATE,
        Spin::Triplet => TADF_PHOSPHORESCENCE_RATE,
    }
}

/// Förster transfer rate from a sensitiser exciton with spin `spin` to an
/// acceptor at `distance`, following the 1/d⁶ law.
#[must_use]
pub fn forster_rate(spin: Spin, distance: f64) -> f64 {
    let (radiative, radius) = match spin {
        Spin::Singlet => (TADF_FLUORESCENCE_RATE, FORSTER_RADIUS_SINGLET),
        Spin::Triplet => (TADF_PHOSPHORESCENCE_RATE, FORSTER_RADIUS_TRIPLET),
    };
    radiative * (radius / distance).powi(6)
}
