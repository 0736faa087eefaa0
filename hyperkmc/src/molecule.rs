//! Site-resolved molecule model: variants, Gaussian-sampled energy levels
//! and mutable occupancy.

use crate::geometry::Point;
use crate::random::LatticeRng;
use serde::{Deserialize, Serialize};

/// Spin character of a bound electron-hole pair.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Spin {
    /// Spin-antisymmetric pair; the only emissive channel.
    Singlet,
    /// Spin-symmetric pair, formed with probability 3/4.
    Triplet,
}

impl Spin {
    /// The opposite spin state.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Singlet => Self::Triplet,
            Self::Triplet => Self::Singlet,
        }
    }

    /// Draws the spin of a freshly bound pair: singlet with probability 1/4.
    pub fn draw(rng: &mut LatticeRng) -> Self {
        if rng.uniform() <= 0.25 {
            Self::Singlet
        } else {
            Self::Triplet
        }
    }
}

/// Chemical variant of a site.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum MoleculeKind {
    /// Wide-gap transport material (DPEPO); never emits.
    Host,
    /// Thermally activated delayed fluorescence sensitiser (ACRSA).
    Tadf,
    /// Terminal fluorescent emitter (TBPe).
    Fluorophore,
}

impl MoleculeKind {
    /// Mean energy levels of the variant [eV].
    ///
    /// The HOMO is carried positive, treating holes as positive particles;
    /// the LUMO is negative.
    #[must_use]
    pub const fn means(self) -> Energies {
        match self {
            Self::Host => Energies {
                homo: 6.0,
                lumo: -2.0,
                s1: 3.50,
                t1: 3.00,
            },
            Self::Tadf => Energies {
                homo: 5.8,
                lumo: -2.6,
                s1: 2.55,
                t1: 2.52,
            },
            Self::Fluorophore => Energies {
                homo: 5.25,
                lumo: -2.7,
                s1: 2.69,
                t1: 1.43,
            },
        }
    }

    /// Whether singlet decay on this variant emits a visible photon.
    #[must_use]
    pub const fn emits_on_singlet(self) -> bool {
        matches!(self, Self::Fluorophore)
    }
}

/// Gaussian-sampled energy levels of one site [eV].
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Energies {
    /// Highest occupied molecular orbital, carried positive.
    pub homo: f64,
    /// Lowest unoccupied molecular orbital, negative.
    pub lumo: f64,
    /// First excited singlet level.
    pub s1: f64,
    /// First excited triplet level.
    pub t1: f64,
}

impl Energies {
    /// Samples a level set around the variant means with disorder `sigma`.
    pub fn sample(kind: MoleculeKind, sigma: f64, rng: &mut LatticeRng) -> Self {
        let means = kind.means();
        Self {
            homo: rng.gauss(means.homo, sigma),
            lumo: rng.gauss(means.lumo, sigma),
            s1: rng.gauss(means.s1, sigma),
            t1: rng.gauss(means.t1, sigma),
        }
    }

    /// Singlet-triplet gap ΔE_ST = S1 − T1 [eV].
    #[must_use]
    pub fn exchange_gap(&self) -> f64 {
        self.s1 - self.t1
    }
}

/// One site of the device stack.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Molecule {
    kind: MoleculeKind,
    position: Point,
    neighbourhood: Vec<Point>,
    energies: Energies,
    electron: bool,
    hole: bool,
    exciton: Option<Spin>,
}

impl Molecule {
    /// Instantiates an unoccupied molecule with freshly sampled energies.
    pub fn new(
        kind: MoleculeKind,
        position: Point,
        neighbourhood: Vec<Point>,
        sigma: f64,
        rng: &mut LatticeRng,
    ) -> Self {
        Self {
            kind,
            position,
            neighbourhood,
            energies: Energies::sample(kind, sigma, rng),
            electron: false,
            hole: false,
            exciton: None,
        }
    }

    /// Chemical variant of the site.
    #[must_use]
    pub const fn kind(&self) -> MoleculeKind {
        self.kind
    }

    /// Position of the site.
    #[must_use]
    pub const fn position(&self) -> Point {
        self.position
    }

    /// Precomputed transfer neighbourhood.
    #[must_use]
    pub fn neighbourhood(&self) -> &[Point] {
        &self.neighbourhood
    }

    /// Sampled energy levels.
    #[must_use]
    pub const fn energies(&self) -> &Energies {
        &self.energies
    }

    /// True when a free electron sits on the site.
    #[must_use]
    pub const fn has_electron(&self) -> bool {
        self.electron
    }

    /// True when a free hole sits on the site.
    #[must_use]
    pub const fn has_hole(&self) -> bool {
        self.hole
    }

    /// Spin of the resident exciton, if any.
    #[must_use]
    pub const fn exciton(&self) -> Option<Spin> {
        self.exciton
    }

    /// True when neither carrier nor exciton occupies the site.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.electron && !self.hole && self.exciton.is_none()
    }

    /// True when a free electron and a free hole coexist on the site, about
    /// to bind.
    #[must_use]
    pub const fn holds_pair(&self) -> bool {
        self.electron && self.hole
    }

    pub(crate) fn set_electron(&mut self, present: bool) {
        debug_assert!(self.exciton.is_none());
        self.electron = present;
    }

    pub(crate) fn set_hole(&mut self, present: bool) {
        debug_assert!(self.exciton.is_none());
        self.hole = present;
    }

    /// Binds the resident pair into an exciton; both free-carrier flags are
    /// cleared.
    pub(crate) fn bind_exciton(&mut self, spin: Spin) {
        debug_assert!(self.holds_pair());
        self.electron = false;
        self.hole = false;
        self.exciton = Some(spin);
    }

    /// Removes the exciton, returning the site to all-unoccupied.
    pub(crate) fn clear_exciton(&mut self) -> Option<Spin> {
        self.exciton.take()
    }

    /// Flips the exciton spin (intersystem crossing in either direction).
    pub(crate) fn cross_spin(&mut self) {
        if let Some(spin) = self.exciton {
            self.exciton = Some(spin.flipped());
        }
    }
}
