//! Device lattice: construction, carrier registries, counters and readouts.
//!
//! The lattice owns every piece of mutable simulation state, including its
//! private random stream, so independent instances are trivially
//! data-parallel. The First-Reaction drive itself lives in
//! [`crate::scheduler`].

use crate::constants::{DEFAULT_CUTOFF_RADIUS, DEFAULT_DISORDER, DEFAULT_FIELD};
use crate::convert::{f64_from_u64, f64_from_usize, usize_from_f64};
use crate::error::{ConstructionError, SnapshotError};
use crate::geometry::{neighbourhood, Dimensions, Point};
use crate::molecule::{Molecule, MoleculeKind};
use crate::random::LatticeRng;
use crate::scheduler::{Pools, RecentEvents};
use itertools::iproduct;
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Molecular composition of the blend, as shares of the total volume.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Proportions {
    /// Share of host molecules.
    pub host: f64,
    /// Share of TADF sensitiser molecules.
    pub tadf: f64,
    /// Share of fluorophore molecules.
    pub fluo: f64,
}

impl Proportions {
    /// Constructor.
    #[must_use]
    pub const fn new(host: f64, tadf: f64, fluo: f64) -> Self {
        Self { host, tadf, fluo }
    }

    /// Renormalises the mixture to unit sum.
    ///
    /// # Errors
    ///
    /// Fails when a share is negative or non-finite, or when the sum
    /// vanishes.
    pub fn normalised(self) -> Result<Self, ConstructionError> {
        let sum = self.host + self.tadf + self.fluo;
        let valid = |share: f64| share.is_finite() && share >= 0.0;
        if !valid(self.host) || !valid(self.tadf) || !valid(self.fluo) || sum <= 0.0 {
            return Err(ConstructionError::InvalidProportions {
                host: self.host,
                tadf: self.tadf,
                fluo: self.fluo,
            });
        }
        Ok(Self {
            host: self.host / sum,
            tadf: self.tadf / sum,
            fluo: self.fluo / sum,
        })
    }
}

/// Toggles for alternative sign and emission conventions of the transport
/// model, kept for regression comparisons. Both default to off.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Conventions {
    /// Negate the HOMO hop cost, treating holes as electron-like particles
    /// moving through negative orbital energies.
    pub legacy_hole_sign: bool,
    /// Count singlet decay on the sensitiser as visible emission instead of
    /// routing all sensitiser light through Förster transfer.
    pub tadf_direct_emission: bool,
}

/// Construction parameters of a [`Lattice`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LatticeParams {
    /// Lattice extent; z is the stacking axis.
    pub dimensions: Dimensions,
    /// Molecular composition, renormalised to unit sum at construction.
    pub proportions: Proportions,
    /// Vertical electric field E_z [eV/nm].
    pub field: f64,
    /// Carriers injected and kept in flight per polarity.
    pub charges: usize,
    /// Manhattan-cube radius of the transfer neighbourhood.
    pub transfer_radius: usize,
    /// Truncation radius of the Coulomb interaction [nm].
    pub cutoff_radius: f64,
    /// Energetic disorder σ of the Gaussian level sampling [eV].
    pub sigma: f64,
    /// Model convention toggles.
    pub conventions: Conventions,
    /// Seed of the per-instance random stream; `None` draws one from
    /// operating-system entropy.
    pub seed: Option<u64>,
}

impl Default for LatticeParams {
    fn default() -> Self {
        Self {
            dimensions: Dimensions::new(20, 20, 10),
            proportions: Proportions::new(0.84, 0.15, 0.01),
            field: DEFAULT_FIELD,
            charges: 4,
            transfer_radius: 1,
            cutoff_radius: DEFAULT_CUTOFF_RADIUS,
            sigma: DEFAULT_DISORDER,
            conventions: Conventions::default(),
            seed: None,
        }
    }
}

/// Recombination counts by the variant of the site the exciton formed on.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct RecombinationSites {
    /// Excitons formed on host molecules.
    pub host: u64,
    /// Excitons formed on sensitiser molecules.
    pub tadf: u64,
    /// Excitons formed on fluorophore molecules.
    pub fluorophore: u64,
}

impl RecombinationSites {
    pub(crate) fn record(&mut self, kind: MoleculeKind) {
        match kind {
            MoleculeKind::Host => self.host += 1,
            MoleculeKind::Tadf => self.tadf += 1,
            MoleculeKind::Fluorophore => self.fluorophore += 1,
        }
    }
}

/// The simulated device: a site-resolved molecular stack between two
/// electrodes.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Lattice {
    pub(crate) params: LatticeParams,
    pub(crate) grid: Array3<Molecule>,
    /// Positions of every fluorophore site, the Förster acceptor candidates.
    pub(crate) fluorophores: Vec<Point>,
    pub(crate) electrons: Vec<Point>,
    pub(crate) holes: Vec<Point>,
    pub(crate) excitons: Vec<Point>,
    pub(crate) pools: Pools,
    pub(crate) rng: LatticeRng,
    pub(crate) clock: f64,
    pub(crate) steps: u64,
    pub(crate) next_seq: u64,
    pub(crate) injections: u64,
    pub(crate) recombinations: u64,
    pub(crate) emissions: u64,
    pub(crate) captures: u64,
    pub(crate) tally: RecombinationSites,
    pub(crate) recent: RecentEvents,
    pub(crate) halted: bool,
}

impl Lattice {
    /// Builds a device from `params`: validates, reserves the host electrode
    /// layers, permutes the interior composition, samples every site's
    /// energies, injects the initial carriers and schedules their first
    /// events.
    ///
    /// # Errors
    ///
    /// Returns a [`ConstructionError`] when the parameters are out of range;
    /// see the variants for the full taxonomy.
    pub fn new(params: LatticeParams) -> Result<Self, ConstructionError> {
        validate(&params)?;
        let proportions = params.proportions.normalised()?;
        let params = LatticeParams {
            proportions,
            ..params
        };
        species_check(proportions, params.dimensions.volume())?;

        let mut rng = params
            .seed
            .map_or_else(LatticeRng::from_entropy, LatticeRng::seeded);
        let dimensions = params.dimensions;
        let reserve = host_layers_per_side(dimensions.z, proportions.host);
        let interior = dimensions.plane() * (dimensions.z - 2 * reserve);
        let (tadf_count, fluo_count) = interior_counts(proportions, dimensions.volume(), interior);

        let mut species = Vec::with_capacity(interior);
        species.resize(interior - tadf_count - fluo_count, MoleculeKind::Host);
        species.resize(interior - fluo_count, MoleculeKind::Tadf);
        species.resize(interior, MoleculeKind::Fluorophore);
        rng.shuffle(&mut species);

        let mut species = species.into_iter();
        let mut sites = Vec::with_capacity(dimensions.volume());
        let radius = i32::try_from(params.transfer_radius)
            // UNWRAP: the radius is validated against the dimensions
            .unwrap_or_else(|_| unreachable!());
        for x in 0..dimensions.x_i32() {
            for y in 0..dimensions.y_i32() {
                for z in 0..dimensions.z_i32() {
                    let position = Point::new(x, y, z);
                    let kind = if z < i32::try_from(reserve).unwrap_or_else(|_| unreachable!())
                        || z >= dimensions.z_i32()
                            - i32::try_from(reserve).unwrap_or_else(|_| unreachable!())
                    {
                        MoleculeKind::Host
                    } else {
                        // UNWRAP: the species counts sum to the interior size
                        species.next().unwrap_or_else(|| unreachable!())
                    };
                    sites.push(Molecule::new(
                        kind,
                        position,
                        neighbourhood(position, dimensions, radius),
                        params.sigma,
                        &mut rng,
                    ));
                }
            }
        }
        let grid = Array3::from_shape_vec((dimensions.x, dimensions.y, dimensions.z), sites)
            // UNWRAP: the site vector was filled in exactly this shape
            .unwrap_or_else(|_| unreachable!());
        let fluorophores = grid
            .iter()
            .filter(|site| site.kind() == MoleculeKind::Fluorophore)
            .map(Molecule::position)
            .collect();

        let mut lattice = Self {
            params,
            grid,
            fluorophores,
            electrons: Vec::new(),
            holes: Vec::new(),
            excitons: Vec::new(),
            pools: Pools::default(),
            rng,
            clock: 0.0,
            steps: 0,
            next_seq: 0,
            injections: 0,
            recombinations: 0,
            emissions: 0,
            captures: 0,
            tally: RecombinationSites::default(),
            recent: RecentEvents::default(),
            halted: false,
        };
        lattice.inject_initial();
        Ok(lattice)
    }

    /// Internal quantum efficiency in percent: emitted photons per injected
    /// electron-hole pair.
    #[must_use]
    pub fn iqe(&self) -> f64 {
        if self.injections == 0 {
            0.0
        } else {
            100.0 * 2.0 * f64_from_u64(self.emissions) / f64_from_u64(self.injections)
        }
    }

    /// Lattice extent.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.params.dimensions
    }

    /// Construction parameters, with proportions renormalised.
    #[must_use]
    pub const fn params(&self) -> &LatticeParams {
        &self.params
    }

    /// Positions of the free electrons, free holes and excitons, in registry
    /// order.
    #[must_use]
    pub fn particle_positions(&self) -> (&[Point], &[Point], &[Point]) {
        (&self.electrons, &self.holes, &self.excitons)
    }

    /// Elapsed simulated time [s].
    #[must_use]
    pub const fn clock(&self) -> f64 {
        self.clock
    }

    /// Number of executed events.
    #[must_use]
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// Carriers injected so far, initial filling and reinjections included.
    #[must_use]
    pub const fn injections(&self) -> u64 {
        self.injections
    }

    /// Excitons formed so far.
    #[must_use]
    pub const fn recombinations(&self) -> u64 {
        self.recombinations
    }

    /// Visible photons emitted so far.
    #[must_use]
    pub const fn emissions(&self) -> u64 {
        self.emissions
    }

    /// Carriers absorbed at their opposite electrode so far.
    #[must_use]
    pub const fn captures(&self) -> u64 {
        self.captures
    }

    /// Recombination counts by site variant.
    #[must_use]
    pub const fn recombination_sites(&self) -> RecombinationSites {
        self.tally
    }

    /// True once a runtime anomaly has put the scheduler in its terminal
    /// state.
    #[must_use]
    pub const fn halted(&self) -> bool {
        self.halted
    }

    /// Serialises the complete lattice state, random stream and outstanding
    /// events included, so a restored instance replays the identical event
    /// sequence.
    ///
    /// # Errors
    ///
    /// Fails when the writer or the encoder fails.
    pub fn write(&self, writer: impl Write) -> Result<(), SnapshotError> {
        Ok(bincode::serialize_into(writer, self)?)
    }

    /// Restores a lattice from a snapshot produced by [`Lattice::write`].
    ///
    /// # Errors
    ///
    /// Fails when the reader or the decoder fails.
    pub fn read(reader: impl Read) -> Result<Self, SnapshotError> {
        Ok(bincode::deserialize_from(reader)?)
    }

    /// The molecule at `position`.
    pub(crate) fn site(&self, position: Point) -> &Molecule {
        &self.grid[index(position)]
    }

    pub(crate) fn site_mut(&mut self, position: Point) -> &mut Molecule {
        &mut self.grid[index(position)]
    }

    pub(crate) fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Fills both electrode planes with the requested carriers, each at a
    /// distinct in-plane position drawn without replacement.
    fn inject_initial(&mut self) {
        let dimensions = self.params.dimensions;
        let plane: Vec<(i32, i32)> =
            iproduct!(0..dimensions.x_i32(), 0..dimensions.y_i32()).collect();
        let top = dimensions.z_i32() - 1;
        for (x, y) in self.rng.sample_without_replacement(&plane, self.params.charges) {
            let position = Point::new(x, y, top);
            self.site_mut(position).set_electron(true);
            self.electrons.push(position);
            self.injections += 1;
        }
        for (x, y) in self.rng.sample_without_replacement(&plane, self.params.charges) {
            let position = Point::new(x, y, 0);
            self.site_mut(position).set_hole(true);
            self.holes.push(position);
            self.injections += 1;
        }
        for position in self
            .electrons
            .iter()
            .chain(&self.holes)
            .copied()
            .collect::<Vec<_>>()
        {
            self.refresh_site(position);
        }
    }
}

pub(crate) fn index(position: Point) -> [usize; 3] {
    // UNWRAP: positions handed around internally always lie inside the grid
    let cast = |value: i32| usize::try_from(value).unwrap_or_else(|_| unreachable!());
    [cast(position.x), cast(position.y), cast(position.z)]
}

/// Removes one occurrence of `position`, preserving registry order.
pub(crate) fn registry_remove(registry: &mut Vec<Point>, position: Point) {
    if let Some(found) = registry.iter().position(|&entry| entry == position) {
        registry.remove(found);
    } else {
        debug_assert!(false, "carrier missing from its registry");
    }
}

fn validate(params: &LatticeParams) -> Result<(), ConstructionError> {
    let dimensions = params.dimensions;
    if dimensions.x == 0 || dimensions.y == 0 || dimensions.z == 0 {
        return Err(ConstructionError::EmptyDimensions {
            x: dimensions.x,
            y: dimensions.y,
            z: dimensions.z,
        });
    }
    if dimensions.z < 3 {
        return Err(ConstructionError::TooFewPlanes(dimensions.z));
    }
    if !params.sigma.is_finite() || params.sigma < 0.0 {
        return Err(ConstructionError::InvalidDisorder(params.sigma));
    }
    if !params.cutoff_radius.is_finite() || params.cutoff_radius <= 0.0 {
        return Err(ConstructionError::InvalidCutoff(params.cutoff_radius));
    }
    if params.transfer_radius >= dimensions.smallest() {
        return Err(ConstructionError::TransferRadiusTooLarge {
            radius: params.transfer_radius,
            limit: dimensions.smallest(),
        });
    }
    if params.charges > dimensions.plane() {
        return Err(ConstructionError::ElectrodeOverflow {
            requested: params.charges,
            capacity: dimensions.plane(),
        });
    }
    Ok(())
}

/// Every requested species must map to at least one molecule.
fn species_check(proportions: Proportions, volume: usize) -> Result<(), ConstructionError> {
    let shares = [
        ("host", proportions.host),
        ("tadf", proportions.tadf),
        ("fluorophore", proportions.fluo),
    ];
    for (species, share) in shares {
        if share > 0.0 && share * f64_from_usize(volume) < 1.0 {
            return Err(ConstructionError::SpeciesUnderflow {
                species,
                share,
                volume,
            });
        }
    }
    Ok(())
}

/// Host planes reserved at each electrode: half of `⌊Z·p_host⌋` rounded down
/// to an even number, but always at least the electrode plane itself and
/// never so many that the interior vanishes.
fn host_layers_per_side(z: usize, host_share: f64) -> usize {
    let mut reserved = usize_from_f64((f64_from_usize(z) * host_share).floor());
    reserved -= reserved % 2;
    (reserved / 2).clamp(1, (z - 1) / 2)
}

/// Sensitiser and fluorophore counts placed in the interior; the totals aim
/// at the composition of the full volume and are scaled down when the host
/// reserve leaves too little room.
fn interior_counts(proportions: Proportions, volume: usize, interior: usize) -> (usize, usize) {
    let mut tadf = usize_from_f64((proportions.tadf * f64_from_usize(volume)).round());
    let mut fluo = usize_from_f64((proportions.fluo * f64_from_usize(volume)).round());
    if tadf + fluo > interior {
        let scale = f64_from_usize(interior) / f64_from_usize(tadf + fluo);
        tadf = usize_from_f64((f64_from_usize(tadf) * scale).floor());
        fluo = usize_from_f64((f64_from_usize(fluo) * scale).floor());
    }
    (tadf, fluo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::MoleculeKind;

    fn seeded(params: LatticeParams) -> LatticeParams {
        LatticeParams {
            seed: Some(0xbead),
            ..params
        }
    }

    #[test]
    fn rejects_flat_stacks() {
        let params = seeded(LatticeParams {
            dimensions: Dimensions::new(5, 5, 2),
            ..LatticeParams::default()
        });
        assert!(matches!(
            Lattice::new(params),
            Err(ConstructionError::TooFewPlanes(2))
        ));
    }

    #[test]
    fn rejects_empty_dimensions() {
        let params = seeded(LatticeParams {
            dimensions: Dimensions::new(0, 5, 5),
            ..LatticeParams::default()
        });
        assert!(matches!(
            Lattice::new(params),
            Err(ConstructionError::EmptyDimensions { .. })
        ));
    }

    #[test]
    fn rejects_overfull_electrode_planes() {
        let params = seeded(LatticeParams {
            dimensions: Dimensions::new(3, 3, 5),
            charges: 10,
            ..LatticeParams::default()
        });
        assert!(matches!(
            Lattice::new(params),
            Err(ConstructionError::ElectrodeOverflow {
                requested: 10,
                capacity: 9
            })
        ));
    }

    #[test]
    fn rejects_oversized_transfer_radius() {
        let params = seeded(LatticeParams {
            dimensions: Dimensions::new(5, 5, 5),
            transfer_radius: 5,
            ..LatticeParams::default()
        });
        assert!(matches!(
            Lattice::new(params),
            Err(ConstructionError::TransferRadiusTooLarge { radius: 5, limit: 5 })
        ));
    }

    #[test]
    fn rejects_degenerate_proportions() {
        let params = seeded(LatticeParams {
            proportions: Proportions::new(0.0, 0.0, 0.0),
            ..LatticeParams::default()
        });
        assert!(matches!(
            Lattice::new(params),
            Err(ConstructionError::InvalidProportions { .. })
        ));
        let params = seeded(LatticeParams {
            proportions: Proportions::new(1.0, -0.1, 0.1),
            ..LatticeParams::default()
        });
        assert!(matches!(
            Lattice::new(params),
            Err(ConstructionError::InvalidProportions { .. })
        ));
    }

    #[test]
    fn rejects_a_share_rounding_to_nothing() {
        let params = seeded(LatticeParams {
            dimensions: Dimensions::new(3, 3, 3),
            proportions: Proportions::new(0.99, 0.0, 0.01),
            ..LatticeParams::default()
        });
        assert!(matches!(
            Lattice::new(params),
            Err(ConstructionError::SpeciesUnderflow {
                species: "fluorophore",
                ..
            })
        ));
    }

    #[test]
    fn proportions_are_renormalised() {
        let normalised = Proportions::new(2.0, 1.0, 1.0).normalised().unwrap();
        assert!((normalised.host - 0.5).abs() < 1e-12);
        assert!((normalised.tadf - 0.25).abs() < 1e-12);
        assert!((normalised.fluo - 0.25).abs() < 1e-12);
    }

    #[test]
    fn electrode_planes_are_pure_host() {
        let lattice = Lattice::new(seeded(LatticeParams {
            dimensions: Dimensions::new(6, 6, 5),
            proportions: Proportions::new(0.0, 0.5, 0.5),
            ..LatticeParams::default()
        }))
        .unwrap();
        let top = lattice.dimensions().z_i32() - 1;
        for x in 0..6 {
            for y in 0..6 {
                assert_eq!(lattice.site(Point::new(x, y, 0)).kind(), MoleculeKind::Host);
                assert_eq!(lattice.site(Point::new(x, y, top)).kind(), MoleculeKind::Host);
            }
        }
    }

    #[test]
    fn interior_respects_the_composition() {
        let lattice = Lattice::new(seeded(LatticeParams {
            dimensions: Dimensions::new(10, 10, 5),
            proportions: Proportions::new(0.84, 0.15, 0.01),
            ..LatticeParams::default()
        }))
        .unwrap();
        let mut tadf = 0;
        let mut fluo = 0;
        for site in &lattice.grid {
            match site.kind() {
                MoleculeKind::Tadf => tadf += 1,
                MoleculeKind::Fluorophore => fluo += 1,
                MoleculeKind::Host => {}
            }
        }
        assert_eq!(tadf, 75);
        assert_eq!(fluo, 5);
        assert_eq!(lattice.fluorophores.len(), 5);
    }

    #[test]
    fn injection_fills_distinct_interface_sites() {
        let lattice = Lattice::new(seeded(LatticeParams {
            dimensions: Dimensions::new(4, 4, 4),
            proportions: Proportions::new(1.0, 0.0, 0.0),
            charges: 16,
            ..LatticeParams::default()
        }))
        .unwrap();
        let (electrons, holes, excitons) = lattice.particle_positions();
        assert_eq!(electrons.len(), 16);
        assert_eq!(holes.len(), 16);
        assert!(excitons.is_empty());
        assert!(electrons.iter().all(|p| p.z == 3));
        assert!(holes.iter().all(|p| p.z == 0));
        let mut unique: Vec<Point> = electrons.to_vec();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 16);
        assert_eq!(lattice.injections(), 32);
        assert!((lattice.iqe() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn identical_seeds_build_identical_lattices() {
        let params = seeded(LatticeParams {
            dimensions: Dimensions::new(8, 8, 5),
            ..LatticeParams::default()
        });
        let a = Lattice::new(params.clone()).unwrap();
        let b = Lattice::new(params).unwrap();
        assert_eq!(a.electrons, b.electrons);
        assert_eq!(a.holes, b.holes);
        for (left, right) in a.grid.iter().zip(&b.grid) {
            assert_eq!(left.kind(), right.kind());
            assert_eq!(left.energies().homo.to_bits(), right.energies().homo.to_bits());
        }
    }

    #[test]
    fn host_reserve_keeps_an_interior() {
        assert_eq!(host_layers_per_side(3, 0.0), 1);
        assert_eq!(host_layers_per_side(3, 1.0), 1);
        assert_eq!(host_layers_per_side(10, 0.84), 4);
        assert_eq!(host_layers_per_side(5, 0.84), 2);
        assert_eq!(host_layers_per_side(4, 1.0), 1);
    }

    #[test]
    fn snapshot_roundtrip_preserves_the_state() {
        let lattice = Lattice::new(seeded(LatticeParams {
            dimensions: Dimensions::new(5, 5, 4),
            ..LatticeParams::default()
        }))
        .unwrap();
        let mut buffer = Vec::new();
        lattice.write(&mut buffer).unwrap();
        let restored = Lattice::read(buffer.as_slice()).unwrap();
        assert_eq!(lattice.electrons, restored.electrons);
        assert_eq!(lattice.holes, restored.holes);
        assert_eq!(lattice.injections(), restored.injections());
        assert_eq!(lattice.pools.len(), restored.pools.len());
        for (left, right) in lattice.grid.iter().zip(&restored.grid) {
            assert_eq!(left.kind(), right.kind());
            assert_eq!(left.energies().lumo.to_bits(), right.energies().lumo.to_bits());
        }
    }
}
