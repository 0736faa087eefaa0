//! Error types of the engine.
//!
//! Validation failures surface at construction and are fatal to the
//! instance; runtime anomalies abort `operations` but leave the lattice
//! queryable with its partial counters.

use crate::event::Event;
use thiserror::Error;

/// Validation failures raised when constructing a lattice.
#[derive(Debug, Error)]
pub enum ConstructionError {
    /// Every dimension must hold at least one site.
    #[error("dimensions must be non-zero, got {x}x{y}x{z}")]
    EmptyDimensions {
        /// Requested extent along x.
        x: usize,
        /// Requested extent along y.
        y: usize,
        /// Requested extent along z.
        z: usize,
    },
    /// The stack needs two electrode planes and an interior.
    #[error("the stacking dimension must hold at least 3 planes, got {0}")]
    TooFewPlanes(usize),
    /// Proportions cannot be renormalised.
    #[error("proportions must be non-negative with a positive sum, got ({host}, {tadf}, {fluo})")]
    InvalidProportions {
        /// Requested host share.
        host: f64,
        /// Requested sensitiser share.
        tadf: f64,
        /// Requested fluorophore share.
        fluo: f64,
    },
    /// A requested species would round to zero molecules.
    #[error("the {species} share {share} reserves no molecule in {volume} sites")]
    SpeciesUnderflow {
        /// Variant that cannot be placed.
        species: &'static str,
        /// Normalised share of the variant.
        share: f64,
        /// Total number of sites.
        volume: usize,
    },
    /// More carriers were requested than the electrode plane has sites.
    #[error("{requested} carriers per polarity exceed the {capacity} sites of the electrode plane")]
    ElectrodeOverflow {
        /// Carriers requested per polarity.
        requested: usize,
        /// Sites available on one electrode plane.
        capacity: usize,
    },
    /// The transfer neighbourhood must fit inside the lattice.
    #[error("transfer radius {radius} must be smaller than the smallest dimension {limit}")]
    TransferRadiusTooLarge {
        /// Requested Manhattan-cube radius.
        radius: usize,
        /// Smallest lattice extent.
        limit: usize,
    },
    /// The energetic disorder must be a valid standard deviation.
    #[error("the energetic disorder must be finite and non-negative, got {0}")]
    InvalidDisorder(f64),
    /// The Coulomb truncation must keep at least the nearest neighbour.
    #[error("the cutoff radius must exceed the lattice constant, got {0} nm")]
    InvalidCutoff(f64),
}

/// Internal inconsistencies that abort a run.
///
/// Both variants carry the most recently executed events so the faulty
/// trajectory can be inspected.
#[derive(Debug, Error)]
pub enum RunError {
    /// The selected event would move the shared clock backwards.
    #[error("event {event:?} would advance the clock by {delta} s")]
    NegativeTimeStep {
        /// The offending event.
        event: Event,
        /// The negative time increment.
        delta: f64,
        /// Ring buffer of the events executed immediately before.
        recent: Vec<Event>,
    },
    /// A waiting time came out NaN, which indicates a corrupted rate.
    #[error("non-finite waiting time drawn for event {event:?}")]
    NonFiniteTimeStep {
        /// The offending event.
        event: Event,
        /// Ring buffer of the events executed immediately before.
        recent: Vec<Event>,
    },
}

/// Failures while writing or reading a lattice snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The underlying encoder or decoder failed.
    #[error(transparent)]
    Codec(#[from] bincode::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_values() {
        let error = ConstructionError::TooFewPlanes(2);
        assert_eq!(
            error.to_string(),
            "the stacking dimension must hold at least 3 planes, got 2"
        );
        let error = ConstructionError::ElectrodeOverflow {
            requested: 401,
            capacity: 400,
        };
        assert!(error.to_string().contains("401"));
        assert!(error.to_string().contains("400"));
    }
}
