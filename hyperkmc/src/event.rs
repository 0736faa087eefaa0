//! Kinetic events: the tagged description of every microscopic transition
//! the scheduler can execute.

use crate::geometry::Point;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Carrier class an event acts on.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Particle {
    /// A free electron occupying a LUMO.
    Electron,
    /// A free hole occupying a HOMO.
    Hole,
    /// A bound electron-hole pair.
    Exciton,
}

/// What happens when an event fires.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum EventKind {
    /// A charge hops to a neighbouring site.
    Move,
    /// A coexisting electron and hole bind into an exciton.
    Bound,
    /// The exciton spin flips (intersystem crossing, either direction).
    Isc,
    /// The exciton transfers resonantly to a distant fluorophore.
    Forster,
    /// The exciton recombines, radiatively or not.
    Decay,
    /// A charge is absorbed by the opposite electrode.
    Capture,
}

/// A scheduled microscopic transition.
///
/// `tau` is the waiting time relative to the shared lattice clock; the
/// scheduler subtracts the executed event's waiting time from every survivor
/// after each step. `seq` records insertion order and breaks ties between
/// equal waiting times, which keeps the selection stable and replayable.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Event {
    /// Site the transition starts from.
    pub source: Point,
    /// Site the transition ends on; equal to `source` for on-site events.
    pub target: Point,
    /// Waiting time until the event fires [s].
    pub tau: f64,
    /// The transition variant.
    pub kind: EventKind,
    /// The carrier class involved.
    pub particle: Particle,
    /// Insertion-order tie-breaker.
    pub seq: u64,
}

impl Event {
    /// Constructor.
    #[must_use]
    pub const fn new(
        source: Point,
        target: Point,
        tau: f64,
        kind: EventKind,
        particle: Particle,
        seq: u64,
    ) -> Self {
        Self {
            source,
            target,
            tau,
            kind,
            particle,
            seq,
        }
    }

    /// True when the two events describe the same microscopic action.
    ///
    /// Events collide when they share kind and particle and both endpoints;
    /// moves already collide when they share either endpoint, because two
    /// hops of the same carrier class cannot leave from or arrive at a common
    /// site.
    #[must_use]
    pub fn equivalent(&self, other: &Self) -> bool {
        if self.kind != other.kind || self.particle != other.particle {
            return false;
        }
        if self.kind == EventKind::Move {
            self.source == other.source || self.target == other.target
        } else {
            self.source == other.source && self.target == other.target
        }
    }

    /// True when either endpoint coincides with `site`.
    #[must_use]
    pub fn touches(&self, site: Point) -> bool {
        self.source == site || self.target == site
    }

    /// Scheduling order: ascending waiting time, ties broken by insertion
    /// order.
    #[must_use]
    pub fn earlier_than(&self, other: &Self) -> bool {
        match self.tau.total_cmp(&other.tau) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => self.seq < other.seq,
        }
    }
}
