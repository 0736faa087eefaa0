//! First-Reaction scheduling: indexed event pools, minimum-τ selection,
//! transition execution and replenishment.
//!
//! Each carrier keeps exactly one outstanding event, its fastest candidate,
//! in a pool keyed by the carrier's current position. Obsolescence is then a
//! direct keyed update instead of a linear scan: when an event fires, the
//! occupants of its endpoints are regenerated, together with every
//! neighbouring carrier whose stored event touched those endpoints and every
//! blocked carrier that the transition may have unblocked.

use crate::constants::LATTICE_CONSTANT;
use crate::error::RunError;
use crate::event::{Event, EventKind, Particle};
use crate::geometry::{displacement, Point, Vector};
use crate::lattice::{registry_remove, Lattice};
use crate::molecule::{MoleculeKind, Spin};
use crate::rate;
use itertools::iproduct;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Default safety ceiling on executed events per drive.
pub const DEFAULT_STEP_CAP: u64 = 100_000_000;

const RECENT_CAPACITY: usize = 16;
const PROGRESS_INTERVAL: u64 = 1000;

/// Why a drive returned without an error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The cumulative recombination target was reached.
    TargetReached,
    /// No selectable event remained; the counters are partial.
    EventsExhausted,
    /// The safety step ceiling was reached first.
    StepCapReached,
}

/// One indexed pool per carrier class, keyed by the carrier's current
/// position and holding its single fastest candidate event.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub(crate) struct Pools {
    electrons: FxHashMap<Point, Event>,
    holes: FxHashMap<Point, Event>,
    excitons: FxHashMap<Point, Event>,
}

impl Pools {
    fn class_mut(&mut self, particle: Particle) -> &mut FxHashMap<Point, Event> {
        match particle {
            Particle::Electron => &mut self.electrons,
            Particle::Hole => &mut self.holes,
            Particle::Exciton => &mut self.excitons,
        }
    }

    fn insert(&mut self, event: Event) {
        self.class_mut(event.particle).insert(event.source, event);
    }

    fn remove_site(&mut self, site: Point) {
        self.electrons.remove(&site);
        self.holes.remove(&site);
        self.excitons.remove(&site);
    }

    fn contains_site(&self, site: Point) -> bool {
        self.electrons.contains_key(&site)
            || self.holes.contains_key(&site)
            || self.excitons.contains_key(&site)
    }

    fn entry(&self, site: Point, particle: Particle) -> Option<&Event> {
        match particle {
            Particle::Electron => self.electrons.get(&site),
            Particle::Hole => self.holes.get(&site),
            Particle::Exciton => self.excitons.get(&site),
        }
    }

    fn values(&self) -> impl Iterator<Item = &Event> {
        self.electrons
            .values()
            .chain(self.holes.values())
            .chain(self.excitons.values())
    }

    /// The next event to fire: minimum waiting time, ties broken by
    /// insertion order. Events with infinite waiting times are never
    /// selected.
    fn selectable(&self) -> Option<Event> {
        let mut best: Option<&Event> = None;
        for event in self.values() {
            if event.tau.is_infinite() {
                continue;
            }
            if best.map_or(true, |leader| event.earlier_than(leader)) {
                best = Some(event);
            }
        }
        best.cloned()
    }

    /// Moves the shared clock forward by rebasing every outstanding waiting
    /// time.
    fn shift(&mut self, tau: f64) {
        for event in self
            .electrons
            .values_mut()
            .chain(self.holes.values_mut())
            .chain(self.excitons.values_mut())
        {
            event.tau -= tau;
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.electrons.len() + self.holes.len() + self.excitons.len()
    }
}

/// Ring buffer of the most recently executed events, kept so anomalies can
/// report the trajectory that led to them.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub(crate) struct RecentEvents {
    entries: Vec<Event>,
    cursor: usize,
}

impl RecentEvents {
    fn push(&mut self, event: Event) {
        if self.entries.len() < RECENT_CAPACITY {
            self.entries.push(event);
        } else {
            self.entries[self.cursor] = event;
        }
        self.cursor = (self.cursor + 1) % RECENT_CAPACITY;
    }

    /// The buffered events, oldest first.
    fn snapshot(&self) -> Vec<Event> {
        if self.entries.len() < RECENT_CAPACITY {
            self.entries.clone()
        } else {
            let mut ordered = self.entries[self.cursor..].to_vec();
            ordered.extend_from_slice(&self.entries[..self.cursor]);
            ordered
        }
    }
}

impl Lattice {
    /// Executes events until the cumulative recombination count reaches
    /// `recombinations`, the pools drain, or the default step ceiling of
    /// [`DEFAULT_STEP_CAP`] is hit.
    ///
    /// # Errors
    ///
    /// Propagates a [`RunError`] on an internal inconsistency; the lattice
    /// stays queryable with its partial counters.
    pub fn operations(&mut self, recombinations: u64) -> Result<Outcome, RunError> {
        self.drive(recombinations, DEFAULT_STEP_CAP)
    }

    /// [`Lattice::operations`] with an explicit step ceiling.
    ///
    /// # Errors
    ///
    /// Propagates a [`RunError`] on an internal inconsistency.
    pub fn drive(&mut self, recombinations: u64, step_cap: u64) -> Result<Outcome, RunError> {
        if self.halted {
            return Ok(Outcome::EventsExhausted);
        }
        let mut executed = 0;
        while self.recombinations < recombinations {
            if executed >= step_cap {
                info!(steps = self.steps, "step ceiling reached");
                return Ok(Outcome::StepCapReached);
            }
            let Some(event) = self.pools.selectable() else {
                info!(
                    steps = self.steps,
                    recombinations = self.recombinations,
                    "no more events"
                );
                return Ok(Outcome::EventsExhausted);
            };
            self.step(event)?;
            executed += 1;
            if self.steps % PROGRESS_INTERVAL == 0 {
                debug!(
                    steps = self.steps,
                    clock = self.clock,
                    recombinations = self.recombinations,
                    outstanding = self.pools.len(),
                    "progress"
                );
            }
        }
        Ok(Outcome::TargetReached)
    }

    /// Number of outstanding events over all pools.
    #[must_use]
    pub fn outstanding_events(&self) -> usize {
        self.pools.len()
    }

    /// Executes one event: removes it, applies its transition, rebases the
    /// surviving waiting times and regenerates every affected candidate.
    fn step(&mut self, event: Event) -> Result<(), RunError> {
        if event.tau.is_nan() {
            self.halted = true;
            warn!("non-finite waiting time selected");
            return Err(RunError::NonFiniteTimeStep {
                event,
                recent: self.recent.snapshot(),
            });
        }
        if event.tau < 0.0 {
            self.halted = true;
            warn!(delta = event.tau, "negative time step selected");
            return Err(RunError::NegativeTimeStep {
                delta: event.tau,
                event,
                recent: self.recent.snapshot(),
            });
        }

        self.pools.class_mut(event.particle).remove(&event.source);
        let mut reinjected = Vec::new();
        self.apply(&event, &mut reinjected);
        // rebase the survivors before regenerating, so fresh draws are
        // relative to the advanced clock
        self.pools.shift(event.tau);
        self.clock += event.tau;
        self.steps += 1;
        self.refresh_after(&event, &reinjected);
        self.recent.push(event);
        Ok(())
    }

    /// Applies the state transition of `event`; reinjection sites are pushed
    /// onto `reinjected`.
    fn apply(&mut self, event: &Event, reinjected: &mut Vec<Point>) {
        match event.kind {
            EventKind::Move => {
                let (from, to) = (event.source, event.target);
                match event.particle {
                    Particle::Electron => {
                        registry_remove(&mut self.electrons, from);
                        self.electrons.push(to);
                        self.site_mut(from).set_electron(false);
                        self.site_mut(to).set_electron(true);
                    }
                    Particle::Hole => {
                        registry_remove(&mut self.holes, from);
                        self.holes.push(to);
                        self.site_mut(from).set_hole(false);
                        self.site_mut(to).set_hole(true);
                    }
                    Particle::Exciton => unreachable!(),
                }
            }
            EventKind::Bound => {
                let site = event.source;
                let spin = Spin::draw(&mut self.rng);
                self.site_mut(site).bind_exciton(spin);
                registry_remove(&mut self.electrons, site);
                registry_remove(&mut self.holes, site);
                self.excitons.push(site);
                self.recombinations += 1;
                let kind = self.site(site).kind();
                self.tally.record(kind);
            }
            EventKind::Isc => {
                self.site_mut(event.source).cross_spin();
            }
            EventKind::Forster => {
                let (from, to) = (event.source, event.target);
                let spin = self.site_mut(from).clear_exciton();
                debug_assert!(spin.is_some());
                registry_remove(&mut self.excitons, from);
                // the transferred singlet recombines on arrival
                debug_assert!(self.site(to).is_empty());
                if self.site(to).kind().emits_on_singlet() {
                    self.emissions += 1;
                }
                self.reinject_pair(reinjected);
            }
            EventKind::Decay => {
                let site = event.source;
                let kind = self.site(site).kind();
                let spin = self.site_mut(site).clear_exciton();
                registry_remove(&mut self.excitons, site);
                let emissive = match (kind, spin) {
                    (MoleculeKind::Fluorophore, Some(Spin::Singlet)) => true,
                    (MoleculeKind::Tadf, Some(Spin::Singlet)) => {
                        self.params.conventions.tadf_direct_emission
                    }
                    _ => false,
                };
                if emissive {
                    self.emissions += 1;
                }
                self.reinject_pair(reinjected);
            }
            EventKind::Capture => {
                let site = event.source;
                match event.particle {
                    Particle::Electron => {
                        self.site_mut(site).set_electron(false);
                        registry_remove(&mut self.electrons, site);
                        self.captures += 1;
                        self.reinject(Particle::Electron, reinjected);
                    }
                    Particle::Hole => {
                        self.site_mut(site).set_hole(false);
                        registry_remove(&mut self.holes, site);
                        self.captures += 1;
                        self.reinject(Particle::Hole, reinjected);
                    }
                    Particle::Exciton => unreachable!(),
                }
            }
        }
    }

    /// Reinjects one carrier at its origin electrode, keeping the in-flight
    /// population constant. Prefers unoccupied interface sites; falls back
    /// to sites holding only an opposite carrier.
    fn reinject(&mut self, particle: Particle, reinjected: &mut Vec<Point>) {
        let dimensions = self.params.dimensions;
        let z = match particle {
            Particle::Electron => dimensions.z_i32() - 1,
            Particle::Hole => 0,
            Particle::Exciton => unreachable!(),
        };
        let mut free = Vec::new();
        let mut fallback = Vec::new();
        for (x, y) in iproduct!(0..dimensions.x_i32(), 0..dimensions.y_i32()) {
            let position = Point::new(x, y, z);
            let site = self.site(position);
            if site.is_empty() {
                free.push(position);
            } else if site.exciton().is_none()
                && match particle {
                    Particle::Electron => !site.has_electron(),
                    Particle::Hole => !site.has_hole(),
                    Particle::Exciton => false,
                }
            {
                fallback.push(position);
            }
        }
        let pick = if free.is_empty() {
            self.rng.choose(&fallback)
        } else {
            self.rng.choose(&free)
        };
        let Some(position) = pick else {
            // saturated interface; the carrier is lost and the pools drain
            warn!(?particle, "no interface site available for reinjection");
            return;
        };
        match particle {
            Particle::Electron => {
                self.site_mut(position).set_electron(true);
                self.electrons.push(position);
            }
            Particle::Hole => {
                self.site_mut(position).set_hole(true);
                self.holes.push(position);
            }
            Particle::Exciton => unreachable!(),
        }
        self.injections += 1;
        reinjected.push(position);
    }

    /// Replaces a consumed exciton with a fresh electron-hole pair at the
    /// electrodes.
    fn reinject_pair(&mut self, reinjected: &mut Vec<Point>) {
        self.reinject(Particle::Electron, reinjected);
        self.reinject(Particle::Hole, reinjected);
    }

    /// Prunes events invalidated by the executed transition and regenerates
    /// a fresh candidate for every affected carrier.
    fn refresh_after(&mut self, event: &Event, reinjected: &[Point]) {
        let mut endpoints = vec![event.source];
        if event.target != event.source {
            endpoints.push(event.target);
        }
        for &site in reinjected {
            if !endpoints.contains(&site) {
                endpoints.push(site);
            }
        }

        let mut refresh = endpoints.clone();
        let mut add = |list: &mut Vec<Point>, site: Point| {
            if !list.contains(&site) {
                list.push(site);
            }
        };

        // Förster candidates can point far away, so stale exciton events are
        // found by scanning that pool; it only ever holds a handful of
        // entries.
        let mut stale: Vec<Point> = self
            .pools
            .excitons
            .values()
            .filter(|entry| endpoints.iter().any(|&site| entry.touches(site)))
            .map(|entry| entry.source)
            .collect();
        stale.sort_unstable();
        for site in stale {
            add(&mut refresh, site);
        }

        // charge events only ever touch a site and its transfer
        // neighbourhood
        for &endpoint in &endpoints {
            let neighbours = self.site(endpoint).neighbourhood().to_vec();
            for neighbour in neighbours {
                if self.needs_refresh(neighbour, &endpoints) {
                    add(&mut refresh, neighbour);
                }
            }
        }

        for site in refresh {
            self.refresh_site(site);
        }
    }

    /// A neighbouring site needs a fresh candidate when its stored event
    /// touched an executed endpoint, or when it holds a carrier with no
    /// event at all (it was blocked and may now be free to move).
    fn needs_refresh(&self, site: Point, endpoints: &[Point]) -> bool {
        let molecule = self.site(site);
        let particle = if molecule.exciton().is_some() || molecule.holds_pair() {
            Particle::Exciton
        } else if molecule.has_electron() {
            Particle::Electron
        } else if molecule.has_hole() {
            Particle::Hole
        } else {
            // unoccupied sites only need attention if a stray entry remains
            return self.pools.contains_site(site);
        };
        self.pools.entry(site, particle).map_or(true, |entry| {
            endpoints.iter().any(|&endpoint| entry.touches(endpoint))
        })
    }

    /// Recomputes the single fastest candidate event for whatever occupies
    /// `site`, replacing any previous entries keyed there.
    pub(crate) fn refresh_site(&mut self, site: Point) {
        self.pools.remove_site(site);
        let (exciton, pair, electron, hole) = {
            let molecule = self.site(site);
            (
                molecule.exciton(),
                molecule.holds_pair(),
                molecule.has_electron(),
                molecule.has_hole(),
            )
        };
        if let Some(spin) = exciton {
            let event = self.exciton_event(site, spin);
            self.pools.insert(event);
        } else if pair {
            let seq = self.next_seq();
            self.pools.insert(Event::new(
                site,
                site,
                0.0,
                EventKind::Bound,
                Particle::Exciton,
                seq,
            ));
        } else if electron {
            if site.z == 0 {
                let seq = self.next_seq();
                self.pools.insert(Event::new(
                    site,
                    site,
                    0.0,
                    EventKind::Capture,
                    Particle::Electron,
                    seq,
                ));
            } else if let Some(event) = self.best_move(site, Particle::Electron) {
                self.pools.insert(event);
            }
        } else if hole {
            if site.z == self.params.dimensions.z_i32() - 1 {
                let seq = self.next_seq();
                self.pools.insert(Event::new(
                    site,
                    site,
                    0.0,
                    EventKind::Capture,
                    Particle::Hole,
                    seq,
                ));
            } else if let Some(event) = self.best_move(site, Particle::Hole) {
                self.pools.insert(event);
            }
        }
    }

    /// The fastest hop of the carrier at `source` over its neighbourhood.
    /// Targets already holding a same-polarity carrier or an exciton are
    /// forbidden; a target holding the opposite carrier is allowed and binds
    /// right after arrival.
    fn best_move(&mut self, source: Point, particle: Particle) -> Option<Event> {
        let neighbours = self.site(source).neighbourhood().to_vec();
        let mut best: Option<(f64, Point)> = None;
        for target in neighbours {
            let blocked = {
                let site = self.site(target);
                site.exciton().is_some()
                    || match particle {
                        Particle::Electron => site.has_electron(),
                        Particle::Hole => site.has_hole(),
                        Particle::Exciton => true,
                    }
            };
            if blocked {
                continue;
            }
            let tau = self.hop_waiting_time(source, target, particle);
            if best.map_or(true, |(leader, _)| tau < leader) {
                best = Some((tau, target));
            }
        }
        best.map(|(tau, target)| {
            let seq = self.next_seq();
            Event::new(source, target, tau, EventKind::Move, particle, seq)
        })
    }

    /// Waiting time for one candidate hop, assembled from the orbital energy
    /// difference, the work of the vertical field and the Coulomb landscape
    /// of every other free carrier.
    fn hop_waiting_time(&mut self, source: Point, target: Point, particle: Particle) -> f64 {
        let delta_r =
            displacement(source, target, self.params.dimensions) * LATTICE_CONSTANT;
        let distance = delta_r.norm();
        let (initial, terminal) = {
            let from = self.site(source).energies();
            let to = self.site(target).energies();
            match particle {
                Particle::Electron => (from.lumo, to.lumo),
                Particle::Hole => (from.homo, to.homo),
                Particle::Exciton => unreachable!(),
            }
        };
        let mut delta = terminal - initial;
        if particle == Particle::Hole && self.params.conventions.legacy_hole_sign {
            delta = -delta;
        }
        let field = Vector::new(0.0, 0.0, self.params.field);
        delta += match particle {
            Particle::Electron => field.dot(delta_r),
            Particle::Hole => -field.dot(delta_r),
            Particle::Exciton => unreachable!(),
        };
        delta += self.coulomb_delta(source, target, particle);
        let hop_rate = rate::thermally_activated(rate::hop_attempt_rate(distance), delta);
        rate::waiting_time(self.rng.uniform(), hop_rate)
    }

    /// Change of the screened, truncated Coulomb energy when the carrier at
    /// `source` moves to `target`. Same-polarity carriers repel, opposite
    /// ones attract; excitons are neutral and never contribute. An opposite
    /// carrier sitting exactly on the target makes the move barrierless.
    fn coulomb_delta(&self, source: Point, target: Point, particle: Particle) -> f64 {
        let cutoff = self.params.cutoff_radius;
        let (same, opposite) = match particle {
            Particle::Electron => (&self.electrons, &self.holes),
            Particle::Hole => (&self.holes, &self.electrons),
            Particle::Exciton => unreachable!(),
        };
        let mut delta = 0.0;
        for &other in same {
            if other == source {
                continue;
            }
            debug_assert_ne!(other, target);
            delta += pair_shift(source, target, other, cutoff);
        }
        for &other in opposite {
            if other == target {
                return f64::NEG_INFINITY;
            }
            delta -= pair_shift(source, target, other, cutoff);
        }
        delta
    }

    /// The single fastest next transition of the exciton at `site`: the
    /// variant-specific decay, raced (on the sensitiser) against spin
    /// conversion and Förster transfer to every vacant fluorophore within
    /// the cutoff.
    fn exciton_event(&mut self, site: Point, spin: Spin) -> Event {
        let kind = self.site(site).kind();
        if kind != MoleculeKind::Tadf {
            // host and fluorophore excitons recombine on the spot
            let seq = self.next_seq();
            return Event::new(site, site, 0.0, EventKind::Decay, Particle::Exciton, seq);
        }

        let gap = self.site(site).energies().exchange_gap();
        let mut best_kind = EventKind::Decay;
        let mut best_target = site;
        let u = self.rng.uniform();
        let mut best_tau = rate::waiting_time(u, rate::tadf_decay_rate(spin));

        let conversion = match spin {
            Spin::Singlet => rate::isc_rate(gap),
            Spin::Triplet => rate::risc_rate(gap),
        };
        let tau = rate::waiting_time(self.rng.uniform(), conversion);
        if tau < best_tau {
            best_tau = tau;
            best_kind = EventKind::Isc;
        }

        let cutoff = self.params.cutoff_radius;
        for acceptor_index in 0..self.fluorophores.len() {
            let acceptor = self.fluorophores[acceptor_index];
            if !self.site(acceptor).is_empty() {
                continue;
            }
            let distance = (acceptor - site).norm() * LATTICE_CONSTANT;
            if distance >= cutoff {
                continue;
            }
            let tau = rate::waiting_time(self.rng.uniform(), rate::forster_rate(spin, distance));
            if tau < best_tau {
                best_tau = tau;
                best_kind = EventKind::Forster;
                best_target = acceptor;
            }
        }

        let seq = self.next_seq();
        Event::new(site, best_target, best_tau, best_kind, Particle::Exciton, seq)
    }
}

/// Contribution of one spectator carrier to the Coulomb energy change of a
/// move, with the shift cancelling between the two truncated terms.
fn pair_shift(source: Point, target: Point, other: Point, cutoff: f64) -> f64 {
    let before = (other - source).norm() * LATTICE_CONSTANT;
    let after = (other - target).norm() * LATTICE_CONSTANT;
    rate::coulomb_potential(after, cutoff) - rate::coulomb_potential(before, cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Dimensions;
    use crate::lattice::{LatticeParams, Proportions};
    use std::mem;

    fn lattice(params: LatticeParams) -> Lattice {
        Lattice::new(params).unwrap()
    }

    fn conservation_holds(lattice: &Lattice) -> bool {
        let (electrons, holes, _) = lattice.particle_positions();
        lattice.injections()
            == 2 * lattice.recombinations()
                + lattice.captures()
                + electrons.len() as u64
                + holes.len() as u64
    }

    #[test]
    fn empty_lattice_exhausts_immediately() {
        let mut lattice = lattice(LatticeParams {
            dimensions: Dimensions::new(3, 3, 3),
            proportions: Proportions::new(1.0, 0.0, 0.0),
            charges: 0,
            seed: Some(1),
            ..LatticeParams::default()
        });
        assert_eq!(lattice.operations(1).unwrap(), Outcome::EventsExhausted);
        assert!(lattice.iqe().abs() < f64::EPSILON);
        assert_eq!(lattice.steps(), 0);
    }

    #[test]
    fn zero_target_returns_before_touching_the_pools() {
        let mut lattice = lattice(LatticeParams {
            dimensions: Dimensions::new(4, 4, 4),
            proportions: Proportions::new(1.0, 0.0, 0.0),
            charges: 2,
            seed: Some(2),
            ..LatticeParams::default()
        });
        assert_eq!(lattice.drive(0, 10).unwrap(), Outcome::TargetReached);
        assert_eq!(lattice.steps(), 0);
    }

    #[test]
    fn coexisting_pair_queues_an_immediate_bound_event() {
        let mut lattice = lattice(LatticeParams {
            dimensions: Dimensions::new(4, 4, 4),
            proportions: Proportions::new(0.0, 0.0, 1.0),
            charges: 0,
            seed: Some(3),
            ..LatticeParams::default()
        });
        let site = Point::new(1, 1, 1);
        lattice.site_mut(site).set_electron(true);
        lattice.electrons.push(site);
        lattice.site_mut(site).set_hole(true);
        lattice.holes.push(site);
        lattice.injections += 2;
        lattice.refresh_site(site);

        let queued = lattice.pools.entry(site, Particle::Exciton).unwrap();
        assert_eq!(queued.kind, EventKind::Bound);
        assert!(queued.tau.abs() < f64::EPSILON);

        lattice.drive(1, 1).unwrap();
        assert_eq!(lattice.recombinations(), 1);
        assert_eq!(lattice.recombination_sites().fluorophore, 1);
        let (electrons, holes, excitons) = lattice.particle_positions();
        assert!(electrons.is_empty() && holes.is_empty());
        assert_eq!(excitons, &[site]);
        assert!(conservation_holds(&lattice));
    }

    #[test]
    fn fluorophore_exciton_decays_and_reinjects_a_pair() {
        let mut lattice = lattice(LatticeParams {
            dimensions: Dimensions::new(4, 4, 4),
            proportions: Proportions::new(0.0, 0.0, 1.0),
            charges: 0,
            seed: Some(4),
            ..LatticeParams::default()
        });
        let site = Point::new(2, 2, 1);
        lattice.site_mut(site).set_electron(true);
        lattice.electrons.push(site);
        lattice.site_mut(site).set_hole(true);
        lattice.holes.push(site);
        lattice.injections += 2;
        lattice.refresh_site(site);

        // bound, then instantaneous decay with reinjection at the electrodes
        lattice.drive(u64::MAX, 2).unwrap();
        assert_eq!(lattice.recombinations(), 1);
        let (electrons, holes, excitons) = lattice.particle_positions();
        assert_eq!(electrons.len(), 1);
        assert_eq!(holes.len(), 1);
        assert!(excitons.is_empty());
        assert_eq!(electrons[0].z, 3);
        assert_eq!(holes[0].z, 0);
        assert_eq!(lattice.injections(), 4);
        assert!(lattice.site(site).is_empty());
        assert!(conservation_holds(&lattice));
        // the fresh singlet fraction shows up as at most one photon
        assert!(lattice.emissions() <= 1);
    }

    #[test]
    fn electron_at_the_far_electrode_is_captured_and_reinjected() {
        let mut lattice = lattice(LatticeParams {
            dimensions: Dimensions::new(3, 3, 3),
            proportions: Proportions::new(1.0, 0.0, 0.0),
            charges: 0,
            seed: Some(5),
            ..LatticeParams::default()
        });
        let site = Point::new(1, 1, 0);
        lattice.site_mut(site).set_electron(true);
        lattice.electrons.push(site);
        lattice.injections += 1;
        lattice.refresh_site(site);

        let queued = lattice.pools.entry(site, Particle::Electron).unwrap();
        assert_eq!(queued.kind, EventKind::Capture);

        lattice.drive(u64::MAX, 1).unwrap();
        assert_eq!(lattice.captures(), 1);
        assert_eq!(lattice.injections(), 2);
        let (electrons, _, _) = lattice.particle_positions();
        assert_eq!(electrons.len(), 1);
        assert_eq!(electrons[0].z, 2);
        assert!(conservation_holds(&lattice));
    }

    #[test]
    fn clock_is_monotone_and_conservation_holds_throughout() {
        let mut lattice = lattice(LatticeParams {
            dimensions: Dimensions::new(6, 6, 5),
            proportions: Proportions::new(0.6, 0.3, 0.1),
            charges: 3,
            seed: Some(6),
            ..LatticeParams::default()
        });
        let mut previous = 0.0;
        for _ in 0..10_000 {
            match lattice.drive(u64::MAX, 1).unwrap() {
                Outcome::StepCapReached => {}
                Outcome::EventsExhausted => break,
                Outcome::TargetReached => unreachable!(),
            }
            assert!(lattice.clock() >= previous);
            previous = lattice.clock();
            assert!(conservation_holds(&lattice));
            // a coexisting pair is always resolved by a queued bound event
            let (electrons, holes, _) = lattice.particle_positions();
            for position in electrons {
                if holes.contains(position) {
                    let queued = lattice.pools.entry(*position, Particle::Exciton).unwrap();
                    assert_eq!(queued.kind, EventKind::Bound);
                }
            }
        }
        assert!(lattice.steps() > 0);
    }

    #[test]
    fn the_field_sweeps_electrons_to_the_far_electrode() {
        // a single electron in a pure host stack under the default field:
        // upward hops are suppressed by half an electron-volt per plane, so
        // it drifts down, is captured and reinjected, over and over
        let mut lattice = lattice(LatticeParams {
            dimensions: Dimensions::new(4, 4, 4),
            proportions: Proportions::new(1.0, 0.0, 0.0),
            field: 0.5,
            charges: 0,
            seed: Some(8),
            ..LatticeParams::default()
        });
        let site = Point::new(0, 0, 2);
        lattice.site_mut(site).set_electron(true);
        lattice.electrons.push(site);
        lattice.injections += 1;
        lattice.refresh_site(site);

        lattice.drive(u64::MAX, 2000).unwrap();
        assert!(lattice.captures() >= 10);
        assert_eq!(lattice.recombinations(), 0);
        assert!(conservation_holds(&lattice));
    }

    #[test]
    fn coulomb_attraction_binds_a_nearby_pair() {
        // without any field, only the mutual attraction drives the carriers
        // together; moves that increase the separation are strongly uphill
        let mut lattice = lattice(LatticeParams {
            dimensions: Dimensions::new(5, 5, 5),
            proportions: Proportions::new(1.0, 0.0, 0.0),
            field: 0.0,
            charges: 0,
            seed: Some(9),
            ..LatticeParams::default()
        });
        for (site, electron) in [(Point::new(2, 2, 2), true), (Point::new(2, 3, 2), false)] {
            if electron {
                lattice.site_mut(site).set_electron(true);
                lattice.electrons.push(site);
            } else {
                lattice.site_mut(site).set_hole(true);
                lattice.holes.push(site);
            }
            lattice.injections += 1;
            lattice.refresh_site(site);
        }
        assert!(lattice.outstanding_events() > 0);

        assert_eq!(lattice.drive(1, 500).unwrap(), Outcome::TargetReached);
        assert_eq!(lattice.recombinations(), 1);
        assert_eq!(lattice.recombination_sites().host, 1);
        assert!(conservation_holds(&lattice));
    }

    #[test]
    fn sensitiser_excitons_cycle_spin_and_decay_dark() {
        // pure sensitiser stack: the exciton may cross between singlet and
        // triplet but always recombines without a photon
        let mut lattice = lattice(LatticeParams {
            dimensions: Dimensions::new(4, 4, 4),
            proportions: Proportions::new(0.0, 1.0, 0.0),
            charges: 0,
            seed: Some(10),
            ..LatticeParams::default()
        });
        let site = Point::new(1, 2, 1);
        lattice.site_mut(site).set_electron(true);
        lattice.electrons.push(site);
        lattice.site_mut(site).set_hole(true);
        lattice.holes.push(site);
        lattice.injections += 2;
        lattice.refresh_site(site);

        lattice.drive(u64::MAX, 50).unwrap();
        assert!(lattice.recombinations() >= 1);
        assert!(lattice.recombination_sites().tadf >= 1);
        assert_eq!(lattice.emissions(), 0);
        assert!(conservation_holds(&lattice));
    }

    #[test]
    fn forster_transfer_carries_sensitiser_light_to_the_fluorophore() {
        // a 3x3 interior plane wraps onto itself, so every sensitiser site
        // sits within sqrt(2) of an acceptor and transfer beats both the
        // intrinsic decay and the spin-conversion channels
        let mut lattice = lattice(LatticeParams {
            dimensions: Dimensions::new(3, 3, 3),
            proportions: Proportions::new(0.0, 0.85, 0.15),
            charges: 0,
            seed: Some(11),
            ..LatticeParams::default()
        });
        let donor = lattice
            .grid
            .iter()
            .find(|site| site.kind() == MoleculeKind::Tadf)
            .map(crate::molecule::Molecule::position)
            .unwrap();
        lattice.site_mut(donor).set_electron(true);
        lattice.electrons.push(donor);
        lattice.site_mut(donor).set_hole(true);
        lattice.holes.push(donor);
        lattice.injections += 2;
        lattice.refresh_site(donor);

        lattice.drive(u64::MAX, 10).unwrap();
        assert!(lattice.emissions() >= 1);
        assert!(lattice.emissions() <= lattice.recombinations());
        assert!(lattice.recombination_sites().tadf >= 1);
        assert!(conservation_holds(&lattice));
    }

    #[test]
    fn identical_seeds_replay_identical_trajectories() {
        let params = LatticeParams {
            dimensions: Dimensions::new(5, 5, 4),
            proportions: Proportions::new(0.5, 0.4, 0.1),
            charges: 2,
            seed: Some(7),
            ..LatticeParams::default()
        };
        let mut a = lattice(params.clone());
        let mut b = lattice(params);
        let left = a.drive(50, 100_000).unwrap();
        let right = b.drive(50, 100_000).unwrap();
        assert_eq!(left, right);
        assert_eq!(a.steps(), b.steps());
        assert_eq!(a.clock().to_bits(), b.clock().to_bits());
        assert_eq!(a.injections(), b.injections());
        assert_eq!(a.emissions(), b.emissions());
        assert_eq!(a.particle_positions(), b.particle_positions());
    }

    #[test]
    fn recent_ring_buffer_keeps_the_newest_events() {
        let mut recent = RecentEvents::default();
        let site = Point::new(0, 0, 0);
        for seq in 0..20 {
            recent.push(Event::new(
                site,
                site,
                0.0,
                EventKind::Decay,
                Particle::Exciton,
                seq,
            ));
        }
        let snapshot = recent.snapshot();
        assert_eq!(snapshot.len(), RECENT_CAPACITY);
        assert_eq!(snapshot.first().unwrap().seq, 4);
        assert_eq!(snapshot.last().unwrap().seq, 19);
    }

    #[test]
    fn mem_size_of_event_stays_small() {
        // events are copied into the ring buffer on every step
        assert!(mem::size_of::<Event>() <= 64);
    }
}
