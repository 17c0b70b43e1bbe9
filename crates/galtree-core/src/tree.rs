//! Tree inheritance: deciding which galaxies every halo hosts.
//!
//! Halos are visited in ascending snapshot order so that every progenitor
//! is resolved before its descendant. A visited halo is in one of four
//! states:
//!
//! 1. **No progenitor, FOF root** -- [`TreeContext::collect`] spawns one
//!    Central galaxy from the halo's own properties.
//! 2. **No progenitor, not a root** -- nothing; the halo hosts no galaxy.
//! 3. **One progenitor** -- [`TreeContext::inherit`] copies its galaxies
//!    forward onto the descendant.
//! 4. **Several progenitors** -- a merger. The progenitor with galaxies and
//!    the most particles is the primary; its galaxies keep their type.
//!    Every other progenitor's galaxies are demoted to Orphan.
//!
//! All galaxies of one halo sit contiguously in the working array and are
//! located through the halo's [`HaloAux`]. Counters and statistics live in
//! the [`TreeContext`], so independent forests never share state.

use std::ops::Range;

use galtree_props::{Galaxy, Property, PropertyError};
use galtree_types::{GalaxyType, Halo, RunConfig};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::pipeline::PipelineError;
use crate::records::{GalaxyArray, RecordError};
use crate::virial;

/// Errors that abort the processing of a halo.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// A halo index does not name a halo of the forest.
    #[error("halo {halo_nr} out of range (forest has {halo_count} halos)")]
    HaloOutOfRange {
        /// The requested halo index.
        halo_nr: usize,
        /// Number of halos in the forest.
        halo_count: usize,
    },

    /// Appending to a galaxy array failed.
    #[error("record error: {source}")]
    Record {
        /// The underlying record array error.
        #[from]
        source: RecordError,
    },

    /// Copying a galaxy's physics block failed.
    #[error("property error: {source}")]
    Property {
        /// The underlying property store error.
        #[from]
        source: PropertyError,
    },

    /// The galaxy number or global galaxy index would overflow.
    #[error("galaxy counter overflow")]
    CounterOverflow,

    /// The physics pipeline rejected a halo.
    #[error("pipeline error on halo {halo_nr}: {source}")]
    Pipeline {
        /// The halo being evolved.
        halo_nr: usize,
        /// The underlying pipeline error.
        source: PipelineError,
    },
}

/// Per-halo bookkeeping owned by the traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HaloAux {
    /// Number of galaxies the halo hosts.
    pub galaxy_count: usize,
    /// Working-array index of the halo's first galaxy.
    pub first_galaxy: usize,
    /// Whether the halo has been collected or inherited.
    pub done: bool,
}

impl HaloAux {
    /// Working-array indices of the halo's galaxies.
    pub const fn range(&self) -> Range<usize> {
        self.first_galaxy..self.first_galaxy.saturating_add(self.galaxy_count)
    }
}

/// Running counters of one traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TraversalStats {
    /// Progenitor links that skipped at least one snapshot.
    pub gap_events: u64,
    /// Sum of all skipped snapshots.
    pub total_gap_snapshots: u64,
    /// Largest single gap seen.
    pub max_gap: u32,
    /// Non-primary progenitors whose galaxies were demoted to Orphan.
    /// Counted once per progenitor, however many galaxies it carried.
    pub orphans_created: u64,
    /// Central galaxies spawned from halos without galaxies.
    pub primordial_galaxies: u64,
}

impl TraversalStats {
    fn record_gap(&mut self, gap: u32) {
        if gap == 0 {
            return;
        }
        self.gap_events = self.gap_events.saturating_add(1);
        self.total_gap_snapshots = self.total_gap_snapshots.saturating_add(u64::from(gap));
        self.max_gap = self.max_gap.max(gap);
    }

    const fn absorb(&mut self, other: &Self) {
        self.gap_events = self.gap_events.saturating_add(other.gap_events);
        self.total_gap_snapshots = self
            .total_gap_snapshots
            .saturating_add(other.total_gap_snapshots);
        if other.max_gap > self.max_gap {
            self.max_gap = other.max_gap;
        }
        self.orphans_created = self.orphans_created.saturating_add(other.orphans_created);
        self.primordial_galaxies = self
            .primordial_galaxies
            .saturating_add(other.primordial_galaxies);
    }
}

/// Snapshots skipped between a progenitor and its descendant.
///
/// Returns `descendant_snap - progenitor_snap - 1`, or 0 unless the
/// descendant is strictly later.
pub const fn measure_gap(descendant_snap: u32, progenitor_snap: u32) -> u32 {
    descendant_snap
        .saturating_sub(progenitor_snap)
        .saturating_sub(1)
}

/// Descendant-halo values every inherited galaxy is anchored to.
struct Anchor<'h> {
    halo_nr: usize,
    halo: &'h Halo,
    central: usize,
    mvir: f32,
    rvir: f32,
    vvir: f32,
}

impl Anchor<'_> {
    /// Move a galaxy into the descendant halo, keeping its type.
    fn retarget(&self, galaxy: &mut Galaxy) {
        galaxy.halo_nr = self.halo_nr;
        galaxy.snap_num = self.halo.snap_num;
        galaxy.len = self.halo.len;
        galaxy.central_gal = Some(self.central);
        if galaxy.galaxy_type.is_orphan() {
            return;
        }
        galaxy.pos = self.halo.pos;
        galaxy.vel = self.halo.vel;
        galaxy.mvir = self.mvir;
        galaxy.rvir = self.rvir;
        galaxy.vvir = self.vvir;
        galaxy.vmax = self.halo.vmax;
    }

    /// Strip a galaxy of its own halo and attach it to the descendant.
    fn demote(&self, galaxy: &mut Galaxy) {
        if !galaxy.galaxy_type.is_orphan() {
            galaxy.set_f32(Property::InfallMvir.into(), galaxy.mvir);
            galaxy.set_f32(Property::InfallVvir.into(), galaxy.vvir);
            galaxy.set_f32(Property::InfallVmax.into(), galaxy.vmax);
        }
        galaxy.galaxy_type = GalaxyType::Orphan;
        galaxy.mvir = 0.0;
        galaxy.halo_nr = self.halo_nr;
        galaxy.snap_num = self.halo.snap_num;
        galaxy.len = self.halo.len;
        galaxy.central_gal = Some(self.central);
    }
}

/// State of one forest traversal.
///
/// Borrows the forest's halos and the run configuration; owns the working,
/// output, and previous galaxy arrays, the per-halo bookkeeping, the galaxy
/// counter, and the statistics. Dropping the context releases every galaxy.
#[derive(Debug)]
pub struct TreeContext<'a> {
    halos: &'a [Halo],
    config: &'a RunConfig,
    aux: Vec<HaloAux>,
    working: GalaxyArray,
    output: GalaxyArray,
    previous: GalaxyArray,
    galaxy_counter: u32,
    index_offset: u64,
    stats: TraversalStats,
}

impl<'a> TreeContext<'a> {
    /// A fresh traversal over `halos`.
    pub fn new(halos: &'a [Halo], config: &'a RunConfig) -> Self {
        Self {
            halos,
            config,
            aux: vec![HaloAux::default(); halos.len()],
            working: GalaxyArray::new(),
            output: GalaxyArray::new(),
            previous: GalaxyArray::new(),
            galaxy_counter: 0,
            index_offset: 0,
            stats: TraversalStats::default(),
        }
    }

    /// Offset added to every galaxy number to form its global index, so
    /// that galaxies of different forests never share an index.
    #[must_use]
    pub const fn with_index_offset(mut self, offset: u64) -> Self {
        self.index_offset = offset;
        self
    }

    // -------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------

    /// The forest's halos.
    pub const fn halos(&self) -> &'a [Halo] {
        self.halos
    }

    /// The run configuration.
    pub const fn config(&self) -> &'a RunConfig {
        self.config
    }

    /// Bookkeeping of `halo_nr`.
    pub fn aux(&self, halo_nr: usize) -> Option<&HaloAux> {
        self.aux.get(halo_nr)
    }

    /// Running statistics.
    pub const fn stats(&self) -> &TraversalStats {
        &self.stats
    }

    /// Every galaxy produced so far, in creation order.
    pub const fn working(&self) -> &GalaxyArray {
        &self.working
    }

    /// Galaxies extracted at the most recent output snapshot.
    pub const fn output(&self) -> &GalaxyArray {
        &self.output
    }

    /// Galaxies extracted at the output snapshot before that.
    pub const fn previous(&self) -> &GalaxyArray {
        &self.previous
    }

    /// Number of galaxies spawned so far in this forest.
    pub const fn galaxy_counter(&self) -> u32 {
        self.galaxy_counter
    }

    /// The contiguous block of galaxies hosted by `halo_nr`.
    pub fn galaxies_of(&self, halo_nr: usize) -> &[Galaxy] {
        let range = self.aux_of(halo_nr).range();
        self.working.raw_view().get(range).unwrap_or_default()
    }

    /// Mutable access to the galaxies hosted by `halo_nr`.
    pub fn galaxies_of_mut(&mut self, halo_nr: usize) -> &mut [Galaxy] {
        let range = self.aux_of(halo_nr).range();
        self.working.raw_view_mut().get_mut(range).unwrap_or_default()
    }

    /// Clear every array, the bookkeeping, and the statistics for a new
    /// pass over the same forest.
    pub fn reset(&mut self) {
        self.aux.clear();
        self.aux.resize(self.halos.len(), HaloAux::default());
        self.working.free();
        self.output.free();
        self.previous.free();
        self.galaxy_counter = 0;
        self.stats = TraversalStats::default();
    }

    // -------------------------------------------------------------------
    // Traversal steps
    // -------------------------------------------------------------------

    /// Spawn the primordial Central of a halo without progenitors.
    ///
    /// Does nothing if the halo has a progenitor, is not the root of its
    /// FOF group, or was already processed.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::HaloOutOfRange`] for an unknown halo, or the
    /// allocation error that prevented the galaxy from being stored.
    pub fn collect(&mut self, halo_nr: usize) -> Result<(), TreeError> {
        let halo = self.halo(halo_nr)?;
        if self.is_done(halo_nr) || !self.progenitors(halo_nr, halo).is_empty() {
            return Ok(());
        }
        if !halo.is_fof_root(halo_nr) {
            debug!(halo_nr, "Halo without progenitor is not a FOF root; no galaxy");
            self.set_aux(halo_nr, 0, self.working.len());
            return Ok(());
        }
        self.spawn_primordial(halo_nr, halo)
    }

    /// Carry the galaxies of every progenitor of `halo_nr` forward.
    ///
    /// Does nothing if the halo has no progenitor or was already processed.
    /// If none of the progenitors hosts a galaxy and the halo is a FOF
    /// root, a fresh Central is spawned as in [`collect`](Self::collect).
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::HaloOutOfRange`] for an unknown halo, or the
    /// copy/allocation error that stopped the inheritance. On error the
    /// working array is truncated back and the halo stays unprocessed.
    pub fn inherit(&mut self, halo_nr: usize) -> Result<(), TreeError> {
        let halo = self.halo(halo_nr)?;
        let progenitors = self.progenitors(halo_nr, halo);
        if progenitors.is_empty() || self.is_done(halo_nr) {
            return Ok(());
        }

        let start = self.working.len();
        let stats = match self.copy_forward(halo_nr, halo, &progenitors, start) {
            Ok(stats) => stats,
            Err(err) => {
                self.working.truncate(start);
                warn!(halo_nr, %err, "Inheritance aborted");
                return Err(err);
            }
        };

        let copied = self.working.len().saturating_sub(start);
        if copied == 0 && halo.is_fof_root(halo_nr) {
            self.spawn_primordial(halo_nr, halo)?;
        } else {
            self.set_aux(halo_nr, copied, start);
        }
        self.stats.absorb(&stats);
        Ok(())
    }

    /// Refresh the output arrays with every galaxy at `snap`.
    ///
    /// The current output becomes `previous`; the old `previous` is
    /// released. When `snap` is a configured output snapshot, each
    /// extracted galaxy's history arrays record its host halo and stellar
    /// mass at that output's position. Returns the number of galaxies
    /// extracted.
    ///
    /// # Errors
    ///
    /// Returns the copy or allocation error that stopped the extraction;
    /// the output arrays are left unchanged.
    pub fn extract_output(&mut self, snap: u32) -> Result<usize, TreeError> {
        let config = self.config;
        let slot = config.output_snapshots.iter().position(|&s| s == snap);

        let mut extracted = GalaxyArray::new();
        for galaxy in self.working.raw_view_mut() {
            if galaxy.snap_num != snap {
                continue;
            }
            if let Some(slot) = slot {
                let halo_nr = i32::try_from(galaxy.halo_nr).unwrap_or(-1);
                let stellar = galaxy.get_f32(Property::StellarMass.into(), 0.0);
                let recorded = galaxy.set_i32_element(Property::HaloHistory.into(), slot, halo_nr)
                    && galaxy.set_f64_element(
                        Property::StellarMassHistory.into(),
                        slot,
                        f64::from(stellar),
                    );
                if !recorded {
                    warn!(snap, slot, halo_nr, "History slot out of range; not recorded");
                }
            }
            extracted.append(galaxy, config)?;
        }

        let count = extracted.len();
        let superseded = std::mem::replace(&mut self.output, extracted);
        self.previous = superseded;
        info!(snap, galaxies = count, "Output snapshot extracted");
        Ok(count)
    }

    // -------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------

    fn halo(&self, halo_nr: usize) -> Result<&'a Halo, TreeError> {
        self.halos.get(halo_nr).ok_or(TreeError::HaloOutOfRange {
            halo_nr,
            halo_count: self.halos.len(),
        })
    }

    fn aux_of(&self, halo_nr: usize) -> HaloAux {
        self.aux.get(halo_nr).copied().unwrap_or_default()
    }

    fn is_done(&self, halo_nr: usize) -> bool {
        self.aux_of(halo_nr).done
    }

    fn set_aux(&mut self, halo_nr: usize, galaxy_count: usize, first_galaxy: usize) {
        if let Some(aux) = self.aux.get_mut(halo_nr) {
            *aux = HaloAux {
                galaxy_count,
                first_galaxy,
                done: true,
            };
        }
    }

    /// `link` if it names a halo of the forest. Dangling links are logged
    /// and treated as absent.
    fn checked_link(&self, from: usize, link: Option<usize>, kind: &'static str) -> Option<usize> {
        let target = link?;
        if target < self.halos.len() {
            return Some(target);
        }
        warn!(
            halo_nr = from,
            link = kind,
            target,
            halo_count = self.halos.len(),
            "Tree link out of range; treated as absent"
        );
        None
    }

    /// The progenitor sibling chain of `halo`, in chain order. A chain
    /// that revisits a halo is cut at the repeat.
    fn progenitors(&self, halo_nr: usize, halo: &Halo) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut next = self.checked_link(halo_nr, halo.first_progenitor, "first_progenitor");
        while let Some(prog) = next {
            if chain.contains(&prog) {
                warn!(halo_nr, progenitor = prog, "Progenitor chain loops; truncated");
                break;
            }
            chain.push(prog);
            next = self
                .halos
                .get(prog)
                .and_then(|p| self.checked_link(prog, p.next_progenitor, "next_progenitor"));
        }
        chain
    }

    /// The progenitor with galaxies and the largest particle count. Ties
    /// go to the first in chain order.
    fn primary_progenitor(&self, progenitors: &[usize]) -> Option<usize> {
        let mut best: Option<(usize, u32)> = None;
        for &prog in progenitors {
            if self.aux_of(prog).galaxy_count == 0 {
                continue;
            }
            let len = self.halos.get(prog).map_or(0, |h| h.len);
            if best.is_none_or(|(_, best_len)| len > best_len) {
                best = Some((prog, len));
            }
        }
        best.map(|(prog, _)| prog)
    }

    /// Deep copy of the working galaxy at `index`.
    fn copy_of(&self, index: usize) -> Result<Option<Galaxy>, TreeError> {
        let copy = self
            .working
            .get(index)
            .map(|galaxy| galaxy.duplicate(self.config))
            .transpose()?;
        Ok(copy)
    }

    /// Append the descendant's copies of every progenitor galaxy, primary
    /// first. Returns the statistics of this halo alone.
    fn copy_forward(
        &mut self,
        halo_nr: usize,
        halo: &Halo,
        progenitors: &[usize],
        start: usize,
    ) -> Result<TraversalStats, TreeError> {
        let config = self.config;
        let cosmology = &config.cosmology;
        let z = config.redshift(halo.snap_num).unwrap_or(0.0);
        let mvir = virial::virial_mass(halo, cosmology);
        let rvir = virial::virial_radius(mvir, z, cosmology);
        let anchor = Anchor {
            halo_nr,
            halo,
            central: start,
            mvir: virial::narrow(mvir),
            rvir: virial::narrow(rvir),
            vvir: virial::narrow(virial::virial_velocity(mvir, rvir, cosmology)),
        };

        let mut stats = TraversalStats::default();
        let primary = self.primary_progenitor(progenitors);

        if let Some(primary) = primary {
            for index in self.aux_of(primary).range() {
                let Some(mut copy) = self.copy_of(index)? else {
                    break;
                };
                anchor.retarget(&mut copy);
                self.working.append_owned(copy, config)?;
            }
        }

        for &prog in progenitors {
            if Some(prog) == primary {
                continue;
            }
            let mut demoted = false;
            for index in self.aux_of(prog).range() {
                let Some(mut copy) = self.copy_of(index)? else {
                    break;
                };
                anchor.demote(&mut copy);
                self.working.append_owned(copy, config)?;
                demoted = true;
            }
            if demoted {
                stats.orphans_created = stats.orphans_created.saturating_add(1);
            }
        }

        for &prog in progenitors {
            let prog_snap = self.halos.get(prog).map_or(halo.snap_num, |p| p.snap_num);
            let gap = measure_gap(halo.snap_num, prog_snap);
            if gap > 0 {
                debug!(halo_nr, progenitor = prog, gap, "Progenitor link skips snapshots");
            }
            stats.record_gap(gap);
        }

        if progenitors.len() > 1 {
            debug!(
                halo_nr,
                progenitors = progenitors.len(),
                primary = ?primary,
                orphans = stats.orphans_created,
                "Merger resolved"
            );
        }
        Ok(stats)
    }

    /// Spawn one Central for `halo` and make it the halo's only galaxy.
    fn spawn_primordial(&mut self, halo_nr: usize, halo: &Halo) -> Result<(), TreeError> {
        let config = self.config;
        let cosmology = &config.cosmology;

        let galaxy_nr = self.galaxy_counter;
        let next_counter = galaxy_nr.checked_add(1).ok_or(TreeError::CounterOverflow)?;
        let galaxy_index = self
            .index_offset
            .checked_add(u64::from(galaxy_nr))
            .ok_or(TreeError::CounterOverflow)?;

        let z = config.redshift(halo.snap_num).unwrap_or(0.0);
        let mvir = virial::virial_mass(halo, cosmology);
        let rvir = virial::virial_radius(mvir, z, cosmology);
        let vvir = virial::virial_velocity(mvir, rvir, cosmology);

        let first = self.working.len();
        let mut galaxy = Galaxy::new();
        galaxy.galaxy_nr = galaxy_nr;
        galaxy.galaxy_index = galaxy_index;
        galaxy.central_gal = Some(first);
        galaxy.halo_nr = halo_nr;
        galaxy.galaxy_type = GalaxyType::Central;
        galaxy.snap_num = halo.snap_num;
        galaxy.len = halo.len;
        galaxy.mvir = virial::narrow(mvir);
        galaxy.rvir = virial::narrow(rvir);
        galaxy.vvir = virial::narrow(vvir);
        galaxy.vmax = halo.vmax;
        galaxy.pos = halo.pos;
        galaxy.vel = halo.vel;
        galaxy.most_bound_id = halo.most_bound_id;

        self.working.append_owned(galaxy, config)?;
        self.galaxy_counter = next_counter;
        self.set_aux(halo_nr, 1, first);
        self.stats.primordial_galaxies = self.stats.primordial_galaxies.saturating_add(1);

        debug!(halo_nr, galaxy_nr, snap = halo.snap_num, mvir, "Primordial galaxy spawned");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn config() -> RunConfig {
        RunConfig {
            output_snapshot_count: 3,
            output_snapshots: vec![2],
            ..RunConfig::default()
        }
    }

    /// A halo that is its own FOF root.
    fn root(snap: u32, len: u32, mvir: f32, self_index: usize) -> Halo {
        let mut halo = Halo::new(snap, len, mvir);
        halo.first_halo_in_fof_group = Some(self_index);
        halo
    }

    /// `h2 -> h1 -> h0`, each its own FOF root.
    fn chain() -> Vec<Halo> {
        let mut h0 = root(2, 300, 30.0, 0);
        let mut h1 = root(1, 200, 20.0, 1);
        let mut h2 = root(0, 100, 10.0, 2);
        h0.first_progenitor = Some(1);
        h1.first_progenitor = Some(2);
        h1.descendant = Some(0);
        h2.descendant = Some(1);
        vec![h0, h1, h2]
    }

    /// `h0` at snap 2 with progenitors `h1` (1000 particles) and `h2`
    /// (100 particles), both at snap 1.
    fn merger() -> Vec<Halo> {
        let mut h0 = root(2, 1100, 50.0, 0);
        let mut h1 = root(1, 1000, 40.0, 1);
        let mut h2 = root(1, 100, 4.0, 2);
        h0.first_progenitor = Some(1);
        h1.next_progenitor = Some(2);
        h1.descendant = Some(0);
        h2.descendant = Some(0);
        vec![h0, h1, h2]
    }

    #[test]
    fn gap_measurement() {
        assert_eq!(measure_gap(5, 4), 0);
        assert_eq!(measure_gap(5, 5), 0);
        assert_eq!(measure_gap(5, 2), 2);
        assert_eq!(measure_gap(5, 0), 4);
        assert_eq!(measure_gap(2, 5), 0);
        assert_eq!(measure_gap(0, u32::MAX), 0);
    }

    #[test]
    fn collect_root_spawns_one_central() {
        let cfg = config();
        let halos = vec![root(0, 100, 10.0, 0)];
        let mut ctx = TreeContext::new(&halos, &cfg);
        assert!(ctx.collect(0).is_ok());

        let galaxies = ctx.galaxies_of(0);
        assert_eq!(galaxies.len(), 1);
        let galaxy = galaxies.first().unwrap();
        assert_eq!(galaxy.galaxy_type, GalaxyType::Central);
        assert_eq!(galaxy.mvir, 10.0);
        assert!(galaxy.rvir > 0.0);
        assert!(galaxy.vvir > 0.0);
        assert!(galaxy.is_allocated());
        assert_eq!(galaxy.central_gal, Some(0));
        assert_eq!(ctx.stats().primordial_galaxies, 1);
        assert!(ctx.aux(0).unwrap().done);
    }

    #[test]
    fn collect_non_root_spawns_nothing() {
        let cfg = config();
        let mut halo = Halo::new(0, 100, 10.0);
        halo.first_halo_in_fof_group = Some(1);
        let halos = vec![halo, root(0, 500, 50.0, 1)];
        let mut ctx = TreeContext::new(&halos, &cfg);
        assert!(ctx.collect(0).is_ok());
        assert!(ctx.galaxies_of(0).is_empty());
        assert_eq!(ctx.aux(0).unwrap().galaxy_count, 0);
        assert!(ctx.working().is_empty());
    }

    #[test]
    fn collect_skips_halo_with_progenitor() {
        let cfg = config();
        let halos = chain();
        let mut ctx = TreeContext::new(&halos, &cfg);
        assert!(ctx.collect(0).is_ok());
        assert!(ctx.working().is_empty());
        assert!(!ctx.aux(0).unwrap().done);
    }

    #[test]
    fn collect_derives_mass_from_particles() {
        let cfg = config();
        let halos = vec![root(0, 100, 0.0, 0)];
        let mut ctx = TreeContext::new(&halos, &cfg);
        ctx.collect(0).unwrap();
        let expected = virial::narrow(100.0 * cfg.cosmology.part_mass);
        assert_eq!(ctx.galaxies_of(0).first().unwrap().mvir, expected);
    }

    #[test]
    fn collect_twice_is_noop() {
        let cfg = config();
        let halos = vec![root(0, 100, 10.0, 0)];
        let mut ctx = TreeContext::new(&halos, &cfg);
        ctx.collect(0).unwrap();
        ctx.collect(0).unwrap();
        assert_eq!(ctx.working().len(), 1);
        assert_eq!(ctx.galaxy_counter(), 1);
    }

    #[test]
    fn unknown_halo_is_rejected() {
        let cfg = config();
        let halos = chain();
        let mut ctx = TreeContext::new(&halos, &cfg);
        assert!(matches!(
            ctx.collect(3),
            Err(TreeError::HaloOutOfRange {
                halo_nr: 3,
                halo_count: 3
            })
        ));
        assert!(matches!(ctx.inherit(9), Err(TreeError::HaloOutOfRange { .. })));
    }

    #[test]
    fn chain_carries_the_galaxy_forward() {
        let cfg = config();
        let halos = chain();
        let mut ctx = TreeContext::new(&halos, &cfg);

        ctx.collect(2).unwrap();
        ctx.inherit(1).unwrap();
        assert_eq!(ctx.galaxies_of(1).len(), 1);
        assert_eq!(ctx.working().len(), 2);
        ctx.inherit(0).unwrap();

        let galaxies = ctx.galaxies_of(0);
        assert_eq!(galaxies.len(), 1);
        let galaxy = galaxies.first().unwrap();
        assert_eq!(galaxy.galaxy_type, GalaxyType::Central);
        assert_eq!(galaxy.halo_nr, 0);
        assert_eq!(galaxy.snap_num, 2);
        assert_eq!(galaxy.mvir, 30.0);
        assert_eq!(galaxy.len, 300);
        assert_eq!(galaxy.galaxy_nr, 0);
        assert_eq!(ctx.working().len(), 3);
        assert_eq!(ctx.stats().gap_events, 0);
    }

    #[test]
    fn inherited_physics_is_independent() {
        let cfg = config();
        let halos = chain();
        let mut ctx = TreeContext::new(&halos, &cfg);
        ctx.collect(2).unwrap();
        if let Some(galaxy) = ctx.galaxies_of_mut(2).first_mut() {
            galaxy.set_f32(Property::ColdGas.into(), 3.0);
        }
        ctx.inherit(1).unwrap();
        if let Some(galaxy) = ctx.galaxies_of_mut(1).first_mut() {
            galaxy.set_f32(Property::ColdGas.into(), 7.0);
        }
        let old = ctx.galaxies_of(2).first().unwrap();
        assert_eq!(old.get_f32(Property::ColdGas.into(), 0.0), 3.0);
        let new = ctx.galaxies_of(1).first().unwrap();
        assert_eq!(new.get_f32(Property::ColdGas.into(), 0.0), 7.0);
    }

    #[test]
    fn merger_keeps_primary_and_orphans_the_rest() {
        let cfg = config();
        let halos = merger();
        let mut ctx = TreeContext::new(&halos, &cfg);
        ctx.collect(1).unwrap();
        ctx.collect(2).unwrap();
        ctx.inherit(0).unwrap();

        let galaxies = ctx.galaxies_of(0);
        assert_eq!(galaxies.len(), 2);

        let primary = galaxies.first().unwrap();
        assert_eq!(primary.galaxy_type, GalaxyType::Central);
        assert_eq!(primary.galaxy_nr, 0);
        assert_eq!(primary.mvir, 50.0);

        let orphan = galaxies.get(1).unwrap();
        assert_eq!(orphan.galaxy_type, GalaxyType::Orphan);
        assert_eq!(orphan.galaxy_nr, 1);
        assert_eq!(orphan.mvir, 0.0);
        assert_eq!(orphan.halo_nr, 0);
        assert_eq!(orphan.central_gal, primary.central_gal);
        assert_eq!(orphan.get_f32(Property::InfallMvir.into(), 0.0), 4.0);
        assert_eq!(orphan.len, primary.len);
        assert_eq!(orphan.len, 1100);

        assert_eq!(ctx.stats().orphans_created, 1);
    }

    #[test]
    fn orphans_counted_once_per_demoted_progenitor() {
        let cfg = config();
        let mut halos = merger();
        // h3 at snap 3 merges the two-galaxy h0 into the larger h4.
        let mut h3 = root(3, 5000, 90.0, 3);
        h3.first_progenitor = Some(4);
        let mut h4 = root(2, 4000, 80.0, 4);
        h4.next_progenitor = Some(0);
        h4.descendant = Some(3);
        halos.push(h3);
        halos.push(h4);
        if let Some(h0) = halos.get_mut(0) {
            h0.descendant = Some(3);
        }
        let mut ctx = TreeContext::new(&halos, &cfg);
        ctx.collect(1).unwrap();
        ctx.collect(2).unwrap();
        ctx.collect(4).unwrap();
        ctx.inherit(0).unwrap();
        assert_eq!(ctx.stats().orphans_created, 1);
        ctx.inherit(3).unwrap();

        let galaxies = ctx.galaxies_of(3);
        assert_eq!(galaxies.len(), 3);
        for galaxy in galaxies.iter().skip(1) {
            assert_eq!(galaxy.galaxy_type, GalaxyType::Orphan);
            assert_eq!(galaxy.len, 5000);
        }
        assert_eq!(ctx.stats().orphans_created, 2);
    }

    #[test]
    fn failed_fallback_spawn_leaves_stats_untouched() {
        let cfg = config();
        // h1 is a root at snap 0 and takes the only free global index;
        // h2 is a galaxy-less progenitor of h0 three snapshots back.
        let mut h0 = root(3, 300, 30.0, 0);
        h0.first_progenitor = Some(2);
        let h1 = root(0, 100, 10.0, 1);
        let mut h2 = Halo::new(0, 50, 5.0);
        h2.first_halo_in_fof_group = Some(1);
        h2.descendant = Some(0);
        let halos = vec![h0, h1, h2];

        let mut ctx = TreeContext::new(&halos, &cfg).with_index_offset(u64::MAX);
        ctx.collect(1).unwrap();
        ctx.collect(2).unwrap();
        assert_eq!(ctx.galaxy_counter(), 1);

        for _ in 0..2 {
            let result = ctx.inherit(0);
            assert!(matches!(result, Err(TreeError::CounterOverflow)));
            assert!(!ctx.aux(0).unwrap().done);
            assert_eq!(ctx.stats().gap_events, 0);
            assert_eq!(ctx.stats().total_gap_snapshots, 0);
        }
    }

    #[test]
    fn primary_tie_goes_to_first_in_chain() {
        let cfg = config();
        let mut halos = merger();
        if let Some(h2) = halos.get_mut(2) {
            h2.len = 1000;
        }
        let mut ctx = TreeContext::new(&halos, &cfg);
        ctx.collect(1).unwrap();
        ctx.collect(2).unwrap();
        ctx.inherit(0).unwrap();
        let first = ctx.galaxies_of(0).first().unwrap();
        assert_eq!(first.galaxy_nr, 0);
        assert_eq!(first.galaxy_type, GalaxyType::Central);
    }

    #[test]
    fn progenitor_without_galaxies_cannot_be_primary() {
        let cfg = config();
        let mut halos = merger();
        // The big progenitor is not a FOF root and hosts nothing.
        if let Some(h1) = halos.get_mut(1) {
            h1.first_halo_in_fof_group = Some(2);
        }
        let mut ctx = TreeContext::new(&halos, &cfg);
        ctx.collect(1).unwrap();
        ctx.collect(2).unwrap();
        ctx.inherit(0).unwrap();
        let galaxies = ctx.galaxies_of(0);
        assert_eq!(galaxies.len(), 1);
        assert_eq!(galaxies.first().unwrap().galaxy_type, GalaxyType::Central);
        assert_eq!(ctx.stats().orphans_created, 0);
    }

    #[test]
    fn orphans_stay_orphans_in_primary() {
        let cfg = config();
        let mut halos = merger();
        let mut h3 = root(3, 1200, 60.0, 3);
        h3.first_progenitor = Some(0);
        halos.push(h3);
        if let Some(h0) = halos.get_mut(0) {
            h0.descendant = Some(3);
        }
        let mut ctx = TreeContext::new(&halos, &cfg);
        ctx.collect(1).unwrap();
        ctx.collect(2).unwrap();
        ctx.inherit(0).unwrap();
        ctx.inherit(3).unwrap();

        let galaxies = ctx.galaxies_of(3);
        assert_eq!(galaxies.len(), 2);
        let orphan = galaxies.get(1).unwrap();
        assert_eq!(orphan.galaxy_type, GalaxyType::Orphan);
        assert_eq!(orphan.mvir, 0.0);
        assert_eq!(orphan.snap_num, 3);
        assert_eq!(galaxies.first().unwrap().mvir, 60.0);
    }

    #[test]
    fn gaps_are_counted_per_progenitor() {
        let cfg = config();
        let mut halos = merger();
        // h1 two snapshots behind, h2 three.
        if let Some(h0) = halos.get_mut(0) {
            h0.snap_num = 4;
        }
        if let Some(h1) = halos.get_mut(1) {
            h1.snap_num = 2;
        }
        if let Some(h2) = halos.get_mut(2) {
            h2.snap_num = 1;
        }
        let mut ctx = TreeContext::new(&halos, &cfg);
        ctx.collect(1).unwrap();
        ctx.collect(2).unwrap();
        ctx.inherit(0).unwrap();

        let stats = ctx.stats();
        assert_eq!(stats.gap_events, 2);
        assert_eq!(stats.total_gap_snapshots, 3);
        assert_eq!(stats.max_gap, 2);
    }

    #[test]
    fn empty_progenitors_under_root_spawn_fresh_central() {
        let cfg = config();
        let mut halos = chain();
        // h2 is no longer a root, so it hosts nothing.
        if let Some(h2) = halos.get_mut(2) {
            h2.first_halo_in_fof_group = None;
        }
        let mut ctx = TreeContext::new(&halos, &cfg);
        ctx.collect(2).unwrap();
        ctx.inherit(1).unwrap();
        let galaxies = ctx.galaxies_of(1);
        assert_eq!(galaxies.len(), 1);
        assert_eq!(galaxies.first().unwrap().mvir, 20.0);
        assert_eq!(ctx.stats().primordial_galaxies, 1);
    }

    #[test]
    fn dangling_progenitor_link_is_ignored() {
        let cfg = config();
        let mut halo = root(1, 100, 10.0, 0);
        halo.first_progenitor = Some(42);
        let halos = vec![halo];
        let mut ctx = TreeContext::new(&halos, &cfg);
        ctx.collect(0).unwrap();
        ctx.inherit(0).unwrap();
        assert_eq!(ctx.galaxies_of(0).len(), 1);
    }

    #[test]
    fn looping_progenitor_chain_terminates() {
        let cfg = config();
        let mut halos = merger();
        if let Some(h2) = halos.get_mut(2) {
            h2.next_progenitor = Some(1);
        }
        let mut ctx = TreeContext::new(&halos, &cfg);
        ctx.collect(1).unwrap();
        ctx.collect(2).unwrap();
        ctx.inherit(0).unwrap();
        assert_eq!(ctx.galaxies_of(0).len(), 2);
    }

    #[test]
    fn failed_copy_rolls_back() {
        let cfg = config();
        let halos = chain();
        let mut ctx = TreeContext::new(&halos, &cfg);
        ctx.collect(2).unwrap();
        if let Some(galaxy) = ctx.galaxies_of_mut(2).first_mut() {
            galaxy.free();
        }
        let result = ctx.inherit(1);
        assert!(matches!(
            result,
            Err(TreeError::Property {
                source: PropertyError::MissingBlock
            })
        ));
        assert_eq!(ctx.working().len(), 1);
        assert!(!ctx.aux(1).unwrap().done);
    }

    #[test]
    fn index_offset_overflow_is_reported() {
        let cfg = config();
        let halos = vec![root(0, 10, 1.0, 0), root(0, 10, 1.0, 1)];
        let mut ctx = TreeContext::new(&halos, &cfg).with_index_offset(u64::MAX);
        ctx.collect(0).unwrap();
        assert_eq!(ctx.galaxies_of(0).first().unwrap().galaxy_index, u64::MAX);
        assert!(matches!(ctx.collect(1), Err(TreeError::CounterOverflow)));
        assert_eq!(ctx.working().len(), 1);
    }

    #[test]
    fn extract_output_rotates_arrays() {
        let cfg = config();
        let halos = chain();
        let mut ctx = TreeContext::new(&halos, &cfg);
        ctx.collect(2).unwrap();
        assert_eq!(ctx.extract_output(0).unwrap(), 1);
        ctx.inherit(1).unwrap();
        ctx.inherit(0).unwrap();
        if let Some(galaxy) = ctx.galaxies_of_mut(0).first_mut() {
            galaxy.set_f32(Property::StellarMass.into(), 2.0);
        }
        assert_eq!(ctx.extract_output(2).unwrap(), 1);

        assert_eq!(ctx.previous().len(), 1);
        assert_eq!(ctx.previous().get(0).unwrap().snap_num, 0);
        let out = ctx.output().get(0).unwrap();
        assert_eq!(out.snap_num, 2);
        assert_eq!(out.get_i32_element(Property::HaloHistory.into(), 0, -9), 0);
        assert_eq!(
            out.get_f64_element(Property::StellarMassHistory.into(), 0, -1.0),
            2.0
        );
    }

    #[test]
    fn reset_clears_everything() {
        let cfg = config();
        let halos = chain();
        let mut ctx = TreeContext::new(&halos, &cfg);
        ctx.collect(2).unwrap();
        ctx.inherit(1).unwrap();
        ctx.reset();
        assert!(ctx.working().is_empty());
        assert_eq!(ctx.galaxy_counter(), 0);
        assert_eq!(*ctx.stats(), TraversalStats::default());
        assert_eq!(ctx.aux(1), Some(&HaloAux::default()));
    }
}
