//! Forest driver: visits every halo of a forest in snapshot order.
//!
//! For each halo the driver runs [`TreeContext::collect`], then
//! [`TreeContext::inherit`], then hands the halo's galaxies to the
//! [`PhysicsPipeline`]. When the last halo of a requested output snapshot
//! has been evolved, the snapshot's galaxies are extracted into the
//! context's output array.

use galtree_types::Halo;
use serde::Serialize;
use tracing::info;

use crate::pipeline::PhysicsPipeline;
use crate::tree::{TraversalStats, TreeContext, TreeError};

/// Result of processing one forest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ForestSummary {
    /// Number of halos visited.
    pub halos: usize,
    /// Galaxies in the working array at the end of the traversal.
    pub galaxies: usize,
    /// Galaxies in the most recent output extraction.
    pub output_galaxies: usize,
    /// Number of output snapshots extracted.
    pub outputs_extracted: usize,
    /// Traversal statistics.
    pub stats: TraversalStats,
}

/// Visit state of a halo while ordering one snapshot.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Open,
    Placed,
}

/// Halo indices sorted by ascending snapshot.
///
/// Within one snapshot, halos keep index order except that a progenitor
/// at the same snapshot is always placed before its descendant. A
/// progenitor loop is broken at the halo where it closes.
pub fn snapshot_order(halos: &[Halo]) -> Vec<usize> {
    let mut by_snap: Vec<usize> = (0..halos.len()).collect();
    by_snap.sort_by_key(|&idx| halos.get(idx).map_or(u32::MAX, |h| h.snap_num));

    let mut marks = vec![Mark::Unvisited; halos.len()];
    let mut order = Vec::with_capacity(halos.len());
    let mut stack: Vec<(usize, bool)> = Vec::new();
    for &start in &by_snap {
        stack.push((start, false));
        while let Some((idx, expanded)) = stack.pop() {
            let Some(mark) = marks.get_mut(idx) else {
                continue;
            };
            if expanded {
                *mark = Mark::Placed;
                order.push(idx);
                continue;
            }
            if *mark != Mark::Unvisited {
                continue;
            }
            *mark = Mark::Open;
            stack.push((idx, true));
            for prog in same_snapshot_progenitors(halos, idx).into_iter().rev() {
                if marks.get(prog) == Some(&Mark::Unvisited) {
                    stack.push((prog, false));
                }
            }
        }
    }
    order
}

/// Progenitors of `halo_nr` that sit at its own snapshot, in chain order.
fn same_snapshot_progenitors(halos: &[Halo], halo_nr: usize) -> Vec<usize> {
    let Some(halo) = halos.get(halo_nr) else {
        return Vec::new();
    };
    let mut found = Vec::new();
    let mut next = halo.first_progenitor;
    // Bounded walk: a looping sibling chain cannot hold more than every halo.
    for _ in 0..halos.len() {
        let Some(prog) = next else {
            break;
        };
        let Some(progenitor) = halos.get(prog) else {
            break;
        };
        if progenitor.snap_num == halo.snap_num && prog != halo_nr {
            found.push(prog);
        }
        next = progenitor.next_progenitor;
    }
    found
}

/// Process every halo of the context's forest.
///
/// # Errors
///
/// Returns the first [`TreeError`] raised by a traversal step, the
/// pipeline, or an output extraction. Halos already processed keep their
/// galaxies.
pub fn process_forest(
    ctx: &mut TreeContext<'_>,
    pipeline: &mut dyn PhysicsPipeline,
    output_snapshots: &[u32],
) -> Result<ForestSummary, TreeError> {
    let halos = ctx.halos();
    let order = snapshot_order(halos);
    let mut summary = ForestSummary {
        halos: order.len(),
        ..ForestSummary::default()
    };

    let mut visits = order.iter().peekable();
    while let Some(&halo_nr) = visits.next() {
        let Some(halo) = halos.get(halo_nr) else {
            continue;
        };

        ctx.collect(halo_nr)?;
        ctx.inherit(halo_nr)?;
        pipeline
            .evolve(halo_nr, halo, ctx.galaxies_of_mut(halo_nr))
            .map_err(|source| TreeError::Pipeline { halo_nr, source })?;

        let snapshot_finished = visits
            .peek()
            .and_then(|&&next| halos.get(next))
            .is_none_or(|next| next.snap_num != halo.snap_num);
        if snapshot_finished && output_snapshots.contains(&halo.snap_num) {
            summary.output_galaxies = ctx.extract_output(halo.snap_num)?;
            summary.outputs_extracted = summary.outputs_extracted.saturating_add(1);
        }
    }

    summary.galaxies = ctx.working().len();
    summary.stats = *ctx.stats();
    info!(
        halos = summary.halos,
        galaxies = summary.galaxies,
        outputs = summary.outputs_extracted,
        orphans = summary.stats.orphans_created,
        gap_events = summary.stats.gap_events,
        "Forest processed"
    );
    Ok(summary)
}
