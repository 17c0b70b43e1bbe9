//! The merger-tree node supplied by a tree reader.
//!
//! A forest is a flat slice of [`Halo`] values. Tree structure is expressed
//! with index links into that same slice: one link to the descendant, a
//! first-progenitor link plus a sibling chain over all progenitors of the
//! same descendant, and a first/next chain over the members of one
//! friends-of-friends (FOF) group.
//!
//! The engine never mutates halos. Links pointing outside the slice are
//! treated as absent by the consumer.

use serde::{Deserialize, Serialize};

/// A gravitationally bound structure at one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Halo {
    /// Snapshot this halo was identified at.
    pub snap_num: u32,
    /// Number of particles bound to the halo.
    pub len: u32,
    /// Virial mass in 1e10 Msun/h. Non-positive means "derive from `len`".
    #[serde(default)]
    pub mvir: f32,
    /// Comoving position in Mpc/h.
    #[serde(default)]
    pub pos: [f32; 3],
    /// Peculiar velocity in km/s.
    #[serde(default)]
    pub vel: [f32; 3],
    /// Maximum circular velocity in km/s.
    #[serde(default)]
    pub vmax: f32,
    /// Identifier of the most bound particle.
    #[serde(default)]
    pub most_bound_id: i64,

    /// The halo this one becomes at a later snapshot.
    #[serde(default)]
    pub descendant: Option<usize>,
    /// Head of the progenitor sibling chain.
    #[serde(default)]
    pub first_progenitor: Option<usize>,
    /// Next progenitor of the same descendant.
    #[serde(default)]
    pub next_progenitor: Option<usize>,
    /// Root of the FOF group this halo belongs to.
    #[serde(default)]
    pub first_halo_in_fof_group: Option<usize>,
    /// Next member of the same FOF group.
    #[serde(default)]
    pub next_halo_in_fof_group: Option<usize>,
}

impl Halo {
    /// Create an isolated halo: no tree links, zero kinematics.
    pub const fn new(snap_num: u32, len: u32, mvir: f32) -> Self {
        Self {
            snap_num,
            len,
            mvir,
            pos: [0.0; 3],
            vel: [0.0; 3],
            vmax: 0.0,
            most_bound_id: 0,
            descendant: None,
            first_progenitor: None,
            next_progenitor: None,
            first_halo_in_fof_group: None,
            next_halo_in_fof_group: None,
        }
    }

    /// Whether `self_index` (the slot this halo occupies) is the root of
    /// its FOF group.
    pub fn is_fof_root(&self, self_index: usize) -> bool {
        self.first_halo_in_fof_group == Some(self_index)
    }

    /// Whether the tree records at least one progenitor for this halo.
    pub const fn has_progenitor(&self) -> bool {
        self.first_progenitor.is_some()
    }
}
