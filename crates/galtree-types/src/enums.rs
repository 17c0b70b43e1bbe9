//! Enumeration types for the galtree engine.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Galaxy classification
// ---------------------------------------------------------------------------

/// Classification of a galaxy relative to its host halo.
///
/// The discriminants are stable and match the integer codes used by the
/// output formats (`0`, `1`, `2`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum GalaxyType {
    /// The galaxy sitting at the centre of its own halo.
    #[default]
    Central = 0,
    /// A galaxy whose halo survives inside a larger FOF group.
    Satellite = 1,
    /// A galaxy whose host halo was disrupted; it has no virial mass.
    Orphan = 2,
}

impl GalaxyType {
    /// Integer code used by writers.
    pub const fn code(self) -> i32 {
        match self {
            Self::Central => 0,
            Self::Satellite => 1,
            Self::Orphan => 2,
        }
    }

    /// Decode a writer integer code. Unknown codes return `None`.
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Central),
            1 => Some(Self::Satellite),
            2 => Some(Self::Orphan),
            _ => None,
        }
    }

    /// Whether the galaxy has lost its own halo.
    pub const fn is_orphan(self) -> bool {
        matches!(self, Self::Orphan)
    }
}
