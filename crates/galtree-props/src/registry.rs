//! The fixed property schema and name resolution.
//!
//! Every galaxy property is declared once in the table at the bottom of
//! this module. The declaration macro turns it into:
//!
//! - a [`Property`] enum whose discriminants are the stable identifiers,
//! - a static [`PropertyInfo`] table indexed by those identifiers.
//!
//! Names are resolved to a [`PropertyId`] through a name index that is
//! built on first use and cached for the lifetime of the process, so the
//! hot path never parses strings.
//!
//! Core properties mirror the plain fields of
//! [`Galaxy`](crate::Galaxy). Physics properties live in the record's
//! [`PhysicsBlock`](crate::PhysicsBlock) in declaration order.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::Serialize;

/// Number of sub-steps per snapshot interval tracked by the star
/// formation rate arrays.
pub const STEPS: usize = 10;

// ---------------------------------------------------------------------------
// Schema vocabulary
// ---------------------------------------------------------------------------

/// Where a property is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StorageClass {
    /// A plain field on the galaxy record.
    Core,
    /// An entry of the record's physics block.
    Physics,
}

/// The element type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValueType {
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// Single-precision float.
    Float,
    /// Double-precision float.
    Double,
    /// Boolean flag.
    Bool,
}

/// The shape of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Shape {
    /// A single value.
    Scalar,
    /// An array whose length is fixed by the schema.
    Fixed(usize),
    /// An array with one entry per output snapshot of the run.
    Dynamic,
}

/// A dynamically typed property value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Value {
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// Single-precision float.
    Float(f32),
    /// Double-precision float.
    Double(f64),
    /// Boolean flag.
    Bool(bool),
}

impl Value {
    /// The [`ValueType`] this value carries.
    pub const fn value_type(self) -> ValueType {
        match self {
            Self::Int32(_) => ValueType::Int32,
            Self::Int64(_) => ValueType::Int64,
            Self::Float(_) => ValueType::Float,
            Self::Double(_) => ValueType::Double,
            Self::Bool(_) => ValueType::Bool,
        }
    }
}

/// Static description of one property.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PropertyInfo {
    /// Name used by configuration files and writers.
    pub name: &'static str,
    /// Storage tier.
    pub class: StorageClass,
    /// Element type.
    pub value_type: ValueType,
    /// Scalar or array shape.
    pub shape: Shape,
    /// Initial value of every element when a physics block is allocated.
    pub default: Value,
}

impl PropertyInfo {
    /// Whether the property is stored as an array.
    pub const fn is_array(&self) -> bool {
        !matches!(self.shape, Shape::Scalar)
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Stable numeric identifier of a property.
///
/// Identifiers are dense: `0..PROPERTY_COUNT`. [`PropertyId::NOT_FOUND`]
/// equals `PROPERTY_COUNT` and is what [`resolve`] returns for names that
/// are not in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PropertyId(u16);

impl PropertyId {
    /// Sentinel identifier for unknown names.
    #[allow(clippy::cast_possible_truncation)]
    pub const NOT_FOUND: Self = Self(PROPERTY_COUNT as u16);

    /// Build an identifier from its raw value. Values outside the schema
    /// are accepted and simply never match a property.
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// The raw numeric value.
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// The identifier as a table index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether the identifier names a property of the schema.
    pub const fn is_valid(self) -> bool {
        self.index() < PROPERTY_COUNT
    }
}

impl From<Property> for PropertyId {
    fn from(property: Property) -> Self {
        Self(property as u16)
    }
}

impl core::fmt::Display for PropertyId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Declaration macro
// ---------------------------------------------------------------------------

/// Generates the [`Property`] enum and the static schema table.
macro_rules! define_properties {
    (
        $(
            $(#[$meta:meta])*
            $variant:ident : $class:ident $vtype:ident $shape:expr => $default:expr;
        )*
    ) => {
        /// Every property of a galaxy record, in identifier order.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[repr(u16)]
        pub enum Property {
            $(
                $(#[$meta])*
                $variant,
            )*
        }

        impl Property {
            /// All properties in identifier order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),*];

            /// Schema name of the property.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant),)*
                }
            }

            /// Static description of the property.
            pub const fn info(self) -> &'static PropertyInfo {
                match self {
                    $(
                        Self::$variant => &PropertyInfo {
                            name: stringify!($variant),
                            class: StorageClass::$class,
                            value_type: ValueType::$vtype,
                            shape: $shape,
                            default: Value::$vtype($default),
                        },
                    )*
                }
            }
        }
    };
}

define_properties! {
    // --- Core: identity and halo linkage ---
    /// Per-forest galaxy number.
    GalaxyNr: Core Int32 Shape::Scalar => 0;
    /// Globally unique galaxy index.
    GalaxyIndex: Core Int64 Shape::Scalar => 0;
    /// Working-array index of the galaxy's central.
    CentralGal: Core Int32 Shape::Scalar => -1;
    /// Halo the galaxy currently belongs to.
    HaloNr: Core Int32 Shape::Scalar => -1;
    /// Classification code (see `GalaxyType`).
    Type: Core Int32 Shape::Scalar => 0;
    /// Snapshot of the last update.
    SnapNum: Core Int32 Shape::Scalar => -1;
    /// Particle count of the host halo.
    Len: Core Int32 Shape::Scalar => 0;

    // --- Core: kinematics and virial quantities ---
    /// Virial mass.
    Mvir: Core Float Shape::Scalar => 0.0;
    /// Virial radius.
    Rvir: Core Float Shape::Scalar => 0.0;
    /// Virial velocity.
    Vvir: Core Float Shape::Scalar => 0.0;
    /// Maximum circular velocity.
    Vmax: Core Float Shape::Scalar => 0.0;
    /// Comoving position.
    Pos: Core Float Shape::Fixed(3) => 0.0;
    /// Peculiar velocity.
    Vel: Core Float Shape::Fixed(3) => 0.0;
    /// Most bound particle identifier.
    MostBoundId: Core Int64 Shape::Scalar => 0;

    // --- Physics: baryonic reservoirs ---
    /// Cold disk gas mass.
    ColdGas: Physics Float Shape::Scalar => 0.0;
    /// Stellar mass (disk plus bulge).
    StellarMass: Physics Float Shape::Scalar => 0.0;
    /// Bulge stellar mass.
    BulgeMass: Physics Float Shape::Scalar => 0.0;
    /// Hot halo gas mass.
    HotGas: Physics Float Shape::Scalar => 0.0;
    /// Gas ejected beyond the halo.
    EjectedMass: Physics Float Shape::Scalar => 0.0;
    /// Central black hole mass.
    BlackHoleMass: Physics Float Shape::Scalar => 0.0;
    /// Intra-cluster stellar mass.
    IntraClusterStars: Physics Float Shape::Scalar => 0.0;

    // --- Physics: metals ---
    /// Metals in the cold gas.
    MetalsColdGas: Physics Float Shape::Scalar => 0.0;
    /// Metals in stars.
    MetalsStellarMass: Physics Float Shape::Scalar => 0.0;
    /// Metals in the bulge.
    MetalsBulgeMass: Physics Float Shape::Scalar => 0.0;
    /// Metals in the hot gas.
    MetalsHotGas: Physics Float Shape::Scalar => 0.0;
    /// Metals in the ejected gas.
    MetalsEjectedMass: Physics Float Shape::Scalar => 0.0;
    /// Metals in intra-cluster stars.
    MetalsIntraClusterStars: Physics Float Shape::Scalar => 0.0;

    // --- Physics: energetics and structure ---
    /// Cooling energy rate.
    Cooling: Physics Double Shape::Scalar => 0.0;
    /// AGN heating energy rate.
    Heating: Physics Double Shape::Scalar => 0.0;
    /// Exponential disk scale radius.
    DiskScaleRadius: Physics Float Shape::Scalar => 0.0;
    /// Mass outflow rate.
    OutflowRate: Physics Float Shape::Scalar => 0.0;

    // --- Physics: merger bookkeeping ---
    /// Remaining time until the galaxy merges.
    MergeTime: Physics Float Shape::Scalar => 999.9;
    /// How the galaxy ended (0 = still alive).
    MergeType: Physics Int32 Shape::Scalar => 0;
    /// Galaxy number this galaxy merged into.
    MergeIntoId: Physics Int32 Shape::Scalar => -1;
    /// Snapshot of that merge.
    MergeIntoSnapNum: Physics Int32 Shape::Scalar => -1;
    /// Virial mass just before the host halo was lost.
    InfallMvir: Physics Float Shape::Scalar => 0.0;
    /// Virial velocity just before the host halo was lost.
    InfallVvir: Physics Float Shape::Scalar => 0.0;
    /// Maximum circular velocity just before the host halo was lost.
    InfallVmax: Physics Float Shape::Scalar => 0.0;
    /// Time of the last major merger.
    TimeOfLastMajorMerger: Physics Float Shape::Scalar => -1.0;
    /// Time of the last minor merger.
    TimeOfLastMinorMerger: Physics Float Shape::Scalar => -1.0;
    /// Snapshots elapsed since the galaxy lost its halo.
    SnapshotsSinceInfall: Physics Int64 Shape::Scalar => 0;
    /// Whether the galaxy has been absorbed by another.
    IsMerged: Physics Bool Shape::Scalar => false;

    // --- Physics: per-step and per-output histories ---
    /// Disk star formation rate per sub-step.
    SfrDisk: Physics Float Shape::Fixed(STEPS) => 0.0;
    /// Bulge star formation rate per sub-step.
    SfrBulge: Physics Float Shape::Fixed(STEPS) => 0.0;
    /// Cold gas available to disk star formation per sub-step.
    SfrDiskColdGas: Physics Float Shape::Fixed(STEPS) => 0.0;
    /// Stellar mass at every output snapshot.
    StellarMassHistory: Physics Double Shape::Dynamic => 0.0;
    /// Host halo number at every output snapshot (`-1` before formation).
    HaloHistory: Physics Int32 Shape::Dynamic => -1;
}

/// Total number of properties; also the value of [`PropertyId::NOT_FOUND`].
pub const PROPERTY_COUNT: usize = Property::ALL.len();

const _: () = assert!(PROPERTY_COUNT < u16::MAX as usize);

impl Property {
    /// Look up the enum variant for an identifier.
    pub fn from_id(id: PropertyId) -> Option<Self> {
        Self::ALL.get(id.index()).copied()
    }
}

// ---------------------------------------------------------------------------
// Cached name index
// ---------------------------------------------------------------------------

/// Lookup structures derived from the static table on first use.
struct Registry {
    /// Name -> identifier.
    by_name: BTreeMap<&'static str, PropertyId>,
    /// Identifier -> slot in the physics block (`None` for core).
    physics_slot: Vec<Option<usize>>,
    /// Physics identifiers in slot order.
    physics: Vec<PropertyId>,
}

impl Registry {
    fn build() -> Self {
        let mut by_name = BTreeMap::new();
        let mut physics_slot = Vec::with_capacity(PROPERTY_COUNT);
        let mut physics = Vec::new();

        for &property in Property::ALL {
            let id = PropertyId::from(property);
            let info = property.info();
            by_name.insert(info.name, id);
            if info.class == StorageClass::Physics {
                physics_slot.push(Some(physics.len()));
                physics.push(id);
            } else {
                physics_slot.push(None);
            }
        }

        tracing::debug!(
            properties = PROPERTY_COUNT,
            physics = physics.len(),
            "Property registry built"
        );

        Self {
            by_name,
            physics_slot,
            physics,
        }
    }
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Registry::build)
}

/// Resolve a property name to its identifier.
///
/// Matching is exact and case-sensitive. Unknown or empty names return
/// [`PropertyId::NOT_FOUND`].
pub fn resolve(name: &str) -> PropertyId {
    if name.is_empty() {
        return PropertyId::NOT_FOUND;
    }
    registry()
        .by_name
        .get(name)
        .copied()
        .unwrap_or(PropertyId::NOT_FOUND)
}

/// Static description of the property with identifier `id`.
pub fn property_info(id: PropertyId) -> Option<&'static PropertyInfo> {
    Property::from_id(id).map(Property::info)
}

/// Slot of `id` inside a physics block, or `None` for core and unknown ids.
pub(crate) fn physics_slot(id: PropertyId) -> Option<usize> {
    registry().physics_slot.get(id.index()).copied().flatten()
}

/// Number of physics properties (slots per block).
pub fn physics_count() -> usize {
    registry().physics.len()
}

/// Physics properties in block order.
pub fn physics_properties() -> impl Iterator<Item = (PropertyId, &'static PropertyInfo)> {
    registry()
        .physics
        .iter()
        .filter_map(|&id| property_info(id).map(|info| (id, info)))
}
