//! Vehicle classes and the bit masks edges use to admit them.
//!
//! `ClassMask` is a bit set over `VehicleClass`.  `LayerMask` is the same
//! shape for network layers: two edges interact (conflicts, lane changes)
//! only when their layer masks share a bit, so a bridge and the road under it
//! never meet.

/// The kind of vehicle.  Drives default physical and driver parameters.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VehicleClass {
    #[default]
    Car,
    Bus,
    Tram,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 3] = [VehicleClass::Car, VehicleClass::Bus, VehicleClass::Tram];

    /// Human-readable label, useful for CSV/Parquet column values.
    pub fn as_str(self) -> &'static str {
        match self {
            VehicleClass::Car  => "car",
            VehicleClass::Bus  => "bus",
            VehicleClass::Tram => "tram",
        }
    }

    #[inline]
    fn bit(self) -> u8 {
        match self {
            VehicleClass::Car  => 0b001,
            VehicleClass::Bus  => 0b010,
            VehicleClass::Tram => 0b100,
        }
    }
}

impl std::fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── ClassMask ─────────────────────────────────────────────────────────────────

/// Set of vehicle classes allowed on an edge.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassMask(u8);

impl ClassMask {
    pub const NONE: ClassMask = ClassMask(0);
    pub const ALL: ClassMask = ClassMask(0b111);
    /// Cars and buses, but no trams.
    pub const ROAD: ClassMask = ClassMask(0b011);
    pub const TRAM_ONLY: ClassMask = ClassMask(0b100);

    pub fn only(class: VehicleClass) -> Self {
        ClassMask(class.bit())
    }

    #[inline]
    pub fn allows(self, class: VehicleClass) -> bool {
        self.0 & class.bit() != 0
    }

    #[must_use]
    pub fn with(self, class: VehicleClass) -> Self {
        ClassMask(self.0 | class.bit())
    }

    #[must_use]
    pub fn without(self, class: VehicleClass) -> Self {
        ClassMask(self.0 & !class.bit())
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for ClassMask {
    fn default() -> Self {
        ClassMask::ROAD
    }
}

// ── LayerMask ─────────────────────────────────────────────────────────────────

/// Network layers an edge lives on.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const GROUND: LayerMask = LayerMask(1);

    #[inline]
    pub fn overlaps(self, other: LayerMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        LayerMask::GROUND
    }
}
