//! Wire-level tags and protocol version gating

use crate::game::entities::TurretLayer;

pub use crate::game::constants::net::{VERSION_CURRENT, VERSION_ENTITY_EXTRA};

/// Record layout a viewer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapLayout {
    /// Segment records only
    Legacy,
    /// Entity-extra record ahead of the segment
    Extended,
}

impl SnapLayout {
    pub fn for_version(version: u32) -> Self {
        if version >= VERSION_ENTITY_EXTRA {
            SnapLayout::Extended
        } else {
            SnapLayout::Legacy
        }
    }

    pub fn is_extended(self) -> bool {
        self == SnapLayout::Extended
    }
}

/// Snapshot item type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum NetObjType {
    Segment = 1,
    EntityExtra = 2,
    Character = 3,
}

impl NetObjType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(NetObjType::Segment),
            2 => Some(NetObjType::EntityExtra),
            3 => Some(NetObjType::Character),
            _ => None,
        }
    }

    /// Payload size in bytes, excluding the item header
    pub fn payload_size(self) -> usize {
        match self {
            NetObjType::Segment => 5 * 4,
            NetObjType::EntityExtra => 3 * 4,
            NetObjType::Character => 4 * 4,
        }
    }
}

/// Map layer tag carried in the entity-extra record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum LayerTag {
    Normal = 0,
    Switch = 3,
}

impl LayerTag {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(LayerTag::Normal),
            3 => Some(LayerTag::Switch),
            _ => None,
        }
    }
}

impl From<TurretLayer> for LayerTag {
    fn from(layer: TurretLayer) -> Self {
        match layer {
            TurretLayer::Normal => LayerTag::Normal,
            TurretLayer::Switch => LayerTag::Switch,
        }
    }
}

/// How a client should draw an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum EntityClassTag {
    GunNormal = 1,
    GunExplosive = 2,
    GunFreeze = 3,
    GunUnfreeze = 4,
}

impl EntityClassTag {
    pub fn for_turret(explosive: bool, freeze: bool) -> Self {
        match (explosive, freeze) {
            (true, false) => EntityClassTag::GunNormal,
            (true, true) => EntityClassTag::GunExplosive,
            (false, true) => EntityClassTag::GunFreeze,
            (false, false) => EntityClassTag::GunUnfreeze,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(EntityClassTag::GunNormal),
            2 => Some(EntityClassTag::GunExplosive),
            3 => Some(EntityClassTag::GunFreeze),
            4 => Some(EntityClassTag::GunUnfreeze),
            _ => None,
        }
    }
}

/// Bits of the character record's `flags` field
pub mod character_flags {
    pub const FROZEN: i32 = 1 << 0;
    pub const SOLO: i32 = 1 << 1;
}
