//! Identifiers shared by the simulation and the wire format

use std::fmt;

use crate::game::constants::limits::{MAX_CLIENTS, MAX_TEAMS};

/// Client slot index, bounded by `MAX_CLIENTS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(u8);

impl PlayerId {
    /// Returns `None` when `index` is outside the client arena
    pub fn new(index: usize) -> Option<Self> {
        (index < MAX_CLIENTS).then_some(Self(index as u8))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Every valid player id in ascending order
    pub fn all() -> impl Iterator<Item = PlayerId> {
        (0..MAX_CLIENTS).map(|i| PlayerId(i as u8))
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Competitive team, or the reserved super team which turrets ignore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TeamId(u8);

impl TeamId {
    /// Default team every character starts in
    pub const FLOCK: TeamId = TeamId(0);
    /// Immune to turrets
    pub const SUPER: TeamId = TeamId(MAX_TEAMS as u8);

    /// Returns `None` for indices past the super team
    pub fn new(index: usize) -> Option<Self> {
        (index <= MAX_TEAMS).then_some(Self(index as u8))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn is_super(self) -> bool {
        self == Self::SUPER
    }
}

/// Registry-assigned id for non-character entities; also the snapshot item id
pub type EntityId = u32;

/// Entity class used by radius queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityClass {
    Character,
    Turret,
    Projectile,
}

/// Errors from world mutations requested by the outer layers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    #[error("Player {0} already has a character")]
    SlotOccupied(PlayerId),
    #[error("Player {0} has no character")]
    UnknownCharacter(PlayerId),
}
