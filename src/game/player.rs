//! Connected player state that shapes what each viewer receives

use crate::game::constants::limits::MAX_CLIENTS;
use crate::game::state::{PlayerId, WorldError};
use crate::util::vec2::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerTeam {
    #[default]
    Playing,
    Spectators,
}

#[derive(Debug, Clone)]
pub struct Player {
    id: PlayerId,
    client_version: u32,
    pub team: PlayerTeam,
    pub paused: bool,
    /// Player being watched; `None` is free view
    pub spectating: Option<PlayerId>,
    pub view_pos: Vec2,
}

impl Player {
    pub fn new(id: PlayerId, client_version: u32) -> Self {
        Self {
            id,
            client_version,
            team: PlayerTeam::Playing,
            paused: false,
            spectating: None,
            view_pos: Vec2::ZERO,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn client_version(&self) -> u32 {
        self.client_version
    }

    pub fn is_spectator(&self) -> bool {
        self.team == PlayerTeam::Spectators
    }

    /// Whose character this player's view follows
    pub fn watched(&self) -> PlayerId {
        if self.is_spectator() || self.paused {
            if let Some(target) = self.spectating {
                return target;
            }
        }
        self.id
    }
}

/// Fixed arena of connected players
#[derive(Debug, Clone)]
pub struct PlayerTable {
    slots: [Option<Player>; MAX_CLIENTS],
}

impl PlayerTable {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    pub fn connect(&mut self, id: PlayerId, client_version: u32) -> Result<&mut Player, WorldError> {
        let slot = &mut self.slots[id.index()];
        if slot.is_some() {
            return Err(WorldError::SlotOccupied(id));
        }
        Ok(slot.insert(Player::new(id, client_version)))
    }

    pub fn disconnect(&mut self, id: PlayerId) -> Option<Player> {
        self.slots[id.index()].take()
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.slots[id.index()].as_ref()
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.slots[id.index()].as_mut()
    }

    /// Connected players in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.slots.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.slots.iter_mut().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

impl Default for PlayerTable {
    fn default() -> Self {
        Self::new()
    }
}
