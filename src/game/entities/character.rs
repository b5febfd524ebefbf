//! Player characters: the only thing turrets shoot at

use tracing::trace;

use crate::game::clock::Tick;
use crate::game::constants::limits::MAX_CLIENTS;
use crate::game::entities::SnapContext;
use crate::game::spatial::CollisionMap;
use crate::game::state::{PlayerId, TeamId, WorldError};
use crate::game::targeting::Candidate;
use crate::net::protocol::character_flags;
use crate::net::snapshot::{CharacterRecord, SnapItem, SnapshotBuilder};
use crate::util::vec2::Vec2;

#[derive(Debug, Clone)]
pub struct Character {
    player: PlayerId,
    position: Vec2,
    velocity: Vec2,
    team: TeamId,
    solo: bool,
    alive: bool,
    frozen_until: Option<Tick>,
    marked_for_destroy: bool,
}

impl Character {
    pub fn new(player: PlayerId, position: Vec2) -> Self {
        Self {
            player,
            position,
            velocity: Vec2::ZERO,
            team: TeamId::FLOCK,
            solo: false,
            alive: true,
            frozen_until: None,
            marked_for_destroy: false,
        }
    }

    #[inline]
    pub fn player(&self) -> PlayerId {
        self.player
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
    }

    /// Move without collision checks (spawning, teleports)
    pub fn teleport(&mut self, position: Vec2) {
        self.position = position;
    }

    #[inline]
    pub fn team(&self) -> TeamId {
        self.team
    }

    pub fn set_team(&mut self, team: TeamId) {
        self.team = team;
    }

    #[inline]
    pub fn is_solo(&self) -> bool {
        self.solo
    }

    pub fn set_solo(&mut self, solo: bool) {
        self.solo = solo;
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen_until.is_some()
    }

    pub fn frozen_until(&self) -> Option<Tick> {
        self.frozen_until
    }

    /// Freeze until `until`; an existing longer freeze is kept
    pub fn freeze(&mut self, until: Tick) {
        self.frozen_until = Some(self.frozen_until.map_or(until, |current| current.max(until)));
        self.velocity = Vec2::ZERO;
    }

    pub fn unfreeze(&mut self) {
        self.frozen_until = None;
    }

    /// Die now; the character leaves the world at the next sweep
    pub fn kill(&mut self) {
        self.alive = false;
        self.marked_for_destroy = true;
    }

    pub fn is_marked_for_destroy(&self) -> bool {
        self.marked_for_destroy
    }

    pub fn candidate(&self) -> Candidate {
        Candidate {
            player: self.player,
            team: self.team,
            solo: self.solo,
            alive: self.alive,
            position: self.position,
        }
    }

    pub fn advance(&mut self, map: &CollisionMap, now: Tick) {
        if !self.alive {
            return;
        }

        if let Some(until) = self.frozen_until {
            if now >= until {
                trace!("Character {} thawed at tick {}", self.player, now);
                self.frozen_until = None;
            } else {
                return;
            }
        }

        let next = self.position + self.velocity;
        if map.is_solid(next) {
            self.velocity = Vec2::ZERO;
        } else {
            self.position = next;
        }
    }

    pub fn snap(&self, ctx: &SnapContext<'_>, out: &mut SnapshotBuilder) {
        if ctx.viewer.is_clipped(self.position) {
            return;
        }

        let mut flags = 0;
        if self.is_frozen() {
            flags |= character_flags::FROZEN;
        }
        if self.solo {
            flags |= character_flags::SOLO;
        }

        let (x, y) = self.position.to_wire();
        let record = CharacterRecord {
            x,
            y,
            team: self.team.index() as i32,
            flags,
        };
        if let Err(e) = out.push(self.player.index() as u32, SnapItem::Character(record)) {
            trace!("Dropped character {} from snapshot: {}", self.player, e);
        }
    }
}

/// Fixed arena of characters indexed by player id
#[derive(Debug, Clone)]
pub struct CharacterRoster {
    slots: [Option<Character>; MAX_CLIENTS],
}

impl CharacterRoster {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    #[inline]
    pub fn get(&self, player: PlayerId) -> Option<&Character> {
        self.slots[player.index()].as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, player: PlayerId) -> Option<&mut Character> {
        self.slots[player.index()].as_mut()
    }

    pub fn insert(&mut self, character: Character) -> Result<(), WorldError> {
        let slot = &mut self.slots[character.player.index()];
        if slot.is_some() {
            return Err(WorldError::SlotOccupied(character.player));
        }
        *slot = Some(character);
        Ok(())
    }

    pub fn remove(&mut self, player: PlayerId) -> Option<Character> {
        self.slots[player.index()].take()
    }

    /// Live characters in ascending player id order
    pub fn iter(&self) -> impl Iterator<Item = &Character> {
        self.slots.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

impl Default for CharacterRoster {
    fn default() -> Self {
        Self::new()
    }
}
