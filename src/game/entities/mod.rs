//! Simulated entities and the contexts they tick and snap in
//!
//! Entities never reach global state. Everything a tick may read arrives in a
//! [`TickContext`]; anything that must outlive the entity's own tick (spawns,
//! effects on characters, events) goes through [`Commands`] and is applied by
//! the world after the advance pass.

pub mod character;
pub mod projectile;
pub mod turret;

pub use character::{Character, CharacterRoster};
pub use projectile::Projectile;
pub use turret::{Turret, TurretLayer};

use crate::config::SimConfig;
use crate::game::clock::{Tick, WorldClock};
use crate::game::spatial::SpatialQuery;
use crate::game::state::{EntityClass, EntityId, PlayerId};
use crate::game::switches::SwitchGates;
use crate::net::snapshot::SnapshotBuilder;
use crate::net::viewer::ViewerInfo;
use crate::util::vec2::Vec2;

/// Everything an entity may read during its tick
pub struct TickContext<'a> {
    pub clock: WorldClock,
    pub config: &'a SimConfig,
    pub spatial: &'a dyn SpatialQuery,
    pub characters: &'a CharacterRoster,
    pub switches: &'a SwitchGates,
    pub commands: &'a mut Commands,
}

impl TickContext<'_> {
    #[inline]
    pub fn now(&self) -> Tick {
        self.clock.current_tick()
    }
}

/// Everything an entity may read while producing a snapshot
pub struct SnapContext<'a> {
    pub tick: Tick,
    pub tick_rate: u32,
    pub viewer: &'a ViewerInfo,
    pub switches: &'a SwitchGates,
}

/// Change to a character requested by another entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterEffect {
    Freeze { player: PlayerId, until: Tick },
    Unfreeze { player: PlayerId },
}

/// Notable things that happened during a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameEvent {
    ShotFired { turret: Vec2, target: PlayerId },
    TargetHit { target: PlayerId, freeze: bool },
    Explosion { position: Vec2 },
}

/// Deferred work collected during the advance pass
#[derive(Debug, Default)]
pub struct Commands {
    spawns: Vec<Entity>,
    effects: Vec<CharacterEffect>,
    events: Vec<GameEvent>,
}

impl Commands {
    /// Queue an entity; it joins the registry after the current pass
    pub fn spawn(&mut self, entity: Entity) {
        self.spawns.push(entity);
    }

    pub fn apply(&mut self, effect: CharacterEffect) {
        self.effects.push(effect);
    }

    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn spawns(&self) -> &[Entity] {
        &self.spawns
    }

    pub fn effects(&self) -> &[CharacterEffect] {
        &self.effects
    }

    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    pub(crate) fn take_spawns(&mut self) -> std::vec::Drain<'_, Entity> {
        self.spawns.drain(..)
    }

    pub(crate) fn take_effects(&mut self) -> std::vec::Drain<'_, CharacterEffect> {
        self.effects.drain(..)
    }

    pub(crate) fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Shared capability of every registry-owned entity
pub trait Simulate {
    fn class(&self) -> EntityClass;

    fn position(&self) -> Vec2;

    fn is_marked_for_destroy(&self) -> bool;

    /// Run one tick of game logic
    fn advance(&mut self, ctx: &mut TickContext<'_>);

    /// Mark for removal at the next sweep
    fn reset(&mut self);

    /// Append this entity's records for one viewer
    fn snap(&self, id: EntityId, ctx: &SnapContext<'_>, out: &mut SnapshotBuilder);
}

/// Registry-owned entity kinds
#[derive(Debug, Clone)]
pub enum Entity {
    Turret(Turret),
    Projectile(Projectile),
}

impl Entity {
    pub fn as_turret(&self) -> Option<&Turret> {
        match self {
            Entity::Turret(turret) => Some(turret),
            _ => None,
        }
    }

    pub fn as_projectile(&self) -> Option<&Projectile> {
        match self {
            Entity::Projectile(projectile) => Some(projectile),
            _ => None,
        }
    }
}

impl Simulate for Entity {
    fn class(&self) -> EntityClass {
        match self {
            Entity::Turret(e) => e.class(),
            Entity::Projectile(e) => e.class(),
        }
    }

    fn position(&self) -> Vec2 {
        match self {
            Entity::Turret(e) => e.position(),
            Entity::Projectile(e) => e.position(),
        }
    }

    fn is_marked_for_destroy(&self) -> bool {
        match self {
            Entity::Turret(e) => e.is_marked_for_destroy(),
            Entity::Projectile(e) => e.is_marked_for_destroy(),
        }
    }

    fn advance(&mut self, ctx: &mut TickContext<'_>) {
        match self {
            Entity::Turret(e) => e.advance(ctx),
            Entity::Projectile(e) => e.advance(ctx),
        }
    }

    fn reset(&mut self) {
        match self {
            Entity::Turret(e) => e.reset(),
            Entity::Projectile(e) => e.reset(),
        }
    }

    fn snap(&self, id: EntityId, ctx: &SnapContext<'_>, out: &mut SnapshotBuilder) {
        match self {
            Entity::Turret(e) => e.snap(id, ctx, out),
            Entity::Projectile(e) => e.snap(id, ctx, out),
        }
    }
}

impl From<Turret> for Entity {
    fn from(turret: Turret) -> Self {
        Entity::Turret(turret)
    }
}

impl From<Projectile> for Entity {
    fn from(projectile: Projectile) -> Self {
        Entity::Projectile(projectile)
    }
}
