//! Entity registry and the per-tick update pass
//!
//! One tick runs in fixed phases:
//! 1. advance the clock
//! 2. rebuild the spatial index from current positions
//! 3. advance every live entity once, in insertion order; its index entry
//!    follows it, so later entities query live positions
//! 4. apply deferred character effects, then append spawned entities
//! 5. sweep entities marked for destruction, keeping the order of the rest
//!
//! Entities spawned during a tick first advance on the following tick.

use tracing::{debug, info};

use crate::config::SimConfig;
use crate::game::clock::{Tick, WorldClock};
use crate::game::constants::character::PROXIMITY_RADIUS;
use crate::game::entities::{
    Character, CharacterEffect, CharacterRoster, Commands, Entity, GameEvent, Simulate,
    SnapContext, TickContext, Turret,
};
use crate::game::spatial::{CollisionMap, SpatialHandle, SpatialIndex, WorldSpatial};
use crate::game::state::{EntityClass, EntityId, PlayerId, TeamId, WorldError};
use crate::game::switches::SwitchGates;
use crate::net::snapshot::SnapshotBuilder;
use crate::net::viewer::ViewerInfo;
use crate::util::vec2::Vec2;

#[derive(Debug, Clone)]
enum Body {
    /// Lives in the character roster
    Character(PlayerId),
    Entity(Entity),
}

#[derive(Debug, Clone)]
struct Entry {
    id: EntityId,
    body: Body,
}

/// What happened during one tick
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub tick: Tick,
    pub advanced: usize,
    pub spawned: usize,
    pub removed: usize,
    pub events: Vec<GameEvent>,
}

impl TickReport {
    pub fn shots_fired(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, GameEvent::ShotFired { .. }))
            .count()
    }

    pub fn targets_hit(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, GameEvent::TargetHit { .. }))
            .count()
    }
}

pub struct World {
    clock: WorldClock,
    map: CollisionMap,
    switches: SwitchGates,
    characters: CharacterRoster,
    entries: Vec<Entry>,
    index: SpatialIndex,
    commands: Commands,
    next_id: EntityId,
}

impl World {
    pub fn new(map: CollisionMap, tick_rate: u32) -> Self {
        Self::with_clock(map, WorldClock::new(tick_rate))
    }

    pub fn with_clock(map: CollisionMap, clock: WorldClock) -> Self {
        Self {
            clock,
            map,
            switches: SwitchGates::new(),
            characters: CharacterRoster::new(),
            entries: Vec::with_capacity(256),
            index: SpatialIndex::default(),
            commands: Commands::default(),
            next_id: 0,
        }
    }

    pub fn clock(&self) -> &WorldClock {
        &self.clock
    }

    pub fn current_tick(&self) -> Tick {
        self.clock.current_tick()
    }

    pub fn map(&self) -> &CollisionMap {
        &self.map
    }

    pub fn switches(&self) -> &SwitchGates {
        &self.switches
    }

    /// Switch state is written between ticks only
    pub fn switches_mut(&mut self) -> &mut SwitchGates {
        &mut self.switches
    }

    pub fn characters(&self) -> &CharacterRoster {
        &self.characters
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    fn insert(&mut self, entity: Entity) -> EntityId {
        let id = self.allocate_id();
        self.entries.push(Entry {
            id,
            body: Body::Entity(entity),
        });
        id
    }

    // ========================================================================
    // Spawning and outer-layer mutations
    // ========================================================================

    pub fn spawn_turret(&mut self, turret: Turret) -> EntityId {
        let position = turret.position();
        let id = self.insert(Entity::Turret(turret));
        debug!("Spawned turret {} at ({:.0}, {:.0})", id, position.x, position.y);
        id
    }

    pub fn spawn_entity(&mut self, entity: Entity) -> EntityId {
        self.insert(entity)
    }

    pub fn spawn_character(&mut self, player: PlayerId, position: Vec2) -> Result<EntityId, WorldError> {
        self.characters.insert(Character::new(player, position))?;
        let id = self.allocate_id();
        self.entries.push(Entry {
            id,
            body: Body::Character(player),
        });
        debug!("Spawned character {} at ({:.0}, {:.0})", player, position.x, position.y);
        Ok(id)
    }

    fn character_mut(&mut self, player: PlayerId) -> Result<&mut Character, WorldError> {
        self.characters
            .get_mut(player)
            .filter(|c| !c.is_marked_for_destroy())
            .ok_or(WorldError::UnknownCharacter(player))
    }

    /// Kill a character; it leaves the world at the next sweep
    pub fn kill(&mut self, player: PlayerId) -> Result<(), WorldError> {
        self.character_mut(player)?.kill();
        debug!("Killed character {}", player);
        Ok(())
    }

    pub fn set_team(&mut self, player: PlayerId, team: TeamId) -> Result<(), WorldError> {
        self.character_mut(player)?.set_team(team);
        Ok(())
    }

    pub fn set_solo(&mut self, player: PlayerId, solo: bool) -> Result<(), WorldError> {
        self.character_mut(player)?.set_solo(solo);
        Ok(())
    }

    pub fn set_velocity(&mut self, player: PlayerId, velocity: Vec2) -> Result<(), WorldError> {
        self.character_mut(player)?.set_velocity(velocity);
        Ok(())
    }

    /// Mark every non-character entity for removal at the next sweep
    pub fn reset(&mut self) {
        let mut marked = 0;
        for entry in &mut self.entries {
            if let Body::Entity(entity) = &mut entry.body {
                entity.reset();
                marked += 1;
            }
        }
        info!("World reset: {} entities marked for removal", marked);
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entries.iter().find(|e| e.id == id).and_then(|e| match &e.body {
            Body::Entity(entity) => Some(entity),
            Body::Character(_) => None,
        })
    }

    /// Non-character entities in insertion order
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entries.iter().filter_map(|e| match &e.body {
            Body::Entity(entity) => Some((e.id, entity)),
            Body::Character(_) => None,
        })
    }

    /// Registry size, characters included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, class: EntityClass) -> usize {
        match class {
            EntityClass::Character => self.characters.len(),
            _ => self.entities().filter(|(_, e)| e.class() == class).count(),
        }
    }

    // ========================================================================
    // Tick
    // ========================================================================

    fn rebuild_index(&mut self) {
        self.index.clear();
        for entry in &self.entries {
            match &entry.body {
                Body::Character(player) => {
                    if let Some(character) = self.characters.get(*player) {
                        self.index.insert(
                            SpatialHandle::Character(*player),
                            EntityClass::Character,
                            character.position(),
                            PROXIMITY_RADIUS,
                        );
                    }
                }
                Body::Entity(entity) => {
                    self.index.insert(
                        SpatialHandle::Entity(entry.id),
                        entity.class(),
                        entity.position(),
                        0.0,
                    );
                }
            }
        }
    }

    pub fn tick(&mut self, config: &SimConfig) -> TickReport {
        let now = self.clock.advance();
        self.rebuild_index();

        let World {
            clock,
            map,
            switches,
            characters,
            entries,
            index,
            commands,
            ..
        } = self;

        let mut advanced = 0;
        for entry in entries.iter_mut() {
            match &mut entry.body {
                Body::Character(player) => {
                    if let Some(character) = characters.get_mut(*player) {
                        if !character.is_marked_for_destroy() {
                            let from = character.position();
                            character.advance(&*map, now);
                            index.relocate(SpatialHandle::Character(*player), from, character.position());
                            advanced += 1;
                        }
                    }
                }
                Body::Entity(entity) => {
                    if entity.is_marked_for_destroy() {
                        continue;
                    }
                    let from = entity.position();
                    let spatial = WorldSpatial {
                        map: &*map,
                        index: &*index,
                    };
                    let mut ctx = TickContext {
                        clock: *clock,
                        config,
                        spatial: &spatial,
                        characters: &*characters,
                        switches: &*switches,
                        commands: &mut *commands,
                    };
                    entity.advance(&mut ctx);
                    index.relocate(SpatialHandle::Entity(entry.id), from, entity.position());
                    advanced += 1;
                }
            }
        }

        for effect in commands.take_effects() {
            match effect {
                CharacterEffect::Freeze { player, until } => {
                    if let Some(character) = characters.get_mut(player).filter(|c| c.is_alive()) {
                        character.freeze(until);
                    }
                }
                CharacterEffect::Unfreeze { player } => {
                    if let Some(character) = characters.get_mut(player) {
                        character.unfreeze();
                    }
                }
            }
        }

        let spawns: Vec<Entity> = commands.take_spawns().collect();
        let events = commands.take_events();
        let spawned = spawns.len();
        for entity in spawns {
            self.insert(entity);
        }

        let removed = self.sweep();

        TickReport {
            tick: now,
            advanced,
            spawned,
            removed,
            events,
        }
    }

    /// Drop marked entities and dead characters, preserving order
    fn sweep(&mut self) -> usize {
        let before = self.entries.len();
        let characters = &mut self.characters;
        self.entries.retain(|entry| match &entry.body {
            Body::Character(player) => {
                let gone = characters
                    .get(*player)
                    .map_or(true, Character::is_marked_for_destroy);
                if gone {
                    characters.remove(*player);
                }
                !gone
            }
            Body::Entity(entity) => !entity.is_marked_for_destroy(),
        });
        before - self.entries.len()
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Append every visible entity's records for one viewer, in registry order
    pub fn snap(&self, viewer: &ViewerInfo, out: &mut SnapshotBuilder) {
        let ctx = SnapContext {
            tick: self.clock.current_tick(),
            tick_rate: self.clock.ticks_per_second(),
            viewer,
            switches: &self.switches,
        };
        for entry in &self.entries {
            match &entry.body {
                Body::Character(player) => {
                    if let Some(character) = self.characters.get(*player) {
                        character.snap(&ctx, out);
                    }
                }
                Body::Entity(entity) => entity.snap(entry.id, &ctx, out),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::Projectile;
    use crate::net::protocol::SnapLayout;
    use crate::net::snapshot::{decode, SnapItem, SnapshotLimits};

    fn pid(i: usize) -> PlayerId {
        PlayerId::new(i).unwrap()
    }

    /// Open map with the clock well past every turret's first cooldown
    fn open_world() -> World {
        World::with_clock(CollisionMap::open(100, 100), WorldClock::starting_at(1000, 50))
    }

    fn viewer_at(view_pos: Vec2, layout: SnapLayout) -> ViewerInfo {
        ViewerInfo {
            layout,
            view_pos,
            team: None,
            clips: true,
        }
    }

    #[test]
    fn test_tick_advances_clock() {
        let mut world = World::new(CollisionMap::open(4, 4), 50);
        let config = SimConfig::default();
        assert_eq!(world.tick(&config).tick, 1);
        assert_eq!(world.tick(&config).tick, 2);
        assert_eq!(world.current_tick(), 2);
    }

    #[test]
    fn test_turret_fires_and_projectile_joins_next_tick() {
        let mut world = open_world();
        let config = SimConfig::default();
        world.spawn_character(pid(0), Vec2::new(400.0, 500.0)).unwrap();
        world.spawn_turret(Turret::new(Vec2::new(500.0, 500.0), 0));

        let report = world.tick(&config);
        assert_eq!(report.shots_fired(), 1);
        assert_eq!(report.spawned, 1);
        // Character and turret only; the new plasma waits for the next tick
        assert_eq!(report.advanced, 2);
        assert_eq!(world.count(EntityClass::Projectile), 1);

        let report = world.tick(&config);
        assert_eq!(report.advanced, 3);
    }

    #[test]
    fn test_plasma_freezes_character() {
        let mut world = open_world();
        let config = SimConfig::default();
        world.spawn_character(pid(0), Vec2::new(400.0, 500.0)).unwrap();
        world.spawn_turret(Turret::new(Vec2::new(500.0, 500.0), 0).with_freeze(true));

        let mut hit_at = None;
        for _ in 0..200 {
            let report = world.tick(&config);
            if report.targets_hit() > 0 {
                hit_at = Some(report.tick);
                break;
            }
        }

        let hit_at = hit_at.expect("plasma should reach a character 100 units away");
        let character = world.characters().get(pid(0)).unwrap();
        assert!(character.is_frozen());
        assert!(character.frozen_until().unwrap() > hit_at);
    }

    #[test]
    fn test_sweep_preserves_insertion_order() {
        let mut world = open_world();
        let config = SimConfig {
            shots_per_sec: 0,
            ..SimConfig::default()
        };
        let a = world.spawn_turret(Turret::new(Vec2::new(100.0, 100.0), 0));
        let b = world.spawn_entity(
            Projectile::new(Vec2::new(200.0, 200.0), Vec2::new(1.0, 0.0), pid(5), true, false, 0, 50, &config)
                .into(),
        );
        let c = world.spawn_turret(Turret::new(Vec2::new(300.0, 300.0), 0));

        // The plasma's target does not exist, so it removes itself
        let report = world.tick(&config);
        assert_eq!(report.removed, 1);

        let ids: Vec<EntityId> = world.entities().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![a, c]);
        assert!(world.entity(b).is_none());
    }

    #[test]
    fn test_reset_removes_non_characters_at_next_sweep() {
        let mut world = open_world();
        let config = SimConfig::default();
        world.spawn_character(pid(1), Vec2::new(1000.0, 1000.0)).unwrap();
        world.spawn_turret(Turret::new(Vec2::new(100.0, 100.0), 0));
        world.spawn_turret(Turret::new(Vec2::new(2000.0, 100.0), 0));

        world.reset();
        assert_eq!(world.count(EntityClass::Turret), 2);

        let report = world.tick(&config);
        assert_eq!(report.removed, 2);
        assert_eq!(report.advanced, 1);
        assert_eq!(world.count(EntityClass::Turret), 0);
        assert_eq!(world.count(EntityClass::Character), 1);
    }

    #[test]
    fn test_killed_character_leaves_world() {
        let mut world = open_world();
        let config = SimConfig::default();
        world.spawn_character(pid(2), Vec2::new(100.0, 100.0)).unwrap();

        world.kill(pid(2)).unwrap();
        assert_eq!(world.kill(pid(2)), Err(WorldError::UnknownCharacter(pid(2))));
        assert_eq!(
            world.spawn_character(pid(2), Vec2::ZERO),
            Err(WorldError::SlotOccupied(pid(2)))
        );

        world.tick(&config);
        assert!(world.characters().get(pid(2)).is_none());
        assert!(world.is_empty());
        world.spawn_character(pid(2), Vec2::ZERO).unwrap();
    }

    #[test]
    fn test_dead_character_not_targeted() {
        let mut world = open_world();
        let config = SimConfig::default();
        world.spawn_character(pid(0), Vec2::new(400.0, 500.0)).unwrap();
        world.spawn_turret(Turret::new(Vec2::new(500.0, 500.0), 0));
        world.kill(pid(0)).unwrap();

        assert_eq!(world.tick(&config).shots_fired(), 0);
    }

    #[test]
    fn test_wall_blocks_line_of_sight() {
        let mut rows = vec![".".repeat(20); 5];
        rows[2].replace_range(5..6, "#");
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
        let mut world = World::new(CollisionMap::from_ascii(&rows).unwrap(), 50);
        let config = SimConfig::default();

        world.spawn_character(pid(0), CollisionMap::tile_center(2, 2)).unwrap();
        world.spawn_turret(Turret::new(CollisionMap::tile_center(9, 2), 0));
        for _ in 0..100 {
            assert_eq!(world.tick(&config).shots_fired(), 0);
        }
    }

    #[test]
    fn test_turret_ranges_characters_on_live_position() {
        let config = SimConfig::default();
        let origin = Vec2::new(1000.0, 1000.0);
        // Reach is turret range plus the character's proximity radius
        let reach = config.turret_range + PROXIMITY_RADIUS;

        // Starts inside the reach, steps out before the turret looks
        let mut world = open_world();
        world.spawn_character(pid(0), origin + Vec2::new(reach - 3.0, 0.0)).unwrap();
        world.set_velocity(pid(0), Vec2::new(5.0, 0.0)).unwrap();
        world.spawn_turret(Turret::new(origin, 0));
        assert_eq!(world.tick(&config).shots_fired(), 0);

        // Starts outside, steps in before the turret looks
        let mut world = open_world();
        world.spawn_character(pid(0), origin + Vec2::new(reach + 2.0, 0.0)).unwrap();
        world.set_velocity(pid(0), Vec2::new(-5.0, 0.0)).unwrap();
        world.spawn_turret(Turret::new(origin, 0));
        assert_eq!(world.tick(&config).shots_fired(), 1);
    }

    #[test]
    fn test_switch_gate_changes_between_ticks() {
        let mut world = open_world();
        let config = SimConfig::default();
        world.spawn_character(pid(0), Vec2::new(400.0, 500.0)).unwrap();
        world.spawn_turret(Turret::new(Vec2::new(500.0, 500.0), 0).on_switch(6));
        world.switches_mut().set_all(6, false);

        for _ in 0..50 {
            assert_eq!(world.tick(&config).shots_fired(), 0);
        }
        world.switches_mut().set_all(6, true);
        assert_eq!(world.tick(&config).shots_fired(), 1);
    }

    #[test]
    fn test_snap_clips_and_orders_records() {
        let mut world = open_world();
        world.spawn_character(pid(3), Vec2::new(150.0, 150.0)).unwrap();
        let near = world.spawn_turret(Turret::new(Vec2::new(100.0, 100.0), 0));
        world.spawn_turret(Turret::new(Vec2::new(2500.0, 100.0), 0));

        let mut out = SnapshotBuilder::new(world.current_tick(), SnapshotLimits::default());
        world.snap(&viewer_at(Vec2::ZERO, SnapLayout::Extended), &mut out);
        let snapshot = decode(&out.finish()).unwrap();

        let kinds: Vec<(u32, &str)> = snapshot
            .items
            .iter()
            .map(|item| {
                let kind = match item.item {
                    SnapItem::Character(_) => "character",
                    SnapItem::EntityExtra(_) => "extra",
                    SnapItem::Segment(_) => "segment",
                };
                (item.id, kind)
            })
            .collect();
        assert_eq!(kinds, vec![(3, "character"), (near, "extra"), (near, "segment")]);

        let mut out = SnapshotBuilder::new(world.current_tick(), SnapshotLimits::default());
        world.snap(&ViewerInfo::demo(), &mut out);
        assert_eq!(decode(&out.finish()).unwrap().items.len(), 5);
    }

    #[test]
    fn test_cooldown_spacing_in_world() {
        let mut world = open_world();
        let config = SimConfig {
            shots_per_sec: 2,
            ..SimConfig::default()
        };
        world.spawn_character(pid(0), Vec2::new(400.0, 500.0)).unwrap();
        world.set_solo(pid(0), true).unwrap();
        world.spawn_turret(Turret::new(Vec2::new(500.0, 500.0), 0).with_freeze(false));

        let mut fired = Vec::new();
        for _ in 0..200 {
            let report = world.tick(&config);
            if report.shots_fired() > 0 {
                fired.push(report.tick);
            }
        }
        assert!(fired.len() >= 7);
        assert!(fired.windows(2).all(|w| w[1] - w[0] >= 25));
    }
}
