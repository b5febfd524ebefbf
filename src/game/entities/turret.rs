//! Autonomous turret ("gun") that fires plasma at nearby characters

use tracing::trace;

use crate::game::clock::Tick;
use crate::game::constants::secs_to_ticks;
use crate::game::constants::turret::LEGACY_BLINK_PERIOD;
use crate::game::entities::{GameEvent, Projectile, Simulate, SnapContext, TickContext};
use crate::game::spatial::{SpatialHandle, SpatialQuery};
use crate::game::state::{EntityClass, EntityId, TeamId};
use crate::game::switches::SwitchGates;
use crate::game::targeting::{cooldown_interval, select_targets, FireCooldowns};
use crate::net::protocol::{EntityClassTag, LayerTag, SnapLayout};
use crate::net::snapshot::{EntityExtraRecord, SegmentRecord, SnapItem, SnapshotBuilder};
use crate::util::vec2::Vec2;

/// Map layer the turret was placed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurretLayer {
    #[default]
    Normal,
    /// Gated per team by a switch number
    Switch,
}

#[derive(Debug, Clone)]
pub struct Turret {
    position: Vec2,
    freeze: bool,
    explosive: bool,
    layer: TurretLayer,
    switch_number: u32,
    /// Velocity picked up from the last speed zone, kept after leaving it
    carried_velocity: Vec2,
    cooldowns: FireCooldowns,
    eval_tick: Tick,
    marked_for_destroy: bool,
}

impl Turret {
    /// Plain unfreeze turret on the normal layer
    pub fn new(position: Vec2, now: Tick) -> Self {
        Self {
            position,
            freeze: false,
            explosive: false,
            layer: TurretLayer::Normal,
            switch_number: 0,
            carried_velocity: Vec2::ZERO,
            cooldowns: FireCooldowns::new(),
            eval_tick: now,
            marked_for_destroy: false,
        }
    }

    pub fn with_freeze(mut self, freeze: bool) -> Self {
        self.freeze = freeze;
        self
    }

    pub fn with_explosive(mut self, explosive: bool) -> Self {
        self.explosive = explosive;
        self
    }

    /// Place on the switch layer under `number`
    pub fn on_switch(mut self, number: u32) -> Self {
        self.layer = TurretLayer::Switch;
        self.switch_number = number;
        self
    }

    pub fn is_freeze(&self) -> bool {
        self.freeze
    }

    pub fn is_explosive(&self) -> bool {
        self.explosive
    }

    pub fn layer(&self) -> TurretLayer {
        self.layer
    }

    pub fn switch_number(&self) -> u32 {
        self.switch_number
    }

    pub fn carried_velocity(&self) -> Vec2 {
        self.carried_velocity
    }

    pub fn eval_tick(&self) -> Tick {
        self.eval_tick
    }

    pub fn cooldowns(&self) -> &FireCooldowns {
        &self.cooldowns
    }

    /// Switch number this turret answers to, if any
    fn gate(&self) -> Option<u32> {
        (self.layer == TurretLayer::Switch && self.switch_number > 0).then_some(self.switch_number)
    }

    /// True when the turret's switch is off for `team`
    pub fn is_disabled_for(&self, team: TeamId, switches: &SwitchGates) -> bool {
        self.gate()
            .is_some_and(|number| !switches.is_team_enabled(number, team))
    }

    pub fn entity_class_tag(&self) -> EntityClassTag {
        EntityClassTag::for_turret(self.explosive, self.freeze)
    }

    fn evaluate_speed_zone(&mut self, now: Tick, spatial: &dyn SpatialQuery) {
        self.eval_tick = now;
        if let Some(zone) = spatial.sample_speed_zone(self.position) {
            self.carried_velocity = zone.velocity;
        }
        self.position += self.carried_velocity;
    }

    fn fire(&mut self, interval: u64, ctx: &mut TickContext<'_>) {
        let now = ctx.now();
        let origin = self.position;
        let gate = self.gate();
        let spatial = ctx.spatial;
        let characters = ctx.characters;
        let switches = ctx.switches;

        let in_range = spatial.find_in_radius(origin, ctx.config.turret_range, EntityClass::Character);
        let candidates = in_range.iter().filter_map(|entry| match entry.handle {
            SpatialHandle::Character(player) => characters.get(player).map(|c| c.candidate()),
            SpatialHandle::Entity(_) => None,
        });

        let targets = select_targets(
            origin,
            candidates,
            now,
            interval,
            &mut self.cooldowns,
            |team| gate.map_or(true, |number| switches.is_team_enabled(number, team)),
            |position| !spatial.is_segment_obstructed(origin, position),
        );

        for player in targets.iter() {
            let Some(target) = characters.get(player) else {
                panic!("turret target {player} vanished between selection and firing");
            };
            let direction = (target.position() - origin).normalize();
            let plasma = Projectile::new(
                origin,
                direction,
                player,
                self.freeze,
                self.explosive,
                now,
                ctx.clock.ticks_per_second(),
                ctx.config,
            );
            ctx.commands.spawn(plasma.into());
            ctx.commands.emit(GameEvent::ShotFired {
                turret: origin,
                target: player,
            });
            trace!("Turret at ({:.0}, {:.0}) fired at {} on tick {}", origin.x, origin.y, player, now);
        }
    }

    /// Legacy clients have no switch state, so a disabled turret blinks off
    fn hidden_from_legacy(&self, ctx: &SnapContext<'_>) -> bool {
        let Some(team) = ctx.viewer.team else {
            return false;
        };
        let phase = (ctx.tick % ctx.tick_rate.max(1) as u64) % LEGACY_BLINK_PERIOD;
        phase == 0 && self.is_disabled_for(team, ctx.switches)
    }
}

impl Simulate for Turret {
    fn class(&self) -> EntityClass {
        EntityClass::Turret
    }

    fn position(&self) -> Vec2 {
        self.position
    }

    fn is_marked_for_destroy(&self) -> bool {
        self.marked_for_destroy
    }

    fn advance(&mut self, ctx: &mut TickContext<'_>) {
        let now = ctx.now();
        let tick_rate = ctx.clock.ticks_per_second();

        let eval_every = secs_to_ticks(ctx.config.speed_zone_eval_secs, tick_rate);
        if now % eval_every == 0 {
            self.evaluate_speed_zone(now, ctx.spatial);
        }

        if let Some(interval) = cooldown_interval(tick_rate, ctx.config.shots_per_sec) {
            self.fire(interval, ctx);
        }
    }

    fn reset(&mut self) {
        self.marked_for_destroy = true;
    }

    fn snap(&self, id: EntityId, ctx: &SnapContext<'_>, out: &mut SnapshotBuilder) {
        if ctx.viewer.is_clipped(self.position) {
            return;
        }

        let mut extra_written = false;
        match ctx.viewer.layout {
            SnapLayout::Extended => {
                let extra = EntityExtraRecord {
                    switch_number: self.switch_number as i32,
                    layer: LayerTag::from(self.layer),
                    entity_class: self.entity_class_tag(),
                };
                match out.push(id, SnapItem::EntityExtra(extra)) {
                    Ok(()) => extra_written = true,
                    Err(e) => trace!("Dropped turret {} extra record: {}", id, e),
                }
            }
            SnapLayout::Legacy => {
                if self.hidden_from_legacy(ctx) {
                    return;
                }
            }
        }

        let (x, y) = self.position.to_wire();
        let segment = SegmentRecord {
            x,
            y,
            from_x: x,
            from_y: y,
            start_tick: if extra_written { 0 } else { self.eval_tick as i32 },
        };
        if let Err(e) = out.push(id, SnapItem::Segment(segment)) {
            trace!("Dropped turret {} from snapshot: {}", id, e);
        }
    }
}
