//! Plasma projectile fired by turrets
//!
//! A plasma homes in on nothing: it flies straight, speeding up every tick,
//! and only ever interacts with the player it was fired at.

use tracing::trace;

use crate::config::SimConfig;
use crate::game::clock::Tick;
use crate::game::constants::character::PROXIMITY_RADIUS;
use crate::game::constants::secs_to_ticks;
use crate::game::entities::{CharacterEffect, GameEvent, Simulate, SnapContext, TickContext};
use crate::game::state::{EntityClass, EntityId, PlayerId};
use crate::net::snapshot::{SegmentRecord, SnapItem, SnapshotBuilder};
use crate::util::vec2::Vec2;

#[derive(Debug, Clone)]
pub struct Projectile {
    position: Vec2,
    velocity: Vec2,
    target: PlayerId,
    freeze: bool,
    explosive: bool,
    eval_tick: Tick,
    lifetime: u64,
    marked_for_destroy: bool,
}

impl Projectile {
    /// `direction` should be normalized; speed and lifetime come from config
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        position: Vec2,
        direction: Vec2,
        target: PlayerId,
        freeze: bool,
        explosive: bool,
        now: Tick,
        tick_rate: u32,
        config: &SimConfig,
    ) -> Self {
        Self {
            position,
            velocity: direction * config.projectile_speed,
            target,
            freeze,
            explosive,
            eval_tick: now,
            lifetime: secs_to_ticks(config.projectile_lifetime_secs, tick_rate),
            marked_for_destroy: false,
        }
    }

    pub fn target(&self) -> PlayerId {
        self.target
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn is_freeze(&self) -> bool {
        self.freeze
    }

    pub fn is_explosive(&self) -> bool {
        self.explosive
    }

    pub fn lifetime(&self) -> u64 {
        self.lifetime
    }

    fn explode(&self, at: Vec2, ctx: &mut TickContext<'_>) {
        if self.explosive {
            ctx.commands.emit(GameEvent::Explosion { position: at });
        }
    }
}

impl Simulate for Projectile {
    fn class(&self) -> EntityClass {
        EntityClass::Projectile
    }

    fn position(&self) -> Vec2 {
        self.position
    }

    fn is_marked_for_destroy(&self) -> bool {
        self.marked_for_destroy
    }

    fn advance(&mut self, ctx: &mut TickContext<'_>) {
        if self.lifetime == 0 {
            self.reset();
            return;
        }
        self.lifetime -= 1;

        let from = self.position;
        let to = from + self.velocity;
        self.position = to;
        self.velocity *= ctx.config.projectile_accel;

        let target = match ctx.characters.get(self.target) {
            Some(character) if character.is_alive() => character,
            _ => {
                self.reset();
                return;
            }
        };

        let closest = Vec2::closest_point_on_segment(from, to, target.position());
        if closest.distance_to(target.position()) < PROXIMITY_RADIUS {
            let effect = if self.freeze {
                let freeze_ticks = secs_to_ticks(ctx.config.freeze_secs, ctx.clock.ticks_per_second());
                CharacterEffect::Freeze {
                    player: self.target,
                    until: ctx.now() + freeze_ticks,
                }
            } else {
                CharacterEffect::Unfreeze { player: self.target }
            };
            ctx.commands.apply(effect);
            ctx.commands.emit(GameEvent::TargetHit {
                target: self.target,
                freeze: self.freeze,
            });
            trace!("Plasma hit {} at tick {}", self.target, ctx.now());
            self.explode(closest, ctx);
            self.reset();
            return;
        }

        if ctx.spatial.is_segment_obstructed(from, to) {
            self.explode(to, ctx);
            self.reset();
        }
    }

    fn reset(&mut self) {
        self.marked_for_destroy = true;
    }

    fn snap(&self, id: EntityId, ctx: &SnapContext<'_>, out: &mut SnapshotBuilder) {
        if ctx.viewer.is_clipped(self.position) {
            return;
        }

        let (x, y) = self.position.to_wire();
        let record = SegmentRecord {
            x,
            y,
            from_x: x,
            from_y: y,
            start_tick: self.eval_tick as i32,
        };
        if let Err(e) = out.push(id, SnapItem::Segment(record)) {
            trace!("Dropped plasma {} from snapshot: {}", id, e);
        }
    }
}
