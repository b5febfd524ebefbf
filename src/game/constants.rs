/// Capacity bounds for per-player and per-team arrays
pub mod limits {
    /// Maximum connected clients, and the size of every per-player array
    pub const MAX_CLIENTS: usize = 64;
    /// Number of competitive team slots (team ids `0..MAX_TEAMS`)
    pub const MAX_TEAMS: usize = MAX_CLIENTS;
    /// Team slots including the reserved super team
    pub const TEAM_SLOTS: usize = MAX_TEAMS + 1;
}

/// Clock defaults
pub mod clock {
    /// Default simulation rate in Hz
    pub const DEFAULT_TICK_RATE: u32 = 50;
}

/// Turret tuning
pub mod turret {
    /// Default firing rate per target identity
    pub const DEFAULT_SHOTS_PER_SEC: i32 = 3;
    /// Default targeting radius in world units
    pub const DEFAULT_RANGE: f32 = 700.0;
    /// Default speed zone re-evaluation interval, in seconds
    pub const DEFAULT_SPEED_ZONE_EVAL_SECS: f32 = 0.15;
    /// Legacy clients see a disabled turret blink off once every this many ticks
    pub const LEGACY_BLINK_PERIOD: u64 = 11;
}

/// Plasma projectile tuning
pub mod projectile {
    /// Initial speed in world units per tick
    pub const DEFAULT_SPEED: f32 = 1.0;
    /// Velocity multiplier applied after each move
    pub const DEFAULT_ACCEL: f32 = 1.1;
    /// Lifetime in seconds
    pub const DEFAULT_LIFETIME_SECS: f32 = 1.5;
}

/// Character tuning
pub mod character {
    /// Collision radius used by radius queries and projectile hits
    pub const PROXIMITY_RADIUS: f32 = 28.0;
    /// Default freeze duration in seconds
    pub const DEFAULT_FREEZE_SECS: f32 = 3.0;
}

/// Collision map
pub mod map {
    /// Size of one tile in world units
    pub const TILE_SIZE: f32 = 32.0;
    /// Velocity applied by a speed zone tile per evaluation
    pub const SPEED_ZONE_FORCE: f32 = 2.0;
}

/// Network and snapshot constants
pub mod net {
    /// First client version that understands the entity-extra record
    pub const VERSION_ENTITY_EXTRA: u32 = 15010;
    /// Version reported for the demo recorder
    pub const VERSION_CURRENT: u32 = 16050;
    /// Default snapshot budget in bytes
    pub const MAX_SNAPSHOT_SIZE: usize = 65536;
    /// Default snapshot item budget
    pub const MAX_SNAPSHOT_ITEMS: usize = 1024;
    /// Horizontal view clipping distance
    pub const CLIP_HALF_WIDTH: f32 = 1000.0;
    /// Vertical view clipping distance
    pub const CLIP_HALF_HEIGHT: f32 = 800.0;
}

/// Convert a duration in seconds to whole ticks, never less than one
pub fn secs_to_ticks(secs: f32, tick_rate: u32) -> u64 {
    ((tick_rate as f32 * secs) as u64).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secs_to_ticks() {
        assert_eq!(secs_to_ticks(0.15, 50), 7);
        assert_eq!(secs_to_ticks(1.5, 50), 75);
    }

    #[test]
    fn test_secs_to_ticks_never_zero() {
        assert_eq!(secs_to_ticks(0.0, 50), 1);
        assert_eq!(secs_to_ticks(0.01, 10), 1);
    }
}
