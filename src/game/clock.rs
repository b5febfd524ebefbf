//! World clock: the only time source the simulation reads

use crate::game::constants::clock::DEFAULT_TICK_RATE;

/// Simulation tick number
pub type Tick = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldClock {
    tick: Tick,
    tick_rate: u32,
}

impl WorldClock {
    pub fn new(tick_rate: u32) -> Self {
        Self {
            tick: 0,
            tick_rate: tick_rate.max(1),
        }
    }

    /// Start at an arbitrary tick (tests, demo playback)
    pub fn starting_at(tick: Tick, tick_rate: u32) -> Self {
        Self {
            tick,
            tick_rate: tick_rate.max(1),
        }
    }

    #[inline]
    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    #[inline]
    pub fn ticks_per_second(&self) -> u32 {
        self.tick_rate
    }

    /// Step to the next tick. Called once per simulation step by the world.
    pub(crate) fn advance(&mut self) -> Tick {
        self.tick += 1;
        self.tick
    }
}

impl Default for WorldClock {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_RATE)
    }
}
