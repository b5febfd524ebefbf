//! Switch gate state shared by switch-layer entities
//!
//! Written by the switch trigger subsystem between ticks, read by turrets
//! during their tick and by snapshot production.

use bitvec::prelude::*;
use hashbrown::HashMap;

use crate::game::constants::limits::TEAM_SLOTS;
use crate::game::state::TeamId;

/// One enabled bit per team slot
pub type TeamFlags = BitArr!(for TEAM_SLOTS, in u64, Lsb0);

fn all_enabled() -> TeamFlags {
    let mut flags = TeamFlags::ZERO;
    flags.fill(true);
    flags
}

/// Per switch number, per team "enabled" flags
///
/// Switch numbers that were never touched read as enabled for every team.
#[derive(Debug, Clone, Default)]
pub struct SwitchGates {
    gates: HashMap<u32, TeamFlags>,
}

impl SwitchGates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_team_enabled(&self, number: u32, team: TeamId) -> bool {
        match self.gates.get(&number) {
            Some(flags) => flags[team.index()],
            None => true,
        }
    }

    pub fn set_team_enabled(&mut self, number: u32, team: TeamId, enabled: bool) {
        self.gates
            .entry(number)
            .or_insert_with(all_enabled)
            .set(team.index(), enabled);
    }

    /// Flip the gate for every team at once
    pub fn set_all(&mut self, number: u32, enabled: bool) {
        let flags = self.gates.entry(number).or_insert_with(all_enabled);
        flags.fill(enabled);
    }

    /// Number of switch numbers with explicit state
    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}
