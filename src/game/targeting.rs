//! Turret target selection and per-identity fire cooldowns
//!
//! Solo players are rate limited individually and always get their own shot.
//! Everyone else is rate limited per team, and each team contributes at most
//! one target per volley: the nearest eligible member.
//!
//! Distances are compared as truncated integers. A recorded distance of zero
//! doubles as "no representative yet", so a member standing exactly on the
//! turret is replaced by the next eligible member of the same team. Exact
//! ties otherwise keep the member found first.

use bitvec::prelude::*;

use crate::game::clock::Tick;
use crate::game::constants::limits::{MAX_CLIENTS, TEAM_SLOTS};
use crate::game::state::{PlayerId, TeamId};
use crate::util::vec2::Vec2;

/// Ticks between shots at one identity, or `None` when firing is disabled
pub fn cooldown_interval(tick_rate: u32, shots_per_sec: i32) -> Option<u64> {
    if shots_per_sec <= 0 {
        return None;
    }
    Some((tick_rate / shots_per_sec as u32) as u64)
}

/// Who a cooldown is charged to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireIdentity {
    Solo(PlayerId),
    Team(TeamId),
}

/// Last fire tick per team and per solo player
///
/// Entries start at tick zero and only ever move forward.
#[derive(Debug, Clone)]
pub struct FireCooldowns {
    team: [Tick; TEAM_SLOTS],
    solo: [Tick; MAX_CLIENTS],
}

impl FireCooldowns {
    pub fn new() -> Self {
        Self {
            team: [0; TEAM_SLOTS],
            solo: [0; MAX_CLIENTS],
        }
    }

    pub fn last_fire(&self, identity: FireIdentity) -> Tick {
        match identity {
            FireIdentity::Solo(player) => self.solo[player.index()],
            FireIdentity::Team(team) => self.team[team.index()],
        }
    }

    #[inline]
    pub fn is_ready(&self, identity: FireIdentity, now: Tick, interval: u64) -> bool {
        self.last_fire(identity) + interval <= now
    }

    pub fn record(&mut self, identity: FireIdentity, now: Tick) {
        let slot = match identity {
            FireIdentity::Solo(player) => &mut self.solo[player.index()],
            FireIdentity::Team(team) => &mut self.team[team.index()],
        };
        debug_assert!(now >= *slot, "fire cooldown moved backwards");
        *slot = now;
    }
}

impl Default for FireCooldowns {
    fn default() -> Self {
        Self::new()
    }
}

/// Character as seen by the selector
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub player: PlayerId,
    pub team: TeamId,
    pub solo: bool,
    pub alive: bool,
    pub position: Vec2,
}

impl Candidate {
    pub fn identity(&self) -> FireIdentity {
        if self.solo {
            FireIdentity::Solo(self.player)
        } else {
            FireIdentity::Team(self.team)
        }
    }
}

/// Players chosen in one volley
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSet {
    bits: BitArr!(for MAX_CLIENTS, in u64, Lsb0),
}

impl TargetSet {
    pub fn insert(&mut self, player: PlayerId) {
        self.bits.set(player.index(), true);
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.bits[player.index()]
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.not_any()
    }

    /// Targets in ascending player id order
    pub fn iter(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.bits.iter_ones().filter_map(PlayerId::new)
    }
}

#[derive(Debug, Clone, Copy)]
struct TeamRepresentative {
    player: PlayerId,
    team: TeamId,
    distance: i32,
}

/// Pick this tick's targets and charge their cooldowns
///
/// `team_enabled` answers the switch gate for a team; `reachable` answers
/// line of sight from `origin` to a position. Candidates are evaluated in
/// the order given.
pub fn select_targets<I, G, R>(
    origin: Vec2,
    candidates: I,
    now: Tick,
    interval: u64,
    cooldowns: &mut FireCooldowns,
    team_enabled: G,
    reachable: R,
) -> TargetSet
where
    I: IntoIterator<Item = Candidate>,
    G: Fn(TeamId) -> bool,
    R: Fn(Vec2) -> bool,
{
    let mut targets = TargetSet::default();
    let mut representatives: [Option<TeamRepresentative>; TEAM_SLOTS] = [None; TEAM_SLOTS];

    for candidate in candidates {
        if candidate.team.is_super() || !team_enabled(candidate.team) {
            continue;
        }

        let identity = candidate.identity();
        if !cooldowns.is_ready(identity, now, interval) {
            continue;
        }

        if !candidate.alive || !reachable(candidate.position) {
            continue;
        }

        if candidate.solo {
            targets.insert(candidate.player);
            cooldowns.record(identity, now);
            continue;
        }

        let distance = origin.distance_to(candidate.position) as i32;
        let slot = &mut representatives[candidate.team.index()];
        let replace = match slot {
            None => true,
            Some(current) => current.distance == 0 || current.distance > distance,
        };
        if replace {
            *slot = Some(TeamRepresentative {
                player: candidate.player,
                team: candidate.team,
                distance,
            });
        }
    }

    for representative in representatives.iter().flatten() {
        targets.insert(representative.player);
        cooldowns.record(FireIdentity::Team(representative.team), now);
    }

    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    fn pid(i: usize) -> PlayerId {
        PlayerId::new(i).unwrap()
    }

    fn team(i: usize) -> TeamId {
        TeamId::new(i).unwrap()
    }

    fn member(player: usize, team_id: usize, x: f32) -> Candidate {
        Candidate {
            player: pid(player),
            team: team(team_id),
            solo: false,
            alive: true,
            position: Vec2::new(x, 0.0),
        }
    }

    fn solo(player: usize, team_id: usize, x: f32) -> Candidate {
        Candidate {
            solo: true,
            ..member(player, team_id, x)
        }
    }

    fn select(candidates: Vec<Candidate>, now: Tick, cooldowns: &mut FireCooldowns) -> TargetSet {
        select_targets(ORIGIN, candidates, now, 25, cooldowns, |_| true, |_| true)
    }

    #[test]
    fn test_cooldown_interval() {
        assert_eq!(cooldown_interval(50, 2), Some(25));
        assert_eq!(cooldown_interval(50, 3), Some(16));
        assert_eq!(cooldown_interval(50, 0), None);
        assert_eq!(cooldown_interval(50, -4), None);
    }

    #[test]
    fn test_nearest_team_member_wins() {
        let mut cooldowns = FireCooldowns::new();
        let targets = select(vec![member(1, 0, 300.0), member(2, 0, 150.0)], 100, &mut cooldowns);

        assert_eq!(targets.iter().collect::<Vec<_>>(), vec![pid(2)]);
        assert_eq!(cooldowns.last_fire(FireIdentity::Team(team(0))), 100);
    }

    #[test]
    fn test_one_representative_per_team() {
        let mut cooldowns = FireCooldowns::new();
        let targets = select(
            vec![member(1, 0, 300.0), member(2, 1, 400.0), member(3, 1, 200.0)],
            100,
            &mut cooldowns,
        );

        assert_eq!(targets.iter().collect::<Vec<_>>(), vec![pid(1), pid(3)]);
    }

    #[test]
    fn test_exact_tie_keeps_first_found() {
        let mut cooldowns = FireCooldowns::new();
        let targets = select(vec![member(5, 0, 150.0), member(2, 0, 150.0)], 100, &mut cooldowns);
        assert_eq!(targets.iter().collect::<Vec<_>>(), vec![pid(5)]);
    }

    #[test]
    fn test_truncated_distances_tie() {
        let mut cooldowns = FireCooldowns::new();
        let targets = select(vec![member(5, 0, 150.9), member(2, 0, 150.1)], 100, &mut cooldowns);
        assert_eq!(targets.iter().collect::<Vec<_>>(), vec![pid(5)]);
    }

    #[test]
    fn test_zero_distance_member_is_overwritten() {
        // A member standing on the turret is recorded with distance 0, which
        // reads as "no representative yet" for the next member.
        let mut cooldowns = FireCooldowns::new();
        let targets = select(vec![member(1, 0, 0.0), member(2, 0, 300.0)], 100, &mut cooldowns);
        assert_eq!(targets.iter().collect::<Vec<_>>(), vec![pid(2)]);

        let mut cooldowns = FireCooldowns::new();
        let targets = select(vec![member(2, 0, 300.0), member(1, 0, 0.0)], 100, &mut cooldowns);
        assert_eq!(targets.iter().collect::<Vec<_>>(), vec![pid(1)]);
    }

    #[test]
    fn test_lone_zero_distance_member_still_targeted() {
        let mut cooldowns = FireCooldowns::new();
        let targets = select(vec![member(1, 0, 0.0)], 100, &mut cooldowns);
        assert_eq!(targets.iter().collect::<Vec<_>>(), vec![pid(1)]);
    }

    #[test]
    fn test_solo_players_all_targeted() {
        let mut cooldowns = FireCooldowns::new();
        let targets = select(
            vec![solo(1, 0, 300.0), solo(2, 0, 100.0), member(3, 0, 50.0)],
            100,
            &mut cooldowns,
        );

        assert_eq!(targets.len(), 3);
        assert_eq!(cooldowns.last_fire(FireIdentity::Solo(pid(1))), 100);
        assert_eq!(cooldowns.last_fire(FireIdentity::Solo(pid(2))), 100);
        assert_eq!(cooldowns.last_fire(FireIdentity::Team(team(0))), 100);
    }

    #[test]
    fn test_solo_cooldowns_independent() {
        let mut cooldowns = FireCooldowns::new();
        select(vec![solo(1, 0, 100.0)], 100, &mut cooldowns);

        // Player 1 is cooling down, player 2 has never been shot at
        let targets = select(vec![solo(1, 0, 100.0), solo(2, 0, 100.0)], 110, &mut cooldowns);
        assert_eq!(targets.iter().collect::<Vec<_>>(), vec![pid(2)]);
    }

    #[test]
    fn test_solo_cooldown_scenario() {
        let mut cooldowns = FireCooldowns::new();
        assert_eq!(select(vec![solo(4, 0, 100.0)], 100, &mut cooldowns).len(), 1);
        assert!(select(vec![solo(4, 0, 100.0)], 120, &mut cooldowns).is_empty());
        assert_eq!(select(vec![solo(4, 0, 100.0)], 126, &mut cooldowns).len(), 1);
        assert_eq!(cooldowns.last_fire(FireIdentity::Solo(pid(4))), 126);
    }

    #[test]
    fn test_team_cooldown_blocks_whole_team() {
        let mut cooldowns = FireCooldowns::new();
        select(vec![member(1, 2, 100.0)], 100, &mut cooldowns);

        let targets = select(vec![member(2, 2, 50.0), member(3, 3, 50.0)], 110, &mut cooldowns);
        assert_eq!(targets.iter().collect::<Vec<_>>(), vec![pid(3)]);
    }

    #[test]
    fn test_cooldown_exactly_elapsed_fires() {
        let mut cooldowns = FireCooldowns::new();
        select(vec![member(1, 0, 100.0)], 100, &mut cooldowns);
        assert_eq!(select(vec![member(1, 0, 100.0)], 125, &mut cooldowns).len(), 1);
    }

    #[test]
    fn test_fresh_cooldowns_start_at_tick_zero() {
        let mut cooldowns = FireCooldowns::new();
        assert!(select(vec![member(1, 0, 100.0)], 10, &mut cooldowns).is_empty());
        assert_eq!(select(vec![member(1, 0, 100.0)], 25, &mut cooldowns).len(), 1);
    }

    #[test]
    fn test_super_team_ignored() {
        let mut cooldowns = FireCooldowns::new();
        let candidate = Candidate {
            team: TeamId::SUPER,
            ..member(1, 0, 100.0)
        };
        assert!(select(vec![candidate], 100, &mut cooldowns).is_empty());
    }

    #[test]
    fn test_gated_team_ignored() {
        let mut cooldowns = FireCooldowns::new();
        let targets = select_targets(
            ORIGIN,
            vec![member(1, 0, 100.0), member(2, 1, 100.0)],
            100,
            25,
            &mut cooldowns,
            |t| t != team(0),
            |_| true,
        );
        assert_eq!(targets.iter().collect::<Vec<_>>(), vec![pid(2)]);
        assert_eq!(cooldowns.last_fire(FireIdentity::Team(team(0))), 0);
    }

    #[test]
    fn test_unreachable_and_dead_skipped() {
        let mut cooldowns = FireCooldowns::new();
        let dead = Candidate {
            alive: false,
            ..member(1, 0, 50.0)
        };
        let hidden = member(2, 0, 60.0);
        let visible = member(3, 0, 400.0);

        let targets = select_targets(
            ORIGIN,
            vec![dead, hidden, visible],
            100,
            25,
            &mut cooldowns,
            |_| true,
            |pos| pos.x != 60.0,
        );
        assert_eq!(targets.iter().collect::<Vec<_>>(), vec![pid(3)]);
    }

    #[test]
    fn test_skipped_candidates_do_not_charge_cooldown() {
        let mut cooldowns = FireCooldowns::new();
        let targets = select_targets(
            ORIGIN,
            vec![solo(1, 0, 50.0)],
            100,
            25,
            &mut cooldowns,
            |_| true,
            |_| false,
        );
        assert!(targets.is_empty());
        assert_eq!(cooldowns.last_fire(FireIdentity::Solo(pid(1))), 0);
    }

    #[test]
    fn test_consecutive_shots_respect_interval() {
        let mut cooldowns = FireCooldowns::new();
        let mut fired_at = Vec::new();
        for now in 0..200 {
            if !select(vec![member(1, 0, 100.0)], now, &mut cooldowns).is_empty() {
                fired_at.push(now);
            }
        }
        assert!(fired_at.len() > 1);
        assert!(fired_at.windows(2).all(|w| w[1] - w[0] >= 25));
    }
}
