//! Game session: drives world ticks and encodes one snapshot per viewer

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::config::ConfigHandle;
use crate::game::entities::Simulate;
use crate::game::player::PlayerTable;
use crate::game::state::{EntityClass, PlayerId, WorldError};
use crate::game::world::{TickReport, World};
use crate::metrics::Metrics;
use crate::net::snapshot::{SnapshotBuilder, SnapshotLimits};
use crate::net::viewer::{Viewer, ViewerInfo};

/// Encoded snapshot ready for the transport
#[derive(Debug, Clone)]
pub struct OutgoingSnapshot {
    pub viewer: Viewer,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct StepOutput {
    pub report: TickReport,
    pub snapshots: Vec<OutgoingSnapshot>,
}

pub struct GameSession {
    world: World,
    players: PlayerTable,
    config: ConfigHandle,
    metrics: Arc<Metrics>,
    limits: SnapshotLimits,
    record_demo: bool,
}

impl GameSession {
    pub fn new(world: World, config: ConfigHandle, metrics: Arc<Metrics>, limits: SnapshotLimits) -> Self {
        Self {
            world,
            players: PlayerTable::new(),
            config,
            metrics,
            limits,
            record_demo: false,
        }
    }

    /// Also encode a snapshot for the demo recorder every tick
    pub fn with_demo_recorder(mut self, enabled: bool) -> Self {
        self.record_demo = enabled;
        self
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn players(&self) -> &PlayerTable {
        &self.players
    }

    pub fn players_mut(&mut self) -> &mut PlayerTable {
        &mut self.players
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    pub fn connect(&mut self, player: PlayerId, client_version: u32) -> Result<(), WorldError> {
        self.players.connect(player, client_version)?;
        debug!("Player {} connected with client version {}", player, client_version);
        Ok(())
    }

    /// Drop the player and kill their character, if any
    pub fn disconnect(&mut self, player: PlayerId) {
        if self.players.disconnect(player).is_some() {
            debug!("Player {} disconnected", player);
        }
        match self.world.kill(player) {
            Ok(()) | Err(WorldError::UnknownCharacter(_)) => {}
            Err(e) => debug!("Character of {} not removed: {}", player, e),
        }
    }

    /// Run one tick and produce every viewer's snapshot
    pub fn step(&mut self) -> StepOutput {
        let start = Instant::now();

        let config = self.config.snapshot();
        let report = self.world.tick(&config);
        self.refresh_view_positions();
        let snapshots = self.encode_snapshots();

        self.record_metrics(&report, snapshots.len());
        self.metrics.record_tick_time(start.elapsed());

        StepOutput { report, snapshots }
    }

    fn refresh_view_positions(&mut self) {
        let characters = self.world.characters();
        for player in self.players.iter_mut() {
            if let Some(character) = characters.get(player.watched()) {
                player.view_pos = character.position();
            }
        }
    }

    fn viewers(&self) -> impl Iterator<Item = Viewer> + '_ {
        let demo = self.record_demo.then_some(Viewer::Demo);
        self.players
            .iter()
            .map(|player| Viewer::Client(player.id()))
            .chain(demo)
    }

    fn encode_snapshots(&self) -> Vec<OutgoingSnapshot> {
        let tick = self.world.current_tick();
        let mut snapshots = Vec::with_capacity(self.players.len() + 1);

        for viewer in self.viewers() {
            let Some(info) = ViewerInfo::resolve(viewer, &self.players, self.world.characters()) else {
                continue;
            };

            let mut builder = SnapshotBuilder::new(tick, self.limits);
            self.world.snap(&info, &mut builder);

            let dropped = builder.dropped();
            if dropped > 0 {
                trace!("Snapshot for {} dropped {} records on tick {}", viewer, dropped, tick);
            }
            let payload = builder.finish();
            self.metrics.record_snapshot(payload.len(), dropped);
            snapshots.push(OutgoingSnapshot { viewer, payload });
        }

        snapshots
    }

    fn record_metrics(&self, report: &TickReport, viewers: usize) {
        let m = &self.metrics;
        m.characters.store(self.world.count(EntityClass::Character) as u64, Ordering::Relaxed);
        let (turrets, projectiles) = self.world.entities().fold((0u64, 0u64), |(t, p), (_, e)| match e.class() {
            EntityClass::Turret => (t + 1, p),
            EntityClass::Projectile => (t, p + 1),
            EntityClass::Character => (t, p),
        });
        m.turrets.store(turrets, Ordering::Relaxed);
        m.projectiles.store(projectiles, Ordering::Relaxed);
        m.viewers.store(viewers as u64, Ordering::Relaxed);
        m.shots_fired.fetch_add(report.shots_fired() as u64, Ordering::Relaxed);
        m.targets_hit.fetch_add(report.targets_hit() as u64, Ordering::Relaxed);
    }
}

/// Start the tick loop background task
///
/// Each tick's output is sent on `outgoing`; the loop stops once the
/// receiver is dropped.
pub fn start_tick_loop(
    session: Arc<RwLock<GameSession>>,
    tick_rate: u32,
    outgoing: mpsc::Sender<StepOutput>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let tick_rate = tick_rate.max(1);
        let mut ticker = interval(Duration::from_secs_f64(1.0 / tick_rate as f64));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Tick loop started at {} Hz", tick_rate);
        let started = Instant::now();

        loop {
            ticker.tick().await;

            let output = session.write().await.step();
            let tick = output.report.tick;

            if outgoing.send(output).await.is_err() {
                info!("Snapshot consumer gone, stopping tick loop at tick {}", tick);
                break;
            }

            // Log stats periodically (every 30 seconds)
            if tick % (tick_rate as u64 * 30) == 0 {
                let session = session.read().await;
                let world = session.world();
                info!(
                    "Tick {} after {}s: {} characters, {} turrets, {} plasma, {} viewers",
                    tick,
                    started.elapsed().as_secs(),
                    world.count(EntityClass::Character),
                    world.count(EntityClass::Turret),
                    world.count(EntityClass::Projectile),
                    session.players().len()
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::game::clock::WorldClock;
    use crate::game::entities::Turret;
    use crate::game::player::PlayerTeam;
    use crate::game::spatial::CollisionMap;
    use crate::net::protocol::VERSION_ENTITY_EXTRA;
    use crate::net::snapshot::{decode, SnapItem};
    use crate::util::vec2::Vec2;

    fn pid(i: usize) -> PlayerId {
        PlayerId::new(i).unwrap()
    }

    fn session() -> GameSession {
        let world = World::with_clock(CollisionMap::open(100, 100), WorldClock::starting_at(1000, 50));
        GameSession::new(
            world,
            ConfigHandle::new(SimConfig::default()),
            Arc::new(Metrics::new()),
            SnapshotLimits::default(),
        )
    }

    fn payload_for(output: &StepOutput, viewer: Viewer) -> Vec<SnapItem> {
        let snapshot = output
            .snapshots
            .iter()
            .find(|s| s.viewer == viewer)
            .expect("snapshot for viewer");
        decode(&snapshot.payload)
            .unwrap()
            .items
            .into_iter()
            .map(|item| item.item)
            .collect()
    }

    #[test]
    fn test_step_encodes_per_viewer_layout() {
        let mut session = session().with_demo_recorder(true);
        session.connect(pid(0), 0).unwrap();
        session.connect(pid(1), VERSION_ENTITY_EXTRA).unwrap();
        session.world_mut().spawn_character(pid(0), Vec2::new(300.0, 300.0)).unwrap();
        session.world_mut().spawn_character(pid(1), Vec2::new(320.0, 300.0)).unwrap();
        session
            .world_mut()
            .spawn_turret(Turret::new(Vec2::new(2000.0, 2000.0), 0));

        let output = session.step();
        assert_eq!(output.snapshots.len(), 3);

        // Both clients see both characters; the turret is out of view
        let legacy = payload_for(&output, Viewer::Client(pid(0)));
        assert_eq!(legacy.len(), 2);
        assert!(legacy.iter().all(|item| matches!(item, SnapItem::Character(_))));

        // The demo sees everything in the extended layout
        let demo = payload_for(&output, Viewer::Demo);
        assert_eq!(demo.len(), 4);
        assert!(demo.iter().any(|item| matches!(item, SnapItem::EntityExtra(_))));
    }

    #[test]
    fn test_view_follows_spectated_character() {
        let mut session = session();
        session.config().replace(SimConfig {
            shots_per_sec: 0,
            ..SimConfig::default()
        });
        session.connect(pid(0), 0).unwrap();
        session.world_mut().spawn_character(pid(1), Vec2::new(3000.0, 3000.0)).unwrap();
        session.world_mut().spawn_turret(Turret::new(Vec2::new(3050.0, 3000.0), 0));

        {
            let player = session.players_mut().get_mut(pid(0)).unwrap();
            player.team = PlayerTeam::Spectators;
            player.spectating = Some(pid(1));
        }

        let output = session.step();
        assert_eq!(session.players().get(pid(0)).unwrap().view_pos, Vec2::new(3000.0, 3000.0));
        assert_eq!(payload_for(&output, Viewer::Client(pid(0))).len(), 2);
    }

    #[test]
    fn test_config_reload_applies_next_step() {
        let mut session = session();
        session.world_mut().spawn_character(pid(0), Vec2::new(400.0, 500.0)).unwrap();
        session.world_mut().spawn_turret(Turret::new(Vec2::new(500.0, 500.0), 0));

        let mut off = SimConfig::default();
        off.shots_per_sec = 0;
        session.config().replace(off);
        for _ in 0..20 {
            assert_eq!(session.step().report.shots_fired(), 0);
        }

        session.config().replace(SimConfig::default());
        assert_eq!(session.step().report.shots_fired(), 1);
        assert_eq!(session.metrics.shots_fired.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_disconnect_kills_character() {
        let mut session = session();
        session.connect(pid(2), 0).unwrap();
        session.world_mut().spawn_character(pid(2), Vec2::ZERO).unwrap();

        session.disconnect(pid(2));
        let output = session.step();
        assert!(output.snapshots.is_empty());
        assert!(session.world().characters().get(pid(2)).is_none());
    }

    #[test]
    fn test_disconnect_spectator_without_character() {
        let mut session = session();
        session.connect(pid(3), VERSION_ENTITY_EXTRA).unwrap();
        session.connect(pid(4), 0).unwrap();
        session.world_mut().spawn_character(pid(4), Vec2::ZERO).unwrap();

        session.disconnect(pid(3));
        session.disconnect(pid(3));
        assert!(session.players().get(pid(3)).is_none());
        assert!(session.world().characters().get(pid(4)).is_some());

        let output = session.step();
        assert_eq!(output.snapshots.len(), 1);
        assert_eq!(output.snapshots[0].viewer, Viewer::Client(pid(4)));
    }

    #[tokio::test]
    async fn test_tick_loop_streams_until_consumer_drops() {
        let mut session = session();
        session.connect(pid(0), VERSION_ENTITY_EXTRA).unwrap();
        let session = Arc::new(RwLock::new(session));

        let (tx, mut rx) = mpsc::channel(4);
        let handle = start_tick_loop(session.clone(), 200, tx);

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let second = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.report.tick, first.report.tick + 1);
        assert_eq!(first.snapshots.len(), 1);

        drop(rx);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(session.read().await.world().current_tick() >= 1002);
    }
}
