use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::EnvFilter;

use gunline_server::config::{ConfigHandle, ServerConfig};
use gunline_server::game::constants::map::{SPEED_ZONE_FORCE, TILE_SIZE};
use gunline_server::game::entities::Turret;
use gunline_server::game::spatial::{CollisionMap, Tile};
use gunline_server::game::state::{PlayerId, TeamId, WorldError};
use gunline_server::game::world::World;
use gunline_server::metrics::{self, Metrics};
use gunline_server::net::protocol::{VERSION_CURRENT, VERSION_ENTITY_EXTRA};
use gunline_server::net::session::{start_tick_loop, GameSession, StepOutput};
use gunline_server::net::snapshot::SnapshotLimits;
use gunline_server::util::vec2::Vec2;

/// Bot characters wandering the demo arena
const BOT_COUNT: usize = 8;
/// Switch number the gated demo turrets answer to
const DEMO_SWITCH: u32 = 1;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Gunline Server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load_or_default();
    config.validate()?;
    info!(
        "Configuration loaded: {} Hz, snapshot budget {} bytes / {} items",
        config.tick_rate, config.max_snapshot_size, config.max_snapshot_items
    );

    let sim_config = ConfigHandle::new(config.sim.clone());
    if let Some(path) = &config.sim_config_path {
        if let Err(e) = sim_config.reload_from_file(path) {
            warn!("Using environment sim config: {}", e);
        }
    }

    let metrics = Arc::new(Metrics::new());
    if let Some(port) = config.metrics_port {
        let metrics_clone = metrics.clone();
        tokio::spawn(async move {
            if let Err(e) = metrics::start_metrics_server(metrics_clone, port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let mut world = World::new(demo_map(), config.tick_rate);
    populate_demo_world(&mut world)?;

    let limits = SnapshotLimits {
        max_size: config.max_snapshot_size,
        max_items: config.max_snapshot_items,
    };
    let mut session = GameSession::new(world, sim_config.clone(), metrics.clone(), limits).with_demo_recorder(true);
    // One viewer per protocol generation
    let mut viewers = bots();
    if let (Some(legacy), Some(extended)) = (viewers.next(), viewers.next()) {
        session.connect(legacy, VERSION_ENTITY_EXTRA - 1)?;
        session.connect(extended, VERSION_CURRENT)?;
    }
    let session = Arc::new(RwLock::new(session));

    let (tx, rx) = mpsc::channel(64);
    let tick_loop = start_tick_loop(session.clone(), config.tick_rate, tx);
    tokio::spawn(drain_snapshots(rx));
    tokio::spawn(wander(session.clone()));

    #[cfg(unix)]
    spawn_config_reloader(sim_config.clone(), config.sim_config_path.clone());

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    tokio::select! {
        result = tick_loop => {
            if let Err(e) = result {
                error!("Tick loop stopped: {}", e);
            }
        }
        _ = shutdown => {
            info!("Shutting down...");
        }
    }

    info!("Server stopped");
    Ok(())
}

fn bots() -> impl Iterator<Item = PlayerId> {
    PlayerId::all().take(BOT_COUNT)
}

/// Walled arena with a wall island and a conveyor strip
fn demo_map() -> CollisionMap {
    let (width, height) = (64, 40);
    let mut map = CollisionMap::open(width, height);
    for x in 0..width {
        map.set_tile(x, 0, Tile::Solid);
        map.set_tile(x, height - 1, Tile::Solid);
    }
    for y in 0..height {
        map.set_tile(0, y, Tile::Solid);
        map.set_tile(width - 1, y, Tile::Solid);
    }
    for y in 14..26 {
        map.set_tile(30, y, Tile::Solid);
        map.set_tile(31, y, Tile::Solid);
    }
    for x in 10..20 {
        map.set_tile(x, 32, Tile::SpeedZone(Vec2::new(SPEED_ZONE_FORCE, 0.0)));
    }
    map
}

fn populate_demo_world(world: &mut World) -> anyhow::Result<()> {
    let tick = world.current_tick();
    let at = |x: usize, y: usize| CollisionMap::tile_center(x, y);

    world.spawn_turret(Turret::new(at(16, 10), tick).with_freeze(true));
    world.spawn_turret(Turret::new(at(48, 10), tick).with_explosive(true));
    world.spawn_turret(Turret::new(at(48, 30), tick).with_freeze(true).with_explosive(true));
    world.spawn_turret(Turret::new(at(12, 32), tick).with_freeze(true).on_switch(DEMO_SWITCH));
    world.spawn_turret(Turret::new(at(24, 20), tick).on_switch(DEMO_SWITCH));

    for (i, player) in bots().enumerate() {
        world.spawn_character(player, at(6 + i * 6, 6))?;
        let team = TeamId::new(i % 3).unwrap_or(TeamId::FLOCK);
        world.set_team(player, team)?;
        if i == BOT_COUNT - 1 {
            world.set_solo(player, true)?;
        }
    }

    info!(
        "Demo arena ready: {} turrets, {} characters",
        world.entities().count(),
        world.characters().len()
    );
    Ok(())
}

/// Snapshots have no transport here; account for them and move on
async fn drain_snapshots(mut rx: mpsc::Receiver<StepOutput>) {
    while let Some(output) = rx.recv().await {
        for snapshot in &output.snapshots {
            trace!(
                "Tick {}: {} bytes for {}",
                output.report.tick,
                snapshot.payload.len(),
                snapshot.viewer
            );
        }
    }
}

/// Nudge bots around, flip the demo switch and respawn the fallen
async fn wander(session: Arc<RwLock<GameSession>>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut seconds: u64 = 0;
    loop {
        ticker.tick().await;
        seconds += 1;

        let mut session = session.write().await;
        let world = session.world_mut();
        let mut rng = rand::thread_rng();

        if seconds % 5 == 0 {
            let team = TeamId::new(rng.gen_range(0..3)).unwrap_or(TeamId::FLOCK);
            let enabled = !world.switches().is_team_enabled(DEMO_SWITCH, team);
            world.switches_mut().set_team_enabled(DEMO_SWITCH, team, enabled);
            info!("Switch {} {} for team {}", DEMO_SWITCH, if enabled { "on" } else { "off" }, team.index());
        }

        for player in bots() {
            if world.characters().get(player).is_none() {
                let spawn = Vec2::new(
                    rng.gen_range(2.0..62.0) * TILE_SIZE,
                    rng.gen_range(2.0..12.0) * TILE_SIZE,
                );
                if let Err(e) = world.spawn_character(player, spawn) {
                    warn!("Respawn of {} failed: {}", player, e);
                }
                continue;
            }
            let velocity = Vec2::new(rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0));
            if let Err(e) = world.set_velocity(player, velocity) {
                debug!("Bot {} not steered: {}", player, e);
            }
        }

        if rng.gen_bool(0.1) {
            if let Some(victim) = bots().nth(rng.gen_range(0..BOT_COUNT)) {
                match world.kill(victim) {
                    Ok(()) | Err(WorldError::UnknownCharacter(_)) => {}
                    Err(e) => debug!("Bot {} not killed: {}", victim, e),
                }
            }
        }
    }
}

#[cfg(unix)]
fn spawn_config_reloader(handle: ConfigHandle, path: Option<PathBuf>) {
    use tokio::signal::unix::{signal, SignalKind};

    let Some(path) = path else {
        return;
    };
    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("SIGHUP reload unavailable: {}", e);
                return;
            }
        };
        info!("Send SIGHUP to reload {}", path.display());
        while hangup.recv().await.is_some() {
            if let Err(e) = handle.reload_from_file(&path) {
                warn!("Config reload failed, keeping current config: {}", e);
            }
        }
    });
}
