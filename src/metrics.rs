//! Prometheus-compatible metrics endpoint
//!
//! Default endpoint: http://localhost:9090/metrics

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Rolling window used for tick time percentiles
const TICK_HISTORY: usize = 1000;
/// Percentiles are noise below this many samples
const MIN_PERCENTILE_SAMPLES: usize = 10;

/// Last [`TICK_HISTORY`] tick durations in microseconds
#[derive(Debug, Default)]
struct TickWindow {
    samples: VecDeque<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TickPercentiles {
    p95: u64,
    p99: u64,
    max: u64,
}

impl TickWindow {
    fn push(&mut self, us: u64) -> Option<TickPercentiles> {
        if self.samples.len() == TICK_HISTORY {
            self.samples.pop_front();
        }
        self.samples.push_back(us);
        if self.samples.len() < MIN_PERCENTILE_SAMPLES {
            return None;
        }

        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        let at = |q: f32| sorted[((sorted.len() as f32 * q) as usize).min(sorted.len() - 1)];
        Some(TickPercentiles {
            p95: at(0.95),
            p99: at(0.99),
            max: at(1.0),
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    fn as_str(self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

struct Sample {
    name: &'static str,
    help: &'static str,
    kind: MetricKind,
    value: u64,
}

/// Metrics registry for the tick server
#[derive(Debug)]
pub struct Metrics {
    // Entity counts
    pub characters: AtomicU64,
    pub turrets: AtomicU64,
    pub projectiles: AtomicU64,

    // Tick timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub tick_count: AtomicU64,

    pub shots_fired: AtomicU64,
    pub targets_hit: AtomicU64,

    // Snapshots
    pub viewers: AtomicU64,
    pub snapshots_sent: AtomicU64,
    pub snapshot_bytes: AtomicU64,
    pub snapshot_records_dropped: AtomicU64,

    start_time: Instant,
    tick_window: Mutex<TickWindow>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            characters: AtomicU64::new(0),
            turrets: AtomicU64::new(0),
            projectiles: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            shots_fired: AtomicU64::new(0),
            targets_hit: AtomicU64::new(0),
            viewers: AtomicU64::new(0),
            snapshots_sent: AtomicU64::new(0),
            snapshot_bytes: AtomicU64::new(0),
            snapshot_records_dropped: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_window: Mutex::new(TickWindow::default()),
        }
    }

    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        if let Some(p) = self.tick_window.lock().push(us) {
            self.tick_time_p95_us.store(p.p95, Ordering::Relaxed);
            self.tick_time_p99_us.store(p.p99, Ordering::Relaxed);
            self.tick_time_max_us.store(p.max, Ordering::Relaxed);
        }
    }

    /// Account for one encoded snapshot
    pub fn record_snapshot(&self, bytes: usize, dropped: usize) {
        self.snapshots_sent.fetch_add(1, Ordering::Relaxed);
        self.snapshot_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        self.snapshot_records_dropped.fetch_add(dropped as u64, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    fn samples(&self) -> [Sample; 15] {
        use MetricKind::{Counter, Gauge};
        fn sample(name: &'static str, help: &'static str, kind: MetricKind, counter: &AtomicU64) -> Sample {
            Sample {
                name,
                help,
                kind,
                value: counter.load(Ordering::Relaxed),
            }
        }

        [
            sample("gunline_characters", "Number of live characters", Gauge, &self.characters),
            sample("gunline_turrets", "Number of turrets", Gauge, &self.turrets),
            sample("gunline_projectiles", "Plasma projectiles in flight", Gauge, &self.projectiles),
            sample("gunline_tick_time_microseconds", "Last tick time", Gauge, &self.tick_time_us),
            sample("gunline_tick_time_p95_microseconds", "95th percentile tick time", Gauge, &self.tick_time_p95_us),
            sample("gunline_tick_time_p99_microseconds", "99th percentile tick time", Gauge, &self.tick_time_p99_us),
            sample("gunline_tick_time_max_microseconds", "Slowest tick in the window", Gauge, &self.tick_time_max_us),
            sample("gunline_tick_count", "Ticks processed", Counter, &self.tick_count),
            sample("gunline_shots_fired_total", "Plasma shots fired by turrets", Counter, &self.shots_fired),
            sample("gunline_targets_hit_total", "Plasma shots that reached their target", Counter, &self.targets_hit),
            sample("gunline_viewers", "Snapshot recipients in the last tick", Gauge, &self.viewers),
            sample("gunline_snapshots_sent_total", "Snapshots encoded", Counter, &self.snapshots_sent),
            sample("gunline_snapshot_bytes_total", "Snapshot bytes encoded", Counter, &self.snapshot_bytes),
            sample(
                "gunline_snapshot_records_dropped_total",
                "Records skipped because a snapshot was full",
                Counter,
                &self.snapshot_records_dropped,
            ),
            Sample {
                name: "gunline_uptime_seconds",
                help: "Server uptime in seconds",
                kind: Counter,
                value: self.uptime_seconds(),
            },
        ]
    }

    /// Prometheus text exposition format
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);
        for s in self.samples() {
            let _ = write!(
                output,
                "# HELP {name} {}\n# TYPE {name} {}\n{name} {}\n",
                s.help,
                s.kind.as_str(),
                s.value,
                name = s.name
            );
        }
        output
    }

    /// JSON rendering for direct API access
    pub fn to_json(&self) -> String {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        serde_json::json!({
            "entities": {
                "characters": load(&self.characters),
                "turrets": load(&self.turrets),
                "projectiles": load(&self.projectiles),
            },
            "performance": {
                "tick_time_us": load(&self.tick_time_us),
                "tick_time_p95_us": load(&self.tick_time_p95_us),
                "tick_time_p99_us": load(&self.tick_time_p99_us),
                "tick_time_max_us": load(&self.tick_time_max_us),
                "tick_count": load(&self.tick_count),
            },
            "gameplay": {
                "shots_fired": load(&self.shots_fired),
                "targets_hit": load(&self.targets_hit),
            },
            "snapshots": {
                "viewers": load(&self.viewers),
                "sent": load(&self.snapshots_sent),
                "bytes": load(&self.snapshot_bytes),
                "records_dropped": load(&self.snapshot_records_dropped),
            },
            "uptime_seconds": self.uptime_seconds(),
        })
        .to_string()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn http_response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    )
}

/// Answer one request by its request line
fn respond(request: &str, metrics: &Metrics) -> String {
    let mut parts = request.split_whitespace();
    let path = match (parts.next(), parts.next()) {
        (Some("GET"), Some(path)) => path,
        _ => return http_response("405 Method Not Allowed", "text/plain", ""),
    };

    match path {
        "/metrics" => http_response("200 OK", "text/plain; version=0.0.4", &metrics.to_prometheus()),
        "/metrics/json" => http_response("200 OK", "application/json", &metrics.to_json()),
        "/health" => http_response("200 OK", "text/plain", "OK"),
        _ => http_response("404 Not Found", "text/plain", ""),
    }
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];
            let n = match socket.read(&mut buffer).await {
                Ok(0) => return,
                Ok(n) => n,
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                    return;
                }
            };

            let response = respond(&String::from_utf8_lossy(&buffer[..n]), &metrics);
            if let Err(e) = socket.write_all(response.as_bytes()).await {
                debug!("Failed to write metrics response to {}: {}", peer, e);
            }
        });
    }
}
