//! Lightweight observability registry: request counters per endpoint,
//! command-buffer gauges, and tick-duration stats, dumpable as JSON or
//! Prometheus text exposition.

use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug)]
pub struct Metrics {
    enabled: bool,
    requests: Mutex<BTreeMap<&'static str, u64>>,
    moves_current: AtomicI64,
    moves_pending: AtomicI64,
    player_count: AtomicI64,
    round: AtomicU64,
    tick_count: AtomicU64,
    tick_total_micros: AtomicU64,
    tick_max_micros: AtomicU64,
}

impl Metrics {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            requests: Mutex::new(BTreeMap::new()),
            moves_current: AtomicI64::new(0),
            moves_pending: AtomicI64::new(0),
            player_count: AtomicI64::new(0),
            round: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            tick_total_micros: AtomicU64::new(0),
            tick_max_micros: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record_request(&self, endpoint: &'static str) {
        if !self.enabled {
            return;
        }
        let mut requests = self.requests.lock().unwrap();
        *requests.entry(endpoint).or_insert(0) += 1;
    }

    pub fn set_moves_current(&self, value: usize) {
        self.moves_current.store(value as i64, Ordering::Relaxed);
    }

    pub fn set_moves_pending(&self, value: usize) {
        self.moves_pending.store(value as i64, Ordering::Relaxed);
    }

    pub fn set_player_count(&self, value: usize) {
        self.player_count.store(value as i64, Ordering::Relaxed);
    }

    pub fn set_round(&self, round: u64) {
        self.round.store(round, Ordering::Relaxed);
    }

    pub fn observe_tick(&self, elapsed: Duration) {
        let micros = elapsed.as_micros() as u64;
        self.tick_count.fetch_add(1, Ordering::Relaxed);
        self.tick_total_micros.fetch_add(micros, Ordering::Relaxed);
        self.tick_max_micros.fetch_max(micros, Ordering::Relaxed);
    }

    fn tick_stats(&self) -> (u64, f64, f64) {
        let count = self.tick_count.load(Ordering::Relaxed);
        let total = self.tick_total_micros.load(Ordering::Relaxed);
        let max = self.tick_max_micros.load(Ordering::Relaxed);
        let avg_ms = if count > 0 {
            (total as f64 / count as f64) / 1000.0
        } else {
            0.0
        };
        (count, avg_ms, max as f64 / 1000.0)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let requests = self.requests.lock().unwrap().clone();
        let (tick_count, tick_avg_ms, tick_max_ms) = self.tick_stats();
        json!({
            "requests": requests,
            "gauges": {
                "moves_current_size": self.moves_current.load(Ordering::Relaxed),
                "moves_pending_size": self.moves_pending.load(Ordering::Relaxed),
                "player_count": self.player_count.load(Ordering::Relaxed),
                "round": self.round.load(Ordering::Relaxed),
            },
            "tick": {
                "count": tick_count,
                "avg_ms": tick_avg_ms,
                "max_ms": tick_max_ms,
            },
        })
    }

    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();
        out.push_str("# TYPE snake_http_requests_total counter\n");
        for (endpoint, count) in self.requests.lock().unwrap().iter() {
            out.push_str(&format!(
                "snake_http_requests_total{{endpoint=\"{endpoint}\"}} {count}\n"
            ));
        }
        out.push_str("# TYPE snake_moves_current_size gauge\n");
        out.push_str(&format!(
            "snake_moves_current_size {}\n",
            self.moves_current.load(Ordering::Relaxed)
        ));
        out.push_str("# TYPE snake_moves_pending_size gauge\n");
        out.push_str(&format!(
            "snake_moves_pending_size {}\n",
            self.moves_pending.load(Ordering::Relaxed)
        ));
        out.push_str("# TYPE snake_player_count gauge\n");
        out.push_str(&format!(
            "snake_player_count {}\n",
            self.player_count.load(Ordering::Relaxed)
        ));
        out.push_str("# TYPE snake_round gauge\n");
        out.push_str(&format!("snake_round {}\n", self.round.load(Ordering::Relaxed)));
        let (tick_count, tick_avg_ms, tick_max_ms) = self.tick_stats();
        out.push_str("# TYPE snake_tick_count counter\n");
        out.push_str(&format!("snake_tick_count {tick_count}\n"));
        out.push_str("# TYPE snake_tick_avg_ms gauge\n");
        out.push_str(&format!("snake_tick_avg_ms {tick_avg_ms}\n"));
        out.push_str("# TYPE snake_tick_max_ms gauge\n");
        out.push_str(&format!("snake_tick_max_ms {tick_max_ms}\n"));
        out
    }
}
