//! Per-peer connectivity statistics over a sliding window.
//!
//! Services report the outcome of every outbound call; the tracker keeps a
//! one-hour window of samples per peer and aggregates them into the
//! `inter-service-connectivity` component.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use periscope_types::format_utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Sliding window length in seconds.
const WINDOW_SECS: i64 = 3600;

/// Maximum number of error strings reported per peer.
const MAX_RECENT_ERRORS: usize = 5;

struct CallSample {
    timestamp: DateTime<Utc>,
    success: bool,
    latency: Duration,
    error: Option<String>,
}

struct Connection {
    service: String,
    url: String,
    samples: Vec<CallSample>,
}

impl Connection {
    fn prune(&mut self, now: DateTime<Utc>) {
        self.samples
            .retain(|sample| (now - sample.timestamp).num_seconds() < WINDOW_SECS);
    }
}

/// Tracks call outcomes to multiple remote services.
///
/// The map carries its own lock; each connection carries another, so
/// concurrent reporters for different peers never contend.
pub struct ConnectivityTracker {
    connections: Mutex<HashMap<String, Arc<Mutex<Connection>>>>,
}

impl ConnectivityTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Records a successful call.
    pub fn track_success(&self, service: &str, url: &str, latency: Duration) {
        self.track(service, url, latency, None);
    }

    /// Records a failed call with its error message.
    pub fn track_failure(&self, service: &str, url: &str, latency: Duration, error: &str) {
        self.track(service, url, latency, Some(error.to_string()));
    }

    fn track(&self, service: &str, url: &str, latency: Duration, error: Option<String>) {
        let connection = self.connection_for(service, url);
        let now = Utc::now();

        let mut connection = connection.lock();
        connection.samples.push(CallSample {
            timestamp: now,
            success: error.is_none(),
            latency,
            error,
        });
        connection.prune(now);
    }

    fn connection_for(&self, service: &str, url: &str) -> Arc<Mutex<Connection>> {
        let mut connections = self.connections.lock();
        Arc::clone(connections.entry(service.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(Connection {
                service: service.to_string(),
                url: url.to_string(),
                samples: Vec::new(),
            }))
        }))
    }

    /// Aggregated data for the `inter-service-connectivity` component.
    ///
    /// Peers are emitted in service-name order so equal call histories
    /// always encode to equal bytes.
    #[must_use]
    pub fn data(&self) -> Value {
        let mut handles: Vec<Arc<Mutex<Connection>>> = {
            let connections = self.connections.lock();
            connections.values().cloned().collect()
        };
        handles.sort_by_key(|handle| handle.lock().service.clone());

        let now = Utc::now();
        let mut outbound = Vec::new();

        for handle in handles {
            let mut connection = handle.lock();
            connection.prune(now);
            if connection.samples.is_empty() {
                continue;
            }

            let total = connection.samples.len();
            let successes = connection.samples.iter().filter(|s| s.success).count();
            let success_rate = successes as f64 / total as f64;

            let last_call = connection
                .samples
                .iter()
                .map(|s| s.timestamp)
                .max()
                .unwrap_or(now);

            let mut latencies: Vec<u64> = connection
                .samples
                .iter()
                .map(|s| s.latency.as_millis() as u64)
                .collect();
            latencies.sort_unstable();

            // The five newest failures, oldest of those first.
            let errors: Vec<String> = connection
                .samples
                .iter()
                .filter_map(|s| s.error.clone())
                .collect();
            let recent_errors: Vec<String> = errors
                .iter()
                .skip(errors.len().saturating_sub(MAX_RECENT_ERRORS))
                .cloned()
                .collect();

            let status = if success_rate >= 0.95 {
                "healthy"
            } else if success_rate >= 0.90 {
                "degraded"
            } else {
                "unhealthy"
            };

            outbound.push(json!({
                "service": connection.service,
                "url": connection.url,
                "status": status,
                "last_call": format_utc(last_call),
                "total_calls_1h": total,
                "success_rate_1h": success_rate,
                "latency_ms": {
                    "p50": percentile(&latencies, 0.50),
                    "p95": percentile(&latencies, 0.95),
                    "p99": percentile(&latencies, 0.99),
                },
                "recent_errors": recent_errors,
            }));
        }

        json!({ "outbound_connections": outbound })
    }
}

impl Default for ConnectivityTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Nearest-rank percentile: index `floor((n - 1) * p)` of the sorted values.
fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let index = ((sorted.len() - 1) as f64 * p) as usize;
    sorted[index]
}
