use periscope_client::standard::ConnectivityTracker;
use std::time::Duration;

fn connection<'a>(data: &'a serde_json::Value, service: &str) -> &'a serde_json::Value {
    data["outbound_connections"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["service"] == service)
        .unwrap()
}

// ── Basics ──────────────────────────────────────────────────────

#[test]
fn empty_tracker_reports_no_connections() {
    let tracker = ConnectivityTracker::new();
    let data = tracker.data();
    assert_eq!(data["outbound_connections"].as_array().unwrap().len(), 0);
}

#[test]
fn successful_calls_are_aggregated() {
    let tracker = ConnectivityTracker::new();
    for _ in 0..10 {
        tracker.track_success("billing", "https://billing:8443", Duration::from_millis(20));
    }

    let data = tracker.data();
    let conn = connection(&data, "billing");
    assert_eq!(conn["url"], "https://billing:8443");
    assert_eq!(conn["total_calls_1h"], 10);
    assert_eq!(conn["success_rate_1h"], 1.0);
    assert_eq!(conn["status"], "healthy");
    assert!(conn["last_call"].as_str().unwrap().ends_with("+00:00"));
    assert_eq!(conn["recent_errors"].as_array().unwrap().len(), 0);
}

#[test]
fn connections_are_sorted_by_service() {
    let tracker = ConnectivityTracker::new();
    tracker.track_success("zeta", "https://z", Duration::from_millis(1));
    tracker.track_success("alpha", "https://a", Duration::from_millis(1));

    let data = tracker.data();
    let services: Vec<&str> = data["outbound_connections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["service"].as_str().unwrap())
        .collect();
    assert_eq!(services, vec!["alpha", "zeta"]);
}

// ── Status thresholds ───────────────────────────────────────────

#[test]
fn status_degraded_below_95_percent() {
    let tracker = ConnectivityTracker::new();
    for _ in 0..92 {
        tracker.track_success("peer", "https://p", Duration::from_millis(5));
    }
    for _ in 0..8 {
        tracker.track_failure("peer", "https://p", Duration::from_millis(5), "timeout");
    }

    let data = tracker.data();
    assert_eq!(connection(&data, "peer")["status"], "degraded");
}

#[test]
fn status_unhealthy_below_90_percent() {
    let tracker = ConnectivityTracker::new();
    for _ in 0..5 {
        tracker.track_success("peer", "https://p", Duration::from_millis(5));
    }
    for _ in 0..5 {
        tracker.track_failure("peer", "https://p", Duration::from_millis(5), "refused");
    }

    let data = tracker.data();
    let conn = connection(&data, "peer");
    assert_eq!(conn["status"], "unhealthy");
    assert_eq!(conn["success_rate_1h"], 0.5);
}

#[test]
fn status_healthy_at_exactly_95_percent() {
    let tracker = ConnectivityTracker::new();
    for _ in 0..95 {
        tracker.track_success("peer", "https://p", Duration::from_millis(5));
    }
    for _ in 0..5 {
        tracker.track_failure("peer", "https://p", Duration::from_millis(5), "x");
    }

    let data = tracker.data();
    assert_eq!(connection(&data, "peer")["status"], "healthy");
}

// ── Percentiles ─────────────────────────────────────────────────

#[test]
fn percentiles_use_nearest_rank() {
    let tracker = ConnectivityTracker::new();
    // 100 samples at 1..=100 ms.
    for ms in 1..=100u64 {
        tracker.track_success("peer", "https://p", Duration::from_millis(ms));
    }

    let data = tracker.data();
    let latency = &connection(&data, "peer")["latency_ms"];
    // Index floor((n-1) * p) of the sorted values.
    assert_eq!(latency["p50"], 50);
    assert_eq!(latency["p95"], 95);
    assert_eq!(latency["p99"], 99);
}

#[test]
fn single_sample_percentiles_collapse() {
    let tracker = ConnectivityTracker::new();
    tracker.track_success("peer", "https://p", Duration::from_millis(7));

    let data = tracker.data();
    let latency = &connection(&data, "peer")["latency_ms"];
    assert_eq!(latency["p50"], 7);
    assert_eq!(latency["p95"], 7);
    assert_eq!(latency["p99"], 7);
}

// ── Recent errors ───────────────────────────────────────────────

#[test]
fn recent_errors_keep_the_newest_five() {
    let tracker = ConnectivityTracker::new();
    for n in 1..=7 {
        tracker.track_failure("peer", "https://p", Duration::from_millis(1), &format!("e{n}"));
    }

    let data = tracker.data();
    let errors: Vec<&str> = connection(&data, "peer")["recent_errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e.as_str().unwrap())
        .collect();
    assert_eq!(errors, vec!["e3", "e4", "e5", "e6", "e7"]);
}

#[test]
fn successes_between_failures_do_not_count_as_errors() {
    let tracker = ConnectivityTracker::new();
    tracker.track_failure("peer", "https://p", Duration::from_millis(1), "first");
    tracker.track_success("peer", "https://p", Duration::from_millis(1));
    tracker.track_failure("peer", "https://p", Duration::from_millis(1), "second");

    let data = tracker.data();
    let conn = connection(&data, "peer");
    assert_eq!(conn["total_calls_1h"], 3);
    let errors = conn["recent_errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0], "first");
    assert_eq!(errors[1], "second");
}

// ── Multiple peers ──────────────────────────────────────────────

#[test]
fn peers_are_tracked_independently() {
    let tracker = ConnectivityTracker::new();
    tracker.track_success("billing", "https://b", Duration::from_millis(10));
    tracker.track_failure("ledger", "https://l", Duration::from_millis(30), "boom");

    let data = tracker.data();
    assert_eq!(data["outbound_connections"].as_array().unwrap().len(), 2);
    assert_eq!(connection(&data, "billing")["status"], "healthy");
    assert_eq!(connection(&data, "ledger")["status"], "unhealthy");
}
