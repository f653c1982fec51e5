//! Full cycles against the fake backend and the fake PDU, real HTTP and SNMP clients.

use axum::http::StatusCode;
use clusterwatt::config::TelemetryConfig;
use clusterwatt::reporter::{JsonLinesSink, Reporter};
use clusterwatt::snapshot::NodeStats;
use clusterwatt::snmp::codec::ErrorStatus;
use clusterwatt::snmp::Version;
use clusterwatt::{CycleError, ErrorClass, Scheduler};
use clusterwatt_devkit::fixtures::{empty_vector, ENERGY_OID, POWER_OID};
use clusterwatt_devkit::{TestHarness, VectorBuilder};
use serde_json::json;
use std::time::Duration;
use tokio::sync::watch;

async fn seeded() -> (TestHarness, TelemetryConfig) {
    let harness = TestHarness::start().await.unwrap();
    let config = harness.config();
    harness.seed_cluster(&config);
    (harness, config)
}

#[tokio::test]
async fn test_full_cycle() {
    let (harness, config) = seeded().await;
    let aggregator = harness.aggregator(&config).unwrap();

    let snapshot = aggregator.collect().await.unwrap();
    let nodes = snapshot.nodes();

    assert_eq!(nodes.keys().collect::<Vec<_>>(), ["worker-01", "worker-02", "worker-03"]);
    assert_eq!(
        nodes["worker-01"],
        NodeStats {
            cpu_utilization_pct: 50.0,
            cpu_reserved_cores: 2.5,
            mem_utilization_pct: 25.0,
            mem_reserved_gib: 4.0,
            active: true,
        }
    );
    assert_eq!(nodes["worker-02"].cpu_utilization_pct, 12.35);
    assert_eq!(nodes["worker-02"].cpu_reserved_cores, 0.0);
    assert_eq!(nodes["worker-02"].mem_reserved_gib, 1.5);
    // reservation alone does not make a node active
    assert_eq!(nodes["worker-03"], NodeStats::default());

    assert_eq!(snapshot.pdu().raw_power, 153);
    assert_eq!(snapshot.pdu().power_watts, 1530.0);
    assert_eq!(snapshot.pdu().energy_wh, 200.0);
    assert!(snapshot.unknown_nodes().is_empty());
    assert_eq!(snapshot.active_count(), 2);

    let requests = harness.backend.requests();
    assert_eq!(requests.len(), 5);
    assert_eq!(requests[0], config.metrics.queries.inventory);
    assert_eq!(harness.pdu.requests(), 2);
}

#[tokio::test]
async fn test_cycles_are_idempotent() {
    let (harness, mut config) = seeded().await;
    config.schedule.concurrent_queries = true;
    let aggregator = harness.aggregator(&config).unwrap();

    let first = aggregator.collect().await.unwrap();
    let second = aggregator.collect().await.unwrap();

    assert_eq!(first.nodes(), second.nodes());
    assert_eq!(first.pdu().power_watts, second.pdu().power_watts);
    assert_eq!(first.pdu().energy_wh, second.pdu().energy_wh);
    assert!(second.timestamp() >= first.timestamp());
}

#[tokio::test]
async fn test_unknown_nodes_are_flagged() {
    let (harness, config) = seeded().await;
    harness.backend.answer(
        &config.metrics.queries.cpu_utilization,
        VectorBuilder::new("node")
            .sample("worker-01", 0.5)
            .sample("ghost", 0.9)
            .unlabeled(0.1)
            .build(),
    );

    let snapshot = harness.aggregator(&config).unwrap().collect().await.unwrap();
    assert_eq!(snapshot.unknown_nodes(), ["ghost".to_string()]);
    assert!(!snapshot.nodes().contains_key("ghost"));
    assert!(!snapshot.nodes()["worker-02"].active);
}

#[tokio::test]
async fn test_empty_inventory_still_emits() {
    let (harness, config) = seeded().await;
    harness.backend.answer(&config.metrics.queries.inventory, empty_vector());

    let snapshot = harness.aggregator(&config).unwrap().collect().await.unwrap();
    assert!(snapshot.nodes().is_empty());
    assert_eq!(snapshot.unknown_nodes(), ["worker-01", "worker-02", "worker-03"]);
    assert_eq!(snapshot.pdu().power_watts, 1530.0);
}

#[tokio::test]
async fn test_snmp_error_status_is_protocol() {
    let (harness, config) = seeded().await;
    harness.pdu.set_error_status(Some(ErrorStatus::GEN_ERR));

    let err = harness.aggregator(&config).unwrap().collect().await.unwrap_err();
    assert!(matches!(err, CycleError::Snmp { .. }));
    assert_eq!(err.class(), ErrorClass::Protocol);
    assert!(err.to_string().contains("power"));
}

#[tokio::test]
async fn test_missing_object_under_v2c() {
    let (harness, mut config) = seeded().await;
    config.snmp.version = Version::V2c;
    harness.pdu.remove(ENERGY_OID);

    let err = harness.aggregator(&config).unwrap().collect().await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Protocol);
    assert!(err.to_string().contains("energy"));
    assert!(err.to_string().contains("noSuchObject"));
}

#[tokio::test]
async fn test_silent_pdu_is_transport() {
    let (harness, mut config) = seeded().await;
    config.snmp.retries = 1;
    harness.pdu.set_silent(true);

    let err = harness.aggregator(&config).unwrap().collect().await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Transport);
    assert!(err.to_string().contains(&format!("127.0.0.1:{}", harness.pdu.port())));
    // one try plus one retry
    assert_eq!(harness.pdu.requests(), 2);
}

#[tokio::test]
async fn test_wrong_community_times_out() {
    let (harness, mut config) = seeded().await;
    config.snmp.community = "private".to_string();

    let err = harness.aggregator(&config).unwrap().collect().await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Transport);
}

#[tokio::test]
async fn test_backend_error_aborts_before_snmp() {
    let (harness, config) = seeded().await;
    harness.backend.forget(&config.metrics.queries.cpu_reserved);

    let err = harness.aggregator(&config).unwrap().collect().await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Protocol);
    assert!(err.to_string().contains("cpu_reserved"));
    assert_eq!(harness.pdu.requests(), 0);
}

#[tokio::test]
async fn test_http_failure_without_envelope() {
    let (harness, config) = seeded().await;
    harness.backend.answer_with_status(
        &config.metrics.queries.inventory,
        StatusCode::SERVICE_UNAVAILABLE,
        json!("overloaded"),
    );

    let err = harness.aggregator(&config).unwrap().collect().await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Protocol);
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn test_malformed_body_is_data_shape() {
    let (harness, config) = seeded().await;
    harness.backend.answer(&config.metrics.queries.mem_utilization, json!({ "status": "success" }));

    let err = harness.aggregator(&config).unwrap().collect().await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::DataShape);
}

#[tokio::test]
async fn test_unreachable_backend_is_transport() {
    let (harness, mut config) = seeded().await;
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    config.metrics.url = format!("http://127.0.0.1:{port}/api/v1/query");

    let err = harness.aggregator(&config).unwrap().collect().await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Transport);
}

#[tokio::test]
async fn test_scheduler_writes_jsonl() {
    let (harness, config) = seeded().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshots.jsonl");

    let reporter = Reporter::new().with_sink(JsonLinesSink::new(&path)).with_energy_integration();
    let mut scheduler = Scheduler::new(
        harness.aggregator(&config).unwrap(),
        reporter,
        Duration::from_millis(50),
    )
    .with_max_cycles(Some(3));

    let (_tx, rx) = watch::channel(false);
    let stats = scheduler.run(rx).await;
    assert_eq!(stats.emitted, 3);
    assert_eq!(stats.failed, 0);

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> = content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["nodes"]["worker-01"]["cpu_utilization_pct"], 50.0);
    assert_eq!(lines[0]["pdu"]["power_watts"], 1530.0);
    assert_eq!(lines[0]["integrated_energy_wh"], 0.0);
    assert!(lines[2]["integrated_energy_wh"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_scheduler_survives_a_failed_cycle() {
    let (harness, config) = seeded().await;

    harness.pdu.set_silent(true);
    let mut scheduler = Scheduler::new(
        harness.aggregator(&config).unwrap(),
        Reporter::new(),
        Duration::from_millis(300),
    )
    .with_max_cycles(Some(2));

    let (_tx, rx) = watch::channel(false);
    let run = tokio::spawn(async move { scheduler.run(rx).await });
    // first cycle times out (200 ms), the PDU recovers before the second
    tokio::time::sleep(Duration::from_millis(250)).await;
    harness.pdu.set_silent(false);
    harness.pdu.set_integer(POWER_OID, 160);

    let stats = run.await.unwrap();
    assert_eq!(stats.cycles, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.emitted, 1);
}
