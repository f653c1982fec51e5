/*!
# ClusterWatt DevKit - fakes and test utilities

Lets the agent run a real cycle without a cluster or a PDU:
- Fake Prometheus-compatible query backend (axum)
- Fake SNMP PDU agent (UDP)
- Canned query payloads
- Harness wiring both into a `TelemetryConfig`
*/

pub mod fake_backend;
pub mod fake_pdu;
pub mod fixtures;
pub mod harness;

pub use fake_backend::FakeMetricsBackend;
pub use fake_pdu::FakePdu;
pub use fixtures::VectorBuilder;
pub use harness::TestHarness;
