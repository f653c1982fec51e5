/*!
Test harness wiring both fakes into an agent configuration

`TestHarness::start()` brings up the fake backend and the fake PDU, and
`config()` returns a `TelemetryConfig` pointing at them with short
timeouts so failure tests finish quickly.
*/

use crate::fake_backend::FakeMetricsBackend;
use crate::fake_pdu::FakePdu;
use crate::fixtures::{VectorBuilder, ENERGY_OID, POWER_OID};
use anyhow::Result;
use clusterwatt::config::TelemetryConfig;
use clusterwatt::metrics::QueryClient;
use clusterwatt::snmp::SnmpReader;
use clusterwatt::Aggregator;

pub const COMMUNITY: &str = "public";

pub struct TestHarness {
    pub backend: FakeMetricsBackend,
    pub pdu: FakePdu,
}

impl TestHarness {
    pub async fn start() -> Result<Self> {
        env_logger::try_init().ok(); // test logging

        Ok(Self {
            backend: FakeMetricsBackend::start().await?,
            pdu: FakePdu::start(COMMUNITY).await?,
        })
    }

    pub fn config(&self) -> TelemetryConfig {
        let mut config = TelemetryConfig::default();
        config.metrics.url = self.backend.query_url();
        config.metrics.timeout_secs = 2;
        config.snmp.target = "127.0.0.1".to_string();
        config.snmp.port = self.pdu.port();
        config.snmp.community = COMMUNITY.to_string();
        config.snmp.power_oid = POWER_OID.to_string();
        config.snmp.energy_oid = ENERGY_OID.to_string();
        config.snmp.timeout_ms = 200;
        config.snmp.retries = 0;
        config.schedule.interval = "50ms".to_string();
        config.report.console = false;
        config
    }

    /// Three-node cluster, `worker-03` idle (no CPU series), PDU at 153 / 2000.
    pub fn seed_cluster(&self, config: &TelemetryConfig) {
        let label = config.metrics.label.as_str();
        let queries = &config.metrics.queries;

        self.backend.answer(
            &queries.inventory,
            VectorBuilder::new(label)
                .sample("worker-01", 1.0)
                .sample("worker-02", 1.0)
                .sample("worker-03", 1.0)
                .build(),
        );
        self.backend.answer(
            &queries.cpu_utilization,
            VectorBuilder::new(label).sample("worker-01", 0.5).sample("worker-02", 0.123456).build(),
        );
        self.backend.answer(
            &queries.cpu_reserved,
            VectorBuilder::new(label).sample("worker-01", 2.5).sample("worker-03", 1.0).build(),
        );
        self.backend.answer(
            &queries.mem_utilization,
            VectorBuilder::new(label).sample("worker-01", 0.25).sample("worker-02", 0.75).build(),
        );
        self.backend.answer(
            &queries.mem_reserved,
            VectorBuilder::new(label).sample("worker-01", 4e9).sample("worker-02", 1.5e9).build(),
        );

        self.pdu.set_integer(POWER_OID, 153);
        self.pdu.set_integer(ENERGY_OID, 2000);
    }

    /// Aggregator using the real HTTP and SNMP clients.
    pub fn aggregator(&self, config: &TelemetryConfig) -> Result<Aggregator<QueryClient, SnmpReader>> {
        let metrics = QueryClient::new(&config.metrics)?;
        let snmp = SnmpReader::from_config(&config.snmp);
        Ok(Aggregator::new(config, metrics, snmp)?)
    }
}
