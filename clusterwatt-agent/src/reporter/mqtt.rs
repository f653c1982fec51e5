use super::{Report, ReportSink};
use crate::config::MqttSinkConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rumqttc::{AsyncClient, ClientError, Event, Incoming, MqttOptions, QoS};
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

const REQUEST_CAPACITY: usize = 10;

/// Publishes each snapshot as JSON on a topic.
///
/// Publishing never waits on the broker: while it is unreachable the
/// client queue fills up and further snapshots are reported as errors.
pub struct MqttSink {
    client: AsyncClient,
    topic: String,
}

impl MqttSink {
    /// Configure the client and drive its event loop in the background.
    /// Must be called from within a tokio runtime.
    pub fn connect(config: &MqttSinkConfig) -> Self {
        let client_id = format!("clusterwatt-{}", Uuid::new_v4().simple());
        let mut mqtt_options = MqttOptions::new(&client_id, &config.host, config.port);
        mqtt_options.set_keep_alive(Duration::from_secs(30));
        mqtt_options.set_clean_session(true);

        let (client, mut eventloop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);

        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                        info!("MQTT sink connected");
                    }
                    Ok(event) => debug!("MQTT event: {:?}", event),
                    Err(e) => {
                        error!("MQTT connection error: {}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        });

        info!("MQTT sink publishing to {} on {}:{}", config.topic, config.host, config.port);
        Self::new(client, &config.topic)
    }

    fn new(client: AsyncClient, topic: &str) -> Self {
        Self { client, topic: topic.to_string() }
    }
}

fn payload(report: &Report<'_>) -> Result<Vec<u8>> {
    serde_json::to_vec(report).context("Failed to serialize snapshot")
}

#[async_trait]
impl ReportSink for MqttSink {
    fn name(&self) -> &'static str {
        "mqtt"
    }

    async fn emit(&mut self, report: &Report<'_>) -> Result<()> {
        let payload = payload(report)?;
        match self.client.try_publish(&self.topic, QoS::AtLeastOnce, false, payload) {
            Ok(()) => {
                debug!("Snapshot queued on {}", self.topic);
                Ok(())
            }
            Err(ClientError::TryRequest(_)) => {
                anyhow::bail!("MQTT queue full (broker unreachable?), snapshot dropped")
            }
            Err(e) => Err(e).context("Failed to publish snapshot"),
        }
    }
}
