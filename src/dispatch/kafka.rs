//! Kafka broker sink.
//!
//! Thin producer-side adapter over rdkafka's `FutureProducer`. Topic naming
//! and redelivery live upstream in the pipeline; this sink only performs a
//! single delivery attempt per call.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use tracing::{debug, info};

use crate::config::KafkaConfig;

use super::{BrokerSink, DispatchError, Result};

/// Librdkafka-side enqueue timeout for a single send.
const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// Kafka sink over a `FutureProducer`.
pub struct KafkaSink {
    producer: FutureProducer,
}

impl KafkaSink {
    /// Create a producer from connection settings.
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = build_client_config(config).create().map_err(|e| {
            DispatchError::Connection(format!("failed to create Kafka producer: {e}"))
        })?;

        info!(
            bootstrap_servers = %config.bootstrap_servers,
            "connected to Kafka"
        );

        Ok(Self { producer })
    }
}

fn build_client_config(config: &KafkaConfig) -> ClientConfig {
    let mut client = ClientConfig::new();
    client.set("bootstrap.servers", &config.bootstrap_servers);
    client.set("message.timeout.ms", "5000");
    client.set("acks", "all");
    client.set("enable.idempotence", "true");

    if let Some(ref protocol) = config.security_protocol {
        client.set("security.protocol", protocol);
    }
    if let Some(ref mechanism) = config.sasl_mechanism {
        client.set("sasl.mechanism", mechanism);
    }
    if let Some(ref username) = config.sasl_username {
        client.set("sasl.username", username);
    }
    if let Some(ref password) = config.sasl_password {
        client.set("sasl.password", password);
    }
    if let Some(ref ca_location) = config.ssl_ca_location {
        client.set("ssl.ca.location", ca_location);
    }

    client
}

#[async_trait]
impl BrokerSink for KafkaSink {
    async fn send(&self, topic: &str, key: Option<&str>, payload: &[u8]) -> Result<()> {
        let mut record = FutureRecord::to(topic).payload(payload);
        if let Some(k) = key {
            record = record.key(k);
        }

        self.producer
            .send(record, ENQUEUE_TIMEOUT)
            .await
            .map_err(|(e, _)| DispatchError::Send(format!("failed to deliver to {topic}: {e}")))?;

        debug!(topic, key = ?key, "record delivered to Kafka");
        Ok(())
    }
}
