use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use rdkafka::{
    ClientConfig,
    consumer::{Consumer, StreamConsumer},
    error::KafkaError,
    message::Message,
    producer::{DeliveryFuture, FutureProducer, FutureRecord, Producer},
    util::Timeout,
};
use tracing::{debug, error, info};

use crate::{
    application::detection::{AlertEmitter, EventSource, InboundMessage, PollOutcome},
    config::KafkaConfig,
    shared::errors::{DetectionError, StartupError},
};

pub struct KafkaEventSource {
    consumer: Option<StreamConsumer>,
    topic: String,
}

impl KafkaEventSource {
    pub fn new(cfg: &KafkaConfig) -> Result<Self, StartupError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("group.id", &cfg.group_id)
            .set("bootstrap.servers", &cfg.brokers)
            .set("auto.offset.reset", &cfg.auto_offset_reset)
            .set("enable.partition.eof", cfg.enable_partition_eof.to_string())
            .set("session.timeout.ms", cfg.session_timeout_ms.to_string())
            .create()?;

        consumer.subscribe(&[&cfg.topic])?;
        info!(
            "Subscribed to '{}' as consumer group '{}'",
            cfg.topic, cfg.group_id
        );

        Ok(Self {
            consumer: Some(consumer),
            topic: cfg.topic.clone(),
        })
    }
}

#[async_trait]
impl EventSource for KafkaEventSource {
    async fn poll(&mut self, timeout: Duration) -> PollOutcome {
        let Some(consumer) = self.consumer.as_ref() else {
            return PollOutcome::Error(DetectionError::Transport(
                "consumer already closed".to_string(),
            ));
        };

        match tokio::time::timeout(timeout, consumer.recv()).await {
            Err(_) => PollOutcome::Idle,
            Ok(Err(KafkaError::PartitionEOF(partition))) => {
                debug!("No more messages in partition {partition}");
                PollOutcome::PartitionEof
            }
            Ok(Err(err)) => PollOutcome::Error(DetectionError::Transport(err.to_string())),
            Ok(Ok(msg)) => PollOutcome::Message(InboundMessage {
                payload: msg.payload().map(<[u8]>::to_vec),
                partition: msg.partition(),
                offset: msg.offset(),
            }),
        }
    }

    fn close(&mut self) {
        if let Some(consumer) = self.consumer.take() {
            consumer.unsubscribe();
            // Dropping the consumer leaves the group and tears the session down.
            drop(consumer);
            info!("Kafka consumer for '{}' closed", self.topic);
        }
    }
}

#[derive(Clone)]
pub struct KafkaAlertEmitter {
    inner: FutureProducer,
    rejected: Arc<AtomicU64>,
}

impl KafkaAlertEmitter {
    pub fn new(cfg: &KafkaConfig) -> Result<Self, StartupError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &cfg.brokers)
            .create()?;

        Ok(Self {
            inner: producer,
            rejected: Arc::new(AtomicU64::new(0)),
        })
    }
}

#[async_trait]
impl AlertEmitter for KafkaAlertEmitter {
    fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), DetectionError> {
        let delivery = self
            .inner
            .send_result(FutureRecord::to(topic).payload(&payload).key(key))
            .map_err(|(err, _)| DetectionError::Delivery(err.to_string()))?;

        tokio::spawn(report_delivery(
            topic.to_string(),
            delivery,
            self.rejected.clone(),
        ));
        Ok(())
    }

    async fn flush(&self, timeout: Duration) -> Result<(), DetectionError> {
        let producer = self.inner.clone();
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| DetectionError::Delivery(format!("flush task failed: {e}")))?
            .map_err(|e| DetectionError::Delivery(format!("flush did not complete: {e}")))
    }

    fn rejected_deliveries(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

async fn report_delivery(topic: String, delivery: DeliveryFuture, rejected: Arc<AtomicU64>) {
    match delivery.await {
        Ok(Ok((partition, offset))) => info!(
            "Fraud alert delivered to '{topic}' [partition {partition}] at offset {offset}"
        ),
        Ok(Err((err, _))) => {
            rejected.fetch_add(1, Ordering::Relaxed);
            error!("Fraud alert delivery to '{topic}' failed: {err}");
        }
        Err(_) => {
            rejected.fetch_add(1, Ordering::Relaxed);
            error!("Fraud alert delivery to '{topic}' was cancelled before acknowledgment");
        }
    }
}
