use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::{
    application::shutdown::Shutdown,
    config::AppConfig,
    domain::{
        codec,
        events::{AuditEvent, FraudAlert},
        iban,
    },
    shared::errors::DetectionError,
};

/// One bounded wait on the inbound stream.
#[derive(Debug)]
pub enum PollOutcome {
    /// Nothing arrived within the wait window.
    Idle,
    /// The broker reported that a partition has no more buffered messages.
    PartitionEof,
    Error(DetectionError),
    Message(InboundMessage),
}

#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub payload: Option<Vec<u8>>,
    pub partition: i32,
    pub offset: i64,
}

#[async_trait]
pub trait EventSource: Send {
    async fn poll(&mut self, timeout: Duration) -> PollOutcome;

    /// Releases the broker session. Called exactly once by [`DetectionLoop`].
    fn close(&mut self);
}

#[async_trait]
pub trait AlertEmitter: Send + Sync {
    /// Enqueues `payload` without waiting for the broker to acknowledge it.
    fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), DetectionError>;

    /// Waits until every enqueued payload is acknowledged, or `timeout` passes.
    async fn flush(&self, timeout: Duration) -> Result<(), DetectionError>;

    /// Alerts that were enqueued but later refused by the broker, as reported
    /// by the delivery callback.
    fn rejected_deliveries(&self) -> u64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    ShuttingDown,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ignored,
    ValidIban,
    AlertRaised,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionStats {
    pub messages: u64,
    pub ignored_events: u64,
    pub iban_events: u64,
    pub valid_ibans: u64,
    pub alerts_raised: u64,
    pub decode_failures: u64,
    pub transport_errors: u64,
    pub delivery_failures: u64,
    pub rejected_deliveries: u64,
}

impl fmt::Display for DetectionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "messages={} ignored={} iban_updates={} valid={} alerts={} decode_failures={} transport_errors={} delivery_failures={} rejected_deliveries={}",
            self.messages,
            self.ignored_events,
            self.iban_events,
            self.valid_ibans,
            self.alerts_raised,
            self.decode_failures,
            self.transport_errors,
            self.delivery_failures,
            self.rejected_deliveries
        )
    }
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub alert_topic: String,
    pub poll_timeout: Duration,
    pub flush_timeout: Duration,
}

impl DetectionSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            alert_topic: cfg.kafka.alert_topic.clone(),
            poll_timeout: cfg.detection.poll_timeout(),
            flush_timeout: cfg.detection.flush_timeout(),
        }
    }
}

/// Sequential poll/decode/validate/emit worker.
///
/// Owns the inbound source and closes it once on every exit path, including
/// unwinding: if [`DetectionLoop::run`] never reaches `Stopped`, `Drop` does
/// the release.
pub struct DetectionLoop {
    source: Box<dyn EventSource>,
    emitter: Arc<dyn AlertEmitter>,
    shutdown: Shutdown,
    settings: DetectionSettings,
    state: LoopState,
    stats: DetectionStats,
}

impl DetectionLoop {
    pub fn new(
        source: Box<dyn EventSource>,
        emitter: Arc<dyn AlertEmitter>,
        shutdown: Shutdown,
        settings: DetectionSettings,
    ) -> Self {
        Self {
            source,
            emitter,
            shutdown,
            settings,
            state: LoopState::Running,
            stats: DetectionStats::default(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> DetectionStats {
        DetectionStats {
            rejected_deliveries: self.emitter.rejected_deliveries(),
            ..self.stats
        }
    }

    pub async fn run(mut self) -> DetectionStats {
        info!(
            "Fraud detection loop running, alerts go to '{}'",
            self.settings.alert_topic
        );

        while self.state == LoopState::Running {
            if self.shutdown.is_triggered() {
                self.state = LoopState::ShuttingDown;
                break;
            }

            // Only the idle wait is interruptible; a received message is always
            // processed to completion.
            let outcome = tokio::select! {
                biased;
                _ = self.shutdown.triggered() => {
                    self.state = LoopState::ShuttingDown;
                    break;
                }
                outcome = self.source.poll(self.settings.poll_timeout) => outcome,
            };

            self.handle(outcome).await;
        }

        info!("Shutting down fraud detection loop");
        self.stop();
        let stats = self.stats();
        info!("Fraud detection loop stopped: {stats}");
        stats
    }

    async fn handle(&mut self, outcome: PollOutcome) {
        match outcome {
            PollOutcome::Idle => {}
            PollOutcome::PartitionEof => debug!("Reached end of partition"),
            PollOutcome::Error(err) => {
                self.stats.transport_errors += 1;
                error!("Consumer error: {err}");
            }
            PollOutcome::Message(message) => {
                self.stats.messages += 1;
                match self.process(&message).await {
                    Ok(verdict) => self.record(verdict),
                    Err(err @ DetectionError::Delivery(_)) => {
                        self.stats.delivery_failures += 1;
                        error!(
                            "Failed to deliver fraud alert for message at partition {} offset {}: {err}",
                            message.partition, message.offset
                        );
                    }
                    Err(err) => {
                        self.stats.decode_failures += 1;
                        warn!(
                            "Error processing message at partition {} offset {}: {err}",
                            message.partition, message.offset
                        );
                    }
                }
            }
        }
    }

    /// Runs one inbound message through the pipeline. Every failure is returned
    /// rather than raised so the caller can contain it to this message.
    pub async fn process(&mut self, message: &InboundMessage) -> Result<Verdict, DetectionError> {
        let payload = message
            .payload
            .as_deref()
            .ok_or_else(|| DetectionError::Decode("message has no payload".to_string()))?;
        let event = codec::decode(payload)?;

        debug!(
            "Received audit event {:?} for user {:?}",
            event.event_type, event.user_id
        );

        if !event.is_iban_update() {
            return Ok(Verdict::Ignored);
        }
        self.stats.iban_events += 1;

        match iban::check(&event.new_iban) {
            Ok(()) => {
                debug!("IBAN for user {:?} looks safe", event.user_id);
                Ok(Verdict::ValidIban)
            }
            Err(reason) => {
                warn!(
                    "Suspicious IBAN {:?} for user {:?}: {reason}",
                    event.new_iban, event.user_id
                );
                self.emit(&event).await?;
                Ok(Verdict::AlertRaised)
            }
        }
    }

    async fn emit(&mut self, event: &AuditEvent) -> Result<(), DetectionError> {
        let alert = FraudAlert::invalid_iban(event, Utc::now());

        self.emitter.send(
            &self.settings.alert_topic,
            alert.user_id(),
            codec::encode(&alert),
        )?;
        self.stats.alerts_raised += 1;
        self.emitter.flush(self.settings.flush_timeout).await
    }

    fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Ignored => self.stats.ignored_events += 1,
            Verdict::ValidIban => self.stats.valid_ibans += 1,
            Verdict::AlertRaised => {}
        }
    }

    fn stop(&mut self) {
        if self.state != LoopState::Stopped {
            self.source.close();
            self.state = LoopState::Stopped;
        }
    }
}

impl Drop for DetectionLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
