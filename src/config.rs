use std::time::Duration;

use serde::Deserialize;

use crate::shared::errors::StartupError;

pub const BROKER_ENV_VAR: &str = "KAFKA_BOOTSTRAP_SERVERS";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, StartupError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(
                config::File::with_name(&format!("config/{env}"))
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .set_override_option("kafka.brokers", std::env::var(BROKER_ENV_VAR).ok())?;

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()
    }

    /// Rejects a configuration the detection loop must never start with.
    pub fn validate(self) -> Result<Self, StartupError> {
        if self.kafka.brokers.trim().is_empty() {
            return Err(StartupError::MissingBroker);
        }
        if self.kafka.topic.trim().is_empty() || self.kafka.alert_topic.trim().is_empty() {
            return Err(StartupError::Config("topic names must not be empty".to_string()));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    #[serde(default)]
    pub brokers: String,
    #[serde(default = "KafkaConfig::default_group_id")]
    pub group_id: String,
    #[serde(default = "KafkaConfig::default_topic")]
    pub topic: String,
    #[serde(default = "KafkaConfig::default_topic")]
    pub alert_topic: String,
    #[serde(default = "KafkaConfig::default_auto_offset_reset")]
    pub auto_offset_reset: String,
    #[serde(default)]
    pub enable_partition_eof: bool,
    #[serde(default = "KafkaConfig::default_session_timeout_ms")]
    pub session_timeout_ms: u64,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: String::new(),
            group_id: Self::default_group_id(),
            topic: Self::default_topic(),
            alert_topic: Self::default_topic(),
            auto_offset_reset: Self::default_auto_offset_reset(),
            enable_partition_eof: false,
            session_timeout_ms: Self::default_session_timeout_ms(),
        }
    }
}

impl KafkaConfig {
    fn default_group_id() -> String {
        "fraud-detection-group".to_string()
    }

    fn default_topic() -> String {
        "audit-logs".to_string()
    }

    fn default_auto_offset_reset() -> String {
        "earliest".to_string()
    }

    fn default_session_timeout_ms() -> u64 {
        6000
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "DetectionConfig::default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    #[serde(default = "DetectionConfig::default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: Self::default_poll_timeout_ms(),
            flush_timeout_ms: Self::default_flush_timeout_ms(),
        }
    }
}

impl DetectionConfig {
    fn default_poll_timeout_ms() -> u64 {
        1000
    }

    fn default_flush_timeout_ms() -> u64 {
        10_000
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }
}
