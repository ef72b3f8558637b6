use thiserror::Error;

/// Failures scoped to one message or one alert. The detection loop logs these
/// and moves on; none of them stop it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectionError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("delivery error: {0}")]
    Delivery(String),
}

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("kafka broker address is not configured (set KAFKA_BOOTSTRAP_SERVERS or APP__KAFKA__BROKERS)")]
    MissingBroker,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("kafka client error: {0}")]
    Kafka(String),
}

impl From<config::ConfigError> for StartupError {
    fn from(err: config::ConfigError) -> Self {
        StartupError::Config(err.to_string())
    }
}

impl From<rdkafka::error::KafkaError> for StartupError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        StartupError::Kafka(err.to_string())
    }
}
