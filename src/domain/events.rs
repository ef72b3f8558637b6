use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const IBAN_UPDATED: &str = "IBAN_UPDATED";
pub const FRAUD_DETECTED: &str = "FRAUD_DETECTED";

/// Inbound audit record. Fields other than these three are ignored; an absent
/// or `null` field decodes to an empty string, which never matches
/// [`IBAN_UPDATED`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct AuditEvent {
    #[serde(rename = "EventType", default, deserialize_with = "null_as_empty")]
    pub event_type: String,
    #[serde(rename = "UserId", default, deserialize_with = "null_as_empty")]
    pub user_id: String,
    #[serde(rename = "NewIban", default, deserialize_with = "null_as_empty")]
    pub new_iban: String,
}

impl AuditEvent {
    pub fn is_iban_update(&self) -> bool {
        self.event_type == IBAN_UPDATED
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FraudAlert {
    #[serde(rename = "EventType")]
    event_type: String,
    #[serde(rename = "UserId")]
    user_id: String,
    #[serde(rename = "Details")]
    details: String,
    #[serde(rename = "Timestamp")]
    timestamp: DateTime<Utc>,
}

impl FraudAlert {
    pub fn invalid_iban(event: &AuditEvent, detected_at: DateTime<Utc>) -> Self {
        Self {
            event_type: FRAUD_DETECTED.to_string(),
            user_id: event.user_id.clone(),
            details: format!("Invalid IBAN detected: '{}'", event.new_iban),
            timestamp: detected_at,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
