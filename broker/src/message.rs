use crate::model::Urn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// A notification as submitted by a producer. The producer URN is not part of
/// the body; it is derived from the producer's authenticated identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NotificationFromProducer {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Any JSON value with a name- and version-specific schema.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    #[schema(value_type = Object)]
    pub payload: Value,
}

/// A notification as delivered to a consumer over its connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NotificationToConsumer {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    #[schema(value_type = Object)]
    pub payload: Value,

    /// URN of the producer
    pub producer: Urn,
}

impl NotificationToConsumer {
    pub fn from_producer(producer: &Urn, notification: &NotificationFromProducer) -> Self {
        Self {
            name: notification.name.clone(),
            version: notification.version.clone(),
            payload: notification.payload.clone(),
            producer: producer.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_consumer_message_carries_producer_urn() {
        let notification = NotificationFromProducer {
            name: "alert".to_string(),
            version: "v1".to_string(),
            payload: json!({"level": 3}),
        };

        let message =
            NotificationToConsumer::from_producer(&Urn::new("zone1", "svc1"), &notification);

        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "name": "alert",
                "version": "v1",
                "payload": {"level": 3},
                "producer": {"id": "svc1", "namespace": "zone1"}
            })
        );
    }

    #[test]
    fn test_missing_payload_deserializes_as_null() {
        let notification: NotificationFromProducer =
            serde_json::from_value(json!({"name": "alert", "version": "v1"})).unwrap();
        assert!(notification.payload.is_null());
    }
}
