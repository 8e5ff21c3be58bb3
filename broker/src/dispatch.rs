use crate::connection::{ConnectionRegistry, SendError};
use crate::identity::Identity;
use crate::message::{NotificationFromProducer, NotificationToConsumer};
use crate::model::Urn;
use crate::subscription::{NotificationTypeId, SubscriptionIndex};
use futures::future::join_all;
use log::*;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

/// Why a notification did not reach one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Subscribed, but has no live connection.
    NotConnected,
    /// The connection went away while sending.
    Closed,
    /// The connection did not accept the message within the send timeout.
    TimedOut,
}

impl From<SendError> for FailureReason {
    fn from(err: SendError) -> Self {
        match err {
            SendError::Closed => FailureReason::Closed,
            SendError::TimedOut => FailureReason::TimedOut,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DeliveryFailure {
    pub identity: Identity,
    pub reason: FailureReason,
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct DeliveryReport {
    pub delivered: Vec<Identity>,
    pub failed: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

/// Fans a producer's notification out to every matching, connected subscriber.
///
/// Reads the subscription index to decide who, then the connection registry to
/// decide where. Delivery is best effort and at most once.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    index: Arc<SubscriptionIndex>,
    registry: Arc<ConnectionRegistry>,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        index: Arc<SubscriptionIndex>,
        registry: Arc<ConnectionRegistry>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            index,
            registry,
            send_timeout,
        }
    }

    /// Sends run concurrently; dropping the returned future abandons every
    /// send that has not completed yet.
    pub async fn dispatch(
        &self,
        producer: &Urn,
        notification: &NotificationFromProducer,
    ) -> DeliveryReport {
        let notification_type =
            NotificationTypeId::new(notification.name.clone(), notification.version.clone());
        let subscribers =
            self.index
                .subscribers_for(&producer.namespace, &notification_type, &producer.id);

        let mut report = DeliveryReport::default();
        if subscribers.is_empty() {
            debug!("No subscribers for {notification_type} from {producer}");
            return report;
        }

        let message = NotificationToConsumer::from_producer(producer, notification);
        let mut sends = Vec::with_capacity(subscribers.len());

        for identity in subscribers {
            match self.registry.lookup(&identity) {
                Some(connection) => {
                    let message = message.clone();
                    let timeout = self.send_timeout;
                    sends.push(async move {
                        let result = connection.send(message, timeout).await;
                        (identity, result)
                    });
                }
                None => {
                    debug!("{identity} is subscribed to {notification_type} but not connected");
                    report.failed.push(DeliveryFailure {
                        identity,
                        reason: FailureReason::NotConnected,
                    });
                }
            }
        }

        for (identity, result) in join_all(sends).await {
            match result {
                Ok(()) => report.delivered.push(identity),
                Err(e) => {
                    warn!(
                        "Failed to deliver {notification_type} from {producer} to {identity}: {e:?}"
                    );
                    report.failed.push(DeliveryFailure {
                        identity,
                        reason: e.into(),
                    });
                }
            }
        }

        info!(
            "Dispatched {notification_type} from {producer}: {} delivered, {} failed",
            report.delivered.len(),
            report.failed.len()
        );
        report
    }
}
