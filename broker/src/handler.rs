use crate::error::{invalid_error, not_initialized_error, Error};
use crate::identity::Identity;
use crate::model::{NotificationDescriptor, SubscriptionList};
use crate::subscription::{
    NotificationTypeId, Scope, SubscribeOutcome, SubscriptionIndex, SubscriptionKey,
};
use log::*;
use std::sync::Arc;

/// Validates subscribe/unsubscribe requests and applies them to the index.
///
/// The identity passed in is always the one resolved from the caller's own
/// credential, so nobody can subscribe on behalf of someone else.
#[derive(Debug, Clone)]
pub struct SubscriptionRequestHandler {
    index: Option<Arc<SubscriptionIndex>>,
}

impl SubscriptionRequestHandler {
    pub fn new(index: Option<Arc<SubscriptionIndex>>) -> Self {
        Self { index }
    }

    fn index(&self) -> Result<&SubscriptionIndex, Error> {
        self.index
            .as_deref()
            .ok_or_else(|| not_initialized_error("Subscription index not initialized"))
    }

    /// Subscribe `identity` to `notifications` emitted by one service of `namespace`.
    pub fn subscribe_to_service(
        &self,
        identity: &Identity,
        namespace: &str,
        service_id: &str,
        notifications: &[NotificationDescriptor],
    ) -> Result<(), Error> {
        self.subscribe(
            identity,
            namespace,
            Scope::Service(service_id.to_string()),
            notifications,
        )
    }

    /// Subscribe `identity` to `notifications` emitted by any service of `namespace`.
    pub fn subscribe_to_namespace(
        &self,
        identity: &Identity,
        namespace: &str,
        notifications: &[NotificationDescriptor],
    ) -> Result<(), Error> {
        self.subscribe(identity, namespace, Scope::Namespace, notifications)
    }

    pub fn unsubscribe_from_service(
        &self,
        identity: &Identity,
        namespace: &str,
        service_id: &str,
        notifications: &[NotificationDescriptor],
    ) -> Result<(), Error> {
        self.unsubscribe(
            identity,
            namespace,
            Scope::Service(service_id.to_string()),
            notifications,
        )
    }

    pub fn unsubscribe_from_namespace(
        &self,
        identity: &Identity,
        namespace: &str,
        notifications: &[NotificationDescriptor],
    ) -> Result<(), Error> {
        self.unsubscribe(identity, namespace, Scope::Namespace, notifications)
    }

    pub fn subscriptions_of(&self, identity: &Identity) -> Result<SubscriptionList, Error> {
        Ok(self.index()?.subscriptions_of(identity))
    }

    fn subscribe(
        &self,
        identity: &Identity,
        namespace: &str,
        scope: Scope,
        notifications: &[NotificationDescriptor],
    ) -> Result<(), Error> {
        let index = self.index()?;
        validate(namespace, &scope, notifications)?;

        for notification in notifications {
            let key = index.ensure_key(namespace, &NotificationTypeId::from(notification));

            match index.add_subscriber(&key, &scope, identity) {
                SubscribeOutcome::Added => {
                    debug!("{identity} subscribed to {key} - {scope}");
                }
                SubscribeOutcome::AlreadySubscribed => {
                    info!("{identity} is already subscribed to {key} - {scope}");
                }
            }
        }

        Ok(())
    }

    fn unsubscribe(
        &self,
        identity: &Identity,
        namespace: &str,
        scope: Scope,
        notifications: &[NotificationDescriptor],
    ) -> Result<(), Error> {
        let index = self.index()?;
        validate(namespace, &scope, notifications)?;

        for notification in notifications {
            let key = SubscriptionKey::new(namespace, NotificationTypeId::from(notification));
            if !index.remove_subscriber(&key, &scope, identity) {
                debug!("{identity} was not subscribed to {key} - {scope}");
            }
        }

        Ok(())
    }
}

/// Rejects the whole request before anything is applied.
fn validate(
    namespace: &str,
    scope: &Scope,
    notifications: &[NotificationDescriptor],
) -> Result<(), Error> {
    if namespace.is_empty() {
        return Err(invalid_error("Namespace must not be empty"));
    }
    if matches!(scope, Scope::Service(service_id) if service_id.is_empty()) {
        return Err(invalid_error("Service id must not be empty"));
    }
    if notifications.iter().any(|n| n.name.is_empty()) {
        return Err(invalid_error("Notification name must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn handler() -> (SubscriptionRequestHandler, Arc<SubscriptionIndex>) {
        let index = Arc::new(SubscriptionIndex::new());
        (
            SubscriptionRequestHandler::new(Some(Arc::clone(&index))),
            index,
        )
    }

    fn alert_v1() -> Vec<NotificationDescriptor> {
        vec![NotificationDescriptor::new("alert", "v1")]
    }

    #[test]
    fn test_subscribe_to_service_twice_is_idempotent() {
        let (handler, index) = handler();
        let consumer = Identity::new("zone2:c");

        handler
            .subscribe_to_service(&consumer, "zone1", "svc1", &alert_v1())
            .unwrap();
        handler
            .subscribe_to_service(&consumer, "zone1", "svc1", &alert_v1())
            .unwrap();

        let subscribers =
            index.subscribers_for("zone1", &NotificationTypeId::new("alert", "v1"), "svc1");
        assert_eq!(subscribers, vec![consumer]);
    }

    #[test]
    fn test_subscribe_to_namespace_uses_real_arguments() {
        let (handler, index) = handler();
        let consumer = Identity::new("zone2:c");

        handler
            .subscribe_to_namespace(&consumer, "zone1", &alert_v1())
            .unwrap();

        let alert = NotificationTypeId::new("alert", "v1");
        assert_eq!(
            index.subscribers_for("zone1", &alert, "any-service"),
            vec![consumer]
        );
        assert!(index.subscribers_for("namespace", &alert, "svc1").is_empty());
    }

    #[test]
    fn test_each_descriptor_gets_its_own_key() {
        let (handler, index) = handler();
        let notifications = vec![
            NotificationDescriptor::new("alert", "v1"),
            NotificationDescriptor::new("alert", "v2"),
            NotificationDescriptor::new("status", "v1"),
        ];

        handler
            .subscribe_to_service(&Identity::new("c"), "zone1", "svc1", &notifications)
            .unwrap();

        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_uninitialized_handler_fails() {
        let handler = SubscriptionRequestHandler::new(None);

        let err = handler
            .subscribe_to_service(&Identity::new("c"), "zone1", "svc1", &alert_v1())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotInitialized);

        let err = handler
            .subscribe_to_namespace(&Identity::new("c"), "zone1", &alert_v1())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotInitialized);
    }

    #[test]
    fn test_invalid_requests_change_nothing() {
        let (handler, index) = handler();
        let consumer = Identity::new("c");
        let mixed = vec![
            NotificationDescriptor::new("alert", "v1"),
            NotificationDescriptor::new("", "v1"),
        ];

        assert_eq!(
            handler
                .subscribe_to_namespace(&consumer, "", &alert_v1())
                .unwrap_err()
                .kind(),
            ErrorKind::Invalid
        );
        assert_eq!(
            handler
                .subscribe_to_service(&consumer, "zone1", "", &alert_v1())
                .unwrap_err()
                .kind(),
            ErrorKind::Invalid
        );
        assert_eq!(
            handler
                .subscribe_to_service(&consumer, "zone1", "svc1", &mixed)
                .unwrap_err()
                .kind(),
            ErrorKind::Invalid
        );
        assert!(index.is_empty());
    }

    #[test]
    fn test_unsubscribe_then_list() {
        let (handler, _index) = handler();
        let consumer = Identity::new("c");

        handler
            .subscribe_to_service(&consumer, "zone1", "svc1", &alert_v1())
            .unwrap();
        handler
            .subscribe_to_namespace(&consumer, "zone1", &alert_v1())
            .unwrap();
        handler
            .unsubscribe_from_service(&consumer, "zone1", "svc1", &alert_v1())
            .unwrap();

        let list = handler.subscriptions_of(&consumer).unwrap();
        assert_eq!(list.subscriptions.len(), 1);
        assert_eq!(
            list.subscriptions[0].urn.as_ref().map(|urn| urn.id.as_str()),
            Some("")
        );

        handler
            .unsubscribe_from_namespace(&consumer, "zone1", &alert_v1())
            .unwrap();
        assert!(handler
            .subscriptions_of(&consumer)
            .unwrap()
            .subscriptions
            .is_empty());
    }
}
