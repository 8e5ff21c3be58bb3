//! Subscription index: who wants which notification types, from whom.
//!
//! Entries are keyed by namespace plus notification type. Each entry keeps an
//! ordered subscriber list per producing service and one more list for
//! subscribers that accept the type from any service in the namespace.

use crate::identity::Identity;
use crate::model::{NotificationDescriptor, Subscription, SubscriptionList, Urn};
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Identifies a notification type by name and version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationTypeId {
    name: String,
    version: String,
}

impl NotificationTypeId {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl From<&NotificationDescriptor> for NotificationTypeId {
    fn from(descriptor: &NotificationDescriptor) -> Self {
        Self::new(descriptor.name.clone(), descriptor.version.clone())
    }
}

impl fmt::Display for NotificationTypeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.name, self.version)
    }
}

/// Index key: a namespace plus a notification type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionKey {
    namespace: String,
    notification: NotificationTypeId,
}

impl SubscriptionKey {
    pub fn new(namespace: impl Into<String>, notification: NotificationTypeId) -> Self {
        Self {
            namespace: namespace.into(),
            notification,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn notification(&self) -> &NotificationTypeId {
        &self.notification
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.namespace, self.notification)
    }
}

/// Which producers of a namespace a subscription covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// Any service in the namespace.
    Namespace,
    /// One service, by id.
    Service(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Scope::Namespace => f.write_str("*"),
            Scope::Service(service_id) => f.write_str(service_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Added,
    AlreadySubscribed,
}

#[derive(Debug, Default)]
struct Subscribers {
    namespace: Vec<Identity>,
    services: HashMap<String, Vec<Identity>>,
}

impl Subscribers {
    fn list(&self, scope: &Scope) -> Option<&Vec<Identity>> {
        match scope {
            Scope::Namespace => Some(&self.namespace),
            Scope::Service(service_id) => self.services.get(service_id),
        }
    }

    fn list_mut(&mut self, scope: &Scope) -> &mut Vec<Identity> {
        match scope {
            Scope::Namespace => &mut self.namespace,
            Scope::Service(service_id) => self.services.entry(service_id.clone()).or_default(),
        }
    }

    fn scopes_of<'a>(&'a self, identity: &'a Identity) -> impl Iterator<Item = Scope> + 'a {
        let namespace = self
            .namespace
            .contains(identity)
            .then_some(Scope::Namespace);
        let services = self
            .services
            .iter()
            .filter(move |(_, subscribers)| subscribers.contains(identity))
            .map(|(service_id, _)| Scope::Service(service_id.clone()));
        namespace.into_iter().chain(services)
    }
}

/// Concurrent subscription index. Every mutation of one key happens under that
/// key's shard write lock, so check-then-insert is atomic.
#[derive(Debug, Default)]
pub struct SubscriptionIndex {
    entries: DashMap<SubscriptionKey, Subscribers>,
}

impl SubscriptionIndex {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Creates the entry for `namespace` + `notification` if it does not exist yet.
    pub fn ensure_key(
        &self,
        namespace: &str,
        notification: &NotificationTypeId,
    ) -> SubscriptionKey {
        let key = SubscriptionKey::new(namespace, notification.clone());
        self.entries.entry(key.clone()).or_default();
        key
    }

    /// Position of `identity` in the subscriber list for `scope` under `key`.
    pub fn is_subscribed(
        &self,
        key: &SubscriptionKey,
        scope: &Scope,
        identity: &Identity,
    ) -> Option<usize> {
        position_of(self.entries.get(key)?.list(scope)?, identity)
    }

    /// Appends `identity` to the list for `scope` unless it is already there. The
    /// lookup and the append happen under the same entry lock.
    pub fn add_subscriber(
        &self,
        key: &SubscriptionKey,
        scope: &Scope,
        identity: &Identity,
    ) -> SubscribeOutcome {
        let mut entry = self.entries.entry(key.clone()).or_default();
        let subscribers = entry.list_mut(scope);

        match position_of(subscribers, identity) {
            Some(_) => SubscribeOutcome::AlreadySubscribed,
            None => {
                subscribers.push(identity.clone());
                SubscribeOutcome::Added
            }
        }
    }

    /// Removes `identity` from the list for `scope`. Returns whether it was present.
    pub fn remove_subscriber(
        &self,
        key: &SubscriptionKey,
        scope: &Scope,
        identity: &Identity,
    ) -> bool {
        let Some(mut entry) = self.entries.get_mut(key) else {
            return false;
        };

        match scope {
            Scope::Namespace => remove_from(&mut entry.namespace, identity),
            Scope::Service(service_id) => {
                let removed = entry
                    .services
                    .get_mut(service_id)
                    .is_some_and(|subscribers| remove_from(subscribers, identity));
                if entry.services.get(service_id).is_some_and(Vec::is_empty) {
                    entry.services.remove(service_id);
                }
                removed
            }
        }
    }

    /// Everyone who should receive `notification` from `service_id` in `namespace`:
    /// subscribers of that service first, then namespace-wide subscribers.
    pub fn subscribers_for(
        &self,
        namespace: &str,
        notification: &NotificationTypeId,
        service_id: &str,
    ) -> Vec<Identity> {
        let key = SubscriptionKey::new(namespace, notification.clone());
        let Some(entry) = self.entries.get(&key) else {
            return Vec::new();
        };

        let mut subscribers = entry
            .services
            .get(service_id)
            .cloned()
            .unwrap_or_default();
        for identity in &entry.namespace {
            if !subscribers.contains(identity) {
                subscribers.push(identity.clone());
            }
        }
        subscribers
    }

    /// All subscriptions held by `identity`, grouped by namespace and service.
    pub fn subscriptions_of(&self, identity: &Identity) -> SubscriptionList {
        let mut grouped: BTreeMap<(String, Scope), Vec<NotificationTypeId>> = BTreeMap::new();

        for entry in self.entries.iter() {
            for scope in entry.value().scopes_of(identity) {
                grouped
                    .entry((entry.key().namespace.clone(), scope))
                    .or_default()
                    .push(entry.key().notification.clone());
            }
        }

        let subscriptions = grouped
            .into_iter()
            .map(|((namespace, scope), mut notifications)| {
                notifications.sort();
                let id = match scope {
                    Scope::Namespace => String::new(),
                    Scope::Service(service_id) => service_id,
                };
                Subscription {
                    urn: Some(Urn::new(namespace, id)),
                    notifications: notifications
                        .into_iter()
                        .map(|n| NotificationDescriptor::new(n.name, n.version))
                        .collect(),
                }
            })
            .collect();

        SubscriptionList { subscriptions }
    }

    /// Number of namespace + notification type keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn position_of(subscribers: &[Identity], identity: &Identity) -> Option<usize> {
    subscribers.iter().position(|subscriber| subscriber == identity)
}

fn remove_from(subscribers: &mut Vec<Identity>, identity: &Identity) -> bool {
    match position_of(subscribers, identity) {
        Some(index) => {
            subscribers.remove(index);
            true
        }
        None => false,
    }
}
