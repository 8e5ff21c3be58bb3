use crate::error::{auth_mismatch_error, duplicate_connection_error, transport_error, Error};
use crate::identity::Identity;
use crate::message::NotificationToConsumer;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::*;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Default capacity of each consumer's outbound queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a single send to a consumer connection did not go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The consumer's session has ended and its queue is gone.
    Closed,
    /// The consumer's queue stayed full for the whole send timeout.
    TimedOut,
}

/// Cheap, cloneable handle to one live consumer connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    identity: Identity,
    sender: mpsc::Sender<NotificationToConsumer>,
}

impl ConnectionHandle {
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Queue a notification for this connection, waiting at most `timeout` for room.
    pub async fn send(
        &self,
        notification: NotificationToConsumer,
        timeout: Duration,
    ) -> Result<(), SendError> {
        match tokio::time::timeout(timeout, self.sender.send(notification)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(SendError::Closed),
            Err(_) => Err(SendError::TimedOut),
        }
    }
}

/// Removes its connection from the registry when dropped.
///
/// Owned by the task driving the transport, so the entry goes away when the
/// transport closes or fails. Only the entry created for this very connection
/// is removed; a newer connection for the same identity is left alone.
#[derive(Debug)]
pub struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
    identity: Identity,
    id: ConnectionId,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.registry.remove_connection(&self.identity, &self.id) {
            debug!(
                "Connection {} for {} closed, registry entry removed",
                self.id.as_str(),
                self.identity
            );
        }
    }
}

/// Everything the transport side needs to serve a freshly registered connection.
///
/// Holds the receiving end of the queue only. The sending end lives in the
/// registry entry, so once that entry is removed `recv` drains and returns `None`.
#[derive(Debug)]
pub struct Registration {
    receiver: mpsc::Receiver<NotificationToConsumer>,
    guard: ConnectionGuard,
}

impl Registration {
    pub fn identity(&self) -> &Identity {
        &self.guard.identity
    }

    pub fn id(&self) -> &ConnectionId {
        &self.guard.id
    }

    /// Next queued notification, or `None` once the registry dropped this connection.
    pub async fn recv(&mut self) -> Option<NotificationToConsumer> {
        self.receiver.recv().await
    }

    pub fn into_parts(self) -> (mpsc::Receiver<NotificationToConsumer>, ConnectionGuard) {
        (self.receiver, self.guard)
    }
}

/// Maps each consumer identity to its single live connection.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: DashMap<Identity, ConnectionHandle>,
    queue_depth: usize,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_queue_depth(DEFAULT_QUEUE_DEPTH)
    }

    pub fn with_queue_depth(queue_depth: usize) -> Self {
        Self {
            connections: DashMap::new(),
            queue_depth: queue_depth.max(1),
        }
    }

    /// Register a connection for `identity` and run the transport upgrade.
    ///
    /// Rejects an identity equal to `request_host` and any identity that already
    /// owns a live connection. The entry is reserved before `upgrade` runs and is
    /// released again if the upgrade fails.
    pub fn register<F, T, E>(
        self: &Arc<Self>,
        identity: Identity,
        request_host: &str,
        upgrade: F,
    ) -> Result<(ConnectionHandle, T), Error>
    where
        F: FnOnce(Registration) -> Result<T, E>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        if identity.as_str() == request_host {
            warn!("Rejecting connection for {identity}: identity matches request host");
            return Err(auth_mismatch_error(&format!("Incorrect app ID {identity}")));
        }

        let (sender, receiver) = mpsc::channel(self.queue_depth);
        let handle = ConnectionHandle {
            id: ConnectionId::new(),
            identity: identity.clone(),
            sender,
        };

        match self.connections.entry(identity.clone()) {
            Entry::Occupied(_) => {
                warn!("Rejecting connection for {identity}: connection already exists");
                return Err(duplicate_connection_error(&format!(
                    "Connection exists for app ID {identity}"
                )));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(handle.clone());
            }
        }

        let registration = Registration {
            receiver,
            guard: ConnectionGuard {
                registry: Arc::clone(self),
                identity: identity.clone(),
                id: handle.id.clone(),
            },
        };

        match upgrade(registration) {
            Ok(output) => {
                debug!(
                    "Registered connection {} for {identity}",
                    handle.id.as_str()
                );
                Ok((handle, output))
            }
            Err(e) => {
                // The registration (and its guard) may still be alive inside the
                // failed upgrade's error path, so release the entry explicitly.
                self.remove_connection(&identity, &handle.id);
                let err = transport_error(e);
                warn!("Connection upgrade for {identity} failed: {err}");
                Err(err)
            }
        }
    }

    pub fn lookup(&self, identity: &Identity) -> Option<ConnectionHandle> {
        self.connections.get(identity).map(|entry| entry.clone())
    }

    /// Remove whatever connection is bound to `identity`. Idempotent.
    pub fn remove(&self, identity: &Identity) -> bool {
        self.connections.remove(identity).is_some()
    }

    /// Remove the entry for `identity` only if it still belongs to connection `id`.
    pub fn remove_connection(&self, identity: &Identity, id: &ConnectionId) -> bool {
        self.connections
            .remove_if(identity, |_, handle| handle.id == *id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn accept(registration: Registration) -> Result<Registration, &'static str> {
        Ok(registration)
    }

    #[test]
    fn test_register_then_lookup() {
        let registry = Arc::new(ConnectionRegistry::new());
        let identity = Identity::new("zone1:consumer");

        let (handle, _registration) = registry
            .register(identity.clone(), "broker.zone1:443", accept)
            .unwrap();

        assert_eq!(registry.len(), 1);
        let found = registry.lookup(&identity).unwrap();
        assert_eq!(found.id(), handle.id());
    }

    #[test]
    fn test_identity_equal_to_host_is_rejected() {
        let registry = Arc::new(ConnectionRegistry::new());
        let upgraded = AtomicBool::new(false);

        let err = registry
            .register(Identity::new("broker.zone1"), "broker.zone1", |registration| {
                upgraded.store(true, Ordering::SeqCst);
                accept(registration)
            })
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AuthMismatch);
        assert!(!upgraded.load(Ordering::SeqCst));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_registration_keeps_first_connection() {
        let registry = Arc::new(ConnectionRegistry::new());
        let identity = Identity::new("zone1:consumer");

        let (first, _first_registration) = registry
            .register(identity.clone(), "broker", accept)
            .unwrap();
        let err = registry
            .register(identity.clone(), "broker", accept)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DuplicateConnection);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(&identity).unwrap().id(), first.id());
    }

    #[test]
    fn test_failed_upgrade_leaves_no_entry() {
        let registry = Arc::new(ConnectionRegistry::new());

        let err = registry
            .register(Identity::new("zone1:consumer"), "broker", |_registration| {
                Err::<(), _>("handshake failed")
            })
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_dropping_registration_removes_entry() {
        let registry = Arc::new(ConnectionRegistry::new());
        let identity = Identity::new("zone1:consumer");

        let (_, registration) = registry
            .register(identity.clone(), "broker", accept)
            .unwrap();
        assert_eq!(registry.len(), 1);

        drop(registration);
        assert!(registry.lookup(&identity).is_none());
    }

    #[tokio::test]
    async fn test_recv_ends_once_connection_is_removed() {
        let registry = Arc::new(ConnectionRegistry::new());
        let identity = Identity::new("zone1:consumer");
        let (_, mut registration) = registry
            .register(identity.clone(), "broker", accept)
            .unwrap();

        assert!(registry.remove(&identity));

        let next = tokio::time::timeout(Duration::from_millis(500), registration.recv())
            .await
            .expect("recv should end once the registry entry is gone");
        assert_eq!(next, None);
    }

    #[test]
    fn test_registration_matches_registered_handle() {
        let registry = Arc::new(ConnectionRegistry::new());
        let identity = Identity::new("zone1:consumer");

        let (handle, registration) = registry
            .register(identity.clone(), "broker", accept)
            .unwrap();

        assert_eq!(registration.identity(), &identity);
        assert_eq!(registration.id(), handle.id());
    }

    #[test]
    fn test_stale_guard_does_not_remove_newer_connection() {
        let registry = Arc::new(ConnectionRegistry::new());
        let identity = Identity::new("zone1:consumer");

        let (_, stale) = registry
            .register(identity.clone(), "broker", accept)
            .unwrap();
        assert!(registry.remove(&identity));

        let (current, _current_registration) = registry
            .register(identity.clone(), "broker", accept)
            .unwrap();
        drop(stale);

        assert_eq!(registry.lookup(&identity).unwrap().id(), current.id());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = Arc::new(ConnectionRegistry::new());
        let identity = Identity::new("zone1:consumer");
        let (_, _registration) = registry
            .register(identity.clone(), "broker", accept)
            .unwrap();

        assert!(registry.remove(&identity));
        assert!(!registry.remove(&identity));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_registration_admits_exactly_one() {
        let registry = Arc::new(ConnectionRegistry::new());
        let identity = Identity::new("zone1:consumer");

        let workers: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let identity = identity.clone();
                std::thread::spawn(move || registry.register(identity, "broker", accept))
            })
            .collect();

        let results: Vec<_> = workers
            .into_iter()
            .map(|worker| worker.join().unwrap())
            .collect();

        let admitted = results.iter().filter(|result| result.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|result| {
                matches!(result, Err(e) if e.kind() == ErrorKind::DuplicateConnection)
            })
            .count();

        assert_eq!(admitted, 1);
        assert_eq!(duplicates, 15);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_send_reaches_registration() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (handle, mut registration) = registry
            .register(Identity::new("zone1:consumer"), "broker", accept)
            .unwrap();

        let notification = NotificationToConsumer {
            name: "alert".to_string(),
            ..Default::default()
        };
        handle
            .send(notification.clone(), Duration::from_millis(100))
            .await
            .unwrap();

        assert_eq!(registration.recv().await, Some(notification));
    }

    #[tokio::test]
    async fn test_send_to_closed_connection_fails() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (handle, registration) = registry
            .register(Identity::new("zone1:consumer"), "broker", accept)
            .unwrap();

        let (receiver, _guard) = registration.into_parts();
        drop(receiver);

        let result = handle
            .send(NotificationToConsumer::default(), Duration::from_millis(100))
            .await;
        assert_eq!(result, Err(SendError::Closed));
    }

    #[tokio::test]
    async fn test_send_to_full_queue_times_out() {
        let registry = Arc::new(ConnectionRegistry::with_queue_depth(1));
        let (handle, _registration) = registry
            .register(Identity::new("zone1:consumer"), "broker", accept)
            .unwrap();

        let timeout = Duration::from_millis(20);
        handle
            .send(NotificationToConsumer::default(), timeout)
            .await
            .unwrap();
        let result = handle.send(NotificationToConsumer::default(), timeout).await;

        assert_eq!(result, Err(SendError::TimedOut));
    }
}
