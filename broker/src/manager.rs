use crate::connection::{ConnectionHandle, ConnectionRegistry, Registration, DEFAULT_QUEUE_DEPTH};
use crate::directory::ServiceDirectory;
use crate::dispatch::{DeliveryReport, Dispatcher};
use crate::error::{invalid_error, not_initialized_error, Error};
use crate::handler::SubscriptionRequestHandler;
use crate::identity::Identity;
use crate::message::NotificationFromProducer;
use crate::model::Urn;
use crate::subscription::SubscriptionIndex;
use log::*;
use std::error::Error as StdError;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Default bound on a single send to one consumer connection.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(500);

/// Tunables for a broker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub send_timeout: Duration,
    pub queue_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            send_timeout: DEFAULT_SEND_TIMEOUT,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

/// One broker instance: the connection registry, the subscription index and the
/// producer directory, plus the operations that tie them together.
pub struct Manager {
    registry: Arc<ConnectionRegistry>,
    subscriptions: OnceLock<Arc<SubscriptionIndex>>,
    directory: ServiceDirectory,
    settings: Settings,
}

impl Manager {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    /// A fully initialized broker.
    pub fn with_settings(settings: Settings) -> Self {
        let manager = Self::uninitialized(settings);
        manager.initialize();
        manager
    }

    /// A broker whose subscription state has not been installed yet. Subscribe and
    /// dispatch fail with `NotInitialized` until `initialize` is called.
    pub fn uninitialized(settings: Settings) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::with_queue_depth(settings.queue_depth)),
            subscriptions: OnceLock::new(),
            directory: ServiceDirectory::new(),
            settings,
        }
    }

    /// Installs the subscription index. Returns false if it was already installed.
    pub fn initialize(&self) -> bool {
        let installed = self
            .subscriptions
            .set(Arc::new(SubscriptionIndex::new()))
            .is_ok();
        if installed {
            info!("Broker subscription index initialized");
        }
        installed
    }

    /// Register a consumer connection and run the transport upgrade.
    pub fn register_connection<F, T, E>(
        &self,
        identity: Identity,
        request_host: &str,
        upgrade: F,
    ) -> Result<(ConnectionHandle, T), Error>
    where
        F: FnOnce(Registration) -> Result<T, E>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        let registered = self.registry.register(identity, request_host, upgrade)?;
        info!(
            "Registered new consumer connection for {}",
            registered.0.identity()
        );
        Ok(registered)
    }

    /// Drop the connection bound to `identity`, if any.
    pub fn unregister_connection(&self, identity: &Identity) {
        if self.registry.remove(identity) {
            info!("Unregistered consumer connection for {identity}");
        }
    }

    pub fn connection(&self, identity: &Identity) -> Option<ConnectionHandle> {
        self.registry.lookup(identity)
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn subscription_handler(&self) -> SubscriptionRequestHandler {
        SubscriptionRequestHandler::new(self.subscriptions.get().cloned())
    }

    pub fn directory(&self) -> &ServiceDirectory {
        &self.directory
    }

    pub fn dispatcher(&self) -> Result<Dispatcher, Error> {
        let index = self
            .subscriptions
            .get()
            .cloned()
            .ok_or_else(|| not_initialized_error("Subscription index not initialized"))?;
        Ok(Dispatcher::new(
            index,
            Arc::clone(&self.registry),
            self.settings.send_timeout,
        ))
    }

    /// Fan `notification` from `producer` out to its subscribers.
    pub async fn dispatch(
        &self,
        producer: &Urn,
        notification: &NotificationFromProducer,
    ) -> Result<DeliveryReport, Error> {
        if notification.name.is_empty() {
            return Err(invalid_error("Notification name must not be empty"));
        }
        let dispatcher = self.dispatcher()?;
        Ok(dispatcher.dispatch(producer, notification).await)
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}
