use broker::Manager;
use config::Config;
use log::info;
use std::sync::Arc;

pub mod config;
pub mod logging;

/// Builds the broker instance described by `config`.
pub fn init_broker(config: &Config) -> Manager {
    let settings = config.broker_settings();
    info!(
        "Broker config: send_timeout={}ms, outbound_queue_depth={}, peer_identity_header={}",
        settings.send_timeout.as_millis(),
        settings.queue_depth,
        config.peer_identity_header().unwrap_or("<none>"),
    );

    Manager::with_settings(settings)
}

// Service-level state shared with every request handler
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<Manager>,
    pub config: Config,
}

impl AppState {
    pub fn new(app_config: Config, broker: &Arc<Manager>) -> Self {
        Self {
            broker: Arc::clone(broker),
            config: app_config,
        }
    }

    pub fn broker_ref(&self) -> &Manager {
        self.broker.as_ref()
    }
}
