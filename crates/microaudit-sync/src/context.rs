//! Injected ports and tunables shared by the sync components

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use microaudit_core::config::{Config, DEFAULT_DEBOUNCE_MS, DEFAULT_RELOAD_LIMIT};
use microaudit_core::ports::{
    IChangeFeed, IIdentityProvider, INotificationService, IRemoteStore, Notification,
};

/// The adapters a controller talks to
#[derive(Clone)]
pub struct SyncPorts {
    pub store: Arc<dyn IRemoteStore + Send + Sync>,
    pub identity: Arc<dyn IIdentityProvider + Send + Sync>,
    pub notifier: Arc<dyn INotificationService + Send + Sync>,
    /// Realtime feed; stores without one can still save and reload on demand
    pub feed: Option<Arc<dyn IChangeFeed + Send + Sync>>,
}

impl SyncPorts {
    /// Creates the port set without a change feed
    pub fn new(
        store: Arc<dyn IRemoteStore + Send + Sync>,
        identity: Arc<dyn IIdentityProvider + Send + Sync>,
        notifier: Arc<dyn INotificationService + Send + Sync>,
    ) -> Self {
        Self {
            store,
            identity,
            notifier,
            feed: None,
        }
    }

    /// Attaches a change feed
    pub fn with_feed(mut self, feed: Arc<dyn IChangeFeed + Send + Sync>) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Delivers a notification, logging delivery failures
    pub async fn notify(&self, notification: Notification) {
        if let Err(e) = self.notifier.notify(&notification).await {
            warn!(
                title = %notification.title,
                error = %e,
                "Failed to deliver notification"
            );
        }
    }
}

/// Tunables for one controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Quiet period before an edited record is written
    pub debounce: Duration,
    /// Maximum rows fetched per reload
    pub reload_limit: usize,
    /// Emit a "saved" notification after each debounced write
    pub notify_on_save: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            reload_limit: DEFAULT_RELOAD_LIMIT,
            notify_on_save: false,
        }
    }
}

impl SyncSettings {
    /// Reads the `sync` section of the configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            debounce: config.sync.debounce(),
            reload_limit: config.sync.reload_limit,
            notify_on_save: config.sync.notify_on_save,
        }
    }

    /// Overrides the debounce window
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}
