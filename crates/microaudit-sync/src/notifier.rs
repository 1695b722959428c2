//! Notification adapters
//!
//! - [`TracingNotifier`] writes notifications to the log, for headless use
//! - [`CollectingNotifier`] keeps them in memory so a front end (or a test)
//!   can drain and display them

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{error, info, warn};

use microaudit_core::ports::{INotificationService, Notification, NotificationPriority};

/// Logs notifications through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl INotificationService for TracingNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        match notification.priority {
            NotificationPriority::Low => info!(
                category = %notification.category,
                title = %notification.title,
                body = %notification.body,
                "Notification"
            ),
            NotificationPriority::Normal => warn!(
                category = %notification.category,
                title = %notification.title,
                body = %notification.body,
                "Notification"
            ),
            NotificationPriority::High => error!(
                category = %notification.category,
                title = %notification.title,
                body = %notification.body,
                "Notification"
            ),
        }
        Ok(())
    }
}

/// Keeps notifications in memory until drained
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    received: Mutex<Vec<Notification>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every notification received so far
    pub fn all(&self) -> Vec<Notification> {
        self.received
            .lock()
            .map(|received| received.clone())
            .unwrap_or_default()
    }

    /// Removes and returns every notification received so far
    pub fn drain(&self) -> Vec<Notification> {
        self.received
            .lock()
            .map(|mut received| std::mem::take(&mut *received))
            .unwrap_or_default()
    }

    /// Number of notifications held
    pub fn len(&self) -> usize {
        self.received.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Returns true if nothing was received
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl INotificationService for CollectingNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        self.received
            .lock()
            .map_err(|_| anyhow::anyhow!("notification buffer poisoned"))?
            .push(notification.clone());
        Ok(())
    }
}
