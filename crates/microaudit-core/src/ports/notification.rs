//! Notification service port (driven/secondary port)
//!
//! This module defines the interface for surfacing non-blocking, dismissible
//! messages to the user: failed saves, reverted actions, validation errors
//! and (optionally) save confirmations.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because notification delivery is adapter-specific.
//! - Notifications are fire-and-forget; callers log and ignore delivery
//!   failures instead of turning them into sync errors.

use serde::{Deserialize, Serialize};

// ============================================================================
// Notification struct and NotificationPriority enum
// ============================================================================

/// Priority level for a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    /// Informational, may be shown briefly or not at all
    Low,
    /// Shown in the normal notification area
    #[default]
    Normal,
    /// Failures the user should notice
    High,
}

impl std::fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationPriority::Low => "low",
            NotificationPriority::Normal => "normal",
            NotificationPriority::High => "high",
        };
        write!(f, "{}", s)
    }
}

/// A message to display to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Short title naming what happened
    pub title: String,
    /// Details: the entity concerned and the error, if any
    pub body: String,
    /// Priority level affecting how the notification is displayed
    pub priority: NotificationPriority,
    /// Category for grouping/filtering ("sync", "error", "validation")
    pub category: String,
}

impl Notification {
    /// Creates a new notification with the given title and body
    ///
    /// Uses `Normal` priority and an empty category by default.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            priority: NotificationPriority::Normal,
            category: String::new(),
        }
    }

    /// Sets the priority level
    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Creates a low-priority sync confirmation, e.g. "Note saved"
    pub fn sync(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body)
            .with_priority(NotificationPriority::Low)
            .with_category("sync")
    }

    /// Creates an error notification with High priority
    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body)
            .with_priority(NotificationPriority::High)
            .with_category("error")
    }

    /// Creates the notification for a failed remote action
    ///
    /// The title names the action and the entity kind ("Could not update
    /// task"); the body names the record and the error.
    pub fn failure(verb: &str, entity: &str, name: &str, error: impl std::fmt::Display) -> Self {
        Self::error(
            format!("Could not {verb} {entity}"),
            format!("\"{name}\": {error}"),
        )
    }

    /// Creates the notification for input rejected before any network call
    pub fn validation(entity: &str, message: impl Into<String>) -> Self {
        Self::new(format!("Invalid {entity}"), message)
            .with_priority(NotificationPriority::Normal)
            .with_category("validation")
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.body)
    }
}

// ============================================================================
// INotificationService trait
// ============================================================================

/// Port trait for user-facing notifications
///
/// Implementations should gracefully handle delivery failures (no display,
/// closed channel) without crashing.
#[async_trait::async_trait]
pub trait INotificationService: Send + Sync {
    /// Shows a notification to the user
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_names_action_and_entity() {
        let n = Notification::failure("update", "task", "Groceries", "HTTP 500");
        assert_eq!(n.title, "Could not update task");
        assert_eq!(n.body, "\"Groceries\": HTTP 500");
        assert_eq!(n.priority, NotificationPriority::High);
        assert_eq!(n.category, "error");
    }

    #[test]
    fn test_validation_category() {
        let n = Notification::validation("workspace", "title cannot be empty");
        assert_eq!(n.title, "Invalid workspace");
        assert_eq!(n.category, "validation");
    }

    #[test]
    fn test_sync_is_low_priority() {
        let n = Notification::sync("Note saved", "Plan");
        assert_eq!(n.priority, NotificationPriority::Low);
        assert_eq!(n.to_string(), "Note saved: Plan");
    }
}
