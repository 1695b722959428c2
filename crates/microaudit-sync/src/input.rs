//! Observable text input
//!
//! Creation flows read the typed text from an [`InputField`], clear it
//! optimistically, and put the exact text back if the create fails.

use std::sync::Arc;

use tokio::sync::watch;

/// A single-line input shared between a view and the sync layer
#[derive(Clone)]
pub struct InputField {
    value: Arc<watch::Sender<String>>,
}

impl Default for InputField {
    fn default() -> Self {
        Self::new("")
    }
}

impl InputField {
    /// Creates an input holding `text`
    pub fn new(text: impl Into<String>) -> Self {
        let (tx, _rx) = watch::channel(text.into());
        Self {
            value: Arc::new(tx),
        }
    }

    /// Current text
    pub fn get(&self) -> String {
        self.value.borrow().clone()
    }

    /// Replaces the text
    pub fn set(&self, text: impl Into<String>) {
        let text = text.into();
        self.value.send_modify(|v| *v = text);
    }

    /// Empties the input
    pub fn clear(&self) {
        self.set(String::new());
    }

    /// Returns the current text and empties the input
    pub fn take(&self) -> String {
        let mut taken = String::new();
        self.value.send_modify(|v| taken = std::mem::take(v));
        taken
    }

    /// Receiver notified whenever the text changes
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.value.subscribe()
    }
}
