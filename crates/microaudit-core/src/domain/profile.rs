//! Profile entity

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::record::{null_as_default, Entity, Table};

/// Public profile of the signed-in user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Name shown in the app header
    #[serde(default, deserialize_with = "null_as_default")]
    pub full_name: String,
    /// Avatar image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Profile {
    /// Creates a profile with a display name
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            avatar_url: None,
        }
    }

    /// First letter of the display name, upper-cased, or `?`
    pub fn initial(&self) -> char {
        self.full_name
            .trim()
            .chars()
            .next()
            .and_then(|c| c.to_uppercase().next())
            .unwrap_or('?')
    }
}

impl Entity for Profile {
    const TABLE: Table = Table::Profiles;
    const LABEL: &'static str = "profile";

    fn validate(&self) -> Result<(), DomainError> {
        if let Some(url) = &self.avatar_url {
            if url.trim().is_empty() {
                return Err(DomainError::ValidationFailed(
                    "avatar URL cannot be blank".into(),
                ));
            }
        }
        Ok(())
    }

    fn display_name(&self) -> String {
        self.full_name.clone()
    }

    fn normalized(&self) -> Self {
        let mut profile = self.clone();
        profile.full_name = profile.full_name.trim().to_string();
        profile
    }
}
