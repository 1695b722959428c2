//! Shared wiring for commands that talk to the backend
//!
//! Builds the REST adapters from the configuration, resumes the session
//! stored in the keyring (refreshing it when the access token expired) and
//! hands out sync controllers bound to those adapters.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use microaudit_core::config::Config;
use microaudit_core::domain::{Entity, LocalKey, RecordId};
use microaudit_core::ports::User;
use microaudit_remote::{KeyringSessionStore, RestClient, RestIdentityProvider, RestRemoteStore};
use microaudit_sync::{
    CollectingNotifier, MutationOutcome, SaveOutcome, SyncController, SyncPorts,
};

use crate::output::OutputFormatter;

/// Adapters and session state for one CLI invocation
pub struct AppSession {
    pub config: Config,
    pub client: Arc<RestClient>,
    pub store: Arc<RestRemoteStore>,
    pub identity: Arc<RestIdentityProvider>,
    pub notifier: Arc<CollectingNotifier>,
    pub keyring: KeyringSessionStore,
}

impl AppSession {
    /// Builds the adapters for the configured backend
    pub fn connect(config: &Config) -> Result<Self> {
        if !config.has_remote() {
            bail!("remote.url is not configured. Run 'microaudit config set remote.url <url>'");
        }
        let url = config.remote.url.trim();
        let client = Arc::new(RestClient::new(
            url,
            config.remote.anon_key.clone().unwrap_or_default(),
        ));
        Ok(Self {
            config: config.clone(),
            store: Arc::new(RestRemoteStore::new(Arc::clone(&client))),
            identity: Arc::new(RestIdentityProvider::new(Arc::clone(&client))),
            notifier: Arc::new(CollectingNotifier::new()),
            keyring: KeyringSessionStore::new(url),
            client,
        })
    }

    /// Resumes the stored session, `None` if there is none or it cannot be
    /// revived
    pub async fn resume(&self) -> Result<Option<User>> {
        let Some(stored) = self.keyring.load()? else {
            return Ok(None);
        };

        match self.identity.sign_in_with_token(&stored.access_token).await {
            Ok(user) => return Ok(Some(user)),
            Err(e) => debug!(error = %format!("{e:#}"), "Stored access token rejected"),
        }

        let Some(refresh_token) = stored.refresh_token.as_deref() else {
            self.keyring.clear()?;
            return Ok(None);
        };
        match self.identity.refresh(refresh_token).await {
            Ok(session) => {
                self.keyring.store(&session)?;
                info!(user_id = %session.user.id, "Session refreshed");
                Ok(Some(session.user))
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Session expired");
                self.keyring.clear()?;
                Ok(None)
            }
        }
    }

    /// Resumes the stored session or fails with a hint to sign in
    pub async fn require_user(&self) -> Result<User> {
        self.resume()
            .await?
            .context("Not signed in. Run 'microaudit auth login' first")
    }

    pub fn ports(&self) -> SyncPorts {
        SyncPorts::new(
            self.store.clone(),
            self.identity.clone(),
            self.notifier.clone(),
        )
    }

    /// A controller for `T`, loaded with the owner's records
    pub async fn controller<T: Entity>(&self) -> Result<SyncController<T>> {
        let controller = SyncController::from_config(self.ports(), &self.config);
        controller
            .reload()
            .await
            .with_context(|| format!("Failed to load {}", T::TABLE))?;
        Ok(controller)
    }

    /// Prints every notification raised so far
    pub fn report(&self, fmt: &dyn OutputFormatter) {
        for notification in self.notifier.drain() {
            fmt.notification(&notification);
        }
    }
}

/// Finds the local key of the record with remote identifier `id`
pub async fn key_for<T: Entity>(controller: &SyncController<T>, id: &str) -> Result<LocalKey> {
    let record_id = RecordId::new(id).context("Invalid record id")?;
    controller
        .find_by_id(&record_id)
        .await
        .map(|record| record.key())
        .with_context(|| format!("No {} with id {id}", T::LABEL))
}

/// Turns a save outcome into a message, or an error if nothing was saved
pub fn describe_save(label: &str, outcome: &SaveOutcome) -> Result<String> {
    match outcome {
        SaveOutcome::Saved { id, created: true } => Ok(format!("Created {label} {id}")),
        SaveOutcome::Saved { id, created: false } => Ok(format!("Saved {label} {id}")),
        SaveOutcome::Skipped => Ok(format!("No changes to {label}")),
        SaveOutcome::Failed(error) => bail!("Could not save {label}: {error}"),
        SaveOutcome::Missing => bail!("The {label} was removed before it could be saved"),
        SaveOutcome::Deferred => bail!("Another save of this {label} is still running"),
    }
}

/// Turns a mutation outcome into a message, or an error if it did not apply
pub fn describe_mutation(label: &str, verb: &str, outcome: &MutationOutcome) -> Result<String> {
    match outcome {
        MutationOutcome::Confirmed => Ok(format!("{verb} {label}")),
        MutationOutcome::Created { id, .. } => Ok(format!("Created {label} {id}")),
        MutationOutcome::Unchanged => Ok(format!("Nothing to change on the {label}")),
        MutationOutcome::Reverted { error } => bail!("Could not update {label}: {error}"),
        MutationOutcome::Rejected { reason } => bail!("Invalid {label}: {reason}"),
        MutationOutcome::Skipped => bail!("Not signed in. Run 'microaudit auth login' first"),
    }
}

#[cfg(test)]
mod tests {
    use microaudit_core::config::ConfigBuilder;

    use super::*;

    #[test]
    fn test_connect_requires_remote_url() {
        let err = AppSession::connect(&Config::default()).err().unwrap();
        assert!(err.to_string().contains("remote.url"));
    }

    #[test]
    fn test_connect_uses_configured_url() {
        let config = ConfigBuilder::new()
            .remote_url("https://project.example.co/")
            .remote_anon_key("anon")
            .build();
        let session = AppSession::connect(&config).unwrap();
        assert_eq!(session.client.base_url(), "https://project.example.co");
        assert_eq!(session.keyring.account(), "https://project.example.co");
        assert!(!session.client.has_session());
    }

    #[test]
    fn test_describe_save() {
        let id = RecordId::new("n1").unwrap();
        let created = SaveOutcome::Saved {
            id: id.clone(),
            created: true,
        };
        assert_eq!(describe_save("note", &created).unwrap(), "Created note n1");
        let saved = SaveOutcome::Saved { id, created: false };
        assert_eq!(describe_save("note", &saved).unwrap(), "Saved note n1");

        let err = describe_save("note", &SaveOutcome::Failed("offline".into())).unwrap_err();
        assert_eq!(err.to_string(), "Could not save note: offline");
    }

    #[test]
    fn test_describe_mutation() {
        let ok = describe_mutation("task", "Completed", &MutationOutcome::Confirmed).unwrap();
        assert_eq!(ok, "Completed task");
        let reverted = MutationOutcome::Reverted {
            error: "server error".into(),
        };
        assert!(describe_mutation("task", "Completed", &reverted).is_err());
        assert!(describe_mutation("task", "Completed", &MutationOutcome::Skipped).is_err());
    }
}
