//! Load records use case
//!
//! Fetches the signed-in user's rows for one entity type, newest first.
//! Rows that do not map to the entity are skipped with a warning rather than
//! failing the whole load, so one bad row never empties the list.

use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::config::DEFAULT_RELOAD_LIMIT;
use crate::domain::{EditableRecord, Entity, OwnerId};
use crate::ports::{IIdentityProvider, IRemoteStore, Query};

/// Result of a load
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome<T> {
    /// Nobody is signed in; the local list should be cleared
    SignedOut,
    /// Rows fetched for `owner`
    Loaded {
        /// Owner the rows were fetched for
        owner: OwnerId,
        /// Records, in the store's order (newest first)
        records: Vec<EditableRecord<T>>,
        /// Number of rows that could not be mapped
        skipped: usize,
    },
}

impl<T> LoadOutcome<T> {
    /// The fetched records; empty when signed out
    pub fn into_records(self) -> Vec<EditableRecord<T>> {
        match self {
            LoadOutcome::SignedOut => Vec::new(),
            LoadOutcome::Loaded { records, .. } => records,
        }
    }
}

/// Use case for fetching one entity type for the current owner
pub struct LoadRecordsUseCase<T> {
    store: Arc<dyn IRemoteStore + Send + Sync>,
    identity: Arc<dyn IIdentityProvider + Send + Sync>,
    limit: usize,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> LoadRecordsUseCase<T> {
    /// Creates the use case with the default row limit
    pub fn new(
        store: Arc<dyn IRemoteStore + Send + Sync>,
        identity: Arc<dyn IIdentityProvider + Send + Sync>,
    ) -> Self {
        Self {
            store,
            identity,
            limit: DEFAULT_RELOAD_LIMIT,
            _entity: PhantomData,
        }
    }

    /// Overrides the row limit
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Fetches the current owner's records
    ///
    /// # Errors
    ///
    /// Returns an error if the identity provider or the store fails.
    /// A missing session is not an error.
    pub async fn execute(&self) -> Result<LoadOutcome<T>> {
        let user = self
            .identity
            .current_user()
            .await
            .context("Failed to look up current user")?;

        let Some(user) = user else {
            debug!(table = %T::TABLE, "No user signed in, nothing to load");
            return Ok(LoadOutcome::SignedOut);
        };

        self.execute_for(&user.id).await
    }

    /// Fetches the records owned by `owner`
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails
    pub async fn execute_for(&self, owner: &OwnerId) -> Result<LoadOutcome<T>> {
        let query = Query::owned_by(owner, self.limit);
        let rows = self
            .store
            .query(T::TABLE, &query)
            .await
            .with_context(|| format!("Failed to load {}", T::TABLE))?;

        let total = rows.len();
        let mut records = Vec::with_capacity(total);
        for row in rows {
            match EditableRecord::<T>::from_row(&row) {
                Ok(record) => records.push(record),
                Err(e) => warn!(table = %T::TABLE, error = %e, "Skipping malformed row"),
            }
        }
        let skipped = total - records.len();

        debug!(
            table = %T::TABLE,
            owner = %owner,
            loaded = records.len(),
            skipped,
            "Loaded records"
        );

        Ok(LoadOutcome::Loaded {
            owner: owner.clone(),
            records,
            skipped,
        })
    }
}
