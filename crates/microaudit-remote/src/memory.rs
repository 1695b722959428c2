//! In-memory remote store, change feed and identity
//!
//! [`InMemoryRemoteStore`] behaves like the REST data API (ids assigned on
//! create, PATCH semantics on update, owner filtering and ordering on query)
//! and publishes a [`ChangeEvent`] for every write, which makes it a full
//! [`IChangeFeed`] as well.
//!
//! It also supports the knobs tests need:
//! - `script_ids` to control the identifiers handed out by create
//! - `fail_next` / `fail_next_for` / `set_offline` to inject failures
//! - `with_latency` to keep calls in flight for a while
//! - `with_query_delay` to answer a query with rows read earlier
//! - `calls` to inspect what was sent

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, warn};

use microaudit_core::domain::record::{row_id, ID_FIELD, UPDATED_AT_FIELD};
use microaudit_core::domain::{Fields, OwnerId, RecordId, Table};
use microaudit_core::ports::{
    ChangeEvent, ChangeSubscription, IChangeFeed, IIdentityProvider, IRemoteStore, Query, User,
};

use crate::RemoteError;

/// Capacity of the change event broadcast
const EVENT_CAPACITY: usize = 256;
/// Capacity of each subscription's queue
const SUBSCRIPTION_CAPACITY: usize = 64;

/// Store operation kinds, for call inspection and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Create,
    Update,
    Delete,
    Query,
}

/// One call received by the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoreCall {
    pub op: StoreOp,
    pub table: Table,
    pub id: Option<RecordId>,
    pub fields: Option<Fields>,
}

#[derive(Default)]
struct State {
    tables: HashMap<Table, Vec<Fields>>,
    next_ids: VecDeque<String>,
    failures: HashMap<StoreOp, VecDeque<String>>,
    record_failures: HashMap<(StoreOp, String), VecDeque<String>>,
    offline: bool,
    calls: Vec<StoreCall>,
}

impl State {
    fn take_failure(&mut self, op: StoreOp, id: Option<&RecordId>) -> Option<String> {
        if self.offline {
            return Some("network unreachable".to_string());
        }
        let targeted = id.and_then(|id| {
            self.record_failures
                .get_mut(&(op, id.as_str().to_string()))
                .and_then(VecDeque::pop_front)
        });
        targeted.or_else(|| self.failures.get_mut(&op).and_then(VecDeque::pop_front))
    }
}

// ============================================================================
// InMemoryRemoteStore
// ============================================================================

/// Remote store kept in process memory
pub struct InMemoryRemoteStore {
    state: Mutex<State>,
    events: broadcast::Sender<ChangeEvent>,
    latency: Duration,
    query_delay: Duration,
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemoteStore {
    /// Creates an empty store answering instantly
    pub fn new() -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(State::default()),
            events,
            latency: Duration::ZERO,
            query_delay: Duration::ZERO,
        }
    }

    /// Makes every call take `latency` before answering
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Makes queries read their rows right away but answer `delay` later,
    /// so writes landing in between are missing from the answer
    pub fn with_query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = delay;
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means a test panicked mid-call.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queues identifiers for the next creates, in order
    pub fn script_ids<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state().next_ids.extend(ids.into_iter().map(Into::into));
    }

    /// Makes the next call of kind `op` fail with `message`
    pub fn fail_next(&self, op: StoreOp, message: impl Into<String>) {
        self.state()
            .failures
            .entry(op)
            .or_default()
            .push_back(message.into());
    }

    /// Makes the next `op` call on record `id` fail with `message`
    ///
    /// Calls on other records are unaffected.
    pub fn fail_next_for(&self, op: StoreOp, id: &str, message: impl Into<String>) {
        self.state()
            .record_failures
            .entry((op, id.to_string()))
            .or_default()
            .push_back(message.into());
    }

    /// Makes every call fail (or succeed again)
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Inserts a row without publishing an event
    pub fn seed(&self, table: Table, row: Fields) {
        self.state().tables.entry(table).or_default().push(row);
    }

    /// Copy of every row of `table`, in insertion order
    pub fn rows(&self, table: Table) -> Vec<Fields> {
        self.state().tables.get(&table).cloned().unwrap_or_default()
    }

    /// Copy of the row with `id`
    pub fn row(&self, table: Table, id: &str) -> Option<Fields> {
        self.state()
            .tables
            .get(&table)
            .and_then(|rows| rows.iter().find(|r| row_matches_id(r, id)).cloned())
    }

    /// Every call received so far
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    /// Calls of one kind
    pub fn calls_of(&self, op: StoreOp) -> Vec<StoreCall> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.op == op)
            .cloned()
            .collect()
    }

    /// Forgets recorded calls
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Publishes an arbitrary change event to subscribers
    pub fn publish(&self, event: ChangeEvent) {
        // No receivers is fine: nobody is listening yet.
        let _ = self.events.send(event);
    }

    async fn begin(&self, call: StoreCall) -> Result<(), RemoteError> {
        let (op, id) = (call.op, call.id.clone());
        self.state().calls.push(call);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let failure = self.state().take_failure(op, id.as_ref());
        match failure {
            Some(message) => {
                debug!(op = ?op, message = %message, "Injected store failure");
                Err(RemoteError::ServerError(message))
            }
            None => Ok(()),
        }
    }
}

fn row_matches_id(row: &Fields, id: &str) -> bool {
    row_id(row).is_some_and(|rid| rid.as_str() == id)
}

#[async_trait::async_trait]
impl IRemoteStore for InMemoryRemoteStore {
    async fn create(&self, table: Table, fields: Fields) -> Result<Fields> {
        self.begin(StoreCall {
            op: StoreOp::Create,
            table,
            id: None,
            fields: Some(fields.clone()),
        })
        .await?;

        let row = {
            let mut state = self.state();
            let id = state
                .next_ids
                .pop_front()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let mut row = fields;
            row.insert(ID_FIELD.into(), Value::String(id));
            row.entry(UPDATED_AT_FIELD)
                .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
            state.tables.entry(table).or_default().push(row.clone());
            row
        };
        self.publish(ChangeEvent::insert(table, row.clone()));
        Ok(row)
    }

    async fn update(&self, table: Table, id: &RecordId, fields: Fields) -> Result<Fields> {
        self.begin(StoreCall {
            op: StoreOp::Update,
            table,
            id: Some(id.clone()),
            fields: Some(fields.clone()),
        })
        .await?;

        let (old, new) = {
            let mut state = self.state();
            let row = state
                .tables
                .get_mut(&table)
                .and_then(|rows| rows.iter_mut().find(|r| row_matches_id(r, id.as_str())))
                .ok_or_else(|| RemoteError::NotFound(format!("{table} {id}")))?;
            let old = row.clone();
            for (key, value) in fields {
                if key != ID_FIELD {
                    row.insert(key, value);
                }
            }
            (old, row.clone())
        };
        self.publish(ChangeEvent::update(table, Some(old), new.clone()));
        Ok(new)
    }

    async fn delete(&self, table: Table, id: &RecordId) -> Result<()> {
        self.begin(StoreCall {
            op: StoreOp::Delete,
            table,
            id: Some(id.clone()),
            fields: None,
        })
        .await?;

        let removed = {
            let mut state = self.state();
            state.tables.get_mut(&table).and_then(|rows| {
                rows.iter()
                    .position(|r| row_matches_id(r, id.as_str()))
                    .map(|index| rows.remove(index))
            })
        };
        if let Some(old) = removed {
            self.publish(ChangeEvent::delete(table, old));
        }
        Ok(())
    }

    async fn query(&self, table: Table, query: &Query) -> Result<Vec<Fields>> {
        self.begin(StoreCall {
            op: StoreOp::Query,
            table,
            id: None,
            fields: None,
        })
        .await?;
        let rows = query.apply(self.rows(table));
        if !self.query_delay.is_zero() {
            tokio::time::sleep(self.query_delay).await;
        }
        Ok(rows)
    }
}

#[async_trait::async_trait]
impl IChangeFeed for InMemoryRemoteStore {
    async fn subscribe(&self, table: Table, owner: Option<&OwnerId>) -> Result<ChangeSubscription> {
        let mut events = self.events.subscribe();
        let owner = owner.cloned();
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    received = events.recv() => match received {
                        Ok(event) => {
                            if event.table != table {
                                continue;
                            }
                            if let Some(owner) = &owner {
                                if !event.belongs_to(owner) {
                                    continue;
                                }
                            }
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(table = %table, skipped, "Change feed subscriber lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });

        debug!(table = %table, "Subscribed to in-memory change feed");
        Ok(ChangeSubscription::new(table, rx))
    }
}

// ============================================================================
// InMemoryIdentity
// ============================================================================

/// Identity provider whose session is set directly
pub struct InMemoryIdentity {
    session: watch::Sender<Option<User>>,
}

impl Default for InMemoryIdentity {
    fn default() -> Self {
        Self::signed_out()
    }
}

impl InMemoryIdentity {
    /// Creates a provider with nobody signed in
    pub fn signed_out() -> Self {
        let (session, _rx) = watch::channel(None);
        Self { session }
    }

    /// Creates a provider with `owner` signed in
    pub fn signed_in(owner: OwnerId) -> Self {
        let identity = Self::signed_out();
        identity.sign_in(User::new(owner, None));
        identity
    }

    /// Switches the session to `user`
    pub fn sign_in(&self, user: User) {
        self.session.send_replace(Some(user));
    }

    /// Ends the session
    pub fn sign_out(&self) {
        self.session.send_replace(None);
    }
}

#[async_trait::async_trait]
impl IIdentityProvider for InMemoryIdentity {
    async fn current_user(&self) -> Result<Option<User>> {
        Ok(self.session.borrow().clone())
    }

    fn on_session_change(&self) -> watch::Receiver<Option<User>> {
        self.session.subscribe()
    }
}
