//! Minimal port fakes for use case tests

use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::watch;

use crate::domain::{Fields, OwnerId, RecordId, Table};
use crate::ports::{IIdentityProvider, IRemoteStore, Query, User};

#[derive(Default)]
pub(crate) struct FakeStore {
    rows: Mutex<Vec<(Table, Fields)>>,
    queries: Mutex<Vec<(Table, Query)>>,
    fail: bool,
}

impl FakeStore {
    pub(crate) fn with_rows(rows: Vec<Fields>) -> Self {
        Self {
            rows: Mutex::new(rows.into_iter().map(|r| (Table::Notes, r)).collect()),
            ..Default::default()
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub(crate) fn queries(&self) -> Vec<(Table, Query)> {
        self.queries.lock().unwrap().clone()
    }

    pub(crate) fn created(&self) -> Vec<(Table, Fields)> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IRemoteStore for FakeStore {
    async fn create(&self, table: Table, mut fields: Fields) -> anyhow::Result<Fields> {
        if self.fail {
            anyhow::bail!("store unavailable");
        }
        let mut rows = self.rows.lock().unwrap();
        fields.insert("id".into(), Value::String(format!("r{}", rows.len() + 1)));
        rows.push((table, fields.clone()));
        Ok(fields)
    }

    async fn update(&self, _table: Table, _id: &RecordId, fields: Fields) -> anyhow::Result<Fields> {
        if self.fail {
            anyhow::bail!("store unavailable");
        }
        Ok(fields)
    }

    async fn delete(&self, _table: Table, _id: &RecordId) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("store unavailable");
        }
        Ok(())
    }

    async fn query(&self, table: Table, query: &Query) -> anyhow::Result<Vec<Fields>> {
        self.queries.lock().unwrap().push((table, query.clone()));
        if self.fail {
            anyhow::bail!("store unavailable");
        }
        let rows = self.rows.lock().unwrap().iter().map(|(_, r)| r.clone()).collect::<Vec<_>>();
        Ok(query.apply(rows))
    }
}

pub(crate) struct FakeIdentity {
    tx: watch::Sender<Option<User>>,
}

impl FakeIdentity {
    pub(crate) fn signed_out() -> Self {
        Self {
            tx: watch::channel(None).0,
        }
    }

    pub(crate) fn signed_in(id: &str) -> Self {
        let user = User::new(OwnerId::new(id).unwrap(), None);
        Self {
            tx: watch::channel(Some(user)).0,
        }
    }
}

#[async_trait::async_trait]
impl IIdentityProvider for FakeIdentity {
    async fn current_user(&self) -> anyhow::Result<Option<User>> {
        Ok(self.tx.borrow().clone())
    }

    fn on_session_change(&self) -> watch::Receiver<Option<User>> {
        self.tx.subscribe()
    }
}
