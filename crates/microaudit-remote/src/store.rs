//! RestRemoteStore - IRemoteStore implementation for a PostgREST data API
//!
//! ## Endpoints
//!
//! | Operation | Request |
//! |-----------|---------|
//! | create    | `POST /rest/v1/{table}` |
//! | update    | `PATCH /rest/v1/{table}?id=eq.{id}` |
//! | delete    | `DELETE /rest/v1/{table}?id=eq.{id}` |
//! | query     | `GET /rest/v1/{table}?select=*&{col}=eq.{v}&order={col}.{dir}&limit={n}` |
//!
//! Writes send `Prefer: return=representation` so the stored row comes back
//! in the response body (as a one-element array).

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use microaudit_core::domain::{Fields, RecordId, Table};
use microaudit_core::ports::{IRemoteStore, Query};

use crate::client::RestClient;
use crate::RemoteError;

const RETURN_REPRESENTATION: &str = "return=representation";

/// Remote store backed by the REST data API
pub struct RestRemoteStore {
    client: Arc<RestClient>,
}

impl RestRemoteStore {
    /// Creates a store sharing `client` (and its session) with other adapters
    pub fn new(client: Arc<RestClient>) -> Self {
        Self { client }
    }

    fn table_path(table: Table) -> String {
        format!("/rest/v1/{}", table.as_str())
    }

    /// Query-string pairs for a [`Query`]
    fn query_params(query: &Query) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        for (column, value) in query.filters() {
            params.push((column.clone(), format!("eq.{value}")));
        }
        if let Some(order) = query.order() {
            params.push((
                "order".to_string(),
                format!("{}.{}", order.column, order.direction.as_str()),
            ));
        }
        if let Some(limit) = query.row_limit() {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }

    /// Takes the single row out of a representation response
    fn single_row(body: Value, table: Table) -> Result<Fields, RemoteError> {
        match body {
            Value::Array(rows) => match rows.into_iter().next() {
                Some(Value::Object(row)) => Ok(row),
                Some(other) => Err(RemoteError::InvalidResponse(format!(
                    "{table}: expected a row object, got {other}"
                ))),
                None => Err(RemoteError::NotFound(format!("{table}: no row returned"))),
            },
            Value::Object(row) => Ok(row),
            other => Err(RemoteError::InvalidResponse(format!(
                "{table}: unexpected body {other}"
            ))),
        }
    }
}

#[async_trait::async_trait]
impl IRemoteStore for RestRemoteStore {
    async fn create(&self, table: Table, fields: Fields) -> Result<Fields> {
        debug!(table = %table, "POST row");
        let response = self
            .client
            .request(Method::POST, &Self::table_path(table))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&fields)
            .send()
            .await
            .map_err(RemoteError::from)
            .with_context(|| format!("Failed to send create for {table}"))?;
        let body: Value = RestClient::check(response)
            .await?
            .json()
            .await
            .map_err(RemoteError::from)
            .with_context(|| format!("Failed to parse create response for {table}"))?;
        Ok(Self::single_row(body, table)?)
    }

    async fn update(&self, table: Table, id: &RecordId, fields: Fields) -> Result<Fields> {
        debug!(table = %table, record_id = %id, "PATCH row");
        let response = self
            .client
            .request(Method::PATCH, &Self::table_path(table))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&fields)
            .send()
            .await
            .map_err(RemoteError::from)
            .with_context(|| format!("Failed to send update for {table} {id}"))?;
        let body: Value = RestClient::check(response)
            .await?
            .json()
            .await
            .map_err(RemoteError::from)
            .with_context(|| format!("Failed to parse update response for {table} {id}"))?;
        Ok(Self::single_row(body, table)?)
    }

    async fn delete(&self, table: Table, id: &RecordId) -> Result<()> {
        debug!(table = %table, record_id = %id, "DELETE row");
        let response = self
            .client
            .request(Method::DELETE, &Self::table_path(table))
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await
            .map_err(RemoteError::from)
            .with_context(|| format!("Failed to send delete for {table} {id}"))?;
        RestClient::check(response).await?;
        Ok(())
    }

    async fn query(&self, table: Table, query: &Query) -> Result<Vec<Fields>> {
        let params = Self::query_params(query);
        debug!(table = %table, params = ?params, "GET rows");
        let response = self
            .client
            .request(Method::GET, &Self::table_path(table))
            .query(&params)
            .send()
            .await
            .map_err(RemoteError::from)
            .with_context(|| format!("Failed to send query for {table}"))?;
        let rows: Vec<Value> = RestClient::check(response)
            .await?
            .json()
            .await
            .map_err(RemoteError::from)
            .with_context(|| format!("Failed to parse rows for {table}"))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect())
    }
}
