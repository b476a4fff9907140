use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::query::Query;
use crate::error::AppError;
use crate::models::Row;

/// The remote relational store: generic reads and writes over named
/// collections plus server-side named functions.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    fn get_name(&self) -> &str;

    async fn select(&self, query: &Query) -> Result<Vec<Row>, AppError>;

    /// Exactly one row; zero rows is `NotFound`.
    async fn select_one(&self, query: &Query) -> Result<Row, AppError> {
        let mut rows = self.select(query).await?;
        match rows.len() {
            1 => Ok(rows.remove(0)),
            0 => Err(AppError::not_found(format!(
                "No rows returned from '{}'",
                query.table
            ))),
            n => Err(AppError::provider(format!(
                "Expected a single row from '{}', got {}",
                query.table, n
            ))),
        }
    }

    /// Number of rows matching the filters, without transferring them.
    async fn count(&self, query: &Query) -> Result<u64, AppError>;

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, AppError>;

    /// Insert, merging into existing rows that collide on `on_conflict` (comma separated columns).
    async fn upsert(
        &self,
        table: &str,
        rows: Vec<Row>,
        on_conflict: &str,
    ) -> Result<Vec<Row>, AppError>;

    /// Applies `patch` to every row matching the query's filters and returns the updated rows.
    async fn update(&self, query: &Query, patch: Row) -> Result<Vec<Row>, AppError>;

    async fn delete(&self, query: &Query) -> Result<(), AppError>;

    /// Calls a named server-side function, optionally limiting the returned rows.
    async fn rpc(
        &self,
        function: &str,
        params: Value,
        limit: Option<usize>,
    ) -> Result<Vec<Row>, AppError>;
}

/// Deserialize a row into a typed record.
pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, AppError> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

/// Deserialize rows into typed records.
pub fn from_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, AppError> {
    rows.into_iter().map(from_row).collect()
}

/// Serialize a typed record into a row.
pub fn to_row<T: serde::Serialize>(value: &T) -> Result<Row, AppError> {
    match serde_json::to_value(value)? {
        Value::Object(row) => Ok(row),
        other => Err(AppError::provider(format!(
            "Expected an object row, got {}",
            other
        ))),
    }
}

/// Returns the first row of a write result, which PostgREST returns as an array.
/// Writes must be scoped by at least one filter.
pub fn require_filters(query: &Query, verb: &str) -> Result<(), AppError> {
    if query.filters.is_empty() {
        return Err(AppError::validation(format!(
            "Refusing to {} every row of '{}'",
            verb, query.table
        )));
    }
    Ok(())
}

pub fn first_row(rows: Vec<Row>, table: &str) -> Result<Row, AppError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| AppError::not_found(format!("No rows returned from '{}'", table)))
}
