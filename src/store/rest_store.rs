use std::sync::Arc;

use async_trait::async_trait;
use http::header::{ACCEPT, CONTENT_RANGE};
use http::Method;
use serde_json::Value;
use tracing::{debug, info};

use super::base::{require_filters, RemoteStore};
use super::query::Query;
use crate::backend::client::{check_response, read_json, SupabaseClient};
use crate::error::AppError;
use crate::models::Row;

const RETURN_REPRESENTATION: &str = "return=representation";
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Relational store backed by a PostgREST endpoint (`/rest/v1`).
pub struct RestStore {
    client: Arc<SupabaseClient>,
}

impl RestStore {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        info!("Creating PostgREST store for '{}'", client.base_url());
        Self { client }
    }

    fn table_path(table: &str) -> String {
        format!("/rest/v1/{}", table)
    }
}

/// Extracts the total from a `Content-Range` header such as `0-24/57` or `*/0`.
fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

fn rows_from_value(value: Value, what: &str) -> Result<Vec<Row>, AppError> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Ok(Row::from_iter([("value".to_string(), other)])),
            })
            .collect(),
        Value::Object(row) => Ok(vec![row]),
        Value::Null => Ok(Vec::new()),
        other => Err(AppError::provider(format!(
            "Unexpected result from '{}': {}",
            what, other
        ))),
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    fn get_name(&self) -> &str {
        "postgrest"
    }

    async fn select(&self, query: &Query) -> Result<Vec<Row>, AppError> {
        let response = self
            .client
            .request(Method::GET, &Self::table_path(&query.table))
            .query(&query.read_params())
            .send()
            .await?;
        read_json(check_response(response).await?).await
    }

    async fn select_one(&self, query: &Query) -> Result<Row, AppError> {
        let response = self
            .client
            .request(Method::GET, &Self::table_path(&query.table))
            .header(ACCEPT, SINGLE_OBJECT)
            .query(&query.read_params())
            .send()
            .await?;
        read_json(check_response(response).await?).await
    }

    async fn count(&self, query: &Query) -> Result<u64, AppError> {
        let response = self
            .client
            .request(Method::HEAD, &Self::table_path(&query.table))
            .header("Prefer", "count=exact")
            .query(&[("select", query.columns.as_str())])
            .query(&query.filter_params())
            .send()
            .await?;
        let response = check_response(response).await?;
        let range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        debug!(table = query.table.as_str(), content_range = range, "Count response");
        parse_content_range(range)
            .ok_or_else(|| AppError::provider(format!("Missing row count in '{}'", range)))
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, AppError> {
        let response = self
            .client
            .request(Method::POST, &Self::table_path(table))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&rows)
            .send()
            .await?;
        read_json(check_response(response).await?).await
    }

    async fn upsert(
        &self,
        table: &str,
        rows: Vec<Row>,
        on_conflict: &str,
    ) -> Result<Vec<Row>, AppError> {
        let response = self
            .client
            .request(Method::POST, &Self::table_path(table))
            .header(
                "Prefer",
                format!("resolution=merge-duplicates,{}", RETURN_REPRESENTATION),
            )
            .query(&[("on_conflict", on_conflict)])
            .json(&rows)
            .send()
            .await?;
        read_json(check_response(response).await?).await
    }

    async fn update(&self, query: &Query, patch: Row) -> Result<Vec<Row>, AppError> {
        require_filters(query, "update")?;
        let response = self
            .client
            .request(Method::PATCH, &Self::table_path(&query.table))
            .header("Prefer", RETURN_REPRESENTATION)
            .query(&query.filter_params())
            .json(&patch)
            .send()
            .await?;
        read_json(check_response(response).await?).await
    }

    async fn delete(&self, query: &Query) -> Result<(), AppError> {
        require_filters(query, "delete")?;
        let response = self
            .client
            .request(Method::DELETE, &Self::table_path(&query.table))
            .query(&query.filter_params())
            .send()
            .await?;
        check_response(response).await?;
        Ok(())
    }

    async fn rpc(
        &self,
        function: &str,
        params: Value,
        limit: Option<usize>,
    ) -> Result<Vec<Row>, AppError> {
        let mut request = self
            .client
            .request(Method::POST, &format!("/rest/v1/rpc/{}", function))
            .json(&params);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        let response = request.send().await?;
        let value: Value = read_json(check_response(response).await?).await?;
        rows_from_value(value, function)
    }
}
