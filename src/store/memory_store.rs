use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::Value;
use tracing::{debug, info};

use super::base::{require_filters, RemoteStore};
use super::query::{Filter, Query};
use crate::error::AppError;
use crate::models::Row;

/// A server-side function registered on the in-memory store.
pub type RpcHandler =
    Arc<dyn Fn(&Value, &HashMap<String, Vec<Row>>) -> Result<Vec<Row>, AppError> + Send + Sync>;

/// In-process relational store used for offline runs and tests.
///
/// Filters compare numbers numerically, RFC 3339 timestamps as instants and
/// other strings lexicographically; a numeric column compared with a string
/// operand parses the operand first. Missing or null columns never satisfy `neq`.
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    serials: RwLock<HashMap<String, String>>,
    functions: RwLock<HashMap<String, RpcHandler>>,
    failing: RwLock<HashSet<String>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            serials: RwLock::new(HashMap::new()),
            functions: RwLock::new(HashMap::new()),
            failing: RwLock::new(HashSet::new()),
        }
    }

    pub fn from_tables(tables: &HashMap<String, Vec<Row>>) -> Self {
        info!(
            "Creating in-memory store with {} seeded tables",
            tables.len()
        );
        let store = Self::new();
        *store.tables.write().unwrap_or_else(PoisonError::into_inner) = tables.clone();
        store
    }

    /// Inserted rows missing `column` get the next integer after the table's current maximum.
    pub fn with_serial(self, table: &str, column: &str) -> Self {
        self.serials
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(table.to_string(), column.to_string());
        self
    }

    pub fn register_rpc<F>(&self, name: &str, handler: F)
    where
        F: Fn(&Value, &HashMap<String, Vec<Row>>) -> Result<Vec<Row>, AppError>
            + Send
            + Sync
            + 'static,
    {
        self.functions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Arc::new(handler));
    }

    /// Every subsequent call touching `name` (a table or a function) fails.
    pub fn fail_table(&self, name: &str) {
        self.failing
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string());
    }

    /// Snapshot of a table's rows.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    fn check_available(&self, name: &str) -> Result<(), AppError> {
        if self
            .failing
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
        {
            return Err(AppError::provider(format!(
                "Simulated failure on '{}'",
                name
            )));
        }
        Ok(())
    }

    fn matching(&self, query: &Query) -> Result<Vec<Row>, AppError> {
        self.check_available(&query.table)?;
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_all(row, &query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn assign_serial(&self, table: &str, existing: &[Row], row: &mut Row) {
        let serials = self.serials.read().unwrap_or_else(PoisonError::into_inner);
        let Some(column) = serials.get(table) else {
            return;
        };
        if row.get(column).map_or(false, |v| !v.is_null()) {
            return;
        }
        let next = existing
            .iter()
            .filter_map(|r| r.get(column).and_then(Value::as_i64))
            .max()
            .unwrap_or(0)
            + 1;
        row.insert(column.clone(), Value::from(next));
    }
}

fn field<'a>(row: &'a Row, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::Number(a), Value::String(b)) => {
            a.as_f64()?.partial_cmp(&b.trim().parse::<f64>().ok()?)
        }
        (Value::String(a), Value::Number(b)) => {
            a.trim().parse::<f64>().ok()?.partial_cmp(&b.as_f64()?)
        }
        (Value::String(a), Value::String(b)) => Some(compare_text(a, b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::String(b)) => b.parse::<bool>().ok().map(|b| a.cmp(&b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Timestamps compare as instants, anything else as text.
fn compare_text(a: &str, b: &str) -> Ordering {
    match (
        DateTime::parse_from_rfc3339(a),
        DateTime::parse_from_rfc3339(b),
    ) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// Case-insensitive match where `%` stands for any run of characters.
fn ilike(value: &str, pattern: &str) -> bool {
    let value = value.to_lowercase();
    let pattern = pattern.to_lowercase();
    let parts: Vec<&str> = pattern.split('%').collect();
    if parts.len() == 1 {
        return value == pattern;
    }

    let mut rest = value.as_str();
    let first = parts[0];
    if !rest.starts_with(first) {
        return false;
    }
    rest = &rest[first.len()..];

    let last = parts[parts.len() - 1];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

fn matches(row: &Row, filter: &Filter) -> bool {
    let value = field(row, filter.column());
    match filter {
        Filter::Eq(_, expected) => compare(value, expected) == Some(Ordering::Equal),
        // Null never satisfies `neq`, as in SQL.
        Filter::Neq(_, expected) => matches!(
            compare(value, expected),
            Some(Ordering::Less | Ordering::Greater)
        ),
        Filter::Gt(_, expected) => compare(value, expected) == Some(Ordering::Greater),
        Filter::Gte(_, expected) => matches!(
            compare(value, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Filter::Lt(_, expected) => compare(value, expected) == Some(Ordering::Less),
        Filter::Lte(_, expected) => matches!(
            compare(value, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Filter::ILike(_, pattern) => value.as_str().map_or(false, |s| ilike(s, pattern)),
    }
}

fn matches_all(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|f| matches(row, f))
}

/// Top-level column names of a select list; embedded resources are skipped.
fn plain_columns(columns: &str) -> Option<Vec<String>> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in columns.chars().chain(std::iter::once(',')) {
        match c {
            '(' => {
                depth += 1;
                current.clear();
            }
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                let name = current.trim().to_string();
                if name == "*" {
                    return None;
                }
                if !name.is_empty() {
                    out.push(name);
                }
                current.clear();
            }
            _ if depth == 0 => current.push(c),
            _ => {}
        }
    }
    Some(out)
}

fn project(row: Row, columns: &Option<Vec<String>>) -> Row {
    match columns {
        None => row,
        Some(columns) => row
            .into_iter()
            .filter(|(k, _)| columns.iter().any(|c| c == k))
            .collect(),
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn get_name(&self) -> &str {
        "memory"
    }

    async fn select(&self, query: &Query) -> Result<Vec<Row>, AppError> {
        let mut rows = self.matching(query)?;
        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let (a, b) = (field(a, &order.column), field(b, &order.column));
                let ord = match (a.is_null(), b.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => return Ordering::Greater,
                    (false, true) => return Ordering::Less,
                    _ => compare(a, b).unwrap_or(Ordering::Equal),
                };
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        let columns = plain_columns(&query.columns);
        debug!(
            table = query.table.as_str(),
            rows = rows.len(),
            "Memory select"
        );
        Ok(rows.into_iter().map(|r| project(r, &columns)).collect())
    }

    async fn count(&self, query: &Query) -> Result<u64, AppError> {
        Ok(self.matching(query)?.len() as u64)
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, AppError> {
        self.check_available(table)?;
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let existing = tables.entry(table.to_string()).or_default();
        let mut inserted = Vec::with_capacity(rows.len());
        for mut row in rows {
            self.assign_serial(table, existing, &mut row);
            existing.push(row.clone());
            inserted.push(row);
        }
        Ok(inserted)
    }

    async fn upsert(
        &self,
        table: &str,
        rows: Vec<Row>,
        on_conflict: &str,
    ) -> Result<Vec<Row>, AppError> {
        self.check_available(table)?;
        let keys: Vec<&str> = on_conflict
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .collect();
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let existing = tables.entry(table.to_string()).or_default();
        let mut written = Vec::with_capacity(rows.len());
        for mut row in rows {
            let position = existing.iter().position(|current| {
                !keys.is_empty()
                    && keys.iter().all(|k| {
                        compare(field(current, k), field(&row, k)) == Some(Ordering::Equal)
                    })
            });
            match position {
                Some(idx) => {
                    let current = &mut existing[idx];
                    current.extend(row);
                    written.push(current.clone());
                }
                None => {
                    self.assign_serial(table, existing, &mut row);
                    existing.push(row.clone());
                    written.push(row);
                }
            }
        }
        Ok(written)
    }

    async fn update(&self, query: &Query, patch: Row) -> Result<Vec<Row>, AppError> {
        require_filters(query, "update")?;
        self.check_available(&query.table)?;
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let mut updated = Vec::new();
        if let Some(rows) = tables.get_mut(&query.table) {
            for row in rows.iter_mut().filter(|r| matches_all(r, &query.filters)) {
                row.extend(patch.clone());
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, query: &Query) -> Result<(), AppError> {
        require_filters(query, "delete")?;
        self.check_available(&query.table)?;
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(rows) = tables.get_mut(&query.table) {
            rows.retain(|r| !matches_all(r, &query.filters));
        }
        Ok(())
    }

    async fn rpc(
        &self,
        function: &str,
        params: Value,
        limit: Option<usize>,
    ) -> Result<Vec<Row>, AppError> {
        self.check_available(function)?;
        let handler = self
            .functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(function)
            .cloned()
            .ok_or_else(|| {
                AppError::provider(format!("Could not find the function {}", function))
            })?;
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut rows = handler(&params, &tables)?;
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }
}
