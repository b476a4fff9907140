use serde_json::Value;

use crate::utils::value::value_to_operand;

/// A single filter predicate on a column.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Neq(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    /// Case-insensitive pattern match; `%` matches any run of characters.
    ILike(String, String),
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _)
            | Filter::Neq(c, _)
            | Filter::Gt(c, _)
            | Filter::Gte(c, _)
            | Filter::Lt(c, _)
            | Filter::Lte(c, _)
            | Filter::ILike(c, _) => c,
        }
    }

    /// PostgREST `op.value` form, e.g. `eq.42` or `ilike.*101*`.
    pub fn to_operand(&self) -> String {
        match self {
            Filter::Eq(_, v) => format!("eq.{}", value_to_operand(v)),
            Filter::Neq(_, v) => format!("neq.{}", value_to_operand(v)),
            Filter::Gt(_, v) => format!("gt.{}", value_to_operand(v)),
            Filter::Gte(_, v) => format!("gte.{}", value_to_operand(v)),
            Filter::Lt(_, v) => format!("lt.{}", value_to_operand(v)),
            Filter::Lte(_, v) => format!("lte.{}", value_to_operand(v)),
            Filter::ILike(_, p) => format!("ilike.{}", p.replace('%', "*")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A read (or the row selection of a write) against one named collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn table(table: &str) -> Self {
        Query {
            table: table.to_string(),
            columns: "*".to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.columns = columns.split_whitespace().collect::<Vec<_>>().join("");
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(column.to_string(), value.into()))
    }

    pub fn neq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Neq(column.to_string(), value.into()))
    }

    pub fn gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Gt(column.to_string(), value.into()))
    }

    pub fn gte(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Gte(column.to_string(), value.into()))
    }

    pub fn lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Lt(column.to_string(), value.into()))
    }

    pub fn lte(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Lte(column.to_string(), value.into()))
    }

    pub fn ilike(self, column: &str, pattern: &str) -> Self {
        self.filter(Filter::ILike(column.to_string(), pattern.to_string()))
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Query-string pairs for the filters only (used by writes and counts).
    pub fn filter_params(&self) -> Vec<(String, String)> {
        self.filters
            .iter()
            .map(|f| (f.column().to_string(), f.to_operand()))
            .collect()
    }

    /// Full query-string pairs for a read.
    pub fn read_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.columns.clone())];
        params.extend(self.filter_params());
        if let Some(order) = &self.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_read_params_in_order() {
        let query = Query::table("rooms")
            .select("*, buildings(name, address)")
            .eq("is_available", true)
            .gte("capacity", 10)
            .ilike("room_number", "%101%")
            .order("created_at", false)
            .limit(3);

        assert_eq!(
            query.read_params(),
            vec![
                ("select".to_string(), "*,buildings(name,address)".to_string()),
                ("is_available".to_string(), "eq.true".to_string()),
                ("capacity".to_string(), "gte.10".to_string()),
                ("room_number".to_string(), "ilike.*101*".to_string()),
                ("order".to_string(), "created_at.desc".to_string()),
                ("limit".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn filter_params_skip_select() {
        let query = Query::table("votes").eq("user_id", "p1").lt("start_date", "2024-01-01");
        assert_eq!(
            query.filter_params(),
            vec![
                ("user_id".to_string(), "eq.p1".to_string()),
                ("start_date".to_string(), "lt.2024-01-01".to_string()),
            ]
        );
    }
}
