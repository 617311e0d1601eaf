mod request;
mod response;
mod wrapper;

pub use request::*;
pub use response::*;
pub use wrapper::*;

use std::collections::{BTreeMap, HashMap};

const DEFAULT_LIMIT: i64 = 10;
const DEFAULT_PAGE: i64 = 1;
const DEFAULT_ORDER_FIELD: &str = "id";
const DEFAULT_ORDER_DIR: &str = "desc";

/// Listing controls parsed from a query string. Every key that is not a
/// pagination/ordering control is kept as an exact-match filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub filters: BTreeMap<String, String>,
    pub limit: i64,
    pub page: i64,
    pub order_field: String,
    pub order_dir: String,
}

impl Default for ListParams {
    fn default() -> Self {
        ListParams {
            filters: BTreeMap::new(),
            limit: DEFAULT_LIMIT,
            page: DEFAULT_PAGE,
            order_field: DEFAULT_ORDER_FIELD.to_string(),
            order_dir: DEFAULT_ORDER_DIR.to_string(),
        }
    }
}

impl ListParams {
    pub fn from_query(query: HashMap<String, String>) -> Result<Self, String> {
        let mut params = ListParams::default();
        for (key, value) in query {
            match key.as_str() {
                "limit" => params.limit = parse_positive("limit", &value)?,
                "page" => params.page = parse_positive("page", &value)?,
                "orderField" => params.order_field = value,
                "orderDir" => params.order_dir = value,
                _ => {
                    params.filters.insert(key, value);
                }
            }
        }
        if params.limit.checked_mul(params.page - 1).is_none() {
            return Err(format!(
                "limit {} and page {} are out of range",
                params.limit, params.page
            ));
        }
        Ok(params)
    }

    pub fn with_filter(mut self, key: &str, value: impl ToString) -> Self {
        self.filters.insert(key.to_string(), value.to_string());
        self
    }

    pub fn offset(&self) -> i64 {
        self.limit.saturating_mul(self.page.saturating_sub(1))
    }
}

fn parse_positive(name: &str, value: &str) -> Result<i64, String> {
    match value.parse::<i64>() {
        Ok(number) if number > 0 => Ok(number),
        _ => Err(format!("{name} must be a positive integer, got `{value}`")),
    }
}
