use std::collections::BTreeMap;

use sqlx::{sqlite::SqliteRow, FromRow, Sqlite, SqlitePool};

use crate::{data_formats::ListParams, errors::StoreError};

mod article_helpers;
mod auth_helpers;
mod history_helpers;
mod tag_helpers;

pub use article_helpers::*;
pub use auth_helpers::*;
pub use history_helpers::*;
pub use tag_helpers::*;

/// Maps the public names a caller may filter or order by onto SQL column
/// expressions. Anything not listed is rejected before it reaches SQL.
pub(crate) struct Columns {
    filterable: &'static [(&'static str, &'static str)],
    orderable: &'static [(&'static str, &'static str)],
}

impl Columns {
    fn lookup(
        entries: &'static [(&'static str, &'static str)],
        name: &str,
    ) -> Result<&'static str, StoreError> {
        entries
            .iter()
            .find(|(public, _)| *public == name)
            .map(|(_, column)| *column)
            .ok_or_else(|| StoreError::InvalidParameter(format!("unknown column `{name}`")))
    }

    fn filter_column(&self, name: &str) -> Result<&'static str, StoreError> {
        Self::lookup(self.filterable, name)
    }

    fn order_column(&self, name: &str) -> Result<&'static str, StoreError> {
        Self::lookup(self.orderable, name)
    }
}

struct QueryBuilder {
    query: String,
    params: Vec<String>,
    conditions: usize,
}

impl QueryBuilder {
    fn new(initial: String) -> Self {
        Self {
            query: initial,
            params: vec![],
            conditions: 0,
        }
    }

    fn add_param(mut self, column: &str, value: String) -> Self {
        let keyword = if self.conditions == 0 {
            " WHERE "
        } else {
            " AND "
        };
        self.query.push_str(keyword);
        self.query.push_str(column);
        self.query.push_str(" = ?");
        self.params.push(value);
        self.conditions += 1;
        self
    }

    fn filter(
        mut self,
        columns: &Columns,
        filters: &BTreeMap<String, String>,
    ) -> Result<Self, StoreError> {
        for (key, value) in filters {
            let column = columns.filter_column(key)?;
            self = self.add_param(column, value.clone());
        }
        Ok(self)
    }

    fn push(mut self, sql: &str) -> Self {
        self.query.push_str(sql);
        self
    }

    fn order_by(mut self, columns: &Columns, field: &str, dir: &str) -> Result<Self, StoreError> {
        let column = columns.order_column(field)?;
        let dir = match dir.to_ascii_lowercase().as_str() {
            "asc" => "ASC",
            "desc" => "DESC",
            other => {
                return Err(StoreError::InvalidParameter(format!(
                    "unknown order direction `{other}`"
                )))
            }
        };
        self.query.push_str(&format!(" ORDER BY {column} {dir}"));
        // Ties on non-unique columns fall back to the primary key so repeated
        // listings keep a stable order.
        let primary = columns.order_column("id")?;
        if column != primary {
            self.query.push_str(&format!(", {primary} {dir}"));
        }
        Ok(self)
    }

    fn paginate(mut self, limit: i64, offset: i64) -> Self {
        self.query.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
        self
    }

    fn build(self) -> (String, Vec<String>) {
        (self.query, self.params)
    }
}

// ----------------- Helper Functions -----------------

/// Runs a filtered, ordered and paginated `SELECT` built from `params`.
async fn list_with_params<T>(
    pool: &SqlitePool,
    select: String,
    group_by: Option<&str>,
    columns: &Columns,
    params: &ListParams,
) -> Result<Vec<T>, StoreError>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let mut builder = QueryBuilder::new(select).filter(columns, &params.filters)?;
    if let Some(group_by) = group_by {
        builder = builder.push(group_by);
    }
    let (query, binds) = builder
        .order_by(columns, &params.order_field, &params.order_dir)?
        .paginate(params.limit, params.offset())
        .build();

    let mut query = sqlx::query_as::<Sqlite, T>(&query);
    for value in binds {
        query = query.bind(value);
    }
    Ok(query.fetch_all(pool).await?)
}

/// Exact single-row lookup on a whitelisted column.
async fn find_one_by_key<T>(
    pool: &SqlitePool,
    select: String,
    columns: &Columns,
    key: &str,
    value: &str,
) -> Result<T, StoreError>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let (query, binds) = QueryBuilder::new(select)
        .add_param(columns.filter_column(key)?, value.to_owned())
        .push(" LIMIT 1")
        .build();

    let mut query = sqlx::query_as::<Sqlite, T>(&query);
    for value in binds {
        query = query.bind(value);
    }
    query.fetch_optional(pool).await?.ok_or(StoreError::NotFound)
}
